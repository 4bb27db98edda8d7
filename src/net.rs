use std::env;
use std::time::Duration;

use anyhow::Context;
use reqwest::blocking::Client;
use reqwest::Url;

use crate::error::Result;

const API_URL_ENV: &str = "STEM_MIXER_API_URL";
const DEFAULT_API_URL: &str = "http://localhost:5000";

/// Connection settings for the remote separation service.
#[derive(Clone, Debug)]
pub struct ServiceConfig {
    pub base_url: Url,
    pub connect_timeout: Duration,
    /// Bound on a single fetch, so a stalled service surfaces as an error.
    pub request_timeout: Duration,
}

impl ServiceConfig {
    pub fn new(base_url: Url) -> Self {
        ServiceConfig {
            base_url,
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(120),
        }
    }

    /// Read the service location from `STEM_MIXER_API_URL`, falling back to
    /// the local default.
    pub fn from_env() -> Result<Self> {
        let raw = env::var(API_URL_ENV).unwrap_or_else(|_| DEFAULT_API_URL.to_string());
        let url = Url::parse(&raw).with_context(|| format!("Bad service URL: {raw}"))?;
        Ok(ServiceConfig::new(url))
    }

    /// `{base}/audio/{asset-basename}/{stem}` and friends, with path
    /// segments percent-encoded.
    pub fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        {
            let mut path = url
                .path_segments_mut()
                .map_err(|_| anyhow::anyhow!("Service URL cannot be a base"))?;
            path.pop_if_empty();
            for seg in segments {
                path.push(seg);
            }
        }
        Ok(url)
    }
}

/// Shared blocking client with bounded timeouts.
pub fn http_client(config: &ServiceConfig) -> Result<Client> {
    let client = Client::builder()
        .connect_timeout(config.connect_timeout)
        .timeout(config.request_timeout)
        .build()
        .context("reqwest client build failed")?;
    Ok(client)
}

/// Client without an overall request timeout, for the unbounded progress
/// stream (only producer-side closure ends it).
pub fn sse_client(config: &ServiceConfig) -> Result<Client> {
    let client = Client::builder()
        .connect_timeout(config.connect_timeout)
        .build()
        .context("reqwest client build failed")?;
    Ok(client)
}
