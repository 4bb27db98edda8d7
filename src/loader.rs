use std::thread;

use reqwest::blocking::Client;

use crate::audio::decode_audio;
use crate::error::{MixerError, Result};
use crate::net::{http_client, ServiceConfig};
use crate::types::{AssetId, Stem, StemMap, TrackBuffer};

/// Fetches and decodes separated stems for a processed asset.
pub struct TrackLoader {
    client: Client,
    config: ServiceConfig,
}

impl TrackLoader {
    pub fn new(config: ServiceConfig) -> Result<Self> {
        let client = http_client(&config)?;
        Ok(TrackLoader { client, config })
    }

    /// Fetch one stem and decode it into a playable buffer.
    ///
    /// Network failures and non-2xx responses surface as `Fetch`; a payload
    /// that is not decodable audio surfaces as `Decode`. No retries.
    pub fn load(&self, asset: &AssetId, stem: Stem) -> Result<TrackBuffer> {
        let url = self
            .config
            .endpoint(&["audio", asset.basename(), stem.as_str()])?;

        tracing::debug!(%asset, %stem, %url, "fetching stem");

        let response = self
            .client
            .get(url)
            .send()
            .map_err(|e| MixerError::Fetch(format!("{stem}: {e}")))?
            .error_for_status()
            .map_err(|e| MixerError::Fetch(format!("{stem}: {e}")))?;

        let bytes = response
            .bytes()
            .map_err(|e| MixerError::Fetch(format!("{stem}: {e}")))?;

        decode_audio(bytes.to_vec())
    }

    /// Fetch all four stems concurrently, all-or-nothing.
    ///
    /// Completion order between the four fetches is not guaranteed; the
    /// result is only produced once every stem has decoded, and any single
    /// failure fails the whole load. All stems must agree on one sample rate.
    pub fn load_all(&self, asset: &AssetId) -> Result<StemMap<TrackBuffer>> {
        let results: [Result<TrackBuffer>; 4] = thread::scope(|scope| {
            let handles = Stem::ALL.map(|stem| scope.spawn(move || self.load(asset, stem)));
            handles.map(|handle| {
                handle
                    .join()
                    .unwrap_or_else(|_| Err(anyhow::anyhow!("Stem loader thread panicked").into()))
            })
        });

        let [vocals, drums, bass, other] = results;
        let tracks = StemMap {
            vocals: vocals?,
            drums: drums?,
            bass: bass?,
            other: other?,
        };

        let rate = tracks.vocals.sample_rate;
        for (stem, buffer) in tracks.iter() {
            if buffer.sample_rate != rate {
                return Err(MixerError::Decode(format!(
                    "Sample rate mismatch: {stem} is {} Hz, expected {rate} Hz",
                    buffer.sample_rate
                )));
            }
        }

        tracing::info!(%asset, sample_rate = rate, "loaded all stems");
        Ok(tracks)
    }
}
