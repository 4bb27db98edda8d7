//! Upload/progress orchestration against the remote separation service.
//!
//! `POST /upload` takes the source file and answers with the asset name;
//! `GET /process/{name}` is a server-sent-event stream of `{progress: 0..100}`
//! that the producer closes at 100. The watch surfaces at most one terminal
//! error and then stops listening; retrying is left to the caller.

use std::fs;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;

use percent_encoding::percent_decode_str;
use reqwest::blocking::{multipart, Client, Response};
use reqwest::header::CONTENT_DISPOSITION;
use serde::Deserialize;

use crate::error::{MixerError, Result};
use crate::net::{http_client, sse_client, ServiceConfig};
use crate::types::AssetId;

/// Upload size cap enforced client-side, matching the service's limit.
pub const MAX_UPLOAD_BYTES: u64 = 10 * 1024 * 1024;

const AUDIO_EXTENSIONS: [&str; 4] = ["mp3", "wav", "m4a", "webm"];

#[derive(Debug, Deserialize)]
struct UploadResponse {
    filename: Option<String>,
}

#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq)]
pub struct ProgressEvent {
    pub progress: u8,
}

/// Submits source audio and watches the separation progress stream.
pub struct Orchestrator {
    client: Client,
    sse: Client,
    config: ServiceConfig,
}

impl Orchestrator {
    pub fn new(config: ServiceConfig) -> Result<Self> {
        Ok(Orchestrator {
            client: http_client(&config)?,
            sse: sse_client(&config)?,
            config,
        })
    }

    /// Upload a local audio file, optionally namespaced by the signed-in
    /// account id (`{provider_account_id}_{filename}`).
    pub fn submit_file(&self, path: &Path, provider_account_id: Option<&str>) -> Result<AssetId> {
        let filename = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| MixerError::Upload(format!("Bad file name: {}", path.display())))?;

        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        if !AUDIO_EXTENSIONS.contains(&extension.as_str()) {
            return Err(MixerError::Upload(format!(
                "Only audio files can be uploaded (got `.{extension}`)"
            )));
        }

        let size = fs::metadata(path)?.len();
        if size > MAX_UPLOAD_BYTES {
            return Err(MixerError::Upload(format!(
                "File is {size} bytes; the limit is {MAX_UPLOAD_BYTES}"
            )));
        }

        let name = match provider_account_id {
            Some(id) => format!("{id}_{filename}"),
            None => filename.to_string(),
        };
        self.submit_bytes(fs::read(path)?, &name)
    }

    /// Upload in-memory audio under the given name.
    pub fn submit_bytes(&self, bytes: Vec<u8>, name: &str) -> Result<AssetId> {
        let url = self.config.endpoint(&["upload"])?;
        let part = multipart::Part::bytes(bytes).file_name(name.to_string());
        let form = multipart::Form::new().part("file", part);

        tracing::info!(name, %url, "uploading source audio");

        let response = self
            .client
            .post(url)
            .multipart(form)
            .send()
            .map_err(|e| MixerError::Upload(e.to_string()))?;

        if !response.status().is_success() {
            return Err(MixerError::Upload(format!(
                "Server answered {}",
                response.status()
            )));
        }

        let body: UploadResponse = response
            .json()
            .map_err(|e| MixerError::Upload(format!("Unreadable upload response: {e}")))?;

        body.filename
            .map(AssetId::new)
            .ok_or_else(|| MixerError::Upload("No asset name in upload response".into()))
    }

    /// Open the progress stream for an uploading asset.
    ///
    /// Dropping the returned watch closes the stream; starting a new upload
    /// therefore cancels the old watch by dropping it.
    pub fn watch_progress(&self, asset: &AssetId) -> Result<ProgressWatch> {
        let url = self.config.endpoint(&["process", asset.as_str()])?;

        let response = self
            .sse
            .get(url)
            .send()
            .map_err(|e| MixerError::Progress(e.to_string()))?;

        if !response.status().is_success() {
            return Err(MixerError::Progress(format!(
                "Server answered {}",
                response.status()
            )));
        }

        let body: Box<dyn Read + Send> = Box::new(response);
        Ok(ProgressWatch {
            reader: BufReader::new(body),
            done: false,
        })
    }

    /// Relay a video-hosting URL's id through the service's extraction
    /// endpoint, yielding the audio bytes plus a suggested file name for
    /// `submit_bytes`: the video title the service ships in
    /// `Content-Disposition`, or `{video_id}.mp3` when absent.
    pub fn extract_video(&self, video_id: &str) -> Result<(Vec<u8>, String)> {
        let url = self.config.endpoint(&["youtube"])?;

        let response = self
            .client
            .post(url)
            .json(&serde_json::json!({ "videoId": video_id }))
            .send()
            .map_err(|e| MixerError::Extraction(e.to_string()))?;

        if !response.status().is_success() {
            return Err(MixerError::Extraction(format!(
                "Server answered {}",
                response.status()
            )));
        }

        let name =
            disposition_filename(&response).unwrap_or_else(|| format!("{video_id}.mp3"));

        let mut bytes = Vec::new();
        let mut response = response;
        response
            .read_to_end(&mut bytes)
            .map_err(|e| MixerError::Extraction(e.to_string()))?;
        Ok((bytes, name))
    }
}

/// `attachment; filename="My%20Song.mp3"` -> `My Song.mp3`
fn disposition_filename(response: &Response) -> Option<String> {
    let raw = response.headers().get(CONTENT_DISPOSITION)?.to_str().ok()?;
    let (_, value) = raw.split_once("filename=")?;
    let value = value.trim().trim_matches('"');
    let decoded = percent_decode_str(value).decode_utf8().ok()?;
    let name = decoded.trim();
    (!name.is_empty()).then(|| name.to_string())
}

/// Lazy sequence of progress events, terminal at 100 or on the first error.
///
/// After yielding an `Err` (or the 100% event) the iterator is fused: it
/// stops reading the socket and returns `None` forever.
pub struct ProgressWatch {
    reader: BufReader<Box<dyn Read + Send>>,
    done: bool,
}

impl Iterator for ProgressWatch {
    type Item = Result<ProgressEvent>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let mut line = String::new();
        loop {
            line.clear();
            match self.reader.read_line(&mut line) {
                Ok(0) => {
                    // Producer closed before reporting completion.
                    self.done = true;
                    return Some(Err(MixerError::Progress(
                        "Stream closed before processing finished".into(),
                    )));
                }
                Ok(_) => {}
                Err(e) => {
                    self.done = true;
                    return Some(Err(MixerError::Progress(e.to_string())));
                }
            }

            let Some(data) = line.trim_end().strip_prefix("data:") else {
                continue; // comment lines, event separators
            };

            match serde_json::from_str::<ProgressEvent>(data.trim()) {
                Ok(event) => {
                    if event.progress >= 100 {
                        self.done = true;
                    }
                    return Some(Ok(event));
                }
                Err(e) => {
                    self.done = true;
                    return Some(Err(MixerError::Progress(format!(
                        "Bad progress payload: {e}"
                    ))));
                }
            }
        }
    }
}
