use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// One of the four separated stems produced by the service.
///
/// The set is closed: the remote separator always yields exactly these
/// four tracks per asset.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stem {
    Vocals,
    Drums,
    Bass,
    Other,
}

impl Stem {
    pub const ALL: [Stem; 4] = [Stem::Vocals, Stem::Drums, Stem::Bass, Stem::Other];

    pub fn as_str(&self) -> &'static str {
        match self {
            Stem::Vocals => "vocals",
            Stem::Drums => "drums",
            Stem::Bass => "bass",
            Stem::Other => "other",
        }
    }
}

impl fmt::Display for Stem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Stem {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "vocals" => Ok(Stem::Vocals),
            "drums" => Ok(Stem::Drums),
            "bass" => Ok(Stem::Bass),
            "other" => Ok(Stem::Other),
            other => Err(format!("Unknown stem `{other}`")),
        }
    }
}

/// One value per stem.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct StemMap<T> {
    pub vocals: T,
    pub drums: T,
    pub bass: T,
    pub other: T,
}

impl<T> StemMap<T> {
    pub fn get(&self, stem: Stem) -> &T {
        match stem {
            Stem::Vocals => &self.vocals,
            Stem::Drums => &self.drums,
            Stem::Bass => &self.bass,
            Stem::Other => &self.other,
        }
    }

    pub fn get_mut(&mut self, stem: Stem) -> &mut T {
        match stem {
            Stem::Vocals => &mut self.vocals,
            Stem::Drums => &mut self.drums,
            Stem::Bass => &mut self.bass,
            Stem::Other => &mut self.other,
        }
    }

    pub fn from_fn(mut f: impl FnMut(Stem) -> T) -> Self {
        StemMap {
            vocals: f(Stem::Vocals),
            drums: f(Stem::Drums),
            bass: f(Stem::Bass),
            other: f(Stem::Other),
        }
    }

    pub fn map<U>(&self, mut f: impl FnMut(Stem, &T) -> U) -> StemMap<U> {
        StemMap {
            vocals: f(Stem::Vocals, &self.vocals),
            drums: f(Stem::Drums, &self.drums),
            bass: f(Stem::Bass, &self.bass),
            other: f(Stem::Other, &self.other),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (Stem, &T)> {
        Stem::ALL.into_iter().map(move |s| (s, self.get(s)))
    }
}

impl StemMap<f32> {
    /// Unit gain for every stem.
    pub fn unity() -> Self {
        StemMap::from_fn(|_| 1.0)
    }
}

/// Gains outside [0, 1] are clamped rather than rejected; 0 is silence,
/// 1 is unattenuated passthrough.
pub fn clamp_gain(gain: f32) -> f32 {
    if gain.is_nan() {
        return 0.0;
    }
    gain.clamp(0.0, 1.0)
}

/// A decoded multi-channel sample buffer for one stem.
///
/// Samples are planar, one `Vec<f32>` per channel, nominally in [-1, 1].
#[derive(Clone, Debug, PartialEq)]
pub struct TrackBuffer {
    pub sample_rate: u32,
    pub channels: Vec<Vec<f32>>,
}

impl TrackBuffer {
    pub fn frames(&self) -> usize {
        self.channels.first().map_or(0, Vec::len)
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    pub fn duration_seconds(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.frames() as f64 / self.sample_rate as f64
    }
}

/// A two-channel planar buffer, the fixed output shape of the mix graph.
#[derive(Clone, Debug, PartialEq)]
pub struct StereoBuffer {
    pub sample_rate: u32,
    pub left: Vec<f32>,
    pub right: Vec<f32>,
}

impl StereoBuffer {
    pub fn silent(sample_rate: u32, frames: usize) -> Self {
        StereoBuffer {
            sample_rate,
            left: vec![0.0; frames],
            right: vec![0.0; frames],
        }
    }

    pub fn frames(&self) -> usize {
        self.left.len()
    }

    pub fn duration_seconds(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.frames() as f64 / self.sample_rate as f64
    }
}

/// The shared transport clock, a single instance across all four stems.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct TransportState {
    pub position_seconds: f64,
    pub is_playing: bool,
    pub duration_seconds: f64,
}

/// Name of a processed asset on the remote service.
///
/// Uploads are namespaced as `{provider_account_id}_{filename}`; the audio
/// endpoint is keyed on the name with its extension stripped.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AssetId(String);

impl AssetId {
    pub fn new(name: impl Into<String>) -> Self {
        AssetId(name.into())
    }

    pub fn namespaced(provider_account_id: &str, filename: &str) -> Self {
        AssetId(format!("{provider_account_id}_{filename}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Name with the trailing extension removed, as used by the audio endpoint.
    pub fn basename(&self) -> &str {
        match self.0.rsplit_once('.') {
            Some((base, ext)) if !base.is_empty() && !ext.contains('/') => base,
            _ => &self.0,
        }
    }

    /// User-facing title: the namespace prefix up to the first `_` stripped.
    pub fn display_name(&self) -> &str {
        match self.0.split_once('_') {
            Some((_, rest)) if !rest.is_empty() => rest,
            _ => &self.0,
        }
    }

    /// File name for the exported mixdown.
    pub fn mixdown_filename(&self) -> String {
        format!("{}_mixed.wav", self.basename())
    }
}

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
