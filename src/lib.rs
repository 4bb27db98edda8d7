//! # stem-mixer-core
//!
//! Client for a remote audio stem-separation service: upload a source file,
//! watch the processing progress stream, fetch and decode the four separated
//! stems, play them back phase-locked with per-stem gain, and render a
//! deterministic stereo mixdown as 16-bit PCM WAV.

mod audio;
mod error;
mod loader;
mod mix;
mod net;
mod playback;
mod sink;
mod types;
mod upload;
mod wav;

pub use crate::{
    audio::{decode_audio, to_stereo, StereoChannels},
    error::{MixerError, Result},
    loader::TrackLoader,
    mix::mixdown,
    net::ServiceConfig,
    playback::{EngineState, PlaybackEngine},
    sink::{AudioSink, CpalSink, ManualDriver, ManualSink, RenderCallback},
    types::{
        clamp_gain, AssetId, Stem, StemMap, StereoBuffer, TrackBuffer, TransportState,
    },
    upload::{Orchestrator, ProgressEvent, ProgressWatch, MAX_UPLOAD_BYTES},
    wav::{encode_wav, encode_wav_channels},
};
