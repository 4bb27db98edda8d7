//! Phase-locked playback of the four separated stems.
//!
//! All stems advance on one shared frame cursor, so they can never drift
//! apart; per-stem gain is an atomic parameter the render path reads live.
//! Starting playback, and seeking while playing, build a fresh node set
//! seeded at the transport position and install it atomically. At most one
//! node set is ever active, so a rebuild cannot leave ghost audio behind.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::audio::{to_stereo, StereoChannels};
use crate::error::{MixerError, Result};
use crate::loader::TrackLoader;
use crate::mix::mixdown;
use crate::sink::{AudioSink, CpalSink, RenderCallback};
use crate::types::{clamp_gain, AssetId, Stem, StemMap, StereoBuffer, TrackBuffer, TransportState};
use crate::wav::encode_wav;

/// Session state of the engine.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EngineState {
    /// No asset loaded.
    Idle,
    /// All four stem fetches in flight.
    Loading,
    /// Stems decoded, transport at rest.
    Ready,
    Playing,
    Paused,
    /// Transport reached the end; position is back at 0. Transient: any
    /// transport command settles the engine in `Paused` or `Playing`.
    Ended,
}

/// Live gain parameter, written by the UI side and read by the render path.
struct GainParam(AtomicU32);

impl GainParam {
    fn new(value: f32) -> Self {
        GainParam(AtomicU32::new(clamp_gain(value).to_bits()))
    }

    fn set(&self, value: f32) {
        self.0.store(clamp_gain(value).to_bits(), Ordering::Release);
    }

    fn get(&self) -> f32 {
        f32::from_bits(self.0.load(Ordering::Acquire))
    }
}

/// One stem's playback node: the fanned-out buffer plus its gain tap.
struct SourceNode {
    samples: Arc<StereoChannels>,
    gain: Arc<GainParam>,
}

/// The set of four nodes started at one logical instant.
struct NodeSet {
    sources: Vec<SourceNode>,
    end_frame: usize,
}

/// State shared with the render callback on the sink's thread.
struct MixState {
    active: Mutex<Option<NodeSet>>,
    /// Shared transport cursor, in frames.
    position: AtomicUsize,
    playing: AtomicBool,
    reached_end: AtomicBool,
}

impl MixState {
    fn new() -> Self {
        MixState {
            active: Mutex::new(None),
            position: AtomicUsize::new(0),
            playing: AtomicBool::new(false),
            reached_end: AtomicBool::new(false),
        }
    }

    fn render(&self, out: &mut [f32]) {
        out.fill(0.0);
        if !self.playing.load(Ordering::Acquire) {
            return;
        }

        let guard = self.active.lock();
        let Some(set) = guard.as_ref() else {
            return;
        };

        let mut pos = self.position.load(Ordering::Acquire);
        for frame in out.chunks_exact_mut(2) {
            if pos >= set.end_frame {
                self.playing.store(false, Ordering::Release);
                self.reached_end.store(true, Ordering::Release);
                break;
            }
            let (mut left, mut right) = (0.0f32, 0.0f32);
            for source in &set.sources {
                if pos < source.samples.frames() {
                    let gain = source.gain.get();
                    left += source.samples.left[pos] * gain;
                    right += source.samples.right[pos] * gain;
                }
            }
            frame[0] = left;
            frame[1] = right;
            pos += 1;
        }
        self.position.store(pos, Ordering::Release);
    }
}

struct LoadedAsset {
    asset: AssetId,
    sample_rate: u32,
    /// Longest stem; transport duration and mixdown length both use it.
    duration_frames: usize,
    stereo: StemMap<Arc<StereoChannels>>,
    buffers: StemMap<TrackBuffer>,
}

/// Owns the decoded stems, the gain parameters, and the shared transport.
pub struct PlaybackEngine<S: AudioSink = CpalSink> {
    sink: S,
    state: EngineState,
    loaded: Option<LoadedAsset>,
    gains: StemMap<Arc<GainParam>>,
    mix: Arc<MixState>,
    /// Rate the sink is currently started at, if any.
    sink_rate: Option<u32>,
}

impl PlaybackEngine<CpalSink> {
    /// Engine wired to the system's default output device.
    pub fn with_default_output() -> Self {
        PlaybackEngine::new(CpalSink::new())
    }
}

impl<S: AudioSink> PlaybackEngine<S> {
    pub fn new(sink: S) -> Self {
        PlaybackEngine {
            sink,
            state: EngineState::Idle,
            loaded: None,
            gains: StemMap::from_fn(|_| Arc::new(GainParam::new(1.0))),
            mix: Arc::new(MixState::new()),
            sink_rate: None,
        }
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    /// Fetch and install all four stems of an asset.
    ///
    /// Any previously loaded asset is released first; a failed load leaves
    /// the engine `Idle` with nothing playable (never partial playback).
    pub fn load(&mut self, loader: &TrackLoader, asset: &AssetId) -> Result<()> {
        self.release();
        self.state = EngineState::Loading;
        match loader.load_all(asset) {
            Ok(tracks) => self.attach_tracks(asset.clone(), tracks),
            Err(e) => {
                self.state = EngineState::Idle;
                Err(e)
            }
        }
    }

    /// Install already-decoded stems (local files, tests).
    pub fn attach_tracks(&mut self, asset: AssetId, tracks: StemMap<TrackBuffer>) -> Result<()> {
        let sample_rate = tracks.vocals.sample_rate;
        for (stem, buffer) in tracks.iter() {
            if buffer.sample_rate != sample_rate {
                return Err(MixerError::Decode(format!(
                    "Sample rate mismatch on {stem}: {} Hz vs {sample_rate} Hz",
                    buffer.sample_rate
                )));
            }
        }
        if sample_rate == 0 {
            return Err(MixerError::Decode("Stems carry no sample rate".into()));
        }

        self.release();

        let stereo = tracks.map(|_, buffer| Arc::new(to_stereo(buffer)));
        let duration_frames = tracks.iter().map(|(_, b)| b.frames()).max().unwrap_or(0);

        self.loaded = Some(LoadedAsset {
            asset,
            sample_rate,
            duration_frames,
            stereo,
            buffers: tracks,
        });
        self.mix.position.store(0, Ordering::Release);
        self.mix.reached_end.store(false, Ordering::Release);
        self.state = EngineState::Ready;
        Ok(())
    }

    /// Stop playback and drop the current asset's buffers and nodes.
    pub fn release(&mut self) {
        self.mix.playing.store(false, Ordering::Release);
        *self.mix.active.lock() = None;
        self.mix.position.store(0, Ordering::Release);
        self.mix.reached_end.store(false, Ordering::Release);
        self.loaded = None;
        if self.state != EngineState::Loading {
            self.state = EngineState::Idle;
        }
    }

    /// Start (or resume) playback from the current transport position.
    pub fn play(&mut self) -> Result<()> {
        self.observe_end();
        let loaded = self
            .loaded
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("No asset loaded"))?;

        if self.state == EngineState::Playing {
            return Ok(());
        }

        // The output stream is pinned to one rate; a new asset at a
        // different rate needs a fresh stream or it plays pitch-shifted.
        if self.sink_rate != Some(loaded.sample_rate) {
            self.sink.stop();
            self.sink_rate = None;
            let mix = Arc::clone(&self.mix);
            let render: RenderCallback = Box::new(move |out| mix.render(out));
            self.sink.start(loaded.sample_rate, render)?;
            self.sink_rate = Some(loaded.sample_rate);
        }

        let set = Self::build_node_set(loaded, &self.gains);
        {
            // Install and arm under one lock so every stem starts at the
            // same instant from the listener's perspective.
            let mut active = self.mix.active.lock();
            *active = Some(set);
            self.mix.reached_end.store(false, Ordering::Release);
            self.mix.playing.store(true, Ordering::Release);
        }
        self.state = EngineState::Playing;
        tracing::debug!(asset = %loaded.asset, "playback started");
        Ok(())
    }

    /// Stop all nodes, retaining the transport position.
    pub fn pause(&mut self) {
        self.observe_end();
        if self.state != EngineState::Playing {
            if self.state == EngineState::Ended {
                self.state = EngineState::Paused;
            }
            return;
        }
        self.mix.playing.store(false, Ordering::Release);
        *self.mix.active.lock() = None;
        self.state = EngineState::Paused;
    }

    /// Move the transport. While paused this only moves the cursor; while
    /// playing the node set is rebuilt at the new position in the same
    /// critical section, so there is no audible desync window.
    pub fn seek(&mut self, seconds: f64) {
        self.observe_end();
        let Some(loaded) = self.loaded.as_ref() else {
            return;
        };

        let frame = (seconds.max(0.0) * loaded.sample_rate as f64).round() as usize;
        let frame = frame.min(loaded.duration_frames);

        if self.state == EngineState::Playing {
            let set = Self::build_node_set(loaded, &self.gains);
            let mut active = self.mix.active.lock();
            self.mix.position.store(frame, Ordering::Release);
            *active = Some(set);
        } else {
            self.mix.position.store(frame, Ordering::Release);
            if self.state == EngineState::Ended {
                self.state = EngineState::Paused;
            }
        }
    }

    /// Set one stem's gain; applies live without interrupting playback.
    pub fn set_gain(&mut self, stem: Stem, gain: f32) {
        self.gains.get(stem).set(gain);
    }

    pub fn gain(&self, stem: Stem) -> f32 {
        self.gains.get(stem).get()
    }

    /// Snapshot of the shared transport clock.
    pub fn transport(&mut self) -> TransportState {
        self.observe_end();
        let duration = self.duration_seconds();
        let position = match self.loaded.as_ref() {
            Some(loaded) => {
                self.mix.position.load(Ordering::Acquire) as f64 / loaded.sample_rate as f64
            }
            None => 0.0,
        };
        TransportState {
            position_seconds: position.min(duration),
            is_playing: self.state == EngineState::Playing,
            duration_seconds: duration,
        }
    }

    /// Duration of the loaded asset: the longest stem.
    pub fn duration_seconds(&self) -> f64 {
        self.loaded.as_ref().map_or(0.0, |loaded| {
            loaded.duration_frames as f64 / loaded.sample_rate as f64
        })
    }

    /// Render the loaded stems offline at the current gain settings.
    pub fn mixdown(&self) -> Result<StereoBuffer> {
        let loaded = self
            .loaded
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("No asset loaded"))?;
        let gains = StemMap::from_fn(|stem| self.gains.get(stem).get());
        mixdown(&loaded.buffers, &gains)
    }

    /// Offline mixdown encoded as a WAV byte stream.
    pub fn export_wav(&self) -> Result<Vec<u8>> {
        Ok(encode_wav(&self.mixdown()?))
    }

    pub fn asset(&self) -> Option<&AssetId> {
        self.loaded.as_ref().map(|loaded| &loaded.asset)
    }

    fn build_node_set(loaded: &LoadedAsset, gains: &StemMap<Arc<GainParam>>) -> NodeSet {
        let sources = Stem::ALL
            .into_iter()
            .map(|stem| SourceNode {
                samples: Arc::clone(loaded.stereo.get(stem)),
                gain: Arc::clone(gains.get(stem)),
            })
            .collect();
        NodeSet {
            sources,
            end_frame: loaded.duration_frames,
        }
    }

    /// Fold an end-of-stream from the render path into the state machine:
    /// position resets to 0 and the engine settles out of `Playing`.
    fn observe_end(&mut self) {
        if self.mix.reached_end.swap(false, Ordering::AcqRel) {
            *self.mix.active.lock() = None;
            self.mix.position.store(0, Ordering::Release);
            if self.state == EngineState::Playing {
                self.state = EngineState::Ended;
            }
        }
    }
}

impl<S: AudioSink> Drop for PlaybackEngine<S> {
    fn drop(&mut self) {
        self.mix.playing.store(false, Ordering::Release);
        self.sink.stop();
    }
}
