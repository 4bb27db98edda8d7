//! Output seam for live playback.
//!
//! The engine renders interleaved stereo on demand through a pull callback;
//! the sink decides what pulls it. `CpalSink` feeds the default output
//! device, `ManualSink` hands the pump to the caller for headless use.

use std::sync::Arc;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use parking_lot::Mutex;

use crate::error::Result;

/// Fills an interleaved stereo `f32` slice with the next frames.
pub type RenderCallback = Box<dyn FnMut(&mut [f32]) + Send + 'static>;

pub trait AudioSink {
    /// Begin pulling frames at the given rate. Replaces any previous callback.
    fn start(&mut self, sample_rate: u32, render: RenderCallback) -> Result<()>;

    /// Stop pulling; the callback is dropped.
    fn stop(&mut self);
}

/// Live output through the system's default device.
#[derive(Default)]
pub struct CpalSink {
    stream: Option<cpal::Stream>,
}

impl CpalSink {
    pub fn new() -> Self {
        CpalSink { stream: None }
    }
}

impl AudioSink for CpalSink {
    fn start(&mut self, sample_rate: u32, mut render: RenderCallback) -> Result<()> {
        self.stop();

        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| anyhow::anyhow!("No default audio output device"))?;

        let config = cpal::StreamConfig {
            channels: 2,
            sample_rate: cpal::SampleRate(sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };

        let stream = device
            .build_output_stream(
                &config,
                move |data: &mut [f32], _| render(data),
                |err| tracing::error!(%err, "output stream error"),
                None,
            )
            .map_err(anyhow::Error::from)?;
        stream.play().map_err(anyhow::Error::from)?;

        self.stream = Some(stream);
        Ok(())
    }

    fn stop(&mut self) {
        self.stream = None;
    }
}

/// A sink pumped by the caller instead of an audio device.
pub struct ManualSink {
    shared: Arc<Mutex<Option<RenderCallback>>>,
}

impl ManualSink {
    /// The driver half stays with the caller and pulls frames on demand.
    pub fn new() -> (Self, ManualDriver) {
        let shared = Arc::new(Mutex::new(None));
        (
            ManualSink {
                shared: Arc::clone(&shared),
            },
            ManualDriver { shared },
        )
    }
}

impl AudioSink for ManualSink {
    fn start(&mut self, _sample_rate: u32, render: RenderCallback) -> Result<()> {
        *self.shared.lock() = Some(render);
        Ok(())
    }

    fn stop(&mut self) {
        *self.shared.lock() = None;
    }
}

#[derive(Clone)]
pub struct ManualDriver {
    shared: Arc<Mutex<Option<RenderCallback>>>,
}

impl ManualDriver {
    /// Render the next `out.len() / 2` frames. Returns false when no
    /// callback is installed (engine not started).
    pub fn pull(&self, out: &mut [f32]) -> bool {
        let mut guard = self.shared.lock();
        match guard.as_mut() {
            Some(render) => {
                render(out);
                true
            }
            None => {
                out.fill(0.0);
                false
            }
        }
    }
}
