//! Offline mixdown: render the four stems into one stereo buffer.

use crate::audio::to_stereo;
use crate::error::{MixerError, Result};
use crate::types::{clamp_gain, StemMap, StereoBuffer, TrackBuffer};

/// Render the stems into a single stereo buffer at the given gains.
///
/// The output length is the longest stem, so slightly different decoded
/// lengths never truncate audible material; shorter stems contribute
/// silence past their end. The render is synchronous and deterministic:
/// identical buffers and gains produce byte-identical output.
pub fn mixdown(tracks: &StemMap<TrackBuffer>, gains: &StemMap<f32>) -> Result<StereoBuffer> {
    let sample_rate = tracks.vocals.sample_rate;
    for (stem, buffer) in tracks.iter() {
        if buffer.sample_rate != sample_rate {
            return Err(MixerError::Decode(format!(
                "Cannot mix {stem} at {} Hz into a {sample_rate} Hz render",
                buffer.sample_rate
            )));
        }
    }
    if sample_rate == 0 {
        return Err(MixerError::Decode("Stems carry no sample rate".into()));
    }

    let frames = tracks.iter().map(|(_, b)| b.frames()).max().unwrap_or(0);
    let mut out = StereoBuffer::silent(sample_rate, frames);

    for (stem, buffer) in tracks.iter() {
        let gain = clamp_gain(*gains.get(stem));
        if gain == 0.0 {
            continue;
        }
        let stereo = to_stereo(buffer);
        for i in 0..stereo.frames() {
            out.left[i] += stereo.left[i] * gain;
            out.right[i] += stereo.right[i] * gain;
        }
    }

    Ok(out)
}
