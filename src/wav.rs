//! PCM WAV encoding.
//!
//! The container is written by hand because the quantization rule must match
//! the service's web client exactly: samples are clamped to [-1, 1], negative
//! values scale by 32768 and non-negative by 32767. Off-the-shelf writers use
//! a single symmetric factor, which breaks round-trip fidelity tests.

use crate::types::StereoBuffer;

const HEADER_LEN: usize = 44;
const BYTES_PER_SAMPLE: usize = 2;
const PCM_FORMAT_TAG: u16 = 1;
const BIT_DEPTH: u16 = 16;

/// Encode a rendered stereo buffer as a 16-bit PCM WAV byte stream.
pub fn encode_wav(buffer: &StereoBuffer) -> Vec<u8> {
    encode_wav_channels(
        &[buffer.left.as_slice(), buffer.right.as_slice()],
        buffer.sample_rate,
    )
}

/// Encode any non-empty channel set as interleaved 16-bit PCM WAV.
///
/// Always succeeds for frame counts >= 0 and channel counts >= 1; channels
/// are assumed equal length (extra frames in longer channels are ignored).
pub fn encode_wav_channels(channels: &[&[f32]], sample_rate: u32) -> Vec<u8> {
    assert!(!channels.is_empty(), "WAV needs at least one channel");

    let num_channels = channels.len();
    let frames = channels.iter().map(|c| c.len()).min().unwrap_or(0);
    let block_align = num_channels * BYTES_PER_SAMPLE;
    let data_len = frames * block_align;

    let mut wav = Vec::with_capacity(HEADER_LEN + data_len);

    wav.extend_from_slice(b"RIFF");
    wav.extend_from_slice(&((36 + data_len) as u32).to_le_bytes());
    wav.extend_from_slice(b"WAVE");

    wav.extend_from_slice(b"fmt ");
    wav.extend_from_slice(&16u32.to_le_bytes());
    wav.extend_from_slice(&PCM_FORMAT_TAG.to_le_bytes());
    wav.extend_from_slice(&(num_channels as u16).to_le_bytes());
    wav.extend_from_slice(&sample_rate.to_le_bytes());
    wav.extend_from_slice(&(sample_rate * block_align as u32).to_le_bytes());
    wav.extend_from_slice(&(block_align as u16).to_le_bytes());
    wav.extend_from_slice(&BIT_DEPTH.to_le_bytes());

    wav.extend_from_slice(b"data");
    wav.extend_from_slice(&(data_len as u32).to_le_bytes());

    for i in 0..frames {
        for channel in channels {
            wav.extend_from_slice(&quantize(channel[i]).to_le_bytes());
        }
    }

    wav
}

/// Clamp to [-1, 1] and quantize asymmetrically around zero.
#[inline]
fn quantize(sample: f32) -> i16 {
    let s = sample.clamp(-1.0, 1.0);
    if s < 0.0 {
        (s * 32768.0) as i16
    } else {
        (s * 32767.0) as i16
    }
}
