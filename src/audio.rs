use std::io::Cursor;

use symphonia::core::{
    audio::SampleBuffer, codecs::DecoderOptions, formats::FormatOptions, io::MediaSourceStream,
    meta::MetadataOptions, probe::Hint,
};
use symphonia::default::{get_codecs, get_probe};

use crate::error::{MixerError, Result};
use crate::types::TrackBuffer;

/// Decode a fetched byte stream (WAV or MPEG) into a planar sample buffer.
pub fn decode_audio(bytes: Vec<u8>) -> Result<TrackBuffer> {
    let mss = MediaSourceStream::new(Box::new(Cursor::new(bytes)), Default::default());

    let probed = get_probe()
        .format(
            &Hint::new(),
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| MixerError::Decode(format!("Unrecognized audio container: {e}")))?;

    let mut format = probed.format;
    let track = format
        .default_track()
        .ok_or_else(|| MixerError::Decode("No default track found".into()))?;

    let mut decoder = get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| MixerError::Decode(format!("Unsupported codec: {e}")))?;

    let mut interleaved: Vec<f32> = Vec::new();
    let mut sample_rate: u32 = 0;
    let mut channels: usize = 0;

    while let Ok(packet) = format.next_packet() {
        let decoded = decoder
            .decode(&packet)
            .map_err(|e| MixerError::Decode(format!("Packet decode failed: {e}")))?;
        sample_rate = decoded.spec().rate;
        channels = decoded.spec().channels.count();

        let mut buffer = SampleBuffer::<f32>::new(decoded.capacity() as u64, *decoded.spec());
        buffer.copy_interleaved_ref(decoded);
        interleaved.extend_from_slice(buffer.samples());
    }

    if channels == 0 || interleaved.is_empty() {
        return Err(MixerError::Decode("Decoded zero audio frames".into()));
    }

    tracing::debug!(sample_rate, channels, samples = interleaved.len(), "decoded audio");

    Ok(deinterleave(&interleaved, channels, sample_rate))
}

fn deinterleave(interleaved: &[f32], channels: usize, sample_rate: u32) -> TrackBuffer {
    let frames = interleaved.len() / channels;
    let mut planar = vec![Vec::with_capacity(frames); channels];
    for frame in interleaved.chunks_exact(channels) {
        for (ch, &sample) in frame.iter().enumerate() {
            planar[ch].push(sample);
        }
    }
    TrackBuffer {
        sample_rate,
        channels: planar,
    }
}

/// Fan an arbitrary channel layout out/down to stereo.
///
/// Mono duplicates into both sides; channels 0/1 map to L/R; any further
/// channels fold alternately into L and R. Applied identically by the live
/// playback graph and the offline mixdown so the two render the same image.
///
/// The output length is the first channel's length; other channels shorter
/// than that pad with silence, longer ones truncate.
pub fn to_stereo(buffer: &TrackBuffer) -> StereoChannels {
    let frames = buffer.frames();
    let mut left = vec![0.0f32; frames];
    let mut right = vec![0.0f32; frames];

    match buffer.channel_count() {
        0 => {}
        1 => {
            copy_prefix(&mut left, &buffer.channels[0]);
            copy_prefix(&mut right, &buffer.channels[0]);
        }
        _ => {
            copy_prefix(&mut left, &buffer.channels[0]);
            copy_prefix(&mut right, &buffer.channels[1]);
            for (ch, extra) in buffer.channels.iter().enumerate().skip(2) {
                let side = if ch % 2 == 0 { &mut left } else { &mut right };
                for (dst, &s) in side.iter_mut().zip(extra) {
                    *dst += s;
                }
            }
        }
    }

    StereoChannels { left, right }
}

fn copy_prefix(dst: &mut [f32], src: &[f32]) {
    let n = dst.len().min(src.len());
    dst[..n].copy_from_slice(&src[..n]);
}

/// Plain stereo sample pair, before any gain is applied.
#[derive(Clone, Debug)]
pub struct StereoChannels {
    pub left: Vec<f32>,
    pub right: Vec<f32>,
}

impl StereoChannels {
    pub fn frames(&self) -> usize {
        self.left.len()
    }
}
