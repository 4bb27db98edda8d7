use std::io::Cursor;

use approx::assert_abs_diff_eq;
use stem_mixer_core::{encode_wav, encode_wav_channels, StereoBuffer};

fn read_samples(bytes: &[u8]) -> (hound::WavSpec, Vec<i16>) {
    let mut reader = hound::WavReader::new(Cursor::new(bytes)).expect("encoder output unreadable");
    let spec = reader.spec();
    let samples = reader
        .samples::<i16>()
        .collect::<Result<Vec<_>, _>>()
        .expect("bad sample data");
    (spec, samples)
}

/// Inverse of the encoder's asymmetric quantization.
fn dequantize(sample: i16) -> f32 {
    if sample < 0 {
        sample as f32 / 32768.0
    } else {
        sample as f32 / 32767.0
    }
}

#[test]
fn header_layout_is_riff_pcm16() {
    let buffer = StereoBuffer {
        sample_rate: 44100,
        left: vec![0.0; 10],
        right: vec![0.0; 10],
    };
    let bytes = encode_wav(&buffer);

    assert_eq!(&bytes[0..4], b"RIFF");
    assert_eq!(&bytes[8..12], b"WAVE");
    assert_eq!(&bytes[12..16], b"fmt ");
    // PCM format tag 1, 2 channels
    assert_eq!(u16::from_le_bytes([bytes[20], bytes[21]]), 1);
    assert_eq!(u16::from_le_bytes([bytes[22], bytes[23]]), 2);
    assert_eq!(
        u32::from_le_bytes([bytes[24], bytes[25], bytes[26], bytes[27]]),
        44100
    );
    // block align = channels * 2 bytes, bit depth 16
    assert_eq!(u16::from_le_bytes([bytes[32], bytes[33]]), 4);
    assert_eq!(u16::from_le_bytes([bytes[34], bytes[35]]), 16);
    assert_eq!(&bytes[36..40], b"data");
    assert_eq!(
        u32::from_le_bytes([bytes[40], bytes[41], bytes[42], bytes[43]]),
        10 * 4
    );
    assert_eq!(bytes.len(), 44 + 10 * 4);
}

#[test]
fn empty_buffer_encodes_to_bare_header() {
    let buffer = StereoBuffer::silent(48000, 0);
    let bytes = encode_wav(&buffer);
    assert_eq!(bytes.len(), 44);
    assert_eq!(
        u32::from_le_bytes([bytes[40], bytes[41], bytes[42], bytes[43]]),
        0
    );
}

#[test]
fn round_trip_within_quantization_error() {
    let frames = 1024;
    let mut buffer = StereoBuffer::silent(44100, frames);
    for i in 0..frames {
        let t = i as f32 / frames as f32;
        buffer.left[i] = (t * 97.0).sin() * 0.8;
        buffer.right[i] = (t * 31.0).cos() * 0.5 - 0.2;
    }

    let bytes = encode_wav(&buffer);
    let (spec, samples) = read_samples(&bytes);
    assert_eq!(spec.channels, 2);
    assert_eq!(spec.sample_rate, 44100);
    assert_eq!(samples.len(), frames * 2);

    for i in 0..frames {
        assert_abs_diff_eq!(
            dequantize(samples[2 * i]),
            buffer.left[i],
            epsilon = 1.0 / 32767.0
        );
        assert_abs_diff_eq!(
            dequantize(samples[2 * i + 1]),
            buffer.right[i],
            epsilon = 1.0 / 32767.0
        );
    }
}

#[test]
fn quantization_is_asymmetric_around_zero() {
    let buffer = StereoBuffer {
        sample_rate: 8000,
        left: vec![-1.0, 1.0, -0.5, 0.5],
        right: vec![0.0, 0.0, 0.0, 0.0],
    };
    let (_, samples) = read_samples(&encode_wav(&buffer));

    // negative scales by 32768, non-negative by 32767
    assert_eq!(samples[0], -32768);
    assert_eq!(samples[2], 32767);
    assert_eq!(samples[4], -16384);
    assert_eq!(samples[6], 16383);
}

#[test]
fn out_of_range_samples_are_clamped() {
    let buffer = StereoBuffer {
        sample_rate: 8000,
        left: vec![1.5, -2.0],
        right: vec![10.0, -10.0],
    };
    let (_, samples) = read_samples(&encode_wav(&buffer));
    assert_eq!(samples, vec![32767, 32767, -32768, -32768]);
}

#[test]
fn mono_channel_set_is_supported() {
    let left = vec![0.25f32; 7];
    let bytes = encode_wav_channels(&[left.as_slice()], 22050);
    let (spec, samples) = read_samples(&bytes);
    assert_eq!(spec.channels, 1);
    assert_eq!(samples.len(), 7);
}
