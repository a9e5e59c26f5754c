//! Conversions between interleaved 16-bit PCM bytes and float stereo buffers.

use std::borrow::Cow;

use crate::models::stems::StereoBuffer;

/// Bytes per interleaved stereo 16-bit frame.
pub const BYTES_PER_FRAME: usize = 4;

/// Decode interleaved little-endian 16-bit stereo PCM.
///
/// Fails on an empty buffer or one that does not hold a whole number of frames.
pub fn decode_pcm16_stereo(bytes: &[u8], sample_rate: u32) -> Result<StereoBuffer, String> {
    if bytes.is_empty() {
        return Err("stem buffer is empty".into());
    }
    if bytes.len() % BYTES_PER_FRAME != 0 {
        return Err(format!(
            "stem buffer length {} is not a multiple of {} bytes",
            bytes.len(),
            BYTES_PER_FRAME
        ));
    }
    if sample_rate == 0 {
        return Err("sample rate must be positive".into());
    }

    let samples = bytes
        .chunks_exact(2)
        .map(|pair| i16_to_sample(i16::from_le_bytes([pair[0], pair[1]])))
        .collect();
    Ok(StereoBuffer::new(sample_rate, samples))
}

/// Encode float samples as little-endian 16-bit PCM, clipping to `[-1.0, 1.0]`.
pub fn encode_pcm16(samples: &[f32]) -> Vec<u8> {
    let mut data = Vec::with_capacity(samples.len() * 2);
    for &sample in samples {
        data.extend_from_slice(&sample_to_i16(sample).to_le_bytes());
    }
    data
}

/// Scale a float sample to 16 bits, truncating toward zero. Negative values
/// use the full `-32768` range, positive values stop at `32767`.
pub fn sample_to_i16(sample: f32) -> i16 {
    let s = if sample.is_nan() { 0.0 } else { sample.clamp(-1.0, 1.0) };
    if s < 0.0 {
        (s * 32768.0) as i16
    } else {
        (s * 32767.0) as i16
    }
}

/// Inverse of [`sample_to_i16`].
pub fn i16_to_sample(value: i16) -> f32 {
    if value < 0 {
        value as f32 / 32768.0
    } else {
        value as f32 / 32767.0
    }
}

/// Split interleaved stereo 16-bit samples into left and right channels.
pub fn deinterleave(samples: &[i16]) -> (Vec<i16>, Vec<i16>) {
    let frames = samples.len() / 2;
    let mut left = Vec::with_capacity(frames);
    let mut right = Vec::with_capacity(frames);
    for frame in samples.chunks_exact(2) {
        left.push(frame[0]);
        right.push(frame[1]);
    }
    (left, right)
}

/// Linear interpolation resampling of an interleaved stereo buffer.
///
/// Borrows the input unchanged when the rates already match.
pub fn resample_stereo(buffer: &StereoBuffer, target_rate: u32) -> Cow<'_, StereoBuffer> {
    if buffer.sample_rate == target_rate || buffer.sample_rate == 0 || buffer.is_empty() {
        return Cow::Borrowed(buffer);
    }

    let frame_count = buffer.frames();
    let ratio = target_rate as f64 / buffer.sample_rate as f64;
    let output_frames = (frame_count as f64 * ratio) as usize;
    let samples = &buffer.samples;

    let mut output = vec![0.0f32; output_frames * 2];
    for i in 0..output_frames {
        let source_index = i as f64 / ratio;
        let index = source_index as usize;
        let fraction = (source_index - index as f64) as f32;

        for ch in 0..2usize {
            output[i * 2 + ch] = if index + 1 < frame_count {
                samples[index * 2 + ch] * (1.0 - fraction) + samples[(index + 1) * 2 + ch] * fraction
            } else if index < frame_count {
                samples[index * 2 + ch]
            } else {
                0.0
            };
        }
    }
    Cow::Owned(StereoBuffer::new(target_rate, output))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn decode_interleaved_frames() {
        let mut bytes = Vec::new();
        for v in [0i16, i16::MAX, i16::MIN, -16384] {
            bytes.extend_from_slice(&v.to_le_bytes());
        }

        let buffer = decode_pcm16_stereo(&bytes, 44100).unwrap();

        assert_eq!(buffer.frames(), 2);
        assert_eq!(buffer.samples[0], 0.0);
        assert_eq!(buffer.samples[1], 1.0);
        assert_eq!(buffer.samples[2], -1.0);
        assert_abs_diff_eq!(buffer.samples[3], -0.5, epsilon = 1e-6);
    }

    #[test]
    fn decode_rejects_partial_frame() {
        assert!(decode_pcm16_stereo(&[0u8; 6], 44100).is_err());
        assert!(decode_pcm16_stereo(&[], 44100).is_err());
        assert!(decode_pcm16_stereo(&[0u8; 4], 0).is_err());
    }

    #[test]
    fn sample_conversion_clips() {
        assert_eq!(sample_to_i16(1.0), i16::MAX);
        assert_eq!(sample_to_i16(-1.0), i16::MIN);
        assert_eq!(sample_to_i16(2.5), i16::MAX);
        assert_eq!(sample_to_i16(-3.0), i16::MIN);
        assert_eq!(sample_to_i16(f32::NAN), 0);
    }

    #[test]
    fn sample_conversion_truncates_toward_zero() {
        assert_eq!(sample_to_i16(0.375), 12287);
        assert_eq!(sample_to_i16(-0.375), -12288);
        assert_eq!(sample_to_i16(0.5), 16383);
        assert_eq!(sample_to_i16(-0.5), -16384);
        assert_eq!(sample_to_i16(0.00002), 0);
        assert_eq!(sample_to_i16(-0.00002), 0);
    }

    #[test]
    fn pcm16_values_survive_decode_and_encode() {
        for v in [-32768i16, -16384, -1, 0, 32767] {
            assert_eq!(sample_to_i16(i16_to_sample(v)), v);
        }
        for v in [-12345i16, 1, 3, 12345] {
            let back = sample_to_i16(i16_to_sample(v)) as i32;
            assert!((back - v as i32).abs() <= 1, "{} came back as {}", v, back);
        }
    }

    #[test]
    fn deinterleave_splits_channels() {
        let (l, r) = deinterleave(&[1, 2, 3, 4, 5, 6]);
        assert_eq!(l, vec![1, 3, 5]);
        assert_eq!(r, vec![2, 4, 6]);
    }

    #[test]
    fn resample_same_rate_borrows() {
        let buffer = StereoBuffer::new(44100, vec![0.1, 0.2]);
        assert!(matches!(resample_stereo(&buffer, 44100), Cow::Borrowed(_)));
    }

    #[test]
    fn resample_upsample_doubles_frames() {
        let buffer = StereoBuffer::new(22050, vec![0.0, 0.0, 1.0, -1.0]);

        let out = resample_stereo(&buffer, 44100);

        assert_eq!(out.sample_rate, 44100);
        assert_eq!(out.frames(), 4);
        assert_abs_diff_eq!(out.samples[2], 0.5, epsilon = 1e-6);
        assert_abs_diff_eq!(out.samples[3], -0.5, epsilon = 1e-6);
    }
}
