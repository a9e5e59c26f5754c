//! Canonical 44-byte RIFF/WAVE header for 16-bit PCM.
//!
//! Layout:
//! ```text
//! [0-3]    "RIFF"
//! [4-7]    36 + data_size
//! [8-11]   "WAVE"
//! [12-15]  "fmt "
//! [16-19]  16 (fmt chunk size)
//! [20-21]  1 (PCM format tag)
//! [22-23]  channels
//! [24-27]  sample_rate
//! [28-31]  byte_rate = sample_rate * block_align
//! [32-33]  block_align = channels * bits_per_sample / 8
//! [34-35]  bits_per_sample
//! [36-39]  "data"
//! [40-43]  data_size = frames * block_align
//! ```

use crate::models::error::MixerError;

pub const WAV_HEADER_SIZE: usize = 44;
pub const PCM_FORMAT_TAG: u16 = 1;

/// Format of a PCM container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WavSpec {
    pub channels: u16,
    pub sample_rate: u32,
    pub bits_per_sample: u16,
}

impl WavSpec {
    /// Interleaved stereo 16-bit, the only layout the renderer emits.
    pub fn stereo_pcm16(sample_rate: u32) -> Self {
        Self {
            channels: 2,
            sample_rate,
            bits_per_sample: 16,
        }
    }

    pub fn block_align(&self) -> u16 {
        self.channels * (self.bits_per_sample / 8)
    }

    pub fn byte_rate(&self) -> u32 {
        self.sample_rate * self.block_align() as u32
    }

    /// Size of the data chunk for `frames` frames; fails when it cannot be
    /// represented in the header.
    pub fn data_size(&self, frames: usize) -> Result<u32, MixerError> {
        let size = frames as u64 * self.block_align() as u64;
        if size > (u32::MAX - 36) as u64 {
            return Err(MixerError::Render(format!(
                "{} frames exceed the WAV size limit",
                frames
            )));
        }
        Ok(size as u32)
    }
}

/// Header fields read back from a container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WavHeader {
    pub riff_size: u32,
    pub format_tag: u16,
    pub spec: WavSpec,
    pub byte_rate: u32,
    pub block_align: u16,
    pub data_size: u32,
}

impl WavHeader {
    pub fn frames(&self) -> u32 {
        if self.block_align == 0 {
            return 0;
        }
        self.data_size / self.block_align as u32
    }

    pub fn duration_secs(&self) -> f64 {
        if self.spec.sample_rate == 0 {
            return 0.0;
        }
        self.frames() as f64 / self.spec.sample_rate as f64
    }
}

pub fn encode_header(spec: &WavSpec, data_size: u32) -> [u8; WAV_HEADER_SIZE] {
    let mut header = [0u8; WAV_HEADER_SIZE];

    header[0..4].copy_from_slice(b"RIFF");
    header[4..8].copy_from_slice(&(36 + data_size).to_le_bytes());
    header[8..12].copy_from_slice(b"WAVE");

    header[12..16].copy_from_slice(b"fmt ");
    header[16..20].copy_from_slice(&16u32.to_le_bytes());
    header[20..22].copy_from_slice(&PCM_FORMAT_TAG.to_le_bytes());
    header[22..24].copy_from_slice(&spec.channels.to_le_bytes());
    header[24..28].copy_from_slice(&spec.sample_rate.to_le_bytes());
    header[28..32].copy_from_slice(&spec.byte_rate().to_le_bytes());
    header[32..34].copy_from_slice(&spec.block_align().to_le_bytes());
    header[34..36].copy_from_slice(&spec.bits_per_sample.to_le_bytes());

    header[36..40].copy_from_slice(b"data");
    header[40..44].copy_from_slice(&data_size.to_le_bytes());

    header
}

/// Rewrite the two size fields once the data length is known.
pub fn patch_data_size(header: &mut [u8], data_size: u32) {
    header[4..8].copy_from_slice(&(36 + data_size).to_le_bytes());
    header[40..44].copy_from_slice(&data_size.to_le_bytes());
}

pub fn parse_header(bytes: &[u8]) -> Result<WavHeader, MixerError> {
    if bytes.len() < WAV_HEADER_SIZE {
        return Err(MixerError::Storage(format!(
            "container too short: {} bytes",
            bytes.len()
        )));
    }
    if &bytes[0..4] != b"RIFF" || &bytes[8..12] != b"WAVE" {
        return Err(MixerError::Storage("missing RIFF/WAVE magic".into()));
    }
    if &bytes[12..16] != b"fmt " || &bytes[36..40] != b"data" {
        return Err(MixerError::Storage("not a canonical 44-byte header".into()));
    }

    let u16_at = |o: usize| u16::from_le_bytes([bytes[o], bytes[o + 1]]);
    let u32_at = |o: usize| u32::from_le_bytes([bytes[o], bytes[o + 1], bytes[o + 2], bytes[o + 3]]);

    Ok(WavHeader {
        riff_size: u32_at(4),
        format_tag: u16_at(20),
        spec: WavSpec {
            channels: u16_at(22),
            sample_rate: u32_at(24),
            bits_per_sample: u16_at(34),
        },
        byte_rate: u32_at(28),
        block_align: u16_at(32),
        data_size: u32_at(40),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_magic_and_size() {
        let header = encode_header(&WavSpec::stereo_pcm16(44100), 0);
        assert_eq!(header.len(), 44);
        assert_eq!(&header[0..4], b"RIFF");
        assert_eq!(&header[8..12], b"WAVE");
        assert_eq!(&header[12..16], b"fmt ");
        assert_eq!(&header[36..40], b"data");
    }

    #[test]
    fn header_fields_44k_stereo() {
        let header = encode_header(&WavSpec::stereo_pcm16(44100), 1_764_000);
        let parsed = parse_header(&header).unwrap();

        assert_eq!(parsed.format_tag, 1);
        assert_eq!(parsed.spec.channels, 2);
        assert_eq!(parsed.spec.sample_rate, 44100);
        assert_eq!(parsed.byte_rate, 176_400);
        assert_eq!(parsed.block_align, 4);
        assert_eq!(parsed.spec.bits_per_sample, 16);
        assert_eq!(parsed.data_size, 1_764_000);
        assert_eq!(parsed.riff_size, 1_764_000 + 36);
        assert_eq!(parsed.frames(), 441_000);
        assert_eq!(parsed.duration_secs(), 10.0);
    }

    #[test]
    fn patch_updates_both_sizes() {
        let mut header = encode_header(&WavSpec::stereo_pcm16(48000), 0);
        patch_data_size(&mut header, 19200);

        let parsed = parse_header(&header).unwrap();
        assert_eq!(parsed.data_size, 19200);
        assert_eq!(parsed.riff_size, 19200 + 36);
    }

    #[test]
    fn data_size_limit() {
        let spec = WavSpec::stereo_pcm16(44100);
        assert_eq!(spec.data_size(441_000).unwrap(), 1_764_000);
        assert!(spec.data_size(usize::MAX / 8).is_err());
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!(parse_header(&[0u8; 10]).is_err());
        assert!(parse_header(&[0u8; 44]).is_err());
    }
}
