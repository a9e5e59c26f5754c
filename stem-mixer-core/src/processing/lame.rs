use mp3lame_encoder::{Bitrate, Builder, DualPcm, Encoder, FlushNoGap, Quality};

use crate::models::error::MixerError;
use crate::traits::block_encoder::BlockEncoder;

/// Samples per channel in one MPEG-1 Layer III frame.
pub const MP3_BLOCK_FRAMES: usize = 1152;

/// Upper bound LAME documents for a flush.
const FLUSH_RESERVE: usize = 7200;

/// Stereo constant-bitrate MP3 encoder backed by LAME.
///
/// The stream carries no Xing/Info frame, so every frame header shows the
/// configured bitrate.
pub struct LameEncoder {
    encoder: Encoder,
    bitrate_kbps: u32,
}

impl LameEncoder {
    pub fn new(sample_rate: u32, bitrate_kbps: u32) -> Result<Self, MixerError> {
        let (bitrate, bitrate_kbps) = lame_bitrate(bitrate_kbps);
        let mut builder =
            Builder::new().ok_or_else(|| MixerError::Render("LAME encoder init failed".into()))?;

        builder
            .set_num_channels(2)
            .map_err(|e| MixerError::Render(format!("LAME set channels failed: {:?}", e)))?;
        builder
            .set_sample_rate(sample_rate)
            .map_err(|e| MixerError::Render(format!("LAME set sample rate failed: {:?}", e)))?;
        builder
            .set_brate(bitrate)
            .map_err(|e| MixerError::Render(format!("LAME set bitrate failed: {:?}", e)))?;
        builder
            .set_quality(Quality::Best)
            .map_err(|e| MixerError::Render(format!("LAME set quality failed: {:?}", e)))?;
        builder
            .set_to_write_vbr_tag(false)
            .map_err(|e| MixerError::Render(format!("LAME set tag failed: {:?}", e)))?;

        let encoder = builder
            .build()
            .map_err(|e| MixerError::Render(format!("LAME build failed: {:?}", e)))?;

        Ok(Self {
            encoder,
            bitrate_kbps,
        })
    }

    /// Bitrate actually encoded at, after snapping to a LAME bitrate.
    pub fn bitrate_kbps(&self) -> u32 {
        self.bitrate_kbps
    }
}

impl BlockEncoder for LameEncoder {
    fn block_frames(&self) -> usize {
        MP3_BLOCK_FRAMES
    }

    fn encode_block(&mut self, left: &[i16], right: &[i16]) -> Result<Vec<u8>, MixerError> {
        if left.len() != right.len() {
            return Err(MixerError::Render(format!(
                "channel length mismatch: {} vs {}",
                left.len(),
                right.len()
            )));
        }

        let mut chunk = Vec::with_capacity(mp3lame_encoder::max_required_buffer_size(left.len()));
        let written = self
            .encoder
            .encode(DualPcm { left, right }, chunk.spare_capacity_mut())
            .map_err(|e| MixerError::Render(format!("LAME encode failed: {:?}", e)))?;

        // SAFETY: the encoder initialised `written` bytes of spare capacity.
        unsafe {
            chunk.set_len(written);
        }
        Ok(chunk)
    }

    fn flush(&mut self) -> Result<Vec<u8>, MixerError> {
        let mut chunk = Vec::with_capacity(FLUSH_RESERVE);
        let written = self
            .encoder
            .flush::<FlushNoGap>(chunk.spare_capacity_mut())
            .map_err(|e| MixerError::Render(format!("LAME flush failed: {:?}", e)))?;

        // SAFETY: the encoder initialised `written` bytes of spare capacity.
        unsafe {
            chunk.set_len(written);
        }
        Ok(chunk)
    }
}

/// Nearest supported bitrate at or below `kbps` (96 kbps floor).
fn lame_bitrate(kbps: u32) -> (Bitrate, u32) {
    match kbps {
        0..=111 => (Bitrate::Kbps96, 96),
        112..=127 => (Bitrate::Kbps112, 112),
        128..=159 => (Bitrate::Kbps128, 128),
        160..=191 => (Bitrate::Kbps160, 160),
        192..=223 => (Bitrate::Kbps192, 192),
        224..=255 => (Bitrate::Kbps224, 224),
        256..=319 => (Bitrate::Kbps256, 256),
        _ => (Bitrate::Kbps320, 320),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bitrate_mapping() {
        assert!(matches!(lame_bitrate(64), (Bitrate::Kbps96, 96)));
        assert!(matches!(lame_bitrate(128), (Bitrate::Kbps128, 128)));
        assert!(matches!(lame_bitrate(200), (Bitrate::Kbps192, 192)));
        assert!(matches!(lame_bitrate(500), (Bitrate::Kbps320, 320)));
    }

    #[test]
    fn reports_snapped_bitrate() {
        assert_eq!(LameEncoder::new(44100, 200).unwrap().bitrate_kbps(), 192);
        assert_eq!(LameEncoder::new(44100, 128).unwrap().bitrate_kbps(), 128);
    }

    #[test]
    fn encodes_a_second_of_silence() {
        let mut encoder = LameEncoder::new(44100, 128).unwrap();
        let silence = vec![0i16; MP3_BLOCK_FRAMES];

        let mut stream = Vec::new();
        for _ in 0..40 {
            stream.extend(encoder.encode_block(&silence, &silence).unwrap());
        }
        stream.extend(encoder.flush().unwrap());

        assert!(!stream.is_empty());
    }

    #[test]
    fn rejects_mismatched_channels() {
        let mut encoder = LameEncoder::new(44100, 128).unwrap();
        assert!(encoder.encode_block(&[0; 4], &[0; 3]).is_err());
    }
}
