use std::borrow::Cow;
use std::fs;
use std::path::Path;

use rayon::prelude::*;

use crate::models::error::MixerError;
use crate::models::render::{
    RenderFormat, RenderMetadata, RenderOutput, RenderRequest, RenderTrack, DEFAULT_RENDER_SAMPLE_RATE,
};
use crate::models::stems::StereoBuffer;
use crate::processing::lame::LameEncoder;
use crate::processing::pcm::{self, deinterleave, resample_stereo};
use crate::processing::wav_format::{self, WavSpec};
use crate::storage::metadata;
use crate::storage::wav_writer::{sha256_hex, WavFileWriter};
use crate::traits::block_encoder::BlockEncoder;

/// Frames mixed per parallel work item.
const MIX_CHUNK_FRAMES: usize = 4096;

/// The only rate compressed renders are encoded at.
pub const MP3_SAMPLE_RATE: u32 = DEFAULT_RENDER_SAMPLE_RATE;

/// Non-real-time mixdown of stems at static gains.
///
/// Stateless: every call depends only on its arguments, and identical
/// arguments always produce byte-identical PCM. Each output sample is the sum
/// of `sample * gain` over all tracks, clipped to 16 bits. Tracks shorter than
/// the render contribute silence past their end.
#[derive(Debug, Default, Clone, Copy)]
pub struct OfflineRenderer;

impl OfflineRenderer {
    pub fn new() -> Self {
        Self
    }

    /// Render a 16-bit stereo WAV container.
    pub fn render(
        &self,
        tracks: &[RenderTrack],
        duration_secs: f64,
        sample_rate: u32,
    ) -> Result<Vec<u8>, MixerError> {
        let pcm = self.mix(tracks, duration_secs, sample_rate)?;
        let spec = WavSpec::stereo_pcm16(sample_rate);
        let data_size = spec.data_size(pcm.len() / 2)?;

        let mut bytes = Vec::with_capacity(wav_format::WAV_HEADER_SIZE + data_size as usize);
        bytes.extend_from_slice(&wav_format::encode_header(&spec, data_size));
        for sample in &pcm {
            bytes.extend_from_slice(&sample.to_le_bytes());
        }

        log::info!(
            "Rendered WAV: {} tracks, {} frames at {} Hz, {} bytes",
            tracks.len(),
            pcm.len() / 2,
            sample_rate,
            bytes.len()
        );
        Ok(bytes)
    }

    /// Render the mix at 44.1 kHz and re-encode it as constant-bitrate MP3.
    pub fn render_compressed(
        &self,
        tracks: &[RenderTrack],
        duration_secs: f64,
        bitrate_kbps: u32,
    ) -> Result<Vec<u8>, MixerError> {
        let pcm = self.mix(tracks, duration_secs, MP3_SAMPLE_RATE)?;
        let mut encoder = LameEncoder::new(MP3_SAMPLE_RATE, bitrate_kbps)?;
        let bytes = encode_blocks(&mut encoder, &pcm)?;

        log::info!(
            "Rendered MP3: {} tracks, {} frames at {} kbps, {} bytes",
            tracks.len(),
            pcm.len() / 2,
            encoder.bitrate_kbps(),
            bytes.len()
        );
        Ok(bytes)
    }

    /// Render a request in memory and checksum the result.
    pub fn render_request(&self, request: &RenderRequest) -> Result<RenderOutput, MixerError> {
        check_request(request)?;
        let bytes = match request.format {
            RenderFormat::Wav => self.render(&request.tracks, request.duration_secs, request.sample_rate)?,
            RenderFormat::Mp3 => self.render_compressed(
                &request.tracks,
                request.duration_secs,
                request.bitrate_or_default(),
            )?,
        };

        Ok(RenderOutput {
            checksum: sha256_hex(&bytes),
            frames: frame_count(request.duration_secs, request.sample_rate)?,
            format: request.format,
            sample_rate: request.sample_rate,
            bytes,
        })
    }

    /// Render a request straight to `path` and write the metadata sidecar next to it.
    ///
    /// WAV output is streamed through a [`WavFileWriter`]; MP3 output is
    /// encoded in memory first.
    pub fn render_to_file(&self, request: &RenderRequest, path: &Path) -> Result<RenderMetadata, MixerError> {
        check_request(request)?;
        let checksum = match request.format {
            RenderFormat::Wav => {
                let pcm = self.mix(&request.tracks, request.duration_secs, request.sample_rate)?;
                let spec = WavSpec::stereo_pcm16(request.sample_rate);
                spec.data_size(pcm.len() / 2)?;

                let mut writer = WavFileWriter::new(path.to_path_buf());
                writer.open(&spec)?;
                for chunk in pcm.chunks(MIX_CHUNK_FRAMES * 2) {
                    let mut data = Vec::with_capacity(chunk.len() * 2);
                    for sample in chunk {
                        data.extend_from_slice(&sample.to_le_bytes());
                    }
                    writer.write(&data)?;
                }
                writer.close()?
            }
            RenderFormat::Mp3 => {
                let bytes = self.render_compressed(
                    &request.tracks,
                    request.duration_secs,
                    request.bitrate_or_default(),
                )?;
                if let Some(parent) = path.parent() {
                    fs::create_dir_all(parent)
                        .map_err(|e| MixerError::Storage(format!("failed to create directory: {}", e)))?;
                }
                fs::write(path, &bytes)
                    .map_err(|e| MixerError::Storage(format!("failed to write render: {}", e)))?;
                sha256_hex(&bytes)
            }
        };

        let meta = RenderMetadata::for_render(request, &checksum);
        metadata::write_metadata(&meta, path)?;
        log::info!("Render written to {} ({})", path.display(), checksum);
        Ok(meta)
    }

    /// Mix to interleaved 16-bit stereo samples.
    pub fn mix(
        &self,
        tracks: &[RenderTrack],
        duration_secs: f64,
        sample_rate: u32,
    ) -> Result<Vec<i16>, MixerError> {
        let frames = frame_count(duration_secs, sample_rate)?;
        for (i, track) in tracks.iter().enumerate() {
            if !track.gain.is_finite() {
                return Err(MixerError::Render(format!("track {} has a non-finite gain", i)));
            }
        }

        let sources: Vec<(Cow<'_, StereoBuffer>, f32)> = tracks
            .iter()
            .map(|t| (resample_stereo(&t.buffer, sample_rate), t.gain))
            .collect();

        let mut output = vec![0i16; frames * 2];
        output
            .par_chunks_mut(MIX_CHUNK_FRAMES * 2)
            .enumerate()
            .for_each(|(chunk_index, chunk)| {
                let first = chunk_index * MIX_CHUNK_FRAMES * 2;
                for (offset, out) in chunk.iter_mut().enumerate() {
                    let index = first + offset;
                    let mut sum = 0.0f32;
                    for (buffer, gain) in &sources {
                        if let Some(sample) = buffer.samples.get(index) {
                            sum += sample * gain;
                        }
                    }
                    *out = pcm::sample_to_i16(sum);
                }
            });

        Ok(output)
    }
}

/// Compressed renders are always encoded at [`MP3_SAMPLE_RATE`]; a request
/// describing any other rate would be mislabelled.
fn check_request(request: &RenderRequest) -> Result<(), MixerError> {
    if request.format == RenderFormat::Mp3 && request.sample_rate != MP3_SAMPLE_RATE {
        return Err(MixerError::Render(format!(
            "MP3 renders run at {} Hz, not {} Hz",
            MP3_SAMPLE_RATE, request.sample_rate
        )));
    }
    Ok(())
}

/// Number of frames covering `duration_secs`, rounded up.
pub fn frame_count(duration_secs: f64, sample_rate: u32) -> Result<usize, MixerError> {
    if !duration_secs.is_finite() || duration_secs < 0.0 {
        return Err(MixerError::Render(format!("invalid duration: {}", duration_secs)));
    }
    if sample_rate == 0 {
        return Err(MixerError::Render("sample rate must be positive".into()));
    }
    // Tolerate float noise so e.g. 10.0s at 44.1 kHz is exactly 441000 frames.
    let frames = (duration_secs * sample_rate as f64 - 1e-9).ceil().max(0.0);
    if frames > (u32::MAX / 4) as f64 {
        return Err(MixerError::Render(format!(
            "{}s at {} Hz exceeds the container size limit",
            duration_secs, sample_rate
        )));
    }
    Ok(frames as usize)
}

/// Feed interleaved stereo PCM to `encoder` block by block, then flush.
pub fn encode_blocks(encoder: &mut dyn BlockEncoder, pcm: &[i16]) -> Result<Vec<u8>, MixerError> {
    let (left, right) = deinterleave(pcm);
    let block = encoder.block_frames().max(1);

    let mut stream = Vec::new();
    for (l, r) in left.chunks(block).zip(right.chunks(block)) {
        let chunk = encoder.encode_block(l, r)?;
        if !chunk.is_empty() {
            stream.extend_from_slice(&chunk);
        }
    }
    stream.extend_from_slice(&encoder.flush()?);
    Ok(stream)
}
