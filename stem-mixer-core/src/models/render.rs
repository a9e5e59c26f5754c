use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::stems::StereoBuffer;

/// Default offline render sample rate.
pub const DEFAULT_RENDER_SAMPLE_RATE: u32 = 44_100;

/// Default MP3 bitrate in kbps.
pub const DEFAULT_MP3_BITRATE_KBPS: u32 = 128;

/// Output container of an offline render.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RenderFormat {
    Wav,
    Mp3,
}

impl RenderFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Wav => "wav",
            Self::Mp3 => "mp3",
        }
    }
}

impl fmt::Display for RenderFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// One input of a mixdown: a decoded stem and the static gain it is mixed at.
#[derive(Debug, Clone)]
pub struct RenderTrack {
    pub label: Option<String>,
    pub buffer: Arc<StereoBuffer>,
    pub gain: f32,
}

impl RenderTrack {
    pub fn new(buffer: Arc<StereoBuffer>, gain: f32) -> Self {
        Self {
            label: None,
            buffer,
            gain,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}

/// Immutable description of a single render, consumed by the renderer.
#[derive(Debug, Clone)]
pub struct RenderRequest {
    pub tracks: Vec<RenderTrack>,
    pub duration_secs: f64,
    pub sample_rate: u32,
    pub format: RenderFormat,
    /// MP3 bitrate in kbps. Ignored for WAV.
    pub bitrate_kbps: Option<u32>,
}

impl RenderRequest {
    pub fn wav(tracks: Vec<RenderTrack>, duration_secs: f64, sample_rate: u32) -> Self {
        Self {
            tracks,
            duration_secs,
            sample_rate,
            format: RenderFormat::Wav,
            bitrate_kbps: None,
        }
    }

    pub fn mp3(tracks: Vec<RenderTrack>, duration_secs: f64, bitrate_kbps: u32) -> Self {
        Self {
            tracks,
            duration_secs,
            sample_rate: DEFAULT_RENDER_SAMPLE_RATE,
            format: RenderFormat::Mp3,
            bitrate_kbps: Some(bitrate_kbps),
        }
    }

    pub fn bitrate_or_default(&self) -> u32 {
        self.bitrate_kbps.unwrap_or(DEFAULT_MP3_BITRATE_KBPS)
    }
}

/// Bytes produced by a render together with what describes them.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderOutput {
    pub bytes: Vec<u8>,
    pub format: RenderFormat,
    pub frames: usize,
    pub sample_rate: u32,
    /// SHA-256 of `bytes`, lowercase hex.
    pub checksum: String,
}

/// Gain a track was rendered at, as recorded in the sidecar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderedTrack {
    pub label: Option<String>,
    pub gain: f32,
}

/// Sidecar describing a rendered mix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderMetadata {
    pub id: String,
    pub created_at: String,
    pub format: RenderFormat,
    pub sample_rate: u32,
    pub duration_secs: f64,
    pub bitrate_kbps: Option<u32>,
    pub tracks: Vec<RenderedTrack>,
    pub checksum: String,
}

impl RenderMetadata {
    pub fn for_render(request: &RenderRequest, checksum: &str) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            created_at: chrono::Utc::now().to_rfc3339(),
            format: request.format,
            sample_rate: request.sample_rate,
            duration_secs: request.duration_secs,
            bitrate_kbps: match request.format {
                RenderFormat::Mp3 => Some(request.bitrate_or_default()),
                RenderFormat::Wav => None,
            },
            tracks: request
                .tracks
                .iter()
                .map(|t| RenderedTrack {
                    label: t.label.clone(),
                    gain: t.gain,
                })
                .collect(),
            checksum: checksum.to_string(),
        }
    }
}
