use std::fs;
use std::path::{Path, PathBuf};

use crate::models::error::MixerError;
use crate::models::render::RenderMetadata;

/// Sidecar path for a rendered file: `mix.wav` → `mix.metadata.json`.
pub fn metadata_path(render_path: &Path) -> PathBuf {
    render_path.with_extension("metadata.json")
}

/// Write render metadata as a JSON sidecar file.
pub fn write_metadata(metadata: &RenderMetadata, render_path: &Path) -> Result<(), MixerError> {
    let json = serde_json::to_string_pretty(metadata)
        .map_err(|e| MixerError::Storage(format!("failed to serialize metadata: {}", e)))?;
    fs::write(metadata_path(render_path), json)
        .map_err(|e| MixerError::Storage(format!("failed to write metadata: {}", e)))?;
    Ok(())
}

pub fn read_metadata(render_path: &Path) -> Result<RenderMetadata, MixerError> {
    let json = fs::read_to_string(metadata_path(render_path))
        .map_err(|e| MixerError::Storage(format!("failed to read metadata: {}", e)))?;
    serde_json::from_str(&json).map_err(|e| MixerError::Storage(format!("failed to parse metadata: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::render::{RenderFormat, RenderedTrack};

    #[test]
    fn sidecar_next_to_render() {
        assert_eq!(
            metadata_path(Path::new("/tmp/out/mix.wav")),
            PathBuf::from("/tmp/out/mix.metadata.json")
        );
    }

    #[test]
    fn write_and_read_back() {
        let dir = std::env::temp_dir().join(format!("stem_mixer_meta_{}", uuid::Uuid::new_v4()));
        fs::create_dir_all(&dir).unwrap();
        let render_path = dir.join("mix.mp3");
        let metadata = RenderMetadata {
            id: "render-1".into(),
            created_at: "2026-01-01T00:00:00Z".into(),
            format: RenderFormat::Mp3,
            sample_rate: 44100,
            duration_secs: 12.5,
            bitrate_kbps: Some(192),
            tracks: vec![RenderedTrack {
                label: Some("bass".into()),
                gain: 0.8,
            }],
            checksum: "00".into(),
        };

        write_metadata(&metadata, &render_path).unwrap();
        let json = fs::read_to_string(dir.join("mix.metadata.json")).unwrap();
        assert!(json.contains("\"format\": \"mp3\""));
        assert_eq!(read_metadata(&render_path).unwrap(), metadata);

        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn missing_sidecar_is_storage_error() {
        let result = read_metadata(Path::new("/nonexistent/mix.wav"));
        assert!(matches!(result, Err(MixerError::Storage(_))));
    }
}
