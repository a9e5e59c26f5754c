use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::models::error::MixerError;
use crate::models::stems::StemSet;
use crate::models::track::TrackName;
use crate::traits::stem_store::StemStore;

const MANIFEST_FILE: &str = "song.json";

/// `song.json` inside a song directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SongManifest {
    pub song_id: String,
    #[serde(default)]
    pub title: Option<String>,
    pub sample_rate: u32,
    pub duration_secs: f64,
    pub tracks: Vec<TrackName>,
}

/// Stem store backed by one directory per song.
///
/// ```text
/// <root>/<song_id>/song.json
/// <root>/<song_id>/drums.pcm
/// <root>/<song_id>/bass.pcm
/// <root>/<song_id>/other.pcm
/// <root>/<song_id>/vocals.pcm
/// ```
///
/// A track listed in the manifest whose `.pcm` file is missing is left out of
/// the returned set, so it fails on its own when loaded.
#[derive(Debug, Clone)]
pub struct DirectoryStemStore {
    root: PathBuf,
}

impl DirectoryStemStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn song_dir(&self, song_id: &str) -> Result<PathBuf, MixerError> {
        if song_id.is_empty()
            || song_id == "."
            || song_id == ".."
            || song_id.contains(['/', '\\'])
        {
            return Err(MixerError::Storage(format!("invalid song id: {:?}", song_id)));
        }
        Ok(self.root.join(song_id))
    }

    pub fn read_manifest(&self, song_id: &str) -> Result<Option<SongManifest>, MixerError> {
        let path = self.song_dir(song_id)?.join(MANIFEST_FILE);
        let json = match fs::read_to_string(&path) {
            Ok(json) => json,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(MixerError::Storage(format!("failed to read {}: {}", path.display(), e))),
        };
        let manifest = serde_json::from_str(&json)
            .map_err(|e| MixerError::Storage(format!("failed to parse {}: {}", path.display(), e)))?;
        Ok(Some(manifest))
    }
}

impl StemStore for DirectoryStemStore {
    fn load_song(&self, song_id: &str) -> Result<Option<StemSet>, MixerError> {
        let Some(manifest) = self.read_manifest(song_id)? else {
            return Ok(None);
        };
        let dir = self.song_dir(song_id)?;

        let mut stems = StemSet::new(manifest.sample_rate, manifest.duration_secs);
        stems.song_id = Some(manifest.song_id);
        stems.title = manifest.title;

        for track in manifest.tracks {
            let path = dir.join(format!("{}.pcm", track));
            match fs::read(&path) {
                Ok(pcm) => {
                    stems.stems.insert(track, pcm);
                }
                Err(e) => log::warn!("Stem {} unavailable for {}: {}", track, song_id, e),
            }
        }
        log::debug!("Loaded {} stems for song {}", stems.stems.len(), song_id);
        Ok(Some(stems))
    }

    fn save_song(&self, song_id: &str, stems: &StemSet) -> Result<(), MixerError> {
        let dir = self.song_dir(song_id)?;
        fs::create_dir_all(&dir)
            .map_err(|e| MixerError::Storage(format!("failed to create directory: {}", e)))?;

        for (track, pcm) in &stems.stems {
            fs::write(dir.join(format!("{}.pcm", track)), pcm)
                .map_err(|e| MixerError::Storage(format!("failed to write {} stem: {}", track, e)))?;
        }

        let manifest = SongManifest {
            song_id: song_id.to_string(),
            title: stems.title.clone(),
            sample_rate: stems.sample_rate,
            duration_secs: stems.duration_secs,
            tracks: stems.stems.keys().copied().collect(),
        };
        let json = serde_json::to_string_pretty(&manifest)
            .map_err(|e| MixerError::Storage(format!("failed to serialize manifest: {}", e)))?;
        fs::write(dir.join(MANIFEST_FILE), json)
            .map_err(|e| MixerError::Storage(format!("failed to write manifest: {}", e)))?;

        log::info!("Saved song {} ({} stems)", song_id, stems.stems.len());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_store() -> DirectoryStemStore {
        DirectoryStemStore::new(std::env::temp_dir().join(format!("stem_store_{}", uuid::Uuid::new_v4())))
    }

    #[test]
    fn save_and_load() {
        let store = temp_store();
        let mut stems = StemSet::new(44100, 1.5)
            .with_stem(TrackName::Drums, vec![1, 0, 2, 0])
            .with_stem(TrackName::Vocals, vec![3, 0, 4, 0]);
        stems.title = Some("Demo".into());

        store.save_song("job-42", &stems).unwrap();
        let loaded = store.load_song("job-42").unwrap().unwrap();

        assert_eq!(loaded.song_id.as_deref(), Some("job-42"));
        assert_eq!(loaded.title.as_deref(), Some("Demo"));
        assert_eq!(loaded.sample_rate, 44100);
        assert_eq!(loaded.stem(TrackName::Drums), Some(&[1u8, 0, 2, 0][..]));
        assert_eq!(loaded.stem(TrackName::Bass), None);

        fs::remove_dir_all(store.root()).ok();
    }

    #[test]
    fn unknown_song_is_none() {
        let store = temp_store();
        assert_eq!(store.load_song("missing").unwrap(), None);
    }

    #[test]
    fn missing_pcm_file_is_left_out() {
        let store = temp_store();
        let stems = StemSet::new(8000, 0.1)
            .with_stem(TrackName::Bass, vec![0; 8])
            .with_stem(TrackName::Other, vec![0; 8]);
        store.save_song("partial", &stems).unwrap();
        fs::remove_file(store.root().join("partial").join("other.pcm")).unwrap();

        let loaded = store.load_song("partial").unwrap().unwrap();

        assert!(loaded.stem(TrackName::Bass).is_some());
        assert!(loaded.stem(TrackName::Other).is_none());

        fs::remove_dir_all(store.root()).ok();
    }

    #[test]
    fn rejects_path_traversal() {
        let store = temp_store();
        assert!(store.load_song("../etc").is_err());
        assert!(store.load_song("").is_err());
    }
}
