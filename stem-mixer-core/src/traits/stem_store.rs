use crate::models::error::MixerError;
use crate::models::stems::StemSet;

/// Persistent storage collaborator for separated stems.
pub trait StemStore: Send + Sync {
    /// Look up a song by its job/song identifier. `Ok(None)` when unknown.
    fn load_song(&self, song_id: &str) -> Result<Option<StemSet>, MixerError>;

    fn save_song(&self, song_id: &str, stems: &StemSet) -> Result<(), MixerError>;
}
