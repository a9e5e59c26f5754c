use crate::models::error::MixerError;

/// Transport operations the video bridge is allowed to request.
pub trait PlaybackControl: Send + Sync {
    fn play(&self) -> Result<(), MixerError>;

    fn pause(&self);

    fn seek(&self, secs: f64);

    fn is_playing(&self) -> bool;

    /// Authoritative transport position in seconds.
    fn position(&self) -> f64;
}
