use thiserror::Error;

use super::track::TrackName;

/// Errors produced by the playback and render core.
///
/// Per-track load failures (`TrackLoad`) never abort a load on their own;
/// they are recorded on the failing track. `BackgroundRecovery` is only ever
/// logged by the resilience monitor and is never returned to a caller.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MixerError {
    #[error("unsupported platform: {0}")]
    UnsupportedPlatform(String),

    #[error("failed to load {track} track: {reason}")]
    TrackLoad { track: TrackName, reason: String },

    #[error("no track could be loaded")]
    AllTracksFailed,

    #[error("playback failed to start: {0}")]
    PlaybackStart(String),

    #[error("background recovery failed: {0}")]
    BackgroundRecovery(String),

    #[error("render failed: {0}")]
    Render(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("invalid configuration: {0}")]
    Configuration(String),

    #[error("audio engine error: {0}")]
    Engine(String),
}

impl MixerError {
    /// Whether this error is surfaced to the user as the player's error string.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::TrackLoad { .. } | Self::BackgroundRecovery(_))
    }
}
