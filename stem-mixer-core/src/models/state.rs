use serde::Serialize;

use super::track::{TrackName, TrackState};

/// Snapshot of the transport clock.
///
/// Invariant: `0 <= position_secs <= duration_secs`. `playing` is only ever
/// true while at least one track is loaded.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct TransportState {
    pub position_secs: f64,
    pub duration_secs: f64,
    pub playing: bool,
}

impl TransportState {
    pub fn stopped(duration_secs: f64) -> Self {
        Self {
            position_secs: 0.0,
            duration_secs,
            playing: false,
        }
    }
}

/// Running state of the platform audio engine.
///
/// ```text
/// running ⇄ suspended
///    ↓          ↓
///       closed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Running,
    Suspended,
    Closed,
}

impl EngineState {
    pub fn is_running(&self) -> bool {
        matches!(self, Self::Running)
    }
}

/// Video sync gate owned by `VideoSyncBridge`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SyncSession {
    /// A seek gesture on the video surface is in progress.
    pub is_user_seeking: bool,
    pub sync_enabled: bool,
}

/// Everything a UI needs to draw the player.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlayerSnapshot {
    pub is_loading: bool,
    pub is_playing: bool,
    pub current_time: f64,
    pub duration: f64,
    pub tracks: Vec<TrackState>,
    pub is_ready: bool,
    pub error: Option<String>,
    pub master_volume: f64,
    pub pitch_shift: f64,
}

impl PlayerSnapshot {
    pub fn track(&self, name: TrackName) -> Option<&TrackState> {
        self.tracks.iter().find(|t| t.name == name)
    }
}
