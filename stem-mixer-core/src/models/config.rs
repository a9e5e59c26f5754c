use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::error::MixerError;
use super::track::TrackName;

/// Tunables for live playback.
///
/// Every field has a default, so a partial JSON document is enough to
/// override a single value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MixerConfiguration {
    /// Starting gain per track, `[0, 2]`.
    pub default_volumes: BTreeMap<TrackName, f64>,

    /// Starting master gain, `[0, 1]`.
    pub master_volume: f64,

    /// Length of the linear ramp applied to gain changes (default: 50ms).
    pub gain_ramp_ms: u64,

    /// Video/transport divergence that triggers a drift correction (default: 0.3s).
    pub drift_threshold_secs: f64,

    /// Time-display poll period while the host surface is hidden (default: 100ms).
    pub hidden_poll_interval_ms: u64,

    /// Recovery loop period while hidden and playing (default: 200ms).
    pub recovery_interval_ms: u64,

    /// Frequency of the keep-alive tone (default: 1 Hz, inaudible).
    pub keep_alive_frequency_hz: f64,

    /// Gain of the keep-alive tone (default: 0.001).
    pub keep_alive_gain: f64,

    /// Analysis window of the shared pitch stage (default: 0.05s).
    pub pitch_window_secs: f64,
}

impl MixerConfiguration {
    pub fn validate(&self) -> Result<(), String> {
        for (track, volume) in &self.default_volumes {
            if !(0.0..=2.0).contains(volume) {
                return Err(format!("default volume for {} out of range: {}", track, volume));
            }
        }
        if !(0.0..=1.0).contains(&self.master_volume) {
            return Err(format!("master volume out of range: {}", self.master_volume));
        }
        if !(self.drift_threshold_secs > 0.0) {
            return Err("drift threshold must be positive".into());
        }
        if self.hidden_poll_interval_ms == 0 || self.recovery_interval_ms == 0 {
            return Err("timer intervals must be non-zero".into());
        }
        if !(self.keep_alive_frequency_hz > 0.0) {
            return Err("keep-alive frequency must be positive".into());
        }
        if !(0.0..=1.0).contains(&self.keep_alive_gain) {
            return Err(format!("keep-alive gain out of range: {}", self.keep_alive_gain));
        }
        if !(self.pitch_window_secs > 0.0) {
            return Err("pitch window must be positive".into());
        }
        Ok(())
    }

    pub fn from_json_str(json: &str) -> Result<Self, MixerError> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| MixerError::Configuration(e.to_string()))?;
        config.validate().map_err(MixerError::Configuration)?;
        Ok(config)
    }

    pub fn from_path(path: &Path) -> Result<Self, MixerError> {
        let json = std::fs::read_to_string(path)
            .map_err(|e| MixerError::Storage(format!("failed to read configuration: {}", e)))?;
        Self::from_json_str(&json)
    }

    pub fn default_volume(&self, track: TrackName) -> f64 {
        self.default_volumes
            .get(&track)
            .copied()
            .unwrap_or_else(|| track.default_volume())
    }

    pub fn gain_ramp(&self) -> Duration {
        Duration::from_millis(self.gain_ramp_ms)
    }

    pub fn hidden_poll_interval(&self) -> Duration {
        Duration::from_millis(self.hidden_poll_interval_ms)
    }

    pub fn recovery_interval(&self) -> Duration {
        Duration::from_millis(self.recovery_interval_ms)
    }
}

impl Default for MixerConfiguration {
    fn default() -> Self {
        Self {
            default_volumes: TrackName::ALL
                .iter()
                .map(|t| (*t, t.default_volume()))
                .collect(),
            master_volume: 1.0,
            gain_ramp_ms: 50,
            drift_threshold_secs: 0.3,
            hidden_poll_interval_ms: 100,
            recovery_interval_ms: 200,
            keep_alive_frequency_hz: 1.0,
            keep_alive_gain: 0.001,
            pitch_window_secs: 0.05,
        }
    }
}
