use std::fmt;

use serde::{Deserialize, Serialize};

/// One of the four separated stems of a song.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackName {
    Drums,
    Bass,
    Other,
    Vocals,
}

impl TrackName {
    /// All tracks in mixing order.
    pub const ALL: [TrackName; 4] = [Self::Drums, Self::Bass, Self::Other, Self::Vocals];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Drums => "drums",
            Self::Bass => "bass",
            Self::Other => "other",
            Self::Vocals => "vocals",
        }
    }

    /// Volume a track starts at before the user touches it. Vocals start muted.
    pub fn default_volume(&self) -> f64 {
        match self {
            Self::Vocals => 0.0,
            _ => 1.0,
        }
    }
}

impl fmt::Display for TrackName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TrackName {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "drums" => Ok(Self::Drums),
            "bass" => Ok(Self::Bass),
            "other" => Ok(Self::Other),
            "vocals" => Ok(Self::Vocals),
            other => Err(format!("unknown track: {}", other)),
        }
    }
}

/// Observable per-track state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackState {
    pub name: TrackName,
    /// Gain in `[0, 2]`.
    pub volume: f64,
    pub loaded: bool,
    pub error: Option<String>,
}

impl TrackState {
    pub fn new(name: TrackName, volume: f64) -> Self {
        Self {
            name,
            volume,
            loaded: false,
            error: None,
        }
    }
}
