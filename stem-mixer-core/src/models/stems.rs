use std::collections::BTreeMap;

use super::track::TrackName;

/// Decoded stereo audio, interleaved `[L0, R0, L1, R1, ...]` in `[-1.0, 1.0]`.
#[derive(Debug, Clone, PartialEq)]
pub struct StereoBuffer {
    pub sample_rate: u32,
    pub samples: Vec<f32>,
}

impl StereoBuffer {
    pub fn new(sample_rate: u32, samples: Vec<f32>) -> Self {
        Self { sample_rate, samples }
    }

    pub fn silent(sample_rate: u32, frames: usize) -> Self {
        Self {
            sample_rate,
            samples: vec![0.0; frames * 2],
        }
    }

    /// Number of stereo frames.
    pub fn frames(&self) -> usize {
        self.samples.len() / 2
    }

    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.frames() as f64 / self.sample_rate as f64
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// The four stems of one song as raw interleaved 16-bit little-endian stereo PCM.
///
/// A track without an entry is reported as a per-track load failure, not as a
/// failure of the whole set.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StemSet {
    pub song_id: Option<String>,
    pub title: Option<String>,
    pub sample_rate: u32,
    pub duration_secs: f64,
    pub stems: BTreeMap<TrackName, Vec<u8>>,
}

impl StemSet {
    pub fn new(sample_rate: u32, duration_secs: f64) -> Self {
        Self {
            sample_rate,
            duration_secs,
            ..Default::default()
        }
    }

    pub fn with_stem(mut self, track: TrackName, pcm: Vec<u8>) -> Self {
        self.stems.insert(track, pcm);
        self
    }

    pub fn stem(&self, track: TrackName) -> Option<&[u8]> {
        self.stems.get(&track).map(|v| v.as_slice())
    }
}
