use std::collections::BTreeMap;
use std::sync::Arc;

use rayon::prelude::*;

use crate::models::config::MixerConfiguration;
use crate::models::error::MixerError;
use crate::models::stems::{StemSet, StereoBuffer};
use crate::models::track::{TrackName, TrackState};
use crate::processing::pcm;
use crate::traits::audio_engine::{AudioEngine, NodeId};

/// Engine nodes of one loaded song.
#[derive(Debug)]
struct MixGraph {
    master: NodeId,
    pitch: NodeId,
    tracks: BTreeMap<TrackName, NodeId>,
}

/// Per-track gain, the shared pitch stage and the master gain.
///
/// Owns the playable graph of the current song. Volumes survive reloads:
/// a new song starts every track at its last-known gain.
pub struct TrackMixer {
    engine: Arc<dyn AudioEngine>,
    config: MixerConfiguration,
    tracks: BTreeMap<TrackName, TrackState>,
    graph: Option<MixGraph>,
    pitch_shift: f64,
    master_volume: f64,
}

impl TrackMixer {
    pub fn new(engine: Arc<dyn AudioEngine>, config: MixerConfiguration) -> Self {
        let tracks = TrackName::ALL
            .iter()
            .map(|t| (*t, TrackState::new(*t, config.default_volume(*t).clamp(0.0, 2.0))))
            .collect();
        let master_volume = config.master_volume.clamp(0.0, 1.0);
        Self {
            engine,
            config,
            tracks,
            graph: None,
            pitch_shift: 0.0,
            master_volume,
        }
    }

    /// Build the graph for `stems`, replacing any previous one.
    ///
    /// Every track is attempted; a track that fails keeps `loaded = false`
    /// and records its error without affecting the others. Returns the
    /// number of loaded tracks, or `AllTracksFailed` when none loaded.
    pub fn load_tracks(&mut self, stems: &StemSet) -> Result<usize, MixerError> {
        self.release_all();
        for state in self.tracks.values_mut() {
            state.error = None;
        }

        let sample_rate = stems.sample_rate;
        let decoded: Vec<(TrackName, Result<StereoBuffer, String>)> = TrackName::ALL[..]
            .par_iter()
            .map(|track| {
                let result = match stems.stem(*track) {
                    Some(bytes) => pcm::decode_pcm16_stereo(bytes, sample_rate),
                    None => Err("track missing".to_string()),
                };
                (*track, result)
            })
            .collect();

        let master = self.engine.create_master_gain(self.master_volume)?;
        let pitch = match self
            .engine
            .create_pitch_stage(self.pitch_shift, self.config.pitch_window_secs, master)
        {
            Ok(pitch) => pitch,
            Err(e) => {
                self.engine.release(master);
                return Err(e);
            }
        };
        let mut graph = MixGraph {
            master,
            pitch,
            tracks: BTreeMap::new(),
        };

        for (track, result) in decoded {
            let volume = self.volume(track);
            let outcome = result.and_then(|buffer| {
                self.engine
                    .create_track_player(track, Arc::new(buffer), volume, pitch)
                    .map_err(|e| e.to_string())
            });

            let Some(state) = self.tracks.get_mut(&track) else {
                continue;
            };
            match outcome {
                Ok(node) => {
                    graph.tracks.insert(track, node);
                    state.loaded = true;
                }
                Err(reason) => {
                    log::warn!("{}", MixerError::TrackLoad { track, reason: reason.clone() });
                    state.loaded = false;
                    state.error = Some(reason);
                }
            }
        }

        let loaded = graph.tracks.len();
        self.graph = Some(graph);
        if loaded == 0 {
            self.release_all();
            log::error!("No track could be loaded");
            return Err(MixerError::AllTracksFailed);
        }

        log::info!("Loaded {}/{} tracks", loaded, TrackName::ALL.len());
        Ok(loaded)
    }

    /// Set a track's gain, clamped to `[0, 2]` and ramped. Returns the applied value.
    pub fn set_volume(&mut self, track: TrackName, volume: f64) -> f64 {
        if !volume.is_finite() {
            log::warn!("Ignoring non-finite volume for {}", track);
            return self.volume(track);
        }
        let volume = volume.clamp(0.0, 2.0);
        if let Some(state) = self.tracks.get_mut(&track) {
            state.volume = volume;
        }
        if let Some(node) = self.graph.as_ref().and_then(|g| g.tracks.get(&track)) {
            self.engine.ramp_gain(*node, volume, self.config.gain_ramp());
        }
        volume
    }

    /// Set the shared pitch in semitones, clamped to `[-12, 12]`, immediately.
    pub fn set_pitch_shift(&mut self, semitones: f64) -> f64 {
        if !semitones.is_finite() {
            log::warn!("Ignoring non-finite pitch shift");
            return self.pitch_shift;
        }
        self.pitch_shift = semitones.clamp(-12.0, 12.0);
        if let Some(graph) = &self.graph {
            self.engine.set_pitch(graph.pitch, self.pitch_shift);
        }
        self.pitch_shift
    }

    /// Set the master gain, clamped to `[0, 1]` and ramped.
    pub fn set_master_volume(&mut self, volume: f64) -> f64 {
        if !volume.is_finite() {
            log::warn!("Ignoring non-finite master volume");
            return self.master_volume;
        }
        self.master_volume = volume.clamp(0.0, 1.0);
        if let Some(graph) = &self.graph {
            self.engine
                .ramp_gain(graph.master, self.master_volume, self.config.gain_ramp());
        }
        self.master_volume
    }

    /// Release every node of the current graph exactly once. Safe to call
    /// repeatedly or with nothing loaded.
    pub fn release_all(&mut self) {
        if let Some(graph) = self.graph.take() {
            for node in graph.tracks.values() {
                self.engine.release(*node);
            }
            self.engine.release(graph.pitch);
            self.engine.release(graph.master);
            log::debug!("Released mix graph ({} tracks)", graph.tracks.len());
        }
        for state in self.tracks.values_mut() {
            state.loaded = false;
        }
    }

    /// At least one track is loaded.
    pub fn is_ready(&self) -> bool {
        self.tracks.values().any(|t| t.loaded)
    }

    pub fn volume(&self, track: TrackName) -> f64 {
        self.tracks
            .get(&track)
            .map(|t| t.volume)
            .unwrap_or_else(|| track.default_volume())
    }

    pub fn track(&self, track: TrackName) -> Option<&TrackState> {
        self.tracks.get(&track)
    }

    /// Track states in mixing order.
    pub fn track_states(&self) -> Vec<TrackState> {
        self.tracks.values().cloned().collect()
    }

    pub fn pitch_shift(&self) -> f64 {
        self.pitch_shift
    }

    pub fn master_volume(&self) -> f64 {
        self.master_volume
    }

    pub fn track_node(&self, track: TrackName) -> Option<NodeId> {
        self.graph.as_ref()?.tracks.get(&track).copied()
    }

    pub fn pitch_node(&self) -> Option<NodeId> {
        self.graph.as_ref().map(|g| g.pitch)
    }

    pub fn master_node(&self) -> Option<NodeId> {
        self.graph.as_ref().map(|g| g.master)
    }
}
