use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::models::error::MixerError;
use crate::models::state::{EngineState, TransportState};
use crate::models::stems::StereoBuffer;
use crate::models::track::TrackName;
use crate::processing::gain_ramp::GainRamp;
use crate::traits::audio_engine::{AudioEngine, NodeId};
use crate::traits::keep_alive::{KeepAliveStream, PauseListener};
use crate::traits::time_source::TimeSource;

#[derive(Debug)]
enum NodeKind {
    MasterGain {
        gain: GainRamp,
    },
    PitchStage {
        semitones: f64,
        window_secs: f64,
    },
    TrackGain {
        track: TrackName,
        buffer: Arc<StereoBuffer>,
        gain: GainRamp,
    },
}

#[derive(Debug)]
struct Node {
    kind: NodeKind,
    output: Option<NodeId>,
}

struct EngineInner {
    supported: bool,
    state: EngineState,
    refuse_resume: bool,
    resume_calls: usize,
    next_id: u64,
    nodes: BTreeMap<NodeId, Node>,
    transport: TransportState,
    keep_alives: Vec<Arc<KeepAliveShared>>,
}

/// Audio engine that keeps the graph and its parameters in memory without
/// producing sound.
///
/// Used by command-line hosts and tests. It starts suspended, like a browser
/// audio context before the first user gesture, and lets the host simulate
/// platform behaviour: suspension, refused resumes and stalled keep-alive
/// streams.
pub struct HeadlessEngine {
    time: Arc<dyn TimeSource>,
    inner: Mutex<EngineInner>,
}

impl HeadlessEngine {
    pub fn new(time: Arc<dyn TimeSource>) -> Self {
        Self {
            time,
            inner: Mutex::new(EngineInner {
                supported: true,
                state: EngineState::Suspended,
                refuse_resume: false,
                resume_calls: 0,
                next_id: 1,
                nodes: BTreeMap::new(),
                transport: TransportState::default(),
                keep_alives: Vec::new(),
            }),
        }
    }

    pub fn set_supported(&self, supported: bool) {
        self.inner.lock().supported = supported;
    }

    /// Platform suspends processing (e.g. the app went to the background).
    pub fn suspend(&self) {
        let mut inner = self.inner.lock();
        if inner.state == EngineState::Running {
            inner.state = EngineState::Suspended;
            log::debug!("Headless engine suspended");
        }
    }

    pub fn close(&self) {
        self.inner.lock().state = EngineState::Closed;
    }

    /// Make subsequent `resume` calls fail, as a platform without a user gesture does.
    pub fn set_resume_refused(&self, refused: bool) {
        self.inner.lock().refuse_resume = refused;
    }

    pub fn resume_calls(&self) -> usize {
        self.inner.lock().resume_calls
    }

    pub fn live_nodes(&self) -> usize {
        self.inner.lock().nodes.len()
    }

    /// Gain of a gain node as heard right now, mid-ramp included.
    pub fn gain_at_now(&self, node: NodeId) -> Option<f64> {
        let now = self.time.now();
        match &self.inner.lock().nodes.get(&node)?.kind {
            NodeKind::MasterGain { gain } | NodeKind::TrackGain { gain, .. } => Some(gain.value_at(now)),
            NodeKind::PitchStage { .. } => None,
        }
    }

    /// Value a gain node is heading to.
    pub fn gain_target(&self, node: NodeId) -> Option<f64> {
        match &self.inner.lock().nodes.get(&node)?.kind {
            NodeKind::MasterGain { gain } | NodeKind::TrackGain { gain, .. } => Some(gain.target()),
            NodeKind::PitchStage { .. } => None,
        }
    }

    pub fn pitch_of(&self, node: NodeId) -> Option<f64> {
        match &self.inner.lock().nodes.get(&node)?.kind {
            NodeKind::PitchStage { semitones, .. } => Some(*semitones),
            _ => None,
        }
    }

    pub fn pitch_window(&self, node: NodeId) -> Option<f64> {
        match &self.inner.lock().nodes.get(&node)?.kind {
            NodeKind::PitchStage { window_secs, .. } => Some(*window_secs),
            _ => None,
        }
    }

    pub fn output_of(&self, node: NodeId) -> Option<NodeId> {
        self.inner.lock().nodes.get(&node)?.output
    }

    /// Tracks that currently have a player in the graph.
    pub fn loaded_tracks(&self) -> Vec<TrackName> {
        self.inner
            .lock()
            .nodes
            .values()
            .filter_map(|n| match &n.kind {
                NodeKind::TrackGain { track, .. } => Some(*track),
                _ => None,
            })
            .collect()
    }

    /// Frames of the stem a track node plays.
    pub fn track_frames(&self, node: NodeId) -> Option<usize> {
        match &self.inner.lock().nodes.get(&node)?.kind {
            NodeKind::TrackGain { buffer, .. } => Some(buffer.frames()),
            _ => None,
        }
    }

    /// Transport state last pushed by the control layer.
    pub fn last_transport(&self) -> TransportState {
        self.inner.lock().transport
    }

    /// Platform pauses every live keep-alive stream, firing their pause listeners.
    pub fn stall_keep_alive(&self) {
        let streams: Vec<Arc<KeepAliveShared>> = self.inner.lock().keep_alives.clone();
        for stream in streams {
            stream.platform_pause();
        }
    }

    /// Number of keep-alive streams created and not yet torn down.
    pub fn live_keep_alives(&self) -> usize {
        let mut inner = self.inner.lock();
        inner.keep_alives.retain(|k| !k.torn_down.load(Ordering::SeqCst));
        inner.keep_alives.len()
    }

    fn insert(&self, kind: NodeKind, output: Option<NodeId>) -> Result<NodeId, MixerError> {
        let mut inner = self.inner.lock();
        if inner.state == EngineState::Closed {
            return Err(MixerError::Engine("engine is closed".into()));
        }
        if let Some(out) = output {
            if !inner.nodes.contains_key(&out) {
                return Err(MixerError::Engine(format!("unknown output node {}", out.0)));
            }
        }
        let id = NodeId(inner.next_id);
        inner.next_id += 1;
        inner.nodes.insert(id, Node { kind, output });
        Ok(id)
    }
}

impl AudioEngine for HeadlessEngine {
    fn is_supported(&self) -> bool {
        self.inner.lock().supported
    }

    fn state(&self) -> EngineState {
        self.inner.lock().state
    }

    fn resume(&self) -> Result<(), MixerError> {
        let mut inner = self.inner.lock();
        inner.resume_calls += 1;
        match inner.state {
            EngineState::Running => Ok(()),
            EngineState::Closed => Err(MixerError::Engine("engine is closed".into())),
            EngineState::Suspended if inner.refuse_resume => {
                Err(MixerError::Engine("platform refused to resume audio".into()))
            }
            EngineState::Suspended => {
                inner.state = EngineState::Running;
                Ok(())
            }
        }
    }

    fn create_master_gain(&self, gain: f64) -> Result<NodeId, MixerError> {
        self.insert(
            NodeKind::MasterGain {
                gain: GainRamp::new(gain),
            },
            None,
        )
    }

    fn create_pitch_stage(&self, semitones: f64, window_secs: f64, output: NodeId) -> Result<NodeId, MixerError> {
        self.insert(
            NodeKind::PitchStage {
                semitones,
                window_secs,
            },
            Some(output),
        )
    }

    fn create_track_player(
        &self,
        track: TrackName,
        buffer: Arc<StereoBuffer>,
        gain: f64,
        output: NodeId,
    ) -> Result<NodeId, MixerError> {
        if buffer.is_empty() {
            return Err(MixerError::Engine(format!("{} buffer is empty", track)));
        }
        self.insert(
            NodeKind::TrackGain {
                track,
                buffer,
                gain: GainRamp::new(gain),
            },
            Some(output),
        )
    }

    fn ramp_gain(&self, node: NodeId, target: f64, ramp: Duration) {
        let now = self.time.now();
        if let Some(n) = self.inner.lock().nodes.get_mut(&node) {
            match &mut n.kind {
                NodeKind::MasterGain { gain } | NodeKind::TrackGain { gain, .. } => gain.ramp_to(target, now, ramp),
                NodeKind::PitchStage { .. } => log::warn!("ramp_gain on pitch stage {}", node.0),
            }
        }
    }

    fn set_pitch(&self, node: NodeId, semitones: f64) {
        if let Some(Node {
            kind: NodeKind::PitchStage { semitones: s, .. },
            ..
        }) = self.inner.lock().nodes.get_mut(&node)
        {
            *s = semitones;
        }
    }

    fn sync_transport(&self, transport: &TransportState) {
        self.inner.lock().transport = *transport;
    }

    fn release(&self, node: NodeId) {
        self.inner.lock().nodes.remove(&node);
    }

    fn create_keep_alive(&self, frequency_hz: f64, gain: f64) -> Result<Box<dyn KeepAliveStream>, MixerError> {
        let mut inner = self.inner.lock();
        if inner.state == EngineState::Closed {
            return Err(MixerError::Engine("engine is closed".into()));
        }
        let shared = Arc::new(KeepAliveShared::default());
        inner.keep_alives.push(Arc::clone(&shared));
        log::debug!("Keep-alive created: {} Hz at gain {}", frequency_hz, gain);
        Ok(Box::new(HeadlessKeepAlive { shared }))
    }
}

#[derive(Default)]
struct KeepAliveShared {
    playing: AtomicBool,
    torn_down: AtomicBool,
    listener: Mutex<Option<PauseListener>>,
}

impl KeepAliveShared {
    fn platform_pause(&self) {
        if self.playing.swap(false, Ordering::SeqCst) {
            if let Some(listener) = self.listener.lock().as_ref() {
                listener();
            }
        }
    }
}

/// Keep-alive stream of the [`HeadlessEngine`].
pub struct HeadlessKeepAlive {
    shared: Arc<KeepAliveShared>,
}

impl KeepAliveStream for HeadlessKeepAlive {
    fn play(&mut self) -> Result<(), MixerError> {
        if self.shared.torn_down.load(Ordering::SeqCst) {
            return Err(MixerError::Engine("keep-alive stream was torn down".into()));
        }
        self.shared.playing.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn pause(&mut self) {
        self.shared.playing.store(false, Ordering::SeqCst);
    }

    fn rewind(&mut self) {}

    fn is_paused(&self) -> bool {
        !self.shared.playing.load(Ordering::SeqCst)
    }

    fn set_pause_listener(&mut self, listener: PauseListener) {
        *self.shared.listener.lock() = Some(listener);
    }

    fn teardown(&mut self) {
        self.shared.playing.store(false, Ordering::SeqCst);
        self.shared.torn_down.store(true, Ordering::SeqCst);
        self.shared.listener.lock().take();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::time_source::ManualTimeSource;
    use approx::assert_abs_diff_eq;

    fn engine() -> (Arc<ManualTimeSource>, HeadlessEngine) {
        let time = Arc::new(ManualTimeSource::new());
        (time.clone(), HeadlessEngine::new(time))
    }

    #[test]
    fn starts_suspended_until_resumed() {
        let (_time, engine) = engine();
        assert_eq!(engine.state(), EngineState::Suspended);

        engine.set_resume_refused(true);
        assert!(engine.resume().is_err());
        assert_eq!(engine.state(), EngineState::Suspended);

        engine.set_resume_refused(false);
        engine.resume().unwrap();
        assert_eq!(engine.state(), EngineState::Running);
        assert_eq!(engine.resume_calls(), 2);
    }

    #[test]
    fn graph_nodes_are_tracked_and_released() {
        let (_time, engine) = engine();
        let master = engine.create_master_gain(1.0).unwrap();
        let pitch = engine.create_pitch_stage(0.0, 0.05, master).unwrap();
        let buffer = Arc::new(StereoBuffer::silent(44100, 10));
        let drums = engine.create_track_player(TrackName::Drums, buffer, 1.0, pitch).unwrap();

        assert_eq!(engine.live_nodes(), 3);
        assert_eq!(engine.output_of(drums), Some(pitch));
        assert_eq!(engine.loaded_tracks(), vec![TrackName::Drums]);

        engine.release(drums);
        engine.release(drums);
        assert_eq!(engine.live_nodes(), 2);
    }

    #[test]
    fn unknown_output_is_rejected() {
        let (_time, engine) = engine();
        assert!(engine.create_pitch_stage(0.0, 0.05, NodeId(99)).is_err());
    }

    #[test]
    fn gain_ramps_over_time() {
        let (time, engine) = engine();
        let master = engine.create_master_gain(1.0).unwrap();

        engine.ramp_gain(master, 0.0, Duration::from_millis(50));
        time.advance(Duration::from_millis(25));

        assert_abs_diff_eq!(engine.gain_at_now(master).unwrap(), 0.5, epsilon = 1e-9);
        assert_eq!(engine.gain_target(master), Some(0.0));
    }

    #[test]
    fn stalled_keep_alive_fires_listener() {
        let (_time, engine) = engine();
        let mut stream = engine.create_keep_alive(1.0, 0.001).unwrap();
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&fired);
        stream.set_pause_listener(Box::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        stream.play().unwrap();
        engine.stall_keep_alive();
        assert!(stream.is_paused());
        assert_eq!(fired.load(Ordering::SeqCst), 1);

        // Pausing ourselves is not a platform pause.
        stream.play().unwrap();
        stream.pause();
        engine.stall_keep_alive();
        assert_eq!(fired.load(Ordering::SeqCst), 1);

        stream.teardown();
        assert!(stream.play().is_err());
        assert_eq!(engine.live_keep_alives(), 0);
    }
}
