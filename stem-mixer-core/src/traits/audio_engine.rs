use std::sync::Arc;
use std::time::Duration;

use crate::models::error::MixerError;
use crate::models::state::{EngineState, TransportState};
use crate::models::stems::StereoBuffer;
use crate::models::track::TrackName;
use crate::traits::keep_alive::KeepAliveStream;

/// Handle to a node owned by an `AudioEngine`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u64);

/// Interface to the platform-owned audio render path.
///
/// The control layer only ever manipulates parameters through this trait
/// (gains, pitch, transport position). Sample generation happens on the
/// engine's own render path and is never blocked on.
///
/// Graph shape built by `TrackMixer`:
/// ```text
/// [track player] → [track gain] ─┐
/// [track player] → [track gain] ─┼→ [shared pitch stage] → [master gain] → out
/// [track player] → [track gain] ─┘
/// ```
pub trait AudioEngine: Send + Sync {
    /// Whether the platform offers the capabilities the engine needs.
    fn is_supported(&self) -> bool;

    fn state(&self) -> EngineState;

    /// Start or resume audio processing. Platforms may refuse until a user gesture.
    fn resume(&self) -> Result<(), MixerError>;

    /// Create the master gain node, connected to the output.
    fn create_master_gain(&self, gain: f64) -> Result<NodeId, MixerError>;

    /// Create the single pitch stage shared by every track, feeding `output`.
    fn create_pitch_stage(
        &self,
        semitones: f64,
        window_secs: f64,
        output: NodeId,
    ) -> Result<NodeId, MixerError>;

    /// Create a player for one decoded stem with its own gain node, feeding `output`.
    ///
    /// The returned node is the track's gain node; releasing it releases the player too.
    fn create_track_player(
        &self,
        track: TrackName,
        buffer: Arc<StereoBuffer>,
        gain: f64,
        output: NodeId,
    ) -> Result<NodeId, MixerError>;

    /// Move a gain parameter linearly to `target` over `ramp`.
    fn ramp_gain(&self, node: NodeId, target: f64, ramp: Duration);

    /// Set the pitch of a pitch stage immediately.
    fn set_pitch(&self, node: NodeId, semitones: f64);

    /// Align the engine's players with the transport clock.
    fn sync_transport(&self, transport: &TransportState);

    /// Stop and release a node. Releasing an unknown node is a no-op.
    fn release(&self, node: NodeId);

    /// Create the near-silent keep-alive stream, routed through a real media element.
    fn create_keep_alive(
        &self,
        frequency_hz: f64,
        gain: f64,
    ) -> Result<Box<dyn KeepAliveStream>, MixerError>;
}
