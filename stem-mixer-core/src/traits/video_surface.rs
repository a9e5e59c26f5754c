use std::sync::Arc;

use crate::events::ListenerId;

/// Playback gestures and ticks reported by a video surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VideoEvent {
    Play,
    Pause,
    SeekBegin,
    SeekEnd,
    TimeTick,
}

impl VideoEvent {
    pub const ALL: [VideoEvent; 5] = [
        Self::Play,
        Self::Pause,
        Self::SeekBegin,
        Self::SeekEnd,
        Self::TimeTick,
    ];
}

pub type VideoListener = Arc<dyn Fn(VideoEvent) + Send + Sync + 'static>;

/// Media-control surface of an externally owned video element.
///
/// The bridge observes and commands the surface but never owns it.
pub trait VideoSurface: Send + Sync {
    /// Current playback position in seconds.
    fn current_time(&self) -> f64;

    fn set_current_time(&self, secs: f64);

    fn is_paused(&self) -> bool;

    /// The surface itself is mid-seek.
    fn is_seeking(&self) -> bool;

    fn set_muted(&self, muted: bool);

    fn play(&self) -> Result<(), String>;

    fn add_listener(&self, event: VideoEvent, listener: VideoListener) -> ListenerId;

    fn remove_listener(&self, id: ListenerId);
}
