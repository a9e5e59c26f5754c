use std::sync::Arc;

/// Transport controls the platform can send from outside the application
/// (lock screen, headset buttons, media keys).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaAction {
    Play,
    Pause,
    Stop,
}

impl MediaAction {
    pub const ALL: [MediaAction; 3] = [MediaAction::Play, MediaAction::Pause, MediaAction::Stop];
}

/// Playback state advertised to the platform's media controls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MediaPlaybackState {
    #[default]
    None,
    Paused,
    Playing,
}

/// Now-playing information shown by the platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaMetadata {
    pub title: String,
    pub artist: String,
    pub album: String,
}

pub type MediaActionHandler = Arc<dyn Fn() + Send + Sync + 'static>;

/// The platform's media session: now-playing metadata, remote transport
/// controls and the advertised playback state.
///
/// Advertising active media is what lets the platform keep audio running
/// while the application is in the background, alongside [`KeepAliveStream`].
///
/// [`KeepAliveStream`]: crate::traits::keep_alive::KeepAliveStream
pub trait MediaSessionHandle: Send + Sync {
    fn set_metadata(&self, metadata: Option<MediaMetadata>);

    /// Install or, with `None`, remove the handler for `action`.
    fn set_action_handler(&self, action: MediaAction, handler: Option<MediaActionHandler>);

    fn set_playback_state(&self, state: MediaPlaybackState);
}
