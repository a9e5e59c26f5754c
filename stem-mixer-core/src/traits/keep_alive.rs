use crate::models::error::MixerError;

/// Callback fired when the platform pauses the keep-alive element on its own.
pub type PauseListener = Box<dyn Fn() + Send + Sync + 'static>;

/// An inaudible media stream that tells the host platform media is playing.
///
/// Implementations route a near-silent tone through a visible media element
/// so the platform does not suspend audio processing while the application
/// surface is hidden.
pub trait KeepAliveStream: Send {
    fn play(&mut self) -> Result<(), MixerError>;

    fn pause(&mut self);

    /// Seek the media element back to its start.
    fn rewind(&mut self);

    /// Whether output is currently stalled (paused by us or by the platform).
    fn is_paused(&self) -> bool;

    /// Register the callback fired when the platform pauses the stream.
    fn set_pause_listener(&mut self, listener: PauseListener);

    /// Stop output, detach from the graph and the host document, release.
    fn teardown(&mut self);
}
