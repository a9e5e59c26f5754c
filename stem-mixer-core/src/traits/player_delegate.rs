use crate::models::error::MixerError;
use crate::models::state::PlayerSnapshot;

/// Event delegate for player notifications.
///
/// `on_time_updated` is called from whichever scheduler currently drives the
/// time display, which may be a background thread while the host is hidden.
/// Implementations should marshal to the UI thread if needed, and must not
/// call back into the player synchronously.
pub trait PlayerDelegate: Send + Sync {
    fn on_state_changed(&self, snapshot: &PlayerSnapshot);

    fn on_time_updated(&self, current_time: f64);

    /// Called for fatal errors only; per-track errors appear in the snapshot.
    fn on_error(&self, error: &MixerError);
}
