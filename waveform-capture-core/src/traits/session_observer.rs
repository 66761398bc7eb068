use crate::models::error::CaptureError;
use crate::models::state::CaptureState;

/// Lifecycle notifications from a capture session.
///
/// All methods are called from the session's control thread, not the thread
/// that created the session. Implementations should marshal to their own
/// thread if needed.
pub trait SessionObserver: Send + Sync {
    /// Called on every state transition.
    fn on_state_changed(&self, state: CaptureState);

    /// Called once, when the session settles in its terminal state.
    fn on_finished(&self);

    /// Called when an error occurs during teardown.
    fn on_error(&self, error: &CaptureError);
}
