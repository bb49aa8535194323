use crate::models::error::EngineError;
use crate::models::state::SessionState;

/// Event delegate for loopback engine notifications.
///
/// Called from the control thread for requested transitions and from the
/// loop thread when the loop stops itself after repeated I/O failures.
/// Notifications are delivered in order once the engine has released its
/// transition lock, so a callback may call back into `start`/`stop`.
/// Implementations should marshal to a UI thread if needed.
pub trait LoopbackDelegate: Send + Sync {
    /// Called after each session state change.
    fn on_state_changed(&self, state: SessionState);

    /// Called when a running session fails outside a control call.
    fn on_error(&self, error: &EngineError);
}
