use crate::models::state::SupervisorState;

/// Outbound notifications for the UI layer. Every method has a no-op default.
///
/// Callbacks run on supervisor worker, reader, or waiter threads; implementors
/// must not block for long.
pub trait SupervisorObserver: Send + Sync {
    /// Fired on Starting→Running, Running→Stopped and Stopping→Stopped.
    fn status_changed(&self, _state: SupervisorState) {}

    /// Full log contents, oldest first, after every appended record.
    fn logs_updated(&self, _logs: &[String]) {}

    /// A login helper exited successfully; credential files may have changed.
    fn auth_state_changed(&self) {}
}

pub struct NoopObserver;

impl SupervisorObserver for NoopObserver {}
