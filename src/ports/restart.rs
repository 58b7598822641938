/// Full device restart.
///
/// Invoked only by the deadlock monitor. Implementations must not wait on the
/// busy lock or on any task that might hold it.
pub trait Restart: Send + Sync + 'static {
    /// Requests a restart. `reason` is a short diagnostic string.
    fn restart(&self, reason: &str);
}
