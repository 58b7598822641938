use async_trait::async_trait;

/// Network link (e.g. Wi-Fi station).
///
/// Establishment is asynchronous on real hardware: `begin_connect` starts an
/// attempt and a later `is_up` observes the result.
#[async_trait]
pub trait Link: Send + Sync + 'static {
    /// Whether the link is established.
    fn is_up(&self) -> bool;

    /// Drops any half-open association and starts a new attempt.
    async fn begin_connect(&self);
}
