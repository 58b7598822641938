//! Retry policies for remote calls.
//!
//! - [`RetryPolicy`] bounded attempts with a fixed delay in between;
//! - [`Retryable`] lets an error decide whether another attempt is worth it.

mod retry;

pub use retry::{RetryPolicy, Retryable};
