//! Error types used by the ticketvisor runtime, its tasks and remote calls.
//!
//! - [`RuntimeError`] errors raised by the device runtime itself.
//! - [`TaskError`] errors raised by a supervised long-running task.
//! - [`ApiError`] failures of a call to the remote bakery service.
//! - [`HandlerError`] outcome of a one-shot request handler that did not complete.
//! - [`QueueError`] rejection of an outbound message.
//! - [`ConfigError`] configuration loading/validation failures.
//!
//! Every enum provides `as_label()`, a short stable snake_case label for logs.

use std::time::Duration;
use thiserror::Error;

/// # Errors produced by the device runtime.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// Shutdown grace period was exceeded; some tasks did not stop in time.
    #[error("shutdown timeout {grace:?} exceeded; stuck: {stuck:?}")]
    GraceExceeded {
        /// The configured grace duration.
        grace: Duration,
        /// Names of the tasks still running when the grace period ran out.
        stuck: Vec<String>,
    },

    /// A full device restart was requested (deadlock ceiling exceeded).
    #[error("restart requested: {reason}")]
    RestartRequested {
        /// Why the restart was requested.
        reason: String,
    },
}

impl RuntimeError {
    /// Returns a short stable label (snake_case) for use in logs.
    ///
    /// # Example
    /// ```
    /// use ticketvisor::RuntimeError;
    ///
    /// let err = RuntimeError::RestartRequested { reason: "deadlock".into() };
    /// assert_eq!(err.as_label(), "runtime_restart_requested");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            RuntimeError::GraceExceeded { .. } => "runtime_grace_exceeded",
            RuntimeError::RestartRequested { .. } => "runtime_restart_requested",
        }
    }
}

/// # Errors produced by supervised tasks.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum TaskError {
    /// Non-recoverable error; the runtime stops.
    #[error("fatal error: {error}")]
    Fatal {
        /// The underlying error message.
        error: String,
    },

    /// Task failed; the runtime logs it and keeps the other tasks running.
    #[error("execution failed: {error}")]
    Fail {
        /// The underlying error message.
        error: String,
    },

    /// Task observed cancellation and exited.
    #[error("context cancelled")]
    Canceled,
}

impl TaskError {
    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            TaskError::Fatal { .. } => "task_fatal",
            TaskError::Fail { .. } => "task_failed",
            TaskError::Canceled => "task_canceled",
        }
    }
}

/// # Failures of a remote bakery service call.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum ApiError {
    /// No response: connection refused, timed out, link down.
    #[error("transport failure: {0}")]
    Transport(String),

    /// The service answered with a non-success HTTP status.
    #[error("unexpected status {0}")]
    Status(u16),

    /// The response body could not be decoded.
    #[error("malformed response: {0}")]
    Decode(String),

    /// A field the device depends on is absent from the response.
    #[error("response missing field `{0}`")]
    MissingField(&'static str),
}

impl ApiError {
    /// Returns a short stable label (snake_case) for diagnostics.
    ///
    /// # Example
    /// ```
    /// use ticketvisor::ApiError;
    ///
    /// assert_eq!(ApiError::Status(502).as_label(), "http_fail");
    /// assert_eq!(ApiError::Decode("eof".into()).as_label(), "json_error");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            ApiError::Transport(_) | ApiError::Status(_) => "http_fail",
            ApiError::Decode(_) => "json_error",
            ApiError::MissingField(_) => "missing_field",
        }
    }

    /// Transport and decode failures are worth another attempt; a response
    /// that decoded but lacks a field is not.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ApiError::Transport(_) | ApiError::Status(_) | ApiError::Decode(_)
        )
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ApiError::Decode(err.to_string())
        } else if let Some(status) = err.status() {
            ApiError::Status(status.as_u16())
        } else {
            ApiError::Transport(err.to_string())
        }
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        ApiError::Decode(err.to_string())
    }
}

/// # Why a request handler abandoned its operation.
///
/// None of these are retried synchronously; the caller tries again on its
/// next natural schedule.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum HandlerError {
    /// Connectivity is not ready for remote calls.
    #[error("network not ready for remote calls")]
    NotReady,

    /// The busy lock could not be acquired within its timeout.
    #[error("device busy")]
    Busy,

    /// The remote call itself failed.
    #[error(transparent)]
    Api(#[from] ApiError),
}

impl HandlerError {
    /// Returns a short stable label (snake_case) for diagnostics.
    pub fn as_label(&self) -> &'static str {
        match self {
            HandlerError::NotReady => "network_not_ready",
            HandlerError::Busy => "busy",
            HandlerError::Api(e) => e.as_label(),
        }
    }
}

/// # Rejection of an outbound message.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueError {
    /// Queue is at capacity; the message was dropped.
    #[error("outbound queue full (capacity {capacity})")]
    Full {
        /// Configured queue capacity.
        capacity: usize,
    },

    /// The queue critical section could not be entered within its timeout.
    #[error("outbound queue contended")]
    Contended,
}

/// # Configuration errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Reading or deserializing a configuration source failed.
    #[error("config source: {0}")]
    Source(#[from] config::ConfigError),

    /// A value is out of its allowed range.
    #[error("invalid config `{field}`: {reason}")]
    Invalid {
        /// Offending field.
        field: &'static str,
        /// What is wrong with it.
        reason: String,
    },
}

impl ConfigError {
    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            ConfigError::Source(_) => "config_source",
            ConfigError::Invalid { .. } => "config_invalid",
        }
    }
}
