//! Error types for the notification bus
//!
//! The taxonomy separates caller errors (configuration, lifecycle misuse,
//! protocol violations) from backend failures (start, delivery, commit).
//! Backend failures always carry the underlying cause so callers can decide
//! whether a retry is worthwhile; the core never retries on their behalf.

use crate::notify::channel::ChannelKind;

/// Opaque error surfaced by a backend driver.
pub type BackendError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    /// Missing or invalid setup. Caller error, not retryable.
    #[error("configuration error: {message}")]
    Configuration { message: String },

    /// Lifecycle misuse. Not retryable without correcting call order first.
    #[error("illegal lifecycle operation: {message}")]
    IllegalState { message: String },

    /// The embedded backend failed to start. Fatal for this process instance.
    #[error("embedded notification service failed to start: {source}")]
    ServiceStart {
        #[source]
        source: BackendError,
    },

    /// A send or receive against a channel failed. Retryable by the caller,
    /// but re-sending may duplicate messages beyond what at-least-once
    /// delivery already implies.
    #[error("delivery on channel {channel} failed: {source}")]
    Delivery {
        channel: ChannelKind,
        #[source]
        source: BackendError,
    },

    /// The backend rejected a message disposition (acknowledge or fail).
    /// The outstanding message must be treated as possibly-redelivered.
    #[error("message disposition rejected by backend: {source}")]
    Commit {
        #[source]
        source: BackendError,
    },

    /// The caller violated the single-in-flight poll/commit discipline.
    #[error("protocol violation: {message}")]
    ProtocolViolation { message: String },
}

/// Result type for notification bus operations
pub type NotifyResult<T> = Result<T, NotifyError>;
