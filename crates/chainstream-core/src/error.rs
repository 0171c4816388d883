//! Error types for the event-stream pipeline.

use thiserror::Error;

/// Errors that can occur while following the chain or dispatching events.
#[derive(Debug, Error)]
pub enum StreamError {
    /// Connection-level or HTTP failure talking to the endpoint.
    #[error("Transport error: {0}")]
    Transport(String),

    /// The endpoint answered with a structured error envelope.
    #[error("Protocol error {code}: {message}")]
    Protocol { code: i64, message: String },

    /// The requested block, chunk or transaction is pruned or not produced yet.
    #[error("Data unavailable: {0}")]
    DataUnavailable(String),

    /// A log line carried the event marker but not a valid event payload.
    #[error("Malformed event log: {reason}")]
    MalformedEvent { line: String, reason: String },

    #[error("Handler error: {0}")]
    Handler(String),

    /// The error budget tripped; the poll loop will not run again.
    #[error("Poll loop faulted after {failures} consecutive status failures (threshold {threshold})")]
    Faulted { failures: u32, threshold: u32 },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Poll loop aborted: {reason}")]
    Aborted { reason: String },
}

impl StreamError {
    /// Returns `true` for the per-item failure classes the scanner swallows.
    pub fn is_per_item(&self) -> bool {
        matches!(
            self,
            Self::Transport(_)
                | Self::Protocol { .. }
                | Self::DataUnavailable(_)
                | Self::MalformedEvent { .. }
        )
    }

    /// Returns `true` if this error ends the poll loop.
    pub fn is_fault(&self) -> bool {
        matches!(self, Self::Faulted { .. })
    }
}
