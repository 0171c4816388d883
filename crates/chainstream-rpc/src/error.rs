//! Transport-level error types.

use thiserror::Error;

use crate::request::JsonRpcError;

/// Cause names NEAR nodes use when the requested item is pruned, unknown or
/// not produced yet.
const UNAVAILABLE_CAUSES: &[&str] = &[
    "UNKNOWN_BLOCK",
    "UNKNOWN_CHUNK",
    "UNKNOWN_TRANSACTION",
    "UNKNOWN_RECEIPT",
    "GARBAGE_COLLECTED_BLOCK",
    "NOT_SYNCED_YET",
    "INVALID_SHARD_ID",
];

/// Errors that can occur during an RPC transport operation.
#[derive(Debug, Error)]
pub enum TransportError {
    /// HTTP request failed (connection refused, non-2xx status, timeout, ...).
    #[error("HTTP error: {0}")]
    Http(String),

    /// JSON-RPC error envelope returned by the node.
    #[error("RPC error {}: {}", .0.code, .0.message)]
    Rpc(JsonRpcError),

    /// Request timed out after the configured duration.
    #[error("Request timed out after {ms}ms")]
    Timeout { ms: u64 },

    /// Response could not be deserialized.
    #[error("Deserialization error: {0}")]
    Deserialization(#[from] serde_json::Error),
}

impl TransportError {
    /// Returns `true` if this error is retryable (transient).
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Http(_) | Self::Timeout { .. })
    }

    /// Returns `true` if the node reported the requested item as unknown,
    /// pruned, or not yet available.
    pub fn is_data_unavailable(&self) -> bool {
        match self {
            Self::Rpc(err) => err
                .cause_name()
                .map(|name| UNAVAILABLE_CAUSES.contains(&name))
                .unwrap_or(false),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::ErrorCause;

    fn rpc_error(cause: Option<&str>) -> TransportError {
        TransportError::Rpc(JsonRpcError {
            code: -32000,
            message: "Server error".into(),
            data: None,
            name: Some("HANDLER_ERROR".into()),
            cause: cause.map(|name| ErrorCause {
                name: name.into(),
                info: None,
            }),
        })
    }

    #[test]
    fn unknown_chunk_is_data_unavailable() {
        assert!(rpc_error(Some("UNKNOWN_CHUNK")).is_data_unavailable());
        assert!(!rpc_error(Some("PARSE_ERROR")).is_data_unavailable());
        assert!(!rpc_error(None).is_data_unavailable());
    }

    #[test]
    fn only_transport_failures_are_retryable() {
        assert!(TransportError::Http("connection refused".into()).is_retryable());
        assert!(TransportError::Timeout { ms: 30_000 }.is_retryable());
        assert!(!rpc_error(Some("UNKNOWN_BLOCK")).is_retryable());
    }
}
