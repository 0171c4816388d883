//! NEAR JSON-RPC fetcher.
//!
//! [`NearRpcClient`] is the seam between the scanner/poll loop and the
//! network: the processor only ever talks to the chain through it.
//! [`NearJsonRpc`] implements it over any [`RpcTransport`].

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};

use chainstream_core::error::StreamError;
use chainstream_rpc::{RpcTransport, TransportError};

use crate::views::{BlockView, ChunkView, StatusView, TxStatusView};

/// The four RPC calls the processor consumes.
#[async_trait]
pub trait NearRpcClient: Send + Sync {
    /// `status`: node sync info, including the latest block height.
    async fn status(&self) -> Result<StatusView, StreamError>;

    /// `block` by height.
    async fn block(&self, height: u64) -> Result<BlockView, StreamError>;

    /// `chunk` by chunk hash.
    async fn chunk(&self, chunk_hash: &str) -> Result<ChunkView, StreamError>;

    /// `tx`: full execution status of a transaction, waiting for execution.
    async fn tx_status(&self, tx_hash: &str, sender_id: &str) -> Result<TxStatusView, StreamError>;

    /// Endpoint identifier, for logs.
    fn endpoint(&self) -> &str;
}

/// `NearRpcClient` over a JSON-RPC transport.
pub struct NearJsonRpc<T> {
    transport: T,
    next_id: AtomicU64,
}

impl<T: RpcTransport> NearJsonRpc<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            next_id: AtomicU64::new(1),
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    async fn request<R: DeserializeOwned>(&self, method: &str, params: Value) -> Result<R, StreamError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.transport
            .call(id, method, params)
            .await
            .map_err(classify_transport_error)
    }
}

#[async_trait]
impl<T: RpcTransport> NearRpcClient for NearJsonRpc<T> {
    async fn status(&self) -> Result<StatusView, StreamError> {
        self.request("status", json!([])).await
    }

    async fn block(&self, height: u64) -> Result<BlockView, StreamError> {
        self.request("block", json!({ "block_id": height })).await
    }

    async fn chunk(&self, chunk_hash: &str) -> Result<ChunkView, StreamError> {
        self.request("chunk", json!({ "chunk_id": chunk_hash })).await
    }

    async fn tx_status(&self, tx_hash: &str, sender_id: &str) -> Result<TxStatusView, StreamError> {
        self.request(
            "tx",
            json!({
                "tx_hash": tx_hash,
                "sender_account_id": sender_id,
                "wait_until": "EXECUTED",
            }),
        )
        .await
    }

    fn endpoint(&self) -> &str {
        self.transport.url()
    }
}

/// Map a transport error onto the processor's error taxonomy.
pub fn classify_transport_error(err: TransportError) -> StreamError {
    if err.is_data_unavailable() {
        return StreamError::DataUnavailable(err.to_string());
    }
    match err {
        TransportError::Rpc(e) => StreamError::Protocol {
            code: e.code,
            message: e.to_string(),
        },
        TransportError::Deserialization(e) => StreamError::Protocol {
            code: 0,
            message: format!("unexpected response shape: {e}"),
        },
        other => StreamError::Transport(other.to_string()),
    }
}
