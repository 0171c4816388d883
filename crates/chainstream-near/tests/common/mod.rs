//! Scripted in-memory NEAR RPC for integration tests.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use chainstream_core::error::StreamError;
use chainstream_near::views::{BlockView, ChunkView, ExecutionOutcomeWithIdView, StatusView, TxStatusView};
use chainstream_near::NearRpcClient;

/// A recorded RPC call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Status,
    Block(u64),
    Chunk(String),
    Tx(String),
}

#[derive(Default)]
struct MockState {
    head: u64,
    /// Per-call status outcomes (`false` = fail); once empty, `status_default`.
    status_script: VecDeque<bool>,
    status_default_ok: bool,
    status_delay: Duration,
    blocks: HashMap<u64, BlockView>,
    chunks: HashMap<String, ChunkView>,
    txs: HashMap<String, TxStatusView>,
    calls: Vec<Call>,
}

pub struct MockNear {
    endpoint: String,
    state: Mutex<MockState>,
}

impl MockNear {
    pub fn new(head: u64) -> Arc<Self> {
        Self::named("mock://near", head)
    }

    pub fn named(endpoint: &str, head: u64) -> Arc<Self> {
        Arc::new(Self {
            endpoint: endpoint.to_string(),
            state: Mutex::new(MockState {
                head,
                status_default_ok: true,
                ..Default::default()
            }),
        })
    }

    pub fn set_head(&self, head: u64) {
        self.state.lock().unwrap().head = head;
    }

    /// Queue explicit outcomes for the next status calls.
    pub fn script_status(&self, outcomes: &[bool]) {
        self.state.lock().unwrap().status_script.extend(outcomes.iter().copied());
    }

    /// Hold every status call for `delay` before answering.
    pub fn delay_status(&self, delay: Duration) {
        self.state.lock().unwrap().status_delay = delay;
    }

    /// Outcome of status calls once the script is exhausted.
    pub fn status_ok_by_default(&self, ok: bool) {
        self.state.lock().unwrap().status_default_ok = ok;
    }

    /// Add a block whose chunks are `(height_included, chunk_hash)`.
    pub fn add_block(&self, height: u64, chunks: &[(u64, &str)]) {
        let chunks: Vec<_> = chunks
            .iter()
            .enumerate()
            .map(|(shard, (included, hash))| {
                json!({ "height_included": included, "chunk_hash": hash, "shard_id": shard })
            })
            .collect();
        let block: BlockView = serde_json::from_value(json!({
            "header": {
                "height": height,
                "hash": format!("B{height}"),
                "prev_hash": format!("B{}", height.saturating_sub(1)),
                "timestamp": 1_700_000_000_000_000_000u64 + height,
                "gas_price": "100000000"
            },
            "chunks": chunks
        }))
        .unwrap();
        self.state.lock().unwrap().blocks.insert(height, block);
    }

    /// Add a chunk holding `(tx_hash, signer_id, receiver_id)` transactions.
    pub fn add_chunk(&self, hash: &str, txs: &[(&str, &str, &str)]) {
        let transactions: Vec<_> = txs
            .iter()
            .map(|(h, s, r)| json!({ "hash": h, "signer_id": s, "receiver_id": r }))
            .collect();
        let chunk: ChunkView = serde_json::from_value(json!({ "transactions": transactions })).unwrap();
        self.state.lock().unwrap().chunks.insert(hash.to_string(), chunk);
    }

    /// Add the execution status of `tx_hash`.
    pub fn add_tx(
        &self,
        tx_hash: &str,
        transaction_outcome: ExecutionOutcomeWithIdView,
        receipts: Vec<ExecutionOutcomeWithIdView>,
    ) {
        let status = TxStatusView {
            transaction_outcome,
            receipts_outcome: receipts,
        };
        self.state.lock().unwrap().txs.insert(tx_hash.to_string(), status);
    }

    pub fn put_block(&self, block: BlockView) {
        self.state.lock().unwrap().blocks.insert(block.header.height, block);
    }

    pub fn put_chunk(&self, hash: &str, chunk: ChunkView) {
        self.state.lock().unwrap().chunks.insert(hash.to_string(), chunk);
    }

    pub fn put_tx(&self, hash: &str, status: TxStatusView) {
        self.state.lock().unwrap().txs.insert(hash.to_string(), status);
    }

    /// One block at `height` with one chunk and one transaction from
    /// `alice.test` to `contract`, whose single receipt logs `logs`.
    pub fn add_event_block(&self, height: u64, contract: &str, logs: &[String]) {
        let chunk = format!("C{height}");
        let tx = format!("T{height}");
        self.add_block(height, &[(height, &chunk)]);
        self.add_chunk(&chunk, &[(&tx, "alice.test", contract)]);
        self.add_tx(
            &tx,
            outcome(&tx, "alice.test", &[]),
            vec![outcome(&format!("R{height}"), contract, logs)],
        );
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn status_calls(&self) -> usize {
        self.calls().iter().filter(|c| **c == Call::Status).count()
    }

    pub fn block_calls(&self) -> Vec<u64> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Block(h) => Some(h),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: Call) {
        self.state.lock().unwrap().calls.push(call);
    }
}

#[async_trait]
impl NearRpcClient for MockNear {
    async fn status(&self) -> Result<StatusView, StreamError> {
        self.record(Call::Status);
        let delay = self.state.lock().unwrap().status_delay;
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        let mut state = self.state.lock().unwrap();
        let ok = state.status_script.pop_front().unwrap_or(state.status_default_ok);
        if !ok {
            return Err(StreamError::Transport("connection refused".into()));
        }
        Ok(serde_json::from_value(json!({ "sync_info": { "latest_block_height": state.head } })).unwrap())
    }

    async fn block(&self, height: u64) -> Result<BlockView, StreamError> {
        self.record(Call::Block(height));
        self.state
            .lock()
            .unwrap()
            .blocks
            .get(&height)
            .cloned()
            .ok_or_else(|| StreamError::DataUnavailable(format!("UNKNOWN_BLOCK {height}")))
    }

    async fn chunk(&self, chunk_hash: &str) -> Result<ChunkView, StreamError> {
        self.record(Call::Chunk(chunk_hash.to_string()));
        self.state
            .lock()
            .unwrap()
            .chunks
            .get(chunk_hash)
            .cloned()
            .ok_or_else(|| StreamError::DataUnavailable(format!("UNKNOWN_CHUNK {chunk_hash}")))
    }

    async fn tx_status(&self, tx_hash: &str, _sender_id: &str) -> Result<TxStatusView, StreamError> {
        self.record(Call::Tx(tx_hash.to_string()));
        self.state
            .lock()
            .unwrap()
            .txs
            .get(tx_hash)
            .cloned()
            .ok_or_else(|| StreamError::DataUnavailable(format!("UNKNOWN_TRANSACTION {tx_hash}")))
    }

    fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

/// An execution outcome with the given id, executor and logs.
pub fn outcome(id: &str, executor: &str, logs: &[String]) -> ExecutionOutcomeWithIdView {
    serde_json::from_value(json!({
        "id": id,
        "outcome": { "executor_id": executor, "logs": logs }
    }))
    .unwrap()
}

/// An `EVENT_JSON` log line for a NEP-141 event.
pub fn event_log(name: &str, amount: &str) -> String {
    format!(
        r#"EVENT_JSON:{{"standard":"nep141","version":"1.0.0","event":"{name}","data":[{{"amount":"{amount}"}}]}}"#
    )
}

/// Poll `cond` until it holds, panicking after two seconds.
pub async fn wait_until(mut cond: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while !cond() {
        if tokio::time::Instant::now() > deadline {
            panic!("condition not reached within 2s");
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}
