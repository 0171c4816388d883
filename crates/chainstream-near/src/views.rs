//! Serde views of the NEAR JSON-RPC responses the scanner consumes.
//!
//! Only the fields the processor reads are modelled; everything else in the
//! node's response is ignored.

use serde::{Deserialize, Serialize};

// ─── status ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusView {
    pub sync_info: SyncInfoView,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncInfoView {
    pub latest_block_height: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latest_block_hash: Option<String>,
}

impl StatusView {
    pub fn head(&self) -> u64 {
        self.sync_info.latest_block_height
    }
}

// ─── block ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockView {
    pub header: BlockHeaderView,
    #[serde(default)]
    pub chunks: Vec<ChunkHeaderView>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockHeaderView {
    pub height: u64,
    pub hash: String,
    #[serde(default)]
    pub prev_hash: String,
    /// Nanoseconds since the Unix epoch.
    #[serde(default)]
    pub timestamp: u64,
    /// Decimal string (yoctoNEAR per gas unit).
    #[serde(default)]
    pub gas_price: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkHeaderView {
    /// Height of the block the chunk was produced for. A block may reference
    /// older chunks when a shard missed its slot.
    pub height_included: u64,
    pub chunk_hash: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shard_id: Option<u64>,
}

impl BlockView {
    /// Chunks that were produced at this block's height.
    pub fn new_chunks(&self) -> impl Iterator<Item = &ChunkHeaderView> {
        let height = self.header.height;
        self.chunks.iter().filter(move |c| c.height_included == height)
    }
}

// ─── chunk ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkView {
    #[serde(default)]
    pub transactions: Vec<TransactionView>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionView {
    pub hash: String,
    pub signer_id: String,
    pub receiver_id: String,
}

// ─── tx status ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TxStatusView {
    pub transaction_outcome: ExecutionOutcomeWithIdView,
    #[serde(default)]
    pub receipts_outcome: Vec<ExecutionOutcomeWithIdView>,
}

impl TxStatusView {
    /// The transaction-level outcome followed by receipt outcomes in the
    /// order the node returned them.
    pub fn outcomes(&self) -> impl Iterator<Item = &ExecutionOutcomeWithIdView> {
        std::iter::once(&self.transaction_outcome).chain(self.receipts_outcome.iter())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionOutcomeWithIdView {
    /// Transaction hash for the transaction outcome, receipt id otherwise.
    pub id: String,
    pub outcome: ExecutionOutcomeView,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionOutcomeView {
    pub executor_id: String,
    #[serde(default)]
    pub logs: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn status_reads_head_height_and_hash() {
        let status: StatusView = serde_json::from_value(json!({
            "chain_id": "testnet",
            "sync_info": {
                "latest_block_height": 187_000_000u64,
                "latest_block_hash": "HeadHash",
                "syncing": false
            }
        }))
        .unwrap();
        assert_eq!(status.head(), 187_000_000);
        assert_eq!(status.sync_info.latest_block_hash.as_deref(), Some("HeadHash"));

        let bare: StatusView =
            serde_json::from_value(json!({ "sync_info": { "latest_block_height": 5 } })).unwrap();
        assert_eq!(bare.sync_info.latest_block_hash, None);
    }

    #[test]
    fn new_chunks_skips_carried_over_chunks() {
        let block: BlockView = serde_json::from_value(json!({
            "header": {
                "height": 101,
                "hash": "B101",
                "prev_hash": "B100",
                "timestamp": 1_700_000_000_000_000_000u64,
                "gas_price": "100000000"
            },
            "chunks": [
                { "height_included": 101, "chunk_hash": "C0", "shard_id": 0 },
                { "height_included": 99, "chunk_hash": "C1", "shard_id": 1 },
                { "height_included": 101, "chunk_hash": "C2", "shard_id": 2 }
            ]
        }))
        .unwrap();
        let hashes: Vec<_> = block.new_chunks().map(|c| c.chunk_hash.as_str()).collect();
        assert_eq!(hashes, vec!["C0", "C2"]);
    }

    #[test]
    fn outcomes_put_transaction_first() {
        let status: TxStatusView = serde_json::from_value(json!({
            "transaction_outcome": {
                "id": "TX1",
                "outcome": { "executor_id": "alice.test", "logs": [] }
            },
            "receipts_outcome": [
                { "id": "R1", "outcome": { "executor_id": "token.test", "logs": ["a"] } },
                { "id": "R2", "outcome": { "executor_id": "alice.test", "logs": [] } }
            ],
            "status": { "SuccessValue": "" }
        }))
        .unwrap();
        let ids: Vec<_> = status.outcomes().map(|o| o.id.as_str()).collect();
        assert_eq!(ids, vec!["TX1", "R1", "R2"]);
    }
}
