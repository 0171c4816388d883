//! Block scanner: finds the events watched accounts emitted at one height.
//!
//! ```text
//! block(height)
//!   └── chunks with height_included == height
//!         └── chunk(chunk_hash).transactions where receiver is watched
//!               └── tx(hash, signer) → [transaction outcome, receipt outcomes...]
//!                     └── outcomes executed by a watched account → EVENT_JSON logs
//! ```
//!
//! Every step is an explicit `Result`. A failed step contributes no events and
//! is recorded in [`HeightScan::failures`]; sibling items are still scanned.

use std::collections::HashSet;
use std::sync::Arc;

use chainstream_core::error::StreamError;
use chainstream_core::extractor::parse_event_line;
use chainstream_core::types::{DispatchContext, ScannedEvent};

use crate::fetcher::NearRpcClient;
use crate::views::{ExecutionOutcomeWithIdView, TransactionView};

/// Which accounts and events a scan collects.
#[derive(Debug, Clone, Default)]
pub struct ScanFilter {
    accounts: HashSet<String>,
    event_name: Option<String>,
    max_events: Option<usize>,
}

impl ScanFilter {
    /// Watch every account in `accounts`.
    pub fn accounts<I, S>(accounts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            accounts: accounts.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    /// Watch a single account.
    pub fn account(account: impl Into<String>) -> Self {
        Self::accounts([account])
    }

    /// Only keep events with this name.
    pub fn event_name(mut self, name: impl Into<String>) -> Self {
        self.event_name = Some(name.into());
        self
    }

    /// Stop the scan once this many events are collected.
    pub fn max_events(mut self, max: usize) -> Self {
        self.max_events = Some(max);
        self
    }

    pub fn watches(&self, account: &str) -> bool {
        self.accounts.contains(account)
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }

    fn wants_event(&self, name: &str) -> bool {
        self.event_name.as_deref().map_or(true, |n| n == name)
    }
}

/// The scan step a failure happened at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanStep {
    Block,
    Chunk { chunk_hash: String },
    TxStatus { tx_hash: String },
    Log { receipt_id: String },
}

impl std::fmt::Display for ScanStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Block => write!(f, "block"),
            Self::Chunk { chunk_hash } => write!(f, "chunk {chunk_hash}"),
            Self::TxStatus { tx_hash } => write!(f, "tx {tx_hash}"),
            Self::Log { receipt_id } => write!(f, "log of {receipt_id}"),
        }
    }
}

/// A swallowed per-item failure.
#[derive(Debug)]
pub struct ScanFailure {
    pub step: ScanStep,
    pub error: StreamError,
}

/// Result of scanning one height.
#[derive(Debug, Default)]
pub struct HeightScan {
    pub height: u64,
    /// Events in dispatch order.
    pub events: Vec<ScannedEvent>,
    pub failures: Vec<ScanFailure>,
    /// `true` if the scan stopped early because `max_events` was reached.
    pub truncated: bool,
}

impl HeightScan {
    fn new(height: u64) -> Self {
        Self {
            height,
            ..Default::default()
        }
    }

    fn fail(&mut self, step: ScanStep, error: StreamError) {
        tracing::debug!(height = self.height, step = %step, error = %error, "scan step skipped");
        self.failures.push(ScanFailure { step, error });
    }
}

/// Scans single heights for events of watched accounts.
#[derive(Clone)]
pub struct BlockScanner {
    client: Arc<dyn NearRpcClient>,
}

impl BlockScanner {
    pub fn new(client: Arc<dyn NearRpcClient>) -> Self {
        Self { client }
    }

    /// Scan `height`. Never fails: per-item failures land in the returned
    /// [`HeightScan`].
    pub async fn scan(&self, height: u64, filter: &ScanFilter) -> HeightScan {
        let mut scan = HeightScan::new(height);
        if filter.is_empty() || filter.max_events == Some(0) {
            return scan;
        }

        let block = match self.client.block(height).await {
            Ok(block) => block,
            Err(e) => {
                scan.fail(ScanStep::Block, e);
                return scan;
            }
        };

        for chunk in block.new_chunks() {
            let transactions = match self.client.chunk(&chunk.chunk_hash).await {
                Ok(view) => view.transactions,
                Err(e) => {
                    scan.fail(
                        ScanStep::Chunk {
                            chunk_hash: chunk.chunk_hash.clone(),
                        },
                        e,
                    );
                    continue;
                }
            };

            for tx in transactions.iter().filter(|tx| filter.watches(&tx.receiver_id)) {
                if self.scan_transaction(tx, filter, &mut scan).await {
                    scan.truncated = true;
                    return scan;
                }
            }
        }

        scan
    }

    /// Returns `true` once `filter.max_events` is reached.
    async fn scan_transaction(
        &self,
        tx: &TransactionView,
        filter: &ScanFilter,
        scan: &mut HeightScan,
    ) -> bool {
        let status = match self.client.tx_status(&tx.hash, &tx.signer_id).await {
            Ok(status) => status,
            Err(e) => {
                scan.fail(
                    ScanStep::TxStatus {
                        tx_hash: tx.hash.clone(),
                    },
                    e,
                );
                return false;
            }
        };

        for outcome in status
            .outcomes()
            .filter(|o| filter.watches(&o.outcome.executor_id))
        {
            if collect_outcome_events(outcome, filter, scan) {
                return true;
            }
        }
        false
    }
}

/// Extract events from one outcome's logs into `scan`.
/// Returns `true` once `filter.max_events` is reached.
fn collect_outcome_events(
    outcome: &ExecutionOutcomeWithIdView,
    filter: &ScanFilter,
    scan: &mut HeightScan,
) -> bool {
    for line in &outcome.outcome.logs {
        let event = match parse_event_line(line) {
            Ok(Some(event)) => event,
            Ok(None) => continue,
            Err(e) => {
                scan.fail(
                    ScanStep::Log {
                        receipt_id: outcome.id.clone(),
                    },
                    e,
                );
                continue;
            }
        };
        if !filter.wants_event(&event.event) {
            continue;
        }
        let context =
            DispatchContext::for_event(&event, &outcome.id, scan.height, &outcome.outcome.executor_id);
        scan.events.push(ScannedEvent { event, context });
        if filter.max_events.is_some_and(|max| scan.events.len() >= max) {
            return true;
        }
    }
    false
}
