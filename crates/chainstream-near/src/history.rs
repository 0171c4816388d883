//! Bounded historical range scans.
//!
//! A history query walks heights in ascending order with the same scanner the
//! live loop uses, restricted to one account (and optionally one event name).
//! It stops when the range is exhausted or `limit` events are collected. The
//! limit can cut a height short: further matching events in that height are
//! not returned.

use std::sync::Arc;

use chainstream_core::error::StreamError;
use chainstream_core::types::ScannedEvent;

use crate::fetcher::NearRpcClient;
use crate::scanner::{BlockScanner, ScanFilter};

/// Parameters of a history query. Unset fields take processor defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HistoryQuery {
    /// First height (inclusive). Defaults to `to_block - (span - 1)`, floored at 0.
    pub from_block: Option<u64>,
    /// Last height (inclusive). Defaults to the current head.
    pub to_block: Option<u64>,
    pub event_name: Option<String>,
    /// Result cap. Defaults to 100.
    pub limit: Option<usize>,
}

impl HistoryQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_block(mut self, height: u64) -> Self {
        self.from_block = Some(height);
        self
    }

    pub fn to_block(mut self, height: u64) -> Self {
        self.to_block = Some(height);
        self
    }

    pub fn event_name(mut self, name: impl Into<String>) -> Self {
        self.event_name = Some(name.into());
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Inclusive height range of a query, after defaults are applied.
pub fn resolve_range(from_block: Option<u64>, to_block: u64, default_span: u64) -> (u64, u64) {
    let from = from_block.unwrap_or_else(|| to_block.saturating_sub(default_span.saturating_sub(1)));
    (from, to_block)
}

/// Run `query` for `account` against `client`.
///
/// Fails only if the head cannot be resolved (when `to_block` is unset);
/// per-height failures are skipped like in the live loop.
pub async fn query_history(
    client: Arc<dyn NearRpcClient>,
    account: &str,
    query: HistoryQuery,
    default_limit: usize,
    default_span: u64,
) -> Result<Vec<ScannedEvent>, StreamError> {
    let limit = query.limit.unwrap_or(default_limit);
    let to_block = match query.to_block {
        Some(height) => height,
        None => client.status().await?.head(),
    };
    let (from, to) = resolve_range(query.from_block, to_block, default_span);

    let mut results = Vec::new();
    if limit == 0 || from > to {
        return Ok(results);
    }

    tracing::debug!(%account, from, to, limit, event = ?query.event_name, "history query");
    let scanner = BlockScanner::new(client);
    let mut skipped = 0usize;
    for height in from..=to {
        let mut filter = ScanFilter::account(account).max_events(limit - results.len());
        if let Some(name) = &query.event_name {
            filter = filter.event_name(name.clone());
        }
        let scan = scanner.scan(height, &filter).await;
        skipped += scan.failures.len();
        results.extend(scan.events);
        if results.len() >= limit {
            break;
        }
    }

    tracing::debug!(%account, found = results.len(), skipped, "history query complete");
    Ok(results)
}
