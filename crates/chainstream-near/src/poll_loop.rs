//! The poll loop: follows the chain head one height at a time.
//!
//! Each iteration:
//!   - `status` → latest height (a failure counts against the error budget)
//!   - while the cursor is behind: advance by one, scan, dispatch
//!   - sleep `poll_interval` (woken early by `stop`)
//!
//! The loop owns the cursor and the error budget; both are handed back in
//! [`LoopExit`] so a later `start` can resume from the same cursor.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;

use chainstream_core::budget::ErrorBudget;
use chainstream_core::cursor::Cursor;
use chainstream_core::dispatcher::Dispatcher;
use chainstream_core::error::StreamError;
use chainstream_core::processor::ProcessorState;

use crate::fetcher::NearRpcClient;
use crate::processor::ProcessorShared;
use crate::scanner::{BlockScanner, ScanFilter};

/// Cooperative stop signal for one run of the loop.
#[derive(Debug)]
pub(crate) struct RunControl {
    running: AtomicBool,
    wake: Notify,
}

impl RunControl {
    pub(crate) fn new() -> Self {
        Self {
            running: AtomicBool::new(true),
            wake: Notify::new(),
        }
    }

    pub(crate) fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Prevent further iterations and wake the inter-iteration sleep. An RPC
    /// call already in flight is not interrupted.
    pub(crate) fn stop(&self) {
        self.running.store(false, Ordering::Release);
        self.wake.notify_one();
    }
}

/// What the loop hands back when it exits.
#[derive(Debug)]
pub(crate) struct LoopExit {
    pub cursor: Cursor,
    pub result: Result<(), StreamError>,
}

pub(crate) struct PollLoop {
    pub client: Arc<dyn NearRpcClient>,
    pub scanner: BlockScanner,
    pub dispatcher: Dispatcher,
    pub cursor: Cursor,
    pub budget: ErrorBudget,
    pub poll_interval: Duration,
    pub control: Arc<RunControl>,
    pub shared: Arc<ProcessorShared>,
}

impl PollLoop {
    pub(crate) async fn run(mut self) -> LoopExit {
        let result = loop {
            if !self.control.is_running() {
                break Ok(());
            }
            if let Err(e) = self.iterate().await {
                break Err(e);
            }
            if !self.control.is_running() {
                break Ok(());
            }
            tokio::select! {
                _ = tokio::time::sleep(self.poll_interval) => {}
                _ = self.control.wake.notified() => {}
            }
        };

        match &result {
            Ok(()) => tracing::info!(cursor = ?self.cursor.last_processed_height, "poll loop stopped"),
            Err(e) => tracing::error!(error = %e, cursor = ?self.cursor.last_processed_height, "poll loop faulted"),
        }
        LoopExit {
            cursor: self.cursor,
            result,
        }
    }

    /// One status check plus catch-up to the head it reports.
    pub(crate) async fn iterate(&mut self) -> Result<(), StreamError> {
        let head = match self.client.status().await {
            Ok(status) => status.head(),
            Err(e) => return self.on_status_failure(e),
        };
        self.budget.record_success();
        self.catch_up(head).await;
        Ok(())
    }

    fn on_status_failure(&mut self, error: StreamError) -> Result<(), StreamError> {
        let exhausted = self.budget.record_failure();
        self.shared.stats.record_status_failure();
        tracing::warn!(
            error = %error,
            failures = self.budget.consecutive_failures(),
            threshold = self.budget.threshold(),
            endpoint = %self.client.endpoint(),
            "status check failed"
        );
        if !exhausted {
            return Ok(());
        }
        self.shared.set_state(ProcessorState::Faulted);
        Err(StreamError::Faulted {
            failures: self.budget.consecutive_failures(),
            threshold: self.budget.threshold(),
        })
    }

    async fn catch_up(&mut self, head: u64) {
        while self.cursor.is_behind(head) {
            if !self.control.is_running() {
                return;
            }
            let Some(height) = self.cursor.advance() else {
                return;
            };

            let filter = ScanFilter::accounts(self.dispatcher.registry().watched_accounts());
            let scan = self.scanner.scan(height, &filter).await;
            if !scan.failures.is_empty() {
                tracing::warn!(
                    height,
                    failures = scan.failures.len(),
                    "height scanned with skipped items"
                );
            }
            let report = self.dispatcher.dispatch(&scan.events);
            self.shared
                .stats
                .record_height(scan.failures.len(), &report);
            if report.events > 0 {
                tracing::debug!(
                    height,
                    events = report.events,
                    delivered = report.delivered,
                    failed = report.failed,
                    "dispatched events"
                );
            }
        }
    }
}
