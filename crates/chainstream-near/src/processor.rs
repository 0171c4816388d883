//! `EventProcessor`: the public face of the event stream.
//!
//! Owns the subscription registry, the RPC client and the poll loop task.
//! Several processors in one process are fully independent.
//!
//! ```text
//! Idle ──start──▶ Running ──stop──▶ Stopped ──start──▶ Running
//!                    │
//!                    └── error budget exhausted ──▶ Faulted (terminal)
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;

use chainstream_core::budget::ErrorBudget;
use chainstream_core::cursor::Cursor;
use chainstream_core::dispatcher::{DispatchReport, Dispatcher};
use chainstream_core::error::StreamError;
use chainstream_core::handler::{EventHandler, Subscription, SubscriptionRegistry};
use chainstream_core::processor::{ProcessorConfig, ProcessorState};
use chainstream_core::types::ScannedEvent;
use chainstream_rpc::{HttpClientConfig, HttpRpcClient, RetryConfig};

use crate::fetcher::{classify_transport_error, NearJsonRpc, NearRpcClient};
use crate::history::{self, HistoryQuery};
use crate::poll_loop::{LoopExit, PollLoop, RunControl};
use crate::scanner::BlockScanner;

/// Builds a client for an endpoint URL. Used by `start(Some(url))`.
pub type Connector = Arc<dyn Fn(&str) -> Result<Arc<dyn NearRpcClient>, StreamError> + Send + Sync>;

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

// ─── Stats ────────────────────────────────────────────────────────────────────

/// Snapshot of the processor's counters since construction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessorStats {
    pub heights_scanned: u64,
    pub events_dispatched: u64,
    pub handler_deliveries: u64,
    pub handler_failures: u64,
    pub skipped_items: u64,
    pub status_failures: u64,
}

#[derive(Debug, Default)]
pub(crate) struct StatsCounters {
    heights_scanned: AtomicU64,
    events_dispatched: AtomicU64,
    handler_deliveries: AtomicU64,
    handler_failures: AtomicU64,
    skipped_items: AtomicU64,
    status_failures: AtomicU64,
}

impl StatsCounters {
    pub(crate) fn record_height(&self, skipped: usize, report: &DispatchReport) {
        self.heights_scanned.fetch_add(1, Ordering::Relaxed);
        self.skipped_items.fetch_add(skipped as u64, Ordering::Relaxed);
        self.events_dispatched.fetch_add(report.events as u64, Ordering::Relaxed);
        self.handler_deliveries.fetch_add(report.delivered as u64, Ordering::Relaxed);
        self.handler_failures.fetch_add(report.failed as u64, Ordering::Relaxed);
    }

    pub(crate) fn record_status_failure(&self) {
        self.status_failures.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> ProcessorStats {
        ProcessorStats {
            heights_scanned: self.heights_scanned.load(Ordering::Relaxed),
            events_dispatched: self.events_dispatched.load(Ordering::Relaxed),
            handler_deliveries: self.handler_deliveries.load(Ordering::Relaxed),
            handler_failures: self.handler_failures.load(Ordering::Relaxed),
            skipped_items: self.skipped_items.load(Ordering::Relaxed),
            status_failures: self.status_failures.load(Ordering::Relaxed),
        }
    }
}

/// State shared between the processor handle and its loop task.
#[derive(Debug)]
pub(crate) struct ProcessorShared {
    state: Mutex<ProcessorState>,
    pub(crate) stats: StatsCounters,
}

impl ProcessorShared {
    fn new() -> Self {
        Self {
            state: Mutex::new(ProcessorState::Idle),
            stats: StatsCounters::default(),
        }
    }

    pub(crate) fn state(&self) -> ProcessorState {
        *lock(&self.state)
    }

    pub(crate) fn set_state(&self, state: ProcessorState) {
        *lock(&self.state) = state;
    }
}

/// Loop task bookkeeping. Only touched while holding the async `run` lock.
#[derive(Default)]
struct RunSlot {
    task: Option<JoinHandle<LoopExit>>,
    cursor: Cursor,
    fault: Option<(u32, u32)>,
}

// ─── EventProcessor ──────────────────────────────────────────────────────────

/// Polls a NEAR RPC endpoint and dispatches `EVENT_JSON` events of watched
/// accounts to subscribers.
pub struct EventProcessor {
    config: ProcessorConfig,
    client: Mutex<Arc<dyn NearRpcClient>>,
    connector: Option<Connector>,
    registry: SubscriptionRegistry,
    shared: Arc<ProcessorShared>,
    control: Mutex<Option<Arc<RunControl>>>,
    run: tokio::sync::Mutex<RunSlot>,
}

impl EventProcessor {
    /// Create a processor talking HTTP JSON-RPC to `config.rpc_url`.
    pub fn new(config: ProcessorConfig) -> Result<Self, StreamError> {
        config.validate()?;
        let http = http_config(&config);
        let connector: Connector = Arc::new(move |url: &str| {
            let transport = HttpRpcClient::new(url, http.clone()).map_err(classify_transport_error)?;
            Ok(Arc::new(NearJsonRpc::new(transport)) as Arc<dyn NearRpcClient>)
        });
        let client = connector(&config.rpc_url)?;
        Ok(Self::assemble(config, client, Some(connector)))
    }

    /// Create a processor over an existing client. `start` with an endpoint
    /// override is rejected for such processors.
    pub fn with_client(config: ProcessorConfig, client: Arc<dyn NearRpcClient>) -> Result<Self, StreamError> {
        config.validate()?;
        Ok(Self::assemble(config, client, None))
    }

    /// Create a processor whose clients are built by `connector`, both for
    /// `config.rpc_url` and for endpoint overrides.
    pub fn with_connector(config: ProcessorConfig, connector: Connector) -> Result<Self, StreamError> {
        config.validate()?;
        let client = connector(&config.rpc_url)?;
        Ok(Self::assemble(config, client, Some(connector)))
    }

    fn assemble(config: ProcessorConfig, client: Arc<dyn NearRpcClient>, connector: Option<Connector>) -> Self {
        Self {
            config,
            client: Mutex::new(client),
            connector,
            registry: SubscriptionRegistry::new(),
            shared: Arc::new(ProcessorShared::new()),
            control: Mutex::new(None),
            run: tokio::sync::Mutex::new(RunSlot::default()),
        }
    }

    pub fn config(&self) -> &ProcessorConfig {
        &self.config
    }

    /// The subscription registry. Clones share subscriptions with the processor.
    pub fn registry(&self) -> &SubscriptionRegistry {
        &self.registry
    }

    fn client(&self) -> Arc<dyn NearRpcClient> {
        lock(&self.client).clone()
    }

    /// Endpoint the processor currently talks to.
    pub fn endpoint(&self) -> String {
        self.client().endpoint().to_string()
    }

    // ── Subscriptions ────────────────────────────────────────────────────────

    /// Deliver events named `event` emitted by `account` to `handler`.
    pub fn subscribe(
        &self,
        account: impl Into<String>,
        event: impl Into<String>,
        handler: Arc<dyn EventHandler>,
    ) -> Subscription {
        self.registry.subscribe(account, event, handler)
    }

    /// Deliver every event emitted by `account` to `handler`.
    pub fn subscribe_all(&self, account: impl Into<String>, handler: Arc<dyn EventHandler>) -> Subscription {
        self.registry.subscribe_all(account, handler)
    }

    // ── Lifecycle ────────────────────────────────────────────────────────────

    pub fn state(&self) -> ProcessorState {
        self.shared.state()
    }

    pub fn is_running(&self) -> bool {
        self.state() == ProcessorState::Running
    }

    pub fn stats(&self) -> ProcessorStats {
        self.shared.stats.snapshot()
    }

    /// Start polling. Returns once the starting height is resolved.
    ///
    /// On the first start the cursor is seeded from the current head; no
    /// earlier heights are scanned. After `stop`, `start` resumes from the
    /// cursor and catches up on the heights produced in between. Starting a
    /// running processor is a no-op; starting a faulted one is an error.
    pub async fn start(&self, endpoint_override: Option<&str>) -> Result<(), StreamError> {
        let mut slot = self.run.lock().await;
        if self.state() == ProcessorState::Running {
            return Ok(());
        }
        // A stopped loop may still be finishing its last iteration.
        settle(&mut slot).await;
        if self.state() == ProcessorState::Faulted {
            return Err(faulted(slot.fault));
        }

        if let Some(url) = endpoint_override {
            let connector = self.connector.as_ref().ok_or_else(|| {
                StreamError::Config("endpoint override needs a processor built with a connector".into())
            })?;
            let client = connector(url)?;
            *lock(&self.client) = client;
            tracing::info!(endpoint = %url, "endpoint overridden");
        }
        let client = self.client();

        // Registered before the seeding call so a concurrent `stop` reaches it.
        let control = Arc::new(RunControl::new());
        *lock(&self.control) = Some(control.clone());

        if !slot.cursor.is_set() {
            let head = match client.status().await {
                Ok(status) => status.head(),
                Err(e) => {
                    self.release(&control);
                    return Err(e);
                }
            };
            slot.cursor.seed(head);
            tracing::info!(head, endpoint = %client.endpoint(), "cursor seeded from chain head");
        }

        {
            let mut state = lock(&self.shared.state);
            if !control.is_running() {
                drop(state);
                self.release(&control);
                tracing::info!("stopped before the poll loop was spawned");
                return Ok(());
            }
            *state = ProcessorState::Running;
        }

        let poll_loop = PollLoop {
            scanner: BlockScanner::new(client.clone()),
            client,
            dispatcher: Dispatcher::new(self.registry.clone()),
            cursor: slot.cursor,
            budget: ErrorBudget::new(self.config.max_consecutive_failures),
            poll_interval: self.config.poll_interval(),
            control,
            shared: self.shared.clone(),
        };

        slot.task = Some(tokio::spawn(poll_loop.run()));
        tracing::info!(
            cursor = ?slot.cursor.last_processed_height,
            poll_interval_ms = self.config.poll_interval_ms,
            "event processor started"
        );
        Ok(())
    }

    /// Stop scheduling iterations. An RPC call in flight completes, but no
    /// further heights are scanned after it.
    pub fn stop(&self) {
        if let Some(control) = lock(&self.control).take() {
            control.stop();
        }
        let mut state = lock(&self.shared.state);
        if *state == ProcessorState::Running {
            *state = ProcessorState::Stopped;
            tracing::info!("event processor stopping");
        }
    }

    fn release(&self, control: &Arc<RunControl>) {
        let mut current = lock(&self.control);
        if current.as_ref().is_some_and(|c| Arc::ptr_eq(c, control)) {
            *current = None;
        }
    }

    /// Wait for the loop task to exit. Returns the terminating error if the
    /// loop faulted, `Ok` if it was stopped or never started.
    pub async fn join(&self) -> Result<(), StreamError> {
        let mut slot = self.run.lock().await;
        match settle(&mut slot).await {
            Some(result) => result,
            None if self.state() == ProcessorState::Faulted => Err(faulted(slot.fault)),
            None => Ok(()),
        }
    }

    /// Last height the poll loop finished, as of the last time the loop
    /// handed its cursor back (`start`/`join`).
    pub async fn cursor(&self) -> Cursor {
        self.run.lock().await.cursor
    }

    // ── History ──────────────────────────────────────────────────────────────

    /// Scan a bounded height range for events of `account`.
    ///
    /// Independent of the live loop: it neither reads nor moves the cursor.
    pub async fn query_history(
        &self,
        account: &str,
        query: HistoryQuery,
    ) -> Result<Vec<ScannedEvent>, StreamError> {
        let client = self.client();
        history::query_history(
            client,
            account,
            query,
            self.config.history_default_limit,
            self.config.history_default_span,
        )
        .await
    }
}

impl Drop for EventProcessor {
    fn drop(&mut self) {
        if let Some(control) = lock(&self.control).take() {
            control.stop();
        }
    }
}

fn http_config(config: &ProcessorConfig) -> HttpClientConfig {
    HttpClientConfig {
        retry: RetryConfig {
            max_retries: config.max_retries,
            ..Default::default()
        },
        request_timeout_ms: config.request_timeout_ms,
    }
}

fn faulted(fault: Option<(u32, u32)>) -> StreamError {
    let (failures, threshold) = fault.unwrap_or_default();
    StreamError::Faulted { failures, threshold }
}

/// Wait for the loop task in `slot` (if any) and take back its cursor.
async fn settle(slot: &mut RunSlot) -> Option<Result<(), StreamError>> {
    let task = slot.task.take()?;
    let result = match task.await {
        Ok(exit) => {
            slot.cursor = exit.cursor;
            exit.result
        }
        Err(e) => {
            tracing::error!(error = %e, "poll loop task ended abnormally");
            Err(StreamError::Aborted {
                reason: e.to_string(),
            })
        }
    };
    if let Err(StreamError::Faulted { failures, threshold }) = &result {
        slot.fault = Some((*failures, *threshold));
    }
    Some(result)
}
