//! Processor configuration and lifecycle state types.

use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::StreamError;

/// Well-known public networks with default RPC endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    Mainnet,
    Testnet,
}

impl Network {
    /// The public RPC endpoint for this network.
    pub fn rpc_url(&self) -> &'static str {
        match self {
            Self::Mainnet => "https://rpc.mainnet.near.org",
            Self::Testnet => "https://rpc.testnet.near.org",
        }
    }
}

impl FromStr for Network {
    type Err = StreamError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "mainnet" => Ok(Self::Mainnet),
            "testnet" => Ok(Self::Testnet),
            other => Err(StreamError::Config(format!("unknown network: {other}"))),
        }
    }
}

impl std::fmt::Display for Network {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Mainnet => write!(f, "mainnet"),
            Self::Testnet => write!(f, "testnet"),
        }
    }
}

/// Configuration for an event processor instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessorConfig {
    /// JSON-RPC endpoint to poll.
    pub rpc_url: String,
    /// Delay between poll iterations (milliseconds).
    pub poll_interval_ms: u64,
    /// Consecutive failed status checks that fault the poll loop.
    pub max_consecutive_failures: u32,
    /// Result cap for history queries that do not pass a limit.
    pub history_default_limit: usize,
    /// Heights scanned by a history query that does not pass `from_block`.
    pub history_default_span: u64,
    /// Per-request HTTP timeout (milliseconds).
    pub request_timeout_ms: u64,
    /// Retries for transient HTTP failures, per request.
    pub max_retries: u32,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            rpc_url: Network::Mainnet.rpc_url().to_string(),
            poll_interval_ms: 1_000,
            max_consecutive_failures: 10,
            history_default_limit: 100,
            history_default_span: 1_000,
            request_timeout_ms: 30_000,
            max_retries: 2,
        }
    }
}

impl ProcessorConfig {
    pub fn for_network(network: Network) -> Self {
        Self {
            rpc_url: network.rpc_url().to_string(),
            ..Default::default()
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Reject configurations the processor cannot run with.
    pub fn validate(&self) -> Result<(), StreamError> {
        if self.rpc_url.trim().is_empty() {
            return Err(StreamError::Config("rpc_url must not be empty".into()));
        }
        if self.max_consecutive_failures == 0 {
            return Err(StreamError::Config(
                "max_consecutive_failures must be at least 1".into(),
            ));
        }
        if self.history_default_span == 0 {
            return Err(StreamError::Config(
                "history_default_span must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// Lifecycle state of the poll loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProcessorState {
    /// Never started.
    Idle,
    /// Polling.
    Running,
    /// Stopped by the host; `start` resumes from the cursor.
    Stopped,
    /// The error budget tripped. Terminal.
    Faulted,
}

impl std::fmt::Display for ProcessorState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Running => write!(f, "running"),
            Self::Stopped => write!(f, "stopped"),
            Self::Faulted => write!(f, "faulted"),
        }
    }
}
