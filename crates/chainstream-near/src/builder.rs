//! Fluent builder API for event processors.
//!
//! # Example
//!
//! ```rust,no_run
//! use chainstream_core::processor::Network;
//! use chainstream_near::ProcessorBuilder;
//!
//! let processor = ProcessorBuilder::new()
//!     .network(Network::Testnet)
//!     .poll_interval_ms(500)
//!     .max_consecutive_failures(5)
//!     .build()
//!     .expect("valid config");
//! ```

use std::sync::Arc;

use chainstream_core::error::StreamError;
use chainstream_core::processor::{Network, ProcessorConfig};

use crate::fetcher::NearRpcClient;
use crate::processor::{Connector, EventProcessor};

/// Fluent builder for `ProcessorConfig` / `EventProcessor`.
#[derive(Debug, Default)]
pub struct ProcessorBuilder {
    config: ProcessorConfig,
}

impl ProcessorBuilder {
    pub fn new() -> Self {
        Self {
            config: ProcessorConfig::default(),
        }
    }

    /// Start from an existing configuration.
    pub fn from_config(config: ProcessorConfig) -> Self {
        Self { config }
    }

    /// Use the public endpoint of `network`.
    pub fn network(mut self, network: Network) -> Self {
        self.config.rpc_url = network.rpc_url().to_string();
        self
    }

    pub fn rpc_url(mut self, url: impl Into<String>) -> Self {
        self.config.rpc_url = url.into();
        self
    }

    /// Delay between poll iterations in milliseconds.
    pub fn poll_interval_ms(mut self, ms: u64) -> Self {
        self.config.poll_interval_ms = ms;
        self
    }

    /// Consecutive failed status checks before the loop faults.
    pub fn max_consecutive_failures(mut self, n: u32) -> Self {
        self.config.max_consecutive_failures = n;
        self
    }

    pub fn history_default_limit(mut self, limit: usize) -> Self {
        self.config.history_default_limit = limit;
        self
    }

    pub fn history_default_span(mut self, span: u64) -> Self {
        self.config.history_default_span = span;
        self
    }

    pub fn request_timeout_ms(mut self, ms: u64) -> Self {
        self.config.request_timeout_ms = ms;
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n;
        self
    }

    pub fn build_config(self) -> ProcessorConfig {
        self.config
    }

    /// Build an HTTP-backed processor.
    pub fn build(self) -> Result<EventProcessor, StreamError> {
        EventProcessor::new(self.config)
    }

    /// Build a processor over an existing client.
    pub fn build_with_client(self, client: Arc<dyn NearRpcClient>) -> Result<EventProcessor, StreamError> {
        EventProcessor::with_client(self.config, client)
    }

    /// Build a processor whose clients come from `connector`.
    pub fn build_with_connector(self, connector: Connector) -> Result<EventProcessor, StreamError> {
        EventProcessor::with_connector(self.config, connector)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_defaults() {
        let cfg = ProcessorBuilder::new().build_config();
        assert_eq!(cfg, ProcessorConfig::default());
    }

    #[test]
    fn builder_custom() {
        let cfg = ProcessorBuilder::new()
            .network(Network::Testnet)
            .poll_interval_ms(250)
            .max_consecutive_failures(3)
            .history_default_limit(10)
            .history_default_span(50)
            .request_timeout_ms(5_000)
            .max_retries(0)
            .build_config();

        assert_eq!(cfg.rpc_url, "https://rpc.testnet.near.org");
        assert_eq!(cfg.poll_interval_ms, 250);
        assert_eq!(cfg.max_consecutive_failures, 3);
        assert_eq!(cfg.history_default_limit, 10);
        assert_eq!(cfg.history_default_span, 50);
        assert_eq!(cfg.request_timeout_ms, 5_000);
        assert_eq!(cfg.max_retries, 0);
    }

    #[test]
    fn build_rejects_invalid_config() {
        let result = ProcessorBuilder::new().rpc_url("  ").build();
        assert!(matches!(result, Err(StreamError::Config(_))));
    }

    #[tokio::test]
    async fn build_http_processor() {
        let processor = ProcessorBuilder::new()
            .rpc_url("http://127.0.0.1:3030")
            .build()
            .unwrap();
        assert_eq!(processor.endpoint(), "http://127.0.0.1:3030");
        assert!(!processor.is_running());
    }
}
