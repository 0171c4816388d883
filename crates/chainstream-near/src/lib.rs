//! chainstream-near: NEAR event stream: block scanner, poll loop, history
//! queries and the `EventProcessor` API.
//!
//! ```text
//! EventProcessor ──start──▶ PollLoop (tokio task)
//!                              ├── NearRpcClient::status
//!                              ├── BlockScanner (block → chunks → tx status → logs)
//!                              └── Dispatcher  (registry lookup → handlers)
//! EventProcessor::query_history ──▶ BlockScanner (bounded range, one account)
//! ```

pub mod builder;
pub mod fetcher;
pub mod history;
mod poll_loop;
pub mod processor;
pub mod scanner;
pub mod views;

pub use builder::ProcessorBuilder;
pub use fetcher::{NearJsonRpc, NearRpcClient};
pub use history::HistoryQuery;
pub use processor::{Connector, EventProcessor, ProcessorStats};
pub use scanner::{BlockScanner, HeightScan, ScanFilter};

pub use chainstream_core::{
    handler_fn, parse_event_lines, DispatchContext, EventHandler, EventRecord, ProcessorConfig,
    ProcessorState, ScannedEvent, StreamError, Subscription,
};
