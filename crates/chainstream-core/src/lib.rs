//! chainstream-core: chain-agnostic foundation of the event-stream processor.
//!
//! # Architecture
//!
//! ```text
//! EventProcessor (chainstream-near)
//!     ├── Cursor               (last processed height)
//!     ├── ErrorBudget          (consecutive status failures)
//!     ├── extractor            (EVENT_JSON log lines → EventRecord)
//!     ├── SubscriptionRegistry (account → event name / wildcard → handlers)
//!     └── Dispatcher           (fault-isolated handler invocation)
//! ```

pub mod budget;
pub mod cursor;
pub mod dispatcher;
pub mod error;
pub mod extractor;
pub mod handler;
pub mod processor;
pub mod types;

pub use budget::ErrorBudget;
pub use cursor::Cursor;
pub use dispatcher::{DispatchReport, Dispatcher};
pub use error::StreamError;
pub use extractor::{parse_event_line, parse_event_lines, EVENT_LOG_PREFIX};
pub use handler::{
    handler_fn, EventHandler, EventKey, FnHandler, Subscription, SubscriptionId,
    SubscriptionRegistry,
};
pub use processor::{Network, ProcessorConfig, ProcessorState};
pub use types::{DispatchContext, EventRecord, ScannedEvent};
