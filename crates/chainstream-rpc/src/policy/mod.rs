//! Policy engine: reliability middleware applied by transports.
//!
//! ```text
//! Request → [RetryPolicy] → [Transport]
//! ```
//!
//! Endpoint-level outage handling lives one layer up, in the processor's
//! error budget.

pub mod retry;

pub use retry::{RetryConfig, RetryPolicy};
