//! Dispatcher: delivers scanned events to matching subscribers.
//!
//! Handler failures (errors and panics) are contained here: they are logged
//! and counted, never propagated to the poll loop.

use std::ops::AddAssign;
use std::panic::{catch_unwind, AssertUnwindSafe};

use crate::handler::SubscriptionRegistry;
use crate::types::ScannedEvent;

/// Outcome of one dispatch call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    /// Events offered to the registry.
    pub events: usize,
    /// Successful handler invocations.
    pub delivered: usize,
    /// Handler invocations that returned an error or panicked.
    pub failed: usize,
}

impl AddAssign for DispatchReport {
    fn add_assign(&mut self, rhs: Self) {
        self.events += rhs.events;
        self.delivered += rhs.delivered;
        self.failed += rhs.failed;
    }
}

/// Looks up subscribers in the registry and invokes them.
#[derive(Clone)]
pub struct Dispatcher {
    registry: SubscriptionRegistry,
}

impl Dispatcher {
    pub fn new(registry: SubscriptionRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &SubscriptionRegistry {
        &self.registry
    }

    /// Dispatch events in order.
    pub fn dispatch(&self, events: &[ScannedEvent]) -> DispatchReport {
        let mut report = DispatchReport::default();
        for scanned in events {
            report += self.dispatch_one(scanned);
        }
        report
    }

    /// Dispatch one event to its exact-name and wildcard subscribers.
    pub fn dispatch_one(&self, scanned: &ScannedEvent) -> DispatchReport {
        let mut report = DispatchReport {
            events: 1,
            ..Default::default()
        };
        let ScannedEvent { event, context } = scanned;
        for handler in self.registry.matching(&context.contract_id, &event.event) {
            match catch_unwind(AssertUnwindSafe(|| handler.handle(event, context))) {
                Ok(Ok(())) => report.delivered += 1,
                Ok(Err(e)) => {
                    report.failed += 1;
                    tracing::warn!(
                        error = %e,
                        event = %event.event,
                        contract = %context.contract_id,
                        height = context.block_height,
                        "event handler failed"
                    );
                }
                Err(_) => {
                    report.failed += 1;
                    tracing::warn!(
                        event = %event.event,
                        contract = %context.contract_id,
                        height = context.block_height,
                        "event handler panicked"
                    );
                }
            }
        }
        report
    }
}
