//! Shared types for the event pipeline.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Deserialize a field that is present (even as `null`) into `Some`, so an
/// explicit `null` survives a round trip while an absent field stays `None`.
fn present<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

// ─── EventRecord ──────────────────────────────────────────────────────────────

/// A structured event parsed from an `EVENT_JSON:` log line.
///
/// `standard`, `version` and `data` are carried through exactly as the
/// contract logged them: whatever JSON type they have, and `null` when the
/// contract wrote `null`. `None` means the field was absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub standard: Option<Value>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub version: Option<Value>,
    /// Event name, e.g. `"ft_transfer"`. Never empty.
    pub event: String,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl EventRecord {
    /// `standard`, if it was logged as a string.
    pub fn standard_str(&self) -> Option<&str> {
        self.standard.as_ref().and_then(Value::as_str)
    }

    /// `version`, if it was logged as a string.
    pub fn version_str(&self) -> Option<&str> {
        self.version.as_ref().and_then(Value::as_str)
    }
}

// ─── DispatchContext ─────────────────────────────────────────────────────────

/// Where an event came from. Built once per outcome and cloned per event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatchContext {
    /// Receipt id (or transaction hash for the transaction-level outcome).
    pub receipt_id: String,
    /// Height of the block the scan was run for.
    pub block_height: u64,
    /// The account that executed the outcome and emitted the log.
    pub contract_id: String,
    pub standard: Option<Value>,
    pub version: Option<Value>,
}

impl DispatchContext {
    /// Build the context for `event` emitted by the outcome `receipt_id`.
    pub fn for_event(
        event: &EventRecord,
        receipt_id: impl Into<String>,
        block_height: u64,
        contract_id: impl Into<String>,
    ) -> Self {
        Self {
            receipt_id: receipt_id.into(),
            block_height,
            contract_id: contract_id.into(),
            standard: event.standard.clone(),
            version: event.version.clone(),
        }
    }
}

// ─── ScannedEvent ────────────────────────────────────────────────────────────

/// An event paired with its dispatch context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScannedEvent {
    pub event: EventRecord,
    pub context: DispatchContext,
}

// ─── Tests ────────────────────────────────────────────────────────────────────
