//! NEP-297 event extraction from execution-outcome log lines.
//!
//! A log line is a candidate event iff it starts with [`EVENT_LOG_PREFIX`]
//! immediately followed by a JSON object carrying a non-empty `event` string.
//! `standard`, `version` and `data` are optional and passed through unchanged,
//! whatever their JSON type.

use serde_json::Value;

use crate::error::StreamError;
use crate::types::EventRecord;

/// Marker that precedes the JSON payload of an event log line.
pub const EVENT_LOG_PREFIX: &str = "EVENT_JSON:";

/// Parse a single log line.
///
/// Returns `Ok(None)` for lines without the marker, `Ok(Some(_))` for a valid
/// event and `Err(StreamError::MalformedEvent)` for marked lines whose payload
/// is not a usable event object.
pub fn parse_event_line(line: &str) -> Result<Option<EventRecord>, StreamError> {
    let Some(payload) = line.strip_prefix(EVENT_LOG_PREFIX) else {
        return Ok(None);
    };

    let malformed = |reason: String| StreamError::MalformedEvent {
        line: line.to_string(),
        reason,
    };

    let value: Value = serde_json::from_str(payload).map_err(|e| malformed(e.to_string()))?;
    if !value.is_object() {
        return Err(malformed("payload is not a JSON object".into()));
    }
    let record: EventRecord =
        serde_json::from_value(value).map_err(|e| malformed(e.to_string()))?;
    if record.event.is_empty() {
        return Err(malformed("empty `event` field".into()));
    }
    Ok(Some(record))
}

/// Parse every event in `lines`, in order. Unmarked and malformed lines are
/// skipped.
pub fn parse_event_lines<S: AsRef<str>>(lines: &[S]) -> Vec<EventRecord> {
    lines
        .iter()
        .filter_map(|line| match parse_event_line(line.as_ref()) {
            Ok(record) => record,
            Err(e) => {
                tracing::debug!(error = %e, "skipping malformed event log");
                None
            }
        })
        .collect()
}
