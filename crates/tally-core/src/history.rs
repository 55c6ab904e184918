//! Per-record outcome handling for history batches.
//!
//! One corrupt record must never abort the rest of a page: the batch loop
//! consumes an explicit per-record outcome and converts discards into
//! warnings, keeping upstream response order for everything that survives.

use serde_json::{Map, Value};
use serde::Serialize;

use crate::domain::Location;
use crate::exchange::MessageSink;
use crate::NormalizationError;

/// Outcome of inspecting one raw record.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordOutcome<T> {
    /// Normalized into a canonical event.
    Event(T),
    /// Irrelevant record type or outside the query window; not an anomaly.
    Skip,
    /// Record could not be normalized; degrades the batch, does not abort it.
    Discard(NormalizationError),
}

/// User-visible anomaly raised while processing a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Warning {
    pub message: String,
}

impl Warning {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Events plus the side-channel warnings accumulated while producing them.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Collected<T> {
    pub events: Vec<T>,
    pub warnings: Vec<Warning>,
}

/// Fold raw records into events, absorbing per-record soft failures.
///
/// Unknown assets get an asset-named warning; any other discard gets a generic
/// warning pointing at the logs, with the full raw record logged for operator
/// diagnosis. Warnings are mirrored to the sink collaborator as they occur.
/// Output order follows input order.
pub fn fold_records<T>(
    location: Location,
    kind: &str,
    records: &[Value],
    sink: &dyn MessageSink,
    mut normalize: impl FnMut(&Map<String, Value>) -> RecordOutcome<T>,
) -> Collected<T> {
    let mut events = Vec::new();
    let mut warnings = Vec::new();

    for raw in records {
        let Some(record) = raw.as_object() else {
            tracing::error!(%location, record = %raw, "non-mapping record in {kind} history");
            let warning = generic_warning(location, kind);
            sink.error(&warning.message);
            warnings.push(warning);
            continue;
        };

        match normalize(record) {
            RecordOutcome::Event(event) => events.push(event),
            RecordOutcome::Skip => {}
            RecordOutcome::Discard(NormalizationError::UnknownAsset(name)) => {
                let warning = Warning::new(format!(
                    "Found {location} {kind} with unknown asset {name}. Ignoring it."
                ));
                sink.warn(&warning.message);
                warnings.push(warning);
            }
            RecordOutcome::Discard(error) => {
                let record = Value::Object(record.clone());
                tracing::error!(
                    %location,
                    record = %record,
                    %error,
                    "failed to deserialize a {kind} record"
                );
                let warning = generic_warning(location, kind);
                sink.error(&warning.message);
                warnings.push(warning);
            }
        }
    }

    Collected { events, warnings }
}

fn generic_warning(location: Location, kind: &str) -> Warning {
    Warning::new(format!(
        "Unexpected data encountered during deserialization of a {location} {kind}. \
         Check logs for details and open a bug report."
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exchange::CollectingSink;
    use serde_json::json;

    fn outcome_for(record: &Map<String, Value>) -> RecordOutcome<i64> {
        match record.get("kind").and_then(Value::as_str) {
            Some("good") => RecordOutcome::Event(record["value"].as_i64().unwrap_or_default()),
            Some("other") => RecordOutcome::Skip,
            Some("unknown-asset") => {
                RecordOutcome::Discard(NormalizationError::UnknownAsset(String::from("WTF")))
            }
            _ => RecordOutcome::Discard(NormalizationError::MissingKey(String::from("kind"))),
        }
    }

    #[test]
    fn one_bad_record_does_not_abort_the_batch() {
        let records = vec![
            json!({"kind": "good", "value": 1}),
            json!({"kind": "unknown-asset"}),
            json!({"kind": "good", "value": 2}),
        ];
        let sink = CollectingSink::new();

        let collected =
            fold_records(Location::Bitmex, "asset movement", &records, &sink, outcome_for);

        assert_eq!(collected.events, vec![1, 2]);
        assert_eq!(collected.warnings.len(), 1);
        assert!(collected.warnings[0].message.contains("WTF"));
        assert_eq!(sink.warnings().len(), 1);
    }

    #[test]
    fn skipped_records_produce_no_warnings() {
        let records = vec![json!({"kind": "other"})];
        let sink = CollectingSink::new();

        let collected =
            fold_records(Location::Bitmex, "asset movement", &records, &sink, outcome_for);

        assert!(collected.events.is_empty());
        assert!(collected.warnings.is_empty());
        assert!(sink.warnings().is_empty());
        assert!(sink.errors().is_empty());
    }

    #[test]
    fn deserialization_failures_use_the_generic_message() {
        let records = vec![json!({"value": 9})];
        let sink = CollectingSink::new();

        let collected =
            fold_records(Location::Bitmex, "asset movement", &records, &sink, outcome_for);

        assert!(collected.events.is_empty());
        assert_eq!(collected.warnings.len(), 1);
        assert!(collected.warnings[0].message.contains("Check logs"));
        assert_eq!(sink.errors().len(), 1);
    }

    #[test]
    fn output_preserves_input_order() {
        let records = vec![
            json!({"kind": "good", "value": 3}),
            json!({"kind": "good", "value": 1}),
            json!({"kind": "good", "value": 2}),
        ];
        let sink = CollectingSink::new();

        let collected =
            fold_records(Location::Bitmex, "asset movement", &records, &sink, outcome_for);

        assert_eq!(collected.events, vec![3, 1, 2]);
    }
}
