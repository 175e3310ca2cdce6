// Snapshot differ: pairs every fetched payload with its last saved payload

use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use crate::evaluator::ChangeEvaluator;
use crate::intervals::IntervalSet;
use crate::models::{CycleOutcome, FetchedRecord};

/// Field holding the list of outage entries
pub const DATA_FIELD: &str = "aData";
/// Entry field holding the outage start
pub const START_FIELD: &str = "acc_begin";
/// Entry field holding the planned outage end
pub const END_FIELD: &str = "accend_plan";

/// Build an interval set from a payload's entry list
///
/// Entries without a non-empty start and end are skipped.
pub fn intervals_from_entries(entries: &[Value]) -> IntervalSet {
    let mut set = IntervalSet::new();
    for entry in entries {
        let start = entry.get(START_FIELD).and_then(Value::as_str);
        let end = entry.get(END_FIELD).and_then(Value::as_str);

        match (start, end) {
            (Some(start), Some(end)) if !start.is_empty() && !end.is_empty() => {
                set.append(start, end);
            }
            _ => continue,
        }
    }
    set
}

/// Interval set stored in a persisted payload; anything unreadable is empty
pub fn intervals_from_saved(raw: &str) -> IntervalSet {
    if raw.trim().is_empty() {
        return IntervalSet::new();
    }

    let saved: Value = match serde_json::from_str(raw) {
        Ok(value) => value,
        Err(e) => {
            debug!(error = %e, "Saved payload is not valid JSON, treating as empty");
            return IntervalSet::new();
        }
    };

    match saved.get(DATA_FIELD).and_then(Value::as_array) {
        Some(entries) => intervals_from_entries(entries),
        None => IntervalSet::new(),
    }
}

/// Null, `false`, zero and empty values stand in for an empty entry list
fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(flag) => !flag,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(fields) => fields.is_empty(),
    }
}

/// Compares fetched payloads with saved ones and lists the queues to notify
#[derive(Debug, Clone, Default)]
pub struct SnapshotDiffer {
    evaluator: ChangeEvaluator,
}

impl SnapshotDiffer {
    pub fn new(evaluator: ChangeEvaluator) -> Self {
        Self { evaluator }
    }

    /// Changed queue identifiers in input order, duplicates kept
    #[instrument(skip_all, fields(records = records.len()))]
    pub fn find_changes(&self, records: &[FetchedRecord]) -> CycleOutcome {
        let mut changed_queues = Vec::new();

        for record in records {
            let account = record.account();
            let queue = record.queue();

            if !record.tracked.has_account() {
                warn!(queue, "Skipping record without account");
                continue;
            }

            let fresh_entries = match record.oblenergo_response.get(DATA_FIELD) {
                None => &[][..],
                Some(Value::Array(entries)) => entries.as_slice(),
                Some(value) if is_blank(value) => &[][..],
                Some(_) => {
                    warn!(account, queue, "Upstream data field is not a list, skipping");
                    continue;
                }
            };

            let saved = intervals_from_saved(&record.tracked.intervals);
            let fresh = intervals_from_entries(fresh_entries);

            debug!(
                account,
                queue,
                saved = %saved.pretty_print(false),
                fresh = %fresh.pretty_print(false),
                "Comparing snapshots"
            );

            if self.evaluator.evaluate(&saved, &fresh) {
                info!(account, queue, "Significant schedule change detected");
                changed_queues.push(queue.to_string());
            }
        }

        info!(changed = ?changed_queues, "Finished snapshot comparison");
        CycleOutcome::new(changed_queues)
    }
}
