// Significance heuristic for schedule changes

use chrono::{DateTime, Duration, Utc};
use chrono_tz::Tz;
use tracing::debug;

use crate::intervals::{IntervalSet, SCHEDULE_TZ};

/// Default lookahead after which a vanished interval still matters
pub const DEFAULT_LOOKAHEAD_MINUTES: i64 = 10;

/// Decides whether the difference between two snapshots warrants a push
#[derive(Debug, Clone)]
pub struct ChangeEvaluator {
    lookahead: Duration,
}

impl Default for ChangeEvaluator {
    fn default() -> Self {
        Self {
            lookahead: Duration::minutes(DEFAULT_LOOKAHEAD_MINUTES),
        }
    }
}

impl ChangeEvaluator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_lookahead(lookahead: Duration) -> Self {
        Self { lookahead }
    }

    pub fn lookahead(&self) -> Duration {
        self.lookahead
    }

    /// Evaluate against the current instant
    pub fn evaluate(&self, saved: &IntervalSet, fresh: &IntervalSet) -> bool {
        let now = Utc::now().with_timezone(&SCHEDULE_TZ);
        self.evaluate_at(saved, fresh, now)
    }

    /// Returns true when watchers of the queue should be notified
    ///
    /// - More fresh intervals than saved: always notify.
    /// - Fewer: notify if more than one saved interval vanished, or if the one
    ///   that vanished has not ended by `now + lookahead`.
    /// - Same count: notify if any fresh interval is not in the saved set.
    pub fn evaluate_at(&self, saved: &IntervalSet, fresh: &IntervalSet, now: DateTime<Tz>) -> bool {
        let soon = now + self.lookahead;

        if fresh.len() > saved.len() {
            debug!(
                added = fresh.len() - saved.len(),
                "New intervals appeared"
            );
            return true;
        }

        if fresh.len() < saved.len() {
            let missing = saved.missing_from(fresh);
            debug!(
                removed = saved.len() - fresh.len(),
                missing = missing.len(),
                "Intervals disappeared"
            );

            if missing.len() > 1 {
                return true;
            }
            // A single interval that already ended (or is about to) is stale, not news
            return missing.iter().any(|interval| interval.end >= soon);
        }

        let diff = fresh.missing_from(saved);
        debug!(changed = diff.len(), "Comparing equal-length snapshots");

        !diff.is_empty()
    }
}
