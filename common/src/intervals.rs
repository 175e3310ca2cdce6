// Outage interval sets
//
// Upstream schedules arrive as pairs of local wall-clock strings. They are
// parsed into the schedule time zone and kept as a sorted, merged set so two
// snapshots of the same schedule can be compared structurally.

use chrono::{DateTime, Duration, LocalResult, NaiveDateTime, TimeZone};
use chrono_tz::Tz;

/// Time zone every upstream timestamp is expressed in
pub const SCHEDULE_TZ: Tz = chrono_tz::Europe::Kyiv;

/// Format of `acc_begin` / `accend_plan` values
pub const INPUT_FORMAT: &str = "%d-%m-%Y %H:%M";

/// Format used when rendering intervals for logs and messages
pub const OUTPUT_FORMAT: &str = "%d.%m %H:%M";

/// A contiguous planned outage, bounds inclusive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Interval {
    pub start: DateTime<Tz>,
    pub end: DateTime<Tz>,
}

impl Interval {
    /// Build an interval, rejecting reversed bounds
    pub fn new(start: DateTime<Tz>, end: DateTime<Tz>) -> Option<Self> {
        (start <= end).then_some(Self { start, end })
    }

    /// Parse a pair of upstream timestamps
    ///
    /// Returns `None` when either value is malformed or the range is reversed.
    pub fn parse(raw_start: &str, raw_end: &str) -> Option<Self> {
        let start = parse_timestamp(raw_start)?;
        let end = parse_timestamp(raw_end)?;
        Self::new(start, end)
    }

    pub fn contains(&self, instant: &DateTime<Tz>) -> bool {
        self.start <= *instant && *instant <= self.end
    }

    pub fn pretty(&self) -> String {
        format!(
            "[{}-{}]",
            self.start.format(OUTPUT_FORMAT),
            self.end.format(OUTPUT_FORMAT)
        )
    }
}

/// Parse one upstream timestamp and attach the schedule time zone
///
/// Times repeated by a DST transition resolve to the earlier instant. Times
/// skipped by a transition are read with the offset in force before it, so
/// `03:30` on a spring-forward night lands at `04:30` summer time.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Tz>> {
    let naive = NaiveDateTime::parse_from_str(raw, INPUT_FORMAT).ok()?;
    match SCHEDULE_TZ.from_local_datetime(&naive) {
        LocalResult::Single(instant) => Some(instant),
        LocalResult::Ambiguous(earliest, _) => Some(earliest),
        LocalResult::None => {
            let before_gap = SCHEDULE_TZ
                .from_local_datetime(&(naive - Duration::hours(1)))
                .earliest()?;
            Some(before_gap + Duration::hours(1))
        }
    }
}

/// Ordered, merged set of outage intervals
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IntervalSet {
    intervals: Vec<Interval>,
}

impl IntervalSet {
    pub fn new() -> Self {
        Self {
            intervals: Vec::new(),
        }
    }

    /// Parse and insert a range; malformed input is ignored
    pub fn append(&mut self, raw_start: &str, raw_end: &str) {
        let Some(interval) = Interval::parse(raw_start, raw_end) else {
            tracing::trace!(raw_start, raw_end, "Dropping unparseable interval");
            return;
        };
        self.insert(interval);
    }

    /// Insert an already-parsed interval and re-merge
    pub fn insert(&mut self, interval: Interval) {
        self.intervals.push(interval);
        self.merge_all();
    }

    /// Sort by start and collapse every overlapping or touching pair
    pub fn merge_all(&mut self) {
        if self.intervals.len() <= 1 {
            return;
        }

        self.intervals.sort_by_key(|interval| interval.start);

        let mut merged: Vec<Interval> = Vec::with_capacity(self.intervals.len());
        let mut current = self.intervals[0];

        for next in &self.intervals[1..] {
            if next.start <= current.end {
                current = Interval {
                    start: current.start.min(next.start),
                    end: current.end.max(next.end),
                };
            } else {
                merged.push(current);
                current = *next;
            }
        }

        merged.push(current);
        self.intervals = merged;
    }

    /// First interval containing `instant`
    pub fn containing(&self, instant: &DateTime<Tz>) -> Option<&Interval> {
        self.intervals.iter().find(|interval| interval.contains(instant))
    }

    pub fn is_within(&self, instant: &DateTime<Tz>) -> bool {
        self.containing(instant).is_some()
    }

    /// Structural membership test
    pub fn contains_interval(&self, interval: &Interval) -> bool {
        self.intervals.contains(interval)
    }

    /// Intervals of `self` that are not structurally present in `other`
    pub fn missing_from(&self, other: &IntervalSet) -> Vec<Interval> {
        self.intervals
            .iter()
            .filter(|interval| !other.contains_interval(interval))
            .copied()
            .collect()
    }

    pub fn pretty_print(&self, multiline: bool) -> String {
        let separator = if multiline { "\n" } else { "" };
        self.intervals
            .iter()
            .map(Interval::pretty)
            .collect::<Vec<_>>()
            .join(separator)
    }

    pub fn len(&self) -> usize {
        self.intervals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.intervals.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Interval> {
        self.intervals.iter()
    }

    pub fn as_slice(&self) -> &[Interval] {
        &self.intervals
    }
}

impl FromIterator<Interval> for IntervalSet {
    fn from_iter<I: IntoIterator<Item = Interval>>(iter: I) -> Self {
        let mut set = IntervalSet::new();
        set.intervals.extend(iter);
        set.merge_all();
        set
    }
}

impl<'a> IntoIterator for &'a IntervalSet {
    type Item = &'a Interval;
    type IntoIter = std::slice::Iter<'a, Interval>;

    fn into_iter(self) -> Self::IntoIter {
        self.intervals.iter()
    }
}
