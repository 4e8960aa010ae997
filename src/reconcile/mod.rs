//! Join calendar events against timesheet submissions and report the
//! one-sided entries per subject.
//!
//! Keys are `(subject, start, end)` with millisecond UTC instants and no
//! tolerance window: a submission one second off its event is reported on both
//! sides. When two records of the same kind land on one key, the later one
//! replaces the earlier one; the replacement is logged and counted.


use std::collections::{BTreeMap, HashMap};

use serde::Serialize;
use tracing::{debug, warn};

use crate::model::*;
use crate::observability::{
    RECONCILE_DURATION_SECONDS, RECONCILE_MATCHED_TOTAL, RECONCILE_SUPERSEDED_TOTAL,
    RECONCILE_UNMATCHED_TOTAL,
};

/// Decides which event attendees take no part in reconciliation.
pub trait SubjectFilter {
    fn is_excluded(&self, subject: &str) -> bool;
}

impl<F: Fn(&str) -> bool> SubjectFilter for F {
    fn is_excluded(&self, subject: &str) -> bool {
        self(subject)
    }
}

/// Excludes subjects whose name contains a marker, e.g. `"Machine"` for
/// equipment added to calendar events as attendees. An empty marker excludes
/// nothing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubstringFilter {
    needle: String,
}

impl SubstringFilter {
    pub fn new(needle: impl Into<String>) -> Self {
        Self {
            needle: needle.into(),
        }
    }
}

impl Default for SubstringFilter {
    fn default() -> Self {
        Self::new("Machine")
    }
}

impl SubjectFilter for SubstringFilter {
    fn is_excluded(&self, subject: &str) -> bool {
        !self.needle.is_empty() && subject.contains(&self.needle)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoFilter;

impl SubjectFilter for NoFilter {
    fn is_excluded(&self, _subject: &str) -> bool {
        false
    }
}

/// Both sides seen for one key. A cell exists only once one side was written.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JoinCell<'a> {
    pub event: Option<&'a CalendarEvent>,
    pub submission: Option<&'a SubmissionRecord>,
}

/// Keyed join of both record sets. Cells keep first-write order.
#[derive(Debug, Default)]
pub struct Join<'a> {
    cells: Vec<(ReconciliationKey, JoinCell<'a>)>,
    positions: HashMap<ReconciliationKey, usize>,
    superseded_events: usize,
    superseded_submissions: usize,
}

impl<'a> Join<'a> {
    fn cell_mut(&mut self, key: ReconciliationKey) -> &mut JoinCell<'a> {
        let idx = match self.positions.get(&key) {
            Some(&idx) => idx,
            None => {
                let idx = self.cells.len();
                self.positions.insert(key.clone(), idx);
                self.cells.push((key, JoinCell::default()));
                idx
            }
        };
        &mut self.cells[idx].1
    }

    fn place(&mut self, key: ReconciliationKey, record: TimeRecord<'a>) {
        let replaced = {
            let cell = self.cell_mut(key.clone());
            match record {
                TimeRecord::Event(e) => cell.event.replace(e).is_some(),
                TimeRecord::Submission(s) => cell.submission.replace(s).is_some(),
            }
        };
        if replaced {
            let side = match record {
                TimeRecord::Event(_) => {
                    self.superseded_events += 1;
                    "event"
                }
                TimeRecord::Submission(_) => {
                    self.superseded_submissions += 1;
                    "submission"
                }
            };
            metrics::counter!(RECONCILE_SUPERSEDED_TOTAL, "side" => side).increment(1);
            warn!(
                subject = %key.subject,
                start_ms = key.start_ms,
                end_ms = key.end_ms,
                side,
                "duplicate key, earlier record replaced"
            );
        }
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn get(&self, key: &ReconciliationKey) -> Option<&JoinCell<'a>> {
        self.positions.get(key).map(|&idx| &self.cells[idx].1)
    }

    pub fn cells(&self) -> impl Iterator<Item = (&ReconciliationKey, &JoinCell<'a>)> {
        self.cells.iter().map(|(k, c)| (k, c))
    }

    /// Split cells into matched and one-sided entries.
    pub fn classify(self) -> Reconciliation {
        let mut out = Reconciliation {
            superseded_events: self.superseded_events,
            superseded_submissions: self.superseded_submissions,
            ..Default::default()
        };
        for (key, cell) in self.cells {
            match (cell.event, cell.submission) {
                (Some(_), Some(_)) => out.matched += 1,
                (Some(event), None) => out
                    .unmatched_events
                    .entry(key.subject)
                    .or_default()
                    .push(event.clone()),
                (None, Some(submission)) => out
                    .unmatched_submissions
                    .entry(key.subject)
                    .or_default()
                    .push(submission.clone()),
                (None, None) => unreachable!("cells are created on first write"),
            }
        }
        out
    }
}

/// Outcome of one reconciliation run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Reconciliation {
    /// Events with no submission, per subject, in input order.
    pub unmatched_events: BTreeMap<String, Vec<CalendarEvent>>,
    /// Submissions with no event, per subject, in input order.
    pub unmatched_submissions: BTreeMap<String, Vec<SubmissionRecord>>,
    pub matched: usize,
    pub superseded_events: usize,
    pub superseded_submissions: usize,
}

impl Reconciliation {
    pub fn is_clean(&self) -> bool {
        self.unmatched_events.is_empty() && self.unmatched_submissions.is_empty()
    }

    pub fn unmatched_event_count(&self) -> usize {
        self.unmatched_events.values().map(Vec::len).sum()
    }

    pub fn unmatched_submission_count(&self) -> usize {
        self.unmatched_submissions.values().map(Vec::len).sum()
    }
}

/// Pure join of two record collections; holds only the subject filter.
#[derive(Debug, Clone, Default)]
pub struct ReconciliationEngine<F = SubstringFilter> {
    filter: F,
}

impl<F: SubjectFilter> ReconciliationEngine<F> {
    pub fn new(filter: F) -> Self {
        Self { filter }
    }

    pub fn join<'a>(
        &self,
        events: &'a [CalendarEvent],
        submissions: &'a [SubmissionRecord],
    ) -> Join<'a> {
        let mut join = Join::default();
        for event in events {
            let record = TimeRecord::Event(event);
            for subject in record.subjects() {
                if self.filter.is_excluded(subject) {
                    debug!(subject, title = %event.title, "excluded attendee");
                    continue;
                }
                join.place(record.key_for(subject), record);
            }
        }
        for submission in submissions {
            let record = TimeRecord::Submission(submission);
            for subject in record.subjects() {
                join.place(record.key_for(subject), record);
            }
        }
        join
    }

    pub fn reconcile(
        &self,
        events: &[CalendarEvent],
        submissions: &[SubmissionRecord],
    ) -> Reconciliation {
        let started = std::time::Instant::now();
        let out = self.join(events, submissions).classify();

        metrics::counter!(RECONCILE_MATCHED_TOTAL).increment(out.matched as u64);
        metrics::counter!(RECONCILE_UNMATCHED_TOTAL, "side" => "event")
            .increment(out.unmatched_event_count() as u64);
        metrics::counter!(RECONCILE_UNMATCHED_TOTAL, "side" => "submission")
            .increment(out.unmatched_submission_count() as u64);
        metrics::histogram!(RECONCILE_DURATION_SECONDS).record(started.elapsed().as_secs_f64());
        debug!(
            events = events.len(),
            submissions = submissions.len(),
            matched = out.matched,
            "reconciled"
        );
        out
    }
}
