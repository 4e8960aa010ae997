//! Shapes reconciliation and booking results for the result sink.

use std::collections::BTreeMap;

use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use tracing::{info, warn};
use ulid::Ulid;

use crate::model::*;
use crate::reconcile::{Reconciliation, SubjectFilter};
use crate::scheduler::ResourceScheduler;
use crate::source::{MalformedRecord, Parsed, TaskRequest};

/// Header of the `missing_submission` and `extra_submission` sheets.
pub const SHEET_HEADER: [&str; 4] = ["Employee", "Title", "Start", "End"];

pub const MISSING_SUBMISSION_SHEET: &str = "missing_submission";
pub const EXTRA_SUBMISSION_SHEET: &str = "extra_submission";

fn sheet_row(subject: &str, record: TimeRecord<'_>) -> Vec<String> {
    vec![
        subject.to_string(),
        record.title().to_string(),
        record.start().to_rfc3339_opts(SecondsFormat::Secs, true),
        record.end().to_rfc3339_opts(SecondsFormat::Secs, true),
    ]
}

fn with_header(rows: impl Iterator<Item = Vec<String>>) -> Vec<Vec<String>> {
    let header: Vec<String> = SHEET_HEADER.iter().map(|h| h.to_string()).collect();
    std::iter::once(header).chain(rows).collect()
}

/// Rows for events nobody submitted, header first.
pub fn missing_submission_rows(out: &Reconciliation) -> Vec<Vec<String>> {
    with_header(out.unmatched_events.iter().flat_map(|(subject, events)| {
        events
            .iter()
            .map(move |e| sheet_row(subject, TimeRecord::Event(e)))
    }))
}

/// Rows for submissions with no calendar event, header first.
pub fn extra_submission_rows(out: &Reconciliation) -> Vec<Vec<String>> {
    with_header(out.unmatched_submissions.iter().flat_map(|(subject, subs)| {
        subs.iter()
            .map(move |s| sheet_row(subject, TimeRecord::Submission(s)))
    }))
}

/// Scheduled hours per attendee, skipping excluded subjects.
pub fn hours_by_subject<F: SubjectFilter>(events: &[CalendarEvent], filter: &F) -> BTreeMap<String, f64> {
    let mut hours: BTreeMap<String, f64> = BTreeMap::new();
    for event in events {
        for subject in event.subjects().into_iter().filter(|s| !filter.is_excluded(s)) {
            *hours.entry(subject.to_string()).or_insert(0.0) += event.duration_hours();
        }
    }
    hours
}

/// Result of one task request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskOutcome {
    pub name: String,
    pub booking_id: Option<Ulid>,
    pub error: Option<String>,
}

/// Book each task in order, recording acceptances and rejections.
pub fn book_tasks(scheduler: &ResourceScheduler, tasks: &[TaskRequest]) -> Vec<TaskOutcome> {
    tasks
        .iter()
        .map(|task| {
            let result = Span::new(task.start, task.end).and_then(|span| {
                scheduler.book_task(&task.name, &task.employees, &task.machines, span)
            });
            match result {
                Ok(booking) => TaskOutcome {
                    name: task.name.clone(),
                    booking_id: Some(booking.id),
                    error: None,
                },
                Err(e) => {
                    warn!(task = %task.name, "task not booked: {e}");
                    TaskOutcome {
                        name: task.name.clone(),
                        booking_id: None,
                        error: Some(e.to_string()),
                    }
                }
            }
        })
        .collect()
}

/// One line of a resource schedule listing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScheduleLine {
    pub task: String,
    pub start: Instant,
    pub end: Instant,
}

/// Every booked resource's schedule, keyed by `kind:name`.
pub fn schedules(scheduler: &ResourceScheduler) -> BTreeMap<String, Vec<ScheduleLine>> {
    scheduler
        .resources()
        .into_iter()
        .map(|resource| {
            let lines = scheduler
                .schedule_for(&resource)
                .into_iter()
                .map(|b| ScheduleLine {
                    task: b.label,
                    start: b.span.start(),
                    end: b.span.end(),
                })
                .collect();
            (resource.to_string(), lines)
        })
        .collect()
}

/// Everything one run produces, serialized as the run's output document.
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub generated_at: Instant,
    pub events_parsed: usize,
    pub submissions_parsed: usize,
    pub rejected_events: Vec<MalformedRecord>,
    pub rejected_submissions: Vec<MalformedRecord>,
    pub matched: usize,
    pub superseded_events: usize,
    pub superseded_submissions: usize,
    pub missing_submission: Vec<Vec<String>>,
    pub extra_submission: Vec<Vec<String>>,
    pub hours_by_subject: BTreeMap<String, f64>,
    pub tasks: Vec<TaskOutcome>,
    pub schedules: BTreeMap<String, Vec<ScheduleLine>>,
}

impl Report {
    pub fn new(
        events: Parsed<CalendarEvent>,
        submissions: Parsed<SubmissionRecord>,
        reconciliation: &Reconciliation,
        hours_by_subject: BTreeMap<String, f64>,
    ) -> Self {
        Self {
            generated_at: Utc::now(),
            events_parsed: events.records.len(),
            submissions_parsed: submissions.records.len(),
            rejected_events: events.rejected,
            rejected_submissions: submissions.rejected,
            matched: reconciliation.matched,
            superseded_events: reconciliation.superseded_events,
            superseded_submissions: reconciliation.superseded_submissions,
            missing_submission: missing_submission_rows(reconciliation),
            extra_submission: extra_submission_rows(reconciliation),
            hours_by_subject,
            tasks: Vec::new(),
            schedules: BTreeMap::new(),
        }
    }

    pub fn with_tasks(mut self, scheduler: &ResourceScheduler, tasks: Vec<TaskOutcome>) -> Self {
        self.tasks = tasks;
        self.schedules = schedules(scheduler);
        self
    }
}

/// Per-subject summary lines for the log.
pub fn log_summary(out: &Reconciliation) {
    for (subject, events) in &out.unmatched_events {
        info!(%subject, count = events.len(), "unmatched events");
    }
    for (subject, subs) in &out.unmatched_submissions {
        info!(%subject, count = subs.len(), "unmatched submissions");
    }
    info!(
        matched = out.matched,
        missing = out.unmatched_event_count(),
        extra = out.unmatched_submission_count(),
        "reconciliation finished"
    );
}
