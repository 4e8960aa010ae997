use chrono::{TimeZone, Utc};
use chrono_tz::Europe::London;

use shiftcheck::model::*;
use shiftcheck::reconcile::{ReconciliationEngine, SubstringFilter};
use shiftcheck::report;
use shiftcheck::scheduler::{ResourceScheduler, SchedulerError};
use shiftcheck::source::{self, RawAttendee, RawEvent, RawEventTime};

// ── Test infrastructure ──────────────────────────────────────

fn utc(h: u32, m: u32) -> Instant {
    Utc.with_ymd_and_hms(2024, 5, 6, h, m, 0).unwrap()
}

fn alice_event(start: Instant, end: Instant) -> CalendarEvent {
    CalendarEvent {
        title: "Job A".into(),
        start,
        end,
        all_day: false,
        attendees: vec![Attendee {
            display_name: Some("Alice".into()),
            ..Default::default()
        }],
        location: String::new(),
        html_link: String::new(),
        created: None,
        updated: None,
    }
}

fn alice_submission(start: Instant, end: Instant) -> SubmissionRecord {
    SubmissionRecord {
        subject: "Alice".into(),
        start,
        end,
        title: "Job A".into(),
        submitted_at: utc(18, 0),
    }
}

fn row(cols: &[&str]) -> Vec<String> {
    cols.iter().map(|c| c.to_string()).collect()
}

fn raw_event(summary: &str, start: &str, end: &str, attendees: &[&str]) -> RawEvent {
    RawEvent {
        summary: summary.into(),
        start: Some(RawEventTime {
            date_time: Some(start.into()),
            ..Default::default()
        }),
        end: Some(RawEventTime {
            date_time: Some(end.into()),
            ..Default::default()
        }),
        attendees: attendees
            .iter()
            .map(|a| RawAttendee {
                display_name: Some(a.to_string()),
                ..Default::default()
            })
            .collect(),
        ..Default::default()
    }
}

// ── Reconciliation ───────────────────────────────────────────

#[test]
fn matching_event_and_submission_cancel_out() {
    let engine = ReconciliationEngine::<SubstringFilter>::default();
    let events = vec![alice_event(utc(9, 0), utc(12, 0))];
    let subs = vec![alice_submission(utc(9, 0), utc(12, 0))];

    let out = engine.reconcile(&events, &subs);
    assert!(out.unmatched_events.is_empty());
    assert!(out.unmatched_submissions.is_empty());
}

#[test]
fn five_minute_drift_reported_on_both_sides() {
    let engine = ReconciliationEngine::<SubstringFilter>::default();
    let events = vec![alice_event(utc(9, 0), utc(12, 0))];
    let subs = vec![alice_submission(utc(9, 5), utc(12, 0))];

    let out = engine.reconcile(&events, &subs);
    assert_eq!(out.unmatched_events["Alice"], events);
    assert_eq!(out.unmatched_submissions["Alice"], subs);
}

#[test]
fn sheet_rows_reconcile_against_calendar_payloads() {
    // Sheet times are London wall-clock (BST, UTC+1); calendar times carry offsets.
    let raw_events = vec![
        raw_event("Job A", "2024-05-06T09:00:00+01:00", "2024-05-06T12:00:00+01:00", &["Alice", "Machine 2"]),
        raw_event("Job B", "2024-05-06T13:00:00Z", "2024-05-06T15:00:00Z", &["Bob"]),
        RawEvent::default(),
    ];
    let rows = vec![
        row(&["06/05/2024 18:00:00", "06/05/2024", "Alice", "09:00:00", "12:00:00", "Job A"]),
        row(&["06/05/2024 18:00:00", "06/05/2024", "Bob", "14:00:00", "16:01:00", "Job B"]),
        row(&["06/05/2024 18:00:00", "not a date", "Carol", "09:00:00", "10:00:00", "Job C"]),
    ];

    let events = source::parse_events(&raw_events, London);
    let subs = source::parse_submissions(&rows, London);
    assert_eq!(events.rejected.len(), 1);
    assert_eq!(subs.rejected.len(), 1);

    let out = ReconciliationEngine::<SubstringFilter>::default().reconcile(&events.records, &subs.records);
    assert_eq!(out.matched, 1);
    assert!(!out.unmatched_events.contains_key("Alice"));
    assert!(!out.unmatched_events.contains_key("Machine 2"));
    assert_eq!(out.unmatched_events["Bob"].len(), 1);
    assert_eq!(out.unmatched_submissions["Bob"].len(), 1);

    let missing = report::missing_submission_rows(&out);
    assert_eq!(missing.len(), 2);
    assert_eq!(missing[1], vec!["Bob", "Job B", "2024-05-06T13:00:00Z", "2024-05-06T15:00:00Z"]);
}

// ── Scheduling ───────────────────────────────────────────────

#[test]
fn scheduling_scenario() {
    let day = |h: u32| Utc.with_ymd_and_hms(2023, 10, 1, h, 0, 0).unwrap();
    let span = |a: u32, b: u32| Span::new(day(a), day(b)).unwrap();
    let scheduler = ResourceScheduler::new();
    let e1 = ResourceId::employee("E1");
    let m1 = ResourceId::machine("M1");

    scheduler
        .book(&[e1.clone(), m1.clone()], span(8, 12), "Task 1")
        .unwrap();

    let err = scheduler.book(&[e1.clone()], span(11, 13), "Task 2").unwrap_err();
    assert!(matches!(
        err,
        SchedulerError::ResourceConflict { ref resource, requested, .. }
            if *resource == e1 && requested == span(11, 13)
    ));

    scheduler.book(&[e1.clone()], span(12, 13), "Task 3").unwrap();

    let labels: Vec<String> = scheduler
        .schedule_for(&e1)
        .into_iter()
        .map(|b| b.label)
        .collect();
    assert_eq!(labels, vec!["Task 1", "Task 3"]);
    assert_eq!(scheduler.schedule_for(&m1).len(), 1);
}

#[test]
fn zero_length_interval_never_inserted() {
    let at = Utc.with_ymd_and_hms(2023, 10, 1, 8, 0, 0).unwrap();
    let err = Span::new(at, at).unwrap_err();
    assert!(matches!(err, SchedulerError::InvalidInterval { .. }));
}
