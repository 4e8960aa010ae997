use std::fmt;

use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::limits::*;
use crate::scheduler::SchedulerError;

/// A point on the UTC timeline. The only time type: zoned inputs are
/// converted on the way in; naive timestamps never reach the domain.
pub type Instant = DateTime<Utc>;

fn hours(delta: TimeDelta) -> f64 {
    delta.num_milliseconds() as f64 / 3_600_000.0
}

/// Half-open interval `[start, end)` with `start < end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawSpan")]
pub struct Span {
    start: Instant,
    end: Instant,
}

#[derive(Deserialize)]
struct RawSpan {
    start: Instant,
    end: Instant,
}

impl TryFrom<RawSpan> for Span {
    type Error = SchedulerError;

    fn try_from(raw: RawSpan) -> Result<Self, Self::Error> {
        Span::new(raw.start, raw.end)
    }
}

impl Span {
    /// Build a span from two zoned instants. Both are normalized to UTC.
    pub fn new<Tz: TimeZone>(start: DateTime<Tz>, end: DateTime<Tz>) -> Result<Self, SchedulerError> {
        let start = start.with_timezone(&Utc);
        let end = end.with_timezone(&Utc);
        if start >= end {
            return Err(SchedulerError::InvalidInterval { start, end });
        }
        if start.timestamp_millis() < MIN_VALID_TIMESTAMP_MS
            || end.timestamp_millis() > MAX_VALID_TIMESTAMP_MS
        {
            return Err(SchedulerError::LimitExceeded("timestamp out of range"));
        }
        Ok(Self { start, end })
    }

    pub fn start(&self) -> Instant {
        self.start
    }

    pub fn end(&self) -> Instant {
        self.end
    }

    pub fn duration(&self) -> TimeDelta {
        self.end - self.start
    }

    pub fn overlaps(&self, other: &Span) -> bool {
        self.start < other.end && other.start < self.end
    }

    pub fn contains_instant(&self, t: Instant) -> bool {
        self.start <= t && t < self.end
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start.to_rfc3339(), self.end.to_rfc3339())
    }
}

/// Employees and machines are booked from separate namespaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Employee,
    Machine,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceKind::Employee => f.write_str("employee"),
            ResourceKind::Machine => f.write_str("machine"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResourceId {
    pub kind: ResourceKind,
    pub name: String,
}

impl ResourceId {
    pub fn employee(name: impl Into<String>) -> Self {
        Self {
            kind: ResourceKind::Employee,
            name: name.into(),
        }
    }

    pub fn machine(name: impl Into<String>) -> Self {
        Self {
            kind: ResourceKind::Machine,
            name: name.into(),
        }
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.name)
    }
}

/// A committed reservation. Immutable once admitted by the scheduler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Booking {
    pub id: Ulid,
    pub resources: Vec<ResourceId>,
    pub span: Span,
    pub label: String,
}

// ── Reconciliation records ───────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Attendee {
    pub display_name: Option<String>,
    pub email: Option<String>,
    pub response_status: Option<String>,
}

/// A calendar entry. Every named attendee is a subject of its own.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarEvent {
    pub title: String,
    pub start: Instant,
    pub end: Instant,
    /// Set when the source only gave dates; start/end then sit on local midnight.
    pub all_day: bool,
    pub attendees: Vec<Attendee>,
    pub location: String,
    pub html_link: String,
    pub created: Option<Instant>,
    pub updated: Option<Instant>,
}

impl CalendarEvent {
    /// Distinct attendee display names, trimmed, in source order. Attendees
    /// without one are skipped.
    pub fn subjects(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::with_capacity(self.attendees.len());
        for name in self
            .attendees
            .iter()
            .filter_map(|a| a.display_name.as_deref())
            .map(str::trim)
        {
            if !name.is_empty() && !names.contains(&name) {
                names.push(name);
            }
        }
        names
    }

    pub fn duration_hours(&self) -> f64 {
        hours(self.end - self.start)
    }
}

/// One timesheet row as submitted by a worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionRecord {
    pub subject: String,
    pub start: Instant,
    pub end: Instant,
    pub title: String,
    pub submitted_at: Instant,
}

impl SubmissionRecord {
    pub fn duration_hours(&self) -> f64 {
        hours(self.end - self.start)
    }
}

/// Either side of a reconciliation, borrowed from the caller's collections.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeRecord<'a> {
    Event(&'a CalendarEvent),
    Submission(&'a SubmissionRecord),
}

impl<'a> TimeRecord<'a> {
    pub fn start(&self) -> Instant {
        match self {
            TimeRecord::Event(e) => e.start,
            TimeRecord::Submission(s) => s.start,
        }
    }

    pub fn end(&self) -> Instant {
        match self {
            TimeRecord::Event(e) => e.end,
            TimeRecord::Submission(s) => s.end,
        }
    }

    pub fn title(&self) -> &'a str {
        match *self {
            TimeRecord::Event(e) => &e.title,
            TimeRecord::Submission(s) => &s.title,
        }
    }

    /// Subjects this record speaks for, trimmed and in source order.
    pub fn subjects(&self) -> Vec<&'a str> {
        match *self {
            TimeRecord::Event(e) => e.subjects(),
            TimeRecord::Submission(s) => match s.subject.trim() {
                "" => Vec::new(),
                name => vec![name],
            },
        }
    }

    pub fn key_for(&self, subject: &str) -> ReconciliationKey {
        ReconciliationKey::new(subject, self.start(), self.end())
    }
}

/// Join key shared by both sides. Instants are encoded as UTC Unix
/// milliseconds; both record kinds go through [`ReconciliationKey::new`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ReconciliationKey {
    pub subject: String,
    pub start_ms: i64,
    pub end_ms: i64,
}

impl ReconciliationKey {
    pub fn new(subject: &str, start: Instant, end: Instant) -> Self {
        Self {
            subject: subject.to_string(),
            start_ms: start.timestamp_millis(),
            end_ms: end.timestamp_millis(),
        }
    }
}
