//! Adapters from the calendar/spreadsheet payload shapes to domain records.
//!
//! Every instant is converted to UTC here. Local wall-clock values (sheet
//! rows, date-only calendar entries) are placed in a reference zone first.
//! A record that fails to parse is logged, counted and handed back in
//! [`Parsed::rejected`]; it never aborts the batch.

use std::fmt;
use std::io;
use std::path::Path;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::limits::MAX_SUBMISSION_ROWS;
use crate::model::*;
use crate::observability::RECORDS_MALFORMED_TOTAL;

/// Format of sheet timestamps, and of `job_date + " " + time`.
pub const DATE_FORMAT: &str = "%d/%m/%Y %H:%M:%S";

const COL_SUBMITTED_AT: usize = 0;
const COL_JOB_DATE: usize = 1;
const COL_SUBMITTER: usize = 2;
const COL_START: usize = 3;
const COL_END: usize = 4;
const COL_TITLE: usize = 5;

/// An input record that could not be turned into a domain record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MalformedRecord {
    pub raw: String,
    pub reason: String,
}

impl fmt::Display for MalformedRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "malformed record {}: {}", self.raw, self.reason)
    }
}

impl std::error::Error for MalformedRecord {}

#[derive(Debug, Clone, PartialEq)]
pub struct Parsed<T> {
    pub records: Vec<T>,
    pub rejected: Vec<MalformedRecord>,
}

impl<T> Default for Parsed<T> {
    fn default() -> Self {
        Self {
            records: Vec::new(),
            rejected: Vec::new(),
        }
    }
}

fn localize(tz: Tz, naive: NaiveDateTime) -> Result<Instant, String> {
    // Ambiguous wall-clock times (clocks going back) take the earlier instant.
    tz.from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
        .ok_or_else(|| format!("{naive} does not exist in {}", tz.name()))
}

// ── Calendar events ─────────────────────────────────────────────

/// Calendar API event, as listed with `singleEvents=true`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawEvent {
    #[serde(default)]
    pub summary: String,
    pub start: Option<RawEventTime>,
    pub end: Option<RawEventTime>,
    #[serde(default)]
    pub attendees: Vec<RawAttendee>,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub html_link: String,
    pub created: Option<String>,
    pub updated: Option<String>,
}

/// Either a precise `dateTime` or an all-day `date`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawEventTime {
    pub date_time: Option<String>,
    pub date: Option<String>,
    pub time_zone: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawAttendee {
    pub display_name: Option<String>,
    pub email: Option<String>,
    pub response_status: Option<String>,
}

/// Resolve one boundary. Returns the instant and whether it was date-only.
fn event_time(raw: Option<&RawEventTime>, which: &str, reference: Tz) -> Result<(Instant, bool), String> {
    let raw = raw.ok_or_else(|| format!("missing {which}"))?;
    let zone = || -> Result<Tz, String> {
        match raw.time_zone.as_deref() {
            Some(name) => name
                .parse::<Tz>()
                .map_err(|_| format!("unknown time zone {name:?} on {which}")),
            None => Ok(reference),
        }
    };

    if let Some(s) = raw.date_time.as_deref() {
        if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
            return Ok((dt.with_timezone(&Utc), false));
        }
        // Offset-less dateTime is wall-clock time in the event's zone.
        let naive = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S")
            .map_err(|e| format!("bad {which} dateTime {s:?}: {e}"))?;
        return Ok((localize(zone()?, naive)?, false));
    }

    if let Some(s) = raw.date.as_deref() {
        let date = NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .map_err(|e| format!("bad {which} date {s:?}: {e}"))?;
        return Ok((localize(zone()?, date.and_time(NaiveTime::MIN))?, true));
    }

    Err(format!("missing {which} value"))
}

fn optional_rfc3339(raw: Option<&str>, which: &str) -> Result<Option<Instant>, String> {
    match raw {
        None | Some("") => Ok(None),
        Some(s) => DateTime::parse_from_rfc3339(s)
            .map(|dt| Some(dt.with_timezone(&Utc)))
            .map_err(|e| format!("bad {which} timestamp {s:?}: {e}")),
    }
}

/// Convert one calendar payload. Date-only boundaries are anchored at local
/// midnight in the reference zone (or the event's own zone) and flag the
/// event as all-day.
pub fn parse_event(raw: &RawEvent, reference: Tz) -> Result<CalendarEvent, MalformedRecord> {
    let convert = || -> Result<CalendarEvent, String> {
        let (start, start_all_day) = event_time(raw.start.as_ref(), "start", reference)?;
        let (end, end_all_day) = event_time(raw.end.as_ref(), "end", reference)?;
        Ok(CalendarEvent {
            title: raw.summary.clone(),
            start,
            end,
            all_day: start_all_day || end_all_day,
            attendees: raw
                .attendees
                .iter()
                .map(|a| Attendee {
                    display_name: a.display_name.clone(),
                    email: a.email.clone(),
                    response_status: a.response_status.clone(),
                })
                .collect(),
            location: raw.location.clone(),
            html_link: raw.html_link.clone(),
            created: optional_rfc3339(raw.created.as_deref(), "created")?,
            updated: optional_rfc3339(raw.updated.as_deref(), "updated")?,
        })
    };
    convert().map_err(|reason| MalformedRecord {
        raw: serde_json::to_string(raw).unwrap_or_else(|_| raw.summary.clone()),
        reason,
    })
}

pub fn parse_events(raws: &[RawEvent], reference: Tz) -> Parsed<CalendarEvent> {
    let mut out = Parsed::default();
    for raw in raws {
        match parse_event(raw, reference) {
            Ok(event) => out.records.push(event),
            Err(e) => {
                warn!(reason = %e.reason, raw = %e.raw, "skipping calendar event");
                metrics::counter!(RECORDS_MALFORMED_TOTAL, "source" => "event").increment(1);
                out.rejected.push(e);
            }
        }
    }
    debug!(parsed = out.records.len(), rejected = out.rejected.len(), "calendar events");
    out
}

// ── Submission rows ─────────────────────────────────────────────

fn column<'r>(row: &'r [String], idx: usize, name: &str) -> Result<&'r str, String> {
    row.get(idx)
        .map(|s| s.trim())
        .ok_or_else(|| format!("missing column {idx} ({name})"))
}

fn wall_clock(s: &str, name: &str, reference: Tz) -> Result<Instant, String> {
    let naive = NaiveDateTime::parse_from_str(s, DATE_FORMAT)
        .map_err(|e| format!("bad {name} {s:?}: {e}"))?;
    localize(reference, naive)
}

/// Convert one sheet row `[submitted_at, job_date, submitter, start_time,
/// end_time, title]`. Times are wall-clock in `reference`.
pub fn parse_submission_row(row: &[String], reference: Tz) -> Result<SubmissionRecord, MalformedRecord> {
    let convert = || -> Result<SubmissionRecord, String> {
        let job_date = column(row, COL_JOB_DATE, "job_date")?;
        let start_time = column(row, COL_START, "start_time")?;
        let end_time = column(row, COL_END, "end_time")?;
        let start = wall_clock(&format!("{job_date} {start_time}"), "start", reference)?;
        let end = wall_clock(&format!("{job_date} {end_time}"), "end", reference)?;
        // One job_date per row, so a shift past midnight cannot be expressed.
        if end < start {
            return Err(format!("end {end_time} is before start {start_time}"));
        }
        let submitted_at = wall_clock(
            column(row, COL_SUBMITTED_AT, "submitted_at")?,
            "submitted_at",
            reference,
        )?;
        Ok(SubmissionRecord {
            subject: column(row, COL_SUBMITTER, "submitter")?.to_string(),
            start,
            end,
            title: column(row, COL_TITLE, "title")?.to_string(),
            submitted_at,
        })
    };
    convert().map_err(|reason| MalformedRecord {
        raw: format!("{row:?}"),
        reason,
    })
}

pub fn parse_submissions(rows: &[Vec<String>], reference: Tz) -> Parsed<SubmissionRecord> {
    parse_submissions_bounded(rows, reference, MAX_SUBMISSION_ROWS)
}

/// Rows past `limit` are not parsed; each one is rejected so it still shows
/// up in the report.
fn parse_submissions_bounded(
    rows: &[Vec<String>],
    reference: Tz,
    limit: usize,
) -> Parsed<SubmissionRecord> {
    let mut out = Parsed::default();
    let (within, beyond) = rows.split_at(rows.len().min(limit));
    for row in within {
        match parse_submission_row(row, reference) {
            Ok(record) => out.records.push(record),
            Err(e) => {
                warn!(reason = %e.reason, raw = %e.raw, "skipping submission row");
                metrics::counter!(RECORDS_MALFORMED_TOTAL, "source" => "submission").increment(1);
                out.rejected.push(e);
            }
        }
    }
    if !beyond.is_empty() {
        warn!(
            rows = rows.len(),
            limit,
            dropped = beyond.len(),
            "submission sheet over row limit"
        );
        metrics::counter!(RECORDS_MALFORMED_TOTAL, "source" => "submission")
            .increment(beyond.len() as u64);
        out.rejected.extend(beyond.iter().map(|row| MalformedRecord {
            raw: format!("{row:?}"),
            reason: format!("row limit of {limit} exceeded"),
        }));
    }
    debug!(parsed = out.records.len(), rejected = out.rejected.len(), "submission rows");
    out
}

// ── Task requests ───────────────────────────────────────────────

/// A request to book a task on employees and machines. Boundaries must carry
/// an offset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRequest {
    pub name: String,
    #[serde(default)]
    pub employees: Vec<String>,
    #[serde(default)]
    pub machines: Vec<String>,
    pub start: DateTime<FixedOffset>,
    pub end: DateTime<FixedOffset>,
}

// ── File loaders ────────────────────────────────────────────────

/// Envelope of an events-list page. `items` is required so that an API
/// error object is not mistaken for an empty page.
#[derive(Deserialize)]
struct EventsPage {
    items: Vec<RawEvent>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum EventsDocument {
    List(Vec<RawEvent>),
    Page(EventsPage),
}

/// A sheet value range. The API omits `values` for an empty range but always
/// sends `range`.
#[derive(Deserialize)]
struct ValueRange {
    #[allow(dead_code)]
    range: String,
    #[serde(default)]
    values: Vec<Vec<String>>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RowsDocument {
    List(Vec<Vec<String>>),
    Range(ValueRange),
}

fn invalid_data(path: &Path, e: serde_json::Error) -> io::Error {
    io::Error::new(
        io::ErrorKind::InvalidData,
        format!("{}: {e}", path.display()),
    )
}

/// Load events from a JSON array or an events-list page (`{"items": [...]}`).
pub async fn load_events(path: &Path) -> io::Result<Vec<RawEvent>> {
    let bytes = tokio::fs::read(path).await?;
    let doc: EventsDocument = serde_json::from_slice(&bytes).map_err(|e| invalid_data(path, e))?;
    Ok(match doc {
        EventsDocument::List(items) | EventsDocument::Page(EventsPage { items }) => items,
    })
}

/// Load sheet rows from a JSON array of arrays or a value range (`{"values": [...]}`).
pub async fn load_rows(path: &Path) -> io::Result<Vec<Vec<String>>> {
    let bytes = tokio::fs::read(path).await?;
    let doc: RowsDocument = serde_json::from_slice(&bytes).map_err(|e| invalid_data(path, e))?;
    Ok(match doc {
        RowsDocument::List(values) | RowsDocument::Range(ValueRange { values, .. }) => values,
    })
}

pub async fn load_tasks(path: &Path) -> io::Result<Vec<TaskRequest>> {
    let bytes = tokio::fs::read(path).await?;
    serde_json::from_slice(&bytes).map_err(|e| invalid_data(path, e))
}
