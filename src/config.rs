use std::fmt;
use std::path::PathBuf;

use chrono_tz::Tz;

use crate::reconcile::SubstringFilter;

pub const DEFAULT_EVENTS_PATH: &str = "events.json";
pub const DEFAULT_SUBMISSIONS_PATH: &str = "submissions.json";
pub const DEFAULT_TIME_ZONE: Tz = chrono_tz::Europe::London;
pub const DEFAULT_EXCLUDE: &str = "Machine";

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub events_path: PathBuf,
    pub submissions_path: PathBuf,
    pub tasks_path: Option<PathBuf>,
    /// Report destination; stdout when unset.
    pub output_path: Option<PathBuf>,
    /// Zone for wall-clock sheet times and date-only events.
    pub reference_tz: Tz,
    /// Attendee-name marker for non-human subjects. Empty disables exclusion.
    pub exclude: String,
    pub metrics_port: Option<u16>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigError {
    pub key: &'static str,
    pub value: String,
    pub reason: &'static str,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={:?}: {}", self.key, self.value, self.reason)
    }
}

impl std::error::Error for ConfigError {}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup. Unset keys take defaults; set keys that do
    /// not parse are errors.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let path = |key: &str| lookup(key).filter(|s| !s.is_empty()).map(PathBuf::from);

        let reference_tz = match lookup("SHIFTCHECK_TZ") {
            Some(name) => name.parse::<Tz>().map_err(|_| ConfigError {
                key: "SHIFTCHECK_TZ",
                value: name,
                reason: "unknown time zone",
            })?,
            None => DEFAULT_TIME_ZONE,
        };

        let metrics_port = match lookup("SHIFTCHECK_METRICS_PORT") {
            Some(port) => Some(port.parse::<u16>().map_err(|_| ConfigError {
                key: "SHIFTCHECK_METRICS_PORT",
                value: port,
                reason: "not a port number",
            })?),
            None => None,
        };

        Ok(Self {
            events_path: path("SHIFTCHECK_EVENTS").unwrap_or_else(|| DEFAULT_EVENTS_PATH.into()),
            submissions_path: path("SHIFTCHECK_SUBMISSIONS")
                .unwrap_or_else(|| DEFAULT_SUBMISSIONS_PATH.into()),
            tasks_path: path("SHIFTCHECK_TASKS"),
            output_path: path("SHIFTCHECK_OUTPUT"),
            reference_tz,
            exclude: lookup("SHIFTCHECK_EXCLUDE").unwrap_or_else(|| DEFAULT_EXCLUDE.into()),
            metrics_port,
        })
    }

    pub fn subject_filter(&self) -> SubstringFilter {
        SubstringFilter::new(self.exclude.clone())
    }
}
