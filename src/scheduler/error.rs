use ulid::Ulid;

use crate::model::{Instant, ResourceId, Span};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchedulerError {
    InvalidInterval {
        start: Instant,
        end: Instant,
    },
    ResourceConflict {
        resource: ResourceId,
        requested: Span,
        existing: Ulid,
    },
    EmptyResourceSet,
    LimitExceeded(&'static str),
}

impl std::fmt::Display for SchedulerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SchedulerError::InvalidInterval { start, end } => write!(
                f,
                "invalid interval: start {} is not before end {}",
                start.to_rfc3339(),
                end.to_rfc3339()
            ),
            SchedulerError::ResourceConflict {
                resource,
                requested,
                existing,
            } => write!(
                f,
                "{resource} is not available during {requested}: held by booking {existing}"
            ),
            SchedulerError::EmptyResourceSet => write!(f, "booking names no resources"),
            SchedulerError::LimitExceeded(msg) => write!(f, "limit exceeded: {msg}"),
        }
    }
}

impl std::error::Error for SchedulerError {}
