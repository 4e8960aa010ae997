mod error;

pub use error::SchedulerError;

use std::collections::{HashMap, HashSet};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use dashmap::DashMap;
use tracing::{debug, info, warn};
use ulid::Ulid;

use crate::index::IntervalIndex;
use crate::limits::*;
use crate::model::*;
use crate::observability::{BOOKINGS_TOTAL, BOOK_DURATION_SECONDS};

/// Interval indices per resource, one map per resource kind.
#[derive(Debug, Default)]
struct Calendars {
    employees: HashMap<String, IntervalIndex>,
    machines: HashMap<String, IntervalIndex>,
}

impl Calendars {
    fn map(&self, kind: ResourceKind) -> &HashMap<String, IntervalIndex> {
        match kind {
            ResourceKind::Employee => &self.employees,
            ResourceKind::Machine => &self.machines,
        }
    }

    fn get(&self, resource: &ResourceId) -> Option<&IntervalIndex> {
        self.map(resource.kind).get(&resource.name)
    }

    fn get_or_insert(&mut self, resource: &ResourceId) -> &mut IntervalIndex {
        let map = match resource.kind {
            ResourceKind::Employee => &mut self.employees,
            ResourceKind::Machine => &mut self.machines,
        };
        map.entry(resource.name.clone()).or_default()
    }
}

/// Admits multi-resource bookings all-or-nothing.
///
/// A single lock covers every index: `book` holds it exclusively across the
/// check and the insert, readers share it. Booking records sit in a DashMap
/// that is only written under the exclusive lock, so a reader never sees an
/// index entry without its booking.
pub struct ResourceScheduler {
    calendars: RwLock<Calendars>,
    bookings: DashMap<Ulid, Booking>,
}

impl Default for ResourceScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl ResourceScheduler {
    pub fn new() -> Self {
        Self {
            calendars: RwLock::new(Calendars::default()),
            bookings: DashMap::new(),
        }
    }

    // Poisoned locks are recovered, not propagated.
    fn read(&self) -> RwLockReadGuard<'_, Calendars> {
        self.calendars.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Calendars> {
        self.calendars.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Book `span` on every resource in `resources`, or on none of them.
    ///
    /// On conflict, the error names the first conflicting resource in slice
    /// order. Repeated resources in one request are collapsed.
    pub fn book(
        &self,
        resources: &[ResourceId],
        span: Span,
        label: impl Into<String>,
    ) -> Result<Booking, SchedulerError> {
        let label = label.into();
        if resources.is_empty() {
            return Err(SchedulerError::EmptyResourceSet);
        }
        if resources.len() > MAX_RESOURCES_PER_BOOKING {
            return Err(SchedulerError::LimitExceeded("too many resources in booking"));
        }
        if label.len() > MAX_LABEL_LEN {
            return Err(SchedulerError::LimitExceeded("label too long"));
        }
        if resources.iter().any(|r| r.name.len() > MAX_NAME_LEN) {
            return Err(SchedulerError::LimitExceeded("resource name too long"));
        }

        let mut seen = HashSet::new();
        let resources: Vec<ResourceId> = resources
            .iter()
            .filter(|r| seen.insert(*r))
            .cloned()
            .collect();

        let started = std::time::Instant::now();
        let mut calendars = self.write();

        // Phase 1: every resource must be free before any index is touched.
        for resource in &resources {
            if let Some(existing) = calendars.get(resource).and_then(|i| i.first_overlap(&span)) {
                metrics::counter!(BOOKINGS_TOTAL, "status" => "conflict").increment(1);
                warn!(%resource, %span, %existing, "booking rejected");
                return Err(SchedulerError::ResourceConflict {
                    resource: resource.clone(),
                    requested: span,
                    existing,
                });
            }
        }

        // Phase 2: commit. Record first so readers can always resolve index ids.
        let booking = Booking {
            id: Ulid::new(),
            resources,
            span,
            label,
        };
        self.bookings.insert(booking.id, booking.clone());
        for resource in &booking.resources {
            calendars.get_or_insert(resource).insert(span, booking.id);
        }
        drop(calendars);

        metrics::counter!(BOOKINGS_TOTAL, "status" => "ok").increment(1);
        metrics::histogram!(BOOK_DURATION_SECONDS).record(started.elapsed().as_secs_f64());
        info!(
            id = %booking.id,
            label = %booking.label,
            %span,
            resources = booking.resources.len(),
            "booking confirmed"
        );
        Ok(booking)
    }

    /// Book a named task on employees and machines. Employees are checked first.
    pub fn book_task<E, M>(
        &self,
        name: &str,
        employees: E,
        machines: M,
        span: Span,
    ) -> Result<Booking, SchedulerError>
    where
        E: IntoIterator,
        E::Item: AsRef<str>,
        M: IntoIterator,
        M::Item: AsRef<str>,
    {
        let resources: Vec<ResourceId> = employees
            .into_iter()
            .map(|e| ResourceId::employee(e.as_ref()))
            .chain(machines.into_iter().map(|m| ResourceId::machine(m.as_ref())))
            .collect();
        self.book(&resources, span, name)
    }

    /// All bookings on a resource, ordered by start.
    pub fn schedule_for(&self, resource: &ResourceId) -> Vec<Booking> {
        let calendars = self.read();
        let Some(index) = calendars.get(resource) else {
            return Vec::new();
        };
        index
            .iter()
            .filter_map(|e| self.booking(&e.booking_id))
            .collect()
    }

    /// Bookings on a resource that contain `t`, ordered by start.
    pub fn bookings_at(&self, resource: &ResourceId, t: Instant) -> Vec<Booking> {
        let calendars = self.read();
        let Some(index) = calendars.get(resource) else {
            return Vec::new();
        };
        index
            .query(t)
            .iter()
            .filter_map(|id| self.booking(id))
            .collect()
    }

    pub fn is_free(&self, resource: &ResourceId, span: &Span) -> bool {
        let calendars = self.read();
        let free = calendars.get(resource).is_none_or(|i| !i.overlaps(span));
        debug!(%resource, %span, free, "availability check");
        free
    }

    pub fn booking(&self, id: &Ulid) -> Option<Booking> {
        self.bookings.get(id).map(|e| e.value().clone())
    }

    pub fn booking_count(&self) -> usize {
        self.bookings.len()
    }

    /// Every resource that has ever been booked, sorted by kind then name.
    pub fn resources(&self) -> Vec<ResourceId> {
        let guard = self.read();
        let calendars: &Calendars = &guard;
        let mut ids: Vec<ResourceId> = [ResourceKind::Employee, ResourceKind::Machine]
            .into_iter()
            .flat_map(|kind| {
                calendars.map(kind).keys().map(move |name| ResourceId {
                    kind,
                    name: name.clone(),
                })
            })
            .collect();
        ids.sort();
        ids
    }
}
