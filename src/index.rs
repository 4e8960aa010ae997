use ulid::Ulid;

use crate::model::{Instant, Span};

/// One committed interval on a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Entry {
    pub booking_id: Ulid,
    pub span: Span,
}

/// Committed intervals of a single resource.
///
/// Entries are sorted by `span.start` and pairwise disjoint. Disjointness is
/// the owner's job: [`IntervalIndex::insert`] does not re-check it, so that a
/// multi-resource booking can check every index before inserting into any.
#[derive(Debug, Clone, Default)]
pub struct IntervalIndex {
    entries: Vec<Entry>,
}

impl IntervalIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// True iff some committed `[s', e')` satisfies `s < e' && s' < e`.
    pub fn overlaps(&self, span: &Span) -> bool {
        self.first_overlap(span).is_some()
    }

    /// Booking id of the committed interval that collides with `span`, if any.
    ///
    /// O(log n): disjoint entries sorted by start are also sorted by end, so only
    /// the last entry starting before `span.end` can reach past `span.start`.
    pub fn first_overlap(&self, span: &Span) -> Option<Ulid> {
        let right_bound = self
            .entries
            .partition_point(|e| e.span.start() < span.end());
        self.entries[..right_bound]
            .last()
            .filter(|e| e.span.end() > span.start())
            .map(|e| e.booking_id)
    }

    /// Insert maintaining sort order by start. Caller has checked `overlaps`.
    pub fn insert(&mut self, span: Span, booking_id: Ulid) {
        debug_assert!(!self.overlaps(&span), "insert into occupied range {span}");
        let pos = self
            .entries
            .partition_point(|e| e.span.start() <= span.start());
        self.entries.insert(pos, Entry { booking_id, span });
    }

    /// Entries whose span overlaps the query window, ordered by start.
    pub fn overlapping(&self, query: &Span) -> impl Iterator<Item = &Entry> {
        // Everything at index >= right_bound starts at or after query.end.
        let right_bound = self
            .entries
            .partition_point(|e| e.span.start() < query.end());
        self.entries[..right_bound]
            .iter()
            .filter(move |e| e.span.end() > query.start())
    }

    /// Bookings whose interval contains `t`, ordered by start.
    pub fn query(&self, t: Instant) -> Vec<Ulid> {
        let right_bound = self.entries.partition_point(|e| e.span.start() <= t);
        self.entries[..right_bound]
            .iter()
            .filter(|e| e.span.contains_instant(t))
            .map(|e| e.booking_id)
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Entry> {
        self.entries.iter()
    }
}
