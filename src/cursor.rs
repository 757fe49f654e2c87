//! Collaborator seams: the upstream series cursor, the read request forwarded to shards, and
//! the per-shard value cursor factory.

use crate::telemetry::Tracer;
use crate::types::{SeriesRow, Timestamp};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Source of series rows, ordered by series identity.
pub trait SeriesCursor {
    type Error;

    /// Fetches the next row. The returned row is only valid until the next call.
    fn next(&mut self) -> Result<Option<&SeriesRow>, Self::Error>;

    /// Releases upstream resources. Must be safe to call more than once, and after exhaustion.
    fn close(&mut self);
}

/// Builds value cursors for individual series.
///
/// Implementations are expected to honor [`RequestContext`] cancellation before blocking.
/// Errors are handed back to the caller untouched.
pub trait CursorFactory {
    type Cursor;
    type Error;

    /// Opens a cursor over the raw timestamped data of `row`.
    fn create_cursor(
        &self,
        ctx: &RequestContext,
        row: &SeriesRow,
        req: &ReadRequest,
    ) -> Result<Self::Cursor, Self::Error>;

    /// Wraps `cursor` so it yields `aggregate` applied to the underlying values.
    fn wrap_aggregate(
        &self,
        ctx: &RequestContext,
        aggregate: &Aggregate,
        cursor: Self::Cursor,
    ) -> Result<Self::Cursor, Self::Error>;
}

/// Aggregation applied by the shard-side aggregate wrapper.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AggregateKind {
    #[default]
    None,
    Sum,
    Count,
    Min,
    Max,
    First,
    Last,
    Mean,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Aggregate {
    pub kind: AggregateKind,
}

impl Aggregate {
    pub fn new(kind: AggregateKind) -> Self {
        Self { kind }
    }
}

/// Per-request context: deadline, cancellation and the optional active trace span.
///
/// The grouping stage never blocks, so it only forwards this to collaborators.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    deadline: Option<Instant>,
    cancelled: Arc<AtomicBool>,
    tracer: Option<Arc<dyn Tracer>>,
}

impl RequestContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Attaches the caller's active span. Child spans are started from it.
    pub fn with_tracer(mut self, tracer: Arc<dyn Tracer>) -> Self {
        self.tracer = Some(tracer);
        self
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn tracer(&self) -> Option<&Arc<dyn Tracer>> {
        self.tracer.as_ref()
    }

    /// Signals cancellation to every clone of this context.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    /// True once cancelled or past the deadline.
    pub fn is_done(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
            || self.deadline.map_or(false, |d| Instant::now() >= d)
    }
}

/// A read request as seen by the grouping stage.
#[derive(Debug, Clone, Default)]
pub struct ReadRequest {
    pub context: RequestContext,
    /// Start of the time range (inclusive).
    pub start: Timestamp,
    /// End of the time range (exclusive).
    pub end: Timestamp,
    pub aggregate: Option<Aggregate>,
}

impl ReadRequest {
    /// The aggregate to apply, if any. `AggregateKind::None` counts as no aggregate.
    pub fn effective_aggregate(&self) -> Option<&Aggregate> {
        self.aggregate
            .as_ref()
            .filter(|a| a.kind != AggregateKind::None)
    }
}
