#![doc = include_str!("../README.md")]
// Declare modules
pub mod arena;
pub mod cursor;
pub mod error;
pub mod group;
pub mod merger;
pub mod telemetry;
pub mod types;

/// Chunked copy store for retained tag sets.
pub use crate::arena::TagsArena;
/// Collaborator seams and the request forwarded to them.
pub use crate::cursor::{
    Aggregate, AggregateKind, CursorFactory, ReadRequest, RequestContext, SeriesCursor,
};
/// Error types for building a result set.
pub use crate::error::{BuildError, GroupError};
/// Grouping stage entry points.
pub use crate::group::{GroupConfig, GroupCursor, GroupResultSet, MISSING_TAG_VALUE};
/// Running union of tag keys within a group.
pub use crate::merger::KeyMerger;
/// Optional span capability injected through the request context.
pub use crate::telemetry::{RecordingTracer, Span, Tracer, TracingTracer};
/// Series identity and tag types.
pub use crate::types::{SeriesRef, SeriesRow, Tag, Tags, Timestamp};
