//! Grouping stage: buffers the upstream series cursor, sorts rows by their grouping-tag values
//! and hands out one [`GroupCursor`] per run of rows with an equal composite key.

use crate::arena::{TagsArena, DEFAULT_CHUNK_SIZE};
use crate::cursor::{CursorFactory, ReadRequest, SeriesCursor};
use crate::error::{BuildError, GroupError};
use crate::merger::KeyMerger;
use crate::telemetry::group_metrics;
use crate::types::{SeriesRow, Tags};
use bytes::Bytes;
use serde::Deserialize;
use std::time::Instant;
use tracing::{debug, trace};

/// Value substituted for a missing grouping tag so that such rows sort after all rows that
/// carry the tag.
pub const MISSING_TAG_VALUE: &[u8] = &[0xff];

/// Name of the child span covering the sort phase.
pub const SORT_SPAN_NAME: &str = "group_series_cursor.sort";

/// Configuration options for a [`GroupResultSet`].
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct GroupConfig {
    /// Minimum size of each arena chunk holding retained tag data.
    pub arena_chunk_size: usize,
}

impl Default for GroupConfig {
    fn default() -> Self {
        GroupConfig {
            arena_chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

impl GroupConfig {
    pub fn validate(&self) -> Result<(), GroupError> {
        if self.arena_chunk_size == 0 {
            return Err(GroupError::ConfigError(
                "arena_chunk_size must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// A retained upstream row and its composite sort key.
#[derive(Debug)]
struct SortRow {
    row: SeriesRow,
    key: Vec<u8>,
}

/// Groups an upstream series stream by the values of a fixed list of tag keys.
///
/// Construction drains and closes the upstream cursor, so no group is available until every
/// row has been read. Groups are then produced in ascending composite-key order by [`next`].
///
/// The composite key is the plain concatenation of a row's grouping-tag values (with
/// [`MISSING_TAG_VALUE`] for absent tags). There is no separator, so distinct value tuples can
/// produce the same key, e.g. `("1", "2")` and `("12", "")`; such rows land in one group.
/// Row order within a group is unspecified.
///
/// [`next`]: GroupResultSet::next
#[derive(Debug)]
pub struct GroupResultSet<C: SeriesCursor, F: CursorFactory> {
    req: ReadRequest,
    factory: F,
    /// `None` once the upstream cursor has been closed.
    upstream: Option<C>,
    group_keys: Vec<Bytes>,
    arena: TagsArena,
    rows: Vec<SortRow>,
    /// Index of the first row not yet handed out in a group.
    i: usize,
    merger: KeyMerger,
    closed: bool,
}

impl<C: SeriesCursor, F: CursorFactory> GroupResultSet<C, F> {
    /// Builds a result set with the default configuration.
    ///
    /// # Errors
    /// Returns `BuildError::Upstream` with the cursor's own error if reading it fails.
    pub fn new<K: AsRef<[u8]>>(
        req: ReadRequest,
        cursor: C,
        group_keys: &[K],
        factory: F,
    ) -> Result<Self, BuildError<C::Error>> {
        Self::with_config(req, cursor, group_keys, factory, GroupConfig::default())
    }

    /// Builds a result set, draining and sorting `cursor` before returning.
    ///
    /// # Errors
    /// Returns `BuildError::Config` if `config` is invalid (the cursor is closed unread), or
    /// `BuildError::Upstream` with the cursor's own error if reading it fails.
    pub fn with_config<K: AsRef<[u8]>>(
        req: ReadRequest,
        mut cursor: C,
        group_keys: &[K],
        factory: F,
        config: GroupConfig,
    ) -> Result<Self, BuildError<C::Error>> {
        if let Err(e) = config.validate() {
            cursor.close();
            return Err(e.into());
        }

        let mut set = GroupResultSet {
            req,
            factory,
            upstream: Some(cursor),
            group_keys: group_keys
                .iter()
                .map(|k| Bytes::copy_from_slice(k.as_ref()))
                .collect(),
            arena: TagsArena::with_chunk_size(config.arena_chunk_size),
            rows: Vec::new(),
            i: 0,
            merger: KeyMerger::new(),
            closed: false,
        };
        set.sort().map_err(BuildError::Upstream)?;
        Ok(set)
    }

    fn sort(&mut self) -> Result<(), C::Error> {
        let mut span = self
            .req
            .context
            .tracer()
            .map(|t| t.start_child(SORT_SPAN_NAME));
        let started = Instant::now();

        let Some(mut cursor) = self.upstream.take() else {
            return Ok(());
        };
        let drained = self.drain(&mut cursor);
        // free early: nothing below needs the upstream cursor
        cursor.close();
        drained?;

        self.rows.sort_unstable_by(|a, b| a.key.cmp(&b.key));

        if let Some(span) = span.as_mut() {
            span.set_tag("rows", self.rows.len() as u64);
        }
        let elapsed = started.elapsed();
        group_metrics::record_sort(
            elapsed,
            self.rows.len() as u64,
            self.arena.bytes_used() as u64,
        );
        debug!(
            rows = self.rows.len(),
            arena_chunks = self.arena.chunks_allocated(),
            arena_bytes = self.arena.bytes_used(),
            elapsed_us = elapsed.as_micros() as u64,
            "sorted series rows"
        );
        Ok(())
    }

    /// Copies every upstream row into the arena and computes its composite key.
    fn drain(&mut self, cursor: &mut C) -> Result<(), C::Error> {
        while let Some(row) = cursor.next()? {
            let tags = self.arena.copy_tags(&row.tags);
            let stats_tags = self.arena.copy_tags(&row.stats_tags);
            let key = composite_key(&self.group_keys, &tags);
            let retained = SeriesRow {
                name: self.arena.copy_bytes(&row.name),
                field: self.arena.copy_bytes(&row.field),
                stats_tags,
                tags,
                series_ref: row.series_ref.clone(),
            };
            self.rows.push(SortRow { row: retained, key });
        }
        Ok(())
    }

    /// Advances to the next group, or returns `None` once every row has been grouped.
    ///
    /// The returned cursor borrows the result set, so it must be dropped (and anything read
    /// through it copied out) before `next` can be called again.
    pub fn next(&mut self) -> Option<GroupCursor<'_, F>> {
        if self.i >= self.rows.len() {
            return None;
        }

        let start = self.i;
        let rows = &self.rows;
        let group_key = &rows[start].key;
        self.merger.set_tags(&rows[start].row.tags);
        let mut end = start + 1;
        while end < rows.len() && rows[end].key == *group_key {
            self.merger.merge_tag_keys(&rows[end].row.tags);
            end += 1;
        }
        self.i = end;

        group_metrics::record_group();
        trace!(rows = end - start, keys = %self.merger, "next group");

        Some(GroupCursor {
            rows: &self.rows[start..end],
            keys: self.merger.get(),
            pos: 0,
            req: &self.req,
            factory: &self.factory,
        })
    }

    /// Number of rows buffered by the sort phase. Zero after [`close`](Self::close).
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// The grouping tag keys, in the order they make up the composite key.
    pub fn group_keys(&self) -> &[Bytes] {
        &self.group_keys
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Releases buffered rows and arena memory and closes the upstream cursor if still open.
    ///
    /// Safe to call any number of times; afterwards [`next`](Self::next) returns `None`.
    pub fn close(&mut self) {
        if let Some(mut cursor) = self.upstream.take() {
            cursor.close();
        }
        self.rows = Vec::new();
        self.arena = TagsArena::with_chunk_size(self.arena.chunk_size());
        self.i = 0;
        self.closed = true;
    }
}

impl<C: SeriesCursor, F: CursorFactory> Drop for GroupResultSet<C, F> {
    fn drop(&mut self) {
        self.close();
    }
}

/// Concatenates the values of `group_keys` in `tags`, in order, with no separator.
fn composite_key(group_keys: &[Bytes], tags: &Tags) -> Vec<u8> {
    let len = group_keys
        .iter()
        .map(|k| tags.get(k).map_or(MISSING_TAG_VALUE.len(), <[u8]>::len))
        .sum();
    let mut key = Vec::with_capacity(len);
    for k in group_keys {
        key.extend_from_slice(tags.get(k).unwrap_or(MISSING_TAG_VALUE));
    }
    key
}

/// Cursor over the rows of a single group.
///
/// Created by [`GroupResultSet::next`]; it holds no allocations of its own and borrows rows,
/// merged keys and the request from the result set.
#[derive(Debug)]
pub struct GroupCursor<'a, F> {
    rows: &'a [SortRow],
    keys: &'a [Bytes],
    /// One past the current row; zero before the first `next`.
    pos: usize,
    req: &'a ReadRequest,
    factory: &'a F,
}

impl<'a, F: CursorFactory> GroupCursor<'a, F> {
    /// Union of the tag keys of every row in the group, ascending.
    pub fn keys(&self) -> &'a [Bytes] {
        self.keys
    }

    /// The composite sort key shared by every row in the group.
    pub fn group_key(&self) -> &'a [u8] {
        self.rows
            .first()
            .map(|r| r.key.as_slice())
            .unwrap_or_default()
    }

    /// Number of rows in the group.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Advances to the next row. Returns `false` once the group is exhausted.
    pub fn next(&mut self) -> bool {
        if self.pos < self.rows.len() {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn current(&self) -> Option<&'a SortRow> {
        self.pos.checked_sub(1).and_then(|i| self.rows.get(i))
    }

    /// Tags of the current row; `None` before the first successful [`next`](Self::next).
    pub fn tags(&self) -> Option<&'a Tags> {
        self.current().map(|r| &r.row.tags)
    }

    /// The full retained row (name, field, stats tags, series reference) of the current row.
    pub fn series_row(&self) -> Option<&'a SeriesRow> {
        self.current().map(|r| &r.row)
    }

    /// Opens a value cursor for the current row.
    ///
    /// A fresh cursor is built on every call. If the request carries an aggregate, the cursor
    /// is wrapped by the factory's aggregate wrapper. Factory errors are returned unchanged.
    /// Returns `None` before the first successful [`next`](Self::next).
    pub fn cursor(&self) -> Option<Result<F::Cursor, F::Error>> {
        let row = self.series_row()?;
        Some(self.open_cursor(row))
    }

    fn open_cursor(&self, row: &SeriesRow) -> Result<F::Cursor, F::Error> {
        let ctx = &self.req.context;
        let cursor = self.factory.create_cursor(ctx, row, self.req)?;
        match self.req.effective_aggregate() {
            Some(aggregate) => self.factory.wrap_aggregate(ctx, aggregate, cursor),
            None => Ok(cursor),
        }
    }
}
