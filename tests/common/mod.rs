#![allow(dead_code)]

use std::cell::Cell;
use std::rc::Rc;

use bytes::Bytes;
use tagroup::{
    Aggregate, CursorFactory, ReadRequest, RequestContext, SeriesCursor, SeriesRef, SeriesRow,
    Tags,
};
use thiserror::Error;

// Helper function to create a SeriesRow from tag pairs
pub fn series(id: u64, pairs: &[(&str, &str)]) -> SeriesRow {
    SeriesRow {
        name: Bytes::from_static(b"cpu"),
        field: Bytes::from_static(b"usage_user"),
        stats_tags: Tags::new([("_f", "usage_user"), ("_m", "cpu")]),
        tags: Tags::new(
            pairs
                .iter()
                .map(|(k, v)| (k.as_bytes().to_vec(), v.as_bytes().to_vec())),
        ),
        series_ref: SeriesRef::new(id, vec![1, 2]),
    }
}

pub fn key_strings(keys: &[Bytes]) -> Vec<String> {
    keys.iter()
        .map(|k| String::from_utf8_lossy(k).into_owned())
        .collect()
}

/// Upstream cursor over an owned list of rows.
///
/// Each fetched row is written into a single reused slot, which is cleared on close, so rows
/// really are only valid until the next call.
#[derive(Debug)]
pub struct VecSeriesCursor {
    rows: Vec<SeriesRow>,
    pos: usize,
    slot: Option<SeriesRow>,
    fail_at: Option<usize>,
    pub closes: Rc<Cell<usize>>,
}

impl VecSeriesCursor {
    pub fn new(rows: Vec<SeriesRow>) -> Self {
        Self {
            rows,
            pos: 0,
            slot: None,
            fail_at: None,
            closes: Rc::new(Cell::new(0)),
        }
    }

    /// Fails the fetch of row `index`.
    pub fn failing_at(mut self, index: usize) -> Self {
        self.fail_at = Some(index);
        self
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("upstream: {0}")]
pub struct UpstreamError(pub String);

impl SeriesCursor for VecSeriesCursor {
    type Error = UpstreamError;

    fn next(&mut self) -> Result<Option<&SeriesRow>, UpstreamError> {
        if self.fail_at == Some(self.pos) {
            return Err(UpstreamError(format!("fetch {} failed", self.pos)));
        }
        self.slot = self.rows.get(self.pos).cloned();
        self.pos += 1;
        Ok(self.slot.as_ref())
    }

    fn close(&mut self) {
        self.slot = None;
        self.rows.clear();
        self.closes.set(self.closes.get() + 1);
    }
}

/// A value cursor stand-in that records how it was built.
#[derive(Debug, Clone, PartialEq)]
pub struct FakeValueCursor {
    pub series_id: u64,
    pub time_range: (u64, u64),
    pub aggregate: Option<Aggregate>,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("factory: {0}")]
pub struct FactoryError(pub String);

/// Cursor factory recording every call it receives.
#[derive(Debug, Default)]
pub struct RecordingFactory {
    pub created: Cell<usize>,
    pub wrapped: Cell<usize>,
    pub fail_series: Option<u64>,
}

impl CursorFactory for RecordingFactory {
    type Cursor = FakeValueCursor;
    type Error = FactoryError;

    fn create_cursor(
        &self,
        _ctx: &RequestContext,
        row: &SeriesRow,
        req: &ReadRequest,
    ) -> Result<FakeValueCursor, FactoryError> {
        if self.fail_series == Some(row.series_ref.series_id) {
            return Err(FactoryError(format!(
                "no shard for series {}",
                row.series_ref.series_id
            )));
        }
        self.created.set(self.created.get() + 1);
        Ok(FakeValueCursor {
            series_id: row.series_ref.series_id,
            time_range: (req.start, req.end),
            aggregate: None,
        })
    }

    fn wrap_aggregate(
        &self,
        _ctx: &RequestContext,
        aggregate: &Aggregate,
        mut cursor: FakeValueCursor,
    ) -> Result<FakeValueCursor, FactoryError> {
        self.wrapped.set(self.wrapped.get() + 1);
        cursor.aggregate = Some(*aggregate);
        Ok(cursor)
    }
}
