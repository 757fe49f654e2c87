use std::sync::{Arc, Mutex};

/// An active span in the caller's trace, able to start children.
///
/// The grouping core never reaches for a global tracer: callers that want spans attach one to
/// the [`crate::cursor::RequestContext`]. With no tracer attached nothing is recorded.
pub trait Tracer: std::fmt::Debug + Send + Sync + 'static {
    fn start_child(&self, name: &'static str) -> Box<dyn Span>;
}

/// A child span started by a [`Tracer`]. The span finishes when dropped.
pub trait Span {
    fn set_tag(&mut self, key: &'static str, value: u64);
}

/// Forwards spans to the `tracing` crate.
///
/// Tags are emitted as `debug` events inside the span, since `tracing` fields must be declared
/// when the span is created.
#[derive(Debug, Default, Clone)]
pub struct TracingTracer;

impl Tracer for TracingTracer {
    fn start_child(&self, name: &'static str) -> Box<dyn Span> {
        let span = tracing::info_span!("tagroup", op = name);
        Box::new(TracingSpan { span })
    }
}

struct TracingSpan {
    span: tracing::Span,
}

impl Span for TracingSpan {
    fn set_tag(&mut self, key: &'static str, value: u64) {
        let _entered = self.span.enter();
        tracing::debug!(tag = key, value, "span tag");
    }
}

/// A finished span as captured by [`RecordingTracer`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedSpan {
    pub name: &'static str,
    pub tags: Vec<(&'static str, u64)>,
}

/// In-memory tracer that keeps every finished span. Useful for tests and debugging.
#[derive(Debug, Default, Clone)]
pub struct RecordingTracer {
    finished: Arc<Mutex<Vec<RecordedSpan>>>,
}

impl RecordingTracer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the spans finished so far, in finish order.
    pub fn finished(&self) -> Vec<RecordedSpan> {
        match self.finished.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl Tracer for RecordingTracer {
    fn start_child(&self, name: &'static str) -> Box<dyn Span> {
        Box::new(RecordingSpan {
            span: RecordedSpan {
                name,
                tags: Vec::new(),
            },
            sink: Arc::clone(&self.finished),
        })
    }
}

struct RecordingSpan {
    span: RecordedSpan,
    sink: Arc<Mutex<Vec<RecordedSpan>>>,
}

impl Span for RecordingSpan {
    fn set_tag(&mut self, key: &'static str, value: u64) {
        self.span.tags.push((key, value));
    }
}

impl Drop for RecordingSpan {
    fn drop(&mut self) {
        let span = RecordedSpan {
            name: self.span.name,
            tags: std::mem::take(&mut self.span.tags),
        };
        match self.sink.lock() {
            Ok(mut guard) => guard.push(span),
            Err(poisoned) => poisoned.into_inner().push(span),
        }
    }
}

/// Metrics instrumentation through the `metrics` facade.
///
/// Recording is effectively free until the embedding process installs a recorder.
pub mod group_metrics {
    use ::metrics::{describe_counter, describe_gauge, describe_histogram, Unit};
    use std::time::Duration;

    // Counters are exposed as `<name>_total` by the Prometheus exporter.
    pub const SORTED_ROWS: &str = "tagroup_sorted_rows";
    pub const GROUPS: &str = "tagroup_groups";
    pub const SORT_DURATION_SECONDS: &str = "tagroup_sort_duration_seconds";
    pub const ARENA_BYTES: &str = "tagroup_arena_bytes";

    #[inline]
    pub fn record_sort(duration: Duration, rows: u64, arena_bytes: u64) {
        ::metrics::histogram!(SORT_DURATION_SECONDS).record(duration.as_secs_f64());
        if rows > 0 {
            ::metrics::counter!(SORTED_ROWS).increment(rows);
        }
        ::metrics::gauge!(ARENA_BYTES).set(arena_bytes as f64);
    }

    #[inline]
    pub fn record_group() {
        ::metrics::counter!(GROUPS).increment(1);
    }

    /// Registers descriptions for every metric above. Call once after installing a recorder.
    pub fn describe_all() {
        describe_counter!(
            SORTED_ROWS,
            Unit::Count,
            "Total number of series rows buffered and sorted by the grouping stage."
        );
        describe_counter!(
            GROUPS,
            Unit::Count,
            "Total number of groups yielded by group result sets."
        );
        describe_histogram!(
            SORT_DURATION_SECONDS,
            Unit::Seconds,
            "Time to drain, copy, key and sort the upstream series cursor."
        );
        describe_gauge!(
            ARENA_BYTES,
            Unit::Bytes,
            "Tag bytes held by the most recently sorted result set's arena."
        );
    }
}
