use bytes::Bytes;
use std::fmt;
use std::sync::Arc;

/// Timestamp type (nanoseconds since epoch).
pub type Timestamp = u64;

/// A single key/value pair of a series' tag set.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Tag {
    pub key: Bytes,
    pub value: Bytes,
}

impl Tag {
    pub fn new(key: impl Into<Bytes>, value: impl Into<Bytes>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// An ordered tag set: keys are unique and strictly ascending by byte value.
///
/// Keys and values are refcounted [`Bytes`], so cloning a `Tags` never copies tag data.
/// Whether that data is pinned to an upstream buffer or to a [`crate::arena::TagsArena`]
/// chunk depends on who produced it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Tags(Vec<Tag>);

impl Tags {
    /// Builds a tag set from unordered pairs.
    ///
    /// Pairs are sorted by key; when a key repeats, the first occurrence wins.
    pub fn new<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<Bytes>,
        V: Into<Bytes>,
    {
        let mut tags: Vec<Tag> = pairs.into_iter().map(|(k, v)| Tag::new(k, v)).collect();
        // stable sort keeps the first occurrence ahead of later duplicates
        tags.sort_by(|a, b| a.key.cmp(&b.key));
        tags.dedup_by(|later, earlier| later.key == earlier.key);
        Tags(tags)
    }

    /// Wraps tags that already satisfy the ordering invariant.
    pub(crate) fn from_sorted(tags: Vec<Tag>) -> Self {
        debug_assert!(tags.windows(2).all(|w| w[0].key < w[1].key));
        Tags(tags)
    }

    /// Looks up the value for `key`.
    pub fn get(&self, key: &[u8]) -> Option<&[u8]> {
        self.0
            .binary_search_by(|t| t.key.as_ref().cmp(key))
            .ok()
            .map(|i| self.0[i].value.as_ref())
    }

    pub fn keys(&self) -> impl Iterator<Item = &Bytes> + '_ {
        self.0.iter().map(|t| &t.key)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Tag> {
        self.0.iter()
    }

    pub fn as_slice(&self) -> &[Tag] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Total number of key and value bytes in the set.
    pub fn encoded_len(&self) -> usize {
        self.0.iter().map(|t| t.key.len() + t.value.len()).sum()
    }
}

impl<'a> IntoIterator for &'a Tags {
    type Item = &'a Tag;
    type IntoIter = std::slice::Iter<'a, Tag>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl fmt::Display for Tags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, t) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(
                f,
                "{}={}",
                String::from_utf8_lossy(&t.key),
                String::from_utf8_lossy(&t.value)
            )?;
        }
        Ok(())
    }
}

/// Opaque handle the per-shard cursor factory uses to locate a series' data.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SeriesRef {
    pub series_id: u64,
    /// Shards holding data for this series within the query's time range.
    pub shard_ids: Arc<[u64]>,
}

impl SeriesRef {
    pub fn new(series_id: u64, shard_ids: impl Into<Arc<[u64]>>) -> Self {
        Self {
            series_id,
            shard_ids: shard_ids.into(),
        }
    }
}

/// A series identity as produced by the upstream series cursor.
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesRow {
    /// Measurement name.
    pub name: Bytes,
    /// Field name within the measurement.
    pub field: Bytes,
    /// Auxiliary tags (measurement/field statistics tags).
    pub stats_tags: Tags,
    /// The series' own tag set.
    pub tags: Tags,
    pub series_ref: SeriesRef,
}
