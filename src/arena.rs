//! Append-only chunk allocator for retained tag sets.
//!
//! The grouping stage has to buffer every upstream row before it can sort, and upstream rows
//! are only valid until the cursor's next fetch. [`TagsArena`] copies tag data into large
//! chunks so a retained row costs one chunk append instead of one allocation per key and value.
//!
//! Chunks are [`BytesMut`] buffers that are filled and then frozen piecewise. A chunk is never
//! reallocated once written to, so every [`Bytes`] handed out keeps pointing at the same memory.
//! Handles are refcounted: a chunk is released once the arena has moved past it and the last
//! tag referencing it is dropped.

use crate::types::{Tag, Tags};
use bytes::{Bytes, BytesMut};

/// Default chunk capacity in bytes.
pub const DEFAULT_CHUNK_SIZE: usize = 4096;

#[derive(Debug)]
pub struct TagsArena {
    /// Unfrozen tail of the current chunk.
    buf: BytesMut,
    chunk_size: usize,
    chunks_allocated: usize,
    bytes_used: usize,
}

impl Default for TagsArena {
    fn default() -> Self {
        Self::with_chunk_size(DEFAULT_CHUNK_SIZE)
    }
}

impl TagsArena {
    /// Creates an arena that allocates chunks of at least `chunk_size` bytes.
    ///
    /// No chunk is allocated until the first non-empty copy.
    pub fn with_chunk_size(chunk_size: usize) -> Self {
        Self {
            buf: BytesMut::new(),
            chunk_size: chunk_size.max(1),
            chunks_allocated: 0,
            bytes_used: 0,
        }
    }

    /// Copies `src` into arena-owned memory and returns an equal tag set backed by it.
    ///
    /// The returned tags stay valid after `src` (and whatever buffer it pointed into) is gone.
    pub fn copy_tags(&mut self, src: &Tags) -> Tags {
        if src.is_empty() {
            return Tags::default();
        }

        let needed = src.encoded_len();
        self.ensure_capacity(needed);
        for tag in src {
            self.buf.extend_from_slice(&tag.key);
            self.buf.extend_from_slice(&tag.value);
        }
        self.bytes_used += needed;

        // Detach the bytes just written; the remaining capacity stays in `buf` for the next copy.
        let block = self.buf.split().freeze();
        let mut offset = 0;
        let tags = src
            .iter()
            .map(|tag| {
                let key_end = offset + tag.key.len();
                let value_end = key_end + tag.value.len();
                let copied = Tag {
                    key: block.slice(offset..key_end),
                    value: block.slice(key_end..value_end),
                };
                offset = value_end;
                copied
            })
            .collect();

        Tags::from_sorted(tags)
    }

    /// Copies a single byte string into the arena.
    pub fn copy_bytes(&mut self, src: &[u8]) -> Bytes {
        if src.is_empty() {
            return Bytes::new();
        }
        self.ensure_capacity(src.len());
        self.buf.extend_from_slice(src);
        self.bytes_used += src.len();
        self.buf.split().freeze()
    }

    /// Starts a new chunk unless the current one has `needed` bytes left.
    fn ensure_capacity(&mut self, needed: usize) {
        if self.buf.capacity() - self.buf.len() < needed {
            self.buf = BytesMut::with_capacity(self.chunk_size.max(needed));
            self.chunks_allocated += 1;
        }
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Number of chunks allocated over the arena's lifetime.
    pub fn chunks_allocated(&self) -> usize {
        self.chunks_allocated
    }

    /// Total bytes of tag data copied into the arena.
    pub fn bytes_used(&self) -> usize {
        self.bytes_used
    }
}
