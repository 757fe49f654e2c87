//! Running union of tag keys across the rows of one group.

use crate::types::{Tag, Tags};
use bytes::Bytes;
use std::cmp::Ordering;
use std::fmt;

/// Maintains the ascending, duplicate-free union of tag keys seen in the current group.
///
/// Two key buffers are kept for the lifetime of the merger. `active` always holds the union
/// so far; a merge that discovers new keys writes into the other buffer and flips `active`.
/// Buffers are cleared, never released, so they settle at a high-water mark after a few groups.
#[derive(Debug, Default)]
pub struct KeyMerger {
    active: usize,
    keys: [Vec<Bytes>; 2],
}

impl KeyMerger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a new group seeded with the keys of `tags`.
    pub fn set_tags(&mut self, tags: &Tags) {
        self.active = 0;
        let seed = &mut self.keys[0];
        seed.clear();
        seed.extend(tags.keys().cloned());
    }

    /// The merged key set: ascending, no duplicates.
    pub fn get(&self) -> &[Bytes] {
        &self.keys[self.active]
    }

    /// Merges the keys of `tags` into the current union.
    pub fn merge_tag_keys(&mut self, tags: &Tags) {
        let incoming = tags.as_slice();
        let current = &self.keys[self.active];

        // Rows in a group usually share a schema: skip the common prefix first.
        let mut i = 0;
        let mut j = 0;
        while i < current.len() && j < incoming.len() && current[i] == incoming[j].key {
            i += 1;
            j += 1;
        }

        if j == incoming.len() {
            // no new keys
            return;
        }

        let next = self.active ^ 1;
        let [a, b] = &mut self.keys;
        let (current, merged) = if next == 1 { (&*a, b) } else { (&*b, a) };

        merged.clear();
        merged.reserve(current.len() + incoming.len());

        // Back up one position so the merge loop re-checks the boundary.
        if i > 0 {
            i -= 1;
            j -= 1;
        }
        merged.extend_from_slice(&current[..i]);
        merge_into(merged, &current[i..], &incoming[j..]);

        self.active = next;
    }
}

/// Two-pointer union of ascending key sequences.
fn merge_into(out: &mut Vec<Bytes>, keys: &[Bytes], tags: &[Tag]) {
    let mut i = 0;
    let mut j = 0;
    while i < keys.len() && j < tags.len() {
        match keys[i].as_ref().cmp(tags[j].key.as_ref()) {
            Ordering::Less => {
                out.push(keys[i].clone());
                i += 1;
            }
            Ordering::Greater => {
                out.push(tags[j].key.clone());
                j += 1;
            }
            Ordering::Equal => {
                out.push(keys[i].clone());
                i += 1;
                j += 1;
            }
        }
    }
    out.extend_from_slice(&keys[i..]);
    out.extend(tags[j..].iter().map(|t| t.key.clone()));
}

impl fmt::Display for KeyMerger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, k) in self.get().iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            f.write_str(&String::from_utf8_lossy(k))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tags_with_keys(keys: &[&'static str]) -> Tags {
        Tags::new(keys.iter().map(|k| (*k, "v")))
    }

    fn merged(km: &KeyMerger) -> Vec<String> {
        km.get()
            .iter()
            .map(|k| String::from_utf8_lossy(k).into_owned())
            .collect()
    }

    #[test]
    fn set_tags_seeds_keys() {
        let mut km = KeyMerger::new();
        km.set_tags(&tags_with_keys(&["az", "host"]));
        assert_eq!(merged(&km), vec!["az", "host"]);
        assert_eq!(km.to_string(), "az,host");
    }

    #[test]
    fn merge_interleaved_keys() {
        let mut km = KeyMerger::new();
        km.set_tags(&tags_with_keys(&["a", "c", "e"]));
        km.merge_tag_keys(&tags_with_keys(&["b", "c", "d", "f"]));
        assert_eq!(merged(&km), vec!["a", "b", "c", "d", "e", "f"]);
    }

    #[test]
    fn merge_after_common_prefix() {
        let mut km = KeyMerger::new();
        km.set_tags(&tags_with_keys(&["a", "b", "d"]));
        km.merge_tag_keys(&tags_with_keys(&["a", "b", "c", "d", "e"]));
        assert_eq!(merged(&km), vec!["a", "b", "c", "d", "e"]);
    }

    #[test]
    fn merge_disjoint_keys() {
        let mut km = KeyMerger::new();
        km.set_tags(&tags_with_keys(&["x", "y"]));
        km.merge_tag_keys(&tags_with_keys(&["a", "b"]));
        assert_eq!(merged(&km), vec!["a", "b", "x", "y"]);
        km.merge_tag_keys(&tags_with_keys(&["z"]));
        assert_eq!(merged(&km), vec!["a", "b", "x", "y", "z"]);
    }

    #[test]
    fn merge_into_empty_seed() {
        let mut km = KeyMerger::new();
        km.set_tags(&Tags::default());
        km.merge_tag_keys(&tags_with_keys(&["b", "a"]));
        assert_eq!(merged(&km), vec!["a", "b"]);
    }

    #[test]
    fn merge_covered_prefix_is_noop() {
        let mut km = KeyMerger::new();
        km.set_tags(&tags_with_keys(&["a", "b", "c"]));
        km.merge_tag_keys(&tags_with_keys(&["a", "b"]));
        assert_eq!(km.active, 0);
        assert_eq!(merged(&km), vec!["a", "b", "c"]);

        km.merge_tag_keys(&Tags::default());
        assert_eq!(km.active, 0);
    }

    #[test]
    fn merge_swaps_buffers_only_on_new_keys() {
        let mut km = KeyMerger::new();
        km.set_tags(&tags_with_keys(&["a"]));
        km.merge_tag_keys(&tags_with_keys(&["a", "b"]));
        assert_eq!(km.active, 1);
        km.merge_tag_keys(&tags_with_keys(&["a", "c"]));
        assert_eq!(km.active, 0);
        assert_eq!(merged(&km), vec!["a", "b", "c"]);

        // a new group resets to the first buffer
        km.set_tags(&tags_with_keys(&["q"]));
        assert_eq!(km.active, 0);
        assert_eq!(merged(&km), vec!["q"]);
    }

    #[test]
    fn buffers_are_reused_across_groups() {
        let mut km = KeyMerger::new();
        km.set_tags(&tags_with_keys(&["a", "b", "c", "d"]));
        km.merge_tag_keys(&tags_with_keys(&["e", "f"]));
        let caps = [km.keys[0].capacity(), km.keys[1].capacity()];

        km.set_tags(&tags_with_keys(&["a"]));
        km.merge_tag_keys(&tags_with_keys(&["b"]));
        assert_eq!(merged(&km), vec!["a", "b"]);
        assert_eq!([km.keys[0].capacity(), km.keys[1].capacity()], caps);
    }
}
