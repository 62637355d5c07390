//! Merging the top-100 and border views into one leaderboard snapshot.
//!
//! The border view only carries new information when its content changed
//! since the last committed cycle. [`BorderChangeCache`] keeps one content
//! digest per cache key; unchanged border data is skipped.

use std::collections::{HashMap, HashSet};

use crate::domain::{PlayerRankingEntry, ServerRegion, TOP_VIEW_BOUNDARY_RANK};
use crate::master_data::compute_hash;

/// Cache key of the main border view of an event.
#[must_use]
pub fn main_border_key(server: ServerRegion, event_id: i64) -> String {
    format!("{server}-event-{event_id}-main-border")
}

/// Cache key of one chapter border view of an event.
#[must_use]
pub fn chapter_border_key(server: ServerRegion, event_id: i64, character_id: i64) -> String {
    format!("{server}-event-{event_id}-{character_id}-border")
}

/// Content digest of a border list over its `(rank, score)` pairs.
#[must_use]
pub fn border_digest(border: &[PlayerRankingEntry]) -> String {
    let mut canonical = String::with_capacity(border.len() * 16);
    for entry in border {
        canonical.push_str(&format!("{}:{};", entry.rank, entry.score));
    }
    compute_hash(canonical.as_bytes())
}

/// Border digest that becomes current once its cycle commits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedBorder {
    /// Cache key.
    pub key: String,
    /// Digest of the border content.
    pub digest: String,
}

/// Result of a staged merge.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeOutcome {
    /// Merged leaderboard.
    pub entries: Vec<PlayerRankingEntry>,
    /// Present iff the border changed and was merged in.
    pub staged: Option<StagedBorder>,
}

/// Last committed border digest per cache key.
#[derive(Debug, Clone, Default)]
pub struct BorderChangeCache {
    digests: HashMap<String, String>,
}

impl BorderChangeCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `digest` equals the committed digest for `key`.
    #[must_use]
    pub fn is_unchanged(&self, key: &str, digest: &str) -> bool {
        self.digests.get(key).is_some_and(|d| d == digest)
    }

    /// Makes a staged digest current.
    pub fn commit(&mut self, staged: StagedBorder) {
        self.digests.insert(staged.key, staged.digest);
    }

    /// Number of keys with a committed digest.
    #[must_use]
    pub fn len(&self) -> usize {
        self.digests.len()
    }

    /// Returns `true` if nothing was committed yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.digests.is_empty()
    }

    /// Merges without touching the cache.
    ///
    /// Unchanged border: the top view alone. Otherwise the top view plus
    /// every border entry whose rank is neither the top-view boundary nor
    /// already present in the top view, and a [`StagedBorder`] to commit
    /// after the cycle persisted.
    #[must_use]
    pub fn stage(
        &self,
        top: &[PlayerRankingEntry],
        border: &[PlayerRankingEntry],
        key: &str,
    ) -> MergeOutcome {
        let digest = border_digest(border);
        if self.is_unchanged(key, &digest) {
            tracing::debug!(key, "border unchanged, keeping top view only");
            return MergeOutcome {
                entries: top.to_vec(),
                staged: None,
            };
        }

        let top_ranks: HashSet<i64> = top.iter().map(|e| e.rank).collect();
        let mut entries = Vec::with_capacity(top.len() + border.len());
        entries.extend_from_slice(top);
        entries.extend(
            border
                .iter()
                .filter(|e| e.rank != TOP_VIEW_BOUNDARY_RANK && !top_ranks.contains(&e.rank))
                .cloned(),
        );

        MergeOutcome {
            entries,
            staged: Some(StagedBorder {
                key: key.to_string(),
                digest,
            }),
        }
    }

    /// Merges and commits the border digest immediately.
    pub fn merge(
        &mut self,
        top: &[PlayerRankingEntry],
        border: &[PlayerRankingEntry],
        key: &str,
    ) -> Vec<PlayerRankingEntry> {
        let outcome = self.stage(top, border, key);
        if let Some(staged) = outcome.staged {
            self.commit(staged);
        }
        outcome.entries
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::upstream::testing::{entry, top_entries};

    fn border() -> Vec<PlayerRankingEntry> {
        vec![
            entry("b100", "dup", 100, 9_000),
            entry("b200", "x", 200, 8_000),
        ]
    }

    #[test]
    fn changed_border_adds_entries_beyond_top() {
        let mut cache = BorderChangeCache::new();
        let merged = cache.merge(&top_entries(100), &border(), "jp-event-1-main-border");
        assert_eq!(merged.len(), 101);
        assert_eq!(merged.last().map(|e| e.rank), Some(200));
    }

    #[test]
    fn unchanged_border_yields_top_only() {
        let mut cache = BorderChangeCache::new();
        let key = main_border_key(ServerRegion::Jp, 1);
        let _ = cache.merge(&top_entries(100), &border(), &key);
        let merged = cache.merge(&top_entries(100), &border(), &key);
        assert_eq!(merged.len(), 100);
    }

    #[test]
    fn modified_border_is_merged_again() {
        let mut cache = BorderChangeCache::new();
        let key = main_border_key(ServerRegion::Jp, 1);
        let _ = cache.merge(&top_entries(100), &border(), &key);
        let mut moved = border();
        moved.push(entry("b500", "y", 500, 7_000));
        let merged = cache.merge(&top_entries(100), &moved, &key);
        assert_eq!(merged.len(), 102);
    }

    #[test]
    fn border_rank_already_in_top_is_dropped() {
        let cache = BorderChangeCache::new();
        let top = top_entries(10);
        let border = vec![entry("x", "x", 5, 1), entry("y", "y", 1_000, 1)];
        let outcome = cache.stage(&top, &border, "k");
        assert_eq!(outcome.entries.len(), 11);
    }

    #[test]
    fn staging_does_not_touch_cache() {
        let mut cache = BorderChangeCache::new();
        let key = chapter_border_key(ServerRegion::En, 3, 17);
        let first = cache.stage(&top_entries(100), &border(), &key);
        let second = cache.stage(&top_entries(100), &border(), &key);
        assert_eq!(first, second);
        assert!(cache.is_empty());

        let Some(staged) = first.staged else {
            panic!("first border should be staged");
        };
        cache.commit(staged);
        assert!(cache.stage(&top_entries(100), &border(), &key).staged.is_none());
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn digest_ignores_who_holds_a_rank() {
        let swapped = vec![
            entry("c100", "other", 100, 9_000),
            entry("c200", "z", 200, 8_000),
        ];
        assert_eq!(border_digest(&border()), border_digest(&swapped));

        let mut rescored = border();
        if let Some(last) = rescored.last_mut() {
            last.score += 1;
        }
        assert_ne!(border_digest(&border()), border_digest(&rescored));

        let mut cache = BorderChangeCache::new();
        let key = main_border_key(ServerRegion::Kr, 2);
        let _ = cache.merge(&top_entries(100), &border(), &key);
        assert_eq!(cache.merge(&top_entries(100), &swapped, &key).len(), 100);
    }

    #[test]
    fn keys_are_independent() {
        let mut cache = BorderChangeCache::new();
        let _ = cache.merge(&[], &border(), &main_border_key(ServerRegion::Jp, 1));
        let merged = cache.merge(&[], &border(), &chapter_border_key(ServerRegion::Jp, 1, 2));
        assert_eq!(merged.len(), 1);
        assert_eq!(cache.len(), 2);
    }
}
