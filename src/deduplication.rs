// 🔍 Deduplication - first occurrence per region code wins
// Source order is preserved; nothing is re-sorted or merged.

use crate::records::RegionRecord;
use std::collections::HashSet;
use std::hash::Hash;

/// Keep the first item for each key, in original order
pub fn dedup_first_by<T, K, F>(items: Vec<T>, mut key: F) -> Vec<T>
where
    K: Eq + Hash,
    F: FnMut(&T) -> K,
{
    let mut seen = HashSet::new();
    items
        .into_iter()
        .filter(|item| seen.insert(key(item)))
        .collect()
}

/// Deduplicate a region batch by code. Returns the kept records and how many were dropped.
pub fn dedup_regions(records: Vec<RegionRecord>) -> (Vec<RegionRecord>, usize) {
    let before = records.len();
    let kept = dedup_first_by(records, |r| r.code.clone());
    let dropped = before - kept.len();

    if dropped > 0 {
        tracing::debug!(dropped, kept = kept.len(), "Dropped duplicate region codes");
    }

    (kept, dropped)
}

// ============================================================================
// TESTS
// ============================================================================
