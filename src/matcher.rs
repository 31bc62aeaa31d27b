// 🔗 Matcher - Join a catalog against the registry index
//
// Each catalog track is looked up by normalized ISRC. A hit fans out into
// one record per registry entry under that code; nothing is deduplicated.
// Output order is catalog order, then bucket order.

use crate::catalog::CatalogEntry;
use crate::isrc;
use crate::registry::{RegistryEntry, RegistryIndex};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::debug;

/// A catalog track joined with one unclaimed registry entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchRecord {
    /// Position of the originating track in the catalog
    pub catalog_index: usize,

    // Catalog side
    pub track_name: String,
    pub album_name: String,
    pub release_date: String,
    pub isrc: String,
    pub popularity: u32,

    // Registry side
    pub work_title: String,
    pub writers: String,
    pub publishers: String,
    pub status: String,
}

impl MatchRecord {
    pub fn join(catalog_index: usize, track: &CatalogEntry, work: &RegistryEntry) -> Self {
        MatchRecord {
            catalog_index,
            track_name: track.track_name.clone(),
            album_name: track.album_name.clone(),
            release_date: track.release_date.clone(),
            isrc: track.isrc.clone(),
            popularity: track.popularity,
            work_title: work.work_title.clone(),
            writers: work.writers.clone(),
            publishers: work.publishers.clone(),
            status: work.status.clone(),
        }
    }
}

/// Every (track, registry entry) pair sharing a normalized ISRC.
///
/// An empty result is a normal outcome, not an error.
pub fn find_matches(catalog: &[CatalogEntry], index: &RegistryIndex) -> Vec<MatchRecord> {
    let mut matches = Vec::new();

    for (position, track) in catalog.iter().enumerate() {
        let code = isrc::normalize(&track.isrc);
        let Some(bucket) = index.get(&code) else {
            continue;
        };

        debug!(isrc = %code, hits = bucket.len(), track = %track.track_name, "registry hit");
        matches.extend(
            bucket
                .iter()
                .map(|work| MatchRecord::join(position, track, work)),
        );
    }

    matches
}

/// Number of distinct catalog tracks with at least one match
pub fn matched_track_count(matches: &[MatchRecord]) -> usize {
    matches
        .iter()
        .map(|m| m.catalog_index)
        .collect::<HashSet<_>>()
        .len()
}

/// Percentage of catalog tracks with at least one registry hit.
///
/// 0.0 for an empty catalog; always within [0, 100].
pub fn match_rate(catalog_len: usize, matches: &[MatchRecord]) -> f64 {
    if catalog_len == 0 {
        return 0.0;
    }

    let matched = matched_track_count(matches).min(catalog_len);
    100.0 * matched as f64 / catalog_len as f64
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn work(title: &str) -> RegistryEntry {
        RegistryEntry::new(Some(title.to_string()), Some("Writer".to_string()))
    }

    fn sample_index() -> RegistryIndex {
        let mut index = RegistryIndex::new();
        index.insert("USRC17607839", work("Song A"));
        index.insert("GBAYE0000001", work("Work 1"));
        index.insert("GBAYE0000001", work("Work 2"));
        index.insert("GBAYE0000001", work("Work 3"));
        index
    }

    #[test]
    fn test_single_match_end_to_end() {
        let catalog = vec![CatalogEntry::new("Song A", "USRC17607839").with_popularity(80)];

        let matches = find_matches(&catalog, &sample_index());

        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].track_name, "Song A");
        assert_eq!(matches[0].status, "Unclaimed");
        assert_eq!(matches[0].popularity, 80);
        assert_eq!(match_rate(catalog.len(), &matches), 100.0);
    }

    #[test]
    fn test_case_and_whitespace_insensitive() {
        let catalog = vec![CatalogEntry::new("Song A", " usrc17607839 ")];

        let matches = find_matches(&catalog, &sample_index());

        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].work_title, "Song A");
        // The catalog's own spelling is kept in the record
        assert_eq!(matches[0].isrc, " usrc17607839 ");
    }

    #[test]
    fn test_fan_out_keeps_every_bucket_entry_in_order() {
        let catalog = vec![CatalogEntry::new("Track", "gbaye0000001")];

        let matches = find_matches(&catalog, &sample_index());
        let titles: Vec<&str> = matches.iter().map(|m| m.work_title.as_str()).collect();

        assert_eq!(titles, vec!["Work 1", "Work 2", "Work 3"]);
        assert!(matches.iter().all(|m| m.catalog_index == 0));
    }

    #[test]
    fn test_output_grouped_by_catalog_order() {
        let catalog = vec![
            CatalogEntry::new("Second Code First", "GBAYE0000001"),
            CatalogEntry::new("Miss", "ZZZZZ9999999"),
            CatalogEntry::new("First Code Last", "USRC17607839"),
        ];

        let matches = find_matches(&catalog, &sample_index());
        let order: Vec<usize> = matches.iter().map(|m| m.catalog_index).collect();

        assert_eq!(order, vec![0, 0, 0, 2]);
        assert_eq!(matches[3].track_name, "First Code Last");
    }

    #[test]
    fn test_no_matches_is_empty_not_error() {
        let catalog = vec![CatalogEntry::new("Miss", "ZZZZZ9999999")];

        let matches = find_matches(&catalog, &sample_index());

        assert!(matches.is_empty());
        assert_eq!(match_rate(catalog.len(), &matches), 0.0);
    }

    #[test]
    fn test_empty_catalog() {
        let matches = find_matches(&[], &sample_index());

        assert!(matches.is_empty());
        assert_eq!(match_rate(0, &matches), 0.0);
    }

    #[test]
    fn test_match_rate_counts_tracks_not_records() {
        let catalog = vec![
            CatalogEntry::new("Fan Out", "GBAYE0000001"),
            CatalogEntry::new("Miss", "ZZZZZ9999999"),
        ];

        let matches = find_matches(&catalog, &sample_index());

        assert_eq!(matches.len(), 3);
        assert_eq!(matched_track_count(&matches), 1);
        assert_eq!(match_rate(catalog.len(), &matches), 50.0);
    }

    #[test]
    fn test_duplicate_tracks_each_match() {
        let catalog = vec![
            CatalogEntry::new("Song A", "USRC17607839"),
            CatalogEntry::new("Song A (Remaster)", "USRC17607839"),
        ];

        let matches = find_matches(&catalog, &sample_index());

        assert_eq!(matches.len(), 2);
        assert_eq!(match_rate(catalog.len(), &matches), 100.0);
    }
}
