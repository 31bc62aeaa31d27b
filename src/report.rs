// 📊 Report Builder - Catalog, matches and process notes as named tables
//
// Building a report is pure: no I/O, and the timestamp can be pinned so two
// builds over the same inputs compare equal. Persisting is `sink`'s job.

use crate::catalog::CatalogEntry;
use crate::matcher::{match_rate, matched_track_count, MatchRecord};
use crate::registry::{RegistryStats, ISRC_COLUMN};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const CATALOG_TABLE: &str = "Catalog";
pub const MATCHES_TABLE: &str = "Matches";
pub const NOTES_TABLE: &str = "Process_Notes";

pub const NO_MATCHES_MESSAGE: &str = "No matches found in unclaimed works dataset";

const CATALOG_COLUMNS: [&str; 5] = [
    "track_name",
    "album_name",
    "release_date",
    "isrc",
    "popularity",
];
const REGISTRY_COLUMNS: [&str; 4] = ["work_title", "writers", "publishers", "status"];

// ============================================================================
// TABLE
// ============================================================================

/// A named, rectangular table of text cells.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Table {
    pub name: String,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new(name: &str, columns: &[&str]) -> Self {
        Table {
            name: name.to_string(),
            columns: columns.iter().map(|c| c.to_string()).collect(),
            rows: Vec::new(),
        }
    }

    pub fn push_row(&mut self, row: Vec<String>) {
        debug_assert_eq!(row.len(), self.columns.len());
        self.rows.push(row);
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Cell by row position and column name
    pub fn cell(&self, row: usize, column: &str) -> Option<&str> {
        let col = self.columns.iter().position(|c| c == column)?;
        self.rows.get(row)?.get(col).map(String::as_str)
    }
}

// ============================================================================
// REPORT
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub entity_name: String,
    pub catalog: Table,
    pub matches: Table,
    pub notes: Table,

    /// Same figure the notes table shows, unrounded
    pub match_rate: f64,
    pub match_count: usize,
    pub generated_at: DateTime<Utc>,
}

impl Report {
    /// Tables in the order they are persisted
    pub fn tables(&self) -> [&Table; 3] {
        [&self.catalog, &self.matches, &self.notes]
    }

    pub fn has_matches(&self) -> bool {
        self.match_count > 0
    }

    pub fn summary(&self) -> String {
        format!(
            "Report for {}: {} tracks, {} matches, match rate {:.1}%",
            self.entity_name,
            self.catalog.len(),
            self.match_count,
            self.match_rate
        )
    }
}

// ============================================================================
// REPORT BUILDER
// ============================================================================

pub struct ReportBuilder {
    /// Where the catalog came from, shown in the notes
    pub source_label: String,

    pub registry: Option<RegistryStats>,

    /// Pinned generation time; `None` uses the clock
    pub generated_at: Option<DateTime<Utc>>,
}

impl ReportBuilder {
    pub fn new() -> Self {
        ReportBuilder {
            source_label: "Top tracks".to_string(),
            registry: None,
            generated_at: None,
        }
    }

    pub fn with_source(mut self, label: &str) -> Self {
        self.source_label = label.to_string();
        self
    }

    pub fn with_registry(mut self, stats: RegistryStats) -> Self {
        self.registry = Some(stats);
        self
    }

    pub fn with_generated_at(mut self, at: DateTime<Utc>) -> Self {
        self.generated_at = Some(at);
        self
    }

    pub fn build(
        &self,
        catalog: &[CatalogEntry],
        matches: &[MatchRecord],
        entity_name: &str,
    ) -> Report {
        let generated_at = self.generated_at.unwrap_or_else(Utc::now);
        let rate = match_rate(catalog.len(), matches);

        Report {
            entity_name: entity_name.to_string(),
            catalog: catalog_table(catalog),
            matches: matches_table(matches),
            notes: self.notes_table(catalog, matches, entity_name, rate, generated_at),
            match_rate: rate,
            match_count: matches.len(),
            generated_at,
        }
    }

    fn notes_table(
        &self,
        catalog: &[CatalogEntry],
        matches: &[MatchRecord],
        entity_name: &str,
        rate: f64,
        generated_at: DateTime<Utc>,
    ) -> Table {
        let mut notes = Table::new(NOTES_TABLE, &["Section", "Details"]);

        let dataset = match &self.registry {
            Some(stats) => {
                let mut lines = vec![
                    format!(
                        "Unclaimed works: {} records analyzed ({} distinct ISRCs)",
                        stats.rows_read, stats.distinct_codes
                    ),
                    format!("{} column used for matching", ISRC_COLUMN),
                ];
                if stats.truncated {
                    lines.push(format!(
                        "Registry truncated: file holds more than {} rows",
                        group_thousands(stats.row_cap)
                    ));
                }
                if let Some(fingerprint) = &stats.fingerprint {
                    lines.push(format!("Registry SHA-256: {}", fingerprint));
                }
                lines.join("\n")
            }
            None => format!(
                "Unclaimed works: registry statistics unavailable\n{} column used for matching",
                ISRC_COLUMN
            ),
        };
        notes.push_row(vec!["Dataset Info".to_string(), dataset]);

        notes.push_row(vec![
            "Catalog Analysis".to_string(),
            format!(
                "Entity: {}\nTracks analyzed: {}\nSource: {}",
                entity_name,
                catalog.len(),
                self.source_label
            ),
        ]);

        notes.push_row(vec![
            "Matching Results".to_string(),
            format!(
                "Matches found: {}\nTracks matched: {}\nMatch rate (tracks matched / tracks analyzed): {:.1}%",
                matches.len(),
                matched_track_count(matches),
                rate
            ),
        ]);

        let mut technical = format!("Generated: {}", generated_at.format("%Y-%m-%d %H:%M"));
        if let Some(stats) = &self.registry {
            technical.push_str(&format!(
                "\nDataset sample: {} records",
                group_thousands(stats.row_cap)
            ));
        }
        notes.push_row(vec!["Technical Details".to_string(), technical]);

        notes
    }
}

impl Default for ReportBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn catalog_table(catalog: &[CatalogEntry]) -> Table {
    let mut table = Table::new(CATALOG_TABLE, &CATALOG_COLUMNS);
    for track in catalog {
        table.push_row(vec![
            track.track_name.clone(),
            track.album_name.clone(),
            track.release_date.clone(),
            track.isrc.clone(),
            track.popularity.to_string(),
        ]);
    }
    table
}

/// The matches table is never empty: zero matches become one message row.
fn matches_table(matches: &[MatchRecord]) -> Table {
    if matches.is_empty() {
        let mut table = Table::new(MATCHES_TABLE, &["Message"]);
        table.push_row(vec![NO_MATCHES_MESSAGE.to_string()]);
        return table;
    }

    let columns: Vec<&str> = CATALOG_COLUMNS
        .iter()
        .chain(REGISTRY_COLUMNS.iter())
        .copied()
        .collect();
    let mut table = Table::new(MATCHES_TABLE, &columns);

    for m in matches {
        table.push_row(vec![
            m.track_name.clone(),
            m.album_name.clone(),
            m.release_date.clone(),
            m.isrc.clone(),
            m.popularity.to_string(),
            m.work_title.clone(),
            m.writers.clone(),
            m.publishers.clone(),
            m.status.clone(),
        ]);
    }
    table
}

/// 50000 → "50,000"
fn group_thousands(n: usize) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matcher::find_matches;
    use crate::registry::{RegistryEntry, RegistryIndex};
    use chrono::TimeZone;

    fn fixed_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 31, 12, 30, 0).unwrap()
    }

    fn sample_stats(truncated: bool) -> RegistryStats {
        RegistryStats {
            source_file: "registry.tsv".to_string(),
            columns: vec!["ISRC".to_string()],
            rows_read: 50_000,
            rows_accepted: 42_000,
            rows_rejected: 8_000,
            distinct_codes: 40_000,
            row_cap: 50_000,
            truncated,
            fingerprint: Some("ab12".to_string()),
        }
    }

    fn index_with_song_a() -> RegistryIndex {
        let mut index = RegistryIndex::new();
        index.insert(
            "USRC17607839",
            RegistryEntry::new(Some("Song A".to_string()), Some("Artist A".to_string())),
        );
        index
    }

    #[test]
    fn test_report_with_match() {
        let catalog = vec![CatalogEntry::new("Song A", "USRC17607839").with_popularity(80)];
        let matches = find_matches(&catalog, &index_with_song_a());

        let report = ReportBuilder::new()
            .with_generated_at(fixed_time())
            .build(&catalog, &matches, "Artist A");

        assert_eq!(report.match_rate, 100.0);
        assert!(report.has_matches());
        assert_eq!(report.catalog.len(), 1);
        assert_eq!(report.matches.len(), 1);
        assert_eq!(report.matches.cell(0, "track_name"), Some("Song A"));
        assert_eq!(report.matches.cell(0, "status"), Some("Unclaimed"));
        assert_eq!(report.matches.cell(0, "popularity"), Some("80"));
        assert!(report.notes.rows[2][1].contains("Match rate (tracks matched / tracks analyzed): 100.0%"));
    }

    #[test]
    fn test_fan_out_counts_matches_but_rates_tracks() {
        let mut index = index_with_song_a();
        index.insert(
            "USRC17607839",
            RegistryEntry::new(Some("Song A (alt)".to_string()), None),
        );
        let catalog = vec![
            CatalogEntry::new("Song A", "USRC17607839"),
            CatalogEntry::new("Miss", "ZZZZZ9999999"),
        ];
        let matches = find_matches(&catalog, &index);

        let report = ReportBuilder::new().build(&catalog, &matches, "Artist A");

        assert_eq!(report.match_count, 2);
        assert_eq!(report.match_rate, 50.0);
        let results = &report.notes.rows[2][1];
        assert!(results.contains("Matches found: 2"));
        assert!(results.contains("Tracks matched: 1"));
        assert!(results.contains("Match rate (tracks matched / tracks analyzed): 50.0%"));
    }

    #[test]
    fn test_empty_catalog_report() {
        let report = ReportBuilder::new()
            .with_generated_at(fixed_time())
            .build(&[], &[], "Nobody");

        assert_eq!(report.match_rate, 0.0);
        assert!(report.catalog.is_empty());
        assert_eq!(report.matches.columns, vec!["Message"]);
        assert_eq!(report.matches.cell(0, "Message"), Some(NO_MATCHES_MESSAGE));

        let analysis = &report.notes.rows[1][1];
        assert!(analysis.contains("Tracks analyzed: 0"));
        let results = &report.notes.rows[2][1];
        assert!(results.contains("Match rate (tracks matched / tracks analyzed): 0.0%"));
    }

    #[test]
    fn test_no_matches_uses_placeholder() {
        let catalog = vec![CatalogEntry::new("Miss", "ZZZZZ9999999")];

        let report = ReportBuilder::new().build(&catalog, &[], "Someone");

        assert!(!report.has_matches());
        assert_eq!(report.matches.len(), 1);
        assert_eq!(report.matches.rows[0][0], NO_MATCHES_MESSAGE);
    }

    #[test]
    fn test_notes_have_fixed_sections() {
        let report = ReportBuilder::new()
            .with_registry(sample_stats(false))
            .with_source("Catalog export (catalog.json)")
            .with_generated_at(fixed_time())
            .build(&[], &[], "Someone");

        let sections: Vec<&str> = report.notes.rows.iter().map(|r| r[0].as_str()).collect();
        assert_eq!(
            sections,
            vec![
                "Dataset Info",
                "Catalog Analysis",
                "Matching Results",
                "Technical Details"
            ]
        );
        assert!(report.notes.rows[0][1].contains("50000 records analyzed"));
        assert!(report.notes.rows[0][1].contains("Registry SHA-256: ab12"));
        assert!(!report.notes.rows[0][1].contains("truncated"));
        assert!(report.notes.rows[1][1].contains("Source: Catalog export (catalog.json)"));
        assert!(report.notes.rows[3][1].contains("Generated: 2025-01-31 12:30"));
        assert!(report.notes.rows[3][1].contains("Dataset sample: 50,000 records"));
    }

    #[test]
    fn test_truncation_is_visible_in_notes() {
        let report = ReportBuilder::new()
            .with_registry(sample_stats(true))
            .build(&[], &[], "Someone");

        assert!(report.notes.rows[0][1].contains("Registry truncated"));
    }

    #[test]
    fn test_build_is_idempotent() {
        let catalog = vec![
            CatalogEntry::new("Song A", "USRC17607839"),
            CatalogEntry::new("Miss", "ZZZZZ9999999"),
        ];
        let matches = find_matches(&catalog, &index_with_song_a());
        let builder = ReportBuilder::new()
            .with_registry(sample_stats(false))
            .with_generated_at(fixed_time());

        let first = builder.build(&catalog, &matches, "Artist A");
        let second = builder.build(&catalog, &matches, "Artist A");

        assert_eq!(first, second);
    }

    #[test]
    fn test_match_rate_bounded_with_fan_out() {
        let mut index = index_with_song_a();
        index.insert("USRC17607839", RegistryEntry::new(None, None));
        index.insert("USRC17607839", RegistryEntry::new(None, None));
        let catalog = vec![CatalogEntry::new("Song A", "USRC17607839")];
        let matches = find_matches(&catalog, &index);

        let report = ReportBuilder::new().build(&catalog, &matches, "Artist A");

        assert_eq!(report.match_count, 3);
        assert!(report.match_rate >= 0.0 && report.match_rate <= 100.0);
        assert_eq!(report.match_rate, 100.0);
    }

    #[test]
    fn test_group_thousands() {
        assert_eq!(group_thousands(0), "0");
        assert_eq!(group_thousands(999), "999");
        assert_eq!(group_thousands(50_000), "50,000");
        assert_eq!(group_thousands(1_234_567), "1,234,567");
    }
}
