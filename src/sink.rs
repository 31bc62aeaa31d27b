// 💾 Report Sink - Persist the three report tables as one artifact
//
// A sink writes every table of a report into a single file. Writes land in a
// temporary sibling first and are renamed into place only when complete, so
// a failed run never leaves a half-written report behind.
//
// `ReportWriter` adds the location policy: primary directory first, then one
// retry in the fallback directory, then give up.

use crate::report::{Report, Table};
use anyhow::{Context, Result};
use rusqlite::{params_from_iter, Connection};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;
use tracing::{info, warn};

/// Suffix appended to the sanitized entity name
pub const REPORT_SUFFIX: &str = "_analysis";

// ============================================================================
// FILENAMES
// ============================================================================

/// Keep alphanumerics, spaces, hyphens and underscores; trim the end;
/// spaces become underscores.
///
/// Example: "Guns N' Roses!" → "Guns_N_Roses"
pub fn sanitize_entity_name(entity_name: &str) -> String {
    let kept: String = entity_name
        .chars()
        .filter(|c| c.is_alphanumeric() || matches!(c, ' ' | '-' | '_'))
        .collect();

    let sanitized = kept.trim_end().replace(' ', "_");
    if sanitized.is_empty() {
        "unnamed".to_string()
    } else {
        sanitized
    }
}

/// `<sanitized>_analysis.<extension>`
pub fn report_filename(entity_name: &str, extension: &str) -> String {
    format!(
        "{}{}.{}",
        sanitize_entity_name(entity_name),
        REPORT_SUFFIX,
        extension
    )
}

// ============================================================================
// SINKS
// ============================================================================

pub trait ReportSink {
    /// File extension without the dot
    fn extension(&self) -> &str;

    /// Write the complete report to `path`, or nothing at all.
    fn write(&self, report: &Report, path: &Path) -> Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    Sqlite,
    Json,
}

impl ReportFormat {
    pub fn sink(self) -> Box<dyn ReportSink> {
        match self {
            ReportFormat::Sqlite => Box::new(SqliteReportSink),
            ReportFormat::Json => Box::new(JsonReportSink),
        }
    }
}

impl FromStr for ReportFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "sqlite" | "sqlite3" | "db" => Ok(ReportFormat::Sqlite),
            "json" => Ok(ReportFormat::Json),
            other => Err(format!(
                "unknown report format '{}' (expected sqlite or json)",
                other
            )),
        }
    }
}

/// Sibling path the sink writes before renaming into place
fn partial_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".partial");
    path.with_file_name(name)
}

/// Run `write` against a partial file, then move it over `path`.
fn write_atomically<F>(path: &Path, write: F) -> Result<()>
where
    F: FnOnce(&Path) -> Result<()>,
{
    let partial = partial_path(path);
    if partial.exists() {
        fs::remove_file(&partial)
            .with_context(|| format!("Failed to remove stale file: {}", partial.display()))?;
    }

    let result = write(&partial).and_then(|_| {
        fs::rename(&partial, path)
            .with_context(|| format!("Failed to move report into place: {}", path.display()))
    });

    if result.is_err() {
        let _ = fs::remove_file(&partial);
    }
    result
}

/// One SQLite database, one SQL table per report table.
pub struct SqliteReportSink;

impl SqliteReportSink {
    fn write_table(conn: &Connection, table: &Table) -> Result<()> {
        let columns: Vec<String> = table
            .columns
            .iter()
            .map(|c| format!("{} TEXT", quote_ident(c)))
            .collect();
        conn.execute(
            &format!(
                "CREATE TABLE {} ({})",
                quote_ident(&table.name),
                columns.join(", ")
            ),
            [],
        )
        .with_context(|| format!("Failed to create table {}", table.name))?;

        let placeholders: Vec<String> = (1..=table.columns.len())
            .map(|i| format!("?{}", i))
            .collect();
        let mut stmt = conn.prepare(&format!(
            "INSERT INTO {} VALUES ({})",
            quote_ident(&table.name),
            placeholders.join(", ")
        ))?;

        for row in &table.rows {
            stmt.execute(params_from_iter(row.iter()))
                .with_context(|| format!("Failed to insert row into {}", table.name))?;
        }

        Ok(())
    }
}

impl ReportSink for SqliteReportSink {
    fn extension(&self) -> &str {
        "sqlite3"
    }

    fn write(&self, report: &Report, path: &Path) -> Result<()> {
        write_atomically(path, |partial| {
            let mut conn = Connection::open(partial)
                .with_context(|| format!("Failed to create report database: {}", partial.display()))?;

            let tx = conn.transaction()?;
            for table in report.tables() {
                Self::write_table(&tx, table)?;
            }
            tx.commit().context("Failed to commit report tables")?;

            conn.close()
                .map_err(|(_, e)| e)
                .context("Failed to close report database")?;
            Ok(())
        })
    }
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Pretty-printed JSON document holding every table.
pub struct JsonReportSink;

#[derive(Serialize)]
struct JsonReport<'a> {
    entity_name: &'a str,
    generated_at: String,
    match_rate: f64,
    tables: [&'a Table; 3],
}

impl ReportSink for JsonReportSink {
    fn extension(&self) -> &str {
        "json"
    }

    fn write(&self, report: &Report, path: &Path) -> Result<()> {
        let document = JsonReport {
            entity_name: &report.entity_name,
            generated_at: report.generated_at.to_rfc3339(),
            match_rate: report.match_rate,
            tables: report.tables(),
        };

        write_atomically(path, |partial| {
            let file = File::create(partial)
                .with_context(|| format!("Failed to create report file: {}", partial.display()))?;
            let mut writer = BufWriter::new(file);
            serde_json::to_writer_pretty(&mut writer, &document)
                .context("Failed to serialize report")?;
            writer.flush().context("Failed to flush report file")?;
            Ok(())
        })
    }
}

// ============================================================================
// REPORT WRITER (location policy)
// ============================================================================

#[derive(Error, Debug)]
pub enum PersistError {
    #[error("could not write report to {} ({primary_error:#}) and no fallback directory is configured", .primary.display())]
    NoFallback {
        primary: PathBuf,
        primary_error: anyhow::Error,
    },

    #[error("could not write report to {} ({primary_error:#}) or to {} ({fallback_error:#})", .primary.display(), .fallback.display())]
    Exhausted {
        primary: PathBuf,
        primary_error: anyhow::Error,
        fallback: PathBuf,
        fallback_error: anyhow::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistOutcome {
    pub path: PathBuf,
    pub used_fallback: bool,
}

pub struct ReportWriter {
    sink: Box<dyn ReportSink>,
    primary_dir: PathBuf,
    fallback_dir: Option<PathBuf>,
}

impl ReportWriter {
    pub fn new(sink: Box<dyn ReportSink>, primary_dir: PathBuf) -> Self {
        ReportWriter {
            sink,
            primary_dir,
            fallback_dir: None,
        }
    }

    pub fn with_fallback(mut self, fallback_dir: PathBuf) -> Self {
        self.fallback_dir = Some(fallback_dir);
        self
    }

    /// Persist under the filename derived from the report's entity name.
    pub fn persist(&self, report: &Report) -> Result<PersistOutcome, PersistError> {
        let filename = report_filename(&report.entity_name, self.sink.extension());
        self.persist_as(report, &filename)
    }

    /// Primary directory first; on failure one retry in the fallback
    /// directory. No further retries.
    pub fn persist_as(&self, report: &Report, filename: &str) -> Result<PersistOutcome, PersistError> {
        let primary = self.primary_dir.join(filename);

        let primary_error = match self.sink.write(report, &primary) {
            Ok(()) => {
                info!(path = %primary.display(), "report saved");
                return Ok(PersistOutcome {
                    path: primary,
                    used_fallback: false,
                });
            }
            Err(e) => e,
        };

        warn!(path = %primary.display(), error = %format!("{:#}", primary_error), "report write failed");

        let Some(fallback_dir) = &self.fallback_dir else {
            return Err(PersistError::NoFallback {
                primary,
                primary_error,
            });
        };

        let fallback = fallback_dir.join(filename);
        info!(path = %fallback.display(), "trying fallback location");

        match self.sink.write(report, &fallback) {
            Ok(()) => {
                info!(path = %fallback.display(), "report saved to fallback location");
                Ok(PersistOutcome {
                    path: fallback,
                    used_fallback: true,
                })
            }
            Err(fallback_error) => Err(PersistError::Exhausted {
                primary,
                primary_error,
                fallback,
                fallback_error,
            }),
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::CatalogEntry;
    use crate::matcher::find_matches;
    use crate::registry::{RegistryEntry, RegistryIndex};
    use crate::report::{ReportBuilder, NO_MATCHES_MESSAGE};
    use tempfile::TempDir;

    fn sample_report(with_match: bool) -> Report {
        let mut index = RegistryIndex::new();
        index.insert(
            "USRC17607839",
            RegistryEntry::new(Some("Song A".to_string()), None),
        );
        let catalog = if with_match {
            vec![CatalogEntry::new("Song A", "USRC17607839")]
        } else {
            vec![CatalogEntry::new("Miss", "ZZZZZ9999999")]
        };
        let matches = find_matches(&catalog, &index);
        ReportBuilder::new().build(&catalog, &matches, "Artist A")
    }

    #[test]
    fn test_sanitize_entity_name() {
        assert_eq!(sanitize_entity_name("The Weeknd"), "The_Weeknd");
        assert_eq!(sanitize_entity_name("Guns N' Roses!"), "Guns_N_Roses");
        assert_eq!(sanitize_entity_name("AC/DC"), "ACDC");
        assert_eq!(sanitize_entity_name("Jay-Z_x "), "Jay-Z_x");
        assert_eq!(sanitize_entity_name("Beyoncé"), "Beyoncé");
        assert_eq!(sanitize_entity_name("???"), "unnamed");
    }

    #[test]
    fn test_report_filename() {
        assert_eq!(
            report_filename("Taylor Swift", "sqlite3"),
            "Taylor_Swift_analysis.sqlite3"
        );
    }

    #[test]
    fn test_report_format_from_str() {
        assert_eq!("SQLite".parse::<ReportFormat>(), Ok(ReportFormat::Sqlite));
        assert_eq!("json".parse::<ReportFormat>(), Ok(ReportFormat::Json));
        assert!("xlsx".parse::<ReportFormat>().is_err());
    }

    #[test]
    fn test_sqlite_sink_writes_all_tables() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("report.sqlite3");

        SqliteReportSink.write(&sample_report(true), &path).unwrap();

        let conn = Connection::open(&path).unwrap();
        let count = |table: &str| -> i64 {
            conn.query_row(&format!("SELECT COUNT(*) FROM \"{}\"", table), [], |row| row.get(0))
                .unwrap()
        };
        assert_eq!(count("Catalog"), 1);
        assert_eq!(count("Matches"), 1);
        assert_eq!(count("Process_Notes"), 4);

        let title: String = conn
            .query_row("SELECT work_title FROM \"Matches\"", [], |row| row.get(0))
            .unwrap();
        assert_eq!(title, "Song A");
        assert!(!partial_path(&path).exists());
    }

    #[test]
    fn test_sqlite_sink_overwrites_existing_report() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("report.sqlite3");

        SqliteReportSink.write(&sample_report(true), &path).unwrap();
        SqliteReportSink.write(&sample_report(false), &path).unwrap();

        let conn = Connection::open(&path).unwrap();
        let message: String = conn
            .query_row("SELECT Message FROM \"Matches\"", [], |row| row.get(0))
            .unwrap();
        assert_eq!(message, NO_MATCHES_MESSAGE);
    }

    #[test]
    fn test_json_sink_writes_all_tables() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("report.json");

        JsonReportSink.write(&sample_report(true), &path).unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        let names: Vec<&str> = value["tables"]
            .as_array()
            .unwrap()
            .iter()
            .map(|t| t["name"].as_str().unwrap())
            .collect();
        assert_eq!(names, vec!["Catalog", "Matches", "Process_Notes"]);
        assert_eq!(value["entity_name"], "Artist A");
    }

    #[test]
    fn test_writer_uses_primary_when_possible() {
        let primary = TempDir::new().unwrap();
        let fallback = TempDir::new().unwrap();

        let writer = ReportWriter::new(ReportFormat::Json.sink(), primary.path().to_path_buf())
            .with_fallback(fallback.path().to_path_buf());
        let outcome = writer.persist(&sample_report(true)).unwrap();

        assert!(!outcome.used_fallback);
        assert_eq!(outcome.path, primary.path().join("Artist_A_analysis.json"));
        assert!(outcome.path.exists());
    }

    #[test]
    fn test_writer_falls_back_once() {
        let root = TempDir::new().unwrap();
        let fallback = TempDir::new().unwrap();
        let missing = root.path().join("does-not-exist");

        let writer = ReportWriter::new(ReportFormat::Sqlite.sink(), missing.clone())
            .with_fallback(fallback.path().to_path_buf());
        let outcome = writer.persist(&sample_report(true)).unwrap();

        assert!(outcome.used_fallback);
        assert_eq!(
            outcome.path,
            fallback.path().join("Artist_A_analysis.sqlite3")
        );
        assert!(outcome.path.exists());
        assert!(!missing.exists());
    }

    #[test]
    fn test_writer_reports_both_failures() {
        let root = TempDir::new().unwrap();

        let writer = ReportWriter::new(ReportFormat::Json.sink(), root.path().join("a"))
            .with_fallback(root.path().join("b"));
        let result = writer.persist(&sample_report(false));

        match result {
            Err(PersistError::Exhausted {
                primary, fallback, ..
            }) => {
                assert_eq!(primary, root.path().join("a").join("Artist_A_analysis.json"));
                assert_eq!(fallback, root.path().join("b").join("Artist_A_analysis.json"));
            }
            other => panic!("expected Exhausted, got {:?}", other),
        }
    }

    #[test]
    fn test_writer_without_fallback() {
        let root = TempDir::new().unwrap();

        let writer = ReportWriter::new(ReportFormat::Json.sink(), root.path().join("missing"));
        let result = writer.persist(&sample_report(false));

        assert!(matches!(result, Err(PersistError::NoFallback { .. })));
    }
}
