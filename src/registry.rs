// 📇 Registry Loader - Unclaimed works TSV → ISRC index
//
// The registry export is a tab-separated file whose header line starts with
// `#` (so a plain comment-aware reader would swallow it). We read the header
// ourselves, strip the marker, then hand the remaining lines to `csv` with
// `#` lines treated as comments. Quotes carry no meaning in this export.
//
// The row cap bounds memory and latency. It is not a completeness guarantee,
// so whether the file was cut short is reported in `RegistryStats`.

use crate::isrc;
use csv::{ReaderBuilder, StringRecord};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Default cap on data rows read from the registry
pub const DEFAULT_ROW_CAP: usize = 50_000;

pub const ISRC_COLUMN: &str = "ISRC";

/// Fallback for any descriptive field the registry leaves blank
pub const UNKNOWN: &str = "Unknown";

/// Every entry in this registry is, by definition, unclaimed
pub const UNCLAIMED: &str = "Unclaimed";

const COMMENT_MARKER: u8 = b'#';
const DELIMITER: u8 = b'\t';

// ============================================================================
// ERRORS
// ============================================================================

/// Why no index could be produced.
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("failed to open registry file {}: {source}", .path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to read registry file {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("registry file {} is not valid UTF-8: {detail}", .path.display())]
    Encoding { path: PathBuf, detail: String },

    #[error("registry file {} has no header line", .path.display())]
    MissingHeader { path: PathBuf },

    #[error("registry header has no '{column}' column (found: {found:?})")]
    MissingColumn {
        column: &'static str,
        found: Vec<String>,
    },

    #[error("malformed registry record at line {line}: {source}")]
    Record {
        line: u64,
        #[source]
        source: csv::Error,
    },
}

// ============================================================================
// REGISTRY ENTRY
// ============================================================================

/// One unclaimed work, reduced to the fields the report needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryEntry {
    pub work_title: String,
    pub writers: String,

    /// Always "Unknown": the export carries share data but no usable
    /// publisher name column.
    pub publishers: String,

    pub status: String,
}

impl RegistryEntry {
    pub fn new(work_title: Option<String>, writers: Option<String>) -> Self {
        RegistryEntry {
            work_title: or_unknown(work_title),
            writers: or_unknown(writers),
            publishers: UNKNOWN.to_string(),
            status: UNCLAIMED.to_string(),
        }
    }

    fn from_row(row: RegistryRow) -> Self {
        RegistryEntry::new(row.resource_title, row.display_artist_name)
    }
}

fn or_unknown(value: Option<String>) -> String {
    value
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| UNKNOWN.to_string())
}

/// Raw row as it appears in the TSV. Every column is optional here;
/// defaults are applied once in `RegistryEntry::from_row`.
#[derive(Debug, Deserialize)]
struct RegistryRow {
    #[serde(rename = "ISRC", default)]
    isrc: Option<String>,

    #[serde(rename = "ResourceTitle", default)]
    resource_title: Option<String>,

    #[serde(rename = "DisplayArtistName", default)]
    display_artist_name: Option<String>,
}

// ============================================================================
// REGISTRY INDEX
// ============================================================================

/// Normalized ISRC → every registry entry carrying that code, in file order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RegistryIndex {
    buckets: HashMap<String, Vec<RegistryEntry>>,
}

impl RegistryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `entry` under the normalized form of `code`.
    ///
    /// Returns false (and stores nothing) when the code is not indexable.
    pub fn insert(&mut self, code: &str, entry: RegistryEntry) -> bool {
        match isrc::normalize_indexable(code) {
            Some(key) => {
                self.buckets.entry(key).or_default().push(entry);
                true
            }
            None => false,
        }
    }

    /// Look up a code in any casing or padding.
    pub fn get(&self, code: &str) -> Option<&[RegistryEntry]> {
        self.buckets.get(&isrc::normalize(code)).map(Vec::as_slice)
    }

    pub fn contains(&self, code: &str) -> bool {
        self.buckets.contains_key(&isrc::normalize(code))
    }

    /// Number of distinct codes
    pub fn code_count(&self) -> usize {
        self.buckets.len()
    }

    /// Number of entries across all buckets
    pub fn entry_count(&self) -> usize {
        self.buckets.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    pub fn codes(&self) -> impl Iterator<Item = &str> {
        self.buckets.keys().map(String::as_str)
    }
}

// ============================================================================
// LOAD STATISTICS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistryStats {
    pub source_file: String,
    pub columns: Vec<String>,
    pub rows_read: usize,
    pub rows_accepted: usize,
    pub rows_rejected: usize,
    pub distinct_codes: usize,
    pub row_cap: usize,

    /// The file holds more data rows than `row_cap`
    pub truncated: bool,

    /// SHA-256 of the registry file, hex encoded
    pub fingerprint: Option<String>,
}

impl RegistryStats {
    pub fn summary(&self) -> String {
        format!(
            "Registry {}: {} rows read, {} accepted, {} rejected, {} distinct ISRCs{}",
            self.source_file,
            self.rows_read,
            self.rows_accepted,
            self.rows_rejected,
            self.distinct_codes,
            if self.truncated {
                format!(" (truncated at {} rows)", self.row_cap)
            } else {
                String::new()
            }
        )
    }
}

#[derive(Debug, Clone)]
pub struct LoadedRegistry {
    pub index: RegistryIndex,
    pub stats: RegistryStats,
}

// ============================================================================
// REGISTRY LOADER
// ============================================================================

pub struct RegistryLoader {
    /// Maximum number of data rows read (comments excluded)
    pub row_cap: usize,
}

impl RegistryLoader {
    pub fn new() -> Self {
        RegistryLoader {
            row_cap: DEFAULT_ROW_CAP,
        }
    }

    pub fn with_row_cap(row_cap: usize) -> Self {
        RegistryLoader { row_cap }
    }

    /// Parse the registry at `path` into an index.
    ///
    /// Any failure means "no index available"; the caller decides whether
    /// the run can continue.
    pub fn load(&self, path: &Path) -> Result<LoadedRegistry, LoadError> {
        info!(path = %path.display(), row_cap = self.row_cap, "loading registry");

        let file = File::open(path).map_err(|source| LoadError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        let mut reader = BufReader::new(file);

        let mut header_line = String::new();
        let header_bytes = reader
            .read_line(&mut header_line)
            .map_err(|source| read_error(path, source))?;
        if header_bytes == 0 {
            return Err(LoadError::MissingHeader {
                path: path.to_path_buf(),
            });
        }

        let columns = parse_header(&header_line);
        debug!(?columns, "registry header");
        if !columns.iter().any(|c| c == ISRC_COLUMN) {
            return Err(LoadError::MissingColumn {
                column: ISRC_COLUMN,
                found: columns,
            });
        }
        let headers = StringRecord::from(columns.clone());

        let mut rdr = ReaderBuilder::new()
            .delimiter(DELIMITER)
            .comment(Some(COMMENT_MARKER))
            .quoting(false)
            .has_headers(false)
            .flexible(true)
            .from_reader(reader);

        let mut index = RegistryIndex::new();
        let mut record = StringRecord::new();
        let mut rows_read = 0;
        let mut rows_accepted = 0;

        while rows_read < self.row_cap {
            let more = rdr
                .read_record(&mut record)
                .map_err(|e| record_error(path, e))?;
            if !more {
                break;
            }
            rows_read += 1;

            let row: RegistryRow = record
                .deserialize(Some(&headers))
                .map_err(|e| record_error(path, e))?;

            let Some(code) = row.isrc.as_deref().and_then(isrc::normalize_indexable) else {
                continue;
            };

            let entry = RegistryEntry::from_row(row);
            index.buckets.entry(code).or_default().push(entry);
            rows_accepted += 1;
        }

        // One extra read tells us whether the cap cut the file short.
        let truncated = rows_read == self.row_cap
            && !matches!(rdr.read_record(&mut record), Ok(false));
        if truncated {
            warn!(
                row_cap = self.row_cap,
                "registry has more rows than the cap; remaining rows were not indexed"
            );
        }

        let fingerprint = match fingerprint_file(path) {
            Ok(hash) => Some(hash),
            Err(e) => {
                warn!(error = %e, "could not fingerprint registry file");
                None
            }
        };

        let stats = RegistryStats {
            source_file: path.display().to_string(),
            columns,
            rows_read,
            rows_accepted,
            rows_rejected: rows_read - rows_accepted,
            distinct_codes: index.code_count(),
            row_cap: self.row_cap,
            truncated,
            fingerprint,
        };

        info!("{}", stats.summary());
        if let Some(sample) = index.codes().next() {
            debug!(sample, "registry index ready");
        }

        Ok(LoadedRegistry { index, stats })
    }
}

impl Default for RegistryLoader {
    fn default() -> Self {
        Self::new()
    }
}

/// Split the `#`-prefixed header line into trimmed column names.
fn parse_header(line: &str) -> Vec<String> {
    let line = line.trim_end_matches(['\r', '\n']);
    let line = line.trim_start_matches('\u{feff}');
    let line = line.strip_prefix(COMMENT_MARKER as char).unwrap_or(line);

    line.split(DELIMITER as char)
        .map(|c| c.trim().to_string())
        .collect()
}

fn read_error(path: &Path, source: io::Error) -> LoadError {
    if source.kind() == io::ErrorKind::InvalidData {
        LoadError::Encoding {
            path: path.to_path_buf(),
            detail: source.to_string(),
        }
    } else {
        LoadError::Read {
            path: path.to_path_buf(),
            source,
        }
    }
}

fn record_error(path: &Path, error: csv::Error) -> LoadError {
    // Lines are counted after the header, which we consumed ourselves.
    let line = error.position().map(|p| p.line() + 1).unwrap_or(0);

    match error.kind() {
        csv::ErrorKind::Utf8 { .. } => LoadError::Encoding {
            path: path.to_path_buf(),
            detail: format!("line {}: {}", line, error),
        },
        _ => LoadError::Record {
            line,
            source: error,
        },
    }
}

/// SHA-256 of the whole file, for provenance in the report
pub fn fingerprint_file(path: &Path) -> io::Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    io::copy(&mut file, &mut hasher)?;
    Ok(format!("{:x}", hasher.finalize()))
}

// ============================================================================
// TESTS
// ============================================================================
