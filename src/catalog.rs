// 🎵 Catalog Source - Recordings attributed to one entity
//
// The core only needs "an ordered list of tracks with ISRCs for a name".
// Where that list comes from sits behind `CatalogSource`; the bundled
// implementation reads a JSON export of top tracks keyed by entity name.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

/// Tracks taken per entity, matching the top-tracks endpoint size
pub const TOP_TRACKS_LIMIT: usize = 10;

// ============================================================================
// CATALOG ENTRY
// ============================================================================

/// One recording, as handed to the matcher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub track_name: String,
    pub album_name: String,
    pub release_date: String,

    /// External standard code (ISRC), as supplied; not yet normalized
    pub isrc: String,

    /// 0-100
    pub popularity: u32,
}

impl CatalogEntry {
    pub fn new(track_name: &str, isrc: &str) -> Self {
        CatalogEntry {
            track_name: track_name.to_string(),
            album_name: String::new(),
            release_date: String::new(),
            isrc: isrc.to_string(),
            popularity: 0,
        }
    }

    /// Builder pattern: add album name
    pub fn with_album(mut self, album_name: &str) -> Self {
        self.album_name = album_name.to_string();
        self
    }

    /// Builder pattern: add release date
    pub fn with_release_date(mut self, release_date: &str) -> Self {
        self.release_date = release_date.to_string();
        self
    }

    /// Builder pattern: add popularity
    pub fn with_popularity(mut self, popularity: u32) -> Self {
        self.popularity = popularity;
        self
    }
}

/// Track as it appears in the source export. Only `isrc` decides whether
/// the track reaches the matcher at all.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SourceTrack {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub album: Option<String>,
    #[serde(default)]
    pub release_date: Option<String>,
    #[serde(default)]
    pub isrc: Option<String>,
    #[serde(default)]
    pub popularity: Option<u32>,
}

impl SourceTrack {
    fn into_entry(self) -> Option<CatalogEntry> {
        let isrc = self.isrc.filter(|code| !code.trim().is_empty())?;

        Some(CatalogEntry {
            track_name: self.name,
            album_name: self.album.unwrap_or_default(),
            release_date: self.release_date.unwrap_or_default(),
            isrc,
            popularity: self.popularity.unwrap_or(0),
        })
    }
}

/// Keep the first `TOP_TRACKS_LIMIT` tracks, then drop those without an ISRC.
pub fn entries_from_tracks(tracks: Vec<SourceTrack>) -> Vec<CatalogEntry> {
    tracks
        .into_iter()
        .take(TOP_TRACKS_LIMIT)
        .filter_map(SourceTrack::into_entry)
        .collect()
}

// ============================================================================
// CATALOG
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct Catalog {
    /// Canonical entity name as the source spells it
    pub entity_name: String,

    /// Label of the source the tracks came from
    pub source: String,

    pub entries: Vec<CatalogEntry>,
}

impl Catalog {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ============================================================================
// SOURCES
// ============================================================================

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("failed to read catalog file {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse catalog JSON from {origin}: {source}")]
    Parse {
        origin: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("no catalog found for '{entity}' (available: {})", .available.join(", "))]
    EntityNotFound {
        entity: String,
        available: Vec<String>,
    },
}

pub trait CatalogSource {
    /// Human-readable label used in the report notes
    fn label(&self) -> &str;

    /// Tracks for `entity`, in source order
    fn fetch(&self, entity: &str) -> Result<Catalog, CatalogError>;
}

/// Catalog backed by a JSON document: `{ "<entity>": [track, ...], ... }`.
pub struct JsonCatalogSource {
    label: String,
    entities: BTreeMap<String, Vec<SourceTrack>>,
}

impl JsonCatalogSource {
    pub fn from_file(path: &Path) -> Result<Self, CatalogError> {
        let content = fs::read_to_string(path).map_err(|source| CatalogError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let source = Self::from_json_str(&content, &path.display().to_string())?;
        info!(
            path = %path.display(),
            entities = source.entities.len(),
            "catalog source loaded"
        );
        Ok(source)
    }

    pub fn from_json_str(json: &str, origin: &str) -> Result<Self, CatalogError> {
        let entities: BTreeMap<String, Vec<SourceTrack>> =
            serde_json::from_str(json).map_err(|source| CatalogError::Parse {
                origin: origin.to_string(),
                source,
            })?;

        Ok(JsonCatalogSource {
            label: format!("Catalog export ({})", origin),
            entities,
        })
    }

    pub fn entity_names(&self) -> impl Iterator<Item = &str> {
        self.entities.keys().map(String::as_str)
    }
}

impl CatalogSource for JsonCatalogSource {
    fn label(&self) -> &str {
        &self.label
    }

    fn fetch(&self, entity: &str) -> Result<Catalog, CatalogError> {
        let wanted = entity.trim().to_lowercase();

        let (name, tracks) = self
            .entities
            .iter()
            .find(|(name, _)| name.trim().to_lowercase() == wanted)
            .ok_or_else(|| CatalogError::EntityNotFound {
                entity: entity.to_string(),
                available: self.entity_names().map(str::to_string).collect(),
            })?;

        let entries = entries_from_tracks(tracks.clone());
        debug!(
            entity = %name,
            listed = tracks.len(),
            with_isrc = entries.len(),
            "catalog fetched"
        );

        Ok(Catalog {
            entity_name: name.clone(),
            source: self.label.clone(),
            entries,
        })
    }
}

// ============================================================================
// TESTS
// ============================================================================
