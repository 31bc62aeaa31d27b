// ⚙️ Configuration - TOML file with defaults for every field
//
// Every setting has a default, so the tool runs with no config file at all.
// The binary applies CLI overrides on top of whatever is loaded here.

use crate::registry::DEFAULT_ROW_CAP;
use crate::sink::ReportFormat;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_REGISTRY_PATH: &str = "unclaimedmusicalworkrightshares.tsv";
pub const DEFAULT_CATALOG_PATH: &str = "catalog.json";
pub const DEFAULT_PRIMARY_ENTITY: &str = "The Weeknd";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    pub registry: RegistryConfig,
    pub catalog: CatalogConfig,
    pub report: ReportConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    pub path: PathBuf,
    pub row_cap: usize,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    pub path: PathBuf,

    /// Entity analyzed first
    pub primary_entity: String,

    /// Tried in order when the primary entity has no matches
    pub fallback_entities: Vec<String>,

    /// How many of `fallback_entities` are actually tried
    pub max_fallback_attempts: usize,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    pub format: ReportFormat,
    pub output_dir: PathBuf,

    /// Second location tried once when `output_dir` cannot be written
    pub fallback_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            registry: RegistryConfig::default(),
            catalog: CatalogConfig::default(),
            report: ReportConfig::default(),
        }
    }
}

impl Default for RegistryConfig {
    fn default() -> Self {
        RegistryConfig {
            path: PathBuf::from(DEFAULT_REGISTRY_PATH),
            row_cap: DEFAULT_ROW_CAP,
        }
    }
}

impl Default for CatalogConfig {
    fn default() -> Self {
        CatalogConfig {
            path: PathBuf::from(DEFAULT_CATALOG_PATH),
            primary_entity: DEFAULT_PRIMARY_ENTITY.to_string(),
            fallback_entities: vec![
                "Taylor Swift".to_string(),
                "Ed Sheeran".to_string(),
                "Adele".to_string(),
            ],
            max_fallback_attempts: 3,
        }
    }
}

impl Default for ReportConfig {
    fn default() -> Self {
        ReportConfig {
            format: ReportFormat::Sqlite,
            output_dir: PathBuf::from("."),
            fallback_dir: default_fallback_dir(),
        }
    }
}

/// `~/Desktop`, when a home directory can be found
pub fn default_fallback_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join("Desktop"))
}

impl Config {
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::from_toml_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        Ok(config)
    }

    /// Load `path` if given, otherwise defaults
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => Self::from_file(p),
            None => Ok(Config::default()),
        }
    }

    /// Fallback entities that will actually be tried
    pub fn fallback_entities(&self) -> &[String] {
        let n = self
            .catalog
            .max_fallback_attempts
            .min(self.catalog.fallback_entities.len());
        &self.catalog.fallback_entities[..n]
    }
}
