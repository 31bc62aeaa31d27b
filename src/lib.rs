// Unclaimed Rights - Core Library
// Exposes the registry loader, matcher, report builder and sinks for the CLI and tests

pub mod isrc;
pub mod registry;  // Unclaimed works registry (TSV) → ISRC index
pub mod catalog;   // Catalog sources (per-entity top tracks)
pub mod matcher;   // Catalog ⋈ registry join
pub mod report;    // Three-table report model
pub mod sink;      // SQLite / JSON persistence + fallback location
pub mod config;
pub mod logging;
pub mod pipeline;  // Multi-entity driver

// Re-export commonly used types
pub use registry::{
    LoadError, LoadedRegistry, RegistryEntry, RegistryIndex, RegistryLoader, RegistryStats,
};
pub use catalog::{Catalog, CatalogEntry, CatalogError, CatalogSource, JsonCatalogSource};
pub use matcher::{find_matches, match_rate, MatchRecord};
pub use report::{Report, ReportBuilder, Table};
pub use sink::{
    JsonReportSink, PersistError, PersistOutcome, ReportFormat, ReportSink, ReportWriter,
    SqliteReportSink,
};
pub use config::Config;
pub use pipeline::{load_registry, Analyzer, EntityOutcome, PipelineError, RunSummary, Stage};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
