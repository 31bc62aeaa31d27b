// 🚦 Analysis Pipeline - Drive the core across one or more entities
//
// The core (loader, matcher, report builder, writer) knows nothing about
// retrying other entities. This driver analyzes the primary entity, always
// writes its report, and when it has no matches walks the fallback list,
// writing a report for each fallback entity that does match.

use crate::catalog::{CatalogError, CatalogSource};
use crate::matcher::find_matches;
use crate::registry::{LoadError, LoadedRegistry, RegistryLoader};
use crate::report::{Report, ReportBuilder};
use crate::sink::{PersistError, ReportWriter};
use chrono::{DateTime, Utc};
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

// ============================================================================
// ERRORS
// ============================================================================

/// Pipeline stage a terminal failure came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Load,
    Match,
    Persist,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Load => "load",
            Stage::Match => "match",
            Stage::Persist => "persist",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("load stage failed: {0}")]
    Load(#[from] LoadError),

    #[error("match stage failed: {0}")]
    Catalog(#[from] CatalogError),

    #[error("persist stage failed: {0}")]
    Persist(#[from] PersistError),
}

impl PipelineError {
    pub fn stage(&self) -> Stage {
        match self {
            PipelineError::Load(_) => Stage::Load,
            PipelineError::Catalog(_) => Stage::Match,
            PipelineError::Persist(_) => Stage::Persist,
        }
    }
}

/// Load stage on its own, so the binary can stop before touching the catalog.
pub fn load_registry(loader: &RegistryLoader, path: &Path) -> Result<LoadedRegistry, PipelineError> {
    Ok(loader.load(path)?)
}

// ============================================================================
// OUTCOMES
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct EntityOutcome {
    pub entity_name: String,
    pub track_count: usize,
    pub match_count: usize,
    pub match_rate: f64,

    /// Where the report went, if one was written
    pub report_path: Option<PathBuf>,
    pub used_fallback_location: bool,
}

impl EntityOutcome {
    fn from_report(report: &Report) -> Self {
        EntityOutcome {
            entity_name: report.entity_name.clone(),
            track_count: report.catalog.len(),
            match_count: report.match_count,
            match_rate: report.match_rate,
            report_path: None,
            used_fallback_location: false,
        }
    }

    pub fn has_matches(&self) -> bool {
        self.match_count > 0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub primary: EntityOutcome,

    /// Fallback entities that were analyzed, in order
    pub fallbacks: Vec<EntityOutcome>,

    /// Fallback entities skipped because their catalog was unavailable or empty
    pub skipped: Vec<String>,
}

impl RunSummary {
    pub fn entities_with_matches(&self) -> Vec<&EntityOutcome> {
        std::iter::once(&self.primary)
            .chain(self.fallbacks.iter())
            .filter(|o| o.has_matches())
            .collect()
    }
}

// ============================================================================
// ANALYZER
// ============================================================================

pub struct Analyzer<'a> {
    source: &'a dyn CatalogSource,
    registry: &'a LoadedRegistry,
    writer: &'a ReportWriter,
    generated_at: Option<DateTime<Utc>>,
}

impl<'a> Analyzer<'a> {
    pub fn new(
        source: &'a dyn CatalogSource,
        registry: &'a LoadedRegistry,
        writer: &'a ReportWriter,
    ) -> Self {
        Analyzer {
            source,
            registry,
            writer,
            generated_at: None,
        }
    }

    /// Pin the report timestamp
    pub fn with_generated_at(mut self, at: DateTime<Utc>) -> Self {
        self.generated_at = Some(at);
        self
    }

    /// Fetch, match and build the report for one entity. No I/O beyond the
    /// catalog source.
    pub fn analyze(&self, entity: &str) -> Result<Report, PipelineError> {
        let catalog = self.source.fetch(entity)?;
        info!(
            entity = %catalog.entity_name,
            tracks = catalog.len(),
            "analyzing catalog"
        );

        let matches = find_matches(&catalog.entries, &self.registry.index);
        info!(entity = %catalog.entity_name, matches = matches.len(), "matching done");

        let mut builder = ReportBuilder::new()
            .with_source(&catalog.source)
            .with_registry(self.registry.stats.clone());
        if let Some(at) = self.generated_at {
            builder = builder.with_generated_at(at);
        }

        Ok(builder.build(&catalog.entries, &matches, &catalog.entity_name))
    }

    /// Analyze and persist one entity.
    pub fn analyze_and_report(&self, entity: &str) -> Result<EntityOutcome, PipelineError> {
        let report = self.analyze(entity)?;
        self.persist(&report)
    }

    fn persist(&self, report: &Report) -> Result<EntityOutcome, PipelineError> {
        let saved = self.writer.persist(report)?;

        let mut outcome = EntityOutcome::from_report(report);
        outcome.report_path = Some(saved.path);
        outcome.used_fallback_location = saved.used_fallback;
        Ok(outcome)
    }

    /// Primary entity first; fallbacks only if the primary has no matches.
    ///
    /// The primary always gets a report, even with zero matches. A fallback
    /// gets one only when it matches. Catalog problems on a fallback skip
    /// that entity; any persist failure ends the run.
    pub fn run(&self, primary: &str, fallbacks: &[String]) -> Result<RunSummary, PipelineError> {
        let primary_outcome = self.analyze_and_report(primary)?;
        info!(
            entity = %primary_outcome.entity_name,
            matches = primary_outcome.match_count,
            rate = format!("{:.1}%", primary_outcome.match_rate),
            "primary entity analyzed"
        );

        let mut summary = RunSummary {
            primary: primary_outcome,
            fallbacks: Vec::new(),
            skipped: Vec::new(),
        };

        if summary.primary.has_matches() {
            return Ok(summary);
        }

        info!(
            candidates = fallbacks.len(),
            "no matches for primary entity; trying fallback entities"
        );

        for entity in fallbacks {
            let report = match self.analyze(entity) {
                Ok(report) => report,
                Err(e) => {
                    warn!(entity = %entity, error = %e, "skipping fallback entity");
                    summary.skipped.push(entity.clone());
                    continue;
                }
            };

            if report.catalog.is_empty() {
                warn!(entity = %entity, "skipping fallback entity with empty catalog");
                summary.skipped.push(entity.clone());
                continue;
            }

            let outcome = if report.has_matches() {
                info!(entity = %report.entity_name, matches = report.match_count, "found matches");
                self.persist(&report)?
            } else {
                EntityOutcome::from_report(&report)
            };
            summary.fallbacks.push(outcome);
        }

        Ok(summary)
    }
}

// ============================================================================
// TESTS
// ============================================================================
