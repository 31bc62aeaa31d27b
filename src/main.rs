use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info};

use unclaimed_rights::logging::init_logging;
use unclaimed_rights::{
    load_registry, Analyzer, Config, EntityOutcome, JsonCatalogSource, PipelineError,
    RegistryLoader, ReportFormat, ReportWriter, RunSummary,
};

/// Match an artist catalog against the unclaimed musical works registry.
#[derive(Parser, Debug)]
#[command(name = "unclaimed-rights", version, about)]
struct Args {
    /// TOML config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Unclaimed works registry (TSV)
    #[arg(short, long)]
    registry: Option<PathBuf>,

    /// Catalog export (JSON)
    #[arg(long)]
    catalog: Option<PathBuf>,

    /// Primary entity to analyze
    #[arg(short, long)]
    entity: Option<String>,

    /// Fallback entity, tried when the primary has no matches (repeatable)
    #[arg(long = "fallback")]
    fallbacks: Vec<String>,

    /// Registry rows to read at most
    #[arg(long)]
    row_cap: Option<usize>,

    /// Directory reports are written to
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Report format: sqlite or json
    #[arg(short, long)]
    format: Option<ReportFormat>,

    /// Debug logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.verbose);

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            match e.downcast_ref::<PipelineError>() {
                Some(stage_err) => error!(stage = %stage_err.stage(), "{:#}", e),
                None => error!("{:#}", e),
            }
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> Result<()> {
    let config = apply_overrides(Config::load(args.config.as_deref())?, &args);

    println!("🎵 Unclaimed Rights Analysis");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    // 1. Registry
    println!("\n📂 Loading unclaimed works registry...");
    let loader = RegistryLoader::with_row_cap(config.registry.row_cap);
    let registry = load_registry(&loader, &config.registry.path)?;
    println!("✓ {}", registry.stats.summary());

    // 2. Catalog source
    let source = JsonCatalogSource::from_file(&config.catalog.path)
        .map_err(PipelineError::from)
        .with_context(|| format!("Catalog export unavailable: {}", config.catalog.path.display()))?;

    // 3. Writer
    let mut writer = ReportWriter::new(config.report.format.sink(), config.report.output_dir.clone());
    if let Some(dir) = &config.report.fallback_dir {
        writer = writer.with_fallback(dir.clone());
    }

    // 4. Analyze
    println!("\n🔍 Matching catalog for {}...", config.catalog.primary_entity);
    let analyzer = Analyzer::new(&source, &registry, &writer);
    let summary = analyzer.run(&config.catalog.primary_entity, config.fallback_entities())?;

    print_summary(&summary);
    info!(
        entities_with_matches = summary.entities_with_matches().len(),
        "analysis complete"
    );

    Ok(())
}

fn apply_overrides(mut config: Config, args: &Args) -> Config {
    if let Some(path) = &args.registry {
        config.registry.path = path.clone();
    }
    if let Some(cap) = args.row_cap {
        config.registry.row_cap = cap;
    }
    if let Some(path) = &args.catalog {
        config.catalog.path = path.clone();
    }
    if let Some(entity) = &args.entity {
        config.catalog.primary_entity = entity.clone();
    }
    if !args.fallbacks.is_empty() {
        config.catalog.fallback_entities = args.fallbacks.clone();
        config.catalog.max_fallback_attempts = args.fallbacks.len();
    }
    if let Some(dir) = &args.output_dir {
        config.report.output_dir = dir.clone();
    }
    if let Some(format) = args.format {
        config.report.format = format;
    }
    config
}

fn print_summary(summary: &RunSummary) {
    println!("\n━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    print_outcome(&summary.primary);
    for outcome in &summary.fallbacks {
        print_outcome(outcome);
    }
    for entity in &summary.skipped {
        println!("⚠️  {}: skipped (no catalog)", entity);
    }

    if summary.entities_with_matches().is_empty() {
        println!("\nℹ️  No catalog tracks found in the unclaimed works registry");
    }
}

fn print_outcome(outcome: &EntityOutcome) {
    let marker = if outcome.has_matches() { "✅" } else { "•" };
    println!(
        "{} {}: {} matches across {} tracks ({:.1}%)",
        marker,
        outcome.entity_name,
        outcome.match_count,
        outcome.track_count,
        outcome.match_rate
    );
    if let Some(path) = &outcome.report_path {
        let note = if outcome.used_fallback_location {
            " (fallback location)"
        } else {
            ""
        };
        println!("   📄 {}{}", path.display(), note);
    }
}
