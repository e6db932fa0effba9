use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use riftbound_porter::color::PowerIconSampler;
use riftbound_porter::config::Config;
use riftbound_porter::logging::init_logging;
use riftbound_porter::pipeline::ingestion::{
    collect_sources, CardExtractor, JsonFileExtractor, Overrides, VisionExtractor,
};
use riftbound_porter::pipeline::processing::enrich::{CardLibrary, ReferenceLibrary};
use riftbound_porter::pipeline::processing::quality_gate::{CardValidator, ValidationDecision};
use riftbound_porter::pipeline::storage::{CardStore, InMemoryStore, JsonFileStore, NameRegistry};
use riftbound_porter::pipeline::{BatchRunner, BatchSummary, Reconciler};

#[derive(Parser)]
#[command(name = "riftbound_porter")]
#[command(about = "Turn extracted Riftbound card data into canonical card JSON")]
#[command(version)]
struct Cli {
    /// Debug-level logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Read card images with the vision model, then normalize
    Extract {
        #[command(flatten)]
        run: RunArgs,
        /// Model name (overrides config)
        #[arg(long)]
        model: Option<String>,
        #[arg(long)]
        temperature: Option<f64>,
        #[arg(long)]
        top_p: Option<f64>,
        #[arg(long)]
        seed: Option<i64>,
    },
    /// Normalize raw extractor output saved as JSON files
    Normalize {
        #[command(flatten)]
        run: RunArgs,
    },
    /// Validate an already canonical card file
    Check {
        file: PathBuf,
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

#[derive(Args, Debug, Clone)]
struct RunArgs {
    /// A file, or a directory of files
    path: PathBuf,
    /// Output directory (default from config, then `output`)
    #[arg(long)]
    out_dir: Option<PathBuf>,
    #[arg(long)]
    config: Option<PathBuf>,
    /// Reference card library (HTML export or JSON)
    #[arg(long)]
    library: Option<PathBuf>,
    /// JSON object of per-file field overrides
    #[arg(long)]
    overrides: Option<PathBuf>,
    /// Directory of card images to sample domain colors from
    #[arg(long)]
    images: Option<PathBuf>,
    #[arg(long)]
    workers: Option<usize>,
    /// Print each accepted card to stdout
    #[arg(long)]
    print: bool,
    /// Run everything but write nothing
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();
    let _guard = init_logging(cli.verbose);

    match cli.command {
        Commands::Extract {
            run,
            model,
            temperature,
            top_p,
            seed,
        } => {
            let mut config = load_config(run.config.as_deref())?;
            if let Some(model) = model {
                config.model.name = model;
            }
            if let Some(temperature) = temperature {
                config.model.temperature = temperature;
            }
            if top_p.is_some() {
                config.model.top_p = top_p;
            }
            if seed.is_some() {
                config.model.seed = seed;
            }

            let extractor = VisionExtractor::from_env(config.model.clone())
                .context("Failed to set up the vision model client")?;
            info!("Using model {}", extractor.model_name());
            run_batch(Arc::new(extractor), &run, config).await
        }
        Commands::Normalize { run } => {
            let config = load_config(run.config.as_deref())?;
            let extractor = JsonFileExtractor::new(run.images.clone());
            run_batch(Arc::new(extractor), &run, config).await
        }
        Commands::Check { file, config } => {
            let config = load_config(config.as_deref())?;
            check_card(&file, &config)
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    let config = Config::load(path).context("Failed to load configuration")?;
    debug!("Loaded configuration: {:?}", config);
    Ok(config)
}

async fn run_batch(extractor: Arc<dyn CardExtractor>, run: &RunArgs, config: Config) -> Result<()> {
    let sources = collect_sources(&run.path, |p| extractor.accepts(p))
        .with_context(|| format!("Failed to collect inputs from {}", run.path.display()))?;

    let mut reconciler = Reconciler::new(config.reconcile.clone())
        .context("Failed to load the card schema")?
        .with_sampler(Arc::new(PowerIconSampler));

    if let Some(path) = &run.library {
        let library = CardLibrary::load(path)
            .with_context(|| format!("Failed to load card library {}", path.display()))?;
        if library.is_empty() {
            warn!("Card library {} contains no cards", path.display());
        }
        reconciler = reconciler.with_library(Arc::new(library));
    }
    if let Some(path) = &run.overrides {
        let overrides = Overrides::load(path)
            .with_context(|| format!("Failed to load overrides {}", path.display()))?;
        reconciler = reconciler.with_overrides(overrides);
    }

    let registry = Arc::new(NameRegistry::new());
    let store: Arc<dyn CardStore> = if run.dry_run {
        eprintln!("🧪 Dry run: nothing will be written");
        Arc::new(InMemoryStore::with_registry(registry))
    } else {
        let out_dir = run
            .out_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from(&config.batch.output_dir));
        Arc::new(JsonFileStore::with_registry(out_dir, registry))
    };

    let workers = run.workers.unwrap_or(config.batch.workers);
    let runner = BatchRunner::new(extractor, Arc::new(reconciler), store, workers);
    let summary = runner.run(sources).await;

    if run.print {
        for written in &summary.written {
            println!("{}", written.card.to_json_pretty()?);
        }
    }
    report(&summary);

    if !summary.is_clean() {
        bail!("{} of {} record(s) failed", summary.failed.len(), summary.total());
    }
    Ok(())
}

fn report(summary: &BatchSummary) {
    eprintln!("\n📊 Results:");
    eprintln!("   Total records: {}", summary.total());
    eprintln!("   Written: {}", summary.written.len());
    eprintln!("   Failed: {}", summary.failed.len());

    for written in summary.written.iter().filter(|w| !w.warnings.is_empty()) {
        eprintln!("\n⚠️  {} ({})", written.card.name, written.source);
        for warning in &written.warnings {
            eprintln!("   - {}", warning);
        }
    }

    for failure in &summary.failed {
        eprintln!("\n❌ {} failed at {}: {}", failure.source, failure.stage, failure.error);
        for violation in &failure.violations {
            eprintln!("   - {}: {}", violation.field, violation.message);
        }
        if let Some(path) = &failure.partial {
            eprintln!("   partial output: {}", path.display());
        }
    }
}

fn check_card(file: &Path, config: &Config) -> Result<()> {
    let content = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let payload: serde_json::Value = serde_json::from_str(&content)
        .with_context(|| format!("{} is not valid JSON", file.display()))?;

    let validator = CardValidator::new(config.reconcile.max_domains)
        .context("Failed to load the card schema")?;
    let report = validator.validate(&payload);

    for warning in &report.warnings {
        warn!("{}", warning);
        println!("⚠️  {}", warning);
    }
    match report.decision {
        ValidationDecision::Reject => {
            for violation in &report.violations {
                error!("{}: {}", violation.field, violation.message);
                println!("❌ {}: {}", violation.field, violation.message);
            }
            bail!("{} is not a valid card", file.display());
        }
        ValidationDecision::Accept | ValidationDecision::AcceptWithWarnings => {
            println!("✅ {} is a valid card", file.display());
            Ok(())
        }
    }
}
