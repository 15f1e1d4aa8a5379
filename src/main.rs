mod types;
mod config;
mod data;
mod engine;
mod error;
mod ml;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use crate::config::{OutputFormat, RunConfig};
use engine::{CrossValidator, FoldReport, RunReport};
use ml::{CancelToken, Trainer, TrainerKind};

#[derive(Parser)]
#[command(name = "kfold-eval")]
#[command(version = "0.1.0")]
#[command(about = "K-fold cross-validation of binary classifiers on LIBSVM data", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(short, long, default_value = "kfold.toml")]
    config: String,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long)]
    log_json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run k-fold cross-validation and print one report per fold
    Run(RunArgs),
    /// Summarise a dataset (size, feature width, class balance)
    Inspect {
        /// LIBSVM dataset path
        #[arg(short, long)]
        source: Option<PathBuf>,
        /// Dense feature width (defaults to the largest index in the file)
        #[arg(long)]
        num_features: Option<usize>,
    },
    /// Print the effective configuration as TOML
    ShowConfig,
}

#[derive(Args, Debug, Default)]
struct RunArgs {
    /// LIBSVM dataset path
    #[arg(short, long)]
    source: Option<PathBuf>,
    /// Number of folds (k)
    #[arg(short = 'k', long)]
    folds: Option<usize>,
    /// Seed for fold assignment
    #[arg(long)]
    seed: Option<u64>,
    /// Layer widths, e.g. 8,28,25,2
    #[arg(long, value_delimiter = ',')]
    topology: Option<Vec<usize>>,
    /// Maximum training iterations per fold
    #[arg(long)]
    max_iter: Option<usize>,
    /// Mini-batch size
    #[arg(long)]
    batch_size: Option<usize>,
    /// Weight-initialisation seed for the trainer
    #[arg(long)]
    trainer_seed: Option<u64>,
    /// Learning rate for gradient-based trainers
    #[arg(long)]
    learning_rate: Option<f64>,
    /// Classifier to evaluate
    #[arg(short, long, value_enum)]
    trainer: Option<TrainerKind>,
    /// Folds evaluated concurrently (1 = sequential)
    #[arg(short, long)]
    workers: Option<usize>,
    /// Report format
    #[arg(short, long, value_enum)]
    format: Option<OutputFormat>,
    /// Abort a fold whose training exceeds this many seconds
    #[arg(long)]
    time_limit: Option<u64>,
    /// Dense feature width (defaults to the largest index in the file)
    #[arg(long)]
    num_features: Option<usize>,
}

impl RunArgs {
    fn apply(self, config: &mut RunConfig) {
        if let Some(source) = self.source {
            config.source = Some(source);
        }
        if let Some(folds) = self.folds {
            config.folds = folds;
        }
        if let Some(seed) = self.seed {
            config.seed = seed;
        }
        if let Some(workers) = self.workers {
            config.workers = workers;
        }
        if let Some(format) = self.format {
            config.format = format;
        }
        if let Some(n) = self.num_features {
            config.num_features = Some(n);
        }

        let trainer = &mut config.trainer;
        if let Some(kind) = self.trainer {
            trainer.kind = kind;
        }
        if let Some(layers) = self.topology {
            trainer.layers = layers;
        }
        if let Some(max_iter) = self.max_iter {
            trainer.max_iter = max_iter;
        }
        if let Some(batch_size) = self.batch_size {
            trainer.batch_size = batch_size;
        }
        if let Some(seed) = self.trainer_seed {
            trainer.seed = seed;
        }
        if let Some(lr) = self.learning_rate {
            trainer.learning_rate = lr;
        }
        if let Some(secs) = self.time_limit {
            trainer.time_limit_secs = Some(secs);
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose, cli.log_json)?;

    let mut run_config = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Run(args) => {
            args.apply(&mut run_config);
            run_cross_validation(run_config).await?;
        }
        Commands::Inspect { source, num_features } => {
            let source = source
                .or(run_config.source)
                .ok_or_else(|| anyhow!("a dataset path is required (--source)"))?;
            inspect_dataset(&source, num_features.or(run_config.num_features))?;
        }
        Commands::ShowConfig => {
            println!("{}", config::to_toml(&run_config)?);
        }
    }

    Ok(())
}

/// Logs go to stderr so stdout carries only fold reports
fn init_logging(verbose: bool, json: bool) -> Result<()> {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);

    let result = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    result.map_err(|e| anyhow!("failed to initialise logging: {}", e))
}

async fn run_cross_validation(run_config: RunConfig) -> Result<()> {
    if let Err(errors) = run_config.validate() {
        return Err(anyhow!("Invalid configuration: {}", errors.join(", ")));
    }
    let source = run_config
        .source
        .clone()
        .ok_or_else(|| anyhow!("a dataset path is required (--source)"))?;

    let run_id = Uuid::new_v4();
    let started_at = Utc::now();
    let settings = &run_config.trainer;

    info!("═══════════════════════════════════════════════════");
    info!("K-Fold Cross-Validation ({})", run_id);
    info!("═══════════════════════════════════════════════════");
    info!("Source: {}", source.display());
    info!("Folds: {} (seed {})", run_config.folds, run_config.seed);
    info!("Trainer: {}", settings.kind);
    if settings.kind == TrainerKind::Mlp {
        info!("Topology: {:?}", settings.layers);
    }
    info!(
        "Max iterations: {}, batch size: {}, trainer seed: {}",
        settings.max_iter, settings.batch_size, settings.seed
    );

    let dataset = data::load_libsvm(&source, run_config.num_features)
        .with_context(|| format!("failed to load dataset {}", source.display()))?;
    let counts = dataset.class_counts();
    info!(
        "Dataset: {} samples, {} features ({} class 0, {} class 1)",
        dataset.len(),
        dataset.n_features(),
        counts.zeros,
        counts.ones
    );
    if counts.other > 0 {
        warn!("{} samples carry labels outside {{0, 1}}", counts.other);
    }

    let cancel = CancelToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupt received, cancelling training");
                cancel.cancel();
            }
        });
    }

    let trainer_config = settings.to_trainer_config(cancel);
    let trainer: Arc<dyn Trainer> = Arc::from(settings.kind.build());
    let validator = CrossValidator::new(run_config.folds, run_config.seed);
    let format = run_config.format;
    let print = move |report: &FoldReport| {
        if format == OutputFormat::Text {
            report.print_summary();
        }
    };

    let outcome = if run_config.workers > 1 {
        validator
            .run_parallel(&dataset, Arc::clone(&trainer), trainer_config, run_config.workers, print)
            .await
    } else {
        let trainer = Arc::clone(&trainer);
        let dataset = dataset.clone();
        tokio::task::spawn_blocking(move || {
            validator.run_with(&dataset, trainer.as_ref(), &trainer_config, print)
        })
        .await?
    };
    let reports = outcome.with_context(|| format!("cross-validation of {} aborted", source.display()))?;

    match format {
        OutputFormat::Text => {
            info!("✓ {} folds completed in {}s", reports.len(), (Utc::now() - started_at).num_seconds());
        }
        OutputFormat::Json => {
            let run = RunReport::new(
                run_id,
                started_at,
                source.display().to_string(),
                trainer.name().to_string(),
                run_config.seed,
            )
            .finish(reports);
            println!("{}", run.to_json()?);
        }
    }

    Ok(())
}

fn inspect_dataset(source: &Path, num_features: Option<usize>) -> Result<()> {
    let dataset = data::load_libsvm(source, num_features)
        .with_context(|| format!("failed to load dataset {}", source.display()))?;
    let counts = dataset.class_counts();
    let total = dataset.len() as f64;

    println!("Source:    {}", source.display());
    println!("Samples:   {}", dataset.len());
    println!("Features:  {}", dataset.n_features());
    println!("Class 0:   {} ({:.1}%)", counts.zeros, counts.zeros as f64 / total * 100.0);
    println!("Class 1:   {} ({:.1}%)", counts.ones, counts.ones as f64 / total * 100.0);
    if counts.other > 0 {
        println!("Other:     {} (not usable for binary evaluation)", counts.other);
    }
    println!("Input layer width for --topology: {}", dataset.n_features());

    Ok(())
}
