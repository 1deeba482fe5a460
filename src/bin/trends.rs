// Trend pipeline: classify dated corpora into year-by-label statistics,
// or re-aggregate stored predictions without the model

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use ai_text_detector_lib::error::TrendError;
use ai_text_detector_lib::services::config_store::{AppConfig, ConfigStore};
use ai_text_detector_lib::services::trends::corpus::CorpusColumns;
use ai_text_detector_lib::services::trends::{
    classify_sharded, load_corpus, report, tally_labels, FailurePolicy, TrendOptions,
};

#[derive(Parser, Debug)]
#[command(name = "trends", version, about = "Year-over-year provenance trends")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Classify a corpus and write the trend table
    Run(RunArgs),
    /// Rebuild the trend table from stored per-record predictions
    Aggregate(AggregateArgs),
}

#[derive(Args, Debug, Clone)]
struct RunArgs {
    /// CSV/JSON files or directories containing them
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    #[arg(long)]
    date_column: Option<String>,

    #[arg(long)]
    text_column: Option<String>,

    #[arg(long, default_value = "data/trends_by_year.csv")]
    output: PathBuf,

    /// Per-record predictions (year, predicted_label, confidence)
    #[arg(long)]
    predictions_out: Option<PathBuf>,

    #[arg(long)]
    on_error: Option<FailurePolicy>,

    #[arg(long)]
    batch_size: Option<usize>,

    #[arg(long, default_value_t = 1)]
    workers: usize,

    #[arg(long)]
    model_dir: Option<PathBuf>,

    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
struct AggregateArgs {
    /// CSV with `year` and `label` (or `predicted_label`) columns
    #[arg(long)]
    predictions: PathBuf,

    #[arg(long, default_value = "data/trends_by_year.csv")]
    output: PathBuf,

    #[arg(long)]
    config: Option<PathBuf>,
}

fn main() {
    ai_text_detector_lib::init_console_logging(
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    );

    if let Err(err) = run() {
        error!(error = %err, "command failed");
        for cause in err.chain().skip(1) {
            error!(cause = %cause, "caused by");
        }
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    match Cli::parse().command {
        Commands::Run(args) => run_pipeline(args),
        Commands::Aggregate(args) => run_aggregate(args),
    }
}

fn load_config(path: Option<&std::path::Path>) -> Result<AppConfig> {
    let mut config = ConfigStore::resolve(path).load()?;
    config.apply_env_overrides();
    Ok(config)
}

fn run_pipeline(args: RunArgs) -> Result<()> {
    let mut config = load_config(args.config.as_deref())?;
    if let Some(dir) = args.model_dir {
        config.model.model_dir = dir;
    }
    if let Some(policy) = args.on_error {
        config.trends.failure_policy = policy;
    }
    if let Some(batch_size) = args.batch_size {
        config.trends.batch_size = batch_size;
    }
    config.validate_for_inference()?;

    let date_column = args.date_column.unwrap_or_else(|| config.trends.date_column.clone());
    let text_column = args.text_column.unwrap_or_else(|| config.trends.text_column.clone());
    let columns = CorpusColumns {
        date: &date_column,
        text: &text_column,
    };
    let corpus = load_corpus(&args.inputs, &columns, &config.cleaner)?;
    info!(
        records = corpus.records.len(),
        files = corpus.files_loaded.len(),
        missing = corpus.files_missing.len(),
        bad_dates = corpus.bad_dates,
        "Corpus loaded"
    );

    let predictor = ai_text_detector_lib::load_predictor(&config)?;
    let options = TrendOptions::from(&config.trends);

    let run = match classify_sharded(&corpus.records, predictor.as_ref(), &options, args.workers) {
        Ok(run) => run,
        Err(TrendError::Aborted {
            processed,
            partial,
            source,
        }) => {
            // Keep what was classified so a rerun can be compared against it.
            let partial_path = args.output.with_extension("partial.csv");
            report::write_trends_file(&partial_path, &partial.to_aggregates())?;
            warn!(processed, path = %partial_path.display(), "Partial trend table written");
            return Err(anyhow::Error::new(source).context("trend run aborted"));
        }
        Err(e) => return Err(e.into()),
    };

    let rows = run.aggregates();
    report::write_trends_file(&args.output, &rows)
        .with_context(|| format!("failed to write {}", args.output.display()))?;
    if let Some(path) = &args.predictions_out {
        report::write_predictions_file(path, &run.predictions)?;
    }

    info!(
        years = rows.len(),
        classified = run.predictions.len(),
        out_of_window = run.skipped_out_of_window,
        failed = run.failed,
        output = %args.output.display(),
        "Trend run complete"
    );
    Ok(())
}

fn run_aggregate(args: AggregateArgs) -> Result<()> {
    let config = load_config(args.config.as_deref())?;
    let options = TrendOptions::from(&config.trends);

    let rows = report::read_label_rows_file(&args.predictions)
        .with_context(|| format!("failed to read {}", args.predictions.display()))?;
    let (tally, skipped) = tally_labels(rows, &options);
    let aggregates = tally.to_aggregates();
    report::write_trends_file(&args.output, &aggregates)?;

    info!(
        years = aggregates.len(),
        records = tally.total(),
        out_of_window = skipped,
        output = %args.output.display(),
        "Trend table rebuilt from stored predictions"
    );
    Ok(())
}
