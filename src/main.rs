use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tracing::error;

use ai_text_detector_lib::services::config_store::ConfigStore;

#[derive(Parser, Debug)]
#[command(
    name = "ai-text-detector",
    version,
    about = "Provenance classification API for news-style text"
)]
struct Cli {
    /// Config file (defaults to DETECTOR_CONFIG, then the platform config dir)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Overrides model.modelDir from the config file
    #[arg(long)]
    model_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        error!(error = %err, "server failed");
        for cause in err.chain().skip(1) {
            error!(cause = %cause, "caused by");
        }
        eprintln!("Error: {:#}", err);
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let store = ConfigStore::resolve(cli.config.as_deref());
    let mut config = store
        .load()
        .with_context(|| format!("failed to load {}", store.config_file().display()))?;
    config.apply_env_overrides();
    if let Some(dir) = cli.model_dir {
        config.model.model_dir = dir;
    }
    config.validate_for_inference().context("invalid configuration")?;

    ai_text_detector_lib::init_logging(&config.logging);
    tracing::info!(config = %store.config_file().display(), "Configuration loaded");

    ai_text_detector_lib::serve(config).await
}
