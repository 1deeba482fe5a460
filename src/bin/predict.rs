// Command-line inference: classify one text and print the label distribution as JSON

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::error;
use tracing_subscriber::EnvFilter;

use ai_text_detector_lib::models::CliPrediction;
use ai_text_detector_lib::services::config_store::ConfigStore;
use ai_text_detector_lib::services::text_cleaner::clean_text;

#[derive(Parser, Debug)]
#[command(name = "predict", version, about = "Classify a single text")]
struct Cli {
    /// Directory holding model.onnx and tokenizer.json
    #[arg(long)]
    model_dir: Option<PathBuf>,

    /// Text to classify
    #[arg(long)]
    text: String,

    /// Also write the result to this JSON file
    #[arg(long)]
    output_json: Option<PathBuf>,

    #[arg(long)]
    config: Option<PathBuf>,
}

fn main() {
    ai_text_detector_lib::init_console_logging(
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
    );

    if let Err(err) = run() {
        error!(error = %err, "prediction failed");
        for cause in err.chain().skip(1) {
            error!(cause = %cause, "caused by");
        }
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    let mut config = ConfigStore::resolve(cli.config.as_deref()).load()?;
    config.apply_env_overrides();
    if let Some(dir) = cli.model_dir {
        config.model.model_dir = dir;
    }
    config.validate_for_inference()?;

    let predictor = ai_text_detector_lib::load_predictor(&config)?;
    let cleaned = clean_text(&cli.text, &config.cleaner);
    let prediction = predictor.predict(&cleaned).context("inference failed")?;

    let output = CliPrediction {
        input_text: cli.text,
        predicted_label: prediction.label,
        class_probabilities: prediction.distribution,
    };
    let json = serde_json::to_string_pretty(&output)?;
    println!("{}", json);

    if let Some(path) = cli.output_json {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).with_context(|| format!("failed to create {}", parent.display()))?;
        }
        fs::write(&path, &json).with_context(|| format!("failed to write {}", path.display()))?;
        tracing::info!(path = %path.display(), "Prediction saved");
    }
    Ok(())
}
