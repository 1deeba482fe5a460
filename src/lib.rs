pub mod api;
pub mod error;
pub mod models;
pub mod services;

use anyhow::Context;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};
use std::time::Instant;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use services::config_store::{AppConfig, LoggingConfig};
use services::detection::{OnnxPredictor, Predictor};
use services::prediction::PredictionService;

static PROCESS_START: OnceLock<Instant> = OnceLock::new();
static LOG_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

const LOG_PREFIX: &str = "detector_";

pub fn startup_elapsed_ms() -> u128 {
    PROCESS_START
        .get()
        .map(|t| t.elapsed().as_millis())
        .unwrap_or(0)
}

fn env_flag(name: &str) -> bool {
    matches!(std::env::var(name).as_deref(), Ok("1") | Ok("true") | Ok("TRUE"))
}

/// Initialize logging with a timestamped log file per server session
pub fn init_logging(config: &LoggingConfig) {
    PROCESS_START.get_or_init(Instant::now);
    let disable_file_log = env_flag("DETECTOR_DISABLE_FILE_LOG");
    let disable_cleanup = env_flag("DETECTOR_DISABLE_LOG_CLEANUP");

    // Configure subscriber filter as early as possible (so fallback logging is consistent).
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    if disable_file_log {
        init_console_logging(env_filter);
        info!("File logging disabled via DETECTOR_DISABLE_FILE_LOG");
        return;
    }

    let logs_dir = match std::env::var("DETECTOR_LOG_DIR") {
        Ok(p) if !p.trim().is_empty() => PathBuf::from(p),
        _ => config.log_dir.clone().unwrap_or_else(default_logs_dir),
    };

    if let Err(e) = fs::create_dir_all(&logs_dir) {
        eprintln!("Failed to create logs directory {}: {}", logs_dir.display(), e);
        init_console_logging(env_filter);
        info!("Falling back to console-only logging (log dir not writable)");
        return;
    }

    let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
    let log_filename = format!("{}{}.log", LOG_PREFIX, timestamp);

    // Dedicated file per session; writes stay off the request path.
    let file_appender = rolling::never(&logs_dir, &log_filename);
    let (file_writer, file_guard) = tracing_appender::non_blocking(file_appender);
    let _ = LOG_GUARD.set(file_guard);

    let file_layer = fmt::layer()
        .with_writer(file_writer)
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true);

    let console_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(cfg!(debug_assertions))
        .with_target(true);

    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(console_layer)
        .try_init();

    info!("=== AI Text Detector Started ===");
    info!("Log file: {}", logs_dir.join(&log_filename).display());
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    // Best-effort cleanup in the background (avoid adding startup I/O latency).
    if !disable_cleanup {
        std::thread::spawn(move || {
            cleanup_old_logs(&logs_dir, 30);
        });
    }
}

/// Console-only logging for the command-line tools.
pub fn init_console_logging(env_filter: EnvFilter) {
    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(cfg!(debug_assertions))
                .with_target(false),
        )
        .try_init();
}

fn default_logs_dir() -> PathBuf {
    if cfg!(debug_assertions) {
        return PathBuf::from("logs");
    }
    dirs::data_local_dir()
        .map(|d| d.join("ai-text-detector").join("logs"))
        .unwrap_or_else(|| PathBuf::from("logs"))
}

fn cleanup_old_logs(logs_dir: &Path, keep: usize) {
    let mut entries: Vec<_> = match fs::read_dir(logs_dir) {
        Ok(rd) => rd.filter_map(|e| e.ok()).collect(),
        Err(_) => return,
    };

    entries.retain(|e| {
        let name = e.file_name().to_string_lossy().to_string();
        name.starts_with(LOG_PREFIX) && name.ends_with(".log")
    });

    if entries.len() <= keep {
        return;
    }

    entries.sort_by_key(|e| {
        e.metadata()
            .and_then(|m| m.modified())
            .unwrap_or(std::time::SystemTime::UNIX_EPOCH)
    });

    let remove_count = entries.len().saturating_sub(keep);
    for entry in entries.into_iter().take(remove_count) {
        let _ = fs::remove_file(entry.path());
    }
}

/// Load the model once. Missing or malformed artifacts are fatal.
pub fn load_predictor(config: &AppConfig) -> anyhow::Result<Arc<dyn Predictor>> {
    let labels = config.label_map().context("invalid label mapping")?;
    let t0 = Instant::now();
    let predictor = OnnxPredictor::load(&config.model, labels)
        .with_context(|| format!("failed to load model from {}", config.model.model_dir.display()))?;
    info!(
        startup_ms = startup_elapsed_ms(),
        load_ms = t0.elapsed().as_millis(),
        predictor = %predictor.describe(),
        "model.loaded"
    );
    Ok(Arc::new(predictor))
}

/// Run the HTTP service until ctrl-c.
pub async fn serve(config: AppConfig) -> anyhow::Result<()> {
    let predictor = load_predictor(&config)?;
    let service = PredictionService::from_config(predictor, &config).context("failed to open session log")?;
    let state = api::AppState::new(Arc::new(service), &config.server);
    let app = api::create_router(state, config.server.max_upload_bytes);

    let address = config.server_address();
    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("failed to bind {}", address))?;
    info!(startup_ms = startup_elapsed_ms(), "Server listening on http://{}", address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("=== AI Text Detector Shutting Down ===");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cleanup_keeps_newest_logs() {
        let dir = tempfile::tempdir().unwrap();
        for i in 0..5 {
            fs::write(dir.path().join(format!("{}2024010{}_000000.log", LOG_PREFIX, i)), "x").unwrap();
            std::thread::sleep(std::time::Duration::from_millis(10));
        }
        fs::write(dir.path().join("other.log"), "x").unwrap();

        cleanup_old_logs(dir.path(), 2);

        let mut names: Vec<String> = fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().to_string())
            .collect();
        names.sort();
        assert_eq!(
            names,
            vec![
                "detector_20240103_000000.log".to_string(),
                "detector_20240104_000000.log".to_string(),
                "other.log".to_string(),
            ]
        );
    }

    #[test]
    fn test_missing_model_dir_fails_to_load() {
        let mut config = AppConfig::default();
        config.model.model_dir = PathBuf::from("/nonexistent/model");
        assert!(load_predictor(&config).is_err());
    }
}
