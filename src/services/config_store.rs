// Configuration Storage Service
// Handles config file loading, environment overrides and validation

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::ConfigError;
use crate::services::detection::LabelMap;
use crate::services::trends::FailurePolicy;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppConfig {
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub cleaner: CleanerConfig,
    #[serde(default)]
    pub explainer: ExplainerConfig,
    #[serde(default)]
    pub extraction: ExtractionConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub trends: TrendConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            version: default_version(),
            server: ServerConfig::default(),
            model: ModelConfig::default(),
            cleaner: CleanerConfig::default(),
            explainer: ExplainerConfig::default(),
            extraction: ExtractionConfig::default(),
            logging: LoggingConfig::default(),
            trends: TrendConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Upper bound on extraction + OCR + inference + explanation per request.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_max_upload")]
    pub max_upload_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            request_timeout_secs: default_request_timeout(),
            max_upload_bytes: default_max_upload(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelConfig {
    #[serde(default = "default_model_dir")]
    pub model_dir: PathBuf,
    #[serde(default = "default_model_file")]
    pub model_file: String,
    #[serde(default = "default_tokenizer_file")]
    pub tokenizer_file: String,
    #[serde(default = "default_max_length")]
    pub max_length: usize,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_intra_threads")]
    pub intra_threads: usize,
    /// Label name -> model output index.
    #[serde(default = "default_label_mapping")]
    pub label_mapping: BTreeMap<String, usize>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            model_dir: default_model_dir(),
            model_file: default_model_file(),
            tokenizer_file: default_tokenizer_file(),
            max_length: default_max_length(),
            batch_size: default_batch_size(),
            intra_threads: default_intra_threads(),
            label_mapping: default_label_mapping(),
        }
    }
}

impl ModelConfig {
    pub fn model_path(&self) -> PathBuf {
        self.model_dir.join(&self.model_file)
    }

    pub fn tokenizer_path(&self) -> PathBuf {
        self.model_dir.join(&self.tokenizer_file)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CleanerConfig {
    #[serde(default = "default_true")]
    pub lowercase: bool,
    #[serde(default = "default_true")]
    pub strip_html: bool,
    #[serde(default = "default_true")]
    pub strip_urls: bool,
    #[serde(default = "default_true")]
    pub normalize_punctuation: bool,
}

impl Default for CleanerConfig {
    fn default() -> Self {
        Self {
            lowercase: true,
            strip_html: true,
            strip_urls: true,
            normalize_punctuation: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExplainerConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_num_features")]
    pub num_features: usize,
    #[serde(default = "default_num_samples")]
    pub num_samples: usize,
    #[serde(default = "default_kernel_width")]
    pub kernel_width: f64,
    #[serde(default = "default_ridge_alpha")]
    pub ridge_alpha: f64,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Words considered for features; text past them is beyond the model's token window.
    #[serde(default = "default_max_length")]
    pub window_words: usize,
    /// Fixed seed for reproducible explanations; random when unset.
    #[serde(default)]
    pub seed: Option<u64>,
}

impl Default for ExplainerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            num_features: default_num_features(),
            num_samples: default_num_samples(),
            kernel_width: default_kernel_width(),
            ridge_alpha: default_ridge_alpha(),
            batch_size: default_batch_size(),
            window_words: default_max_length(),
            seed: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionConfig {
    #[serde(default = "default_true")]
    pub ocr_enabled: bool,
    #[serde(default = "default_ocr_lang")]
    pub ocr_lang: String,
    #[serde(default = "default_ocr_dpi")]
    pub ocr_dpi: u32,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            ocr_enabled: true,
            ocr_lang: default_ocr_lang(),
            ocr_dpi: default_ocr_dpi(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct LoggingConfig {
    /// Directory for per-session tracing logs; platform data dir when unset.
    #[serde(default)]
    pub log_dir: Option<PathBuf>,
    /// Append-only JSON-lines record of single-text predictions.
    #[serde(default)]
    pub session_log_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendConfig {
    #[serde(default = "default_window_start")]
    pub window_start: i32,
    #[serde(default = "default_window_end")]
    pub window_end: i32,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default)]
    pub failure_policy: FailurePolicy,
    #[serde(default = "default_date_column")]
    pub date_column: String,
    #[serde(default = "default_text_column")]
    pub text_column: String,
}

impl Default for TrendConfig {
    fn default() -> Self {
        Self {
            window_start: default_window_start(),
            window_end: default_window_end(),
            batch_size: default_batch_size(),
            failure_policy: FailurePolicy::default(),
            date_column: default_date_column(),
            text_column: default_text_column(),
        }
    }
}

fn default_version() -> String { env!("CARGO_PKG_VERSION").to_string() }
fn default_host() -> String { "127.0.0.1".to_string() }
fn default_port() -> u16 { 8000 }
fn default_request_timeout() -> u64 { 60 }
fn default_max_upload() -> usize { 20 * 1024 * 1024 }
fn default_model_dir() -> PathBuf { PathBuf::from("diagrams/final_model") }
fn default_model_file() -> String { "model.onnx".to_string() }
fn default_tokenizer_file() -> String { "tokenizer.json".to_string() }
fn default_max_length() -> usize { 512 }
fn default_batch_size() -> usize { 16 }
fn default_intra_threads() -> usize { 1 }
fn default_true() -> bool { true }
fn default_num_features() -> usize { 6 }
fn default_num_samples() -> usize { 500 }
fn default_kernel_width() -> f64 { 25.0 }
fn default_ridge_alpha() -> f64 { 1.0 }
fn default_ocr_lang() -> String { "eng".to_string() }
fn default_ocr_dpi() -> u32 { 300 }
fn default_window_start() -> i32 { 2015 }
fn default_window_end() -> i32 { 2025 }
fn default_date_column() -> String { "date".to_string() }
fn default_text_column() -> String { "article_text".to_string() }

fn default_label_mapping() -> BTreeMap<String, usize> {
    BTreeMap::from([
        ("human".to_string(), 0),
        ("ai_paraphrased".to_string(), 1),
        ("ai_generated".to_string(), 2),
    ])
}

impl AppConfig {
    /// Environment variables win over the config file.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(host) = std::env::var("DETECTOR_HOST") {
            if !host.trim().is_empty() {
                self.server.host = host;
            }
        }
        if let Ok(port) = std::env::var("DETECTOR_PORT") {
            if let Ok(port) = port.parse::<u16>() {
                self.server.port = port;
            }
        }
        if let Ok(dir) = std::env::var("DETECTOR_MODEL_DIR") {
            if !dir.trim().is_empty() {
                self.model.model_dir = PathBuf::from(dir);
            }
        }
    }

    pub fn label_map(&self) -> Result<LabelMap, ConfigError> {
        LabelMap::from_mapping(&self.model.label_mapping)
    }

    pub fn server_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.label_map()?;

        if self.server.host.trim().is_empty() {
            return Err(ConfigError::Invalid("server.host cannot be empty".to_string()));
        }
        if self.server.request_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "server.requestTimeoutSecs must be greater than zero".to_string(),
            ));
        }
        if self.model.max_length == 0 {
            return Err(ConfigError::Invalid("model.maxLength must be greater than zero".to_string()));
        }
        if self.model.batch_size == 0 || self.explainer.batch_size == 0 || self.trends.batch_size == 0 {
            return Err(ConfigError::Invalid("batch sizes must be greater than zero".to_string()));
        }
        if self.explainer.window_words == 0 {
            return Err(ConfigError::Invalid(
                "explainer.windowWords must be greater than zero".to_string(),
            ));
        }
        if self.explainer.num_samples < 2 {
            return Err(ConfigError::Invalid(
                "explainer.numSamples must be at least 2".to_string(),
            ));
        }
        if self.explainer.kernel_width <= 0.0 || self.explainer.ridge_alpha <= 0.0 {
            return Err(ConfigError::Invalid(
                "explainer.kernelWidth and explainer.ridgeAlpha must be positive".to_string(),
            ));
        }
        if self.trends.window_start > self.trends.window_end {
            return Err(ConfigError::Invalid(format!(
                "trends window {}..{} is empty",
                self.trends.window_start, self.trends.window_end
            )));
        }
        Ok(())
    }

    /// [`AppConfig::validate`] plus the checks that only matter when a model will be loaded.
    pub fn validate_for_inference(&self) -> Result<(), ConfigError> {
        self.validate()?;
        if !self.model.model_dir.is_dir() {
            return Err(ConfigError::Invalid(format!(
                "model directory {} does not exist",
                self.model.model_dir.display()
            )));
        }
        Ok(())
    }
}

pub struct ConfigStore {
    config_file: PathBuf,
}

impl ConfigStore {
    pub fn new(config_dir: PathBuf) -> Self {
        Self {
            config_file: config_dir.join("config.json"),
        }
    }

    /// Store rooted at an explicit config file path.
    pub fn from_file(config_file: &Path) -> Self {
        Self {
            config_file: config_file.to_path_buf(),
        }
    }

    /// `--config` path, then `DETECTOR_CONFIG`, then the platform config dir.
    pub fn resolve(explicit: Option<&Path>) -> Self {
        if let Some(path) = explicit {
            return Self::from_file(path);
        }
        match std::env::var("DETECTOR_CONFIG") {
            Ok(p) if !p.trim().is_empty() => Self::from_file(Path::new(&p)),
            _ => Self::new(Self::default_config_dir().unwrap_or_else(|| PathBuf::from("."))),
        }
    }

    /// Get default config directory
    pub fn default_config_dir() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("ai-text-detector"))
    }

    pub fn config_file(&self) -> &Path {
        &self.config_file
    }

    /// Load configuration from file, falling back to defaults when absent.
    pub fn load(&self) -> Result<AppConfig, ConfigError> {
        if !self.config_file.exists() {
            return Ok(AppConfig::default());
        }

        let content = fs::read_to_string(&self.config_file).map_err(|e| ConfigError::Read {
            path: self.config_file.clone(),
            source: e,
        })?;

        Ok(serde_json::from_str(&content)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.model.max_length, 512);
        assert_eq!(config.explainer.num_features, 6);
        assert_eq!(config.trends.window_start, 2015);
        assert_eq!(config.trends.window_end, 2025);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_config_fills_defaults() {
        let json = r#"{ "model": { "modelDir": "/models/roberta", "maxLength": 256 } }"#;
        let config: AppConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.model.model_dir, PathBuf::from("/models/roberta"));
        assert_eq!(config.model.max_length, 256);
        assert_eq!(config.model.label_mapping.len(), 3);
        assert_eq!(config.server.port, 8000);
    }

    #[test]
    fn test_validate_rejects_bad_label_mapping() {
        let mut config = AppConfig::default();
        config.model.label_mapping.insert("ai_generated".to_string(), 1);
        assert!(matches!(config.validate(), Err(ConfigError::LabelMapping(_))));
    }

    #[test]
    fn test_validate_rejects_empty_window() {
        let mut config = AppConfig::default();
        config.trends.window_start = 2026;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_inference_validation_requires_model_dir() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = AppConfig::default();
        config.model.model_dir = dir.path().join("absent");
        assert!(config.validate().is_ok());
        assert!(matches!(config.validate_for_inference(), Err(ConfigError::Invalid(_))));

        config.model.model_dir = dir.path().to_path_buf();
        assert!(config.validate_for_inference().is_ok());
    }

    #[test]
    fn test_reads_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{ "server": { "port": 9200 }, "explainer": { "windowWords": 128 } }"#).unwrap();
        let config = ConfigStore::from_file(&path).load().unwrap();
        assert_eq!(config.server.port, 9200);
        assert_eq!(config.explainer.window_words, 128);
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::from_file(&dir.path().join("absent.json"));
        let config = store.load().unwrap();
        assert_eq!(config.model.model_file, "model.onnx");
    }
}
