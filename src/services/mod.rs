// AI Text Detector Core Services

pub mod config_store;
pub mod text_cleaner;
pub mod detection;
pub mod extraction;
pub mod session_log;
pub mod prediction;
pub mod trends;

pub use config_store::*;
pub use text_cleaner::clean_text;
pub use detection::{Explainer, LabelMap, OnnxPredictor, Predictor};
pub use extraction::TextExtractor;
pub use prediction::PredictionService;
pub use session_log::SessionLog;
