// ONNX Predictor
// Sequence-classification model exported to ONNX, run through onnxruntime

use ndarray::Array2;
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::Value;
use parking_lot::Mutex;
use std::time::Instant;

use crate::error::{InferenceError, ModelLoadError};
use crate::models::{ClassLabel, Prediction};
use crate::services::config_store::ModelConfig;
use crate::services::detection::labels::LabelMap;
use crate::services::detection::predictor::{prediction_from_logits, Predictor};
use crate::services::detection::tokenizer::{EncodedBatch, TextTokenizer};

pub struct OnnxPredictor {
    // onnxruntime needs exclusive access per run; requests queue here.
    session: Mutex<Session>,
    tokenizer: TextTokenizer,
    labels: LabelMap,
    batch_size: usize,
    uses_token_type_ids: bool,
    logits_output: String,
}

impl OnnxPredictor {
    /// Load model and tokenizer once. Any failure here must stop startup.
    pub fn load(config: &ModelConfig, labels: LabelMap) -> Result<Self, ModelLoadError> {
        let t0 = Instant::now();
        let model_path = config.model_path();
        if !model_path.exists() {
            return Err(ModelLoadError::MissingArtifact(model_path));
        }
        let tokenizer = TextTokenizer::from_file(&config.tokenizer_path(), config.max_length)?;

        tracing::info!(path = %model_path.display(), "Loading classification model");
        let session = Session::builder()
            .map_err(|e| ModelLoadError::Session(format!("builder: {}", e)))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| ModelLoadError::Session(format!("optimization level: {}", e)))?
            .with_intra_threads(config.intra_threads.max(1))
            .map_err(|e| ModelLoadError::Session(format!("thread count: {}", e)))?
            .commit_from_file(&model_path)
            .map_err(|e| ModelLoadError::Session(format!("{}: {}", model_path.display(), e)))?;

        let input_names: Vec<String> = session.inputs.iter().map(|i| i.name.clone()).collect();
        for required in ["input_ids", "attention_mask"] {
            if !input_names.iter().any(|n| n == required) {
                return Err(ModelLoadError::Session(format!(
                    "model has no '{}' input (inputs: {:?})",
                    required, input_names
                )));
            }
        }
        let uses_token_type_ids = input_names.iter().any(|n| n == "token_type_ids");

        let logits_output = session
            .outputs
            .iter()
            .find(|o| o.name == "logits")
            .or_else(|| session.outputs.first())
            .map(|o| o.name.clone())
            .ok_or_else(|| ModelLoadError::Session("model declares no outputs".to_string()))?;

        tracing::info!(
            elapsed_ms = t0.elapsed().as_millis(),
            inputs = ?input_names,
            logits_output = %logits_output,
            max_length = tokenizer.max_length(),
            "Model loaded"
        );

        Ok(Self {
            session: Mutex::new(session),
            tokenizer,
            labels,
            batch_size: config.batch_size.max(1),
            uses_token_type_ids,
            logits_output,
        })
    }

    fn tensor(data: Vec<i64>, batch: usize, seq_len: usize) -> Result<Value, InferenceError> {
        let array = Array2::from_shape_vec((batch, seq_len), data)
            .map_err(|e| InferenceError::Forward(format!("input shape: {}", e)))?;
        let value = Value::from_array(array)
            .map_err(|e| InferenceError::Forward(format!("input tensor: {}", e)))?;
        Ok(value.into_dyn())
    }

    /// One forward pass. Returns label-ordered logits per input.
    fn forward(&self, encoded: EncodedBatch) -> Result<Vec<[f64; 3]>, InferenceError> {
        let EncodedBatch {
            input_ids,
            attention_mask,
            token_type_ids,
            batch,
            seq_len,
        } = encoded;

        let mut inputs = ort::inputs![
            "input_ids" => Self::tensor(input_ids, batch, seq_len)?,
            "attention_mask" => Self::tensor(attention_mask, batch, seq_len)?
        ];
        if self.uses_token_type_ids {
            inputs.push((
                "token_type_ids".into(),
                Self::tensor(token_type_ids, batch, seq_len)?.into(),
            ));
        }

        let mut session = self.session.lock();
        let outputs = session
            .run(inputs)
            .map_err(|e| InferenceError::Forward(e.to_string()))?;
        let logits = outputs
            .get(self.logits_output.as_str())
            .ok_or_else(|| InferenceError::Forward(format!("missing output '{}'", self.logits_output)))?;
        let (shape, data) = logits
            .try_extract_tensor::<f32>()
            .map_err(|e| InferenceError::Forward(format!("logits: {}", e)))?;

        let width = shape.last().copied().unwrap_or(0).max(0) as usize;
        if width != ClassLabel::ALL.len() {
            return Err(InferenceError::OutputShape {
                expected: ClassLabel::ALL.len(),
                got: width,
            });
        }
        if data.len() != batch * width {
            return Err(InferenceError::Forward(format!(
                "logits tensor has {} values for a batch of {}",
                data.len(),
                batch
            )));
        }

        let rows: Vec<[f64; 3]> = data
            .chunks(width)
            .map(|row| {
                let by_index: Vec<f64> = row.iter().map(|&x| x as f64).collect();
                self.labels.to_label_order(&by_index)
            })
            .collect();
        Ok(rows)
    }
}

impl Predictor for OnnxPredictor {
    fn predict_batch(&self, texts: &[&str]) -> Result<Vec<Prediction>, InferenceError> {
        let mut predictions = Vec::with_capacity(texts.len());
        for chunk in texts.chunks(self.batch_size) {
            let encoded = self.tokenizer.encode_batch(chunk)?;
            for logits in self.forward(encoded)? {
                predictions.push(prediction_from_logits(logits)?);
            }
        }
        Ok(predictions)
    }

    fn describe(&self) -> String {
        format!("onnx(max_length={}, batch_size={})", self.tokenizer.max_length(), self.batch_size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_missing_model_is_load_error() {
        let dir = tempfile::tempdir().unwrap();
        let config = ModelConfig {
            model_dir: dir.path().to_path_buf(),
            ..ModelConfig::default()
        };
        let result = OnnxPredictor::load(&config, LabelMap::default());
        assert!(matches!(result, Err(ModelLoadError::MissingArtifact(_))));
    }

    #[test]
    fn test_missing_tokenizer_is_load_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("model.onnx"), b"not a model").unwrap();
        let config = ModelConfig {
            model_dir: dir.path().to_path_buf(),
            ..ModelConfig::default()
        };
        match OnnxPredictor::load(&config, LabelMap::default()) {
            Err(ModelLoadError::MissingArtifact(path)) => assert!(path.ends_with("tokenizer.json")),
            other => panic!("expected missing tokenizer, got {:?}", other.err()),
        }
    }

    #[test]
    fn test_real_model_distribution() {
        let model_dir = PathBuf::from(
            std::env::var("DETECTOR_TEST_MODEL_DIR").unwrap_or_else(|_| "diagrams/final_model".to_string()),
        );
        if !model_dir.join("model.onnx").exists() {
            println!("Skipping model test - artifacts not found in {}", model_dir.display());
            return;
        }
        let config = ModelConfig {
            model_dir,
            ..ModelConfig::default()
        };
        let predictor = OnnxPredictor::load(&config, LabelMap::default()).unwrap();
        let long = "word ".repeat(2000);
        let texts = ["", "The council approved the budget on Tuesday.", long.as_str()];
        let preds = predictor.predict_batch(&texts).unwrap();
        assert_eq!(preds.len(), 3);
        for pred in &preds {
            let sum: f64 = pred.distribution.iter().map(|(_, p)| p).sum();
            assert!((sum - 1.0).abs() < 1e-6);
            assert_eq!(pred.label, pred.distribution.argmax());
        }
        let again = predictor.predict(texts[1]).unwrap();
        assert_eq!(again.distribution, preds[1].distribution);
    }
}
