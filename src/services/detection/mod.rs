// Detection Module
// Provenance classification core organized into specialized submodules:
// - labels: Model-index to label bijection
// - predictor: Predictor contract and softmax
// - tokenizer: Truncating, batch-padding tokenizer wrapper
// - onnx: ONNX Runtime backed predictor
// - surrogate: Weighted ridge regression
// - explainer: Word-level perturbation explanations

pub mod labels;
pub mod predictor;
pub mod tokenizer;
pub mod onnx;
pub mod surrogate;
pub mod explainer;

pub use labels::LabelMap;
pub use predictor::{prediction_from_logits, softmax, Predictor};
pub use tokenizer::{EncodedBatch, TextTokenizer};
pub use onnx::OnnxPredictor;
pub use explainer::Explainer;
