// Predictor Contract
// Any classifier that maps text to a 3-class distribution

use crate::error::InferenceError;
use crate::models::{Prediction, ProbabilityDistribution};

/// A loaded classifier shared read-only across requests.
///
/// Implementations must be deterministic for a fixed model and input, and must
/// return one prediction per input text, in input order.
pub trait Predictor: Send + Sync {
    fn predict_batch(&self, texts: &[&str]) -> Result<Vec<Prediction>, InferenceError>;

    fn predict(&self, text: &str) -> Result<Prediction, InferenceError> {
        let mut out = self.predict_batch(&[text])?;
        if out.len() != 1 {
            return Err(InferenceError::Forward(format!(
                "expected 1 prediction, got {}",
                out.len()
            )));
        }
        Ok(out.remove(0))
    }

    /// Short description for health checks and logs.
    fn describe(&self) -> String {
        "predictor".to_string()
    }
}

/// Numerically stable softmax (max logit subtracted before exponentiation).
pub fn softmax(logits: &[f64]) -> Vec<f64> {
    if logits.is_empty() {
        return Vec::new();
    }
    let max_logit = logits.iter().fold(f64::NEG_INFINITY, |a, &b| a.max(b));
    let exp_logits: Vec<f64> = logits.iter().map(|&x| (x - max_logit).exp()).collect();
    let sum_exp: f64 = exp_logits.iter().sum();

    exp_logits.iter().map(|&x| x / sum_exp).collect()
}

/// Turn label-ordered logits into a validated prediction.
pub fn prediction_from_logits(logits: [f64; 3]) -> Result<Prediction, InferenceError> {
    let probs = softmax(&logits);
    let distribution = ProbabilityDistribution::new([probs[0], probs[1], probs[2]])?;
    Ok(Prediction::from_distribution(distribution))
}
