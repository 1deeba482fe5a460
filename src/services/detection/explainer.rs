// Perturbation Explainer
// Local surrogate explanations: drop words, re-predict, fit a weighted linear model

use ndarray::{Array1, Array2};
use once_cell::sync::Lazy;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use regex::Regex;
use std::collections::HashMap;
use std::time::Instant;

use crate::error::ExplanationError;
use crate::models::{ClassLabel, ExplanationItem};
use crate::services::config_store::ExplainerConfig;
use crate::services::detection::predictor::Predictor;
use crate::services::detection::surrogate::fit_weighted_ridge;

static WORD_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\w+").expect("word regex"));

// ============ Word Features ============

#[derive(Debug, Clone, PartialEq)]
enum Piece {
    Separator(String),
    Word { text: String, feature: usize },
}

/// Text split into words (the interpretable features) and the separators between them.
/// Every occurrence of a distinct word shares one feature.
#[derive(Debug, Clone)]
struct WordFeatures {
    pieces: Vec<Piece>,
    vocabulary: Vec<String>,
}

impl WordFeatures {
    fn split(text: &str) -> Self {
        let mut pieces = Vec::new();
        let mut vocabulary: Vec<String> = Vec::new();
        let mut index: HashMap<String, usize> = HashMap::new();
        let mut cursor = 0;

        for m in WORD_RE.find_iter(text) {
            if m.start() > cursor {
                pieces.push(Piece::Separator(text[cursor..m.start()].to_string()));
            }
            let word = m.as_str().to_string();
            let feature = *index.entry(word.clone()).or_insert_with(|| {
                vocabulary.push(word.clone());
                vocabulary.len() - 1
            });
            pieces.push(Piece::Word { text: word, feature });
            cursor = m.end();
        }
        if cursor < text.len() {
            pieces.push(Piece::Separator(text[cursor..].to_string()));
        }

        Self { pieces, vocabulary }
    }

    fn len(&self) -> usize {
        self.vocabulary.len()
    }

    /// Rebuild the text keeping only words whose mask entry is set.
    fn render(&self, mask: &[bool]) -> String {
        let mut out = String::new();
        for piece in &self.pieces {
            match piece {
                Piece::Separator(s) => out.push_str(s),
                Piece::Word { text, feature } => {
                    if mask[*feature] {
                        out.push_str(text);
                    }
                }
            }
        }
        out
    }
}

// ============ Explainer ============

#[derive(Debug, Clone)]
pub struct Explainer {
    enabled: bool,
    num_samples: usize,
    kernel_width: f64,
    ridge_alpha: f64,
    batch_size: usize,
    window_words: usize,
    seed: Option<u64>,
}

impl Default for Explainer {
    fn default() -> Self {
        Self::from_config(&ExplainerConfig::default())
    }
}

impl Explainer {
    pub fn from_config(config: &ExplainerConfig) -> Self {
        Self {
            enabled: config.enabled,
            num_samples: config.num_samples.max(2),
            kernel_width: config.kernel_width,
            ridge_alpha: config.ridge_alpha,
            batch_size: config.batch_size.max(1),
            window_words: config.window_words.max(1),
            seed: config.seed,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Rank the words of `text` by how strongly they push the predictor toward
    /// its predicted class. Returns at most `num_features` items, largest |weight| first.
    pub fn explain(
        &self,
        text: &str,
        predictor: &dyn Predictor,
        num_features: usize,
    ) -> Result<Vec<ExplanationItem>, ExplanationError> {
        self.explain_until(text, predictor, num_features, None)
    }

    /// Like [`Explainer::explain`], but gives up between prediction batches once
    /// `deadline` has passed.
    pub fn explain_until(
        &self,
        text: &str,
        predictor: &dyn Predictor,
        num_features: usize,
        deadline: Option<Instant>,
    ) -> Result<Vec<ExplanationItem>, ExplanationError> {
        if !self.enabled {
            return Err(ExplanationError::Disabled);
        }
        let features = WordFeatures::split(word_window(text, self.window_words));
        let d = features.len();
        if d == 0 {
            return Err(ExplanationError::NoFeatures);
        }
        if num_features == 0 {
            return Ok(Vec::new());
        }

        let masks = self.sample_masks(d);

        let mut predictions = Vec::with_capacity(masks.len());
        for chunk in masks.chunks(self.batch_size) {
            if deadline.is_some_and(|at| Instant::now() >= at) {
                return Err(ExplanationError::DeadlineExceeded {
                    completed: predictions.len(),
                    total: masks.len(),
                });
            }
            let texts: Vec<String> = chunk.iter().map(|m| features.render(m)).collect();
            let refs: Vec<&str> = texts.iter().map(String::as_str).collect();
            predictions.extend(predictor.predict_batch(&refs)?);
        }
        if predictions.len() != masks.len() {
            return Err(ExplanationError::Numerical(format!(
                "predictor returned {} results for {} samples",
                predictions.len(),
                masks.len()
            )));
        }

        // Row 0 is the untouched text; explain the class it was assigned.
        let target: ClassLabel = predictions[0].label;
        let targets = Array1::from_iter(predictions.iter().map(|p| p.distribution.get(target)));

        let n = masks.len();
        let mut design = Array2::<f64>::zeros((n, d));
        let mut weights = Array1::<f64>::zeros(n);
        for (i, mask) in masks.iter().enumerate() {
            let kept = mask.iter().filter(|&&b| b).count();
            for (j, &on) in mask.iter().enumerate() {
                if on {
                    design[[i, j]] = 1.0;
                }
            }
            weights[i] = self.kernel(cosine_distance_to_original(kept, d));
        }

        let fit = fit_weighted_ridge(&design, &targets, &weights, self.ridge_alpha)?;

        let mut ranked: Vec<(usize, f64)> = fit.coefficients.iter().copied().enumerate().collect();
        ranked.sort_by(|a, b| b.1.abs().total_cmp(&a.1.abs()).then(a.0.cmp(&b.0)));

        let items: Vec<ExplanationItem> = ranked
            .into_iter()
            .take(num_features)
            .map(|(j, weight)| ExplanationItem {
                token: features.vocabulary[j].clone(),
                weight,
            })
            .collect();

        tracing::debug!(
            samples = n,
            features = d,
            target = %target,
            top = items.first().map(|i| i.token.as_str()).unwrap_or(""),
            "Explanation fitted"
        );
        Ok(items)
    }

    /// First row keeps every word; each other row removes `k` distinct words, `k` uniform in `1..=d`.
    fn sample_masks(&self, d: usize) -> Vec<Vec<bool>> {
        let mut rng = match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let mut masks = Vec::with_capacity(self.num_samples);
        masks.push(vec![true; d]);
        for _ in 1..self.num_samples {
            let remove = rng.gen_range(1..=d);
            let mut mask = vec![true; d];
            for idx in rand::seq::index::sample(&mut rng, d, remove).iter() {
                mask[idx] = false;
            }
            masks.push(mask);
        }
        masks
    }

    fn kernel(&self, distance: f64) -> f64 {
        (-(distance * distance) / (self.kernel_width * self.kernel_width))
            .exp()
            .sqrt()
    }
}

/// Prefix of `text` ending after its `max_words`-th word. Every word yields at
/// least one token, so a model truncating at `max_words` tokens sees nothing past it.
fn word_window(text: &str, max_words: usize) -> &str {
    match WORD_RE.find_iter(text).nth(max_words) {
        Some(next) => &text[..next.start()],
        None => text,
    }
}

/// Cosine distance (scaled by 100) between a mask keeping `kept` of `d` words and the all-ones mask.
fn cosine_distance_to_original(kept: usize, d: usize) -> f64 {
    if kept == 0 || d == 0 {
        return 100.0;
    }
    let similarity = (kept as f64 / d as f64).sqrt();
    (1.0 - similarity) * 100.0
}
