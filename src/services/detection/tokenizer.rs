// Tokenizer Wrapper
// HuggingFace tokenizer.json with model-length truncation and batch padding

use std::path::Path;
use tokenizers::{PaddingStrategy, Tokenizer, TruncationParams};

use crate::error::{InferenceError, ModelLoadError};

/// Row-major `[batch, seq_len]` tensors ready for the model.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedBatch {
    pub input_ids: Vec<i64>,
    pub attention_mask: Vec<i64>,
    pub token_type_ids: Vec<i64>,
    pub batch: usize,
    pub seq_len: usize,
}

pub struct TextTokenizer {
    tokenizer: Tokenizer,
    max_length: usize,
}

impl TextTokenizer {
    pub fn from_file(path: &Path, max_length: usize) -> Result<Self, ModelLoadError> {
        if !path.exists() {
            return Err(ModelLoadError::MissingArtifact(path.to_path_buf()));
        }
        tracing::info!(path = %path.display(), max_length, "Loading tokenizer");

        let tokenizer = Tokenizer::from_file(path)
            .map_err(|e| ModelLoadError::Tokenizer(format!("{}: {}", path.display(), e)))?;
        Self::configure(tokenizer, max_length)
    }

    /// Overlong input is truncated silently; batches pad to their longest member.
    fn configure(mut tokenizer: Tokenizer, max_length: usize) -> Result<Self, ModelLoadError> {
        tokenizer
            .with_truncation(Some(TruncationParams {
                max_length,
                ..Default::default()
            }))
            .map_err(|e| ModelLoadError::Tokenizer(format!("truncation: {}", e)))?;

        // Keep the pad token the model was trained with, if the file declares one.
        let mut padding = tokenizer.get_padding().cloned().unwrap_or_default();
        padding.strategy = PaddingStrategy::BatchLongest;
        tokenizer.with_padding(Some(padding));

        Ok(Self { tokenizer, max_length })
    }

    pub fn max_length(&self) -> usize {
        self.max_length
    }

    pub fn encode_batch(&self, texts: &[&str]) -> Result<EncodedBatch, InferenceError> {
        if texts.is_empty() {
            return Ok(EncodedBatch {
                input_ids: Vec::new(),
                attention_mask: Vec::new(),
                token_type_ids: Vec::new(),
                batch: 0,
                seq_len: 0,
            });
        }

        let encodings = self
            .tokenizer
            .encode_batch(texts.to_vec(), true)
            .map_err(|e| InferenceError::Tokenization(e.to_string()))?;

        let seq_len = encodings.iter().map(|e| e.get_ids().len()).max().unwrap_or(0);
        let mut out = EncodedBatch {
            input_ids: Vec::with_capacity(texts.len() * seq_len),
            attention_mask: Vec::with_capacity(texts.len() * seq_len),
            token_type_ids: Vec::with_capacity(texts.len() * seq_len),
            batch: encodings.len(),
            seq_len,
        };

        for encoding in &encodings {
            if encoding.get_ids().len() != seq_len {
                return Err(InferenceError::Tokenization(format!(
                    "ragged batch: {} tokens, expected {}",
                    encoding.get_ids().len(),
                    seq_len
                )));
            }
            out.input_ids.extend(encoding.get_ids().iter().map(|&id| id as i64));
            out.attention_mask
                .extend(encoding.get_attention_mask().iter().map(|&m| m as i64));
            out.token_type_ids
                .extend(encoding.get_type_ids().iter().map(|&t| t as i64));
        }

        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WORD_LEVEL_JSON: &str = r#"{
        "version": "1.0",
        "truncation": null,
        "padding": null,
        "added_tokens": [],
        "normalizer": null,
        "pre_tokenizer": { "type": "Whitespace" },
        "post_processor": null,
        "decoder": null,
        "model": {
            "type": "WordLevel",
            "vocab": { "[PAD]": 0, "[UNK]": 1, "the": 2, "market": 3, "rose": 4, "sharply": 5 },
            "unk_token": "[UNK]"
        }
    }"#;

    fn word_level_tokenizer(max_length: usize) -> TextTokenizer {
        let tokenizer: Tokenizer = WORD_LEVEL_JSON.parse().unwrap();
        TextTokenizer::configure(tokenizer, max_length).unwrap()
    }

    #[test]
    fn test_batch_pads_to_longest() {
        let tok = word_level_tokenizer(16);
        let batch = tok.encode_batch(&["the market", "the market rose sharply"]).unwrap();
        assert_eq!(batch.batch, 2);
        assert_eq!(batch.seq_len, 4);
        assert_eq!(batch.input_ids.len(), 8);
        assert_eq!(&batch.attention_mask[..4], &[1, 1, 0, 0]);
        assert_eq!(&batch.attention_mask[4..], &[1, 1, 1, 1]);
    }

    #[test]
    fn test_overlong_input_truncates() {
        let tok = word_level_tokenizer(3);
        let batch = tok.encode_batch(&["the market rose sharply the market"]).unwrap();
        assert_eq!(batch.seq_len, 3);
        assert_eq!(batch.input_ids, vec![2, 3, 4]);
    }

    #[test]
    fn test_empty_text_is_encodable() {
        let tok = word_level_tokenizer(8);
        let batch = tok.encode_batch(&[""]).unwrap();
        assert_eq!(batch.batch, 1);
    }

    #[test]
    fn test_missing_file_is_load_error() {
        let err = TextTokenizer::from_file(Path::new("/nonexistent/tokenizer.json"), 512);
        assert!(matches!(err, Err(ModelLoadError::MissingArtifact(_))));
    }
}
