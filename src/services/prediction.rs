// Prediction Service
// Single-text analysis with explanation, bulk-document analysis without

use std::sync::Arc;
use std::time::Instant;

use crate::error::{ExplanationError, ExtractionError, ServiceError, SessionLogError};
use crate::models::{DocumentAnalysisResponse, TextAnalysisResponse};
use crate::services::config_store::{AppConfig, CleanerConfig};
use crate::services::detection::{Explainer, Predictor};
use crate::services::extraction::TextExtractor;
use crate::services::session_log::SessionLog;
use crate::services::text_cleaner::clean_text;

pub struct PredictionService {
    predictor: Arc<dyn Predictor>,
    extractor: TextExtractor,
    explainer: Explainer,
    cleaner: CleanerConfig,
    num_features: usize,
    session_log: Option<Arc<SessionLog>>,
}

impl PredictionService {
    pub fn new(
        predictor: Arc<dyn Predictor>,
        extractor: TextExtractor,
        explainer: Explainer,
        cleaner: CleanerConfig,
        num_features: usize,
    ) -> Self {
        Self {
            predictor,
            extractor,
            explainer,
            cleaner,
            num_features,
            session_log: None,
        }
    }

    /// Wire every collaborator from configuration. Opens the session log if one is configured.
    pub fn from_config(predictor: Arc<dyn Predictor>, config: &AppConfig) -> Result<Self, SessionLogError> {
        let mut service = Self::new(
            predictor,
            TextExtractor::from_config(&config.extraction),
            Explainer::from_config(&config.explainer),
            config.cleaner.clone(),
            config.explainer.num_features,
        );
        if let Some(path) = &config.logging.session_log_path {
            service = service.with_session_log(Arc::new(SessionLog::open(path)?));
        }
        Ok(service)
    }

    pub fn with_session_log(mut self, log: Arc<SessionLog>) -> Self {
        self.session_log = Some(log);
        self
    }

    pub fn predictor(&self) -> &Arc<dyn Predictor> {
        &self.predictor
    }

    /// Classify raw text and explain the decision. A failed explanation degrades
    /// to an empty list; a failed prediction is an error.
    pub fn analyze_text(&self, text: &str) -> Result<TextAnalysisResponse, ServiceError> {
        self.analyze_text_until(text, None)
    }

    /// [`PredictionService::analyze_text`] that stops sampling explanations once
    /// `deadline` passes and reports a timeout.
    pub fn analyze_text_until(
        &self,
        text: &str,
        deadline: Option<Instant>,
    ) -> Result<TextAnalysisResponse, ServiceError> {
        let cleaned = clean_text(text, &self.cleaner);
        let prediction = self.predictor.predict(&cleaned)?;

        let explanation = if self.explainer.is_enabled() {
            match self
                .explainer
                .explain_until(&cleaned, self.predictor.as_ref(), self.num_features, deadline)
            {
                Ok(items) => items,
                Err(ExplanationError::DeadlineExceeded { completed, total }) => {
                    tracing::warn!(completed, total, "Explanation abandoned at request deadline");
                    return Err(ServiceError::Timeout);
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Explanation unavailable, returning prediction without it");
                    Vec::new()
                }
            }
        } else {
            Vec::new()
        };

        if let Some(log) = &self.session_log {
            if let Err(e) = log.record(text, prediction.label) {
                tracing::warn!(error = %e, "Failed to append session log entry");
            }
        }

        tracing::info!(
            label = %prediction.label,
            confidence = prediction.confidence,
            chars = cleaned.chars().count(),
            explanation_items = explanation.len(),
            "Text analyzed"
        );

        Ok(TextAnalysisResponse {
            prediction: prediction.label,
            confidence: prediction.confidence,
            probabilities: prediction.distribution,
            explanation,
        })
    }

    /// Classify an uploaded document. Never explains.
    pub fn analyze_document(&self, bytes: Vec<u8>, filename: &str) -> Result<DocumentAnalysisResponse, ServiceError> {
        self.analyze_document_until(bytes, filename, None)
    }

    /// [`PredictionService::analyze_document`] that skips inference when
    /// extraction ran past `deadline`.
    pub fn analyze_document_until(
        &self,
        bytes: Vec<u8>,
        filename: &str,
        deadline: Option<Instant>,
    ) -> Result<DocumentAnalysisResponse, ServiceError> {
        let document = self.extractor.extract(bytes, filename)?;
        if document.extracted_text.trim().is_empty() {
            return Err(ExtractionError::NoTextFound.into());
        }
        if deadline.is_some_and(|at| Instant::now() >= at) {
            tracing::warn!(filename, "Extraction finished past the request deadline");
            return Err(ServiceError::Timeout);
        }

        let cleaned = clean_text(&document.extracted_text, &self.cleaner);
        let prediction = self.predictor.predict(&cleaned)?;

        tracing::info!(
            filename,
            format = %document.declared_format,
            label = %prediction.label,
            confidence = prediction.confidence,
            "Document analyzed"
        );

        Ok(DocumentAnalysisResponse {
            prediction: prediction.label,
            confidence: prediction.confidence,
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::models::ClassLabel;
    use crate::services::config_store::ExplainerConfig;
    use crate::services::detection::predictor::testing::KeywordPredictor;

    pub fn keyword_service(explainer: ExplainerConfig) -> PredictionService {
        PredictionService::new(
            Arc::new(KeywordPredictor::default()),
            TextExtractor::new(None),
            Explainer::from_config(&explainer),
            CleanerConfig::default(),
            explainer.num_features,
        )
    }

    fn seeded() -> ExplainerConfig {
        ExplainerConfig {
            num_samples: 80,
            seed: Some(11),
            ..ExplainerConfig::default()
        }
    }

    #[test]
    fn test_text_mode_returns_explanation() {
        let service = keyword_service(seeded());
        let resp = service
            .analyze_text("Moreover, analysts delve into the tapestry of markets.")
            .unwrap();
        assert_eq!(resp.prediction, ClassLabel::AiGenerated);
        assert!(!resp.explanation.is_empty());
        assert!(resp.explanation.len() <= 6);
        assert!((resp.confidence - resp.probabilities.get(resp.prediction)).abs() < 1e-12);
    }

    #[test]
    fn test_disabled_explainer_degrades_to_empty() {
        let service = keyword_service(ExplainerConfig {
            enabled: false,
            ..ExplainerConfig::default()
        });
        let resp = service.analyze_text("plain council report").unwrap();
        assert!(resp.explanation.is_empty());
        assert_eq!(resp.prediction, ClassLabel::HumanWritten);
    }

    #[test]
    fn test_prediction_failure_is_error() {
        let service = PredictionService::new(
            Arc::new(KeywordPredictor::failing_on("boom")),
            TextExtractor::new(None),
            Explainer::from_config(&seeded()),
            CleanerConfig::default(),
            6,
        );
        assert!(matches!(service.analyze_text("BOOM"), Err(ServiceError::Inference(_))));
    }

    #[test]
    fn test_document_mode_has_no_explanation() {
        let service = keyword_service(seeded());
        let resp = service
            .analyze_document(b"We delve deeper.".to_vec(), "article.txt")
            .unwrap();
        assert_eq!(resp.prediction, ClassLabel::AiGenerated);
        let json = serde_json::to_value(&resp).unwrap();
        assert!(json.get("explanation").is_none());
    }

    #[test]
    fn test_empty_document_is_no_text_found() {
        let service = keyword_service(seeded());
        let err = service.analyze_document(b"  \n ".to_vec(), "blank.txt").unwrap_err();
        assert!(matches!(err, ServiceError::Extraction(ExtractionError::NoTextFound)));
    }

    #[test]
    fn test_unsupported_document_never_predicts() {
        let predictor = Arc::new(KeywordPredictor::default());
        let service = PredictionService::new(
            predictor.clone(),
            TextExtractor::new(None),
            Explainer::default(),
            CleanerConfig::default(),
            6,
        );
        let err = service.analyze_document(b"x".to_vec(), "file.xyz").unwrap_err();
        assert!(matches!(err, ServiceError::Extraction(ExtractionError::UnsupportedFormat { .. })));
        assert_eq!(predictor.batch_calls(), 0);
    }

    #[test]
    fn test_expired_deadline_is_timeout_and_skips_log() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.jsonl");
        let predictor = Arc::new(KeywordPredictor::default());
        let service = PredictionService::new(
            predictor.clone(),
            TextExtractor::new(None),
            Explainer::from_config(&seeded()),
            CleanerConfig::default(),
            6,
        )
        .with_session_log(Arc::new(SessionLog::open(&path).unwrap()));

        let past = Instant::now() - std::time::Duration::from_millis(1);
        let err = service.analyze_text_until("we delve deeper", Some(past)).unwrap_err();
        assert!(matches!(err, ServiceError::Timeout));
        assert_eq!(predictor.batch_calls(), 1);
        assert!(SessionLog::read_all(&path).unwrap().is_empty());

        let err = service
            .analyze_document_until(b"We delve deeper.".to_vec(), "a.txt", Some(past))
            .unwrap_err();
        assert!(matches!(err, ServiceError::Timeout));
        assert_eq!(predictor.batch_calls(), 1);
    }

    #[test]
    fn test_session_log_records_text_predictions() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.jsonl");
        let service = keyword_service(seeded()).with_session_log(Arc::new(SessionLog::open(&path).unwrap()));
        service.analyze_text("reworded paraphrase here").unwrap();

        let entries = SessionLog::read_all(&path).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].predicted_label, ClassLabel::AiParaphrased);
    }
}
