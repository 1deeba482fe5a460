//! Request handlers
//!
//! Extraction, inference and explanation are CPU-bound; they run on the
//! blocking pool under the per-request time budget. The same deadline is
//! handed to the work so it stops once the client has been answered.

use std::time::Instant;

use axum::{
    extract::{rejection::JsonRejection, Multipart, State},
    Json,
};
use uuid::Uuid;

use super::{ApiResult, AppState};
use crate::error::ServiceError;
use crate::models::{
    ClassLabel, DocumentAnalysisResponse, HealthResponse, PredictRequest, TextAnalysisResponse,
};
use crate::services::prediction::PredictionService;

pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    tracing::debug!(predictor = %state.service.predictor().describe(), "Health check");
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        model_loaded: true,
        labels: ClassLabel::ALL.to_vec(),
    })
}

pub async fn predict(
    State(state): State<AppState>,
    payload: Result<Json<PredictRequest>, JsonRejection>,
) -> ApiResult<Json<TextAnalysisResponse>> {
    let request_id = Uuid::new_v4();
    let Json(request) = payload.map_err(|e| ServiceError::InvalidRequest(e.body_text()))?;
    tracing::info!(%request_id, chars = request.text.chars().count(), "POST /predict");

    let response = run_blocking(&state, move |service, deadline| {
        service.analyze_text_until(&request.text, Some(deadline))
    })
    .await?;
    tracing::info!(%request_id, label = %response.prediction, "POST /predict done");
    Ok(Json(response))
}

pub async fn analyze_file(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> ApiResult<Json<DocumentAnalysisResponse>> {
    let request_id = Uuid::new_v4();
    let mut upload: Option<(String, Vec<u8>)> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ServiceError::InvalidRequest(e.body_text()))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let filename = field.file_name().unwrap_or_default().to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ServiceError::InvalidRequest(e.body_text()))?;
        upload = Some((filename, bytes.to_vec()));
    }

    let (filename, bytes) =
        upload.ok_or_else(|| ServiceError::InvalidRequest("missing multipart field 'file'".to_string()))?;
    tracing::info!(%request_id, filename = %filename, bytes = bytes.len(), "POST /analyze-file");

    let response = run_blocking(&state, move |service, deadline| {
        service.analyze_document_until(bytes, &filename, Some(deadline))
    })
    .await?;
    tracing::info!(%request_id, label = %response.prediction, "POST /analyze-file done");
    Ok(Json(response))
}

async fn run_blocking<T, F>(state: &AppState, work: F) -> Result<T, ServiceError>
where
    T: Send + 'static,
    F: FnOnce(&PredictionService, Instant) -> Result<T, ServiceError> + Send + 'static,
{
    let service = state.service.clone();
    let deadline = Instant::now() + state.request_timeout;
    let task = tokio::task::spawn_blocking(move || work(&service, deadline));
    match tokio::time::timeout(state.request_timeout, task).await {
        Ok(Ok(result)) => result,
        Ok(Err(join_err)) => Err(ServiceError::Internal(format!("worker failed: {}", join_err))),
        Err(_) => Err(ServiceError::Timeout),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::create_router;
    use crate::error::InferenceError;
    use crate::models::Prediction;
    use crate::services::config_store::{CleanerConfig, ExplainerConfig};
    use crate::services::detection::predictor::prediction_from_logits;
    use crate::services::detection::{Explainer, Predictor};
    use crate::services::extraction::TextExtractor;
    use crate::services::prediction::tests::keyword_service;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use axum::Router;
    use serde_json::Value;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;
    use tower::ServiceExt;

    fn app_with(service: PredictionService, timeout: Duration) -> Router {
        let state = AppState {
            service: Arc::new(service),
            request_timeout: timeout,
        };
        create_router(state, 1024 * 1024)
    }

    fn app() -> Router {
        app_with(
            keyword_service(ExplainerConfig {
                num_samples: 60,
                seed: Some(3),
                ..ExplainerConfig::default()
            }),
            Duration::from_secs(10),
        )
    }

    async fn json_body(response: axum::response::Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn multipart_request(filename: &str, content: &[u8]) -> Request<Body> {
        let boundary = "XBOUNDARYX";
        let mut body = Vec::new();
        body.extend_from_slice(
            format!(
                "--{b}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{f}\"\r\nContent-Type: application/octet-stream\r\n\r\n",
                b = boundary,
                f = filename
            )
            .as_bytes(),
        );
        body.extend_from_slice(content);
        body.extend_from_slice(format!("\r\n--{}--\r\n", boundary).as_bytes());

        Request::builder()
            .method("POST")
            .uri("/analyze-file")
            .header("content-type", format!("multipart/form-data; boundary={}", boundary))
            .body(Body::from(body))
            .unwrap()
    }

    #[tokio::test]
    async fn test_predict_returns_prediction_and_explanation() {
        let request = Request::builder()
            .method("POST")
            .uri("/predict")
            .header("content-type", "application/json")
            .body(Body::from(r#"{"text": "Moreover, we delve into the data."}"#))
            .unwrap();
        let response = app().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = json_body(response).await;
        assert_eq!(body["prediction"], "AI-generated");
        let probs = body["probabilities"].as_object().unwrap();
        assert_eq!(probs.len(), 3);
        let sum: f64 = probs.values().map(|v| v.as_f64().unwrap()).sum();
        assert!((sum - 1.0).abs() < 1e-6);
        let explanation = body["explanation"].as_array().unwrap();
        assert!(explanation.len() <= 6);
        assert!(explanation[0].get("word").is_some());
        assert!(explanation[0].get("weight").is_some());
    }

    #[tokio::test]
    async fn test_predict_rejects_malformed_json() {
        let request = Request::builder()
            .method("POST")
            .uri("/predict")
            .header("content-type", "application/json")
            .body(Body::from(r#"{"txt": 1}"#))
            .unwrap();
        let response = app().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(json_body(response).await["error"].is_string());
    }

    #[tokio::test]
    async fn test_analyze_file_txt() {
        let response = app()
            .oneshot(multipart_request("story.txt", b"This paraphrase was reworded."))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["prediction"], "AI-paraphrased");
        assert!(body.get("explanation").is_none());
        assert!(body["confidence"].as_f64().unwrap() > 0.0);
    }

    #[tokio::test]
    async fn test_analyze_file_unsupported_type() {
        let response = app()
            .oneshot(multipart_request("data.xyz", b"whatever"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
        assert!(json_body(response).await["error"].is_string());
    }

    #[tokio::test]
    async fn test_analyze_file_empty_text() {
        let response = app().oneshot(multipart_request("empty.txt", b"")).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(json_body(response).await["error"], "No text found in file");
    }

    #[tokio::test]
    async fn test_health() {
        let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
        let response = app().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["labels"].as_array().unwrap().len(), 3);
    }

    struct SlowPredictor;

    impl Predictor for SlowPredictor {
        fn predict_batch(&self, texts: &[&str]) -> Result<Vec<Prediction>, InferenceError> {
            std::thread::sleep(Duration::from_millis(300));
            texts.iter().map(|_| prediction_from_logits([0.0, 0.0, 1.0])).collect()
        }
    }

    #[tokio::test]
    async fn test_slow_request_times_out() {
        let service = PredictionService::new(
            Arc::new(SlowPredictor),
            TextExtractor::new(None),
            Explainer::default(),
            CleanerConfig::default(),
            6,
        );
        let request = Request::builder()
            .method("POST")
            .uri("/predict")
            .header("content-type", "application/json")
            .body(Body::from(r#"{"text": "anything"}"#))
            .unwrap();
        let response = app_with(service, Duration::from_millis(50))
            .oneshot(request)
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(json_body(response).await["error"], "request timed out");
    }

    #[derive(Default)]
    struct CountingPredictor {
        calls: AtomicUsize,
    }

    impl Predictor for CountingPredictor {
        fn predict_batch(&self, texts: &[&str]) -> Result<Vec<Prediction>, InferenceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(20));
            texts.iter().map(|_| prediction_from_logits([0.0, 0.0, 1.0])).collect()
        }
    }

    #[tokio::test]
    async fn test_timed_out_request_stops_using_the_predictor() {
        let predictor = Arc::new(CountingPredictor::default());
        let service = PredictionService::new(
            predictor.clone(),
            TextExtractor::new(None),
            Explainer::default(),
            CleanerConfig::default(),
            6,
        );
        let request = Request::builder()
            .method("POST")
            .uri("/predict")
            .header("content-type", "application/json")
            .body(Body::from(r#"{"text": "several distinct words to perturb here"}"#))
            .unwrap();
        let response = app_with(service, Duration::from_millis(50))
            .oneshot(request)
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);

        let at_timeout = predictor.calls.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(600)).await;
        let later = predictor.calls.load(Ordering::SeqCst);
        // At most the batch already in flight when the deadline passed.
        assert!(later <= at_timeout + 1, "{} calls at timeout, {} later", at_timeout, later);
    }
}
