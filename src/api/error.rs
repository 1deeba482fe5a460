//! HTTP error mapping

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::error::{ExtractionError, ServiceError};

pub type ApiResult<T> = Result<T, ServiceError>;

impl ServiceError {
    pub fn status(&self) -> StatusCode {
        match self {
            ServiceError::Extraction(ExtractionError::UnsupportedFormat { .. }) => {
                StatusCode::UNSUPPORTED_MEDIA_TYPE
            }
            ServiceError::Extraction(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ServiceError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            ServiceError::Timeout => StatusCode::GATEWAY_TIMEOUT,
            ServiceError::Inference(_) | ServiceError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            ServiceError::Inference(e) => {
                tracing::error!("Inference error: {}", e);
                format!("Prediction failed: {}", e)
            }
            ServiceError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                "Internal server error".to_string()
            }
            ServiceError::Timeout => {
                tracing::warn!("Request exceeded its time budget");
                "request timed out".to_string()
            }
            other => {
                tracing::info!(status = status.as_u16(), "Request rejected: {}", other);
                other.to_string()
            }
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::InferenceError;
    use crate::models::DocumentFormat;

    #[test]
    fn test_status_mapping() {
        let unsupported: ServiceError = ExtractionError::UnsupportedFormat {
            filename: "a.xyz".to_string(),
        }
        .into();
        assert_eq!(unsupported.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);

        let failed: ServiceError = ExtractionError::failed(DocumentFormat::Pdf, "broken xref").into();
        assert_eq!(failed.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let empty: ServiceError = ExtractionError::NoTextFound.into();
        assert_eq!(empty.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let inference: ServiceError = InferenceError::Forward("oom".to_string()).into();
        assert_eq!(inference.status(), StatusCode::INTERNAL_SERVER_ERROR);

        assert_eq!(ServiceError::Timeout.status(), StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(
            ServiceError::InvalidRequest("bad".to_string()).status(),
            StatusCode::BAD_REQUEST
        );
    }
}
