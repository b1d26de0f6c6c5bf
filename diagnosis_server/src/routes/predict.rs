use crate::{advisory::AdvisoryTable, server::SharedState, upload::UploadError};
use axum::{
    extract::{Multipart, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use plant_diagnosis::{Outcome, PredictionResult};
use serde_json::{json, Value};
use tracing::instrument;

const ROUTE: &str = "/predict";

impl IntoResponse for UploadError {
    fn into_response(self) -> Response {
        if let UploadError::Io(ref e) = self {
            tracing::error!("Failed to store upload: {}", e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": plant_diagnosis::decision::SERVER_ERROR_MESSAGE })),
            )
                .into_response();
        }
        (self.status_code(), Json(json!({ "error": self.to_string() }))).into_response()
    }
}

#[instrument(skip(state, multipart))]
pub async fn predict(
    State(state): State<SharedState>,
    multipart: Multipart,
) -> Result<Response, UploadError> {
    let diagnosis = state.diagnose_upload(multipart, ROUTE).await?;
    let (status, body) = json_body(&diagnosis.result, &diagnosis.upload.url, &state.advisories);
    Ok((status, Json(body)).into_response())
}

/// Percentage with two decimals, as shown to users.
pub fn confidence_percent(confidence: f32) -> f64 {
    (confidence as f64 * 10_000.0).round() / 100.0
}

pub fn json_body(
    result: &PredictionResult,
    image_url: &str,
    advisories: &AdvisoryTable,
) -> (StatusCode, Value) {
    match result.outcome {
        Outcome::Confident | Outcome::LowConfidence => {
            let mut body = json!({
                "prediction": result.class_name,
                "confidence": result.confidence.map(confidence_percent),
                "image_url": image_url,
                "advisory": result.class_key.and_then(|key| advisories.get(key)),
            });
            if result.outcome == Outcome::LowConfidence {
                body["message"] = Value::String(result.message.clone());
            }
            (StatusCode::OK, body)
        }
        Outcome::Rejected => (
            StatusCode::BAD_REQUEST,
            json!({
                "error": result.rejection_reason.as_deref().unwrap_or(&result.message),
                "image_url": image_url,
            }),
        ),
        Outcome::ServerError => (
            StatusCode::INTERNAL_SERVER_ERROR,
            json!({ "error": result.message }),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routes::test_support::{multipart, state, state_with_limit, FixedDiagnoser};
    use plant_diagnosis::{ClassProbabilities, DecisionPolicy};

    fn decided(index: usize, confidence: f32) -> PredictionResult {
        let mut values = vec![(1.0 - confidence) / 14.0; 15];
        values[index] = confidence;
        DecisionPolicy::new(0.70)
            .decide(&ClassProbabilities::new(values))
            .unwrap()
    }

    #[test]
    fn test_confidence_percent() {
        assert_eq!(confidence_percent(0.99), 99.0);
        assert_eq!(confidence_percent(0.123456), 12.35);
    }

    #[test]
    fn test_confident_body() {
        let advisories = AdvisoryTable::load().unwrap();
        let (status, body) = json_body(&decided(9, 0.99), "/static/uploads/a.png", &advisories);

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["prediction"], "Tomato Septoria Leaf Spot");
        assert_eq!(body["confidence"], 99.0);
        assert_eq!(body["image_url"], "/static/uploads/a.png");
        assert!(body["advisory"]["treatment"].is_array());
        assert!(body.get("message").is_none());
    }

    #[test]
    fn test_low_confidence_body() {
        let advisories = AdvisoryTable::load().unwrap();
        let (status, body) = json_body(&decided(14, 0.30), "/u.png", &advisories);

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["prediction"], "Tomato Healthy");
        assert_eq!(body["message"], "Low confidence. Please try a clearer image.");
    }

    #[test]
    fn test_rejected_and_error_bodies() {
        let advisories = AdvisoryTable::load().unwrap();
        let (status, body) = json_body(&PredictionResult::rejected("too small"), "/u.png", &advisories);
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "too small");

        let (status, body) = json_body(&PredictionResult::server_error(), "/u.png", &advisories);
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "Server error occurred. Please try again later.");
        assert!(body.get("image_url").is_none());
    }

    #[tokio::test]
    async fn test_predict_handler() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let diagnoser = FixedDiagnoser::new(decided(2, 0.91));
        let state = state(diagnoser.clone(), dir.path());

        let upload = multipart("file", "leaf.jpg", b"fake image bytes").await;
        let response = predict(State(state), upload).await?;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(diagnoser.calls(), 1);
        assert_eq!(std::fs::read_dir(dir.path())?.count(), 1);

        Ok(())
    }

    #[tokio::test]
    async fn test_predict_rejects_bad_extension() {
        let dir = tempfile::tempdir().unwrap();
        let diagnoser = FixedDiagnoser::new(decided(2, 0.91));
        let state = state(diagnoser.clone(), dir.path());

        let upload = multipart("file", "notes.txt", b"hello").await;
        let err = predict(State(state), upload).await.unwrap_err();

        assert!(matches!(err, UploadError::InvalidType));
        assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
        assert_eq!(diagnoser.calls(), 0);
    }

    #[tokio::test]
    async fn test_predict_missing_field() {
        let dir = tempfile::tempdir().unwrap();
        let diagnoser = FixedDiagnoser::new(decided(2, 0.91));
        let state = state(diagnoser.clone(), dir.path());

        let upload = multipart("photo", "leaf.png", b"bytes").await;
        let err = predict(State(state), upload).await.unwrap_err();

        assert!(matches!(err, UploadError::MissingFile));
    }

    #[tokio::test]
    async fn test_predict_oversized_upload() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let diagnoser = FixedDiagnoser::new(decided(2, 0.91));
        let state = state_with_limit(diagnoser.clone(), dir.path(), 16);

        let upload = multipart("file", "leaf.png", &[7u8; 64]).await;
        let err = predict(State(state), upload).await.unwrap_err();
        assert!(matches!(err, UploadError::TooLarge { limit: 16 }));

        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await?;
        let body: Value = serde_json::from_slice(&bytes)?;
        assert_eq!(body["error"], "File too large (max 16 bytes)");

        assert_eq!(diagnoser.calls(), 0);
        assert_eq!(std::fs::read_dir(dir.path())?.count(), 0);
        Ok(())
    }
}
