// crates/rest/src/wire.rs
//! Wire DTOs and their mapping onto core types.

use chrono::Utc;
use serde::Deserialize;
use serde_json::Value;

use showrunner_core::{StartReceipt, TransportError};
use showrunner_types::{JobId, JobSnapshot, Phase};

/// Body of a successful start response.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct StartResponse {
    pub job_id: String,
    #[serde(default)]
    pub message: Option<String>,
}

impl StartResponse {
    pub fn into_receipt(self) -> StartReceipt {
        StartReceipt {
            job_id: JobId::new(self.job_id),
            message: self.message.unwrap_or_else(|| "queued".to_string()),
        }
    }
}

/// Body of a successful status response. Everything but `status` is
/// optional; backends fill fields in as the job progresses.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct StatusResponse {
    #[serde(default)]
    pub job_id: Option<String>,
    pub status: String,
    #[serde(default)]
    pub progress: Option<u64>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<String>,
}

impl StatusResponse {
    /// Reduce to a snapshot. `fallback_id` covers backends that omit the id
    /// from status bodies; the path already named it.
    pub fn into_snapshot(self, fallback_id: &JobId) -> JobSnapshot {
        let phase = Phase::from_stage(&self.status);
        let message = self
            .message
            .unwrap_or_else(|| phase.label().to_string());
        let error_detail = if phase == Phase::Error {
            self.error.or_else(|| Some(message.clone()))
        } else {
            None
        };
        JobSnapshot {
            job_id: Some(
                self.job_id
                    .map(JobId::new)
                    .unwrap_or_else(|| fallback_id.clone()),
            ),
            phase,
            progress: self.progress.unwrap_or(0).min(100) as u8,
            message,
            result: self.result,
            error_detail,
            updated_at: Utc::now(),
        }
    }
}

/// Error body used by the backend for non-success responses.
#[derive(Debug, Deserialize)]
pub(crate) struct ErrorBody {
    pub error: String,
    #[serde(default)]
    pub details: Option<String>,
}

/// Fold a non-success response into a `Rejected` error, tolerating bodies
/// that are not the structured shape.
pub(crate) async fn rejection(status: u16, response: reqwest::Response) -> TransportError {
    let detail = match response.json::<ErrorBody>().await {
        Ok(body) => match body.details {
            Some(details) => format!("{}: {}", body.error, details),
            None => body.error,
        },
        Err(_) => format!("HTTP {status}"),
    };
    TransportError::Rejected { status, detail }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    fn status_response(body: Value) -> StatusResponse {
        serde_json::from_value(body).unwrap()
    }

    #[test]
    fn test_start_response_defaults_message() {
        let body: StartResponse = serde_json::from_value(json!({"jobId": "d-1"})).unwrap();
        let receipt = body.into_receipt();
        assert_eq!(receipt.job_id, JobId::new("d-1"));
        assert_eq!(receipt.message, "queued");
    }

    #[test]
    fn test_status_maps_working_stage() {
        let snapshot = status_response(json!({
            "jobId": "d-1",
            "status": "generating_voiceover",
            "progress": 55,
            "message": "Generating voiceover"
        }))
        .into_snapshot(&JobId::new("d-1"));

        assert_eq!(
            snapshot.phase,
            Phase::Processing("generating_voiceover".to_string())
        );
        assert_eq!(snapshot.progress, 55);
        assert_eq!(snapshot.message, "Generating voiceover");
        assert_eq!(snapshot.error_detail, None);
    }

    #[test]
    fn test_status_clamps_progress() {
        let snapshot = status_response(json!({"status": "rendering", "progress": 250}))
            .into_snapshot(&JobId::new("d-1"));
        assert_eq!(snapshot.progress, 100);
    }

    #[test]
    fn test_status_without_id_uses_fallback() {
        let snapshot =
            status_response(json!({"status": "pending"})).into_snapshot(&JobId::new("w-9"));
        assert_eq!(snapshot.job_id, Some(JobId::new("w-9")));
        assert_eq!(snapshot.phase, Phase::Pending);
        // Message falls back to the phase label.
        assert_eq!(snapshot.message, "pending");
    }

    #[test]
    fn test_error_status_prefers_error_field() {
        let snapshot = status_response(json!({
            "jobId": "s-2",
            "status": "failed",
            "message": "Job failed",
            "error": "voice model unavailable"
        }))
        .into_snapshot(&JobId::new("s-2"));

        assert_eq!(snapshot.phase, Phase::Error);
        assert_eq!(
            snapshot.error_detail.as_deref(),
            Some("voice model unavailable")
        );
    }

    #[test]
    fn test_error_status_falls_back_to_message() {
        let snapshot = status_response(json!({"status": "error", "message": "it broke"}))
            .into_snapshot(&JobId::new("s-2"));
        assert_eq!(snapshot.error_detail.as_deref(), Some("it broke"));
    }

    #[test]
    fn test_completed_status_carries_result() {
        let snapshot = status_response(json!({
            "jobId": "d-1",
            "status": "completed",
            "progress": 100,
            "result": {"videoUrl": "https://cdn.example/v.mp4"}
        }))
        .into_snapshot(&JobId::new("d-1"));

        assert_eq!(snapshot.phase, Phase::Completed);
        assert_eq!(
            snapshot.result,
            Some(json!({"videoUrl": "https://cdn.example/v.mp4"}))
        );
    }
}
