// crates/rest/src/lib.rs
//! REST implementation of the core's [`JobTransport`].
//!
//! One client serves every job kind through the kind-scoped path scheme:
//!
//! ```text
//! POST {base}/api/{kind}/start           -> { jobId, message? }
//! GET  {base}/api/{kind}/status/{jobId}  -> { jobId?, status, progress?, ... }
//! ```
//!
//! Non-success responses carry the backend's `{ error, details? }` body;
//! both fields fold into [`TransportError::Rejected`]. Everything that
//! never produced a decoded answer is [`TransportError::Network`], which
//! the core treats as retriable.

mod wire;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;

use showrunner_core::{JobTransport, StartReceipt, TransportError, TransportResult};
use showrunner_types::{JobId, JobKind, JobSnapshot};

/// HTTP transport for the generation backend.
#[derive(Debug, Clone)]
pub struct RestTransport {
    http: Client,
    base_url: String,
}

impl RestTransport {
    /// Create a transport with a default client. `base_url` is the backend
    /// origin, with or without a trailing slash.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(Client::new(), base_url)
    }

    /// Create with a caller-configured client (timeouts, proxies).
    pub fn with_client(http: Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { http, base_url }
    }

    fn start_url(&self, kind: JobKind) -> String {
        format!("{}/api/{}/start", self.base_url, kind.as_str())
    }

    fn status_url(&self, kind: JobKind, job_id: &JobId) -> String {
        format!("{}/api/{}/status/{}", self.base_url, kind.as_str(), job_id)
    }
}

#[async_trait]
impl JobTransport for RestTransport {
    async fn start(&self, kind: JobKind, params: &Value) -> TransportResult<StartReceipt> {
        let response = self
            .http
            .post(self.start_url(kind))
            .json(params)
            .send()
            .await
            .map_err(|e| TransportError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(wire::rejection(status.as_u16(), response).await);
        }

        let body: wire::StartResponse = response
            .json()
            .await
            .map_err(|e| TransportError::Network(format!("decoding start response: {e}")))?;
        tracing::debug!(kind = %kind, job_id = %body.job_id, "start accepted");
        Ok(body.into_receipt())
    }

    async fn fetch_status(&self, kind: JobKind, job_id: &JobId) -> TransportResult<JobSnapshot> {
        let response = self
            .http
            .get(self.status_url(kind, job_id))
            .send()
            .await
            .map_err(|e| TransportError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(wire::rejection(status.as_u16(), response).await);
        }

        let body: wire::StatusResponse = response
            .json()
            .await
            .map_err(|e| TransportError::Network(format!("decoding status response: {e}")))?;
        Ok(body.into_snapshot(job_id))
    }
}
