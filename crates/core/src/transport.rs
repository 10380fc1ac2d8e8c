// crates/core/src/transport.rs
//! Seam between the orchestration core and the HTTP layer.

use async_trait::async_trait;
use serde_json::Value;
use showrunner_types::{JobId, JobKind, JobSnapshot};

use crate::error::TransportResult;

/// Confirmation returned by a successful start request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartReceipt {
    /// The server-issued id all further status fetches use.
    pub job_id: JobId,
    /// The server's initial status message, shown until the first poll lands.
    pub message: String,
}

/// The two operations the core performs per job kind.
///
/// The core never constructs requests itself; the production implementation
/// lives in `showrunner-rest` and tests substitute scripted fakes.
#[async_trait]
pub trait JobTransport: Send + Sync + 'static {
    /// Ask the server to begin a job. The parameter payload is opaque here;
    /// each kind's start endpoint defines its own shape.
    async fn start(&self, kind: JobKind, params: &Value) -> TransportResult<StartReceipt>;

    /// Fetch the latest status snapshot for a running job.
    async fn fetch_status(&self, kind: JobKind, job_id: &JobId) -> TransportResult<JobSnapshot>;
}
