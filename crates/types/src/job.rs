// crates/types/src/job.rs
//! Job identity and status types.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Parse failure for the fixed name sets ([`JobKind`], [`crate::PlayerId`]).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown name: {0}")]
pub struct UnknownName(pub String);

/// The kinds of server-side generation jobs the orchestrator tracks.
///
/// Each kind keys its jobs from its own namespace: `Debate` by conflict id,
/// `DirectorCut` by episode id, `Supercut` and `Webtoon` by entity name.
/// `Digest` and `NetworkSearch` occupy one process-wide slot each.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    Debate,
    DirectorCut,
    Supercut,
    Digest,
    NetworkSearch,
    Webtoon,
}

impl JobKind {
    pub const ALL: [JobKind; 6] = [
        JobKind::Debate,
        JobKind::DirectorCut,
        JobKind::Supercut,
        JobKind::Digest,
        JobKind::NetworkSearch,
        JobKind::Webtoon,
    ];

    /// Wire name, used in REST paths and log fields.
    pub fn as_str(&self) -> &'static str {
        match self {
            JobKind::Debate => "debate",
            JobKind::DirectorCut => "director_cut",
            JobKind::Supercut => "supercut",
            JobKind::Digest => "digest",
            JobKind::NetworkSearch => "network_search",
            JobKind::Webtoon => "webtoon",
        }
    }

    /// Whether this kind runs in a single process-wide slot instead of a
    /// per-key namespace.
    pub fn is_singleton(&self) -> bool {
        matches!(self, JobKind::Digest | JobKind::NetworkSearch)
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobKind {
    type Err = UnknownName;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        JobKind::ALL
            .iter()
            .copied()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| UnknownName(s.to_string()))
    }
}

/// A job's key within its kind's namespace (a conflict id for `Debate`, an
/// entity name for `Supercut`, ...). Singleton kinds use [`JobKey::singleton`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobKey(String);

impl JobKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// The fixed key used by singleton kinds (`Digest`, `NetworkSearch`).
    pub fn singleton() -> Self {
        Self("singleton".to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for JobKey {
    fn from(key: &str) -> Self {
        Self(key.to_string())
    }
}

impl From<String> for JobKey {
    fn from(key: String) -> Self {
        Self(key)
    }
}

impl fmt::Display for JobKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Server-issued job identifier. Opaque to this client.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for JobId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Macro-state of a job, reduced from the server's open-ended status strings.
///
/// The server reports any number of named working stages (`searching`,
/// `generating_voiceover`, ...); they all collapse into `Processing` here so
/// new server-side stages need no client change. `Completed` and `Error` are
/// terminal: once stored for a job they are never overwritten.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "stage", rename_all = "snake_case")]
pub enum Phase {
    Pending,
    Processing(String),
    Completed,
    Error,
}

impl Phase {
    /// Reduce a server status string to a phase.
    pub fn from_stage(stage: &str) -> Self {
        match stage {
            "completed" | "complete" | "done" => Phase::Completed,
            "error" | "failed" | "failure" => Phase::Error,
            "pending" | "queued" | "accepted" => Phase::Pending,
            other => Phase::Processing(other.to_string()),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Phase::Completed | Phase::Error)
    }

    /// Short name for logs and progress labels.
    pub fn label(&self) -> &str {
        match self {
            Phase::Pending => "pending",
            Phase::Processing(stage) => stage,
            Phase::Completed => "completed",
            Phase::Error => "error",
        }
    }
}

/// One observation of a job's progress.
///
/// The registry owns the canonical snapshot per key; collaborators only ever
/// hold clones obtained through `get` or a subscription.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobSnapshot {
    /// Server-issued id. `None` until the start request is confirmed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_id: Option<JobId>,
    pub phase: Phase,
    /// Completion percentage, clamped to 0..=100.
    pub progress: u8,
    /// Human-readable stage description, displayable as-is.
    pub message: String,
    /// Kind-specific completion payload (e.g. `{"videoUrl": ...}`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    /// Failure detail for terminal `Error` snapshots.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_detail: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl JobSnapshot {
    /// The optimistic snapshot installed synchronously by a start request,
    /// before any network round trip.
    pub fn pending(message: impl Into<String>) -> Self {
        Self {
            job_id: None,
            phase: Phase::Pending,
            progress: 0,
            message: message.into(),
            result: None,
            error_detail: None,
            updated_at: Utc::now(),
        }
    }

    /// First snapshot carrying the server-issued id, written when the start
    /// response arrives.
    pub fn confirmed(job_id: JobId, message: impl Into<String>) -> Self {
        Self {
            job_id: Some(job_id),
            ..Self::pending(message)
        }
    }

    /// Terminal error snapshot. Used for start failures (no id yet) and for
    /// client-side give-ups such as the max-duration cutoff.
    pub fn failed(job_id: Option<JobId>, detail: impl Into<String>) -> Self {
        let detail = detail.into();
        Self {
            job_id,
            phase: Phase::Error,
            progress: 0,
            message: detail.clone(),
            result: None,
            error_detail: Some(detail),
            updated_at: Utc::now(),
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.phase.is_terminal()
    }
}

// =============================================================================
// Tests
// =============================================================================
