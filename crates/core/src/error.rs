// crates/core/src/error.rs
//! Error taxonomy for the orchestration core.

use thiserror::Error;

/// Failure of a single transport operation (start or status fetch).
///
/// The orchestrator maps these onto snapshot state rather than bubbling them
/// to callers: a failed start becomes a terminal error snapshot, a failed
/// status fetch is a skipped poll tick.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The server answered with a non-success status.
    #[error("request rejected ({status}): {detail}")]
    Rejected { status: u16, detail: String },
    /// No usable server answer (connect, TLS, timeout, body decode).
    /// Always retriable.
    #[error("transport failure: {0}")]
    Network(String),
}

pub type TransportResult<T> = Result<T, TransportError>;
