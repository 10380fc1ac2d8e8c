// crates/types/src/event.rs
//! Registry-wide job event feed.

use serde::Serialize;

use crate::job::{JobKey, JobKind, JobSnapshot};

/// Change notification emitted by the job registry.
///
/// Per-key subscribers see the same transitions through their watch channel;
/// this feed flattens every key into one stream so a status strip or logger
/// can observe all jobs without per-key wiring.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum JobEvent {
    /// A snapshot write was accepted for this key.
    Updated {
        kind: JobKind,
        key: JobKey,
        snapshot: JobSnapshot,
    },
    /// The key's slot was cleared (cancel or explicit dismissal).
    Removed { kind: JobKind, key: JobKey },
}

impl JobEvent {
    pub fn kind(&self) -> JobKind {
        match self {
            JobEvent::Updated { kind, .. } | JobEvent::Removed { kind, .. } => *kind,
        }
    }

    pub fn key(&self) -> &JobKey {
        match self {
            JobEvent::Updated { key, .. } | JobEvent::Removed { key, .. } => key,
        }
    }
}
