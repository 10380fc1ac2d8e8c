// crates/core/src/config.rs
//! Orchestrator tuning knobs.

use std::time::Duration;

/// Cadence of status fetches for a live job.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Default ceiling on a single job's lifetime before the client gives up.
pub const DEFAULT_MAX_JOB_DURATION: Duration = Duration::from_secs(30 * 60);

/// Tuning for the orchestrator and its polling loops.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Delay between consecutive status fetches for one job.
    pub poll_interval: Duration,
    /// How long a job may stay non-terminal before its poller writes a
    /// terminal error and stops. `None` polls until the server answers.
    pub max_job_duration: Option<Duration>,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            max_job_duration: Some(DEFAULT_MAX_JOB_DURATION),
        }
    }
}
