// crates/core/src/poller.rs
//! Cancellable status-polling loop, one per confirmed job.
//!
//! The loop fetches immediately, then once per configured interval, writing
//! each observation through the registry. It stops on the first of: a
//! terminal phase, cancellation, the max-duration cutoff, or a rejected
//! write (the invocation has been superseded and must go quiet).

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use showrunner_types::{JobId, JobKey, JobKind, JobSnapshot};

use crate::config::OrchestratorConfig;
use crate::registry::{JobRegistry, WriteOutcome};
use crate::transport::JobTransport;

/// Handle to one polling invocation.
///
/// Cancelling stops all future fetches for this invocation only; a newer
/// invocation polling the same key is untouched.
#[derive(Debug, Clone)]
pub struct PollHandle {
    job_id: JobId,
    token: CancellationToken,
}

impl PollHandle {
    pub fn job_id(&self) -> &JobId {
        &self.job_id
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

/// Spawn the polling loop for a confirmed job and return its handle.
///
/// The loop holds only what it needs; dropping the handle does not stop it.
/// It exits on its own once the registry stops accepting its writes.
pub fn spawn_status_poller(
    registry: Arc<JobRegistry>,
    transport: Arc<dyn JobTransport>,
    kind: JobKind,
    key: JobKey,
    job_id: JobId,
    config: &OrchestratorConfig,
) -> PollHandle {
    let token = CancellationToken::new();
    let handle = PollHandle {
        job_id: job_id.clone(),
        token: token.clone(),
    };
    let interval = config.poll_interval;
    let max_duration = config.max_job_duration;
    tokio::spawn(async move {
        poll_loop(
            registry,
            transport,
            kind,
            key,
            job_id,
            interval,
            max_duration,
            token,
        )
        .await;
    });
    handle
}

#[allow(clippy::too_many_arguments)]
async fn poll_loop(
    registry: Arc<JobRegistry>,
    transport: Arc<dyn JobTransport>,
    kind: JobKind,
    key: JobKey,
    job_id: JobId,
    interval: Duration,
    max_duration: Option<Duration>,
    token: CancellationToken,
) {
    let started = Instant::now();
    let mut ticker = time::interval(interval);
    // A slow fetch must not cause a burst of catch-up fetches afterwards.
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = token.cancelled() => {
                debug!(kind = %kind, key = %key, job_id = %job_id, "polling cancelled");
                return;
            }
            _ = ticker.tick() => {}
        }

        if let Some(limit) = max_duration {
            if started.elapsed() >= limit {
                warn!(
                    kind = %kind,
                    key = %key,
                    job_id = %job_id,
                    limit_secs = limit.as_secs(),
                    "job exceeded maximum duration; giving up"
                );
                let snapshot = JobSnapshot::failed(
                    Some(job_id.clone()),
                    format!("job exceeded maximum duration ({}s)", limit.as_secs()),
                );
                registry.record(kind, &key, &job_id, snapshot);
                return;
            }
        }

        let fetched = tokio::select! {
            _ = token.cancelled() => {
                debug!(kind = %kind, key = %key, job_id = %job_id, "polling cancelled mid-fetch");
                return;
            }
            result = transport.fetch_status(kind, &job_id) => result,
        };

        let snapshot = match fetched {
            Ok(snapshot) => snapshot,
            Err(e) => {
                // Fetch failures are transient by policy. Only a terminal
                // phase reported by the server ends the job.
                warn!(kind = %kind, key = %key, job_id = %job_id, error = %e, "status fetch failed; will retry");
                continue;
            }
        };

        let terminal = snapshot.is_terminal();
        match registry.record(kind, &key, &job_id, snapshot) {
            WriteOutcome::Accepted => {
                if terminal {
                    debug!(kind = %kind, key = %key, job_id = %job_id, "job reached terminal phase");
                    return;
                }
            }
            WriteOutcome::StaleOwner | WriteOutcome::AlreadyTerminal => {
                debug!(kind = %kind, key = %key, job_id = %job_id, "snapshot write rejected; stopping");
                return;
            }
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
