// crates/core/src/orchestrator.rs
//! Facade the UI collaborators call.
//!
//! Owns the injected registry, playback arbiter, and transport, plus the
//! poll handle for every occupied slot. Handles are tracked per (kind, key)
//! in a map rather than captured in task closures, so a restart can always
//! reach and cancel the previous invocation before claiming the slot.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use serde_json::Value;
use tokio::sync::{broadcast, watch};
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::{Stream, StreamExt};
use tracing::{debug, info, warn};

use showrunner_types::{JobEvent, JobKey, JobKind, JobSnapshot, PlayerId};

use crate::config::OrchestratorConfig;
use crate::playback::PlaybackArbiter;
use crate::poller::{self, PollHandle};
use crate::registry::JobRegistry;
use crate::transport::JobTransport;

/// Live poll handles per occupied slot, shared with in-flight start tasks.
type HandleMap = Arc<Mutex<HashMap<(JobKind, JobKey), PollHandle>>>;

/// Entry point for starting, watching, and cancelling generation jobs.
///
/// Thread-safe via `Arc` wrapping; `start_job` is fire-and-forget and all
/// results flow back through registry subscriptions.
pub struct Orchestrator {
    registry: Arc<JobRegistry>,
    arbiter: Arc<PlaybackArbiter>,
    transport: Arc<dyn JobTransport>,
    config: OrchestratorConfig,
    handles: HandleMap,
}

impl Orchestrator {
    /// Create an orchestrator over externally-owned state containers.
    pub fn new(
        registry: Arc<JobRegistry>,
        arbiter: Arc<PlaybackArbiter>,
        transport: Arc<dyn JobTransport>,
        config: OrchestratorConfig,
    ) -> Arc<Self> {
        Arc::new(Self {
            registry,
            arbiter,
            transport,
            config,
            handles: Arc::new(Mutex::new(HashMap::new())),
        })
    }

    /// Create with fresh registry and arbiter (the common wiring).
    pub fn with_transport(transport: Arc<dyn JobTransport>, config: OrchestratorConfig) -> Arc<Self> {
        Self::new(
            Arc::new(JobRegistry::new()),
            Arc::new(PlaybackArbiter::new()),
            transport,
            config,
        )
    }

    /// Start (or restart) the job occupying `(kind, key)`.
    ///
    /// Synchronously: cancels any previous invocation's poller and installs
    /// an optimistic `Pending` snapshot, so the UI reflects the request
    /// before any network round trip. The start request itself runs on a
    /// spawned task; its outcome arrives through the registry like every
    /// other update.
    pub fn start_job(&self, kind: JobKind, key: JobKey, params: Value) {
        let ticket = {
            let mut handles = match self.handles.lock() {
                Ok(handles) => handles,
                Err(e) => {
                    tracing::error!("Mutex poisoned writing handle map: {e}");
                    return;
                }
            };
            if let Some(old) = handles.remove(&(kind, key.clone())) {
                debug!(kind = %kind, key = %key, old_job_id = %old.job_id(), "superseding previous invocation");
                old.cancel();
            }
            self.registry
                .open(kind, &key, JobSnapshot::pending("starting"))
        };
        info!(kind = %kind, key = %key, "job start requested");

        let registry = Arc::clone(&self.registry);
        let transport = Arc::clone(&self.transport);
        let handles = Arc::clone(&self.handles);
        let config = self.config.clone();
        tokio::spawn(async move {
            run_start(registry, transport, handles, config, kind, key, ticket, params).await;
        });
    }

    /// Start a singleton-kind job (`Digest`, `NetworkSearch`) on its fixed
    /// process-wide key.
    pub fn start_singleton(&self, kind: JobKind, params: Value) {
        self.start_job(kind, JobKey::singleton(), params);
    }

    /// Stop polling and clear the key's slot. Subscribers observe `None`.
    pub fn cancel_job(&self, kind: JobKind, key: &JobKey) {
        match self.handles.lock() {
            Ok(mut handles) => {
                if let Some(handle) = handles.remove(&(kind, key.clone())) {
                    handle.cancel();
                }
            }
            Err(e) => tracing::error!("Mutex poisoned writing handle map: {e}"),
        }
        if self.registry.remove(kind, key) {
            info!(kind = %kind, key = %key, "job cancelled");
        }
    }

    /// Latest snapshot for a key, if any.
    pub fn snapshot(&self, kind: JobKind, key: &JobKey) -> Option<JobSnapshot> {
        self.registry.get(kind, key)
    }

    /// Whether the key holds a claimed, non-terminal job.
    pub fn is_live(&self, kind: JobKind, key: &JobKey) -> bool {
        self.registry.is_live(kind, key)
    }

    /// Latest-value subscription for one key. Dropping the receiver is the
    /// unsubscribe.
    pub fn subscribe(&self, kind: JobKind, key: &JobKey) -> watch::Receiver<Option<JobSnapshot>> {
        self.registry.subscribe(kind, key)
    }

    /// Raw subscription to the flattened all-keys event feed.
    pub fn events(&self) -> broadcast::Receiver<JobEvent> {
        self.registry.events()
    }

    /// The event feed as a `Stream`, with lagged gaps silently skipped.
    pub fn event_stream(&self) -> impl Stream<Item = JobEvent> {
        BroadcastStream::new(self.registry.events()).filter_map(|event| event.ok())
    }

    // ── Playback proxies ─────────────────────────────────────────────────

    /// Make `player` the single active playback surface.
    pub fn activate_player(&self, player: PlayerId) {
        self.arbiter.activate(player);
    }

    /// Pause all playback surfaces.
    pub fn clear_playback(&self) {
        self.arbiter.clear();
    }

    pub fn active_player(&self) -> Option<PlayerId> {
        self.arbiter.active()
    }

    /// Latest-value subscription to the active player.
    pub fn watch_player(&self) -> watch::Receiver<Option<PlayerId>> {
        self.arbiter.subscribe()
    }
}

/// Confirm-or-reject task behind one `start_job` call.
#[allow(clippy::too_many_arguments)]
async fn run_start(
    registry: Arc<JobRegistry>,
    transport: Arc<dyn JobTransport>,
    handles: HandleMap,
    config: OrchestratorConfig,
    kind: JobKind,
    key: JobKey,
    ticket: u64,
    params: Value,
) {
    match transport.start(kind, &params).await {
        Ok(receipt) => {
            let mut handles = match handles.lock() {
                Ok(handles) => handles,
                Err(e) => {
                    tracing::error!("Mutex poisoned writing handle map: {e}");
                    return;
                }
            };
            let snapshot = JobSnapshot::confirmed(receipt.job_id.clone(), receipt.message.clone());
            if !registry.confirm(kind, &key, ticket, receipt.job_id.clone(), snapshot) {
                // Superseded while the start request was in flight. The
                // winning invocation owns the slot; stay silent.
                return;
            }
            info!(kind = %kind, key = %key, job_id = %receipt.job_id, "job confirmed; polling");
            let handle = poller::spawn_status_poller(
                Arc::clone(&registry),
                Arc::clone(&transport),
                kind,
                key.clone(),
                receipt.job_id,
                &config,
            );
            handles.insert((kind, key), handle);
        }
        Err(e) => {
            warn!(kind = %kind, key = %key, error = %e, "start request failed");
            registry.reject(kind, &key, ticket, JobSnapshot::failed(None, e.to_string()));
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use showrunner_types::{JobId, Phase};
    use tokio::time;

    use super::*;
    use crate::error::{TransportError, TransportResult};
    use crate::transport::StartReceipt;

    /// Transport with scripted start and status responses.
    struct FakeTransport {
        starts: Mutex<VecDeque<TransportResult<StartReceipt>>>,
        statuses: Mutex<VecDeque<TransportResult<JobSnapshot>>>,
        status_calls: AtomicUsize,
    }

    impl FakeTransport {
        fn new(
            starts: Vec<TransportResult<StartReceipt>>,
            statuses: Vec<TransportResult<JobSnapshot>>,
        ) -> Arc<Self> {
            Arc::new(Self {
                starts: Mutex::new(starts.into()),
                statuses: Mutex::new(statuses.into()),
                status_calls: AtomicUsize::new(0),
            })
        }

        fn status_calls(&self) -> usize {
            self.status_calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl JobTransport for FakeTransport {
        async fn start(&self, _kind: JobKind, _params: &Value) -> TransportResult<StartReceipt> {
            self.starts
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(TransportError::Network("no start scripted".to_string())))
        }

        async fn fetch_status(
            &self,
            _kind: JobKind,
            _job_id: &JobId,
        ) -> TransportResult<JobSnapshot> {
            self.status_calls.fetch_add(1, Ordering::SeqCst);
            self.statuses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(TransportError::Network("no status scripted".to_string())))
        }
    }

    fn receipt(job_id: &str, message: &str) -> TransportResult<StartReceipt> {
        Ok(StartReceipt {
            job_id: JobId::new(job_id),
            message: message.to_string(),
        })
    }

    fn processing(job_id: &str, progress: u8) -> TransportResult<JobSnapshot> {
        Ok(JobSnapshot {
            phase: Phase::Processing("rendering".to_string()),
            progress,
            ..JobSnapshot::confirmed(JobId::new(job_id), "rendering")
        })
    }

    fn completed(job_id: &str) -> TransportResult<JobSnapshot> {
        Ok(JobSnapshot {
            phase: Phase::Completed,
            progress: 100,
            result: Some(json!({"videoUrl": "https://cdn.example/v.mp4"})),
            ..JobSnapshot::confirmed(JobId::new(job_id), "done")
        })
    }

    fn config() -> OrchestratorConfig {
        OrchestratorConfig {
            poll_interval: Duration::from_secs(2),
            max_job_duration: None,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_optimistic_snapshot_lands_synchronously() {
        let transport = FakeTransport::new(vec![receipt("d-1", "queued")], vec![]);
        let orchestrator = Orchestrator::with_transport(transport, config());
        let key = JobKey::new("c-1");

        orchestrator.start_job(JobKind::Debate, key.clone(), json!({"conflictId": "c-1"}));

        // No await between start_job and this read.
        let snapshot = orchestrator.snapshot(JobKind::Debate, &key).unwrap();
        assert_eq!(snapshot.phase, Phase::Pending);
        assert_eq!(snapshot.job_id, None);
        assert!(orchestrator.is_live(JobKind::Debate, &key));
    }

    #[tokio::test(start_paused = true)]
    async fn test_happy_path_confirms_polls_and_completes() {
        let transport = FakeTransport::new(
            vec![receipt("d-1", "queued for generation")],
            vec![processing("d-1", 40), completed("d-1")],
        );
        let orchestrator = Orchestrator::with_transport(transport.clone(), config());
        let key = JobKey::new("c-1");

        orchestrator.start_job(JobKind::Debate, key.clone(), json!({"conflictId": "c-1"}));

        time::sleep(Duration::from_millis(100)).await;
        let snapshot = orchestrator.snapshot(JobKind::Debate, &key).unwrap();
        assert_eq!(snapshot.job_id, Some(JobId::new("d-1")));
        assert_eq!(snapshot.progress, 40);

        time::sleep(Duration::from_secs(2)).await;
        let snapshot = orchestrator.snapshot(JobKind::Debate, &key).unwrap();
        assert_eq!(snapshot.phase, Phase::Completed);
        assert_eq!(
            snapshot.result,
            Some(json!({"videoUrl": "https://cdn.example/v.mp4"}))
        );
        assert!(!orchestrator.is_live(JobKind::Debate, &key));

        // Polling stopped at the terminal snapshot.
        time::sleep(Duration::from_secs(10)).await;
        assert_eq!(transport.status_calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_failure_writes_terminal_error_and_never_polls() {
        let transport = FakeTransport::new(
            vec![Err(TransportError::Rejected {
                status: 422,
                detail: "conflict not found".to_string(),
            })],
            vec![],
        );
        let orchestrator = Orchestrator::with_transport(transport.clone(), config());
        let key = JobKey::new("c-404");

        orchestrator.start_job(JobKind::Debate, key.clone(), json!({}));
        time::sleep(Duration::from_millis(100)).await;

        let snapshot = orchestrator.snapshot(JobKind::Debate, &key).unwrap();
        assert_eq!(snapshot.phase, Phase::Error);
        assert!(snapshot
            .error_detail
            .as_deref()
            .unwrap()
            .contains("conflict not found"));
        assert!(!orchestrator.is_live(JobKind::Debate, &key));

        time::sleep(Duration::from_secs(10)).await;
        assert_eq!(transport.status_calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_job_stops_polling_and_clears_slot() {
        let transport = FakeTransport::new(
            vec![receipt("d-5", "queued")],
            vec![
                processing("d-5", 10),
                processing("d-5", 20),
                processing("d-5", 30),
            ],
        );
        let orchestrator = Orchestrator::with_transport(transport.clone(), config());
        let key = JobKey::new("c-5");
        let mut updates = orchestrator.subscribe(JobKind::Debate, &key);

        orchestrator.start_job(JobKind::Debate, key.clone(), json!({}));
        time::sleep(Duration::from_secs(1)).await;
        assert_eq!(transport.status_calls(), 1);

        orchestrator.cancel_job(JobKind::Debate, &key);
        assert_eq!(orchestrator.snapshot(JobKind::Debate, &key), None);
        assert_eq!(*updates.borrow_and_update(), None);

        time::sleep(Duration::from_secs(10)).await;
        assert_eq!(transport.status_calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_singleton_start_uses_fixed_key() {
        let transport = FakeTransport::new(vec![receipt("g-1", "queued")], vec![]);
        let orchestrator = Orchestrator::with_transport(transport, config());

        orchestrator.start_singleton(JobKind::Digest, json!({"period": "weekly"}));

        assert!(orchestrator
            .snapshot(JobKind::Digest, &JobKey::singleton())
            .is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_while_terminal_reuses_slot() {
        let transport = FakeTransport::new(
            vec![
                Err(TransportError::Network("offline".to_string())),
                receipt("d-2", "queued"),
            ],
            vec![],
        );
        let orchestrator = Orchestrator::with_transport(transport, config());
        let key = JobKey::new("c-1");

        orchestrator.start_job(JobKind::Debate, key.clone(), json!({}));
        time::sleep(Duration::from_millis(100)).await;
        assert_eq!(
            orchestrator.snapshot(JobKind::Debate, &key).unwrap().phase,
            Phase::Error
        );

        // Terminal state does not block a fresh attempt on the same key.
        orchestrator.start_job(JobKind::Debate, key.clone(), json!({}));
        time::sleep(Duration::from_millis(100)).await;
        let snapshot = orchestrator.snapshot(JobKind::Debate, &key).unwrap();
        assert_eq!(snapshot.job_id, Some(JobId::new("d-2")));
        assert!(!snapshot.is_terminal());
    }

    #[tokio::test]
    async fn test_playback_proxies() {
        let transport = FakeTransport::new(vec![], vec![]);
        let orchestrator = Orchestrator::with_transport(transport, config());
        let mut player_rx = orchestrator.watch_player();

        orchestrator.activate_player(PlayerId::Main);
        assert_eq!(orchestrator.active_player(), Some(PlayerId::Main));
        player_rx.changed().await.unwrap();
        assert_eq!(*player_rx.borrow_and_update(), Some(PlayerId::Main));

        orchestrator.clear_playback();
        assert_eq!(orchestrator.active_player(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_event_stream_sees_lifecycle() {
        let transport = FakeTransport::new(
            vec![receipt("d-1", "queued")],
            vec![completed("d-1")],
        );
        let orchestrator = Orchestrator::with_transport(transport, config());
        let key = JobKey::new("c-1");
        let mut stream = Box::pin(orchestrator.event_stream());

        orchestrator.start_job(JobKind::Debate, key.clone(), json!({}));
        time::sleep(Duration::from_millis(100)).await;

        // Pending (open), confirmed, completed.
        let mut phases = Vec::new();
        for _ in 0..3 {
            match stream.next().await {
                Some(JobEvent::Updated { snapshot, .. }) => phases.push(snapshot.phase),
                other => panic!("expected Updated event, got {other:?}"),
            }
        }
        assert_eq!(
            phases,
            vec![
                Phase::Pending,
                Phase::Pending,
                Phase::Completed,
            ]
        );
    }
}
