// crates/core/src/lib.rs
//! Job orchestration and playback-exclusivity core.
//!
//! The pieces, wired together by [`Orchestrator`]:
//!
//! - [`registry::JobRegistry`]: canonical snapshot per (kind, key) slot,
//!   with owner-token guards that drop stale writes from superseded jobs.
//! - [`poller::spawn_status_poller`]: one cancellable 2-second polling loop
//!   per confirmed job, feeding observations back through the registry.
//! - [`playback::PlaybackArbiter`]: single-active-player enforcement for
//!   the media surfaces that render finished jobs.
//! - [`transport::JobTransport`]: the seam to the HTTP layer; the core
//!   never builds requests itself.
//!
//! Everything is injected. Nothing here reaches for process-global state,
//! so tests run against throwaway registries and scripted transports.

pub mod config;
pub mod error;
pub mod orchestrator;
pub mod playback;
pub mod poller;
pub mod registry;
pub mod transport;

pub use config::OrchestratorConfig;
pub use error::{TransportError, TransportResult};
pub use orchestrator::Orchestrator;
pub use playback::{Pausable, PlaybackArbiter};
pub use poller::PollHandle;
pub use registry::{JobRegistry, WriteOutcome};
pub use transport::{JobTransport, StartReceipt};
