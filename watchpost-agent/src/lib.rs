//! Watchpost - liveness monitor for processes, TCP sockets and HTTP endpoints
//!
//! Periodically checks every configured target and sends a deduplicated
//! alert when one is found down:
//! - Concurrent per-round checks with a join barrier
//! - Tagged outcomes on a bounded failure channel
//! - TTL cache suppressing repeat alerts for a still-failing target
//! - SMS delivery through MessageBird

pub mod config;
pub mod dedup;
pub mod discovery;
pub mod dispatch;
pub mod monitor;
pub mod notify;
pub mod probe;
pub mod scheduler;
pub mod target;

pub use config::{ConfigError, MonitorConfig, ProcessSource};
pub use dedup::DedupCache;
pub use discovery::ServerIdentity;
pub use dispatch::Dispatcher;
pub use monitor::Monitor;
pub use notify::{Alert, LogNotifier, MessageBirdNotifier, Notifier, NotifyError};
pub use probe::{Checker, ProbeError, TargetChecker};
pub use scheduler::{failure_channel, RoundSummary, Scheduler, SchedulerState};
pub use target::{CheckOutcome, Target};
