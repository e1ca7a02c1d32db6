//! Failure channel consumer
//!
//! Drains check outcomes in arrival order. Every unhealthy outcome becomes
//! its own notification task, gated by the dedup cache, so a slow SMS call
//! never holds up the channel.

use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

use crate::dedup::DedupCache;
use crate::discovery::ServerIdentity;
use crate::notify::{Alert, Notifier};
use crate::target::{CheckOutcome, Target};

#[derive(Clone)]
pub struct Dispatcher {
    dedup: Arc<DedupCache>,
    notifier: Arc<dyn Notifier>,
    server: Arc<ServerIdentity>,
    tracker: TaskTracker,
}

impl Dispatcher {
    pub fn new(
        dedup: Arc<DedupCache>,
        notifier: Arc<dyn Notifier>,
        server: Arc<ServerIdentity>,
    ) -> Self {
        Self {
            dedup,
            notifier,
            server,
            tracker: TaskTracker::new(),
        }
    }

    /// Consume outcomes until every sender is dropped
    pub async fn run(&self, mut outcomes: mpsc::Receiver<CheckOutcome>) {
        while let Some(outcome) = outcomes.recv().await {
            self.handle(outcome);
        }
        debug!("Failure channel closed, dispatcher stopping");
    }

    /// Route one outcome; returns without waiting for delivery
    pub fn handle(&self, outcome: CheckOutcome) {
        match outcome {
            CheckOutcome::Healthy(target) => debug!("{} is healthy", target),
            CheckOutcome::Unhealthy(target) => {
                let dedup = Arc::clone(&self.dedup);
                let notifier = Arc::clone(&self.notifier);
                let server = Arc::clone(&self.server);

                self.tracker.spawn(async move {
                    notify_failure(target, &dedup, notifier.as_ref(), &server).await;
                });
            }
        }
    }

    /// Number of notification tasks still running
    pub fn in_flight(&self) -> usize {
        self.tracker.len()
    }

    /// Wait for every notification task spawned so far
    pub async fn drain(&self) {
        self.tracker.close();
        self.tracker.wait().await;
        self.tracker.reopen();
    }
}

async fn notify_failure(
    target: Target,
    dedup: &DedupCache,
    notifier: &dyn Notifier,
    server: &ServerIdentity,
) {
    let id = target.id();
    warn!("### ERROR: {} {} not running!", target.kind(), id);

    if !dedup.should_notify(&id) {
        info!("{} stored in cache, skipping", id);
        return;
    }

    let alert = Alert::new(&target, server);
    match notifier.notify(&alert).await {
        Ok(()) => info!("Notification sent for {}", id),
        Err(e) => error!("Failed to notify for {}: {}", id, e),
    }
}
