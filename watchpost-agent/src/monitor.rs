//! Monitor assembly
//!
//! Wires the pipeline from a validated configuration:
//! Scheduler → checks → failure channel → Dispatcher → DedupCache → Notifier
//!
//! Scheduler and dispatcher start together and run until the shutdown
//! future resolves; in-flight notifications are awaited before returning.

use anyhow::{Context, Result};
use std::future::Future;
use std::sync::Arc;
use tracing::info;

use crate::config::MonitorConfig;
use crate::dedup::{DedupCache, JANITOR_INTERVAL};
use crate::discovery::ServerIdentity;
use crate::dispatch::Dispatcher;
use crate::notify::{self, Notifier};
use crate::probe::{Checker, TargetChecker};
use crate::scheduler::{failure_channel, Scheduler};

pub struct Monitor {
    config: MonitorConfig,
    checker: Arc<dyn Checker>,
    notifier: Arc<dyn Notifier>,
    dedup: Arc<DedupCache>,
    server: Arc<ServerIdentity>,
}

impl Monitor {
    /// Build the production pipeline (real probes, configured notifier)
    pub fn new(config: MonitorConfig) -> Result<Self> {
        let checker = TargetChecker::new(config.check_timeout, config.process_source)
            .context("Failed to create target checker")?;
        let notifier = notify::from_config(&config).context("Failed to create notifier")?;
        let server = ServerIdentity::discover(&config.server_nice_name);

        Ok(Self::with_parts(config, Arc::new(checker), notifier, server))
    }

    /// Build from explicit collaborators
    pub fn with_parts(
        config: MonitorConfig,
        checker: Arc<dyn Checker>,
        notifier: Arc<dyn Notifier>,
        server: ServerIdentity,
    ) -> Self {
        let dedup = Arc::new(DedupCache::new(config.default_ttl));

        Self {
            config,
            checker,
            notifier,
            dedup,
            server: Arc::new(server),
        }
    }

    pub fn dedup(&self) -> &Arc<DedupCache> {
        &self.dedup
    }

    pub fn server(&self) -> &ServerIdentity {
        &self.server
    }

    /// Run until `shutdown` resolves
    pub async fn run_until<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        info!(
            "Watchpost running: {} target(s), check every {:?}, notification TTL {:?}",
            self.config.targets.len(),
            self.config.check_frequency,
            self.config.default_ttl
        );

        let (outcomes_tx, outcomes_rx) = failure_channel(self.config.targets.len());
        let mut scheduler = Scheduler::new(
            self.config.targets.clone(),
            Arc::clone(&self.checker),
            outcomes_tx,
            self.config.check_frequency,
        );
        let dispatcher = Dispatcher::new(
            Arc::clone(&self.dedup),
            Arc::clone(&self.notifier),
            Arc::clone(&self.server),
        );

        let janitor = self.dedup.spawn_janitor(JANITOR_INTERVAL);
        let consumer = {
            let dispatcher = dispatcher.clone();
            tokio::spawn(async move { dispatcher.run(outcomes_rx).await })
        };

        tokio::select! {
            _ = scheduler.run() => {}
            _ = shutdown => info!("Shutdown requested, stopping checks"),
        }

        // Dropping the scheduler closes the failure channel
        drop(scheduler);
        consumer.await.context("Dispatcher task failed")?;

        let pending = dispatcher.in_flight();
        if pending > 0 {
            info!("Waiting for {} notification(s) in flight", pending);
        }
        dispatcher.drain().await;
        janitor.abort();

        info!("Watchpost stopped");
        Ok(())
    }
}
