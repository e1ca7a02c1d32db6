//! Check scheduling
//!
//! Each round spawns one check per target into a `JoinSet`, waits for all of
//! them (the round barrier), then sleeps for the check frequency. Rounds
//! never overlap. Every check sends exactly one `CheckOutcome` on the
//! failure channel, which is sized to the number of targets.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, error, info};

use crate::probe::Checker;
use crate::target::{CheckOutcome, Target};

/// Bounded channel carrying one outcome per check
pub fn failure_channel(
    target_count: usize,
) -> (mpsc::Sender<CheckOutcome>, mpsc::Receiver<CheckOutcome>) {
    mpsc::channel(target_count.max(1))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    RunningBatch,
    Sleeping,
}

/// Summary of one completed round
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoundSummary {
    pub round: u64,
    pub checked: usize,
    pub unhealthy: usize,
}

pub struct Scheduler {
    targets: Arc<[Target]>,
    checker: Arc<dyn Checker>,
    outcomes: mpsc::Sender<CheckOutcome>,
    frequency: Duration,
    state: SchedulerState,
    rounds: u64,
}

impl Scheduler {
    pub fn new(
        targets: Vec<Target>,
        checker: Arc<dyn Checker>,
        outcomes: mpsc::Sender<CheckOutcome>,
        frequency: Duration,
    ) -> Self {
        Self {
            targets: targets.into(),
            checker,
            outcomes,
            frequency,
            state: SchedulerState::Sleeping,
            rounds: 0,
        }
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    pub fn rounds(&self) -> u64 {
        self.rounds
    }

    /// Check every target once and wait for all checks to report
    pub async fn run_round(&mut self) -> RoundSummary {
        self.state = SchedulerState::RunningBatch;
        self.rounds += 1;
        debug!("Round {} started for {} target(s)", self.rounds, self.targets.len());

        let mut batch = JoinSet::new();
        for target in self.targets.iter().cloned() {
            let checker = Arc::clone(&self.checker);
            let outcomes = self.outcomes.clone();

            batch.spawn(async move {
                let outcome = checker.check(&target).await;
                let healthy = outcome.is_healthy();
                if outcomes.send(outcome).await.is_err() {
                    error!("Failure channel closed, dropping outcome for {}", target);
                }
                healthy
            });
        }

        let mut summary = RoundSummary {
            round: self.rounds,
            checked: 0,
            unhealthy: 0,
        };
        while let Some(result) = batch.join_next().await {
            match result {
                Ok(healthy) => {
                    summary.checked += 1;
                    if !healthy {
                        summary.unhealthy += 1;
                    }
                }
                Err(e) => error!("Check task failed: {}", e),
            }
        }

        info!(
            "Round {} complete: {} checked, {} unhealthy",
            summary.round, summary.checked, summary.unhealthy
        );
        summary
    }

    /// Alternate rounds and sleeps forever
    pub async fn run(&mut self) {
        info!(
            "Starting scheduler: {} target(s) every {:?}",
            self.targets.len(),
            self.frequency
        );

        loop {
            self.run_round().await;

            self.state = SchedulerState::Sleeping;
            tokio::time::sleep(self.frequency).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use parking_lot::Mutex;

    /// Reports targets whose name starts with "down" as unhealthy after a
    /// per-target delay encoded in the name ("<state>-<millis>")
    struct DelayedChecker {
        started: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Checker for DelayedChecker {
        async fn check(&self, target: &Target) -> CheckOutcome {
            let id = target.id();
            self.started.lock().push(id.clone());

            let millis = id
                .rsplit('-')
                .next()
                .and_then(|m| m.parse::<u64>().ok())
                .unwrap_or(0);
            tokio::time::sleep(Duration::from_millis(millis)).await;

            CheckOutcome::new(target.clone(), !id.starts_with("down"))
        }
    }

    fn targets(names: &[&str]) -> Vec<Target> {
        names.iter().map(|n| Target::parse(n)).collect()
    }

    #[tokio::test(start_paused = true)]
    async fn test_round_waits_for_every_check() {
        let names = ["up-300", "down-10", "up-50", "down-200", "up-0"];
        let (tx, mut rx) = failure_channel(names.len());
        let checker = Arc::new(DelayedChecker {
            started: Mutex::new(Vec::new()),
        });
        let mut scheduler = Scheduler::new(targets(&names), checker.clone(), tx, Duration::from_secs(60));

        let summary = scheduler.run_round().await;
        assert_eq!(summary.checked, names.len());
        assert_eq!(summary.unhealthy, 2);
        assert_eq!(checker.started.lock().len(), names.len());

        // every outcome is already queued once the barrier returns
        let mut arrived = Vec::new();
        while let Ok(outcome) = rx.try_recv() {
            arrived.push(outcome.target().id());
        }
        // arrival follows completion order, not configuration order
        assert_eq!(arrived, vec!["up-0", "down-10", "up-50", "down-200", "up-300"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rounds_do_not_overlap() {
        let names = ["up-100", "down-500"];
        let (tx, mut rx) = failure_channel(names.len());
        let checker = Arc::new(DelayedChecker {
            started: Mutex::new(Vec::new()),
        });
        let mut scheduler = Scheduler::new(targets(&names), checker.clone(), tx, Duration::from_secs(1));

        let handle = tokio::spawn(async move {
            scheduler.run().await;
        });

        // first round ends at 500ms, the second starts after a 1s sleep
        tokio::time::sleep(Duration::from_millis(1200)).await;
        assert_eq!(checker.started.lock().len(), 2);

        tokio::time::sleep(Duration::from_millis(350)).await;
        assert_eq!(checker.started.lock().len(), 4);

        handle.abort();

        let mut received = 0;
        while rx.try_recv().is_ok() {
            received += 1;
        }
        assert_eq!(received, 2, "second round has not finished its slow check yet");
    }

    #[tokio::test]
    async fn test_state_transitions() {
        let (tx, _rx) = failure_channel(1);
        let checker = Arc::new(DelayedChecker {
            started: Mutex::new(Vec::new()),
        });
        let mut scheduler = Scheduler::new(targets(&["up-0"]), checker, tx, Duration::from_secs(60));
        assert_eq!(scheduler.state(), SchedulerState::Sleeping);

        scheduler.run_round().await;
        assert_eq!(scheduler.state(), SchedulerState::RunningBatch);
        assert_eq!(scheduler.rounds(), 1);
    }
}
