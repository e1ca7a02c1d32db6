//! End-to-end pipeline tests against local stub services

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use watchpost_agent::notify;
use watchpost_agent::{
    failure_channel, CheckOutcome, Checker, DedupCache, Dispatcher, Monitor, MonitorConfig,
    Scheduler, ServerIdentity, Target, TargetChecker,
};
use watchpost_devkit::{
    closed_port, config_file, init_test_logging, monitor_yaml, wait_until, OpenPort, StatusCode,
    StubServer,
};

const ABSENT_PROCESS: &str = "watchpost-e2e-myproc";

struct Pipeline {
    scheduler: Scheduler,
    dispatcher: Dispatcher,
    outcomes: mpsc::Receiver<CheckOutcome>,
}

impl Pipeline {
    fn new(config: &MonitorConfig) -> Self {
        let checker: Arc<dyn Checker> =
            Arc::new(TargetChecker::new(config.check_timeout, config.process_source).unwrap());
        let notifier = notify::from_config(config).unwrap();
        let dedup = Arc::new(DedupCache::new(config.default_ttl));
        let server = Arc::new(ServerIdentity::placeholder(&config.server_nice_name));

        let (tx, outcomes) = failure_channel(config.targets.len());
        Self {
            scheduler: Scheduler::new(config.targets.clone(), checker, tx, config.check_frequency),
            dispatcher: Dispatcher::new(dedup, notifier, server),
            outcomes,
        }
    }

    /// Run one round, hand every outcome to the dispatcher and wait for
    /// deliveries; returns the unhealthy target ids in sorted order
    async fn round(&mut self) -> Vec<String> {
        self.scheduler.run_round().await;

        let mut failed = Vec::new();
        while let Ok(outcome) = self.outcomes.try_recv() {
            if !outcome.is_healthy() {
                failed.push(outcome.target().id());
            }
            self.dispatcher.handle(outcome);
        }
        self.dispatcher.drain().await;

        failed.sort();
        failed
    }
}

#[tokio::test]
async fn test_failures_notify_once_per_ttl_window() {
    init_test_logging();
    let stub = StubServer::start().await.unwrap();
    let tcp_target = format!("tcp://localhost:{}", closed_port().await.unwrap());
    let http_target = stub.health_url();

    let yaml = monitor_yaml(
        &[ABSENT_PROCESS, &tcp_target, &http_target],
        &stub.messages_url(),
        300,
    );
    let file = config_file(&yaml).unwrap();
    let config = MonitorConfig::load(file.path()).await.unwrap();
    let mut pipeline = Pipeline::new(&config);

    let mut expected = vec![ABSENT_PROCESS.to_string(), tcp_target.clone()];
    expected.sort();

    // first round: two failures, two SMS
    assert_eq!(pipeline.round().await, expected);
    assert_eq!(stub.message_count(), 2);

    let messages = stub.messages_mentioning(ABSENT_PROCESS);
    assert_eq!(messages.len(), 1);
    assert_eq!(
        messages[0].body,
        format!("📢 {ABSENT_PROCESS} not running on server devkit NIL with IP NIL!")
    );
    assert_eq!(messages[0].recipients, "31600000001");
    assert_eq!(messages[0].originator, "Watchpost");
    assert_eq!(messages[0].accept.as_deref(), Some("application/json"));
    assert_eq!(
        messages[0].content_type.as_deref(),
        Some("application/x-www-form-urlencoded")
    );
    assert!(messages[0]
        .authorization
        .as_deref()
        .is_some_and(|auth| auth.starts_with("Basic ")));

    // second round: same failures, suppressed by the cache
    assert_eq!(pipeline.round().await, expected);
    assert_eq!(stub.message_count(), 2);
}

#[tokio::test]
async fn test_recovered_endpoint_stops_failing() {
    let stub = StubServer::start().await.unwrap();
    let open = OpenPort::start().await.unwrap();
    let yaml = monitor_yaml(
        &[&open.target(), &stub.health_url(), &stub.url("/status/503")],
        &stub.messages_url(),
        300,
    );
    let config = MonitorConfig::from_yaml_str(&yaml).unwrap();
    let mut pipeline = Pipeline::new(&config);

    stub.set_health_status(StatusCode::INTERNAL_SERVER_ERROR);
    let failed = pipeline.round().await;
    assert_eq!(failed.len(), 2);
    assert!(failed.contains(&stub.health_url()));
    assert!(failed.contains(&stub.url("/status/503")));

    stub.set_health_status(StatusCode::OK);
    assert_eq!(pipeline.round().await, vec![stub.url("/status/503")]);
    assert_eq!(stub.message_count(), 2);
}

#[tokio::test]
async fn test_rejected_delivery_is_not_retried() {
    let stub = StubServer::start().await.unwrap();
    stub.set_gateway_status(StatusCode::UNAUTHORIZED);

    let tcp_target = format!("tcp://127.0.0.1:{}", closed_port().await.unwrap());
    let yaml = monitor_yaml(&[&tcp_target], &stub.messages_url(), 300);
    let config = MonitorConfig::from_yaml_str(&yaml).unwrap();
    let mut pipeline = Pipeline::new(&config);

    assert_eq!(pipeline.round().await, vec![tcp_target.clone()]);
    assert_eq!(pipeline.round().await, vec![tcp_target]);
    assert_eq!(stub.message_count(), 1);
}

#[tokio::test]
async fn test_monitor_runs_until_shutdown() {
    let stub = StubServer::start().await.unwrap();
    let tcp_target = format!("tcp://127.0.0.1:{}", closed_port().await.unwrap());
    let yaml = monitor_yaml(&[&tcp_target, &stub.health_url()], &stub.messages_url(), 300);
    let config = MonitorConfig::from_yaml_str(&yaml).unwrap();

    let monitor = Monitor::new(config).unwrap();
    let dedup = Arc::clone(monitor.dedup());
    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let handle = tokio::spawn(monitor.run_until(async {
        stop_rx.await.ok();
    }));

    assert!(wait_until(Duration::from_secs(5), || stub.message_count() == 1).await);

    // rounds keep running every second, the cache keeps them quiet
    tokio::time::sleep(Duration::from_millis(2500)).await;
    assert_eq!(stub.message_count(), 1);
    assert!(dedup.contains(&tcp_target));
    assert!(!dedup.contains(&stub.health_url()));

    stop_tx.send(()).unwrap();
    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("monitor did not stop")
        .unwrap()
        .unwrap();
}

#[tokio::test]
async fn test_every_target_reports_each_round() {
    let stub = StubServer::start().await.unwrap();
    let targets: Vec<String> = (0..8)
        .map(|i| stub.url(&format!("/status/{}", if i % 2 == 0 { 200 } else { 404 })))
        .collect();
    let refs: Vec<&str> = targets.iter().map(String::as_str).collect();
    let yaml = monitor_yaml(&refs, &stub.messages_url(), 300);
    let config = MonitorConfig::from_yaml_str(&yaml).unwrap();

    let mut pipeline = Pipeline::new(&config);
    let summary = pipeline.scheduler.run_round().await;
    assert_eq!(summary.checked, 8);
    assert_eq!(summary.unhealthy, 4);

    let mut received = 0;
    while let Ok(outcome) = pipeline.outcomes.try_recv() {
        assert!(config.targets.contains(outcome.target()));
        received += 1;
    }
    assert_eq!(received, 8);
    assert!(config.targets.contains(&Target::parse(&targets[1])));
}
