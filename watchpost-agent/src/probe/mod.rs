//! Target checkers
//!
//! Performs one liveness probe per call:
//! - Local process: `ps -eo pid=,args=` (or `sysinfo`) lookup, healthy if at least one match
//! - TCP socket: short-lived connect
//! - HTTP endpoint: GET, healthy only on status 200
//!
//! A probe that cannot run (spawn failure, DNS error, timeout...) marks the
//! target unhealthy; it never stops the monitor.

pub mod lines;
pub mod network;
pub mod process;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::time::Duration;
use tracing::{info, warn};

use crate::config::ProcessSource;
use crate::target::{CheckOutcome, Target};

pub use lines::{count_lines, LineCounter};

#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    #[error("failed to start process listing: {0}")]
    Spawn(#[source] std::io::Error),
    #[error("process listing produced no output handle")]
    MissingOutput,
    #[error("process listing exited with status {0:?}")]
    ExitStatus(Option<i32>),
    #[error("probe timed out after {0:?}")]
    Timeout(Duration),
    #[error("unable to open socket {address}: {source}")]
    Connect {
        address: String,
        #[source]
        source: std::io::Error,
    },
    #[error("http request failed: {0}")]
    Http(#[source] reqwest::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("probe task failed: {0}")]
    Task(String),
}

/// Single liveness probe for one target
#[async_trait]
pub trait Checker: Send + Sync {
    async fn check(&self, target: &Target) -> CheckOutcome;
}

/// Checker backed by real OS processes, sockets and HTTP calls
#[derive(Debug, Clone)]
pub struct TargetChecker {
    http: Client,
    timeout: Duration,
    process_source: ProcessSource,
}

impl TargetChecker {
    pub fn new(timeout: Duration, process_source: ProcessSource) -> Result<Self, ProbeError> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(ProbeError::Http)?;

        Ok(Self {
            http,
            timeout,
            process_source,
        })
    }

    async fn check_local_process(&self, name: &str) -> Result<bool, ProbeError> {
        info!("Checking for process {}", name);

        let count = process::count_processes(name, self.process_source, self.timeout).await?;
        if count == 0 {
            warn!("No process {} found running", name);
            return Ok(false);
        }

        info!("Process {} running ({} match(es))", name, count);
        Ok(true)
    }

    async fn check_tcp_socket(&self, address: &str) -> Result<bool, ProbeError> {
        info!("Checking for tcp socket {}", address);

        network::tcp_reachable(address, self.timeout).await?;

        info!("Successful connection to {}", address);
        Ok(true)
    }

    async fn check_http_endpoint(&self, url: &str) -> Result<bool, ProbeError> {
        info!("Checking http endpoint {}", url);

        let status = network::http_status(&self.http, url).await?;
        if status != StatusCode::OK {
            warn!("Non 200 status from {} - {}", url, status);
            return Ok(false);
        }

        info!("{} returns 200 OK", url);
        Ok(true)
    }
}

#[async_trait]
impl Checker for TargetChecker {
    async fn check(&self, target: &Target) -> CheckOutcome {
        let result = match target {
            Target::LocalProcess(name) => self.check_local_process(name).await,
            Target::TcpSocket(address) => self.check_tcp_socket(address).await,
            Target::HttpEndpoint(url) => self.check_http_endpoint(url).await,
        };

        match result {
            Ok(healthy) => CheckOutcome::new(target.clone(), healthy),
            Err(e) => {
                warn!("Error checking {} {}: {}", target.kind(), target, e);
                CheckOutcome::Unhealthy(target.clone())
            }
        }
    }
}
