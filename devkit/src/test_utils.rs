/*!
Test helpers for Watchpost

- Logging setup that tolerates repeated initialisation
- Temporary YAML config files
- Closed / open TCP ports on localhost
- Polling until a condition holds or a timeout expires
*/

use anyhow::{Context, Result};
use std::io::Write;
use std::net::SocketAddr;
use std::time::Duration;
use tempfile::NamedTempFile;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// Install a test subscriber once; later calls are no-ops
pub fn init_test_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_test_writer()
        .try_init()
        .ok();
}

/// Write `yaml` to a temporary file that lives as long as the handle
pub fn config_file(yaml: &str) -> Result<NamedTempFile> {
    let mut file = NamedTempFile::new().context("Failed to create temp config")?;
    file.write_all(yaml.as_bytes())?;
    file.flush()?;
    Ok(file)
}

/// Build a config document for `targets` with notifications pointed at `gateway_url`
pub fn monitor_yaml(targets: &[&str], gateway_url: &str, ttl_seconds: u64) -> String {
    let mut yaml = String::from("processes:\n");
    for target in targets {
        yaml.push_str(&format!("  - \"{target}\"\n"));
    }
    yaml.push_str(&format!(
        "config:\n  messageBirdToken: \"test-token\"\n  messageBirdSender: \"Watchpost\"\n  recipients: \"31600000001\"\n  defaultTTLSeconds: {ttl_seconds}\n  serverNiceName: \"devkit\"\n  checkFrequencySeconds: 1\n  checkTimeoutSeconds: 2\n  messageBirdEndpoint: \"{gateway_url}\"\n"
    ));
    yaml
}

/// A localhost port with nothing listening on it
pub async fn closed_port() -> Result<u16> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let port = listener.local_addr()?.port();
    drop(listener);
    Ok(port)
}

/// Localhost listener accepting and immediately closing connections
pub struct OpenPort {
    addr: SocketAddr,
    handle: JoinHandle<()>,
}

impl OpenPort {
    pub async fn start() -> Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;

        let handle = tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                drop(stream);
            }
        });

        Ok(Self { addr, handle })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Target string for this port (`tcp://127.0.0.1:<port>`)
    pub fn target(&self) -> String {
        format!("tcp://{}", self.addr)
    }
}

impl Drop for OpenPort {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Poll `condition` every 20ms until it holds or `timeout` expires
pub async fn wait_until<F>(timeout: Duration, mut condition: F) -> bool
where
    F: FnMut() -> bool,
{
    let start = tokio::time::Instant::now();
    while start.elapsed() < timeout {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    condition()
}
