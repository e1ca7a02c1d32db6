//! Alert delivery
//!
//! - `MessageBirdNotifier`: SMS via the MessageBird REST API (form POST, basic auth)
//! - `LogNotifier`: used when no token is configured, alerts only go to the log
//!
//! A failed delivery is reported to the caller for logging; nothing here retries.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::ACCEPT;
use reqwest::{Client, StatusCode};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::{MessageBirdConfig, MonitorConfig};
use crate::discovery::ServerIdentity;
use crate::target::Target;

/// Username MessageBird expects alongside the access key
const BASIC_AUTH_USER: &str = "AccessKey";
const DELIVERY_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("failed to build http client: {0}")]
    Client(#[source] reqwest::Error),
    #[error("notification request failed: {0}")]
    Transport(#[source] reqwest::Error),
    #[error("notification rejected with status {status}: {body}")]
    Rejected { status: StatusCode, body: String },
}

/// One outbound alert for a target found down
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alert {
    pub target_id: String,
    pub server: String,
    pub raised_at: DateTime<Utc>,
}

impl Alert {
    pub fn new(target: &Target, server: &ServerIdentity) -> Self {
        Self {
            target_id: target.id(),
            server: server.to_string(),
            raised_at: Utc::now(),
        }
    }

    /// Plain-text message body
    pub fn body(&self) -> String {
        format!("📢 {} not running on server {}!", self.target_id, self.server)
    }
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, alert: &Alert) -> Result<(), NotifyError>;
}

/// SMS delivery through MessageBird
#[derive(Debug, Clone)]
pub struct MessageBirdNotifier {
    client: Client,
    settings: MessageBirdConfig,
}

impl MessageBirdNotifier {
    pub fn new(settings: MessageBirdConfig) -> Result<Self, NotifyError> {
        let client = Client::builder()
            .timeout(DELIVERY_TIMEOUT)
            .build()
            .map_err(NotifyError::Client)?;

        Ok(Self { client, settings })
    }
}

#[async_trait]
impl Notifier for MessageBirdNotifier {
    async fn notify(&self, alert: &Alert) -> Result<(), NotifyError> {
        let body = alert.body();
        let form = [
            ("recipients", self.settings.recipients.as_str()),
            ("originator", self.settings.sender.as_str()),
            ("body", body.as_str()),
        ];

        // `form` also sets Content-Type: application/x-www-form-urlencoded
        let response = self
            .client
            .post(&self.settings.endpoint)
            .basic_auth(BASIC_AUTH_USER, Some(&self.settings.token))
            .header(ACCEPT, "application/json")
            .form(&form)
            .send()
            .await
            .map_err(NotifyError::Transport)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(NotifyError::Rejected { status, body });
        }

        debug!("MessageBird accepted alert for {} ({})", alert.target_id, status);
        Ok(())
    }
}

/// Writes alerts to the log instead of sending them
#[derive(Debug, Clone, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, alert: &Alert) -> Result<(), NotifyError> {
        warn!("ALERT {} (raised {})", alert.body(), alert.raised_at.to_rfc3339());
        Ok(())
    }
}

/// Pick the notifier matching the configuration
pub fn from_config(config: &MonitorConfig) -> Result<Arc<dyn Notifier>, NotifyError> {
    match &config.message_bird {
        Some(settings) => Ok(Arc::new(MessageBirdNotifier::new(settings.clone())?)),
        None => {
            warn!("No messageBirdToken configured, alerts will only be logged");
            Ok(Arc::new(LogNotifier))
        }
    }
}
