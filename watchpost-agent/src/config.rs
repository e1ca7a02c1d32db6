//! Monitor configuration
//!
//! Handles:
//! - YAML loading (`processes` list + `config` block)
//! - Camel-case and all-lowercase key spellings
//! - Validation of required fields and defaults for timing fields

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

use crate::target::Target;

pub const DEFAULT_CONFIG_PATH: &str = "/usr/local/etc/go-monitor.yml";
pub const DEFAULT_TTL_SECONDS: u64 = 30_000;
pub const DEFAULT_CHECK_FREQUENCY_SECONDS: u64 = 60;
pub const DEFAULT_CHECK_TIMEOUT_SECONDS: u64 = 10;
pub const MESSAGEBIRD_ENDPOINT: &str = "https://rest.messagebird.com/messages";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config file: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("we need to monitor at least one process")]
    NoTargets,
    #[error("target #{0} is blank")]
    BlankTarget(usize),
    #[error("messageBirdSender not set")]
    MissingSender,
    #[error("recipients list is empty")]
    MissingRecipients,
    #[error("serverNiceName empty")]
    MissingServerNiceName,
}

/// How local processes are looked up
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessSource {
    /// Scan `ps -eo pid=,args=` output
    #[default]
    Ps,
    /// Scan the process table in-process
    Sysinfo,
}

/// Recipients may be given as a comma separated string or as a list
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum Recipients {
    Joined(String),
    List(Vec<String>),
}

impl Recipients {
    fn normalize(self) -> String {
        let parts: Vec<String> = match self {
            Recipients::Joined(joined) => joined.split(',').map(str::to_string).collect(),
            Recipients::List(list) => list,
        };

        parts
            .iter()
            .map(|r| r.trim())
            .filter(|r| !r.is_empty())
            .collect::<Vec<_>>()
            .join(",")
    }
}

/// On-disk document, as written by operators
#[derive(Debug, Default, Deserialize)]
struct RawConfig {
    #[serde(default)]
    processes: Option<Vec<String>>,
    #[serde(default)]
    config: Option<RawSettings>,
}

#[derive(Debug, Default, Deserialize)]
struct RawSettings {
    #[serde(rename = "messageBirdToken", alias = "messagebirdtoken", default)]
    message_bird_token: Option<String>,
    #[serde(rename = "messageBirdSender", alias = "messagebirdsender", default)]
    message_bird_sender: Option<String>,
    #[serde(default)]
    recipients: Option<Recipients>,
    #[serde(
        rename = "defaultTTLSeconds",
        alias = "defaultttlseconds",
        alias = "defaultttl",
        default
    )]
    default_ttl_seconds: Option<u64>,
    #[serde(rename = "serverNiceName", alias = "servernicename", default)]
    server_nice_name: Option<String>,
    #[serde(rename = "checkFrequencySeconds", alias = "checkfrequencyseconds", default)]
    check_frequency_seconds: Option<u64>,
    #[serde(rename = "checkTimeoutSeconds", alias = "checktimeoutseconds", default)]
    check_timeout_seconds: Option<u64>,
    #[serde(rename = "processSource", alias = "processsource", default)]
    process_source: Option<ProcessSource>,
    #[serde(rename = "messageBirdEndpoint", alias = "messagebirdendpoint", default)]
    message_bird_endpoint: Option<String>,
}

/// MessageBird credentials, present only when a token is configured
#[derive(Debug, Clone)]
pub struct MessageBirdConfig {
    pub token: String,
    pub sender: String,
    pub recipients: String,
    pub endpoint: String,
}

/// Validated monitor configuration
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    pub targets: Vec<Target>,
    pub server_nice_name: String,
    pub default_ttl: Duration,
    pub check_frequency: Duration,
    pub check_timeout: Duration,
    pub process_source: ProcessSource,
    pub message_bird: Option<MessageBirdConfig>,
}

impl MonitorConfig {
    /// Load and validate a config file
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| ConfigError::Read {
                path: path.to_path_buf(),
                source,
            })?;

        debug!("Loaded config from {}", path.display());
        Self::from_yaml_str(&content)
    }

    /// Parse and validate a YAML document
    pub fn from_yaml_str(content: &str) -> Result<Self, ConfigError> {
        // An empty document deserializes to unit, not to an empty map
        let raw: RawConfig = if content.trim().is_empty() {
            RawConfig::default()
        } else {
            serde_yaml::from_str(content)?
        };

        raw.validate()
    }

    pub fn has_notifications(&self) -> bool {
        self.message_bird.is_some()
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn seconds_or(value: Option<u64>, default: u64) -> Duration {
    match value {
        Some(secs) if secs > 0 => Duration::from_secs(secs),
        _ => Duration::from_secs(default),
    }
}

impl RawConfig {
    fn validate(self) -> Result<MonitorConfig, ConfigError> {
        let processes = self.processes.unwrap_or_default();
        if processes.is_empty() {
            return Err(ConfigError::NoTargets);
        }

        let mut targets = Vec::with_capacity(processes.len());
        for (index, raw) in processes.iter().enumerate() {
            if raw.trim().is_empty() {
                return Err(ConfigError::BlankTarget(index));
            }
            targets.push(Target::parse(raw));
        }

        let settings = self.config.unwrap_or_default();

        let message_bird = match non_blank(settings.message_bird_token) {
            Some(token) => {
                let sender =
                    non_blank(settings.message_bird_sender).ok_or(ConfigError::MissingSender)?;
                let recipients = settings
                    .recipients
                    .map(Recipients::normalize)
                    .filter(|r| !r.is_empty())
                    .ok_or(ConfigError::MissingRecipients)?;
                let endpoint = non_blank(settings.message_bird_endpoint)
                    .unwrap_or_else(|| MESSAGEBIRD_ENDPOINT.to_string());

                Some(MessageBirdConfig {
                    token,
                    sender,
                    recipients,
                    endpoint,
                })
            }
            None => None,
        };

        let server_nice_name =
            non_blank(settings.server_nice_name).ok_or(ConfigError::MissingServerNiceName)?;

        Ok(MonitorConfig {
            targets,
            server_nice_name,
            default_ttl: seconds_or(settings.default_ttl_seconds, DEFAULT_TTL_SECONDS),
            check_frequency: seconds_or(
                settings.check_frequency_seconds,
                DEFAULT_CHECK_FREQUENCY_SECONDS,
            ),
            check_timeout: seconds_or(settings.check_timeout_seconds, DEFAULT_CHECK_TIMEOUT_SECONDS),
            process_source: settings.process_source.unwrap_or_default(),
            message_bird,
        })
    }
}
