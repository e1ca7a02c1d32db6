//! Monitored targets and per-check outcomes
//!
//! A target is configured as a plain string and classified by prefix:
//! - `tcp://host:port`       → TCP socket
//! - `http://` / `https://`  → HTTP endpoint
//! - anything else           → local process name

use std::fmt;

const TCP_PREFIX: &str = "tcp://";

/// One monitored entity
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Target {
    LocalProcess(String),
    TcpSocket(String),
    HttpEndpoint(String),
}

impl Target {
    /// Classify a configured target string
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();

        if let Some(address) = raw.strip_prefix(TCP_PREFIX) {
            Target::TcpSocket(address.to_string())
        } else if raw.starts_with("http://") || raw.starts_with("https://") {
            Target::HttpEndpoint(raw.to_string())
        } else {
            Target::LocalProcess(raw.to_string())
        }
    }

    /// Identifier used for alerts and the dedup cache (the configured string)
    pub fn id(&self) -> String {
        match self {
            Target::LocalProcess(name) => name.clone(),
            Target::TcpSocket(address) => format!("{TCP_PREFIX}{address}"),
            Target::HttpEndpoint(url) => url.clone(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Target::LocalProcess(_) => "process",
            Target::TcpSocket(_) => "tcp socket",
            Target::HttpEndpoint(_) => "http endpoint",
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.id())
    }
}

/// Result of a single check, sent exactly once per target per round
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckOutcome {
    Healthy(Target),
    Unhealthy(Target),
}

impl CheckOutcome {
    pub fn new(target: Target, healthy: bool) -> Self {
        if healthy {
            CheckOutcome::Healthy(target)
        } else {
            CheckOutcome::Unhealthy(target)
        }
    }

    pub fn target(&self) -> &Target {
        match self {
            CheckOutcome::Healthy(target) | CheckOutcome::Unhealthy(target) => target,
        }
    }

    pub fn is_healthy(&self) -> bool {
        matches!(self, CheckOutcome::Healthy(_))
    }
}
