//! Timeouts and logging.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Upper bound for joining a room (socket open plus roster snapshot).
    pub connect_secs: u32,
    /// Upper bound for both sides to confirm they stopped on leave.
    pub leave_secs: u32,
    pub http_connect_secs: u32,
    pub http_request_secs: u32,
    /// WebSocket ping interval; 0 disables pings.
    pub ping_interval_secs: u32,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_secs: 90,
            leave_secs: 10,
            http_connect_secs: 10,
            http_request_secs: 30,
            ping_interval_secs: 30,
        }
    }
}

/// Log level.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
#[derive(Default)]
pub enum LogLevel {
    Debug,
    #[default]
    Info,
    Warning,
    Error,
}

impl LogLevel {
    /// Directive for `tracing_subscriber::EnvFilter`.
    pub fn as_directive(&self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warning => "warn",
            Self::Error => "error",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: LogLevel,
}
