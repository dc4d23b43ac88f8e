//! Service configuration with TOML file support.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use sanka_types::params::DEFAULT_MAX_EVIDENCE_BYTES;
use sanka_types::{Points, PointsParams};

use crate::{LogFormat, ServiceError};

/// Configuration for a sanka service.
///
/// Can be loaded from a TOML file via [`ServiceConfig::from_toml_file`] or
/// built programmatically (e.g. for tests). Every field has a default.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Data directory for the JSON store and evidence uploads.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Address the HTTP API binds to.
    #[serde(default = "default_rpc_host")]
    pub rpc_host: String,

    #[serde(default = "default_rpc_port")]
    pub rpc_port: u16,

    /// Log format: "human" or "json".
    #[serde(default = "default_log_format")]
    pub log_format: String,

    /// Log level filter, e.g. "info" or "debug,sanka_node=trace".
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Points granted at registration.
    #[serde(default = "default_starting_balance")]
    pub starting_balance: u64,

    /// Points credited for an approved attendance verification.
    #[serde(default = "default_attendance_award")]
    pub attendance_award: u64,

    /// Largest evidence attachment accepted, in bytes.
    #[serde(default = "default_max_evidence_bytes")]
    pub max_evidence_bytes: usize,

    /// Upper bound on any single service operation.
    #[serde(default = "default_operation_timeout_ms")]
    pub operation_timeout_ms: u64,

    /// Upper bound on a Decision Service call.
    #[serde(default = "default_decision_timeout_ms")]
    pub decision_timeout_ms: u64,

    /// Reviewer endpoint. When unset, requests are logged for manual review.
    #[serde(default)]
    pub decision_webhook_url: Option<String>,

    /// Maximum number of operations executing at once.
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,
}

// ── Serde default helpers ──────────────────────────────────────────────

fn default_data_dir() -> PathBuf {
    PathBuf::from("./sanka_data")
}

fn default_rpc_host() -> String {
    "127.0.0.1".to_string()
}

fn default_rpc_port() -> u16 {
    5003
}

fn default_log_format() -> String {
    "human".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_starting_balance() -> u64 {
    20
}

fn default_attendance_award() -> u64 {
    10
}

fn default_max_evidence_bytes() -> usize {
    DEFAULT_MAX_EVIDENCE_BYTES
}

fn default_operation_timeout_ms() -> u64 {
    5_000
}

fn default_decision_timeout_ms() -> u64 {
    10_000
}

fn default_max_concurrent() -> usize {
    64
}

// ── Impl ───────────────────────────────────────────────────────────────

impl ServiceConfig {
    /// Load configuration from a TOML file.
    pub fn from_toml_file(path: &Path) -> Result<Self, ServiceError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ServiceError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml_str(s: &str) -> Result<Self, ServiceError> {
        let config: Self = toml::from_str(s).map_err(|e| ServiceError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize the configuration to a TOML string.
    pub fn to_toml_string(&self) -> Result<String, ServiceError> {
        toml::to_string_pretty(self).map_err(|e| ServiceError::Config(e.to_string()))
    }

    /// Reject values the service cannot run with.
    pub fn validate(&self) -> Result<(), ServiceError> {
        self.log_format()?;
        if self.max_concurrent == 0 {
            return Err(ServiceError::Config("max_concurrent must be at least 1".into()));
        }
        if self.operation_timeout_ms == 0 || self.decision_timeout_ms == 0 {
            return Err(ServiceError::Config("timeouts must be positive".into()));
        }
        Ok(())
    }

    pub fn log_format(&self) -> Result<LogFormat, ServiceError> {
        self.log_format.parse()
    }

    pub fn params(&self) -> PointsParams {
        PointsParams {
            starting_balance: Points::new(self.starting_balance),
            attendance_award: Points::new(self.attendance_award),
            max_evidence_bytes: self.max_evidence_bytes,
        }
    }

    pub fn operation_timeout(&self) -> Duration {
        Duration::from_millis(self.operation_timeout_ms)
    }

    pub fn decision_timeout(&self) -> Duration {
        Duration::from_millis(self.decision_timeout_ms)
    }

    /// `host:port` for the HTTP listener.
    pub fn rpc_addr(&self) -> String {
        format!("{}:{}", self.rpc_host, self.rpc_port)
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            rpc_host: default_rpc_host(),
            rpc_port: default_rpc_port(),
            log_format: default_log_format(),
            log_level: default_log_level(),
            starting_balance: default_starting_balance(),
            attendance_award: default_attendance_award(),
            max_evidence_bytes: default_max_evidence_bytes(),
            operation_timeout_ms: default_operation_timeout_ms(),
            decision_timeout_ms: default_decision_timeout_ms(),
            decision_webhook_url: None,
            max_concurrent: default_max_concurrent(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_round_trips_through_toml() {
        let config = ServiceConfig::default();
        let toml_str = config.to_toml_string().unwrap();
        let parsed = ServiceConfig::from_toml_str(&toml_str).expect("should parse");
        assert_eq!(parsed, config);
    }

    #[test]
    fn minimal_toml_uses_defaults() {
        let config = ServiceConfig::from_toml_str("").expect("empty toml should use defaults");
        assert_eq!(config.rpc_port, 5003);
        assert_eq!(config.starting_balance, 20);
        assert_eq!(config.attendance_award, 10);
        assert_eq!(config.max_evidence_bytes, 16 * 1024 * 1024);
        assert_eq!(config.operation_timeout(), Duration::from_secs(5));
        assert_eq!(config.decision_timeout(), Duration::from_secs(10));
        assert_eq!(config.max_concurrent, 64);
        assert!(config.decision_webhook_url.is_none());
    }

    #[test]
    fn partial_toml_overrides() {
        let toml = r#"
            rpc_port = 9999
            starting_balance = 50
            decision_webhook_url = "http://review.local/decide"
        "#;
        let config = ServiceConfig::from_toml_str(toml).expect("should parse");
        assert_eq!(config.rpc_port, 9999);
        assert_eq!(config.params().starting_balance, Points::new(50));
        assert_eq!(
            config.decision_webhook_url.as_deref(),
            Some("http://review.local/decide")
        );
        assert_eq!(config.log_format, "human"); // default
    }

    #[test]
    fn bad_values_are_rejected() {
        assert!(ServiceConfig::from_toml_str("log_format = \"xml\"").is_err());
        assert!(ServiceConfig::from_toml_str("max_concurrent = 0").is_err());
        assert!(ServiceConfig::from_toml_str("rpc_port = \"nope\"").is_err());
    }
}
