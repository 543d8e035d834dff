//! Service configuration with TOML file support.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use brvs_rules::BuiltinRule;
use brvs_types::{AccountId, KeyPair};

use crate::logging::LogFormat;
use crate::NodeError;

/// Configuration for a BRVS instance.
///
/// Can be loaded from a TOML file via [`BrvsConfig::from_toml_file`] or
/// built programmatically (e.g. for tests).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BrvsConfig {
    /// Account BRVS co-signs as.
    #[serde(default = "default_brvs_account")]
    pub brvs_account: AccountId,

    /// File holding the hex-encoded Ed25519 private key of `brvs_account`.
    #[serde(default = "default_key_file")]
    pub key_file: PathBuf,

    /// Interval between pending-batch polls, in milliseconds.
    #[serde(default = "default_pending_poll_interval_ms")]
    pub pending_poll_interval_ms: u64,

    /// Ledger quorum is divided by this to derive the user-signature
    /// threshold of accounts without a registered key count.
    #[serde(default = "default_redundancy_factor")]
    pub redundancy_factor: u32,

    /// The only account allowed to switch rules on and off.
    #[serde(default = "default_setter_account")]
    pub setter_account: AccountId,

    /// Account whose details hold the rule on/off flags.
    #[serde(default = "default_rule_settings_account")]
    pub rule_settings_account: AccountId,

    /// Account whose details hold the rule bodies.
    #[serde(default = "default_rule_repository_account")]
    pub rule_repository_account: AccountId,

    /// Capacity of the admission output channel.
    #[serde(default = "default_output_channel_capacity")]
    pub output_channel_capacity: usize,

    /// Maximum number of batches validated concurrently.
    #[serde(default = "default_validation_workers")]
    pub validation_workers: usize,

    #[serde(default = "default_shutdown_timeout_secs")]
    pub shutdown_timeout_secs: u64,

    /// Log format: "human" or "json".
    #[serde(default = "default_log_format")]
    pub log_format: String,

    /// Log level filter, e.g. "info" or "debug,brvs_node=trace".
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Rules installed when the service starts.
    #[serde(default)]
    pub builtin_rules: Vec<BuiltinRule>,
}

// ── Serde default helpers ──────────────────────────────────────────────

fn default_brvs_account() -> AccountId {
    AccountId::new("brvs@brvs")
}

fn default_key_file() -> PathBuf {
    PathBuf::from("./brvs.key")
}

fn default_pending_poll_interval_ms() -> u64 {
    5_000
}

fn default_redundancy_factor() -> u32 {
    2
}

fn default_setter_account() -> AccountId {
    AccountId::new("rule_setter@brvs")
}

fn default_rule_settings_account() -> AccountId {
    AccountId::new("brvs_rule_settings@brvs")
}

fn default_rule_repository_account() -> AccountId {
    AccountId::new("brvs_rule_repository@brvs")
}

fn default_output_channel_capacity() -> usize {
    1024
}

fn default_validation_workers() -> usize {
    4
}

fn default_shutdown_timeout_secs() -> u64 {
    5
}

fn default_log_format() -> String {
    "human".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

// ── Impl ───────────────────────────────────────────────────────────────

impl BrvsConfig {
    /// Load configuration from a TOML file.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, NodeError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| NodeError::Config(e.to_string()))?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml_str(s: &str) -> Result<Self, NodeError> {
        let config: Self = toml::from_str(s).map_err(|e| NodeError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize the configuration to a TOML string.
    pub fn to_toml_string(&self) -> Result<String, NodeError> {
        toml::to_string_pretty(self).map_err(|e| NodeError::Config(e.to_string()))
    }

    fn validate(&self) -> Result<(), NodeError> {
        if self.pending_poll_interval_ms == 0 {
            return Err(NodeError::Config(
                "pending_poll_interval_ms must be at least 1".into(),
            ));
        }
        if self.shutdown_timeout_secs == 0 {
            return Err(NodeError::Config("shutdown_timeout_secs must be at least 1".into()));
        }
        if self.redundancy_factor == 0 {
            return Err(NodeError::Config("redundancy_factor must be at least 1".into()));
        }
        if self.output_channel_capacity == 0 {
            return Err(NodeError::Config(
                "output_channel_capacity must be at least 1".into(),
            ));
        }
        if self.validation_workers == 0 {
            return Err(NodeError::Config("validation_workers must be at least 1".into()));
        }
        self.log_format()?;
        Ok(())
    }

    pub fn log_format(&self) -> Result<LogFormat, NodeError> {
        self.log_format.parse()
    }

    pub fn pending_poll_interval(&self) -> Duration {
        Duration::from_millis(self.pending_poll_interval_ms)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }

    /// Read the signing key from `key_file`.
    pub fn load_keypair(&self) -> Result<KeyPair, NodeError> {
        let text = std::fs::read_to_string(&self.key_file).map_err(|e| {
            NodeError::Key(format!("cannot read {}: {e}", self.key_file.display()))
        })?;
        brvs_crypto::keypair_from_hex(&text).map_err(|e| NodeError::Key(e.to_string()))
    }
}

impl Default for BrvsConfig {
    fn default() -> Self {
        Self {
            brvs_account: default_brvs_account(),
            key_file: default_key_file(),
            pending_poll_interval_ms: default_pending_poll_interval_ms(),
            redundancy_factor: default_redundancy_factor(),
            setter_account: default_setter_account(),
            rule_settings_account: default_rule_settings_account(),
            rule_repository_account: default_rule_repository_account(),
            output_channel_capacity: default_output_channel_capacity(),
            validation_workers: default_validation_workers(),
            shutdown_timeout_secs: default_shutdown_timeout_secs(),
            log_format: default_log_format(),
            log_level: default_log_level(),
            builtin_rules: Vec::new(),
        }
    }
}
