use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;

const DEFAULT_ORIGIN: &str = "ps.tachyon.dev";

fn default_origin() -> String {
    DEFAULT_ORIGIN.to_string()
}

fn default_true() -> bool {
    true
}

fn default_cache_size() -> usize {
    100
}

fn default_heartbeat_value() -> u64 {
    300
}

fn default_subscribe_timeout() -> u64 {
    310
}

/// Client configuration for the subscribe engine.
///
/// Flag semantics:
/// - `keep_time_token_on_list_change` reuses the previous cursor after the
///   subscription list changes, so the stream continues where it left off.
/// - `catch_up_on_subscription_restore` preserves the cursor across network
///   drops so a restore replays missed events.
/// - `maximum_messages_cache_size` is the de-duplication capacity K; 0
///   disables de-duplication entirely.
/// - `request_message_count_threshold` is the batch size M above which a
///   `RequestMessageCountExceeded` status is emitted; 0 disables the check.
#[derive(Debug, Clone, Deserialize)]
pub struct ClientConfig {
    pub subscribe_key: String,
    pub uuid: String,
    #[serde(default)]
    pub auth_key: Option<String>,
    #[serde(default = "default_origin")]
    pub origin: String,
    #[serde(default)]
    pub filter_expression: Option<String>,
    #[serde(default = "default_true")]
    pub keep_time_token_on_list_change: bool,
    #[serde(default = "default_true")]
    pub catch_up_on_subscription_restore: bool,
    #[serde(default)]
    pub suppress_leave_events: bool,
    #[serde(default)]
    pub manage_presence_list_manually: bool,
    #[serde(default = "default_cache_size")]
    pub maximum_messages_cache_size: usize,
    #[serde(default)]
    pub request_message_count_threshold: usize,
    #[serde(default = "default_heartbeat_value")]
    pub presence_heartbeat_value: u64,
    #[serde(default = "default_subscribe_timeout")]
    pub subscribe_request_timeout_secs: u64,
}

impl ClientConfig {
    /// Minimal configuration with library defaults for everything optional.
    pub fn new(subscribe_key: impl Into<String>, uuid: impl Into<String>) -> Self {
        Self {
            subscribe_key: subscribe_key.into(),
            uuid: uuid.into(),
            auth_key: None,
            origin: default_origin(),
            filter_expression: None,
            keep_time_token_on_list_change: true,
            catch_up_on_subscription_restore: true,
            suppress_leave_events: false,
            manage_presence_list_manually: false,
            maximum_messages_cache_size: default_cache_size(),
            request_message_count_threshold: 0,
            presence_heartbeat_value: default_heartbeat_value(),
            subscribe_request_timeout_secs: default_subscribe_timeout(),
        }
    }

    /// Load configuration from a TOML file (CLI path).
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        let config: Self = toml::from_str(&raw)
            .with_context(|| format!("failed to parse config file {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.subscribe_key.is_empty() {
            bail!("subscribe_key must not be empty");
        }
        if self.uuid.is_empty() {
            bail!("uuid must not be empty");
        }
        if self.origin.is_empty() {
            bail!("origin must not be empty");
        }
        Ok(())
    }
}
