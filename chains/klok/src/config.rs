use anyhow::Result;
use config::{Config, Environment, File};
use core_logic::ConfigError;
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct KlokConfig {
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    #[serde(default = "default_ip_check_url")]
    pub ip_check_url: String,
    #[serde(default = "default_token_file")]
    pub token_file: String,
    #[serde(default = "default_proxy_file")]
    pub proxy_file: String,
    #[serde(default = "default_min_interval_ms")]
    pub min_interval_ms: u64,
    #[serde(default = "default_max_interval_ms")]
    pub max_interval_ms: u64,
    #[serde(default = "default_max_failed_attempts")]
    pub max_failed_attempts: u32,
    #[serde(default = "default_account_delay_ms")]
    pub account_delay_ms: u64,
    #[serde(default = "default_fallback_wait_secs")]
    pub fallback_wait_secs: u64,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_ip_check_timeout_secs")]
    pub ip_check_timeout_secs: u64,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default = "default_bootstrap_message")]
    pub bootstrap_message: String,
}

fn default_api_base_url() -> String {
    "https://api1-pp.klokapp.ai/v1".to_string()
}
fn default_ip_check_url() -> String {
    "https://api.ipify.org?format=json".to_string()
}
fn default_token_file() -> String {
    "klok.txt".to_string()
}
fn default_proxy_file() -> String {
    "proxy.txt".to_string()
}
fn default_min_interval_ms() -> u64 {
    10_000
}
fn default_max_interval_ms() -> u64 {
    30_000
}
fn default_max_failed_attempts() -> u32 {
    3
}
fn default_account_delay_ms() -> u64 {
    5_000
}
fn default_fallback_wait_secs() -> u64 {
    24 * 60 * 60
}
fn default_request_timeout_secs() -> u64 {
    30
}
fn default_ip_check_timeout_secs() -> u64 {
    10
}
fn default_model() -> String {
    "llama-3.3-70b-instruct".to_string()
}
fn default_language() -> String {
    "english".to_string()
}
fn default_bootstrap_message() -> String {
    "Starting new conversation".to_string()
}

impl Default for KlokConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_api_base_url(),
            ip_check_url: default_ip_check_url(),
            token_file: default_token_file(),
            proxy_file: default_proxy_file(),
            min_interval_ms: default_min_interval_ms(),
            max_interval_ms: default_max_interval_ms(),
            max_failed_attempts: default_max_failed_attempts(),
            account_delay_ms: default_account_delay_ms(),
            fallback_wait_secs: default_fallback_wait_secs(),
            request_timeout_secs: default_request_timeout_secs(),
            ip_check_timeout_secs: default_ip_check_timeout_secs(),
            model: default_model(),
            language: default_language(),
            bootstrap_message: default_bootstrap_message(),
        }
    }
}

/// Knobs the per-account state machine needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountPolicy {
    pub max_failed_attempts: u32,
    pub bootstrap_message: String,
}

/// Knobs the driver loop needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduleConfig {
    pub min_interval: Duration,
    pub max_interval: Duration,
    pub account_delay: Duration,
    pub fallback_wait_secs: u64,
}

impl KlokConfig {
    /// Loads the TOML file at `path` (missing file is fine) and applies
    /// `KLOK_*` environment overrides on top.
    pub fn load(path: &str) -> Result<Self> {
        let settings = Config::builder()
            .add_source(File::with_name(path).required(false))
            .add_source(Environment::with_prefix("KLOK").try_parsing(true))
            .build()?;

        let config: KlokConfig = settings.try_deserialize().map_err(|e| anyhow::anyhow!(e))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api_base_url.trim().is_empty() {
            return Err(ConfigError::MissingField {
                field: "api_base_url".to_string(),
            });
        }
        if self.min_interval_ms > self.max_interval_ms {
            return Err(ConfigError::InvalidValue {
                field: "min_interval_ms".to_string(),
                reason: format!(
                    "{} is greater than max_interval_ms {}",
                    self.min_interval_ms, self.max_interval_ms
                ),
            });
        }
        if self.max_failed_attempts == 0 {
            return Err(ConfigError::InvalidValue {
                field: "max_failed_attempts".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    pub fn account_policy(&self) -> AccountPolicy {
        AccountPolicy {
            max_failed_attempts: self.max_failed_attempts,
            bootstrap_message: self.bootstrap_message.clone(),
        }
    }

    pub fn schedule(&self) -> ScheduleConfig {
        ScheduleConfig {
            min_interval: Duration::from_millis(self.min_interval_ms),
            max_interval: Duration::from_millis(self.max_interval_ms),
            account_delay: Duration::from_millis(self.account_delay_ms),
            fallback_wait_secs: self.fallback_wait_secs,
        }
    }
}
