//! Application configuration
//!
//! Layered: built-in defaults, then an optional TOML file, then
//! `THREADGATE_*` environment variables (`__` separates nested keys, e.g.
//! `THREADGATE_PUBLISH__MAX_RETRIES=5`).

use anyhow::{Context, Result};
use publisher::RetryPolicy;
use quality_gate::GateConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

const DEFAULT_CONFIG_NAME: &str = "threadgate";
const ENV_PREFIX: &str = "THREADGATE";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Root of the per-run artifact directories
    #[serde(default = "default_runs_dir")]
    pub runs_dir: PathBuf,

    /// Where the file-backed collaborators read `<SYMBOL>/*.json`
    #[serde(default = "default_inbox_dir")]
    pub inbox_dir: PathBuf,

    /// Options-chain cache lifetime
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,

    #[serde(default)]
    pub gate: GateConfig,

    #[serde(default)]
    pub publish: PublishConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            runs_dir: default_runs_dir(),
            inbox_dir: default_inbox_dir(),
            cache_ttl_secs: default_cache_ttl_secs(),
            gate: GateConfig::default(),
            publish: PublishConfig::default(),
        }
    }
}

fn default_runs_dir() -> PathBuf {
    PathBuf::from("runs")
}

fn default_inbox_dir() -> PathBuf {
    PathBuf::from("inbox")
}

fn default_cache_ttl_secs() -> u64 {
    300
}

/// Platform endpoint, retry and timeout settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishConfig {
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Applied to every HTTP request
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            base_delay_ms: default_base_delay_ms(),
            max_retries: default_max_retries(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

fn default_endpoint() -> String {
    publisher::DEFAULT_ENDPOINT.to_string()
}

fn default_base_delay_ms() -> u64 {
    1000
}

fn default_max_retries() -> u32 {
    3
}

fn default_request_timeout_secs() -> u64 {
    30
}

impl PublishConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.base_delay_ms, self.max_retries)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl AppConfig {
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    /// Render as TOML, e.g. to seed a config file
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to render config as TOML")
    }
}

/// Load configuration.
///
/// An explicit `path` must exist; otherwise `./threadgate.toml` is used when present.
pub fn load_config(path: Option<&Path>) -> Result<AppConfig> {
    let file = match path {
        Some(path) => config::File::from(path).required(true),
        None => config::File::with_name(DEFAULT_CONFIG_NAME).required(false),
    };

    let settings = config::Config::builder()
        .add_source(file)
        .add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        )
        .build()
        .context("Failed to read configuration")?;

    settings
        .try_deserialize::<AppConfig>()
        .context("Invalid configuration")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.runs_dir, PathBuf::from("runs"));
        assert_eq!(config.publish.retry_policy(), RetryPolicy::default());
        assert_eq!(config.publish.endpoint, "https://api.twitter.com/2/tweets");
        assert_eq!(config.gate.required_charts.len(), 5);
    }

    #[test]
    fn test_load_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("threadgate.toml");
        std::fs::write(
            &path,
            r#"
runs_dir = "/var/lib/threadgate/runs"
cache_ttl_secs = 60

[gate]
min_strikes_near_spot = 7

[publish]
max_retries = 5
"#,
        )
        .unwrap();

        let config = load_config(Some(&path)).unwrap();
        assert_eq!(config.runs_dir, PathBuf::from("/var/lib/threadgate/runs"));
        assert_eq!(config.cache_ttl_secs, 60);
        assert_eq!(config.gate.min_strikes_near_spot, 7);
        assert_eq!(config.gate.coverage_window, 0.15);
        assert_eq!(config.publish.max_retries, 5);
        assert_eq!(config.publish.base_delay_ms, 1000);
    }

    #[test]
    fn test_environment_overrides_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("threadgate.toml");
        std::fs::write(
            &path,
            r#"
[gate]
spot_range_tolerance = 0.2

[publish]
request_timeout_secs = 10
"#,
        )
        .unwrap();

        // Keys only this test reads, since the process environment is shared
        std::env::set_var("THREADGATE_INBOX_DIR", "/srv/threadgate/inbox");
        std::env::set_var("THREADGATE_PUBLISH__REQUEST_TIMEOUT_SECS", "45");
        std::env::set_var("THREADGATE_GATE__SPOT_RANGE_TOLERANCE", "0.35");
        let loaded = load_config(Some(&path));
        std::env::remove_var("THREADGATE_INBOX_DIR");
        std::env::remove_var("THREADGATE_PUBLISH__REQUEST_TIMEOUT_SECS");
        std::env::remove_var("THREADGATE_GATE__SPOT_RANGE_TOLERANCE");

        let config = loaded.unwrap();
        assert_eq!(config.inbox_dir, PathBuf::from("/srv/threadgate/inbox"));
        assert_eq!(config.publish.request_timeout(), Duration::from_secs(45));
        assert_eq!(config.gate.spot_range_tolerance, 0.35);
        assert_eq!(config.publish.max_retries, 3);
    }

    #[test]
    fn test_explicit_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_config(Some(&dir.path().join("absent.toml"))).is_err());
    }

    #[test]
    fn test_toml_template_round_trips() {
        let rendered = AppConfig::default().to_toml().unwrap();
        let parsed: AppConfig = toml::from_str(&rendered).unwrap();
        assert_eq!(parsed.cache_ttl_secs, 300);
        assert_eq!(parsed.gate.chart_aliases.get("iv_smile").map(String::as_str), Some("volatility_smile"));
    }
}
