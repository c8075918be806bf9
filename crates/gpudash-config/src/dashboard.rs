use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

/// Env var naming an explicit config file.
pub const CONFIG_ENV: &str = "GPUDASH_CONFIG";
/// Env var overriding `base_url`.
pub const URL_ENV: &str = "GPUDASH_URL";

const MIN_POLL_INTERVAL_MS: u64 = 100;
const MAX_LOG_RETENTION_DAYS: u64 = 3650;

/// Dashboard settings loaded from `config.toml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct DashboardConfig {
    /// Server root; endpoints live under `{base_url}/GPUDashboard/`.
    pub base_url: String,
    /// Sent as `Authorization: token <token>` when set.
    pub token: Option<String>,
    pub poll_interval_ms: u64,
    pub request_timeout_ms: u64,
    /// Samples visible on a time-series chart.
    pub history_window: usize,
    pub machine_source: MachineSource,
    /// Days a rotated log file is kept, 1 to 3650.
    pub log_retention_days: u64,
    pub accumulator: AccumulatorConfig,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8888".to_string(),
            token: None,
            poll_interval_ms: 1000,
            request_timeout_ms: 5000,
            history_window: 60,
            machine_source: MachineSource::Http,
            log_retention_days: 7,
            accumulator: AccumulatorConfig::default(),
        }
    }
}

/// Where `cpu_resource` readings come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MachineSource {
    #[default]
    Http,
    /// Read this host with sysinfo instead of asking the server.
    Local,
}

/// How buffered readings are flushed when a chart resumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlushMode {
    #[default]
    Always,
    MinBatch,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct AccumulatorConfig {
    pub flush: FlushMode,
    /// Smallest buffer that is flushed under `min_batch`.
    pub min_batch: usize,
}

impl Default for AccumulatorConfig {
    fn default() -> Self {
        Self {
            flush: FlushMode::Always,
            min_batch: 2,
        }
    }
}

/// Where the effective configuration was read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigOrigin {
    File(PathBuf),
    Defaults,
}

impl fmt::Display for ConfigOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::File(path) => write!(f, "{}", path.display()),
            Self::Defaults => f.write_str("built-in defaults"),
        }
    }
}

impl DashboardConfig {
    /// Parse and validate config TOML.
    pub fn from_toml_str(input: &str) -> Result<Self> {
        let config: Self = toml::from_str(input).context("failed to parse config TOML")?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a config file from disk.
    pub fn from_path(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read config at {}", path.display()))?;

        Self::from_toml_str(&raw).with_context(|| format!("invalid config at {}", path.display()))
    }

    /// Load using the process environment.
    ///
    /// `GPUDASH_CONFIG` wins and must exist. Otherwise the per-user file is
    /// used when present, else the defaults. `GPUDASH_URL` then replaces
    /// `base_url`.
    pub fn load() -> Result<(Self, ConfigOrigin)> {
        Self::load_from(
            std::env::var_os(CONFIG_ENV).map(PathBuf::from),
            default_path(),
            std::env::var(URL_ENV).ok(),
        )
    }

    pub fn load_from(
        explicit: Option<PathBuf>,
        fallback: Option<PathBuf>,
        url_override: Option<String>,
    ) -> Result<(Self, ConfigOrigin)> {
        let (mut config, origin) = match (explicit, fallback) {
            (Some(path), _) => (Self::from_path(&path)?, ConfigOrigin::File(path)),
            (None, Some(path)) if path.is_file() => {
                (Self::from_path(&path)?, ConfigOrigin::File(path))
            }
            _ => (Self::default(), ConfigOrigin::Defaults),
        };

        if let Some(url) = url_override.filter(|u| !u.trim().is_empty()) {
            config.base_url = url.trim().to_string();
            config
                .validate()
                .with_context(|| format!("invalid {URL_ENV}"))?;
        }

        Ok((config, origin))
    }

    /// Validate semantic constraints serde cannot express.
    pub fn validate(&self) -> Result<()> {
        let url = self.base_url.trim();
        if url.is_empty() {
            bail!("base_url must not be empty");
        }
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            bail!("base_url must start with http:// or https://: {url}");
        }
        if let Some(token) = &self.token {
            if token.trim().is_empty() {
                bail!("token must not be empty when set");
            }
        }
        if self.poll_interval_ms < MIN_POLL_INTERVAL_MS {
            bail!(
                "poll_interval_ms must be at least {MIN_POLL_INTERVAL_MS}, got {}",
                self.poll_interval_ms
            );
        }
        if self.request_timeout_ms == 0 {
            bail!("request_timeout_ms must be positive");
        }
        if self.history_window < 2 {
            bail!("history_window must be at least 2, got {}", self.history_window);
        }
        if !(1..=MAX_LOG_RETENTION_DAYS).contains(&self.log_retention_days) {
            bail!(
                "log_retention_days must be between 1 and {MAX_LOG_RETENTION_DAYS}, got {}",
                self.log_retention_days
            );
        }
        if self.accumulator.flush == FlushMode::MinBatch && self.accumulator.min_batch == 0 {
            bail!("accumulator.min_batch must be at least 1");
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// `base_url` without a trailing slash.
    pub fn base_url(&self) -> &str {
        self.base_url.trim().trim_end_matches('/')
    }
}

/// `<config_dir>/gpudash/config.toml`, if the platform has a config dir.
pub fn default_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("gpudash").join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL_CONFIG: &str = r#"
base_url = "https://lab.example.org/user/ada/"
token = "abc123"
poll_interval_ms = 500
request_timeout_ms = 2000
history_window = 120
machine_source = "local"
log_retention_days = 3

[accumulator]
flush = "min_batch"
min_batch = 2
"#;

    fn temp_file(name: &str, contents: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("gpudash-config-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn parses_full_config() {
        let config = DashboardConfig::from_toml_str(FULL_CONFIG).unwrap();
        assert_eq!(config.base_url(), "https://lab.example.org/user/ada");
        assert_eq!(config.token.as_deref(), Some("abc123"));
        assert_eq!(config.poll_interval(), Duration::from_millis(500));
        assert_eq!(config.machine_source, MachineSource::Local);
        assert_eq!(config.accumulator.flush, FlushMode::MinBatch);
        assert_eq!(config.history_window, 120);
    }

    #[test]
    fn empty_document_yields_defaults() {
        let config = DashboardConfig::from_toml_str("").unwrap();
        assert_eq!(config, DashboardConfig::default());
        assert_eq!(config.accumulator.flush, FlushMode::Always);
    }

    #[test]
    fn unknown_key_is_rejected() {
        let err = DashboardConfig::from_toml_str("refresh = 3")
            .unwrap_err()
            .to_string();
        assert!(err.contains("failed to parse config TOML"));
    }

    #[test]
    fn unknown_flush_mode_is_rejected() {
        let raw = "[accumulator]\nflush = \"sometimes\"\n";
        assert!(DashboardConfig::from_toml_str(raw).is_err());
    }

    #[test]
    fn fast_polling_is_rejected() {
        let err = DashboardConfig::from_toml_str("poll_interval_ms = 10")
            .unwrap_err()
            .to_string();
        assert!(err.contains("poll_interval_ms must be at least 100"));
    }

    #[test]
    fn zero_min_batch_is_rejected() {
        let raw = "[accumulator]\nflush = \"min_batch\"\nmin_batch = 0\n";
        let err = DashboardConfig::from_toml_str(raw).unwrap_err().to_string();
        assert!(err.contains("min_batch"));
    }

    #[test]
    fn min_batch_is_ignored_when_always_flushing() {
        let raw = "[accumulator]\nflush = \"always\"\nmin_batch = 0\n";
        let cfg = DashboardConfig::from_toml_str(raw).unwrap();
        assert_eq!(cfg.accumulator.flush, FlushMode::Always);
    }

    #[test]
    fn log_retention_must_be_in_range() {
        for bad in ["0", "3651", "300000000000000"] {
            let err = DashboardConfig::from_toml_str(&format!("log_retention_days = {bad}"))
                .unwrap_err()
                .to_string();
            assert!(err.contains("log_retention_days must be between 1 and 3650"), "{bad}: {err}");
        }
        let cfg = DashboardConfig::from_toml_str("log_retention_days = 30").unwrap();
        assert_eq!(cfg.log_retention_days, 30);
    }

    #[test]
    fn non_http_url_is_rejected() {
        let err = DashboardConfig::from_toml_str("base_url = \"ftp://x\"")
            .unwrap_err()
            .to_string();
        assert!(err.contains("base_url must start with"));
    }

    #[test]
    fn explicit_path_wins_over_fallback() {
        let explicit = temp_file("explicit.toml", "poll_interval_ms = 250\n");
        let fallback = temp_file("fallback.toml", "poll_interval_ms = 750\n");
        let (config, origin) =
            DashboardConfig::load_from(Some(explicit.clone()), Some(fallback), None).unwrap();
        assert_eq!(config.poll_interval_ms, 250);
        assert_eq!(origin, ConfigOrigin::File(explicit));
    }

    #[test]
    fn missing_explicit_path_is_an_error() {
        let missing = std::env::temp_dir().join("gpudash-does-not-exist.toml");
        let err = DashboardConfig::load_from(Some(missing), None, None)
            .unwrap_err()
            .to_string();
        assert!(err.contains("failed to read config"));
    }

    #[test]
    fn missing_fallback_uses_defaults() {
        let missing = std::env::temp_dir().join("gpudash-also-missing.toml");
        let (config, origin) = DashboardConfig::load_from(None, Some(missing), None).unwrap();
        assert_eq!(origin, ConfigOrigin::Defaults);
        assert_eq!(config, DashboardConfig::default());
        assert_eq!(origin.to_string(), "built-in defaults");
    }

    #[test]
    fn url_override_replaces_base_url() {
        let (config, _) =
            DashboardConfig::load_from(None, None, Some("http://gpu-box:9000/".into())).unwrap();
        assert_eq!(config.base_url(), "http://gpu-box:9000");

        let err = DashboardConfig::load_from(None, None, Some("gpu-box".into()))
            .unwrap_err()
            .to_string();
        assert!(err.contains("GPUDASH_URL"));
    }
}
