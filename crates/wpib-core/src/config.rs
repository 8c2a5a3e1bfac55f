use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::poller::PollPolicy;
use crate::retry::RetryPolicy;

/// Retry policy for file transfers (optional section in config.toml).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of download attempts per file (including the first).
    pub max_attempts: u32,
    /// Base delay in seconds for exponential backoff (e.g. 0.25 = 250ms).
    pub base_delay_secs: f64,
    /// Maximum backoff delay in seconds.
    pub max_delay_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 1,
            base_delay_secs: 0.25,
            max_delay_secs: 30,
        }
    }
}

impl RetryConfig {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts.max(1),
            base_delay: Duration::from_secs_f64(self.base_delay_secs.max(0.0)),
            max_delay: Duration::from_secs(self.max_delay_secs),
        }
    }
}

/// Bounds for the remote polling loops.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollingConfig {
    /// Pause between `wpib_check_progress` calls, in milliseconds.
    pub step_interval_ms: u64,
    /// Pause between empty "list ready files" polls, in seconds.
    pub list_interval_secs: u64,
    /// Maximum polls per loop before giving up with a timeout.
    pub max_attempts: u32,
    /// Optional wall-clock limit per loop, in seconds.
    #[serde(default)]
    pub deadline_secs: Option<u64>,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            step_interval_ms: 1000,
            list_interval_secs: 4,
            max_attempts: 600,
            deadline_secs: None,
        }
    }
}

impl PollingConfig {
    pub fn step_policy(&self) -> PollPolicy {
        PollPolicy {
            interval: Duration::from_millis(self.step_interval_ms),
            max_attempts: self.max_attempts,
            deadline: self.deadline_secs.map(Duration::from_secs),
        }
    }

    pub fn list_policy(&self) -> PollPolicy {
        PollPolicy {
            interval: Duration::from_secs(self.list_interval_secs),
            max_attempts: self.max_attempts,
            deadline: self.deadline_secs.map(Duration::from_secs),
        }
    }
}

/// HTTP client settings shared by every site session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    pub connect_timeout_secs: u64,
    /// Hard ceiling per request (downloads included).
    pub timeout_secs: u64,
    pub user_agent: String,
    /// Skip TLS peer/host verification. Only for self-signed staging hosts.
    #[serde(default)]
    pub insecure_tls: bool,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: 30,
            timeout_secs: 6000,
            user_agent: concat!("wpib/", env!("CARGO_PKG_VERSION")).to_string(),
            insecure_tls: false,
        }
    }
}

/// One `[sites.<id>]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SiteConfig {
    /// WordPress base URL; a trailing `/` is added when missing.
    pub url: String,
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    /// Name of an environment variable holding the password.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password_env: Option<String>,
    /// Login page relative to the base URL (default `wp-login.php`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub login_url: Option<String>,
    /// Substring proving the POST landed on an authenticated page (default `wp-toolbar`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub login_marker: Option<String>,
    /// Value sent as `wp-submit` (localized installs expect their own label).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub submit_label: Option<String>,
    /// PHP binary used by the server-side generator.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub php_path: Option<String>,
    /// Exclusion pattern passed to the `list_md5` step.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exclude: Option<String>,
}

/// Global configuration loaded from `~/.config/wpib/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WpibConfig {
    /// Root of the per-site output tree (`<backup_root>/<site>/wpib`).
    pub backup_root: PathBuf,
    /// When set, verified files are copied to `<upload_dir>/<site>/`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upload_dir: Option<PathBuf>,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub polling: PollingConfig,
    /// Optional retry policy; if missing, transfers fail on the first error.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry: Option<RetryConfig>,
    #[serde(default)]
    pub sites: BTreeMap<String, SiteConfig>,
}

impl Default for WpibConfig {
    fn default() -> Self {
        let backup_root = std::env::var_os("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."))
            .join("wpib-backups");
        Self {
            backup_root,
            upload_dir: None,
            http: HttpConfig::default(),
            polling: PollingConfig::default(),
            retry: None,
            sites: BTreeMap::new(),
        }
    }
}

impl WpibConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry.clone().unwrap_or_default().policy()
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("wpib")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from the default location, creating a default file if none exists.
pub fn load_or_init() -> Result<WpibConfig> {
    load_or_init_at(&config_path()?)
}

/// Load configuration from `path`, creating a default file there if none exists.
pub fn load_or_init_at(path: &Path) -> Result<WpibConfig> {
    if !path.exists() {
        let default_cfg = WpibConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    let data =
        fs::read_to_string(path).with_context(|| format!("read config {}", path.display()))?;
    let cfg: WpibConfig =
        toml::from_str(&data).with_context(|| format!("parse config {}", path.display()))?;
    Ok(cfg)
}
