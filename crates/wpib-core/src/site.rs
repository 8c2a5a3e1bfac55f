//! Immutable per-run description of one WordPress site.

use crate::config::SiteConfig;
use crate::credentials::Credentials;
use crate::error::{Error, Result};

pub const DEFAULT_LOGIN_PATH: &str = "wp-login.php";
pub const DEFAULT_LOGIN_MARKER: &str = "wp-toolbar";
pub const DEFAULT_SUBMIT_LABEL: &str = "Log In";

#[derive(Debug, Clone)]
pub struct Site {
    pub id: String,
    /// Always ends with `/`.
    pub base_url: String,
    pub credentials: Credentials,
    pub login_path: String,
    pub login_marker: String,
    pub submit_label: String,
    pub php_path: Option<String>,
    pub exclude: Option<String>,
}

impl Site {
    /// Combine a config section with resolved credentials. The resolver's base URL wins.
    pub fn new(id: &str, cfg: &SiteConfig, credentials: Credentials) -> Result<Self> {
        let base_url = normalize_base_url(&credentials.base_url)?;
        Ok(Self {
            id: id.to_string(),
            credentials: Credentials {
                base_url: base_url.clone(),
                ..credentials
            },
            base_url,
            login_path: cfg
                .login_url
                .clone()
                .unwrap_or_else(|| DEFAULT_LOGIN_PATH.to_string()),
            login_marker: cfg
                .login_marker
                .clone()
                .unwrap_or_else(|| DEFAULT_LOGIN_MARKER.to_string()),
            submit_label: cfg
                .submit_label
                .clone()
                .unwrap_or_else(|| DEFAULT_SUBMIT_LABEL.to_string()),
            php_path: cfg.php_path.clone(),
            exclude: cfg.exclude.clone(),
        })
    }

    pub fn login_url(&self) -> String {
        format!("{}{}", self.base_url, self.login_path.trim_start_matches('/'))
    }

    pub fn admin_url(&self) -> String {
        format!("{}wp-admin/", self.base_url)
    }
}

/// Validate an http(s) URL and make sure it ends with `/`.
pub fn normalize_base_url(raw: &str) -> Result<String> {
    let parsed = url::Url::parse(raw.trim())
        .map_err(|e| Error::Config(format!("invalid site url {:?}: {}", raw, e)))?;
    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        return Err(Error::Config(format!(
            "site url {:?} must be http or https",
            raw
        )));
    }
    let mut s = parsed.to_string();
    if !s.ends_with('/') {
        s.push('/');
    }
    Ok(s)
}
