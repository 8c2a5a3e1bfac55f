//! Credential lookup behind a capability interface.
//!
//! The engine only sees [`CredentialResolver`]; where secrets live (config
//! file, environment, a secret store) is the resolver's business.

use std::collections::BTreeMap;
use std::fmt;

use crate::config::SiteConfig;
use crate::error::{Error, Result};

#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub base_url: String,
    pub username: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("base_url", &self.base_url)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

pub trait CredentialResolver {
    fn resolve(&self, site_id: &str) -> Result<Credentials>;
}

/// Resolves credentials from the `[sites.<id>]` sections of the config file.
/// `password_env` takes precedence over an inline `password`.
pub struct ConfigCredentials<'a> {
    sites: &'a BTreeMap<String, SiteConfig>,
}

impl<'a> ConfigCredentials<'a> {
    pub fn new(sites: &'a BTreeMap<String, SiteConfig>) -> Self {
        Self { sites }
    }
}

impl CredentialResolver for ConfigCredentials<'_> {
    fn resolve(&self, site_id: &str) -> Result<Credentials> {
        let site = self
            .sites
            .get(site_id)
            .ok_or_else(|| Error::Credentials(format!("no [sites.{}] section", site_id)))?;

        let password = match (&site.password_env, &site.password) {
            (Some(var), _) => std::env::var(var).map_err(|_| {
                Error::Credentials(format!("environment variable {} is not set", var))
            })?,
            (None, Some(p)) => p.clone(),
            (None, None) => {
                return Err(Error::Credentials(format!(
                    "site {} has neither password nor password_env",
                    site_id
                )))
            }
        };

        Ok(Credentials {
            base_url: site.url.clone(),
            username: site.username.clone(),
            password,
        })
    }
}
