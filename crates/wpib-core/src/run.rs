//! Per-site backup run and the sequential multi-site driver.

use std::fs;
use std::path::{Path, PathBuf};

use crate::auth::authenticate;
use crate::config::{HttpConfig, WpibConfig};
use crate::control::CancelToken;
use crate::credentials::CredentialResolver;
use crate::error::{Error, Result, SiteFailure, TransportError};
use crate::http::{CurlSession, HttpSession};
use crate::ledger::{DownloadRecord, Ledger};
use crate::orchestrator::run_steps;
use crate::pipeline::run_archive_pipeline;
use crate::poller::PollPolicy;
use crate::retry::RetryPolicy;
use crate::sanitize::local_file_name;
use crate::site::Site;
use crate::upload::Uploader;

/// Name of the ledger file written next to the fetched files.
pub const LEDGER_FILE: &str = "ledger.json";

/// Everything the step, pipeline and transfer code needs for one site.
pub struct RunContext<'a> {
    pub site: &'a Site,
    /// Where fetched files land (`<backup_root>/<site>/wpib`).
    pub dest_dir: &'a Path,
    pub step_poll: PollPolicy,
    pub list_poll: PollPolicy,
    pub retry: RetryPolicy,
    pub cancel: &'a CancelToken,
    pub uploader: &'a dyn Uploader,
}

/// Loop bounds shared by every site of a batch.
#[derive(Debug, Clone, Copy)]
pub struct RunSettings {
    pub step_poll: PollPolicy,
    pub list_poll: PollPolicy,
    pub retry: RetryPolicy,
}

impl RunSettings {
    pub fn from_config(cfg: &WpibConfig) -> Self {
        Self {
            step_poll: cfg.polling.step_policy(),
            list_poll: cfg.polling.list_policy(),
            retry: cfg.retry_policy(),
        }
    }
}

/// What a successful site run produced.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub sql: DownloadRecord,
    pub archives: Vec<DownloadRecord>,
}

impl RunSummary {
    pub fn total_bytes(&self) -> u64 {
        self.sql.bytes + self.archives.iter().map(|r| r.bytes).sum::<u64>()
    }
}

/// One site's full run: output directories plus the ledger of fetched files.
#[derive(Debug)]
pub struct BackupRun {
    pub site: Site,
    pub dest_dir: PathBuf,
    /// Reserved for the local post-processing tools that unpack archives.
    pub expanded_dir: PathBuf,
    pub ledger: Ledger,
}

impl BackupRun {
    /// Create `<backup_root>/<site>/wpib` and `<backup_root>/<site>/wordpress`.
    pub fn prepare(site: Site, backup_root: &Path) -> Result<Self> {
        let dir_name = local_file_name(&site.id)
            .filter(|n| n == &site.id)
            .ok_or_else(|| Error::Config(format!("site id {:?} is not a usable directory name", site.id)))?;
        let site_root = backup_root.join(dir_name);
        let dest_dir = site_root.join("wpib");
        let expanded_dir = site_root.join("wordpress");
        for dir in [&dest_dir, &expanded_dir] {
            fs::create_dir_all(dir).map_err(|e| Error::storage(dir, e))?;
        }
        Ok(Self {
            site,
            dest_dir,
            expanded_dir,
            ledger: Ledger::new(),
        })
    }

    pub fn ledger_path(&self) -> PathBuf {
        self.dest_dir.join(LEDGER_FILE)
    }

    /// Log in, run every step, then fetch every archive.
    pub fn execute(
        &mut self,
        session: &mut dyn HttpSession,
        settings: &RunSettings,
        uploader: &dyn Uploader,
        cancel: &CancelToken,
    ) -> Result<RunSummary> {
        authenticate(session, &self.site)?;
        let ctx = RunContext {
            site: &self.site,
            dest_dir: &self.dest_dir,
            step_poll: settings.step_poll,
            list_poll: settings.list_poll,
            retry: settings.retry,
            cancel,
            uploader,
        };
        let outcome = run_steps(session, &ctx, &mut self.ledger)?;
        let archives = run_archive_pipeline(session, &ctx, outcome.manifest, &mut self.ledger)?;
        Ok(RunSummary {
            sql: outcome.sql,
            archives,
        })
    }

    /// Persist the ledger. Failures are logged only.
    pub fn write_ledger(&self) {
        let path = self.ledger_path();
        match self.ledger.write_json(&path) {
            Ok(()) => tracing::debug!(site = %self.site.id, path = %path.display(), "ledger written"),
            Err(e) => tracing::warn!(site = %self.site.id, "could not write ledger: {}", e),
        }
    }
}

/// Result of one site in a batch.
#[derive(Debug)]
pub struct SiteOutcome {
    pub site: String,
    pub result: std::result::Result<RunSummary, SiteFailure>,
}

impl SiteOutcome {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

/// Run every listed site through fresh curl sessions.
pub fn run_sites(
    cfg: &WpibConfig,
    site_ids: &[String],
    resolver: &dyn CredentialResolver,
    uploader: &dyn Uploader,
    cancel: &CancelToken,
) -> Vec<SiteOutcome> {
    run_sites_with(cfg, site_ids, resolver, uploader, cancel, curl_connector(&cfg.http))
}

/// Session factory backed by [`CurlSession`].
pub fn curl_connector(http: &HttpConfig) -> impl FnMut(&Site) -> Result<CurlSession> + '_ {
    move |site| {
        CurlSession::new(http).map_err(|source| {
            TransportError::Curl {
                url: site.base_url.clone(),
                source,
            }
            .into()
        })
    }
}

/// Run sites one after another with sessions from `connect`.
///
/// Each site gets its own session, so cookies never leak between sites. A
/// failing site is recorded and the batch continues; cancellation stops it,
/// and the sites not yet started are reported as cancelled.
pub fn run_sites_with<S, F>(
    cfg: &WpibConfig,
    site_ids: &[String],
    resolver: &dyn CredentialResolver,
    uploader: &dyn Uploader,
    cancel: &CancelToken,
    mut connect: F,
) -> Vec<SiteOutcome>
where
    S: HttpSession,
    F: FnMut(&Site) -> Result<S>,
{
    let settings = RunSettings::from_config(cfg);
    let mut outcomes = Vec::with_capacity(site_ids.len());
    for id in site_ids {
        let result = if cancel.is_cancelled() {
            Err(Error::Cancelled("batch".to_string()))
        } else {
            run_site(cfg, id, &settings, resolver, uploader, cancel, &mut connect)
        };
        match &result {
            Ok(summary) => tracing::info!(
                site = %id,
                archives = summary.archives.len(),
                bytes = summary.total_bytes(),
                "site backed up"
            ),
            Err(e) => tracing::error!(site = %id, "site failed: {}", e),
        }
        outcomes.push(SiteOutcome {
            site: id.clone(),
            result: result.map_err(|error| SiteFailure {
                site: id.clone(),
                error,
            }),
        });
    }
    outcomes
}

fn run_site<S, F>(
    cfg: &WpibConfig,
    site_id: &str,
    settings: &RunSettings,
    resolver: &dyn CredentialResolver,
    uploader: &dyn Uploader,
    cancel: &CancelToken,
    connect: &mut F,
) -> Result<RunSummary>
where
    S: HttpSession,
    F: FnMut(&Site) -> Result<S>,
{
    let credentials = resolver.resolve(site_id)?;
    let site_cfg = cfg.sites.get(site_id).cloned().unwrap_or_default();
    let site = Site::new(site_id, &site_cfg, credentials)?;
    let mut session = connect(&site)?;
    let mut run = BackupRun::prepare(site, &cfg.backup_root)?;
    tracing::info!(site = site_id, base_url = %run.site.base_url, dest = %run.dest_dir.display(), "starting backup");

    let result = run.execute(&mut session, settings, uploader, cancel);
    run.write_ledger();
    result
}
