//! `wpib run` – back up sites one after another.

use anyhow::{Context, Result};
use wpib_core::config::WpibConfig;
use wpib_core::credentials::ConfigCredentials;
use wpib_core::upload::{MirrorUploader, NoUpload, Uploader};
use wpib_core::{run_sites, CancelToken, SiteOutcome};

/// Run the selected sites (all configured ones when `selected` is empty).
/// Returns `false` if any site failed.
pub async fn run_backup(cfg: WpibConfig, selected: Vec<String>) -> Result<bool> {
    let site_ids: Vec<String> = if selected.is_empty() {
        cfg.sites.keys().cloned().collect()
    } else {
        selected
    };
    if site_ids.is_empty() {
        println!("No sites configured.");
        return Ok(true);
    }

    let cancel = CancelToken::new();
    let ctrl_c = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("interrupt received, stopping after the current request");
                eprintln!("interrupted, finishing current request...");
                cancel.cancel();
            }
        })
    };

    // The engine is blocking (curl easy handles, poll sleeps).
    let outcomes = tokio::task::spawn_blocking(move || {
        let uploader: Box<dyn Uploader> = match &cfg.upload_dir {
            Some(dir) => Box::new(MirrorUploader::new(dir)),
            None => Box::new(NoUpload),
        };
        let resolver = ConfigCredentials::new(&cfg.sites);
        run_sites(&cfg, &site_ids, &resolver, uploader.as_ref(), &cancel)
    })
    .await
    .context("backup worker panicked")?;
    ctrl_c.abort();

    print_summary(&outcomes);
    Ok(outcomes.iter().all(SiteOutcome::is_success))
}

fn print_summary(outcomes: &[SiteOutcome]) {
    for outcome in outcomes {
        match &outcome.result {
            Ok(summary) => println!(
                "{:<16} ok      {} archive(s), {:.1} MiB",
                outcome.site,
                summary.archives.len(),
                summary.total_bytes() as f64 / 1_048_576.0
            ),
            Err(failure) => println!("{:<16} FAILED  {}", outcome.site, failure.error),
        }
    }
}
