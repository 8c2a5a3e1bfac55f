//! Overlapped archive build and fetch.
//!
//! The server builds archive `n+1` while the client downloads archive `n`:
//! each iteration first makes sure a ready file is queued, triggers the next
//! build, and only then fetches the queued file.

use std::collections::{HashSet, VecDeque};

use crate::error::Result;
use crate::http::{Action, AjaxRequest, HttpSession};
use crate::ledger::{Category, DownloadRecord, Ledger};
use crate::orchestrator::upload;
use crate::poller::wait_for_ready_files;
use crate::protocol::parse_json;
use crate::run::RunContext;
use crate::sanitize::local_file_name;
use crate::transfer::fetch_and_verify;

/// Progress of the archive phase. `next_index` never exceeds `total_count`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveManifest {
    pub total_count: u64,
    /// Index of the next archive to request a build for.
    pub next_index: u64,
    /// Ready files reported by the server but not fetched yet, oldest first.
    pub pending_filenames: VecDeque<String>,
}

impl ArchiveManifest {
    pub fn new(total_count: u64) -> Self {
        Self {
            total_count,
            next_index: 0,
            pending_filenames: VecDeque::new(),
        }
    }

    pub fn is_finished(&self) -> bool {
        self.next_index >= self.total_count
    }

    /// Claim the next build index, or `None` once every archive was requested.
    fn claim_next(&mut self) -> Option<u64> {
        if self.is_finished() {
            return None;
        }
        let idx = self.next_index;
        self.next_index += 1;
        Some(idx)
    }
}

/// Fetch all `manifest.total_count` archives and return their records in fetch order.
///
/// Ready lists may repeat names that were already fetched or queued, or carry
/// several names at once; repeats are skipped and extras are kept for later
/// iterations, so each archive is fetched exactly once.
pub fn run_archive_pipeline(
    session: &mut dyn HttpSession,
    ctx: &RunContext<'_>,
    mut manifest: ArchiveManifest,
    ledger: &mut Ledger,
) -> Result<Vec<DownloadRecord>> {
    let mut fetched = Vec::new();
    if manifest.total_count == 0 {
        // The server still expects the index-0 build before the job closes.
        send_build(session, ctx, 0)?;
        tracing::info!(site = %ctx.site.id, "no archives to fetch");
        return Ok(fetched);
    }

    let mut seen: HashSet<String> = HashSet::new();
    trigger_build(session, ctx, &mut manifest)?;

    while fetched.len() as u64 != manifest.total_count {
        while manifest.pending_filenames.is_empty() {
            let ready = wait_for_ready_files(session, ctx.site, &ctx.list_poll, ctx.cancel, |raw| {
                local_file_name(raw).is_some_and(|name| !seen.contains(&name))
            })?;
            for name in ready.iter().filter_map(|r| local_file_name(r)) {
                if seen.insert(name.clone()) {
                    manifest.pending_filenames.push_back(name);
                }
            }
        }

        trigger_build(session, ctx, &mut manifest)?;

        if let Some(name) = manifest.pending_filenames.pop_front() {
            let record = fetch_and_verify(session, ctx, &name, Category::Files, ledger)?;
            upload(ctx, &record)?;
            fetched.push(record);
            tracing::info!(
                site = %ctx.site.id,
                done = fetched.len(),
                total = manifest.total_count,
                "archive fetched"
            );
        }
    }
    Ok(fetched)
}

/// Ask the server to build archive `next_index`, if any remain.
fn trigger_build(
    session: &mut dyn HttpSession,
    ctx: &RunContext<'_>,
    manifest: &mut ArchiveManifest,
) -> Result<()> {
    match manifest.claim_next() {
        Some(idx) => send_build(session, ctx, idx),
        None => Ok(()),
    }
}

fn send_build(session: &mut dyn HttpSession, ctx: &RunContext<'_>, idx: u64) -> Result<()> {
    let req = AjaxRequest::new(Action::Generate)
        .param("step", "build_archives")
        .param("arc_idx", idx.to_string())
        .opt_param("php_path", ctx.site.php_path.as_deref());
    tracing::debug!(site = %ctx.site.id, arc_idx = idx, "triggering archive build");
    let resp = session.send(&req.to_request(&ctx.site.base_url))?;
    // Readiness is observed through the ready list; the body only has to parse.
    parse_json::<serde_json::Value>(&format!("build_archives {}", idx), &resp)?;
    Ok(())
}
