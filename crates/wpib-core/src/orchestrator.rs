//! Fixed sequence of remote job steps and what follows each of them.

use std::fmt;

use crate::error::{Error, ProtocolError, Result};
use crate::http::HttpSession;
use crate::ledger::{Category, DownloadRecord, Ledger};
use crate::pipeline::ArchiveManifest;
use crate::poller::run_step;
use crate::protocol::StepResult;
use crate::run::RunContext;
use crate::transfer::fetch_and_verify;

/// Remote job steps, in the order they must run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Server dumps the database; the dump is fetched right after.
    DumpSql,
    /// Server records files deleted since the last backup.
    ListDeleted,
    /// Server hashes the tree and decides how many archives to build.
    ListMd5,
}

pub const STEPS: [Step; 3] = [Step::DumpSql, Step::ListDeleted, Step::ListMd5];

impl Step {
    pub fn as_str(self) -> &'static str {
        match self {
            Step::DumpSql => "dump_sql",
            Step::ListDeleted => "list_deleted",
            Step::ListMd5 => "list_md5",
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the step sequence hands over to the archive pipeline.
#[derive(Debug, Clone)]
pub struct OrchestratorOutcome {
    pub sql: DownloadRecord,
    pub manifest: ArchiveManifest,
}

/// Run every step to completion, strictly one after another.
///
/// After `dump_sql` the reported dump is fetched, verified and uploaded before
/// `list_deleted` starts. `list_md5` yields the archive count. The first
/// failure aborts the sequence.
pub fn run_steps(
    session: &mut dyn HttpSession,
    ctx: &RunContext<'_>,
    ledger: &mut Ledger,
) -> Result<OrchestratorOutcome> {
    let mut sql = None;
    let mut manifest = None;

    for step in STEPS {
        let extra: Vec<(&'static str, &str)> = match (step, ctx.site.exclude.as_deref()) {
            (Step::ListMd5, Some(pattern)) => vec![("exclude", pattern)],
            _ => Vec::new(),
        };
        let result = run_step(session, ctx.site, step.as_str(), &extra, &ctx.step_poll, ctx.cancel)?;

        match step {
            Step::DumpSql => {
                let remote = sql_file(&result)?;
                let record = fetch_and_verify(session, ctx, &remote, Category::Sql, ledger)?;
                upload(ctx, &record)?;
                sql = Some(record);
            }
            Step::ListDeleted => {
                tracing::debug!(site = %ctx.site.id, reported = result.files().len(), "deleted-file list recorded server-side");
            }
            Step::ListMd5 => {
                let total = result.num_archives().ok_or_else(|| ProtocolError::MissingField {
                    step: step.as_str().to_string(),
                    field: "num_archives",
                })?;
                tracing::info!(site = %ctx.site.id, archives = total, "archive count reported");
                manifest = Some(ArchiveManifest::new(total));
            }
        }
    }

    match (sql, manifest) {
        (Some(sql), Some(manifest)) => Ok(OrchestratorOutcome { sql, manifest }),
        _ => Err(ProtocolError::BadResponse {
            step: Step::ListMd5.as_str().to_string(),
            reason: "step sequence ended without a dump and an archive count".to_string(),
        }
        .into()),
    }
}

fn sql_file(result: &StepResult) -> Result<String> {
    result.files().into_iter().next().ok_or_else(|| {
        ProtocolError::MissingField {
            step: Step::DumpSql.as_str().to_string(),
            field: "files",
        }
        .into()
    })
}

/// Hand a verified file to the configured uploader.
pub(crate) fn upload(ctx: &RunContext<'_>, record: &DownloadRecord) -> Result<()> {
    ctx.uploader
        .upload(&ctx.site.id, &record.local_path)
        .map_err(|e| Error::Upload {
            file: record.remote_filename.clone(),
            reason: format!("{:#}", e),
        })
}
