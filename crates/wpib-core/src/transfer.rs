//! Fetch one file, hash it locally, have the server confirm the digest.

use std::fs;

use crate::checksum;
use crate::error::{Error, ProtocolError, Result, TransferError};
use crate::http::{Action, AjaxRequest, HttpSession};
use crate::ledger::{Category, DownloadRecord, Ledger};
use crate::protocol::{parse_json, DigestCheck};
use crate::retry::run_with_retry;
use crate::run::RunContext;
use crate::sanitize::local_file_name;
use crate::storage::{rejected_path, StorageWriter};

/// Download `remote_filename` into the run's destination directory and verify it.
///
/// The body is streamed into `<name>.part` and renamed once complete, so a
/// failed or interrupted transfer never leaves a file under the final name.
/// Every verified (or rejected) file is recorded in `ledger`. On a digest
/// mismatch the file is moved to `<name>.rejected`, recorded unconfirmed and
/// returned as an error.
pub fn fetch_and_verify(
    session: &mut dyn HttpSession,
    ctx: &RunContext<'_>,
    remote_filename: &str,
    category: Category,
    ledger: &mut Ledger,
) -> Result<DownloadRecord> {
    let local_name = local_file_name(remote_filename).ok_or_else(|| ProtocolError::BadResponse {
        step: "download".to_string(),
        reason: format!("unusable file name {:?}", remote_filename),
    })?;
    run_with_retry(&ctx.retry, ctx.cancel, remote_filename, |attempt| {
        if attempt > 1 {
            tracing::info!(site = %ctx.site.id, file = remote_filename, attempt, "re-fetching");
        }
        fetch_once(session, ctx, remote_filename, &local_name, category, ledger)
    })
}

fn fetch_once(
    session: &mut dyn HttpSession,
    ctx: &RunContext<'_>,
    remote_filename: &str,
    local_name: &str,
    category: Category,
    ledger: &mut Ledger,
) -> Result<DownloadRecord> {
    if ctx.cancel.is_cancelled() {
        return Err(Error::Cancelled(format!("download of {}", remote_filename)));
    }
    let site = ctx.site;
    let final_path = ctx.dest_dir.join(local_name);
    let url = AjaxRequest::new(Action::Download)
        .param("filename", remote_filename)
        .url(&site.base_url);

    let mut writer = StorageWriter::create(&final_path).map_err(|e| Error::storage(&final_path, e))?;
    tracing::debug!(site = %site.id, file = remote_filename, path = %final_path.display(), "downloading");
    let download = session.download(&url, &mut writer)?;
    if download.status != 200 {
        return Err(ProtocolError::HttpStatus {
            step: format!("download {}", remote_filename),
            status: download.status,
        }
        .into());
    }
    if writer.written() == 0 {
        return Err(TransferError::Incomplete {
            file: remote_filename.to_string(),
            bytes: 0,
        }
        .into());
    }
    let path = writer.finalize().map_err(|e| Error::storage(&final_path, e))?;

    let bytes = fs::metadata(&path).map_err(|e| Error::storage(&path, e))?.len();
    if bytes == 0 {
        return Err(TransferError::Incomplete {
            file: remote_filename.to_string(),
            bytes,
        }
        .into());
    }
    let md5 = checksum::md5_path(&path).map_err(|e| Error::storage(&path, e))?;

    let check = AjaxRequest::new(Action::CheckMd5)
        .param("file", remote_filename)
        .param("md5", md5.as_str());
    let verdict: DigestCheck = parse_json("check_md5", &session.send(&check.to_request(&site.base_url))?)?;

    let mut record = DownloadRecord {
        remote_filename: remote_filename.to_string(),
        local_path: path,
        md5,
        bytes,
        server_confirmed: false,
    };
    if !verdict.md5_match {
        let parked = rejected_path(&record.local_path);
        fs::rename(&record.local_path, &parked).map_err(|e| Error::storage(&parked, e))?;
        record.local_path = parked;
        let local = record.md5.clone();
        ledger.record(category, record);
        tracing::warn!(site = %site.id, file = remote_filename, "server rejected md5");
        return Err(TransferError::DigestMismatch {
            file: remote_filename.to_string(),
            local,
            server: verdict.md5_server.unwrap_or_default(),
        }
        .into());
    }

    record.server_confirmed = true;
    ledger.record(category, record.clone());
    tracing::info!(site = %site.id, file = remote_filename, bytes, md5 = %record.md5, "verified");
    Ok(record)
}
