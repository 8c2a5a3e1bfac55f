//! Client engine for the WordPress incremental-backup plugin.
//!
//! A run logs into a site, drives the plugin's remote job steps, fetches the
//! database dump and every file archive, and accepts each file only after the
//! server has confirmed its MD5.

pub mod config;
pub mod logging;

pub mod auth;
pub mod checksum;
pub mod control;
pub mod credentials;
pub mod error;
pub mod http;
pub mod ledger;
pub mod orchestrator;
pub mod pipeline;
pub mod poller;
pub mod protocol;
pub mod retry;
pub mod run;
pub mod sanitize;
pub mod site;
pub mod storage;
pub mod transfer;
pub mod upload;

#[cfg(test)]
pub(crate) mod testutil;

pub use control::CancelToken;
pub use error::{Error, Result, SiteFailure};
pub use run::{run_sites, run_sites_with, BackupRun, SiteOutcome};
