//! Error taxonomy for a backup run.
//!
//! Every kind is fatal for the current site; the batch driver wraps it in a
//! [`SiteFailure`] and moves on to the next site.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Failures of the login flow.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("login page {url} unavailable: {reason}")]
    FetchFailed { url: String, reason: String },
    #[error("credentials rejected for user {username}: {marker:?} not found in login response")]
    CredentialsRejected { username: String, marker: String },
}

/// The remote job answered with something the client cannot act on.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("{step}: HTTP {status}")]
    HttpStatus { step: String, status: u32 },
    #[error("{step}: unparsable response ({reason})")]
    BadResponse { step: String, reason: String },
    #[error("{step}: response has no usable `{field}`")]
    MissingField { step: String, field: &'static str },
    #[error("{step}: still not done after {attempts} polls")]
    Timeout { step: String, attempts: u32 },
}

/// A file transfer finished but cannot be accepted.
#[derive(Debug, Error)]
pub enum TransferError {
    #[error("{file}: incomplete download ({bytes} bytes on disk)")]
    Incomplete { file: String, bytes: u64 },
    #[error("{file}: md5 mismatch (local {local}, server {server})")]
    DigestMismatch {
        file: String,
        local: String,
        server: String,
    },
}

/// Connection-level failure reported by the HTTP session.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("{url}: {source}")]
    Curl {
        url: String,
        #[source]
        source: curl::Error,
    },
    #[error("{url}: writing response body failed: {source}")]
    Sink {
        url: String,
        #[source]
        source: io::Error,
    },
}

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
    #[error(transparent)]
    Transfer(#[from] TransferError),
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("cancelled during {0}")]
    Cancelled(String),
    #[error("credentials: {0}")]
    Credentials(String),
    #[error("site configuration: {0}")]
    Config(String),
    #[error("upload of {file} failed: {reason}")]
    Upload { file: String, reason: String },
    #[error("{}: {source}", .path.display())]
    Storage {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl Error {
    pub(crate) fn storage(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Error::Storage {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// An error tagged with the site whose run it aborted.
#[derive(Debug, Error)]
#[error("site {site}: {error}")]
pub struct SiteFailure {
    pub site: String,
    #[source]
    pub error: Error,
}
