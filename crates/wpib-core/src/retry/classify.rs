//! Classify transfer failures into retry policy error kinds.

use crate::error::{Error, TransportError};
use crate::retry::policy::ErrorKind;

/// Classify a curl error for retry decisions.
pub fn classify_curl_error(e: &curl::Error) -> ErrorKind {
    if e.is_operation_timedout() {
        return ErrorKind::Timeout;
    }
    if e.is_couldnt_connect()
        || e.is_couldnt_resolve_host()
        || e.is_couldnt_resolve_proxy()
        || e.is_read_error()
        || e.is_recv_error()
        || e.is_send_error()
        || e.is_got_nothing()
        || e.is_partial_file()
    {
        return ErrorKind::Connection;
    }
    ErrorKind::Other
}

/// Classify a run error. Only transport hiccups and integrity failures are retryable.
pub fn classify(e: &Error) -> ErrorKind {
    match e {
        Error::Transport(TransportError::Curl { source, .. }) => classify_curl_error(source),
        Error::Transfer(_) => ErrorKind::Integrity,
        _ => ErrorKind::Other,
    }
}
