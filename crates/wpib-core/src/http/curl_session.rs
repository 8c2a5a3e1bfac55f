//! libcurl-backed session: one reused Easy handle with the cookie engine on.

use curl::easy::Easy;
use std::io::{self, Write};
use std::time::Duration;

use super::{Download, HttpSession, Method, Request, Response};
use crate::config::HttpConfig;
use crate::error::TransportError;

/// A cookie-persisting HTTP session.
///
/// Cookies set by any response (login page, login POST, redirects) live in the
/// handle's in-memory jar and are sent with every later request. Dropping the
/// session discards the jar.
pub struct CurlSession {
    easy: Easy,
}

impl CurlSession {
    pub fn new(cfg: &HttpConfig) -> Result<Self, curl::Error> {
        let mut easy = Easy::new();
        // An empty cookie file name turns the cookie engine on without reading anything.
        easy.cookie_file("")?;
        easy.cookie_session(true)?;
        easy.follow_location(true)?;
        easy.max_redirections(10)?;
        easy.useragent(&cfg.user_agent)?;
        easy.connect_timeout(Duration::from_secs(cfg.connect_timeout_secs))?;
        easy.timeout(Duration::from_secs(cfg.timeout_secs))?;
        if cfg.insecure_tls {
            easy.ssl_verify_peer(false)?;
            easy.ssl_verify_host(false)?;
        }
        Ok(Self { easy })
    }

    fn prepare(&mut self, method: Method, url: &str, body: &str) -> Result<(), curl::Error> {
        self.easy.url(url)?;
        match method {
            Method::Get => self.easy.get(true)?,
            Method::Post => {
                self.easy.post(true)?;
                self.easy.post_fields_copy(body.as_bytes())?;
            }
        }
        Ok(())
    }
}

impl HttpSession for CurlSession {
    fn send(&mut self, request: &Request) -> Result<Response, TransportError> {
        let curl_err = |source| TransportError::Curl {
            url: request.url.clone(),
            source,
        };
        let body = match request.method {
            Method::Get => String::new(),
            Method::Post => request.encoded_form(),
        };
        self.prepare(request.method, &request.url, &body)
            .map_err(curl_err)?;

        let mut response_body = Vec::new();
        {
            let mut transfer = self.easy.transfer();
            transfer
                .write_function(|data| {
                    response_body.extend_from_slice(data);
                    Ok(data.len())
                })
                .map_err(curl_err)?;
            transfer.perform().map_err(curl_err)?;
        }

        let status = self.easy.response_code().map_err(curl_err)?;
        Ok(Response {
            status,
            body: response_body,
        })
    }

    fn download(&mut self, url: &str, sink: &mut dyn Write) -> Result<Download, TransportError> {
        let curl_err = |source| TransportError::Curl {
            url: url.to_string(),
            source,
        };
        self.prepare(Method::Get, url, "").map_err(curl_err)?;

        let mut bytes = 0u64;
        let mut sink_error: Option<io::Error> = None;
        let performed = {
            let mut transfer = self.easy.transfer();
            transfer
                .write_function(|data| match sink.write_all(data) {
                    Ok(()) => {
                        bytes += data.len() as u64;
                        Ok(data.len())
                    }
                    Err(e) => {
                        sink_error = Some(e);
                        Ok(0) // abort transfer
                    }
                })
                .map_err(curl_err)?;
            transfer.perform()
        };

        if let Err(e) = performed {
            if let Some(source) = sink_error {
                return Err(TransportError::Sink {
                    url: url.to_string(),
                    source,
                });
            }
            return Err(curl_err(e));
        }

        let status = self.easy.response_code().map_err(curl_err)?;
        Ok(Download { status, bytes })
    }
}
