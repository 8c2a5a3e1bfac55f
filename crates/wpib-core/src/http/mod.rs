//! HTTP session abstraction.
//!
//! One session per site run. Implementations must keep a single cookie jar
//! for their whole lifetime so that every call after login is authenticated.

mod curl_session;
mod request;

pub use curl_session::CurlSession;
pub use request::{Action, AjaxRequest, AJAX_PATH};

use crate::error::TransportError;
use std::borrow::Cow;
use std::io::Write;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

/// A fully rendered request. POST bodies are url-encoded form fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub method: Method,
    pub url: String,
    pub form: Vec<(String, String)>,
}

impl Request {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: Method::Get,
            url: url.into(),
            form: Vec::new(),
        }
    }

    pub fn post_form(url: impl Into<String>, form: Vec<(String, String)>) -> Self {
        Self {
            method: Method::Post,
            url: url.into(),
            form,
        }
    }

    /// `application/x-www-form-urlencoded` body for POST requests.
    pub fn encoded_form(&self) -> String {
        url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(self.form.iter())
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: u32,
    pub body: Vec<u8>,
}

impl Response {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }
}

/// Outcome of a streamed download.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Download {
    pub status: u32,
    pub bytes: u64,
}

/// Blocking request/response transport with a persistent cookie session.
pub trait HttpSession {
    /// Perform a request and capture the whole (small) response body.
    fn send(&mut self, request: &Request) -> Result<Response, TransportError>;

    /// GET `url` and stream the body into `sink` without buffering it in memory.
    fn download(&mut self, url: &str, sink: &mut dyn Write) -> Result<Download, TransportError>;
}
