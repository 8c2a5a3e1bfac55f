//! JSON bodies returned by the backup plugin's ajax endpoints.

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::error::ProtocolError;
use crate::http::Response;

/// One poll response for a named step. Superseded by the next poll.
#[derive(Debug, Clone, PartialEq)]
pub struct StepResult {
    pub step_name: String,
    pub done: bool,
    /// Remaining fields of the response (`files`, `num_archives`, ...).
    pub payload: Map<String, Value>,
}

impl StepResult {
    /// Parse a step response. `done` is mandatory; everything else is payload.
    pub fn parse(step: &str, response: &Response) -> Result<Self, ProtocolError> {
        let mut payload = parse_object(step, response)?;
        let done = match payload.remove("done") {
            Some(Value::Bool(b)) => b,
            Some(other) => {
                return Err(ProtocolError::BadResponse {
                    step: step.to_string(),
                    reason: format!("`done` is not a boolean: {}", other),
                })
            }
            None => {
                return Err(ProtocolError::MissingField {
                    step: step.to_string(),
                    field: "done",
                })
            }
        };
        Ok(Self {
            step_name: step.to_string(),
            done,
            payload,
        })
    }

    /// `files` array of the payload, or an empty list when absent.
    pub fn files(&self) -> Vec<String> {
        match self.payload.get("files") {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect(),
            _ => Vec::new(),
        }
    }

    /// `num_archives` as a count. PHP may encode it as a number or a numeric string.
    pub fn num_archives(&self) -> Option<u64> {
        match self.payload.get("num_archives")? {
            Value::Number(n) => n.as_u64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }
}

/// Body of `wpib_download&list=1`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FileList {
    #[serde(default)]
    pub files: Vec<String>,
}

/// Body of `wpib_check_md5`.
#[derive(Debug, Clone, Deserialize)]
pub struct DigestCheck {
    #[serde(default)]
    pub md5_match: bool,
    #[serde(default)]
    pub md5_server: Option<String>,
}

/// Require HTTP 200 and a non-empty body, then decode it as `T`.
pub fn parse_json<T>(step: &str, response: &Response) -> Result<T, ProtocolError>
where
    T: for<'de> Deserialize<'de>,
{
    check_body(step, response)?;
    let bad = |e: serde_json::Error| ProtocolError::BadResponse {
        step: step.to_string(),
        reason: format!("{} in {:?}", e, snippet(response)),
    };
    // Through `Value` so repeated keys resolve to the last occurrence, as PHP does.
    let value: Value = serde_json::from_slice(&response.body).map_err(bad)?;
    serde_json::from_value(value).map_err(bad)
}

fn parse_object(step: &str, response: &Response) -> Result<Map<String, Value>, ProtocolError> {
    match parse_json::<Value>(step, response)? {
        Value::Object(map) => Ok(map),
        other => Err(ProtocolError::BadResponse {
            step: step.to_string(),
            reason: format!("expected a JSON object, got {}", other),
        }),
    }
}

fn check_body(step: &str, response: &Response) -> Result<(), ProtocolError> {
    if response.status != 200 {
        return Err(ProtocolError::HttpStatus {
            step: step.to_string(),
            status: response.status,
        });
    }
    if response.body.iter().all(u8::is_ascii_whitespace) {
        return Err(ProtocolError::BadResponse {
            step: step.to_string(),
            reason: "empty body".to_string(),
        });
    }
    Ok(())
}

/// Leading part of a body for error messages.
fn snippet(response: &Response) -> String {
    const MAX: usize = 80;
    let text = response.text();
    let mut end = text.len().min(MAX);
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    text[..end].to_string()
}
