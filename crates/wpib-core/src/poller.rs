//! Start-then-poll loops against `wpib_generate` / `wpib_check_progress`, and
//! the ready-file listing used between archive builds.

use std::time::{Duration, Instant};

use crate::control::CancelToken;
use crate::error::{Error, ProtocolError, Result};
use crate::http::{Action, AjaxRequest, HttpSession};
use crate::protocol::{parse_json, FileList, StepResult};
use crate::site::Site;

/// Bounds for one polling loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    /// Pause between two polls.
    pub interval: Duration,
    /// Polls allowed before giving up (the start request is not counted).
    pub max_attempts: u32,
    /// Wall-clock bound for the whole loop.
    pub deadline: Option<Duration>,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
            max_attempts: 600,
            deadline: None,
        }
    }
}

/// Call `attempt` until it yields a value, sleeping `policy.interval` between calls.
///
/// Errors from `attempt` end the loop immediately. Running out of attempts or
/// passing the deadline yields [`ProtocolError::Timeout`].
pub(crate) fn poll_until<T, F>(
    policy: &PollPolicy,
    cancel: &CancelToken,
    label: &str,
    mut attempt: F,
) -> Result<T>
where
    F: FnMut(u32) -> Result<Option<T>>,
{
    let started = Instant::now();
    let mut made = 0u32;
    while made < policy.max_attempts {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled(label.to_string()));
        }
        made += 1;
        if let Some(value) = attempt(made)? {
            return Ok(value);
        }
        if made == policy.max_attempts || policy.deadline.is_some_and(|d| started.elapsed() >= d) {
            break;
        }
        if !cancel.sleep(policy.interval) {
            return Err(Error::Cancelled(label.to_string()));
        }
    }
    Err(ProtocolError::Timeout {
        step: label.to_string(),
        attempts: made,
    }
    .into())
}

/// Drive a named step to completion and return its final result.
///
/// Sends `wpib_generate&step=<step>` with the site's `php_path` and any
/// `extra` parameters, then polls `wpib_check_progress` until `done`.
pub fn run_step(
    session: &mut dyn HttpSession,
    site: &Site,
    step: &str,
    extra: &[(&'static str, &str)],
    policy: &PollPolicy,
    cancel: &CancelToken,
) -> Result<StepResult> {
    if cancel.is_cancelled() {
        return Err(Error::Cancelled(step.to_string()));
    }

    let mut start = AjaxRequest::new(Action::Generate)
        .param("step", step)
        .opt_param("php_path", site.php_path.as_deref());
    for (key, value) in extra {
        start = start.param(*key, *value);
    }
    tracing::debug!(site = %site.id, step, "starting step");
    let first = StepResult::parse(step, &session.send(&start.to_request(&site.base_url))?)?;
    if first.done {
        tracing::info!(site = %site.id, step, polls = 0, "step done");
        return Ok(first);
    }

    let check = AjaxRequest::new(Action::CheckProgress).param("step", step);
    let result = poll_until(policy, cancel, step, |attempt| {
        let r = StepResult::parse(step, &session.send(&check.to_request(&site.base_url))?)?;
        tracing::trace!(site = %site.id, step, attempt, done = r.done, "progress");
        Ok(r.done.then_some(r))
    })?;
    tracing::info!(site = %site.id, step, "step done");
    Ok(result)
}

/// Poll `wpib_download&list=1` until the server reports at least one file
/// accepted by `is_fresh`. Returns the accepted names in server order.
pub fn wait_for_ready_files<F>(
    session: &mut dyn HttpSession,
    site: &Site,
    policy: &PollPolicy,
    cancel: &CancelToken,
    mut is_fresh: F,
) -> Result<Vec<String>>
where
    F: FnMut(&str) -> bool,
{
    const LABEL: &str = "list_ready";
    let list = AjaxRequest::new(Action::Download).param("list", "1");
    poll_until(policy, cancel, LABEL, |attempt| {
        let resp = session.send(&list.to_request(&site.base_url))?;
        let FileList { files } = parse_json(LABEL, &resp)?;
        let listed = files.len();
        let fresh: Vec<String> = files.into_iter().filter(|f| is_fresh(f.as_str())).collect();
        tracing::debug!(site = %site.id, attempt, listed, fresh = fresh.len(), "ready list");
        Ok((!fresh.is_empty()).then_some(fresh))
    })
}
