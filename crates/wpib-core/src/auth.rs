//! WordPress form login on a cookie-carrying session.

use crate::error::{AuthError, Result};
use crate::http::{HttpSession, Request};
use crate::site::Site;

/// Log into the site's admin.
///
/// Fetches the login page first so the test cookie is set, then posts the
/// credentials. The session is authenticated only when the response body
/// contains the site's login marker; a 200 without it means rejected
/// credentials. On success the session's cookie jar holds the auth cookies
/// used by every later request.
pub fn authenticate(session: &mut dyn HttpSession, site: &Site) -> Result<()> {
    let login_url = site.login_url();
    let fetch_failed = |reason: String| AuthError::FetchFailed {
        url: login_url.clone(),
        reason,
    };

    let page = session.send(&Request::get(&login_url))?;
    if !page.is_success() {
        return Err(fetch_failed(format!("HTTP {}", page.status)).into());
    }
    if page.body.is_empty() {
        return Err(fetch_failed("empty body".to_string()).into());
    }

    let form = vec![
        ("log".to_string(), site.credentials.username.clone()),
        ("pwd".to_string(), site.credentials.password.clone()),
        ("wp-submit".to_string(), site.submit_label.clone()),
        ("redirect_to".to_string(), site.admin_url()),
        ("testcookie".to_string(), "1".to_string()),
    ];
    tracing::debug!(site = %site.id, user = %site.credentials.username, "posting login form");
    let resp = session.send(&Request::post_form(&login_url, form))?;
    if !resp.is_success() {
        return Err(fetch_failed(format!("login POST returned HTTP {}", resp.status)).into());
    }
    if !resp.text().contains(site.login_marker.as_str()) {
        return Err(AuthError::CredentialsRejected {
            username: site.credentials.username.clone(),
            marker: site.login_marker.clone(),
        }
        .into());
    }

    tracing::info!(site = %site.id, "logged in");
    Ok(())
}
