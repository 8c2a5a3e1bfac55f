//! Builder for `admin-ajax.php` requests: action plus ordered optional parameters.

use super::Request;

/// Path of the ajax endpoint relative to the site base URL.
pub const AJAX_PATH: &str = "wp-admin/admin-ajax.php";

/// Ajax actions exposed by the backup plugin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Advance a named step, or trigger an archive build.
    Generate,
    /// Poll completion of a step.
    CheckProgress,
    /// Stream a file, or list ready files with `list=1`.
    Download,
    /// Server-side digest confirmation.
    CheckMd5,
}

impl Action {
    pub fn as_str(self) -> &'static str {
        match self {
            Action::Generate => "wpib_generate",
            Action::CheckProgress => "wpib_check_progress",
            Action::Download => "wpib_download",
            Action::CheckMd5 => "wpib_check_md5",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AjaxRequest {
    action: Action,
    params: Vec<(&'static str, String)>,
}

impl AjaxRequest {
    pub fn new(action: Action) -> Self {
        Self {
            action,
            params: Vec::new(),
        }
    }

    pub fn action(&self) -> Action {
        self.action
    }

    pub fn param(mut self, key: &'static str, value: impl Into<String>) -> Self {
        self.params.push((key, value.into()));
        self
    }

    /// Append `key=value` only when a value is present.
    pub fn opt_param(self, key: &'static str, value: Option<&str>) -> Self {
        match value {
            Some(v) => self.param(key, v),
            None => self,
        }
    }

    /// Value of the first parameter named `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Render against a base URL that ends with `/`.
    pub fn url(&self, base_url: &str) -> String {
        let mut query = url::form_urlencoded::Serializer::new(String::new());
        query.append_pair("action", self.action.as_str());
        for (k, v) in &self.params {
            query.append_pair(k, v);
        }
        format!("{}{}?{}", base_url, AJAX_PATH, query.finish())
    }

    pub fn to_request(&self, base_url: &str) -> Request {
        Request::get(self.url(base_url))
    }
}
