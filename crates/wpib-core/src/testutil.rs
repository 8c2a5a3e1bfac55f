//! In-memory stand-in for a WordPress site running the backup plugin.

use md5::{Digest, Md5};
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};
use std::io::Write;
use std::path::Path;
use std::time::Duration;

use crate::config::SiteConfig;
use crate::control::CancelToken;
use crate::credentials::Credentials;
use crate::error::TransportError;
use crate::http::{Download, HttpSession, Method, Request, Response};
use crate::poller::PollPolicy;
use crate::retry::RetryPolicy;
use crate::run::RunContext;
use crate::site::Site;
use crate::upload::Uploader;

pub(crate) const BASE: &str = "https://blog.example.com/";
pub(crate) const SQL_NAME: &str = "wpib-db-20240101.sql.bz2";
pub(crate) const REMOTE_DIR: &str = "/var/www/wp-content/uploads/wpib/";

const LOGIN_PAGE: &str = "<html>\n<body class=\"login\">\n<form name=\"loginform\" id=\"loginform\">";
const ADMIN_PAGE: &str =
    "<!DOCTYPE html>\n<html class=\"wp-toolbar\">\n<body class=\"wp-admin\">\n<div id=\"wpadminbar\">";

pub(crate) fn archive_name(idx: u64) -> String {
    format!("wpib-arc-{}.tar.bz2", idx)
}

pub(crate) fn md5_hex(data: &[u8]) -> String {
    hex::encode(Md5::digest(data))
}

pub(crate) fn site() -> Site {
    site_with(SiteConfig::default())
}

pub(crate) fn site_with(cfg: SiteConfig) -> Site {
    Site::new(
        "blog",
        &cfg,
        Credentials {
            base_url: BASE.to_string(),
            username: "admin".to_string(),
            password: "correct horse".to_string(),
        },
    )
    .expect("valid test site")
}

pub(crate) fn fast_poll(max_attempts: u32) -> PollPolicy {
    PollPolicy {
        interval: Duration::ZERO,
        max_attempts,
        deadline: None,
    }
}

/// Uploader that remembers what it was handed.
#[derive(Default)]
pub(crate) struct RecordingUploader {
    pub uploaded: std::sync::Mutex<Vec<String>>,
}

impl Uploader for RecordingUploader {
    fn upload(&self, site_id: &str, local_path: &Path) -> anyhow::Result<()> {
        let name = local_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.uploaded
            .lock()
            .unwrap()
            .push(format!("{}/{}", site_id, name));
        Ok(())
    }
}

pub(crate) fn context<'a>(
    site: &'a Site,
    dest_dir: &'a Path,
    cancel: &'a CancelToken,
    uploader: &'a dyn Uploader,
) -> RunContext<'a> {
    RunContext {
        site,
        dest_dir,
        step_poll: fast_poll(50),
        list_poll: fast_poll(50),
        retry: RetryPolicy::default(),
        cancel,
        uploader,
    }
}

/// Scripted server state. Public knobs shape the behaviour; the rest is bookkeeping.
pub(crate) struct FakeWpib {
    /// `wpib_check_progress` calls answered with `done: false` before `done: true`.
    pub polls_per_step: u32,
    pub num_archives: u64,
    pub accept_login: bool,
    /// Empty `list=1` answers after each build trigger.
    pub empty_lists_before_ready: u32,
    /// The first build trigger makes every archive ready at once.
    pub eager_build: bool,
    /// Already downloaded archives keep showing up in the ready list.
    pub keep_downloaded_in_list: bool,
    /// Files whose digest check reports a mismatch.
    pub bad_md5: HashSet<String>,
    /// Remaining forced mismatches per file; reaching zero lets the check pass.
    pub bad_md5_times: HashMap<String, u32>,
    /// Step whose start request fails with the given HTTP status.
    pub fail_step: Option<(String, u32)>,
    /// Serve this file with an empty body.
    pub empty_file: Option<String>,
    /// Build index whose trigger is answered with a non-JSON body.
    pub garbled_build: Option<u64>,

    pub requests: Vec<Request>,
    pub builds: Vec<u64>,
    pub downloads: Vec<String>,
    files: HashMap<String, Vec<u8>>,
    progress: HashMap<String, u32>,
    ready: Vec<String>,
    empty_left: u32,
    downloaded: HashSet<String>,
}

impl FakeWpib {
    pub(crate) fn new(num_archives: u64) -> Self {
        let mut files = HashMap::new();
        files.insert(SQL_NAME.to_string(), b"-- sql dump\nCREATE TABLE wp_posts;\n".repeat(40));
        for i in 0..num_archives {
            files.insert(archive_name(i), format!("archive body #{}\n", i).repeat(500).into_bytes());
        }
        Self {
            polls_per_step: 2,
            num_archives,
            accept_login: true,
            empty_lists_before_ready: 1,
            eager_build: false,
            keep_downloaded_in_list: false,
            bad_md5: HashSet::new(),
            bad_md5_times: HashMap::new(),
            fail_step: None,
            empty_file: None,
            garbled_build: None,
            requests: Vec::new(),
            builds: Vec::new(),
            downloads: Vec::new(),
            files,
            progress: HashMap::new(),
            ready: Vec::new(),
            empty_left: 0,
            downloaded: HashSet::new(),
        }
    }

    pub(crate) fn body_of(&self, name: &str) -> &[u8] {
        &self.files[name]
    }

    /// `(action, step-or-file)` pairs of the ajax requests seen so far.
    pub(crate) fn ajax_log(&self) -> Vec<(String, String)> {
        self.requests
            .iter()
            .filter_map(|r| {
                let q = query(&r.url);
                let action = q.get("action")?.clone();
                let detail = q
                    .get("step")
                    .or_else(|| q.get("filename"))
                    .or_else(|| q.get("file"))
                    .cloned()
                    .or_else(|| q.get("list").map(|_| "list".to_string()))
                    .unwrap_or_default();
                Some((action, detail))
            })
            .collect()
    }

    pub(crate) fn count(&self, action: &str, detail: &str) -> usize {
        self.ajax_log()
            .iter()
            .filter(|(a, d)| a == action && d == detail)
            .count()
    }

    fn respond(&mut self, req: &Request) -> Response {
        let url = url::Url::parse(&req.url).expect("fake server got an invalid url");
        if url.path().ends_with("wp-login.php") {
            return match req.method {
                Method::Get => html(LOGIN_PAGE),
                Method::Post if self.accept_login => html(ADMIN_PAGE),
                Method::Post => html(LOGIN_PAGE),
            };
        }
        let q = query(&req.url);
        let get = |k: &str| q.get(k).cloned().unwrap_or_default();
        match get("action").as_str() {
            "wpib_generate" if get("step") == "build_archives" => {
                let idx: u64 = get("arc_idx").parse().expect("numeric arc_idx");
                self.build(idx);
                if self.garbled_build == Some(idx) {
                    return Response {
                        status: 200,
                        body: b"<br />Fatal error".to_vec(),
                    };
                }
                json_response(json!({ "done": false, "arc_idx": idx }))
            }
            "wpib_generate" => {
                let step = get("step");
                if let Some((failing, status)) = &self.fail_step {
                    if *failing == step {
                        return Response {
                            status: *status,
                            body: b"error".to_vec(),
                        };
                    }
                }
                self.progress.insert(step.clone(), 0);
                self.step_response(&step)
            }
            "wpib_check_progress" => {
                let step = get("step");
                *self.progress.entry(step.clone()).or_insert(0) += 1;
                self.step_response(&step)
            }
            "wpib_download" if q.contains_key("list") => {
                if self.empty_left > 0 {
                    self.empty_left -= 1;
                    return json_response(json!({ "files": [] }));
                }
                let files: Vec<String> = self
                    .ready
                    .iter()
                    .filter(|n| self.keep_downloaded_in_list || !self.downloaded.contains(*n))
                    .map(|n| format!("{}{}", REMOTE_DIR, n))
                    .collect();
                json_response(json!({ "files": files }))
            }
            "wpib_download" => {
                let name = get("filename");
                self.downloads.push(name.clone());
                if self.empty_file.as_deref() == Some(name.as_str()) {
                    return Response {
                        status: 200,
                        body: Vec::new(),
                    };
                }
                match self.files.get(&name) {
                    Some(body) => {
                        let body = body.clone();
                        self.downloaded.insert(name);
                        Response { status: 200, body }
                    }
                    None => Response {
                        status: 404,
                        body: b"not found".to_vec(),
                    },
                }
            }
            "wpib_check_md5" => {
                let name = get("file");
                let server = self
                    .files
                    .get(&name)
                    .map(|b| md5_hex(b))
                    .unwrap_or_default();
                let forced = match self.bad_md5_times.get_mut(&name) {
                    Some(left) if *left > 0 => {
                        *left -= 1;
                        true
                    }
                    _ => self.bad_md5.contains(&name),
                };
                if forced {
                    json_response(json!({ "md5_match": false, "md5_server": "abc" }))
                } else {
                    json_response(json!({ "md5_match": server == get("md5"), "md5_server": server }))
                }
            }
            _ => Response {
                status: 400,
                body: b"0".to_vec(),
            },
        }
    }

    fn build(&mut self, idx: u64) {
        self.builds.push(idx);
        if self.eager_build {
            if idx == 0 {
                self.ready = (0..self.num_archives).map(archive_name).collect();
            }
        } else if idx < self.num_archives {
            self.ready.push(archive_name(idx));
        }
        self.empty_left = self.empty_lists_before_ready;
    }

    fn step_response(&self, step: &str) -> Response {
        let polls = self.progress.get(step).copied().unwrap_or(0);
        if polls < self.polls_per_step {
            return json_response(json!({ "done": false, "step": step }));
        }
        let body = match step {
            "dump_sql" => json!({ "done": true, "files": [SQL_NAME] }),
            "list_md5" => json!({ "done": true, "num_archives": self.num_archives }),
            _ => json!({ "done": true, "files": [] }),
        };
        json_response(body)
    }
}

impl HttpSession for FakeWpib {
    fn send(&mut self, request: &Request) -> Result<Response, TransportError> {
        self.requests.push(request.clone());
        Ok(self.respond(request))
    }

    fn download(&mut self, url: &str, sink: &mut dyn Write) -> Result<Download, TransportError> {
        let request = Request::get(url);
        self.requests.push(request.clone());
        let resp = self.respond(&request);
        sink.write_all(&resp.body)
            .map_err(|source| TransportError::Sink {
                url: url.to_string(),
                source,
            })?;
        Ok(Download {
            status: resp.status,
            bytes: resp.body.len() as u64,
        })
    }
}

pub(crate) fn query(url: &str) -> HashMap<String, String> {
    url::Url::parse(url)
        .map(|u| u.query_pairs().into_owned().collect())
        .unwrap_or_default()
}

fn html(body: &str) -> Response {
    Response {
        status: 200,
        body: body.as_bytes().to_vec(),
    }
}

fn json_response(v: Value) -> Response {
    Response {
        status: 200,
        body: v.to_string().into_bytes(),
    }
}
