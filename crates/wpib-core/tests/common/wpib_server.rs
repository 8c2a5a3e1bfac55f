//! Minimal HTTP/1.1 server emulating a WordPress site with the backup plugin.
//!
//! Login sets a test cookie on GET and an auth cookie on a valid POST (then
//! redirects to `wp-admin/`). Every `admin-ajax.php` call without the auth
//! cookie gets `403 -1`, like WordPress for unauthenticated admin requests.
//! One request per connection (`Connection: close`).

use md5::{Digest, Md5};
use serde_json::json;
use std::collections::{HashMap, HashSet};
use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

pub const USER: &str = "admin";
pub const PASSWORD: &str = "correct horse battery";
pub const SQL_NAME: &str = "wpib-db.sql.bz2";
const AUTH_COOKIE: &str = "wordpress_logged_in_wpib=admin%7C1700000000%7Ctoken";

pub fn archive_name(idx: u64) -> String {
    format!("wpib-{}.tar.bz2", idx)
}

#[derive(Debug, Clone)]
pub struct ServerOptions {
    pub num_archives: u64,
    /// Progress polls answered `done: false` before `done: true`.
    pub polls_per_step: u32,
    /// Files whose md5 check always fails.
    pub bad_md5: HashSet<String>,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            num_archives: 2,
            polls_per_step: 1,
            bad_md5: HashSet::new(),
        }
    }
}

#[derive(Default)]
struct State {
    progress: HashMap<String, u32>,
    ready: Vec<String>,
    downloaded: HashSet<String>,
    log: Vec<String>,
}

pub struct WpibServer {
    pub base_url: String,
    files: Arc<HashMap<String, Vec<u8>>>,
    state: Arc<Mutex<State>>,
}

impl WpibServer {
    /// `"<action> <step-or-file>"` for every authenticated admin-ajax request, in arrival order.
    pub fn ajax_log(&self) -> Vec<String> {
        self.state.lock().unwrap().log.clone()
    }

    pub fn body_of(&self, name: &str) -> Vec<u8> {
        self.files[name].clone()
    }
}

/// Starts the server in a background thread. It runs until the process exits.
pub fn start(opts: ServerOptions) -> WpibServer {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().unwrap().port();

    let mut files = HashMap::new();
    files.insert(SQL_NAME.to_string(), b"-- MySQL dump\nINSERT INTO wp_options;\n".repeat(64));
    for i in 0..opts.num_archives {
        files.insert(archive_name(i), vec![(i % 251) as u8; 32 * 1024 + i as usize]);
    }
    let files = Arc::new(files);
    let state = Arc::new(Mutex::new(State::default()));
    let opts = Arc::new(opts);

    {
        let files = Arc::clone(&files);
        let state = Arc::clone(&state);
        thread::spawn(move || {
            for stream in listener.incoming().flatten() {
                let (files, state, opts) = (Arc::clone(&files), Arc::clone(&state), Arc::clone(&opts));
                thread::spawn(move || handle(stream, &files, &state, &opts));
            }
        });
    }

    WpibServer {
        base_url: format!("http://127.0.0.1:{}/", port),
        files,
        state,
    }
}

struct Parsed {
    method: String,
    path: String,
    query: HashMap<String, String>,
    cookies: String,
    form: HashMap<String, String>,
}

fn read_request(stream: &mut TcpStream) -> Option<Parsed> {
    let mut data = Vec::new();
    let mut buf = [0u8; 8192];
    let header_end = loop {
        let n = stream.read(&mut buf).ok()?;
        if n == 0 {
            return None;
        }
        data.extend_from_slice(&buf[..n]);
        if let Some(pos) = data.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };
    let head = String::from_utf8_lossy(&data[..header_end]).into_owned();
    let mut lines = head.lines();
    let mut first = lines.next()?.split_whitespace();
    let method = first.next()?.to_string();
    let target = first.next()?.to_string();

    let mut content_length = 0usize;
    let mut cookies = String::new();
    for line in lines {
        if let Some((name, value)) = line.split_once(':') {
            let name = name.trim();
            if name.eq_ignore_ascii_case("content-length") {
                content_length = value.trim().parse().unwrap_or(0);
            } else if name.eq_ignore_ascii_case("cookie") {
                cookies = value.trim().to_string();
            }
        }
    }
    while data.len() < header_end + content_length {
        let n = stream.read(&mut buf).ok()?;
        if n == 0 {
            break;
        }
        data.extend_from_slice(&buf[..n]);
    }
    let body = &data[header_end..data.len().min(header_end + content_length)];

    let (path, query) = match target.split_once('?') {
        Some((p, q)) => (p.to_string(), parse_pairs(q.as_bytes())),
        None => (target, HashMap::new()),
    };
    Some(Parsed {
        method,
        path,
        query,
        cookies,
        form: parse_pairs(body),
    })
}

/// The plugin resolves names inside its own backup directory.
fn basename(name: &str) -> String {
    name.rsplit('/').next().unwrap_or("").to_string()
}

fn parse_pairs(raw: &[u8]) -> HashMap<String, String> {
    url::form_urlencoded::parse(raw).into_owned().collect()
}

fn respond(stream: &mut TcpStream, status: &str, extra_headers: &str, body: &[u8]) {
    let head = format!(
        "HTTP/1.1 {}\r\nContent-Length: {}\r\nConnection: close\r\n{}\r\n",
        status,
        body.len(),
        extra_headers
    );
    let _ = stream.write_all(head.as_bytes());
    let _ = stream.write_all(body);
}

fn json(stream: &mut TcpStream, v: serde_json::Value) {
    respond(
        stream,
        "200 OK",
        "Content-Type: application/json\r\n",
        v.to_string().as_bytes(),
    );
}

fn handle(
    mut stream: TcpStream,
    files: &HashMap<String, Vec<u8>>,
    state: &Mutex<State>,
    opts: &ServerOptions,
) {
    let _ = stream.set_read_timeout(Some(Duration::from_secs(5)));
    let _ = stream.set_write_timeout(Some(Duration::from_secs(5)));
    let req = match read_request(&mut stream) {
        Some(r) => r,
        None => return,
    };

    match (req.method.as_str(), req.path.as_str()) {
        ("GET", "/wp-login.php") => respond(
            &mut stream,
            "200 OK",
            "Set-Cookie: wordpress_test_cookie=WP%20Cookie%20check; path=/\r\n",
            b"<html><body class=\"login\"><form id=\"loginform\"></form></body></html>",
        ),
        ("POST", "/wp-login.php") => {
            let ok = req.cookies.contains("wordpress_test_cookie")
                && req.form.get("log").map(String::as_str) == Some(USER)
                && req.form.get("pwd").map(String::as_str) == Some(PASSWORD)
                && req.form.get("testcookie").map(String::as_str) == Some("1");
            if ok {
                let headers = format!("Set-Cookie: {}; path=/\r\nLocation: /wp-admin/\r\n", AUTH_COOKIE);
                respond(&mut stream, "302 Found", &headers, b"");
            } else {
                respond(
                    &mut stream,
                    "200 OK",
                    "",
                    b"<html><div id=\"login_error\">Incorrect password.</div></html>",
                );
            }
        }
        ("GET", "/wp-admin/") if req.cookies.contains(AUTH_COOKIE) => respond(
            &mut stream,
            "200 OK",
            "",
            b"<html class=\"wp-toolbar\"><body class=\"wp-admin\"></body></html>",
        ),
        ("GET", "/wp-admin/admin-ajax.php") => {
            if !req.cookies.contains(AUTH_COOKIE) {
                respond(&mut stream, "403 Forbidden", "", b"-1");
                return;
            }
            ajax(&mut stream, &req.query, files, state, opts);
        }
        _ => respond(&mut stream, "404 Not Found", "", b"not found"),
    }
}

fn ajax(
    stream: &mut TcpStream,
    q: &HashMap<String, String>,
    files: &HashMap<String, Vec<u8>>,
    state: &Mutex<State>,
    opts: &ServerOptions,
) {
    let get = |k: &str| q.get(k).cloned().unwrap_or_default();
    let action = get("action");
    let detail = if q.contains_key("list") {
        "list".to_string()
    } else {
        q.get("step")
            .or_else(|| q.get("filename"))
            .or_else(|| q.get("file"))
            .cloned()
            .unwrap_or_default()
    };
    let mut st = state.lock().unwrap();
    st.log.push(format!("{} {}", action, detail));

    let step_body = |step: &str, polls: u32| {
        if polls < opts.polls_per_step {
            return json!({ "done": false });
        }
        match step {
            "dump_sql" => json!({ "done": true, "files": [format!("/srv/www/wp-content/wpib/{}", SQL_NAME)] }),
            "list_md5" => json!({ "done": true, "num_archives": opts.num_archives.to_string() }),
            _ => json!({ "done": true }),
        }
    };

    match action.as_str() {
        "wpib_generate" if get("step") == "build_archives" => {
            let idx: u64 = get("arc_idx").parse().unwrap_or(u64::MAX);
            if idx < opts.num_archives {
                st.ready.push(archive_name(idx));
            }
            drop(st);
            json(stream, json!({ "done": false }));
        }
        "wpib_generate" => {
            let step = get("step");
            st.progress.insert(step.clone(), 0);
            drop(st);
            json(stream, step_body(&step, 0));
        }
        "wpib_check_progress" => {
            let step = get("step");
            let polls = {
                let p = st.progress.entry(step.clone()).or_insert(0);
                *p += 1;
                *p
            };
            drop(st);
            json(stream, step_body(&step, polls));
        }
        "wpib_download" if q.contains_key("list") => {
            let ready: Vec<String> = st
                .ready
                .iter()
                .filter(|n| !st.downloaded.contains(*n))
                .cloned()
                .collect();
            drop(st);
            json(stream, json!({ "files": ready }));
        }
        "wpib_download" => {
            let name = basename(&get("filename"));
            match files.get(&name) {
                Some(body) => {
                    st.downloaded.insert(name);
                    drop(st);
                    respond(stream, "200 OK", "Content-Type: application/octet-stream\r\n", body);
                }
                None => {
                    drop(st);
                    respond(stream, "404 Not Found", "", b"");
                }
            }
        }
        "wpib_check_md5" => {
            drop(st);
            let name = basename(&get("file"));
            let server = files
                .get(&name)
                .map(|b| hex::encode(Md5::digest(b)))
                .unwrap_or_default();
            let matched = server == get("md5") && !opts.bad_md5.contains(&name);
            json(stream, json!({ "md5_match": matched, "md5_server": server }));
        }
        _ => {
            drop(st);
            respond(stream, "400 Bad Request", "", b"0");
        }
    }
}
