//! In-process HTTP/1.1 server for integration tests: HEAD and `Range` GET
//! over a static body, one request per connection.
//!
//! Options can drop range support or just the `Accept-Ranges` header, cut a
//! body short, or fail every request for one block. GET requests are counted per range start.

use std::collections::HashMap;
use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

#[derive(Debug, Clone, Default)]
pub struct RangeServerOptions {
    /// If true, GET ignores Range, returns 200 with the whole body, and HEAD
    /// omits `Accept-Ranges`.
    pub no_ranges: bool,
    /// If true, HEAD omits `Accept-Ranges` but GET still honors Range.
    pub hide_accept_ranges: bool,
    /// Range start whose response announces the full length but closes after
    /// `truncate_to` bytes.
    pub truncate_at: Option<u64>,
    pub truncate_to: usize,
    /// Range start that always gets this status.
    pub fail_at: Option<(u64, u16)>,
    /// Sent on HEAD responses.
    pub content_disposition: Option<String>,
}

pub struct RangeServer {
    /// Object URL, e.g. "http://127.0.0.1:12345/object.bin".
    pub url: String,
    gets: Arc<Mutex<HashMap<u64, usize>>>,
}

impl RangeServer {
    /// GET requests seen for the range starting at `start` (0 for whole-body GETs).
    pub fn gets_for(&self, start: u64) -> usize {
        self.gets.lock().unwrap().get(&start).copied().unwrap_or(0)
    }

    pub fn total_gets(&self) -> usize {
        self.gets.lock().unwrap().values().sum()
    }
}

/// Serve `body` with default options until the process exits.
pub fn start(body: Vec<u8>) -> RangeServer {
    start_with_options(body, RangeServerOptions::default())
}

pub fn start_with_options(body: Vec<u8>, opts: RangeServerOptions) -> RangeServer {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().unwrap().port();
    let body = Arc::new(body);
    let opts = Arc::new(opts);
    let gets = Arc::new(Mutex::new(HashMap::new()));
    let counted = Arc::clone(&gets);
    thread::spawn(move || {
        for stream in listener.incoming().flatten() {
            let body = Arc::clone(&body);
            let opts = Arc::clone(&opts);
            let gets = Arc::clone(&counted);
            thread::spawn(move || handle(stream, &body, &opts, &gets));
        }
    });
    RangeServer {
        url: format!("http://127.0.0.1:{}/object.bin", port),
        gets,
    }
}

fn handle(
    mut stream: TcpStream,
    body: &[u8],
    opts: &RangeServerOptions,
    gets: &Mutex<HashMap<u64, usize>>,
) {
    let _ = stream.set_read_timeout(Some(Duration::from_secs(2)));
    let _ = stream.set_write_timeout(Some(Duration::from_secs(2)));
    let mut buf = [0u8; 8192];
    let n = match stream.read(&mut buf) {
        Ok(0) | Err(_) => return,
        Ok(n) => n,
    };
    let Ok(request) = std::str::from_utf8(&buf[..n]) else {
        return;
    };
    let (method, range) = parse_request(request);
    let total = body.len() as u64;

    if method.eq_ignore_ascii_case("HEAD") {
        let mut head = format!("HTTP/1.1 200 OK\r\nContent-Length: {}\r\n", total);
        if !opts.no_ranges && !opts.hide_accept_ranges {
            head.push_str("Accept-Ranges: bytes\r\n");
        }
        if let Some(cd) = &opts.content_disposition {
            head.push_str(&format!("Content-Disposition: {}\r\n", cd));
        }
        head.push_str("Connection: close\r\n\r\n");
        let _ = stream.write_all(head.as_bytes());
        return;
    }
    if !method.eq_ignore_ascii_case("GET") {
        let _ = stream.write_all(b"HTTP/1.1 405 Method Not Allowed\r\nConnection: close\r\n\r\n");
        return;
    }

    let range = if opts.no_ranges { None } else { range };
    let start = range.map(|(s, _)| s).unwrap_or(0);
    *gets.lock().unwrap().entry(start).or_insert(0) += 1;

    if let Some((at, code)) = opts.fail_at {
        if at == start {
            let response = format!(
                "HTTP/1.1 {} Forced\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
                code
            );
            let _ = stream.write_all(response.as_bytes());
            return;
        }
    }

    let (status, content_range, slice) = match range {
        Some((s, e)) if s >= total || s > e => {
            let response = format!(
                "HTTP/1.1 416 Range Not Satisfiable\r\nContent-Range: bytes */{}\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
                total
            );
            let _ = stream.write_all(response.as_bytes());
            return;
        }
        Some((s, e)) => {
            let end_excl = e.saturating_add(1).min(total) as usize;
            let slice = &body[s as usize..end_excl];
            (
                "206 Partial Content",
                Some(format!("bytes {}-{}/{}", s, end_excl - 1, total)),
                slice,
            )
        }
        None => ("200 OK", None, body),
    };

    let mut head = format!("HTTP/1.1 {}\r\nContent-Length: {}\r\n", status, slice.len());
    if let Some(cr) = content_range {
        head.push_str(&format!("Content-Range: {}\r\n", cr));
    }
    head.push_str("Connection: close\r\n\r\n");
    let _ = stream.write_all(head.as_bytes());

    let sent = match opts.truncate_at {
        Some(at) if at == start => &slice[..opts.truncate_to.min(slice.len())],
        _ => slice,
    };
    let _ = stream.write_all(sent);
    let _ = stream.flush();
}

/// Returns (method, optional (start, end_inclusive) for `Range: bytes=X-Y`).
fn parse_request(request: &str) -> (&str, Option<(u64, u64)>) {
    let mut lines = request.lines();
    let method = lines
        .next()
        .and_then(|l| l.split_whitespace().next())
        .unwrap_or("");
    let mut range = None;
    for line in lines {
        let line = line.trim();
        if line.is_empty() {
            break;
        }
        let Some((name, value)) = line.split_once(':') else {
            continue;
        };
        if !name.trim().eq_ignore_ascii_case("range") {
            continue;
        }
        let Some(spec) = value.trim().strip_prefix("bytes=") else {
            continue;
        };
        if let Some((a, b)) = spec.split_once('-') {
            let start = a.trim().parse::<u64>().unwrap_or(0);
            let end = b.trim().parse::<u64>().unwrap_or(u64::MAX);
            range = Some((start, end));
        }
    }
    (method, range)
}
