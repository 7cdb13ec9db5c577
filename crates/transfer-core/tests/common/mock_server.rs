//! Minimal HTTP/1.1 server supporting HEAD, Range GET, and PUT/POST for
//! integration tests. Extended from a HEAD/range-GET-only server with write
//! support and transient-failure simulation for the retry engine's tests.

use std::io::{Read, Write};
use std::net::TcpListener;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;

#[derive(Debug, Clone, Copy)]
pub struct ServerOptions {
    /// If false, HEAD returns 405 (simulates servers that block HEAD).
    pub head_allowed: bool,
    /// If false, GET ignores Range and always returns 200 with the full body.
    pub support_ranges: bool,
    /// If false, omit `Accept-Ranges: bytes` even if ranges are supported.
    pub advertise_ranges: bool,
    /// Returns 503 for this many upload/download attempts before succeeding.
    pub fail_first_n_requests: usize,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            head_allowed: true,
            support_ranges: true,
            advertise_ranges: true,
            fail_first_n_requests: 0,
        }
    }
}

/// One accepted upload, keyed by request path, recording the bytes written
/// by each PUT/POST so tests can assert on the reassembled content.
pub type UploadedParts = Arc<Mutex<std::collections::HashMap<String, Vec<u8>>>>;

pub struct MockServer {
    pub base_url: String,
    pub uploaded: UploadedParts,
    attempts: Arc<AtomicUsize>,
}

pub fn start(body: Vec<u8>) -> MockServer {
    start_with_options(body, ServerOptions::default())
}

pub fn start_with_options(body: Vec<u8>, opts: ServerOptions) -> MockServer {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().unwrap().port();
    let body = Arc::new(body);
    let uploaded: UploadedParts = Arc::new(Mutex::new(std::collections::HashMap::new()));
    let attempts = Arc::new(AtomicUsize::new(0));

    let uploaded_bg = Arc::clone(&uploaded);
    let attempts_bg = Arc::clone(&attempts);
    thread::spawn(move || {
        for stream in listener.incoming().flatten() {
            let body = Arc::clone(&body);
            let uploaded = Arc::clone(&uploaded_bg);
            let attempts = Arc::clone(&attempts_bg);
            thread::spawn(move || handle(stream, &body, opts, &uploaded, &attempts));
        }
    });

    MockServer { base_url: format!("http://127.0.0.1:{port}/"), uploaded, attempts }
}

impl MockServer {
    pub fn attempt_count(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

struct ParsedRequest<'a> {
    method: &'a str,
    path: &'a str,
    range: Option<(u64, u64)>,
    content_length: usize,
    header_end: usize,
}

fn handle(
    mut stream: std::net::TcpStream,
    body: &[u8],
    opts: ServerOptions,
    uploaded: &UploadedParts,
    attempts: &Arc<AtomicUsize>,
) {
    let _ = stream.set_read_timeout(Some(std::time::Duration::from_secs(5)));
    let _ = stream.set_write_timeout(Some(std::time::Duration::from_secs(5)));

    let mut buf = Vec::with_capacity(8192);
    let mut chunk = [0u8; 8192];
    let header_end = loop {
        let n = match stream.read(&mut chunk) {
            Ok(0) => return,
            Ok(n) => n,
            Err(_) => return,
        };
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = find_header_end(&buf) {
            break pos;
        }
        if buf.len() > 64 * 1024 {
            return;
        }
    };

    let request_text = match std::str::from_utf8(&buf[..header_end]) {
        Ok(s) => s,
        Err(_) => return,
    };
    let parsed = parse_headers(request_text, header_end);

    while buf.len() < parsed.header_end + parsed.content_length {
        let n = match stream.read(&mut chunk) {
            Ok(0) => break,
            Ok(n) => n,
            Err(_) => break,
        };
        buf.extend_from_slice(&chunk[..n]);
    }

    let attempt = attempts.fetch_add(1, Ordering::SeqCst);
    if attempt < opts.fail_first_n_requests {
        let _ = stream.write_all(b"HTTP/1.1 503 Service Unavailable\r\nContent-Length: 0\r\n\r\n");
        return;
    }

    match parsed.method {
        "HEAD" => respond_head(&mut stream, body.len() as u64, opts),
        "GET" => respond_get(&mut stream, body, parsed.range, opts),
        "PUT" | "POST" => {
            let payload = buf[parsed.header_end..parsed.header_end + parsed.content_length].to_vec();
            uploaded.lock().unwrap().insert(parsed.path.to_string(), payload);
            let _ = stream.write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 0\r\n\r\n");
        }
        _ => {
            let _ = stream.write_all(b"HTTP/1.1 405 Method Not Allowed\r\nContent-Length: 0\r\n\r\n");
        }
    }
}

fn find_header_end(buf: &[u8]) -> Option<usize> {
    buf.windows(4).position(|w| w == b"\r\n\r\n").map(|p| p + 4)
}

fn respond_head(stream: &mut std::net::TcpStream, total: u64, opts: ServerOptions) {
    if !opts.head_allowed {
        let _ = stream.write_all(b"HTTP/1.1 405 Method Not Allowed\r\nContent-Length: 0\r\n\r\n");
        return;
    }
    let accept_ranges = accept_ranges_header(opts);
    let response = format!("HTTP/1.1 200 OK\r\nContent-Length: {total}\r\n{accept_ranges}\r\n");
    let _ = stream.write_all(response.as_bytes());
}

fn respond_get(stream: &mut std::net::TcpStream, body: &[u8], range: Option<(u64, u64)>, opts: ServerOptions) {
    let total = body.len() as u64;
    let (status, content_range, slice) = if opts.support_ranges {
        match range {
            Some((start, end_incl)) => {
                let start = start.min(total);
                let end_incl = end_incl.min(total.saturating_sub(1));
                if start > end_incl {
                    ("416 Range Not Satisfiable", format!("bytes */{total}"), &body[0..0])
                } else {
                    let end_excl = (end_incl + 1).min(total) as usize;
                    let slice = body.get(start as usize..end_excl).unwrap_or(&body[0..0]);
                    ("206 Partial Content", format!("bytes {start}-{}/{total}", end_excl.saturating_sub(1)), slice)
                }
            }
            None => ("200 OK", format!("bytes 0-{}/{total}", total.saturating_sub(1)), body),
        }
    } else {
        ("200 OK", format!("bytes 0-{}/{total}", total.saturating_sub(1)), body)
    };
    let accept_ranges = accept_ranges_header(opts);
    let response = format!(
        "HTTP/1.1 {status}\r\nContent-Length: {}\r\nContent-Range: {content_range}\r\n{accept_ranges}\r\n",
        slice.len()
    );
    let _ = stream.write_all(response.as_bytes());
    let _ = stream.write_all(slice);
}

fn accept_ranges_header(opts: ServerOptions) -> &'static str {
    if opts.advertise_ranges && opts.support_ranges {
        "Accept-Ranges: bytes\r\n"
    } else {
        ""
    }
}

fn parse_headers(request: &str, header_end: usize) -> ParsedRequest<'_> {
    let mut method = "";
    let mut path = "/";
    let mut range = None;
    let mut content_length = 0usize;
    for (i, line) in request.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            break;
        }
        if i == 0 {
            let mut parts = line.split_whitespace();
            method = parts.next().unwrap_or("");
            path = parts.next().unwrap_or("/");
            continue;
        }
        if let Some((name, value)) = line.split_once(':') {
            let name = name.trim();
            let value = value.trim();
            if name.eq_ignore_ascii_case("range") && value.to_lowercase().starts_with("bytes=") {
                let part = value[6..].trim();
                if let Some((a, b)) = part.split_once('-') {
                    let start = a.trim().parse::<u64>().unwrap_or(0);
                    let end = b.trim();
                    let end_incl = if end.is_empty() { u64::MAX } else { end.parse::<u64>().unwrap_or(0) };
                    range = Some((start, end_incl));
                }
            } else if name.eq_ignore_ascii_case("content-length") {
                content_length = value.parse().unwrap_or(0);
            }
        }
    }
    ParsedRequest { method, path, range, content_length, header_end }
}
