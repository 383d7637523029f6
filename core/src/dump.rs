//! Debug dumps of requests and responses.
//!
//! Both dumps go to the `tracing` stream at `DEBUG` level under the
//! `fluent_request::dump` target. They fit the hook signatures, e.g.
//! `.before(|req| { dump_request(req); Ok(()) })`.

use std::fmt::Write as _;
use std::io;

use http::HeaderMap;
use tracing::debug;

use crate::http::{HttpRequest, HttpResponse};

/// Render `request` roughly as it would appear on the wire.
pub fn format_request(request: &HttpRequest) -> String {
    let url = &request.url;
    let mut target = url.path().to_string();
    if let Some(query) = url.query() {
        target.push('?');
        target.push_str(query);
    }

    let mut out = format!("{} {target} HTTP/1.1\r\n", request.method);
    if let Some(host) = url.host_str() {
        match url.port() {
            Some(port) => {
                let _ = write!(out, "Host: {host}:{port}\r\n");
            }
            None => {
                let _ = write!(out, "Host: {host}\r\n");
            }
        }
    }
    write_headers(&mut out, &request.headers);
    out.push_str("\r\n");
    if let Some(body) = &request.body {
        out.push_str(&String::from_utf8_lossy(body));
    }
    out
}

/// Render `response` with its full body. The body is buffered first and stays
/// readable afterwards.
pub fn format_response(response: &mut HttpResponse) -> io::Result<String> {
    let body = response.bytes()?;
    let mut out = format!("HTTP/1.1 {}\r\n", response.status);
    write_headers(&mut out, &response.headers);
    out.push_str("\r\n");
    out.push_str(&String::from_utf8_lossy(&body));
    Ok(out)
}

pub fn dump_request(request: &HttpRequest) {
    debug!(target: "fluent_request::dump", "request dump:\n{}", format_request(request));
}

pub fn dump_response(response: &mut HttpResponse) -> io::Result<()> {
    let dump = format_response(response)?;
    debug!(target: "fluent_request::dump", "response dump:\n{dump}");
    Ok(())
}

fn write_headers(out: &mut String, headers: &HeaderMap) {
    for (name, value) in headers {
        let _ = write!(out, "{name}: {}\r\n", String::from_utf8_lossy(value.as_bytes()));
    }
}
