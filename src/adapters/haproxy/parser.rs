//! Best-effort reader for rendered haproxy config files.
//!
//! A `frontend <name>` or `backend <name>` line opens a section; the indented
//! lines after it, up to the next blank line or end of file, are matched
//! against the directives this crate renders. Anything else is ignored, so
//! only structurally simple files read back exactly.

use crate::core::entities::{BackendPool, Listener, Member};
use crate::ports::config_renderer::{RenderError, RenderResult};

pub fn parse_config(text: &str) -> RenderResult<(Vec<Listener>, Vec<BackendPool>)> {
    let lines: Vec<&str> = text.lines().map(str::trim).collect();
    let mut listeners = Vec::new();
    let mut pools = Vec::new();

    let mut i = 0;
    while i < lines.len() {
        let line = lines[i];
        i += 1;

        if let Some(name) = section_name(line, "frontend") {
            let body = block(&lines[i..]);
            i += body.len();
            listeners.push(parse_frontend(name, body));
        } else if let Some(name) = section_name(line, "backend") {
            let body = block(&lines[i..]);
            i += body.len();
            pools.push(parse_backend(name, body)?);
        }
    }

    Ok((listeners, pools))
}

fn section_name<'a>(line: &'a str, keyword: &str) -> Option<&'a str> {
    line.strip_prefix(keyword)
        .and_then(|rest| rest.strip_prefix(' '))
        .map(str::trim)
        .filter(|name| !name.is_empty())
}

// Lines following a section header, up to the first blank line
fn block<'a, 'b>(lines: &'b [&'a str]) -> &'b [&'a str] {
    let end = lines
        .iter()
        .position(|line| line.is_empty())
        .unwrap_or(lines.len());
    &lines[..end]
}

fn directive<'a>(line: &'a str, name: &str) -> Option<&'a str> {
    line.strip_prefix(name)
        .and_then(|rest| rest.strip_prefix(' '))
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

fn parse_frontend(name: &str, body: &[&str]) -> Listener {
    let mut listener = Listener::new(name);
    for line in body {
        if let Some(value) = directive(line, "bind") {
            listener.bind = value.to_string();
        } else if let Some(value) = directive(line, "mode") {
            listener.mode = value.to_string();
        } else if let Some(value) = directive(line, "default_backend") {
            listener.default_backend = value.to_string();
        } else if let Some(value) = directive(line, "option") {
            listener.option = value.to_string();
        }
    }
    listener
}

fn parse_backend(name: &str, body: &[&str]) -> RenderResult<BackendPool> {
    let mut pool = BackendPool::new(name);
    for line in body {
        if let Some(value) = directive(line, "balance") {
            pool.balance = value.to_string();
        } else if let Some(value) = directive(line, "mode") {
            pool.mode = value.to_string();
        } else if let Some(value) = directive(line, "server") {
            pool.members.push(parse_server(name, value)?);
        }
    }
    Ok(pool)
}

// `<name> <host>:<port> check inter <ms>`
fn parse_server(backend: &str, value: &str) -> RenderResult<Member> {
    let invalid = |reason: String| RenderError::Format {
        backend: backend.to_string(),
        reason,
    };

    let fields: Vec<&str> = value.split_whitespace().collect();
    if fields.len() != 5 {
        return Err(invalid(format!(
            "expected 5 fields in server line, found {}",
            fields.len()
        )));
    }

    let (host, port) = fields[1]
        .rsplit_once(':')
        .ok_or_else(|| invalid(format!("'{}' is not host:port", fields[1])))?;
    let port = port
        .parse::<u16>()
        .map_err(|e| invalid(format!("bad port '{port}': {e}")))?;

    Ok(Member::new(fields[0], host, port))
}
