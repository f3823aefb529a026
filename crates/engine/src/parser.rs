use std::sync::LazyLock;

use regex::Regex;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use tracing::{trace, warn};

use crate::api::Task;

static METHOD_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*([A-Z]+)\s+(https?://\S+)\s*$").expect("method/url regex must compile")
});
static BARE_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(https?://\S+)\s*$").expect("bare url regex must compile")
});
static HEADER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*([A-Za-z0-9_-]+):(.+)$").expect("header regex must compile")
});
static BLOCK_SEPARATOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^###.*$").expect("block separator regex must compile"));

/// The named input stream had content but no recognizable request structure.
#[derive(Debug, thiserror::Error)]
#[error("failed to parse request file {name:?}")]
pub struct ParseError {
    /// Stream name (file path, or `<stdin>`).
    pub name: String,
}

/// Parse `input` (named `name` for diagnostics) into tasks, auto-detecting
/// the dialect.
///
/// When every non-blank, non-comment line is a `METHOD URL` pair the input is
/// treated as the plain one-request-per-line format; anything else is parsed
/// as the JetBrains HTTP-file subset (`###`-separated blocks of request line,
/// headers, blank line, body). Malformed lines are logged and skipped; the
/// whole stream fails only when it has content but yields no task at all.
pub fn parse_tasks(name: &str, input: &str) -> Result<Vec<Task>, ParseError> {
    trace!("parsing {name:?}:\n{input}");

    let meaningful: Vec<&str> = input
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .collect();

    let tasks = if meaningful.iter().all(|line| METHOD_URL.is_match(line)) {
        parse_plain(&meaningful)
    } else {
        parse_structured(input)
    };

    if tasks.is_empty() && !meaningful.is_empty() {
        return Err(ParseError {
            name: name.to_string(),
        });
    }
    Ok(tasks)
}

fn parse_plain(lines: &[&str]) -> Vec<Task> {
    lines
        .iter()
        .filter_map(|line| {
            let caps = METHOD_URL.captures(line)?;
            Some(Task {
                url: caps[2].to_string(),
                method: caps[1].to_string(),
                headers: HeaderMap::new(),
                body: None,
            })
        })
        .collect()
}

fn parse_structured(input: &str) -> Vec<Task> {
    let mut tasks = Vec::new();
    for block in BLOCK_SEPARATOR.split(input) {
        if block.trim().is_empty() {
            continue;
        }
        if let Some(task) = parse_block(block) {
            tasks.push(task);
        }
    }
    tasks
}

fn parse_block(block: &str) -> Option<Task> {
    let mut lines = block.lines().filter(|line| !line.starts_with('#'));

    let request_line = lines.by_ref().find(|line| !line.trim().is_empty())?;
    let (method, url) = if let Some(caps) = METHOD_URL.captures(request_line) {
        (caps[1].to_string(), caps[2].to_string())
    } else if let Some(caps) = BARE_URL.captures(request_line) {
        // A bare URL without a method token is accepted as a GET.
        ("GET".to_string(), caps[1].to_string())
    } else {
        warn!("invalid request line, expected 'METHOD http(s)://<url>': {request_line:?}");
        return None;
    };

    let mut headers = HeaderMap::new();
    let mut body_lines: Vec<&str> = Vec::new();
    let mut in_body = false;
    for line in lines {
        if in_body {
            body_lines.push(line);
            continue;
        }
        if line.trim().is_empty() {
            in_body = true;
            continue;
        }
        let Some(caps) = HEADER.captures(line) else {
            warn!("skipping malformed header line: {line:?}");
            continue;
        };
        let value = caps[2].trim();
        if value.is_empty() {
            continue;
        }
        match (
            HeaderName::from_bytes(caps[1].as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(header_name), Ok(header_value)) => {
                headers.append(header_name, header_value);
            }
            _ => warn!("skipping invalid header: {line:?}"),
        }
    }

    let body = in_body.then(|| body_lines.join("\n").trim().to_string());
    let body = body.filter(|text| !text.is_empty());

    Some(Task {
        url,
        method,
        headers,
        body,
    })
}
