//! CLI command implementations

pub mod history;
pub mod new;
pub mod stats;
pub mod watch;

use anyhow::Result;
use console::style;
use hookrelay_common::CapturedRequest;

/// Turn `http(s)://host` into `ws(s)://host`
pub fn websocket_base(server: &str) -> String {
    if let Some(rest) = server.strip_prefix("https://") {
        format!("wss://{}", rest)
    } else if let Some(rest) = server.strip_prefix("http://") {
        format!("ws://{}", rest)
    } else {
        format!("ws://{}", server)
    }
}

/// `base` + `prefix` + endpoint + `suffix`, with the endpoint percent-encoded
/// as a single path segment
pub fn endpoint_url(base: &str, prefix: &[&str], endpoint: &str, suffix: &[&str]) -> Result<reqwest::Url> {
    let mut url = reqwest::Url::parse(base)?;
    {
        let mut segments = url
            .path_segments_mut()
            .map_err(|_| anyhow::anyhow!("Invalid server URL: {}", base))?;
        segments
            .pop_if_empty()
            .extend(prefix)
            .push(endpoint)
            .extend(suffix);
    }
    Ok(url)
}

/// Multi-line human readable rendering of one captured request
pub fn format_request(request: &CapturedRequest) -> String {
    let mut out = format!(
        "{} {} {} {}\n",
        style(request.created_at.format("%Y-%m-%d %H:%M:%S%.3f")).dim(),
        style(&request.method).cyan().bold(),
        request.path,
        style(format!("from {}", request.source_ip)).dim(),
    );

    for (name, values) in request.headers.iter() {
        for value in values {
            out.push_str(&format!("  {}: {}\n", style(name).white().bold(), value));
        }
    }

    if !request.body.is_empty() {
        out.push('\n');
        for line in request.body.lines() {
            out.push_str(&format!("  {}\n", line));
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use hookrelay_common::HeaderDocument;

    #[test]
    fn test_websocket_base() {
        assert_eq!(websocket_base("http://localhost:8080"), "ws://localhost:8080");
        assert_eq!(websocket_base("https://relay.example"), "wss://relay.example");
        assert_eq!(websocket_base("relay.example"), "ws://relay.example");
    }

    #[test]
    fn test_endpoint_url_encodes_endpoint() {
        let url = endpoint_url("http://localhost:8080", &["api", "endpoints"], "a b/c?d", &["requests"]).unwrap();
        assert_eq!(url.as_str(), "http://localhost:8080/api/endpoints/a%20b%2Fc%3Fd/requests");

        let url = endpoint_url("ws://relay.example", &["ws"], "misty-river-4821", &[]).unwrap();
        assert_eq!(url.as_str(), "ws://relay.example/ws/misty-river-4821");

        assert!(endpoint_url("not a url", &[], "abc", &[]).is_err());
    }

    #[test]
    fn test_format_request() {
        console::set_colors_enabled(false);
        let request = CapturedRequest {
            id: Default::default(),
            endpoint_id: "abc".to_string(),
            method: "POST".to_string(),
            path: "/to/abc?x=1".to_string(),
            source_ip: "10.0.0.1".to_string(),
            body: "line one\nline two".to_string(),
            headers: [("x-test", "1"), ("x-test", "2")].into_iter().collect::<HeaderDocument>(),
            created_at: Utc::now(),
        };

        let out = format_request(&request);
        assert!(out.contains("POST /to/abc?x=1 from 10.0.0.1"));
        assert!(out.contains("  X-Test: 1\n  X-Test: 2\n"));
        assert!(out.ends_with("  line one\n  line two\n"));
    }
}
