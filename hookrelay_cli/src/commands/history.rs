//! `hookrelay history` - stored requests, newest first

use super::{endpoint_url, format_request};
use anyhow::{Context, Result};
use hookrelay_common::CapturedRequest;
use serde::Deserialize;

#[derive(Deserialize)]
struct RequestsResponse {
    requests: Vec<CapturedRequest>,
}

pub async fn run(server: &str, endpoint: &str, search: Option<&str>, limit: Option<u32>) -> Result<()> {
    let mut query: Vec<(&str, String)> = Vec::new();
    if let Some(search) = search {
        query.push(("search", search.to_string()));
    }
    if let Some(limit) = limit {
        query.push(("limit", limit.to_string()));
    }

    let url = endpoint_url(server, &["api", "endpoints"], endpoint, &["requests"])?;
    let response = reqwest::Client::new()
        .get(url)
        .query(&query)
        .send()
        .await
        .context("Failed to reach Hookrelay server")?;

    if !response.status().is_success() {
        anyhow::bail!("Server returned {}", response.status());
    }

    let body: RequestsResponse = response.json().await.context("Invalid response from server")?;

    if body.requests.is_empty() {
        println!("No requests captured for {}.", endpoint);
        return Ok(());
    }

    for request in &body.requests {
        println!("{}", format_request(request));
    }

    Ok(())
}
