//! `hookrelay new`

use anyhow::{Context, Result};
use console::style;
use hookrelay_common::constants;

/// Ask the server for a fresh endpoint and print its URLs
pub async fn run(server: &str) -> Result<()> {
    let client = reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()?;

    let response = client
        .post(format!("{}/endpoint", server))
        .send()
        .await
        .context("Failed to reach Hookrelay server")?;

    if !response.status().is_redirection() {
        anyhow::bail!("Unexpected response from server: {}", response.status());
    }

    let location = response
        .headers()
        .get(reqwest::header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .context("Server did not return the new endpoint")?;
    let endpoint = endpoint_from_location(location)?;

    println!("{} {}", style("Endpoint:").dim(), style(&endpoint).green().bold());
    println!(
        "{} {}{}{}",
        style("Send to:").dim(),
        server,
        constants::CAPTURE_PREFIX,
        endpoint
    );
    println!("{} {}/{}", style("Inspect:").dim(), server, endpoint);
    println!();
    println!("Watch it with: {}", style(format!("hookrelay watch {}", endpoint)).cyan());

    Ok(())
}

fn endpoint_from_location(location: &str) -> Result<String> {
    let endpoint = location.rsplit('/').next().unwrap_or_default();
    if endpoint.is_empty() {
        anyhow::bail!("Malformed endpoint location: {}", location);
    }
    Ok(endpoint.to_string())
}
