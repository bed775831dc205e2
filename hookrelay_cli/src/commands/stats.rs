//! `hookrelay stats`

use anyhow::{Context, Result};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DebugResponse {
    host: String,
    is_production: bool,
    requests: i64,
    sockets: usize,
    endpoints: usize,
}

pub async fn run(server: &str) -> Result<()> {
    let response = reqwest::get(format!("{}/api/debug", server))
        .await
        .context("Failed to reach Hookrelay server")?;

    if !response.status().is_success() {
        anyhow::bail!("Server returned {}", response.status());
    }

    let stats: DebugResponse = response.json().await.context("Invalid response from server")?;

    println!("{:<12} {}", "HOST", stats.host);
    println!("{:<12} {}", "PRODUCTION", stats.is_production);
    println!("{:<12} {}", "REQUESTS", stats.requests);
    println!("{:<12} {}", "VIEWERS", stats.sockets);
    println!("{:<12} {}", "ENDPOINTS", stats.endpoints);

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_debug_response() {
        let stats: DebugResponse = serde_json::from_str(
            r#"{"host":"localhost:8080","isProduction":false,"requests":3,"sockets":1,"endpoints":1}"#,
        )
        .unwrap();
        assert_eq!(stats.requests, 3);
        assert_eq!(stats.sockets, 1);
        assert!(!stats.is_production);
    }
}
