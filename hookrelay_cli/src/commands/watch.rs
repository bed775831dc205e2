//! `hookrelay watch` - live stream of an endpoint

use super::{endpoint_url, format_request, websocket_base};
use anyhow::{Context, Result};
use console::style;
use futures_util::{SinkExt, StreamExt};
use hookrelay_common::{constants, ViewerEvent};
use tokio_tungstenite::{connect_async, tungstenite::Message};

pub async fn run(server: &str, endpoint: &str, json: bool) -> Result<()> {
    let prefix = constants::VIEWER_PREFIX.trim_matches('/');
    let url = endpoint_url(&websocket_base(server), &[prefix], endpoint, &[])?;
    tracing::debug!("Connecting to {}", url);

    let (ws_stream, _) = connect_async(url.as_str())
        .await
        .context("Failed to connect to Hookrelay server")?;
    let (mut write, mut read) = ws_stream.split();

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            msg = read.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => match ViewerEvent::from_json(text.as_str()) {
                        Ok(ViewerEvent::Connected { .. }) => {
                            if !json {
                                eprintln!(
                                    "{} {} {}",
                                    style("Watching").dim(),
                                    style(endpoint).green().bold(),
                                    style("(Ctrl+C to stop)").dim()
                                );
                            }
                        }
                        Ok(ViewerEvent::Request(request)) => {
                            if json {
                                println!("{}", serde_json::to_string(&request)?);
                            } else {
                                println!("{}", format_request(&request));
                            }
                        }
                        Err(e) => tracing::warn!("Ignoring unreadable event: {}", e),
                    },
                    Some(Ok(Message::Close(_))) | None => {
                        anyhow::bail!("Server closed the connection");
                    }
                    // Pings are answered by tungstenite
                    Some(Ok(_)) => {}
                    Some(Err(e)) => return Err(e).context("WebSocket error"),
                }
            }
            _ = &mut ctrl_c => {
                let _ = write.send(Message::Close(None)).await;
                return Ok(());
            }
        }
    }
}
