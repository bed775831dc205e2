//! Fan-out of captured requests to live viewers

use crate::directory::ConnectionDirectory;
use hookrelay_common::{CapturedRequest, ViewerEvent};
use std::sync::Arc;
use tokio::sync::mpsc::error::TrySendError;

/// Outcome of one broadcast
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    /// Viewers in the snapshot
    pub recipients: usize,
    /// Pushes that were queued on the viewer's channel
    pub delivered: usize,
    /// Viewers that were closed or too far behind
    pub failed: usize,
}

/// Pushes captured requests to every viewer of their endpoint.
///
/// Best effort: a viewer that is gone or whose buffer is full misses the
/// push, and the request stays available through the history API.
#[derive(Clone)]
pub struct Relay {
    directory: Arc<ConnectionDirectory>,
}

impl Relay {
    pub fn new(directory: Arc<ConnectionDirectory>) -> Self {
        Self { directory }
    }

    #[cfg(test)]
    pub fn directory(&self) -> &Arc<ConnectionDirectory> {
        &self.directory
    }

    /// Serialize `request` once and queue it for each current viewer
    pub fn broadcast(&self, request: &CapturedRequest) -> BroadcastReport {
        let recipients = self.directory.recipients(&request.endpoint_id);
        let mut report = BroadcastReport {
            recipients: recipients.len(),
            ..BroadcastReport::default()
        };

        if recipients.is_empty() {
            return report;
        }

        let payload: Arc<str> = match ViewerEvent::Request(request.clone()).to_json() {
            Ok(json) => json.into(),
            Err(e) => {
                tracing::error!("Failed to serialize request {}: {}", request.id, e);
                report.failed = report.recipients;
                return report;
            }
        };

        for (connection_id, sender) in recipients {
            match sender.try_send(payload.clone()) {
                Ok(()) => report.delivered += 1,
                Err(TrySendError::Full(_)) => {
                    tracing::debug!("Viewer {} is lagging, dropped request {}", connection_id, request.id);
                    report.failed += 1;
                }
                Err(TrySendError::Closed(_)) => {
                    tracing::debug!("Viewer {} already closed", connection_id);
                    report.failed += 1;
                }
            }
        }

        report
    }
}
