//! Capture pipeline: inbound request -> stored record -> live viewers

use crate::db::{queries, StoreError};
use crate::relay::{BroadcastReport, Relay};
use chrono::{DateTime, Utc};
use hookrelay_common::{CapturedRequest, HeaderDocument};
use sqlx::SqlitePool;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    #[error("Failed to store request: {0}")]
    Store(#[from] StoreError),
}

/// The parts of an inbound HTTP request that get recorded
#[derive(Debug, Clone)]
pub struct InboundRequest {
    pub endpoint_id: String,
    pub method: String,
    pub path: String,
    pub source_ip: String,
    pub body: String,
    pub headers: HeaderDocument,
}

/// Capture timestamps in whole microseconds that never go backwards, even
/// if the wall clock does.
#[derive(Debug, Default)]
pub struct MonotonicClock {
    last_micros: AtomicI64,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn now(&self) -> DateTime<Utc> {
        let wall = Utc::now().timestamp_micros();
        let previous = self.last_micros.fetch_max(wall, Ordering::AcqRel);
        let micros = previous.max(wall);
        DateTime::<Utc>::from_timestamp_micros(micros).unwrap_or_else(Utc::now)
    }
}

/// Records inbound requests and relays them once they are durable
#[derive(Clone)]
pub struct CaptureService {
    db: SqlitePool,
    relay: Relay,
    clock: Arc<MonotonicClock>,
}

impl CaptureService {
    pub fn new(db: SqlitePool, relay: Relay) -> Self {
        Self {
            db,
            relay,
            clock: Arc::new(MonotonicClock::new()),
        }
    }

    /// Store the request, then push it to viewers of its endpoint.
    ///
    /// The clock proposes `created_at` and the store may move it forward to
    /// keep it in insertion order; viewers get the stored value. Nothing is
    /// broadcast when the insert fails.
    pub async fn capture(
        &self,
        inbound: InboundRequest,
    ) -> Result<(CapturedRequest, BroadcastReport), CaptureError> {
        let mut request = CapturedRequest {
            id: Uuid::new_v4(),
            endpoint_id: inbound.endpoint_id,
            method: inbound.method,
            path: inbound.path,
            source_ip: inbound.source_ip,
            body: inbound.body,
            headers: inbound.headers,
            created_at: self.clock.now(),
        };

        request.created_at = queries::insert_request(&self.db, &request).await?;

        let report = self.relay.broadcast(&request);
        tracing::debug!(
            "Captured {} {} for endpoint {} ({} of {} viewers reached)",
            request.method,
            request.path,
            request.endpoint_id,
            report.delivered,
            report.recipients
        );

        Ok((request, report))
    }
}
