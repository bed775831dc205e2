//! Read side: request history and diagnostics counts

use crate::db::{queries, StoreError};
use crate::directory::ConnectionDirectory;
use hookrelay_common::{constants, CapturedRequest};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use std::sync::Arc;

/// Query string of the history endpoint
#[derive(Debug, Default, Deserialize)]
pub struct HistoryParams {
    pub search: Option<String>,
    /// Signed so out-of-range values are clamped instead of rejected
    pub limit: Option<i64>,
}

/// Aggregate counts for the debug endpoint
#[derive(Debug, Clone, Serialize)]
pub struct Counts {
    pub requests: i64,
    pub sockets: usize,
    pub endpoints: usize,
}

#[derive(Clone)]
pub struct QueryService {
    db: SqlitePool,
    directory: Arc<ConnectionDirectory>,
    max_limit: u32,
}

impl QueryService {
    pub fn new(db: SqlitePool, directory: Arc<ConnectionDirectory>, max_limit: u32) -> Self {
        Self {
            db,
            directory,
            max_limit: max_limit.max(1),
        }
    }

    /// Page size actually used for a requested `limit`
    pub fn effective_limit(&self, limit: Option<i64>) -> u32 {
        match limit {
            Some(limit) => limit.clamp(1, i64::from(self.max_limit)) as u32,
            None => constants::DEFAULT_HISTORY_LIMIT.clamp(1, self.max_limit),
        }
    }

    /// Newest-first history of one endpoint
    pub async fn history(
        &self,
        endpoint_id: &str,
        params: &HistoryParams,
    ) -> Result<Vec<CapturedRequest>, StoreError> {
        let search = params.search.as_deref().unwrap_or_default();
        let limit = self.effective_limit(params.limit);
        queries::find_requests_for_endpoint(&self.db, endpoint_id, search, limit).await
    }

    pub async fn counts(&self) -> Result<Counts, StoreError> {
        Ok(Counts {
            requests: queries::count_requests(&self.db).await?,
            sockets: self.directory.connection_count(),
            endpoints: self.directory.endpoint_count(),
        })
    }
}
