//! Database connection, row mapping and the request store queries

use chrono::{DateTime, Utc};
use hookrelay_common::{CapturedRequest, HeaderDocument, ProtocolError};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;
use uuid::Uuid;

/// Errors from the persisted request store
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Header document error: {0}")]
    Headers(#[from] ProtocolError),

    #[error("Corrupt request row {id}: {reason}")]
    Corrupt { id: String, reason: &'static str },
}

/// Initialize the database connection pool
///
/// In-memory databases live and die with their connection, so they get a
/// single connection that is never recycled.
pub async fn init_pool(database_url: &str) -> Result<SqlitePool, sqlx::Error> {
    let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);

    let in_memory = database_url.contains(":memory:") || database_url.contains("mode=memory");
    let pool_options = if in_memory {
        SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
    } else {
        SqlitePoolOptions::new().max_connections(10)
    };

    pool_options.connect_with(options).await
}

/// Run database migrations
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}

/// Raw `requests` row
#[derive(Debug, sqlx::FromRow)]
struct RequestRow {
    id: String,
    endpoint_id: String,
    method: String,
    path: String,
    source_ip: String,
    body: String,
    headers: String,
    created_at: i64,
}

impl RequestRow {
    fn into_captured(self) -> Result<CapturedRequest, StoreError> {
        let id = Uuid::parse_str(&self.id).map_err(|_| StoreError::Corrupt {
            id: self.id.clone(),
            reason: "id is not a UUID",
        })?;
        let created_at = DateTime::<Utc>::from_timestamp_micros(self.created_at).ok_or_else(|| {
            StoreError::Corrupt {
                id: self.id.clone(),
                reason: "created_at out of range",
            }
        })?;

        Ok(CapturedRequest {
            id,
            endpoint_id: self.endpoint_id,
            method: self.method,
            path: self.path,
            source_ip: self.source_ip,
            body: self.body,
            headers: HeaderDocument::from_json(&self.headers)?,
            created_at,
        })
    }
}

/// Database queries
pub mod queries {
    use super::*;

    /// Append a captured request and return the `created_at` it was stored with.
    ///
    /// The stored time is never earlier than the newest row already present.
    /// SQLite runs one write at a time, so rows come out in the same order
    /// whether they are read by `seq` or by `created_at`.
    pub async fn insert_request(
        pool: &SqlitePool,
        request: &CapturedRequest,
    ) -> Result<DateTime<Utc>, StoreError> {
        let headers = request.headers.to_json()?;

        let created_at: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO requests (id, endpoint_id, method, path, source_ip, body, headers, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7,
                    max(?8, coalesce((SELECT max(created_at) FROM requests), ?8)))
            RETURNING created_at
            "#,
        )
        .bind(request.id.to_string())
        .bind(&request.endpoint_id)
        .bind(&request.method)
        .bind(&request.path)
        .bind(&request.source_ip)
        .bind(&request.body)
        .bind(headers)
        .bind(request.created_at.timestamp_micros())
        .fetch_one(pool)
        .await?;

        DateTime::<Utc>::from_timestamp_micros(created_at).ok_or_else(|| StoreError::Corrupt {
            id: request.id.to_string(),
            reason: "created_at out of range",
        })
    }

    /// Total number of stored requests
    pub async fn count_requests(pool: &SqlitePool) -> Result<i64, StoreError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM requests")
            .fetch_one(pool)
            .await?;
        Ok(count)
    }

    /// Newest-first requests for one endpoint.
    ///
    /// A non-empty `search` keeps only rows whose body or serialized headers
    /// contain it. `instr` is used instead of `LIKE` because it matches
    /// case-sensitively and treats `%` and `_` literally.
    pub async fn find_requests_for_endpoint(
        pool: &SqlitePool,
        endpoint_id: &str,
        search: &str,
        limit: u32,
    ) -> Result<Vec<CapturedRequest>, StoreError> {
        let rows = sqlx::query_as::<_, RequestRow>(
            r#"
            SELECT id, endpoint_id, method, path, source_ip, body, headers, created_at
            FROM requests
            WHERE endpoint_id = ?1
              AND (?2 = '' OR instr(body, ?2) > 0 OR instr(headers, ?2) > 0)
            ORDER BY created_at DESC, seq DESC
            LIMIT ?3
            "#,
        )
        .bind(endpoint_id)
        .bind(search)
        .bind(i64::from(limit))
        .fetch_all(pool)
        .await?;

        rows.into_iter().map(RequestRow::into_captured).collect()
    }

    /// Delete every request created strictly before `threshold`
    pub async fn delete_requests_older_than(
        pool: &SqlitePool,
        threshold: DateTime<Utc>,
    ) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM requests WHERE created_at < ?1")
            .bind(threshold.timestamp_micros())
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }
}


#[cfg(test)]
mod tests {
    use super::queries::*;
    use super::test_support::*;
    use super::*;
    use chrono::Duration;

    #[tokio::test]
    async fn test_migrations_create_requests_table() {
        let pool = memory_pool().await;

        let tables: Vec<String> = sqlx::query_scalar(
            "SELECT name FROM sqlite_schema WHERE type = 'table' AND name NOT IN ('_sqlx_migrations', 'sqlite_sequence') ORDER BY name",
        )
        .fetch_all(&pool)
        .await
        .unwrap();

        assert_eq!(tables, vec!["requests".to_string()]);
    }

    #[tokio::test]
    async fn test_count_requests() {
        let pool = memory_pool().await;
        assert_eq!(count_requests(&pool).await.unwrap(), 0);

        for i in 0..3 {
            let endpoint = i.to_string();
            insert_request(&pool, &sample_request(&endpoint, "test", "h", Utc::now()))
                .await
                .unwrap();
        }
        assert_eq!(count_requests(&pool).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_insert_rejects_duplicate_id() {
        let pool = memory_pool().await;
        let request = sample_request("test-id", "body", "h", Utc::now());

        insert_request(&pool, &request).await.unwrap();
        let err = insert_request(&pool, &request).await.unwrap_err();

        assert!(matches!(err, StoreError::Database(_)));
        assert_eq!(count_requests(&pool).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_find_requests_for_endpoint() {
        let pool = memory_pool().await;
        let endpoint = "test-id";
        let now = Utc::now();

        // Empty, not an error
        let items = find_requests_for_endpoint(&pool, endpoint, "", 32).await.unwrap();
        assert!(items.is_empty());

        let first = sample_request(endpoint, "test-body-1", "Test-Header-1", now - Duration::seconds(2));
        let second = sample_request(endpoint, "test-body-2", "Test-Header-2", now - Duration::seconds(1));
        let other = sample_request("other-id", "test-body-3", "Test-Header-3", now);
        for request in [&first, &second, &other] {
            insert_request(&pool, request).await.unwrap();
        }

        // Shape of the newest item
        let items = find_requests_for_endpoint(&pool, endpoint, "", 1).await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0], second);

        // Only the requested endpoint, newest first
        let items = find_requests_for_endpoint(&pool, endpoint, "", 32).await.unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].body, "test-body-2");
        assert_eq!(items[1].body, "test-body-1");
        assert!(items.iter().all(|r| r.endpoint_id == endpoint));

        // Body search
        let items = find_requests_for_endpoint(&pool, endpoint, "test-body", 32).await.unwrap();
        assert_eq!(items.len(), 2);
        let items = find_requests_for_endpoint(&pool, endpoint, "test-body-1", 32).await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].id, first.id);

        // Header search
        let items = find_requests_for_endpoint(&pool, endpoint, "Test-Header", 32).await.unwrap();
        assert_eq!(items.len(), 2);
        let items = find_requests_for_endpoint(&pool, endpoint, "Test-Header-1", 32).await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].id, first.id);

        // A match on another endpoint never leaks through
        let items = find_requests_for_endpoint(&pool, endpoint, "test-body-3", 32).await.unwrap();
        assert!(items.is_empty());
    }

    #[tokio::test]
    async fn test_search_is_case_sensitive_and_literal() {
        let pool = memory_pool().await;
        insert_request(&pool, &sample_request("e", "Hello World", "Mixed-Case", Utc::now()))
            .await
            .unwrap();

        let hits = |search: &'static str| {
            let pool = pool.clone();
            async move { find_requests_for_endpoint(&pool, "e", search, 32).await.unwrap().len() }
        };

        assert_eq!(hits("Hello").await, 1);
        assert_eq!(hits("hello").await, 0);
        assert_eq!(hits("Mixed-Case").await, 1);
        assert_eq!(hits("mixed-case").await, 0);
        assert_eq!(hits("%").await, 0);
        assert_eq!(hits("H_llo").await, 0);
    }

    #[tokio::test]
    async fn test_identical_timestamps_order_by_insertion() {
        let pool = memory_pool().await;
        let at = Utc::now();
        let a = sample_request("e", "a", "h", at);
        let b = sample_request("e", "b", "h", at);
        let c = sample_request("e", "c", "h", at);
        for request in [&a, &b, &c] {
            insert_request(&pool, request).await.unwrap();
        }

        let bodies: Vec<String> = find_requests_for_endpoint(&pool, "e", "", 32)
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.body)
            .collect();
        assert_eq!(bodies, vec!["c", "b", "a"]);

        let page = find_requests_for_endpoint(&pool, "e", "", 2).await.unwrap();
        assert_eq!(page[0].id, c.id);
        assert_eq!(page[1].id, b.id);
    }

    #[tokio::test]
    async fn test_insert_never_stores_time_before_newest_row() {
        let pool = memory_pool().await;
        let now = Utc::now();

        let newer = sample_request("e", "newer", "h", now);
        let stored = insert_request(&pool, &newer).await.unwrap();
        assert_eq!(stored, newer.created_at);

        // A late writer with an older proposal is stored at the newest time
        let late = sample_request("e", "late", "h", now - Duration::seconds(5));
        let stored = insert_request(&pool, &late).await.unwrap();
        assert_eq!(stored, newer.created_at);

        let bodies: Vec<String> = find_requests_for_endpoint(&pool, "e", "", 32)
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.body)
            .collect();
        assert_eq!(bodies, vec!["late", "newer"]);
    }

    #[tokio::test]
    async fn test_delete_requests_older_than() {
        let pool = memory_pool().await;
        let threshold = Utc::now() - Duration::hours(4);

        insert_request(&pool, &sample_request("e", "old", "h", threshold - Duration::hours(1)))
            .await
            .unwrap();
        insert_request(&pool, &sample_request("e", "edge", "h", threshold))
            .await
            .unwrap();
        insert_request(&pool, &sample_request("e", "new", "h", threshold + Duration::hours(1)))
            .await
            .unwrap();

        assert_eq!(delete_requests_older_than(&pool, threshold).await.unwrap(), 1);
        assert_eq!(count_requests(&pool).await.unwrap(), 2);

        // Same threshold again removes nothing further
        assert_eq!(delete_requests_older_than(&pool, threshold).await.unwrap(), 0);

        let remaining: Vec<String> = find_requests_for_endpoint(&pool, "e", "", 32)
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.body)
            .collect();
        assert_eq!(remaining, vec!["new", "edge"]);
    }
}
