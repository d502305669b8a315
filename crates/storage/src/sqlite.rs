//! SQLite Document Store
//!
//! Documents are stored as JSON text keyed by (partition, sort). Filter
//! expressions are rendered to SQL over `json_extract` so filtering happens
//! inside the database, not after the rows are fetched.

use crate::query::{is_plain_attribute, ClauseRenderer};
use crate::{EventStore, FilterExpr, IncidentStore, QuerySpec, StoreError, StoreWriter};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use std::str::FromStr;
use std::time::Duration;
use telemetry::{DocumentKey, Event, Incident};
use tracing::{debug, info};

const CREATE_EVENTS: &str = "CREATE TABLE IF NOT EXISTS events (
    vehicle_id TEXT NOT NULL,
    event_id TEXT NOT NULL,
    document TEXT NOT NULL,
    PRIMARY KEY (vehicle_id, event_id)
)";

const CREATE_INCIDENTS: &str = "CREATE TABLE IF NOT EXISTS incidents (
    event_id TEXT NOT NULL,
    incident_id TEXT NOT NULL,
    document TEXT NOT NULL,
    PRIMARY KEY (event_id, incident_id)
)";

/// SQLite connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SqliteConfig {
    /// Database URL, e.g. `sqlite://edr.db` or `sqlite::memory:`
    pub url: String,
    /// Pool size
    pub max_connections: u32,
    /// How long a query waits for a pooled connection before timing out
    pub acquire_timeout_ms: u64,
}

impl Default for SqliteConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://edr.db".to_string(),
            max_connections: 5,
            acquire_timeout_ms: 5000,
        }
    }
}

impl SqliteConfig {
    /// Private in-memory database (single connection, so every query sees it)
    pub fn in_memory() -> Self {
        Self {
            url: "sqlite::memory:".to_string(),
            max_connections: 1,
            ..Default::default()
        }
    }

    fn is_in_memory(&self) -> bool {
        self.url.contains(":memory:")
    }
}

/// SQLite-backed event and incident store
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

fn map_sqlx_error(err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::PoolTimedOut => {
            StoreError::Timeout("timed out waiting for a database connection".to_string())
        }
        sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) => {
            StoreError::Serialization(err.to_string())
        }
        other => StoreError::Unavailable(other.to_string()),
    }
}

impl SqliteStore {
    /// Open (creating if missing) the database and ensure both tables exist
    pub async fn connect(config: &SqliteConfig) -> Result<Self, StoreError> {
        info!("Opening SQLite store at {}", config.url);
        let options = SqliteConnectOptions::from_str(&config.url)
            .map_err(map_sqlx_error)?
            .create_if_missing(true);

        let mut pool_options = SqlitePoolOptions::new()
            .max_connections(config.max_connections.max(1))
            .acquire_timeout(Duration::from_millis(config.acquire_timeout_ms));
        if config.is_in_memory() {
            // Dropping the last connection drops the database
            pool_options = pool_options
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None);
        }

        let pool = pool_options
            .connect_with(options)
            .await
            .map_err(map_sqlx_error)?;

        let store = Self { pool };
        store.create_tables().await?;
        Ok(store)
    }

    /// Private in-memory database
    pub async fn in_memory() -> Result<Self, StoreError> {
        Self::connect(&SqliteConfig::in_memory()).await
    }

    async fn create_tables(&self) -> Result<(), StoreError> {
        for statement in [CREATE_EVENTS, CREATE_INCIDENTS] {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(map_sqlx_error)?;
        }
        Ok(())
    }

    /// Close the pool
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

/// Bound parameter of a rendered SQL filter
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum SqlParam {
    Text(String),
    Real(f64),
}

#[derive(Default)]
struct SqlRenderer {
    params: Vec<SqlParam>,
    rejected: Option<String>,
}

impl SqlRenderer {
    fn path(&mut self, attribute: &str) -> String {
        if !is_plain_attribute(attribute) && self.rejected.is_none() {
            self.rejected = Some(attribute.to_string());
        }
        format!("'$.{}'", attribute)
    }
}

impl ClauseRenderer for SqlRenderer {
    fn contains(&mut self, attribute: &str, value: &str) -> String {
        let path = self.path(attribute);
        self.params.push(SqlParam::Text(value.to_string()));
        self.params.push(SqlParam::Text(value.to_string()));
        format!(
            "(CASE json_type(document, {path}) \
             WHEN 'text' THEN instr(json_extract(document, {path}), ?) > 0 \
             WHEN 'array' THEN EXISTS (SELECT 1 FROM json_each(document, {path}) WHERE value = ?) \
             ELSE 0 END)"
        )
    }

    fn greater_than(&mut self, attribute: &str, value: f64) -> String {
        let path = self.path(attribute);
        self.params.push(SqlParam::Real(value));
        format!(
            "(json_type(document, {path}) IN ('integer', 'real') AND json_extract(document, {path}) > ?)"
        )
    }

    fn constant(&mut self, value: bool) -> String {
        let literal = if value { "1" } else { "0" };
        literal.to_string()
    }
}

/// Render a filter to a SQL condition over the `document` column
pub(crate) fn render_sql(filter: &FilterExpr) -> Result<(String, Vec<SqlParam>), StoreError> {
    let mut renderer = SqlRenderer::default();
    let sql = filter.render_with(&mut renderer);
    match renderer.rejected {
        Some(attribute) => Err(StoreError::InvalidQuery(format!(
            "unsupported attribute name {:?}",
            attribute
        ))),
        None => Ok((sql, renderer.params)),
    }
}

fn decode<T: serde::de::DeserializeOwned>(rows: Vec<sqlx::sqlite::SqliteRow>) -> Result<Vec<T>, StoreError> {
    rows.iter()
        .map(|row| {
            let document: String = row.try_get("document").map_err(map_sqlx_error)?;
            Ok(serde_json::from_str(&document)?)
        })
        .collect()
}

#[async_trait]
impl EventStore for SqliteStore {
    async fn query_by_vehicle(&self, vehicle_id: &str) -> Result<Vec<Event>, StoreError> {
        let rows = sqlx::query("SELECT document FROM events WHERE vehicle_id = ? ORDER BY event_id")
            .bind(vehicle_id.to_string())
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        debug!("Found {} events for {}", rows.len(), vehicle_id);
        decode(rows)
    }
}

#[async_trait]
impl IncidentStore for SqliteStore {
    async fn query(&self, spec: &QuerySpec) -> Result<Vec<Incident>, StoreError> {
        let (condition, params) = match &spec.filter {
            Some(filter) => render_sql(filter)?,
            None => ("1".to_string(), Vec::new()),
        };
        let sql = format!(
            "SELECT document FROM incidents WHERE event_id = ? AND ({}) ORDER BY incident_id",
            condition
        );

        let mut query = sqlx::query(&sql).bind(spec.event_id.clone());
        for param in params {
            query = match param {
                SqlParam::Text(value) => query.bind(value),
                SqlParam::Real(value) => query.bind(value),
            };
        }

        let rows = query.fetch_all(&self.pool).await.map_err(map_sqlx_error)?;
        debug!("Found {} incidents for {}", rows.len(), spec);
        decode(rows)
    }
}

#[async_trait]
impl StoreWriter for SqliteStore {
    async fn put_events(&self, events: Vec<Event>) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;
        for event in events {
            let document = serde_json::to_string(&event)?;
            sqlx::query("INSERT OR REPLACE INTO events (vehicle_id, event_id, document) VALUES (?, ?, ?)")
                .bind(event.vehicle_id)
                .bind(event.event_id)
                .bind(document)
                .execute(&mut *tx)
                .await
                .map_err(map_sqlx_error)?;
        }
        tx.commit().await.map_err(map_sqlx_error)
    }

    async fn put_incidents(&self, incidents: Vec<Incident>) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;
        for incident in incidents {
            let document = serde_json::to_string(&incident)?;
            sqlx::query(
                "INSERT OR REPLACE INTO incidents (event_id, incident_id, document) VALUES (?, ?, ?)",
            )
            .bind(incident.event_id)
            .bind(incident.incident_id)
            .bind(document)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;
        }
        tx.commit().await.map_err(map_sqlx_error)
    }

    async fn delete_events(&self, keys: Vec<DocumentKey>) -> Result<usize, StoreError> {
        let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;
        let mut removed = 0;
        for key in keys {
            let result = sqlx::query("DELETE FROM events WHERE vehicle_id = ? AND event_id = ?")
                .bind(key.partition)
                .bind(key.sort)
                .execute(&mut *tx)
                .await
                .map_err(map_sqlx_error)?;
            removed += result.rows_affected() as usize;
        }
        tx.commit().await.map_err(map_sqlx_error)?;
        Ok(removed)
    }

    async fn delete_incidents(&self, keys: Vec<DocumentKey>) -> Result<usize, StoreError> {
        let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;
        let mut removed = 0;
        for key in keys {
            let result = sqlx::query("DELETE FROM incidents WHERE event_id = ? AND incident_id = ?")
                .bind(key.partition)
                .bind(key.sort)
                .execute(&mut *tx)
                .await
                .map_err(map_sqlx_error)?;
            removed += result.rows_affected() as usize;
        }
        tx.commit().await.map_err(map_sqlx_error)?;
        Ok(removed)
    }
}
