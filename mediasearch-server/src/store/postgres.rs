//! PostgreSQL implementation of the document store.
//!
//! Archives live in the `archives` registry (rank drawn from a sequence) and
//! records in one `media` table keyed by `(archive_rank, media_ref)`. Alike
//! links and fingerprints are stored as JSONB, tags as `TEXT[]`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mediasearch_core::store::StoreResult;
use mediasearch_core::{
    ArchiveEntry, DocumentStore, Filter, FindOptions, MediaRecord, StoreError, Update,
};
use sqlx::postgres::{PgArguments, PgPoolOptions};
use sqlx::query::Query;
use sqlx::{FromRow, PgPool, Postgres, Row};

use super::sql::{order_by, QueryParam, SqlBuilder};

const MEDIA_COLUMNS: &str =
    "media_ref, class, fingerprints, alike, tags, created_on, updated_on, reliked_on";

const ARCHIVE_COLUMNS: &str = "rank, provider, archive, created_on, updated_on";

/// PostgreSQL-backed document store.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

/// Row type for media queries.
#[derive(FromRow)]
struct MediaRow {
    media_ref: String,
    class: String,
    fingerprints: serde_json::Value,
    alike: serde_json::Value,
    tags: Vec<String>,
    created_on: DateTime<Utc>,
    updated_on: DateTime<Utc>,
    reliked_on: DateTime<Utc>,
}

impl TryFrom<MediaRow> for MediaRecord {
    type Error = StoreError;

    fn try_from(row: MediaRow) -> Result<Self, Self::Error> {
        let MediaRow {
            media_ref,
            class,
            fingerprints,
            alike,
            tags,
            created_on,
            updated_on,
            reliked_on,
        } = row;
        let decode =
            |e: serde_json::Error| StoreError::Serialization(format!("record {media_ref}: {e}"));

        let class = class
            .parse()
            .map_err(|e| StoreError::Serialization(format!("record {media_ref}: {e}")))?;
        let fingerprints = serde_json::from_value(fingerprints).map_err(&decode)?;
        let alike = serde_json::from_value(alike).map_err(&decode)?;

        Ok(Self {
            reference: media_ref,
            class,
            fingerprints,
            alike,
            tags,
            created_on,
            updated_on,
            reliked_on,
        })
    }
}

/// Row type for registry queries.
#[derive(FromRow)]
struct ArchiveRow {
    rank: i64,
    provider: String,
    archive: String,
    created_on: DateTime<Utc>,
    updated_on: DateTime<Utc>,
}

impl From<ArchiveRow> for ArchiveEntry {
    fn from(row: ArchiveRow) -> Self {
        Self {
            rank: row.rank,
            provider: row.provider,
            archive: row.archive,
            created_on: row.created_on,
            updated_on: row.updated_on,
        }
    }
}

fn bind_params<'q>(
    mut query: Query<'q, Postgres, PgArguments>,
    params: Vec<QueryParam>,
) -> Query<'q, Postgres, PgArguments> {
    for param in params {
        query = match param {
            QueryParam::Int(v) => query.bind(v),
            QueryParam::Text(v) => query.bind(v),
            QueryParam::TextArray(v) => query.bind(v),
            QueryParam::Json(v) => query.bind(v),
            QueryParam::Timestamp(v) => query.bind(v),
        };
    }
    query
}

fn query_error(err: sqlx::Error) -> StoreError {
    match &err {
        sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::Io(_)
        | sqlx::Error::Tls(_) => StoreError::Connection(err.to_string()),
        sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) => {
            StoreError::Serialization(err.to_string())
        }
        _ => StoreError::Query(err.to_string()),
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}

impl PostgresStore {
    /// Connect to the database.
    pub async fn connect(database_url: &str, max_connections: u32) -> StoreResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;

        tracing::info!("Connected to PostgreSQL document store");
        Ok(Self { pool })
    }

    /// Create from an existing pool
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Run database migrations
    pub async fn migrate(&self) -> StoreResult<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| StoreError::Migration(e.to_string()))?;

        tracing::info!("Database migrations completed");
        Ok(())
    }

    /// `SELECT` over one archive's media with the given predicate.
    fn select_sql(sql: &mut SqlBuilder, rank: i64, filter: &Filter, what: &str) -> String {
        let rank = sql.param(QueryParam::Int(rank));
        let predicate = sql.filter(filter);
        format!("SELECT {what} FROM media WHERE archive_rank = {rank} AND ({predicate})")
    }

    async fn fetch_records(
        &self,
        text: &str,
        params: Vec<QueryParam>,
    ) -> StoreResult<Vec<MediaRecord>> {
        let rows = bind_params(sqlx::query(text), params)
            .fetch_all(&self.pool)
            .await
            .map_err(query_error)?;

        let mut records = Vec::with_capacity(rows.len());
        for row in &rows {
            let row = MediaRow::from_row(row).map_err(query_error)?;
            records.push(MediaRecord::try_from(row)?);
        }
        Ok(records)
    }
}

#[async_trait]
impl DocumentStore for PostgresStore {
    async fn find_archive(
        &self,
        provider: &str,
        archive: &str,
    ) -> StoreResult<Option<ArchiveEntry>> {
        let row: Option<ArchiveRow> = sqlx::query_as(&format!(
            "SELECT {ARCHIVE_COLUMNS} FROM archives WHERE provider = $1 AND archive = $2"
        ))
        .bind(provider)
        .bind(archive)
        .fetch_optional(&self.pool)
        .await
        .map_err(query_error)?;

        Ok(row.map(Into::into))
    }

    async fn create_archive(&self, provider: &str, archive: &str) -> StoreResult<ArchiveEntry> {
        // The unique (provider, archive) key makes concurrent creation converge
        let created: Option<ArchiveRow> = sqlx::query_as(&format!(
            "INSERT INTO archives (provider, archive) VALUES ($1, $2) \
             ON CONFLICT (provider, archive) DO NOTHING \
             RETURNING {ARCHIVE_COLUMNS}"
        ))
        .bind(provider)
        .bind(archive)
        .fetch_optional(&self.pool)
        .await
        .map_err(query_error)?;

        if let Some(row) = created {
            tracing::info!(provider, archive, rank = row.rank, "Archive created");
            return Ok(row.into());
        }

        self.find_archive(provider, archive).await?.ok_or_else(|| {
            StoreError::Query(format!("archive {provider}/{archive} vanished during creation"))
        })
    }

    async fn remove_archive(&self, rank: i64) -> StoreResult<bool> {
        // media rows go with the registry entry (ON DELETE CASCADE)
        let result = sqlx::query("DELETE FROM archives WHERE rank = $1")
            .bind(rank)
            .execute(&self.pool)
            .await
            .map_err(query_error)?;

        Ok(result.rows_affected() > 0)
    }

    async fn distinct_providers(&self) -> StoreResult<Vec<String>> {
        sqlx::query_scalar(r#"SELECT DISTINCT provider COLLATE "C" FROM archives ORDER BY 1"#)
            .fetch_all(&self.pool)
            .await
            .map_err(query_error)
    }

    async fn distinct_archives(&self, provider: &str) -> StoreResult<Vec<String>> {
        sqlx::query_scalar(
            r#"SELECT archive FROM archives WHERE provider = $1 ORDER BY archive COLLATE "C""#,
        )
        .bind(provider)
        .fetch_all(&self.pool)
        .await
        .map_err(query_error)
    }

    async fn find_one(&self, rank: i64, filter: &Filter) -> StoreResult<Option<MediaRecord>> {
        let mut sql = SqlBuilder::new();
        let text = Self::select_sql(&mut sql, rank, filter, MEDIA_COLUMNS) + " LIMIT 1";
        Ok(self
            .fetch_records(&text, sql.into_params())
            .await?
            .into_iter()
            .next())
    }

    async fn find(
        &self,
        rank: i64,
        filter: &Filter,
        options: &FindOptions,
    ) -> StoreResult<Vec<MediaRecord>> {
        let mut sql = SqlBuilder::new();
        let mut text = Self::select_sql(&mut sql, rank, filter, MEDIA_COLUMNS);
        text.push_str(" ORDER BY ");
        text.push_str(&order_by(options.order));
        if options.skip > 0 {
            let p = sql.param(QueryParam::Int(options.skip as i64));
            text.push_str(&format!(" OFFSET {p}"));
        }
        if let Some(limit) = options.limit {
            let p = sql.param(QueryParam::Int(limit as i64));
            text.push_str(&format!(" LIMIT {p}"));
        }

        self.fetch_records(&text, sql.into_params()).await
    }

    async fn count(&self, rank: i64, filter: &Filter) -> StoreResult<u64> {
        let mut sql = SqlBuilder::new();
        let text = Self::select_sql(&mut sql, rank, filter, "COUNT(*)");
        let row = bind_params(sqlx::query(&text), sql.into_params())
            .fetch_one(&self.pool)
            .await
            .map_err(query_error)?;
        let total: i64 = row.try_get(0).map_err(query_error)?;
        Ok(total.max(0) as u64)
    }

    async fn insert(&self, rank: i64, record: MediaRecord) -> StoreResult<()> {
        let fingerprints = serde_json::to_value(&record.fingerprints)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        let alike = serde_json::to_value(&record.alike)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;

        sqlx::query(&format!(
            "INSERT INTO media (archive_rank, {MEDIA_COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)"
        ))
        .bind(rank)
        .bind(&record.reference)
        .bind(record.class.as_str())
        .bind(fingerprints)
        .bind(alike)
        .bind(&record.tags)
        .bind(record.created_on)
        .bind(record.updated_on)
        .bind(record.reliked_on)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                StoreError::DuplicateKey(record.reference.clone())
            } else {
                query_error(e)
            }
        })?;

        tracing::debug!(reference = %record.reference, archive_rank = rank, "Stored record");
        Ok(())
    }

    async fn update(&self, rank: i64, filter: &Filter, update: &Update) -> StoreResult<u64> {
        if update.ops.is_empty() {
            return self.count(rank, filter).await;
        }

        let mut sql = SqlBuilder::new();
        let rank = sql.param(QueryParam::Int(rank));
        let predicate = sql.filter(filter);
        let sets = sql.assignments(update)?;

        let text = format!(
            "UPDATE media SET {} WHERE archive_rank = {rank} AND ({predicate})",
            sets.join(", ")
        );
        let result = bind_params(sqlx::query(&text), sql.into_params())
            .execute(&self.pool)
            .await
            .map_err(query_error)?;

        Ok(result.rows_affected())
    }

    async fn remove(&self, rank: i64, filter: &Filter) -> StoreResult<u64> {
        let mut sql = SqlBuilder::new();
        let rank = sql.param(QueryParam::Int(rank));
        let predicate = sql.filter(filter);
        let text = format!("DELETE FROM media WHERE archive_rank = {rank} AND ({predicate})");

        let result = bind_params(sqlx::query(&text), sql.into_params())
            .execute(&self.pool)
            .await
            .map_err(query_error)?;

        Ok(result.rows_affected())
    }

    async fn ping(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;
        Ok(())
    }
}
