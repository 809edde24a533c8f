use serde_json::Value;
use sqlx::Row;
use time::OffsetDateTime;

use crate::{Result, db::Db, models::CacheRow};

/// Live entry for `(tenant_id, namespace, cache_key)`; bumps the hit counter on read.
pub async fn fetch(
	db: &Db,
	tenant_id: &str,
	namespace: &str,
	cache_key: &str,
	now: OffsetDateTime,
) -> Result<Option<CacheRow>> {
	let row: Option<CacheRow> = sqlx::query_as(
		"\
UPDATE search_cache
SET last_accessed_at = $4, hit_count = hit_count + 1
WHERE tenant_id = $1 AND namespace = $2 AND cache_key = $3 AND expires_at > $4
RETURNING payload, created_at, expires_at",
	)
	.bind(tenant_id)
	.bind(namespace)
	.bind(cache_key)
	.bind(now)
	.fetch_optional(&db.pool)
	.await?;

	Ok(row)
}

pub async fn store(
	db: &Db,
	tenant_id: &str,
	namespace: &str,
	cache_key: &str,
	payload: &Value,
	now: OffsetDateTime,
	expires_at: OffsetDateTime,
) -> Result<()> {
	sqlx::query(
		"\
INSERT INTO search_cache (
	tenant_id,
	namespace,
	cache_key,
	payload,
	created_at,
	last_accessed_at,
	expires_at,
	hit_count
)
VALUES ($1, $2, $3, $4, $5, $5, $6, 0)
ON CONFLICT (tenant_id, namespace, cache_key) DO UPDATE SET
	payload = EXCLUDED.payload,
	created_at = EXCLUDED.created_at,
	last_accessed_at = EXCLUDED.last_accessed_at,
	expires_at = EXCLUDED.expires_at,
	hit_count = 0",
	)
	.bind(tenant_id)
	.bind(namespace)
	.bind(cache_key)
	.bind(payload)
	.bind(now)
	.bind(expires_at)
	.execute(&db.pool)
	.await?;

	Ok(())
}

/// Deletes every entry of `tenant_id`, or only one namespace of it. Returns the row count.
pub async fn purge(db: &Db, tenant_id: &str, namespace: Option<&str>) -> Result<u64> {
	let row = sqlx::query(
		"\
WITH deleted AS (
	DELETE FROM search_cache
	WHERE tenant_id = $1 AND ($2::text IS NULL OR namespace = $2)
	RETURNING 1
)
SELECT count(*) AS purged FROM deleted",
	)
	.bind(tenant_id)
	.bind(namespace)
	.fetch_one(&db.pool)
	.await?;
	let purged: i64 = row.try_get("purged")?;

	Ok(purged.max(0) as u64)
}

/// Deletes expired entries across all tenants. Returns the row count.
pub async fn purge_expired(db: &Db, now: OffsetDateTime) -> Result<u64> {
	let result = sqlx::query("DELETE FROM search_cache WHERE expires_at <= $1")
		.bind(now)
		.execute(&db.pool)
		.await?;

	Ok(result.rows_affected())
}
