use std::{
	collections::HashMap,
	sync::{Arc, Mutex},
	time::Duration,
};

use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;
use time::OffsetDateTime;
use tracing::Instrument;
use uuid::Uuid;

use scout_storage::db::Db;

use crate::{BoxFuture, CacheBackend, Error, Result, search::sla};

const EMBEDDING_CACHE_SCHEMA_VERSION: i32 = 1;
const RERANK_CACHE_SCHEMA_VERSION: i32 = 1;

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum CacheNamespace {
	Embedding,
	Rerank,
}
impl CacheNamespace {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Embedding => "embedding",
			Self::Rerank => "rerank",
		}
	}

	pub fn parse(raw: &str) -> Option<Self> {
		match raw.trim() {
			"embedding" => Some(Self::Embedding),
			"rerank" => Some(Self::Rerank),
			_ => None,
		}
	}
}

#[derive(Clone, Debug, PartialEq)]
pub struct CacheEntry {
	pub value: Value,
	pub created_at: OffsetDateTime,
	pub expires_at: OffsetDateTime,
}

pub fn hash_cache_key(payload: &Value) -> Result<String> {
	let raw = serde_json::to_vec(payload).map_err(|err| Error::Internal {
		message: format!("Failed to encode cache key payload: {err}"),
	})?;

	Ok(blake3::hash(&raw).to_hex().to_string())
}

pub fn cache_key_prefix(key: &str) -> &str {
	let len = key.len().min(12);

	&key[..len]
}

pub fn build_embedding_cache_key(
	tenant_id: &str,
	provider_id: &str,
	model: &str,
	dimensions: u32,
	query: &str,
) -> Result<String> {
	let payload = serde_json::json!({
		"kind": CacheNamespace::Embedding.as_str(),
		"schema_version": EMBEDDING_CACHE_SCHEMA_VERSION,
		"tenant_id": tenant_id,
		"provider_id": provider_id,
		"model": model,
		"dimensions": dimensions,
		"query": scout_domain::text::normalize_text(query),
	});

	hash_cache_key(&payload)
}

/// Keyed on the ordered candidate window so any profile update invalidates the entry.
pub fn build_rerank_cache_key(
	tenant_id: &str,
	provider_id: &str,
	model: &str,
	query: &str,
	candidates: &[(Uuid, OffsetDateTime)],
) -> Result<String> {
	let signature: Vec<Value> = candidates
		.iter()
		.map(|(candidate_id, updated_at)| {
			serde_json::json!({
				"candidate_id": candidate_id,
				"updated_at": updated_at.unix_timestamp_nanos().to_string(),
			})
		})
		.collect();
	let payload = serde_json::json!({
		"kind": CacheNamespace::Rerank.as_str(),
		"schema_version": RERANK_CACHE_SCHEMA_VERSION,
		"tenant_id": tenant_id,
		"provider_id": provider_id,
		"model": model,
		"query": scout_domain::text::normalize_text(query),
		"candidates": signature,
	});

	hash_cache_key(&payload)
}

/// Read-through lookup bounded by `timeout`. Every failure, a slow backend included, is logged
/// and reported as a miss.
pub(crate) async fn read<T>(
	backend: &dyn CacheBackend,
	tenant_id: &str,
	namespace: CacheNamespace,
	key: &str,
	now: OffsetDateTime,
	timeout: Duration,
) -> Option<T>
where
	T: DeserializeOwned,
{
	let lookup = match tokio::time::timeout(timeout, backend.get(tenant_id, namespace, key, now)).await
	{
		Ok(lookup) => lookup,
		Err(_) => {
			tracing::warn!(
				cache_kind = namespace.as_str(),
				cache_key_prefix = cache_key_prefix(key),
				timeout_ms = sla::millis(timeout),
				"Cache read timed out."
			);

			return None;
		},
	};

	match lookup {
		Ok(Some(entry)) => match serde_json::from_value(entry.value) {
			Ok(value) => {
				tracing::info!(
					cache_kind = namespace.as_str(),
					cache_key_prefix = cache_key_prefix(key),
					hit = true,
					"Cache hit."
				);

				Some(value)
			},
			Err(err) => {
				tracing::warn!(
					error = %err,
					cache_kind = namespace.as_str(),
					cache_key_prefix = cache_key_prefix(key),
					"Cache payload decode failed."
				);

				None
			},
		},
		Ok(None) => {
			tracing::info!(
				cache_kind = namespace.as_str(),
				cache_key_prefix = cache_key_prefix(key),
				hit = false,
				"Cache miss."
			);

			None
		},
		Err(err) => {
			tracing::warn!(
				error = %err,
				cache_kind = namespace.as_str(),
				cache_key_prefix = cache_key_prefix(key),
				"Cache read failed."
			);

			None
		},
	}
}

pub(crate) struct WriteArgs<'a> {
	pub(crate) tenant_id: &'a str,
	pub(crate) namespace: CacheNamespace,
	pub(crate) key: &'a str,
	pub(crate) now: OffsetDateTime,
	pub(crate) ttl_secs: i64,
	pub(crate) max_payload_bytes: Option<u64>,
}

/// Encodes `value` in place and stores it on a detached task, so the caller never waits on the
/// backend. Failures are logged and swallowed.
pub(crate) fn spawn_write<T>(backend: &Arc<dyn CacheBackend>, args: WriteArgs<'_>, value: &T)
where
	T: Serialize,
{
	let Some(pending) = PendingWrite::prepare(args, value) else {
		return;
	};
	let backend = Arc::clone(backend);

	tokio::spawn(async move { pending.store(backend.as_ref()).await }.in_current_span());
}

/// An encoded entry that passed the payload cap.
struct PendingWrite {
	tenant_id: String,
	namespace: CacheNamespace,
	key: String,
	entry: CacheEntry,
	payload_size: u64,
	ttl_secs: i64,
}
impl PendingWrite {
	fn prepare<T>(args: WriteArgs<'_>, value: &T) -> Option<Self>
	where
		T: Serialize,
	{
		let WriteArgs { tenant_id, namespace, key, now, ttl_secs, max_payload_bytes } = args;
		let payload = match serde_json::to_value(value) {
			Ok(payload) => payload,
			Err(err) => {
				tracing::warn!(
					error = %err,
					cache_kind = namespace.as_str(),
					cache_key_prefix = cache_key_prefix(key),
					"Cache payload encode failed."
				);

				return None;
			},
		};
		let payload_size =
			serde_json::to_vec(&payload).map(|raw| raw.len() as u64).unwrap_or(u64::MAX);

		if max_payload_bytes.is_some_and(|max| payload_size > max) {
			tracing::warn!(
				cache_kind = namespace.as_str(),
				cache_key_prefix = cache_key_prefix(key),
				payload_size,
				"Cache payload skipped due to size."
			);

			return None;
		}

		Some(Self {
			tenant_id: tenant_id.to_string(),
			namespace,
			key: key.to_string(),
			entry: CacheEntry {
				value: payload,
				created_at: now,
				expires_at: now + time::Duration::seconds(ttl_secs),
			},
			payload_size,
			ttl_secs,
		})
	}

	async fn store(self, backend: &dyn CacheBackend) {
		let Self { tenant_id, namespace, key, entry, payload_size, ttl_secs } = self;

		match backend.put(&tenant_id, namespace, &key, entry).await {
			Ok(()) => {
				tracing::info!(
					cache_kind = namespace.as_str(),
					cache_key_prefix = cache_key_prefix(&key),
					payload_size,
					ttl_secs,
					"Cache stored."
				);
			},
			Err(err) => {
				tracing::warn!(
					error = %err,
					cache_kind = namespace.as_str(),
					cache_key_prefix = cache_key_prefix(&key),
					"Cache write failed."
				);
			},
		}
	}
}

impl CacheBackend for Db {
	fn get<'a>(
		&'a self,
		tenant_id: &'a str,
		namespace: CacheNamespace,
		key: &'a str,
		now: OffsetDateTime,
	) -> BoxFuture<'a, scout_storage::Result<Option<CacheEntry>>> {
		Box::pin(async move {
			let row = scout_storage::cache::fetch(self, tenant_id, namespace.as_str(), key, now).await?;

			Ok(row.map(|row| CacheEntry {
				value: row.payload,
				created_at: row.created_at,
				expires_at: row.expires_at,
			}))
		})
	}

	fn put<'a>(
		&'a self,
		tenant_id: &'a str,
		namespace: CacheNamespace,
		key: &'a str,
		entry: CacheEntry,
	) -> BoxFuture<'a, scout_storage::Result<()>> {
		Box::pin(async move {
			scout_storage::cache::store(
				self,
				tenant_id,
				namespace.as_str(),
				key,
				&entry.value,
				entry.created_at,
				entry.expires_at,
			)
			.await
		})
	}

	fn purge<'a>(
		&'a self,
		tenant_id: &'a str,
		namespace: Option<CacheNamespace>,
	) -> BoxFuture<'a, scout_storage::Result<u64>> {
		Box::pin(scout_storage::cache::purge(self, tenant_id, namespace.map(CacheNamespace::as_str)))
	}

	fn purge_expired<'a>(
		&'a self,
		now: OffsetDateTime,
	) -> BoxFuture<'a, scout_storage::Result<u64>> {
		Box::pin(scout_storage::cache::purge_expired(self, now))
	}
}

type MemoryKey = (String, CacheNamespace, String);

/// In-process cache for single-replica deployments and tests.
#[derive(Debug, Default)]
pub struct MemoryCache {
	entries: Mutex<HashMap<MemoryKey, CacheEntry>>,
}
impl MemoryCache {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn len(&self) -> usize {
		self.lock().len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<MemoryKey, CacheEntry>> {
		self.entries.lock().unwrap_or_else(|err| err.into_inner())
	}
}
impl CacheBackend for MemoryCache {
	fn get<'a>(
		&'a self,
		tenant_id: &'a str,
		namespace: CacheNamespace,
		key: &'a str,
		now: OffsetDateTime,
	) -> BoxFuture<'a, scout_storage::Result<Option<CacheEntry>>> {
		let mut entries = self.lock();
		let map_key = (tenant_id.to_string(), namespace, key.to_string());
		let live = match entries.get(&map_key) {
			Some(entry) if entry.expires_at > now => Some(entry.clone()),
			Some(_) => {
				entries.remove(&map_key);

				None
			},
			None => None,
		};

		Box::pin(async move { Ok(live) })
	}

	fn put<'a>(
		&'a self,
		tenant_id: &'a str,
		namespace: CacheNamespace,
		key: &'a str,
		entry: CacheEntry,
	) -> BoxFuture<'a, scout_storage::Result<()>> {
		let mut entries = self.lock();
		let now = entry.created_at;

		entries.retain(|_, existing| existing.expires_at > now);
		entries.insert((tenant_id.to_string(), namespace, key.to_string()), entry);

		Box::pin(async move { Ok(()) })
	}

	fn purge<'a>(
		&'a self,
		tenant_id: &'a str,
		namespace: Option<CacheNamespace>,
	) -> BoxFuture<'a, scout_storage::Result<u64>> {
		let mut entries = self.lock();
		let before = entries.len();

		entries.retain(|(tenant, entry_namespace, _), _| {
			tenant != tenant_id || namespace.is_some_and(|wanted| wanted != *entry_namespace)
		});

		let purged = (before - entries.len()) as u64;

		Box::pin(async move { Ok(purged) })
	}

	fn purge_expired<'a>(
		&'a self,
		now: OffsetDateTime,
	) -> BoxFuture<'a, scout_storage::Result<u64>> {
		let mut entries = self.lock();
		let before = entries.len();

		entries.retain(|_, entry| entry.expires_at > now);

		let purged = (before - entries.len()) as u64;

		Box::pin(async move { Ok(purged) })
	}
}

#[cfg(test)]
mod tests {
	use time::macros::datetime;

	use super::*;

	const NOW: OffsetDateTime = datetime!(2026-06-01 12:00 UTC);

	#[test]
	fn embedding_keys_fold_whitespace_and_case_but_not_tenants() {
		let key = |tenant: &str, query: &str| {
			build_embedding_cache_key(tenant, "openai", "text-embedding-3-small", 1_536, query)
				.expect("key must build")
		};

		assert_eq!(key("acme", "Senior  Rust Engineer"), key("acme", "senior rust engineer"));
		assert_ne!(key("acme", "senior rust engineer"), key("globex", "senior rust engineer"));
		assert_eq!(key("acme", "x").len(), 64);
	}

	#[test]
	fn rerank_keys_track_window_order_and_freshness() {
		let a = (Uuid::from_u128(1), NOW);
		let b = (Uuid::from_u128(2), NOW);
		let key = |candidates: &[(Uuid, OffsetDateTime)]| {
			build_rerank_cache_key("acme", "openai", "gpt-4o-mini", "Backend role", candidates)
				.expect("key must build")
		};

		assert_ne!(key(&[a, b]), key(&[b, a]));
		assert_ne!(key(&[a, b]), key(&[(a.0, NOW + time::Duration::seconds(1)), b]));
		assert_eq!(cache_key_prefix(&key(&[a])).len(), 12);
	}

	#[tokio::test]
	async fn memory_cache_is_tenant_scoped_and_expires() {
		let cache = MemoryCache::new();
		let entry = |ttl: i64| CacheEntry {
			value: serde_json::json!({ "vector": [1.0] }),
			created_at: NOW,
			expires_at: NOW + time::Duration::seconds(ttl),
		};

		cache.put("acme", CacheNamespace::Embedding, "k", entry(60)).await.expect("put");
		cache.put("acme", CacheNamespace::Rerank, "k", entry(-1)).await.expect("put");

		assert!(cache.get("acme", CacheNamespace::Embedding, "k", NOW).await.expect("get").is_some());
		assert!(cache.get("globex", CacheNamespace::Embedding, "k", NOW).await.expect("get").is_none());
		assert!(cache.get("acme", CacheNamespace::Rerank, "k", NOW).await.expect("get").is_none());
		assert_eq!(cache.len(), 1);
	}

	#[tokio::test]
	async fn memory_purge_respects_tenant_and_namespace() {
		let cache = MemoryCache::new();
		let entry = CacheEntry {
			value: Value::Null,
			created_at: NOW,
			expires_at: NOW + time::Duration::minutes(5),
		};

		for tenant in ["acme", "globex"] {
			for namespace in [CacheNamespace::Embedding, CacheNamespace::Rerank] {
				cache.put(tenant, namespace, "k", entry.clone()).await.expect("put");
			}
		}

		assert_eq!(cache.purge("acme", Some(CacheNamespace::Rerank)).await.expect("purge"), 1);
		assert_eq!(cache.purge("acme", None).await.expect("purge"), 1);
		assert_eq!(cache.len(), 2);
	}

	#[tokio::test]
	async fn writes_sweep_expired_entries() {
		let cache = MemoryCache::new();
		let entry = |created_at: OffsetDateTime| CacheEntry {
			value: Value::Null,
			created_at,
			expires_at: created_at + time::Duration::seconds(60),
		};

		for key in ["a", "b", "c"] {
			cache.put("acme", CacheNamespace::Embedding, key, entry(NOW)).await.expect("put");
		}

		assert_eq!(cache.len(), 3);

		let later = NOW + time::Duration::minutes(5);

		cache.put("globex", CacheNamespace::Rerank, "d", entry(later)).await.expect("put");

		assert_eq!(cache.len(), 1);

		cache.put("acme", CacheNamespace::Embedding, "e", entry(later)).await.expect("put");

		assert_eq!(cache.purge_expired(later + time::Duration::minutes(1)).await.expect("sweep"), 2);
		assert!(cache.is_empty());
	}

	#[tokio::test]
	async fn oversized_payloads_are_skipped() {
		let cache = MemoryCache::new();
		let args = |max| WriteArgs {
			tenant_id: "acme",
			namespace: CacheNamespace::Embedding,
			key: "k",
			now: NOW,
			ttl_secs: 60,
			max_payload_bytes: max,
		};

		assert!(PendingWrite::prepare(args(Some(4)), &vec![0.5_f32; 32]).is_none());

		PendingWrite::prepare(args(None), &vec![0.5_f32; 32]).expect("within cap").store(&cache).await;

		let cached: Option<Vec<f32>> =
			read(&cache, "acme", CacheNamespace::Embedding, "k", NOW, Duration::from_millis(50)).await;

		assert_eq!(cached.map(|vector| vector.len()), Some(32));
	}

	#[tokio::test]
	async fn spawned_writes_land_without_being_awaited() {
		let cache = Arc::new(MemoryCache::new());
		let backend: Arc<dyn CacheBackend> = cache.clone();

		spawn_write(
			&backend,
			WriteArgs {
				tenant_id: "acme",
				namespace: CacheNamespace::Rerank,
				key: "k",
				now: NOW,
				ttl_secs: 300,
				max_payload_bytes: None,
			},
			&serde_json::json!({ "ranking_ms": 12 }),
		);

		assert!(cache.is_empty());

		while cache.is_empty() {
			tokio::task::yield_now().await;
		}

		assert_eq!(cache.len(), 1);
	}

	/// Never answers a lookup.
	struct StalledCache;
	impl CacheBackend for StalledCache {
		fn get<'a>(
			&'a self,
			_tenant_id: &'a str,
			_namespace: CacheNamespace,
			_key: &'a str,
			_now: OffsetDateTime,
		) -> BoxFuture<'a, scout_storage::Result<Option<CacheEntry>>> {
			Box::pin(std::future::pending::<scout_storage::Result<Option<CacheEntry>>>())
		}

		fn put<'a>(
			&'a self,
			_tenant_id: &'a str,
			_namespace: CacheNamespace,
			_key: &'a str,
			_entry: CacheEntry,
		) -> BoxFuture<'a, scout_storage::Result<()>> {
			Box::pin(std::future::pending::<scout_storage::Result<()>>())
		}

		fn purge<'a>(
			&'a self,
			_tenant_id: &'a str,
			_namespace: Option<CacheNamespace>,
		) -> BoxFuture<'a, scout_storage::Result<u64>> {
			Box::pin(async { Ok(0) })
		}

		fn purge_expired<'a>(
			&'a self,
			_now: OffsetDateTime,
		) -> BoxFuture<'a, scout_storage::Result<u64>> {
			Box::pin(async { Ok(0) })
		}
	}

	#[tokio::test(start_paused = true)]
	async fn stalled_reads_count_as_misses_after_the_timeout() {
		let started = tokio::time::Instant::now();
		let cached: Option<Value> = read(
			&StalledCache,
			"acme",
			CacheNamespace::Embedding,
			"k",
			NOW,
			Duration::from_millis(50),
		)
		.await;

		assert!(cached.is_none());
		assert_eq!(started.elapsed(), Duration::from_millis(50));
	}
}
