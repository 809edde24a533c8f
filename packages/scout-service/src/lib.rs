pub mod rate_limit;
pub mod search;

mod error;

use std::{future::Future, pin::Pin, sync::Arc, time::Duration};

use uuid::Uuid;

pub use error::{Error, Result};
pub use search::{
	PurgeRequest, PurgeResponse, ResultSkills, SearchDebug, SearchFilters, SearchMetadata,
	SearchRequest, SearchResponse, SearchResult, SearchTimings,
	cache::{CacheEntry, CacheNamespace, MemoryCache},
};
use scout_config::{Config, EmbeddingProviderConfig, LlmProviderConfig};
use scout_domain::{CandidateFilter, CandidateProfile};
use scout_providers::{
	embedding,
	rerank::{self, RerankCandidate, RerankJudgement},
};
use scout_storage::{candidates, db::Db, models::ChannelHit, qdrant::QdrantStore};

use crate::{rate_limit::RateLimiter, search::ranking::BiasPolicy};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

pub trait EmbeddingProvider
where
	Self: Send + Sync,
{
	/// `budget` bounds the whole call, connection setup included.
	fn embed<'a>(
		&'a self,
		cfg: &'a EmbeddingProviderConfig,
		texts: &'a [String],
		budget: Duration,
	) -> BoxFuture<'a, scout_providers::Result<Vec<Vec<f32>>>>;
}

pub trait RerankProvider
where
	Self: Send + Sync,
{
	fn rerank<'a>(
		&'a self,
		cfg: &'a LlmProviderConfig,
		job_description: &'a str,
		candidates: &'a [RerankCandidate],
		budget: Duration,
	) -> BoxFuture<'a, scout_providers::Result<Vec<RerankJudgement>>>;
}

pub trait VectorIndex
where
	Self: Send + Sync,
{
	fn nearest_neighbors<'a>(
		&'a self,
		tenant_id: &'a str,
		vector: &'a [f32],
		filter: &'a CandidateFilter,
		limit: u32,
	) -> BoxFuture<'a, scout_storage::Result<Vec<ChannelHit>>>;
}

pub trait TextIndex
where
	Self: Send + Sync,
{
	fn search<'a>(
		&'a self,
		tenant_id: &'a str,
		query: &'a str,
		filter: &'a CandidateFilter,
		limit: u32,
	) -> BoxFuture<'a, scout_storage::Result<Vec<ChannelHit>>>;
}

pub trait ProfileStore
where
	Self: Send + Sync,
{
	/// Profiles visible to the tenant; unknown IDs are absent from the result.
	fn fetch_profiles<'a>(
		&'a self,
		tenant_id: &'a str,
		candidate_ids: &'a [Uuid],
	) -> BoxFuture<'a, scout_storage::Result<Vec<CandidateProfile>>>;
}

/// Tenant-scoped key-value store with expiry. The tenant is always part of the lookup.
pub trait CacheBackend
where
	Self: Send + Sync,
{
	fn get<'a>(
		&'a self,
		tenant_id: &'a str,
		namespace: CacheNamespace,
		key: &'a str,
		now: time::OffsetDateTime,
	) -> BoxFuture<'a, scout_storage::Result<Option<CacheEntry>>>;

	fn put<'a>(
		&'a self,
		tenant_id: &'a str,
		namespace: CacheNamespace,
		key: &'a str,
		entry: CacheEntry,
	) -> BoxFuture<'a, scout_storage::Result<()>>;

	fn purge<'a>(
		&'a self,
		tenant_id: &'a str,
		namespace: Option<CacheNamespace>,
	) -> BoxFuture<'a, scout_storage::Result<u64>>;

	/// Drops entries of every tenant that expired at or before `now`.
	fn purge_expired<'a>(
		&'a self,
		now: time::OffsetDateTime,
	) -> BoxFuture<'a, scout_storage::Result<u64>>;
}

#[derive(Clone)]
pub struct Providers {
	pub embedding: Arc<dyn EmbeddingProvider>,
	pub rerank: Arc<dyn RerankProvider>,
}
impl Providers {
	pub fn new(embedding: Arc<dyn EmbeddingProvider>, rerank: Arc<dyn RerankProvider>) -> Self {
		Self { embedding, rerank }
	}
}
impl Default for Providers {
	fn default() -> Self {
		let provider = Arc::new(HttpProviders);

		Self { embedding: provider.clone(), rerank: provider }
	}
}

#[derive(Clone)]
pub struct Stores {
	pub vectors: Arc<dyn VectorIndex>,
	pub text: Arc<dyn TextIndex>,
	pub profiles: Arc<dyn ProfileStore>,
	pub cache: Arc<dyn CacheBackend>,
}

pub struct ScoutService {
	pub cfg: Config,
	pub providers: Providers,
	pub stores: Stores,
	pub(crate) limiter: RateLimiter,
	pub(crate) policy: BiasPolicy,
}
impl ScoutService {
	/// Postgres text index and profiles, Qdrant vectors, cache backend per `search.cache.backend`.
	pub fn new(cfg: Config, db: Db, qdrant: QdrantStore) -> Self {
		let db = Arc::new(db);
		let cache: Arc<dyn CacheBackend> = match cfg.search.cache.backend.as_str() {
			"memory" => Arc::new(MemoryCache::new()),
			_ => db.clone(),
		};
		let stores =
			Stores { vectors: Arc::new(qdrant), text: db.clone(), profiles: db, cache };

		Self::with_collaborators(cfg, Providers::default(), stores)
	}

	pub fn with_collaborators(cfg: Config, providers: Providers, stores: Stores) -> Self {
		let limiter = RateLimiter::new(cfg.limits.requests_per_minute);
		let policy = BiasPolicy::new(cfg.bias.clone());

		Self { cfg, providers, stores, limiter, policy }
	}
}

/// OpenAI-compatible HTTP providers.
struct HttpProviders;
impl EmbeddingProvider for HttpProviders {
	fn embed<'a>(
		&'a self,
		cfg: &'a EmbeddingProviderConfig,
		texts: &'a [String],
		budget: Duration,
	) -> BoxFuture<'a, scout_providers::Result<Vec<Vec<f32>>>> {
		Box::pin(embedding::embed(cfg, texts, budget))
	}
}
impl RerankProvider for HttpProviders {
	fn rerank<'a>(
		&'a self,
		cfg: &'a LlmProviderConfig,
		job_description: &'a str,
		candidates: &'a [RerankCandidate],
		budget: Duration,
	) -> BoxFuture<'a, scout_providers::Result<Vec<RerankJudgement>>> {
		Box::pin(rerank::rerank(cfg, job_description, candidates, budget))
	}
}

impl VectorIndex for QdrantStore {
	fn nearest_neighbors<'a>(
		&'a self,
		tenant_id: &'a str,
		vector: &'a [f32],
		filter: &'a CandidateFilter,
		limit: u32,
	) -> BoxFuture<'a, scout_storage::Result<Vec<ChannelHit>>> {
		Box::pin(QdrantStore::nearest_neighbors(self, tenant_id, vector.to_vec(), filter, limit))
	}
}

impl TextIndex for Db {
	fn search<'a>(
		&'a self,
		tenant_id: &'a str,
		query: &'a str,
		filter: &'a CandidateFilter,
		limit: u32,
	) -> BoxFuture<'a, scout_storage::Result<Vec<ChannelHit>>> {
		Box::pin(candidates::search_text(self, tenant_id, query, filter, limit))
	}
}

impl ProfileStore for Db {
	fn fetch_profiles<'a>(
		&'a self,
		tenant_id: &'a str,
		candidate_ids: &'a [Uuid],
	) -> BoxFuture<'a, scout_storage::Result<Vec<CandidateProfile>>> {
		Box::pin(candidates::fetch_profiles(self, tenant_id, candidate_ids))
	}
}
