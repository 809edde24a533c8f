use serde::Deserialize;
use serde_json::{Map, Value};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
	pub service: Service,
	pub storage: Storage,
	pub providers: Providers,
	#[serde(default)]
	pub search: Search,
	#[serde(default)]
	pub ranking: Ranking,
	#[serde(default)]
	pub bias: Bias,
	#[serde(default)]
	pub limits: Limits,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Service {
	pub http_bind: String,
	pub admin_bind: String,
	pub log_level: String,
	/// Header carrying the tenant identifier on every inbound request.
	#[serde(default = "default_tenant_header")]
	pub tenant_header: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Storage {
	pub postgres: Postgres,
	pub qdrant: Qdrant,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Postgres {
	pub dsn: String,
	pub pool_max_conns: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Qdrant {
	pub url: String,
	pub collection: String,
	pub vector_dim: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Providers {
	pub embedding: EmbeddingProviderConfig,
	pub rerank: LlmProviderConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EmbeddingProviderConfig {
	pub provider_id: String,
	pub api_base: String,
	pub api_key: String,
	pub path: String,
	pub model: String,
	pub dimensions: u32,
	pub timeout_ms: u64,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LlmProviderConfig {
	pub provider_id: String,
	pub api_base: String,
	pub api_key: String,
	pub path: String,
	pub model: String,
	pub temperature: f32,
	pub timeout_ms: u64,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Search {
	pub results: SearchResults,
	pub recall: SearchRecall,
	pub sla: SearchSla,
	pub rerank: SearchRerank,
	pub cache: SearchCache,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SearchResults {
	pub default_limit: u32,
	pub max_limit: u32,
}
impl Default for SearchResults {
	fn default() -> Self {
		Self { default_limit: 20, max_limit: 100 }
	}
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SearchRecall {
	/// Upper bound on the merged candidate pool handed to fusion.
	pub candidate_k: u32,
	/// Per-channel limit; each channel is also bounded by the remaining request budget.
	pub channel_timeout_ms: u64,
	pub vector_weight: f32,
	pub text_weight: f32,
}
impl Default for SearchRecall {
	fn default() -> Self {
		Self { candidate_k: 200, channel_timeout_ms: 400, vector_weight: 1.0, text_weight: 1.0 }
	}
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SearchSla {
	pub target_ms: u64,
	pub safety_margin_ms: u64,
}
impl Default for SearchSla {
	fn default() -> Self {
		Self { target_ms: 1_200, safety_margin_ms: 50 }
	}
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SearchRerank {
	pub enabled: bool,
	pub top_k: u32,
	pub max_timeout_ms: u64,
	pub summary_max_chars: u32,
	pub description_max_chars: u32,
}
impl Default for SearchRerank {
	fn default() -> Self {
		Self {
			enabled: true,
			top_k: 10,
			max_timeout_ms: 800,
			summary_max_chars: 600,
			description_max_chars: 4_000,
		}
	}
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SearchCache {
	pub enabled: bool,
	/// One of "postgres" or "memory".
	pub backend: String,
	pub embedding_ttl_secs: i64,
	pub rerank_ttl_secs: i64,
	pub max_payload_bytes: Option<u64>,
	/// Upper bound on a single lookup; a slower backend counts as a miss.
	pub read_timeout_ms: u64,
	/// How often expired rows are swept from the backend.
	pub sweep_interval_secs: u64,
}
impl Default for SearchCache {
	fn default() -> Self {
		Self {
			enabled: true,
			backend: "postgres".to_string(),
			embedding_ttl_secs: 600,
			rerank_ttl_secs: 300,
			max_payload_bytes: Some(262_144),
			read_timeout_ms: 50,
			sweep_interval_secs: 300,
		}
	}
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Ranking {
	pub recency_tau_days: f32,
}
impl Default for Ranking {
	fn default() -> Self {
		Self { recency_tau_days: 180.0 }
	}
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Bias {
	/// Ceiling applied to every medium-risk signal weight after normalization.
	pub medium_risk_cap: f64,
	pub slate_size: u32,
	pub concentration_threshold: f64,
	pub four_fifths_ratio: f64,
	pub min_group_size: u32,
}
impl Default for Bias {
	fn default() -> Self {
		Self {
			medium_risk_cap: 0.12,
			slate_size: 10,
			concentration_threshold: 0.7,
			four_fifths_ratio: 0.8,
			min_group_size: 3,
		}
	}
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Limits {
	/// Zero disables the per-tenant limiter.
	pub requests_per_minute: u32,
}
impl Default for Limits {
	fn default() -> Self {
		Self { requests_per_minute: 120 }
	}
}

fn default_tenant_header() -> String {
	"x-tenant-id".to_string()
}
