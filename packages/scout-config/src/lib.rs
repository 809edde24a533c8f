mod error;
mod types;

pub use error::{Error, Result};
pub use types::{
	Bias, Config, EmbeddingProviderConfig, Limits, LlmProviderConfig, Postgres, Providers,
	Qdrant, Ranking, Search, SearchCache, SearchRecall, SearchRerank, SearchResults, SearchSla,
	Service, Storage,
};

use std::{fs, path::Path};

pub const CACHE_BACKENDS: [&str; 2] = ["postgres", "memory"];
pub const RERANK_TTL_RANGE_SECS: std::ops::RangeInclusive<i64> = 180..=900;

pub fn load(path: &Path) -> Result<Config> {
	let raw = fs::read_to_string(path)
		.map_err(|err| Error::ReadConfig { path: path.to_path_buf(), source: err })?;

	parse(&raw).map_err(|err| match err {
		Error::ParseConfig { source, .. } => Error::ParseConfig { path: path.to_path_buf(), source },
		other => other,
	})
}

pub fn parse(raw: &str) -> Result<Config> {
	let mut cfg: Config = toml::from_str(raw)
		.map_err(|err| Error::ParseConfig { path: Default::default(), source: err })?;

	normalize(&mut cfg);

	validate(&cfg)?;

	Ok(cfg)
}

pub fn validate(cfg: &Config) -> Result<()> {
	if cfg.service.tenant_header.trim().is_empty() {
		return invalid("service.tenant_header", "must be non-empty.");
	}
	if cfg.providers.embedding.dimensions == 0 {
		return invalid("providers.embedding.dimensions", "must be greater than zero.");
	}
	if cfg.providers.embedding.dimensions != cfg.storage.qdrant.vector_dim {
		return invalid("providers.embedding.dimensions", "must match storage.qdrant.vector_dim.");
	}

	for (key, api_key) in [
		("providers.embedding.api_key", &cfg.providers.embedding.api_key),
		("providers.rerank.api_key", &cfg.providers.rerank.api_key),
	] {
		if api_key.trim().is_empty() {
			return invalid(key, "must be non-empty.");
		}
	}

	let results = &cfg.search.results;

	if results.max_limit == 0 {
		return invalid("search.results.max_limit", "must be greater than zero.");
	}
	if results.default_limit == 0 || results.default_limit > results.max_limit {
		return invalid(
			"search.results.default_limit",
			"must be greater than zero and at most search.results.max_limit.",
		);
	}

	let sla = &cfg.search.sla;

	if sla.target_ms == 0 {
		return invalid("search.sla.target_ms", "must be greater than zero.");
	}
	if sla.safety_margin_ms >= sla.target_ms {
		return invalid("search.sla.safety_margin_ms", "must be less than search.sla.target_ms.");
	}

	let recall = &cfg.search.recall;

	if recall.candidate_k == 0 {
		return invalid("search.recall.candidate_k", "must be greater than zero.");
	}
	if recall.channel_timeout_ms == 0 || recall.channel_timeout_ms >= sla.target_ms {
		return invalid(
			"search.recall.channel_timeout_ms",
			"must be greater than zero and less than search.sla.target_ms.",
		);
	}

	for (key, weight) in [
		("search.recall.vector_weight", recall.vector_weight),
		("search.recall.text_weight", recall.text_weight),
	] {
		if !weight.is_finite() || weight < 0.0 {
			return invalid(key, "must be a finite number, zero or greater.");
		}
	}

	if recall.vector_weight <= 0.0 && recall.text_weight <= 0.0 {
		return invalid("search.recall", "at least one channel weight must be greater than zero.");
	}

	let rerank = &cfg.search.rerank;

	if rerank.top_k == 0 {
		return invalid("search.rerank.top_k", "must be greater than zero.");
	}
	if rerank.max_timeout_ms == 0 {
		return invalid("search.rerank.max_timeout_ms", "must be greater than zero.");
	}
	if rerank.summary_max_chars < 64 {
		return invalid("search.rerank.summary_max_chars", "must be at least 64.");
	}
	if rerank.description_max_chars < 64 {
		return invalid("search.rerank.description_max_chars", "must be at least 64.");
	}

	let cache = &cfg.search.cache;

	if !CACHE_BACKENDS.contains(&cache.backend.as_str()) {
		return invalid("search.cache.backend", "must be one of postgres or memory.");
	}
	if cache.embedding_ttl_secs <= 0 {
		return invalid("search.cache.embedding_ttl_secs", "must be greater than zero.");
	}
	if !RERANK_TTL_RANGE_SECS.contains(&cache.rerank_ttl_secs) {
		return invalid("search.cache.rerank_ttl_secs", "must be in the range 180-900.");
	}

	if let Some(max) = cache.max_payload_bytes
		&& max == 0
	{
		return invalid("search.cache.max_payload_bytes", "must be greater than zero.");
	}
	if cache.read_timeout_ms == 0 || cache.read_timeout_ms >= sla.target_ms {
		return invalid(
			"search.cache.read_timeout_ms",
			"must be greater than zero and less than search.sla.target_ms.",
		);
	}
	if cache.sweep_interval_secs == 0 {
		return invalid("search.cache.sweep_interval_secs", "must be greater than zero.");
	}

	if !cfg.ranking.recency_tau_days.is_finite() || cfg.ranking.recency_tau_days < 0.0 {
		return invalid("ranking.recency_tau_days", "must be a finite number, zero or greater.");
	}

	let bias = &cfg.bias;

	if !bias.medium_risk_cap.is_finite() || bias.medium_risk_cap <= 0.0 || bias.medium_risk_cap > 1.0
	{
		return invalid("bias.medium_risk_cap", "must be in the range (0.0, 1.0].");
	}

	for (key, value) in [
		("bias.concentration_threshold", bias.concentration_threshold),
		("bias.four_fifths_ratio", bias.four_fifths_ratio),
	] {
		if !value.is_finite() || value <= 0.0 || value > 1.0 {
			return invalid(key, "must be in the range (0.0, 1.0].");
		}
	}

	if bias.slate_size == 0 {
		return invalid("bias.slate_size", "must be greater than zero.");
	}
	if bias.min_group_size == 0 {
		return invalid("bias.min_group_size", "must be greater than zero.");
	}

	Ok(())
}

fn normalize(cfg: &mut Config) {
	cfg.service.tenant_header = cfg.service.tenant_header.trim().to_ascii_lowercase();
	cfg.search.cache.backend = cfg.search.cache.backend.trim().to_ascii_lowercase();

	if cfg.providers.rerank.api_base.ends_with('/') && cfg.providers.rerank.path.starts_with('/') {
		cfg.providers.rerank.api_base.pop();
	}
	if cfg.providers.embedding.api_base.ends_with('/')
		&& cfg.providers.embedding.path.starts_with('/')
	{
		cfg.providers.embedding.api_base.pop();
	}
}

fn invalid<T>(key: &'static str, message: &str) -> Result<T> {
	Err(Error::Invalid { key, message: message.to_string() })
}
