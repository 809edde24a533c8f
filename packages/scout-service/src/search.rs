pub mod cache;
pub mod ranking;
pub mod recall;
pub mod rerank;
pub mod sla;

use std::{
	collections::{BTreeMap, HashMap},
	time::Duration,
};

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tokio::time::Instant;
use tracing::Instrument;
use uuid::Uuid;

use scout_domain::{CandidateFilter, CandidateProfile, RoleArchetype, Seniority, Signal, text};

use crate::{
	Error, Result, ScoutService,
	search::{
		cache::{CacheNamespace, WriteArgs},
		ranking::{BiasWarning, FusedCandidate, QueryTerms, SignalContext, fusion, signals, weights},
		recall::{ChannelReport, RecallArgs},
		rerank::{FallbackReason, RankedCandidate, RerankArgs},
		sla::{SlaBudget, Stage},
	},
};

const MAX_TENANT_ID_CHARS: usize = 128;

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchRequest {
	pub job_description: String,
	#[serde(default)]
	pub limit: Option<u32>,
	#[serde(default)]
	pub filters: Option<SearchFilters>,
	/// Per-signal overrides; snake_case or camelCase signal names.
	#[serde(default)]
	pub signal_weights: Option<BTreeMap<String, f64>>,
	/// Pins the weight preset instead of inferring it from the job description.
	#[serde(default)]
	pub role_type: Option<String>,
	#[serde(default)]
	pub include_debug: bool,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchFilters {
	#[serde(default)]
	pub min_years_experience: Option<f32>,
	#[serde(default)]
	pub max_years_experience: Option<f32>,
	#[serde(default)]
	pub seniority_levels: Vec<String>,
	#[serde(default)]
	pub required_skills: Vec<String>,
	#[serde(default)]
	pub preferred_skills: Vec<String>,
	#[serde(default)]
	pub locations: Vec<String>,
	#[serde(default, with = "scout_domain::time_serde::option")]
	pub updated_after: Option<OffsetDateTime>,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResponse {
	pub results: Vec<SearchResult>,
	pub metadata: SearchMetadata,
	pub timings: SearchTimings,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub debug: Option<SearchDebug>,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult {
	pub candidate_id: Uuid,
	pub rank: u32,
	pub score: f64,
	pub fused_score: f64,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub rerank_score: Option<f64>,
	/// Reasons from the LLM verdict; empty when the rerank fell back.
	pub match_reasons: Vec<String>,
	pub skills: ResultSkills,
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct ResultSkills {
	pub matched: Vec<String>,
	pub inferred: Vec<String>,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchMetadata {
	/// Candidates that reached fusion, before truncation to `limit`.
	pub total_candidates: usize,
	pub search_time_ms: u64,
	pub used_fallback: bool,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub fallback_reason: Option<FallbackReason>,
	pub rerank_cached: bool,
	pub role_type: RoleArchetype,
	pub bias_warnings: Vec<BiasWarning>,
}

#[derive(Clone, Copy, Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchTimings {
	pub embedding_ms: u64,
	pub retrieval_ms: u64,
	pub fusion_ms: u64,
	pub rerank_ms: u64,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchDebug {
	pub role_type: RoleArchetype,
	pub weights: BTreeMap<&'static str, f64>,
	pub weight_notes: Vec<String>,
	pub vector_channel: ChannelReport,
	pub text_channel: ChannelReport,
	pub embedding_cached: bool,
	pub rerank_cached: bool,
	/// Recalled IDs whose profile was not visible yet.
	pub dropped_candidates: usize,
	pub candidates: Vec<DebugCandidate>,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DebugCandidate {
	pub candidate_id: Uuid,
	pub fused_rank: u32,
	pub signals: BTreeMap<&'static str, Option<f64>>,
	pub contributions: BTreeMap<&'static str, f64>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct PurgeRequest {
	#[serde(default)]
	pub namespace: Option<String>,
}

#[derive(Clone, Copy, Debug, Serialize)]
pub struct PurgeResponse {
	pub purged: u64,
}

/// A request that passed validation, in canonical form.
#[derive(Debug)]
struct Plan {
	limit: usize,
	filter: CandidateFilter,
	preferred_skills: Vec<String>,
	role: RoleArchetype,
}

#[derive(Debug, Deserialize, Serialize)]
struct EmbeddingCachePayload {
	vector: Vec<f32>,
}

impl ScoutService {
	pub async fn search(&self, tenant_id: &str, req: SearchRequest) -> Result<SearchResponse> {
		let plan = self.plan(tenant_id, &req)?;

		self.limiter
			.check(tenant_id)
			.map_err(|retry_after_secs| Error::RateLimited { retry_after_secs })?;

		let span = tracing::info_span!(
			"search",
			tenant_id,
			role = plan.role.as_str(),
			filtered = !plan.filter.is_empty()
		);

		self.run_search(tenant_id, &req, plan).instrument(span).await
	}

	/// Drops cached entries for one tenant, optionally one namespace only.
	pub async fn purge_cache(&self, tenant_id: &str, req: PurgeRequest) -> Result<PurgeResponse> {
		validate_tenant_id(tenant_id)?;

		let namespace = match req.namespace.as_deref() {
			None => None,
			Some(raw) => Some(CacheNamespace::parse(raw).ok_or_else(|| {
				Error::invalid(format!("Unknown cache namespace: {raw}."))
			})?),
		};
		let purged = self.stores.cache.purge(tenant_id, namespace).await?;

		tracing::info!(
			tenant_id,
			cache_kind = namespace.map(CacheNamespace::as_str).unwrap_or("all"),
			purged,
			"Cache purged."
		);

		Ok(PurgeResponse { purged })
	}

	/// Drops expired cache entries of every tenant.
	pub async fn sweep_expired_cache(&self) -> Result<u64> {
		let purged = self.stores.cache.purge_expired(OffsetDateTime::now_utc()).await?;

		if purged > 0 {
			tracing::info!(count = purged, "Purged expired search cache entries.");
		}

		Ok(purged)
	}

	fn plan(&self, tenant_id: &str, req: &SearchRequest) -> Result<Plan> {
		validate_tenant_id(tenant_id)?;

		if req.job_description.trim().is_empty() {
			return Err(Error::invalid("jobDescription must not be empty."));
		}

		let results_cfg = &self.cfg.search.results;
		let limit = req.limit.unwrap_or(results_cfg.default_limit);

		if limit == 0 || limit > results_cfg.max_limit {
			return Err(Error::invalid(format!(
				"limit must be between 1 and {}.",
				results_cfg.max_limit
			)));
		}

		let role = match req.role_type.as_deref() {
			Some(raw) => RoleArchetype::parse(raw)
				.ok_or_else(|| Error::invalid(format!("Unknown roleType: {raw}.")))?,
			None => RoleArchetype::infer(&req.job_description),
		};
		let filters = req.filters.clone().unwrap_or_default();
		let (filter, preferred_skills) = build_filter(filters)?;

		Ok(Plan { limit: limit as usize, filter, preferred_skills, role })
	}

	async fn run_search(
		&self,
		tenant_id: &str,
		req: &SearchRequest,
		plan: Plan,
	) -> Result<SearchResponse> {
		let sla_cfg = &self.cfg.search.sla;
		let mut budget = SlaBudget::start(sla_cfg.target_ms, sla_cfg.safety_margin_ms);
		let now = OffsetDateTime::now_utc();
		let resolved = weights::resolve(plan.role, req.signal_weights.as_ref(), &self.policy)?;

		for note in resolved.notes() {
			tracing::info!(note = note.as_str(), "Signal weight adjusted.");
		}

		let stage_started = Instant::now();
		let (vector, embedding_cached) =
			self.embed_query(tenant_id, &req.job_description, &budget, now).await?;

		budget.record(Stage::Embedding, stage_started.elapsed());

		let stage_started = Instant::now();
		let outcome = recall::recall(
			&self.stores,
			&self.cfg.search.recall,
			&budget,
			RecallArgs {
				tenant_id,
				vector: &vector,
				query: &req.job_description,
				filter: &plan.filter,
			},
		)
		.await?;
		let recalled_ids: Vec<Uuid> =
			outcome.candidates.iter().map(|candidate| candidate.candidate_id).collect();
		let profiles: HashMap<Uuid, CandidateProfile> = self
			.stores
			.profiles
			.fetch_profiles(tenant_id, &recalled_ids)
			.await?
			.into_iter()
			.map(|profile| (profile.candidate_id, profile))
			.collect();

		budget.record(Stage::Retrieval, stage_started.elapsed());

		let stage_started = Instant::now();
		let ctx = SignalContext::new(
			QueryTerms {
				job_description: &req.job_description,
				required_skills: &plan.filter.required_skills,
				preferred_skills: &plan.preferred_skills,
				min_years: plan.filter.min_years,
				max_years: plan.filter.max_years,
			},
			self.cfg.ranking.recency_tau_days,
			now,
		)
		.with_channels(outcome.vector.is_ok(), outcome.text.is_ok(), outcome.max_text_score);
		let scored: Vec<(Uuid, signals::CandidateSignals)> = outcome
			.candidates
			.iter()
			.filter_map(|candidate| {
				let profile = profiles.get(&candidate.candidate_id)?;

				Some((candidate.candidate_id, signals::compute(&ctx, candidate, profile)))
			})
			.collect();
		let dropped_candidates = recalled_ids.len() - scored.len();

		if dropped_candidates > 0 {
			tracing::info!(
				dropped_candidates,
				"Recalled candidates without a visible profile dropped."
			);
		}

		let fused = fusion::fuse(&resolved, scored);

		budget.record(Stage::Fusion, stage_started.elapsed());

		let window_size = (self.cfg.search.rerank.top_k as usize).min(fused.len());
		let ranked = {
			let window: Vec<(&FusedCandidate, &CandidateProfile)> = fused[..window_size]
				.iter()
				.filter_map(|candidate| {
					profiles.get(&candidate.candidate_id).map(|profile| (candidate, profile))
				})
				.collect();

			rerank::rerank_window(
				&self.cfg,
				&self.providers,
				&self.stores.cache,
				&budget,
				RerankArgs { tenant_id, job_description: &req.job_description, window: &window, now },
			)
			.await
		};

		budget.record(Stage::Rerank, Duration::from_millis(ranked.ranking_ms()));

		if let Some(reason) = ranked.fallback_reason() {
			tracing::info!(reason = reason.as_str(), "Serving fused order.");
		}

		let debug_rows = req.include_debug.then(|| debug_candidates(&fused));
		let mut merged = rerank::merge(fused, &ranked, window_size);
		let total_candidates = merged.len();
		let pool: Vec<&CandidateProfile> = merged
			.iter()
			.filter_map(|candidate| profiles.get(&candidate.fused.candidate_id))
			.collect();
		let slate: Vec<&CandidateProfile> = pool.iter().take(plan.limit).copied().collect();
		let bias_warnings = self.policy.audit_slate(&slate, &pool);

		for warning in &bias_warnings {
			tracing::warn!(
				kind = ?warning.kind,
				dimension = warning.dimension.as_str(),
				group = warning.group.as_str(),
				value = warning.value,
				"Slate bias warning."
			);
		}

		merged.truncate(plan.limit);

		let results = merged
			.into_iter()
			.enumerate()
			.map(|(idx, candidate)| to_result(idx, candidate))
			.collect();
		let timings = SearchTimings {
			embedding_ms: budget.stage_ms(Stage::Embedding),
			retrieval_ms: budget.stage_ms(Stage::Retrieval),
			fusion_ms: budget.stage_ms(Stage::Fusion),
			rerank_ms: budget.stage_ms(Stage::Rerank),
		};
		let debug = debug_rows.map(|candidates| SearchDebug {
			role_type: plan.role,
			weights: resolved.to_map(),
			weight_notes: resolved.notes().to_vec(),
			vector_channel: outcome.vector,
			text_channel: outcome.text,
			embedding_cached,
			rerank_cached: ranked.cached(),
			dropped_candidates,
			candidates,
		});
		let metadata = SearchMetadata {
			total_candidates,
			search_time_ms: sla::millis(budget.elapsed()),
			used_fallback: ranked.used_fallback(),
			fallback_reason: ranked.fallback_reason(),
			rerank_cached: ranked.cached(),
			role_type: plan.role,
			bias_warnings,
		};

		tracing::info!(
			total_candidates,
			embedding_ms = timings.embedding_ms,
			retrieval_ms = timings.retrieval_ms,
			fusion_ms = timings.fusion_ms,
			rerank_ms = timings.rerank_ms,
			used_fallback = metadata.used_fallback,
			"Search completed."
		);

		Ok(SearchResponse { results, metadata, timings, debug })
	}

	/// Query vector from the cache, else the provider within the remaining budget.
	async fn embed_query(
		&self,
		tenant_id: &str,
		query: &str,
		budget: &SlaBudget,
		now: OffsetDateTime,
	) -> Result<(Vec<f32>, bool)> {
		let provider_cfg = &self.cfg.providers.embedding;
		let cache_cfg = &self.cfg.search.cache;
		let expected_dim = self.cfg.storage.qdrant.vector_dim as usize;
		let cache_key = if cache_cfg.enabled {
			match cache::build_embedding_cache_key(
				tenant_id,
				&provider_cfg.provider_id,
				&provider_cfg.model,
				provider_cfg.dimensions,
				query,
			) {
				Ok(key) => Some(key),
				Err(err) => {
					tracing::warn!(
						error = %err,
						cache_kind = CacheNamespace::Embedding.as_str(),
						"Cache key build failed."
					);

					None
				},
			}
		} else {
			None
		};

		if let Some(key) = cache_key.as_deref()
			&& let Some(payload) = cache::read::<EmbeddingCachePayload>(
				self.stores.cache.as_ref(),
				tenant_id,
				CacheNamespace::Embedding,
				key,
				now,
				budget.bound(Duration::from_millis(cache_cfg.read_timeout_ms)),
			)
			.await
			&& payload.vector.len() == expected_dim
		{
			return Ok((payload.vector, true));
		}

		let deadline = budget.bound(Duration::from_millis(provider_cfg.timeout_ms));

		if deadline.is_zero() {
			return Err(Error::EmbeddingUnavailable {
				message: "No latency budget left for the embedding call.".to_string(),
			});
		}

		let texts = vec![query.to_string()];
		let vectors = match tokio::time::timeout(
			deadline,
			self.providers.embedding.embed(provider_cfg, &texts, deadline),
		)
		.await
		{
			Ok(Ok(vectors)) => vectors,
			Ok(Err(err)) => {
				tracing::warn!(error = %err, "Embedding provider failed.");

				return Err(Error::EmbeddingUnavailable { message: err.to_string() });
			},
			Err(_) => {
				tracing::warn!(timeout_ms = sla::millis(deadline), "Embedding provider timed out.");

				return Err(Error::EmbeddingUnavailable {
					message: "Embedding provider timed out.".to_string(),
				});
			},
		};
		let Some(vector) = vectors.into_iter().next() else {
			return Err(Error::EmbeddingUnavailable {
				message: "Embedding provider returned no vector.".to_string(),
			});
		};

		if vector.len() != expected_dim {
			return Err(Error::EmbeddingUnavailable {
				message: format!(
					"Embedding dimension mismatch; expected {expected_dim}, got {}.",
					vector.len()
				),
			});
		}
		if vector.iter().any(|value| !value.is_finite()) {
			return Err(Error::EmbeddingUnavailable {
				message: "Embedding contains non-finite values.".to_string(),
			});
		}

		if let Some(key) = cache_key.as_deref() {
			let payload = EmbeddingCachePayload { vector };

			cache::spawn_write(
				&self.stores.cache,
				WriteArgs {
					tenant_id,
					namespace: CacheNamespace::Embedding,
					key,
					now,
					ttl_secs: cache_cfg.embedding_ttl_secs,
					max_payload_bytes: cache_cfg.max_payload_bytes,
				},
				&payload,
			);

			return Ok((payload.vector, false));
		}

		Ok((vector, false))
	}
}

fn validate_tenant_id(tenant_id: &str) -> Result<()> {
	if tenant_id.is_empty() {
		return Err(Error::invalid("Tenant ID is required."));
	}
	if tenant_id.chars().count() > MAX_TENANT_ID_CHARS
		|| !tenant_id
			.chars()
			.all(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '-' | '_' | '.' | ':'))
	{
		return Err(Error::invalid(
			"Tenant ID must be at most 128 characters of letters, digits, '-', '_', '.' or ':'.",
		));
	}

	Ok(())
}

/// Canonical filter for both recall channels plus the preferred skills that only feed scoring.
fn build_filter(filters: SearchFilters) -> Result<(CandidateFilter, Vec<String>)> {
	for (field, value) in [
		("minYearsExperience", filters.min_years_experience),
		("maxYearsExperience", filters.max_years_experience),
	] {
		if value.is_some_and(|years| !years.is_finite() || years < 0.0) {
			return Err(Error::invalid(format!("filters.{field} must be zero or greater.")));
		}
	}
	if let (Some(min), Some(max)) = (filters.min_years_experience, filters.max_years_experience)
		&& min > max
	{
		return Err(Error::invalid(
			"filters.minYearsExperience must not exceed filters.maxYearsExperience.",
		));
	}

	let mut seniority_levels = Vec::with_capacity(filters.seniority_levels.len());

	for raw in &filters.seniority_levels {
		let level = Seniority::parse(raw)
			.ok_or_else(|| Error::invalid(format!("Unknown seniority level: {raw}.")))?;

		if !seniority_levels.contains(&level) {
			seniority_levels.push(level);
		}
	}

	let required_skills = canonical_skills("requiredSkills", &filters.required_skills)?;
	let preferred_skills: Vec<String> =
		canonical_skills("preferredSkills", &filters.preferred_skills)?
			.into_iter()
			.filter(|skill| !required_skills.contains(skill))
			.collect();
	let mut locations = Vec::with_capacity(filters.locations.len());

	for raw in &filters.locations {
		let location = text::normalize_text(raw);

		if location.is_empty() {
			return Err(Error::invalid("filters.locations must not contain empty values."));
		}
		if !locations.contains(&location) {
			locations.push(location);
		}
	}

	let filter = CandidateFilter {
		min_years: filters.min_years_experience,
		max_years: filters.max_years_experience,
		seniority_levels,
		required_skills,
		locations,
		updated_after: filters.updated_after,
	};

	Ok((filter, preferred_skills))
}

fn canonical_skills(field: &str, raw: &[String]) -> Result<Vec<String>> {
	let mut out = Vec::with_capacity(raw.len());

	for name in raw {
		let skill = text::normalize_skill(name);

		if skill.is_empty() {
			return Err(Error::invalid(format!("filters.{field} must not contain empty values.")));
		}
		if !out.contains(&skill) {
			out.push(skill);
		}
	}

	Ok(out)
}

fn to_result(idx: usize, candidate: RankedCandidate) -> SearchResult {
	let score = candidate.score();
	let RankedCandidate { fused, verdict } = candidate;
	let (rerank_score, match_reasons) = match verdict {
		Some(verdict) => (Some(verdict.score), verdict.reasons),
		None => (None, Vec::new()),
	};

	SearchResult {
		candidate_id: fused.candidate_id,
		rank: idx as u32 + 1,
		score,
		fused_score: fused.fused_score,
		rerank_score,
		match_reasons,
		skills: ResultSkills {
			matched: fused.signals.matched_skills,
			inferred: fused.signals.inferred_skills,
		},
	}
}

fn debug_candidates(fused: &[FusedCandidate]) -> Vec<DebugCandidate> {
	fused
		.iter()
		.map(|candidate| DebugCandidate {
			candidate_id: candidate.candidate_id,
			fused_rank: candidate.rank,
			signals: Signal::ALL
				.into_iter()
				.map(|signal| (signal.as_str(), candidate.signals.get(signal)))
				.collect(),
			contributions: Signal::ALL
				.into_iter()
				.map(|signal| (signal.as_str(), candidate.contributions[signal.index()]))
				.collect(),
		})
		.collect()
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn tenant_ids_are_restricted() {
		assert!(validate_tenant_id("acme-prod_01").is_ok());
		assert!(validate_tenant_id("").is_err());
		assert!(validate_tenant_id("acme corp").is_err());
		assert!(validate_tenant_id(&"a".repeat(129)).is_err());
	}

	#[test]
	fn filters_are_canonicalized() {
		let (filter, preferred) = build_filter(SearchFilters {
			min_years_experience: Some(3.0),
			seniority_levels: vec!["Senior".to_string(), "sr".to_string()],
			required_skills: vec!["k8s".to_string(), "Kubernetes".to_string()],
			preferred_skills: vec!["kubernetes".to_string(), "Golang".to_string()],
			locations: vec![" Berlin ".to_string()],
			..Default::default()
		})
		.expect("filters must validate");

		assert_eq!(filter.seniority_levels, vec![Seniority::Senior]);
		assert_eq!(filter.required_skills, vec!["kubernetes".to_string()]);
		assert_eq!(filter.locations, vec!["berlin".to_string()]);
		assert_eq!(preferred, vec!["go".to_string()]);
	}

	#[test]
	fn malformed_filters_are_rejected() {
		for filters in [
			SearchFilters { min_years_experience: Some(-1.0), ..Default::default() },
			SearchFilters {
				min_years_experience: Some(8.0),
				max_years_experience: Some(3.0),
				..Default::default()
			},
			SearchFilters { seniority_levels: vec!["wizard".to_string()], ..Default::default() },
			SearchFilters { required_skills: vec!["  ".to_string()], ..Default::default() },
		] {
			assert!(matches!(build_filter(filters), Err(Error::InvalidRequest { .. })));
		}
	}

	#[test]
	fn request_accepts_camel_case_json() {
		let req: SearchRequest = serde_json::from_value(serde_json::json!({
			"jobDescription": "Senior backend engineer",
			"limit": 5,
			"filters": { "requiredSkills": ["rust"], "updatedAfter": "2026-01-01T00:00:00Z" },
			"signalWeights": { "skillsMatch": 0.4 },
			"roleType": "individual_contributor",
			"includeDebug": true
		}))
		.expect("request must decode");
		let filters = req.filters.expect("filters must decode");

		assert_eq!(req.limit, Some(5));
		assert!(req.include_debug);
		assert_eq!(filters.required_skills, vec!["rust".to_string()]);
		assert!(filters.updated_after.is_some());
	}
}
