use std::{
	collections::{HashMap, HashSet},
	sync::Arc,
	time::Duration,
};

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tokio::time::{Instant, timeout};
use uuid::Uuid;

use scout_config::Config;
use scout_domain::{CandidateProfile, text};
use scout_providers::rerank::{RerankCandidate, RerankJudgement};

use crate::{
	CacheBackend, Providers,
	search::{
		cache::{self, CacheNamespace, WriteArgs},
		ranking::FusedCandidate,
		sla::{self, SlaBudget},
	},
};

const MAX_REASONS: usize = 3;

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct RerankVerdict {
	pub candidate_id: Uuid,
	/// In [0, 1].
	pub score: f64,
	pub reasons: Vec<String>,
	pub confidence: Option<f64>,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackReason {
	Disabled,
	NoCandidates,
	BudgetExhausted,
	Timeout,
	ProviderError,
	InvalidResponse,
}
impl FallbackReason {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Disabled => "disabled",
			Self::NoCandidates => "no_candidates",
			Self::BudgetExhausted => "budget_exhausted",
			Self::Timeout => "timeout",
			Self::ProviderError => "provider_error",
			Self::InvalidResponse => "invalid_response",
		}
	}
}

/// Outcome of the rerank stage. Any failure degrades the whole window to fused order.
#[derive(Clone, Debug, PartialEq)]
pub enum RankedResult {
	Reranked { verdicts: HashMap<Uuid, RerankVerdict>, ranking_ms: u64, cached: bool },
	FusedOnly { reason: FallbackReason },
}
impl RankedResult {
	pub fn used_fallback(&self) -> bool {
		matches!(self, Self::FusedOnly { .. })
	}

	pub fn ranking_ms(&self) -> u64 {
		match self {
			Self::Reranked { ranking_ms, .. } => *ranking_ms,
			Self::FusedOnly { .. } => 0,
		}
	}

	pub fn cached(&self) -> bool {
		matches!(self, Self::Reranked { cached: true, .. })
	}

	pub fn fallback_reason(&self) -> Option<FallbackReason> {
		match self {
			Self::Reranked { .. } => None,
			Self::FusedOnly { reason } => Some(*reason),
		}
	}

	fn verdict(&self, candidate_id: &Uuid) -> Option<&RerankVerdict> {
		match self {
			Self::Reranked { verdicts, .. } => verdicts.get(candidate_id),
			Self::FusedOnly { .. } => None,
		}
	}
}

#[derive(Debug, Deserialize, Serialize)]
struct RerankCachePayload {
	verdicts: Vec<RerankVerdict>,
	ranking_ms: u64,
}

pub(crate) struct RerankArgs<'a> {
	pub(crate) tenant_id: &'a str,
	pub(crate) job_description: &'a str,
	/// Top of the fused order with its profiles, best first.
	pub(crate) window: &'a [(&'a FusedCandidate, &'a CandidateProfile)],
	pub(crate) now: OffsetDateTime,
}

pub(crate) async fn rerank_window(
	cfg: &Config,
	providers: &Providers,
	cache_backend: &Arc<dyn CacheBackend>,
	budget: &SlaBudget,
	args: RerankArgs<'_>,
) -> RankedResult {
	let RerankArgs { tenant_id, job_description, window, now } = args;
	let rerank_cfg = &cfg.search.rerank;
	let cache_cfg = &cfg.search.cache;
	let provider_cfg = &cfg.providers.rerank;

	if !rerank_cfg.enabled {
		return RankedResult::FusedOnly { reason: FallbackReason::Disabled };
	}
	if window.is_empty() {
		return RankedResult::FusedOnly { reason: FallbackReason::NoCandidates };
	}
	if budget.is_exhausted() {
		tracing::warn!(tenant_id, "Rerank skipped; latency budget exhausted.");

		return RankedResult::FusedOnly { reason: FallbackReason::BudgetExhausted };
	}

	let signature: Vec<(Uuid, OffsetDateTime)> =
		window.iter().map(|(fused, profile)| (fused.candidate_id, profile.updated_at)).collect();
	let cache_key = if cache_cfg.enabled {
		match cache::build_rerank_cache_key(
			tenant_id,
			&provider_cfg.provider_id,
			&provider_cfg.model,
			job_description,
			&signature,
		) {
			Ok(key) => Some(key),
			Err(err) => {
				tracing::warn!(
					error = %err,
					cache_kind = CacheNamespace::Rerank.as_str(),
					"Cache key build failed."
				);

				None
			},
		}
	} else {
		None
	};

	if let Some(key) = cache_key.as_deref()
		&& let Some(payload) = cache::read::<RerankCachePayload>(
			cache_backend.as_ref(),
			tenant_id,
			CacheNamespace::Rerank,
			key,
			now,
			budget.bound(Duration::from_millis(cache_cfg.read_timeout_ms)),
		)
		.await
	{
		return RankedResult::Reranked {
			verdicts: payload
				.verdicts
				.into_iter()
				.map(|verdict| (verdict.candidate_id, verdict))
				.collect(),
			ranking_ms: payload.ranking_ms,
			cached: true,
		};
	}

	let deadline = budget.bound(Duration::from_millis(rerank_cfg.max_timeout_ms));
	let candidates: Vec<RerankCandidate> = window
		.iter()
		.map(|(fused, profile)| RerankCandidate {
			candidate_id: fused.candidate_id.to_string(),
			summary: summarize(profile, rerank_cfg.summary_max_chars as usize),
		})
		.collect();
	let description =
		text::truncate_chars(job_description, rerank_cfg.description_max_chars as usize);
	let started = Instant::now();
	let judgements = match timeout(
		deadline,
		providers.rerank.rerank(provider_cfg, description, &candidates, deadline),
	)
	.await
	{
		Ok(Ok(judgements)) => judgements,
		Ok(Err(err)) => {
			let reason = match err {
				scout_providers::Error::InvalidResponse { .. }
				| scout_providers::Error::SerdeJson(_) => FallbackReason::InvalidResponse,
				_ if err.is_timeout() => FallbackReason::Timeout,
				_ => FallbackReason::ProviderError,
			};

			tracing::warn!(
				error = %err,
				tenant_id,
				reason = reason.as_str(),
				"Rerank failed; using fused order."
			);

			return RankedResult::FusedOnly { reason };
		},
		Err(_) => {
			tracing::warn!(
				tenant_id,
				timeout_ms = sla::millis(deadline),
				"Rerank timed out; using fused order."
			);

			return RankedResult::FusedOnly { reason: FallbackReason::Timeout };
		},
	};
	let window_ids: HashSet<Uuid> = window.iter().map(|(fused, _)| fused.candidate_id).collect();
	let verdicts = match validate_judgements(judgements, &window_ids) {
		Ok(verdicts) => verdicts,
		Err(message) => {
			tracing::warn!(
				tenant_id,
				detail = %message,
				"Rerank response rejected; using fused order."
			);

			return RankedResult::FusedOnly { reason: FallbackReason::InvalidResponse };
		},
	};

	if verdicts.is_empty() {
		tracing::warn!(tenant_id, "Rerank judged no candidate in the window; using fused order.");

		return RankedResult::FusedOnly { reason: FallbackReason::InvalidResponse };
	}

	let ranking_ms = sla::millis(started.elapsed());

	if let Some(key) = cache_key.as_deref() {
		let mut stored: Vec<RerankVerdict> = verdicts.values().cloned().collect();

		stored.sort_by_key(|verdict| verdict.candidate_id);

		cache::spawn_write(
			cache_backend,
			WriteArgs {
				tenant_id,
				namespace: CacheNamespace::Rerank,
				key,
				now,
				ttl_secs: cache_cfg.rerank_ttl_secs,
				max_payload_bytes: cache_cfg.max_payload_bytes,
			},
			&RerankCachePayload { verdicts: stored, ranking_ms },
		);
	}

	RankedResult::Reranked { verdicts, ranking_ms, cached: false }
}

/// Prompt-side view of a profile. Location never reaches the model.
pub fn summarize(profile: &CandidateProfile, max_chars: usize) -> String {
	let mut parts: Vec<String> = Vec::new();

	if let Some(level) = profile.effective_seniority() {
		parts.push(format!("Level: {}.", level.as_str()));
	}
	if let Some(years) = profile.years_experience {
		parts.push(format!("Experience: {years:.0} years."));
	}
	if !profile.skills.is_empty() {
		parts.push(format!("Skills: {}.", profile.normalized_skills().join(", ")));
	}
	if !profile.specialty_tags.is_empty() {
		parts.push(format!("Specialties: {}.", profile.specialty_tags.join(", ")));
	}
	if let Some(title) = profile.current_stint().and_then(|stint| stint.title.as_deref()) {
		parts.push(format!("Current role: {title}."));
	}

	parts.push(profile.document.trim().to_string());

	text::truncate_chars(&parts.join(" "), max_chars).to_string()
}

/// Unknown IDs are dropped; one unusable score rejects the whole batch.
pub fn validate_judgements(
	judgements: Vec<RerankJudgement>,
	window_ids: &HashSet<Uuid>,
) -> Result<HashMap<Uuid, RerankVerdict>, String> {
	let mut verdicts = HashMap::new();

	for judgement in judgements {
		let Some(candidate_id) =
			Uuid::parse_str(judgement.candidate_id.trim()).ok().filter(|id| window_ids.contains(id))
		else {
			tracing::warn!(
				candidate_id = judgement.candidate_id.as_str(),
				"Rerank returned a candidate outside the batch."
			);

			continue;
		};
		let score = normalize_score(judgement.score).ok_or_else(|| {
			format!("Score {} for candidate {candidate_id} is out of range.", judgement.score)
		})?;

		if verdicts.contains_key(&candidate_id) {
			continue;
		}

		let reasons = judgement
			.reasons
			.into_iter()
			.map(|reason| reason.trim().to_string())
			.filter(|reason| !reason.is_empty())
			.take(MAX_REASONS)
			.collect();
		let confidence = judgement.confidence.and_then(normalize_score);

		verdicts.insert(candidate_id, RerankVerdict { candidate_id, score, reasons, confidence });
	}

	Ok(verdicts)
}

/// Accepts [0, 1] as is and (1, 100] as a percentage.
fn normalize_score(raw: f64) -> Option<f64> {
	if !raw.is_finite() || raw < 0.0 {
		return None;
	}
	if raw <= 1.0 {
		return Some(raw);
	}
	if raw <= 100.0 {
		return Some(raw / 100.0);
	}

	None
}

#[derive(Clone, Debug)]
pub struct RankedCandidate {
	pub fused: FusedCandidate,
	pub verdict: Option<RerankVerdict>,
}
impl RankedCandidate {
	/// LLM score when judged, else the fused score.
	pub fn score(&self) -> f64 {
		self.verdict.as_ref().map(|verdict| verdict.score).unwrap_or(self.fused.fused_score)
	}
}

/// Reorders the top `window` by LLM score where present; the tail keeps fused order.
pub fn merge(
	fused: Vec<FusedCandidate>,
	ranked: &RankedResult,
	window: usize,
) -> Vec<RankedCandidate> {
	let mut merged: Vec<RankedCandidate> = fused
		.into_iter()
		.map(|fused| {
			let verdict = ranked.verdict(&fused.candidate_id).cloned();

			RankedCandidate { fused, verdict }
		})
		.collect();
	let head = window.min(merged.len());

	if !ranked.used_fallback() {
		merged[..head].sort_by(|left, right| {
			right
				.score()
				.total_cmp(&left.score())
				.then_with(|| left.fused.candidate_id.cmp(&right.fused.candidate_id))
		});
	}

	merged
}
