use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{Error, Result};

const SYSTEM_PROMPT: &str = "You are a technical recruiter ranking candidates for a role. \
Score every candidate from 0.0 to 1.0 for fit with the job description and give up to three \
short reasons. Respond with JSON only, shaped as \
{\"rankings\":[{\"candidate_id\":\"...\",\"score\":0.0,\"reasons\":[\"...\"],\"confidence\":0.0}]}. \
Never consider age, gender, ethnicity, names, photos, schools, or locations.";

#[derive(Clone, Debug, Serialize)]
pub struct RerankCandidate {
	pub candidate_id: String,
	pub summary: String,
}

/// One verdict as returned by the model, before any range validation.
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct RerankJudgement {
	#[serde(alias = "id", alias = "candidateId")]
	pub candidate_id: String,
	pub score: f64,
	#[serde(default)]
	pub reasons: Vec<String>,
	#[serde(default)]
	pub confidence: Option<f64>,
}

#[derive(Deserialize)]
struct RankingsEnvelope {
	#[serde(alias = "results", alias = "candidates")]
	rankings: Vec<RerankJudgement>,
}

/// Asks a chat-completions model to judge `candidates` against `job_description`.
pub async fn rerank(
	cfg: &scout_config::LlmProviderConfig,
	job_description: &str,
	candidates: &[RerankCandidate],
	budget: Duration,
) -> Result<Vec<RerankJudgement>> {
	let client = crate::client_within(cfg.timeout_ms, budget)?;
	let url = format!("{}{}", cfg.api_base, cfg.path);
	let body = serde_json::json!({
		"model": cfg.model,
		"temperature": cfg.temperature,
		"response_format": { "type": "json_object" },
		"messages": build_messages(job_description, candidates)?,
	});
	let res = client
		.post(url)
		.headers(crate::auth_headers(&cfg.api_key, &cfg.default_headers)?)
		.json(&body)
		.send()
		.await?;
	let json: Value = res.error_for_status()?.json().await?;

	parse_rerank_response(json)
}

fn build_messages(job_description: &str, candidates: &[RerankCandidate]) -> Result<Value> {
	let user = serde_json::json!({
		"job_description": job_description,
		"candidates": candidates,
	});

	Ok(serde_json::json!([
		{ "role": "system", "content": SYSTEM_PROMPT },
		{ "role": "user", "content": serde_json::to_string(&user)? },
	]))
}

fn parse_rerank_response(json: Value) -> Result<Vec<RerankJudgement>> {
	let content = json
		.get("choices")
		.and_then(Value::as_array)
		.and_then(|choices| choices.first())
		.and_then(|choice| choice.get("message"))
		.and_then(|msg| msg.get("content"))
		.and_then(Value::as_str)
		.ok_or_else(|| Error::invalid_response("Rerank response is missing message content."))?;

	parse_rankings(content)
}

fn parse_rankings(content: &str) -> Result<Vec<RerankJudgement>> {
	let trimmed = strip_code_fence(content);
	let parsed: Value = serde_json::from_str(trimmed)
		.map_err(|_| Error::invalid_response("Rerank content is not valid JSON."))?;

	match parsed {
		Value::Array(_) => Ok(serde_json::from_value(parsed)?),
		Value::Object(_) => {
			let envelope: RankingsEnvelope = serde_json::from_value(parsed)?;

			Ok(envelope.rankings)
		},
		_ => Err(Error::invalid_response("Rerank content must be a JSON object or array.")),
	}
}

fn strip_code_fence(content: &str) -> &str {
	let trimmed = content.trim();
	let Some(rest) = trimmed.strip_prefix("```") else {
		return trimmed;
	};
	let rest = rest.strip_prefix("json").unwrap_or(rest);

	rest.strip_suffix("```").unwrap_or(rest).trim()
}
