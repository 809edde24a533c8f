use sqlx::Row;
use uuid::Uuid;

use scout_domain::{CandidateFilter, CandidateProfile, text};

use crate::{
	Result,
	db::Db,
	models::{CandidateRow, ChannelHit},
};

const MAX_QUERY_TERMS: usize = 64;

pub async fn upsert_candidate(db: &Db, tenant_id: &str, profile: &CandidateProfile) -> Result<()> {
	let skills_normalized = profile.normalized_skills();
	let location_normalized = profile.location.as_deref().map(text::normalize_text);

	sqlx::query(
		"\
INSERT INTO candidates (
	tenant_id,
	candidate_id,
	document,
	skills,
	skills_normalized,
	seniority,
	years_experience,
	companies,
	specialty_tags,
	location,
	location_normalized,
	updated_at
)
VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
ON CONFLICT (tenant_id, candidate_id) DO UPDATE SET
	document = EXCLUDED.document,
	skills = EXCLUDED.skills,
	skills_normalized = EXCLUDED.skills_normalized,
	seniority = EXCLUDED.seniority,
	years_experience = EXCLUDED.years_experience,
	companies = EXCLUDED.companies,
	specialty_tags = EXCLUDED.specialty_tags,
	location = EXCLUDED.location,
	location_normalized = EXCLUDED.location_normalized,
	updated_at = EXCLUDED.updated_at",
	)
	.bind(tenant_id)
	.bind(profile.candidate_id)
	.bind(profile.document.as_str())
	.bind(serde_json::to_value(&profile.skills)?)
	.bind(&skills_normalized)
	.bind(profile.seniority.map(|level| level.as_str()))
	.bind(profile.years_experience)
	.bind(serde_json::to_value(&profile.companies)?)
	.bind(&profile.specialty_tags)
	.bind(profile.location.as_deref())
	.bind(location_normalized.as_deref())
	.bind(profile.updated_at)
	.execute(&db.pool)
	.await?;

	Ok(())
}

/// Full-text channel: `ts_rank_cd` over the generated document vector with filters in `WHERE`.
pub async fn search_text(
	db: &Db,
	tenant_id: &str,
	query: &str,
	filter: &CandidateFilter,
	limit: u32,
) -> Result<Vec<ChannelHit>> {
	let Some(tsquery) = build_tsquery(query) else {
		return Ok(Vec::new());
	};
	let seniority_levels: Vec<&str> =
		filter.seniority_levels.iter().map(|level| level.as_str()).collect();
	let rows = sqlx::query(
		"\
SELECT c.candidate_id, ts_rank_cd(c.search_tsv, q.query) AS score
FROM candidates c, to_tsquery('english', $2) AS q(query)
WHERE c.tenant_id = $1
	AND c.search_tsv @@ q.query
	AND ($3::real IS NULL OR c.years_experience >= $3)
	AND ($4::real IS NULL OR c.years_experience <= $4)
	AND (cardinality($5::text[]) = 0 OR c.seniority = ANY($5::text[]))
	AND c.skills_normalized @> $6::text[]
	AND (cardinality($7::text[]) = 0 OR c.location_normalized = ANY($7::text[]))
	AND ($8::timestamptz IS NULL OR c.updated_at > $8)
ORDER BY score DESC, c.candidate_id ASC
LIMIT $9",
	)
	.bind(tenant_id)
	.bind(tsquery)
	.bind(filter.min_years)
	.bind(filter.max_years)
	.bind(&seniority_levels)
	.bind(&filter.required_skills)
	.bind(&filter.locations)
	.bind(filter.updated_after)
	.bind(i64::from(limit))
	.fetch_all(&db.pool)
	.await?;
	let mut hits = Vec::with_capacity(rows.len());

	for row in rows {
		hits.push(ChannelHit {
			candidate_id: row.try_get("candidate_id")?,
			score: row.try_get("score")?,
		});
	}

	Ok(hits)
}

/// Profiles visible to `tenant_id`. Unknown IDs are silently absent from the result.
pub async fn fetch_profiles(
	db: &Db,
	tenant_id: &str,
	candidate_ids: &[Uuid],
) -> Result<Vec<CandidateProfile>> {
	if candidate_ids.is_empty() {
		return Ok(Vec::new());
	}

	let rows: Vec<CandidateRow> = sqlx::query_as(
		"\
SELECT
	tenant_id,
	candidate_id,
	document,
	skills,
	seniority,
	years_experience,
	companies,
	specialty_tags,
	location,
	updated_at
FROM candidates
WHERE tenant_id = $1 AND candidate_id = ANY($2)",
	)
	.bind(tenant_id)
	.bind(candidate_ids)
	.fetch_all(&db.pool)
	.await?;

	rows.into_iter().map(CandidateRow::into_profile).collect()
}

/// OR-joined lexeme query built from the free-form description, or `None` when nothing is
/// searchable.
pub fn build_tsquery(query: &str) -> Option<String> {
	let mut terms: Vec<String> = Vec::new();

	for token in text::tokenize(query) {
		let term: String = token.chars().filter(|ch| ch.is_alphanumeric()).collect();

		if term.is_empty() || terms.contains(&term) {
			continue;
		}

		terms.push(term);

		if terms.len() == MAX_QUERY_TERMS {
			break;
		}
	}

	if terms.is_empty() { None } else { Some(terms.join(" | ")) }
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn tsquery_strips_operators_and_dedupes() {
		assert_eq!(
			build_tsquery("Rust & Go! rust (node.js) | k8s").as_deref(),
			Some("rust | go | nodejs | k8s")
		);
	}

	#[test]
	fn tsquery_is_none_without_terms() {
		assert_eq!(build_tsquery("  !!  & | "), None);
	}
}
