pub const DENSE_VECTOR_NAME: &str = "dense";

use std::collections::HashMap;

use qdrant_client::{
	Payload,
	qdrant::{
		Condition, CreateCollectionBuilder, Distance, Filter, PointStruct, Query,
		QueryPointsBuilder, Range, ScoredPoint, UpsertPointsBuilder, Value, Vector,
		VectorParamsBuilder, VectorsConfigBuilder, value::Kind,
	},
};
use time::OffsetDateTime;
use uuid::Uuid;

use scout_domain::{CandidateFilter, CandidateProfile};

use crate::{Error, Result, models::ChannelHit};

const UPDATED_AT_KEY: &str = "updated_at_micros";

pub struct QdrantStore {
	pub client: qdrant_client::Qdrant,
	pub collection: String,
	pub vector_dim: u32,
}
impl QdrantStore {
	pub fn new(cfg: &scout_config::Qdrant) -> Result<Self> {
		let client = qdrant_client::Qdrant::from_url(&cfg.url).build()?;

		Ok(Self { client, collection: cfg.collection.clone(), vector_dim: cfg.vector_dim })
	}

	pub async fn ensure_collection(&self) -> Result<()> {
		if self.client.collection_exists(self.collection.clone()).await? {
			return Ok(());
		}

		let mut vectors = VectorsConfigBuilder::default();

		vectors.add_named_vector_params(
			DENSE_VECTOR_NAME,
			VectorParamsBuilder::new(u64::from(self.vector_dim), Distance::Cosine),
		);

		self.client
			.create_collection(
				CreateCollectionBuilder::new(self.collection.clone()).vectors_config(vectors),
			)
			.await?;

		Ok(())
	}

	pub async fn upsert_candidate(
		&self,
		tenant_id: &str,
		profile: &CandidateProfile,
		vector: &[f32],
	) -> Result<()> {
		if vector.len() != self.vector_dim as usize {
			return Err(Error::InvalidArgument(format!(
				"Vector has {} dimensions; collection expects {}.",
				vector.len(),
				self.vector_dim
			)));
		}

		let payload = Payload::from(candidate_payload(tenant_id, profile));
		let mut vector_map = HashMap::new();

		vector_map.insert(DENSE_VECTOR_NAME.to_string(), Vector::from(vector.to_vec()));

		let point = PointStruct::new(
			point_id(tenant_id, profile.candidate_id).to_string(),
			vector_map,
			payload,
		);

		self.client
			.upsert_points(UpsertPointsBuilder::new(self.collection.clone(), vec![point]).wait(true))
			.await?;

		Ok(())
	}

	/// Vector channel: cosine nearest neighbours restricted to the tenant and the pushed-down
	/// filter.
	pub async fn nearest_neighbors(
		&self,
		tenant_id: &str,
		vector: Vec<f32>,
		filter: &CandidateFilter,
		limit: u32,
	) -> Result<Vec<ChannelHit>> {
		let search = QueryPointsBuilder::new(self.collection.clone())
			.query(Query::new_nearest(vector))
			.using(DENSE_VECTOR_NAME)
			.filter(build_filter(tenant_id, filter))
			.with_payload(true)
			.limit(u64::from(limit));
		let response = self.client.query(search).await?;

		Ok(response.result.iter().filter_map(scored_hit).collect())
	}
}

/// Point IDs are derived per tenant so the same candidate ID never collides across tenants.
pub fn point_id(tenant_id: &str, candidate_id: Uuid) -> Uuid {
	let name = format!("{tenant_id}:{candidate_id}");

	Uuid::new_v5(&Uuid::NAMESPACE_OID, name.as_bytes())
}

pub fn build_filter(tenant_id: &str, filter: &CandidateFilter) -> Filter {
	let mut must = vec![Condition::matches("tenant_id", tenant_id.to_string())];

	if filter.min_years.is_some() || filter.max_years.is_some() {
		must.push(Condition::range(
			"years_experience",
			Range {
				gte: filter.min_years.map(f64::from),
				lte: filter.max_years.map(f64::from),
				..Default::default()
			},
		));
	}
	if !filter.seniority_levels.is_empty() {
		let levels: Vec<String> =
			filter.seniority_levels.iter().map(|level| level.as_str().to_string()).collect();

		must.push(Condition::matches("seniority", levels));
	}

	for skill in &filter.required_skills {
		must.push(Condition::matches("skills", skill.clone()));
	}

	if !filter.locations.is_empty() {
		must.push(Condition::matches("location", filter.locations.clone()));
	}
	if let Some(after) = filter.updated_after {
		must.push(Condition::range(
			UPDATED_AT_KEY,
			Range { gt: Some(unix_micros(after) as f64), ..Default::default() },
		));
	}

	Filter::must(must)
}

/// Postgres keeps microseconds, so both channels compare `updated_after` at that precision.
fn unix_micros(at: OffsetDateTime) -> i64 {
	i64::try_from(at.unix_timestamp_nanos().div_euclid(1_000)).unwrap_or(i64::MAX)
}

fn candidate_payload(tenant_id: &str, profile: &CandidateProfile) -> HashMap<String, Value> {
	let mut payload_map = HashMap::new();

	payload_map.insert("tenant_id".to_string(), Value::from(tenant_id.to_string()));
	payload_map.insert("candidate_id".to_string(), Value::from(profile.candidate_id.to_string()));
	payload_map.insert(
		"skills".to_string(),
		Value::from(serde_json::Value::from(profile.normalized_skills())),
	);
	payload_map.insert(UPDATED_AT_KEY.to_string(), Value::from(unix_micros(profile.updated_at)));

	if let Some(level) = profile.seniority {
		payload_map.insert("seniority".to_string(), Value::from(level.as_str().to_string()));
	}
	if let Some(years) = profile.years_experience {
		payload_map.insert("years_experience".to_string(), Value::from(f64::from(years)));
	}
	if let Some(location) = profile.location.as_deref() {
		payload_map.insert(
			"location".to_string(),
			Value::from(scout_domain::text::normalize_text(location)),
		);
	}

	payload_map
}

fn scored_hit(point: &ScoredPoint) -> Option<ChannelHit> {
	let value = point.payload.get("candidate_id")?;
	let candidate_id = match &value.kind {
		Some(Kind::StringValue(text)) => Uuid::parse_str(text).ok()?,
		_ => return None,
	};

	Some(ChannelHit { candidate_id, score: point.score })
}
