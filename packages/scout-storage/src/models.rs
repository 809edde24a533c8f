use serde_json::Value;
use time::OffsetDateTime;
use uuid::Uuid;

use scout_domain::{CandidateProfile, Seniority};

use crate::Result;

#[derive(Debug, sqlx::FromRow)]
pub struct CandidateRow {
	pub tenant_id: String,
	pub candidate_id: Uuid,
	pub document: String,
	pub skills: Value,
	pub seniority: Option<String>,
	pub years_experience: Option<f32>,
	pub companies: Value,
	pub specialty_tags: Vec<String>,
	pub location: Option<String>,
	pub updated_at: OffsetDateTime,
}
impl CandidateRow {
	pub fn into_profile(self) -> Result<CandidateProfile> {
		Ok(CandidateProfile {
			candidate_id: self.candidate_id,
			document: self.document,
			skills: serde_json::from_value(self.skills)?,
			// Unknown labels from older ingestion runs read as unstated.
			seniority: self.seniority.as_deref().and_then(Seniority::parse),
			years_experience: self.years_experience,
			companies: serde_json::from_value(self.companies)?,
			specialty_tags: self.specialty_tags,
			location: self.location,
			updated_at: self.updated_at,
		})
	}
}

/// Raw per-channel hit; scores are not comparable across channels.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ChannelHit {
	pub candidate_id: Uuid,
	pub score: f32,
}

#[derive(Debug, sqlx::FromRow)]
pub struct CacheRow {
	pub payload: Value,
	pub created_at: OffsetDateTime,
	pub expires_at: OffsetDateTime,
}
