use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::text;

#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Seniority {
	Intern,
	Junior,
	Mid,
	Senior,
	Staff,
	Principal,
	Manager,
	Director,
	Executive,
}
impl Seniority {
	pub const ALL: [Self; 9] = [
		Self::Intern,
		Self::Junior,
		Self::Mid,
		Self::Senior,
		Self::Staff,
		Self::Principal,
		Self::Manager,
		Self::Director,
		Self::Executive,
	];

	pub fn as_str(self) -> &'static str {
		match self {
			Self::Intern => "intern",
			Self::Junior => "junior",
			Self::Mid => "mid",
			Self::Senior => "senior",
			Self::Staff => "staff",
			Self::Principal => "principal",
			Self::Manager => "manager",
			Self::Director => "director",
			Self::Executive => "executive",
		}
	}

	/// Position on a single career ladder. Managers sit beside staff engineers.
	pub fn rank(self) -> u8 {
		match self {
			Self::Intern => 0,
			Self::Junior => 1,
			Self::Mid => 2,
			Self::Senior => 3,
			Self::Staff | Self::Manager => 4,
			Self::Principal => 5,
			Self::Director => 6,
			Self::Executive => 7,
		}
	}

	/// Typical years-of-experience band, inclusive.
	pub fn typical_years(self) -> (f32, f32) {
		match self {
			Self::Intern => (0.0, 1.0),
			Self::Junior => (0.0, 2.0),
			Self::Mid => (2.0, 5.0),
			Self::Senior => (5.0, 10.0),
			Self::Staff => (8.0, 15.0),
			Self::Principal => (10.0, 25.0),
			Self::Manager => (6.0, 15.0),
			Self::Director => (10.0, 25.0),
			Self::Executive => (12.0, 40.0),
		}
	}

	pub fn parse(raw: &str) -> Option<Self> {
		match text::normalize_text(raw).replace(['-', '_'], " ").as_str() {
			"intern" | "internship" => Some(Self::Intern),
			"junior" | "jr" | "entry" | "entry level" => Some(Self::Junior),
			"mid" | "mid level" | "intermediate" => Some(Self::Mid),
			"senior" | "sr" => Some(Self::Senior),
			"staff" | "lead" | "tech lead" => Some(Self::Staff),
			"principal" | "distinguished" | "architect" => Some(Self::Principal),
			"manager" | "engineering manager" | "team lead" => Some(Self::Manager),
			"director" => Some(Self::Director),
			"executive" | "vp" | "chief" | "cto" | "ceo" | "head" => Some(Self::Executive),
			_ => None,
		}
	}

	/// First level keyword in reading order, e.g. a job title or the opening line of a posting.
	pub fn infer(input: &str) -> Option<Self> {
		let tokens = text::tokenize(input);

		for (idx, token) in tokens.iter().enumerate() {
			let next = tokens.get(idx + 1).map(String::as_str);
			let level = match (token.as_str(), next) {
				("team", Some("lead")) => Some(Self::Manager),
				("head", Some("of")) => Some(Self::Executive),
				("vice", Some("president")) => Some(Self::Executive),
				("intern", _) => Some(Self::Intern),
				("junior" | "jr", _) => Some(Self::Junior),
				("senior" | "sr", _) => Some(Self::Senior),
				("staff" | "lead", _) => Some(Self::Staff),
				("principal" | "distinguished", _) => Some(Self::Principal),
				("manager", _) => Some(Self::Manager),
				("director", _) => Some(Self::Director),
				("vp" | "chief" | "cto" | "ceo" | "cio", _) => Some(Self::Executive),
				_ => None,
			};

			if level.is_some() {
				return level;
			}
		}

		None
	}
}

#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CompanyTier {
	Tier1,
	Tier2,
	Tier3,
	#[default]
	Unranked,
}
impl CompanyTier {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Tier1 => "tier1",
			Self::Tier2 => "tier2",
			Self::Tier3 => "tier3",
			Self::Unranked => "unranked",
		}
	}

	pub fn pedigree(self) -> f64 {
		match self {
			Self::Tier1 => 1.0,
			Self::Tier2 => 0.7,
			Self::Tier3 => 0.4,
			Self::Unranked => 0.2,
		}
	}
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct SkillEntry {
	pub name: String,
	pub confidence: f32,
	/// Derived by enrichment rather than stated by the candidate.
	#[serde(default)]
	pub inferred: bool,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct CompanyStint {
	pub company: String,
	#[serde(default)]
	pub title: Option<String>,
	#[serde(default)]
	pub tier: CompanyTier,
	#[serde(default)]
	pub industry: Option<String>,
	#[serde(default)]
	pub start_year: Option<i32>,
	/// `None` marks the current position.
	#[serde(default)]
	pub end_year: Option<i32>,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct CandidateProfile {
	pub candidate_id: Uuid,
	pub document: String,
	#[serde(default)]
	pub skills: Vec<SkillEntry>,
	#[serde(default)]
	pub seniority: Option<Seniority>,
	#[serde(default)]
	pub years_experience: Option<f32>,
	#[serde(default)]
	pub companies: Vec<CompanyStint>,
	#[serde(default)]
	pub specialty_tags: Vec<String>,
	/// Filter-only attribute; never feeds a score.
	#[serde(default)]
	pub location: Option<String>,
	#[serde(with = "crate::time_serde")]
	pub updated_at: OffsetDateTime,
}
impl CandidateProfile {
	/// Stints ordered oldest first. Undated stints keep their stored order after dated ones.
	pub fn chronological_stints(&self) -> Vec<&CompanyStint> {
		let mut stints: Vec<&CompanyStint> = self.companies.iter().collect();

		stints.sort_by_key(|stint| (stint.start_year.is_none(), stint.start_year));

		stints
	}

	pub fn current_stint(&self) -> Option<&CompanyStint> {
		let stints = self.chronological_stints();

		stints
			.iter()
			.rev()
			.find(|stint| stint.end_year.is_none())
			.or_else(|| stints.iter().max_by_key(|stint| stint.end_year))
			.copied()
	}

	/// Stated seniority, else the level implied by the current title.
	pub fn effective_seniority(&self) -> Option<Seniority> {
		self.seniority.or_else(|| {
			self.current_stint().and_then(|stint| stint.title.as_deref()).and_then(Seniority::infer)
		})
	}

	pub fn primary_specialty(&self) -> Option<&str> {
		self.specialty_tags.first().map(String::as_str)
	}

	pub fn normalized_skills(&self) -> Vec<String> {
		self.skills.iter().map(|skill| text::normalize_skill(&skill.name)).collect()
	}
}

/// Structural constraints pushed down into both recall channels.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CandidateFilter {
	pub min_years: Option<f32>,
	pub max_years: Option<f32>,
	pub seniority_levels: Vec<Seniority>,
	/// Canonical skill names; a candidate must carry all of them.
	pub required_skills: Vec<String>,
	/// Lowercased locations; a candidate must match one of them.
	pub locations: Vec<String>,
	pub updated_after: Option<OffsetDateTime>,
}
impl CandidateFilter {
	pub fn is_empty(&self) -> bool {
		self.min_years.is_none()
			&& self.max_years.is_none()
			&& self.seniority_levels.is_empty()
			&& self.required_skills.is_empty()
			&& self.locations.is_empty()
			&& self.updated_after.is_none()
	}

	/// In-memory evaluation of the same predicate the stores push down.
	pub fn matches(&self, profile: &CandidateProfile) -> bool {
		if self.min_years.is_some() || self.max_years.is_some() {
			let Some(years) = profile.years_experience else {
				return false;
			};

			if self.min_years.is_some_and(|min| years < min)
				|| self.max_years.is_some_and(|max| years > max)
			{
				return false;
			}
		}
		if !self.seniority_levels.is_empty()
			&& !profile.seniority.is_some_and(|level| self.seniority_levels.contains(&level))
		{
			return false;
		}
		if !self.required_skills.is_empty() {
			let skills = profile.normalized_skills();

			if !self.required_skills.iter().all(|required| skills.contains(required)) {
				return false;
			}
		}
		if !self.locations.is_empty() {
			let Some(location) = profile.location.as_deref().map(text::normalize_text) else {
				return false;
			};

			if !self.locations.contains(&location) {
				return false;
			}
		}
		if let Some(after) = self.updated_after
			&& profile.updated_at <= after
		{
			return false;
		}

		true
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn infers_level_from_first_keyword() {
		assert_eq!(Seniority::infer("Senior Backend Engineer"), Some(Seniority::Senior));
		assert_eq!(Seniority::infer("Head of Platform"), Some(Seniority::Executive));
		assert_eq!(Seniority::infer("Team Lead, Payments"), Some(Seniority::Manager));
		assert_eq!(Seniority::infer("Software Engineer"), None);
	}

	#[test]
	fn parses_level_aliases() {
		assert_eq!(Seniority::parse("Mid-Level"), Some(Seniority::Mid));
		assert_eq!(Seniority::parse("sr"), Some(Seniority::Senior));
		assert_eq!(Seniority::parse("wizard"), None);
	}

	#[test]
	fn manager_shares_a_rung_with_staff() {
		assert_eq!(Seniority::Manager.rank(), Seniority::Staff.rank());
		assert!(Seniority::Director.rank() > Seniority::Principal.rank());
	}
}
