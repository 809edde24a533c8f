use serde::{Deserialize, Serialize};

/// Attributes that act as demographic proxies. They are never computed; an override naming one
/// is accepted and pinned to zero.
pub const PROTECTED_ATTRIBUTES: [&str; 10] = [
	"location",
	"zip_code",
	"graduation_year",
	"school_name",
	"age",
	"gender",
	"ethnicity",
	"name",
	"photo",
	"marital_status",
];

#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Signal {
	VectorSimilarity,
	TextScore,
	LevelMatch,
	SpecialtyMatch,
	TechStackMatch,
	FunctionMatch,
	SeniorityAlignment,
	TrajectoryFit,
	CompanyPedigree,
	CompanyRelevance,
	SkillsMatch,
	Recency,
}
impl Signal {
	pub const ALL: [Self; 12] = [
		Self::VectorSimilarity,
		Self::TextScore,
		Self::LevelMatch,
		Self::SpecialtyMatch,
		Self::TechStackMatch,
		Self::FunctionMatch,
		Self::SeniorityAlignment,
		Self::TrajectoryFit,
		Self::CompanyPedigree,
		Self::CompanyRelevance,
		Self::SkillsMatch,
		Self::Recency,
	];

	pub fn as_str(self) -> &'static str {
		match self {
			Self::VectorSimilarity => "vector_similarity",
			Self::TextScore => "text_score",
			Self::LevelMatch => "level_match",
			Self::SpecialtyMatch => "specialty_match",
			Self::TechStackMatch => "tech_stack_match",
			Self::FunctionMatch => "function_match",
			Self::SeniorityAlignment => "seniority_alignment",
			Self::TrajectoryFit => "trajectory_fit",
			Self::CompanyPedigree => "company_pedigree",
			Self::CompanyRelevance => "company_relevance",
			Self::SkillsMatch => "skills_match",
			Self::Recency => "recency",
		}
	}

	pub fn index(self) -> usize {
		self as usize
	}

	pub fn risk(self) -> RiskTier {
		match self {
			Self::VectorSimilarity
			| Self::TextScore
			| Self::SpecialtyMatch
			| Self::TechStackMatch
			| Self::FunctionMatch
			| Self::SkillsMatch => RiskTier::None,
			Self::LevelMatch | Self::SeniorityAlignment | Self::TrajectoryFit | Self::Recency =>
				RiskTier::Low,
			Self::CompanyPedigree | Self::CompanyRelevance => RiskTier::Medium,
		}
	}

	/// Accepts snake_case and camelCase names.
	pub fn parse(raw: &str) -> Option<Self> {
		let key = snake_case(raw);

		Self::ALL.into_iter().find(|signal| signal.as_str() == key)
	}
}

#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskTier {
	None,
	Low,
	Medium,
	High,
}

/// A key a caller may name in a weight override.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum WeightKey {
	Signal(Signal),
	Protected(&'static str),
}
impl WeightKey {
	pub fn parse(raw: &str) -> Option<Self> {
		if let Some(signal) = Signal::parse(raw) {
			return Some(Self::Signal(signal));
		}

		let key = snake_case(raw);

		PROTECTED_ATTRIBUTES.into_iter().find(|attr| *attr == key).map(Self::Protected)
	}

	pub fn risk(self) -> RiskTier {
		match self {
			Self::Signal(signal) => signal.risk(),
			Self::Protected(_) => RiskTier::High,
		}
	}

	pub fn as_str(self) -> &'static str {
		match self {
			Self::Signal(signal) => signal.as_str(),
			Self::Protected(attr) => attr,
		}
	}
}

fn snake_case(raw: &str) -> String {
	let mut out = String::with_capacity(raw.len() + 4);

	for ch in raw.trim().chars() {
		if ch.is_ascii_uppercase() {
			if !out.is_empty() && !out.ends_with('_') {
				out.push('_');
			}

			out.push(ch.to_ascii_lowercase());
		} else if ch == '-' || ch == ' ' {
			out.push('_');
		} else {
			out.push(ch);
		}
	}

	out
}
