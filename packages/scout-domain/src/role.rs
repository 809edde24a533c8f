use serde::{Deserialize, Serialize};

use crate::{signal::Signal, text};

#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RoleArchetype {
	Executive,
	Manager,
	IndividualContributor,
}
impl RoleArchetype {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Executive => "executive",
			Self::Manager => "manager",
			Self::IndividualContributor => "individual_contributor",
		}
	}

	pub fn parse(raw: &str) -> Option<Self> {
		match text::normalize_text(raw).replace(['-', ' '], "_").as_str() {
			"executive" | "exec" => Some(Self::Executive),
			"manager" | "management" => Some(Self::Manager),
			"individual_contributor" | "individualcontributor" | "ic" =>
				Some(Self::IndividualContributor),
			_ => None,
		}
	}

	/// Role implied by the job description. Executive cues win over manager cues.
	pub fn infer(job_description: &str) -> Self {
		let tokens = text::tokenize(job_description);
		let has = |phrase: &str| text::contains_phrase(&tokens, phrase);

		if ["chief", "vp", "vice president", "head of", "cto", "ceo", "cio", "svp", "evp"]
			.into_iter()
			.any(has)
		{
			return Self::Executive;
		}
		if ["manager", "director", "team lead", "engineering lead", "people lead"]
			.into_iter()
			.any(has)
		{
			return Self::Manager;
		}

		Self::IndividualContributor
	}

	/// Default emphasis per archetype. Each preset sums to 1.0.
	pub fn preset(self) -> [(Signal, f64); 12] {
		use Signal::*;

		match self {
			Self::IndividualContributor => [
				(VectorSimilarity, 0.16),
				(TextScore, 0.10),
				(LevelMatch, 0.06),
				(SpecialtyMatch, 0.08),
				(TechStackMatch, 0.12),
				(FunctionMatch, 0.06),
				(SeniorityAlignment, 0.08),
				(TrajectoryFit, 0.04),
				(CompanyPedigree, 0.02),
				(CompanyRelevance, 0.04),
				(SkillsMatch, 0.20),
				(Recency, 0.04),
			],
			Self::Manager => [
				(VectorSimilarity, 0.14),
				(TextScore, 0.08),
				(LevelMatch, 0.10),
				(SpecialtyMatch, 0.06),
				(TechStackMatch, 0.08),
				(FunctionMatch, 0.10),
				(SeniorityAlignment, 0.08),
				(TrajectoryFit, 0.10),
				(CompanyPedigree, 0.06),
				(CompanyRelevance, 0.05),
				(SkillsMatch, 0.12),
				(Recency, 0.03),
			],
			Self::Executive => [
				(VectorSimilarity, 0.12),
				(TextScore, 0.06),
				(LevelMatch, 0.12),
				(SpecialtyMatch, 0.04),
				(TechStackMatch, 0.02),
				(FunctionMatch, 0.12),
				(SeniorityAlignment, 0.10),
				(TrajectoryFit, 0.16),
				(CompanyPedigree, 0.12),
				(CompanyRelevance, 0.10),
				(SkillsMatch, 0.02),
				(Recency, 0.02),
			],
		}
	}
}

#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobFunction {
	Backend,
	Frontend,
	FullStack,
	Data,
	MachineLearning,
	DevOps,
	Mobile,
	Security,
	Quality,
}
impl JobFunction {
	const CUES: [(&'static str, Self); 24] = [
		("full stack", Self::FullStack),
		("fullstack", Self::FullStack),
		("backend", Self::Backend),
		("back end", Self::Backend),
		("server side", Self::Backend),
		("frontend", Self::Frontend),
		("front end", Self::Frontend),
		("ui engineer", Self::Frontend),
		("data engineer", Self::Data),
		("data engineering", Self::Data),
		("analytics", Self::Data),
		("machine learning", Self::MachineLearning),
		("ml", Self::MachineLearning),
		("devops", Self::DevOps),
		("sre", Self::DevOps),
		("site reliability", Self::DevOps),
		("infrastructure", Self::DevOps),
		("platform", Self::DevOps),
		("mobile", Self::Mobile),
		("ios", Self::Mobile),
		("android", Self::Mobile),
		("security", Self::Security),
		("qa", Self::Quality),
		("test automation", Self::Quality),
	];

	pub fn as_str(self) -> &'static str {
		match self {
			Self::Backend => "backend",
			Self::Frontend => "frontend",
			Self::FullStack => "full_stack",
			Self::Data => "data",
			Self::MachineLearning => "machine_learning",
			Self::DevOps => "devops",
			Self::Mobile => "mobile",
			Self::Security => "security",
			Self::Quality => "quality",
		}
	}

	/// Earliest function cue in the text.
	pub fn infer(input: &str) -> Option<Self> {
		let tokens = text::tokenize(input);

		Self::CUES
			.iter()
			.filter_map(|(cue, function)| {
				text::phrase_position(&tokens, cue).map(|pos| (pos, *function))
			})
			.min_by_key(|(pos, _)| *pos)
			.map(|(_, function)| function)
	}

	/// 1.0 for the same function, 0.6 between full-stack and either side of it, else 0.
	pub fn affinity(self, other: Self) -> f64 {
		if self == other {
			return 1.0;
		}

		match (self, other) {
			(Self::FullStack, Self::Backend | Self::Frontend)
			| (Self::Backend | Self::Frontend, Self::FullStack) => 0.6,
			_ => 0.0,
		}
	}
}
