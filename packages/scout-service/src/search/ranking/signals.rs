use std::collections::{HashMap, HashSet};

use time::OffsetDateTime;

use scout_domain::{CandidateProfile, JobFunction, Seniority, Signal, text};

use crate::search::recall::RecallCandidate;

const INFERRED_SKILL_DISCOUNT: f64 = 0.6;
const PREFERRED_SKILL_IMPORTANCE: f64 = 0.5;
const YEARS_PENALTY_PER_YEAR: f64 = 0.15;
const TRAJECTORY_SHARE_WEIGHT: f64 = 0.7;
const TRAJECTORY_LATEST_WEIGHT: f64 = 0.3;

/// What the caller asked for, before any candidate is looked at.
#[derive(Clone, Copy, Debug)]
pub struct QueryTerms<'a> {
	pub job_description: &'a str,
	/// Canonical skill names.
	pub required_skills: &'a [String],
	pub preferred_skills: &'a [String],
	pub min_years: Option<f32>,
	pub max_years: Option<f32>,
}

#[derive(Clone, Debug, PartialEq)]
struct RequestedSkill {
	name: String,
	importance: f64,
}

/// Per-request inputs shared by every candidate's signal computation.
#[derive(Clone, Debug)]
pub struct SignalContext {
	jd_tokens: HashSet<String>,
	target_level: Option<Seniority>,
	target_function: Option<JobFunction>,
	years_range: Option<(f32, f32)>,
	requested_skills: Vec<RequestedSkill>,
	technologies: Vec<String>,
	now: OffsetDateTime,
	recency_tau_days: f32,
	vector_channel_ok: bool,
	text_channel_ok: bool,
	max_text_score: f32,
}
impl SignalContext {
	pub fn new(terms: QueryTerms<'_>, recency_tau_days: f32, now: OffsetDateTime) -> Self {
		let jd_tokens: HashSet<String> = text::tokenize(terms.job_description).into_iter().collect();
		let target_level = Seniority::infer(terms.job_description);
		let detected = text::detect_technologies(terms.job_description);
		let mut requested_skills: Vec<RequestedSkill> = Vec::new();

		for (names, importance) in [
			(terms.required_skills, 1.0),
			(terms.preferred_skills, PREFERRED_SKILL_IMPORTANCE),
			(detected.as_slice(), 1.0),
		] {
			for name in names {
				if !requested_skills.iter().any(|skill| skill.name == *name) {
					requested_skills.push(RequestedSkill { name: name.clone(), importance });
				}
			}
		}

		let mut technologies = detected;

		for name in terms.required_skills.iter().chain(terms.preferred_skills) {
			if !technologies.contains(name) {
				technologies.push(name.clone());
			}
		}

		let years_range = match (terms.min_years, terms.max_years) {
			(None, None) => target_level.map(Seniority::typical_years),
			(min, max) => Some((min.unwrap_or(0.0), max.unwrap_or(f32::MAX))),
		};

		Self {
			jd_tokens,
			target_level,
			target_function: JobFunction::infer(terms.job_description),
			years_range,
			requested_skills,
			technologies,
			now,
			recency_tau_days,
			vector_channel_ok: true,
			text_channel_ok: true,
			max_text_score: 0.0,
		}
	}

	/// Records which recall channels answered and the pool maximum used to scale text scores.
	pub fn with_channels(mut self, vector_ok: bool, text_ok: bool, max_text_score: f32) -> Self {
		self.vector_channel_ok = vector_ok;
		self.text_channel_ok = text_ok;
		self.max_text_score = max_text_score;

		self
	}

	pub fn target_level(&self) -> Option<Seniority> {
		self.target_level
	}

	pub fn target_function(&self) -> Option<JobFunction> {
		self.target_function
	}

	fn mentions_all(&self, phrase: &str) -> bool {
		let words = text::tokenize(phrase);

		!words.is_empty() && words.iter().all(|word| self.jd_tokens.contains(word))
	}
}

/// Signal values for one candidate. `None` marks a signal that could not be computed.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CandidateSignals {
	pub scores: [Option<f64>; 12],
	/// Requested skills held outright.
	pub matched_skills: Vec<String>,
	/// Requested skills held only as inferred skills.
	pub inferred_skills: Vec<String>,
}
impl CandidateSignals {
	pub fn get(&self, signal: Signal) -> Option<f64> {
		self.scores[signal.index()]
	}

	fn set(&mut self, signal: Signal, value: Option<f64>) {
		self.scores[signal.index()] = value.map(|score| score.clamp(0.0, 1.0));
	}
}

pub fn compute(
	ctx: &SignalContext,
	candidate: &RecallCandidate,
	profile: &CandidateProfile,
) -> CandidateSignals {
	let mut out = CandidateSignals::default();

	out.set(Signal::VectorSimilarity, vector_similarity(ctx, candidate));
	out.set(Signal::TextScore, text_score(ctx, candidate));
	out.set(Signal::LevelMatch, level_match(ctx.target_level, profile.effective_seniority()));
	out.set(Signal::SpecialtyMatch, specialty_match(ctx, profile));
	out.set(Signal::TechStackMatch, tech_stack_match(ctx, profile));
	out.set(Signal::FunctionMatch, function_match(ctx, profile));
	out.set(Signal::SeniorityAlignment, seniority_alignment(ctx, profile));
	out.set(Signal::TrajectoryFit, trajectory_fit(ctx, profile));
	out.set(Signal::CompanyPedigree, company_pedigree(profile));
	out.set(Signal::CompanyRelevance, company_relevance(ctx, profile));

	let (skills, matched, inferred) = skills_match(ctx, profile);

	out.set(Signal::SkillsMatch, skills);
	out.matched_skills = matched;
	out.inferred_skills = inferred;

	out.set(Signal::Recency, recency(ctx, profile));

	out
}

fn vector_similarity(ctx: &SignalContext, candidate: &RecallCandidate) -> Option<f64> {
	if !ctx.vector_channel_ok {
		return None;
	}

	Some(candidate.vector.map(|hit| f64::from(hit.score)).unwrap_or(0.0))
}

fn text_score(ctx: &SignalContext, candidate: &RecallCandidate) -> Option<f64> {
	if !ctx.text_channel_ok {
		return None;
	}
	if ctx.max_text_score <= 0.0 {
		return Some(0.0);
	}

	Some(candidate.text.map(|hit| f64::from(hit.score / ctx.max_text_score)).unwrap_or(0.0))
}

fn level_match(target: Option<Seniority>, actual: Option<Seniority>) -> Option<f64> {
	let (target, actual) = (target?, actual?);

	Some(match target.rank().abs_diff(actual.rank()) {
		0 => 1.0,
		1 => 0.6,
		2 => 0.2,
		_ => 0.0,
	})
}

fn specialty_match(ctx: &SignalContext, profile: &CandidateProfile) -> Option<f64> {
	if profile.specialty_tags.is_empty() {
		return None;
	}

	let hits = profile.specialty_tags.iter().filter(|tag| ctx.mentions_all(tag)).count();

	Some(hits as f64 / profile.specialty_tags.len() as f64)
}

fn candidate_skill_set(profile: &CandidateProfile) -> HashSet<String> {
	profile
		.normalized_skills()
		.into_iter()
		.chain(profile.specialty_tags.iter().map(|tag| text::normalize_skill(tag)))
		.collect()
}

fn tech_stack_match(ctx: &SignalContext, profile: &CandidateProfile) -> Option<f64> {
	if ctx.technologies.is_empty() {
		return None;
	}

	let held = candidate_skill_set(profile);
	let hits = ctx.technologies.iter().filter(|tech| held.contains(*tech)).count();

	Some(hits as f64 / ctx.technologies.len() as f64)
}

fn function_match(ctx: &SignalContext, profile: &CandidateProfile) -> Option<f64> {
	let target = ctx.target_function?;
	let mut evidence = profile.specialty_tags.join(" ");

	if let Some(title) = profile.current_stint().and_then(|stint| stint.title.as_deref()) {
		evidence.push(' ');
		evidence.push_str(title);
	}

	let actual = JobFunction::infer(&evidence)?;

	Some(target.affinity(actual))
}

fn seniority_alignment(ctx: &SignalContext, profile: &CandidateProfile) -> Option<f64> {
	let (min, max) = ctx.years_range?;
	let years = profile.years_experience?;
	let distance = if years < min {
		min - years
	} else if years > max {
		years - max
	} else {
		0.0
	};

	Some((1.0 - YEARS_PENALTY_PER_YEAR * f64::from(distance)).max(0.0))
}

fn trajectory_fit(ctx: &SignalContext, profile: &CandidateProfile) -> Option<f64> {
	let levels: Vec<Seniority> = profile
		.chronological_stints()
		.into_iter()
		.filter_map(|stint| stint.title.as_deref().and_then(Seniority::infer))
		.collect();
	let latest = *levels.last()?;
	let share = if levels.len() < 2 {
		0.5
	} else {
		let rising = levels.windows(2).filter(|pair| pair[1].rank() >= pair[0].rank()).count();

		rising as f64 / (levels.len() - 1) as f64
	};
	let latest_fit = match ctx.target_level {
		Some(target) if target.rank().abs_diff(latest.rank()) <= 1 => 1.0,
		Some(_) => 0.0,
		None => 0.5,
	};

	Some(TRAJECTORY_SHARE_WEIGHT * share + TRAJECTORY_LATEST_WEIGHT * latest_fit)
}

fn company_pedigree(profile: &CandidateProfile) -> Option<f64> {
	profile.companies.iter().map(|stint| stint.tier.pedigree()).reduce(f64::max)
}

/// Later stints weigh more: the i-th stint (oldest first) carries weight i + 1.
fn company_relevance(ctx: &SignalContext, profile: &CandidateProfile) -> Option<f64> {
	let mut total = 0.0;
	let mut relevant = 0.0;

	for (idx, stint) in profile.chronological_stints().into_iter().enumerate() {
		let Some(industry) = stint.industry.as_deref() else {
			continue;
		};
		let weight = (idx + 1) as f64;

		total += weight;

		if ctx.mentions_all(industry) {
			relevant += weight;
		}
	}

	if total <= 0.0 {
		return None;
	}

	Some(relevant / total)
}

fn skills_match(
	ctx: &SignalContext,
	profile: &CandidateProfile,
) -> (Option<f64>, Vec<String>, Vec<String>) {
	if ctx.requested_skills.is_empty() {
		return (None, Vec::new(), Vec::new());
	}

	let mut held: HashMap<String, (f64, bool)> = HashMap::new();

	for skill in &profile.skills {
		let confidence = f64::from(skill.confidence).clamp(0.0, 1.0);
		let entry = held
			.entry(text::normalize_skill(&skill.name))
			.or_insert((confidence, skill.inferred));

		// An explicit entry beats an inferred one for the same skill.
		if entry.1 && !skill.inferred {
			*entry = (confidence, false);
		} else if entry.1 == skill.inferred {
			entry.0 = entry.0.max(confidence);
		}
	}

	let mut credit = 0.0;
	let mut importance = 0.0;
	let mut matched = Vec::new();
	let mut inferred = Vec::new();

	for requested in &ctx.requested_skills {
		importance += requested.importance;

		match held.get(&requested.name) {
			Some((confidence, false)) => {
				credit += requested.importance * confidence;

				matched.push(requested.name.clone());
			},
			Some((confidence, true)) => {
				credit += requested.importance * INFERRED_SKILL_DISCOUNT * confidence;

				inferred.push(requested.name.clone());
			},
			None => {},
		}
	}

	(Some(credit / importance), matched, inferred)
}

fn recency(ctx: &SignalContext, profile: &CandidateProfile) -> Option<f64> {
	if !ctx.recency_tau_days.is_finite() || ctx.recency_tau_days <= 0.0 {
		return None;
	}

	let age_days = ((ctx.now - profile.updated_at).as_seconds_f64() / 86_400.0).max(0.0);

	Some((-age_days / f64::from(ctx.recency_tau_days)).exp())
}
