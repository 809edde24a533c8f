use std::collections::BTreeMap;

use serde::Serialize;

use scout_domain::{CandidateProfile, RiskTier, Signal};

use crate::{Error, Result};

const CAP_EPSILON: f64 = 1e-12;

#[derive(Clone, Copy, Debug, Eq, Ord, PartialEq, PartialOrd, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BiasWarningKind {
	Concentration,
	AdverseImpact,
}

#[derive(Clone, Copy, Debug, Eq, Ord, PartialEq, PartialOrd, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditDimension {
	CompanyTier,
	ExperienceBand,
	Specialty,
}
impl AuditDimension {
	const ALL: [Self; 3] = [Self::CompanyTier, Self::ExperienceBand, Self::Specialty];

	pub fn as_str(self) -> &'static str {
		match self {
			Self::CompanyTier => "company_tier",
			Self::ExperienceBand => "experience_band",
			Self::Specialty => "specialty",
		}
	}

	/// Group label of `profile`, or `None` when the attribute is unknown.
	fn label(self, profile: &CandidateProfile) -> Option<String> {
		match self {
			Self::CompanyTier =>
				profile.current_stint().map(|stint| stint.tier.as_str().to_string()),
			Self::ExperienceBand => profile.years_experience.map(experience_band).map(str::to_string),
			Self::Specialty => profile.primary_specialty().map(scout_domain::text::normalize_text),
		}
	}
}

/// Advisory finding about the returned slate. Never changes the ranking.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BiasWarning {
	pub kind: BiasWarningKind,
	pub dimension: AuditDimension,
	pub group: String,
	pub value: f64,
	pub threshold: f64,
	pub message: String,
}

/// The single bias policy object: consulted once while resolving weights and once over the
/// assembled slate.
#[derive(Clone, Debug)]
pub struct BiasPolicy {
	cfg: scout_config::Bias,
}
impl BiasPolicy {
	pub fn new(cfg: scout_config::Bias) -> Self {
		Self { cfg }
	}

	pub fn slate_size(&self) -> usize {
		self.cfg.slate_size as usize
	}

	/// Caps every medium-risk weight and water-fills the excess over the remaining positive
	/// weights in proportion to their size.
	pub fn cap_medium_risk(&self, weights: &mut [f64; 12], notes: &mut Vec<String>) -> Result<()> {
		let cap = self.cfg.medium_risk_cap;
		let mut fixed = [false; 12];

		loop {
			let mut excess = 0.0;

			for signal in Signal::ALL {
				let idx = signal.index();

				if signal.risk() != RiskTier::Medium || fixed[idx] || weights[idx] <= cap + CAP_EPSILON
				{
					continue;
				}

				notes.push(format!(
					"Weight for {} capped at {cap:.2} (was {:.4}).",
					signal.as_str(),
					weights[idx]
				));

				excess += weights[idx] - cap;
				weights[idx] = cap;
				fixed[idx] = true;
			}

			if excess <= 0.0 {
				return Ok(());
			}

			let absorbing: f64 = Signal::ALL
				.into_iter()
				.map(Signal::index)
				.filter(|idx| !fixed[*idx] && weights[*idx] > 0.0)
				.map(|idx| weights[idx])
				.sum();

			if absorbing <= 0.0 {
				return Err(Error::invalid(format!(
					"Medium-risk signal weights exceed the {cap:.2} cap and no other signal can absorb the excess."
				)));
			}

			for idx in 0..weights.len() {
				if !fixed[idx] && weights[idx] > 0.0 {
					weights[idx] += excess * weights[idx] / absorbing;
				}
			}
		}
	}

	/// Composition and four-fifths checks over the first `slate_size` results against the
	/// fused pool they were selected from.
	pub fn audit_slate(
		&self,
		slate: &[&CandidateProfile],
		pool: &[&CandidateProfile],
	) -> Vec<BiasWarning> {
		let slate = &slate[..slate.len().min(self.slate_size())];
		let min_group = self.cfg.min_group_size as usize;
		let mut warnings = Vec::new();

		if slate.is_empty() {
			return warnings;
		}

		for dimension in AuditDimension::ALL {
			let selected = group_counts(dimension, slate);

			if slate.len() >= min_group {
				for (group, count) in &selected {
					let share = *count as f64 / slate.len() as f64;

					if share > self.cfg.concentration_threshold {
						warnings.push(BiasWarning {
							kind: BiasWarningKind::Concentration,
							dimension,
							group: group.clone(),
							value: share,
							threshold: self.cfg.concentration_threshold,
							message: format!(
								"{:.0}% of the top {} share {} {group}.",
								share * 100.0,
								slate.len(),
								dimension.as_str()
							),
						});
					}
				}
			}

			let rates: Vec<(String, f64)> = group_counts(dimension, pool)
				.into_iter()
				.filter(|(_, pool_count)| *pool_count >= min_group)
				.map(|(group, pool_count)| {
					let chosen = selected.get(&group).copied().unwrap_or(0);

					(group, chosen as f64 / pool_count as f64)
				})
				.collect();

			if rates.len() < 2 {
				continue;
			}

			let best = rates.iter().map(|(_, rate)| *rate).fold(0.0_f64, f64::max);

			if best <= 0.0 {
				continue;
			}

			for (group, rate) in rates {
				let ratio = rate / best;

				if ratio < self.cfg.four_fifths_ratio {
					warnings.push(BiasWarning {
						kind: BiasWarningKind::AdverseImpact,
						dimension,
						message: format!(
							"Selection rate for {} {group} is {:.0}% of the highest group.",
							dimension.as_str(),
							ratio * 100.0
						),
						group,
						value: ratio,
						threshold: self.cfg.four_fifths_ratio,
					});
				}
			}
		}

		warnings
	}
}

pub fn experience_band(years: f32) -> &'static str {
	if years < 3.0 {
		"0-2"
	} else if years < 6.0 {
		"3-5"
	} else if years < 11.0 {
		"6-10"
	} else {
		"11+"
	}
}

fn group_counts(dimension: AuditDimension, profiles: &[&CandidateProfile]) -> BTreeMap<String, usize> {
	let mut counts = BTreeMap::new();

	for profile in profiles {
		if let Some(label) = dimension.label(profile) {
			*counts.entry(label).or_insert(0) += 1;
		}
	}

	counts
}

#[cfg(test)]
mod tests {
	use time::macros::datetime;
	use uuid::Uuid;

	use scout_domain::{CompanyStint, CompanyTier};

	use super::*;

	fn policy() -> BiasPolicy {
		BiasPolicy::new(scout_config::Bias::default())
	}

	fn candidate(id: u128, tier: CompanyTier, years: f32, specialty: &str) -> CandidateProfile {
		CandidateProfile {
			candidate_id: Uuid::from_u128(id),
			document: String::new(),
			skills: Vec::new(),
			seniority: None,
			years_experience: Some(years),
			companies: vec![CompanyStint {
				company: format!("Company {id}"),
				title: None,
				tier,
				industry: None,
				start_year: Some(2020),
				end_year: None,
			}],
			specialty_tags: vec![specialty.to_string()],
			location: None,
			updated_at: datetime!(2026-01-01 00:00 UTC),
		}
	}

	#[test]
	fn bands_follow_experience_brackets() {
		assert_eq!(experience_band(0.0), "0-2");
		assert_eq!(experience_band(2.9), "0-2");
		assert_eq!(experience_band(5.0), "3-5");
		assert_eq!(experience_band(10.5), "6-10");
		assert_eq!(experience_band(11.0), "11+");
	}

	#[test]
	fn cap_leaves_compliant_weights_alone() {
		let mut weights = [1.0 / 12.0; 12];
		let before = weights;
		let mut notes = Vec::new();

		policy().cap_medium_risk(&mut weights, &mut notes).expect("cap must succeed");

		assert_eq!(weights, before);
		assert!(notes.is_empty());
	}

	#[test]
	fn concentrated_slate_warns_on_tier() {
		let profiles: Vec<CandidateProfile> = (0..10)
			.map(|id| {
				let tier = if id < 8 { CompanyTier::Tier1 } else { CompanyTier::Tier3 };

				candidate(id, tier, 2.0 + id as f32, if id % 2 == 0 { "backend" } else { "data" })
			})
			.collect();
		let refs: Vec<&CandidateProfile> = profiles.iter().collect();
		let warnings = policy().audit_slate(&refs, &refs);
		let tier_warning = warnings
			.iter()
			.find(|warning| warning.kind == BiasWarningKind::Concentration)
			.expect("expected a concentration warning");

		assert_eq!(tier_warning.dimension, AuditDimension::CompanyTier);
		assert_eq!(tier_warning.group, "tier1");
		assert!((tier_warning.value - 0.8).abs() < 1e-12);
		assert!(
			warnings.iter().all(|warning| warning.dimension == AuditDimension::CompanyTier),
			"specialty is split evenly and must not warn: {warnings:?}"
		);
	}

	#[test]
	fn four_fifths_rule_flags_underselected_groups() {
		let mut pool: Vec<CandidateProfile> = Vec::new();

		for id in 0..10 {
			pool.push(candidate(id, CompanyTier::Tier1, 4.0, "backend"));
		}
		for id in 10..20 {
			pool.push(candidate(id, CompanyTier::Tier2, 4.0, "backend"));
		}

		// Six tier1 and four tier2 selected: rates 0.6 and 0.4, ratio 0.67.
		let slate: Vec<&CandidateProfile> =
			pool[0..6].iter().chain(pool[10..14].iter()).collect();
		let pool_refs: Vec<&CandidateProfile> = pool.iter().collect();
		let warnings = policy().audit_slate(&slate, &pool_refs);
		let adverse: Vec<&BiasWarning> = warnings
			.iter()
			.filter(|warning| warning.kind == BiasWarningKind::AdverseImpact)
			.collect();

		assert_eq!(adverse.len(), 1);
		assert_eq!(adverse[0].group, "tier2");
		assert!((adverse[0].value - 0.4 / 0.6).abs() < 1e-12);
	}

	#[test]
	fn small_groups_are_excluded_from_adverse_impact() {
		let pool: Vec<CandidateProfile> = (0..6)
			.map(|id| {
				let tier = if id < 4 { CompanyTier::Tier1 } else { CompanyTier::Tier2 };

				candidate(id, tier, 4.0, "backend")
			})
			.collect();
		let slate: Vec<&CandidateProfile> = pool[0..3].iter().collect();
		let pool_refs: Vec<&CandidateProfile> = pool.iter().collect();
		let warnings = policy().audit_slate(&slate, &pool_refs);

		assert!(warnings.iter().all(|warning| warning.kind != BiasWarningKind::AdverseImpact));
	}
}
