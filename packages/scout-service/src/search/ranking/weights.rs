use std::collections::BTreeMap;

use scout_domain::{RoleArchetype, Signal, WeightKey};

use super::bias::BiasPolicy;
use crate::{Error, Result};

const SUM_TOLERANCE: f64 = 1e-9;

/// Immutable per-request weight vector. Non-negative, sums to 1.0.
#[derive(Clone, Debug)]
pub struct ResolvedWeights {
	role: RoleArchetype,
	weights: [f64; 12],
	notes: Vec<String>,
}
impl ResolvedWeights {
	pub fn role(&self) -> RoleArchetype {
		self.role
	}

	pub fn get(&self, signal: Signal) -> f64 {
		self.weights[signal.index()]
	}

	pub fn as_array(&self) -> &[f64; 12] {
		&self.weights
	}

	/// Audit trail of every adjustment made while resolving.
	pub fn notes(&self) -> &[String] {
		&self.notes
	}

	pub fn to_map(&self) -> BTreeMap<&'static str, f64> {
		Signal::ALL.into_iter().map(|signal| (signal.as_str(), self.get(signal))).collect()
	}
}

/// Preset for `role`, overridden per signal, normalized, then capped by the bias policy.
pub fn resolve(
	role: RoleArchetype,
	overrides: Option<&BTreeMap<String, f64>>,
	policy: &BiasPolicy,
) -> Result<ResolvedWeights> {
	let mut weights = [0.0_f64; 12];
	let mut notes = Vec::new();

	for (signal, weight) in role.preset() {
		weights[signal.index()] = weight;
	}

	for (raw_key, value) in overrides.into_iter().flatten() {
		let Some(key) = WeightKey::parse(raw_key) else {
			return Err(Error::invalid(format!("Unknown signal weight key: {raw_key}.")));
		};

		if !value.is_finite() || *value < 0.0 {
			return Err(Error::invalid(format!(
				"Signal weight {raw_key} must be a finite number, zero or greater."
			)));
		}

		match key {
			WeightKey::Signal(signal) => weights[signal.index()] = *value,
			WeightKey::Protected(attr) => {
				notes.push(format!("Weight for protected attribute {attr} forced to 0."));
			},
		}
	}

	normalize(&mut weights)?;
	policy.cap_medium_risk(&mut weights, &mut notes)?;

	let sum: f64 = weights.iter().sum();

	if (sum - 1.0).abs() > SUM_TOLERANCE {
		normalize(&mut weights)?;
	}

	Ok(ResolvedWeights { role, weights, notes })
}

fn normalize(weights: &mut [f64; 12]) -> Result<()> {
	let sum: f64 = weights.iter().sum();

	if !sum.is_finite() || sum <= 0.0 {
		return Err(Error::invalid("At least one signal weight must be greater than zero."));
	}

	for weight in weights.iter_mut() {
		*weight /= sum;
	}

	Ok(())
}
