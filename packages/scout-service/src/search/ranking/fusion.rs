use std::cmp::Ordering;

use uuid::Uuid;

use scout_domain::Signal;

use super::{signals::CandidateSignals, weights::ResolvedWeights};

/// Score an absent signal contributes.
pub const NEUTRAL_SIGNAL: f64 = 0.5;

#[derive(Clone, Debug)]
pub struct FusedCandidate {
	pub candidate_id: Uuid,
	pub fused_score: f64,
	/// `weight × score` per signal, in `Signal::ALL` order.
	pub contributions: [f64; 12],
	pub signals: CandidateSignals,
	/// 1-based position in the fused order.
	pub rank: u32,
}

/// Weighted sum over all twelve signals, sorted by fused score then candidate ID.
pub fn fuse(weights: &ResolvedWeights, scored: Vec<(Uuid, CandidateSignals)>) -> Vec<FusedCandidate> {
	let mut fused: Vec<FusedCandidate> = scored
		.into_iter()
		.map(|(candidate_id, signals)| {
			let mut contributions = [0.0; 12];

			for signal in Signal::ALL {
				contributions[signal.index()] =
					weights.get(signal) * signals.get(signal).unwrap_or(NEUTRAL_SIGNAL);
			}

			FusedCandidate {
				candidate_id,
				fused_score: contributions.iter().sum(),
				contributions,
				signals,
				rank: 0,
			}
		})
		.collect();

	fused.sort_by(compare_fused);

	for (idx, candidate) in fused.iter_mut().enumerate() {
		candidate.rank = idx as u32 + 1;
	}

	fused
}

fn compare_fused(left: &FusedCandidate, right: &FusedCandidate) -> Ordering {
	right
		.fused_score
		.total_cmp(&left.fused_score)
		.then_with(|| left.candidate_id.cmp(&right.candidate_id))
}

#[cfg(test)]
mod tests {
	use scout_domain::RoleArchetype;

	use super::*;
	use crate::search::ranking::{bias::BiasPolicy, weights};

	fn uniform(value: Option<f64>) -> CandidateSignals {
		CandidateSignals { scores: [value; 12], ..Default::default() }
	}

	fn resolved() -> ResolvedWeights {
		weights::resolve(
			RoleArchetype::IndividualContributor,
			None,
			&BiasPolicy::new(scout_config::Bias::default()),
		)
		.expect("preset must resolve")
	}

	#[test]
	fn absent_signals_count_as_neutral() {
		let fused = fuse(&resolved(), vec![(Uuid::from_u128(1), uniform(None))]);

		assert!((fused[0].fused_score - NEUTRAL_SIGNAL).abs() < 1e-9);
		assert_eq!(fused[0].rank, 1);
	}

	#[test]
	fn order_is_strict_with_id_tie_break() {
		let fused = fuse(
			&resolved(),
			vec![
				(Uuid::from_u128(9), uniform(Some(0.4))),
				(Uuid::from_u128(3), uniform(Some(0.9))),
				(Uuid::from_u128(7), uniform(Some(0.4))),
				(Uuid::from_u128(5), uniform(Some(0.4))),
			],
		);
		let ids: Vec<u128> = fused.iter().map(|candidate| candidate.candidate_id.as_u128()).collect();

		assert_eq!(ids, vec![3, 5, 7, 9]);
		assert_eq!(fused.iter().map(|candidate| candidate.rank).collect::<Vec<_>>(), vec![1, 2, 3, 4]);

		for pair in fused.windows(2) {
			assert!(
				pair[0].fused_score > pair[1].fused_score
					|| (pair[0].fused_score == pair[1].fused_score
						&& pair[0].candidate_id < pair[1].candidate_id)
			);
		}
	}

	#[test]
	fn contributions_sum_to_the_fused_score() {
		let mut signals = uniform(Some(0.2));

		signals.scores[Signal::SkillsMatch.index()] = Some(1.0);

		let fused = fuse(&resolved(), vec![(Uuid::from_u128(1), signals)]);
		let skills = fused[0].contributions[Signal::SkillsMatch.index()];

		assert!((skills - resolved().get(Signal::SkillsMatch)).abs() < 1e-12);
		assert!((fused[0].contributions.iter().sum::<f64>() - fused[0].fused_score).abs() < 1e-12);
	}
}
