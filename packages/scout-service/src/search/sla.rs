use std::time::Duration;

use tokio::time::Instant;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Stage {
	Embedding,
	Retrieval,
	Fusion,
	Rerank,
}

/// Per-request latency budget. Never shared between requests.
#[derive(Debug)]
pub struct SlaBudget {
	started: Instant,
	target: Duration,
	margin: Duration,
	stages: Vec<(Stage, Duration)>,
}
impl SlaBudget {
	pub fn start(target_ms: u64, safety_margin_ms: u64) -> Self {
		Self {
			started: Instant::now(),
			target: Duration::from_millis(target_ms),
			margin: Duration::from_millis(safety_margin_ms),
			stages: Vec::with_capacity(4),
		}
	}

	pub fn elapsed(&self) -> Duration {
		self.started.elapsed()
	}

	/// `max(0, target - elapsed - margin)`.
	pub fn remaining(&self) -> Duration {
		self.target.saturating_sub(self.elapsed()).saturating_sub(self.margin)
	}

	pub fn is_exhausted(&self) -> bool {
		self.remaining().is_zero()
	}

	/// The tighter of a stage ceiling and what is left of the budget.
	pub fn bound(&self, ceiling: Duration) -> Duration {
		ceiling.min(self.remaining())
	}

	pub fn record(&mut self, stage: Stage, took: Duration) {
		self.stages.push((stage, took));
	}

	pub fn stage_ms(&self, stage: Stage) -> u64 {
		self.stages
			.iter()
			.filter(|(recorded, _)| *recorded == stage)
			.map(|(_, took)| millis(*took))
			.sum()
	}
}

pub fn millis(duration: Duration) -> u64 {
	u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test(start_paused = true)]
	async fn remaining_shrinks_and_saturates() {
		let budget = SlaBudget::start(1_200, 50);

		assert_eq!(budget.remaining(), Duration::from_millis(1_150));

		tokio::time::advance(Duration::from_millis(400)).await;

		assert_eq!(budget.remaining(), Duration::from_millis(750));
		assert_eq!(budget.bound(Duration::from_millis(800)), Duration::from_millis(750));
		assert_eq!(budget.bound(Duration::from_millis(300)), Duration::from_millis(300));

		tokio::time::advance(Duration::from_millis(760)).await;

		assert!(budget.is_exhausted());
		assert_eq!(budget.bound(Duration::from_millis(800)), Duration::ZERO);
	}

	#[test]
	fn stage_timings_accumulate_per_stage() {
		let mut budget = SlaBudget::start(1_000, 0);

		budget.record(Stage::Retrieval, Duration::from_millis(30));
		budget.record(Stage::Retrieval, Duration::from_millis(12));
		budget.record(Stage::Fusion, Duration::from_millis(5));

		assert_eq!(budget.stage_ms(Stage::Retrieval), 42);
		assert_eq!(budget.stage_ms(Stage::Rerank), 0);
	}
}
