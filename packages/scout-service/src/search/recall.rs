use std::{
	collections::{HashMap, HashSet},
	time::Duration,
};

use serde::Serialize;
use tokio::time::{self, error::Elapsed};
use uuid::Uuid;

use scout_config::SearchRecall;
use scout_domain::CandidateFilter;
use scout_storage::models::ChannelHit;

use crate::{Error, Result, Stores, search::sla::SlaBudget};

/// Reciprocal-rank constant; damps the head of each channel's list.
const RRF_K0: f64 = 60.0;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelStatus {
	Ok,
	Failed,
	TimedOut,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelReport {
	pub status: ChannelStatus,
	pub hits: usize,
}
impl ChannelReport {
	pub fn is_ok(&self) -> bool {
		self.status == ChannelStatus::Ok
	}
}

/// Raw channel score and 1-based position within that channel.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ChannelScore {
	pub score: f32,
	pub rank: u32,
}

#[derive(Clone, Debug, PartialEq)]
pub struct RecallCandidate {
	pub candidate_id: Uuid,
	pub vector: Option<ChannelScore>,
	pub text: Option<ChannelScore>,
	pub merged_score: f64,
}
impl RecallCandidate {
	fn channel_count(&self) -> usize {
		usize::from(self.vector.is_some()) + usize::from(self.text.is_some())
	}
}

#[derive(Clone, Debug)]
pub struct RecallOutcome {
	pub candidates: Vec<RecallCandidate>,
	pub vector: ChannelReport,
	pub text: ChannelReport,
	/// Highest raw text score among the merged candidates.
	pub max_text_score: f32,
}

pub(crate) struct RecallArgs<'a> {
	pub(crate) tenant_id: &'a str,
	pub(crate) vector: &'a [f32],
	pub(crate) query: &'a str,
	pub(crate) filter: &'a CandidateFilter,
}

/// Runs both channels concurrently under the same deadline and merges what came back.
pub(crate) async fn recall(
	stores: &Stores,
	cfg: &SearchRecall,
	budget: &SlaBudget,
	args: RecallArgs<'_>,
) -> Result<RecallOutcome> {
	let RecallArgs { tenant_id, vector, query, filter } = args;
	let deadline = budget.bound(Duration::from_millis(cfg.channel_timeout_ms));
	let limit = cfg.candidate_k;
	let (vector_res, text_res) = tokio::join!(
		time::timeout(deadline, stores.vectors.nearest_neighbors(tenant_id, vector, filter, limit)),
		time::timeout(deadline, stores.text.search(tenant_id, query, filter, limit)),
	);
	let (vector_hits, vector_report) = settle("vector", tenant_id, vector_res);
	let (text_hits, text_report) = settle("text", tenant_id, text_res);

	if !vector_report.is_ok() && !text_report.is_ok() {
		return Err(Error::RetrievalFailure {
			message: "Both the vector and the text channel failed.".to_string(),
		});
	}

	let candidates = merge_channels(&vector_hits, &text_hits, cfg);
	let max_text_score = candidates
		.iter()
		.filter_map(|candidate| candidate.text.map(|hit| hit.score))
		.fold(0.0_f32, f32::max);

	Ok(RecallOutcome { candidates, vector: vector_report, text: text_report, max_text_score })
}

fn settle(
	channel: &'static str,
	tenant_id: &str,
	res: std::result::Result<scout_storage::Result<Vec<ChannelHit>>, Elapsed>,
) -> (Vec<ChannelHit>, ChannelReport) {
	match res {
		Ok(Ok(hits)) => {
			let report = ChannelReport { status: ChannelStatus::Ok, hits: hits.len() };

			(hits, report)
		},
		Ok(Err(err)) => {
			tracing::warn!(error = %err, channel, tenant_id, "Recall channel failed.");

			(Vec::new(), ChannelReport { status: ChannelStatus::Failed, hits: 0 })
		},
		Err(_) => {
			tracing::warn!(channel, tenant_id, "Recall channel timed out.");

			(Vec::new(), ChannelReport { status: ChannelStatus::TimedOut, hits: 0 })
		},
	}
}

/// Weighted reciprocal-rank union of both channels, capped at `candidate_k`.
pub fn merge_channels(
	vector_hits: &[ChannelHit],
	text_hits: &[ChannelHit],
	cfg: &SearchRecall,
) -> Vec<RecallCandidate> {
	if cfg.candidate_k == 0 {
		return Vec::new();
	}

	let mut by_id: HashMap<Uuid, RecallCandidate> = HashMap::new();

	for (hits, weight, is_vector) in [
		(vector_hits, f64::from(cfg.vector_weight), true),
		(text_hits, f64::from(cfg.text_weight), false),
	] {
		let mut seen = HashSet::new();
		let mut rank = 0_u32;

		for hit in hits {
			if !seen.insert(hit.candidate_id) {
				continue;
			}

			rank += 1;

			let entry = by_id.entry(hit.candidate_id).or_insert_with(|| RecallCandidate {
				candidate_id: hit.candidate_id,
				vector: None,
				text: None,
				merged_score: 0.0,
			});
			let score = Some(ChannelScore { score: hit.score, rank });

			if is_vector {
				entry.vector = score;
			} else {
				entry.text = score;
			}

			entry.merged_score += weight / (RRF_K0 + f64::from(rank));
		}
	}

	let mut merged: Vec<RecallCandidate> = by_id.into_values().collect();

	merged.sort_by(|left, right| {
		right
			.merged_score
			.total_cmp(&left.merged_score)
			.then_with(|| right.channel_count().cmp(&left.channel_count()))
			.then_with(|| left.candidate_id.cmp(&right.candidate_id))
	});
	merged.truncate(cfg.candidate_k as usize);

	merged
}
