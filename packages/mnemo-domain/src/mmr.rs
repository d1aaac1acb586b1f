//! Maximal Marginal Relevance reranking over an in-memory candidate set.
//!
//! The reranker runs entirely over vectors the search already fetched; it
//! never issues store queries. Candidates are identified by their position
//! in the fetch-ordered input, and ties break stably on that order.

/// The similarity measure MMR scores with. Message search ranks by inner
/// product, document search by cosine; the reranker has to match.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Similarity {
	Cosine,
	Dot,
}
impl Similarity {
	fn compute(self, lhs: &[f32], rhs: &[f32]) -> Option<f32> {
		match self {
			Self::Cosine => cosine_similarity(lhs, rhs),
			Self::Dot => dot_product(lhs, rhs),
		}
	}
}

pub fn cosine_similarity(lhs: &[f32], rhs: &[f32]) -> Option<f32> {
	if lhs.is_empty() || lhs.len() != rhs.len() {
		return None;
	}

	let mut dot = 0.0_f32;
	let mut lhs_norm = 0.0_f32;
	let mut rhs_norm = 0.0_f32;

	for (l, r) in lhs.iter().zip(rhs.iter()) {
		dot += l * r;
		lhs_norm += l * l;
		rhs_norm += r * r;
	}

	if lhs_norm <= f32::EPSILON || rhs_norm <= f32::EPSILON {
		return None;
	}

	Some((dot / (lhs_norm.sqrt() * rhs_norm.sqrt())).clamp(-1.0, 1.0))
}

pub fn dot_product(lhs: &[f32], rhs: &[f32]) -> Option<f32> {
	if lhs.is_empty() || lhs.len() != rhs.len() {
		return None;
	}

	Some(lhs.iter().zip(rhs.iter()).map(|(l, r)| l * r).sum())
}

/// Greedy MMR selection. Returns indices into `candidates` in selection
/// order, at most `limit` of them.
///
/// At each step the candidate maximizing
/// `lambda * relevance - (1 - lambda) * max_similarity_to_selected` wins;
/// the first pick is simply the most relevant candidate. A candidate whose
/// vector is missing contributes no redundancy penalty and is treated as
/// maximally novel, so a provider hiccup never makes the reranker error out
/// (see `missing_vectors_are_never_penalized`).
pub fn rerank(
	query: &[f32],
	candidates: &[Option<Vec<f32>>],
	similarity: Similarity,
	lambda: f32,
	limit: usize,
) -> Vec<usize> {
	if candidates.is_empty() || limit == 0 {
		return Vec::new();
	}

	let relevance: Vec<f32> = candidates
		.iter()
		.map(|candidate| {
			candidate
				.as_deref()
				.and_then(|vector| similarity.compute(query, vector))
				.unwrap_or(0.0)
		})
		.collect();
	let mut remaining: Vec<usize> = (0..candidates.len()).collect();
	let mut selected: Vec<usize> = Vec::with_capacity(limit.min(candidates.len()));

	while selected.len() < limit && !remaining.is_empty() {
		let mut best_pos = 0;
		let mut best_score = f32::NEG_INFINITY;

		for (pos, candidate_idx) in remaining.iter().copied().enumerate() {
			let redundancy = candidates[candidate_idx]
				.as_deref()
				.map(|vector| {
					selected
						.iter()
						.filter_map(|selected_idx| {
							candidates[*selected_idx]
								.as_deref()
								.and_then(|other| similarity.compute(vector, other))
						})
						.fold(f32::NEG_INFINITY, f32::max)
				})
				.filter(|max| max.is_finite())
				.unwrap_or(0.0);
			let score = lambda * relevance[candidate_idx] - (1.0 - lambda) * redundancy;

			// Strict comparison keeps the earliest fetch-ordered candidate on ties.
			if score > best_score {
				best_score = score;
				best_pos = pos;
			}
		}

		selected.push(remaining.remove(best_pos));
	}

	selected
}
