//! Reciprocal rank fusion of independent result lists.
//!
//! Scores from dense and sparse searches are not comparable, so fusion works
//! on rank positions only: `score(point) = sum over lists of 1 / (k + rank)`
//! with 1-based ranks. Points in several lists accumulate score and sort
//! ahead of single-list points at similar depth.

use std::collections::HashMap;

use crate::kernel::ScoredPoint;

/// The standard dampening constant; small rank differences deep in a list
/// barely move the fused score.
pub const RRF_K: usize = 60;

/// Fuse ranked lists into a single list ordered by fused score, truncated to
/// `limit`. The reported `score` of each result is its fused score, not any
/// original similarity.
pub fn fuse(rankings: &[Vec<ScoredPoint>], k: usize, limit: usize) -> Vec<ScoredPoint> {
    let mut scores: HashMap<u64, f32> = HashMap::new();
    let mut payloads: HashMap<u64, serde_json::Value> = HashMap::new();

    for ranking in rankings {
        for (rank, point) in ranking.iter().enumerate() {
            *scores.entry(point.id).or_insert(0.0) += 1.0 / (k + rank + 1) as f32;
            payloads
                .entry(point.id)
                .or_insert_with(|| point.payload.clone());
        }
    }

    let mut fused: Vec<ScoredPoint> = scores
        .into_iter()
        .map(|(id, score)| ScoredPoint {
            id,
            score,
            payload: payloads.remove(&id).unwrap_or(serde_json::Value::Null),
        })
        .collect();
    // Tie-break on id so output order is stable across runs
    fused.sort_unstable_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.id.cmp(&b.id))
    });
    fused.truncate(limit);
    fused
}
