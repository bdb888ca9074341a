use std::collections::HashMap;

use crate::domain::SearchResult;

/// Smoothing constant for Reciprocal Rank Fusion.
/// Higher values reduce the weight difference between high and low-ranked items.
pub const RRF_K: f32 = 60.0;

/// Leg weights for the hybrid engine (§4.J): the vector leg counts for twice
/// as much of the fused score as the SQI leg.
pub const VECTOR_WEIGHT: f32 = 2.0;
pub const SQI_WEIGHT: f32 = 1.0;

/// Merge two ranked result lists using weighted Reciprocal Rank Fusion,
/// keyed on `(file_path, start_line)` so a vector hit and a symbol hit that
/// land on the same span fuse into a single result instead of duplicating.
///
/// Each result receives a score of `weight / (RRF_K + rank)` from each list
/// it appears in. The scores are summed, and the top `limit` results by
/// fused score are returned.
pub fn rrf_fuse(
    vector: Vec<SearchResult>,
    sqi: Vec<SearchResult>,
    limit: usize,
) -> Vec<SearchResult> {
    let mut scores: HashMap<(String, u32), (SearchResult, f32)> = HashMap::new();

    for (rank, result) in vector.into_iter().enumerate() {
        let rrf = VECTOR_WEIGHT / (RRF_K + (rank + 1) as f32);
        let key = result.merge_key();
        scores
            .entry(key)
            .and_modify(|(_, s)| *s += rrf)
            .or_insert((result, rrf));
    }
    for (rank, result) in sqi.into_iter().enumerate() {
        let rrf = SQI_WEIGHT / (RRF_K + (rank + 1) as f32);
        let key = result.merge_key();
        scores
            .entry(key)
            .and_modify(|(_, s)| *s += rrf)
            .or_insert((result, rrf));
    }

    let mut fused: Vec<(SearchResult, f32)> = scores.into_values().collect();
    fused.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    fused
        .into_iter()
        .take(limit)
        .map(|(r, score)| SearchResult::new(r.chunk().clone(), score))
        .collect()
}
