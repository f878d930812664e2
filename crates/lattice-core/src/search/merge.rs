//! Score merging across retrieval sources.
//!
//! Pure and deterministic: candidates are unioned by canonical entity id,
//! weighted per source, and rewarded for cross-source agreement with a
//! small corroboration bonus. Ordering is total - score descending, then
//! corroborating-source count descending, then entity id ascending - so
//! equal inputs always produce identical output.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::sources::ScoredId;

/// The hits one source contributed, with its merge weight.
#[derive(Debug, Clone)]
pub struct SourceResult {
    pub source: String,
    pub weight: f32,
    pub hits: Vec<ScoredId>,
}

/// One merged, ranked result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergedHit {
    pub entity_id: String,
    /// Weighted sum over contributing sources plus corroboration bonus.
    pub score: f32,
    /// Number of sources that returned this id.
    pub source_count: usize,
    /// Per-source raw scores, in contribution order.
    pub contributions: Vec<(String, f32)>,
}

/// Union, weight, bonus, sort, truncate.
pub fn merge_results(
    sources: &[SourceResult],
    bonus_per_extra_source: f32,
    limit: usize,
) -> Vec<MergedHit> {
    let mut by_id: BTreeMap<String, MergedHit> = BTreeMap::new();

    for source in sources {
        // A source may report the same id more than once; keep its best.
        let mut best: BTreeMap<&str, f32> = BTreeMap::new();
        for hit in &source.hits {
            let entry = best.entry(hit.entity_id.as_str()).or_insert(hit.score);
            if hit.score > *entry {
                *entry = hit.score;
            }
        }

        for (entity_id, raw) in best {
            let entry = by_id
                .entry(entity_id.to_string())
                .or_insert_with(|| MergedHit {
                    entity_id: entity_id.to_string(),
                    score: 0.0,
                    source_count: 0,
                    contributions: Vec::new(),
                });
            entry.score += source.weight * raw;
            entry.source_count += 1;
            entry.contributions.push((source.source.clone(), raw));
        }
    }

    let mut merged: Vec<MergedHit> = by_id
        .into_values()
        .map(|mut hit| {
            if hit.source_count > 1 {
                hit.score += bonus_per_extra_source * (hit.source_count - 1) as f32;
            }
            hit
        })
        .collect();

    merged.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| b.source_count.cmp(&a.source_count))
            .then_with(|| a.entity_id.cmp(&b.entity_id))
    });
    merged.truncate(limit);
    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source(name: &str, weight: f32, hits: &[(&str, f32)]) -> SourceResult {
        SourceResult {
            source: name.to_string(),
            weight,
            hits: hits
                .iter()
                .map(|(id, score)| ScoredId::new(*id, *score))
                .collect(),
        }
    }

    #[test]
    fn test_corroborated_result_outranks_single_source() {
        // X: 0.5*0.60 + 0.3*0.50 + 0.05*(2-1) = 0.50
        // Y: 0.5*0.65                          = 0.325
        let sources = [
            source("vector", 0.5, &[("entity_x", 0.60), ("entity_y", 0.65)]),
            source("graph", 0.3, &[("entity_x", 0.50)]),
        ];

        let merged = merge_results(&sources, 0.05, 10);
        assert_eq!(merged.len(), 2);

        assert_eq!(merged[0].entity_id, "entity_x");
        assert_eq!(merged[0].source_count, 2);
        assert!((merged[0].score - 0.50).abs() < 1e-6, "got {}", merged[0].score);

        assert_eq!(merged[1].entity_id, "entity_y");
        assert_eq!(merged[1].source_count, 1);
        assert!((merged[1].score - 0.325).abs() < 1e-6, "got {}", merged[1].score);
    }

    #[test]
    fn test_no_bonus_for_single_source() {
        let sources = [source("vector", 1.0, &[("a", 0.9)])];
        let merged = merge_results(&sources, 0.05, 10);
        assert!((merged[0].score - 0.9).abs() < 1e-6);
    }

    #[test]
    fn test_duplicate_hits_within_source_keep_best() {
        let sources = [source("graph", 1.0, &[("a", 0.2), ("a", 0.8), ("a", 0.5)])];
        let merged = merge_results(&sources, 0.05, 10);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].source_count, 1);
        assert!((merged[0].score - 0.8).abs() < 1e-6);
    }

    #[test]
    fn test_tie_breaks_are_deterministic() {
        // Same combined score; b has more corroboration and wins.
        let sources = [
            source("vector", 0.5, &[("a", 0.8), ("b", 0.4)]),
            source("graph", 0.5, &[("b", 0.4)]),
        ];
        // a: 0.40; b: 0.20 + 0.20 + 0.05 = 0.45 -> b first on score alone.
        let merged = merge_results(&sources, 0.05, 10);
        assert_eq!(merged[0].entity_id, "b");

        // Exact ties fall back to id order.
        let sources = [
            source("vector", 0.5, &[("zed", 0.6), ("abc", 0.6)]),
        ];
        let merged = merge_results(&sources, 0.05, 10);
        assert_eq!(merged[0].entity_id, "abc");
        assert_eq!(merged[1].entity_id, "zed");
    }

    #[test]
    fn test_truncates_to_limit() {
        let sources = [source("vector", 1.0, &[("a", 0.9), ("b", 0.8), ("c", 0.7)])];
        let merged = merge_results(&sources, 0.05, 2);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].entity_id, "a");
    }

    #[test]
    fn test_empty_sources_produce_empty_merge() {
        assert!(merge_results(&[], 0.05, 10).is_empty());
        let sources = [source("vector", 0.5, &[])];
        assert!(merge_results(&sources, 0.05, 10).is_empty());
    }
}
