//! Fusion of keyword and semantic result lists
//!
//! A message found by both strategies gets a weighted blend of its two scores
//! and is tagged `hybrid`. A message found by only one strategy keeps that
//! strategy's raw score, so keyword-only (`[0, 3]`) and semantic-only
//! (`[0, 1]`) scores are compared on different scales when sorting.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::types::{Provenance, SearchResult};

/// Blend weights for messages found by both strategies
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FusionWeights {
    pub semantic: f64,
    pub keyword: f64,
}

impl Default for FusionWeights {
    fn default() -> Self {
        Self {
            semantic: 0.6,
            keyword: 0.4,
        }
    }
}

impl FusionWeights {
    pub fn blend(&self, semantic_score: f64, keyword_score: f64) -> f64 {
        self.semantic * semantic_score + self.keyword * keyword_score
    }
}

struct Slot {
    index: usize,
    keyword_score: Option<f64>,
    semantic_score: Option<f64>,
}

/// Merge, deduplicate by message id, sort by score and cap at `max_results`.
///
/// Repeated keyword hits for one message keep the first; repeated semantic
/// hits keep the best semantic score.
pub fn fuse(
    keyword_results: &[SearchResult],
    semantic_results: &[SearchResult],
    max_results: usize,
    weights: FusionWeights,
) -> Vec<SearchResult> {
    let mut fused: Vec<SearchResult> = Vec::with_capacity(keyword_results.len() + semantic_results.len());
    let mut slots: HashMap<i64, Slot> = HashMap::new();

    for result in keyword_results {
        if slots.contains_key(&result.message_id) {
            continue;
        }
        let mut result = result.clone();
        result.provenance = Provenance::Keyword;
        slots.insert(
            result.message_id,
            Slot {
                index: fused.len(),
                keyword_score: Some(result.relevance_score),
                semantic_score: None,
            },
        );
        fused.push(result);
    }

    for result in semantic_results {
        match slots.get_mut(&result.message_id) {
            None => {
                let mut result = result.clone();
                result.provenance = Provenance::Semantic;
                slots.insert(
                    result.message_id,
                    Slot {
                        index: fused.len(),
                        keyword_score: None,
                        semantic_score: Some(result.relevance_score),
                    },
                );
                fused.push(result);
            }
            Some(slot) => {
                let semantic = slot
                    .semantic_score
                    .map_or(result.relevance_score, |best| best.max(result.relevance_score));
                slot.semantic_score = Some(semantic);

                let entry = &mut fused[slot.index];
                match slot.keyword_score {
                    Some(keyword) => {
                        entry.relevance_score = weights.blend(semantic, keyword);
                        entry.provenance = Provenance::Hybrid;
                    }
                    None => entry.relevance_score = semantic,
                }
            }
        }
    }

    // stable: ties keep keyword-first insertion order
    fused.sort_by(|a, b| {
        b.relevance_score
            .partial_cmp(&a.relevance_score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    fused.truncate(max_results);
    fused
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use proptest::prelude::*;
    use std::collections::HashSet;

    fn result(id: i64, score: f64, provenance: Provenance) -> SearchResult {
        SearchResult {
            message_id: id,
            external_message_id: format!("ext-{}", id),
            subject: format!("Subject {}", id),
            snippet: String::new(),
            sender_email: "a@example.com".to_string(),
            sender_name: String::new(),
            date_sent: Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(),
            relevance_score: score,
            provenance,
            labels: vec![],
            has_attachments: false,
        }
    }

    #[test]
    fn test_overlap_is_blended_and_tagged_hybrid() {
        let keyword = vec![result(1, 2.0, Provenance::Keyword), result(2, 1.0, Provenance::Keyword)];
        let semantic = vec![result(1, 0.8, Provenance::Semantic), result(3, 0.5, Provenance::Semantic)];

        let fused = fuse(&keyword, &semantic, 10, FusionWeights::default());
        assert_eq!(fused.len(), 3);

        let hybrid = fused.iter().find(|r| r.message_id == 1).unwrap();
        assert_eq!(hybrid.provenance, Provenance::Hybrid);
        assert!((hybrid.relevance_score - (0.6 * 0.8 + 0.4 * 2.0)).abs() < 1e-9);

        let keyword_only = fused.iter().find(|r| r.message_id == 2).unwrap();
        assert_eq!(keyword_only.provenance, Provenance::Keyword);
        assert_eq!(keyword_only.relevance_score, 1.0);

        let semantic_only = fused.iter().find(|r| r.message_id == 3).unwrap();
        assert_eq!(semantic_only.provenance, Provenance::Semantic);
        assert_eq!(semantic_only.relevance_score, 0.5);
    }

    #[test]
    fn test_mixed_scales_sorted_raw() {
        // a keyword-only 1.0 outranks a perfect semantic-only 0.99
        let keyword = vec![result(1, 1.0, Provenance::Keyword)];
        let semantic = vec![result(2, 0.99, Provenance::Semantic)];
        let fused = fuse(&keyword, &semantic, 10, FusionWeights::default());
        let ids: Vec<_> = fused.iter().map(|r| r.message_id).collect();
        assert_eq!(ids, vec![1, 2]);
    }

    #[test]
    fn test_truncates_to_max_results() {
        let keyword: Vec<_> = (0..5).map(|i| result(i, i as f64, Provenance::Keyword)).collect();
        let fused = fuse(&keyword, &[], 3, FusionWeights::default());
        let ids: Vec<_> = fused.iter().map(|r| r.message_id).collect();
        assert_eq!(ids, vec![4, 3, 2]);
    }

    #[test]
    fn test_repeated_semantic_hits_keep_best() {
        let keyword = vec![result(1, 1.0, Provenance::Keyword)];
        let semantic = vec![result(1, 0.4, Provenance::Semantic), result(1, 0.9, Provenance::Semantic)];
        let fused = fuse(&keyword, &semantic, 10, FusionWeights::default());
        assert_eq!(fused.len(), 1);
        assert!((fused[0].relevance_score - (0.6 * 0.9 + 0.4 * 1.0)).abs() < 1e-9);
    }

    #[test]
    fn test_empty_inputs() {
        assert!(fuse(&[], &[], 10, FusionWeights::default()).is_empty());
    }

    proptest! {
        #[test]
        fn prop_fused_ids_unique_and_capped(
            keyword in prop::collection::vec((0i64..20, 0.0f64..3.0), 0..30),
            semantic in prop::collection::vec((0i64..20, 0.0f64..1.0), 0..30),
            max_results in 1usize..25,
        ) {
            let keyword_ids: HashSet<i64> = keyword.iter().map(|(id, _)| *id).collect();
            let semantic_ids: HashSet<i64> = semantic.iter().map(|(id, _)| *id).collect();

            let keyword: Vec<_> = keyword.iter().map(|(id, s)| result(*id, *s, Provenance::Keyword)).collect();
            let semantic: Vec<_> = semantic.iter().map(|(id, s)| result(*id, *s, Provenance::Semantic)).collect();
            let fused = fuse(
                &keyword,
                &semantic,
                max_results,
                FusionWeights::default(),
            );

            prop_assert!(fused.len() <= max_results);

            let mut seen = HashSet::new();
            for r in &fused {
                prop_assert!(seen.insert(r.message_id));
                prop_assert!(keyword_ids.contains(&r.message_id) || semantic_ids.contains(&r.message_id));
                let expected = match (keyword_ids.contains(&r.message_id), semantic_ids.contains(&r.message_id)) {
                    (true, true) => Provenance::Hybrid,
                    (true, false) => Provenance::Keyword,
                    _ => Provenance::Semantic,
                };
                prop_assert_eq!(r.provenance, expected);
            }

            for pair in fused.windows(2) {
                prop_assert!(pair[0].relevance_score >= pair[1].relevance_score);
            }
        }
    }
}
