//! Reciprocal rank fusion of lexical and semantic result lists.
//!
//! RRF score for a chunk is the sum over lists of `1 / (k + rank)` with
//! 1-based ranks. A chunk in both lists always outscores a chunk at the
//! same ranks in only one.

use std::collections::{HashMap, HashSet};

use protoq_core::models::{SearchHit, SearchSource};

/// Fuse two ranked lists into at most `limit` hits.
///
/// Output is deterministic: hits are assembled in encounter order (lexical
/// list first, then semantic-only hits) and sorted stably by descending
/// fused score, so ties keep encounter order. Each hit's source records
/// which lists contributed it.
pub fn fuse(
    lexical: Vec<SearchHit>,
    semantic: Vec<SearchHit>,
    k: f64,
    limit: usize,
) -> Vec<SearchHit> {
    let lexical_ranks: HashMap<i64, usize> = lexical
        .iter()
        .enumerate()
        .map(|(i, hit)| (hit.chunk_id, i + 1))
        .collect();
    let semantic_ranks: HashMap<i64, usize> = semantic
        .iter()
        .enumerate()
        .map(|(i, hit)| (hit.chunk_id, i + 1))
        .collect();

    let mut fused: Vec<SearchHit> = Vec::with_capacity(lexical.len() + semantic.len());
    let mut seen: HashSet<i64> = HashSet::new();

    for mut hit in lexical.into_iter().chain(semantic) {
        if !seen.insert(hit.chunk_id) {
            continue;
        }

        let mut score = 0.0;
        let in_lexical = lexical_ranks.contains_key(&hit.chunk_id);
        let in_semantic = semantic_ranks.contains_key(&hit.chunk_id);
        if let Some(rank) = lexical_ranks.get(&hit.chunk_id) {
            score += 1.0 / (k + *rank as f64);
        }
        if let Some(rank) = semantic_ranks.get(&hit.chunk_id) {
            score += 1.0 / (k + *rank as f64);
        }

        hit.score = score;
        hit.source = match (in_lexical, in_semantic) {
            (true, true) => SearchSource::Hybrid,
            (true, false) => SearchSource::Lexical,
            (false, _) => SearchSource::Semantic,
        };
        fused.push(hit);
    }

    fused.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    fused.truncate(limit);
    fused
}

#[cfg(test)]
mod tests {
    use super::*;
    use protoq_core::defaults;

    fn hit(chunk_id: i64, score: f64, source: SearchSource) -> SearchHit {
        SearchHit {
            chunk_id,
            document_id: 1,
            protocol_id: Some("P-001".to_string()),
            chunk_text: format!("chunk {chunk_id}"),
            section_type: None,
            score,
            source,
        }
    }

    fn lex(chunk_id: i64, score: f64) -> SearchHit {
        hit(chunk_id, score, SearchSource::Lexical)
    }

    fn sem(chunk_id: i64, score: f64) -> SearchHit {
        hit(chunk_id, score, SearchSource::Semantic)
    }

    #[test]
    fn test_chunk_in_both_lists_outranks_single_list() {
        let lexical = vec![lex(1, 5.0), lex(2, 4.0)];
        let semantic = vec![sem(2, 0.9), sem(3, 0.8)];
        let fused = fuse(lexical, semantic, defaults::RRF_K, 10);

        assert_eq!(fused[0].chunk_id, 2);
        assert_eq!(fused[0].source, SearchSource::Hybrid);
        // Rank 1 in both lists: 2/(k+1) beats any single-list 1/(k+1).
        let expected = 1.0 / (defaults::RRF_K + 2.0) + 1.0 / (defaults::RRF_K + 1.0);
        assert!((fused[0].score - expected).abs() < 1e-12);
    }

    #[test]
    fn test_rank_one_in_both_lists_scores_two_over_k_plus_one() {
        let fused = fuse(
            vec![lex(1, 5.0), lex(2, 4.0)],
            vec![sem(1, 0.9), sem(3, 0.8)],
            defaults::RRF_K,
            10,
        );
        let top = &fused[0];
        assert_eq!(top.chunk_id, 1);
        assert!((top.score - 2.0 / (defaults::RRF_K + 1.0)).abs() < 1e-12);
        // Strictly above anything ranked #1 in a single list.
        assert!(top.score > 1.0 / (defaults::RRF_K + 1.0));
    }

    #[test]
    fn test_single_list_sources_preserved() {
        let fused = fuse(vec![lex(1, 5.0)], vec![sem(2, 0.9)], defaults::RRF_K, 10);
        let by_id: HashMap<i64, SearchSource> =
            fused.iter().map(|h| (h.chunk_id, h.source)).collect();
        assert_eq!(by_id[&1], SearchSource::Lexical);
        assert_eq!(by_id[&2], SearchSource::Semantic);
    }

    #[test]
    fn test_ties_keep_encounter_order() {
        // Chunks 1 and 2 each appear at rank 1 of exactly one list, so their
        // fused scores are equal. The lexical hit was encountered first.
        let fused = fuse(vec![lex(1, 5.0)], vec![sem(2, 0.9)], defaults::RRF_K, 10);
        assert_eq!(fused[0].chunk_id, 1);
        assert_eq!(fused[1].chunk_id, 2);
        assert_eq!(fused[0].score, fused[1].score);
    }

    #[test]
    fn test_limit_applied_after_fusion() {
        let lexical = vec![lex(1, 5.0), lex(2, 4.0), lex(3, 3.0)];
        let semantic = vec![sem(4, 0.9), sem(5, 0.8)];
        let fused = fuse(lexical, semantic, defaults::RRF_K, 2);
        assert_eq!(fused.len(), 2);
    }

    #[test]
    fn test_empty_lists() {
        assert!(fuse(Vec::new(), Vec::new(), defaults::RRF_K, 10).is_empty());
        let fused = fuse(Vec::new(), vec![sem(1, 0.9)], defaults::RRF_K, 10);
        assert_eq!(fused.len(), 1);
        assert_eq!(fused[0].source, SearchSource::Semantic);
    }

    #[test]
    fn test_fusion_is_deterministic() {
        let lexical = vec![lex(1, 5.0), lex(2, 4.0), lex(3, 3.0)];
        let semantic = vec![sem(3, 0.9), sem(4, 0.8), sem(1, 0.7)];
        let a = fuse(lexical.clone(), semantic.clone(), defaults::RRF_K, 10);
        let b = fuse(lexical, semantic, defaults::RRF_K, 10);
        let ids_a: Vec<i64> = a.iter().map(|h| h.chunk_id).collect();
        let ids_b: Vec<i64> = b.iter().map(|h| h.chunk_id).collect();
        assert_eq!(ids_a, ids_b);
    }
}
