// src/remediation/matcher.rs
// Hybrid scoring: 0.7 semantic cosine + 0.3 string similarity, with multiplicative
// boosts for error-type and stack-trace agreement, capped at 1.0. Grounded on the
// weighted-combination shape of backend/src/memory/features/recall_engine/scoring's
// composite scorer, adapted from recency-aware memory recall to error-signature matching.

use contextd_types::MatchBreakdown;

use crate::config::MatcherConfig;

/// Normalized Levenshtein similarity in [0, 1]: `1 - edit_distance / max(len_a, len_b)`.
pub fn levenshtein_similarity(a: &str, b: &str) -> f32 {
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    let max_len = a.chars().count().max(b.chars().count());
    if max_len == 0 {
        return 1.0;
    }
    1.0 - (levenshtein_distance(a, b) as f32 / max_len as f32)
}

fn levenshtein_distance(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0usize; b.len() + 1];
    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = if ca == cb { 0 } else { 1 };
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}

/// Fraction of stack frames shared between two `|`-joined stack signatures.
fn stack_overlap_ratio(a: &str, b: &str) -> f32 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let frames_a: std::collections::HashSet<&str> = a.split('|').collect();
    let frames_b: std::collections::HashSet<&str> = b.split('|').collect();
    let union = frames_a.union(&frames_b).count();
    if union == 0 {
        return 0.0;
    }
    frames_a.intersection(&frames_b).count() as f32 / union as f32
}

/// Combines semantic and string similarity for a candidate against a query signature,
/// returning the full breakdown the caller can thread onto a `ScoredRemediation`.
pub fn hybrid_score(
    cfg: &MatcherConfig,
    semantic: f32,
    query_normalized: &str,
    candidate_normalized: &str,
    query_type: &str,
    candidate_type: &str,
    query_stack: &str,
    candidate_stack: &str,
) -> MatchBreakdown {
    let string = levenshtein_similarity(query_normalized, candidate_normalized);
    let mut hybrid = cfg.semantic_weight * semantic + cfg.string_weight * string;

    let type_match = levenshtein_distance(&query_type.to_lowercase(), &candidate_type.to_lowercase())
        <= cfg.type_fuzzy_distance;
    if type_match {
        hybrid *= cfg.type_boost;
    }

    let overlap = stack_overlap_ratio(query_stack, candidate_stack);
    let stack_match = overlap >= cfg.stack_overlap_ratio;
    if stack_match {
        hybrid *= cfg.stack_boost;
    }

    MatchBreakdown {
        semantic,
        string,
        hybrid: hybrid.min(1.0),
        type_match,
        stack_match,
    }
}

/// Whether a breakdown clears every configured gate.
pub fn passes_thresholds(cfg: &MatcherConfig, m: &MatchBreakdown) -> bool {
    m.semantic >= cfg.min_semantic && m.string >= cfg.min_string && m.hybrid >= cfg.min_hybrid
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn levenshtein_similarity_identical_strings_is_one() {
        assert_eq!(levenshtein_similarity("abc", "abc"), 1.0);
    }

    #[test]
    fn levenshtein_similarity_empty_strings_is_one() {
        assert_eq!(levenshtein_similarity("", ""), 1.0);
    }

    #[test]
    fn levenshtein_similarity_completely_different_is_low() {
        let sim = levenshtein_similarity("abcdef", "zyxwvu");
        assert!(sim < 0.2);
    }

    #[test]
    fn hybrid_score_caps_at_one() {
        let cfg = MatcherConfig::default();
        let m = hybrid_score(&cfg, 1.0, "same error", "same error", "TypeA", "TypeA", "f|file", "f|file");
        assert!(m.hybrid <= 1.0);
        assert!(m.type_match);
        assert!(m.stack_match);
    }

    #[test]
    fn hybrid_score_weights_semantic_and_string() {
        let cfg = MatcherConfig::default();
        let m = hybrid_score(&cfg, 0.8, "abc", "xyz", "A", "B", "", "");
        let expected_base = cfg.semantic_weight * 0.8 + cfg.string_weight * m.string;
        assert!((m.hybrid - expected_base).abs() < 1e-4);
    }

    #[test]
    fn passes_thresholds_rejects_below_minimums() {
        let cfg = MatcherConfig::default();
        let m = MatchBreakdown {
            semantic: 0.1,
            string: 0.1,
            hybrid: 0.1,
            type_match: false,
            stack_match: false,
        };
        assert!(!passes_thresholds(&cfg, &m));
    }

    #[test]
    fn stack_overlap_ratio_half_shared_frames() {
        assert_eq!(stack_overlap_ratio("a|b", "a|c"), 1.0 / 3.0);
    }
}
