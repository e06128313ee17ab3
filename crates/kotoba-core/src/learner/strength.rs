//! Contextual-strength components and significance statistics.

use std::collections::{HashMap, HashSet};

use crate::analysis::{ContextPrediction, ContextPredictor};
use crate::settings::LearningConfig;
use crate::unicode::script_signature;

use super::state::UserRelation;

/// Chi-square critical value for one degree of freedom at p = 0.05.
pub const CHI_SQUARE_CRITICAL: f64 = 3.841;

/// Character offsets of every occurrence of `needle` in `haystack`.
fn char_positions(haystack: &str, needle: &str) -> Vec<usize> {
    if needle.is_empty() {
        return Vec::new();
    }
    haystack
        .match_indices(needle)
        .map(|(byte, _)| haystack[..byte].chars().count())
        .collect()
}

/// Inverse-distance proximity of two terms in `text`: 1.0 when adjacent,
/// falling linearly to 0.0 at `window` characters apart.
pub fn proximity(text: &str, a: &str, b: &str, window: usize) -> f32 {
    if window == 0 || a == b {
        return 0.0;
    }
    let pa = char_positions(text, a);
    let pb = char_positions(text, b);
    let nearest = pa
        .iter()
        .flat_map(|x| pb.iter().map(move |y| x.abs_diff(*y)))
        .filter(|d| *d > 0)
        .min();
    match nearest {
        Some(d) if d <= window => 1.0 - (d - 1) as f32 / window as f32,
        _ => 0.0,
    }
}

/// Statistical-semantic similarity: the larger of the predictor agreement
/// and the shared script-pattern score.
pub fn semantic_similarity(
    a: &str,
    b: &str,
    predictions: &HashMap<String, ContextPrediction>,
    config: &LearningConfig,
) -> f32 {
    let predicted = match (predictions.get(a), predictions.get(b)) {
        (Some(pa), Some(pb)) if pa.category == pb.category => {
            let joint = pa.confidence * pb.confidence;
            if joint >= config.prediction_confidence {
                joint
            } else {
                0.0
            }
        }
        _ => 0.0,
    };
    let pattern = if script_signature(a) == script_signature(b) {
        config.pattern_similarity
    } else {
        0.0
    };
    predicted.max(pattern).clamp(0.0, 1.0)
}

/// Predictions for each term. Terms whose prediction fails are left out and
/// so contribute no predictor signal.
pub fn predict_terms<'a>(
    predictor: Option<&dyn ContextPredictor>,
    terms: impl IntoIterator<Item = &'a str>,
) -> HashMap<String, ContextPrediction> {
    let Some(predictor) = predictor else {
        return HashMap::new();
    };
    let mut out = HashMap::new();
    for term in terms {
        if out.contains_key(term) {
            continue;
        }
        match predictor.predict_context(term) {
            Ok(p) => {
                out.insert(term.to_string(), p);
            }
            Err(e) => tracing::debug!(term, "context prediction skipped: {e}"),
        }
    }
    out
}

/// Cosine similarity of two terms' relation-strength vectors.
pub fn relation_cosine(relations: &HashMap<String, Vec<UserRelation>>, a: &str, b: &str) -> f32 {
    let (Some(va), Some(vb)) = (relations.get(a), relations.get(b)) else {
        return 0.0;
    };
    let ma: HashMap<&str, f32> = va.iter().map(|r| (r.related.as_str(), r.strength)).collect();
    let mb: HashMap<&str, f32> = vb.iter().map(|r| (r.related.as_str(), r.strength)).collect();
    let keys: HashSet<&str> = ma.keys().chain(mb.keys()).copied().collect();
    let mut dot = 0.0f32;
    let mut na = 0.0f32;
    let mut nb = 0.0f32;
    for k in keys {
        let x = ma.get(k).copied().unwrap_or(0.0);
        let y = mb.get(k).copied().unwrap_or(0.0);
        dot += x * y;
        na += x * x;
        nb += y * y;
    }
    if na == 0.0 || nb == 0.0 {
        return 0.0;
    }
    (dot / (na.sqrt() * nb.sqrt())).clamp(0.0, 1.0)
}

/// Weighted sum of the three components, clamped to [0, 1].
pub fn combine(proximity: f32, semantic: f32, cosine: f32, config: &LearningConfig) -> f32 {
    (config.proximity_weight * proximity
        + config.semantic_weight * semantic
        + config.transitive_weight * cosine)
        .clamp(0.0, 1.0)
}

/// Observed totals used by the significance statistics.
pub struct Counts {
    pub pair: u32,
    pub term_a: u32,
    pub term_b: u32,
    pub total_pairs: u64,
    pub total_terms: u64,
}

/// log2(P(a,b) / (P(a)·P(b))). `None` when any count is zero.
pub fn pmi(c: &Counts) -> Option<f64> {
    if c.pair == 0 || c.term_a == 0 || c.term_b == 0 || c.total_pairs == 0 || c.total_terms == 0
    {
        return None;
    }
    let p_ab = c.pair as f64 / c.total_pairs as f64;
    let p_a = c.term_a as f64 / c.total_terms as f64;
    let p_b = c.term_b as f64 / c.total_terms as f64;
    Some((p_ab / (p_a * p_b)).log2())
}

/// One-cell chi-square of the observed pair count against the count expected
/// if the two terms occurred independently.
pub fn chi_square(c: &Counts) -> Option<f64> {
    if c.term_a == 0 || c.term_b == 0 || c.total_pairs == 0 || c.total_terms == 0 {
        return None;
    }
    let p_a = c.term_a as f64 / c.total_terms as f64;
    let p_b = c.term_b as f64 / c.total_terms as f64;
    let expected = p_a * p_b * c.total_pairs as f64;
    if expected <= 0.0 {
        return None;
    }
    let diff = c.pair as f64 - expected;
    Some(diff * diff / expected)
}

/// Significant and above chance.
pub fn is_significant(c: &Counts) -> bool {
    let Some(chi) = chi_square(c) else {
        return false;
    };
    let p_a = c.term_a as f64 / c.total_terms as f64;
    let p_b = c.term_b as f64 / c.total_terms as f64;
    chi > CHI_SQUARE_CRITICAL && c.pair as f64 > p_a * p_b * c.total_pairs as f64
}
