use std::collections::HashMap;

use crate::lexicon::SynonymGraph;
use crate::settings::DiversifierConfig;

#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub word: String,
    /// Edge weight, or the penalised weakest edge of a two-hop path.
    pub weight: f32,
    pub hops: u8,
}

/// Direct neighbors of `word` merged with neighbors-of-neighbors reached
/// through strong edges only. Two-hop candidates score
/// `min(w1, w2) · two_hop_penalty`; a word reachable both ways keeps the
/// better score. Sorted by weight, then by word.
pub fn gather(graph: &SynonymGraph, word: &str, config: &DiversifierConfig) -> Vec<Candidate> {
    let direct: Vec<(&str, f32)> = graph
        .ranked_neighbors(word)
        .into_iter()
        .take(config.max_direct_neighbors)
        .collect();

    let mut best: HashMap<&str, (f32, u8)> = HashMap::new();
    for (n, w) in &direct {
        best.insert(*n, (*w, 1));
    }

    for (n, w1) in &direct {
        if *w1 < config.two_hop_min_weight {
            continue;
        }
        for (m, w2) in graph.ranked_neighbors(n) {
            if m == word || w2 < config.two_hop_min_weight {
                continue;
            }
            let score = w1.min(w2) * config.two_hop_penalty;
            let slot = best.entry(m).or_insert((score, 2));
            if score > slot.0 {
                *slot = (score, 2);
            }
        }
    }

    let mut out: Vec<Candidate> = best
        .into_iter()
        .map(|(w, (weight, hops))| Candidate {
            word: w.to_string(),
            weight,
            hops,
        })
        .collect();
    out.sort_by(|a, b| {
        b.weight
            .partial_cmp(&a.weight)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.word.cmp(&b.word))
    });
    out.truncate(config.max_candidates);
    out
}
