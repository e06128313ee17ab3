use std::collections::HashMap;

use super::entry::DictionaryEntry;
use super::graph::SynonymGraph;

/// Edges beyond this count add nothing to the score.
const MAX_COUNTED_EDGES: usize = 5;

const EDGE_POINTS: f32 = 40.0;
const POS_POINTS: f32 = 40.0;
const FREQUENCY_POINTS: f32 = 20.0;

/// Quality of `word` as a substitution target, in [0, 100].
///
/// Combines the capped edge count, the share of (at most `sample`) strongest
/// neighbors sharing a part of speech with `word`, and how close `word`'s
/// frequency is to the neighbors' average.
pub fn quality_score(
    graph: &SynonymGraph,
    entries: &HashMap<String, DictionaryEntry>,
    word: &str,
    sample: usize,
) -> u8 {
    let degree = graph.degree(word);
    let edge_part = degree.min(MAX_COUNTED_EDGES) as f32 / MAX_COUNTED_EDGES as f32 * EDGE_POINTS;

    let Some(entry) = entries.get(word) else {
        return edge_part.round() as u8;
    };

    let neighbors: Vec<&DictionaryEntry> = graph
        .ranked_neighbors(word)
        .into_iter()
        .filter_map(|(n, _)| entries.get(n))
        .take(sample.max(1))
        .collect();
    if neighbors.is_empty() {
        return edge_part.round() as u8;
    }

    let overlapping = neighbors.iter().filter(|n| n.shares_pos(entry)).count();
    let pos_part = overlapping as f32 / neighbors.len() as f32 * POS_POINTS;

    let avg_frequency =
        neighbors.iter().map(|n| n.frequency as f32).sum::<f32>() / neighbors.len() as f32;
    let own = entry.frequency as f32;
    let balance = if own.max(avg_frequency) <= 0.0 {
        0.0
    } else {
        own.min(avg_frequency) / own.max(avg_frequency)
    };
    let frequency_part = balance * FREQUENCY_POINTS;

    (edge_part + pos_part + frequency_part).round().clamp(0.0, 100.0) as u8
}
