use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Weighted synonym graph: word → (neighbor → weight in [0, 1]).
///
/// Edges may be inserted one-directionally (dictionary synonym fields are not
/// guaranteed to be reciprocal); `close_reciprocal` restores symmetry.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SynonymGraph {
    edges: HashMap<String, HashMap<String, f32>>,
}

impl SynonymGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `from → to`, keeping the larger weight if the edge exists.
    /// Self-loops are ignored. Returns true if a new edge was created.
    pub fn insert_directed(&mut self, from: &str, to: &str, weight: f32) -> bool {
        if from == to || from.is_empty() || to.is_empty() {
            return false;
        }
        let weight = weight.clamp(0.0, 1.0);
        let inner = self.edges.entry(from.to_string()).or_default();
        match inner.get_mut(to) {
            Some(existing) => {
                if weight > *existing {
                    *existing = weight;
                }
                false
            }
            None => {
                inner.insert(to.to_string(), weight);
                true
            }
        }
    }

    /// Insert both directions.
    pub fn link(&mut self, a: &str, b: &str, weight: f32) -> bool {
        let forward = self.insert_directed(a, b, weight);
        let backward = self.insert_directed(b, a, weight);
        forward || backward
    }

    pub fn neighbors(&self, word: &str) -> Option<&HashMap<String, f32>> {
        self.edges.get(word)
    }

    pub fn weight(&self, a: &str, b: &str) -> Option<f32> {
        self.edges.get(a).and_then(|inner| inner.get(b)).copied()
    }

    pub fn contains(&self, a: &str, b: &str) -> bool {
        self.weight(a, b).is_some()
    }

    pub fn degree(&self, word: &str) -> usize {
        self.edges.get(word).map_or(0, |inner| inner.len())
    }

    /// Neighbors sorted by descending weight, then lexically for stability.
    pub fn ranked_neighbors(&self, word: &str) -> Vec<(&str, f32)> {
        let Some(inner) = self.edges.get(word) else {
            return Vec::new();
        };
        let mut ranked: Vec<(&str, f32)> = inner.iter().map(|(w, s)| (w.as_str(), *s)).collect();
        ranked.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(b.0))
        });
        ranked
    }

    /// For every edge A → B, ensure B → A exists with the same weight.
    /// Returns the number of reverse edges added.
    pub fn close_reciprocal(&mut self) -> usize {
        let edges = &self.edges;
        let missing: Vec<(String, String, f32)> = edges
            .iter()
            .flat_map(|(from, inner)| {
                inner.iter().filter_map(move |(to, w)| {
                    let has_reverse = edges
                        .get(to)
                        .is_some_and(|back| back.contains_key(from));
                    (!has_reverse).then(|| (to.clone(), from.clone(), *w))
                })
            })
            .collect();
        let added = missing.len();
        for (from, to, w) in missing {
            self.insert_directed(&from, &to, w);
        }
        added
    }

    pub fn is_symmetric(&self) -> bool {
        self.edges.iter().all(|(from, inner)| {
            inner
                .keys()
                .all(|to| self.edges.get(to).is_some_and(|back| back.contains_key(from)))
        })
    }

    /// Number of directed edges.
    pub fn edge_count(&self) -> usize {
        self.edges.values().map(|inner| inner.len()).sum()
    }

    pub fn node_count(&self) -> usize {
        self.edges.len()
    }

    pub fn words(&self) -> impl Iterator<Item = &str> {
        self.edges.keys().map(|k| k.as_str())
    }

    /// Flatten into `word → [neighbors]` lists for the cache shard, sorted for
    /// deterministic output.
    pub fn to_lists(&self) -> Vec<(String, Vec<(String, f32)>)> {
        let mut lists: Vec<(String, Vec<(String, f32)>)> = self
            .edges
            .iter()
            .map(|(word, inner)| {
                let mut neighbors: Vec<(String, f32)> =
                    inner.iter().map(|(n, w)| (n.clone(), *w)).collect();
                neighbors.sort_by(|a, b| a.0.cmp(&b.0));
                (word.clone(), neighbors)
            })
            .collect();
        lists.sort_by(|a, b| a.0.cmp(&b.0));
        lists
    }

    pub fn from_lists(lists: Vec<(String, Vec<(String, f32)>)>) -> Self {
        let mut graph = Self::new();
        for (word, neighbors) in lists {
            for (n, w) in neighbors {
                graph.insert_directed(&word, &n, w);
            }
        }
        graph
    }
}
