use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::settings::LearningConfig;

/// Order-independent key of a term pair.
pub fn pair_key(a: &str, b: &str) -> (String, String) {
    if a <= b {
        (a.to_string(), b.to_string())
    } else {
        (b.to_string(), a.to_string())
    }
}

/// Raw co-occurrence signal for a pair. Never deleted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CoOccurrence {
    pub count: u32,
    /// Most recent context snippets, oldest first.
    pub contexts: Vec<String>,
    /// Running mean of the contextual strengths observed for the pair.
    pub mean_strength: f32,
    pub scored: u32,
}

impl CoOccurrence {
    pub(crate) fn observe_strength(&mut self, strength: f32) {
        self.scored += 1;
        self.mean_strength += (strength - self.mean_strength) / self.scored as f32;
    }

    pub(crate) fn push_context(&mut self, snippet: &str, max_contexts: usize) {
        if max_contexts == 0 || self.contexts.iter().any(|c| c == snippet) {
            return;
        }
        if self.contexts.len() >= max_contexts {
            self.contexts.remove(0);
        }
        self.contexts.push(snippet.to_string());
    }
}

/// A learned edge `term → related`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserRelation {
    pub related: String,
    /// In [0, 1].
    pub strength: f32,
    pub count: u32,
    pub first_seen: u64,
    pub last_updated: u64,
    /// Time up to which decay has already been applied.
    pub last_decayed: u64,
}

impl UserRelation {
    pub(crate) fn new(related: &str, strength: f32, count: u32, now: u64) -> Self {
        Self {
            related: related.to_string(),
            strength: strength.clamp(0.0, 1.0),
            count,
            first_seen: now,
            last_updated: now,
            last_decayed: now,
        }
    }

    /// Exponential moving average towards `observed`.
    pub(crate) fn reinforce(&mut self, observed: f32, learning_rate: f32, count: u32, now: u64) {
        self.strength = ema(self.strength, observed, learning_rate);
        self.count = count;
        self.last_updated = now;
    }

    /// Additive nudge, clamped to [0, 1].
    pub(crate) fn nudge(&mut self, delta: f32, now: u64) {
        self.strength = (self.strength + delta).clamp(0.0, 1.0);
        self.last_updated = now;
    }

    /// Decay for the days elapsed since the later of the last update and the
    /// last decay.
    pub(crate) fn decay(&mut self, decay_factor: f32, now: u64) {
        let anchor = self.last_updated.max(self.last_decayed);
        let days = now.saturating_sub(anchor) as f64 / crate::clock::SECS_PER_DAY as f64;
        self.strength = (self.strength as f64 * (decay_factor as f64).powf(days)) as f32;
        self.last_decayed = now.max(anchor);
    }
}

pub fn ema(old: f32, observed: f32, learning_rate: f32) -> f32 {
    (old * (1.0 - learning_rate) + observed.clamp(0.0, 1.0) * learning_rate).clamp(0.0, 1.0)
}

/// Mutable learning state of one user.
#[derive(Debug, Clone, Default)]
pub(crate) struct LearnerState {
    pub co_occurrence: HashMap<(String, String), CoOccurrence>,
    pub term_frequency: HashMap<String, u32>,
    pub relations: HashMap<String, Vec<UserRelation>>,
}

impl LearnerState {
    pub fn relation(&self, term: &str, related: &str) -> Option<&UserRelation> {
        self.relations
            .get(term)?
            .iter()
            .find(|r| r.related == related)
    }

    pub fn relation_mut(&mut self, term: &str, related: &str) -> Option<&mut UserRelation> {
        self.relations
            .get_mut(term)?
            .iter_mut()
            .find(|r| r.related == related)
    }

    pub fn co_count(&self, a: &str, b: &str) -> u32 {
        self.co_occurrence
            .get(&pair_key(a, b))
            .map_or(0, |c| c.count)
    }

    /// Insert a relation, then enforce the per-term cap by dropping the
    /// weakest entries.
    pub fn insert_relation(&mut self, term: &str, relation: UserRelation, cap: usize) {
        let list = self.relations.entry(term.to_string()).or_default();
        list.push(relation);
        if list.len() > cap {
            list.sort_by(|a, b| {
                b.strength
                    .partial_cmp(&a.strength)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then_with(|| b.last_updated.cmp(&a.last_updated))
            });
            list.truncate(cap);
        }
    }

    pub fn relation_count(&self) -> usize {
        self.relations.values().map(|l| l.len()).sum()
    }

    pub fn to_snapshot(&self, config: &LearningConfig, last_saved: u64) -> RelationSnapshot {
        let mut user_relations: Vec<(String, Vec<UserRelation>)> = self
            .relations
            .iter()
            .map(|(t, l)| (t.clone(), l.clone()))
            .collect();
        user_relations.sort_by(|a, b| a.0.cmp(&b.0));
        let mut co_occurrence: Vec<(String, String, CoOccurrence)> = self
            .co_occurrence
            .iter()
            .map(|((a, b), c)| (a.clone(), b.clone(), c.clone()))
            .collect();
        co_occurrence.sort_by(|x, y| (&x.0, &x.1).cmp(&(&y.0, &y.1)));
        let mut term_frequency: Vec<(String, u32)> = self
            .term_frequency
            .iter()
            .map(|(t, n)| (t.clone(), *n))
            .collect();
        term_frequency.sort();
        RelationSnapshot {
            user_relations,
            co_occurrence,
            term_frequency,
            learning_config: Some(config.clone()),
            last_saved,
        }
    }

    pub fn from_snapshot(snapshot: RelationSnapshot) -> Self {
        Self {
            co_occurrence: snapshot
                .co_occurrence
                .into_iter()
                .map(|(a, b, c)| ((a, b), c))
                .collect(),
            term_frequency: snapshot.term_frequency.into_iter().collect(),
            relations: snapshot
                .user_relations
                .into_iter()
                .filter(|(_, l)| !l.is_empty())
                .collect(),
        }
    }
}

/// Persisted per-user state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RelationSnapshot {
    pub user_relations: Vec<(String, Vec<UserRelation>)>,
    pub co_occurrence: Vec<(String, String, CoOccurrence)>,
    pub term_frequency: Vec<(String, u32)>,
    /// Configuration in effect when saved. Informational: the configuration
    /// passed at construction always wins.
    pub learning_config: Option<LearningConfig>,
    pub last_saved: u64,
}
