//! Online per-user term-relationship learning.
//!
//! Each conversation turn records co-occurrences between keywords of the
//! input and of the response (and of recent history). Pairs seen often
//! enough, with enough contextual strength, are promoted into relations that
//! are smoothed by EMA, capped per term, and forgotten by daily decay.
//!
//! Learning never fails: collaborator errors zero out that signal and the
//! call carries on with whatever succeeded.

mod autosave;
mod persistence;
mod registry;
mod state;
mod strength;
#[cfg(test)]
mod tests;

pub use autosave::{AutosaveSchedule, AutosaveTimer, TickReport};
pub use persistence::{
    decode_snapshot, encode_snapshot, FileRelationStore, MemoryRelationStore, PersistenceError,
    RelationStore,
};
pub use registry::LearnerRegistry;
pub use state::{pair_key, CoOccurrence, RelationSnapshot, UserRelation};
pub use strength::CHI_SQUARE_CRITICAL;

use std::collections::HashSet;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, debug_span, warn};

use crate::analysis::{ContextPredictor, Tokenizer};
use crate::clock::Clock;
use crate::settings::LearningConfig;
use crate::unicode::truncate_chars;

use state::LearnerState;
use strength::Counts;

/// Collaborators shared by every learner of a registry.
#[derive(Clone)]
pub struct Collaborators {
    pub tokenizer: Arc<dyn Tokenizer>,
    pub predictor: Option<Arc<dyn ContextPredictor>>,
    pub store: Arc<dyn RelationStore>,
    pub clock: Arc<dyn Clock>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LearnOutcome {
    pub keywords: usize,
    pub pairs_recorded: usize,
    pub promoted: usize,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DecayOutcome {
    pub decayed: usize,
    pub removed: usize,
    pub terms_removed: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct LearnerStats {
    pub user_id: String,
    pub relations: usize,
    pub terms_with_relations: usize,
    pub pairs: usize,
    pub known_terms: usize,
    pub dirty: bool,
    pub last_saved: u64,
}

pub struct RelationshipLearner {
    user_id: String,
    config: LearningConfig,
    deps: Collaborators,
    state: LearnerState,
    dirty: bool,
    last_saved: u64,
}

impl RelationshipLearner {
    /// Load the user's snapshot, if any. A failed load starts from empty
    /// state. The given config always takes precedence over the one stored
    /// in the snapshot.
    pub fn new(user_id: &str, config: LearningConfig, deps: Collaborators) -> Self {
        let (state, last_saved) = match deps.store.load(user_id) {
            Ok(Some(snapshot)) => {
                if snapshot
                    .learning_config
                    .as_ref()
                    .is_some_and(|stored| *stored != config)
                {
                    debug!(user_id, "stored learning config differs, using current");
                }
                let last_saved = snapshot.last_saved;
                (LearnerState::from_snapshot(snapshot), last_saved)
            }
            Ok(None) => (LearnerState::default(), 0),
            Err(e) => {
                warn!(user_id, "relation snapshot unreadable, starting empty: {e}");
                (LearnerState::default(), 0)
            }
        };
        Self {
            user_id: user_id.to_string(),
            config,
            deps,
            state,
            dirty: false,
            last_saved,
        }
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn config(&self) -> &LearningConfig {
        &self.config
    }

    /// Open-class keywords of `text`, deduplicated in order of appearance.
    /// A tokenizer failure yields no keywords.
    fn keywords(&self, text: &str) -> Vec<String> {
        let tokens = match self.deps.tokenizer.tokenize(text) {
            Ok(tokens) => tokens,
            Err(e) => {
                debug!(user_id = %self.user_id, "keyword extraction skipped: {e}");
                return Vec::new();
            }
        };
        let mut seen = HashSet::new();
        tokens
            .into_iter()
            .filter(|t| t.pos.is_open_class() && !t.surface.trim().is_empty())
            .map(|t| t.surface)
            .filter(|s| seen.insert(s.clone()))
            .collect()
    }

    fn count_terms(&mut self, terms: &[String]) {
        for t in terms {
            *self.state.term_frequency.entry(t.clone()).or_insert(0) += 1;
        }
    }

    /// Increment the pair counts of `left × right`. Returns pairs recorded.
    fn record_pairs(&mut self, left: &[String], right: &[String], snippet: &str) -> usize {
        let mut recorded = 0;
        let mut done = HashSet::new();
        for a in left {
            for b in right {
                if a == b {
                    continue;
                }
                let key = pair_key(a, b);
                if !done.insert(key.clone()) {
                    continue;
                }
                let entry = self.state.co_occurrence.entry(key).or_default();
                entry.count += 1;
                entry.push_context(snippet, self.config.max_contexts);
                recorded += 1;
            }
        }
        recorded
    }

    pub fn learn_from_conversation(
        &mut self,
        input: &str,
        history: &[String],
        response: &str,
    ) -> LearnOutcome {
        let _span = debug_span!("learn", user_id = %self.user_id).entered();
        let input_kw = self.keywords(input);
        let response_kw = self.keywords(response);
        let history_kw: Vec<Vec<String>> = history.iter().map(|h| self.keywords(h)).collect();

        self.count_terms(&input_kw);
        self.count_terms(&response_kw);
        for kw in &history_kw {
            self.count_terms(kw);
        }

        let snippet = truncate_chars(input, self.config.context_snippet_chars).to_string();
        let mut outcome = LearnOutcome {
            keywords: input_kw.len() + response_kw.len(),
            ..Default::default()
        };
        outcome.pairs_recorded += self.record_pairs(&input_kw, &response_kw, &snippet);
        for kw in &history_kw {
            outcome.pairs_recorded += self.record_pairs(&input_kw, kw, &snippet);
        }

        let text = format!("{input} {response}");
        let predictions = strength::predict_terms(
            self.deps.predictor.as_deref(),
            input_kw.iter().chain(&response_kw).map(|s| s.as_str()),
        );
        let now = self.deps.clock.now();
        for a in &input_kw {
            for b in &response_kw {
                if a == b {
                    continue;
                }
                let proximity = strength::proximity(&text, a, b, self.config.proximity_window);
                let semantic = strength::semantic_similarity(a, b, &predictions, &self.config);
                let cosine = strength::relation_cosine(&self.state.relations, a, b);
                let observed = strength::combine(proximity, semantic, cosine, &self.config);
                if self.consider_promotion(a, b, observed, now) {
                    outcome.promoted += 1;
                }
            }
        }

        self.dirty |= outcome.pairs_recorded > 0;
        debug!(
            keywords = outcome.keywords,
            pairs = outcome.pairs_recorded,
            promoted = outcome.promoted,
            "turn learned"
        );
        self.save_logged();
        outcome
    }

    /// Fold `observed` into the pair's running strength and promote or
    /// reinforce the relation (both directions) if the gate is met.
    fn consider_promotion(&mut self, a: &str, b: &str, observed: f32, now: u64) -> bool {
        let key = pair_key(a, b);
        let Some(pair) = self.state.co_occurrence.get_mut(&key) else {
            return false;
        };
        pair.observe_strength(observed);
        let count = pair.count;
        let aggregated = pair.mean_strength;
        if count < self.config.min_co_occurrence || aggregated < self.config.strength_threshold {
            return false;
        }
        if self.config.require_significance && !self.is_significant(a, b) {
            return false;
        }
        self.upsert(a, b, aggregated, observed, count, now);
        self.upsert(b, a, aggregated, observed, count, now);
        true
    }

    fn upsert(
        &mut self,
        term: &str,
        related: &str,
        initial: f32,
        observed: f32,
        count: u32,
        now: u64,
    ) {
        let lr = self.config.learning_rate;
        match self.state.relation_mut(term, related) {
            Some(rel) => rel.reinforce(observed, lr, count, now),
            None => {
                let relation = UserRelation::new(related, initial, count, now);
                self.state
                    .insert_relation(term, relation, self.config.max_relations_per_term);
            }
        }
    }

    /// Nudge `term`'s relations to each keyword of `context_text` by
    /// `(rating − 0.5)·2·learning_rate`. Pairs below the co-occurrence
    /// minimum are left alone. Returns the number of relations touched.
    pub fn learn_from_feedback(&mut self, term: &str, rating: f32, context_text: &str) -> usize {
        let rating = if rating.is_finite() {
            rating.clamp(0.0, 1.0)
        } else {
            0.5
        };
        let delta = (rating - 0.5) * 2.0 * self.config.learning_rate;
        let now = self.deps.clock.now();
        let mut touched = 0;
        for kw in self.keywords(context_text) {
            if kw == term {
                continue;
            }
            let pair = self.state.co_occurrence.get(&pair_key(term, &kw));
            let Some((count, mean)) = pair.map(|p| (p.count, p.mean_strength)) else {
                continue;
            };
            if count < self.config.min_co_occurrence {
                continue;
            }
            for (from, to) in [(term, kw.as_str()), (kw.as_str(), term)] {
                match self.state.relation_mut(from, to) {
                    Some(rel) => rel.nudge(delta, now),
                    None => {
                        let mut rel = UserRelation::new(to, mean, count, now);
                        rel.nudge(delta, now);
                        self.state
                            .insert_relation(from, rel, self.config.max_relations_per_term);
                    }
                }
            }
            touched += 1;
        }
        if touched > 0 {
            self.dirty = true;
            self.save_logged();
        }
        touched
    }

    /// Decay every relation for the time elapsed since it was last updated
    /// or decayed; drop relations that fall below the prune threshold and
    /// terms left without relations.
    pub fn apply_decay(&mut self) -> DecayOutcome {
        let now = self.deps.clock.now();
        let factor = self.config.decay_factor;
        let prune_below = self.config.prune_below;
        let mut outcome = DecayOutcome::default();
        for list in self.state.relations.values_mut() {
            for rel in list.iter_mut() {
                rel.decay(factor, now);
                outcome.decayed += 1;
            }
            let before = list.len();
            list.retain(|r| r.strength >= prune_below);
            outcome.removed += before - list.len();
        }
        let before = self.state.relations.len();
        self.state.relations.retain(|_, list| !list.is_empty());
        outcome.terms_removed = before - self.state.relations.len();
        if outcome.decayed > 0 {
            self.dirty = true;
        }
        debug!(
            user_id = %self.user_id,
            removed = outcome.removed,
            terms_removed = outcome.terms_removed,
            "decay applied"
        );
        outcome
    }

    // --- queries ---

    /// Relations of `term`, strongest first.
    pub fn get_user_relations(&self, term: &str) -> Vec<UserRelation> {
        let mut list = self.state.relations.get(term).cloned().unwrap_or_default();
        list.sort_by(|a, b| {
            b.strength
                .partial_cmp(&a.strength)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.related.cmp(&b.related))
        });
        list
    }

    pub fn relation_strength(&self, term: &str, related: &str) -> Option<f32> {
        self.state.relation(term, related).map(|r| r.strength)
    }

    pub fn co_occurrence(&self, a: &str, b: &str) -> Option<&CoOccurrence> {
        self.state.co_occurrence.get(&pair_key(a, b))
    }

    pub fn co_occurrence_count(&self, a: &str, b: &str) -> u32 {
        self.state.co_count(a, b)
    }

    fn counts(&self, a: &str, b: &str) -> Counts {
        let tf = |t: &str| self.state.term_frequency.get(t).copied().unwrap_or(0);
        Counts {
            pair: self.state.co_count(a, b),
            term_a: tf(a),
            term_b: tf(b),
            total_pairs: self
                .state
                .co_occurrence
                .values()
                .map(|c| c.count as u64)
                .sum(),
            total_terms: self.state.term_frequency.values().map(|n| *n as u64).sum(),
        }
    }

    pub fn pmi(&self, a: &str, b: &str) -> Option<f64> {
        strength::pmi(&self.counts(a, b))
    }

    pub fn chi_square(&self, a: &str, b: &str) -> Option<f64> {
        strength::chi_square(&self.counts(a, b))
    }

    pub fn is_significant(&self, a: &str, b: &str) -> bool {
        strength::is_significant(&self.counts(a, b))
    }

    pub fn stats(&self) -> LearnerStats {
        LearnerStats {
            user_id: self.user_id.clone(),
            relations: self.state.relation_count(),
            terms_with_relations: self.state.relations.len(),
            pairs: self.state.co_occurrence.len(),
            known_terms: self.state.term_frequency.len(),
            dirty: self.dirty,
            last_saved: self.last_saved,
        }
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    // --- persistence ---

    pub fn export_snapshot(&self) -> RelationSnapshot {
        self.state.to_snapshot(&self.config, self.last_saved)
    }

    /// Persist the current state. On failure the in-memory state is kept
    /// and stays dirty so the next save retries.
    pub fn save(&mut self) -> Result<(), PersistenceError> {
        let now = self.deps.clock.now();
        let snapshot = self.state.to_snapshot(&self.config, now);
        self.deps.store.save(&self.user_id, &snapshot)?;
        self.last_saved = now;
        self.dirty = false;
        Ok(())
    }

    pub fn save_if_dirty(&mut self) -> Result<bool, PersistenceError> {
        if !self.dirty {
            return Ok(false);
        }
        self.save().map(|()| true)
    }

    fn save_logged(&mut self) {
        if let Err(e) = self.save_if_dirty() {
            warn!(user_id = %self.user_id, "relation save failed, will retry: {e}");
        }
    }
}
