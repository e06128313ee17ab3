//! Lexical diversification of generated text.
//!
//! Content words are replaced by synonyms from the lexical store when the
//! candidate passes the quality gate and the compatibility policy, and was
//! not used for the same word recently. Connective variation and register
//! rewriting run afterwards as fixed-table passes.
//!
//! Diversification never fails: a token whose lookup fails keeps its
//! surface, and if the text cannot be analysed at all it is returned as is.

mod candidates;
mod compat;
mod history;
mod phrases;
#[cfg(test)]
mod tests;

pub use candidates::{gather, Candidate};
pub use compat::{
    domains, tone_level, CompatibilityPolicy, Domain, HeuristicPolicy, Incompatibility,
};
pub use history::{Usage, UsageHistory};

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use tracing::{debug, debug_span, info, warn};

use crate::analysis::{Token, Tokenizer};
use crate::clock::{Clock, SystemClock};
use crate::learner::RelationshipLearner;
use crate::lexicon::{GlossOverlap, LexicalStore, Register, SharedStore};
use crate::settings::DiversifierConfig;

use phrases::{ConnectiveVariation, FormalityShift, PhrasePass};

/// Per-call options.
#[derive(Clone, Default)]
pub struct DiversifyContext {
    /// Target register for the ending rewrite; `None` leaves endings alone.
    pub register: Option<Register>,
    /// The user's learner. Candidates it relates to other words of the text
    /// rank higher. Skipped if the learner is busy.
    pub learner: Option<Arc<Mutex<RelationshipLearner>>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Substitution {
    pub original: String,
    pub replacement: String,
    pub score: f32,
    pub quality: u8,
    pub hops: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiversifyOutcome {
    pub text: String,
    pub substitutions: Vec<Substitution>,
    /// Connective and register rewrites.
    pub phrase_changes: usize,
}

impl DiversifyOutcome {
    fn unchanged(text: &str) -> Self {
        Self {
            text: text.to_string(),
            substitutions: Vec::new(),
            phrase_changes: 0,
        }
    }

    pub fn is_unchanged(&self) -> bool {
        self.substitutions.is_empty() && self.phrase_changes == 0
    }
}

pub struct Diversifier {
    store: SharedStore,
    tokenizer: Arc<dyn Tokenizer>,
    policy: Box<dyn CompatibilityPolicy>,
    config: DiversifierConfig,
    history: UsageHistory,
    clock: Arc<dyn Clock>,
    rng: Mutex<StdRng>,
    enhance_started: AtomicBool,
    enhance_handle: Mutex<Option<JoinHandle<()>>>,
}

impl Diversifier {
    pub fn new(
        store: SharedStore,
        tokenizer: Arc<dyn Tokenizer>,
        config: DiversifierConfig,
    ) -> Self {
        let history = UsageHistory::new(
            config.history_cap,
            config.anti_repetition_window_minutes * 60,
        );
        Self {
            store,
            tokenizer,
            policy: Box::new(HeuristicPolicy::new(config.tone_delta_max)),
            config,
            history,
            clock: Arc::new(SystemClock),
            rng: Mutex::new(StdRng::from_entropy()),
            enhance_started: AtomicBool::new(false),
            enhance_handle: Mutex::new(None),
        }
    }

    pub fn with_policy(mut self, policy: Box<dyn CompatibilityPolicy>) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Fix the random stream used by probabilistic acceptance and connective
    /// choice.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = Mutex::new(StdRng::seed_from_u64(seed));
        self
    }

    pub fn config(&self) -> &DiversifierConfig {
        &self.config
    }

    pub fn history(&self) -> &UsageHistory {
        &self.history
    }

    pub fn diversify_response(&self, text: &str, context: &DiversifyContext) -> String {
        self.diversify_detailed(text, context).text
    }

    pub fn diversify_detailed(&self, text: &str, context: &DiversifyContext) -> DiversifyOutcome {
        let _span = debug_span!("diversify", chars = text.chars().count()).entered();
        self.ensure_enhanced();

        let tokens = match self.tokenizer.tokenize(text) {
            Ok(tokens) => tokens,
            Err(e) => {
                warn!("diversify skipped, tokenizer failed: {e}");
                return DiversifyOutcome::unchanged(text);
            }
        };
        let Ok(store) = self.store.read() else {
            warn!("diversify skipped, lexical store lock poisoned");
            return DiversifyOutcome::unchanged(text);
        };

        let affinity = UserAffinity::read(context, &tokens);
        let now = self.clock.now();
        let mut replaced: HashSet<String> = HashSet::new();
        let mut substitutions = Vec::new();
        let mut out = String::with_capacity(text.len());
        let mut cursor = 0;

        for token in &tokens {
            // Tokens may drop whitespace; copy the gap from the original.
            let Some(offset) = text[cursor..].find(token.surface.as_str()) else {
                continue;
            };
            out.push_str(&text[cursor..cursor + offset]);
            cursor += offset + token.surface.len();

            let sub = self.substitute(&store, token, &affinity, &replaced, now);
            match sub {
                Some(sub) => {
                    replaced.insert(sub.original.clone());
                    replaced.insert(sub.replacement.clone());
                    out.push_str(&sub.replacement);
                    substitutions.push(sub);
                }
                None => out.push_str(&token.surface),
            }
        }
        out.push_str(&text[cursor..]);
        drop(store);

        let (text_out, phrase_changes) = self.run_phrase_passes(out, context);
        debug!(
            substitutions = substitutions.len(),
            phrase_changes, "diversified"
        );
        DiversifyOutcome {
            text: text_out,
            substitutions,
            phrase_changes,
        }
    }

    /// At most one substitution for `token`, or `None` to keep it.
    fn substitute(
        &self,
        store: &LexicalStore,
        token: &Token,
        affinity: &UserAffinity,
        replaced: &HashSet<String>,
        now: u64,
    ) -> Option<Substitution> {
        let word = token.surface.as_str();
        if !self.config.target_pos.contains(&token.pos) || replaced.contains(word) {
            return None;
        }
        let original = store.get_entry(word)?;

        let mut qualified: Vec<(Candidate, f32, u8)> = Vec::new();
        for cand in gather(store.graph(), word, &self.config) {
            if replaced.contains(&cand.word) {
                continue;
            }
            let Some(entry) = store.get_entry(&cand.word) else {
                continue;
            };
            let quality = store.quality(&cand.word);
            if !self.passes_quality(quality) {
                continue;
            }
            if let Err(why) = self.policy.check(original, entry) {
                debug!(word, candidate = %cand.word, ?why, "candidate incompatible");
                continue;
            }
            let bonus = affinity.strength(word, &cand.word) * self.config.user_graph_bonus;
            let score = cand.weight + bonus;
            qualified.push((cand, score, quality));
        }
        qualified.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

        let names: Vec<String> = qualified.iter().map(|(c, _, _)| c.word.clone()).collect();
        let chosen = self.history.choose(word, &names, now)?;
        let (cand, score, quality) = qualified.into_iter().find(|(c, _, _)| c.word == chosen)?;
        Some(Substitution {
            original: word.to_string(),
            replacement: cand.word,
            score,
            quality,
            hops: cand.hops,
        })
    }

    /// Reject below the lower gate, accept at the upper gate, otherwise
    /// accept with probability `quality / 100`.
    fn passes_quality(&self, quality: u8) -> bool {
        if quality < self.config.quality_reject_below {
            return false;
        }
        if quality >= self.config.quality_accept_at {
            return true;
        }
        let mut rng = self.rng.lock().unwrap_or_else(|e| e.into_inner());
        rng.gen::<f32>() < quality as f32 / 100.0
    }

    fn run_phrase_passes(&self, text: String, context: &DiversifyContext) -> (String, usize) {
        let mut passes: Vec<Box<dyn PhrasePass>> = Vec::new();
        if self.config.vary_connectives {
            passes.push(Box::new(ConnectiveVariation));
        }
        if let Some(register) = context.register {
            passes.push(Box::new(FormalityShift(register)));
        }
        let mut rng = self.rng.lock().unwrap_or_else(|e| e.into_inner());
        let mut pick = |n: usize| rng.gen_range(0..n.max(1));
        passes.into_iter().fold((text, 0), |(text, total), pass| {
            let (next, changed) = pass.apply(&text, &mut pick);
            (next, total + changed)
        })
    }

    /// Strengthen the store's synonym graph once per diversifier, on a
    /// background thread. Planning holds the read lock; only the merge takes
    /// the write lock.
    fn ensure_enhanced(&self) {
        if !self.config.auto_enhance || self.enhance_started.swap(true, Ordering::SeqCst) {
            return;
        }
        let store = Arc::clone(&self.store);
        let spawned = thread::Builder::new()
            .name("kotoba-enhance".into())
            .spawn(move || enhance_in_background(&store));
        match spawned {
            Ok(handle) => {
                *self.enhance_handle.lock().unwrap_or_else(|e| e.into_inner()) = Some(handle);
            }
            Err(e) => warn!("background enhancement not started: {e}"),
        }
    }

    /// Block until a background enhancement started by this diversifier has
    /// finished.
    pub fn wait_for_enhancement(&self) {
        let handle = self
            .enhance_handle
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if let Some(handle) = handle {
            if handle.join().is_err() {
                warn!("background enhancement panicked");
            }
        }
    }
}

fn enhance_in_background(store: &SharedStore) {
    let plan = {
        let Ok(guard) = store.read() else {
            return;
        };
        if guard.is_enhanced() {
            return;
        }
        guard.plan_enhancement(&GlossOverlap::new(guard.config().gloss_prefix_tokens))
    };
    let Ok(mut guard) = store.write() else {
        return;
    };
    if guard.is_enhanced() {
        return;
    }
    let summary = guard.apply_enhancement(plan);
    info!(
        added = summary.added_edges,
        grouped = summary.grouped_links,
        similar = summary.similarity_links,
        "background enhancement done"
    );
}

/// Learned relation strengths of the text's content words, read once per
/// call so the learner lock is not held during substitution.
#[derive(Debug, Default)]
struct UserAffinity {
    by_term: HashMap<String, HashMap<String, f32>>,
}

impl UserAffinity {
    /// Empty when there is no learner or it is busy.
    fn read(context: &DiversifyContext, tokens: &[Token]) -> Self {
        let mut affinity = Self::default();
        let Some(learner) = &context.learner else {
            return affinity;
        };
        let Ok(learner) = learner.try_lock() else {
            debug!("learner busy, no user-graph signal");
            return affinity;
        };
        for token in tokens.iter().filter(|t| t.pos.is_open_class()) {
            if affinity.by_term.contains_key(&token.surface) {
                continue;
            }
            let related = learner
                .get_user_relations(&token.surface)
                .into_iter()
                .map(|r| (r.related, r.strength))
                .collect();
            affinity.by_term.insert(token.surface.clone(), related);
        }
        affinity
    }

    /// Strongest relation to `candidate` from any other word of the text.
    fn strength(&self, word: &str, candidate: &str) -> f32 {
        self.by_term
            .iter()
            .filter(|(term, _)| term.as_str() != word)
            .filter_map(|(_, related)| related.get(candidate).copied())
            .fold(0.0, f32::max)
    }
}
