use std::sync::Arc;
use std::thread;

use proptest::prelude::*;

use super::*;
use crate::analysis::{AnalysisError, ScriptContextPredictor};
use crate::clock::ManualClock;
use crate::learner::{Collaborators, MemoryRelationStore};
use crate::lexicon::{DictionaryEntry, LexiconTokenizer, PartOfSpeech};
use crate::settings::{LearningConfig, LexiconConfig};

const T0: u64 = 1_700_000_000;

/// Every candidate passes the quality gate; no background work.
fn config() -> DiversifierConfig {
    let mut c = DiversifierConfig::default();
    c.quality_reject_below = 0;
    c.quality_accept_at = 0;
    c.auto_enhance = false;
    c
}

fn seed_store() -> SharedStore {
    LexicalStore::new(LexiconConfig::default()).into_shared()
}

fn tokenizer_for(store: &SharedStore) -> Arc<dyn Tokenizer> {
    Arc::new(LexiconTokenizer::from_store(&store.read().unwrap()))
}

struct Fixture {
    store: SharedStore,
    clock: Arc<ManualClock>,
    diversifier: Diversifier,
}

impl Fixture {
    fn new(config: DiversifierConfig) -> Self {
        Self::with_store(seed_store(), config)
    }

    fn with_store(store: SharedStore, config: DiversifierConfig) -> Self {
        let clock = Arc::new(ManualClock::new(T0));
        let diversifier = Diversifier::new(Arc::clone(&store), tokenizer_for(&store), config)
            .with_clock(clock.clone())
            .with_seed(7);
        Self {
            store,
            clock,
            diversifier,
        }
    }

    fn run(&self, text: &str) -> DiversifyOutcome {
        self.diversifier
            .diversify_detailed(text, &DiversifyContext::default())
    }
}

fn replacements(outcome: &DiversifyOutcome) -> Vec<&str> {
    outcome
        .substitutions
        .iter()
        .map(|s| s.replacement.as_str())
        .collect()
}

struct FailingTokenizer;

impl Tokenizer for FailingTokenizer {
    fn tokenize(&self, _text: &str) -> Result<Vec<Token>, AnalysisError> {
        Err(AnalysisError::Tokenize("dictionary missing".into()))
    }
}

struct RejectAll;

impl CompatibilityPolicy for RejectAll {
    fn check(
        &self,
        _original: &DictionaryEntry,
        _candidate: &DictionaryEntry,
    ) -> Result<(), Incompatibility> {
        Err(Incompatibility::Domain)
    }
}

// --- substitution ---

#[test]
fn test_substitutes_content_words() {
    let f = Fixture::new(config());
    let out = f.run("仕事が大切です");
    // 大事 and 重要 tie on weight; 大事 sorts first
    assert_eq!(out.text, "業務が大事です");
    assert_eq!(replacements(&out), vec!["業務", "大事"]);
    assert_eq!(out.substitutions[0].original, "仕事");
    assert_eq!(out.substitutions[0].hops, 1);
}

#[test]
fn test_whitespace_and_unknown_text_are_kept() {
    let f = Fixture::new(config());
    let out = f.run("  猫と 仕事、ok!\n");
    assert_eq!(out.text, "  猫と 業務、ok!\n");
}

#[test]
fn test_no_candidates_is_identity() {
    let f = Fixture::new(config());
    let text = "猫が鳴いた。犬も鳴いた。";
    let out = f.run(text);
    assert_eq!(out.text, text);
    assert!(out.is_unchanged());
}

#[test]
fn test_no_replacement_chains() {
    let f = Fixture::new(config());
    let out = f.run("大切で大事");
    // 大事 was introduced by the first substitution, so the second token stays
    assert_eq!(out.text, "大事で大事");
    assert_eq!(out.substitutions.len(), 1);

    let out = f.run("大切、大切");
    assert_eq!(out.substitutions.len(), 1);
}

#[test]
fn test_target_pos_filter() {
    let mut c = config();
    c.target_pos = vec![PartOfSpeech::Noun];
    let f = Fixture::new(c);
    assert_eq!(f.run("仕事が大切").text, "業務が大切");
}

#[test]
fn test_history_records_choice() {
    let f = Fixture::new(config());
    f.run("仕事");
    let recent = f.diversifier.history().recent("仕事");
    assert_eq!(
        recent,
        vec![Usage {
            chosen: "業務".to_string(),
            at: T0
        }]
    );
}

// --- anti-repetition ---

#[test]
fn test_anti_repetition_within_window() {
    let f = Fixture::new(config());
    let first = f.run("大切").text;
    f.clock.advance(60);
    let second = f.run("大切").text;
    assert_ne!(first, second);
    assert_eq!(first, "大事");
    assert_eq!(second, "重要");

    // all used: least recently used
    f.clock.advance(60);
    assert_eq!(f.run("大切").text, "大事");

    // window over: best candidate again
    f.clock.advance(31 * 60);
    assert_eq!(f.run("大切").text, "大事");
}

// --- gates ---

#[test]
fn test_quality_gate_bounds() {
    let f = Fixture::new(DiversifierConfig {
        auto_enhance: false,
        ..DiversifierConfig::default()
    });
    let d = &f.diversifier;
    assert!(!d.passes_quality(0));
    assert!(!d.passes_quality(29));
    assert!(d.passes_quality(70));
    assert!(d.passes_quality(100));
    let accepted = (0..2000).filter(|_| d.passes_quality(50)).count();
    assert!((800..1200).contains(&accepted), "accepted {accepted}");
}

#[test]
fn test_low_quality_everywhere_is_identity() {
    let mut c = config();
    c.quality_reject_below = 101;
    let f = Fixture::new(c);
    let text = "仕事が大切です";
    assert_eq!(f.run(text).text, text);
}

#[test]
fn test_hard_pair_never_substituted() {
    let f = Fixture::new(config());
    for _ in 0..5 {
        let out = f.run("嬉しい");
        assert_eq!(out.substitutions.len(), 1);
        assert_ne!(out.text, "楽しい");
        f.clock.advance(10);
    }
}

#[test]
fn test_tone_gate_blocks_distant_register() {
    let f = Fixture::new(config());
    let mut seen = Vec::new();
    for _ in 0..4 {
        seen.push(f.run("すごく").text);
        f.clock.advance(10);
    }
    // 非常に is two hops away and formal
    assert!(seen.iter().all(|w| w == "とても" || w == "大変"), "{seen:?}");
    assert!(seen.contains(&"大変".to_string()));
}

#[test]
fn test_domain_gate() {
    let entries = vec![
        DictionaryEntry::new("綺麗", Some("きれい".into()), vec!["pretty; clean".into()])
            .with_pos(&[PartOfSpeech::Adjective])
            .with_synonyms(&["清潔"]),
        DictionaryEntry::new("清潔", Some("せいけつ".into()), vec!["cleanliness".into()])
            .with_pos(&[PartOfSpeech::Noun])
            .with_synonyms(&["綺麗"]),
    ];
    let store = LexicalStore::from_entries(LexiconConfig::default(), entries).into_shared();
    let f = Fixture::with_store(store, config());
    assert!(f.run("綺麗").is_unchanged());
}

#[test]
fn test_policy_is_pluggable() {
    let store = seed_store();
    let d = Diversifier::new(Arc::clone(&store), tokenizer_for(&store), config())
        .with_policy(Box::new(RejectAll));
    let text = "仕事が大切です";
    assert_eq!(d.diversify_response(text, &DiversifyContext::default()), text);
}

// --- failures ---

#[test]
fn test_tokenizer_failure_returns_original() {
    let store = seed_store();
    let d = Diversifier::new(store, Arc::new(FailingTokenizer), config());
    let text = "しかし仕事が大切です";
    let out = d.diversify_detailed(text, &DiversifyContext::default());
    assert_eq!(out.text, text);
    assert!(out.is_unchanged());
}

#[test]
fn test_poisoned_store_returns_original() {
    let f = Fixture::new(config());
    let store = Arc::clone(&f.store);
    let _ = thread::spawn(move || {
        let _guard = store.write().unwrap();
        panic!("poison the store");
    })
    .join();
    assert!(f.store.is_poisoned());
    assert_eq!(f.run("仕事").text, "仕事");
}

// --- phrase passes ---

#[test]
fn test_phrase_passes_run_after_substitution() {
    let mut c = config();
    c.vary_connectives = true;
    let f = Fixture::new(c);
    let ctx = DiversifyContext {
        register: Some(Register::Formal),
        ..Default::default()
    };
    let out = f.diversifier.diversify_detailed("しかし仕事だよ", &ctx);
    assert!(!out.text.starts_with("しかし"), "{}", out.text);
    assert!(out.text.ends_with("業務です"), "{}", out.text);
    assert_eq!(out.phrase_changes, 2);
    assert_eq!(out.substitutions.len(), 1);
}

#[test]
fn test_default_config_keeps_text_without_candidates() {
    let f = Fixture::new(DiversifierConfig::default());
    let text = "しかしOK。そしてGO!";
    assert_eq!(f.run(text).text, text);
    f.diversifier.wait_for_enhancement();
    let out = f.run(text);
    assert_eq!(out.text, text);
    assert!(out.is_unchanged());
}

#[test]
fn test_connectives_left_alone_when_disabled() {
    let f = Fixture::new(config());
    assert_eq!(f.run("しかし猫").text, "しかし猫");
}

// --- user graph ---

fn learner_relating(
    store: &SharedStore,
    term: &str,
    related: &str,
) -> Arc<Mutex<RelationshipLearner>> {
    let deps = Collaborators {
        tokenizer: tokenizer_for(store),
        predictor: Some(Arc::new(ScriptContextPredictor)),
        store: Arc::new(MemoryRelationStore::new()),
        clock: Arc::new(ManualClock::new(T0)),
    };
    let mut learner = RelationshipLearner::new("alice", LearningConfig::default(), deps);
    for _ in 0..2 {
        learner.learn_from_conversation(term, &[], related);
    }
    assert!(learner.relation_strength(term, related).is_some());
    Arc::new(Mutex::new(learner))
}

#[test]
fn test_user_graph_bonus_reorders_candidates() {
    let mut c = config();
    c.target_pos = vec![PartOfSpeech::Adjective];
    let f = Fixture::new(c);
    let learner = learner_relating(&f.store, "仕事", "重要");
    let ctx = DiversifyContext {
        register: None,
        learner: Some(Arc::clone(&learner)),
    };
    let out = f.diversifier.diversify_detailed("仕事が大切", &ctx);
    assert_eq!(out.text, "仕事が重要");
    assert!(out.substitutions[0].score > 1.0);
}

#[test]
fn test_busy_learner_gives_no_bonus() {
    let mut c = config();
    c.target_pos = vec![PartOfSpeech::Adjective];
    let f = Fixture::new(c);
    let learner = learner_relating(&f.store, "仕事", "重要");
    let ctx = DiversifyContext {
        register: None,
        learner: Some(Arc::clone(&learner)),
    };
    let _busy = learner.lock().unwrap();
    assert_eq!(f.diversifier.diversify_response("仕事が大切", &ctx), "仕事が大事");
}

// --- background enhancement ---

#[test]
fn test_enhancement_runs_once_in_background() {
    let mut c = config();
    c.auto_enhance = true;
    let f = Fixture::new(c);
    assert!(!f.store.read().unwrap().is_enhanced());
    f.run("猫");
    f.diversifier.wait_for_enhancement();
    let store = f.store.read().unwrap();
    assert!(store.is_enhanced());
    assert!(store.graph().is_symmetric());
    drop(store);
    f.run("猫");
    f.diversifier.wait_for_enhancement();
}

#[test]
fn test_enhancement_disabled() {
    let f = Fixture::new(config());
    f.run("猫");
    f.diversifier.wait_for_enhancement();
    assert!(!f.store.read().unwrap().is_enhanced());
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn test_rejecting_everything_preserves_any_text(text in "\\PC{0,40}") {
        let mut c = config();
        c.quality_reject_below = 101;
        let f = Fixture::new(c);
        prop_assert_eq!(f.run(&text).text, text);
    }
}
