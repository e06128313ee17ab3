use std::sync::Arc;
use std::time::Duration;

use proptest::prelude::*;

use super::*;
use crate::analysis::{
    AnalysisError, ContextPrediction, ContextPredictor, ScriptContextPredictor, Token, Tokenizer,
};
use crate::clock::{ManualClock, SECS_PER_DAY};
use crate::lexicon::{LexiconTokenizer, PartOfSpeech};

const T0: u64 = 1_700_000_000;

fn tokenizer() -> Arc<dyn Tokenizer> {
    Arc::new(LexiconTokenizer::from_words(
        [
            ("猫", PartOfSpeech::Noun),
            ("犬", PartOfSpeech::Noun),
            ("友達", PartOfSpeech::Noun),
            ("天気", PartOfSpeech::Noun),
            ("好き", PartOfSpeech::Adjective),
            ("いい", PartOfSpeech::Adjective),
        ]
        .map(|(w, p)| (w.to_string(), p)),
    ))
}

struct FailingTokenizer;

impl Tokenizer for FailingTokenizer {
    fn tokenize(&self, _text: &str) -> Result<Vec<Token>, AnalysisError> {
        Err(AnalysisError::Unavailable("analyser offline".into()))
    }
}

struct FailingPredictor;

impl ContextPredictor for FailingPredictor {
    fn predict_context(&self, _text: &str) -> Result<ContextPrediction, AnalysisError> {
        Err(AnalysisError::Predict("model not loaded".into()))
    }
}

struct Fixture {
    clock: Arc<ManualClock>,
    store: Arc<MemoryRelationStore>,
    deps: Collaborators,
}

impl Fixture {
    fn new() -> Self {
        let clock = Arc::new(ManualClock::new(T0));
        let store = Arc::new(MemoryRelationStore::new());
        let deps = Collaborators {
            tokenizer: tokenizer(),
            predictor: Some(Arc::new(ScriptContextPredictor)),
            store: store.clone(),
            clock: clock.clone(),
        };
        Self { clock, store, deps }
    }

    fn learner(&self) -> RelationshipLearner {
        self.learner_with(LearningConfig::default())
    }

    fn learner_with(&self, config: LearningConfig) -> RelationshipLearner {
        RelationshipLearner::new("alice", config, self.deps.clone())
    }
}

fn cat_turn(learner: &mut RelationshipLearner) -> LearnOutcome {
    learner.learn_from_conversation("猫が好きです", &[], "犬も好きです")
}

fn related(learner: &RelationshipLearner, term: &str) -> Vec<String> {
    learner
        .get_user_relations(term)
        .into_iter()
        .map(|r| r.related)
        .collect()
}

// --- promotion ---

#[test]
fn test_scenario_promotes_after_two_turns() {
    let f = Fixture::new();
    let mut learner = f.learner();

    let first = cat_turn(&mut learner);
    assert_eq!(first.keywords, 4);
    assert_eq!(first.promoted, 0);
    assert!(learner.get_user_relations("猫").is_empty());
    assert_eq!(learner.co_occurrence_count("猫", "好き"), 1);

    cat_turn(&mut learner);
    assert_eq!(learner.co_occurrence_count("好き", "猫"), 2);
    assert!(related(&learner, "猫").contains(&"好き".to_string()));
    assert!(related(&learner, "好き").contains(&"猫".to_string()));
    // proximity 0.9 · 0.5 + predictor agreement 0.5 · 0.3
    let s = learner.relation_strength("猫", "好き").unwrap();
    assert!((s - 0.6).abs() < 1e-5, "strength {s}");
}

#[test]
fn test_promotion_gate_count() {
    let f = Fixture::new();
    let mut config = LearningConfig::default();
    config.min_co_occurrence = 3;
    let mut learner = f.learner_with(config);
    cat_turn(&mut learner);
    cat_turn(&mut learner);
    assert_eq!(learner.stats().relations, 0);
    cat_turn(&mut learner);
    assert!(learner.relation_strength("猫", "好き").is_some());
}

#[test]
fn test_promotion_gate_strength() {
    let f = Fixture::new();
    let mut config = LearningConfig::default();
    config.strength_threshold = 0.9;
    let mut learner = f.learner_with(config);
    for _ in 0..5 {
        cat_turn(&mut learner);
    }
    assert_eq!(learner.co_occurrence_count("猫", "好き"), 5);
    assert_eq!(learner.stats().relations, 0);
}

#[test]
fn test_strong_relations_are_backed_by_counts() {
    let f = Fixture::new();
    let mut learner = f.learner();
    cat_turn(&mut learner);
    learner.learn_from_conversation("天気がいい", &[], "猫も好き");
    cat_turn(&mut learner);
    let config = learner.config().clone();
    for term in ["猫", "好き", "犬", "天気", "いい"] {
        for rel in learner.get_user_relations(term) {
            if rel.strength >= config.strength_threshold {
                assert!(learner.co_occurrence_count(term, &rel.related) >= config.min_co_occurrence);
            }
        }
    }
}

#[test]
fn test_history_pairs_are_counted() {
    let f = Fixture::new();
    let mut learner = f.learner();
    let outcome = learner.learn_from_conversation(
        "猫が好き",
        &["友達は犬が好き".to_string()],
        "天気",
    );
    // 猫×天気, 好き×天気, then 猫×{友達, 犬, 好き} and 好き×{友達, 犬}
    assert_eq!(outcome.pairs_recorded, 7);
    assert_eq!(learner.co_occurrence_count("猫", "友達"), 1);
    assert_eq!(learner.co_occurrence_count("好き", "好き"), 0);
}

#[test]
fn test_per_term_cap() {
    let f = Fixture::new();
    let mut config = LearningConfig::default();
    config.max_relations_per_term = 1;
    let mut learner = f.learner_with(config);
    cat_turn(&mut learner);
    cat_turn(&mut learner);
    assert_eq!(learner.get_user_relations("猫").len(), 1);
    // 好き (0.6) outranks 犬 (0.5)
    assert_eq!(related(&learner, "猫"), vec!["好き"]);
}

#[test]
fn test_contexts_are_recorded() {
    let f = Fixture::new();
    let mut learner = f.learner();
    cat_turn(&mut learner);
    cat_turn(&mut learner);
    let pair = learner.co_occurrence("猫", "好き").unwrap();
    assert_eq!(pair.contexts, vec!["猫が好きです"]);
}

// --- feedback ---

#[test]
fn test_feedback_nudges_existing_relation() {
    let f = Fixture::new();
    let mut learner = f.learner();
    cat_turn(&mut learner);
    cat_turn(&mut learner);
    let before = learner.relation_strength("猫", "好き").unwrap();
    assert_eq!(learner.learn_from_feedback("猫", 1.0, "好きです"), 1);
    let after = learner.relation_strength("猫", "好き").unwrap();
    assert!((after - (before + 0.1)).abs() < 1e-5);
    assert!((learner.relation_strength("好き", "猫").unwrap() - after).abs() < 1e-5);
    learner.learn_from_feedback("猫", 0.5, "好きです");
    assert!((learner.relation_strength("猫", "好き").unwrap() - after).abs() < 1e-6);
}

#[test]
fn test_feedback_respects_gate() {
    let f = Fixture::new();
    let mut learner = f.learner();
    cat_turn(&mut learner);
    assert_eq!(learner.learn_from_feedback("猫", 1.0, "好きです"), 0);
    assert_eq!(learner.relation_strength("猫", "好き"), None);
}

#[test]
fn test_feedback_saturates() {
    let f = Fixture::new();
    let mut learner = f.learner();
    cat_turn(&mut learner);
    cat_turn(&mut learner);
    for _ in 0..30 {
        learner.learn_from_feedback("猫", 1.0, "好き");
    }
    assert_eq!(learner.relation_strength("猫", "好き"), Some(1.0));
    for _ in 0..30 {
        learner.learn_from_feedback("猫", 0.0, "好き");
    }
    assert_eq!(learner.relation_strength("猫", "好き"), Some(0.0));
}

proptest! {
    #[test]
    fn test_feedback_keeps_strength_in_unit_interval(
        ratings in prop::collection::vec(prop_oneof![0.0f32..=1.0, Just(0.0), Just(1.0), Just(7.5), Just(-3.0)], 1..60)
    ) {
        let f = Fixture::new();
        let mut learner = f.learner();
        cat_turn(&mut learner);
        cat_turn(&mut learner);
        for rating in ratings {
            learner.learn_from_feedback("猫", rating, "好き");
            let s = learner.relation_strength("猫", "好き").unwrap();
            prop_assert!((0.0..=1.0).contains(&s));
        }
    }

    #[test]
    fn test_decay_law(days in 0u64..40, split in 0u64..40) {
        let f = Fixture::new();
        let mut learner = f.learner();
        cat_turn(&mut learner);
        cat_turn(&mut learner);
        let s0 = learner.relation_strength("猫", "好き").unwrap();
        let first = split.min(days);
        f.clock.advance_days(first);
        learner.apply_decay();
        f.clock.advance_days(days - first);
        learner.apply_decay();
        let expected = s0 as f64 * 0.95f64.powf(days as f64);
        match learner.relation_strength("猫", "好き") {
            Some(s) => prop_assert!((s as f64 - expected).abs() < 1e-5),
            None => prop_assert!(expected < 0.1 + 1e-5),
        }
    }
}

// --- decay ---

#[test]
fn test_decay_prunes_and_removes_terms() {
    let f = Fixture::new();
    let mut learner = f.learner();
    cat_turn(&mut learner);
    cat_turn(&mut learner);
    f.clock.advance_days(3);
    let outcome = learner.apply_decay();
    assert_eq!(outcome.removed, 0);
    let s = learner.relation_strength("猫", "好き").unwrap();
    assert!((s - 0.6 * 0.95f32.powi(3)).abs() < 1e-5);

    f.clock.advance_days(60);
    let outcome = learner.apply_decay();
    assert!(outcome.removed > 0);
    assert!(outcome.terms_removed > 0);
    assert_eq!(learner.stats().relations, 0);
    assert!(learner.get_user_relations("猫").is_empty());
    // raw signal is kept
    assert_eq!(learner.co_occurrence_count("猫", "好き"), 2);
}

#[test]
fn test_reinforcement_resets_decay_anchor() {
    let f = Fixture::new();
    let mut learner = f.learner();
    cat_turn(&mut learner);
    cat_turn(&mut learner);
    f.clock.advance_days(10);
    cat_turn(&mut learner);
    learner.apply_decay();
    // updated today, so nothing decayed
    let s = learner.relation_strength("猫", "好き").unwrap();
    assert!(s > 0.55);
}

// --- collaborator failures ---

#[test]
fn test_tokenizer_failure_is_zero_signal() {
    let f = Fixture::new();
    let deps = Collaborators {
        tokenizer: Arc::new(FailingTokenizer),
        ..f.deps.clone()
    };
    let mut learner = RelationshipLearner::new("alice", LearningConfig::default(), deps);
    let outcome = cat_turn(&mut learner);
    assert_eq!(outcome, LearnOutcome::default());
    assert_eq!(learner.learn_from_feedback("猫", 1.0, "好き"), 0);
    assert_eq!(learner.stats().pairs, 0);
}

#[test]
fn test_predictor_failure_still_learns() {
    let f = Fixture::new();
    let deps = Collaborators {
        predictor: Some(Arc::new(FailingPredictor)),
        ..f.deps.clone()
    };
    let mut learner = RelationshipLearner::new("alice", LearningConfig::default(), deps);
    cat_turn(&mut learner);
    cat_turn(&mut learner);
    let s = learner.relation_strength("猫", "好き").unwrap();
    assert!((s - 0.45).abs() < 1e-5);
}

// --- diagnostics ---

#[test]
fn test_pmi_available_for_observed_pairs() {
    let f = Fixture::new();
    let mut learner = f.learner();
    cat_turn(&mut learner);
    learner.learn_from_conversation("天気がいい", &[], "友達");
    assert!(learner.pmi("猫", "好き").is_some());
    assert!(learner.chi_square("猫", "好き").is_some());
    assert_eq!(learner.pmi("猫", "天気"), None);
}

#[test]
fn test_significance_filter_blocks_promotion() {
    let f = Fixture::new();
    let mut config = LearningConfig::default();
    config.require_significance = true;
    let mut learner = f.learner_with(config);
    cat_turn(&mut learner);
    cat_turn(&mut learner);
    // above chance but chi² ≈ 2.08, under the critical value
    assert!(learner.pmi("猫", "好き").unwrap() > 0.0);
    assert!(learner.chi_square("猫", "好き").unwrap() < CHI_SQUARE_CRITICAL);
    assert!(!learner.is_significant("猫", "好き"));
    assert!(learner.relation_strength("猫", "好き").is_none());
}

#[test]
fn test_significance_filter_admits_significant_pairs() {
    let f = Fixture::new();
    let mut config = LearningConfig::default();
    config.require_significance = true;
    let mut learner = f.learner_with(config);
    for _ in 0..2 {
        learner.learn_from_conversation("猫", &[], "犬");
    }
    // chi² = 9n/4 = 4.5 for n = 2
    assert!(learner.is_significant("猫", "犬"));
    assert!(learner.relation_strength("猫", "犬").is_some());
}

// --- persistence ---

#[test]
fn test_state_survives_reload() {
    let f = Fixture::new();
    let mut learner = f.learner();
    cat_turn(&mut learner);
    cat_turn(&mut learner);
    assert!(!learner.is_dirty());
    let snapshot = f.store.snapshot("alice").unwrap();
    assert_eq!(snapshot.last_saved, T0);
    assert_eq!(snapshot.learning_config.as_ref(), Some(learner.config()));

    let reloaded = f.learner();
    assert_eq!(reloaded.get_user_relations("猫"), learner.get_user_relations("猫"));
    assert_eq!(reloaded.co_occurrence_count("猫", "好き"), 2);
    assert_eq!(reloaded.export_snapshot(), learner.export_snapshot());
}

#[test]
fn test_save_failure_keeps_state_and_retries() {
    let f = Fixture::new();
    f.store.set_fail_saves(true);
    let mut learner = f.learner();
    cat_turn(&mut learner);
    cat_turn(&mut learner);
    assert!(learner.is_dirty());
    assert!(learner.relation_strength("猫", "好き").is_some());
    assert!(f.store.snapshot("alice").is_none());

    f.store.set_fail_saves(false);
    assert!(learner.save_if_dirty().unwrap());
    assert!(!learner.is_dirty());
    assert!(f.store.snapshot("alice").is_some());
}

#[test]
fn test_current_config_wins_over_snapshot() {
    let f = Fixture::new();
    let mut learner = f.learner();
    cat_turn(&mut learner);
    let mut config = LearningConfig::default();
    config.min_co_occurrence = 5;
    let reloaded = f.learner_with(config.clone());
    assert_eq!(reloaded.config(), &config);
    assert_eq!(reloaded.co_occurrence_count("猫", "好き"), 1);
}

#[test]
fn test_file_store_roundtrip_through_learner() {
    let dir = tempfile::tempdir().unwrap();
    let f = Fixture::new();
    let deps = Collaborators {
        store: Arc::new(FileRelationStore::new(dir.path())),
        ..f.deps.clone()
    };
    let mut learner = RelationshipLearner::new("user:42", LearningConfig::default(), deps.clone());
    cat_turn(&mut learner);
    cat_turn(&mut learner);
    assert!(dir.path().join("user_3a42.lxur").exists());
    let reloaded = RelationshipLearner::new("user:42", LearningConfig::default(), deps);
    assert_eq!(reloaded.stats().relations, learner.stats().relations);
}

// --- registry & autosave ---

#[test]
fn test_registry_returns_same_learner() {
    let f = Fixture::new();
    let registry = LearnerRegistry::new(LearningConfig::default(), f.deps.clone());
    let a = registry.get_or_create("alice");
    let b = registry.get_or_create("alice");
    assert!(Arc::ptr_eq(&a, &b));
    registry.get_or_create("bob");
    assert_eq!(registry.user_ids(), vec!["alice", "bob"]);
    assert!(registry.get("carol").is_none());
}

#[test]
fn test_registry_users_are_independent() {
    let f = Fixture::new();
    let registry = LearnerRegistry::new(LearningConfig::default(), f.deps.clone());
    {
        let alice = registry.get_or_create("alice");
        let mut alice = alice.lock().unwrap();
        cat_turn(&mut alice);
        cat_turn(&mut alice);
    }
    let bob = registry.get_or_create("bob");
    assert!(bob.lock().unwrap().get_user_relations("猫").is_empty());
    assert!(registry.remove("bob").unwrap());
    assert!(!registry.remove("bob").unwrap());
}

#[test]
fn test_schedule_saves_on_interval_and_decays_daily() {
    let f = Fixture::new();
    f.store.set_fail_saves(true);
    let registry = LearnerRegistry::new(LearningConfig::default(), f.deps.clone());
    {
        let alice = registry.get_or_create("alice");
        let mut alice = alice.lock().unwrap();
        cat_turn(&mut alice);
        cat_turn(&mut alice);
    }
    let mut schedule = AutosaveSchedule::new(300, T0);

    assert_eq!(schedule.tick(&registry, T0 + 100), TickReport::default());
    let report = schedule.tick(&registry, T0 + 300);
    assert_eq!((report.saved, report.failed), (0, 1));

    f.store.set_fail_saves(false);
    let report = schedule.tick(&registry, T0 + 600);
    assert_eq!((report.saved, report.failed), (1, 0));
    assert!(!report.decayed);

    f.clock.advance_days(60);
    let report = schedule.tick(&registry, T0 + 60 * SECS_PER_DAY);
    assert!(report.decayed);
    assert!(report.removed > 0);
    assert_eq!(report.saved, 1);
}

#[test]
fn test_timer_stops_and_flushes() {
    let f = Fixture::new();
    f.store.set_fail_saves(true);
    let registry = Arc::new(LearnerRegistry::new(LearningConfig::default(), f.deps.clone()));
    {
        let alice = registry.get_or_create("alice");
        let mut alice = alice.lock().unwrap();
        cat_turn(&mut alice);
    }
    f.store.set_fail_saves(false);
    let mut timer = AutosaveTimer::start(
        Arc::clone(&registry),
        AutosaveSchedule::new(3600, T0),
        Duration::from_millis(5),
    )
    .unwrap();
    assert!(timer.is_running());
    timer.stop();
    assert!(!timer.is_running());
    timer.stop();
    assert!(f.store.snapshot("alice").is_some());
}

#[test]
fn test_timer_stops_on_drop() {
    let f = Fixture::new();
    let registry = Arc::new(LearnerRegistry::new(LearningConfig::default(), f.deps.clone()));
    let timer = AutosaveTimer::start(
        Arc::clone(&registry),
        AutosaveSchedule::new(1, T0),
        Duration::from_millis(1),
    )
    .unwrap();
    drop(timer);
    // the thread held the only other reference
    assert_eq!(Arc::strong_count(&registry), 1);
}
