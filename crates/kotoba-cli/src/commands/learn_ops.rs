use std::path::Path;
use std::sync::Arc;

use kotoba_core::analysis::{ScriptContextPredictor, Tokenizer};
use kotoba_core::clock::SystemClock;
use kotoba_core::learner::{
    Collaborators, DecayOutcome, FileRelationStore, LearnOutcome, PersistenceError,
    RelationshipLearner,
};
use kotoba_core::lexicon::LexiconTokenizer;
use kotoba_core::settings::LearningConfig;

use super::{open_store, pad, LexiconSource};

/// A learner backed by `<data_dir>/<user>.lxur`.
pub fn open_learner(
    data_dir: &Path,
    user: &str,
    tokenizer: Arc<dyn Tokenizer>,
) -> RelationshipLearner {
    let deps = Collaborators {
        tokenizer,
        predictor: Some(Arc::new(ScriptContextPredictor)),
        store: Arc::new(FileRelationStore::new(data_dir)),
        clock: Arc::new(SystemClock),
    };
    RelationshipLearner::new(user, LearningConfig::default(), deps)
}

fn learner_for(src: &LexiconSource, data_dir: &Path, user: &str) -> RelationshipLearner {
    let (store, _) = open_store(src);
    open_learner(data_dir, user, Arc::new(LexiconTokenizer::from_store(&store)))
}

/// Learn one exchange and make sure it is on disk.
pub fn learn_turn(
    learner: &mut RelationshipLearner,
    input: &str,
    history: &[String],
    response: &str,
) -> Result<LearnOutcome, PersistenceError> {
    let outcome = learner.learn_from_conversation(input, history, response);
    learner.save_if_dirty()?;
    Ok(outcome)
}

pub fn learn(
    src: &LexiconSource,
    data_dir: &str,
    user: &str,
    input: &str,
    history: &[String],
    response: &str,
) {
    let mut learner = learner_for(src, Path::new(data_dir), user);
    let outcome = die!(
        learn_turn(&mut learner, input, history, response),
        "Error saving relations: {}"
    );
    println!(
        "{user}: {} keywords, {} pairs recorded, {} relations promoted",
        outcome.keywords, outcome.pairs_recorded, outcome.promoted
    );
}

pub fn feedback(
    src: &LexiconSource,
    data_dir: &str,
    user: &str,
    term: &str,
    rating: f32,
    context: &str,
) {
    let mut learner = learner_for(src, Path::new(data_dir), user);
    let touched = learner.learn_from_feedback(term, rating, context);
    die!(learner.save_if_dirty(), "Error saving relations: {}");
    println!("{user}: {touched} relation(s) of {term} adjusted");
}

pub fn relations(src: &LexiconSource, data_dir: &str, user: &str, term: Option<&str>, json: bool) {
    let learner = learner_for(src, Path::new(data_dir), user);
    let Some(term) = term else {
        let stats = learner.stats();
        if json {
            println!("{}", die!(serde_json::to_string_pretty(&stats), "Error: {}"));
        } else {
            println!("User:      {}", stats.user_id);
            println!("Relations: {} across {} terms", stats.relations, stats.terms_with_relations);
            println!("Pairs:     {}", stats.pairs);
            println!("Terms:     {}", stats.known_terms);
            println!("Saved at:  {}", stats.last_saved);
        }
        return;
    };

    let related = learner.get_user_relations(term);
    if json {
        println!("{}", die!(serde_json::to_string_pretty(&related), "Error: {}"));
        return;
    }
    if related.is_empty() {
        println!("{term}: no learned relations");
        return;
    }
    println!("{}  strength  count     pmi    chi²", pad("related", 12));
    for rel in &related {
        let pmi = learner
            .pmi(term, &rel.related)
            .map_or_else(|| "-".to_string(), |v| format!("{v:.2}"));
        let chi = learner
            .chi_square(term, &rel.related)
            .map_or_else(|| "-".to_string(), |v| format!("{v:.2}"));
        println!(
            "{}  {:>8.3}  {:>5}  {pmi:>6}  {chi:>6}",
            pad(&rel.related, 12),
            rel.strength,
            rel.count
        );
    }
}

pub fn decay_and_save(learner: &mut RelationshipLearner) -> Result<DecayOutcome, PersistenceError> {
    let outcome = learner.apply_decay();
    learner.save_if_dirty()?;
    Ok(outcome)
}

pub fn decay(src: &LexiconSource, data_dir: &str, user: &str) {
    let mut learner = learner_for(src, Path::new(data_dir), user);
    let outcome = die!(decay_and_save(&mut learner), "Error saving relations: {}");
    println!(
        "{user}: {} decayed, {} pruned, {} terms dropped",
        outcome.decayed, outcome.removed, outcome.terms_removed
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use kotoba_core::lexicon::LexicalStore;
    use kotoba_core::settings::LexiconConfig;

    fn seed_tokenizer() -> Arc<dyn Tokenizer> {
        let store = LexicalStore::new(LexiconConfig::default());
        Arc::new(LexiconTokenizer::from_store(&store))
    }

    #[test]
    fn learned_turns_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let mut learner = open_learner(dir.path(), "cli-user", seed_tokenizer());
        for _ in 0..2 {
            let outcome = learn_turn(&mut learner, "仕事が大切です", &[], "業務は重要").unwrap();
            assert!(outcome.pairs_recorded > 0);
        }
        assert!(FileRelationStore::new(dir.path())
            .path_for("cli-user")
            .exists());

        let reopened = open_learner(dir.path(), "cli-user", seed_tokenizer());
        assert_eq!(reopened.co_occurrence_count("仕事", "業務"), 2);
    }

    #[test]
    fn decay_on_empty_learner_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let mut learner = open_learner(dir.path(), "nobody", seed_tokenizer());
        assert_eq!(decay_and_save(&mut learner).unwrap(), DecayOutcome::default());
    }
}
