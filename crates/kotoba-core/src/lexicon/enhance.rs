//! Synonym-graph strengthening.
//!
//! Two augmentation passes run over a read-only view of the entries and
//! produce an `EnhancementPlan`; the store merges it under its write lock and
//! then closes the graph reciprocally.
//!
//! - semantic grouping: words sharing a gloss keyword are fully connected
//! - sampled similarity: a frequency-weighted sample is compared against a
//!   bounded window of gloss-ordered neighbors

use std::collections::{BTreeMap, HashMap, HashSet};

use tracing::{debug, debug_span};

use super::entry::DictionaryEntry;
use crate::settings::LexiconConfig;

/// Glosses this common carry no grouping signal.
const COMMON_WORDS: &[&str] = &[
    "about", "also", "being", "from", "have", "into", "kind", "make", "more", "much", "only",
    "other", "over", "person", "some", "someone", "something", "sort", "such", "than", "that",
    "their", "them", "then", "there", "they", "thing", "this", "used", "very", "what", "when",
    "which", "with", "without",
];

const MIN_KEYWORD_LEN: usize = 4;
/// Drops particles of English glosses ("to", "of", "a").
const MIN_OVERLAP_TOKEN_LEN: usize = 3;
/// Keywords are taken from this many leading definitions.
const KEYWORD_DEFINITIONS: usize = 2;

/// Pairwise similarity between two entries, in [0, 1].
pub trait SimilarityStrategy: Send + Sync {
    fn similarity(&self, a: &DictionaryEntry, b: &DictionaryEntry) -> f32;
}

/// Token overlap over a truncated gloss prefix, normalised by the smaller
/// token set.
#[derive(Debug, Clone, Copy)]
pub struct GlossOverlap {
    pub prefix_tokens: usize,
}

impl GlossOverlap {
    pub fn new(prefix_tokens: usize) -> Self {
        Self { prefix_tokens }
    }

    fn tokens(&self, entry: &DictionaryEntry) -> HashSet<String> {
        entry
            .definitions
            .iter()
            .flat_map(|d| gloss_words(d))
            .filter(|w| w.chars().count() >= MIN_OVERLAP_TOKEN_LEN)
            .filter(|w| !COMMON_WORDS.contains(&w.as_str()))
            .take(self.prefix_tokens.max(1))
            .collect()
    }
}

impl SimilarityStrategy for GlossOverlap {
    fn similarity(&self, a: &DictionaryEntry, b: &DictionaryEntry) -> f32 {
        let ta = self.tokens(a);
        let tb = self.tokens(b);
        let smaller = ta.len().min(tb.len());
        if smaller == 0 {
            return 0.0;
        }
        ta.intersection(&tb).count() as f32 / smaller as f32
    }
}

/// Lowercased alphanumeric words of a gloss. Words inside parentheses are
/// annotations ("(of a person)") and are skipped.
fn gloss_words(gloss: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut depth = 0usize;
    let mut current = String::new();
    for c in gloss.chars() {
        match c {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            _ => {}
        }
        if depth == 0 && c.is_alphanumeric() {
            current.extend(c.to_lowercase());
        } else if !current.is_empty() {
            words.push(std::mem::take(&mut current));
        }
    }
    if !current.is_empty() {
        words.push(current);
    }
    words
}

/// Grouping keywords of an entry: long, uncommon words of its first glosses.
pub fn keywords(entry: &DictionaryEntry) -> Vec<String> {
    let mut seen = HashSet::new();
    entry
        .definitions
        .iter()
        .take(KEYWORD_DEFINITIONS)
        .flat_map(|d| gloss_words(d))
        .filter(|w| w.chars().count() >= MIN_KEYWORD_LEN)
        .filter(|w| !COMMON_WORDS.contains(&w.as_str()))
        .filter(|w| seen.insert(w.clone()))
        .collect()
}

/// Edges to add to the synonym graph. Built without mutating the store.
#[derive(Debug, Default)]
pub struct EnhancementPlan {
    pub(crate) edges: Vec<(String, String, f32)>,
    pub grouped_links: usize,
    pub similarity_links: usize,
    pub sampled: usize,
}

impl EnhancementPlan {
    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }
}

pub fn plan(
    entries: &HashMap<String, DictionaryEntry>,
    config: &LexiconConfig,
    strategy: &dyn SimilarityStrategy,
) -> EnhancementPlan {
    let _span = debug_span!("plan_enhancement", entries = entries.len()).entered();
    let mut plan = EnhancementPlan::default();
    group_by_keyword(entries, config, &mut plan);
    sampled_similarity(entries, config, strategy, &mut plan);
    debug!(
        grouped = plan.grouped_links,
        similar = plan.similarity_links,
        sampled = plan.sampled,
        "enhancement planned"
    );
    plan
}

fn group_by_keyword(
    entries: &HashMap<String, DictionaryEntry>,
    config: &LexiconConfig,
    plan: &mut EnhancementPlan,
) {
    // BTreeMap keeps plan order stable across runs.
    let mut groups: BTreeMap<String, Vec<&str>> = BTreeMap::new();
    for entry in entries.values() {
        for keyword in keywords(entry) {
            groups.entry(keyword).or_default().push(entry.word.as_str());
        }
    }
    for members in groups.values_mut() {
        if members.len() < config.min_group_size || members.len() > config.max_group_size {
            continue;
        }
        members.sort_unstable();
        for (i, a) in members.iter().enumerate() {
            for b in &members[i + 1..] {
                plan.edges
                    .push((a.to_string(), b.to_string(), config.group_weight));
                plan.grouped_links += 1;
            }
        }
    }
}

/// Representative sample: the most frequent half of the budget, then an even
/// stride over the remaining entries so rare words are represented too.
fn representative_sample<'a>(
    by_frequency: &[&'a DictionaryEntry],
    budget: usize,
) -> Vec<&'a DictionaryEntry> {
    if by_frequency.len() <= budget {
        return by_frequency.to_vec();
    }
    let head = budget / 2;
    let mut sample: Vec<&DictionaryEntry> = by_frequency[..head].to_vec();
    let rest = &by_frequency[head..];
    let wanted = budget - head;
    if wanted > 0 {
        let stride = rest.len() as f64 / wanted as f64;
        sample.extend((0..wanted).map(|i| rest[(i as f64 * stride) as usize]));
    }
    sample
}

fn sampled_similarity(
    entries: &HashMap<String, DictionaryEntry>,
    config: &LexiconConfig,
    strategy: &dyn SimilarityStrategy,
    plan: &mut EnhancementPlan,
) {
    let mut by_frequency: Vec<&DictionaryEntry> = entries.values().collect();
    by_frequency.sort_by(|a, b| b.frequency.cmp(&a.frequency).then_with(|| a.word.cmp(&b.word)));
    let sample = representative_sample(&by_frequency, config.sample_size);
    plan.sampled = sample.len();

    // Neighbors are taken in gloss order, so the window sees entries whose
    // first glosses start alike.
    let mut by_gloss: Vec<(&str, &DictionaryEntry)> = entries
        .values()
        .map(|e| (e.definitions.first().map_or("", |d| d.as_str()), e))
        .collect();
    by_gloss.sort_by(|a, b| a.0.cmp(b.0).then_with(|| a.1.word.cmp(&b.1.word)));
    let position: HashMap<&str, usize> = by_gloss
        .iter()
        .enumerate()
        .map(|(i, (_, e))| (e.word.as_str(), i))
        .collect();

    let window = config.neighbor_window;
    for entry in sample {
        let Some(&at) = position.get(entry.word.as_str()) else {
            continue;
        };
        let lo = at.saturating_sub(window);
        let hi = (at + window + 1).min(by_gloss.len());
        for &(_, other) in &by_gloss[lo..hi] {
            if other.word == entry.word || !entry.shares_pos(other) {
                continue;
            }
            let score = strategy.similarity(entry, other);
            if score > config.similarity_threshold {
                plan.edges
                    .push((entry.word.clone(), other.word.clone(), score));
                plan.similarity_links += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexicon::entry::PartOfSpeech;

    fn entry(word: &str, gloss: &str, pos: PartOfSpeech) -> DictionaryEntry {
        DictionaryEntry::new(word, None, vec![gloss.to_string()]).with_pos(&[pos])
    }

    #[test]
    fn gloss_words_skip_annotations() {
        assert_eq!(
            gloss_words("to look at (esp. from afar); to gaze"),
            vec!["to", "look", "at", "to", "gaze"]
        );
    }

    #[test]
    fn keywords_filter_short_and_common() {
        let e = entry("大変", "very; greatly; serious", PartOfSpeech::Adverb);
        assert_eq!(keywords(&e), vec!["greatly", "serious"]);
    }

    #[test]
    fn gloss_overlap_uses_smaller_set() {
        let s = GlossOverlap::new(12);
        let a = entry("大切", "important; precious", PartOfSpeech::Adjective);
        let b = entry("大事", "important; valuable; precious", PartOfSpeech::Adjective);
        let c = entry("猫", "cat", PartOfSpeech::Noun);
        assert_eq!(s.similarity(&a, &b), 1.0);
        assert_eq!(s.similarity(&a, &c), 0.0);
    }

    #[test]
    fn representative_sample_is_bounded_and_keeps_head() {
        let list: Vec<DictionaryEntry> = (0..100)
            .map(|i| entry(&format!("w{i:03}"), "x", PartOfSpeech::Noun))
            .collect();
        let refs: Vec<&DictionaryEntry> = list.iter().collect();
        let sample = representative_sample(&refs, 10);
        assert_eq!(sample.len(), 10);
        assert_eq!(sample[0].word, "w000");
        assert_eq!(sample[4].word, "w004");
        assert!(sample.iter().any(|e| e.word.as_str() > "w050"));
    }
}
