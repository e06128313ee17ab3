//! Substitution compatibility gates.
//!
//! `HeuristicPolicy` checks, in order: an explicit list of pairs that must
//! never replace each other, the register/tone distance, and the coarse
//! semantic domain implied by part of speech. Any other classifier can sit
//! behind `CompatibilityPolicy` instead.

use std::collections::BTreeSet;

use crate::lexicon::{DictionaryEntry, PartOfSpeech, Register};
use crate::unicode::{is_kanji, is_katakana};

/// Near-synonyms whose meanings differ enough that swapping them changes
/// what the sentence says.
static HARD_INCOMPATIBLE: &[(&str, &str)] = &[
    ("嬉しい", "楽しい"),
    ("暑い", "熱い"),
    ("早い", "速い"),
    ("会う", "合う"),
    ("聞く", "効く"),
];

/// Endings and prefixes that mark polite or honorific speech.
static FORMAL_CUES: &[&str] = &["ます", "です", "ございます", "いたす", "申す"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Domain {
    Emotion,
    Action,
    Object,
    Abstract,
}

impl Domain {
    pub fn of(pos: PartOfSpeech) -> Option<Self> {
        match pos {
            PartOfSpeech::Adjective => Some(Domain::Emotion),
            PartOfSpeech::Verb => Some(Domain::Action),
            PartOfSpeech::Noun | PartOfSpeech::Pronoun => Some(Domain::Object),
            PartOfSpeech::Adverb => Some(Domain::Abstract),
            _ => None,
        }
    }
}

pub fn domains(entry: &DictionaryEntry) -> BTreeSet<Domain> {
    entry.pos.iter().filter_map(|p| Domain::of(*p)).collect()
}

/// Tone level on a 0 (casual) to 3 (very formal) scale: the dictionary
/// register, adjusted by surface cues and length.
pub fn tone_level(entry: &DictionaryEntry) -> u8 {
    let mut level: i8 = match entry.register {
        Register::Casual => 0,
        Register::Neutral => 1,
        Register::Formal => 2,
    };
    let word = entry.word.as_str();
    let chars = word.chars().count();
    let mut it = word.chars();
    let honorific_prefix = matches!(it.next(), Some('お' | 'ご')) && it.next().is_some_and(is_kanji);
    if honorific_prefix || FORMAL_CUES.iter().any(|c| word.ends_with(c)) {
        level += 1;
    }
    if chars >= 4 && word.chars().all(is_kanji) {
        level += 1;
    }
    if word.contains('ー') || word.ends_with('っ') || (chars > 0 && word.chars().all(is_katakana))
    {
        level -= 1;
    }
    level.clamp(0, 3) as u8
}

/// Why a candidate was turned down.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Incompatibility {
    HardPair,
    Tone { from: u8, to: u8 },
    Domain,
}

pub trait CompatibilityPolicy: Send + Sync {
    /// `Ok(())` if `candidate` may replace `original`.
    fn check(
        &self,
        original: &DictionaryEntry,
        candidate: &DictionaryEntry,
    ) -> Result<(), Incompatibility>;
}

#[derive(Debug, Clone)]
pub struct HeuristicPolicy {
    tone_delta_max: u8,
    extra_pairs: Vec<(String, String)>,
}

impl HeuristicPolicy {
    pub fn new(tone_delta_max: u8) -> Self {
        Self {
            tone_delta_max,
            extra_pairs: Vec::new(),
        }
    }

    pub fn with_hard_pair(mut self, a: &str, b: &str) -> Self {
        self.extra_pairs.push((a.to_string(), b.to_string()));
        self
    }

    fn is_hard_pair(&self, a: &str, b: &str) -> bool {
        let hit = |x: &str, y: &str| (x == a && y == b) || (x == b && y == a);
        HARD_INCOMPATIBLE.iter().any(|(x, y)| hit(x, y))
            || self.extra_pairs.iter().any(|(x, y)| hit(x, y))
    }
}

impl CompatibilityPolicy for HeuristicPolicy {
    fn check(
        &self,
        original: &DictionaryEntry,
        candidate: &DictionaryEntry,
    ) -> Result<(), Incompatibility> {
        if self.is_hard_pair(&original.word, &candidate.word) {
            return Err(Incompatibility::HardPair);
        }
        let from = tone_level(original);
        let to = tone_level(candidate);
        if from.abs_diff(to) >= self.tone_delta_max {
            return Err(Incompatibility::Tone { from, to });
        }
        if domains(original).is_disjoint(&domains(candidate)) {
            return Err(Incompatibility::Domain);
        }
        Ok(())
    }
}
