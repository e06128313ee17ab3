use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::unicode::{dominant_script, Script};

/// Coarse part-of-speech class shared by dictionary entries and tokenizer
/// output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PartOfSpeech {
    Noun,
    Verb,
    Adjective,
    Adverb,
    Pronoun,
    Particle,
    Auxiliary,
    Conjunction,
    Interjection,
    Prefix,
    Suffix,
    Expression,
    Symbol,
    Other,
}

impl PartOfSpeech {
    /// Map a tag to a class. Accepts JMdict entity codes (`n`, `v5r`,
    /// `adj-i`), IPADIC/UniDic tags (`名詞,一般`) and English names.
    pub fn from_tag(tag: &str) -> Self {
        let tag = tag.trim().trim_start_matches('&').trim_end_matches(';');
        let head = tag.split([',', '-']).next().unwrap_or(tag);
        match tag {
            "n-suf" => return PartOfSpeech::Suffix,
            "n-pref" => return PartOfSpeech::Prefix,
            "adj-pn" => return PartOfSpeech::Adjective,
            _ => {}
        }
        match head {
            "名詞" | "n" | "ctr" | "num" | "noun" => PartOfSpeech::Noun,
            "動詞" | "vs" | "vk" | "vz" | "vi" | "vt" | "vn" | "vr" | "verb" => PartOfSpeech::Verb,
            h if h.starts_with("v1") || h.starts_with("v2") || h.starts_with("v4") => {
                PartOfSpeech::Verb
            }
            h if h.starts_with("v5") => PartOfSpeech::Verb,
            "形容詞" | "形状詞" | "形容動詞" | "連体詞" | "adj" | "adjective" => {
                PartOfSpeech::Adjective
            }
            "副詞" | "adv" | "adverb" => PartOfSpeech::Adverb,
            "代名詞" | "pn" | "pronoun" => PartOfSpeech::Pronoun,
            "助詞" | "prt" | "particle" => PartOfSpeech::Particle,
            "助動詞" | "aux" | "auxiliary" => PartOfSpeech::Auxiliary,
            "接続詞" | "conj" | "conjunction" => PartOfSpeech::Conjunction,
            "感動詞" | "int" | "interjection" => PartOfSpeech::Interjection,
            "接頭辞" | "接頭詞" | "pref" | "prefix" => PartOfSpeech::Prefix,
            "接尾辞" | "suf" | "suffix" => PartOfSpeech::Suffix,
            "exp" | "expression" => PartOfSpeech::Expression,
            "記号" | "補助記号" | "空白" | "symbol" => PartOfSpeech::Symbol,
            _ => PartOfSpeech::Other,
        }
    }

    /// Content-word classes: the only ones that carry keywords or get
    /// substituted.
    pub fn is_open_class(self) -> bool {
        matches!(
            self,
            PartOfSpeech::Noun | PartOfSpeech::Verb | PartOfSpeech::Adjective | PartOfSpeech::Adverb
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PartOfSpeech::Noun => "noun",
            PartOfSpeech::Verb => "verb",
            PartOfSpeech::Adjective => "adjective",
            PartOfSpeech::Adverb => "adverb",
            PartOfSpeech::Pronoun => "pronoun",
            PartOfSpeech::Particle => "particle",
            PartOfSpeech::Auxiliary => "auxiliary",
            PartOfSpeech::Conjunction => "conjunction",
            PartOfSpeech::Interjection => "interjection",
            PartOfSpeech::Prefix => "prefix",
            PartOfSpeech::Suffix => "suffix",
            PartOfSpeech::Expression => "expression",
            PartOfSpeech::Symbol => "symbol",
            PartOfSpeech::Other => "other",
        }
    }
}

/// Coarse difficulty tag derived from the frequency estimate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Basic,
    Intermediate,
    Advanced,
    Rare,
}

impl Level {
    pub fn from_frequency(frequency: u32) -> Self {
        match frequency {
            f if f >= 1000 => Level::Basic,
            f if f >= 600 => Level::Intermediate,
            f if f >= 300 => Level::Advanced,
            _ => Level::Rare,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Register {
    Formal,
    #[default]
    Neutral,
    Casual,
}

impl Register {
    /// Map a JMdict `<misc>` code; `None` when the code says nothing about
    /// register.
    pub fn from_misc(code: &str) -> Option<Self> {
        match code.trim().trim_start_matches('&').trim_end_matches(';') {
            "hon" | "hum" | "pol" | "form" | "arch" => Some(Register::Formal),
            "col" | "sl" | "vulg" | "male" | "fem" | "chn" | "joc" | "net-sl" => {
                Some(Register::Casual)
            }
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DictionaryEntry {
    pub word: String,
    pub reading: Option<String>,
    pub definitions: Vec<String>,
    pub synonyms: Vec<String>,
    pub antonyms: Vec<String>,
    pub pos: BTreeSet<PartOfSpeech>,
    pub frequency: u32,
    pub level: Level,
    /// Derived score in [0, 100].
    pub quality: u8,
    pub register: Register,
    pub source: String,
    pub lang: String,
}

impl DictionaryEntry {
    /// Build an entry with heuristic frequency and level.
    pub fn new(word: impl Into<String>, reading: Option<String>, definitions: Vec<String>) -> Self {
        let word = word.into();
        let frequency = estimate_frequency(&word, false);
        Self {
            word,
            reading,
            definitions,
            synonyms: Vec::new(),
            antonyms: Vec::new(),
            pos: BTreeSet::new(),
            frequency,
            level: Level::from_frequency(frequency),
            quality: 0,
            register: Register::Neutral,
            source: String::new(),
            lang: "ja".to_string(),
        }
    }

    pub fn with_pos(mut self, pos: &[PartOfSpeech]) -> Self {
        self.pos.extend(pos.iter().copied());
        self
    }

    pub fn with_synonyms(mut self, synonyms: &[&str]) -> Self {
        self.synonyms.extend(synonyms.iter().map(|s| s.to_string()));
        self
    }

    pub fn with_antonyms(mut self, antonyms: &[&str]) -> Self {
        self.antonyms.extend(antonyms.iter().map(|s| s.to_string()));
        self
    }

    pub fn with_register(mut self, register: Register) -> Self {
        self.register = register;
        self
    }

    pub fn with_source(mut self, source: &str) -> Self {
        self.source = source.to_string();
        self
    }

    /// Override the heuristic frequency; level follows.
    pub fn with_frequency(mut self, frequency: u32) -> Self {
        self.frequency = frequency;
        self.level = Level::from_frequency(frequency);
        self
    }

    pub fn shares_pos(&self, other: &DictionaryEntry) -> bool {
        !self.pos.is_disjoint(&other.pos)
    }

    pub fn primary_pos(&self) -> Option<PartOfSpeech> {
        self.pos
            .iter()
            .copied()
            .find(|p| p.is_open_class())
            .or_else(|| self.pos.iter().next().copied())
    }

    /// Heap payload in bytes, used for the ingestion memory estimate.
    pub fn payload_bytes(&self) -> usize {
        self.word.len()
            + self.reading.as_ref().map_or(0, |r| r.len())
            + self.definitions.iter().map(|d| d.len()).sum::<usize>()
            + self.synonyms.iter().map(|s| s.len()).sum::<usize>()
            + self.antonyms.iter().map(|s| s.len()).sum::<usize>()
            + self.source.len()
            + self.lang.len()
    }
}

/// Heuristic frequency from token length and script class. Priority-marked
/// entries (JMdict `news1`, `ichi1`, ...) count double.
pub fn estimate_frequency(word: &str, priority: bool) -> u32 {
    let base: f32 = match word.chars().count() {
        0 => return 0,
        1 => 700.0,
        2 => 1000.0,
        3 => 800.0,
        4 => 550.0,
        5 | 6 => 350.0,
        _ => 200.0,
    };
    let script = match dominant_script(word).map(|d| d.0) {
        Some(Script::Kanji) => 1.0,
        Some(Script::Hiragana) => 1.1,
        Some(Script::Katakana) => 0.6,
        Some(Script::Latin) => 0.3,
        _ => 0.4,
    };
    let boost = if priority { 2.0 } else { 1.0 };
    (base * script * boost).round() as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pos_from_jmdict_codes() {
        assert_eq!(PartOfSpeech::from_tag("&n;"), PartOfSpeech::Noun);
        assert_eq!(PartOfSpeech::from_tag("v5r"), PartOfSpeech::Verb);
        assert_eq!(PartOfSpeech::from_tag("v1"), PartOfSpeech::Verb);
        assert_eq!(PartOfSpeech::from_tag("adj-i"), PartOfSpeech::Adjective);
        assert_eq!(PartOfSpeech::from_tag("adj-na"), PartOfSpeech::Adjective);
        assert_eq!(PartOfSpeech::from_tag("adv-to"), PartOfSpeech::Adverb);
        assert_eq!(PartOfSpeech::from_tag("n-suf"), PartOfSpeech::Suffix);
        assert_eq!(PartOfSpeech::from_tag("prt"), PartOfSpeech::Particle);
        assert_eq!(PartOfSpeech::from_tag("xyz"), PartOfSpeech::Other);
    }

    #[test]
    fn pos_from_ipadic_tags() {
        assert_eq!(PartOfSpeech::from_tag("名詞,一般"), PartOfSpeech::Noun);
        assert_eq!(PartOfSpeech::from_tag("動詞"), PartOfSpeech::Verb);
        assert_eq!(PartOfSpeech::from_tag("形状詞"), PartOfSpeech::Adjective);
        assert_eq!(PartOfSpeech::from_tag("助詞,格助詞"), PartOfSpeech::Particle);
        assert!(PartOfSpeech::from_tag("副詞").is_open_class());
        assert!(!PartOfSpeech::from_tag("助動詞").is_open_class());
    }

    #[test]
    fn register_from_misc() {
        assert_eq!(Register::from_misc("&hon;"), Some(Register::Formal));
        assert_eq!(Register::from_misc("col"), Some(Register::Casual));
        assert_eq!(Register::from_misc("uk"), None);
    }

    #[test]
    fn frequency_heuristic() {
        assert_eq!(estimate_frequency("", false), 0);
        // Two-kanji compounds are the most common shape.
        assert!(estimate_frequency("問題", false) > estimate_frequency("問題意識", false));
        // Katakana loanwords rank below native words of the same length.
        assert!(estimate_frequency("テスト", false) < estimate_frequency("たべる", false));
        assert_eq!(
            estimate_frequency("問題", true),
            2 * estimate_frequency("問題", false)
        );
    }

    #[test]
    fn level_follows_frequency() {
        assert_eq!(Level::from_frequency(2000), Level::Basic);
        assert_eq!(Level::from_frequency(700), Level::Intermediate);
        assert_eq!(Level::from_frequency(300), Level::Advanced);
        assert_eq!(Level::from_frequency(10), Level::Rare);
        let e = DictionaryEntry::new("問題", None, vec![]).with_frequency(50);
        assert_eq!(e.level, Level::Rare);
    }
}
