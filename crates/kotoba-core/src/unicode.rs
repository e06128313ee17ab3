//! Character-level Unicode classification for Japanese text.

use serde::{Deserialize, Serialize};

/// Check the full Hiragana block (U+3040..U+309F).
pub fn is_hiragana(c: char) -> bool {
    ('\u{3040}'..='\u{309F}').contains(&c)
}

/// Check the full Katakana block (U+30A0..U+30FF). Includes the prolonged
/// sound mark ー.
pub fn is_katakana(c: char) -> bool {
    ('\u{30A0}'..='\u{30FF}').contains(&c)
}

pub fn is_kanji(c: char) -> bool {
    ('\u{4E00}'..='\u{9FFF}').contains(&c)
        || ('\u{3400}'..='\u{4DBF}').contains(&c)
        || ('\u{20000}'..='\u{2A6DF}').contains(&c)
        || c == '々'
}

pub fn is_latin(c: char) -> bool {
    c.is_ascii_alphabetic()
}

/// Coarse script class of a single character.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Script {
    Hiragana,
    Katakana,
    Kanji,
    Latin,
    Digit,
    Other,
}

impl Script {
    pub fn of(c: char) -> Self {
        if is_hiragana(c) {
            Script::Hiragana
        } else if is_katakana(c) {
            Script::Katakana
        } else if is_kanji(c) {
            Script::Kanji
        } else if is_latin(c) {
            Script::Latin
        } else if c.is_ascii_digit() || ('０'..='９').contains(&c) {
            Script::Digit
        } else {
            Script::Other
        }
    }

    /// Whether the class is one of the three Japanese scripts.
    pub fn is_japanese(self) -> bool {
        matches!(self, Script::Hiragana | Script::Katakana | Script::Kanji)
    }

    fn code(self) -> char {
        match self {
            Script::Hiragana => 'h',
            Script::Katakana => 'k',
            Script::Kanji => 'K',
            Script::Latin => 'l',
            Script::Digit => 'd',
            Script::Other => 'o',
        }
    }
}

/// True when at least one character is hiragana, katakana or kanji.
pub fn contains_japanese(s: &str) -> bool {
    s.chars().any(|c| Script::of(c).is_japanese())
}

/// Most frequent script class in `s`, with its share of characters.
/// Ties resolve towards kanji, then kana.
pub fn dominant_script(s: &str) -> Option<(Script, f32)> {
    let mut counts = [0usize; 6];
    let mut total = 0usize;
    for c in s.chars() {
        counts[Script::of(c) as usize] += 1;
        total += 1;
    }
    if total == 0 {
        return None;
    }
    let order = [
        Script::Kanji,
        Script::Hiragana,
        Script::Katakana,
        Script::Latin,
        Script::Digit,
        Script::Other,
    ];
    let best = order
        .iter()
        .copied()
        .max_by(|a, b| {
            counts[*a as usize]
                .cmp(&counts[*b as usize])
                .then_with(|| {
                    // earlier in `order` wins ties
                    let ia = order.iter().position(|x| x == a);
                    let ib = order.iter().position(|x| x == b);
                    ib.cmp(&ia)
                })
        })
        .unwrap_or(Script::Other);
    Some((best, counts[best as usize] as f32 / total as f32))
}

/// Run-length script signature, e.g. "大きい" → "Kh", "コーヒー" → "k".
pub fn script_signature(s: &str) -> String {
    let mut sig = String::new();
    let mut last = None;
    for c in s.chars() {
        let class = Script::of(c);
        if last != Some(class) {
            sig.push(class.code());
            last = Some(class);
        }
    }
    sig
}

/// Convert katakana string to hiragana.
/// Maps U+30A1..U+30F6 (ァ-ヶ) to U+3041..U+3096 (ぁ-ゖ).
/// Prolonged sound mark ー (U+30FC) is kept as-is.
pub fn katakana_to_hiragana(s: &str) -> String {
    s.chars()
        .map(|c| {
            if ('\u{30A1}'..='\u{30F6}').contains(&c) {
                char::from_u32(c as u32 - 0x60).unwrap_or(c)
            } else {
                c
            }
        })
        .collect()
}

/// Truncate to at most `max_chars` characters on a char boundary.
pub fn truncate_chars(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
