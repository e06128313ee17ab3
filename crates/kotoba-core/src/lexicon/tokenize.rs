use std::collections::HashMap;

use super::entry::PartOfSpeech;
use super::LexicalStore;
use crate::analysis::{AnalysisError, Token, Tokenizer};
use crate::unicode::Script;

/// Longest-match tokenizer over a snapshot of the store's vocabulary.
///
/// Runs of characters that match no word are grouped by script and tagged
/// closed-class, so they never become keywords or substitution targets.
pub struct LexiconTokenizer {
    vocabulary: HashMap<String, PartOfSpeech>,
    max_chars: usize,
}

impl LexiconTokenizer {
    pub fn from_store(store: &LexicalStore) -> Self {
        Self::from_words(
            store
                .entries()
                .filter_map(|e| e.primary_pos().map(|p| (e.word.clone(), p))),
        )
    }

    pub fn from_words(words: impl IntoIterator<Item = (String, PartOfSpeech)>) -> Self {
        let vocabulary: HashMap<String, PartOfSpeech> = words.into_iter().collect();
        let max_chars = vocabulary
            .keys()
            .map(|w| w.chars().count())
            .max()
            .unwrap_or(1);
        Self {
            vocabulary,
            max_chars,
        }
    }
}

fn unmatched(surface: &str, script: Script) -> Token {
    let pos = match script {
        Script::Hiragana => PartOfSpeech::Particle,
        Script::Kanji | Script::Katakana | Script::Latin | Script::Digit => PartOfSpeech::Other,
        Script::Other => PartOfSpeech::Symbol,
    };
    Token::new(surface, pos)
}

impl Tokenizer for LexiconTokenizer {
    fn tokenize(&self, text: &str) -> Result<Vec<Token>, AnalysisError> {
        let chars: Vec<(usize, char)> = text.char_indices().collect();
        let byte_at = |i: usize| chars.get(i).map_or(text.len(), |(b, _)| *b);

        let mut tokens = Vec::new();
        let mut pending: Option<(usize, Script)> = None;
        let mut i = 0;
        while i < chars.len() {
            let c = chars[i].1;
            if c.is_whitespace() {
                if let Some((start, script)) = pending.take() {
                    tokens.push(unmatched(&text[byte_at(start)..byte_at(i)], script));
                }
                i += 1;
                continue;
            }

            let longest = (1..=self.max_chars.min(chars.len() - i))
                .rev()
                .find_map(|len| {
                    let surface = &text[byte_at(i)..byte_at(i + len)];
                    self.vocabulary.get(surface).map(|pos| (len, *pos))
                });

            match longest {
                Some((len, pos)) => {
                    if let Some((start, script)) = pending.take() {
                        tokens.push(unmatched(&text[byte_at(start)..byte_at(i)], script));
                    }
                    tokens.push(Token::new(&text[byte_at(i)..byte_at(i + len)], pos));
                    i += len;
                }
                None => {
                    let script = Script::of(c);
                    match pending {
                        Some((_, current)) if current == script => {}
                        Some((start, current)) => {
                            tokens.push(unmatched(&text[byte_at(start)..byte_at(i)], current));
                            pending = Some((i, script));
                        }
                        None => pending = Some((i, script)),
                    }
                    i += 1;
                }
            }
        }
        if let Some((start, script)) = pending {
            tokens.push(unmatched(&text[byte_at(start)..], script));
        }
        Ok(tokens)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokenizer() -> LexiconTokenizer {
        LexiconTokenizer::from_words([
            ("猫".to_string(), PartOfSpeech::Noun),
            ("好き".to_string(), PartOfSpeech::Adjective),
            ("大好き".to_string(), PartOfSpeech::Adjective),
        ])
    }

    fn surfaces(tokens: &[Token]) -> Vec<&str> {
        tokens.iter().map(|t| t.surface.as_str()).collect()
    }

    #[test]
    fn longest_match_wins() {
        let tokens = tokenizer().tokenize("猫が大好きです").unwrap();
        assert_eq!(surfaces(&tokens), vec!["猫", "が", "大好き", "です"]);
        assert_eq!(tokens[1].pos, PartOfSpeech::Particle);
        assert_eq!(tokens[2].pos, PartOfSpeech::Adjective);
    }

    #[test]
    fn unmatched_runs_group_by_script() {
        let tokens = tokenizer().tokenize("犬とネコ、猫").unwrap();
        assert_eq!(surfaces(&tokens), vec!["犬", "と", "ネコ", "、", "猫"]);
        assert_eq!(tokens[0].pos, PartOfSpeech::Other);
        assert_eq!(tokens[3].pos, PartOfSpeech::Symbol);
    }

    #[test]
    fn whitespace_is_dropped() {
        let tokens = tokenizer().tokenize(" 猫 好き ").unwrap();
        assert_eq!(surfaces(&tokens), vec!["猫", "好き"]);
        assert!(tokenizer().tokenize("").unwrap().is_empty());
    }
}
