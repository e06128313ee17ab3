//! Fixed-table rewriting passes that run after lexical substitution.

use crate::lexicon::Register;

/// Sentence-initial connectives and interchangeable alternatives.
static CONNECTIVES: &[(&str, &[&str])] = &[
    ("しかし", &["でも", "けれども", "ところが"]),
    ("そして", &["それから", "また"]),
    ("だから", &["なので", "そのため"]),
    ("つまり", &["要するに", "すなわち"]),
    ("さらに", &["加えて", "その上"]),
    ("ところで", &["さて"]),
    ("例えば", &["たとえば"]),
];

/// Casual form, polite form.
static FORMALITY: &[(&str, &str)] = &[
    ("じゃない", "ではない"),
    ("だよね", "ですよね"),
    ("だよ", "です"),
    ("だね", "ですね"),
    ("だけど", "ですが"),
    ("してる", "している"),
    ("でしょ", "でしょう"),
];

fn is_sentence_break(c: char) -> bool {
    matches!(c, '。' | '！' | '？' | '!' | '?' | '\n')
}

fn ends_sentence(after: &str) -> bool {
    after
        .chars()
        .next()
        .map_or(true, |c| is_sentence_break(c) || c.is_whitespace())
}

/// A rewriting pass. `pick` chooses among `n` alternatives.
pub(crate) trait PhrasePass {
    fn apply(&self, text: &str, pick: &mut dyn FnMut(usize) -> usize) -> (String, usize);
}

/// Swap sentence-initial connectives for an alternative.
pub(crate) struct ConnectiveVariation;

impl PhrasePass for ConnectiveVariation {
    fn apply(&self, text: &str, pick: &mut dyn FnMut(usize) -> usize) -> (String, usize) {
        let mut out = String::with_capacity(text.len());
        let mut changed = 0;
        let mut at_start = true;
        let mut i = 0;
        while i < text.len() {
            let rest = &text[i..];
            if at_start {
                let lead = rest.len() - rest.trim_start().len();
                out.push_str(&rest[..lead]);
                i += lead;
                let rest = &text[i..];
                if let Some((from, alts)) = CONNECTIVES.iter().find(|(c, _)| rest.starts_with(c))
                {
                    let choice = pick(alts.len()).min(alts.len() - 1);
                    out.push_str(alts[choice]);
                    i += from.len();
                    changed += 1;
                }
                at_start = false;
                continue;
            }
            let Some(c) = rest.chars().next() else {
                break;
            };
            out.push(c);
            i += c.len_utf8();
            at_start = is_sentence_break(c);
        }
        (out, changed)
    }
}

/// Rewrite sentence endings toward a target register. A form only counts as
/// an ending when a sentence break, whitespace or the end of the text
/// follows it. Neutral leaves the text alone.
pub(crate) struct FormalityShift(pub Register);

impl FormalityShift {
    /// (from, to) pairs, longest `from` first.
    fn table(&self) -> Vec<(&'static str, &'static str)> {
        let mut table: Vec<(&str, &str)> = match self.0 {
            Register::Formal => FORMALITY.to_vec(),
            Register::Casual => FORMALITY
                .iter()
                .filter(|(_, polite)| *polite != "です")
                .map(|(casual, polite)| (*polite, *casual))
                .collect(),
            Register::Neutral => Vec::new(),
        };
        table.sort_by_key(|(from, _)| std::cmp::Reverse(from.len()));
        table
    }
}

impl PhrasePass for FormalityShift {
    fn apply(&self, text: &str, _pick: &mut dyn FnMut(usize) -> usize) -> (String, usize) {
        let table = self.table();
        if table.is_empty() {
            return (text.to_string(), 0);
        }
        let mut out = String::with_capacity(text.len());
        let mut changed = 0;
        let mut i = 0;
        while i < text.len() {
            let rest = &text[i..];
            let hit = table
                .iter()
                .find(|(from, _)| rest.starts_with(from) && ends_sentence(&rest[from.len()..]));
            if let Some((from, to)) = hit {
                out.push_str(to);
                i += from.len();
                changed += 1;
                continue;
            }
            let Some(c) = rest.chars().next() else {
                break;
            };
            out.push(c);
            i += c.len_utf8();
        }
        (out, changed)
    }
}
