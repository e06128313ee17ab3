//! Streaming reader for JMdict-style tagged dictionary documents.
//!
//! Format: a sequence of `<entry>` blocks.
//!   <entry>
//!     <k_ele><keb>猫</keb><ke_pri>ichi1</ke_pri></k_ele>
//!     <r_ele><reb>ねこ</reb></r_ele>
//!     <sense><pos>&n;</pos><misc>&col;</misc><xref>ニャンコ</xref><gloss>cat</gloss></sense>
//!   </entry>
//! Only one entry is buffered at a time, so arbitrarily large documents can
//! be consumed under a fixed memory budget.

use std::io::BufRead;

use tracing::{debug, warn};

use super::entry::{estimate_frequency, DictionaryEntry, Level, PartOfSpeech, Register};
use super::LoadError;
use crate::unicode::contains_japanese;

/// Upper bound on a single buffered entry; larger means the document is
/// missing a closing tag.
const MAX_ENTRY_BYTES: usize = 1 << 20;

const ENTRY_OPEN: &str = "<entry>";
const ENTRY_CLOSE: &str = "</entry>";

#[derive(Debug, Default, Clone, PartialEq)]
pub(crate) struct RawSense {
    pub pos: Vec<String>,
    pub glosses: Vec<String>,
    pub xrefs: Vec<String>,
    pub antonyms: Vec<String>,
    pub misc: Vec<String>,
}

#[derive(Debug, Default, Clone, PartialEq)]
pub(crate) struct RawEntry {
    pub kebs: Vec<String>,
    pub rebs: Vec<String>,
    pub priority: bool,
    pub senses: Vec<RawSense>,
}

impl RawEntry {
    /// Accept the entry if it has a Japanese headword and at least one
    /// non-empty gloss.
    pub fn into_entry(self) -> Option<DictionaryEntry> {
        let has_kanji_form = !self.kebs.is_empty();
        let word = self
            .kebs
            .first()
            .or_else(|| self.rebs.first())
            .cloned()?;
        if !contains_japanese(&word) {
            return None;
        }

        let mut entry = DictionaryEntry::new(
            word,
            if has_kanji_form {
                self.rebs.first().cloned()
            } else {
                None
            },
            Vec::new(),
        );
        for sense in self.senses {
            let glosses: Vec<&str> = sense
                .glosses
                .iter()
                .map(|g| g.trim())
                .filter(|g| !g.is_empty())
                .collect();
            if !glosses.is_empty() {
                entry.definitions.push(glosses.join("; "));
            }
            entry
                .pos
                .extend(sense.pos.iter().map(|p| PartOfSpeech::from_tag(p)));
            for xref in &sense.xrefs {
                push_unique(&mut entry.synonyms, xref_headword(xref), &entry.word);
            }
            for ant in &sense.antonyms {
                push_unique(&mut entry.antonyms, xref_headword(ant), &entry.word);
            }
            if entry.register == Register::Neutral {
                if let Some(r) = sense.misc.iter().find_map(|m| Register::from_misc(m)) {
                    entry.register = r;
                }
            }
        }
        if entry.definitions.is_empty() {
            return None;
        }

        entry.frequency = estimate_frequency(&entry.word, self.priority);
        entry.level = Level::from_frequency(entry.frequency);
        entry.source = "jmdict".to_string();
        Some(entry)
    }
}

fn push_unique(list: &mut Vec<String>, value: &str, self_word: &str) {
    let value = value.trim();
    if !value.is_empty() && value != self_word && !list.iter().any(|v| v == value) {
        list.push(value.to_string());
    }
}

/// JMdict cross references look like `漢字・かんじ・1`; the headword is the
/// first segment.
fn xref_headword(xref: &str) -> &str {
    xref.split('・').next().unwrap_or(xref)
}

/// Decode the predefined XML escapes. Unknown entity references (`&n;`) are
/// left as-is for the tag mappers to normalise.
fn decode_xml(s: &str) -> String {
    if !s.contains('&') {
        return s.to_string();
    }
    s.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

/// Text content of every `<tag>` / `<tag attr=...>` element in `block`.
fn elements(block: &str, tag: &str) -> Vec<String> {
    let open_plain = format!("<{tag}>");
    let open_attr = format!("<{tag} ");
    let close = format!("</{tag}>");
    let mut out = Vec::new();
    let mut rest = block;
    loop {
        let plain = rest.find(&open_plain);
        let attr = rest.find(&open_attr);
        let start = match (plain, attr) {
            (Some(a), Some(b)) => a.min(b),
            (Some(a), None) | (None, Some(a)) => a,
            (None, None) => break,
        };
        let after_open = &rest[start..];
        let Some(gt) = after_open.find('>') else {
            break;
        };
        if after_open[..gt].ends_with('/') {
            // self-closing, no content
            rest = &after_open[gt + 1..];
            continue;
        }
        let content = &after_open[gt + 1..];
        let Some(end) = content.find(&close) else {
            break;
        };
        out.push(decode_xml(content[..end].trim()));
        rest = &content[end + close.len()..];
    }
    out
}

pub(crate) fn parse_entry_block(block: &str) -> RawEntry {
    let mut parts = block.split("<sense>");
    let head = parts.next().unwrap_or_default();
    let priority = !elements(head, "ke_pri").is_empty() || !elements(head, "re_pri").is_empty();
    let senses = parts
        .map(|sense| RawSense {
            pos: elements(sense, "pos"),
            glosses: elements(sense, "gloss"),
            xrefs: elements(sense, "xref"),
            antonyms: elements(sense, "ant"),
            misc: elements(sense, "misc"),
        })
        .collect();
    RawEntry {
        kebs: elements(head, "keb"),
        rebs: elements(head, "reb"),
        priority,
        senses,
    }
}

/// Iterator over raw `<entry>` blocks of a tagged document.
pub(crate) struct EntryReader<R> {
    reader: R,
    buf: String,
    line: String,
    done: bool,
}

impl<R: BufRead> EntryReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            buf: String::new(),
            line: String::new(),
            done: false,
        }
    }

    fn take_block(&mut self) -> Option<RawEntry> {
        loop {
            let end = self.buf.find(ENTRY_CLOSE)?;
            let block_end = end + ENTRY_CLOSE.len();
            let parsed = self.buf[..end]
                .rfind(ENTRY_OPEN)
                .map(|start| parse_entry_block(&self.buf[start + ENTRY_OPEN.len()..end]));
            self.buf.drain(..block_end);
            if parsed.is_some() {
                return parsed;
            }
        }
    }
}

impl<R: BufRead> Iterator for EntryReader<R> {
    type Item = Result<RawEntry, LoadError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(entry) = self.take_block() {
                return Some(Ok(entry));
            }
            if self.done {
                if self.buf.contains(ENTRY_OPEN) {
                    self.buf.clear();
                    return Some(Err(LoadError::Parse("unterminated <entry> at end of input".into())));
                }
                return None;
            }
            if !self.buf.contains(ENTRY_OPEN) {
                // prologue, DOCTYPE or whitespace between entries
                self.buf.clear();
            }
            if self.buf.len() > MAX_ENTRY_BYTES {
                self.done = true;
                self.buf.clear();
                return Some(Err(LoadError::Parse(format!(
                    "entry exceeds {MAX_ENTRY_BYTES} bytes without a closing tag"
                ))));
            }
            self.line.clear();
            match self.reader.read_line(&mut self.line) {
                Ok(0) => self.done = true,
                Ok(_) => self.buf.push_str(&self.line),
                Err(e) => {
                    self.done = true;
                    return Some(Err(LoadError::Io(e)));
                }
            }
        }
    }
}

/// Bounds applied while streaming a source.
#[derive(Debug, Clone, Copy)]
pub struct IngestBounds {
    pub memory_budget_mb: usize,
    pub max_entries: usize,
    pub batch_size: usize,
    pub avg_entry_overhead: usize,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct IngestStats {
    pub accepted: usize,
    pub rejected: usize,
    /// Stopped early on a bound (or on a late parse error).
    pub truncated: bool,
    pub estimated_bytes: usize,
}

/// Stream entries from `reader` into `sink` in batches until the input ends
/// or a bound is reached.
///
/// A parse error before any entry was accepted is returned; after that the
/// partial result is kept and the ingestion is reported as truncated.
pub(crate) fn ingest<R: BufRead>(
    reader: R,
    bounds: &IngestBounds,
    mut sink: impl FnMut(Vec<DictionaryEntry>),
) -> Result<IngestStats, LoadError> {
    let budget_bytes = bounds.memory_budget_mb.saturating_mul(1024 * 1024);
    let batch_size = bounds.batch_size.max(1);
    let mut stats = IngestStats::default();
    let mut payload_total = 0usize;
    let mut batch: Vec<DictionaryEntry> = Vec::with_capacity(batch_size);

    for item in EntryReader::new(reader) {
        if stats.accepted + batch.len() >= bounds.max_entries {
            stats.truncated = true;
            break;
        }
        let raw = match item {
            Ok(raw) => raw,
            Err(e) if stats.accepted + batch.len() > 0 => {
                warn!("source parse stopped early: {e}");
                stats.truncated = true;
                break;
            }
            Err(e) => return Err(e),
        };
        let Some(entry) = raw.into_entry() else {
            stats.rejected += 1;
            continue;
        };
        payload_total += entry.payload_bytes();
        batch.push(entry);

        if stats.accepted + batch.len() >= bounds.max_entries {
            stats.accepted += batch.len();
            sink(std::mem::take(&mut batch));
            stats.truncated = true;
            debug!(accepted = stats.accepted, "entry cap reached");
            break;
        }
        if batch.len() >= batch_size {
            stats.accepted += batch.len();
            sink(std::mem::replace(&mut batch, Vec::with_capacity(batch_size)));
            let avg = payload_total / stats.accepted + bounds.avg_entry_overhead;
            stats.estimated_bytes = stats.accepted * avg;
            if stats.estimated_bytes >= budget_bytes {
                stats.truncated = true;
                debug!(
                    accepted = stats.accepted,
                    estimated_bytes = stats.estimated_bytes,
                    "memory budget reached"
                );
                break;
            }
        }
    }
    if !batch.is_empty() {
        stats.accepted += batch.len();
        sink(batch);
    }
    if stats.accepted > 0 {
        let avg = payload_total / stats.accepted + bounds.avg_entry_overhead;
        stats.estimated_bytes = stats.accepted * avg;
    }
    if stats.accepted == 0 {
        return Err(LoadError::Empty);
    }
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const SAMPLE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE JMdict [
<!ENTITY n "noun (common) (futsuumeishi)">
]>
<JMdict>
<entry>
<ent_seq>1</ent_seq>
<k_ele><keb>猫</keb><ke_pri>ichi1</ke_pri></k_ele>
<r_ele><reb>ねこ</reb></r_ele>
<sense><pos>&n;</pos><xref>ニャンコ</xref><gloss>cat</gloss><gloss xml:lang="eng">feline</gloss></sense>
<sense><misc>&col;</misc><gloss>shamisen</gloss></sense>
</entry>
<entry><r_ele><reb>すごい</reb></r_ele><sense><pos>&adj-i;</pos><ant>つまらない・1</ant><gloss>amazing &amp; great</gloss></sense></entry>
<entry>
<k_ele><keb>ABC</keb></k_ele>
<sense><gloss>alphabet</gloss></sense>
</entry>
<entry>
<k_ele><keb>無意味</keb></k_ele>
<sense><gloss/></sense>
</entry>
</JMdict>
"#;

    fn bounds(max_entries: usize) -> IngestBounds {
        IngestBounds {
            memory_budget_mb: 64,
            max_entries,
            batch_size: 2,
            avg_entry_overhead: 160,
        }
    }

    #[test]
    fn parses_entries_and_fields() {
        let raws: Vec<RawEntry> = EntryReader::new(Cursor::new(SAMPLE))
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(raws.len(), 4);
        assert_eq!(raws[0].kebs, vec!["猫"]);
        assert_eq!(raws[0].rebs, vec!["ねこ"]);
        assert!(raws[0].priority);
        assert_eq!(raws[0].senses.len(), 2);
        assert_eq!(raws[0].senses[0].glosses, vec!["cat", "feline"]);
        assert_eq!(raws[1].senses[0].glosses, vec!["amazing & great"]);
        assert!(raws[3].senses[0].glosses.is_empty());
    }

    #[test]
    fn accepted_entry_shape() {
        let raws: Vec<RawEntry> = EntryReader::new(Cursor::new(SAMPLE))
            .collect::<Result<_, _>>()
            .unwrap();
        let cat = raws[0].clone().into_entry().unwrap();
        assert_eq!(cat.word, "猫");
        assert_eq!(cat.reading.as_deref(), Some("ねこ"));
        assert_eq!(cat.definitions, vec!["cat; feline", "shamisen"]);
        assert!(cat.pos.contains(&PartOfSpeech::Noun));
        assert_eq!(cat.synonyms, vec!["ニャンコ"]);
        assert_eq!(cat.register, Register::Casual);
        assert_eq!(cat.frequency, estimate_frequency("猫", true));

        let sugoi = raws[1].clone().into_entry().unwrap();
        assert_eq!(sugoi.reading, None);
        assert_eq!(sugoi.antonyms, vec!["つまらない"]);
        assert!(sugoi.pos.contains(&PartOfSpeech::Adjective));
    }

    #[test]
    fn rejects_non_japanese_and_glossless() {
        let raws: Vec<RawEntry> = EntryReader::new(Cursor::new(SAMPLE))
            .collect::<Result<_, _>>()
            .unwrap();
        assert!(raws[2].clone().into_entry().is_none());
        assert!(raws[3].clone().into_entry().is_none());
    }

    #[test]
    fn ingest_counts_and_batches() {
        let mut batches = Vec::new();
        let stats = ingest(Cursor::new(SAMPLE), &bounds(100), |b| batches.push(b.len())).unwrap();
        assert_eq!(stats.accepted, 2);
        assert_eq!(stats.rejected, 2);
        assert!(!stats.truncated);
        assert_eq!(batches.iter().sum::<usize>(), 2);
    }

    #[test]
    fn ingest_stops_at_entry_cap() {
        let mut total = 0;
        let stats = ingest(Cursor::new(SAMPLE), &bounds(1), |b| total += b.len()).unwrap();
        assert_eq!(stats.accepted, 1);
        assert_eq!(total, 1);
        assert!(stats.truncated);
    }

    #[test]
    fn zero_cap_accepts_nothing() {
        let mut calls = 0;
        let err = ingest(Cursor::new(SAMPLE), &bounds(0), |_| calls += 1).unwrap_err();
        assert!(matches!(err, LoadError::Empty));
        assert_eq!(calls, 0);
    }

    #[test]
    fn unterminated_entry_is_error_when_nothing_accepted() {
        let doc = "<JMdict>\n<entry>\n<k_ele><keb>猫</keb></k_ele>\n";
        let err = ingest(Cursor::new(doc), &bounds(10), |_| {}).unwrap_err();
        assert!(matches!(err, LoadError::Parse(_)));
    }

    #[test]
    fn late_parse_error_keeps_partial_result() {
        let doc = format!("{}\n<entry><k_ele><keb>犬</keb>", SAMPLE.replace("</JMdict>", ""));
        let stats = ingest(Cursor::new(doc), &bounds(10), |_| {}).unwrap();
        assert_eq!(stats.accepted, 2);
        assert!(stats.truncated);
    }

    #[test]
    fn empty_document_is_error() {
        let err = ingest(Cursor::new("<JMdict></JMdict>"), &bounds(10), |_| {}).unwrap_err();
        assert!(matches!(err, LoadError::Empty));
    }
}
