pub mod config_ops;
pub mod learn_ops;
pub mod lexicon_ops;

use std::path::Path;

use unicode_width::UnicodeWidthStr;

use kotoba_core::lexicon::{IngestBounds, LexicalStore, LoadReport, Register};
use kotoba_core::settings::LexiconConfig;

/// Where commands load the lexicon from. Cache first, then the raw source;
/// with neither (or both failing) the built-in seed dictionary is used.
#[derive(Debug, Clone, Default)]
pub struct LexiconSource {
    pub cache_dir: Option<String>,
    pub source: Option<String>,
}

pub(crate) fn bounds_from(config: &LexiconConfig) -> IngestBounds {
    IngestBounds {
        memory_budget_mb: config.memory_budget_mb,
        max_entries: config.max_entries,
        batch_size: config.batch_size,
        avg_entry_overhead: config.avg_entry_overhead,
    }
}

pub(crate) fn open_store(src: &LexiconSource) -> (LexicalStore, LoadReport) {
    let config = LexiconConfig::default();
    let bounds = bounds_from(&config);
    let (store, report) = LexicalStore::open(
        config,
        src.cache_dir.as_deref().map(Path::new),
        src.source.as_deref().map(Path::new),
        bounds,
    );
    if let Some(reason) = &report.error {
        eprintln!("Warning: {reason} (using built-in seed)");
    }
    (store, report)
}

pub fn parse_register(s: &str) -> Result<Register, String> {
    match s.to_ascii_lowercase().as_str() {
        "formal" | "polite" => Ok(Register::Formal),
        "neutral" => Ok(Register::Neutral),
        "casual" => Ok(Register::Casual),
        other => Err(format!(
            "unknown register '{other}' (expected formal, neutral or casual)"
        )),
    }
}

/// Left-align to `width` terminal columns. Wide (CJK) characters count as two.
pub(crate) fn pad(s: &str, width: usize) -> String {
    let w = UnicodeWidthStr::width(s);
    if w >= width {
        s.to_string()
    } else {
        format!("{s}{}", " ".repeat(width - w))
    }
}
