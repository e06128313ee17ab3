use std::path::Path;
use std::process;
use std::sync::Arc;

use kotoba_core::analysis::Tokenizer;
use kotoba_core::diversify::{Diversifier, DiversifyContext};
use kotoba_core::lexicon::{self, LexicalStore, LexiconTokenizer};
use kotoba_core::settings::{DiversifierConfig, LexiconConfig};
use tracing::info;

use super::{bounds_from, open_store, pad, parse_register, LexiconSource};

pub fn ingest(
    source_file: &str,
    cache_dir: &str,
    memory_budget_mb: Option<usize>,
    max_entries: Option<usize>,
    enhance: bool,
) {
    let config = LexiconConfig::default();
    let mut bounds = bounds_from(&config);
    if let Some(mb) = memory_budget_mb {
        bounds.memory_budget_mb = mb;
    }
    if let Some(n) = max_entries {
        bounds.max_entries = n;
    }

    let mut store = LexicalStore::new(config);
    eprintln!(
        "Ingesting {source_file} (budget {} MB, at most {} entries)...",
        bounds.memory_budget_mb, bounds.max_entries
    );
    let stats = die!(
        store.try_load_source(Path::new(source_file), &bounds),
        "Error ingesting {source_file}: {}"
    );
    eprintln!(
        "Accepted {} entries, rejected {}{}",
        stats.accepted,
        stats.rejected,
        if stats.truncated {
            " (stopped at a bound)"
        } else {
            ""
        }
    );

    if enhance {
        let summary = store.build_enhanced_synonym_map();
        eprintln!(
            "Enhanced: +{} edges ({} grouped, {} by similarity, {} reciprocal)",
            summary.added_edges,
            summary.grouped_links,
            summary.similarity_links,
            summary.reciprocal_edges
        );
    }

    let meta = die!(
        store.write_cache(Path::new(cache_dir)),
        "Error writing cache to {cache_dir}: {}"
    );
    info!(
        cache_dir,
        entries = meta.entry_count,
        enhanced = meta.enhanced,
        "cache written"
    );
    eprintln!(
        "Wrote {cache_dir}: {} entries, {} synonym edges, {} chunks",
        meta.entry_count, meta.synonym_count, meta.chunk_count
    );
}

pub fn info(cache_dir: &str) {
    let meta = die!(
        lexicon::read_metadata(Path::new(cache_dir)),
        "Error reading cache metadata: {}"
    );
    println!("Cache: {cache_dir}");
    println!("  format:   v{}", meta.format_version);
    println!("  entries:  {}", meta.entry_count);
    println!("  synonyms: {}", meta.synonym_count);
    println!("  chunks:   {}", meta.chunk_count);
    println!("  enhanced: {}", meta.enhanced);
    println!("  created:  {}", meta.created_at);

    let mut store = LexicalStore::new(LexiconConfig::default());
    let report = store.load_from_cache(Path::new(cache_dir));
    if let Some(reason) = report.error {
        eprintln!("Error: cache does not load: {reason}");
        process::exit(1);
    }
    let stats = store.stats();
    println!(
        "Loaded in {:.1} ms: {} graph words, {} readings",
        report.elapsed.as_secs_f64() * 1000.0,
        stats.graph_words,
        stats.readings
    );
}

pub fn lookup(src: &LexiconSource, word: &str) {
    let (store, _) = open_store(src);
    let Some(entry) = store.get_entry(word) else {
        println!("{word}: not found");
        return;
    };
    let pos: Vec<&str> = entry.pos.iter().map(|p| p.as_str()).collect();
    let rows = [
        ("word", entry.word.clone()),
        ("reading", entry.reading.clone().unwrap_or_default()),
        ("pos", pos.join(", ")),
        ("register", format!("{:?}", entry.register).to_lowercase()),
        ("level", format!("{:?}", entry.level).to_lowercase()),
        ("frequency", entry.frequency.to_string()),
        ("quality", store.quality(word).to_string()),
        ("synonyms", entry.synonyms.join("、")),
        ("antonyms", entry.antonyms.join("、")),
        ("source", entry.source.clone()),
    ];
    for (label, value) in rows {
        println!("{} {value}", pad(label, 10));
    }
    for (i, def) in entry.definitions.iter().enumerate() {
        println!("{} {}. {def}", pad(if i == 0 { "gloss" } else { "" }, 10), i + 1);
    }
}

pub fn synonyms(src: &LexiconSource, word: &str, max: usize, enhance: bool) {
    let (mut store, _) = open_store(src);
    if enhance && !store.is_enhanced() {
        store.build_enhanced_synonym_map();
    }
    let ranked = store.graph().ranked_neighbors(word);
    if ranked.is_empty() {
        println!("{word}: no synonyms");
        return;
    }
    let width = ranked
        .iter()
        .map(|(w, _)| unicode_width::UnicodeWidthStr::width(*w))
        .max()
        .unwrap_or(0)
        + 2;
    println!("{}  weight  quality", pad("synonym", width));
    for (w, weight) in ranked.into_iter().take(max) {
        println!("{}  {weight:>6.2}  {:>7}", pad(w, width), store.quality(w));
    }
}

pub struct DiversifyArgs<'a> {
    pub text: &'a str,
    pub register: Option<&'a str>,
    pub seed: Option<u64>,
    pub enhance: bool,
    /// Learner data directory and user id for the user-graph bonus.
    pub user: Option<(&'a str, &'a str)>,
    pub json: bool,
}

pub fn diversify(src: &LexiconSource, args: DiversifyArgs<'_>) {
    let register = args
        .register
        .map(|r| die!(parse_register(r), "Error: {}"));

    let (mut store, _) = open_store(src);
    if args.enhance && !store.is_enhanced() {
        store.build_enhanced_synonym_map();
    }
    let tokenizer: Arc<dyn Tokenizer> = Arc::new(LexiconTokenizer::from_store(&store));
    let learner = args.user.map(|(data_dir, user)| {
        let learner = super::learn_ops::open_learner(Path::new(data_dir), user, Arc::clone(&tokenizer));
        Arc::new(std::sync::Mutex::new(learner))
    });

    let config = DiversifierConfig {
        auto_enhance: false,
        ..DiversifierConfig::default()
    };
    let mut diversifier = Diversifier::new(store.into_shared(), tokenizer, config);
    if let Some(seed) = args.seed {
        diversifier = diversifier.with_seed(seed);
    }
    let ctx = DiversifyContext { register, learner };
    let outcome = diversifier.diversify_detailed(args.text, &ctx);

    if args.json {
        let out = die!(serde_json::to_string_pretty(&outcome), "Error: {}");
        println!("{out}");
        return;
    }
    println!("{}", outcome.text);
    for s in &outcome.substitutions {
        eprintln!(
            "  {} → {} (score {:.2}, quality {}, {} hop{})",
            pad(&s.original, 8),
            s.replacement,
            s.score,
            s.quality,
            s.hops,
            if s.hops == 1 { "" } else { "s" }
        );
    }
    if outcome.phrase_changes > 0 {
        eprintln!("  {} phrase rewrite(s)", outcome.phrase_changes);
    }
}
