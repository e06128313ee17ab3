//! Bounded-memory Japanese lexicon with a strengthened synonym graph.
//!
//! `LexicalStore` is loaded once (cache, raw source, or built-in seed) and is
//! then read-mostly. Graph strengthening runs as a separate pass that can be
//! planned under a read lock and merged under a write lock.

mod cache;
pub mod enhance;
mod entry;
mod graph;
mod quality;
mod seed;
mod source;
mod tokenize;

pub use cache::{read_metadata, CacheMetadata};
pub use enhance::{EnhancementPlan, GlossOverlap, SimilarityStrategy};
pub use entry::{estimate_frequency, DictionaryEntry, Level, PartOfSpeech, Register};
pub use graph::SynonymGraph;
pub use quality::quality_score;
pub use seed::seed_entries;
pub use source::{IngestBounds, IngestStats};
pub use tokenize::LexiconTokenizer;

use std::collections::HashMap;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{debug_span, info, warn};

use crate::settings::LexiconConfig;
use crate::unicode::katakana_to_hiragana;

/// The store as shared between the diversifier and background enhancement.
pub type SharedStore = Arc<RwLock<LexicalStore>>;

/// Errors from loading the raw source or the cache.
///
/// Never fatal to callers of the `load_*` methods: those recover by falling
/// back to the seed dictionary and report the error in `LoadReport`.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("invalid magic bytes (expected KTCH)")]
    InvalidMagic,

    #[error("unsupported version: {0}")]
    UnsupportedVersion(u8),

    #[error("checksum mismatch in {shard}")]
    Checksum { shard: String },

    #[error("corrupt shard {shard}: {reason}")]
    CorruptShard { shard: String, reason: String },

    #[error("serialization error: {0}")]
    Serialize(bincode::Error),

    #[error("metadata error: {0}")]
    Metadata(serde_json::Error),

    #[error("source contained no acceptable entries")]
    Empty,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LoadOrigin {
    Cache,
    Source,
    Seed,
}

/// Outcome of a load call. `error` holds the reason a fallback was taken.
#[derive(Debug, Clone)]
pub struct LoadReport {
    pub origin: LoadOrigin,
    pub entries: usize,
    pub edges: usize,
    pub truncated: bool,
    pub elapsed: Duration,
    pub error: Option<String>,
}

impl LoadReport {
    pub fn is_fallback(&self) -> bool {
        self.error.is_some()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StoreStats {
    pub entries: usize,
    /// Directed edges; twice the undirected count once the graph is closed.
    pub edges: usize,
    pub graph_words: usize,
    pub readings: usize,
    pub enhanced: bool,
    pub origin: LoadOrigin,
}

/// Constraints for `contextual_synonym`. Unset fields do not filter.
#[derive(Debug, Clone, Copy, Default)]
pub struct SynonymContext {
    pub register: Option<Register>,
    pub pos: Option<PartOfSpeech>,
}

/// Result of merging an enhancement plan.
#[derive(Debug, Clone, Default, Serialize)]
pub struct EnhancementSummary {
    pub added_edges: usize,
    pub reciprocal_edges: usize,
    pub grouped_links: usize,
    pub similarity_links: usize,
    pub sampled: usize,
}

pub struct LexicalStore {
    entries: HashMap<String, DictionaryEntry>,
    graph: SynonymGraph,
    by_reading: HashMap<String, Vec<String>>,
    by_pos: HashMap<PartOfSpeech, Vec<String>>,
    config: LexiconConfig,
    enhanced: bool,
    origin: LoadOrigin,
}

impl LexicalStore {
    /// A store holding only the seed dictionary.
    pub fn new(config: LexiconConfig) -> Self {
        let mut store = Self {
            entries: HashMap::new(),
            graph: SynonymGraph::new(),
            by_reading: HashMap::new(),
            by_pos: HashMap::new(),
            config,
            enhanced: false,
            origin: LoadOrigin::Seed,
        };
        store.load_seed();
        store
    }

    /// A store built from caller-supplied entries instead of a source file.
    pub fn from_entries(config: LexiconConfig, entries: Vec<DictionaryEntry>) -> Self {
        let mut store = Self::new(config);
        store.replace_entries(entries);
        store.origin = LoadOrigin::Source;
        store
    }

    pub fn into_shared(self) -> SharedStore {
        Arc::new(RwLock::new(self))
    }

    pub fn config(&self) -> &LexiconConfig {
        &self.config
    }

    /// Cache → source (then write the cache back) → seed. Failed steps leave
    /// the seed contents in place.
    pub fn open(
        config: LexiconConfig,
        cache_dir: Option<&Path>,
        source: Option<&Path>,
        bounds: IngestBounds,
    ) -> (Self, LoadReport) {
        let mut store = Self::new(config);
        let start = Instant::now();
        let mut reasons = Vec::new();

        if let Some(dir) = cache_dir {
            match store.try_load_cache(dir) {
                Ok(()) => {
                    let report = store.report(LoadOrigin::Cache, start, false, None);
                    return (store, report);
                }
                Err(e) => {
                    warn!(dir = %dir.display(), "cache unavailable: {e}");
                    reasons.push(format!("cache: {e}"));
                }
            }
        }
        if let Some(path) = source {
            match store.try_load_source(path, &bounds) {
                Ok(stats) => {
                    if let Some(dir) = cache_dir {
                        if let Err(e) = store.write_cache(dir) {
                            warn!(dir = %dir.display(), "cache write failed: {e}");
                        }
                    }
                    let report = store.report(LoadOrigin::Source, start, stats.truncated, None);
                    return (store, report);
                }
                Err(e) => {
                    warn!(path = %path.display(), "source unavailable: {e}");
                    reasons.push(format!("source: {e}"));
                }
            }
        }
        let error = (!reasons.is_empty()).then(|| reasons.join("; "));
        let report = store.report(LoadOrigin::Seed, start, false, error);
        (store, report)
    }

    /// Restore from a cache directory, falling back to the seed dictionary.
    pub fn load_from_cache(&mut self, dir: &Path) -> LoadReport {
        let start = Instant::now();
        match self.try_load_cache(dir) {
            Ok(()) => self.report(LoadOrigin::Cache, start, false, None),
            Err(e) => {
                warn!(dir = %dir.display(), "cache load failed, using seed: {e}");
                self.load_seed();
                self.report(LoadOrigin::Seed, start, false, Some(e.to_string()))
            }
        }
    }

    /// Stream the raw source under a memory budget and entry cap, falling back
    /// to the seed dictionary.
    pub fn load_from_source(
        &mut self,
        path: &Path,
        memory_budget_mb: usize,
        max_entries: usize,
    ) -> LoadReport {
        let start = Instant::now();
        let bounds = IngestBounds {
            memory_budget_mb,
            max_entries,
            batch_size: self.config.batch_size,
            avg_entry_overhead: self.config.avg_entry_overhead,
        };
        match self.try_load_source(path, &bounds) {
            Ok(stats) => self.report(LoadOrigin::Source, start, stats.truncated, None),
            Err(e) => {
                warn!(path = %path.display(), "source load failed, using seed: {e}");
                self.load_seed();
                self.report(LoadOrigin::Seed, start, false, Some(e.to_string()))
            }
        }
    }

    /// Replace the contents from a cache directory. On error the store is
    /// left unchanged.
    pub fn try_load_cache(&mut self, dir: &Path) -> Result<(), LoadError> {
        let contents = cache::read_cache(dir)?;
        self.entries = contents
            .entries
            .into_iter()
            .map(|e| (e.word.clone(), e))
            .collect();
        self.graph = contents.graph;
        self.by_reading = contents.by_reading;
        self.by_pos = contents.by_pos;
        self.enhanced = contents.metadata.enhanced;
        self.origin = LoadOrigin::Cache;
        info!(entries = self.entries.len(), "lexicon restored from cache");
        Ok(())
    }

    /// Replace the contents from a source file. On error the store is left
    /// unchanged.
    pub fn try_load_source(
        &mut self,
        path: &Path,
        bounds: &IngestBounds,
    ) -> Result<IngestStats, LoadError> {
        let file = File::open(path)?;
        self.try_load_reader(BufReader::new(file), bounds)
    }

    pub fn try_load_reader<R: BufRead>(
        &mut self,
        reader: R,
        bounds: &IngestBounds,
    ) -> Result<IngestStats, LoadError> {
        let _span = debug_span!("load_source").entered();
        let mut loaded = Vec::new();
        let stats = source::ingest(reader, bounds, |batch| loaded.extend(batch))?;
        self.replace_entries(loaded);
        self.origin = LoadOrigin::Source;
        info!(
            accepted = stats.accepted,
            rejected = stats.rejected,
            truncated = stats.truncated,
            "lexicon ingested"
        );
        Ok(stats)
    }

    /// Replace the contents with the built-in seed dictionary.
    pub fn load_seed(&mut self) {
        self.replace_entries(seed_entries());
        self.origin = LoadOrigin::Seed;
    }

    pub fn write_cache(&self, dir: &Path) -> Result<CacheMetadata, LoadError> {
        let mut entries: Vec<&DictionaryEntry> = self.entries.values().collect();
        entries.sort_by(|a, b| a.word.cmp(&b.word));
        cache::write_cache(
            dir,
            cache::CacheInput {
                entries,
                graph: &self.graph,
                by_reading: &self.by_reading,
                by_pos: &self.by_pos,
                enhanced: self.enhanced,
            },
            self.config.chunk_size,
        )
    }

    fn report(
        &self,
        origin: LoadOrigin,
        start: Instant,
        truncated: bool,
        error: Option<String>,
    ) -> LoadReport {
        LoadReport {
            origin,
            entries: self.entries.len(),
            edges: self.graph.edge_count(),
            truncated,
            elapsed: start.elapsed(),
            error,
        }
    }

    fn replace_entries(&mut self, list: Vec<DictionaryEntry>) {
        self.entries.clear();
        self.by_reading.clear();
        self.by_pos.clear();
        self.graph = SynonymGraph::new();
        self.enhanced = false;
        for entry in list {
            self.insert_entry(entry);
        }
        for entry in self.entries.values() {
            for syn in &entry.synonyms {
                if self.entries.contains_key(syn) {
                    self.graph
                        .insert_directed(&entry.word, syn, self.config.dictionary_weight);
                }
            }
        }
        self.finish_graph();
    }

    /// Homographs from separate source entries are merged into one entry.
    fn insert_entry(&mut self, entry: DictionaryEntry) {
        if let Some(reading) = &entry.reading {
            let list = self
                .by_reading
                .entry(katakana_to_hiragana(reading))
                .or_default();
            if !list.contains(&entry.word) {
                list.push(entry.word.clone());
            }
        }
        for pos in &entry.pos {
            let list = self.by_pos.entry(*pos).or_default();
            if !list.contains(&entry.word) {
                list.push(entry.word.clone());
            }
        }
        match self.entries.get_mut(&entry.word) {
            Some(existing) => {
                for d in entry.definitions {
                    if !existing.definitions.contains(&d) {
                        existing.definitions.push(d);
                    }
                }
                for s in entry.synonyms {
                    if !existing.synonyms.contains(&s) {
                        existing.synonyms.push(s);
                    }
                }
                for a in entry.antonyms {
                    if !existing.antonyms.contains(&a) {
                        existing.antonyms.push(a);
                    }
                }
                existing.pos.extend(entry.pos);
                if entry.frequency > existing.frequency {
                    existing.frequency = entry.frequency;
                    existing.level = entry.level;
                }
                if existing.reading.is_none() {
                    existing.reading = entry.reading;
                }
            }
            None => {
                self.entries.insert(entry.word.clone(), entry);
            }
        }
    }

    /// Close the graph, then sync each entry's synonym list and quality
    /// score with it. Returns the number of reverse edges added.
    fn finish_graph(&mut self) -> usize {
        let added = self.graph.close_reciprocal();
        let sample = self.config.quality_sample;
        let updates: Vec<(String, Vec<String>, u8)> = self
            .entries
            .keys()
            .map(|word| {
                let synonyms = self
                    .graph
                    .ranked_neighbors(word)
                    .into_iter()
                    .map(|(n, _)| n.to_string())
                    .collect();
                let score = quality_score(&self.graph, &self.entries, word, sample);
                (word.clone(), synonyms, score)
            })
            .collect();
        for (word, synonyms, score) in updates {
            if let Some(entry) = self.entries.get_mut(&word) {
                entry.synonyms = synonyms;
                entry.quality = score;
            }
        }
        added
    }

    // --- lookup ---

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn origin(&self) -> LoadOrigin {
        self.origin
    }

    pub fn is_enhanced(&self) -> bool {
        self.enhanced
    }

    pub fn graph(&self) -> &SynonymGraph {
        &self.graph
    }

    pub fn entries(&self) -> impl Iterator<Item = &DictionaryEntry> {
        self.entries.values()
    }

    pub fn get_entry(&self, word: &str) -> Option<&DictionaryEntry> {
        self.entries.get(word)
    }

    pub fn quality(&self, word: &str) -> u8 {
        self.entries.get(word).map_or(0, |e| e.quality)
    }

    pub fn words_by_pos(&self, pos: PartOfSpeech) -> &[String] {
        self.by_pos.get(&pos).map_or(&[], |v| v.as_slice())
    }

    /// Katakana readings are matched as hiragana.
    pub fn words_by_reading(&self, reading: &str) -> &[String] {
        self.by_reading
            .get(&katakana_to_hiragana(reading))
            .map_or(&[], |v| v.as_slice())
    }

    /// Top `max_results` synonyms, most frequent first, then by edge weight.
    pub fn synonyms(&self, word: &str, max_results: usize) -> Vec<String> {
        let mut ranked: Vec<(&str, f32, u32)> = self
            .graph
            .ranked_neighbors(word)
            .into_iter()
            .map(|(n, w)| (n, w, self.entries.get(n).map_or(0, |e| e.frequency)))
            .collect();
        // Stable sort keeps the weight/lexical order among equal frequencies.
        ranked.sort_by(|a, b| b.2.cmp(&a.2));
        ranked
            .into_iter()
            .take(max_results)
            .map(|(n, _, _)| n.to_string())
            .collect()
    }

    /// Best synonym matching the requested register and part of speech;
    /// falls back to the best unrestricted synonym.
    pub fn contextual_synonym(&self, word: &str, context: &SynonymContext) -> Option<String> {
        let candidates = self.synonyms(word, usize::MAX);
        let matches = |candidate: &String| {
            let Some(entry) = self.entries.get(candidate) else {
                return false;
            };
            context.register.map_or(true, |r| entry.register == r)
                && context.pos.map_or(true, |p| entry.pos.contains(&p))
        };
        candidates
            .iter()
            .find(|c| matches(c))
            .or_else(|| candidates.first())
            .cloned()
    }

    pub fn stats(&self) -> StoreStats {
        StoreStats {
            entries: self.entries.len(),
            edges: self.graph.edge_count(),
            graph_words: self.graph.node_count(),
            readings: self.by_reading.len(),
            enhanced: self.enhanced,
            origin: self.origin,
        }
    }

    // --- strengthening ---

    /// Run both augmentation passes and merge them. Existing edges are kept.
    pub fn build_enhanced_synonym_map(&mut self) -> EnhancementSummary {
        let strategy = GlossOverlap::new(self.config.gloss_prefix_tokens);
        let plan = self.plan_enhancement(&strategy);
        self.apply_enhancement(plan)
    }

    pub fn plan_enhancement(&self, strategy: &dyn SimilarityStrategy) -> EnhancementPlan {
        enhance::plan(&self.entries, &self.config, strategy)
    }

    pub fn apply_enhancement(&mut self, plan: EnhancementPlan) -> EnhancementSummary {
        let _span = debug_span!("apply_enhancement", edges = plan.edges.len()).entered();
        let mut added_edges = 0;
        for (a, b, weight) in &plan.edges {
            if self.graph.link(a, b, *weight) {
                added_edges += 1;
            }
        }
        let reciprocal_edges = self.finish_graph();
        self.enhanced = true;
        let summary = EnhancementSummary {
            added_edges,
            reciprocal_edges,
            grouped_links: plan.grouped_links,
            similarity_links: plan.similarity_links,
            sampled: plan.sampled,
        };
        info!(
            added = summary.added_edges,
            edges = self.graph.edge_count(),
            "synonym graph strengthened"
        );
        summary
    }
}
