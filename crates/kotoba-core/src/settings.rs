//! Global settings loaded from TOML.
//!
//! - `init_custom(toml_content)` sets a custom TOML before first `settings()` call
//! - `settings()` returns `&'static Settings` (lazy-init singleton)
//! - Default values are embedded via `include_str!("default_settings.toml")`
//!
//! Components never read the singleton directly while running: each takes its
//! own config struct, whose `Default` impl copies the corresponding section.

use std::sync::OnceLock;

use serde::{Deserialize, Serialize};

use crate::lexicon::PartOfSpeech;

pub const DEFAULT_SETTINGS_TOML: &str = include_str!("default_settings.toml");

static CUSTOM_TOML: OnceLock<String> = OnceLock::new();

/// Set custom TOML before first `settings()` call.
pub fn init_custom(toml_content: String) -> Result<(), SettingsError> {
    parse_settings_toml(&toml_content)?;
    CUSTOM_TOML
        .set(toml_content)
        .map_err(|_| SettingsError::AlreadyInitialized)
}

/// Get or initialize the global settings singleton.
pub fn settings() -> &'static Settings {
    static INSTANCE: OnceLock<Settings> = OnceLock::new();
    INSTANCE.get_or_init(|| {
        let custom = CUSTOM_TOML.get().map(|s| s.as_str());
        custom
            .and_then(|toml_str| parse_settings_toml(toml_str).ok())
            .or_else(|| parse_settings_toml(DEFAULT_SETTINGS_TOML).ok())
            .unwrap_or_else(Settings::builtin)
    })
}

/// Returns the embedded default settings TOML content.
pub fn default_toml() -> &'static str {
    DEFAULT_SETTINGS_TOML
}

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("TOML parse error: {0}")]
    Parse(String),
    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },
    #[error("settings already initialized")]
    AlreadyInitialized,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub lexicon: LexiconConfig,
    pub learning: LearningConfig,
    pub diversify: DiversifierConfig,
}

/// Ingestion bounds and synonym-graph strengthening parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LexiconConfig {
    pub memory_budget_mb: usize,
    pub max_entries: usize,
    pub batch_size: usize,
    pub chunk_size: usize,
    /// Fixed per-entry bytes added to the measured string payload.
    pub avg_entry_overhead: usize,
    pub sample_size: usize,
    pub neighbor_window: usize,
    pub similarity_threshold: f32,
    pub gloss_prefix_tokens: usize,
    pub min_group_size: usize,
    pub max_group_size: usize,
    pub group_weight: f32,
    pub dictionary_weight: f32,
    pub quality_sample: usize,
}

/// Promotion, decay and scoring parameters of the relationship learner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LearningConfig {
    pub min_co_occurrence: u32,
    pub strength_threshold: f32,
    pub max_relations_per_term: usize,
    /// Multiplicative decay per elapsed day.
    pub decay_factor: f32,
    pub learning_rate: f32,
    pub prune_below: f32,
    /// Character distance at which proximity reaches zero.
    pub proximity_window: usize,
    pub proximity_weight: f32,
    pub semantic_weight: f32,
    pub transitive_weight: f32,
    pub prediction_confidence: f32,
    pub pattern_similarity: f32,
    pub max_contexts: usize,
    pub context_snippet_chars: usize,
    pub autosave_interval_secs: u64,
    /// Additionally require a significant chi-square (above chance) before
    /// promoting a pair.
    pub require_significance: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiversifierConfig {
    pub target_pos: Vec<PartOfSpeech>,
    pub quality_reject_below: u8,
    pub quality_accept_at: u8,
    pub tone_delta_max: u8,
    pub anti_repetition_window_minutes: u64,
    pub history_cap: usize,
    pub two_hop_min_weight: f32,
    pub two_hop_penalty: f32,
    pub max_direct_neighbors: usize,
    pub max_candidates: usize,
    pub user_graph_bonus: f32,
    pub vary_connectives: bool,
    pub auto_enhance: bool,
}

impl Default for LexiconConfig {
    fn default() -> Self {
        settings().lexicon.clone()
    }
}

impl Default for LearningConfig {
    fn default() -> Self {
        settings().learning.clone()
    }
}

impl Default for DiversifierConfig {
    fn default() -> Self {
        settings().diversify.clone()
    }
}

impl Settings {
    /// Hard-coded copy of `default_settings.toml`, used only if the embedded
    /// document somehow fails to parse (build.rs rejects that at compile time).
    fn builtin() -> Self {
        Self {
            lexicon: LexiconConfig {
                memory_budget_mb: 256,
                max_entries: 200_000,
                batch_size: 500,
                chunk_size: 5000,
                avg_entry_overhead: 160,
                sample_size: 1000,
                neighbor_window: 50,
                similarity_threshold: 0.5,
                gloss_prefix_tokens: 12,
                min_group_size: 2,
                max_group_size: 20,
                group_weight: 0.7,
                dictionary_weight: 1.0,
                quality_sample: 5,
            },
            learning: LearningConfig {
                min_co_occurrence: 2,
                strength_threshold: 0.3,
                max_relations_per_term: 10,
                decay_factor: 0.95,
                learning_rate: 0.1,
                prune_below: 0.1,
                proximity_window: 10,
                proximity_weight: 0.5,
                semantic_weight: 0.3,
                transitive_weight: 0.2,
                prediction_confidence: 0.5,
                pattern_similarity: 0.5,
                max_contexts: 5,
                context_snippet_chars: 60,
                autosave_interval_secs: 300,
                require_significance: false,
            },
            diversify: DiversifierConfig {
                target_pos: vec![
                    PartOfSpeech::Noun,
                    PartOfSpeech::Verb,
                    PartOfSpeech::Adjective,
                    PartOfSpeech::Adverb,
                ],
                quality_reject_below: 30,
                quality_accept_at: 70,
                tone_delta_max: 2,
                anti_repetition_window_minutes: 30,
                history_cap: 10,
                two_hop_min_weight: 0.6,
                two_hop_penalty: 0.8,
                max_direct_neighbors: 10,
                max_candidates: 20,
                user_graph_bonus: 0.15,
                vary_connectives: false,
                auto_enhance: true,
            },
        }
    }
}

pub fn parse_settings_toml(toml_str: &str) -> Result<Settings, SettingsError> {
    let s: Settings = toml::from_str(toml_str).map_err(|e| SettingsError::Parse(e.to_string()))?;
    validate(&s)?;
    Ok(s)
}

fn validate(s: &Settings) -> Result<(), SettingsError> {
    macro_rules! check_positive {
        ($section:ident . $field:ident) => {
            if s.$section.$field == 0 {
                return Err(SettingsError::InvalidValue {
                    field: concat!(stringify!($section), ".", stringify!($field)).to_string(),
                    reason: "must be positive".to_string(),
                });
            }
        };
    }
    macro_rules! check_unit_interval {
        ($section:ident . $field:ident) => {
            if !(0.0..=1.0).contains(&s.$section.$field) {
                return Err(SettingsError::InvalidValue {
                    field: concat!(stringify!($section), ".", stringify!($field)).to_string(),
                    reason: "must be within [0, 1]".to_string(),
                });
            }
        };
    }
    macro_rules! check_percent {
        ($section:ident . $field:ident) => {
            if s.$section.$field > 100 {
                return Err(SettingsError::InvalidValue {
                    field: concat!(stringify!($section), ".", stringify!($field)).to_string(),
                    reason: "must be within [0, 100]".to_string(),
                });
            }
        };
    }

    check_positive!(lexicon.memory_budget_mb);
    check_positive!(lexicon.max_entries);
    check_positive!(lexicon.batch_size);
    check_positive!(lexicon.chunk_size);
    check_positive!(lexicon.sample_size);
    check_positive!(lexicon.neighbor_window);
    check_positive!(lexicon.gloss_prefix_tokens);
    check_positive!(lexicon.quality_sample);
    check_unit_interval!(lexicon.similarity_threshold);
    check_unit_interval!(lexicon.group_weight);
    check_unit_interval!(lexicon.dictionary_weight);
    if s.lexicon.min_group_size < 2 || s.lexicon.min_group_size > s.lexicon.max_group_size {
        return Err(SettingsError::InvalidValue {
            field: "lexicon.min_group_size".to_string(),
            reason: "must be at least 2 and not exceed lexicon.max_group_size".to_string(),
        });
    }

    check_positive!(learning.min_co_occurrence);
    check_positive!(learning.max_relations_per_term);
    check_positive!(learning.proximity_window);
    check_positive!(learning.max_contexts);
    check_positive!(learning.context_snippet_chars);
    check_positive!(learning.autosave_interval_secs);
    check_unit_interval!(learning.strength_threshold);
    check_unit_interval!(learning.learning_rate);
    check_unit_interval!(learning.prune_below);
    check_unit_interval!(learning.proximity_weight);
    check_unit_interval!(learning.semantic_weight);
    check_unit_interval!(learning.transitive_weight);
    check_unit_interval!(learning.prediction_confidence);
    check_unit_interval!(learning.pattern_similarity);
    if s.learning.decay_factor <= 0.0 || s.learning.decay_factor > 1.0 {
        return Err(SettingsError::InvalidValue {
            field: "learning.decay_factor".to_string(),
            reason: "must be within (0, 1]".to_string(),
        });
    }

    check_percent!(diversify.quality_reject_below);
    check_percent!(diversify.quality_accept_at);
    if s.diversify.quality_reject_below > s.diversify.quality_accept_at {
        return Err(SettingsError::InvalidValue {
            field: "diversify.quality_reject_below".to_string(),
            reason: "must not exceed diversify.quality_accept_at".to_string(),
        });
    }
    if s.diversify.tone_delta_max > 3 {
        return Err(SettingsError::InvalidValue {
            field: "diversify.tone_delta_max".to_string(),
            reason: "tone levels range over 0..=3".to_string(),
        });
    }
    if s.diversify.target_pos.is_empty() {
        return Err(SettingsError::InvalidValue {
            field: "diversify.target_pos".to_string(),
            reason: "must name at least one part of speech".to_string(),
        });
    }
    check_positive!(diversify.anti_repetition_window_minutes);
    check_positive!(diversify.history_cap);
    check_positive!(diversify.max_direct_neighbors);
    check_positive!(diversify.max_candidates);
    check_unit_interval!(diversify.two_hop_min_weight);
    check_unit_interval!(diversify.two_hop_penalty);
    check_unit_interval!(diversify.user_graph_bonus);

    Ok(())
}
