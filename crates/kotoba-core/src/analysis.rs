//! Narrow interfaces to the text-analysis collaborators: morphological
//! tokenization and context prediction.

use crate::lexicon::PartOfSpeech;
use crate::unicode::{dominant_script, Script};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub surface: String,
    pub pos: PartOfSpeech,
}

impl Token {
    pub fn new(surface: impl Into<String>, pos: PartOfSpeech) -> Self {
        Self {
            surface: surface.into(),
            pos,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ContextPrediction {
    pub category: String,
    /// Confidence in [0, 1].
    pub confidence: f32,
}

#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    #[error("tokenizer failed: {0}")]
    Tokenize(String),
    #[error("context prediction failed: {0}")]
    Predict(String),
    #[error("collaborator unavailable: {0}")]
    Unavailable(String),
}

/// Splits text into an ordered token list whose surfaces, concatenated,
/// reproduce the input (whitespace may be dropped).
pub trait Tokenizer: Send + Sync {
    fn tokenize(&self, text: &str) -> Result<Vec<Token>, AnalysisError>;
}

pub trait ContextPredictor: Send + Sync {
    fn predict_context(&self, text: &str) -> Result<ContextPrediction, AnalysisError>;
}

/// Predicts a category from the dominant script of the text. Stands in when
/// no statistical predictor is wired up.
#[derive(Debug, Default, Clone, Copy)]
pub struct ScriptContextPredictor;

impl ContextPredictor for ScriptContextPredictor {
    fn predict_context(&self, text: &str) -> Result<ContextPrediction, AnalysisError> {
        let (script, share) = dominant_script(text.trim())
            .ok_or_else(|| AnalysisError::Predict("empty text".to_string()))?;
        let category = match script {
            Script::Kanji => "sino",
            Script::Hiragana => "native",
            Script::Katakana => "loanword",
            Script::Latin => "latin",
            Script::Digit => "numeric",
            Script::Other => "symbol",
        };
        Ok(ContextPrediction {
            category: category.to_string(),
            confidence: share,
        })
    }
}
