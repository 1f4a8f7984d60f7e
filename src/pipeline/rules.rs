//! Keyword heuristic used when the inference service cannot answer.
//!
//! The check runs on every request, before the model is called, so the
//! fallback verdict is ready the moment the inference path fails.

use tracing::debug;

use crate::pipeline::lexicon::Lexicon;
use crate::pipeline::types::{Category, Judgement};

/// Confidence reported for a heuristic "productive" verdict.
pub const PRODUCTIVE_CONFIDENCE: f64 = 0.65;

/// Confidence reported for a heuristic "unproductive" verdict.
pub const UNPRODUCTIVE_CONFIDENCE: f64 = 0.55;

/// Keyword rules plus the fixed fallback replies.
#[derive(Debug, Clone)]
pub struct HeuristicRules {
    keywords: Vec<String>,
    productive_reply: String,
    unproductive_reply: String,
}

impl HeuristicRules {
    pub fn from_lexicon(lexicon: &Lexicon) -> Self {
        Self {
            keywords: lexicon.productive_keywords().to_vec(),
            productive_reply: lexicon.productive_reply().to_string(),
            unproductive_reply: lexicon.unproductive_reply().to_string(),
        }
    }

    /// True if any keyword appears as a substring of the signal string.
    pub fn is_likely_productive(&self, signals: &str) -> bool {
        let signals = signals.to_lowercase();
        match self.keywords.iter().find(|k| signals.contains(k.as_str())) {
            Some(keyword) => {
                debug!(keyword = %keyword, "Heuristic matched productive keyword");
                true
            }
            None => false,
        }
    }

    /// The verdict the fallback path returns for a heuristic outcome.
    pub fn judgement(&self, likely_productive: bool) -> Judgement {
        if likely_productive {
            Judgement {
                category: Category::Productive,
                confidence: PRODUCTIVE_CONFIDENCE,
                suggested_response: self.productive_reply.clone(),
            }
        } else {
            Judgement {
                category: Category::Unproductive,
                confidence: UNPRODUCTIVE_CONFIDENCE,
                suggested_response: self.unproductive_reply.clone(),
            }
        }
    }
}
