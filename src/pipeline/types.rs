//! Shared types for the classification pipeline.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ── Category ────────────────────────────────────────────────────────

/// Whether an email needs an actionable response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Category {
    Productive,
    Unproductive,
}

impl Category {
    /// Parse a model-supplied label. Accepts the English labels and the
    /// Portuguese ones the prompt asks for, case-insensitively.
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_lowercase().as_str() {
            "productive" | "produtivo" => Some(Self::Productive),
            "unproductive" | "improdutivo" => Some(Self::Unproductive),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Productive => "Productive",
            Self::Unproductive => "Unproductive",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// ── Source ──────────────────────────────────────────────────────────

/// Which path produced the verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Source {
    #[serde(rename = "inference")]
    Inference,
    #[serde(rename = "fallback-heuristic")]
    FallbackHeuristic,
}

impl Source {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Inference => "inference",
            Self::FallbackHeuristic => "fallback-heuristic",
        }
    }
}

// ── Verdict ─────────────────────────────────────────────────────────

/// Category, confidence and reply, however they were obtained.
#[derive(Debug, Clone, PartialEq)]
pub struct Judgement {
    pub category: Category,
    /// Always within `[0.0, 1.0]`.
    pub confidence: f64,
    pub suggested_response: String,
}

/// Why the heuristic was used instead of the model's answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FallbackReason {
    /// The call itself failed: transport error, timeout, non-2xx status.
    Unavailable(String),
    /// The call succeeded but the reply could not be decoded.
    Undecodable(String),
}

/// Outcome of the classify-with-fallback state machine.
#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    Inference(Judgement),
    Heuristic {
        judgement: Judgement,
        reason: FallbackReason,
    },
}

impl Verdict {
    pub fn source(&self) -> Source {
        match self {
            Self::Inference(_) => Source::Inference,
            Self::Heuristic { .. } => Source::FallbackHeuristic,
        }
    }

    fn into_judgement(self) -> Judgement {
        match self {
            Self::Inference(j) => j,
            Self::Heuristic { judgement, .. } => judgement,
        }
    }
}

// ── Result ──────────────────────────────────────────────────────────

/// Metadata attached to every classification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultMetadata {
    /// When the result was built.
    pub timestamp: DateTime<Utc>,
    /// Characters in the cleaned text.
    pub text_length: usize,
    /// Characters in the signal string.
    pub processed_length: usize,
    pub source: Source,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
}

/// Structured verdict returned to the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub category: Category,
    pub confidence: f64,
    pub suggested_response: String,
    /// Seconds, rounded to milliseconds.
    pub processing_time: f64,
    pub metadata: ResultMetadata,
}

impl ClassificationResult {
    pub fn new(
        verdict: Verdict,
        elapsed: Duration,
        text_length: usize,
        processed_length: usize,
        filename: Option<String>,
    ) -> Self {
        let source = verdict.source();
        let judgement = verdict.into_judgement();
        Self {
            category: judgement.category,
            confidence: judgement.confidence,
            suggested_response: judgement.suggested_response,
            processing_time: round_millis(elapsed),
            metadata: ResultMetadata {
                timestamp: Utc::now(),
                text_length,
                processed_length,
                source,
                filename,
            },
        }
    }
}

fn round_millis(elapsed: Duration) -> f64 {
    (elapsed.as_secs_f64() * 1000.0).round() / 1000.0
}
