//! Classification pipeline.
//!
//! Every request flows through:
//! 1. `normalizer::clean_text()`: markup and whitespace cleanup
//! 2. `normalizer::extract_signals()`: stopword-filtered tokens
//! 3. `rules::HeuristicRules`: keyword verdict held in reserve
//! 4. `classifier::Classifier`: one inference call, heuristic on any failure
//!
//! Nothing is shared between requests except read-only tables.

pub mod classifier;
pub mod lexicon;
pub mod normalizer;
pub mod rules;
pub mod types;
