//! Text normalization: markup stripping, whitespace collapsing, and the
//! stopword-filtered token signal handed to the classifier.

use std::sync::LazyLock;

use regex::Regex;

use crate::error::InputError;
use crate::pipeline::lexicon::Lexicon;

static HTML_TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]+>").unwrap());
static MULTISPACE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());
static TOKEN_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[\p{L}\p{Nd}#]+").unwrap());

/// Clean raw message text.
///
/// Line breaks become spaces, `<...>` tags are replaced by a space, and every
/// whitespace run collapses to a single space. The result is trimmed on both
/// ends, so cleaning an already-clean string is a no-op.
pub fn clean_text(raw: &str) -> Result<String, InputError> {
    let text = raw.replace(['\r', '\n'], " ");
    let text = HTML_TAG_RE.replace_all(text.trim(), " ");
    let text = MULTISPACE_RE.replace_all(&text, " ");
    let text = text.trim();

    if text.is_empty() {
        return Err(InputError::EmptyAfterCleaning);
    }
    Ok(text.to_string())
}

/// Extract signal tokens using the built-in Portuguese + English tables.
pub fn extract_signals(cleaned: &str) -> String {
    extract_signals_with(cleaned, Lexicon::builtin())
}

/// Lowercase, tokenize, drop stopwords and one-character tokens, and join
/// the survivors with single spaces. May return an empty string.
pub fn extract_signals_with(cleaned: &str, lexicon: &Lexicon) -> String {
    let lowered = cleaned.to_lowercase();
    TOKEN_RE
        .find_iter(&lowered)
        .map(|m| m.as_str())
        .filter(|token| token.chars().count() > 1 && !lexicon.is_stopword(token))
        .collect::<Vec<_>>()
        .join(" ")
}
