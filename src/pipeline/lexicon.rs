//! Word tables used by the normalizer and the heuristic fallback.
//!
//! Tables are grouped per language so a new language is one more table plus
//! one more `with_*` call; the control flow in `normalizer` and `rules` never
//! changes.

use std::collections::HashSet;
use std::sync::LazyLock;

/// Portuguese stopwords.
pub const STOPWORDS_PT: &[&str] = &[
    "a", "o", "as", "os", "de", "da", "do", "das", "dos", "e", "é", "em", "para", "por", "com",
    "na", "no", "nas", "nos", "um", "uma", "uns", "umas", "ao", "à", "se", "que", "qual",
    "quais", "sobre", "sem", "até", "entre",
];

/// English stopwords.
pub const STOPWORDS_EN: &[&str] = &[
    "the", "a", "an", "and", "or", "for", "to", "in", "on", "of", "is", "are", "as", "by",
    "with", "at", "from", "this", "that", "these", "those",
];

/// Keywords that mark a message as needing action. Matched as substrings of
/// the lowercase signal string, so accented and unaccented spellings are
/// both listed.
pub const PRODUCTIVE_KEYWORDS_PT: &[&str] = &[
    "status",
    "chamado",
    "suporte",
    "atualizacao",
    "atualização",
    "erro",
    "problema",
    "anexo",
    "fatura",
    "contrato",
    "prazo",
    "urgente",
    "reunião",
    "reuniao",
    "agendar",
    "solicito",
    "solicitação",
    "solicitacao",
];

pub const PRODUCTIVE_KEYWORDS_EN: &[&str] = &[
    "ticket",
    "support",
    "error",
    "problem",
    "attachment",
    "invoice",
    "contract",
    "deadline",
    "urgent",
    "meeting",
    "request",
];

/// Reply used by the fallback when the message needs action.
pub const PRODUCTIVE_REPLY: &str = "Olá, obrigado pelo contato. Já registrei sua solicitação e \
                                    retornarei com uma atualização em breve.";

/// Reply used by the fallback when no action is needed.
pub const UNPRODUCTIVE_REPLY: &str = "Olá, obrigado pela mensagem! Ficamos à disposição.";

/// Stopwords, keywords and fallback replies bundled together.
#[derive(Debug, Clone)]
pub struct Lexicon {
    stopwords: HashSet<String>,
    productive_keywords: Vec<String>,
    productive_reply: String,
    unproductive_reply: String,
}

static BUILTIN: LazyLock<Lexicon> = LazyLock::new(|| {
    Lexicon::empty()
        .with_stopwords(STOPWORDS_PT)
        .with_stopwords(STOPWORDS_EN)
        .with_keywords(PRODUCTIVE_KEYWORDS_PT)
        .with_keywords(PRODUCTIVE_KEYWORDS_EN)
});

impl Lexicon {
    /// Portuguese + English tables with the default replies.
    pub fn builtin() -> &'static Lexicon {
        &BUILTIN
    }

    /// No stopwords, no keywords, default replies.
    pub fn empty() -> Self {
        Self {
            stopwords: HashSet::new(),
            productive_keywords: Vec::new(),
            productive_reply: PRODUCTIVE_REPLY.to_string(),
            unproductive_reply: UNPRODUCTIVE_REPLY.to_string(),
        }
    }

    pub fn with_stopwords(mut self, words: &[&str]) -> Self {
        self.stopwords
            .extend(words.iter().map(|w| w.to_lowercase()));
        self
    }

    pub fn with_keywords(mut self, words: &[&str]) -> Self {
        for word in words {
            let word = word.trim().to_lowercase();
            if !word.is_empty() && !self.productive_keywords.contains(&word) {
                self.productive_keywords.push(word);
            }
        }
        self
    }

    pub fn is_stopword(&self, token: &str) -> bool {
        self.stopwords.contains(token)
    }

    pub fn productive_keywords(&self) -> &[String] {
        &self.productive_keywords
    }

    pub fn productive_reply(&self) -> &str {
        &self.productive_reply
    }

    pub fn unproductive_reply(&self) -> &str {
        &self.unproductive_reply
    }
}

impl Default for Lexicon {
    fn default() -> Self {
        Lexicon::builtin().clone()
    }
}
