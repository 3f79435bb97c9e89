//! Intent classification for incoming messages.

use std::fmt;

/// What kind of answer a message is asking for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Intent {
    /// Recall of facts the user stated about themselves.
    Personal,
    /// A question about the session's uploaded documents.
    Document,
    /// Anything else.
    General,
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Intent::Personal => write!(f, "personal"),
            Intent::Document => write!(f, "document"),
            Intent::General => write!(f, "general"),
        }
    }
}

/// Decides the [`Intent`] of a message.
pub trait IntentClassifier: Send + Sync {
    /// `has_index` tells whether the session owns a document index;
    /// without one a message is never classified as [`Intent::Document`].
    fn classify(&self, message: &str, has_index: bool) -> Intent;
}

const PERSONAL_KEYWORDS: &[&str] = &[
    "my name",
    "what is my",
    "who am i",
    "remember",
    "i told you",
    "what did i say",
    "do you know my",
    "about me",
    "my age",
    "my job",
    "my work",
    "my hobby",
    "my favorite",
    "where do i",
];

const DOCUMENT_KEYWORDS: &[&str] = &[
    "document",
    "pdf",
    "file",
    "text",
    "according to",
    "based on",
    "in the document",
    "what does it say",
    "from the file",
];

/// Case-insensitive substring matching against fixed keyword lists.
///
/// Personal keywords are checked first, then document keywords.
#[derive(Debug, Clone)]
pub struct KeywordClassifier {
    personal: Vec<String>,
    document: Vec<String>,
}

impl Default for KeywordClassifier {
    fn default() -> Self {
        Self::new(PERSONAL_KEYWORDS, DOCUMENT_KEYWORDS)
    }
}

impl KeywordClassifier {
    pub fn new(personal: &[&str], document: &[&str]) -> Self {
        let lower = |words: &[&str]| -> Vec<String> { words.iter().map(|w| w.to_lowercase()).collect() };
        Self {
            personal: lower(personal),
            document: lower(document),
        }
    }
}

impl IntentClassifier for KeywordClassifier {
    fn classify(&self, message: &str, has_index: bool) -> Intent {
        let lower = message.to_lowercase();
        let hit = |keywords: &[String]| keywords.iter().any(|k| lower.contains(k.as_str()));

        if hit(&self.personal) {
            Intent::Personal
        } else if has_index && hit(&self.document) {
            Intent::Document
        } else {
            Intent::General
        }
    }
}
