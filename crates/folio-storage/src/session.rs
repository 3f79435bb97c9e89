//! Typed session record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use folio_core::types::{Message, Role, SessionId, GENERAL_CHAT_LABEL};
use folio_vector::index::SemanticIndex;

/// Separator between document names in a multi-document label.
const FILENAME_SEPARATOR: &str = ", ";

/// A conversational session and its optional document index.
#[derive(Debug, Clone)]
pub struct Session {
    pub id: SessionId,
    /// Display label: "General Chat", one document name, or a sorted,
    /// comma-joined list of document names. Derived from `documents`.
    pub filename: String,
    /// Attached document names, sorted and unique.
    pub documents: Vec<String>,
    pub chat_history: Vec<Message>,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    pub index: Option<SemanticIndex>,
}

impl Session {
    /// A fresh session with empty history and no document.
    pub fn new(id: SessionId) -> Self {
        let now = Utc::now();
        Self {
            id,
            filename: GENERAL_CHAT_LABEL.to_string(),
            documents: Vec::new(),
            chat_history: Vec::new(),
            created_at: now,
            last_activity: now,
            index: None,
        }
    }

    pub fn has_index(&self) -> bool {
        self.index.is_some()
    }

    /// Advance `last_activity` to now. Never moves it backwards.
    pub fn touch(&mut self) {
        let now = Utc::now();
        if now > self.last_activity {
            self.last_activity = now;
        }
    }

    /// Append a message and update `last_activity`.
    pub fn push_message(&mut self, role: Role, content: impl Into<String>) {
        self.chat_history.push(Message::new(role, content));
        self.touch();
    }

    /// Add a document name to the display label.
    ///
    /// The "General Chat" placeholder is replaced. Otherwise names are kept
    /// unique (case-sensitive) and sorted.
    pub fn add_document_name(&mut self, name: &str) {
        let name = name.trim();
        if name.is_empty() {
            return;
        }
        if let Err(pos) = self.documents.binary_search_by(|d| d.as_str().cmp(name)) {
            self.documents.insert(pos, name.to_string());
        }
        self.filename = label_for(&self.documents);
    }

    /// The persisted form, without the index itself.
    pub fn to_record(&self) -> SessionRecord {
        SessionRecord {
            session_id: self.id.clone(),
            filename: self.filename.clone(),
            documents: self.documents.clone(),
            chat_history: self.chat_history.clone(),
            created_at: self.created_at,
            last_activity: self.last_activity,
            has_index: self.index.is_some(),
        }
    }

    /// Rebuild a session from its record and an already-loaded index.
    pub fn from_record(record: SessionRecord, index: Option<SemanticIndex>) -> Self {
        // Records without a name list carry at most one label; keep it whole.
        let documents = if record.documents.is_empty() && record.filename != GENERAL_CHAT_LABEL {
            vec![record.filename]
        } else {
            record.documents
        };
        Self {
            id: record.session_id,
            filename: label_for(&documents),
            documents,
            chat_history: record.chat_history,
            created_at: record.created_at,
            last_activity: record.last_activity,
            index,
        }
    }
}

/// JSON structured record stored per session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub session_id: SessionId,
    pub filename: String,
    #[serde(default)]
    pub documents: Vec<String>,
    pub chat_history: Vec<Message>,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    pub has_index: bool,
}

fn label_for(documents: &[String]) -> String {
    if documents.is_empty() {
        GENERAL_CHAT_LABEL.to_string()
    } else {
        documents.join(FILENAME_SEPARATOR)
    }
}
