//! Conversation routing: validate, classify, answer, record.

use std::sync::Arc;

use tracing::{error, info, warn};

use folio_core::config::FolioConfig;
use folio_core::types::{Message, Role, SessionId};
use folio_session::SessionManager;
use folio_storage::Session;
use folio_vector::index::SearchOptions;

use crate::completion::SharedCompletion;
use crate::error::ChatError;
use crate::intent::{Intent, IntentClassifier, KeywordClassifier};
use crate::personal::{self, PersonalAnswer};

pub const EMPTY_MESSAGE_REPLY: &str = "Please enter a valid question or message.";
pub const SHORT_MESSAGE_REPLY: &str = "Please enter a more detailed question.";
pub const NO_RELEVANT_INFO_REPLY: &str =
    "I couldn't find relevant information in the uploaded documents.";
pub const DOCUMENT_FAILURE_REPLY: &str = "I couldn't search the documents. Please try again.";
pub const GENERATION_FAILURE_REPLY: &str =
    "I'm having trouble generating a response right now. Please try again.";

const GENERAL_INSTRUCTION: &str = "You are a helpful AI assistant. Provide a comprehensive and \
detailed answer to the user's question. Explain thoroughly with examples when relevant.";

/// Retrieval and prompt-shaping knobs for the router.
#[derive(Debug, Clone, PartialEq)]
pub struct RouterSettings {
    pub k: usize,
    pub fetch_k: usize,
    pub lambda_mult: f64,
    pub fragment_char_limit: usize,
    pub history_window: usize,
    pub general_context_turns: usize,
}

impl Default for RouterSettings {
    fn default() -> Self {
        Self::from(&FolioConfig::default())
    }
}

impl From<&FolioConfig> for RouterSettings {
    fn from(config: &FolioConfig) -> Self {
        Self {
            k: config.retrieval.k,
            fetch_k: config.retrieval.fetch_k,
            lambda_mult: config.retrieval.lambda_mult,
            fragment_char_limit: config.retrieval.fragment_char_limit,
            history_window: config.chat.history_window,
            general_context_turns: config.chat.general_context_turns,
        }
    }
}

/// Answers chat messages for a session.
///
/// A message is handled under its session's lock from the user append to
/// the assistant append, so a session's turns never interleave.
pub struct ConversationRouter {
    sessions: Arc<SessionManager>,
    classifier: Box<dyn IntentClassifier>,
    completion: SharedCompletion,
    settings: RouterSettings,
}

impl ConversationRouter {
    pub fn new(
        sessions: Arc<SessionManager>,
        completion: SharedCompletion,
        settings: RouterSettings,
    ) -> Self {
        Self {
            sessions,
            classifier: Box::new(KeywordClassifier::default()),
            completion,
            settings,
        }
    }

    /// Swap in a different intent classifier.
    pub fn with_classifier(mut self, classifier: Box<dyn IntentClassifier>) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn sessions(&self) -> &Arc<SessionManager> {
        &self.sessions
    }

    /// Answer `message` in session `id`, creating the session if needed.
    ///
    /// Always returns reply text. Invalid input gets a guidance reply and
    /// touches no state; otherwise the user message and the reply are both
    /// appended to the history.
    pub async fn handle_message(&self, id: &SessionId, message: &str) -> String {
        let message = message.trim();
        if message.is_empty() {
            return EMPTY_MESSAGE_REPLY.to_string();
        }
        if message.chars().count() < 2 {
            return SHORT_MESSAGE_REPLY.to_string();
        }

        info!(session = %id.short(), "Processing message");
        let locked = self.sessions.lock(id).await;

        let session = match locked.append_message(Role::User, message).await {
            Ok(session) => session,
            Err(e) => {
                error!(session = %id.short(), error = %e, "Failed to record user message");
                return GENERATION_FAILURE_REPLY.to_string();
            }
        };

        let intent = self.classifier.classify(message, session.has_index());
        let reply = match intent {
            Intent::Personal => self.answer_personal(message, &session).await,
            Intent::Document => self.answer_document(message, &session).await,
            Intent::General => self.answer_general(message, &session).await,
        };

        if let Err(e) = locked.append_message(Role::Assistant, &reply).await {
            error!(session = %id.short(), error = %e, "Failed to record assistant reply");
        }

        info!(session = %id.short(), %intent, "Response generated");
        reply
    }

    async fn answer_personal(&self, message: &str, session: &Session) -> String {
        match personal::recall(message, &session.chat_history, self.settings.history_window) {
            PersonalAnswer::Direct(text) => text,
            PersonalAnswer::Prompt(prompt) => match self.complete(&prompt).await {
                Ok(text) => text,
                Err(e) => {
                    error!(session = %session.id.short(), error = %e, "Personal completion failed");
                    GENERATION_FAILURE_REPLY.to_string()
                }
            },
        }
    }

    async fn answer_document(&self, message: &str, session: &Session) -> String {
        match self.document_reply(message, session).await {
            Ok(text) => text,
            Err(e) => {
                error!(session = %session.id.short(), error = %e, "Document question failed");
                DOCUMENT_FAILURE_REPLY.to_string()
            }
        }
    }

    async fn document_reply(&self, message: &str, session: &Session) -> Result<String, ChatError> {
        let Some(index) = &session.index else {
            warn!(session = %session.id.short(), "Document question without an index");
            return Ok(NO_RELEVANT_INFO_REPLY.to_string());
        };

        let options = SearchOptions::mmr(self.settings.k, self.settings.fetch_k)
            .with_lambda(self.settings.lambda_mult);
        let hits = index.search_with(message, options).await?;
        if hits.is_empty() {
            return Ok(NO_RELEVANT_INFO_REPLY.to_string());
        }

        let context = hits
            .iter()
            .map(|hit| truncate_chars(&hit.fragment, self.settings.fragment_char_limit))
            .collect::<Vec<_>>()
            .join("\n\n");

        let prompt = format!(
            "Context from {}:\n{}\n\nQuestion: {}\n\n\
             Provide a detailed answer based only on the documents above. \
             If the context is not sufficient, clearly say: \"{}\"",
            session.filename, context, message, NO_RELEVANT_INFO_REPLY
        );
        self.complete(&prompt).await
    }

    async fn answer_general(&self, message: &str, session: &Session) -> String {
        let prompt = general_prompt(
            message,
            prior_turns(&session.chat_history, self.settings.general_context_turns),
        );
        match self.complete(&prompt).await {
            Ok(text) => text,
            Err(e) => {
                error!(session = %session.id.short(), error = %e, "General completion failed");
                GENERATION_FAILURE_REPLY.to_string()
            }
        }
    }

    async fn complete(&self, prompt: &str) -> Result<String, ChatError> {
        self.completion.complete_boxed(prompt).await
    }
}

/// Up to `turns` messages preceding the newest one.
fn prior_turns(history: &[Message], turns: usize) -> &[Message] {
    let before_current = &history[..history.len().saturating_sub(1)];
    let start = before_current.len().saturating_sub(turns);
    &before_current[start..]
}

fn general_prompt(message: &str, prior: &[Message]) -> String {
    let mut prompt = String::from(GENERAL_INSTRUCTION);
    prompt.push_str("\n\n");
    if !prior.is_empty() {
        prompt.push_str("Conversation so far:\n");
        for msg in prior {
            let speaker = match msg.role {
                Role::User => "User",
                Role::Assistant => "Assistant",
            };
            prompt.push_str(&format!("{}: {}\n", speaker, msg.content));
        }
        prompt.push('\n');
    }
    prompt.push_str(&format!("User: {}\n\nAssistant:", message));
    prompt
}

fn truncate_chars(text: &str, limit: usize) -> &str {
    match text.char_indices().nth(limit) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
