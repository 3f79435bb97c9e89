//! Error types for the conversation layer.

use folio_core::error::FolioError;

/// Errors raised while answering a message.
///
/// None of these reach the caller of
/// [`ConversationRouter::handle_message`](crate::router::ConversationRouter::handle_message);
/// each is logged and turned into a fixed reply.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("completion error: {0}")]
    Completion(String),
    #[error("search error: {0}")]
    Search(String),
    #[error("storage error: {0}")]
    Storage(String),
}

impl From<FolioError> for ChatError {
    fn from(err: FolioError) -> Self {
        match err {
            FolioError::Search(msg) | FolioError::Embedding(msg) => ChatError::Search(msg),
            FolioError::Completion(msg) => ChatError::Completion(msg),
            other => ChatError::Storage(other.to_string()),
        }
    }
}
