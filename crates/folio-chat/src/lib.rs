//! Folio Chat crate - intent classification, personal recall, completion
//! backends, and the conversation router.
//!
//! The router validates a message, classifies it as personal, document or
//! general, answers it from history, from the session's semantic index plus
//! the completion service, or from the completion service alone, and
//! records both sides of the exchange.

pub mod completion;
pub mod error;
pub mod intent;
pub mod personal;
pub mod router;

pub use completion::{
    CompletionService, DynCompletionService, MockCompletion, OllamaCompletion, SharedCompletion,
};
pub use error::ChatError;
pub use intent::{Intent, IntentClassifier, KeywordClassifier};
pub use router::{ConversationRouter, RouterSettings};
