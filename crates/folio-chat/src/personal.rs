//! Recall of facts the user has stated about themselves.
//!
//! Name, age and occupation are answered straight from the chat history.
//! Other personal questions gather first-person statements into a prompt.
//! The phrase matching is deliberately simple: "i am going home" yields the
//! name "going home". Do not build on it.

use std::sync::LazyLock;

use regex::Regex;

use folio_core::types::Message;

pub const UNKNOWN_NAME: &str = "I don't know your name yet. Please tell me!";
pub const UNKNOWN_AGE: &str = "I don't know your age. Please tell me!";
pub const UNKNOWN_WORK: &str = "I don't know about your work. Please tell me!";
pub const UNKNOWN_PERSONAL: &str =
    "I don't have that information about you yet. Feel free to tell me more about yourself!";

const NAME_MARKERS: &[&str] = &["my name is", "i am"];
const WORK_MARKERS: &[&str] = &["i work", "my job", "i am a"];
const FIRST_PERSON_MARKERS: &[&str] = &["my", "i am", "i work", "i like", "i live"];

static AGE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+)\s*years?\s*old").expect("Invalid age regex"));

/// Outcome of a personal-fact lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PersonalAnswer {
    /// Answer taken directly from history.
    Direct(String),
    /// The question needs the completion service with this prompt.
    Prompt(String),
}

/// Answer a personal question from `history`, newest messages first.
///
/// `window` bounds how many trailing history entries are scanned for the
/// open-ended case.
pub fn recall(question: &str, history: &[Message], window: usize) -> PersonalAnswer {
    let q = question.to_lowercase();

    if q.contains("name") {
        return PersonalAnswer::Direct(recall_name(history).unwrap_or_else(|| UNKNOWN_NAME.into()));
    }
    if q.contains("age") {
        return PersonalAnswer::Direct(recall_age(history).unwrap_or_else(|| UNKNOWN_AGE.into()));
    }
    if q.contains("job") || q.contains("work") {
        return PersonalAnswer::Direct(recall_work(history).unwrap_or_else(|| UNKNOWN_WORK.into()));
    }

    let start = history.len().saturating_sub(window);
    let statements: Vec<&str> = history[start..]
        .iter()
        .rev()
        .filter(|m| m.is_user())
        .filter(|m| {
            let lower = m.content.to_lowercase();
            FIRST_PERSON_MARKERS.iter().any(|w| lower.contains(w))
        })
        .map(|m| m.content.as_str())
        .collect();

    if statements.is_empty() {
        return PersonalAnswer::Direct(UNKNOWN_PERSONAL.into());
    }

    PersonalAnswer::Prompt(format!(
        "Based on this personal information: {}\n\nQuestion: {}\n\nAnswer:",
        statements.join("\n"),
        question
    ))
}

fn user_messages_newest_first(history: &[Message]) -> impl Iterator<Item = &Message> {
    history.iter().rev().filter(|m| m.is_user())
}

/// Up to two words after the first "my name is" (or else "i am"), in the
/// user's original casing.
fn recall_name(history: &[Message]) -> Option<String> {
    for msg in user_messages_newest_first(history) {
        // ASCII lowering keeps byte offsets aligned with the original text.
        let lower = msg.content.to_ascii_lowercase();
        let Some((offset, marker)) = NAME_MARKERS
            .iter()
            .find_map(|m| lower.find(m).map(|pos| (pos, *m)))
        else {
            continue;
        };

        let rest = &msg.content[offset + marker.len()..];
        let name: Vec<&str> = rest.split_whitespace().take(2).collect();
        return Some(format!("Your name is {}.", name.join(" ")));
    }
    None
}

fn recall_age(history: &[Message]) -> Option<String> {
    for msg in user_messages_newest_first(history) {
        let lower = msg.content.to_lowercase();
        if !(lower.contains("i am") && lower.contains("years old")) {
            continue;
        }
        if let Some(caps) = AGE_PATTERN.captures(&lower) {
            return Some(format!("You are {} years old.", &caps[1]));
        }
    }
    None
}

fn recall_work(history: &[Message]) -> Option<String> {
    user_messages_newest_first(history)
        .find(|m| {
            let lower = m.content.to_lowercase();
            WORK_MARKERS.iter().any(|w| lower.contains(w))
        })
        .map(|m| format!("Based on what you told me: {}", m.content))
}
