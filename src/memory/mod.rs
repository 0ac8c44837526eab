//! Conversation memory.
//!
//! An ordered, append-only transcript of user and assistant turns. The whole
//! transcript is replayed into every generation call. Nothing is summarised or
//! truncated here: if a long conversation overflows the model's context
//! window, the provider reports it as an error.

use crate::types::{Role, Turn};
use tracing::debug;

/// Rough characters-per-token ratio used for diagnostics.
const CHARS_PER_TOKEN: usize = 4;

/// Estimates the number of tokens in a text string.
///
/// Approximation (~4 characters per token for English); only used for logging.
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count().div_ceil(CHARS_PER_TOKEN)
}

#[derive(Debug, Clone, Default)]
pub struct ConversationMemory {
    turns: Vec<Turn>,
}

impl ConversationMemory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, turn: Turn) {
        self.turns.push(turn);
    }

    /// Record a completed exchange: the question, then the answer.
    pub fn append_exchange(&mut self, question: impl Into<String>, answer: impl Into<String>) {
        self.turns.reserve(2);
        self.turns.push(Turn::new(Role::User, question));
        self.turns.push(Turn::new(Role::Assistant, answer));
    }

    pub fn history(&self) -> &[Turn] {
        &self.turns
    }

    pub fn last(&self) -> Option<&Turn> {
        self.turns.last()
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Reset to an empty transcript. Safe to call at any time.
    pub fn clear(&mut self) {
        if !self.turns.is_empty() {
            debug!(turns = self.turns.len(), "Clearing conversation memory");
        }
        self.turns.clear();
    }

    pub fn estimate_tokens(&self) -> usize {
        self.turns.iter().map(|t| estimate_tokens(&t.content)).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_estimate_tokens() {
        assert_eq!(estimate_tokens(""), 0);
        assert_eq!(estimate_tokens("abcd"), 1);
        assert_eq!(estimate_tokens("abcde"), 2);
        // counted in characters, not UTF-8 bytes
        assert_eq!(estimate_tokens("éééé"), 1);
    }

    #[test]
    fn test_append_keeps_order() {
        let mut memory = ConversationMemory::new();
        memory.append(Turn::user("one"));
        memory.append(Turn::assistant("two"));
        memory.append(Turn::user("three"));

        let contents: Vec<&str> = memory.history().iter().map(|t| t.content.as_str()).collect();
        assert_eq!(contents, vec!["one", "two", "three"]);
        assert_eq!(memory.last().unwrap().role, Role::User);
    }

    #[test]
    fn test_append_exchange_user_first() {
        let mut memory = ConversationMemory::new();
        memory.append_exchange("What color is the sky?", "Blue.");

        assert_eq!(memory.len(), 2);
        assert_eq!(memory.history()[0].role, Role::User);
        assert_eq!(memory.history()[1].role, Role::Assistant);
        assert_eq!(memory.history()[1].content, "Blue.");
    }

    #[test]
    fn test_clear_on_empty_is_noop() {
        let mut memory = ConversationMemory::new();
        memory.clear();
        assert!(memory.is_empty());
        assert!(memory.history().is_empty());
    }

    #[test]
    fn test_clear_is_idempotent() {
        let mut memory = ConversationMemory::new();
        memory.append_exchange("q", "a");
        memory.clear();
        memory.clear();
        assert!(memory.history().is_empty());
        assert_eq!(memory.estimate_tokens(), 0);
    }

    #[test]
    fn test_no_truncation() {
        let mut memory = ConversationMemory::new();
        for i in 0..500 {
            memory.append_exchange(format!("q{i}"), format!("a{i}"));
        }
        assert_eq!(memory.len(), 1000);
        assert_eq!(memory.history()[0].content, "q0");
    }
}
