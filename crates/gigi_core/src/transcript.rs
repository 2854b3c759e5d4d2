use serde::{Deserialize, Serialize};

use crate::compose::{CLOSING_MESSAGE, WELCOME_MESSAGE};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Speaker {
    User,
    Assistant,
}

impl Speaker {
    pub fn label(self) -> &'static str {
        match self {
            Speaker::User => "Você",
            Speaker::Assistant => "GIGI",
        }
    }
}

/// Conversation history owned by the shell. The engine never sees it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transcript {
    messages: Vec<(Speaker, String)>,
}

impl Default for Transcript {
    fn default() -> Self {
        Self::new()
    }
}

impl Transcript {
    /// Starts with the assistant's welcome message.
    pub fn new() -> Self {
        Self {
            messages: vec![(Speaker::Assistant, WELCOME_MESSAGE.to_string())],
        }
    }

    pub fn push_user(&mut self, message: impl Into<String>) {
        self.messages.push((Speaker::User, message.into()));
    }

    pub fn push_assistant(&mut self, message: impl Into<String>) {
        self.messages.push((Speaker::Assistant, message.into()));
    }

    /// Ends the conversation: only the closing message remains.
    pub fn reset(&mut self) {
        self.messages = vec![(Speaker::Assistant, CLOSING_MESSAGE.to_string())];
    }

    /// The last `n` messages, oldest first.
    pub fn recent(&self, n: usize) -> &[(Speaker, String)] {
        let start = self.messages.len().saturating_sub(n);
        &self.messages[start..]
    }

    pub fn messages(&self) -> &[(Speaker, String)] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_with_welcome() {
        let t = Transcript::new();
        assert_eq!(t.messages(), &[(Speaker::Assistant, WELCOME_MESSAGE.to_string())]);
    }

    #[test]
    fn recent_returns_tail_in_order() {
        let mut t = Transcript::new();
        for i in 0..6 {
            t.push_user(format!("q{i}"));
            t.push_assistant(format!("a{i}"));
        }
        assert_eq!(t.len(), 13);

        let tail = t.recent(3);
        assert_eq!(tail.len(), 3);
        assert_eq!(tail[0], (Speaker::Assistant, "a4".to_string()));
        assert_eq!(tail[2], (Speaker::Assistant, "a5".to_string()));
        assert_eq!(t.recent(100).len(), 13);
        assert!(t.recent(0).is_empty());
    }

    #[test]
    fn reset_keeps_only_closing_message() {
        let mut t = Transcript::new();
        t.push_user("oi");
        t.push_assistant("Olá!");
        t.reset();
        assert_eq!(t.messages(), &[(Speaker::Assistant, CLOSING_MESSAGE.to_string())]);
    }

    #[test]
    fn speaker_labels() {
        assert_eq!(Speaker::User.label(), "Você");
        assert_eq!(Speaker::Assistant.label(), "GIGI");
    }
}
