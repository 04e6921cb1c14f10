//! Conversation history.
//!
//! The server is stateless between turns: every relay request carries the
//! whole history as a JSON array of `{role, content}`. A [`Conversation`]
//! owns that array and the single in-flight turn.

use thinkrelay_proto::{ChatMessage, Role};

use crate::error::ConversationError;

pub const DEFAULT_GREETING: &str = "Hello! How can I help you today?";

#[derive(Debug, Clone, Default)]
pub struct Conversation {
    seed: Vec<ChatMessage>,
    messages: Vec<ChatMessage>,
    in_flight: bool,
    /// Answer replaced by an in-flight retry, restored if the retry fails.
    displaced: Option<ChatMessage>,
}

impl Conversation {
    /// An empty conversation.
    pub fn new() -> Self {
        Self::default()
    }

    /// A conversation opened by an assistant greeting. [`Conversation::clear`]
    /// returns to this state.
    pub fn with_greeting(greeting: impl Into<String>) -> Self {
        let seed = vec![ChatMessage::assistant(greeting)];
        Self { messages: seed.clone(), seed, in_flight: false, displaced: None }
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight
    }

    /// Record the user's prompt and return the history to send.
    pub fn begin_turn(&mut self, prompt: &str) -> Result<String, ConversationError> {
        if self.in_flight {
            return Err(ConversationError::Busy);
        }
        if prompt.trim().is_empty() {
            return Err(ConversationError::EmptyPrompt);
        }
        self.messages.push(ChatMessage::user(prompt));
        self.in_flight = true;
        Ok(self.prompt_json())
    }

    /// Store the assistant's answer for the in-flight turn.
    pub fn complete_turn(&mut self, answer: impl Into<String>) -> Result<(), ConversationError> {
        if !self.in_flight {
            return Err(ConversationError::NoTurnInFlight);
        }
        self.messages.push(ChatMessage::assistant(answer));
        self.in_flight = false;
        self.displaced = None;
        Ok(())
    }

    /// Abandon the in-flight turn. A new prompt is dropped; a failed retry
    /// puts the previous answer back.
    pub fn fail_turn(&mut self) -> Result<(), ConversationError> {
        if !self.in_flight {
            return Err(ConversationError::NoTurnInFlight);
        }
        match self.displaced.take() {
            Some(answer) => self.messages.push(answer),
            None => {
                if self.messages.last().is_some_and(|m| m.role == Role::User) {
                    self.messages.pop();
                }
            }
        }
        self.in_flight = false;
        Ok(())
    }

    /// Regenerate the last answer: the assistant reply is set aside and the
    /// history up to its prompt is sent again.
    pub fn retry(&mut self) -> Result<String, ConversationError> {
        if self.in_flight {
            return Err(ConversationError::Busy);
        }
        let n = self.messages.len();
        let retryable = n >= 2
            && self.messages[n - 1].role == Role::Assistant
            && self.messages[n - 2].role == Role::User;
        if !retryable {
            return Err(ConversationError::NothingToRetry);
        }

        self.displaced = self.messages.pop();
        self.in_flight = true;
        Ok(self.prompt_json())
    }

    /// Back to the seeded state. An in-flight turn is forgotten.
    pub fn clear(&mut self) {
        self.messages = self.seed.clone();
        self.in_flight = false;
        self.displaced = None;
    }

    fn prompt_json(&self) -> String {
        // Serializing plain strings and unit enums cannot fail.
        serde_json::to_string(&self.messages).unwrap_or_else(|_| "[]".to_owned())
    }
}
