//! Client side of the thinkrelay protocol.
//!
//! - [`TurnConsumer`] turns relay event payloads into reasoning and answer
//!   buffers and drives a [`Renderer`]. It knows nothing about HTTP.
//! - [`Conversation`] owns the message history re-sent on every turn.
//! - [`RelayClient`] talks to a thinkrelay server: accounts, model list, and
//!   the streaming relay itself.

pub mod consumer;
pub mod conversation;
pub mod error;
pub mod transport;

pub use consumer::{Phase, Renderer, TurnConsumer, TurnOutcome};
pub use conversation::{Conversation, DEFAULT_GREETING};
pub use error::{ClientError, ConversationError};
pub use transport::{RelayClient, Session};
