//! Upstream chat-completion providers.
//!
//! [`CompletionClient`] is the seam between the relay and a model provider.
//! The production implementation is [`openai::OpenAiCompatClient`]; tests
//! substitute scripted clients.

pub mod openai;

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;
use thinkrelay_proto::ChatMessage;
use thiserror::Error;

pub use openai::OpenAiCompatClient;

/// One incremental unit of model output.
///
/// A delta may carry a reasoning fragment, an answer fragment, both, or
/// neither (role-only and usage frames).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Delta {
    pub reasoning: Option<String>,
    pub answer: Option<String>,
}

impl Delta {
    pub fn reasoning(text: impl Into<String>) -> Self {
        Self { reasoning: Some(text.into()), answer: None }
    }

    pub fn answer(text: impl Into<String>) -> Self {
        Self { reasoning: None, answer: Some(text.into()) }
    }
}

/// Lazy, finite, non-restartable sequence of deltas for one request.
///
/// Dropping it closes the provider connection.
pub type DeltaStream = Pin<Box<dyn Stream<Item = Result<Delta, UpstreamError>> + Send>>;

/// Provider failures. None of them are retried.
#[derive(Debug, Error)]
pub enum UpstreamError {
    /// The request never reached the provider or the connection failed.
    #[error("upstream request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The provider answered with a non-success status (bad model, auth,
    /// quota, ...).
    #[error("upstream rejected request ({status}): {body}")]
    Rejected { status: u16, body: String },

    /// The response body broke off after streaming had started.
    #[error("upstream stream interrupted: {0}")]
    Stream(String),

    /// A frame could not be understood.
    #[error("upstream sent an unreadable frame: {0}")]
    Decode(String),
}

impl UpstreamError {
    /// Short machine-readable reason for audit lines and error events.
    pub fn reason(&self) -> &'static str {
        match self {
            UpstreamError::Request(_) => "upstream unreachable",
            UpstreamError::Rejected { .. } => "upstream rejected",
            UpstreamError::Stream(_) => "upstream interrupted",
            UpstreamError::Decode(_) => "upstream decode",
        }
    }
}

#[async_trait]
pub trait CompletionClient: Send + Sync + 'static {
    /// Open one streaming completion for `model` over `messages`.
    ///
    /// Resolves only after the provider has accepted the request, so a
    /// rejection is reported here rather than inside the stream.
    async fn open(
        &self,
        model: &str,
        messages: &[ChatMessage],
    ) -> Result<DeltaStream, UpstreamError>;
}
