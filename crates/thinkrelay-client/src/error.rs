use thiserror::Error;

/// Misuse of a [`crate::Conversation`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConversationError {
    #[error("a turn is already in progress")]
    Busy,

    #[error("prompt is empty")]
    EmptyPrompt,

    #[error("no completed turn to retry")]
    NothingToRetry,

    #[error("no turn in progress")]
    NoTurnInFlight,
}

/// Failures talking to a thinkrelay server.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The session token is unknown or expired; log in again.
    #[error("session token rejected; log in again")]
    BadToken,

    #[error("server answered {status}: {message}")]
    Status { status: u16, message: String },

    /// The event stream broke off before its terminal event.
    #[error("stream interrupted: {0}")]
    Stream(String),

    #[error(transparent)]
    Conversation(#[from] ConversationError),

    #[error("invalid server url: {0}")]
    Url(String),
}
