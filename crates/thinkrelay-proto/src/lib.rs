//! thinkrelay wire protocol.
//!
//! Everything both ends of the relay must agree on lives here:
//!
//! - [`ChatMessage`] / [`Role`]: the conversation format the browser re-sends
//!   on every turn and the server forwards upstream.
//! - [`StreamEvent`]: the phase / content / terminal events carried as SSE
//!   `data:` payloads, including the reserved marker strings.
//! - [`escape_line_breaks`] / [`decode_payload`]: the one-line encoding applied
//!   by the relay and its inverse applied by consumers.
//! - [`SseDecoder`]: incremental `text/event-stream` frame parsing, used for
//!   both the upstream provider stream and the relay stream.

pub mod escape;
pub mod event;
pub mod message;
pub mod sse;

pub use escape::{decode_payload, escape_line_breaks};
pub use event::{StreamEvent, DONE_MARKER, ERROR_PREFIX, THINK_CLOSE, THINK_OPEN};
pub use message::{ChatMessage, Role};
pub use sse::{SseDecoder, SseFrame};
