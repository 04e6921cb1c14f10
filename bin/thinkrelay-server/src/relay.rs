//! Stream relay: upstream deltas → phase-tagged SSE events.
//!
//! [`relay_events`] is the protocol itself and knows nothing about HTTP.
//! [`into_sse`] binds it to an axum response.
//!
//! The response body is pulled, not pushed: hyper polls the event stream
//! only when the client socket can take more bytes, and each poll pulls at
//! most one upstream delta. A slow client therefore slows upstream reads
//! instead of growing a buffer. When the client goes away hyper drops the
//! body, which drops the upstream stream and closes the provider connection.

use std::convert::Infallible;
use std::time::Duration;

use axum::response::sse::{Event, KeepAlive, Sse};
use futures::{Stream, StreamExt};
use thinkrelay_proto::StreamEvent;
use tracing::{debug, warn};

use crate::audit;
use crate::upstream::{Delta, UpstreamError};

/// Interval of SSE comment frames sent while the model is silent.
const KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(15);

/// Transform a delta sequence into the relay event sequence.
///
/// - `ReasoningOpen` is emitted before the first delta is polled.
/// - The first answer fragment is preceded by `ReasoningClose`; a turn that
///   never answers still gets `ReasoningClose` before `Done`.
/// - A mid-stream error yields a single `Error` and ends the sequence without
///   `Done`.
pub fn relay_events<S>(deltas: S) -> impl Stream<Item = StreamEvent> + Send
where
    S: Stream<Item = Result<Delta, UpstreamError>> + Send + 'static,
{
    async_stream::stream! {
        yield StreamEvent::ReasoningOpen;

        let mut deltas = Box::pin(deltas);
        let mut answering = false;

        while let Some(item) = deltas.next().await {
            let delta = match item {
                Ok(delta) => delta,
                Err(e) => {
                    warn!(error = %e, "upstream failed mid-stream");
                    yield StreamEvent::Error(e.reason().to_owned());
                    return;
                }
            };

            if let Some(reasoning) = delta.reasoning.filter(|t| !t.is_empty()) {
                if answering {
                    debug!(len = reasoning.len(), "dropping reasoning fragment after answer start");
                } else {
                    yield StreamEvent::Content(reasoning);
                }
            }

            if let Some(answer) = delta.answer.filter(|t| !t.is_empty()) {
                if !answering {
                    answering = true;
                    yield StreamEvent::ReasoningClose;
                }
                yield StreamEvent::Content(answer);
            }
        }

        if !answering {
            yield StreamEvent::ReasoningClose;
        }
        yield StreamEvent::Done;
    }
}

/// Logs exactly one audit line per relayed turn, including when the client
/// disconnects and the stream is dropped half-way.
struct TurnAudit {
    user: String,
    outcome: Option<String>,
}

impl TurnAudit {
    fn new(user: String) -> Self {
        Self { user, outcome: None }
    }

    fn settle(&mut self, event: &StreamEvent) {
        match event {
            StreamEvent::Done => self.outcome = Some("relay request completed".to_owned()),
            StreamEvent::Error(reason) => self.outcome = Some(format!("relay error: {reason}")),
            _ => {}
        }
    }
}

impl Drop for TurnAudit {
    fn drop(&mut self) {
        match self.outcome.take() {
            Some(outcome) => audit::record(&self.user, outcome),
            None => audit::record(&self.user, "relay aborted: client disconnected"),
        }
    }
}

/// Frame relay events as an SSE response body attributed to `user`.
pub fn into_sse<S>(events: S, user: String) -> Sse<impl Stream<Item = Result<Event, Infallible>>>
where
    S: Stream<Item = StreamEvent> + Send + 'static,
{
    let framed = async_stream::stream! {
        let mut turn = TurnAudit::new(user);
        let mut events = Box::pin(events);
        while let Some(event) = events.next().await {
            turn.settle(&event);
            yield Ok::<_, Infallible>(Event::default().data(event.to_payload()));
        }
    };
    Sse::new(framed).keep_alive(KeepAlive::new().interval(KEEP_ALIVE_INTERVAL))
}

// ── Tests ──────────────────────────────────────────────────────────────────────
