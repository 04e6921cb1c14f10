//! Per-turn stream consumer.
//!
//! A [`TurnConsumer`] is fed raw SSE payloads in arrival order. It keeps the
//! reasoning ("thinking") and answer buffers apart and reports every change
//! to a [`Renderer`]:
//!
//! ```text
//! Idle ─begin─▶ AwaitingFirstEvent ─<think>─▶ Reasoning ─</think>─▶ Answering ─[DONE]─▶ Done
//! ```
//!
//! `[ERROR]` and transport failures jump straight to `Done` from any phase.

use thinkrelay_proto::StreamEvent;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    Idle,
    AwaitingFirstEvent,
    Reasoning,
    Answering,
    Done,
}

/// How a turn ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnOutcome {
    Completed { answer: String, thinking: String },
    Failed { reason: String },
}

impl TurnOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, TurnOutcome::Completed { .. })
    }
}

/// Presentation sink for one turn.
///
/// `answer_updated` receives the whole answer so far after every chunk, so an
/// implementation can re-render progressively without keeping its own copy.
pub trait Renderer {
    fn thinking_updated(&mut self, thinking: &str);
    fn answer_updated(&mut self, answer: &str);
    fn finished(&mut self, answer: &str, thinking: &str);
    fn failed(&mut self, reason: &str);
}

#[derive(Debug)]
pub struct TurnConsumer<R> {
    renderer: R,
    phase: Phase,
    thinking: String,
    answer: String,
    outcome: Option<TurnOutcome>,
}

impl<R: Renderer> TurnConsumer<R> {
    pub fn new(renderer: R) -> Self {
        Self {
            renderer,
            phase: Phase::Idle,
            thinking: String::new(),
            answer: String::new(),
            outcome: None,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn is_done(&self) -> bool {
        self.phase == Phase::Done
    }

    pub fn thinking(&self) -> &str {
        &self.thinking
    }

    pub fn answer(&self) -> &str {
        &self.answer
    }

    /// Set once the turn reaches [`Phase::Done`].
    pub fn outcome(&self) -> Option<&TurnOutcome> {
        self.outcome.as_ref()
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    /// Start a new turn, discarding whatever the previous one left behind.
    pub fn begin(&mut self) {
        self.phase = Phase::AwaitingFirstEvent;
        self.thinking.clear();
        self.answer.clear();
        self.outcome = None;
    }

    /// Classify and apply one raw `data:` payload.
    pub fn on_payload(&mut self, raw: &str) -> Phase {
        self.on_event(StreamEvent::from_payload(raw))
    }

    pub fn on_event(&mut self, event: StreamEvent) -> Phase {
        match self.phase {
            Phase::Done => {
                debug!(?event, "ignoring event after end of turn");
                return self.phase;
            }
            // A payload without a prior `begin` starts the turn implicitly.
            Phase::Idle => self.begin(),
            _ => {}
        }

        match event {
            StreamEvent::ReasoningOpen => {
                self.phase = Phase::Reasoning;
                self.thinking.clear();
            }
            StreamEvent::ReasoningClose => {
                self.phase = Phase::Answering;
            }
            StreamEvent::Content(text) => match self.phase {
                Phase::Reasoning => {
                    self.thinking.push_str(&text);
                    self.renderer.thinking_updated(&self.thinking);
                }
                // Content before any marker comes from a peer that does not
                // tag phases; it can only be answer text.
                _ => {
                    self.phase = Phase::Answering;
                    self.answer.push_str(&text);
                    self.renderer.answer_updated(&self.answer);
                }
            },
            StreamEvent::Done => {
                self.phase = Phase::Done;
                self.renderer.finished(&self.answer, &self.thinking);
                self.outcome = Some(TurnOutcome::Completed {
                    answer: self.answer.clone(),
                    thinking: self.thinking.clone(),
                });
            }
            StreamEvent::Error(reason) => self.fail(reason),
        }
        self.phase
    }

    /// The transport broke before a terminal event. Ends the turn as failed;
    /// partial answer text is never promoted to a completed answer.
    pub fn on_transport_error(&mut self, message: impl Into<String>) {
        if self.phase == Phase::Done {
            return;
        }
        self.fail(message.into());
    }

    fn fail(&mut self, reason: String) {
        self.phase = Phase::Done;
        self.renderer.failed(&reason);
        self.outcome = Some(TurnOutcome::Failed { reason });
    }
}

#[cfg(test)]
pub(crate) mod test {
    use super::*;

    /// Records every renderer call as a line.
    #[derive(Debug, Default)]
    pub(crate) struct Recorder {
        pub calls: Vec<String>,
    }

    impl Renderer for Recorder {
        fn thinking_updated(&mut self, thinking: &str) {
            self.calls.push(format!("thinking:{thinking}"));
        }
        fn answer_updated(&mut self, answer: &str) {
            self.calls.push(format!("answer:{answer}"));
        }
        fn finished(&mut self, answer: &str, thinking: &str) {
            self.calls.push(format!("finished:{answer}|{thinking}"));
        }
        fn failed(&mut self, reason: &str) {
            self.calls.push(format!("failed:{reason}"));
        }
    }

    fn feed(payloads: &[&str]) -> TurnConsumer<Recorder> {
        let mut consumer = TurnConsumer::new(Recorder::default());
        consumer.begin();
        for payload in payloads {
            consumer.on_payload(payload);
        }
        consumer
    }

    #[test]
    fn full_turn_separates_phases() {
        let consumer = feed(&["<think>", "a", "b", "</think>", "x", "y", "[DONE]"]);
        assert_eq!(consumer.phase(), Phase::Done);
        assert_eq!(
            consumer.outcome(),
            Some(&TurnOutcome::Completed { answer: "xy".into(), thinking: "ab".into() })
        );
        assert_eq!(
            consumer.renderer().calls,
            vec!["thinking:a", "thinking:ab", "answer:x", "answer:xy", "finished:xy|ab"]
        );
    }

    #[test]
    fn escaped_line_breaks_are_restored() {
        let consumer = feed(&["<think>", "</think>", "line1\\nline2", "[DONE]"]);
        assert_eq!(consumer.answer(), "line1\nline2");
    }

    #[test]
    fn phase_transitions_follow_markers() {
        let mut consumer = TurnConsumer::new(Recorder::default());
        assert_eq!(consumer.phase(), Phase::Idle);
        consumer.begin();
        assert_eq!(consumer.phase(), Phase::AwaitingFirstEvent);
        assert_eq!(consumer.on_payload("<think>"), Phase::Reasoning);
        assert_eq!(consumer.on_payload("hmm"), Phase::Reasoning);
        assert_eq!(consumer.on_payload("</think>"), Phase::Answering);
        assert_eq!(consumer.on_payload("[DONE]"), Phase::Done);
    }

    #[test]
    fn content_without_open_marker_is_answer() {
        let consumer = feed(&["hello", "[DONE]"]);
        assert_eq!(consumer.answer(), "hello");
        assert_eq!(consumer.thinking(), "");
    }

    #[test]
    fn guarded_marker_text_is_content() {
        let consumer = feed(&["<think>", "</think>", "%3Cthink>", "[DONE]"]);
        assert_eq!(consumer.answer(), "<think>");
    }

    #[test]
    fn error_event_fails_turn() {
        let consumer =
            feed(&["<think>", "r", "</think>", "partial", "[ERROR] upstream interrupted"]);
        assert_eq!(
            consumer.outcome(),
            Some(&TurnOutcome::Failed { reason: "upstream interrupted".into() })
        );
        assert_eq!(consumer.renderer().calls.last().unwrap(), "failed:upstream interrupted");
    }

    #[test]
    fn events_after_done_are_ignored() {
        let consumer = feed(&["<think>", "</think>", "a", "[DONE]", "late", "[ERROR] x"]);
        assert_eq!(consumer.answer(), "a");
        assert!(consumer.outcome().unwrap().is_completed());
    }

    #[test]
    fn transport_error_never_completes() {
        let mut consumer = feed(&["<think>", "</think>", "half"]);
        consumer.on_transport_error("connection reset");
        assert_eq!(consumer.phase(), Phase::Done);
        assert_eq!(
            consumer.outcome(),
            Some(&TurnOutcome::Failed { reason: "connection reset".into() })
        );
        // A second report after the end is dropped.
        consumer.on_transport_error("again");
        assert_eq!(consumer.renderer().calls.iter().filter(|c| c.starts_with("failed")).count(), 1);
    }

    #[test]
    fn begin_resets_previous_turn() {
        let mut consumer = feed(&["<think>", "t", "</think>", "a", "[DONE]"]);
        consumer.begin();
        assert_eq!(consumer.phase(), Phase::AwaitingFirstEvent);
        assert_eq!(consumer.answer(), "");
        assert_eq!(consumer.thinking(), "");
        assert!(consumer.outcome().is_none());
    }
}
