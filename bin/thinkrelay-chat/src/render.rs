//! Plain-terminal renderer.
//!
//! Answer text is streamed to the writer as it arrives. Reasoning is hidden
//! unless asked for; when shown it is printed dimmed before the answer.

use std::io::Write;

use thinkrelay_client::Renderer;

const DIM: &str = "\x1b[2m";
const RESET: &str = "\x1b[0m";

pub struct TerminalRenderer<W: Write> {
    out: W,
    show_thinking: bool,
    thinking_printed: usize,
    answer_printed: usize,
}

impl<W: Write> TerminalRenderer<W> {
    pub fn new(out: W, show_thinking: bool) -> Self {
        Self { out, show_thinking, thinking_printed: 0, answer_printed: 0 }
    }

    #[cfg(test)]
    fn into_inner(self) -> W {
        self.out
    }

    /// Write the part of `full` beyond `printed` bytes.
    fn emit_tail(out: &mut W, full: &str, printed: &mut usize, style: Option<&str>) {
        // Buffers only grow within a turn; a shorter one means a new turn.
        if full.len() < *printed {
            *printed = 0;
        }
        let tail = &full[*printed..];
        if tail.is_empty() {
            return;
        }
        let _ = match style {
            Some(style) => write!(out, "{style}{tail}{RESET}"),
            None => write!(out, "{tail}"),
        };
        let _ = out.flush();
        *printed = full.len();
    }
}

impl<W: Write> Renderer for TerminalRenderer<W> {
    fn thinking_updated(&mut self, thinking: &str) {
        if self.show_thinking {
            Self::emit_tail(&mut self.out, thinking, &mut self.thinking_printed, Some(DIM));
        }
    }

    fn answer_updated(&mut self, answer: &str) {
        if self.answer_printed == 0 && self.show_thinking && self.thinking_printed > 0 {
            let _ = writeln!(self.out, "\n");
        }
        Self::emit_tail(&mut self.out, answer, &mut self.answer_printed, None);
    }

    fn finished(&mut self, _answer: &str, _thinking: &str) {
        let _ = writeln!(self.out);
        self.thinking_printed = 0;
        self.answer_printed = 0;
    }

    fn failed(&mut self, reason: &str) {
        let _ = writeln!(self.out, "\n[error] {reason}");
        self.thinking_printed = 0;
        self.answer_printed = 0;
    }
}
