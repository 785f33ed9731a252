use std::io::{self, Write};

use client_core::{format_counts, format_quote, QuoteRenderer, PLACEHOLDER};
use shared::domain::{Quote, ReactionRecord};

/// Writes each region as its own line block. Write errors are dropped; a
/// closed stdout must not take the session down.
pub struct TerminalRenderer<W> {
    out: W,
}

impl TerminalRenderer<io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write> TerminalRenderer<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    #[cfg(test)]
    fn into_inner(self) -> W {
        self.out
    }

    fn emit(&mut self, text: &str) {
        let _ = writeln!(self.out, "{text}");
        let _ = self.out.flush();
    }
}

impl<W: Write> QuoteRenderer for TerminalRenderer<W> {
    fn render_placeholder(&mut self) {
        self.emit(PLACEHOLDER);
    }

    fn render_quote(&mut self, quote: &Quote) {
        self.emit("");
        self.emit(&format_quote(quote));
    }

    fn render_counts(&mut self, record: &ReactionRecord) {
        self.emit(&format_counts(record));
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Input {
    Like,
    Dislike,
    Next,
    Show(usize),
    Help,
    Quit,
}

pub const HELP: &str = "keys: l = like, d = dislike, n = next quote, <number> = show quote, h = help, q = quit";

impl Input {
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim();
        match line.to_ascii_lowercase().as_str() {
            "l" | "like" | "+" => Some(Self::Like),
            "d" | "dislike" | "-" => Some(Self::Dislike),
            "n" | "next" => Some(Self::Next),
            "h" | "help" | "?" => Some(Self::Help),
            "q" | "quit" | "exit" => Some(Self::Quit),
            other => other.parse::<usize>().ok().map(Self::Show),
        }
    }
}
