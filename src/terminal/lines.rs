//! Line Emission
//!
//! Accumulates normalized text and hands out complete lines as soon as
//! their terminating newline arrives.

use super::output::remove_last_line_artifacts;

/// Buffer of text not yet terminated by a newline
#[derive(Debug, Default, Clone)]
pub struct LineBuffer {
    pending: String,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append text and return every line it completed
    ///
    /// Lines are right-trimmed, so a `\r` before the newline never reaches
    /// the caller.
    pub fn push(&mut self, text: &str) -> Vec<String> {
        self.pending.push_str(text);

        let Some(last_newline) = self.pending.rfind('\n') else {
            return Vec::new();
        };

        let rest = self.pending.split_off(last_newline + 1);
        let complete = std::mem::replace(&mut self.pending, rest);

        complete[..last_newline]
            .split('\n')
            .map(|line| line.trim_end().to_string())
            .collect()
    }

    /// Take the unterminated remainder, with a trailing prompt character
    /// removed; `None` when nothing meaningful is left
    pub fn take_remaining(&mut self) -> Option<String> {
        let rest = std::mem::take(&mut self.pending);
        let cleaned = remove_last_line_artifacts(&rest);
        (!cleaned.is_empty()).then_some(cleaned)
    }

    /// Bytes waiting for a newline
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
