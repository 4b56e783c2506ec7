//! Output Capture
//!
//! Synchronous bookkeeping for one command's output: normalization, line
//! emission, the cumulative transcript and the unretrieved-output cursor.

use crate::config::NormalizerConfig;
use crate::terminal::{remove_last_line_artifacts, LineBuffer, OutputNormalizer};

/// Result of feeding one raw chunk
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CapturedChunk {
    /// Normalized text of the chunk
    pub text: String,
    /// Lines ready to be emitted to a listener
    pub lines: Vec<String>,
}

/// Per-command output accounting
///
/// Invariant: `retrieved <= full_output.len()` and `retrieved` never
/// decreases.
#[derive(Debug)]
pub struct OutputCapture {
    normalizer: OutputNormalizer,
    lines: LineBuffer,
    full_output: String,
    retrieved: usize,
    listening: bool,
    announced: bool,
}

impl OutputCapture {
    pub fn new(command: impl Into<String>, config: NormalizerConfig) -> Self {
        Self {
            normalizer: OutputNormalizer::new(command, config),
            lines: LineBuffer::new(),
            full_output: String::new(),
            retrieved: 0,
            listening: true,
            announced: false,
        }
    }

    /// Feed one raw chunk from the host
    pub fn push_chunk(&mut self, chunk: &str) -> CapturedChunk {
        let text = self.normalizer.normalize(chunk);
        let lines = self.push_text(&text);
        CapturedChunk { text, lines }
    }

    /// Flush everything still buffered once the stream has ended
    ///
    /// Returns the remaining lines for a listener, including the
    /// unterminated last line with its prompt debris removed.
    pub fn finish(&mut self) -> Vec<String> {
        let tail = self.normalizer.finish();
        let mut lines = self.push_text(&tail);

        if self.listening {
            lines.extend(self.lines.take_remaining());
            self.retrieved = self.full_output.len();
        }
        lines
    }

    /// Stop emitting lines; the buffered partial line is returned as a
    /// last line and everything after it is left for [`Self::drain`]
    pub fn stop_listening(&mut self) -> Option<String> {
        if !self.listening {
            return None;
        }
        self.listening = false;

        let rest = self.lines.take_remaining();
        self.retrieved = self.full_output.len();
        rest
    }

    /// Stop emitting lines without flushing; the partial line stays
    /// unretrieved
    pub fn detach(&mut self) {
        self.listening = false;
        self.lines = LineBuffer::new();
    }

    /// Record a line produced by termpool itself rather than the host
    ///
    /// The line joins the transcript and counts as retrieved when a
    /// listener receives it.
    pub fn push_notice(&mut self, line: &str) -> Option<String> {
        self.full_output.push_str(line);
        self.full_output.push('\n');
        if !self.listening {
            return None;
        }
        self.retrieved = self.full_output.len();
        Some(line.to_string())
    }

    /// Output not yet seen by the caller, then mark it seen
    pub fn drain(&mut self) -> String {
        let unretrieved = &self.full_output[self.retrieved..];
        let cleaned = remove_last_line_artifacts(unretrieved);
        self.retrieved = self.full_output.len();
        cleaned
    }

    pub fn is_listening(&self) -> bool {
        self.listening
    }

    /// Everything normalized so far
    pub fn full_output(&self) -> &str {
        &self.full_output
    }

    /// Byte offset of the first unretrieved byte
    pub fn retrieved_index(&self) -> usize {
        self.retrieved
    }

    fn push_text(&mut self, text: &str) -> Vec<String> {
        if text.is_empty() {
            return Vec::new();
        }

        let mut emitted = Vec::new();
        if !self.announced && self.full_output.is_empty() {
            self.announced = true;
            if self.listening {
                emitted.push(String::new());
            }
        }

        self.full_output.push_str(text);
        if !self.listening {
            return emitted;
        }

        emitted.extend(self.lines.push(text));
        let seen = self.full_output.len() - self.lines.len();
        self.retrieved = self.retrieved.max(seen);
        emitted
    }
}
