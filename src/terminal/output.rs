//! Output Normalization
//!
//! Turns raw chunks from a host output stream into readable text: escape
//! sequences and shell-integration markers are removed, the echo of the
//! typed command is skipped, and prompt debris around the first and last
//! lines is cleaned up.

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::trace;

use crate::ansi;
use crate::config::NormalizerConfig;

/// Trailing prompt character left on the last line by the shell
static PROMPT_ARTIFACT_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[%$#>]\s*$").expect("prompt artifact pattern is valid"));

/// Progress of skipping the echoed command line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EchoState {
    /// Still dropping lines that look like the echo; `skipped` counts the
    /// characters dropped so far
    Suppressing { skipped: usize },
    /// Everything from here on is genuine output
    Done,
}

/// Per-command output normalizer
///
/// Chunks must be fed in arrival order. An escape sequence cut at a chunk
/// boundary is held back and completed by the next chunk.
#[derive(Debug)]
pub struct OutputNormalizer {
    /// Command text, used to recognize its echo
    command: String,
    /// Normalization options
    config: NormalizerConfig,
    /// Whether the first non-empty chunk is still to come
    first_chunk_pending: bool,
    /// Echo suppression progress
    echo: EchoState,
    /// Unterminated escape sequence carried over from the previous chunk
    pending_escape: String,
}

impl OutputNormalizer {
    /// Create a normalizer for the output of `command`
    pub fn new(command: impl Into<String>, config: NormalizerConfig) -> Self {
        let command = command.into();
        let echo = if command.trim().is_empty() {
            EchoState::Done
        } else {
            EchoState::Suppressing { skipped: 0 }
        };

        Self {
            command,
            config,
            first_chunk_pending: true,
            echo,
            pending_escape: String::new(),
        }
    }

    /// Normalize one raw chunk
    pub fn normalize(&mut self, chunk: &str) -> String {
        let mut text = std::mem::take(&mut self.pending_escape);
        text.push_str(chunk);

        if let Some(start) = ansi::incomplete_escape_start(&text) {
            self.pending_escape = text.split_off(start);
            trace!("Holding back {} bytes of split escape", self.pending_escape.len());
        }

        self.process(&text)
    }

    /// Normalize whatever is still held back; call once the stream ended
    pub fn finish(&mut self) -> String {
        let rest = std::mem::take(&mut self.pending_escape);
        self.process(&rest)
    }

    /// Whether the echo of the command has been fully skipped
    pub fn echo_skipped(&self) -> bool {
        self.echo == EchoState::Done
    }

    /// Bytes currently held back waiting for the rest of an escape sequence
    pub fn pending_len(&self) -> usize {
        self.pending_escape.len()
    }

    fn process(&mut self, text: &str) -> String {
        if text.is_empty() {
            return String::new();
        }

        let text = if self.config.normalize_crlf {
            text.replace("\r\n", "\n")
        } else {
            text.to_string()
        };

        let mut data = if self.first_chunk_pending {
            self.first_chunk_pending = false;
            clean_first_chunk(&text)
        } else {
            ansi::strip_ansi(&ansi::strip_host_sequences(&text))
        };

        if self.echo != EchoState::Done {
            data = self.suppress_echo(&data);
        }

        if self.config.strip_commas {
            data.retain(|c| c != ',');
        }

        data
    }

    fn suppress_echo(&mut self, data: &str) -> String {
        let command = self.command.trim();
        let lines: Vec<&str> = data.split('\n').collect();
        let mut kept_from = lines.len();

        for (index, line) in lines.iter().enumerate() {
            let EchoState::Suppressing { skipped } = self.echo else {
                kept_from = index;
                break;
            };

            let candidate = line.trim();
            if !command.contains(candidate) {
                self.echo = EchoState::Done;
                kept_from = index;
                break;
            }

            let skipped = skipped + candidate.len();
            self.echo = if skipped >= command.len() {
                trace!("Command echo fully skipped");
                EchoState::Done
            } else {
                EchoState::Suppressing { skipped }
            };
        }

        lines[kept_from..].join("\n")
    }
}

/// Clean the first chunk of a command's output
///
/// The first chunk is where the host's shell-integration markers, the
/// duplicated echo character and prompt fragments show up.
pub fn clean_first_chunk(text: &str) -> String {
    let (rest, embedded) = ansi::take_embedded_output(text);
    let early_output = embedded
        .map(|inner| remove_last_line_artifacts(&ansi::strip_ansi(&inner)).trim().to_string())
        .filter(|inner| !inner.is_empty());

    let mut data = ansi::strip_host_sequences(&rest);
    if let Some(early) = early_output {
        data = format!("{}\n{}", early, data);
    }
    let data = ansi::strip_ansi(&data);

    let mut lines: Vec<String> = data
        .split('\n')
        .map(|line| line.strip_suffix('\r').unwrap_or(line).to_string())
        .collect();

    if let Some(first) = lines.first_mut() {
        first.retain(|c| (' '..='~').contains(&c));

        let mut chars = first.chars();
        if let (Some(a), Some(b)) = (chars.next(), chars.next()) {
            if a == b {
                first.remove(0);
            }
        }
    }

    for line in lines.iter_mut().take(2) {
        let start = line
            .find(|c: char| c.is_ascii_alphanumeric())
            .unwrap_or(line.len());
        line.replace_range(..start, "");
    }

    lines.join("\n")
}

/// Remove a trailing prompt character (`%`, `$`, `#` or `>`) and trailing
/// whitespace from the last line
pub fn remove_last_line_artifacts(output: &str) -> String {
    let trimmed = output.trim_end();
    let (head, last) = match trimmed.rfind('\n') {
        Some(index) => trimmed.split_at(index + 1),
        None => ("", trimmed),
    };

    let last = PROMPT_ARTIFACT_REGEX.replace(last, "");
    format!("{}{}", head, last).trim_end().to_string()
}
