//! ANSI escape code processing
//!
//! Recognizes and removes the escape sequences found in shell output:
//! SGR styling, cursor movement, OSC titles, and the host's own
//! shell-integration markers (`ESC ] 633 ; <id> ; <payload> BEL`).
//! Nothing here fails: text that does not match a known sequence is left
//! in place.

use once_cell::sync::Lazy;
use regex::Regex;

/// Longest escape sequence we are willing to hold back across chunk
/// boundaries before treating it as plain text
pub const MAX_PENDING_ESCAPE: usize = 512;

/// Any CSI, OSC, charset designation or two-character escape
static ANSI_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(concat!(
        r"\x1b\][^\x07\x1b]*(?:\x07|\x1b\\)",
        r"|\x1b\[[0-?]*[ -/]*[@-~]",
        r"|\u{9b}[0-?]*[ -/]*[@-~]",
        r"|\x1b[()#][0-9A-Za-z]",
        r"|\x1b[=>78DEHMc]",
    ))
    .expect("ANSI pattern is valid")
});

/// Host control sequences: `ESC ] <controlId> ; <payload> BEL`
static HOST_SEQUENCE_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\x1b\][0-9]+;[^\x07\x1b]*(?:\x07|\x1b\\)").expect("host sequence pattern is valid")
});

/// Output the host wrapped between its pre-execution (`633;C`) and
/// finished (`633;D`) markers
static EMBEDDED_OUTPUT_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)\x1b\]633;C(?:\x07|\x1b\\)?(.*?)\x1b\]633;D[^\x07\x1b]*(?:\x07|\x1b\\)?")
        .expect("embedded output pattern is valid")
});

/// Remove all ANSI escape sequences
pub fn strip_ansi(text: &str) -> String {
    if !contains_escape(text) {
        return text.to_string();
    }
    ANSI_REGEX.replace_all(text, "").into_owned()
}

/// Remove host shell-integration control sequences, leaving other escapes alone
pub fn strip_host_sequences(text: &str) -> String {
    HOST_SEQUENCE_REGEX.replace_all(text, "").into_owned()
}

/// Split out output that arrived sandwiched between the pre-execution and
/// finished markers
///
/// Returns the text with that whole region removed, and the raw text that
/// was found inside it (if any).
pub fn take_embedded_output(text: &str) -> (String, Option<String>) {
    match EMBEDDED_OUTPUT_REGEX.captures(text) {
        Some(caps) => {
            let whole = caps.get(0).map(|m| m.range()).unwrap_or(0..0);
            let inner = caps.get(1).map(|m| m.as_str().to_string());
            let mut remaining = String::with_capacity(text.len());
            remaining.push_str(&text[..whole.start]);
            remaining.push_str(&text[whole.end..]);
            (remaining, inner)
        }
        None => (text.to_string(), None),
    }
}

/// Whether the text contains anything that could start an escape sequence
pub fn contains_escape(text: &str) -> bool {
    text.contains('\x1b') || text.contains('\u{9b}')
}

/// Byte offset of an escape sequence left unterminated at the end of `text`
///
/// Such a tail should be held back until the next chunk arrives. Tails
/// longer than [`MAX_PENDING_ESCAPE`] are not reported.
pub fn incomplete_escape_start(text: &str) -> Option<usize> {
    // An OSC can legitimately contain a trailing ESC (the first half of ST)
    if let Some(osc) = text.rfind("\x1b]") {
        let body = &text[osc + 2..];
        let terminated = body.contains('\x07') || body.contains("\x1b\\");
        if !terminated {
            return (text.len() - osc <= MAX_PENDING_ESCAPE).then_some(osc);
        }
    }

    let start = text.rfind('\x1b')?;
    let tail = &text[start..];
    if tail.len() > MAX_PENDING_ESCAPE {
        return None;
    }

    let mut rest = tail[1..].chars();
    match rest.next() {
        None => Some(start),
        Some('[') => {
            let complete = rest.any(|c| ('@'..='~').contains(&c));
            (!complete).then_some(start)
        }
        Some('(') | Some(')') | Some('#') => rest.next().is_none().then_some(start),
        Some(_) => None,
    }
}
