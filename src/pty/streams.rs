//! PTY Streams
//!
//! Turns the byte chunks forwarded by a PTY reader thread into the text
//! [`OutputStream`] the terminal host hands to command processes.

use futures::stream::{self, StreamExt};
use tokio::sync::mpsc::UnboundedReceiver;

use crate::host::OutputStream;

/// Incremental UTF-8 decoder
///
/// A multibyte sequence split across reads is carried over to the next
/// read instead of being replaced. Invalid bytes become U+FFFD.
#[derive(Debug, Default)]
pub struct Utf8Decoder {
    carry: Vec<u8>,
}

impl Utf8Decoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode as much of `bytes` (plus any carried bytes) as possible
    pub fn decode(&mut self, bytes: &[u8]) -> String {
        self.carry.extend_from_slice(bytes);

        let mut text = String::new();
        loop {
            match std::str::from_utf8(&self.carry) {
                Ok(valid) => {
                    text.push_str(valid);
                    self.carry.clear();
                    break;
                }
                Err(e) => {
                    let valid = e.valid_up_to();
                    text.push_str(&String::from_utf8_lossy(&self.carry[..valid]));
                    match e.error_len() {
                        Some(invalid) => {
                            text.push(char::REPLACEMENT_CHARACTER);
                            self.carry.drain(..valid + invalid);
                        }
                        None => {
                            // Incomplete sequence at the end, wait for more
                            self.carry.drain(..valid);
                            break;
                        }
                    }
                }
            }
        }
        text
    }

    /// Flush carried bytes once no more input will come
    pub fn finish(&mut self) -> String {
        let rest = String::from_utf8_lossy(&self.carry).into_owned();
        self.carry.clear();
        rest
    }

    /// Bytes waiting for the rest of a multibyte sequence
    pub fn pending(&self) -> usize {
        self.carry.len()
    }
}

/// Build an output stream from a PTY reader channel
///
/// `echo` is yielded first, the way an interactive terminal echoes the
/// typed command before its output. The stream ends when the channel
/// closes.
pub fn output_stream(echo: Option<String>, output_rx: UnboundedReceiver<Vec<u8>>) -> OutputStream {
    let decoded = stream::unfold(
        Some((output_rx, Utf8Decoder::new())),
        |state| async move {
            let (mut output_rx, mut decoder) = state?;
            match output_rx.recv().await {
                Some(bytes) => {
                    let text = decoder.decode(&bytes);
                    Some((Ok(text), Some((output_rx, decoder))))
                }
                None => {
                    let rest = decoder.finish();
                    (!rest.is_empty()).then_some((Ok(rest), None))
                }
            }
        },
    );

    stream::iter(echo.map(Ok)).chain(decoded).boxed()
}
