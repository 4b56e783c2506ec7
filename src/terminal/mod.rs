//! Terminal Output Core
//!
//! Text-level building blocks used by every command process: the output
//! normalizer, line emission and hot/cool tracking.

pub mod heat;
pub mod lines;
pub mod output;

// Re-exports for convenience
pub use heat::{hot_period, is_compiling, HotTimer};
pub use lines::LineBuffer;
pub use output::{clean_first_chunk, remove_last_line_artifacts, OutputNormalizer};
