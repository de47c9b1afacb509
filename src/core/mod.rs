//! Log Core Module
//!
//! Platform-independent log state. This module contains:
//! - Text style state and the 16-color palette
//! - Styled runs and lines
//! - The capped terminal buffer and its trim policy
//! - Overflow sinks for evicted text
//!
//! Nothing in here does I/O except the overflow file, and nothing is shared
//! across threads: the buffer belongs to whichever thread drives the UI.

mod buffer;
mod line;
mod overflow;
mod style;

pub use buffer::{
    format_timestamp, TerminalBuffer, TrimPolicy, DEFAULT_BATCH_LINES, DEFAULT_MAX_LINES,
};
pub use line::{Line, StyledRun};
pub use overflow::{session_dir, OverflowFile, OverflowSink};
pub use style::{Rgb, StyleState, ANSI_PALETTE, TIMESTAMP_GRAY};
