//! SGR Style Parser
//!
//! Turns text containing ANSI SGR sequences (`ESC [ params m`) into styled
//! runs. Only SGR is interpreted; any other escape sequence is left in the
//! text untouched, the way a minimal serial console shows it.
//!
//! The parser is stateful across calls in two ways:
//! - the active style carries over, so bold set in one chunk still applies
//!   to plain text arriving in the next one;
//! - an SGR sequence cut off at the end of a chunk is held back and
//!   completed by the following chunk.

use crate::core::{StyleState, StyledRun};

/// Longest incomplete sequence held back between calls. Anything longer is
/// not a plausible SGR prefix and is emitted as text.
const MAX_PENDING: usize = 32;

/// Result of scanning at an ESC byte
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scan<'a> {
    /// A full SGR sequence: parameter text and total length in bytes
    Complete { params: &'a str, len: usize },
    /// Input ended inside something that may still become SGR
    Partial,
    /// Not an SGR sequence
    NotSgr,
}

/// Scan the sequence at the start of `s`, which begins with ESC
fn scan_sgr(s: &str) -> Scan<'_> {
    let bytes = s.as_bytes();
    match bytes.get(1) {
        None => return Scan::Partial,
        Some(b'[') => {}
        Some(_) => return Scan::NotSgr,
    }

    let mut end = 2;
    while end < bytes.len() && (bytes[end].is_ascii_digit() || bytes[end] == b';') {
        end += 1;
    }

    match bytes.get(end) {
        None => Scan::Partial,
        Some(b'm') => Scan::Complete {
            params: &s[2..end],
            len: end + 1,
        },
        Some(_) => Scan::NotSgr,
    }
}

/// Stateful SGR parser
#[derive(Debug, Clone, Default)]
pub struct AnsiStyleParser {
    style: StyleState,
    /// Incomplete sequence from the end of the previous chunk
    pending: String,
}

impl AnsiStyleParser {
    /// Create a parser with default style
    pub fn new() -> Self {
        Self::default()
    }

    /// The style that applies to the next text
    pub fn style(&self) -> StyleState {
        self.style
    }

    /// Reset style and drop any held-back sequence
    pub fn reset(&mut self) {
        self.style.reset();
        self.pending.clear();
    }

    /// Whether an incomplete sequence is being held back
    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Give up on a held-back sequence and return it as text in the
    /// current style
    pub fn flush(&mut self) -> Option<StyledRun> {
        if self.pending.is_empty() {
            return None;
        }
        Some(StyledRun::new(std::mem::take(&mut self.pending), self.style))
    }

    /// Parse a chunk into styled runs.
    ///
    /// Text before each SGR sequence is emitted with the style active before
    /// that sequence, then the sequence is applied.
    pub fn parse(&mut self, text: &str) -> Vec<StyledRun> {
        let mut input = std::mem::take(&mut self.pending);
        input.push_str(text);

        let mut runs = Vec::new();
        let mut run_start = 0;
        let mut pos = 0;

        while let Some(offset) = input[pos..].find('\x1b') {
            let esc = pos + offset;
            match scan_sgr(&input[esc..]) {
                Scan::Complete { params, len } => {
                    if esc > run_start {
                        runs.push(StyledRun::new(&input[run_start..esc], self.style));
                    }
                    self.apply_params(params);
                    pos = esc + len;
                    run_start = pos;
                }
                Scan::Partial if input.len() - esc <= MAX_PENDING => {
                    if esc > run_start {
                        runs.push(StyledRun::new(&input[run_start..esc], self.style));
                    }
                    self.pending = input[esc..].to_string();
                    return runs;
                }
                Scan::Partial | Scan::NotSgr => {
                    pos = esc + 1;
                }
            }
        }

        if run_start < input.len() {
            runs.push(StyledRun::new(&input[run_start..], self.style));
        }
        runs
    }

    /// Apply a semicolon separated parameter list. An empty list resets.
    fn apply_params(&mut self, params: &str) {
        if params.is_empty() {
            self.style.reset();
            return;
        }
        for part in params.split(';') {
            if part.is_empty() {
                continue;
            }
            match part.parse::<u16>() {
                Ok(code) => self.style.apply_code(code),
                Err(_) => tracing::trace!("Ignoring out of range SGR code {}", part),
            }
        }
    }
}
