//! Terminal log buffer
//!
//! The buffer stores the received/sent log as styled lines. It is capped by a
//! [`TrimPolicy`]: once the line count exceeds `max_lines`, the oldest lines
//! are evicted in batches, and their plain text is written to an
//! [`OverflowSink`] before they are dropped.
//!
//! All mutation happens on the thread that owns the buffer; background
//! readers hand their bytes over and never touch it directly.

use std::collections::VecDeque;
use std::io;

use chrono::{Local, NaiveTime};
use serde::{Deserialize, Serialize};

use super::line::{Line, StyledRun};
use super::overflow::OverflowSink;
use super::style::{StyleState, TIMESTAMP_GRAY};
use crate::parser::{strip, AnsiStyleParser};

/// Default line cap
pub const DEFAULT_MAX_LINES: usize = 5000;
/// Default number of lines evicted per batch
pub const DEFAULT_BATCH_LINES: usize = 800;

/// Line-count cap and eviction batch size
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrimPolicy {
    pub enabled: bool,
    pub max_lines: usize,
    pub batch_lines: usize,
}

impl Default for TrimPolicy {
    fn default() -> Self {
        Self {
            enabled: true,
            max_lines: DEFAULT_MAX_LINES,
            batch_lines: DEFAULT_BATCH_LINES,
        }
    }
}

impl TrimPolicy {
    /// Create a policy; counts below 1 are raised to 1
    pub fn new(enabled: bool, max_lines: usize, batch_lines: usize) -> Self {
        Self {
            enabled,
            max_lines: max_lines.max(1),
            batch_lines: batch_lines.max(1),
        }
    }
}

/// Format a timestamp prefix as `[HH:MM:SS.mmm] `
pub fn format_timestamp(time: NaiveTime) -> String {
    time.format("[%H:%M:%S%.3f] ").to_string()
}

/// The styled, capped log
pub struct TerminalBuffer {
    lines: VecDeque<Line>,
    parser: AnsiStyleParser,
    policy: TrimPolicy,
    sink: Box<dyn OverflowSink>,
    colors_enabled: bool,
    timestamps_enabled: bool,
    /// Number of lines removed from the front since creation
    base_index: u64,
}

impl std::fmt::Debug for TerminalBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TerminalBuffer")
            .field("lines", &self.lines.len())
            .field("policy", &self.policy)
            .field("colors_enabled", &self.colors_enabled)
            .field("timestamps_enabled", &self.timestamps_enabled)
            .field("base_index", &self.base_index)
            .finish()
    }
}

impl TerminalBuffer {
    /// Create an empty buffer with the given policy and overflow sink
    pub fn new(policy: TrimPolicy, sink: Box<dyn OverflowSink>) -> Self {
        Self {
            lines: VecDeque::new(),
            parser: AnsiStyleParser::new(),
            policy: TrimPolicy::new(policy.enabled, policy.max_lines, policy.batch_lines),
            sink,
            colors_enabled: true,
            timestamps_enabled: true,
            base_index: 0,
        }
    }

    /// Number of lines currently held, including an open last line
    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    /// Check if the buffer holds no lines
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Get a line by index (0 = oldest line held)
    pub fn get(&self, index: usize) -> Option<&Line> {
        self.lines.get(index)
    }

    /// Iterate over lines from oldest to newest
    pub fn lines(&self) -> impl Iterator<Item = &Line> + '_ {
        self.lines.iter()
    }

    /// Absolute index of the oldest line held.
    ///
    /// Grows by one for every line trimmed or cleared, so a renderer can
    /// track which lines it has already shown.
    pub fn first_line_index(&self) -> u64 {
        self.base_index
    }

    /// Plain text of all lines, newline separated
    pub fn plain_text(&self) -> String {
        self.lines
            .iter()
            .map(Line::text)
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn policy(&self) -> TrimPolicy {
        self.policy
    }

    pub fn colors_enabled(&self) -> bool {
        self.colors_enabled
    }

    /// Toggle SGR interpretation. When disabled, escapes are stripped.
    pub fn set_colors_enabled(&mut self, enabled: bool) {
        self.colors_enabled = enabled;
    }

    pub fn timestamps_enabled(&self) -> bool {
        self.timestamps_enabled
    }

    /// Toggle timestamp prefixes on appends that request them
    pub fn set_timestamps_enabled(&mut self, enabled: bool) {
        self.timestamps_enabled = enabled;
    }

    /// The style carried into the next append
    pub fn current_style(&self) -> StyleState {
        self.parser.style()
    }

    /// Append text using the wall clock for the timestamp.
    ///
    /// Returns the number of lines trimmed afterwards.
    pub fn append(&mut self, text: &str, with_timestamp: bool) -> io::Result<usize> {
        let stamp = (with_timestamp && self.timestamps_enabled).then(|| Local::now().time());
        self.append_at(text, stamp)
    }

    /// Append text with an explicit timestamp prefix (or none).
    ///
    /// Internal newlines start new lines. A `\r` right before a `\n` is
    /// dropped. The buffer is trimmed before this returns.
    pub fn append_at(&mut self, text: &str, stamp: Option<NaiveTime>) -> io::Result<usize> {
        if let Some(time) = stamp {
            self.push_run(StyledRun::new(
                format_timestamp(time),
                StyleState::with_fg(TIMESTAMP_GRAY),
            ));
        }

        let runs = if self.colors_enabled {
            self.parser.parse(text)
        } else {
            vec![StyledRun::plain(strip(text))]
        };
        for run in runs {
            self.push_run(run);
        }

        self.trim_if_needed()
    }

    fn push_run(&mut self, run: StyledRun) {
        let text = run.text.replace("\r\n", "\n");
        let mut pieces = text.split('\n').peekable();
        while let Some(piece) = pieces.next() {
            if !piece.is_empty() {
                self.open_line().push(StyledRun::new(piece, run.style));
            }
            if pieces.peek().is_some() {
                self.open_line().terminate();
            }
        }
    }

    /// The last line if it is still open, otherwise a fresh one
    fn open_line(&mut self) -> &mut Line {
        let needs_new = self.lines.back().map_or(true, Line::is_terminated);
        if needs_new {
            self.lines.push_back(Line::new());
        }
        let last = self.lines.len() - 1;
        &mut self.lines[last]
    }

    /// Evict the oldest lines while the count exceeds `max_lines`.
    ///
    /// Each batch is `min(batch_lines, line_count - max_lines)` lines, so the
    /// buffer is never trimmed below the cap. A batch is only dropped after
    /// the sink accepted its text; on a sink error the batch stays in place
    /// and the error is returned.
    pub fn trim_if_needed(&mut self) -> io::Result<usize> {
        if !self.policy.enabled {
            return Ok(0);
        }

        let mut trimmed = 0;
        while self.lines.len() > self.policy.max_lines {
            let count = self
                .policy
                .batch_lines
                .min(self.lines.len() - self.policy.max_lines);
            if count == 0 {
                break;
            }

            let mut evicted = self
                .lines
                .iter()
                .take(count)
                .map(Line::text)
                .collect::<Vec<_>>()
                .join("\n");
            evicted.push('\n');

            if let Err(e) = self.sink.write_evicted(&evicted) {
                tracing::warn!("Overflow sink rejected {} lines: {}", count, e);
                return Err(e);
            }

            self.lines.drain(..count);
            self.base_index += count as u64;
            trimmed += count;
        }

        if trimmed > 0 {
            tracing::debug!("Trimmed {} lines from log", trimmed);
        }
        Ok(trimmed)
    }

    /// Replace the whole policy, trimming if the cap went down
    pub fn set_policy(&mut self, policy: TrimPolicy) -> io::Result<usize> {
        let previous = self.policy;
        self.policy = TrimPolicy::new(policy.enabled, policy.max_lines, policy.batch_lines);
        if self.policy.max_lines < previous.max_lines {
            self.trim_if_needed()
        } else {
            Ok(0)
        }
    }

    /// Set the line cap; a decrease trims immediately
    pub fn set_max_lines(&mut self, max_lines: usize) -> io::Result<usize> {
        self.set_policy(TrimPolicy {
            max_lines,
            ..self.policy
        })
    }

    pub fn set_batch_lines(&mut self, batch_lines: usize) {
        self.policy.batch_lines = batch_lines.max(1);
    }

    pub fn set_trim_enabled(&mut self, enabled: bool) {
        self.policy.enabled = enabled;
    }

    /// Emit an escape prefix the parser is still holding as plain text.
    ///
    /// For when the input has ended and nothing will complete it.
    pub fn flush_pending(&mut self) -> io::Result<usize> {
        match self.parser.flush() {
            Some(run) => {
                self.push_run(run);
                self.trim_if_needed()
            }
            None => Ok(0),
        }
    }

    /// Drop all lines. The overflow sink is not written.
    ///
    /// A partial escape held by the parser belonged to the cleared text and
    /// is dropped with it; the active style is kept.
    pub fn clear(&mut self) {
        self.base_index += self.lines.len() as u64;
        self.lines.clear();
        let _ = self.parser.flush();
    }
}
