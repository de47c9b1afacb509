//! Styled log lines
//!
//! A line is an ordered sequence of styled text runs. Lines are built up by
//! appends and become immutable once a newline terminates them.

use serde::{Deserialize, Serialize};

use super::style::StyleState;

/// A run of text sharing one style
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StyledRun {
    pub text: String,
    pub style: StyleState,
}

impl StyledRun {
    /// Create a run with the given style
    pub fn new(text: impl Into<String>, style: StyleState) -> Self {
        Self {
            text: text.into(),
            style,
        }
    }

    /// Create an unstyled run
    pub fn plain(text: impl Into<String>) -> Self {
        Self::new(text, StyleState::default())
    }
}

/// A line in the log, consisting of runs and a termination flag
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Line {
    /// The runs in this line, in display order
    pub runs: Vec<StyledRun>,
    /// Whether a newline has closed this line
    terminated: bool,
}

impl Line {
    /// Create an empty, open line
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a run; empty runs are dropped and adjacent runs with the
    /// same style are merged.
    pub fn push(&mut self, run: StyledRun) {
        if run.text.is_empty() {
            return;
        }
        match self.runs.last_mut() {
            Some(last) if last.style == run.style => last.text.push_str(&run.text),
            _ => self.runs.push(run),
        }
    }

    /// Check if a newline has closed this line
    pub fn is_terminated(&self) -> bool {
        self.terminated
    }

    pub(crate) fn terminate(&mut self) {
        self.terminated = true;
    }

    /// Check if the line has no text
    pub fn is_empty(&self) -> bool {
        self.runs.iter().all(|r| r.text.is_empty())
    }

    /// Extract the plain text of the line, styles discarded
    pub fn text(&self) -> String {
        self.runs.iter().map(|r| r.text.as_str()).collect()
    }

    /// Render the line for an ANSI terminal, ending with a style reset
    pub fn render_ansi(&self) -> String {
        let mut out = String::new();
        for run in &self.runs {
            out.push_str(&run.style.to_sgr());
            out.push_str(&run.text);
        }
        if !self.runs.is_empty() {
            out.push_str("\x1b[0m");
        }
        out
    }
}
