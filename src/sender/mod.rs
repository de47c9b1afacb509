//! Sequenced sending of quick-send items
//!
//! [`SequencedSender`] holds the queue and schedule only. It never touches
//! the serial link: the control thread asks it which item is due, builds the
//! frame and writes it, so timer-driven sends share the single write path
//! with user-initiated ones.
//!
//! Time is passed in by the caller, which keeps the schedule testable with
//! synthetic instants.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use crate::protocol::QueueItem;

pub const MIN_INTERVAL: Duration = Duration::from_millis(10);
pub const MAX_INTERVAL: Duration = Duration::from_millis(10_000);
pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(500);

/// Reasons a sequence cannot start
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SequenceError {
    #[error("no checked items to send")]
    NothingToSend,
    #[error("a sequence is already running")]
    AlreadyRunning,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SenderState {
    Idle,
    Running,
}

/// Fixed-interval queue of items
#[derive(Debug, Clone)]
pub struct SequencedSender {
    interval: Duration,
    queue: VecDeque<QueueItem>,
    /// When the head of `queue` is due; `None` while idle
    next_due: Option<Instant>,
}

impl Default for SequencedSender {
    fn default() -> Self {
        Self::new(DEFAULT_INTERVAL)
    }
}

impl SequencedSender {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval: clamp_interval(interval),
            queue: VecDeque::new(),
            next_due: None,
        }
    }

    pub fn state(&self) -> SenderState {
        if self.next_due.is_some() {
            SenderState::Running
        } else {
            SenderState::Idle
        }
    }

    pub fn is_running(&self) -> bool {
        self.state() == SenderState::Running
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Set the interval, clamped to 10 ms..=10 s. A running schedule keeps
    /// its current deadline and uses the new interval after it.
    pub fn set_interval(&mut self, interval: Duration) {
        self.interval = clamp_interval(interval);
    }

    /// Items still waiting to be sent
    pub fn remaining(&self) -> usize {
        self.queue.len()
    }

    /// Start sending the checked items in order.
    ///
    /// Returns the first item, which the caller sends right away. The
    /// remaining ones become due at `now + interval`, `now + 2 * interval`,
    /// and so on.
    pub fn start(&mut self, items: &[QueueItem], now: Instant) -> Result<QueueItem, SequenceError> {
        if self.is_running() {
            return Err(SequenceError::AlreadyRunning);
        }

        let mut queue: VecDeque<QueueItem> =
            items.iter().filter(|item| item.checked).cloned().collect();
        let first = queue.pop_front().ok_or(SequenceError::NothingToSend)?;

        tracing::debug!("Sequence started with {} queued items", queue.len());
        if !queue.is_empty() {
            self.next_due = Some(now + self.interval);
        }
        self.queue = queue;
        Ok(first)
    }

    /// Next item whose time has come, at most one per call.
    ///
    /// The schedule is fixed-rate: a late poll does not push later items
    /// back. Returns to idle after handing out the last item.
    pub fn poll(&mut self, now: Instant) -> Option<QueueItem> {
        let due = self.next_due?;
        if now < due {
            return None;
        }

        let item = self.queue.pop_front();
        self.next_due = if self.queue.is_empty() {
            tracing::debug!("Sequence finished");
            None
        } else {
            Some(due + self.interval)
        };
        item
    }

    /// Deadline of the next item, for sizing the caller's wait
    pub fn next_deadline(&self) -> Option<Instant> {
        self.next_due
    }

    /// Discard the remaining queue. Returns false when nothing was running.
    pub fn stop(&mut self) -> bool {
        if !self.is_running() {
            return false;
        }
        tracing::debug!("Sequence stopped with {} items left", self.queue.len());
        self.queue.clear();
        self.next_due = None;
        true
    }
}

fn clamp_interval(interval: Duration) -> Duration {
    interval.clamp(MIN_INTERVAL, MAX_INTERVAL)
}
