//! Application glue module
//!
//! Settings persistence, the quick-send list, and [`Monitor`], the
//! control-thread facade that ties the buffer, codec, sender and link
//! together.

mod config;
mod monitor;
mod quick_send;

pub use config::{ConfigError, Settings, SettingsRepository};
pub use monitor::Monitor;
pub use quick_send::QuickSendList;

use crate::protocol::PayloadError;
use crate::sender::SequenceError;
use crate::serial::LinkError;

/// Why a send did not go out
#[derive(Debug, thiserror::Error)]
pub enum SendError {
    #[error("not connected")]
    NotConnected,
    #[error("nothing to send")]
    EmptyInput,
    #[error(transparent)]
    Payload(#[from] PayloadError),
    #[error(transparent)]
    Link(#[from] LinkError),
    #[error(transparent)]
    Sequence(#[from] SequenceError),
}
