//! Serial Monitor Library
//!
//! The engine behind a serial terminal for embedded work: a capped, ANSI
//! aware log that spills trimmed lines to disk, and the framing logic that
//! turns user input into wire bytes with a checksum in the right place.
//!
//! - `core`: styled lines, the capped terminal buffer, overflow sinks
//! - `parser`: SGR style parser and escape stripping
//! - `protocol`: hex/text payloads, checksums, frames, quick-send items
//! - `sender`: fixed-interval sequencing of quick-send items
//! - `serial`: the serial link, its reader thread, device polling
//! - `app`: settings persistence and the control-thread [`app::Monitor`]

pub mod app;
pub mod core;
pub mod parser;
pub mod protocol;
pub mod sender;
pub mod serial;

pub use app::{Monitor, Settings, SettingsRepository};
pub use core::{TerminalBuffer, TrimPolicy};
pub use protocol::{apply_checksum, format_hex, parse_payload, QueueItem};
pub use serial::SerialLink;
