//! Outbound payload framing
//!
//! Converts user-entered text into the bytes put on the wire: hex or UTF-8
//! decoding, line endings, and an additive checksum placed in front of a
//! configurable number of tail bytes. Also holds [`QueueItem`], the saved
//! quick-send template built on the same path, and the decoder that turns
//! received chunks back into log text.

mod codec;
mod frame;
mod receive;

pub use codec::{
    apply_checksum, decode_received, format_hex, normalize_hex, parse_payload, sum_checksum,
    ChecksumEndMode, ChecksumResult, InvalidEndMode,
};
pub use frame::{build_frame, ChecksumOutcome, ChecksumSpec, Frame, LineEnding, QueueItem};
pub use receive::ReceiveDecoder;

/// Errors decoding user input into a payload
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PayloadError {
    /// Hex input has an odd number of digits after removing separators
    #[error("hex input has an odd number of digits ({digits})")]
    OddLengthHex { digits: usize },

    /// A character that is not a hex digit remains after removing separators
    #[error("invalid hex digit '{digit}' at position {position}")]
    InvalidHexDigit { digit: char, position: usize },
}

pub type PayloadResult<T> = Result<T, PayloadError>;
