//! Received chunk decoding
//!
//! The driver hands over bytes in whatever pieces the read returned. A
//! multibyte character or an SGR sequence cut at a read boundary is held
//! back here and completed by the next chunk, so each logged line only
//! contains whole characters and whole escapes.

use super::decode_received;

/// Longest escape prefix held between reads, the same bound the SGR parser
/// uses for its own hold-back
const MAX_HELD_ESCAPE: usize = 32;

/// Turns received chunks into log text, carrying cut sequences over
#[derive(Debug, Clone, Default)]
pub struct ReceiveDecoder {
    carry: Vec<u8>,
}

impl ReceiveDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether bytes from an earlier chunk are waiting for completion
    pub fn has_pending(&self) -> bool {
        !self.carry.is_empty()
    }

    /// Decode one chunk. Returns `None` when the whole chunk was held back.
    ///
    /// Hex mode never holds anything: a hex dump has no sequences to cut.
    pub fn decode(&mut self, bytes: &[u8], hex_mode: bool) -> Option<String> {
        let mut data = std::mem::take(&mut self.carry);
        data.extend_from_slice(bytes);

        if !hex_mode {
            let held = held_tail_len(&data);
            self.carry = data.split_off(data.len() - held);
        }
        if data.is_empty() {
            return None;
        }
        Some(decode_received(&data, hex_mode))
    }

    /// Render whatever is still held, for when the stream has ended
    pub fn flush(&mut self, hex_mode: bool) -> Option<String> {
        if self.carry.is_empty() {
            return None;
        }
        let data = std::mem::take(&mut self.carry);
        Some(decode_received(&data, hex_mode))
    }
}

/// Bytes at the end of `data` that the next chunk may complete
fn held_tail_len(data: &[u8]) -> usize {
    match incomplete_utf8_len(data) {
        0 => incomplete_escape_len(data),
        n => n,
    }
}

/// Length of a multibyte character cut off at the end of `data`
fn incomplete_utf8_len(data: &[u8]) -> usize {
    for back in 1..=data.len().min(3) {
        let byte = data[data.len() - back];
        if byte & 0xC0 == 0x80 {
            continue;
        }
        let width = match byte {
            0xC2..=0xDF => 2,
            0xE0..=0xEF => 3,
            0xF0..=0xF4 => 4,
            _ => return 0,
        };
        return if width > back { back } else { 0 };
    }
    0
}

/// Length of a trailing `ESC`, `ESC [` or `ESC [ digits;...` that has not
/// reached its final byte yet
fn incomplete_escape_len(data: &[u8]) -> usize {
    let window = &data[data.len().saturating_sub(MAX_HELD_ESCAPE)..];
    let Some(esc) = window.iter().rposition(|&b| b == 0x1b) else {
        return 0;
    };
    let tail = &window[esc..];
    let open = match tail.get(1) {
        None => true,
        Some(b'[') => tail[2..].iter().all(|b| b.is_ascii_digit() || *b == b';'),
        Some(_) => false,
    };
    if open {
        tail.len()
    } else {
        0
    }
}
