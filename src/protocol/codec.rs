//! Payload codec
//!
//! Pure conversions between user-entered text and wire bytes, plus the
//! additive checksum and its placement in front of a frame tail.

use serde::{Deserialize, Serialize};

use super::{PayloadError, PayloadResult};

/// Where the checksummed range ends, counted as trailing bytes excluded from
/// the sum. The checksum byte is inserted right before those tail bytes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum ChecksumEndMode {
    /// Sum to the end, append the checksum
    #[default]
    None,
    Minus1,
    Minus2,
    Minus3,
    Minus4,
}

impl ChecksumEndMode {
    /// All modes, in index order
    pub const ALL: [ChecksumEndMode; 5] = [
        ChecksumEndMode::None,
        ChecksumEndMode::Minus1,
        ChecksumEndMode::Minus2,
        ChecksumEndMode::Minus3,
        ChecksumEndMode::Minus4,
    ];

    /// Number of tail bytes excluded from the sum
    pub fn tail_len(self) -> usize {
        self.index() as usize
    }

    /// Persisted index: 0 = end, 1..=4 = tail length
    pub fn index(self) -> u8 {
        match self {
            ChecksumEndMode::None => 0,
            ChecksumEndMode::Minus1 => 1,
            ChecksumEndMode::Minus2 => 2,
            ChecksumEndMode::Minus3 => 3,
            ChecksumEndMode::Minus4 => 4,
        }
    }

    /// Short label for list displays
    pub fn label(self) -> &'static str {
        match self {
            ChecksumEndMode::None => "End",
            ChecksumEndMode::Minus1 => "-1",
            ChecksumEndMode::Minus2 => "-2",
            ChecksumEndMode::Minus3 => "-3",
            ChecksumEndMode::Minus4 => "-4",
        }
    }
}

/// Error for an end-mode index outside 0..=4
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("checksum end mode {0} is out of range (expected 0..=4)")]
pub struct InvalidEndMode(pub u8);

impl TryFrom<u8> for ChecksumEndMode {
    type Error = InvalidEndMode;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::ALL
            .get(usize::from(value))
            .copied()
            .ok_or(InvalidEndMode(value))
    }
}

impl From<ChecksumEndMode> for u8 {
    fn from(mode: ChecksumEndMode) -> Self {
        mode.index()
    }
}

/// Outcome of [`apply_checksum`].
///
/// `valid_range == false` is a normal result: the configured range was empty
/// or out of bounds, `checksum` is `None` and `payload` is unchanged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChecksumResult {
    pub payload: Vec<u8>,
    pub checksum: Option<u8>,
    pub valid_range: bool,
}

/// Remove the separators users put between hex byte pairs
pub fn normalize_hex(text: &str) -> String {
    text.chars()
        .filter(|c| !matches!(c, ' ' | ',' | '\t' | '\r' | '\n'))
        .collect()
}

/// Convert user text to payload bytes.
///
/// Hex input may separate bytes with spaces, commas, tabs or newlines. Text
/// input is encoded as UTF-8 and never fails.
pub fn parse_payload(text: &str, is_hex: bool) -> PayloadResult<Vec<u8>> {
    if !is_hex {
        return Ok(text.as_bytes().to_vec());
    }

    let digits: Vec<char> = normalize_hex(text).chars().collect();
    if digits.len() % 2 != 0 {
        return Err(PayloadError::OddLengthHex {
            digits: digits.len(),
        });
    }

    let mut nibbles = Vec::with_capacity(digits.len());
    for (position, &digit) in digits.iter().enumerate() {
        let value = digit
            .to_digit(16)
            .ok_or(PayloadError::InvalidHexDigit { digit, position })?;
        // to_digit(16) is < 16
        nibbles.push(value as u8);
    }

    Ok(nibbles.chunks(2).map(|pair| (pair[0] << 4) | pair[1]).collect())
}

/// Sum of all bytes, modulo 256
pub fn sum_checksum(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0u8, |acc, &b| acc.wrapping_add(b))
}

/// Compute the checksum over `payload[start..len - tail]` and insert it in
/// front of the tail.
///
/// `start_1based` of 0 is treated like 1.
pub fn apply_checksum(
    payload: &[u8],
    start_1based: usize,
    end_mode: ChecksumEndMode,
) -> ChecksumResult {
    let start = start_1based.saturating_sub(1);
    let tail = end_mode.tail_len();

    let range = payload
        .len()
        .checked_sub(tail)
        .filter(|&end| start < end)
        .map(|end| start..end);

    let Some(range) = range else {
        return ChecksumResult {
            payload: payload.to_vec(),
            checksum: None,
            valid_range: false,
        };
    };

    let split = range.end;
    let checksum = sum_checksum(&payload[range]);

    let mut framed = Vec::with_capacity(payload.len() + 1);
    framed.extend_from_slice(&payload[..split]);
    framed.push(checksum);
    framed.extend_from_slice(&payload[split..]);

    ChecksumResult {
        payload: framed,
        checksum: Some(checksum),
        valid_range: true,
    }
}

/// Format bytes as space separated uppercase hex pairs
pub fn format_hex(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{b:02X}"))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Render received bytes for the log.
///
/// Hex mode shows a hex dump; text mode decodes UTF-8 and shows invalid
/// bytes as `\xNN`. Each chunk ends with a newline so it forms its own line.
pub fn decode_received(bytes: &[u8], hex_mode: bool) -> String {
    let mut text = if hex_mode {
        format_hex(bytes)
    } else {
        let mut out = String::with_capacity(bytes.len());
        for chunk in bytes.utf8_chunks() {
            out.push_str(chunk.valid());
            for b in chunk.invalid() {
                out.push_str(&format!("\\x{b:02x}"));
            }
        }
        out
    };
    if !text.ends_with('\n') {
        text.push('\n');
    }
    text
}
