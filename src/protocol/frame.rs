//! Frames and quick-send items

use serde::{Deserialize, Serialize};

use super::codec::{apply_checksum, parse_payload, ChecksumEndMode};
use super::PayloadResult;

/// Terminator appended to a payload before the checksum is applied
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum LineEnding {
    #[default]
    None,
    Lf,
    CrLf,
    Cr,
}

impl LineEnding {
    pub fn as_bytes(self) -> &'static [u8] {
        self.as_str().as_bytes()
    }

    /// The terminator as text, which is also its persisted form
    pub fn as_str(self) -> &'static str {
        match self {
            LineEnding::None => "",
            LineEnding::Lf => "\n",
            LineEnding::CrLf => "\r\n",
            LineEnding::Cr => "\r",
        }
    }

    /// Short tag for list displays, empty for `None`
    pub fn tag(self) -> &'static str {
        match self {
            LineEnding::None => "",
            LineEnding::Lf => "LF",
            LineEnding::CrLf => "CRLF",
            LineEnding::Cr => "CR",
        }
    }

    /// Parse a persisted terminator or a tag name (case-insensitive)
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "" => return Some(LineEnding::None),
            "\n" => return Some(LineEnding::Lf),
            "\r\n" => return Some(LineEnding::CrLf),
            "\r" => return Some(LineEnding::Cr),
            _ => {}
        }
        match s.to_ascii_lowercase().as_str() {
            "none" => Some(LineEnding::None),
            "lf" => Some(LineEnding::Lf),
            "crlf" => Some(LineEnding::CrLf),
            "cr" => Some(LineEnding::Cr),
            _ => None,
        }
    }
}

impl TryFrom<String> for LineEnding {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value).ok_or_else(|| format!("unknown line ending {value:?}"))
    }
}

impl From<LineEnding> for String {
    fn from(ending: LineEnding) -> Self {
        ending.as_str().to_string()
    }
}

/// Checksum range configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChecksumSpec {
    /// 1-based index of the first summed byte
    pub start: usize,
    pub end_mode: ChecksumEndMode,
}

impl Default for ChecksumSpec {
    fn default() -> Self {
        Self {
            start: 1,
            end_mode: ChecksumEndMode::None,
        }
    }
}

/// What happened to the checksum while building a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChecksumOutcome {
    Inserted(u8),
    /// Range was empty or out of bounds; the frame was sent without one
    InvalidRange,
}

/// Wire bytes ready to be written
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub bytes: Vec<u8>,
    /// `None` when no checksum was requested
    pub checksum: Option<ChecksumOutcome>,
}

impl Frame {
    /// Suffix appended to the echoed log line
    pub fn echo_suffix(&self) -> String {
        match self.checksum {
            Some(ChecksumOutcome::Inserted(ck)) => format!(" [CK:{ck:02X}]"),
            Some(ChecksumOutcome::InvalidRange) => " [CK:Invalid Range]".to_string(),
            None => String::new(),
        }
    }
}

/// Build the bytes for one send.
///
/// The line ending is appended before the checksum is applied, so with a
/// tail mode the terminator can stay behind the checksum byte.
pub fn build_frame(
    text: &str,
    is_hex: bool,
    line_ending: LineEnding,
    checksum: Option<ChecksumSpec>,
) -> PayloadResult<Frame> {
    let mut bytes = parse_payload(text, is_hex)?;
    bytes.extend_from_slice(line_ending.as_bytes());

    let Some(spec) = checksum else {
        return Ok(Frame {
            bytes,
            checksum: None,
        });
    };

    let result = apply_checksum(&bytes, spec.start, spec.end_mode);
    let outcome = match result.checksum {
        Some(ck) => ChecksumOutcome::Inserted(ck),
        None => ChecksumOutcome::InvalidRange,
    };
    Ok(Frame {
        bytes: result.payload,
        checksum: Some(outcome),
    })
}

fn default_checksum_start() -> usize {
    1
}

fn default_checked() -> bool {
    true
}

/// A saved, reusable payload template
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueItem {
    pub content: String,
    #[serde(default)]
    pub is_hex: bool,
    #[serde(default)]
    pub auto_checksum: bool,
    #[serde(default = "default_checksum_start")]
    pub checksum_start: usize,
    #[serde(default)]
    pub checksum_end_mode: ChecksumEndMode,
    #[serde(default)]
    pub line_ending: LineEnding,
    #[serde(default = "default_checked")]
    pub checked: bool,
}

impl QueueItem {
    /// Plain text item, checked, no checksum or terminator
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            is_hex: false,
            auto_checksum: false,
            checksum_start: 1,
            checksum_end_mode: ChecksumEndMode::None,
            line_ending: LineEnding::None,
            checked: true,
        }
    }

    /// Hex item, checked, no checksum or terminator
    pub fn hex(content: impl Into<String>) -> Self {
        Self {
            is_hex: true,
            ..Self::text(content)
        }
    }

    pub fn with_checksum(mut self, start: usize, end_mode: ChecksumEndMode) -> Self {
        self.auto_checksum = true;
        self.checksum_start = start.max(1);
        self.checksum_end_mode = end_mode;
        self
    }

    pub fn with_line_ending(mut self, line_ending: LineEnding) -> Self {
        self.line_ending = line_ending;
        self
    }

    pub fn with_checked(mut self, checked: bool) -> Self {
        self.checked = checked;
        self
    }

    /// Checksum configuration, if enabled for this item
    pub fn checksum_spec(&self) -> Option<ChecksumSpec> {
        self.auto_checksum.then(|| ChecksumSpec {
            start: self.checksum_start.max(1),
            end_mode: self.checksum_end_mode,
        })
    }

    pub fn build(&self) -> PayloadResult<Frame> {
        build_frame(
            &self.content,
            self.is_hex,
            self.line_ending,
            self.checksum_spec(),
        )
    }

    /// List text such as `[HEX,CK:1~-2,CRLF] AA BB`
    pub fn display_label(&self) -> String {
        let mut tags = Vec::new();
        if self.is_hex {
            tags.push("HEX".to_string());
        }
        if self.auto_checksum {
            tags.push(format!(
                "CK:{}~{}",
                self.checksum_start,
                self.checksum_end_mode.label()
            ));
        }
        if self.line_ending != LineEnding::None {
            tags.push(self.line_ending.tag().to_string());
        }

        if tags.is_empty() {
            self.content.clone()
        } else {
            format!("[{}] {}", tags.join(","), self.content)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::PayloadError;

    #[test]
    fn test_build_frame_plain() {
        let frame = build_frame("AT", false, LineEnding::CrLf, None).unwrap();
        assert_eq!(frame.bytes, b"AT\r\n".to_vec());
        assert_eq!(frame.checksum, None);
        assert_eq!(frame.echo_suffix(), "");
    }

    #[test]
    fn test_build_frame_checksum_before_terminator() {
        let spec = ChecksumSpec {
            start: 1,
            end_mode: ChecksumEndMode::Minus2,
        };
        let frame = build_frame("01 02", true, LineEnding::CrLf, Some(spec)).unwrap();
        assert_eq!(frame.bytes, vec![0x01, 0x02, 0x03, b'\r', b'\n']);
        assert_eq!(frame.checksum, Some(ChecksumOutcome::Inserted(0x03)));
        assert_eq!(frame.echo_suffix(), " [CK:03]");
    }

    #[test]
    fn test_build_frame_invalid_range_still_sends() {
        let spec = ChecksumSpec {
            start: 5,
            end_mode: ChecksumEndMode::None,
        };
        let frame = build_frame("AA", true, LineEnding::None, Some(spec)).unwrap();
        assert_eq!(frame.bytes, vec![0xAA]);
        assert_eq!(frame.checksum, Some(ChecksumOutcome::InvalidRange));
        assert_eq!(frame.echo_suffix(), " [CK:Invalid Range]");
    }

    #[test]
    fn test_build_frame_bad_hex() {
        assert_eq!(
            build_frame("ABC", true, LineEnding::Lf, None),
            Err(PayloadError::OddLengthHex { digits: 3 })
        );
    }

    #[test]
    fn test_line_ending_parse() {
        assert_eq!(LineEnding::parse("\r\n"), Some(LineEnding::CrLf));
        assert_eq!(LineEnding::parse("CRLF"), Some(LineEnding::CrLf));
        assert_eq!(LineEnding::parse("lf"), Some(LineEnding::Lf));
        assert_eq!(LineEnding::parse("none"), Some(LineEnding::None));
        assert_eq!(LineEnding::parse("\t"), None);
    }

    #[test]
    fn test_display_label() {
        assert_eq!(QueueItem::text("hello").display_label(), "hello");

        let item = QueueItem::hex("AA BB")
            .with_checksum(1, ChecksumEndMode::Minus2)
            .with_line_ending(LineEnding::CrLf);
        assert_eq!(item.display_label(), "[HEX,CK:1~-2,CRLF] AA BB");

        let item = QueueItem::text("x").with_checksum(3, ChecksumEndMode::None);
        assert_eq!(item.display_label(), "[CK:3~End] x");
    }

    #[test]
    fn test_queue_item_defaults_from_json() {
        let item: QueueItem = serde_json::from_str(r#"{"content": "ping"}"#).unwrap();
        assert_eq!(item, QueueItem::text("ping"));
    }

    #[test]
    fn test_queue_item_json_fields() {
        let item = QueueItem::hex("01")
            .with_checksum(2, ChecksumEndMode::Minus1)
            .with_line_ending(LineEnding::Cr)
            .with_checked(false);
        let value = serde_json::to_value(&item).unwrap();
        assert_eq!(value["checksum_end_mode"], 1);
        assert_eq!(value["line_ending"], "\r");
        assert_eq!(value["checked"], false);

        let back: QueueItem = serde_json::from_value(value).unwrap();
        assert_eq!(back, item);
    }

    #[test]
    fn test_queue_item_rejects_bad_end_mode() {
        let res: Result<QueueItem, _> =
            serde_json::from_str(r#"{"content": "x", "checksum_end_mode": 9}"#);
        assert!(res.is_err());
    }

    #[test]
    fn test_checksum_spec_clamps_start() {
        let mut item = QueueItem::text("x").with_checksum(1, ChecksumEndMode::None);
        item.checksum_start = 0;
        assert_eq!(item.checksum_spec().unwrap().start, 1);
    }
}
