//! Golden tests for outbound framing
//!
//! Each case is user input plus item settings, and the exact bytes and
//! echo suffix that must come out.

use serial_monitor::protocol::{ChecksumEndMode, LineEnding, PayloadError, QueueItem};

struct Case {
    name: &'static str,
    item: QueueItem,
    bytes: &'static [u8],
    suffix: &'static str,
}

fn cases() -> Vec<Case> {
    vec![
        Case {
            name: "plain text",
            item: QueueItem::text("AT+GMR"),
            bytes: b"AT+GMR",
            suffix: "",
        },
        Case {
            name: "text with CRLF",
            item: QueueItem::text("AT").with_line_ending(LineEnding::CrLf),
            bytes: b"AT\r\n",
            suffix: "",
        },
        Case {
            name: "hex, checksum before two tail bytes",
            item: QueueItem::hex("AA BB CC DD").with_checksum(1, ChecksumEndMode::Minus2),
            bytes: &[0xAA, 0xBB, 0x65, 0xCC, 0xDD],
            suffix: " [CK:65]",
        },
        Case {
            name: "hex, checksum appended",
            item: QueueItem::hex("10,20,30").with_checksum(1, ChecksumEndMode::None),
            bytes: &[0x10, 0x20, 0x30, 0x60],
            suffix: " [CK:60]",
        },
        Case {
            name: "hex, checksum skips header byte",
            item: QueueItem::hex("7E 01 02 7E").with_checksum(2, ChecksumEndMode::Minus1),
            bytes: &[0x7E, 0x01, 0x02, 0x03, 0x7E],
            suffix: " [CK:03]",
        },
        Case {
            name: "text, terminator kept after checksum",
            item: QueueItem::text("AB")
                .with_line_ending(LineEnding::CrLf)
                .with_checksum(1, ChecksumEndMode::Minus2),
            bytes: &[b'A', b'B', 0x83, b'\r', b'\n'],
            suffix: " [CK:83]",
        },
        Case {
            name: "terminator summed when tail is shorter",
            item: QueueItem::text("A")
                .with_line_ending(LineEnding::Cr)
                .with_checksum(1, ChecksumEndMode::None),
            bytes: &[b'A', b'\r', 0x4E],
            suffix: " [CK:4E]",
        },
        Case {
            name: "tail longer than payload",
            item: QueueItem::hex("01 02").with_checksum(1, ChecksumEndMode::Minus4),
            bytes: &[0x01, 0x02],
            suffix: " [CK:Invalid Range]",
        },
        Case {
            name: "start past the end",
            item: QueueItem::hex("01 02 03").with_checksum(4, ChecksumEndMode::None),
            bytes: &[0x01, 0x02, 0x03],
            suffix: " [CK:Invalid Range]",
        },
        Case {
            name: "empty range when start meets tail",
            item: QueueItem::hex("01 02 03").with_checksum(3, ChecksumEndMode::Minus1),
            bytes: &[0x01, 0x02, 0x03],
            suffix: " [CK:Invalid Range]",
        },
        Case {
            name: "checksum wraps",
            item: QueueItem::hex("FF FF FF").with_checksum(1, ChecksumEndMode::None),
            bytes: &[0xFF, 0xFF, 0xFF, 0xFD],
            suffix: " [CK:FD]",
        },
    ]
}

#[test]
fn test_framing_golden() {
    for case in cases() {
        let frame = case
            .item
            .build()
            .unwrap_or_else(|e| panic!("{}: {e}", case.name));
        assert_eq!(frame.bytes, case.bytes, "{}", case.name);
        assert_eq!(frame.echo_suffix(), case.suffix, "{}", case.name);
    }
}

#[test]
fn test_framing_rejects_bad_hex() {
    assert_eq!(
        QueueItem::hex("AB C").build(),
        Err(PayloadError::OddLengthHex { digits: 3 })
    );
    assert_eq!(
        QueueItem::hex("0x12").build(),
        Err(PayloadError::InvalidHexDigit {
            digit: 'x',
            position: 1
        })
    );
}

#[test]
fn test_labels_match_items() {
    let labels: Vec<String> = cases().iter().map(|c| c.item.display_label()).collect();
    assert_eq!(labels[0], "AT+GMR");
    assert_eq!(labels[1], "[CRLF] AT");
    assert_eq!(labels[2], "[HEX,CK:1~-2] AA BB CC DD");
    assert_eq!(labels[5], "[CK:1~-2,CRLF] AB");
}
