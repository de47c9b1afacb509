//! Escape sequence stripping
//!
//! Stateless removal of ANSI escape sequences: CSI sequences of any kind
//! (`ESC [ params intermediates final`) and two-byte escapes (`ESC` followed
//! by one of `@`..`Z`, `\`, `]`, `^`, `_`).

/// Length in bytes of the escape sequence at the start of `seq`, if it is
/// one of the recognized forms. `seq` starts with ESC.
fn escape_len(seq: &str) -> Option<usize> {
    let bytes = seq.as_bytes();
    match *bytes.get(1)? {
        b'[' => {
            let mut i = 2;
            // Parameter bytes 0x30-0x3F
            while i < bytes.len() && (0x30..=0x3F).contains(&bytes[i]) {
                i += 1;
            }
            // Intermediate bytes 0x20-0x2F
            while i < bytes.len() && (0x20..=0x2F).contains(&bytes[i]) {
                i += 1;
            }
            // Final byte 0x40-0x7E
            match bytes.get(i) {
                Some(0x40..=0x7E) => Some(i + 1),
                _ => None,
            }
        }
        0x40..=0x5A | 0x5C..=0x5F => Some(2),
        _ => None,
    }
}

/// Remove recognized escape sequences from `text`.
///
/// Unrecognized or incomplete escapes are kept as-is.
pub fn strip(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(pos) = rest.find('\x1b') {
        out.push_str(&rest[..pos]);
        let seq = &rest[pos..];
        match escape_len(seq) {
            Some(len) => rest = &seq[len..],
            None => {
                out.push('\x1b');
                rest = &seq[1..];
            }
        }
    }

    out.push_str(rest);
    out
}
