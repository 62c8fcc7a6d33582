//! Byte buffer codec.
//!
//! Moves transport chunks into and out of the FIFO inbound buffer, and
//! renders byte sequences for debug logs. Everything here is pure.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::VecDeque;
use std::fmt::Write;

/// Printable ASCII except the apostrophe.
static NON_PRINTABLE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[^\x20-\x26\x28-\x7E]+").expect("static pattern is valid")
});

/// Append a chunk to the tail of the buffer, preserving arrival order.
pub fn append(buffer: &mut VecDeque<u8>, chunk: &[u8]) {
    buffer.extend(chunk.iter().copied());
}

/// Remove and return up to `max` bytes from the front of the buffer.
pub fn take_front(buffer: &mut VecDeque<u8>, max: usize) -> Vec<u8> {
    let n = max.min(buffer.len());
    buffer.drain(..n).collect()
}

/// Decode bytes one char per byte (Latin-1).
pub fn latin1_decode(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| char::from(b)).collect()
}

/// Encode text one byte per UTF-16 unit, keeping the low 8 bits.
///
/// Inverse of [`latin1_decode`] for text made of chars up to U+00FF.
pub fn latin1_encode(text: &str) -> Vec<u8> {
    text.encode_utf16().map(|unit| (unit & 0xFF) as u8).collect()
}

/// Drop everything outside printable ASCII (and the apostrophe).
pub fn strip_non_ascii(text: &str) -> String {
    NON_PRINTABLE.replace_all(text, "").into_owned()
}

/// Render bytes as `DUMP :: <printable text> => <decimal bytes>  (<len>)`.
pub fn dump(bytes: &[u8]) -> String {
    let mut out = format!("DUMP :: {} => ", strip_non_ascii(&latin1_decode(bytes)));
    for byte in bytes {
        let _ = write!(out, "{byte} ");
    }
    let _ = write!(out, " ({})", bytes.len());
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_append_then_take_preserves_order() {
        let mut buffer = VecDeque::new();
        append(&mut buffer, b"AB");
        append(&mut buffer, b"CD");
        assert_eq!(take_front(&mut buffer, 3), b"ABC".to_vec());
        assert_eq!(take_front(&mut buffer, 3), b"D".to_vec());
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_take_zero_leaves_buffer() {
        let mut buffer = VecDeque::from(vec![1, 2, 3]);
        assert!(take_front(&mut buffer, 0).is_empty());
        assert_eq!(buffer.len(), 3);
    }

    #[test]
    fn test_latin1_high_bytes() {
        let bytes = [0x00, 0x7F, 0x80, 0xFF];
        let text = latin1_decode(&bytes);
        assert_eq!(text.chars().count(), 4);
        assert_eq!(latin1_encode(&text), bytes.to_vec());
    }

    #[test]
    fn test_latin1_encode_truncates_wide_chars() {
        // U+0141 keeps only its low byte.
        assert_eq!(latin1_encode("\u{0141}A"), vec![0x41, 0x41]);
    }

    #[test]
    fn test_strip_non_ascii() {
        assert_eq!(strip_non_ascii("OK\r\n"), "OK");
        assert_eq!(strip_non_ascii("it's {ok}~"), "its {ok}~");
        assert_eq!(strip_non_ascii("\u{00e9}t\u{00e9}"), "t");
    }

    #[test]
    fn test_dump_format() {
        assert_eq!(dump(b"AB\n"), "DUMP :: AB => 65 66 10  (3)");
        assert_eq!(dump(&[]), "DUMP ::  =>  (0)");
    }
}
