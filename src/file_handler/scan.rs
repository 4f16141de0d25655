//! Line splitting rules shared by the counter, the index builder and the locator.
//!
//! A line is the run of bytes before a `\n`. A final run without terminator is a line too, so
//! `"a\nb"` and `"a\nb\n"` both hold two lines and an empty file holds none. A `\r` right before
//! the terminator is not part of the line text.

/// Read buffer size for streaming passes
pub(crate) const READ_CHUNK_SIZE: usize = 64 * 1024;

/// Drop the `\n` or `\r\n` terminator from a raw line
pub(crate) fn strip_line_ending(mut line: &[u8]) -> &[u8] {
    if let Some(rest) = line.strip_suffix(b"\n") {
        line = rest;
    }
    if let Some(rest) = line.strip_suffix(b"\r") {
        line = rest;
    }
    line
}

/// Convert raw line bytes to text, replacing invalid UTF-8 sequences
pub(crate) fn decode_line(line: &[u8]) -> String {
    String::from_utf8_lossy(strip_line_ending(line)).into_owned()
}

/// Line total for a stream holding `newlines` terminators whose last byte is `last_byte`
pub(crate) fn total_lines(newlines: u64, last_byte: Option<u8>) -> u64 {
    match last_byte {
        Some(b'\n') | None => newlines,
        Some(_) => newlines + 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_line_ending() {
        assert_eq!(strip_line_ending(b"abc\n"), b"abc");
        assert_eq!(strip_line_ending(b"abc\r\n"), b"abc");
        assert_eq!(strip_line_ending(b"abc"), b"abc");
        assert_eq!(strip_line_ending(b"\n"), b"");
        assert_eq!(strip_line_ending(b"a\rb\n"), b"a\rb");
    }

    #[test]
    fn test_decode_line_is_lossy() {
        assert_eq!(decode_line(b"caf\xc3\xa9\n"), "café");
        assert_eq!(decode_line(b"bad \xff byte"), "bad \u{FFFD} byte");
    }

    #[test]
    fn test_total_lines() {
        assert_eq!(total_lines(0, None), 0);
        assert_eq!(total_lines(0, Some(b'x')), 1);
        assert_eq!(total_lines(2, Some(b'\n')), 2);
        assert_eq!(total_lines(2, Some(b'z')), 3);
    }
}
