//! Line-oriented framing: scan for `\n`, hand back everything up to and
//! including it.

use crate::framing::Outcome;
use crate::ring::CellBuf;

/// Scan `buf` for a `\n`-terminated line no longer than `max_len`
/// (including the newline). On success the line (with trailing `\n`) is
/// removed from `buf` and returned.
pub fn parse(buf: &mut CellBuf, max_len: usize) -> Outcome<String> {
    let data = buf.peek_all();
    match data.iter().position(|&b| b == b'\n') {
        Some(idx) => {
            let line_len = idx + 1;
            if line_len > max_len {
                return Outcome::TooLarge;
            }
            let line = String::from_utf8_lossy(&data[..line_len]).into_owned();
            buf.drop_front(line_len);
            Outcome::Complete(line)
        }
        None => {
            if data.len() > max_len {
                Outcome::TooLarge
            } else {
                Outcome::Incomplete
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_complete_line_leaves_remainder() {
        let mut buf = CellBuf::new();
        buf.write(b"abc\ndef").unwrap();
        let out = parse(&mut buf, 4096);
        assert_eq!(out, Outcome::Complete("abc\n".to_string()));
        assert_eq!(buf.peek_all(), b"def");
    }

    #[test]
    fn test_incomplete_without_newline() {
        let mut buf = CellBuf::new();
        buf.write(b"no newline yet").unwrap();
        assert_eq!(parse(&mut buf, 4096), Outcome::Incomplete);
    }

    #[test]
    fn test_too_long_before_newline_found() {
        let mut buf = CellBuf::new();
        buf.write(b"0123456789").unwrap();
        assert_eq!(parse(&mut buf, 4), Outcome::TooLarge);
    }

    #[test]
    fn test_too_long_line_with_newline_present() {
        let mut buf = CellBuf::new();
        buf.write(b"01234\n").unwrap();
        assert_eq!(parse(&mut buf, 4), Outcome::TooLarge);
    }
}
