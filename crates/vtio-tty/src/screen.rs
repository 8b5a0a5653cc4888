#![forbid(unsafe_code)]

//! ANSI escape emitters for screen control.
//!
//! Stateless pass-throughs: each helper writes one fixed sequence to
//! the given writer. Buffer-state bookkeeping lives in
//! [`Terminal`](crate::Terminal).

use std::io::{self, Write};

pub(crate) const CLEAR_SCREEN: &[u8] = b"\x1b[2J";
pub(crate) const CURSOR_HOME: &[u8] = b"\x1b[H";
pub(crate) const CURSOR_HIDE: &[u8] = b"\x1b[?25l";
pub(crate) const CURSOR_SHOW: &[u8] = b"\x1b[?25h";
pub(crate) const ALT_BUFFER_ENTER: &[u8] = b"\x1b[?1049h";
pub(crate) const ALT_BUFFER_LEAVE: &[u8] = b"\x1b[?1049l";

/// `CSI {row};{col}H` — cursor position, 1-indexed.
pub(crate) fn write_cursor_move(writer: &mut impl Write, row: u16, column: u16) -> io::Result<()> {
    write!(writer, "\x1b[{row};{column}H")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escape_sequences_are_correct() {
        assert_eq!(CLEAR_SCREEN, b"\x1b[2J");
        assert_eq!(CURSOR_HOME, b"\x1b[H");
        assert_eq!(CURSOR_HIDE, b"\x1b[?25l");
        assert_eq!(CURSOR_SHOW, b"\x1b[?25h");
        assert_eq!(ALT_BUFFER_ENTER, b"\x1b[?1049h");
        assert_eq!(ALT_BUFFER_LEAVE, b"\x1b[?1049l");
    }

    #[test]
    fn cursor_move_is_one_indexed_row_then_column() {
        let mut buf = Vec::new();
        write_cursor_move(&mut buf, 1, 1).unwrap();
        assert_eq!(buf, b"\x1b[1;1H");

        let mut buf = Vec::new();
        write_cursor_move(&mut buf, 24, 80).unwrap();
        assert_eq!(buf, b"\x1b[24;80H");
    }
}
