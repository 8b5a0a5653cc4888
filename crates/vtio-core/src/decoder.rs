#![forbid(unsafe_code)]

//! Escape-sequence decoder: raw terminal bytes → [`Key`] values.
//!
//! The decoder pulls bytes from a [`ByteSource`] and maps a prefix of
//! the stream to exactly one keypress, consuming precisely the bytes
//! that belong to it.
//!
//! A lone ESC byte is ambiguous: it may be the Escape key, or the start
//! of a multi-byte sequence. Terminals provide no marker either way —
//! the only available signal is timing. After ESC the source is
//! switched to a bounded-timeout read mode; if no byte follows within
//! the timeout, the key was a bare Escape.
//!
//! Recognized sequences (7-bit, as emitted by common emulators):
//!
//! | Bytes                 | Key                                  |
//! |-----------------------|--------------------------------------|
//! | `ESC [ A..D`          | Up / Down / Right / Left             |
//! | `ESC [ H`, `ESC [ F`  | Home, End                            |
//! | `ESC [ <n> ~`         | Home/Insert/Delete/End/PageUp/PageDown/F1–F12 |
//! | `ESC O P..S`          | F1–F4                                |
//! | `ESC O H/F/A..D`      | Home / End / arrows                  |
//! | `ESC <printable>`     | Alt + byte                           |
//! | `ESC <control byte>`  | Alt + Ctrl + letter                  |

use crate::key::{Key, Mods};

const ESC: u8 = 0x1b;

/// Read-timing mode of a [`ByteSource`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ReadMode {
    /// Wait indefinitely for one byte. The main loop's only suspension
    /// point.
    #[default]
    Blocking,
    /// Wait a short bounded interval (on the order of 100 ms). Used
    /// only while disambiguating escape sequences.
    EscTimeout,
}

/// A one-byte input stream with switchable read timing.
pub trait ByteSource {
    /// The next byte, or `None` on timeout or EOF.
    fn read_byte(&mut self) -> Option<u8>;

    /// Switch read timing. Implementations apply this to the line
    /// discipline; the decoder guarantees switches are paired, so the
    /// source is always back in [`ReadMode::Blocking`] when a keypress
    /// has been decoded.
    fn set_read_mode(&mut self, mode: ReadMode);
}

/// Decode exactly one keypress from `src`.
///
/// Returns [`Key::NONE`] when the blocking read reports no data (EOF),
/// and [`Key::UNKNOWN`] when bytes were consumed but matched nothing in
/// the sequence tables. `UNKNOWN` is data, not an error: the caller
/// decides whether to ignore or log it.
pub fn read_key(src: &mut impl ByteSource) -> Key {
    let Some(byte) = src.read_byte() else {
        return Key::NONE;
    };
    match byte {
        ESC => read_escape(src),
        0x01..=0x1a => ctrl_key(byte, Mods::CTRL),
        _ => Key::from_byte(byte),
    }
}

/// ESC seen: disambiguate under the bounded timeout.
///
/// The timed mode is enabled here and disabled here, on every branch of
/// the sequence parsers below, so callers always get the source back in
/// blocking mode.
fn read_escape(src: &mut impl ByteSource) -> Key {
    src.set_read_mode(ReadMode::EscTimeout);
    let key = escape_sequence(src);
    src.set_read_mode(ReadMode::Blocking);
    key
}

fn escape_sequence(src: &mut impl ByteSource) -> Key {
    let Some(byte) = src.read_byte() else {
        // Timeout: ESC was pressed on its own.
        return Key::ESC;
    };
    match byte {
        b'[' => csi_sequence(src),
        b'O' => ss3_sequence(src),
        0x20..=0x7e => Key::from_byte(byte).with(Mods::ALT),
        0x01..=0x1a => ctrl_key(byte, Mods::ALT | Mods::CTRL),
        _ => Key::UNKNOWN,
    }
}

/// Map a control byte (0x01–0x1A) to a key, attaching `mods`.
///
/// Bytes 9 and 13 are Tab and Enter: the terminal sends the very same
/// bytes for Ctrl-I and Ctrl-M, so the named key wins and the ambiguity
/// is preserved rather than guessed at.
fn ctrl_key(byte: u8, mods: Mods) -> Key {
    match byte {
        9 => Key::TAB,
        13 => Key::ENTER,
        _ => Key::from_byte(byte - 1 + b'a').with(mods),
    }
}

fn csi_sequence(src: &mut impl ByteSource) -> Key {
    let Some(byte) = src.read_byte() else {
        return Key::UNKNOWN;
    };
    match byte {
        b'A' => Key::UP,
        b'B' => Key::DOWN,
        b'C' => Key::RIGHT,
        b'D' => Key::LEFT,
        b'H' => Key::HOME,
        b'F' => Key::END,
        b'0'..=b'9' => csi_numbered(src, byte),
        _ => Key::UNKNOWN,
    }
}

/// `ESC [ <n> ~` where `n` has one or two decimal digits.
///
/// Two digits suffice for every code in the table; nothing above 24 is
/// mapped, so a third digit is not read.
fn csi_numbered(src: &mut impl ByteSource, digit: u8) -> Key {
    let mut n = u32::from(digit - b'0');
    let Some(mut byte) = src.read_byte() else {
        return Key::UNKNOWN;
    };
    if byte.is_ascii_digit() {
        n = n * 10 + u32::from(byte - b'0');
        match src.read_byte() {
            Some(next) => byte = next,
            None => return Key::UNKNOWN,
        }
    }
    if byte != b'~' {
        return Key::UNKNOWN;
    }
    match n {
        1 => Key::HOME,
        2 => Key::INSERT,
        3 => Key::DELETE,
        4 => Key::END,
        5 => Key::PAGE_UP,
        6 => Key::PAGE_DOWN,
        11 => Key::F1,
        12 => Key::F2,
        13 => Key::F3,
        14 => Key::F4,
        15 => Key::F5,
        17 => Key::F6,
        18 => Key::F7,
        19 => Key::F8,
        20 => Key::F9,
        21 => Key::F10,
        23 => Key::F11,
        24 => Key::F12,
        _ => Key::UNKNOWN,
    }
}

fn ss3_sequence(src: &mut impl ByteSource) -> Key {
    let Some(byte) = src.read_byte() else {
        return Key::UNKNOWN;
    };
    match byte {
        b'P' => Key::F1,
        b'Q' => Key::F2,
        b'R' => Key::F3,
        b'S' => Key::F4,
        b'H' => Key::HOME,
        b'F' => Key::END,
        // Some terminals use SS3 for the arrows as well.
        b'A' => Key::UP,
        b'B' => Key::DOWN,
        b'C' => Key::RIGHT,
        b'D' => Key::LEFT,
        _ => Key::UNKNOWN,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;

    use super::*;

    /// Scripted byte source. Serves queued bytes in order; an empty
    /// queue reads as "no data" in either mode.
    struct Script {
        bytes: VecDeque<u8>,
        mode: ReadMode,
    }

    impl Script {
        fn new(bytes: &[u8]) -> Self {
            Self {
                bytes: bytes.iter().copied().collect(),
                mode: ReadMode::Blocking,
            }
        }
    }

    impl ByteSource for Script {
        fn read_byte(&mut self) -> Option<u8> {
            self.bytes.pop_front()
        }

        fn set_read_mode(&mut self, mode: ReadMode) {
            self.mode = mode;
        }
    }

    /// Decode one key and assert the two structural guarantees: the
    /// whole sequence is consumed and the source ends up blocking.
    fn decode(bytes: &[u8]) -> Key {
        let mut src = Script::new(bytes);
        let key = read_key(&mut src);
        assert!(
            src.bytes.is_empty(),
            "decoder must consume exactly the sequence {bytes:?}"
        );
        assert_eq!(
            src.mode,
            ReadMode::Blocking,
            "decoder must leave the source in blocking mode"
        );
        key
    }

    #[test]
    fn no_data_decodes_to_none() {
        assert_eq!(decode(&[]), Key::NONE);
    }

    #[test]
    fn plain_bytes_decode_to_themselves() {
        assert_eq!(decode(b"A"), Key::from_byte(b'A'));
        assert_eq!(decode(b" "), Key::from_byte(b' '));
        assert_eq!(decode(&[0x7f]), Key::BACKSPACE);
    }

    #[test]
    fn control_bytes_decode_to_ctrl_letters() {
        for byte in 0x01..=0x1au8 {
            let key = decode(&[byte]);
            match byte {
                9 => assert_eq!(key, Key::TAB),
                13 => assert_eq!(key, Key::ENTER),
                _ => assert_eq!(key, Key::from_byte(byte - 1 + b'a').with(Mods::CTRL)),
            }
        }
    }

    #[test]
    fn ctrl_d_decodes_to_ctrl_d() {
        assert_eq!(decode(&[0x04]), Key::from_byte(b'd').with(Mods::CTRL));
    }

    #[test]
    fn bare_escape_decodes_on_timeout() {
        assert_eq!(decode(&[0x1b]), Key::ESC);
    }

    #[test]
    fn read_after_bare_escape_is_unaffected() {
        let mut src = Script::new(&[0x1b]);
        assert_eq!(read_key(&mut src), Key::ESC);
        assert_eq!(src.mode, ReadMode::Blocking);

        // The next keypress decodes normally on the same source.
        src.bytes.extend(b"\x1b[A");
        assert_eq!(read_key(&mut src), Key::UP);
        assert_eq!(src.mode, ReadMode::Blocking);
    }

    #[test]
    fn alt_printable_bytes() {
        assert_eq!(decode(b"\x1bf"), Key::from_byte(b'f').with(Mods::ALT));
        assert_eq!(decode(b"\x1b!"), Key::from_byte(b'!').with(Mods::ALT));
    }

    #[test]
    fn alt_ctrl_bytes_with_tab_enter_carve_out() {
        assert_eq!(
            decode(&[0x1b, 0x01]),
            Key::from_byte(b'a').with(Mods::ALT | Mods::CTRL)
        );
        assert_eq!(decode(&[0x1b, 9]), Key::TAB);
        assert_eq!(decode(&[0x1b, 13]), Key::ENTER);
    }

    #[test]
    fn csi_arrows_and_home_end() {
        assert_eq!(decode(b"\x1b[A"), Key::UP);
        assert_eq!(decode(b"\x1b[B"), Key::DOWN);
        assert_eq!(decode(b"\x1b[C"), Key::RIGHT);
        assert_eq!(decode(b"\x1b[D"), Key::LEFT);
        assert_eq!(decode(b"\x1b[H"), Key::HOME);
        assert_eq!(decode(b"\x1b[F"), Key::END);
    }

    #[test]
    fn csi_numbered_table_is_exact() {
        let table: &[(&[u8], Key)] = &[
            (b"\x1b[1~", Key::HOME),
            (b"\x1b[2~", Key::INSERT),
            (b"\x1b[3~", Key::DELETE),
            (b"\x1b[4~", Key::END),
            (b"\x1b[5~", Key::PAGE_UP),
            (b"\x1b[6~", Key::PAGE_DOWN),
            (b"\x1b[11~", Key::F1),
            (b"\x1b[12~", Key::F2),
            (b"\x1b[13~", Key::F3),
            (b"\x1b[14~", Key::F4),
            (b"\x1b[15~", Key::F5),
            (b"\x1b[17~", Key::F6),
            (b"\x1b[18~", Key::F7),
            (b"\x1b[19~", Key::F8),
            (b"\x1b[20~", Key::F9),
            (b"\x1b[21~", Key::F10),
            (b"\x1b[23~", Key::F11),
            (b"\x1b[24~", Key::F12),
        ];
        for (bytes, expected) in table {
            assert_eq!(decode(bytes), *expected, "sequence {bytes:?}");
        }
    }

    #[test]
    fn csi_unlisted_numbers_are_unknown() {
        assert_eq!(decode(b"\x1b[7~"), Key::UNKNOWN);
        assert_eq!(decode(b"\x1b[16~"), Key::UNKNOWN);
        assert_eq!(decode(b"\x1b[22~"), Key::UNKNOWN);
        assert_eq!(decode(b"\x1b[25~"), Key::UNKNOWN);
    }

    #[test]
    fn csi_missing_tilde_is_unknown() {
        assert_eq!(decode(b"\x1b[3x"), Key::UNKNOWN);
        assert_eq!(decode(b"\x1b[15x"), Key::UNKNOWN);
    }

    #[test]
    fn csi_unmapped_finals_are_unknown() {
        assert_eq!(decode(b"\x1b[Z"), Key::UNKNOWN);
        assert_eq!(decode(b"\x1b[E"), Key::UNKNOWN);
    }

    #[test]
    fn ss3_table_is_exact() {
        let table: &[(&[u8], Key)] = &[
            (b"\x1bOP", Key::F1),
            (b"\x1bOQ", Key::F2),
            (b"\x1bOR", Key::F3),
            (b"\x1bOS", Key::F4),
            (b"\x1bOH", Key::HOME),
            (b"\x1bOF", Key::END),
            (b"\x1bOA", Key::UP),
            (b"\x1bOB", Key::DOWN),
            (b"\x1bOC", Key::RIGHT),
            (b"\x1bOD", Key::LEFT),
        ];
        for (bytes, expected) in table {
            assert_eq!(decode(bytes), *expected, "sequence {bytes:?}");
        }
    }

    #[test]
    fn ss3_unmapped_finals_are_unknown() {
        assert_eq!(decode(b"\x1bOT"), Key::UNKNOWN);
        assert_eq!(decode(b"\x1bOz"), Key::UNKNOWN);
    }

    #[test]
    fn truncated_sequences_are_unknown() {
        assert_eq!(decode(b"\x1b["), Key::UNKNOWN);
        assert_eq!(decode(b"\x1b[1"), Key::UNKNOWN);
        assert_eq!(decode(b"\x1b[15"), Key::UNKNOWN);
        assert_eq!(decode(b"\x1bO"), Key::UNKNOWN);
    }

    #[test]
    fn esc_esc_is_unknown() {
        assert_eq!(decode(&[0x1b, 0x1b]), Key::UNKNOWN);
    }

    #[test]
    fn esc_del_is_unknown() {
        assert_eq!(decode(&[0x1b, 0x7f]), Key::UNKNOWN);
    }

    #[test]
    fn end_to_end_vectors() {
        assert_eq!(decode(b"\x1b[A"), Key::UP);
        assert_eq!(decode(b"\x1b[3~"), Key::DELETE);
        assert_eq!(decode(&[0x04]), Key::from_byte(b'd').with(Mods::CTRL));
        assert_eq!(decode(b"A"), Key::from_byte(b'A'));
        assert!(!decode(b"A").has_mods());
        assert_eq!(decode(b"\x1bf"), Key::from_byte(b'f').with(Mods::ALT));
    }
}
