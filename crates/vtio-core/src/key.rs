#![forbid(unsafe_code)]

//! Key values produced by the input decoder.
//!
//! A [`Key`] packs one keypress into a single integer: a *base code*
//! OR-combined with [`Mods`] bits. A base code is either a raw byte
//! (0x00–0xFF, including plain ASCII) or a symbolic constant at 256 and
//! above for keys that have no single-byte representation (arrows,
//! function keys, and so on). Two negative sentinels sit outside the
//! valid range and never carry modifiers: [`Key::NONE`] (no input was
//! available) and [`Key::UNKNOWN`] (bytes were consumed but did not
//! form a recognizable key).

use std::fmt;

use bitflags::bitflags;

bitflags! {
    /// Modifier bits, packed above the base-code range.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Mods: i32 {
        const CTRL  = 0x1000;
        const ALT   = 0x2000;
        const SHIFT = 0x4000;
    }
}

/// A decoded keypress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Key(i32);

impl Key {
    /// No input was available (EOF, or timeout at the top-level read).
    pub const NONE: Key = Key(-1);
    /// Bytes were consumed but did not form a recognizable key.
    pub const UNKNOWN: Key = Key(-2);

    // Byte-valued keys. Tab and Enter are the same bytes as Ctrl-I and
    // Ctrl-M at the protocol level; the decoder always reports the
    // named key.
    pub const TAB: Key = Key(0x09);
    pub const ENTER: Key = Key(0x0d);
    pub const BACKSPACE: Key = Key(0x7f);

    // Symbolic keys start at 256 to stay clear of raw byte values.
    pub const ESC: Key = Key(256);

    pub const UP: Key = Key(257);
    pub const DOWN: Key = Key(258);
    pub const LEFT: Key = Key(259);
    pub const RIGHT: Key = Key(260);
    pub const HOME: Key = Key(261);
    pub const END: Key = Key(262);
    pub const PAGE_UP: Key = Key(263);
    pub const PAGE_DOWN: Key = Key(264);

    pub const INSERT: Key = Key(265);
    pub const DELETE: Key = Key(266);

    pub const F1: Key = Key(267);
    pub const F2: Key = Key(268);
    pub const F3: Key = Key(269);
    pub const F4: Key = Key(270);
    pub const F5: Key = Key(271);
    pub const F6: Key = Key(272);
    pub const F7: Key = Key(273);
    pub const F8: Key = Key(274);
    pub const F9: Key = Key(275);
    pub const F10: Key = Key(276);
    pub const F11: Key = Key(277);
    pub const F12: Key = Key(278);

    /// Key for a raw input byte.
    #[must_use]
    pub const fn from_byte(byte: u8) -> Key {
        Key(byte as i32)
    }

    /// The packed integer value (base code plus modifier bits).
    #[must_use]
    pub const fn code(self) -> i32 {
        self.0
    }

    /// This key with `mods` added. Sentinels are returned unchanged.
    #[must_use]
    pub fn with(self, mods: Mods) -> Key {
        if self.0 < 0 {
            self
        } else {
            Key(self.0 | mods.bits())
        }
    }

    /// The base code with modifier bits stripped.
    #[must_use]
    pub fn base(self) -> Key {
        if self.0 < 0 {
            self
        } else {
            Key(self.0 & !Mods::all().bits())
        }
    }

    /// The modifier bits carried by this key.
    #[must_use]
    pub fn mods(self) -> Mods {
        if self.0 < 0 {
            Mods::empty()
        } else {
            Mods::from_bits_truncate(self.0)
        }
    }

    /// Whether the Ctrl modifier is set.
    #[must_use]
    pub fn ctrl(self) -> bool {
        self.mods().contains(Mods::CTRL)
    }

    /// Whether the Alt modifier is set.
    #[must_use]
    pub fn alt(self) -> bool {
        self.mods().contains(Mods::ALT)
    }

    /// Whether the Shift modifier is set.
    #[must_use]
    pub fn shift(self) -> bool {
        self.mods().contains(Mods::SHIFT)
    }

    /// Whether any modifier is set.
    #[must_use]
    pub fn has_mods(self) -> bool {
        !self.mods().is_empty()
    }

    /// Short diagnostic label for this key.
    ///
    /// Modifier prefixes `C-`, `M-`, `S-` are emitted in that fixed
    /// order, followed by the symbolic name, a quoted character for
    /// printable ASCII, or a two-digit hex code for anything else.
    #[must_use]
    pub fn name(self) -> String {
        let mut out = String::new();
        let mods = self.mods();
        if mods.contains(Mods::CTRL) {
            out.push_str("C-");
        }
        if mods.contains(Mods::ALT) {
            out.push_str("M-");
        }
        if mods.contains(Mods::SHIFT) {
            out.push_str("S-");
        }

        let base = self.base();
        if let Some(symbolic) = symbolic_name(base) {
            out.push_str(symbolic);
        } else if (0x20..0x7f).contains(&base.0) {
            out.push('\'');
            out.push(base.0 as u8 as char);
            out.push('\'');
        } else {
            out.push_str(&format!("0x{:02X}", base.0));
        }
        out
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

/// Names for every base code the decoder can produce that is not a
/// printable byte. Kept in 1:1 correspondence with the constants above.
const SYMBOLIC_NAMES: &[(Key, &str)] = &[
    (Key::NONE, "None"),
    (Key::UNKNOWN, "Unknown"),
    (Key::ESC, "ESC"),
    (Key::UP, "Up"),
    (Key::DOWN, "Down"),
    (Key::LEFT, "Left"),
    (Key::RIGHT, "Right"),
    (Key::HOME, "Home"),
    (Key::END, "End"),
    (Key::PAGE_UP, "PageUp"),
    (Key::PAGE_DOWN, "PageDown"),
    (Key::INSERT, "Insert"),
    (Key::DELETE, "Delete"),
    (Key::F1, "F1"),
    (Key::F2, "F2"),
    (Key::F3, "F3"),
    (Key::F4, "F4"),
    (Key::F5, "F5"),
    (Key::F6, "F6"),
    (Key::F7, "F7"),
    (Key::F8, "F8"),
    (Key::F9, "F9"),
    (Key::F10, "F10"),
    (Key::F11, "F11"),
    (Key::F12, "F12"),
    (Key::TAB, "Tab"),
    (Key::ENTER, "Enter"),
    (Key::BACKSPACE, "Backspace"),
];

fn symbolic_name(base: Key) -> Option<&'static str> {
    SYMBOLIC_NAMES
        .iter()
        .find(|(key, _)| *key == base)
        .map(|(_, name)| *name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_byte_is_identity_for_ascii() {
        assert_eq!(Key::from_byte(b'a').code(), i32::from(b'a'));
        assert_eq!(Key::from_byte(0xff).code(), 0xff);
    }

    #[test]
    fn with_adds_modifier_bits() {
        let key = Key::from_byte(b'x').with(Mods::CTRL | Mods::ALT);
        assert!(key.ctrl());
        assert!(key.alt());
        assert!(!key.shift());
        assert_eq!(key.base(), Key::from_byte(b'x'));
    }

    #[test]
    fn sentinels_never_carry_modifiers() {
        assert_eq!(Key::NONE.with(Mods::CTRL), Key::NONE);
        assert_eq!(Key::UNKNOWN.with(Mods::all()), Key::UNKNOWN);
        assert_eq!(Key::NONE.mods(), Mods::empty());
        assert_eq!(Key::UNKNOWN.base(), Key::UNKNOWN);
    }

    #[test]
    fn name_prefixes_in_fixed_order() {
        let key = Key::from_byte(b'k').with(Mods::CTRL | Mods::ALT | Mods::SHIFT);
        assert_eq!(key.name(), "C-M-S-'k'");
    }

    #[test]
    fn name_quotes_printable_ascii() {
        assert_eq!(Key::from_byte(b'A').name(), "'A'");
        assert_eq!(Key::from_byte(b' ').name(), "' '");
    }

    #[test]
    fn name_falls_back_to_hex() {
        assert_eq!(Key::from_byte(0x00).name(), "0x00");
        assert_eq!(Key::from_byte(0x1f).name(), "0x1F");
        assert_eq!(Key::from_byte(0x80).name(), "0x80");
    }

    #[test]
    fn every_symbolic_constant_has_a_non_hex_name() {
        for (key, name) in SYMBOLIC_NAMES {
            assert_eq!(&key.name(), name);
            assert!(!name.starts_with("0x"), "{name} must not be a hex fallback");
        }
    }

    #[test]
    fn name_is_pure() {
        let key = Key::DELETE.with(Mods::ALT);
        assert_eq!(key.name(), key.name());
        assert_eq!(key.name(), "M-Delete");
    }

    #[test]
    fn display_matches_name() {
        let key = Key::F5.with(Mods::CTRL);
        assert_eq!(format!("{key}"), key.name());
    }
}
