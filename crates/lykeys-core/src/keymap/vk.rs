//! Windows Virtual-Key (VK) codes and the symbolic name table.
//!
//! Reference: Windows Virtual-Key Codes (winuser.h).
//!
//! # What is a Virtual-Key code? (for beginners)
//!
//! Windows assigns each keyboard key a number called a "Virtual-Key code",
//! defined in `<winuser.h>` as `VK_*` constants (e.g., `VK_RETURN = 0x0D`).
//! The injection driver takes exactly these numbers, so the catalog's job is
//! to turn a human-readable name like `"enter"` or `"page_up"` into one.
//!
//! # How the table works
//!
//! [`KEY_TABLE`] is a compile-time list of `(name, code)` pairs in canonical
//! lower-case form.  The first entry for a code is its canonical name; that is
//! what [`super::KeyCatalog::name_of`] reports.  Friendly spellings such as
//! `"PAGEUP"` or `"DELETE"` live in [`ALIASES`] and are rewritten to canonical
//! names before the table is searched.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A Windows Virtual-Key code in the range `0x01..=0xFE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KeyCode(pub u8);

impl KeyCode {
    pub const BACKSPACE: KeyCode = KeyCode(0x08);
    pub const TAB: KeyCode = KeyCode(0x09);
    pub const ENTER: KeyCode = KeyCode(0x0D);
    pub const SHIFT: KeyCode = KeyCode(0x10);
    pub const CONTROL: KeyCode = KeyCode(0x11);
    pub const ALT: KeyCode = KeyCode(0x12);
    pub const ESCAPE: KeyCode = KeyCode(0x1B);
    pub const SPACE: KeyCode = KeyCode(0x20);
    pub const F1: KeyCode = KeyCode(0x70);
    pub const F8: KeyCode = KeyCode(0x77);
    pub const F24: KeyCode = KeyCode(0x87);
    pub const LEFT_SHIFT: KeyCode = KeyCode(0xA0);
    pub const RIGHT_SHIFT: KeyCode = KeyCode(0xA1);
    pub const LEFT_CONTROL: KeyCode = KeyCode(0xA2);
    pub const RIGHT_CONTROL: KeyCode = KeyCode(0xA3);
    pub const LEFT_ALT: KeyCode = KeyCode(0xA4);
    pub const RIGHT_ALT: KeyCode = KeyCode(0xA5);

    /// Returns the raw VK value.
    pub const fn value(self) -> u8 {
        self.0
    }

    /// Returns the value in the width the driver's key entry points take.
    pub const fn driver_code(self) -> u16 {
        self.0 as u16
    }

    /// Maps a side-specific modifier (e.g. left shift) to its generic code.
    ///
    /// The low-level hook reports `VK_LSHIFT`/`VK_RSHIFT`, while bindings are
    /// usually written against the generic `VK_SHIFT`.
    pub const fn generic_modifier(self) -> Option<KeyCode> {
        match self.0 {
            0xA0 | 0xA1 => Some(KeyCode::SHIFT),
            0xA2 | 0xA3 => Some(KeyCode::CONTROL),
            0xA4 | 0xA5 => Some(KeyCode::ALT),
            _ => None,
        }
    }
}

impl fmt::Display for KeyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match canonical_name(*self) {
            Some(name) => f.write_str(name),
            None => write!(f, "0x{:02X}", self.0),
        }
    }
}

/// Looks up the canonical name for `code`.
pub(crate) fn canonical_name(code: KeyCode) -> Option<&'static str> {
    KEY_TABLE
        .iter()
        .find(|(_, vk)| *vk == code.0)
        .map(|(name, _)| *name)
}

/// Looks up a canonical (lower-case) name.
pub(crate) fn lookup(name: &str) -> Option<KeyCode> {
    KEY_TABLE
        .iter()
        .find(|(entry, _)| *entry == name)
        .map(|(_, vk)| KeyCode(*vk))
}

/// Rewrites an upper-cased friendly name to its canonical table name.
pub(crate) fn alias(upper: &str) -> Option<&'static str> {
    ALIASES
        .iter()
        .find(|(from, _)| *from == upper)
        .map(|(_, to)| *to)
}

/// Friendly upper-case spellings and the canonical names they stand for.
const ALIASES: &[(&str, &str)] = &[
    ("ENTER", "enter"),
    ("RETURN", "enter"),
    ("SPACE", "spacebar"),
    ("TAB", "tab"),
    ("SHIFT", "shift"),
    ("CTRL", "ctrl"),
    ("CONTROL", "ctrl"),
    ("ALT", "alt"),
    ("MENU", "alt"),
    ("ESC", "esc"),
    ("ESCAPE", "esc"),
    ("BACKSPACE", "backspace"),
    ("BACK", "backspace"),
    ("DELETE", "del"),
    ("INSERT", "ins"),
    ("HOME", "home"),
    ("END", "end"),
    ("PAGEUP", "page_up"),
    ("PGUP", "page_up"),
    ("PAGEDOWN", "page_down"),
    ("PGDN", "page_down"),
    ("UP", "up_arrow"),
    ("DOWN", "down_arrow"),
    ("LEFT", "left_arrow"),
    ("RIGHT", "right_arrow"),
    ("CAPSLOCK", "caps_lock"),
    ("NUMLOCK", "num_lock"),
    ("SCROLLLOCK", "scroll_lock"),
    ("PRINTSCREEN", "print_screen"),
    ("WIN", "left_win"),
    ("LWIN", "left_win"),
    ("RWIN", "right_win"),
    ("LSHIFT", "left_shift"),
    ("RSHIFT", "right_shift"),
    ("LCTRL", "left_control"),
    ("RCTRL", "right_control"),
    ("LALT", "left_menu"),
    ("RALT", "right_menu"),
];

/// Canonical name → VK code table.
///
/// Order matters: the first entry for a code is its canonical name.
/// Reference: https://learn.microsoft.com/windows/win32/inputdev/virtual-key-codes
pub(crate) const KEY_TABLE: &[(&str, u8)] = &[
    // Control keys
    ("backspace", 0x08),
    ("tab", 0x09),
    ("clear", 0x0C),
    ("enter", 0x0D),
    ("shift", 0x10),
    ("ctrl", 0x11),
    ("alt", 0x12),
    ("pause", 0x13),
    ("caps_lock", 0x14),
    ("esc", 0x1B),
    ("spacebar", 0x20),
    // Navigation
    ("page_up", 0x21),
    ("page_down", 0x22),
    ("end", 0x23),
    ("home", 0x24),
    ("left_arrow", 0x25),
    ("up_arrow", 0x26),
    ("right_arrow", 0x27),
    ("down_arrow", 0x28),
    ("select", 0x29),
    ("print", 0x2A),
    ("execute", 0x2B),
    ("print_screen", 0x2C),
    ("ins", 0x2D),
    ("del", 0x2E),
    ("help", 0x2F),
    // Digits (VK 0x30–0x39)
    ("0", 0x30),
    ("1", 0x31),
    ("2", 0x32),
    ("3", 0x33),
    ("4", 0x34),
    ("5", 0x35),
    ("6", 0x36),
    ("7", 0x37),
    ("8", 0x38),
    ("9", 0x39),
    // Letters (VK 0x41–0x5A)
    ("a", 0x41),
    ("b", 0x42),
    ("c", 0x43),
    ("d", 0x44),
    ("e", 0x45),
    ("f", 0x46),
    ("g", 0x47),
    ("h", 0x48),
    ("i", 0x49),
    ("j", 0x4A),
    ("k", 0x4B),
    ("l", 0x4C),
    ("m", 0x4D),
    ("n", 0x4E),
    ("o", 0x4F),
    ("p", 0x50),
    ("q", 0x51),
    ("r", 0x52),
    ("s", 0x53),
    ("t", 0x54),
    ("u", 0x55),
    ("v", 0x56),
    ("w", 0x57),
    ("x", 0x58),
    ("y", 0x59),
    ("z", 0x5A),
    // Windows keys
    ("left_win", 0x5B),
    ("right_win", 0x5C),
    ("apps", 0x5D),
    ("sleep", 0x5F),
    // Numpad
    ("numpad_0", 0x60),
    ("numpad_1", 0x61),
    ("numpad_2", 0x62),
    ("numpad_3", 0x63),
    ("numpad_4", 0x64),
    ("numpad_5", 0x65),
    ("numpad_6", 0x66),
    ("numpad_7", 0x67),
    ("numpad_8", 0x68),
    ("numpad_9", 0x69),
    ("multiply_key", 0x6A),
    ("add_key", 0x6B),
    ("separator_key", 0x6C),
    ("subtract_key", 0x6D),
    ("decimal_key", 0x6E),
    ("divide_key", 0x6F),
    // Function keys (VK 0x70–0x87)
    ("f1", 0x70),
    ("f2", 0x71),
    ("f3", 0x72),
    ("f4", 0x73),
    ("f5", 0x74),
    ("f6", 0x75),
    ("f7", 0x76),
    ("f8", 0x77),
    ("f9", 0x78),
    ("f10", 0x79),
    ("f11", 0x7A),
    ("f12", 0x7B),
    ("f13", 0x7C),
    ("f14", 0x7D),
    ("f15", 0x7E),
    ("f16", 0x7F),
    ("f17", 0x80),
    ("f18", 0x81),
    ("f19", 0x82),
    ("f20", 0x83),
    ("f21", 0x84),
    ("f22", 0x85),
    ("f23", 0x86),
    ("f24", 0x87),
    // Locks
    ("num_lock", 0x90),
    ("scroll_lock", 0x91),
    // Side-specific modifiers
    ("left_shift", 0xA0),
    ("right_shift", 0xA1),
    ("left_control", 0xA2),
    ("right_control", 0xA3),
    ("left_menu", 0xA4),
    ("right_menu", 0xA5),
    // Browser and media
    ("browser_back", 0xA6),
    ("browser_forward", 0xA7),
    ("browser_refresh", 0xA8),
    ("browser_stop", 0xA9),
    ("browser_search", 0xAA),
    ("browser_favorites", 0xAB),
    ("browser_start_and_home", 0xAC),
    ("volume_mute", 0xAD),
    ("volume_down", 0xAE),
    ("volume_up", 0xAF),
    ("next_track", 0xB0),
    ("previous_track", 0xB1),
    ("stop_media", 0xB2),
    ("play/pause_media", 0xB3),
    ("start_mail", 0xB4),
    ("select_media", 0xB5),
    ("start_application_1", 0xB6),
    ("start_application_2", 0xB7),
    // OEM punctuation (US layout, unshifted legends)
    (";", 0xBA),
    ("=", 0xBB),
    (",", 0xBC),
    ("-", 0xBD),
    (".", 0xBE),
    ("/", 0xBF),
    ("`", 0xC0),
    ("[", 0xDB),
    ("\\", 0xDC),
    ("]", 0xDD),
    ("'", 0xDE),
    // Miscellaneous
    ("process_key", 0xE5),
    ("attn_key", 0xF6),
    ("crsel_key", 0xF7),
    ("exsel_key", 0xF8),
    ("play_key", 0xFA),
    ("zoom_key", 0xFB),
    ("clear_key", 0xFE),
];

/// Shifted symbols and the unshifted legend sharing their physical key.
pub(crate) const SHIFTED_SYMBOLS: &[(char, char)] = &[
    ('~', '`'),
    ('!', '1'),
    ('@', '2'),
    ('#', '3'),
    ('$', '4'),
    ('%', '5'),
    ('^', '6'),
    ('&', '7'),
    ('*', '8'),
    ('(', '9'),
    (')', '0'),
    ('_', '-'),
    ('+', '='),
    ('{', '['),
    ('}', ']'),
    ('|', '\\'),
    (':', ';'),
    ('"', '\''),
    ('<', ','),
    ('>', '.'),
    ('?', '/'),
];

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_table_names_are_unique() {
        let mut seen = HashSet::new();
        for (name, _) in KEY_TABLE {
            assert!(seen.insert(*name), "duplicate name {name}");
        }
    }

    #[test]
    fn test_table_codes_are_unique() {
        let mut seen = HashSet::new();
        for (name, code) in KEY_TABLE {
            assert!(seen.insert(*code), "code 0x{code:02X} reused by {name}");
        }
    }

    #[test]
    fn test_table_names_are_lower_case() {
        for (name, _) in KEY_TABLE {
            assert_eq!(*name, name.to_ascii_lowercase());
        }
    }

    #[test]
    fn test_every_alias_targets_a_table_entry() {
        for (from, to) in ALIASES {
            assert!(lookup(to).is_some(), "alias {from} → {to} is dangling");
        }
    }

    #[test]
    fn test_every_shifted_symbol_has_an_unshifted_base_in_table() {
        for (shifted, base) in SHIFTED_SYMBOLS {
            assert!(
                lookup(&base.to_string()).is_some(),
                "{shifted} has no base key {base}"
            );
        }
    }

    #[test]
    fn test_generic_modifier_maps_left_and_right_variants() {
        let cases = [
            (KeyCode::LEFT_SHIFT, KeyCode::SHIFT),
            (KeyCode::RIGHT_SHIFT, KeyCode::SHIFT),
            (KeyCode::LEFT_CONTROL, KeyCode::CONTROL),
            (KeyCode::RIGHT_CONTROL, KeyCode::CONTROL),
            (KeyCode::LEFT_ALT, KeyCode::ALT),
            (KeyCode::RIGHT_ALT, KeyCode::ALT),
        ];
        for (side, generic) in cases {
            assert_eq!(side.generic_modifier(), Some(generic));
        }
        assert_eq!(KeyCode::SHIFT.generic_modifier(), None);
        assert_eq!(KeyCode(0x41).generic_modifier(), None);
    }

    #[test]
    fn test_display_uses_canonical_name_or_hex() {
        assert_eq!(KeyCode(0x0D).to_string(), "enter");
        assert_eq!(KeyCode(0x77).to_string(), "f8");
        assert_eq!(KeyCode(0x07).to_string(), "0x07");
    }
}
