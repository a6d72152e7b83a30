//! Mouse button catalog.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// One of the five buttons the driver exposes separate entry points for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MouseButton {
    Left,
    Right,
    Middle,
    X1,
    X2,
}

impl MouseButton {
    pub const ALL: [MouseButton; 5] = [
        MouseButton::Left,
        MouseButton::Right,
        MouseButton::Middle,
        MouseButton::X1,
        MouseButton::X2,
    ];

    /// The Virtual-Key code Windows assigns to this button.
    pub const fn code(self) -> u8 {
        match self {
            MouseButton::Left => 0x01,
            MouseButton::Right => 0x02,
            MouseButton::Middle => 0x04,
            MouseButton::X1 => 0x05,
            MouseButton::X2 => 0x06,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            MouseButton::Left => "left",
            MouseButton::Right => "right",
            MouseButton::Middle => "middle",
            MouseButton::X1 => "x1",
            MouseButton::X2 => "x2",
        }
    }

    /// Case-insensitive lookup accepting short forms (`l`, `r`, `m`) and
    /// the Win32 spellings (`xbutton1`, `xbutton2`).
    pub fn parse(name: &str) -> Option<MouseButton> {
        match name.trim().to_ascii_lowercase().as_str() {
            "left" | "l" | "lbutton" => Some(MouseButton::Left),
            "right" | "r" | "rbutton" => Some(MouseButton::Right),
            "middle" | "m" | "mbutton" => Some(MouseButton::Middle),
            "x1" | "xbutton1" => Some(MouseButton::X1),
            "x2" | "xbutton2" => Some(MouseButton::X2),
            _ => None,
        }
    }
}

impl fmt::Display for MouseButton {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Returned by [`MouseButton::from_str`] for names outside the catalog.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown mouse button: {0}")]
pub struct UnknownButton(pub String);

impl FromStr for MouseButton {
    type Err = UnknownButton;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MouseButton::parse(s).ok_or_else(|| UnknownButton(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_button_codes_match_windows_vk_values() {
        let expected = [0x01, 0x02, 0x04, 0x05, 0x06];
        for (button, code) in MouseButton::ALL.iter().zip(expected) {
            assert_eq!(button.code(), code, "{button}");
        }
    }

    #[test]
    fn test_parse_accepts_canonical_names_for_every_button() {
        for button in MouseButton::ALL {
            assert_eq!(MouseButton::parse(button.name()), Some(button));
        }
    }

    #[test]
    fn test_parse_is_case_insensitive_and_accepts_short_forms() {
        assert_eq!(MouseButton::parse("LEFT"), Some(MouseButton::Left));
        assert_eq!(MouseButton::parse("r"), Some(MouseButton::Right));
        assert_eq!(MouseButton::parse("XButton2"), Some(MouseButton::X2));
    }

    #[test]
    fn test_from_str_rejects_unknown_button() {
        let err = "x3".parse::<MouseButton>().unwrap_err();
        assert_eq!(err, UnknownButton("x3".to_string()));
    }
}
