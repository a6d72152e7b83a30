//! Key and mouse-button catalog.
//!
//! Translates human-readable key names into the Windows Virtual-Key codes the
//! injection driver accepts.  The catalog is a static, read-only table shared
//! by every thread; nothing in here allocates on the lookup path except the
//! upper-casing of the queried name.
//!
//! # Resolution order
//!
//! 1. `" "` is the space bar.
//! 2. `F1`..`F24` (any case) parse their numeric suffix.
//! 3. A single character is looked up directly; a shifted symbol such as
//!    `?` resolves to the key carrying it (`/`).
//! 4. Friendly aliases (`RETURN`, `ESCAPE`, `PAGEUP`, `UP`, ...) are
//!    rewritten to canonical names.
//! 5. Everything else is matched case-insensitively against the table.

pub mod mouse;
pub mod vk;

pub use mouse::{MouseButton, UnknownButton};
pub use vk::KeyCode;

use serde::{Deserialize, Serialize};

/// Characters that need the shift modifier on a US layout.
pub const SHIFT_SYMBOLS: &str = "~!@#$%^&*()_+{}|:\"<>?";

/// A key code plus whether shift must be held around it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KeyStroke {
    pub code: KeyCode,
    pub shift: bool,
}

impl KeyStroke {
    pub const fn plain(code: KeyCode) -> Self {
        Self { code, shift: false }
    }

    pub const fn shifted(code: KeyCode) -> Self {
        Self { code, shift: true }
    }
}

/// Unified catalog providing all lookup directions.
pub struct KeyCatalog;

impl KeyCatalog {
    /// Resolves a symbolic key name to its Virtual-Key code.
    ///
    /// Returns `None` for empty or unknown names.
    pub fn resolve(name: &str) -> Option<KeyCode> {
        if name.is_empty() {
            return None;
        }
        if name == " " {
            return Some(KeyCode::SPACE);
        }

        let upper = name.to_ascii_uppercase();
        if let Some(code) = function_key(&upper) {
            return Some(code);
        }

        let mut chars = name.chars();
        if let (Some(c), None) = (chars.next(), chars.next()) {
            return resolve_char(c);
        }

        if let Some(canonical) = vk::alias(&upper) {
            return vk::lookup(canonical);
        }
        vk::lookup(&name.to_ascii_lowercase())
    }

    /// Returns `true` exactly when [`KeyCatalog::resolve`] succeeds.
    pub fn is_valid_key(name: &str) -> bool {
        Self::resolve(name).is_some()
    }

    /// Returns `true` for the punctuation symbols typed with shift held.
    pub fn requires_shift(c: char) -> bool {
        SHIFT_SYMBOLS.contains(c)
    }

    /// Canonical name of `code`, if it is in the table.
    pub fn name_of(code: KeyCode) -> Option<&'static str> {
        vk::canonical_name(code)
    }

    /// Resolves a key name into a stroke, flagging shift for shifted symbols.
    ///
    /// Named keys (`"enter"`, `"F8"`) never need shift; only a single
    /// character from [`SHIFT_SYMBOLS`] does.
    pub fn resolve_stroke(name: &str) -> Option<KeyStroke> {
        let code = Self::resolve(name)?;
        let mut chars = name.chars();
        let shift = match (chars.next(), chars.next()) {
            (Some(c), None) => Self::requires_shift(c),
            _ => false,
        };
        Some(KeyStroke { code, shift })
    }

    /// Stroke for one character of typed text.
    ///
    /// Unlike [`KeyCatalog::resolve_stroke`], upper-case letters also hold
    /// shift so that `"Hello"` comes out capitalised.
    pub fn stroke_for_char(c: char) -> Option<KeyStroke> {
        let code = resolve_char(c)?;
        let shift = Self::requires_shift(c) || c.is_ascii_uppercase();
        Some(KeyStroke { code, shift })
    }
}

// ── Helpers ──────────────────────────────────────────────────────────────────

fn function_key(upper: &str) -> Option<KeyCode> {
    let digits = upper.strip_prefix('F')?;
    if digits.is_empty() || digits.len() > 2 || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let n: u8 = digits.parse().ok()?;
    if (1..=24).contains(&n) {
        Some(KeyCode(KeyCode::F1.0 + n - 1))
    } else {
        None
    }
}

fn resolve_char(c: char) -> Option<KeyCode> {
    if c == ' ' {
        return Some(KeyCode::SPACE);
    }
    if c.is_ascii_alphabetic() {
        return Some(KeyCode(c.to_ascii_uppercase() as u8));
    }
    if c.is_ascii_digit() {
        return Some(KeyCode(c as u8));
    }
    if c == '\n' {
        return Some(KeyCode::ENTER);
    }
    if c == '\t' {
        return Some(KeyCode::TAB);
    }

    let base = vk::SHIFTED_SYMBOLS
        .iter()
        .find(|(shifted, _)| *shifted == c)
        .map(|(_, base)| *base)
        .unwrap_or(c);
    let mut buf = [0u8; 4];
    vk::lookup(base.encode_utf8(&mut buf))
}
