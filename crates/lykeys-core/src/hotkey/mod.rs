//! Hotkey bindings and the matching rules of the global capture hook.
//!
//! The OS-specific hook lives in the tester crate; it turns raw keyboard
//! events into [`KeyTransition`]s and feeds them to a [`HotkeyDispatcher`].
//! The dispatcher owns the set of currently pressed keys and decides which
//! bindings in a [`BindingTable`] fire.
//!
//! # Matching rules
//!
//! - A single-key binding fires on the key-down of that key.
//! - A chord fires on the key-down of one of its keys when every key of the
//!   chord is then held.
//! - A key-down for a key already held is auto-repeat and fires nothing.
//! - Side-specific modifiers (left/right shift, ctrl, alt) also count as
//!   their generic modifier, so `ctrl+F8` matches with either control key.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use tracing::trace;

use crate::keymap::{KeyCatalog, KeyCode};

/// Callback invoked on the capture thread when a binding fires.
///
/// Must return quickly: the OS drops the hook if a callback stalls it.
pub type HotkeyCallback = Arc<dyn Fn() + Send + Sync>;

/// One raw keyboard edge reported by the capture hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyTransition {
    Down(KeyCode),
    Up(KeyCode),
}

// ── Bindings ─────────────────────────────────────────────────────────────────

/// A single key or a chord of keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum HotkeyBinding {
    Single(KeyCode),
    /// At least two distinct keys, in the order they were written.
    Chord(Vec<KeyCode>),
}

/// Errors from [`HotkeyBinding::parse`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BindingParseError {
    #[error("empty hotkey")]
    Empty,
    #[error("unknown key {0:?} in hotkey")]
    UnknownKey(String),
}

impl HotkeyBinding {
    /// Builds a binding from codes, dropping duplicates.
    ///
    /// A chord of one distinct key collapses to [`HotkeyBinding::Single`].
    /// Returns `None` for an empty list.
    pub fn from_codes(codes: &[KeyCode]) -> Option<Self> {
        let mut distinct: Vec<KeyCode> = Vec::with_capacity(codes.len());
        for code in codes {
            if !distinct.contains(code) {
                distinct.push(*code);
            }
        }
        match distinct.len() {
            0 => None,
            1 => Some(HotkeyBinding::Single(distinct[0])),
            _ => Some(HotkeyBinding::Chord(distinct)),
        }
    }

    /// Parses `"F8"`, `"ctrl+shift+F8"` and similar through the key catalog.
    pub fn parse(text: &str) -> Result<Self, BindingParseError> {
        let mut codes = Vec::new();
        for part in text.split('+').map(str::trim) {
            if part.is_empty() {
                continue;
            }
            let code = KeyCatalog::resolve(part)
                .ok_or_else(|| BindingParseError::UnknownKey(part.to_string()))?;
            codes.push(code);
        }
        Self::from_codes(&codes).ok_or(BindingParseError::Empty)
    }

    /// The keys of the binding, in order.
    pub fn codes(&self) -> &[KeyCode] {
        match self {
            HotkeyBinding::Single(code) => std::slice::from_ref(code),
            HotkeyBinding::Chord(codes) => codes,
        }
    }

    /// Whether a fresh key-down of `code` fires this binding, given the keys
    /// held after that key-down.
    fn fires_on(&self, code: KeyCode, pressed: &PressedKeySet) -> bool {
        match self {
            HotkeyBinding::Single(key) => code == *key || code.generic_modifier() == Some(*key),
            HotkeyBinding::Chord(keys) => {
                let triggered_by_member = keys
                    .iter()
                    .any(|k| code == *k || code.generic_modifier() == Some(*k));
                triggered_by_member && keys.iter().all(|k| pressed.contains(*k))
            }
        }
    }
}

impl fmt::Display for HotkeyBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, code) in self.codes().iter().enumerate() {
            if i > 0 {
                f.write_str("+")?;
            }
            write!(f, "{code}")?;
        }
        Ok(())
    }
}

// ── Binding table ────────────────────────────────────────────────────────────

/// Registered bindings and their callbacks.
#[derive(Default, Clone)]
pub struct BindingTable {
    entries: Vec<(HotkeyBinding, HotkeyCallback)>,
}

impl BindingTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a binding, replacing the callback if it is already registered.
    pub fn register(&mut self, binding: HotkeyBinding, callback: HotkeyCallback) {
        match self.entries.iter_mut().find(|(b, _)| *b == binding) {
            Some(entry) => entry.1 = callback,
            None => self.entries.push((binding, callback)),
        }
    }

    /// Removes a binding.  Returns `false` if it was not registered.
    pub fn unregister(&mut self, binding: &HotkeyBinding) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(b, _)| b != binding);
        self.entries.len() != before
    }

    pub fn contains(&self, binding: &HotkeyBinding) -> bool {
        self.entries.iter().any(|(b, _)| b == binding)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn bindings(&self) -> impl Iterator<Item = &HotkeyBinding> {
        self.entries.iter().map(|(b, _)| b)
    }
}

impl fmt::Debug for BindingTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.bindings()).finish()
    }
}

// ── Pressed keys ─────────────────────────────────────────────────────────────

/// Keys currently held, as seen by the capture hook.
///
/// A side-specific modifier also marks its generic code as held for as long
/// as either side is down.
#[derive(Debug, Default, Clone)]
pub struct PressedKeySet {
    keys: BTreeSet<KeyCode>,
}

impl PressedKeySet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks `code` held.  Returns `false` if it already was (auto-repeat).
    pub fn press(&mut self, code: KeyCode) -> bool {
        let fresh = self.keys.insert(code);
        if let Some(generic) = code.generic_modifier() {
            self.keys.insert(generic);
        }
        fresh
    }

    pub fn release(&mut self, code: KeyCode) {
        self.keys.remove(&code);
        if let Some(generic) = code.generic_modifier() {
            let other_side_held = self
                .keys
                .iter()
                .any(|k| k.generic_modifier() == Some(generic));
            if !other_side_held {
                self.keys.remove(&generic);
            }
        }
    }

    pub fn contains(&self, code: KeyCode) -> bool {
        self.keys.contains(&code)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

// ── Dispatcher ───────────────────────────────────────────────────────────────

/// Tracks pressed keys and selects the bindings a transition fires.
///
/// Owned by the capture thread; never shared.
#[derive(Debug, Default)]
pub struct HotkeyDispatcher {
    pressed: PressedKeySet,
}

impl HotkeyDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies one transition and returns the callbacks it fires.
    ///
    /// The callbacks are returned rather than invoked so the caller can
    /// release any lock around `table` before running them.
    pub fn handle(&mut self, transition: KeyTransition, table: &BindingTable) -> Vec<HotkeyCallback> {
        match transition {
            KeyTransition::Down(code) => {
                if !self.pressed.press(code) {
                    return Vec::new();
                }
                table
                    .entries
                    .iter()
                    .filter(|(binding, _)| binding.fires_on(code, &self.pressed))
                    .map(|(binding, callback)| {
                        trace!(%binding, "hotkey fired");
                        Arc::clone(callback)
                    })
                    .collect()
            }
            KeyTransition::Up(code) => {
                self.pressed.release(code);
                Vec::new()
            }
        }
    }

    pub fn pressed(&self) -> &PressedKeySet {
        &self.pressed
    }
}
