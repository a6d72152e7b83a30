//! One-shot key presses, typed text, and button clicks.

use std::time::Duration;

use crate::domain::{InjectError, InputAction};
use crate::keymap::{KeyCatalog, KeyCode, KeyStroke, MouseButton};

use super::{precise, InjectionSink};

/// Default time a key or button is held down.
pub const DEFAULT_HOLD: Duration = Duration::from_millis(100);
/// Pause between shift and the key it modifies, on both edges.
pub const SHIFT_SETTLE: Duration = Duration::from_millis(10);

/// Presses and releases one stroke, wrapping it in shift when required.
///
/// Shift is released even when the base key fails.
pub fn press_stroke<S>(sink: &mut S, stroke: KeyStroke, hold: Duration) -> Result<(), InjectError>
where
    S: InjectionSink + ?Sized,
{
    sink.check_ready()?;
    if !stroke.shift {
        return tap(sink, stroke.code, hold);
    }

    sink.emit(InputAction::KeyDown(KeyCode::SHIFT))?;
    precise::pause(SHIFT_SETTLE);
    let pressed = tap(sink, stroke.code, hold);
    precise::pause(SHIFT_SETTLE);
    let released = sink.emit(InputAction::KeyUp(KeyCode::SHIFT));
    pressed.and(released)
}

/// Resolves `name` through the catalog and presses it.
pub fn press_key<S>(sink: &mut S, name: &str, hold: Duration) -> Result<(), InjectError>
where
    S: InjectionSink + ?Sized,
{
    let stroke =
        KeyCatalog::resolve_stroke(name).ok_or_else(|| InjectError::UnknownKey(name.to_string()))?;
    press_stroke(sink, stroke, hold)
}

/// Types `text` one character at a time, holding each key for `hold` and
/// pausing for the same time between characters.
///
/// Every character is resolved before the first key goes down, so an
/// untypeable character fails the whole call without injecting anything.
pub fn type_text<S>(sink: &mut S, text: &str, hold: Duration) -> Result<usize, InjectError>
where
    S: InjectionSink + ?Sized,
{
    let strokes = text
        .chars()
        .map(|c| KeyCatalog::stroke_for_char(c).ok_or_else(|| InjectError::UnknownKey(c.to_string())))
        .collect::<Result<Vec<_>, _>>()?;

    for (i, stroke) in strokes.iter().enumerate() {
        if i > 0 {
            precise::pause(hold);
        }
        press_stroke(sink, *stroke, hold)?;
    }
    Ok(strokes.len())
}

/// Presses and releases a mouse button.
pub fn click<S>(sink: &mut S, button: MouseButton, hold: Duration) -> Result<(), InjectError>
where
    S: InjectionSink + ?Sized,
{
    sink.check_ready()?;
    sink.emit(InputAction::ButtonDown(button))?;
    precise::pause(hold);
    sink.emit(InputAction::ButtonUp(button))
}

fn tap<S>(sink: &mut S, code: KeyCode, hold: Duration) -> Result<(), InjectError>
where
    S: InjectionSink + ?Sized,
{
    sink.emit(InputAction::KeyDown(code))?;
    precise::pause(hold);
    sink.emit(InputAction::KeyUp(code))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timing::recording::RecordingSink;

    const HOLD: Duration = Duration::from_millis(1);

    #[test]
    fn test_plain_stroke_is_down_then_up() {
        let mut sink = RecordingSink::new();

        press_key(&mut sink, "enter", HOLD).unwrap();

        assert_eq!(
            sink.actions(),
            vec![
                InputAction::KeyDown(KeyCode::ENTER),
                InputAction::KeyUp(KeyCode::ENTER)
            ]
        );
    }

    #[test]
    fn test_shifted_symbol_wraps_base_key_in_shift() {
        // Arrange
        let mut sink = RecordingSink::new();
        let slash = KeyCode(0xBF);

        // Act
        press_key(&mut sink, "?", HOLD).unwrap();

        // Assert
        assert_eq!(
            sink.actions(),
            vec![
                InputAction::KeyDown(KeyCode::SHIFT),
                InputAction::KeyDown(slash),
                InputAction::KeyUp(slash),
                InputAction::KeyUp(KeyCode::SHIFT),
            ]
        );
    }

    #[test]
    fn test_shift_settles_before_and_after_base_key() {
        let mut sink = RecordingSink::new();

        press_key(&mut sink, "!", HOLD).unwrap();

        let times: Vec<_> = sink.events.iter().map(|(at, _)| *at).collect();
        assert!(times[1] - times[0] >= SHIFT_SETTLE);
        assert!(times[3] - times[2] >= SHIFT_SETTLE);
    }

    #[test]
    fn test_press_key_rejects_unknown_name_without_injecting() {
        let mut sink = RecordingSink::new();

        let err = press_key(&mut sink, "hyper", HOLD).unwrap_err();

        assert_eq!(err, InjectError::UnknownKey("hyper".to_string()));
        assert!(sink.events.is_empty());
    }

    #[test]
    fn test_type_text_presses_every_character() {
        // Arrange
        let mut sink = RecordingSink::new();

        // Act
        let typed = type_text(&mut sink, "Hi!", HOLD).unwrap();

        // Assert
        assert_eq!(typed, 3);
        let h = KeyCode(0x48);
        let i = KeyCode(0x49);
        let one = KeyCode(0x31);
        assert_eq!(
            sink.actions(),
            vec![
                InputAction::KeyDown(KeyCode::SHIFT),
                InputAction::KeyDown(h),
                InputAction::KeyUp(h),
                InputAction::KeyUp(KeyCode::SHIFT),
                InputAction::KeyDown(i),
                InputAction::KeyUp(i),
                InputAction::KeyDown(KeyCode::SHIFT),
                InputAction::KeyDown(one),
                InputAction::KeyUp(one),
                InputAction::KeyUp(KeyCode::SHIFT),
            ]
        );
    }

    #[test]
    fn test_type_text_with_untypeable_character_injects_nothing() {
        let mut sink = RecordingSink::new();

        let err = type_text(&mut sink, "ok€", HOLD).unwrap_err();

        assert_eq!(err, InjectError::UnknownKey("€".to_string()));
        assert!(sink.events.is_empty());
    }

    #[test]
    fn test_click_presses_and_releases_button() {
        let mut sink = RecordingSink::new();

        click(&mut sink, MouseButton::X2, HOLD).unwrap();

        assert_eq!(
            sink.actions(),
            vec![
                InputAction::ButtonDown(MouseButton::X2),
                InputAction::ButtonUp(MouseButton::X2)
            ]
        );
    }

    #[test]
    fn test_faulted_device_blocks_press() {
        let mut sink = RecordingSink::faulting_after(0);

        assert!(press_key(&mut sink, "a", HOLD).is_err());
        assert!(sink.events.is_empty());
    }
}
