use gtk4::gdk;

use crate::geometry::Point;
use crate::input::{EventTarget, InputEvent, ShortcutKey, ShortcutModifiers};

fn shortcut_character_from_keycode(keycode: u32) -> Option<char> {
    // Wayland/XKB keycodes are commonly evdev+8. Handle both so shortcuts
    // survive non-latin layouts.
    match keycode {
        46 | 54 => Some('c'),
        31 | 39 => Some('s'),
        44 | 52 => Some('z'),
        32 | 40 => Some('d'),
        _ => None,
    }
}

pub(super) fn normalize_shortcut_key(key: gdk::Key, keycode: u32) -> Option<ShortcutKey> {
    if matches!(key, gdk::Key::Return | gdk::Key::KP_Enter) {
        return Some(ShortcutKey::Enter);
    }
    if key == gdk::Key::Escape {
        return Some(ShortcutKey::Escape);
    }

    let keyval_shortcut = key
        .to_unicode()
        .filter(|character| !character.is_control())
        .map(|character| character.to_ascii_lowercase());
    match keyval_shortcut {
        Some(character) if character.is_ascii() => Some(ShortcutKey::Character(character)),
        Some(_) | None => shortcut_character_from_keycode(keycode).map(ShortcutKey::Character),
    }
}

pub(super) fn shortcut_modifiers(modifier: gdk::ModifierType) -> ShortcutModifiers {
    ShortcutModifiers::new(
        modifier.contains(gdk::ModifierType::CONTROL_MASK),
        modifier.contains(gdk::ModifierType::SHIFT_MASK),
    )
}

pub(super) fn key_event(
    key: gdk::Key,
    keycode: u32,
    modifier: gdk::ModifierType,
) -> Option<InputEvent> {
    Some(InputEvent::Key {
        key: normalize_shortcut_key(key, keycode)?,
        modifiers: shortcut_modifiers(modifier),
    })
}

/// Button-down as seen by a surface whose top-left sits at `origin` on screen.
pub(super) fn button_down(x: f64, y: f64, origin: Point, target: EventTarget) -> InputEvent {
    let location = Point::new(x, y);
    InputEvent::ButtonDown {
        location,
        global: location.offset(origin.x, origin.y),
        target,
    }
}

/// Drag update from a `GestureDrag` start point and offset.
pub(super) fn drag_update(start: Point, offset_x: f64, offset_y: f64, origin: Point) -> InputEvent {
    let location = start.offset(offset_x, offset_y);
    InputEvent::Drag {
        location,
        global: location.offset(origin.x, origin.y),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_shortcut_key_falls_back_to_hardware_keycode_for_letters() {
        assert_eq!(
            normalize_shortcut_key(gdk::Key::Hangul, 54),
            Some(ShortcutKey::Character('c'))
        );
        assert_eq!(
            normalize_shortcut_key(gdk::Key::Hangul, 40),
            Some(ShortcutKey::Character('d'))
        );
        assert_eq!(normalize_shortcut_key(gdk::Key::Hangul, 999), None);
    }

    #[test]
    fn normalize_shortcut_key_keeps_ascii_from_keyval() {
        assert_eq!(
            normalize_shortcut_key(gdk::Key::S, 999),
            Some(ShortcutKey::Character('s'))
        );
        assert_eq!(
            normalize_shortcut_key(gdk::Key::Escape, 47),
            Some(ShortcutKey::Escape)
        );
    }

    #[test]
    fn modifiers_map_ctrl_and_shift() {
        let modifiers = shortcut_modifiers(
            gdk::ModifierType::CONTROL_MASK | gdk::ModifierType::SHIFT_MASK,
        );
        assert_eq!(modifiers, ShortcutModifiers::new(true, true));
        assert_eq!(
            shortcut_modifiers(gdk::ModifierType::ALT_MASK),
            ShortcutModifiers::default()
        );
    }

    #[test]
    fn pointer_events_carry_global_position() {
        let origin = Point::new(300.0, 200.0);
        assert_eq!(
            button_down(10.0, 20.0, origin, EventTarget::Content),
            InputEvent::ButtonDown {
                location: Point::new(10.0, 20.0),
                global: Point::new(310.0, 220.0),
                target: EventTarget::Content,
            }
        );
        assert_eq!(
            drag_update(Point::new(10.0, 20.0), 5.0, -5.0, origin),
            InputEvent::Drag {
                location: Point::new(15.0, 15.0),
                global: Point::new(315.0, 215.0),
            }
        );
    }
}
