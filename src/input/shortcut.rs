#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShortcutKey {
    Character(char),
    Enter,
    Escape,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ShortcutModifiers {
    pub ctrl: bool,
    pub shift: bool,
}

impl ShortcutModifiers {
    pub const fn new(ctrl: bool, shift: bool) -> Self {
        Self { ctrl, shift }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct InputContext {
    pub selecting: bool,
    pub dialog_open: bool,
    pub in_pin: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShortcutAction {
    SelectionCancel,
    PinCopyImage,
    PinSave,
    PinUndo,
    PinToggleDrawing,
    PinCopyText,
    PinClose,
}

fn resolve_selection_shortcut(key: ShortcutKey) -> Option<ShortcutAction> {
    match key {
        ShortcutKey::Escape => Some(ShortcutAction::SelectionCancel),
        _ => None,
    }
}

fn resolve_pin_shortcut(key: ShortcutKey, modifiers: ShortcutModifiers) -> Option<ShortcutAction> {
    match (key, modifiers.ctrl, modifiers.shift) {
        (ShortcutKey::Character('c'), true, true) => Some(ShortcutAction::PinCopyText),
        (ShortcutKey::Character('c'), true, false) => Some(ShortcutAction::PinCopyImage),
        (ShortcutKey::Character('s'), true, _) => Some(ShortcutAction::PinSave),
        (ShortcutKey::Character('z'), true, false) => Some(ShortcutAction::PinUndo),
        (ShortcutKey::Character('d'), false, false) => Some(ShortcutAction::PinToggleDrawing),
        (ShortcutKey::Escape, false, false) => Some(ShortcutAction::PinClose),
        _ => None,
    }
}

pub fn resolve_shortcut(
    key: ShortcutKey,
    modifiers: ShortcutModifiers,
    context: InputContext,
) -> Option<ShortcutAction> {
    if context.selecting {
        return resolve_selection_shortcut(key);
    }

    // The save dialog owns the keyboard while it is open.
    if context.dialog_open {
        return None;
    }

    if context.in_pin {
        return resolve_pin_shortcut(key, modifiers);
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pin_context() -> InputContext {
        InputContext {
            in_pin: true,
            ..InputContext::default()
        }
    }

    #[test]
    fn resolve_shortcut_prioritizes_selection_context() {
        let context = InputContext {
            selecting: true,
            dialog_open: true,
            in_pin: true,
        };
        assert_eq!(
            resolve_shortcut(ShortcutKey::Escape, ShortcutModifiers::default(), context),
            Some(ShortcutAction::SelectionCancel)
        );
        assert_eq!(
            resolve_shortcut(
                ShortcutKey::Character('c'),
                ShortcutModifiers::new(true, false),
                context
            ),
            None
        );
    }

    #[test]
    fn resolve_shortcut_maps_pin_accelerators() {
        let ctrl = ShortcutModifiers::new(true, false);
        assert_eq!(
            resolve_shortcut(ShortcutKey::Character('c'), ctrl, pin_context()),
            Some(ShortcutAction::PinCopyImage)
        );
        assert_eq!(
            resolve_shortcut(ShortcutKey::Character('s'), ctrl, pin_context()),
            Some(ShortcutAction::PinSave)
        );
        assert_eq!(
            resolve_shortcut(ShortcutKey::Character('z'), ctrl, pin_context()),
            Some(ShortcutAction::PinUndo)
        );
        assert_eq!(
            resolve_shortcut(
                ShortcutKey::Character('c'),
                ShortcutModifiers::new(true, true),
                pin_context()
            ),
            Some(ShortcutAction::PinCopyText)
        );
        assert_eq!(
            resolve_shortcut(
                ShortcutKey::Character('d'),
                ShortcutModifiers::default(),
                pin_context()
            ),
            Some(ShortcutAction::PinToggleDrawing)
        );
        assert_eq!(
            resolve_shortcut(ShortcutKey::Escape, ShortcutModifiers::default(), pin_context()),
            Some(ShortcutAction::PinClose)
        );
    }

    #[test]
    fn resolve_shortcut_ignores_plain_letters_and_open_dialogs() {
        assert_eq!(
            resolve_shortcut(
                ShortcutKey::Character('c'),
                ShortcutModifiers::default(),
                pin_context()
            ),
            None
        );

        let dialog = InputContext {
            dialog_open: true,
            in_pin: true,
            ..InputContext::default()
        };
        assert_eq!(
            resolve_shortcut(ShortcutKey::Escape, ShortcutModifiers::default(), dialog),
            None
        );
    }

    #[test]
    fn resolve_shortcut_without_context_returns_none() {
        assert_eq!(
            resolve_shortcut(
                ShortcutKey::Enter,
                ShortcutModifiers::default(),
                InputContext::default()
            ),
            None
        );
    }
}
