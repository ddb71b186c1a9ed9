//! Typed input events and the subscription hub the selector and pinned windows consume.
//!
//! Toolkit code publishes into an [`InputHub`]; logic code only ever sees
//! [`InputEvent`] values arriving on a channel, so it can be driven by tests
//! without a display.

use std::sync::mpsc::{self, Receiver, Sender};

use crate::geometry::Point;

mod shortcut;

pub use shortcut::{
    resolve_shortcut, InputContext, ShortcutAction, ShortcutKey, ShortcutModifiers,
};

/// What sits under the pointer when a button goes down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EventTarget {
    #[default]
    Content,
    Control,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputEvent {
    PointerMove {
        location: Point,
    },
    /// `global` is the pointer position in screen space, `location` is local to the surface.
    ButtonDown {
        location: Point,
        global: Point,
        target: EventTarget,
    },
    Drag {
        location: Point,
        global: Point,
    },
    ButtonUp {
        location: Point,
    },
    Key {
        key: ShortcutKey,
        modifiers: ShortcutModifiers,
    },
}

impl InputEvent {
    pub fn is_pointer(&self) -> bool {
        !matches!(self, Self::Key { .. })
    }

    pub fn is_key(&self) -> bool {
        matches!(self, Self::Key { .. })
    }
}

pub type EventPredicate = Box<dyn Fn(&InputEvent) -> bool>;

/// Anything that can hand out filtered event streams.
pub trait InputEventSource {
    fn subscribe(&mut self, predicate: EventPredicate) -> Receiver<InputEvent>;
}

struct Subscription {
    predicate: EventPredicate,
    sender: Sender<InputEvent>,
}

#[derive(Default)]
pub struct InputHub {
    subscriptions: Vec<Subscription>,
}

impl InputHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delivers `event` to every subscriber whose predicate accepts it and
    /// forgets subscribers whose receiver has been dropped.
    pub fn publish(&mut self, event: InputEvent) {
        self.subscriptions.retain(|subscription| {
            if !(subscription.predicate)(&event) {
                return true;
            }
            subscription.sender.send(event).is_ok()
        });
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscriptions.len()
    }
}

impl InputEventSource for InputHub {
    fn subscribe(&mut self, predicate: EventPredicate) -> Receiver<InputEvent> {
        let (sender, receiver) = mpsc::channel();
        self.subscriptions.push(Subscription { predicate, sender });
        receiver
    }
}
