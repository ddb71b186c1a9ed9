use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::{Duration, Instant};

use gtk4::prelude::*;
use gtk4::{cairo, glib, Application, ApplicationWindow, Label, Orientation};

use crate::geometry::{Point, Size};
use crate::toast::{standalone_toast_frame, ToastState, ToastTimeline};

use super::hypr::request_pinned_window_setup;
use super::layout::{monitor_rects, primary_display_rect};

const FRAME_INTERVAL: Duration = Duration::from_millis(16);

/// Fading badge anchored inside a pinned window.
#[derive(Clone)]
pub(super) struct ToastRuntime {
    label: Label,
    state: Rc<RefCell<ToastState>>,
    sequence: Rc<Cell<u64>>,
}

impl ToastRuntime {
    pub(super) fn new(label: &Label) -> Self {
        label.set_visible(false);
        Self {
            label: label.clone(),
            state: Rc::new(RefCell::new(ToastState::new(ToastTimeline::default()))),
            sequence: Rc::new(Cell::new(0)),
        }
    }

    /// Replaces any toast in flight; only the latest sequence keeps animating.
    pub(super) fn show(&self, message: impl Into<String>) {
        let message = message.into();
        self.state.borrow_mut().show(message.as_str(), Instant::now());
        self.label.set_text(&message);
        self.label.set_opacity(0.0);
        self.label.set_visible(true);

        let sequence = self.sequence.get().saturating_add(1);
        self.sequence.set(sequence);

        let label = self.label.clone();
        let state = self.state.clone();
        let latest_sequence = self.sequence.clone();
        glib::timeout_add_local(FRAME_INTERVAL, move || {
            if latest_sequence.get() != sequence {
                return glib::ControlFlow::Break;
            }
            let now = Instant::now();
            let state = state.borrow();
            if state.is_finished(now) {
                label.set_visible(false);
                return glib::ControlFlow::Break;
            }
            label.set_opacity(state.opacity(now));
            glib::ControlFlow::Continue
        });
    }
}

fn toast_badge(message: &str) -> Label {
    let label = Label::new(Some(message));
    label.add_css_class("toast-badge");
    label
}

/// Click-through toast centered on the primary display, used when no pin is open.
pub(super) fn show_standalone_toast(app: &Application, message: &str) {
    static SEQUENCE: std::sync::atomic::AtomicU64 = std::sync::atomic::AtomicU64::new(0);
    let sequence = SEQUENCE.fetch_add(1, std::sync::atomic::Ordering::Relaxed) + 1;
    let title = format!("PinShot Toast {sequence}");

    let badge = toast_badge(message);
    let (_, text_width, _, _) = badge.measure(Orientation::Horizontal, -1);
    let (_, text_height, _, _) = badge.measure(Orientation::Vertical, text_width);
    let frame = standalone_toast_frame(
        primary_display_rect(&monitor_rects()),
        Size::new(f64::from(text_width), f64::from(text_height)),
    );
    tracing::debug!(message, ?frame, "showing standalone toast");

    let window = ApplicationWindow::new(app);
    window.set_title(Some(&title));
    window.add_css_class("pinshot-toast");
    window.set_decorated(false);
    window.set_resizable(false);
    window.set_can_focus(false);
    window.set_default_size(frame.width.round() as i32, frame.height.round() as i32);
    badge.set_halign(gtk4::Align::Fill);
    badge.set_valign(gtk4::Align::Fill);
    window.set_child(Some(&badge));
    window.set_opacity(0.0);

    window.connect_realize(|window| {
        if let Some(surface) = window.surface() {
            surface.set_input_region(&cairo::Region::create());
        }
    });
    window.present();
    request_pinned_window_setup(
        &title,
        frame.size(),
        Some(Point::new(frame.x, frame.y)),
        |_| {},
    );

    let mut state = ToastState::new(ToastTimeline::default());
    state.show(message, Instant::now());
    glib::timeout_add_local(FRAME_INTERVAL, move || {
        let now = Instant::now();
        if state.is_finished(now) {
            window.destroy();
            return glib::ControlFlow::Break;
        }
        window.set_opacity(state.opacity(now));
        glib::ControlFlow::Continue
    });
}
