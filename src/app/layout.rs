use gtk4::prelude::*;

use crate::geometry::Rect;

const FALLBACK_DISPLAY: Rect = Rect::new(0.0, 0.0, 1920.0, 1080.0);

pub(super) fn monitor_rects() -> Vec<Rect> {
    let Some(display) = gtk4::gdk::Display::default() else {
        return Vec::new();
    };
    let monitors = display.monitors();
    let mut rects = Vec::new();

    for index in 0..monitors.n_items() {
        let Some(item) = monitors.item(index) else {
            continue;
        };
        let Ok(monitor) = item.downcast::<gtk4::gdk::Monitor>() else {
            continue;
        };
        let geometry = monitor.geometry();
        rects.push(Rect::new(
            f64::from(geometry.x()),
            f64::from(geometry.y()),
            f64::from(geometry.width().max(1)),
            f64::from(geometry.height().max(1)),
        ));
    }

    rects
}

/// The display toasts and the selection overlay use: the first monitor.
pub(super) fn primary_display_rect(monitors: &[Rect]) -> Rect {
    monitors.first().copied().unwrap_or(FALLBACK_DISPLAY)
}
