use std::time::{Duration, Instant};

use crate::geometry::Size;

// Combined with the 120ms revealer transition, this targets ~600ms perceived hide timing.
const CONTROL_HIDE_DELAY: Duration = Duration::from_millis(480);
pub const MIN_PIN_WIDTH: f64 = 280.0;
pub const MIN_PIN_HEIGHT: f64 = 150.0;

/// Hover-revealed controls over a pinned image.
#[derive(Debug, Clone, Default)]
pub struct PinChrome {
    controls_visible: bool,
    hover_depth: usize,
    controls_hide_at: Option<Instant>,
}

impl PinChrome {
    pub fn controls_visible(&self) -> bool {
        self.controls_visible
    }

    pub fn hover_enter(&mut self) {
        self.hover_depth += 1;
        self.controls_visible = true;
        self.controls_hide_at = None;
    }

    pub fn hover_exit(&mut self, now: Instant) {
        if self.hover_depth == 0 {
            return;
        }
        self.hover_depth -= 1;
        if self.hover_depth == 0 {
            self.controls_hide_at = Some(now + CONTROL_HIDE_DELAY);
        }
    }

    /// Returns true when the controls just went hidden.
    pub fn update_hover_controls_visibility(&mut self, now: Instant) -> bool {
        match self.controls_hide_at {
            Some(deadline) if now >= deadline => {
                self.controls_visible = false;
                self.controls_hide_at = None;
                true
            }
            _ => false,
        }
    }
}

/// The captured size, grown to the minimum pin size where needed.
pub fn initial_pin_size(image_width: u32, image_height: u32) -> Size {
    Size::new(
        f64::from(image_width).max(MIN_PIN_WIDTH),
        f64::from(image_height).max(MIN_PIN_HEIGHT),
    )
}
