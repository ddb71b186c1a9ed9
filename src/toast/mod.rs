//! Toast timing and standalone toast placement.

use std::time::{Duration, Instant};

use crate::geometry::{Rect, Size};

pub const FADE_IN: Duration = Duration::from_millis(150);
pub const HOLD: Duration = Duration::from_millis(1200);
pub const FADE_OUT: Duration = Duration::from_millis(300);

pub const HORIZONTAL_PADDING: f64 = 40.0;
pub const VERTICAL_PADDING: f64 = 20.0;
pub const MIN_HEIGHT: f64 = 40.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToastPhase {
    FadeIn,
    Hold,
    FadeOut,
    Finished,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ToastTimeline {
    pub fade_in: Duration,
    pub hold: Duration,
    pub fade_out: Duration,
}

impl Default for ToastTimeline {
    fn default() -> Self {
        Self {
            fade_in: FADE_IN,
            hold: HOLD,
            fade_out: FADE_OUT,
        }
    }
}

impl ToastTimeline {
    pub fn total(&self) -> Duration {
        self.fade_in + self.hold + self.fade_out
    }

    pub fn phase_at(&self, elapsed: Duration) -> ToastPhase {
        if elapsed < self.fade_in {
            ToastPhase::FadeIn
        } else if elapsed < self.fade_in + self.hold {
            ToastPhase::Hold
        } else if elapsed < self.total() {
            ToastPhase::FadeOut
        } else {
            ToastPhase::Finished
        }
    }

    pub fn opacity_at(&self, elapsed: Duration) -> f64 {
        match self.phase_at(elapsed) {
            ToastPhase::FadeIn => elapsed.as_secs_f64() / self.fade_in.as_secs_f64(),
            ToastPhase::Hold => 1.0,
            ToastPhase::FadeOut => {
                let into = elapsed - self.fade_in - self.hold;
                1.0 - into.as_secs_f64() / self.fade_out.as_secs_f64()
            }
            ToastPhase::Finished => 0.0,
        }
    }
}

/// One toast slot. Showing a new message rewrites the text and restarts the timeline.
#[derive(Debug, Clone, Default)]
pub struct ToastState {
    message: Option<String>,
    started: Option<Instant>,
    timeline: ToastTimeline,
}

impl ToastState {
    pub fn new(timeline: ToastTimeline) -> Self {
        Self {
            message: None,
            started: None,
            timeline,
        }
    }

    pub fn show(&mut self, message: impl Into<String>, now: Instant) {
        self.message = Some(message.into());
        self.started = Some(now);
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    pub fn opacity(&self, now: Instant) -> f64 {
        self.started
            .map(|started| self.timeline.opacity_at(now.saturating_duration_since(started)))
            .unwrap_or(0.0)
    }

    pub fn is_finished(&self, now: Instant) -> bool {
        self.started.is_none_or(|started| {
            self.timeline.phase_at(now.saturating_duration_since(started)) == ToastPhase::Finished
        })
    }
}

/// Frame for a standalone toast: the text plus fixed padding, centered on `display`.
pub fn standalone_toast_frame(display: Rect, text: Size) -> Rect {
    let width = text.width + HORIZONTAL_PADDING * 2.0;
    let height = (text.height + VERTICAL_PADDING * 2.0).max(MIN_HEIGHT);
    let center = display.center();
    Rect::new(center.x - width / 2.0, center.y - height / 2.0, width, height)
}
