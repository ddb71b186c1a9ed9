//! Interactive resolution of a capture rectangle from typed input events.
//!
//! The selector never touches a toolkit. The overlay feeds it [`InputEvent`]s
//! in overlay-local coordinates and paints whatever highlight or drag
//! rectangle the returned [`SelectorOutcome`] reports. Resolution and
//! cancellation are also delivered through the registered callbacks, after
//! which the caller tears the overlay down.

use std::sync::mpsc::Receiver;
use std::time::Duration;

use thiserror::Error;

use crate::geometry::{Point, Rect};
use crate::input::{InputEvent, ShortcutKey};
use crate::region::{selectable_windows, window_candidate_at, RegionSource};

mod space;

pub use space::{AxisOrigin, OverlaySpace};

/// Both sides of a dragged area must exceed this to resolve.
pub const MIN_AREA_EXTENT: f64 = 10.0;
const PULSE_PERIOD: Duration = Duration::from_millis(1000);
const PULSE_MIN_ALPHA: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionMode {
    Window,
    Element,
    Area,
}

impl SelectionMode {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "window" => Some(Self::Window),
            "element" => Some(Self::Element),
            "area" => Some(Self::Area),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SelectionRegion {
    /// Screen space.
    pub rect: Rect,
    pub source_kind: SelectionMode,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SelectorState {
    Idle,
    Armed(SelectionMode),
    Highlighting { mode: SelectionMode, rect: Rect },
    AreaDragging { anchor: Point, current: Point },
    Resolved(SelectionRegion),
    Cancelled,
}

impl SelectorState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Resolved(_) | Self::Cancelled)
    }
}

/// What the overlay has to repaint after an event. Rectangles are overlay-local.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SelectorOutcome {
    Unchanged,
    HighlightChanged(Option<Rect>),
    SelectionChanged(Option<Rect>),
    Resolved(SelectionRegion),
    Cancelled,
}

#[derive(Debug, Error)]
pub enum SelectorError {
    #[error("selector cannot arm from state {from:?}")]
    AlreadyArmed { from: SelectorState },
    #[error("event {event:?} arrived after the selector finished in {state:?}")]
    Finished {
        state: SelectorState,
        event: InputEvent,
    },
}

pub type SelectorResult<T> = std::result::Result<T, SelectorError>;

type ResolvedCallback = Box<dyn FnMut(SelectionRegion)>;
type CancelledCallback = Box<dyn FnMut()>;

pub struct RegionSelector<S: RegionSource> {
    source: S,
    space: OverlaySpace,
    excluded_owners: Vec<String>,
    state: SelectorState,
    on_resolved: Option<ResolvedCallback>,
    on_cancelled: Option<CancelledCallback>,
}

impl<S: RegionSource> RegionSelector<S> {
    pub fn new(source: S, space: OverlaySpace, excluded_owners: Vec<String>) -> Self {
        Self {
            source,
            space,
            excluded_owners,
            state: SelectorState::Idle,
            on_resolved: None,
            on_cancelled: None,
        }
    }

    pub fn on_resolved(&mut self, callback: impl FnMut(SelectionRegion) + 'static) {
        self.on_resolved = Some(Box::new(callback));
    }

    pub fn on_cancelled(&mut self, callback: impl FnMut() + 'static) {
        self.on_cancelled = Some(Box::new(callback));
    }

    pub fn state(&self) -> SelectorState {
        self.state
    }

    pub fn space(&self) -> OverlaySpace {
        self.space
    }

    pub fn arm(&mut self, mode: SelectionMode) -> SelectorResult<()> {
        if self.state != SelectorState::Idle {
            return Err(SelectorError::AlreadyArmed { from: self.state });
        }
        tracing::debug!(?mode, "selector armed");
        self.state = SelectorState::Armed(mode);
        Ok(())
    }

    pub fn handle_event(&mut self, event: InputEvent) -> SelectorResult<SelectorOutcome> {
        if self.state.is_terminal() {
            return Err(SelectorError::Finished {
                state: self.state,
                event,
            });
        }

        if let InputEvent::Key {
            key: ShortcutKey::Escape,
            ..
        } = event
        {
            return Ok(self.cancel());
        }

        let outcome = match (self.state, event) {
            (SelectorState::Armed(mode), InputEvent::PointerMove { location })
            | (SelectorState::Highlighting { mode, .. }, InputEvent::PointerMove { location })
                if mode != SelectionMode::Area =>
            {
                self.update_highlight(mode, location)
            }
            (SelectorState::Highlighting { mode, rect }, InputEvent::ButtonDown { .. }) => {
                self.resolve(SelectionRegion {
                    rect: self.space.rect_to_screen(rect),
                    source_kind: mode,
                })
            }
            (SelectorState::Armed(SelectionMode::Area), InputEvent::ButtonDown { location, .. }) => {
                self.state = SelectorState::AreaDragging {
                    anchor: location,
                    current: location,
                };
                SelectorOutcome::SelectionChanged(Some(Rect::from_corners(location, location)))
            }
            (SelectorState::AreaDragging { anchor, .. }, InputEvent::Drag { location, .. })
            | (SelectorState::AreaDragging { anchor, .. }, InputEvent::PointerMove { location }) => {
                self.state = SelectorState::AreaDragging {
                    anchor,
                    current: location,
                };
                SelectorOutcome::SelectionChanged(Some(Rect::from_corners(anchor, location)))
            }
            (SelectorState::AreaDragging { anchor, .. }, InputEvent::ButtonUp { location }) => {
                let rect = Rect::from_corners(anchor, location);
                if rect.width > MIN_AREA_EXTENT && rect.height > MIN_AREA_EXTENT {
                    self.resolve(SelectionRegion {
                        rect: self.space.rect_to_screen(rect),
                        source_kind: SelectionMode::Area,
                    })
                } else {
                    tracing::debug!(?rect, "area selection below threshold; cleared");
                    self.state = SelectorState::Armed(SelectionMode::Area);
                    SelectorOutcome::SelectionChanged(None)
                }
            }
            _ => SelectorOutcome::Unchanged,
        };

        Ok(outcome)
    }

    /// Feeds every queued event until the selector reaches a terminal state.
    pub fn drain(&mut self, events: &Receiver<InputEvent>) -> SelectorResult<Vec<SelectorOutcome>> {
        let mut outcomes = Vec::new();
        while !self.state.is_terminal() {
            let Ok(event) = events.try_recv() else {
                break;
            };
            outcomes.push(self.handle_event(event)?);
        }
        Ok(outcomes)
    }

    fn candidate_at(&self, mode: SelectionMode, location: Point) -> Option<Rect> {
        let screen_point = self.space.point_to_screen(location);
        let screen_rect = match mode {
            SelectionMode::Window => match self.source.windows() {
                Ok(windows) => {
                    let candidates = selectable_windows(windows, &self.excluded_owners);
                    window_candidate_at(&candidates, screen_point).map(|window| window.bounds)
                }
                Err(err) => {
                    tracing::warn!(?err, "window query failed");
                    None
                }
            },
            SelectionMode::Element => match self.source.element_at(screen_point) {
                Ok(element) => element.map(|element| element.bounds),
                Err(err) => {
                    tracing::debug!(?err, "no accessibility candidate");
                    None
                }
            },
            SelectionMode::Area => None,
        }?;
        Some(self.space.rect_from_screen(screen_rect))
    }

    fn update_highlight(&mut self, mode: SelectionMode, location: Point) -> SelectorOutcome {
        let previous = match self.state {
            SelectorState::Highlighting { rect, .. } => Some(rect),
            _ => None,
        };
        let candidate = self.candidate_at(mode, location);
        if candidate == previous {
            return SelectorOutcome::Unchanged;
        }

        self.state = match candidate {
            Some(rect) => SelectorState::Highlighting { mode, rect },
            None => SelectorState::Armed(mode),
        };
        SelectorOutcome::HighlightChanged(candidate)
    }

    fn resolve(&mut self, region: SelectionRegion) -> SelectorOutcome {
        tracing::info!(rect = ?region.rect, kind = ?region.source_kind, "selection resolved");
        self.state = SelectorState::Resolved(region);
        if let Some(callback) = self.on_resolved.as_mut() {
            callback(region);
        }
        SelectorOutcome::Resolved(region)
    }

    fn cancel(&mut self) -> SelectorOutcome {
        tracing::info!(from = ?self.state, "selection cancelled");
        self.state = SelectorState::Cancelled;
        if let Some(callback) = self.on_cancelled.as_mut() {
            callback();
        }
        SelectorOutcome::Cancelled
    }
}

/// Outline alpha for the highlight pulse, swinging between 1.0 and 0.5.
pub fn pulse_alpha(elapsed: Duration) -> f64 {
    let period = PULSE_PERIOD.as_secs_f64();
    let phase = (elapsed.as_secs_f64() % period) / period;
    let swing = if phase < 0.5 { phase * 2.0 } else { (1.0 - phase) * 2.0 };
    1.0 - swing * (1.0 - PULSE_MIN_ALPHA)
}
