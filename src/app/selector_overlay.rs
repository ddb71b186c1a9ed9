use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::{Duration, Instant};

use gtk4::prelude::*;
use gtk4::{
    cairo, gdk, glib, Application, ApplicationWindow, DrawingArea, EventControllerKey,
    EventControllerMotion, GestureDrag,
};

use crate::geometry::{Color, Point, Rect};
use crate::input::{EventTarget, InputEvent, InputEventSource, InputHub};
use crate::region::DesktopRegionSource;
use crate::selector::{
    pulse_alpha, AxisOrigin, OverlaySpace, RegionSelector, SelectionMode, SelectionRegion,
    SelectorOutcome,
};

use super::input_bridge::key_event;
use super::layout::{monitor_rects, primary_display_rect};

const OVERLAY_TITLE: &str = "PinShot Selector";
const DIM_ALPHA: f64 = 0.25;
const OUTLINE_WIDTH: f64 = 3.0;
const OUTLINE_COLOR: Color = Color::BLUE;
/// Element lookups finish off the main thread; the pointer is re-sent at
/// this pace so a finished lookup reaches the highlight without new motion.
const ELEMENT_REFRESH_INTERVAL: Duration = Duration::from_millis(60);

#[derive(Debug, Clone, Copy, PartialEq)]
pub(super) enum SelectionFinish {
    Resolved(SelectionRegion),
    Cancelled,
}

type FinishCallback = Box<dyn FnOnce(SelectionFinish)>;

struct OverlayState {
    selector: RegionSelector<DesktopRegionSource>,
    events: std::sync::mpsc::Receiver<InputEvent>,
    marked: Option<Rect>,
    on_finish: Option<FinishCallback>,
}

fn draw_overlay(
    cr: &cairo::Context,
    width: i32,
    height: i32,
    marked: Option<Rect>,
    pulse: f64,
) -> Result<(), cairo::Error> {
    cr.set_fill_rule(cairo::FillRule::EvenOdd);
    cr.rectangle(0.0, 0.0, f64::from(width), f64::from(height));
    if let Some(rect) = marked {
        cr.rectangle(rect.x, rect.y, rect.width, rect.height);
    }
    cr.set_source_rgba(0.0, 0.0, 0.0, DIM_ALPHA);
    cr.fill()?;

    let Some(rect) = marked else {
        return Ok(());
    };
    let (r, g, b, _) = OUTLINE_COLOR.to_f64_rgba();
    cr.set_source_rgba(r, g, b, pulse);
    cr.set_line_width(OUTLINE_WIDTH);
    cr.rectangle(rect.x, rect.y, rect.width, rect.height);
    cr.stroke()
}

/// Feeds queued events to the selector, updates the marked rectangle, and
/// tears the overlay down once the selector finishes.
fn pump(
    state: &Rc<RefCell<OverlayState>>,
    finish: &Cell<Option<SelectionFinish>>,
    window: &ApplicationWindow,
    canvas: &DrawingArea,
) {
    let callback = {
        let mut guard = state.borrow_mut();
        let state = &mut *guard;
        match state.selector.drain(&state.events) {
            Ok(outcomes) => {
                for outcome in outcomes {
                    match outcome {
                        SelectorOutcome::HighlightChanged(rect)
                        | SelectorOutcome::SelectionChanged(rect) => {
                            state.marked = rect;
                            canvas.queue_draw();
                        }
                        SelectorOutcome::Unchanged
                        | SelectorOutcome::Resolved(_)
                        | SelectorOutcome::Cancelled => {}
                    }
                }
            }
            Err(err) => tracing::debug!(?err, "selector ignored event"),
        }
        match finish.get() {
            Some(_) => state.on_finish.take(),
            None => None,
        }
    };

    if let (Some(result), Some(callback)) = (finish.take(), callback) {
        tracing::debug!(?result, "closing selector overlay");
        window.close();
        callback(result);
    }
}

/// Opens a fullscreen transparent overlay on the primary display and resolves
/// one selection in `mode`. `on_finish` runs exactly once, after the overlay closed.
pub(super) fn open_selector_overlay<F>(
    app: &Application,
    mode: SelectionMode,
    excluded_owners: Vec<String>,
    on_finish: F,
) where
    F: FnOnce(SelectionFinish) + 'static,
{
    let display = primary_display_rect(&monitor_rects());
    let space = OverlaySpace::new(Point::new(display.x, display.y), display.height, AxisOrigin::TopLeft);
    let hub = Rc::new(RefCell::new(InputHub::new()));
    let events = hub.borrow_mut().subscribe(Box::new(|_: &InputEvent| true));

    let mut selector = RegionSelector::new(DesktopRegionSource::default(), space, excluded_owners);
    if let Err(err) = selector.arm(mode) {
        tracing::warn!(?err, "selector could not be armed");
        on_finish(SelectionFinish::Cancelled);
        return;
    }

    // Selector callbacks fire while the selector is borrowed, so they only record the result.
    let finish = Rc::new(Cell::new(None::<SelectionFinish>));
    {
        let finish = finish.clone();
        selector.on_resolved(move |region| finish.set(Some(SelectionFinish::Resolved(region))));
    }
    {
        let finish = finish.clone();
        selector.on_cancelled(move || finish.set(Some(SelectionFinish::Cancelled)));
    }

    let state = Rc::new(RefCell::new(OverlayState {
        selector,
        events,
        marked: None,
        on_finish: Some(Box::new(on_finish)),
    }));

    let window = ApplicationWindow::new(app);
    window.set_title(Some(OVERLAY_TITLE));
    window.add_css_class("pinshot-overlay");
    window.set_decorated(false);
    window.set_default_size(display.width.round() as i32, display.height.round() as i32);

    let canvas = DrawingArea::new();
    canvas.set_hexpand(true);
    canvas.set_vexpand(true);
    canvas.set_cursor_from_name(Some("crosshair"));
    {
        let state = state.clone();
        let opened_at = Instant::now();
        canvas.set_draw_func(move |_, cr, width, height| {
            let marked = state.try_borrow().ok().and_then(|state| state.marked);
            if let Err(err) = draw_overlay(cr, width, height, marked, pulse_alpha(opened_at.elapsed())) {
                tracing::warn!(?err, "selector overlay draw failed");
            }
        });
    }
    canvas.add_tick_callback(|canvas, _| {
        canvas.queue_draw();
        glib::ControlFlow::Continue
    });
    window.set_child(Some(&canvas));

    let publish: Rc<dyn Fn(InputEvent)> = {
        let hub = hub.clone();
        let state = state.clone();
        let window = window.clone();
        let canvas = canvas.clone();
        let finish = finish.clone();
        Rc::new(move |event| {
            hub.borrow_mut().publish(event);
            pump(&state, &finish, &window, &canvas);
        })
    };

    let last_pointer = Rc::new(Cell::new(None::<Point>));
    let motion = EventControllerMotion::new();
    {
        let publish = publish.clone();
        let last_pointer = last_pointer.clone();
        motion.connect_motion(move |_, x, y| {
            let location = Point::new(x, y);
            last_pointer.set(Some(location));
            publish(InputEvent::PointerMove { location });
        });
    }
    canvas.add_controller(motion);

    if mode == SelectionMode::Element {
        let publish = publish.clone();
        let state = state.clone();
        glib::timeout_add_local(ELEMENT_REFRESH_INTERVAL, move || {
            let finished = state
                .try_borrow()
                .map(|state| state.on_finish.is_none())
                .unwrap_or(false);
            if finished {
                return glib::ControlFlow::Break;
            }
            if let Some(location) = last_pointer.get() {
                publish(InputEvent::PointerMove { location });
            }
            glib::ControlFlow::Continue
        });
    }

    let drag = GestureDrag::new();
    drag.set_button(gdk::BUTTON_PRIMARY);
    {
        let publish = publish.clone();
        drag.connect_drag_begin(move |_, x, y| {
            let location = Point::new(x, y);
            publish(InputEvent::ButtonDown {
                location,
                global: space.point_to_screen(location),
                target: EventTarget::Content,
            });
        });
    }
    {
        let publish = publish.clone();
        drag.connect_drag_update(move |gesture, offset_x, offset_y| {
            let Some((x, y)) = gesture.start_point() else {
                return;
            };
            let location = Point::new(x + offset_x, y + offset_y);
            publish(InputEvent::Drag {
                location,
                global: space.point_to_screen(location),
            });
        });
    }
    {
        let publish = publish.clone();
        drag.connect_drag_end(move |gesture, offset_x, offset_y| {
            let Some((x, y)) = gesture.start_point() else {
                return;
            };
            publish(InputEvent::ButtonUp {
                location: Point::new(x + offset_x, y + offset_y),
            });
        });
    }
    canvas.add_controller(drag);

    let keys = EventControllerKey::new();
    {
        let publish = publish.clone();
        keys.connect_key_pressed(move |_, key, keycode, modifier| {
            let Some(event) = key_event(key, keycode, modifier) else {
                return glib::Propagation::Proceed;
            };
            publish(event);
            glib::Propagation::Stop
        });
    }
    window.add_controller(keys);

    {
        let state = state.clone();
        window.connect_close_request(move |_| {
            // Closing by any other route counts as a cancel.
            let callback = state.try_borrow_mut().ok().and_then(|mut state| state.on_finish.take());
            if let Some(callback) = callback {
                tracing::debug!("selector overlay closed externally");
                callback(SelectionFinish::Cancelled);
            }
            glib::Propagation::Proceed
        });
    }

    window.fullscreen();
    window.present();
    let display_rect = &display;
    tracing::info!(?mode, display = ?display_rect, "selector overlay opened");
}
