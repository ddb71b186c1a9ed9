use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::sync::mpsc;
use std::time::{Duration, Instant};

use gtk4::prelude::*;
use gtk4::{
    cairo, gdk, gio, glib, Align, Application, ApplicationWindow, Box as GtkBox, Button,
    DrawingArea, EventControllerKey, EventControllerMotion, GestureDrag, Label, Orientation,
    Overlay, PickFlags, PropagationPhase, Revealer, RevealerTransitionType, Scale, ToggleButton,
};

use crate::annotation::{AnnotationLayer, Stroke, STROKE_WIDTH};
use crate::capture::CapturedImage;
use crate::clipboard::PreferredClipboard;
use crate::config::AppConfig;
use crate::geometry::{Color, Point, Size};
use crate::input::{EventTarget, InputEvent, ShortcutAction};
use crate::ocr::{TesseractAnalyzer, TextAnalyzer};
use crate::pin::actions::{self, SAVE_FAILED_MESSAGE};
use crate::pin::{
    initial_pin_size, CursorState, DispatchAction, PinChrome, PinnedWindowModel, MAX_OPACITY,
    MIN_OPACITY,
};
use crate::registry::{PinId, PinRegistry};
use crate::storage;

use super::dropper;
use super::hypr::{self, WindowMover};
use super::input_bridge::{button_down, drag_update, key_event};
use super::runtime_css::swatch_class;
use super::surface::image_surface;
use super::toast::ToastRuntime;
use super::worker::{deliver_on_main_loop, spawn_worker_action};

const UI_TICK_INTERVAL: Duration = Duration::from_millis(100);
const CONTROL_TRANSITION_MS: u32 = 120;
const OPACITY_STEP: f64 = 0.05;

/// Registry entry for one open pinned window.
#[derive(Clone)]
pub(super) struct PinHandle {
    title: Rc<String>,
    toast: ToastRuntime,
}

impl PinHandle {
    pub(super) fn show_toast(&self, message: &str) {
        tracing::debug!(title = %self.title, message, "toast routed to pin");
        self.toast.show(message);
    }
}

pub(super) type SharedPinRegistry = Rc<RefCell<PinRegistry<PinHandle>>>;

#[derive(Clone)]
pub(super) struct PinContext {
    pub(super) app: Application,
    pub(super) config: Rc<AppConfig>,
    pub(super) registry: SharedPinRegistry,
    pub(super) sequence: Rc<Cell<u64>>,
}

#[derive(Clone)]
struct PinWidgets {
    window: ApplicationWindow,
    canvas: DrawingArea,
    controls: Revealer,
    palette: Revealer,
    pen_toggle: ToggleButton,
    swatches: Rc<Vec<Button>>,
    toast: ToastRuntime,
}

impl PinWidgets {
    fn sync_drawing_mode(&self, model: &PinnedWindowModel) {
        let drawing = model.is_drawing();
        if self.pen_toggle.is_active() != drawing {
            self.pen_toggle.set_active(drawing);
        }
        self.palette.set_reveal_child(model.palette_visible());
        self.canvas.queue_draw();
    }

    fn mark_active_swatch(&self, active: Option<usize>) {
        for (index, swatch) in self.swatches.iter().enumerate() {
            if Some(index) == active {
                swatch.add_css_class("active");
            } else {
                swatch.remove_css_class("active");
            }
        }
    }
}

fn icon_button(icon_name: &str, tooltip: &str) -> Button {
    let button = Button::from_icon_name(icon_name);
    button.set_tooltip_text(Some(tooltip));
    button.set_focusable(false);
    button
}

fn is_control(widget: &gtk4::Widget) -> bool {
    widget.is::<Button>()
        || widget.is::<Scale>()
        || widget.ancestor(Button::static_type()).is_some()
        || widget.ancestor(Scale::static_type()).is_some()
}

fn target_at(root: &Overlay, x: f64, y: f64) -> EventTarget {
    match root.pick(x, y, PickFlags::DEFAULT) {
        Some(widget) if is_control(&widget) => EventTarget::Control,
        _ => EventTarget::Content,
    }
}

fn trace_stroke(cr: &cairo::Context, layer: &AnnotationLayer, points: &[Point], view: Size) {
    let mut points = points.iter().map(|point| layer.to_view_point(*point, view));
    let Some(first) = points.next() else {
        return;
    };
    cr.move_to(first.x, first.y);
    // A lone point still gets a round-capped dot.
    cr.line_to(first.x, first.y);
    for point in points {
        cr.line_to(point.x, point.y);
    }
}

fn set_stroke_source(cr: &cairo::Context, color: Color, opacity: f64) {
    let (r, g, b, a) = color.to_f64_rgba();
    cr.set_source_rgba(r, g, b, a * opacity);
}

fn draw_pin(
    cr: &cairo::Context,
    surface: &cairo::ImageSurface,
    model: &PinnedWindowModel,
    width: i32,
    height: i32,
) -> Result<(), cairo::Error> {
    let view = Size::new(f64::from(width), f64::from(height));
    let layer = model.layer();
    let base = layer.base_size();
    let opacity = model.image().opacity();

    let content = layer.content_rect(view);
    if content.width <= 0.0 || content.height <= 0.0 {
        return Ok(());
    }

    cr.save()?;
    cr.translate(content.x, content.y);
    cr.scale(content.width / base.width, content.height / base.height);
    cr.set_source_surface(surface, 0.0, 0.0)?;
    cr.paint_with_alpha(opacity)?;
    cr.restore()?;

    cr.set_line_cap(cairo::LineCap::Round);
    cr.set_line_join(cairo::LineJoin::Round);
    for stroke in layer.strokes() {
        set_stroke_source(cr, stroke.color, opacity);
        cr.set_line_width(layer.view_stroke_width(stroke, view));
        trace_stroke(cr, layer, &stroke.points, view);
        cr.stroke()?;
    }

    if let Some(points) = model.pending_stroke() {
        let pending = Stroke {
            points: Vec::new(),
            color: model.stroke_color(),
            width: STROKE_WIDTH,
        };
        set_stroke_source(cr, pending.color, opacity);
        cr.set_line_width(layer.view_stroke_width(&pending, view));
        trace_stroke(cr, layer, points, view);
        cr.stroke()?;
    }
    Ok(())
}

fn build_controls(model: &Rc<RefCell<PinnedWindowModel>>) -> (Revealer, Button, Scale, Button, ToggleButton) {
    let close_button = icon_button("window-close-symbolic", "Close");
    let opacity_scale =
        Scale::with_range(Orientation::Horizontal, MIN_OPACITY, MAX_OPACITY, OPACITY_STEP);
    opacity_scale.set_value(model.borrow().image().opacity());
    opacity_scale.set_draw_value(false);
    opacity_scale.set_focusable(false);
    opacity_scale.set_tooltip_text(Some("Opacity"));
    let copy_button = icon_button("edit-copy-symbolic", "Copy (Ctrl+C)");
    let pen_toggle = ToggleButton::new();
    pen_toggle.set_icon_name("document-edit-symbolic");
    pen_toggle.set_tooltip_text(Some("Draw (D)"));
    pen_toggle.set_focusable(false);

    let row = GtkBox::new(Orientation::Horizontal, 4);
    row.add_css_class("pin-controls");
    row.append(&close_button);
    row.append(&opacity_scale);
    row.append(&copy_button);
    row.append(&pen_toggle);

    let controls = Revealer::new();
    controls.set_transition_type(RevealerTransitionType::Crossfade);
    controls.set_transition_duration(CONTROL_TRANSITION_MS);
    controls.set_reveal_child(false);
    controls.set_halign(Align::End);
    controls.set_valign(Align::Start);
    controls.set_child(Some(&row));

    (controls, close_button, opacity_scale, copy_button, pen_toggle)
}

fn build_palette(palette_colors: &[Color]) -> (Revealer, Button, Vec<Button>, Button) {
    let undo_button = icon_button("edit-undo-symbolic", "Undo (Ctrl+Z)");
    let row = GtkBox::new(Orientation::Horizontal, 4);
    row.add_css_class("pin-palette");
    row.append(&undo_button);

    let swatches: Vec<Button> = palette_colors
        .iter()
        .enumerate()
        .map(|(index, _)| {
            let swatch = Button::new();
            swatch.add_css_class("pin-swatch");
            swatch.add_css_class(&swatch_class(index));
            swatch.set_focusable(false);
            row.append(&swatch);
            swatch
        })
        .collect();

    let dropper_button = icon_button("color-select-symbolic", "Pick color");
    row.append(&dropper_button);

    let palette = Revealer::new();
    palette.set_transition_type(RevealerTransitionType::SlideUp);
    palette.set_transition_duration(CONTROL_TRANSITION_MS);
    palette.set_reveal_child(false);
    palette.set_halign(Align::Center);
    palette.set_valign(Align::End);
    palette.set_child(Some(&row));

    (palette, undo_button, swatches, dropper_button)
}

fn show_action_toast(widgets: &PinWidgets, message: String) {
    widgets.toast.show(message);
}

fn open_save_dialog(widgets: &PinWidgets, model: &Rc<RefCell<PinnedWindowModel>>, prefix: &str) {
    let filter = gtk4::FileFilter::new();
    filter.set_name(Some("PNG image"));
    filter.add_mime_type("image/png");
    filter.add_suffix("png");
    let filters = gio::ListStore::new::<gtk4::FileFilter>();
    filters.append(&filter);

    let dialog = gtk4::FileDialog::new();
    dialog.set_title("Save Pinned Image");
    dialog.set_modal(true);
    dialog.set_filters(Some(&filters));
    dialog.set_default_filter(Some(&filter));
    dialog.set_initial_name(Some(storage::default_file_name_now(prefix).as_str()));
    match storage::pictures_dir() {
        Ok(dir) => dialog.set_initial_folder(Some(&gio::File::for_path(dir))),
        Err(err) => tracing::debug!(?err, "no pictures directory for save dialog"),
    }

    model.borrow_mut().set_dialog_open(true);
    let widgets_for_result = widgets.clone();
    let model = model.clone();
    dialog.save(
        Some(&widgets.window),
        gio::Cancellable::NONE,
        move |result| {
            model.borrow_mut().set_dialog_open(false);
            let file = match result {
                Ok(file) => file,
                Err(err) => {
                    tracing::debug!(?err, "save dialog dismissed");
                    return;
                }
            };
            let message = match file.path() {
                Some(path) => actions::toast_for(actions::save_to(
                    &model.borrow(),
                    &actions::png_destination(path),
                )),
                None => {
                    tracing::warn!(uri = %file.uri(), "save destination is not a local path");
                    SAVE_FAILED_MESSAGE.to_string()
                }
            };
            show_action_toast(&widgets_for_result, message);
        },
    );
}

fn apply_shortcut(
    action: ShortcutAction,
    widgets: &PinWidgets,
    model: &Rc<RefCell<PinnedWindowModel>>,
    file_name_prefix: &str,
) {
    tracing::debug!(?action, "pin shortcut");
    match action {
        ShortcutAction::PinCopyImage => {
            let message = actions::toast_for(actions::copy_image(
                &model.borrow(),
                &PreferredClipboard::default(),
            ));
            show_action_toast(widgets, message);
        }
        ShortcutAction::PinCopyText => {
            let message = actions::toast_for(actions::copy_text(
                &model.borrow(),
                &PreferredClipboard::default(),
            ));
            show_action_toast(widgets, message);
        }
        ShortcutAction::PinSave => open_save_dialog(widgets, model, file_name_prefix),
        ShortcutAction::PinUndo | ShortcutAction::PinToggleDrawing => {
            widgets.sync_drawing_mode(&model.borrow());
        }
        ShortcutAction::PinClose => widgets.window.close(),
        ShortcutAction::SelectionCancel => {}
    }
}

fn settle_finished_moves(mover: Option<&WindowMover>, model: &mut PinnedWindowModel) {
    let Some(mover) = mover else {
        return;
    };
    for report in mover.finished() {
        if !report.applied {
            tracing::debug!(dx = report.dx, dy = report.dy, "window move not applied");
        }
        model.settle_window_move(report.dx, report.dy, report.applied);
    }
}

fn connect_pointer(
    root: &Overlay,
    widgets: &PinWidgets,
    model: &Rc<RefCell<PinnedWindowModel>>,
    title: &str,
) {
    let mover = hypr::in_hyprland().then(|| Rc::new(WindowMover::spawn(title)));
    let drag = GestureDrag::new();
    drag.set_propagation_phase(PropagationPhase::Capture);
    drag.set_button(gdk::BUTTON_PRIMARY);
    {
        let root_for_pick = root.clone();
        let model = model.clone();
        let widgets = widgets.clone();
        let mover = mover.clone();
        drag.connect_drag_begin(move |gesture, x, y| {
            let target = target_at(&root_for_pick, x, y);
            let action = {
                let mut model = model.borrow_mut();
                settle_finished_moves(mover.as_deref(), &mut model);
                let origin = model.settled_origin();
                model.dispatch(button_down(x, y, origin, target))
            };
            if action == DispatchAction::Forward {
                gesture.set_state(gtk4::EventSequenceState::Denied);
                return;
            }
            gesture.set_state(gtk4::EventSequenceState::Claimed);
            if action == DispatchAction::WindowDragStarted && mover.is_none() {
                begin_native_move(&widgets.window, gesture, x, y);
            }
            if action.needs_redraw() {
                widgets.canvas.queue_draw();
            }
        });
    }
    {
        let model = model.clone();
        let widgets = widgets.clone();
        drag.connect_drag_update(move |gesture, offset_x, offset_y| {
            let Some((start_x, start_y)) = gesture.start_point() else {
                return;
            };
            let mut model = model.borrow_mut();
            // Local coordinates only move once the compositor has applied a move.
            settle_finished_moves(mover.as_deref(), &mut model);
            let origin = model.settled_origin();
            let action = model.dispatch(drag_update(
                Point::new(start_x, start_y),
                offset_x,
                offset_y,
                origin,
            ));
            match action {
                DispatchAction::MoveWindowBy { dx, dy } => {
                    let sent = mover.as_ref().is_some_and(|mover| mover.request(dx, dy));
                    if !sent {
                        model.settle_window_move(dx, dy, false);
                    }
                }
                action if action.needs_redraw() => widgets.canvas.queue_draw(),
                _ => {}
            }
        });
    }
    {
        let model = model.clone();
        let widgets = widgets.clone();
        drag.connect_drag_end(move |gesture, offset_x, offset_y| {
            let location = gesture
                .start_point()
                .map(|(x, y)| Point::new(x + offset_x, y + offset_y))
                .unwrap_or_default();
            let action = model
                .borrow_mut()
                .dispatch(InputEvent::ButtonUp { location });
            if action.needs_redraw() {
                widgets.canvas.queue_draw();
            }
        });
    }
    root.add_controller(drag);
}

fn begin_native_move(window: &ApplicationWindow, gesture: &GestureDrag, x: f64, y: f64) {
    let Some(toplevel) = window.surface().and_downcast::<gdk::Toplevel>() else {
        return;
    };
    let Some(device) = gesture.device() else {
        return;
    };
    toplevel.begin_move(
        &device,
        gesture.current_button() as i32,
        x,
        y,
        gesture.current_event_time(),
    );
}

fn connect_hover(
    root: &Overlay,
    widgets: &PinWidgets,
    model: &Rc<RefCell<PinnedWindowModel>>,
    chrome: &Rc<RefCell<PinChrome>>,
) {
    let motion = EventControllerMotion::new();
    {
        let chrome = chrome.clone();
        let controls = widgets.controls.clone();
        motion.connect_enter(move |_, _, _| {
            chrome.borrow_mut().hover_enter();
            controls.set_reveal_child(true);
        });
    }
    {
        let chrome = chrome.clone();
        motion.connect_leave(move |_| {
            chrome.borrow_mut().hover_exit(Instant::now());
        });
    }
    {
        let model = model.clone();
        let root_for_cursor = root.clone();
        motion.connect_motion(move |_, x, y| {
            let action = model.borrow_mut().dispatch(InputEvent::PointerMove {
                location: Point::new(x, y),
            });
            if let DispatchAction::CursorChanged(cursor) = action {
                let name = match cursor {
                    CursorState::TextCaret => Some("text"),
                    CursorState::Default => None,
                };
                root_for_cursor.set_cursor_from_name(name);
            }
        });
    }
    root.add_controller(motion);

    let window = widgets.window.downgrade();
    let controls = widgets.controls.clone();
    let chrome = chrome.clone();
    glib::timeout_add_local(UI_TICK_INTERVAL, move || {
        if window.upgrade().is_none() {
            return glib::ControlFlow::Break;
        }
        if chrome
            .borrow_mut()
            .update_hover_controls_visibility(Instant::now())
        {
            controls.set_reveal_child(false);
        }
        glib::ControlFlow::Continue
    });
}

fn connect_keys(
    widgets: &PinWidgets,
    model: &Rc<RefCell<PinnedWindowModel>>,
    file_name_prefix: &Rc<String>,
) {
    let keys = EventControllerKey::new();
    let widgets_for_keys = widgets.clone();
    let model = model.clone();
    let file_name_prefix = file_name_prefix.clone();
    keys.connect_key_pressed(move |_, key, keycode, modifier| {
        let Some(event) = key_event(key, keycode, modifier) else {
            return glib::Propagation::Proceed;
        };
        let action = model.borrow_mut().dispatch(event);
        match action {
            DispatchAction::Shortcut(shortcut) => {
                apply_shortcut(shortcut, &widgets_for_keys, &model, &file_name_prefix);
                glib::Propagation::Stop
            }
            _ => glib::Propagation::Proceed,
        }
    });
    widgets.window.add_controller(keys);
}

fn connect_controls(
    widgets: &PinWidgets,
    model: &Rc<RefCell<PinnedWindowModel>>,
    controls: (&Button, &Scale, &Button),
    palette: (&Button, &Button),
    palette_colors: &[Color],
) {
    let (close_button, opacity_scale, copy_button) = controls;
    let (undo_button, dropper_button) = palette;

    let window = widgets.window.clone();
    close_button.connect_clicked(move |_| window.close());

    {
        let model = model.clone();
        let canvas = widgets.canvas.clone();
        opacity_scale.connect_value_changed(move |scale| {
            model.borrow_mut().set_opacity(scale.value());
            canvas.queue_draw();
        });
    }
    {
        let model = model.clone();
        let widgets_for_copy = widgets.clone();
        copy_button.connect_clicked(move |_| {
            apply_shortcut(ShortcutAction::PinCopyImage, &widgets_for_copy, &model, "");
        });
    }
    {
        let model = model.clone();
        let widgets_for_toggle = widgets.clone();
        widgets.pen_toggle.connect_toggled(move |button| {
            if button.is_active() == model.borrow().is_drawing() {
                return;
            }
            model.borrow_mut().toggle_drawing();
            widgets_for_toggle.sync_drawing_mode(&model.borrow());
        });
    }
    {
        let model = model.clone();
        let canvas = widgets.canvas.clone();
        undo_button.connect_clicked(move |_| {
            if model.borrow_mut().undo() {
                canvas.queue_draw();
            }
        });
    }
    for (index, (swatch, color)) in widgets.swatches.iter().zip(palette_colors).enumerate() {
        let model = model.clone();
        let widgets_for_swatch = widgets.clone();
        let color = *color;
        swatch.connect_clicked(move |_| {
            model.borrow_mut().set_stroke_color(color);
            widgets_for_swatch.mark_active_swatch(Some(index));
        });
    }
    {
        let model = model.clone();
        let widgets_for_dropper = widgets.clone();
        dropper_button.connect_clicked(move |_| {
            let model = model.clone();
            let widgets = widgets_for_dropper.clone();
            spawn_worker_action(dropper::pick_color, move |picked| {
                if let Some(color) = picked {
                    model.borrow_mut().set_stroke_color(color);
                    widgets.mark_active_swatch(None);
                }
            });
        });
    }
}

fn start_text_analysis(
    id: PinId,
    registry: &SharedPinRegistry,
    model: &Rc<RefCell<PinnedWindowModel>>,
    language: Option<&str>,
) {
    let analyzer = TesseractAnalyzer::new(language);
    let bitmap = model.borrow().image().bitmap().clone();
    let registry = registry.clone();
    let model = model.clone();
    spawn_worker_action(
        move || analyzer.analyze(&bitmap),
        move |result| {
            if !registry.borrow().contains(id) {
                tracing::debug!(?id, "pin closed before text analysis finished");
                return;
            }
            match result {
                Ok(regions) => model.borrow_mut().apply_text_regions(regions),
                Err(err) => tracing::warn!(?err, "text analysis failed"),
            }
        },
    );
}

/// Opens a pinned window for `captured` and registers it. Returns `None` when
/// the bitmap cannot be turned into a drawable surface.
pub(super) fn open_pinned_window(context: &PinContext, captured: CapturedImage) -> Option<PinId> {
    let CapturedImage { bitmap, provenance } = captured;
    let surface = match image_surface(&bitmap) {
        Ok(surface) => surface,
        Err(err) => {
            tracing::error!(?err, "failed to build pin surface");
            return None;
        }
    };
    let size = initial_pin_size(bitmap.width(), bitmap.height());
    let palette_colors = context.config.palette();
    let model = Rc::new(RefCell::new(PinnedWindowModel::new(
        bitmap,
        context.config.default_stroke_color(),
    )));
    {
        let mut model = model.borrow_mut();
        model.set_view_size(size);
        if let Some(rect) = provenance {
            model.set_window_origin(Point::new(rect.x, rect.y));
        }
    }
    let chrome = Rc::new(RefCell::new(PinChrome::default()));

    let sequence = context.sequence.get().saturating_add(1);
    context.sequence.set(sequence);
    let title = Rc::new(format!("PinShot Pin {sequence}"));

    let window = ApplicationWindow::new(&context.app);
    window.set_title(Some(title.as_str()));
    window.add_css_class("pinshot-pin");
    window.set_decorated(false);
    window.set_default_size(size.width.round() as i32, size.height.round() as i32);

    let canvas = DrawingArea::new();
    canvas.add_css_class("pin-surface");
    canvas.set_hexpand(true);
    canvas.set_vexpand(true);
    {
        let model = model.clone();
        canvas.set_draw_func(move |_, cr, width, height| {
            if let Err(err) = draw_pin(cr, &surface, &model.borrow(), width, height) {
                tracing::warn!(?err, "pin draw failed");
            }
        });
    }
    {
        let model = model.clone();
        canvas.connect_resize(move |_, width, height| {
            model
                .borrow_mut()
                .set_view_size(Size::new(f64::from(width), f64::from(height)));
        });
    }

    let (controls, close_button, opacity_scale, copy_button, pen_toggle) = build_controls(&model);
    let (palette, undo_button, swatches, dropper_button) = build_palette(&palette_colors);
    let toast_label = Label::new(None);
    toast_label.add_css_class("toast-badge");
    toast_label.set_halign(Align::Center);
    toast_label.set_valign(Align::Center);
    toast_label.set_can_target(false);

    let root = Overlay::new();
    root.set_child(Some(&canvas));
    root.add_overlay(&controls);
    root.add_overlay(&palette);
    root.add_overlay(&toast_label);
    window.set_child(Some(&root));

    let widgets = PinWidgets {
        window: window.clone(),
        canvas,
        controls,
        palette,
        pen_toggle,
        swatches: Rc::new(swatches),
        toast: ToastRuntime::new(&toast_label),
    };
    widgets.mark_active_swatch(Some(0));

    let file_name_prefix = Rc::new(context.config.file_name_prefix.clone());
    connect_pointer(&root, &widgets, &model, &title);
    connect_hover(&root, &widgets, &model, &chrome);
    connect_keys(&widgets, &model, &file_name_prefix);
    connect_controls(
        &widgets,
        &model,
        (&close_button, &opacity_scale, &copy_button),
        (&undo_button, &dropper_button),
        &palette_colors,
    );

    let id = context.registry.borrow_mut().register(PinHandle {
        title: title.clone(),
        toast: widgets.toast.clone(),
    });
    {
        let registry = context.registry.clone();
        window.connect_close_request(move |_| {
            registry.borrow_mut().unregister(id);
            tracing::info!(?id, "pinned window closed");
            glib::Propagation::Proceed
        });
    }

    window.present();
    tracing::info!(?id, title = %title, width = size.width, height = size.height, "pinned window opened");

    let (origin_tx, origin_rx) = mpsc::channel();
    hypr::request_pinned_window_setup(
        &title,
        size,
        provenance.map(|rect| Point::new(rect.x, rect.y)),
        move |origin| {
            let _ = origin_tx.send(origin);
        },
    );
    {
        let model = model.clone();
        deliver_on_main_loop(origin_rx, move |origin| {
            tracing::debug!(?origin, "pinned window origin reported");
            model.borrow_mut().set_window_origin(origin);
        });
    }

    start_text_analysis(id, &context.registry, &model, context.config.ocr_language.as_deref());
    Some(id)
}
