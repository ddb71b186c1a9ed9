//! GTK4 runtime. Translates toolkit events into the core's typed events and
//! applies whatever the core decides: selector overlay, pinned windows, toasts.

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::Duration;

use gtk4::prelude::*;
use gtk4::{gio, glib, Application};

use crate::capture::{CaptureService, ToolBackend};
use crate::clipboard::{ClipboardBackend, WlCopyBackend};
use crate::config::{load_app_config, AppConfig, UpdateCheckConfig, APP_ID};
use crate::error::{AppError, AppResult};
use crate::geometry::Rect;
use crate::notification;
use crate::registry::{PinRegistry, ToastTarget};
use crate::selector::SelectionMode;
use crate::session::{CaptureSession, SessionEvent, SessionState};
use crate::storage::{prune_stale_temp_files, STALE_TEMP_MAX_AGE_HOURS};
use crate::update::{prompt_upgrade, run_update_check, HttpReleaseSource};

mod dropper;
mod hypr;
mod input_bridge;
mod layout;
mod pinned_window;
mod runtime_css;
mod selector_overlay;
mod surface;
mod toast;
mod worker;

use self::pinned_window::{open_pinned_window, PinContext};
use self::selector_overlay::{open_selector_overlay, SelectionFinish};
use self::toast::show_standalone_toast;
use self::worker::deliver_on_main_loop;

// Gives the compositor time to unmap the overlay before the screen is grabbed.
const OVERLAY_TEARDOWN_DELAY: Duration = Duration::from_millis(150);
const BUSY_MESSAGE: &str = "Capture already in progress";
const INTERACTIVE_MODE: &str = "interactive";

/// What one invocation asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureRequest {
    Interactive,
    Select(SelectionMode),
}

impl CaptureRequest {
    pub fn parse(mode: Option<&str>) -> AppResult<Self> {
        let Some(mode) = mode.map(str::trim).filter(|mode| !mode.is_empty()) else {
            return Ok(Self::Interactive);
        };
        if mode.eq_ignore_ascii_case(INTERACTIVE_MODE) {
            return Ok(Self::Interactive);
        }
        SelectionMode::parse(mode)
            .map(Self::Select)
            .ok_or_else(|| AppError::UnknownMode(mode.to_string()))
    }

    /// Reads the mode from a full argument vector, program name first.
    pub fn from_args<I, S>(args: I) -> AppResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mode = args.into_iter().nth(1);
        Self::parse(mode.as_ref().map(AsRef::as_ref))
    }

    fn session_event(self) -> SessionEvent {
        match self {
            Self::Interactive => SessionEvent::BeginInteractiveCapture,
            Self::Select(mode) => SessionEvent::BeginSelection(mode),
        }
    }
}

#[derive(Clone)]
struct Runtime {
    app: Application,
    config: Rc<AppConfig>,
    session: Rc<RefCell<CaptureSession>>,
    capture: CaptureService<ToolBackend>,
    pins: PinContext,
}

impl Runtime {
    fn new(app: &Application, config: AppConfig, session: Rc<RefCell<CaptureSession>>) -> Self {
        let config = Rc::new(config);
        Self {
            app: app.clone(),
            capture: CaptureService::new(ToolBackend::from_tool(config.capture_tool)),
            session,
            pins: PinContext {
                app: app.clone(),
                config: config.clone(),
                registry: Rc::new(RefCell::new(PinRegistry::new())),
                sequence: Rc::new(Cell::new(0)),
            },
            config,
        }
    }

    fn begin(&self, request: CaptureRequest) {
        if let Err(err) = self.session.borrow_mut().transition(request.session_event()) {
            tracing::info!(?err, ?request, "ignoring capture trigger while a session is live");
            self.broadcast_toast(BUSY_MESSAGE);
            return;
        }
        tracing::info!(?request, "capture session started");
        match request {
            CaptureRequest::Interactive => self.capture_region(None),
            CaptureRequest::Select(mode) => self.select(mode),
        }
    }

    fn select(&self, mode: SelectionMode) {
        let runtime = self.clone();
        open_selector_overlay(
            &self.app,
            mode,
            self.config.excluded_window_owners.clone(),
            move |finish| runtime.finish_selection(finish),
        );
    }

    fn finish_selection(&self, finish: SelectionFinish) {
        match finish {
            SelectionFinish::Resolved(region) => {
                self.transition(SessionEvent::SelectionResolved);
                let hold = hold_app(&self.app);
                let runtime = self.clone();
                glib::timeout_add_local_once(OVERLAY_TEARDOWN_DELAY, move || {
                    let _hold = hold;
                    runtime.capture_region(Some(region.rect));
                });
            }
            SelectionFinish::Cancelled => self.transition(SessionEvent::SelectionCancelled),
        }
    }

    fn capture_region(&self, rect: Option<Rect>) {
        let hold = hold_app(&self.app);
        let results = self.capture.capture_in_background(rect);
        let runtime = self.clone();
        deliver_on_main_loop(results, move |result| {
            let _hold = hold;
            runtime.transition(SessionEvent::CaptureFinished);
            match result {
                Ok(captured) => {
                    open_pinned_window(&runtime.pins, captured);
                }
                Err(err) => tracing::warn!(?err, "capture abandoned"),
            }
        });
    }

    fn transition(&self, event: SessionEvent) {
        if let Err(err) = self.session.borrow_mut().transition(event) {
            tracing::warn!(?err, "unexpected session transition");
        }
    }

    fn broadcast_toast(&self, message: &str) {
        let registry = self.pins.registry.borrow();
        match registry.broadcast_toast(message) {
            ToastTarget::Pin(id) => {
                if let Some(pin) = registry.get(id) {
                    pin.show_toast(message);
                }
            }
            ToastTarget::Standalone => show_standalone_toast(&self.app, message),
        }
    }
}

fn hold_app(app: &Application) -> gio::ApplicationHoldGuard {
    <Application as gio::prelude::ApplicationExtManual>::hold(app)
}

fn prune_stale_capture_temp_files() {
    match prune_stale_temp_files(STALE_TEMP_MAX_AGE_HOURS) {
        Ok(report) if report.removed_files > 0 => {
            tracing::info!(
                removed_files = report.removed_files,
                "pruned stale capture temp files"
            );
        }
        Ok(_) => {}
        Err(err) => {
            tracing::warn!(
                max_age_hours = STALE_TEMP_MAX_AGE_HOURS,
                ?err,
                "failed to prune stale capture temp files"
            );
        }
    }
}

fn update_check_interval(config: &UpdateCheckConfig) -> Duration {
    Duration::from_secs(config.interval_hours.max(1).saturating_mul(60 * 60))
}

fn spawn_update_checks(config: UpdateCheckConfig) {
    if !config.enabled {
        tracing::debug!("update check disabled");
        return;
    }
    let source = match HttpReleaseSource::new(config.endpoint.clone()) {
        Ok(source) => source,
        Err(err) => {
            tracing::warn!(?err, "update check unavailable");
            return;
        }
    };
    std::thread::spawn(move || {
        loop {
            if let Some(release) = run_update_check(&source, env!("CARGO_PKG_VERSION")) {
                if prompt_upgrade(&release, &config) {
                    if let Err(err) = WlCopyBackend.copy_text(&config.upgrade_command) {
                        tracing::warn!(?err, "failed to copy upgrade command");
                        notification::send(
                            "Update available",
                            format!("Upgrade with: {}", config.upgrade_command),
                        );
                    }
                }
            }
            std::thread::sleep(update_check_interval(&config));
        }
    });
}

#[derive(Default)]
pub struct App {
    session: Rc<RefCell<CaptureSession>>,
}

impl App {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn session_state(&self) -> SessionState {
        self.session.borrow().state()
    }

    /// Runs the GTK application until the last window closes. A second
    /// invocation forwards its command line here and starts another session.
    pub fn start(&self, args: &[String]) -> AppResult<()> {
        tracing::info!("starting gtk runtime");
        let application = Application::new(Some(APP_ID), gio::ApplicationFlags::HANDLES_COMMAND_LINE);
        let runtime = Rc::new(RefCell::new(None::<Runtime>));

        {
            let runtime = runtime.clone();
            let session = self.session.clone();
            application.connect_startup(move |app| {
                prune_stale_capture_temp_files();
                let config = load_app_config();
                tracing::info!(
                    capture_tool = ?config.capture_tool,
                    palette = config.stroke_palette.len(),
                    "loaded app config"
                );
                let swatches: String = config
                    .palette()
                    .into_iter()
                    .enumerate()
                    .map(|(index, color)| runtime_css::swatch_css(index, color))
                    .collect();
                runtime_css::install_runtime_css(&swatches);
                spawn_update_checks(config.update_check.clone());
                runtime
                    .borrow_mut()
                    .replace(Runtime::new(app, config, session.clone()));
            });
        }

        application.connect_command_line(move |_, command_line| {
            let args: Vec<String> = command_line
                .arguments()
                .into_iter()
                .map(|arg| arg.to_string_lossy().into_owned())
                .collect();
            let request = match CaptureRequest::from_args(&args) {
                Ok(request) => request,
                Err(err) => {
                    tracing::warn!(?err, "rejecting command line");
                    return glib::ExitCode::FAILURE;
                }
            };
            let runtime = runtime.borrow().clone();
            match runtime {
                Some(runtime) => runtime.begin(request),
                None => tracing::error!("command line received before startup"),
            }
            glib::ExitCode::SUCCESS
        });

        let status = application.run_with_args(args);
        if status != glib::ExitCode::SUCCESS {
            return Err(AppError::Exit(i32::from(status)));
        }
        tracing::info!("gtk runtime exited");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(values: &[&str]) -> Vec<String> {
        values.iter().map(|value| value.to_string()).collect()
    }

    #[test]
    fn missing_mode_defaults_to_interactive() {
        assert_eq!(
            CaptureRequest::from_args(args(&["pinshot"])).unwrap(),
            CaptureRequest::Interactive
        );
        assert_eq!(
            CaptureRequest::from_args(args(&["pinshot", "Interactive"])).unwrap(),
            CaptureRequest::Interactive
        );
    }

    #[test]
    fn selection_modes_parse_case_insensitively() {
        assert_eq!(
            CaptureRequest::from_args(args(&["pinshot", "window"])).unwrap(),
            CaptureRequest::Select(SelectionMode::Window)
        );
        assert_eq!(
            CaptureRequest::parse(Some("ELEMENT")).unwrap(),
            CaptureRequest::Select(SelectionMode::Element)
        );
        assert_eq!(
            CaptureRequest::parse(Some(" area ")).unwrap(),
            CaptureRequest::Select(SelectionMode::Area)
        );
    }

    #[test]
    fn new_app_starts_with_an_idle_session() {
        assert_eq!(App::new().session_state(), SessionState::Idle);
    }

    #[test]
    fn unknown_mode_is_rejected() {
        let err = CaptureRequest::from_args(args(&["pinshot", "fullscreen"])).unwrap_err();
        assert!(matches!(err, AppError::UnknownMode(ref mode) if mode == "fullscreen"));
    }

    #[test]
    fn requests_map_to_session_events() {
        assert_eq!(
            CaptureRequest::Interactive.session_event(),
            SessionEvent::BeginInteractiveCapture
        );
        assert_eq!(
            CaptureRequest::Select(SelectionMode::Area).session_event(),
            SessionEvent::BeginSelection(SelectionMode::Area)
        );
    }

    #[test]
    fn update_interval_never_drops_below_an_hour() {
        let mut config = UpdateCheckConfig::default();
        assert_eq!(update_check_interval(&config), Duration::from_secs(24 * 60 * 60));
        config.interval_hours = 0;
        assert_eq!(update_check_interval(&config), Duration::from_secs(60 * 60));
    }
}
