pub mod annotation;
pub mod app;
pub mod capture;
pub mod clipboard;
pub mod config;
pub mod error;
pub mod geometry;
pub mod input;
pub mod logging;
pub mod notification;
pub mod ocr;
pub mod pin;
pub mod region;
pub mod registry;
pub mod selector;
pub mod session;
pub mod storage;
pub mod toast;
pub mod update;
pub use error::{AppError, AppResult};

/// Entrypoint used by the CLI binary. `args` is the full argument vector, program name first.
pub fn run(args: Vec<String>) -> AppResult<()> {
    logging::init();
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "starting PinShot");

    let request = app::CaptureRequest::from_args(&args)?;
    tracing::info!(?request, "capture request parsed");
    let app = app::App::new();
    app.start(&args)?;

    tracing::info!(state = ?app.session_state(), "shutdown complete");
    Ok(())
}
