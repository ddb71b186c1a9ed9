use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::mpsc::{self, Receiver};

use image::RgbaImage;
use thiserror::Error;

use crate::config::CaptureTool;
use crate::geometry::{PixelRect, Rect};
use crate::storage::{self, StorageError};

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("capture failed: {message}")]
    CaptureFailed { message: String },
    #[error("captured image could not be decoded: {message}")]
    DecodeFailed { message: String },
    #[error("command io error: {command}")]
    CommandIo {
        command: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid capture selection: {message}")]
    InvalidSelection { message: String },
    #[error("failed to prepare capture directory: {0}")]
    TempDirectory(#[from] StorageError),
}

pub type CaptureResult<T> = std::result::Result<T, CaptureError>;

/// A decoded capture and the screen rectangle it came from, when known.
#[derive(Debug, Clone, PartialEq)]
pub struct CapturedImage {
    pub bitmap: RgbaImage,
    pub provenance: Option<Rect>,
}

/// External screenshot tool. Both calls block until the tool exits and leave a
/// PNG at `output` on success.
pub trait CaptureBackend {
    /// Lets the tool prompt for a region. Returns the region when the tool reports it.
    fn run_interactive(&self, output: &Path) -> CaptureResult<Option<PixelRect>>;
    fn run_bounded(&self, rect: PixelRect, output: &Path) -> CaptureResult<()>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct GrimBackend;

impl CaptureBackend for GrimBackend {
    fn run_interactive(&self, output: &Path) -> CaptureResult<Option<PixelRect>> {
        let geometry = run_command_output("slurp", &[])?;
        let geometry = geometry.trim();
        let selection = parse_region_selection(geometry)?;
        run_command_status("grim", &["-g", geometry], output)?;
        Ok(Some(selection))
    }

    fn run_bounded(&self, rect: PixelRect, output: &Path) -> CaptureResult<()> {
        run_command_status("grim", &["-g", &format_grim_geometry(rect)], output)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ScreencaptureBackend;

impl CaptureBackend for ScreencaptureBackend {
    fn run_interactive(&self, output: &Path) -> CaptureResult<Option<PixelRect>> {
        run_command_status("screencapture", &["-i"], output)?;
        Ok(None)
    }

    fn run_bounded(&self, rect: PixelRect, output: &Path) -> CaptureResult<()> {
        run_command_status(
            "screencapture",
            &["-x", "-R", &format_screencapture_rect(rect)],
            output,
        )
    }
}

/// Backend chosen from configuration.
#[derive(Debug, Clone, Copy)]
pub enum ToolBackend {
    Grim(GrimBackend),
    Screencapture(ScreencaptureBackend),
}

impl ToolBackend {
    pub fn from_tool(tool: CaptureTool) -> Self {
        match tool {
            CaptureTool::Grim => Self::Grim(GrimBackend),
            CaptureTool::Screencapture => Self::Screencapture(ScreencaptureBackend),
        }
    }
}

impl CaptureBackend for ToolBackend {
    fn run_interactive(&self, output: &Path) -> CaptureResult<Option<PixelRect>> {
        match self {
            Self::Grim(backend) => backend.run_interactive(output),
            Self::Screencapture(backend) => backend.run_interactive(output),
        }
    }

    fn run_bounded(&self, rect: PixelRect, output: &Path) -> CaptureResult<()> {
        match self {
            Self::Grim(backend) => backend.run_bounded(rect, output),
            Self::Screencapture(backend) => backend.run_bounded(rect, output),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CaptureService<B> {
    backend: B,
    temp_dir: PathBuf,
}

impl<B: CaptureBackend> CaptureService<B> {
    pub fn new(backend: B) -> Self {
        Self::with_temp_dir(backend, storage::default_runtime_temp_dir())
    }

    pub fn with_temp_dir(backend: B, temp_dir: PathBuf) -> Self {
        Self { backend, temp_dir }
    }

    /// Interactive capture when `rect` is `None`, otherwise exactly `rect` in screen space.
    pub fn capture(&self, rect: Option<Rect>) -> CaptureResult<CapturedImage> {
        std::fs::create_dir_all(&self.temp_dir).map_err(StorageError::from)?;
        let label = if rect.is_some() { "bounded" } else { "interactive" };
        let output = storage::temp_capture_path_in(&self.temp_dir, label);

        let provenance = match rect {
            Some(rect) => {
                let pixels = rect.to_pixels();
                if pixels.width == 0 || pixels.height == 0 {
                    return Err(CaptureError::InvalidSelection {
                        message: format!("selection must be positive, got {rect:?}"),
                    });
                }
                self.run_tool(&output, |output| self.backend.run_bounded(pixels, output))?;
                Some(rect)
            }
            None => self
                .run_tool(&output, |output| self.backend.run_interactive(output))?
                .map(pixel_rect_to_rect),
        };

        if !output.exists() {
            return Err(CaptureError::CaptureFailed {
                message: format!("no output at {}", output.display()),
            });
        }

        let decoded = image::open(&output);
        cleanup_temp_capture_file(&output, "capture load");
        let bitmap = decoded
            .map_err(|err| CaptureError::DecodeFailed {
                message: err.to_string(),
            })?
            .to_rgba8();

        tracing::info!(
            width = bitmap.width(),
            height = bitmap.height(),
            ?provenance,
            "capture loaded"
        );
        Ok(CapturedImage { bitmap, provenance })
    }

    fn run_tool<T>(
        &self,
        output: &Path,
        run: impl FnOnce(&Path) -> CaptureResult<T>,
    ) -> CaptureResult<T> {
        run(output).map_err(|err| {
            cleanup_temp_capture_file(output, "capture command failure");
            match err {
                CaptureError::CommandIo { command, source } => CaptureError::CaptureFailed {
                    message: format!("{command}: {source}"),
                },
                other => other,
            }
        })
    }
}

impl<B: CaptureBackend + Clone + Send + 'static> CaptureService<B> {
    /// Runs [`CaptureService::capture`] on a worker thread. The receiver yields exactly one result.
    pub fn capture_in_background(&self, rect: Option<Rect>) -> Receiver<CaptureResult<CapturedImage>> {
        let (tx, rx) = mpsc::channel();
        let service = self.clone();
        std::thread::spawn(move || {
            let _ = tx.send(service.capture(rect));
        });
        rx
    }
}

fn pixel_rect_to_rect(rect: PixelRect) -> Rect {
    Rect::new(
        f64::from(rect.x),
        f64::from(rect.y),
        f64::from(rect.width),
        f64::from(rect.height),
    )
}

/// `x,y wxh`, the geometry format shared by slurp and grim.
pub fn format_grim_geometry(rect: PixelRect) -> String {
    format!("{},{} {}x{}", rect.x, rect.y, rect.width, rect.height)
}

pub fn format_screencapture_rect(rect: PixelRect) -> String {
    format!("{},{},{},{}", rect.x, rect.y, rect.width, rect.height)
}

fn parse_region_selection(geometry: &str) -> CaptureResult<PixelRect> {
    let invalid = |message: String| CaptureError::InvalidSelection { message };

    let mut parts = geometry.split_whitespace();
    let (Some(position), Some(size), None) = (parts.next(), parts.next(), parts.next()) else {
        return Err(invalid(format!("invalid region geometry: {geometry}")));
    };
    let Some((x, y)) = position.split_once(',') else {
        return Err(invalid(format!("invalid region position: {position}")));
    };
    let Some((width, height)) = size.split_once('x') else {
        return Err(invalid(format!("invalid region size: {size}")));
    };

    let x = x
        .parse::<i32>()
        .map_err(|err| invalid(format!("invalid x coordinate '{x}': {err}")))?;
    let y = y
        .parse::<i32>()
        .map_err(|err| invalid(format!("invalid y coordinate '{y}': {err}")))?;
    let width = width
        .parse::<u32>()
        .map_err(|err| invalid(format!("invalid width '{width}': {err}")))?;
    let height = height
        .parse::<u32>()
        .map_err(|err| invalid(format!("invalid height '{height}': {err}")))?;
    if width == 0 || height == 0 {
        return Err(invalid(format!(
            "selection must be positive, got {width}x{height}"
        )));
    }

    Ok(PixelRect {
        x,
        y,
        width,
        height,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TempCaptureCleanupOutcome {
    Removed,
    NotFound,
    Failed,
}

fn cleanup_temp_capture_file(temp_path: &Path, stage: &str) -> TempCaptureCleanupOutcome {
    cleanup_temp_capture_file_with(temp_path, stage, |path| std::fs::remove_file(path))
}

fn cleanup_temp_capture_file_with<F>(
    temp_path: &Path,
    stage: &str,
    remove_file: F,
) -> TempCaptureCleanupOutcome
where
    F: FnOnce(&Path) -> std::io::Result<()>,
{
    match remove_file(temp_path) {
        Ok(()) => TempCaptureCleanupOutcome::Removed,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!(stage, path = %temp_path.display(), "no temporary capture file to remove");
            TempCaptureCleanupOutcome::NotFound
        }
        Err(err) => {
            tracing::warn!(
                stage,
                path = %temp_path.display(),
                ?err,
                "failed to cleanup temporary capture file"
            );
            TempCaptureCleanupOutcome::Failed
        }
    }
}

fn run_command_output(command: &str, args: &[&str]) -> CaptureResult<String> {
    let output = Command::new(command)
        .args(args)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .map_err(|source| CaptureError::CommandIo {
            command: command.to_string(),
            source,
        })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(CaptureError::CaptureFailed {
            message: format!("{command} exit status: {}; stderr: {}", output.status, stderr.trim()),
        });
    }

    let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
    if stdout.trim().is_empty() {
        return Err(CaptureError::CaptureFailed {
            message: format!("{command} produced no output"),
        });
    }
    Ok(stdout)
}

fn run_command_status(command: &str, args: &[&str], output: &Path) -> CaptureResult<()> {
    tracing::debug!(command, ?args, output = %output.display(), "running capture tool");
    let status = Command::new(command)
        .args(args)
        .arg(output)
        .status()
        .map_err(|source| CaptureError::CommandIo {
            command: command.to_string(),
            source,
        })?;

    if status.success() {
        Ok(())
    } else {
        Err(CaptureError::CaptureFailed {
            message: format!("{command} exited with status: {status}"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;
    use std::cell::RefCell;

    #[derive(Clone, Copy)]
    enum Output {
        Png,
        Garbage,
        Missing,
        ToolFails,
    }

    struct FakeCaptureBackend {
        output: Output,
        reported: Option<PixelRect>,
        calls: RefCell<Vec<String>>,
    }

    impl FakeCaptureBackend {
        fn new(output: Output) -> Self {
            Self {
                output,
                reported: None,
                calls: RefCell::new(Vec::new()),
            }
        }

        fn produce(&self, output: &Path) -> CaptureResult<()> {
            match self.output {
                Output::Png => {
                    RgbaImage::from_pixel(6, 4, Rgba([10, 20, 30, 255]))
                        .save(output)
                        .unwrap();
                    Ok(())
                }
                Output::Garbage => {
                    std::fs::write(output, b"not a png").unwrap();
                    Ok(())
                }
                Output::Missing => Ok(()),
                Output::ToolFails => {
                    std::fs::write(output, b"partial").unwrap();
                    Err(CaptureError::CommandIo {
                        command: "fake".to_string(),
                        source: std::io::Error::other("boom"),
                    })
                }
            }
        }
    }

    impl CaptureBackend for FakeCaptureBackend {
        fn run_interactive(&self, output: &Path) -> CaptureResult<Option<PixelRect>> {
            self.calls.borrow_mut().push("interactive".to_string());
            self.produce(output)?;
            Ok(self.reported)
        }

        fn run_bounded(&self, rect: PixelRect, output: &Path) -> CaptureResult<()> {
            self.calls
                .borrow_mut()
                .push(format!("bounded {}", format_screencapture_rect(rect)));
            self.produce(output)
        }
    }

    fn service(output: Output, dir: &tempfile::TempDir) -> CaptureService<FakeCaptureBackend> {
        CaptureService::with_temp_dir(FakeCaptureBackend::new(output), dir.path().to_path_buf())
    }

    fn leftover_files(dir: &tempfile::TempDir) -> usize {
        std::fs::read_dir(dir.path()).unwrap().count()
    }

    #[test]
    fn bounded_capture_loads_bitmap_and_removes_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let service = service(Output::Png, &dir);
        let rect = Rect::new(10.0, 20.0, 6.0, 4.0);

        let captured = service.capture(Some(rect)).expect("capture succeeds");
        assert_eq!(captured.bitmap.dimensions(), (6, 4));
        assert_eq!(captured.provenance, Some(rect));
        assert_eq!(
            service.backend.calls.borrow().as_slice(),
            ["bounded 10,20,6,4".to_string()]
        );
        assert_eq!(leftover_files(&dir), 0);
    }

    #[test]
    fn interactive_capture_uses_reported_region() {
        let dir = tempfile::tempdir().unwrap();
        let mut backend = FakeCaptureBackend::new(Output::Png);
        backend.reported = Some(PixelRect {
            x: 1,
            y: 2,
            width: 6,
            height: 4,
        });
        let service = CaptureService::with_temp_dir(backend, dir.path().to_path_buf());

        let captured = service.capture(None).unwrap();
        assert_eq!(captured.provenance, Some(Rect::new(1.0, 2.0, 6.0, 4.0)));
        assert_eq!(
            service.backend.calls.borrow().as_slice(),
            ["interactive".to_string()]
        );
    }

    #[test]
    fn missing_output_is_capture_failed() {
        let dir = tempfile::tempdir().unwrap();
        let err = service(Output::Missing, &dir).capture(None).unwrap_err();
        assert!(matches!(err, CaptureError::CaptureFailed { .. }));
    }

    #[test]
    fn undecodable_output_is_decode_failed_and_cleaned_up() {
        let dir = tempfile::tempdir().unwrap();
        let err = service(Output::Garbage, &dir)
            .capture(Some(Rect::new(0.0, 0.0, 5.0, 5.0)))
            .unwrap_err();
        assert!(matches!(err, CaptureError::DecodeFailed { .. }));
        assert_eq!(leftover_files(&dir), 0);
    }

    #[test]
    fn tool_failure_is_capture_failed_and_cleaned_up() {
        let dir = tempfile::tempdir().unwrap();
        let err = service(Output::ToolFails, &dir).capture(None).unwrap_err();
        assert!(matches!(err, CaptureError::CaptureFailed { .. }));
        assert_eq!(leftover_files(&dir), 0);
    }

    #[test]
    fn empty_bounded_rect_is_rejected_before_running_tool() {
        let dir = tempfile::tempdir().unwrap();
        let service = service(Output::Png, &dir);
        let err = service
            .capture(Some(Rect::new(0.0, 0.0, 0.0, 10.0)))
            .unwrap_err();
        assert!(matches!(err, CaptureError::InvalidSelection { .. }));
        assert!(service.backend.calls.borrow().is_empty());
    }

    #[test]
    fn tool_geometry_formats() {
        let rect = PixelRect {
            x: -5,
            y: 12,
            width: 300,
            height: 200,
        };
        assert_eq!(format_grim_geometry(rect), "-5,12 300x200");
        assert_eq!(format_screencapture_rect(rect), "-5,12,300,200");
    }

    #[test]
    fn parse_region_selection_parses_expected_format() {
        assert_eq!(
            parse_region_selection("10,20 300x200").unwrap(),
            PixelRect {
                x: 10,
                y: 20,
                width: 300,
                height: 200,
            }
        );
    }

    #[test]
    fn parse_region_selection_rejects_invalid_formats() {
        for geometry in ["", "10,20", "10 20 300x200", "a,b 1x1", "1,2 0x5", "1,2 5x", "1,2 3x4 extra"] {
            assert!(
                matches!(
                    parse_region_selection(geometry),
                    Err(CaptureError::InvalidSelection { .. })
                ),
                "{geometry} should be rejected"
            );
        }
    }

    #[test]
    fn cleanup_temp_capture_file_with_reports_outcomes() {
        let path = Path::new("/tmp/pinshot-capture-test.png");
        assert_eq!(
            cleanup_temp_capture_file_with(path, "test", |_| Ok(())),
            TempCaptureCleanupOutcome::Removed
        );
        assert_eq!(
            cleanup_temp_capture_file_with(path, "test", |_| Err(std::io::Error::from(
                std::io::ErrorKind::NotFound
            ))),
            TempCaptureCleanupOutcome::NotFound
        );
        assert_eq!(
            cleanup_temp_capture_file_with(path, "test", |_| Err(std::io::Error::from(
                std::io::ErrorKind::PermissionDenied
            ))),
            TempCaptureCleanupOutcome::Failed
        );
    }
}
