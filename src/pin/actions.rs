//! Copy and save for a pinned image, reporting through toast messages.

use std::path::{Path, PathBuf};

use crate::clipboard::{ClipboardBackend, ClipboardError};
use crate::storage::{self, StorageError};

use super::PinnedWindowModel;

pub const COPIED_MESSAGE: &str = "Copied to clipboard";
pub const TEXT_COPIED_MESSAGE: &str = "Text copied";
pub const NO_TEXT_MESSAGE: &str = "No text found";
pub const COPY_FAILED_MESSAGE: &str = "Copy failed";
pub const SAVE_FAILED_MESSAGE: &str = "Save failed";

#[derive(Debug, thiserror::Error)]
pub enum PinActionError {
    #[error("pin copy failed: {source}")]
    Clipboard {
        #[from]
        source: ClipboardError,
    },
    #[error("pin save failed: {source}")]
    Storage {
        #[from]
        source: StorageError,
    },
}

impl PinActionError {
    pub fn toast_message(&self) -> &'static str {
        match self {
            Self::Clipboard { .. } => COPY_FAILED_MESSAGE,
            Self::Storage { .. } => SAVE_FAILED_MESSAGE,
        }
    }
}

pub fn saved_message(path: &Path) -> String {
    let name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    format!("Saved {name}")
}

pub fn copy_image<C: ClipboardBackend>(
    model: &PinnedWindowModel,
    clipboard: &C,
) -> Result<&'static str, PinActionError> {
    clipboard.copy_image(&model.composite())?;
    tracing::info!("pinned image copied to clipboard");
    Ok(COPIED_MESSAGE)
}

pub fn copy_text<C: ClipboardBackend>(
    model: &PinnedWindowModel,
    clipboard: &C,
) -> Result<&'static str, PinActionError> {
    let Some(text) = model.recognized_text() else {
        return Ok(NO_TEXT_MESSAGE);
    };
    clipboard.copy_text(&text)?;
    Ok(TEXT_COPIED_MESSAGE)
}

pub fn save_to(model: &PinnedWindowModel, destination: &Path) -> Result<String, PinActionError> {
    storage::save_png(&model.composite(), destination)?;
    tracing::info!(path = %destination.display(), "pinned image saved");
    Ok(saved_message(destination))
}

/// Destination with a `.png` extension, appending one when the chosen name lacks it.
pub fn png_destination(path: PathBuf) -> PathBuf {
    let is_png = path
        .extension()
        .is_some_and(|extension| extension.eq_ignore_ascii_case("png"));
    if is_png {
        return path;
    }
    let mut name = path.into_os_string();
    name.push(".png");
    PathBuf::from(name)
}

/// Collapses an action outcome into the toast text, logging failures.
pub fn toast_for<T: Into<String>>(result: Result<T, PinActionError>) -> String {
    match result {
        Ok(message) => message.into(),
        Err(err) => {
            tracing::warn!(?err, "pin action failed");
            err.toast_message().to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use image::{Rgba, RgbaImage};

    use super::*;
    use crate::clipboard::ClipboardResult;
    use crate::geometry::{Color, Point, Rect, Size};
    use crate::input::{EventTarget, InputEvent};
    use crate::ocr::TextRegion;

    #[derive(Default)]
    struct RecordingClipboard {
        images: RefCell<Vec<RgbaImage>>,
        texts: RefCell<Vec<String>>,
        fail: bool,
    }

    impl ClipboardBackend for RecordingClipboard {
        fn copy_image(&self, image: &RgbaImage) -> ClipboardResult<()> {
            if self.fail {
                return Err(ClipboardError::DisplayUnavailable);
            }
            self.images.borrow_mut().push(image.clone());
            Ok(())
        }

        fn copy_text(&self, text: &str) -> ClipboardResult<()> {
            if self.fail {
                return Err(ClipboardError::DisplayUnavailable);
            }
            self.texts.borrow_mut().push(text.to_string());
            Ok(())
        }
    }

    fn annotated_model() -> PinnedWindowModel {
        let bitmap = RgbaImage::from_pixel(40, 30, Rgba([255, 255, 255, 255]));
        let mut model = PinnedWindowModel::new(bitmap, Color::BLUE);
        model.set_view_size(Size::new(40.0, 60.0));
        model.toggle_drawing();
        model.dispatch(InputEvent::ButtonDown {
            location: Point::new(5.0, 35.0),
            global: Point::new(5.0, 35.0),
            target: EventTarget::Content,
        });
        model.dispatch(InputEvent::ButtonUp {
            location: Point::new(5.0, 35.0),
        });
        model
    }

    #[test]
    fn copy_writes_composited_image() {
        let model = annotated_model();
        let clipboard = RecordingClipboard::default();

        let message = copy_image(&model, &clipboard).expect("copy succeeds");
        assert_eq!(message, COPIED_MESSAGE);
        let images = clipboard.images.borrow();
        assert_eq!(images.len(), 1);
        assert_eq!(images[0], model.composite());
        assert_ne!(images[0], *model.image().bitmap().as_ref());
    }

    #[test]
    fn copy_failure_maps_to_generic_toast() {
        let model = annotated_model();
        let clipboard = RecordingClipboard {
            fail: true,
            ..RecordingClipboard::default()
        };
        assert_eq!(toast_for(copy_image(&model, &clipboard)), COPY_FAILED_MESSAGE);
    }

    #[test]
    fn copy_text_uses_recognized_lines() {
        let mut model = annotated_model();
        let clipboard = RecordingClipboard::default();
        assert_eq!(copy_text(&model, &clipboard).unwrap(), NO_TEXT_MESSAGE);

        model.apply_text_regions(vec![TextRegion {
            bounds: Rect::new(0.0, 0.0, 10.0, 10.0),
            text: "hello".to_string(),
        }]);
        assert_eq!(copy_text(&model, &clipboard).unwrap(), TEXT_COPIED_MESSAGE);
        assert_eq!(clipboard.texts.borrow().as_slice(), ["hello".to_string()]);
    }

    #[test]
    fn save_reports_file_name() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("PinShot_2024-01-01_10-00-00.png");
        let model = annotated_model();

        let message = toast_for(save_to(&model, &target));
        assert_eq!(message, "Saved PinShot_2024-01-01_10-00-00.png");
        let saved = image::open(&target).unwrap().to_rgba8();
        assert_eq!(saved, model.composite());
    }

    #[test]
    fn png_destination_appends_missing_extension() {
        assert_eq!(
            png_destination(PathBuf::from("/tmp/shot")),
            PathBuf::from("/tmp/shot.png")
        );
        assert_eq!(
            png_destination(PathBuf::from("/tmp/shot.PNG")),
            PathBuf::from("/tmp/shot.PNG")
        );
        assert_eq!(
            png_destination(PathBuf::from("/tmp/shot.jpg")),
            PathBuf::from("/tmp/shot.jpg.png")
        );
    }

    #[test]
    fn save_failure_reports_generic_message() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, b"x").unwrap();
        let model = annotated_model();

        assert_eq!(
            toast_for(save_to(&model, &blocker.join("shot.png"))),
            SAVE_FAILED_MESSAGE
        );
    }
}
