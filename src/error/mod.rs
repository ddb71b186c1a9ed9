use thiserror::Error;

use crate::capture::CaptureError;
use crate::clipboard::ClipboardError;
use crate::ocr::OcrError;
use crate::region::RegionSourceError;
use crate::selector::SelectorError;
use crate::session::SessionError;
use crate::storage::StorageError;
use crate::update::UpdateError;

pub type AppResult<T> = std::result::Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error(transparent)]
    Selector(#[from] SelectorError),
    #[error(transparent)]
    RegionSource(#[from] RegionSourceError),
    #[error(transparent)]
    Capture(#[from] CaptureError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Clipboard(#[from] ClipboardError),
    #[error(transparent)]
    Ocr(#[from] OcrError),
    #[error(transparent)]
    Update(#[from] UpdateError),
    #[error("unknown capture mode: {0}")]
    UnknownMode(String),
    #[error("application exited with status {0}")]
    Exit(i32),
}
