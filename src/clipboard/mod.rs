use std::io::{self, Write};
use std::process::{Command, Stdio};

use gtk4::gdk;
use gtk4::gdk::prelude::*;
use gtk4::glib;
use image::RgbaImage;
use thiserror::Error;

use crate::storage::{encode_png, StorageError};

const WL_COPY_COMMAND: &str = "wl-copy";
const MIME_IMAGE_PNG: &str = "image/png";

#[derive(Debug, Error)]
pub enum ClipboardError {
    #[error("failed to run wl-copy command: {command}")]
    CommandIo {
        command: String,
        #[source]
        source: io::Error,
    },
    #[error("wl-copy exited with non-zero status: {status}")]
    CommandFailed { status: String },
    #[error("failed to encode clipboard image: {0}")]
    Encode(#[from] StorageError),
    #[error("failed to access default display for clipboard operations")]
    DisplayUnavailable,
}

pub type ClipboardResult<T> = std::result::Result<T, ClipboardError>;

/// Writes one object to the system clipboard, replacing whatever it held.
pub trait ClipboardBackend {
    fn copy_image(&self, image: &RgbaImage) -> ClipboardResult<()>;
    fn copy_text(&self, text: &str) -> ClipboardResult<()>;
}

#[derive(Debug, Default)]
pub struct WlCopyBackend;

impl WlCopyBackend {
    fn pipe(&self, args: &[&str], payload: &[u8]) -> ClipboardResult<()> {
        let mut child = Command::new(WL_COPY_COMMAND)
            .args(args)
            .stdin(Stdio::piped())
            .spawn()
            .map_err(|source| ClipboardError::CommandIo {
                command: WL_COPY_COMMAND.to_string(),
                source,
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            if let Err(source) = stdin.write_all(payload) {
                let _ = child.kill();
                let _ = child.wait();
                return Err(ClipboardError::CommandIo {
                    command: WL_COPY_COMMAND.to_string(),
                    source,
                });
            }
        }

        let status = child.wait().map_err(|source| ClipboardError::CommandIo {
            command: WL_COPY_COMMAND.to_string(),
            source,
        })?;
        if status.success() {
            Ok(())
        } else {
            Err(ClipboardError::CommandFailed {
                status: status.to_string(),
            })
        }
    }
}

impl ClipboardBackend for WlCopyBackend {
    fn copy_image(&self, image: &RgbaImage) -> ClipboardResult<()> {
        let bytes = encode_png(image)?;
        self.pipe(&["--type", MIME_IMAGE_PNG], &bytes)
    }

    fn copy_text(&self, text: &str) -> ClipboardResult<()> {
        self.pipe(&[], text.as_bytes())
    }
}

/// Sets content providers on the display clipboard. Main thread only.
#[derive(Debug, Default)]
pub struct GdkClipboardBackend;

impl GdkClipboardBackend {
    fn clipboard(&self) -> ClipboardResult<gdk::Clipboard> {
        gdk::Display::default()
            .map(|display| display.clipboard())
            .ok_or(ClipboardError::DisplayUnavailable)
    }
}

impl ClipboardBackend for GdkClipboardBackend {
    fn copy_image(&self, image: &RgbaImage) -> ClipboardResult<()> {
        let bytes = encode_png(image)?;
        let provider =
            gdk::ContentProvider::for_bytes(MIME_IMAGE_PNG, &glib::Bytes::from_owned(bytes));
        self.clipboard()?
            .set_content(Some(&provider))
            .map_err(|_| ClipboardError::DisplayUnavailable)
    }

    fn copy_text(&self, text: &str) -> ClipboardResult<()> {
        self.clipboard()?.set_text(text);
        Ok(())
    }
}

/// Tries the display clipboard first and falls back to wl-copy.
#[derive(Debug, Default)]
pub struct PreferredClipboard {
    gdk: GdkClipboardBackend,
    wl_copy: WlCopyBackend,
}

impl ClipboardBackend for PreferredClipboard {
    fn copy_image(&self, image: &RgbaImage) -> ClipboardResult<()> {
        self.gdk.copy_image(image).or_else(|err| {
            tracing::debug!(?err, "display clipboard unavailable; using wl-copy");
            self.wl_copy.copy_image(image)
        })
    }

    fn copy_text(&self, text: &str) -> ClipboardResult<()> {
        self.gdk.copy_text(text).or_else(|err| {
            tracing::debug!(?err, "display clipboard unavailable; using wl-copy");
            self.wl_copy.copy_text(text)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_error_contains_command_name() {
        let err = ClipboardError::CommandFailed {
            status: "exit status 1".to_string(),
        };
        assert!(format!("{err}").contains("wl-copy"));
    }

    #[test]
    fn display_error_is_descriptive() {
        let err = ClipboardError::DisplayUnavailable;
        assert!(err.to_string().contains("default display"));
    }
}
