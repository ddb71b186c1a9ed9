use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use chrono::{DateTime, Local, NaiveDateTime, TimeZone};
use image::RgbaImage;
use thiserror::Error;

const DEFAULT_TEMP_PREFIX: &str = "capture_";
const PICTURES_SUBDIR: &str = "Pictures";
const DEFAULT_FALLBACK_TEMP_DIR: &str = "/tmp/pinshot";
const FILE_NAME_TIMESTAMP_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";
const PNG_EXTENSION: &str = "png";
pub const STALE_TEMP_MAX_AGE_HOURS: u64 = 24;

static TEMP_SEQUENCE: AtomicU64 = AtomicU64::new(0);

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("missing HOME environment variable")]
    MissingHomeDirectory,
    #[error("failed to encode png: {message}")]
    EncodeFailed { message: String },
    #[error("failed to save {path}: {source}")]
    SaveFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

pub type StorageResult<T> = std::result::Result<T, StorageError>;

#[derive(Debug, Default, Clone)]
pub struct PruneReport {
    pub removed_files: usize,
}

/// Unique scratch path for an external tool's PNG output, tagged with `label`.
pub fn temp_capture_path(label: &str) -> PathBuf {
    temp_capture_path_in(&default_runtime_temp_dir(), label)
}

pub fn temp_capture_path_in(dir: &Path, label: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_nanos())
        .unwrap_or_default();
    let sequence = TEMP_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    dir.join(format!(
        "{DEFAULT_TEMP_PREFIX}{label}_{}_{nanos}_{sequence}.{PNG_EXTENSION}",
        std::process::id()
    ))
}

pub fn default_runtime_temp_dir() -> PathBuf {
    std::env::var("XDG_RUNTIME_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_FALLBACK_TEMP_DIR))
}

pub fn pictures_dir() -> StorageResult<PathBuf> {
    let home = std::env::var("HOME").map_err(|_| StorageError::MissingHomeDirectory)?;
    Ok(PathBuf::from(home).join(PICTURES_SUBDIR))
}

/// `Prefix_YYYY-MM-DD_HH-mm-ss.png`
pub fn default_file_name<Tz: TimeZone>(prefix: &str, instant: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    format!(
        "{prefix}_{}.{PNG_EXTENSION}",
        instant.format(FILE_NAME_TIMESTAMP_FORMAT)
    )
}

pub fn default_file_name_now(prefix: &str) -> String {
    default_file_name(prefix, &Local::now())
}

/// Inverse of [`default_file_name`]. The prefix may itself contain underscores.
pub fn parse_file_name_timestamp(file_name: &str, prefix: &str) -> Option<NaiveDateTime> {
    let stem = file_name
        .strip_suffix(PNG_EXTENSION)?
        .strip_suffix('.')?
        .strip_prefix(prefix)?
        .strip_prefix('_')?;
    NaiveDateTime::parse_from_str(stem, FILE_NAME_TIMESTAMP_FORMAT).ok()
}

pub fn encode_png(image: &RgbaImage) -> StorageResult<Vec<u8>> {
    let mut bytes = Vec::new();
    image
        .write_to(&mut io::Cursor::new(&mut bytes), image::ImageFormat::Png)
        .map_err(|err| StorageError::EncodeFailed {
            message: err.to_string(),
        })?;
    Ok(bytes)
}

pub fn save_png(image: &RgbaImage, destination: &Path) -> StorageResult<()> {
    let bytes = encode_png(image)?;
    if let Some(parent) = destination.parent() {
        fs::create_dir_all(parent).map_err(|source| StorageError::SaveFailed {
            path: destination.to_path_buf(),
            source,
        })?;
    }
    fs::write(destination, bytes).map_err(|source| StorageError::SaveFailed {
        path: destination.to_path_buf(),
        source,
    })
}

pub fn prune_stale_temp_files(max_age_hours: u64) -> StorageResult<PruneReport> {
    prune_stale_temp_files_in(&default_runtime_temp_dir(), max_age_hours)
}

fn prune_stale_temp_files_in(dir: &Path, max_age_hours: u64) -> StorageResult<PruneReport> {
    let now = SystemTime::now();
    let mut report = PruneReport::default();
    let max_age = Duration::from_secs(max_age_hours.saturating_mul(60 * 60));

    if !dir.exists() {
        return Ok(report);
    }

    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }

        if path
            .file_name()
            .and_then(|name| name.to_str())
            .is_none_or(|name| !name.starts_with(DEFAULT_TEMP_PREFIX))
        {
            continue;
        }

        let modified = fs::metadata(&path)?.modified()?;
        let age = now.duration_since(modified).unwrap_or(Duration::ZERO);
        if age <= max_age {
            continue;
        }

        match fs::remove_file(&path) {
            Ok(()) => report.removed_files += 1,
            Err(err) => {
                tracing::warn!(
                    path = %path.display(),
                    ?err,
                    "failed to remove stale temp capture file"
                );
            }
        }
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Utc};
    use image::Rgba;

    #[test]
    fn default_file_name_matches_pattern_and_parses_back() {
        let instant = Utc.with_ymd_and_hms(2024, 3, 7, 9, 5, 2).unwrap();
        let name = default_file_name("PinShot", &instant);
        assert_eq!(name, "PinShot_2024-03-07_09-05-02.png");

        let parsed = parse_file_name_timestamp(&name, "PinShot").expect("name parses");
        assert_eq!(
            parsed,
            NaiveDate::from_ymd_opt(2024, 3, 7)
                .unwrap()
                .and_hms_opt(9, 5, 2)
                .unwrap()
        );
    }

    #[test]
    fn parse_file_name_timestamp_handles_prefix_with_underscores() {
        let instant = Utc.with_ymd_and_hms(2023, 12, 31, 23, 59, 59).unwrap();
        let name = default_file_name("my_pins", &instant);
        assert!(parse_file_name_timestamp(&name, "my_pins").is_some());
        assert!(parse_file_name_timestamp(&name, "my").is_none());
        assert!(parse_file_name_timestamp("PinShot_2023-12-31.png", "PinShot").is_none());
    }

    #[test]
    fn temp_capture_paths_are_unique_and_prefixed() {
        let dir = Path::new("/tmp/pinshot-test");
        let first = temp_capture_path_in(dir, "bounded");
        let second = temp_capture_path_in(dir, "bounded");
        assert_ne!(first, second);
        let name = first.file_name().and_then(|n| n.to_str()).unwrap();
        assert!(name.starts_with("capture_bounded_"));
        assert!(name.ends_with(".png"));
    }

    #[test]
    fn save_png_writes_decodable_image() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("nested").join("shot.png");
        let image = RgbaImage::from_pixel(3, 2, Rgba([1, 2, 3, 255]));

        save_png(&image, &target).expect("save succeeds");
        let decoded = image::open(&target).unwrap().to_rgba8();
        assert_eq!(decoded, image);
    }

    #[test]
    fn save_png_reports_save_failed_for_unwritable_destination() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, b"x").unwrap();
        let image = RgbaImage::from_pixel(1, 1, Rgba([0, 0, 0, 255]));

        let err = save_png(&image, &blocker.join("shot.png")).expect_err("parent is a file");
        assert!(matches!(err, StorageError::SaveFailed { .. }));
    }

    #[test]
    fn prune_removes_only_prefixed_files_older_than_limit() {
        let dir = tempfile::tempdir().unwrap();
        let stale = dir.path().join("capture_old.png");
        let other = dir.path().join("notes.txt");
        std::fs::write(&stale, b"png").unwrap();
        std::fs::write(&other, b"txt").unwrap();

        let report = prune_stale_temp_files_in(dir.path(), 1).unwrap();
        assert_eq!(report.removed_files, 0);

        assert!(stale.exists());

        let old = SystemTime::now() - Duration::from_secs(2 * 60 * 60);
        std::fs::File::options()
            .write(true)
            .open(&stale)
            .unwrap()
            .set_modified(old)
            .unwrap();
        let report = prune_stale_temp_files_in(dir.path(), 1).unwrap();
        assert_eq!(report.removed_files, 1);
        assert!(!stale.exists());
        assert!(other.exists());
    }
}
