use std::path::Path;
use std::process::Command;

use image::RgbaImage;

use crate::geometry::Rect;
use crate::storage;

#[derive(Debug, thiserror::Error)]
pub enum OcrError {
    #[error("failed to run {command}: {source}")]
    CommandIo {
        command: String,
        #[source]
        source: std::io::Error,
    },
    #[error("recognition failed: {message}")]
    Recognition { message: String },
    #[error("image conversion failed: {message}")]
    ImageConversion { message: String },
}

pub type OcrResult<T> = Result<T, OcrError>;

const TESSERACT_COMMAND: &str = "tesseract";
const DEFAULT_LANGUAGE: &str = "eng";
const WORD_LEVEL: &str = "5";

/// A line of recognized text in image pixel space.
#[derive(Debug, Clone, PartialEq)]
pub struct TextRegion {
    pub bounds: Rect,
    pub text: String,
}

/// Opaque analysis service returning selectable text regions for a still image.
pub trait TextAnalyzer: Send {
    fn analyze(&self, image: &RgbaImage) -> OcrResult<Vec<TextRegion>>;
}

#[derive(Debug, Clone)]
pub struct TesseractAnalyzer {
    language: String,
}

impl TesseractAnalyzer {
    pub fn new(language: Option<&str>) -> Self {
        Self {
            language: resolve_language(language),
        }
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    fn run(&self, input: &Path) -> OcrResult<String> {
        let output = Command::new(TESSERACT_COMMAND)
            .arg(input)
            .args(["stdout", "--psm", "3", "-l", &self.language, "tsv"])
            .output()
            .map_err(|source| OcrError::CommandIo {
                command: TESSERACT_COMMAND.to_string(),
                source,
            })?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(OcrError::Recognition {
                message: format!("exit status: {}; stderr: {}", output.status, stderr.trim()),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl TextAnalyzer for TesseractAnalyzer {
    fn analyze(&self, image: &RgbaImage) -> OcrResult<Vec<TextRegion>> {
        let input = storage::temp_capture_path("ocr");
        image
            .save_with_format(&input, image::ImageFormat::Png)
            .map_err(|err| OcrError::ImageConversion {
                message: format!("failed to write {}: {err}", input.display()),
            })?;
        let result = self.run(&input);
        if let Err(err) = std::fs::remove_file(&input) {
            tracing::debug!(path = %input.display(), ?err, "failed to remove ocr input");
        }
        Ok(parse_tsv(&result?))
    }
}

pub fn resolve_language(config_value: Option<&str>) -> String {
    config_value
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .unwrap_or(DEFAULT_LANGUAGE)
        .to_string()
}

/// Groups tesseract's word rows into lines, keeping reading order.
pub fn parse_tsv(tsv: &str) -> Vec<TextRegion> {
    let mut lines: Vec<((u32, u32, u32), TextRegion)> = Vec::new();

    for row in tsv.lines().skip(1) {
        let columns: Vec<&str> = row.split('\t').collect();
        if columns.len() < 12 || columns[0] != WORD_LEVEL {
            continue;
        }
        let text = columns[11].trim();
        if text.is_empty() {
            continue;
        }
        let numbers: Option<Vec<u32>> = columns[2..10]
            .iter()
            .map(|value| value.trim().parse::<u32>().ok())
            .collect();
        let Some(numbers) = numbers else {
            continue;
        };
        let key = (numbers[0], numbers[1], numbers[2]);
        let bounds = Rect::new(
            f64::from(numbers[4]),
            f64::from(numbers[5]),
            f64::from(numbers[6]),
            f64::from(numbers[7]),
        );

        match lines.iter_mut().find(|(line_key, _)| *line_key == key) {
            Some((_, line)) => {
                line.bounds = union(line.bounds, bounds);
                line.text.push(' ');
                line.text.push_str(text);
            }
            None => lines.push((
                key,
                TextRegion {
                    bounds,
                    text: text.to_string(),
                },
            )),
        }
    }

    lines.into_iter().map(|(_, line)| line).collect()
}

/// Recognized text in reading order, one line per region.
pub fn joined_text(regions: &[TextRegion]) -> String {
    regions
        .iter()
        .map(|region| region.text.as_str())
        .collect::<Vec<_>>()
        .join("\n")
}

fn union(left: Rect, right: Rect) -> Rect {
    let x = left.x.min(right.x);
    let y = left.y.min(right.y);
    Rect::new(
        x,
        y,
        left.max_x().max(right.max_x()) - x,
        left.max_y().max(right.max_y()) - y,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str =
        "level\tpage_num\tblock_num\tpar_num\tline_num\tword_num\tleft\ttop\twidth\theight\tconf\ttext";

    #[test]
    fn parse_tsv_groups_words_into_lines() {
        let tsv = format!(
            "{HEADER}\n\
             1\t1\t0\t0\t0\t0\t0\t0\t400\t300\t-1\t\n\
             4\t1\t1\t1\t1\t0\t10\t10\t200\t20\t-1\t\n\
             5\t1\t1\t1\t1\t1\t10\t10\t60\t20\t95.1\tHello\n\
             5\t1\t1\t1\t1\t2\t80\t12\t70\t18\t93.0\tworld\n\
             5\t1\t1\t1\t2\t1\t10\t40\t90\t20\t91.0\tSecond\n\
             5\t1\t1\t1\t2\t2\t110\t40\t10\t20\t-1\t \n"
        );

        let regions = parse_tsv(&tsv);
        assert_eq!(
            regions,
            vec![
                TextRegion {
                    bounds: Rect::new(10.0, 10.0, 140.0, 20.0),
                    text: "Hello world".to_string(),
                },
                TextRegion {
                    bounds: Rect::new(10.0, 40.0, 90.0, 20.0),
                    text: "Second".to_string(),
                },
            ]
        );
        assert_eq!(joined_text(&regions), "Hello world\nSecond");
    }

    #[test]
    fn parse_tsv_skips_malformed_rows() {
        let tsv = format!("{HEADER}\n5\t1\tx\t1\t1\t1\t0\t0\t5\t5\t90\tbad\n5\t1\t1\n");
        assert!(parse_tsv(&tsv).is_empty());
    }

    #[test]
    fn resolve_language_defaults_to_english() {
        assert_eq!(resolve_language(None), "eng");
        assert_eq!(resolve_language(Some("  ")), "eng");
        assert_eq!(resolve_language(Some("kor+eng")), "kor+eng");
    }
}
