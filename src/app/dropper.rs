use std::process::Command;

use crate::geometry::Color;

const PICKER_COMMAND: &str = "hyprpicker";

/// Color under the pointer chosen with hyprpicker; `None` when cancelled or unavailable.
pub(super) fn pick_color() -> Option<Color> {
    let output = match Command::new(PICKER_COMMAND)
        .args(["--format=hex", "--no-fancy"])
        .output()
    {
        Ok(output) => output,
        Err(err) => {
            tracing::warn!(?err, "failed to run {PICKER_COMMAND}");
            return None;
        }
    };
    if !output.status.success() {
        tracing::debug!(status = ?output.status.code(), "color pick cancelled");
        return None;
    }
    parse_picker_output(&String::from_utf8_lossy(&output.stdout))
}

pub(super) fn parse_picker_output(stdout: &str) -> Option<Color> {
    stdout
        .lines()
        .map(str::trim)
        .filter(|line| line.starts_with('#'))
        .find_map(Color::parse_hex)
}
