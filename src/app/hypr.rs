use std::process::Command;
use std::sync::mpsc::{self, Receiver, Sender};
use std::time::Duration;

use crate::geometry::{Point, Size};

const HYPR_LOOKUP_RETRY_COUNT: u8 = 40;
const HYPR_LOOKUP_RETRY_DELAY: Duration = Duration::from_millis(50);

#[derive(Debug, Clone, PartialEq)]
pub(super) struct HyprClientMatch {
    pub(super) address: String,
    pub(super) pinned: bool,
    pub(super) origin: Option<Point>,
}

pub(super) fn in_hyprland() -> bool {
    std::env::var_os("HYPRLAND_INSTANCE_SIGNATURE").is_some()
}

fn parse_client_origin(client: &serde_json::Value) -> Option<Point> {
    let at = client.get("at")?.as_array()?;
    if at.len() != 2 {
        return None;
    }
    Some(Point::new(at[0].as_f64()?, at[1].as_f64()?))
}

pub(super) fn hypr_client_match_from_json(
    stdout: &[u8],
    expected_title: &str,
) -> Option<HyprClientMatch> {
    let parsed: serde_json::Value = serde_json::from_slice(stdout).ok()?;
    parsed.as_array()?.iter().find_map(|client| {
        let title = client.get("title")?.as_str()?;
        if title != expected_title {
            return None;
        }
        let address = client.get("address")?.as_str()?;
        Some(HyprClientMatch {
            address: address.to_string(),
            pinned: client
                .get("pinned")
                .and_then(serde_json::Value::as_bool)
                .unwrap_or(false),
            origin: parse_client_origin(client),
        })
    })
}

fn find_hypr_window_match(expected_title: &str) -> Option<HyprClientMatch> {
    let outcome = Command::new("hyprctl")
        .args(["-j", "clients"])
        .output()
        .ok()?;
    if !outcome.status.success() {
        return None;
    }
    hypr_client_match_from_json(&outcome.stdout, expected_title)
}

fn retry_until_some<T, F, S>(
    retry_count: u8,
    retry_delay: Duration,
    mut action: F,
    mut sleep: S,
) -> Option<T>
where
    F: FnMut(u8) -> Option<T>,
    S: FnMut(Duration),
{
    for attempt in 1..=retry_count {
        if let Some(value) = action(attempt) {
            return Some(value);
        }
        if attempt < retry_count {
            sleep(retry_delay);
        }
    }
    None
}

fn dispatch(dispatcher: &str, arg: &str) -> bool {
    match Command::new("hyprctl")
        .args(["dispatch", dispatcher, arg])
        .output()
    {
        Ok(result) if result.status.success() => {
            tracing::debug!(dispatcher, arg, "hyprctl dispatch applied");
            true
        }
        Ok(result) => {
            let stderr = String::from_utf8_lossy(&result.stderr);
            tracing::warn!(
                dispatcher,
                arg,
                status = result.status.code(),
                stderr = stderr.trim(),
                "hyprctl dispatch returned non-zero status"
            );
            false
        }
        Err(err) => {
            tracing::debug!(dispatcher, arg, ?err, "hyprctl dispatch failed");
            false
        }
    }
}

/// Window rule selector matching exactly `title`.
pub(super) fn title_selector(title: &str) -> String {
    format!("title:^({})$", escape_title_regex(title))
}

fn escape_title_regex(title: &str) -> String {
    let mut escaped = String::with_capacity(title.len());
    for ch in title.chars() {
        if "\\.^$|?*+()[]{}".contains(ch) {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

pub(super) fn move_window_arg(dx: f64, dy: f64, title: &str) -> String {
    format!(
        "{} {},{}",
        dx.round() as i64,
        dy.round() as i64,
        title_selector(title)
    )
}

pub(super) fn move_window_exact_arg(position: Point, selector: &str) -> String {
    format!(
        "exact {} {},{selector}",
        position.x.round() as i64,
        position.y.round() as i64
    )
}

/// Floats, pins and sizes the window once Hyprland has mapped it, optionally
/// moving it to `position`. Reports the resulting origin through `on_origin`
/// from the worker thread.
pub(super) fn request_pinned_window_setup<F>(
    expected_title: &str,
    size: Size,
    position: Option<Point>,
    on_origin: F,
) where
    F: FnOnce(Point) + Send + 'static,
{
    if !in_hyprland() {
        tracing::debug!(title = expected_title, "skipping pin setup outside Hyprland");
        return;
    }

    let expected_title = expected_title.to_string();
    std::thread::spawn(move || {
        let Some(matched) = retry_until_some(
            HYPR_LOOKUP_RETRY_COUNT,
            HYPR_LOOKUP_RETRY_DELAY,
            |_| find_hypr_window_match(&expected_title),
            std::thread::sleep,
        ) else {
            tracing::debug!(title = expected_title, "hypr window lookup failed for pin setup");
            return;
        };

        let selector = format!("address:{}", matched.address);
        dispatch("setfloating", &selector);
        if !matched.pinned {
            dispatch("pin", &selector);
        }
        let resize_arg = format!(
            "exact {} {},{selector}",
            size.width.round().max(1.0) as i64,
            size.height.round().max(1.0) as i64
        );
        dispatch("resizewindowpixel", &resize_arg);
        if let Some(position) = position {
            dispatch("movewindowpixel", &move_window_exact_arg(position, &selector));
        }

        if let Some(origin) = find_hypr_window_match(&expected_title).and_then(|m| m.origin) {
            on_origin(origin);
        }
    });
}

/// Relative move of the window titled `title`.
pub(super) fn move_window_by(title: &str, dx: f64, dy: f64) -> bool {
    if !in_hyprland() {
        return false;
    }
    dispatch("movewindowpixel", &move_window_arg(dx, dy, title))
}

/// One batch of relative moves as handled by the compositor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(super) struct MoveReport {
    pub(super) dx: f64,
    pub(super) dy: f64,
    pub(super) applied: bool,
}

/// Serializes relative moves of one window on a dedicated thread. Requests
/// queued while a dispatch runs are merged into the next one.
pub(super) struct WindowMover {
    requests: Sender<(f64, f64)>,
    reports: Receiver<MoveReport>,
}

impl WindowMover {
    pub(super) fn spawn(title: &str) -> Self {
        let (requests, request_rx) = mpsc::channel::<(f64, f64)>();
        let (report_tx, reports) = mpsc::channel();
        let title = title.to_string();
        std::thread::spawn(move || {
            while let Ok(first) = request_rx.recv() {
                let (dx, dy) = coalesce_moves(first, &request_rx);
                let applied = move_window_by(&title, dx, dy);
                if report_tx.send(MoveReport { dx, dy, applied }).is_err() {
                    break;
                }
            }
            tracing::debug!(title = %title, "window mover stopped");
        });
        Self { requests, reports }
    }

    pub(super) fn request(&self, dx: f64, dy: f64) -> bool {
        self.requests.send((dx, dy)).is_ok()
    }

    /// Reports finished since the last call, oldest first. Never blocks.
    pub(super) fn finished(&self) -> impl Iterator<Item = MoveReport> + '_ {
        self.reports.try_iter()
    }
}

fn coalesce_moves(first: (f64, f64), queued: &Receiver<(f64, f64)>) -> (f64, f64) {
    queued
        .try_iter()
        .fold(first, |(x, y), (dx, dy)| (x + dx, y + dy))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn hypr_client_match_from_json_matches_exact_title() {
        let payload = br#"
[
  "ok",
  {"address":"0x100","title":"PinShot Pin 1"},
  {"address":"0x200","title":"PinShot Pin 2","pinned":true,"at":[100,200],"size":[600,400]}
]
"#;
        let matched = hypr_client_match_from_json(payload, "PinShot Pin 2").expect("match");
        assert_eq!(
            matched,
            HyprClientMatch {
                address: "0x200".to_string(),
                pinned: true,
                origin: Some(Point::new(100.0, 200.0)),
            }
        );
        assert!(hypr_client_match_from_json(payload, "PinShot Pin").is_none());
    }

    #[test]
    fn move_window_arg_is_relative_and_title_scoped() {
        assert_eq!(
            move_window_arg(12.4, -3.6, "PinShot Pin 3"),
            "12 -4,title:^(PinShot Pin 3)$"
        );
        assert_eq!(title_selector("a.b (1)"), r"title:^(a\.b \(1\))$");
        assert_eq!(
            move_window_exact_arg(Point::new(819.6, 510.0), "address:0x1"),
            "exact 820 510,address:0x1"
        );
    }

    #[test]
    fn retry_until_some_returns_value_without_extra_retries() {
        let calls = Rc::new(RefCell::new(Vec::new()));
        let sleeps = Rc::new(RefCell::new(Vec::new()));

        let result = retry_until_some(
            5,
            Duration::from_millis(10),
            {
                let calls = calls.clone();
                move |attempt| {
                    calls.borrow_mut().push(attempt);
                    (attempt == 3).then_some("matched")
                }
            },
            {
                let sleeps = sleeps.clone();
                move |duration| sleeps.borrow_mut().push(duration)
            },
        );

        assert_eq!(result, Some("matched"));
        assert_eq!(*calls.borrow(), vec![1, 2, 3]);
        assert_eq!(sleeps.borrow().len(), 2);
    }

    #[test]
    fn retry_until_some_stops_after_max_attempts() {
        let attempts = Rc::new(RefCell::new(0));
        let result = retry_until_some(
            4,
            Duration::ZERO,
            {
                let attempts = attempts.clone();
                move |_| {
                    *attempts.borrow_mut() += 1;
                    None::<u8>
                }
            },
            |_| {},
        );
        assert_eq!(result, None);
        assert_eq!(*attempts.borrow(), 4);
    }

    #[test]
    fn queued_moves_merge_into_one_dispatch() {
        let (tx, rx) = mpsc::channel();
        tx.send((2.0, -1.0)).unwrap();
        tx.send((3.0, 4.0)).unwrap();
        assert_eq!(coalesce_moves((1.0, 1.0), &rx), (6.0, 4.0));
        assert_eq!(coalesce_moves((1.0, 1.0), &rx), (1.0, 1.0));
    }
}
