//! Point-in-time window and accessibility queries used by the selector.

use thiserror::Error;

use crate::geometry::{Point, Rect};

mod atspi;
mod hyprland;

pub use atspi::AtspiElementSource;
pub use hyprland::{parse_active_workspace_id, parse_window_descriptors, HyprRegionSource};

pub const MIN_WINDOW_EXTENT: f64 = 50.0;
pub const MIN_Z_LAYER: i32 = 0;
pub const MAX_Z_LAYER: i32 = 100;

#[derive(Debug, Error)]
pub enum RegionSourceError {
    #[error("window query failed: {message}")]
    WindowQueryFailed { message: String },
    #[error("accessibility query failed: {message}")]
    AccessibilityQueryFailed { message: String },
}

pub type RegionSourceResult<T> = std::result::Result<T, RegionSourceError>;

#[derive(Debug, Clone, PartialEq)]
pub struct WindowDescriptor {
    pub id: String,
    pub bounds: Rect,
    pub owner: String,
    pub title: String,
    pub z_layer: i32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ElementInfo {
    pub bounds: Rect,
    pub title: Option<String>,
}

/// Narrow capability the selector depends on. Both queries take screen-space points.
pub trait RegionSource {
    fn windows(&self) -> RegionSourceResult<Vec<WindowDescriptor>>;
    fn element_at(&self, point: Point) -> RegionSourceResult<Option<ElementInfo>>;
}

impl<S: RegionSource + ?Sized> RegionSource for Box<S> {
    fn windows(&self) -> RegionSourceResult<Vec<WindowDescriptor>> {
        (**self).windows()
    }

    fn element_at(&self, point: Point) -> RegionSourceResult<Option<ElementInfo>> {
        (**self).element_at(point)
    }
}

/// Window source from Hyprland paired with element lookup over AT-SPI.
#[derive(Debug, Default)]
pub struct DesktopRegionSource {
    windows: HyprRegionSource,
    elements: AtspiElementSource,
}

impl RegionSource for DesktopRegionSource {
    fn windows(&self) -> RegionSourceResult<Vec<WindowDescriptor>> {
        self.windows.windows()
    }

    fn element_at(&self, point: Point) -> RegionSourceResult<Option<ElementInfo>> {
        self.elements.element_at(point)
    }
}

/// Drops system owners, out-of-range layers and tiny windows, then orders
/// the rest frontmost first. The sort is stable so equal layers keep query order.
pub fn selectable_windows(
    windows: Vec<WindowDescriptor>,
    excluded_owners: &[String],
) -> Vec<WindowDescriptor> {
    let mut candidates: Vec<WindowDescriptor> = windows
        .into_iter()
        .filter(|window| (MIN_Z_LAYER..=MAX_Z_LAYER).contains(&window.z_layer))
        .filter(|window| !excluded_owners.iter().any(|owner| owner == &window.owner))
        .filter(|window| {
            window.bounds.width >= MIN_WINDOW_EXTENT && window.bounds.height >= MIN_WINDOW_EXTENT
        })
        .collect();
    candidates.sort_by(|left, right| right.z_layer.cmp(&left.z_layer));
    candidates
}

/// First window containing `point` in an already sorted candidate list.
///
/// Overlaps resolve strictly by layer order, not by the smallest enclosing bounds.
pub fn window_candidate_at(candidates: &[WindowDescriptor], point: Point) -> Option<&WindowDescriptor> {
    candidates
        .iter()
        .find(|candidate| candidate.bounds.contains(point))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn window(id: &str, owner: &str, bounds: Rect, z_layer: i32) -> WindowDescriptor {
        WindowDescriptor {
            id: id.to_string(),
            bounds,
            owner: owner.to_string(),
            title: format!("{id} title"),
            z_layer,
        }
    }

    #[test]
    fn selectable_windows_filters_owner_layer_and_size() {
        let excluded = vec!["Dock".to_string()];
        let windows = vec![
            window("keep", "firefox", Rect::new(0.0, 0.0, 300.0, 200.0), 10),
            window("dock", "Dock", Rect::new(0.0, 0.0, 300.0, 200.0), 10),
            window("overlay", "panel", Rect::new(0.0, 0.0, 300.0, 200.0), 101),
            window("below", "panel", Rect::new(0.0, 0.0, 300.0, 200.0), -1),
            window("tiny", "firefox", Rect::new(0.0, 0.0, 49.0, 200.0), 10),
        ];

        let ids: Vec<String> = selectable_windows(windows, &excluded)
            .into_iter()
            .map(|window| window.id)
            .collect();
        assert_eq!(ids, vec!["keep".to_string()]);
    }

    #[test]
    fn overlapping_windows_resolve_to_highest_layer() {
        let bounds = Rect::new(0.0, 0.0, 400.0, 400.0);
        let windows = vec![
            window("three", "a", bounds, 3),
            window("one", "b", bounds, 1),
            window("two", "c", bounds, 2),
        ];

        let sorted = selectable_windows(windows, &[]);
        let picked = window_candidate_at(&sorted, Point::new(100.0, 100.0)).expect("candidate");
        assert_eq!(picked.id, "three");
        assert_eq!(
            sorted.iter().map(|w| w.z_layer).collect::<Vec<_>>(),
            vec![3, 2, 1]
        );
    }

    #[test]
    fn higher_layer_wins_even_when_a_smaller_window_encloses_the_point() {
        let windows = vec![
            window("small-low", "a", Rect::new(90.0, 90.0, 60.0, 60.0), 1),
            window("large-high", "b", Rect::new(0.0, 0.0, 800.0, 600.0), 2),
        ];

        let sorted = selectable_windows(windows, &[]);
        let picked = window_candidate_at(&sorted, Point::new(100.0, 100.0)).expect("candidate");
        assert_eq!(picked.id, "large-high");
    }

    #[test]
    fn window_candidate_at_returns_none_outside_every_window() {
        let sorted = selectable_windows(
            vec![window("only", "a", Rect::new(0.0, 0.0, 100.0, 100.0), 0)],
            &[],
        );
        assert!(window_candidate_at(&sorted, Point::new(500.0, 500.0)).is_none());
    }
}
