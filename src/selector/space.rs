use crate::geometry::{Point, Rect};

/// Where the overlay's vertical axis starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AxisOrigin {
    /// Capture tools and the overlay agree on a top-left origin.
    #[default]
    TopLeft,
    /// The overlay measures `y` upward from the bottom edge.
    BottomLeft,
}

/// Maps between overlay-local coordinates and the capture tool's screen space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OverlaySpace {
    origin: Point,
    screen_height: f64,
    axis: AxisOrigin,
}

impl OverlaySpace {
    pub const fn new(origin: Point, screen_height: f64, axis: AxisOrigin) -> Self {
        Self {
            origin,
            screen_height,
            axis,
        }
    }

    fn flip_y(&self, y: f64, height: f64) -> f64 {
        self.screen_height - y - height
    }

    pub fn point_to_screen(&self, local: Point) -> Point {
        let y = match self.axis {
            AxisOrigin::TopLeft => local.y,
            AxisOrigin::BottomLeft => self.flip_y(local.y, 0.0),
        };
        Point::new(local.x + self.origin.x, y + self.origin.y)
    }

    /// `screenY = screenHeight - localY - height` for bottom-left overlays.
    pub fn rect_to_screen(&self, local: Rect) -> Rect {
        let y = match self.axis {
            AxisOrigin::TopLeft => local.y,
            AxisOrigin::BottomLeft => self.flip_y(local.y, local.height),
        };
        Rect::new(
            local.x + self.origin.x,
            y + self.origin.y,
            local.width,
            local.height,
        )
    }

    pub fn rect_from_screen(&self, screen: Rect) -> Rect {
        let y = screen.y - self.origin.y;
        let y = match self.axis {
            AxisOrigin::TopLeft => y,
            AxisOrigin::BottomLeft => self.flip_y(y, screen.height),
        };
        Rect::new(screen.x - self.origin.x, y, screen.width, screen.height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bottom_left_flip_matches_capture_tool_origin() {
        let space = OverlaySpace::new(Point::default(), 900.0, AxisOrigin::BottomLeft);
        let screen = space.rect_to_screen(Rect::new(40.0, 100.0, 200.0, 50.0));
        assert_eq!(screen, Rect::new(40.0, 750.0, 200.0, 50.0));
        assert_eq!(
            space.rect_from_screen(screen),
            Rect::new(40.0, 100.0, 200.0, 50.0)
        );
    }

    #[test]
    fn top_left_space_only_offsets_by_monitor_origin() {
        let space = OverlaySpace::new(Point::new(2560.0, 120.0), 1440.0, AxisOrigin::TopLeft);
        assert_eq!(
            space.rect_to_screen(Rect::new(10.0, 20.0, 30.0, 40.0)),
            Rect::new(2570.0, 140.0, 30.0, 40.0)
        );
        assert_eq!(
            space.point_to_screen(Point::new(1.0, 2.0)),
            Point::new(2561.0, 122.0)
        );
    }
}
