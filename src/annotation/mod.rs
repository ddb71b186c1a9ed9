//! Free-hand strokes stored in the pinned image's native pixel space.
//!
//! Every point in an [`AnnotationLayer`] is expressed relative to `base_size`,
//! the pixel size of the captured bitmap, so strokes stay anchored to the
//! image content however the window is resized.

use crate::geometry::{Color, Point, Rect, Size};

mod render;

pub use render::composite;

/// Stroke width in image pixels.
pub const STROKE_WIDTH: f64 = 4.0;

#[derive(Debug, Clone, PartialEq)]
pub struct Stroke {
    pub points: Vec<Point>,
    pub color: Color,
    pub width: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnnotationLayer {
    strokes: Vec<Stroke>,
    base_size: Size,
}

impl AnnotationLayer {
    pub fn new(base_size: Size) -> Self {
        Self {
            strokes: Vec::new(),
            base_size,
        }
    }

    pub fn base_size(&self) -> Size {
        self.base_size
    }

    pub fn strokes(&self) -> &[Stroke] {
        &self.strokes
    }

    pub fn is_empty(&self) -> bool {
        self.strokes.is_empty()
    }

    /// Appends a committed stroke. Points must already be normalized; points
    /// outside `base_size` are kept and simply clipped when rendered.
    pub fn add_stroke(&mut self, points: Vec<Point>, color: Color) {
        if points.is_empty() {
            return;
        }
        self.strokes.push(Stroke {
            points,
            color,
            width: STROKE_WIDTH,
        });
    }

    /// Drops the most recent stroke. Undo on an empty layer does nothing.
    pub fn undo(&mut self) -> Option<Stroke> {
        self.strokes.pop()
    }

    /// Where the image sits inside a view of `view_size`: scaled uniformly
    /// and centered, with any leftover space split evenly on both sides.
    pub fn content_rect(&self, view_size: Size) -> Rect {
        Rect::aspect_fit(self.base_size, view_size)
    }

    pub fn normalize_point(&self, view_point: Point, view_size: Size) -> Point {
        let content = self.content_rect(view_size);
        if content.width == 0.0 || content.height == 0.0 {
            return Point::default();
        }
        Point::new(
            (view_point.x - content.x) * self.base_size.width / content.width,
            (view_point.y - content.y) * self.base_size.height / content.height,
        )
    }

    pub fn to_view_point(&self, normalized: Point, view_size: Size) -> Point {
        let content = self.content_rect(view_size);
        if content.width == 0.0 || content.height == 0.0 {
            return Point::default();
        }
        Point::new(
            content.x + normalized.x * content.width / self.base_size.width,
            content.y + normalized.y * content.height / self.base_size.height,
        )
    }

    pub fn composite(&self, base: &image::RgbaImage) -> image::RgbaImage {
        composite(base, self)
    }

    /// View-space stroke width for a view of `view_size`.
    pub fn view_stroke_width(&self, stroke: &Stroke, view_size: Size) -> f64 {
        if self.base_size.width == 0.0 {
            return stroke.width;
        }
        stroke.width * self.content_rect(view_size).width / self.base_size.width
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(left: Point, right: Point) -> bool {
        (left.x - right.x).abs() < 1e-9 && (left.y - right.y).abs() < 1e-9
    }

    #[test]
    fn stroke_drawn_on_double_size_view_is_halved() {
        let mut layer = AnnotationLayer::new(Size::new(400.0, 300.0));
        let view = Size::new(800.0, 600.0);
        let points = vec![
            layer.normalize_point(Point::new(100.0, 100.0), view),
            layer.normalize_point(Point::new(200.0, 200.0), view),
        ];
        layer.add_stroke(points, Color::RED);

        assert_eq!(
            layer.strokes()[0].points,
            vec![Point::new(50.0, 50.0), Point::new(100.0, 100.0)]
        );
        assert_eq!(layer.strokes()[0].width, STROKE_WIDTH);
    }

    #[test]
    fn rendering_is_scale_invariant_relative_to_content() {
        let layer = AnnotationLayer::new(Size::new(400.0, 300.0));
        let normalized = Point::new(123.0, 77.0);

        for view in [Size::new(400.0, 300.0), Size::new(1000.0, 90.0), Size::new(37.0, 611.0)] {
            let content = layer.content_rect(view);
            let rendered = layer.to_view_point(normalized, view);
            let relative = Point::new(
                (rendered.x - content.x) / content.width,
                (rendered.y - content.y) / content.height,
            );
            assert!(approx(relative, Point::new(123.0 / 400.0, 77.0 / 300.0)));
            assert!(approx(layer.normalize_point(rendered, view), normalized));
        }
    }

    #[test]
    fn small_capture_is_letterboxed_without_distortion() {
        let layer = AnnotationLayer::new(Size::new(100.0, 40.0));
        let view = Size::new(280.0, 150.0);

        let content = layer.content_rect(view);
        assert_eq!(content, Rect::new(0.0, 19.0, 280.0, 112.0));
        assert!((content.width / content.height - 100.0 / 40.0).abs() < 1e-9);
        assert!(approx(
            layer.normalize_point(Point::new(140.0, 75.0), view),
            Point::new(50.0, 20.0)
        ));
        assert!(approx(layer.to_view_point(Point::default(), view), Point::new(0.0, 19.0)));
        let stroke = Stroke {
            points: Vec::new(),
            color: Color::BLACK,
            width: STROKE_WIDTH,
        };
        assert!((layer.view_stroke_width(&stroke, view) - STROKE_WIDTH * 2.8).abs() < 1e-9);
    }

    #[test]
    fn zero_view_dimension_normalizes_to_origin() {
        let layer = AnnotationLayer::new(Size::new(400.0, 300.0));
        assert_eq!(
            layer.normalize_point(Point::new(10.0, 10.0), Size::new(0.0, 300.0)),
            Point::default()
        );
        assert_eq!(
            layer.normalize_point(Point::new(10.0, 10.0), Size::new(200.0, 0.0)),
            Point::default()
        );
    }

    #[test]
    fn undo_on_empty_layer_is_a_no_op() {
        let mut layer = AnnotationLayer::new(Size::new(10.0, 10.0));
        assert!(layer.undo().is_none());
        assert!(layer.is_empty());
    }

    #[test]
    fn undo_restores_previous_stroke_list() {
        let mut layer = AnnotationLayer::new(Size::new(100.0, 100.0));
        layer.add_stroke(vec![Point::new(1.0, 1.0), Point::new(5.0, 5.0)], Color::BLACK);
        let before = layer.clone();

        layer.add_stroke(vec![Point::new(9.0, 9.0), Point::new(20.0, 2.0)], Color::BLUE);
        layer.undo();

        assert_eq!(layer, before);
    }

    #[test]
    fn out_of_range_points_are_kept_unclamped() {
        let mut layer = AnnotationLayer::new(Size::new(100.0, 100.0));
        layer.add_stroke(vec![Point::new(-20.0, 150.0)], Color::BLACK);
        assert_eq!(layer.strokes()[0].points, vec![Point::new(-20.0, 150.0)]);
    }
}
