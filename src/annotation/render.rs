//! Raster compositing of strokes onto the captured bitmap with tiny-skia.

use image::RgbaImage;
use tiny_skia::{FillRule, LineCap, LineJoin, Paint, PathBuilder, Pixmap, Stroke, Transform};

use super::AnnotationLayer;

/// Returns a new bitmap of the same size as `base` with every stroke of
/// `layer` painted over it in insertion order. Neither input is modified and
/// pixels no stroke touches are copied from `base` unchanged.
pub fn composite(base: &RgbaImage, layer: &AnnotationLayer) -> RgbaImage {
    if layer.is_empty() {
        return base.clone();
    }

    let (width, height) = base.dimensions();
    let Some(mut strokes) = Pixmap::new(width, height) else {
        tracing::warn!(width, height, "cannot composite onto an empty bitmap");
        return base.clone();
    };

    let base_size = layer.base_size();
    let scale_x = if base_size.width > 0.0 {
        f64::from(width) / base_size.width
    } else {
        1.0
    };
    let scale_y = if base_size.height > 0.0 {
        f64::from(height) / base_size.height
    } else {
        1.0
    };
    let transform = Transform::from_scale(scale_x as f32, scale_y as f32);

    for stroke in layer.strokes() {
        let mut paint = Paint::default();
        paint.set_color_rgba8(stroke.color.r, stroke.color.g, stroke.color.b, stroke.color.a);
        paint.anti_alias = true;

        let width = stroke.width as f32;
        if let [point] = stroke.points.as_slice() {
            if let Some(dot) = PathBuilder::from_circle(point.x as f32, point.y as f32, width / 2.0)
            {
                strokes.fill_path(&dot, &paint, FillRule::Winding, transform, None);
            }
            continue;
        }

        let mut builder = PathBuilder::new();
        let mut points = stroke.points.iter();
        let Some(first) = points.next() else {
            continue;
        };
        builder.move_to(first.x as f32, first.y as f32);
        for point in points {
            builder.line_to(point.x as f32, point.y as f32);
        }
        let Some(path) = builder.finish() else {
            continue;
        };

        let style = Stroke {
            width,
            line_cap: LineCap::Round,
            line_join: LineJoin::Round,
            ..Default::default()
        };
        strokes.stroke_path(&path, &paint, &style, transform, None);
    }

    let mut output = base.clone();
    for (target, source) in output.pixels_mut().zip(strokes.pixels()) {
        if source.alpha() == 0 {
            continue;
        }
        let color = source.demultiply();
        target.0 = source_over(
            [color.red(), color.green(), color.blue(), color.alpha()],
            target.0,
        );
    }
    output
}

/// Straight-alpha source-over of `top` onto `bottom`.
fn source_over(top: [u8; 4], bottom: [u8; 4]) -> [u8; 4] {
    let top_alpha = f32::from(top[3]) / 255.0;
    if top_alpha >= 1.0 {
        return top;
    }
    let bottom_alpha = f32::from(bottom[3]) / 255.0;
    let bottom_weight = bottom_alpha * (1.0 - top_alpha);
    let alpha = top_alpha + bottom_weight;
    if alpha <= 0.0 {
        return [0, 0, 0, 0];
    }
    let channel = |index: usize| {
        let value = (f32::from(top[index]) * top_alpha + f32::from(bottom[index]) * bottom_weight)
            / alpha;
        value.round().clamp(0.0, 255.0) as u8
    };
    [
        channel(0),
        channel(1),
        channel(2),
        (alpha * 255.0).round().clamp(0.0, 255.0) as u8,
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{Color, Point, Size};
    use image::Rgba;

    fn base_image() -> RgbaImage {
        RgbaImage::from_fn(64, 48, |x, y| Rgba([(x * 3) as u8, (y * 5) as u8, 200, 255]))
    }

    fn layer_with_cross() -> AnnotationLayer {
        let mut layer = AnnotationLayer::new(Size::new(64.0, 48.0));
        layer.add_stroke(
            vec![Point::new(4.0, 24.0), Point::new(60.0, 24.0)],
            Color::RED,
        );
        layer.add_stroke(
            vec![Point::new(32.0, 4.0), Point::new(32.0, 44.0)],
            Color::BLUE,
        );
        layer
    }

    #[test]
    fn composite_is_pure_and_deterministic() {
        let base = base_image();
        let layer = layer_with_cross();
        let base_before = base.clone();
        let layer_before = layer.clone();

        let first = composite(&base, &layer);
        let second = composite(&base, &layer);

        assert_eq!(first.as_raw(), second.as_raw());
        assert_eq!(base, base_before);
        assert_eq!(layer, layer_before);
        assert_eq!(first.dimensions(), base.dimensions());
    }

    #[test]
    fn later_strokes_paint_over_earlier_ones() {
        let image = composite(&base_image(), &layer_with_cross());
        assert_eq!(image.get_pixel(32, 24).0, [0, 122, 255, 255]);
        assert_eq!(image.get_pixel(10, 24).0, [255, 59, 48, 255]);
    }

    #[test]
    fn composite_leaves_pixels_away_from_strokes_untouched() {
        let base = base_image();
        let image = composite(&base, &layer_with_cross());
        assert_eq!(image.get_pixel(2, 2), base.get_pixel(2, 2));
        assert_eq!(image.get_pixel(60, 44), base.get_pixel(60, 44));
    }

    #[test]
    fn empty_layer_returns_identical_copy() {
        let base = base_image();
        let layer = AnnotationLayer::new(Size::new(64.0, 48.0));
        assert_eq!(composite(&base, &layer), base);
    }

    #[test]
    fn strokes_outside_the_bitmap_are_clipped() {
        let base = base_image();
        let mut layer = AnnotationLayer::new(Size::new(64.0, 48.0));
        layer.add_stroke(
            vec![Point::new(-50.0, -50.0), Point::new(-10.0, -20.0)],
            Color::BLACK,
        );
        assert_eq!(composite(&base, &layer), base);
    }

    #[test]
    fn translucent_base_pixels_outside_strokes_are_preserved() {
        let base = RgbaImage::from_pixel(64, 48, Rgba([200, 100, 50, 3]));
        let image = composite(&base, &layer_with_cross());
        assert_eq!(image.get_pixel(2, 2).0, [200, 100, 50, 3]);
        assert_eq!(image.get_pixel(60, 44).0, [200, 100, 50, 3]);
        assert_eq!(image.get_pixel(10, 24).0, [255, 59, 48, 255]);
    }

    #[test]
    fn source_over_blends_in_straight_alpha() {
        assert_eq!(source_over([10, 20, 30, 255], [200, 100, 50, 3]), [10, 20, 30, 255]);
        assert_eq!(source_over([0, 0, 0, 0], [200, 100, 50, 3]), [200, 100, 50, 3]);
        assert_eq!(
            source_over([255, 0, 0, 128], [0, 0, 255, 255]),
            [128, 0, 127, 255]
        );
    }
}
