/// Shared geometric and color primitives used across the capture, selection and pin modules.

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn delta_to(self, other: Point) -> (f64, f64) {
        (other.x - self.x, other.y - self.y)
    }

    pub fn offset(self, dx: f64, dy: f64) -> Self {
        Self::new(self.x + dx, self.y + dy)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Size {
    pub const fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    pub fn from_pixels(width: u32, height: u32) -> Self {
        Self::new(f64::from(width), f64::from(height))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub const fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Rectangle spanned by two corners, in either order.
    pub fn from_corners(a: Point, b: Point) -> Self {
        Self::new(
            a.x.min(b.x),
            a.y.min(b.y),
            (b.x - a.x).abs(),
            (b.y - a.y).abs(),
        )
    }

    pub fn max_x(&self) -> f64 {
        self.x + self.width
    }

    pub fn max_y(&self) -> f64 {
        self.y + self.height
    }

    pub fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }

    pub fn center(&self) -> Point {
        Point::new(self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    pub fn contains(&self, point: Point) -> bool {
        point.x >= self.x && point.x <= self.max_x() && point.y >= self.y && point.y <= self.max_y()
    }

    /// Largest rectangle with the aspect ratio of `content` that fits inside
    /// `container`, centered. Degenerate sizes give an empty rectangle.
    pub fn aspect_fit(content: Size, container: Size) -> Self {
        if content.width <= 0.0
            || content.height <= 0.0
            || container.width <= 0.0
            || container.height <= 0.0
        {
            return Self::default();
        }
        let (width, height) = if container.width * content.height <= container.height * content.width {
            (container.width, content.height * container.width / content.width)
        } else {
            (content.width * container.height / content.height, container.height)
        };
        Self::new(
            (container.width - width) / 2.0,
            (container.height - height) / 2.0,
            width,
            height,
        )
    }

    /// Integer pixel form used on external tool command lines.
    pub fn to_pixels(&self) -> PixelRect {
        PixelRect {
            x: self.x.round() as i32,
            y: self.y.round() as i32,
            width: self.width.round().max(0.0) as u32,
            height: self.height.round().max(0.0) as u32,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelRect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const BLACK: Self = Self::rgb(0, 0, 0);
    pub const RED: Self = Self::rgb(255, 59, 48);
    pub const BLUE: Self = Self::rgb(0, 122, 255);

    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self::new(r, g, b, 255)
    }

    pub fn to_f64_rgba(self) -> (f64, f64, f64, f64) {
        (
            f64::from(self.r) / 255.0,
            f64::from(self.g) / 255.0,
            f64::from(self.b) / 255.0,
            f64::from(self.a) / 255.0,
        )
    }

    /// Parses `#rrggbb` or `#rrggbbaa` (the leading `#` is optional).
    pub fn parse_hex(value: &str) -> Option<Self> {
        let hex = value.trim().trim_start_matches('#');
        if !hex.is_ascii() || (hex.len() != 6 && hex.len() != 8) {
            return None;
        }
        let channel = |index: usize| u8::from_str_radix(&hex[index..index + 2], 16).ok();
        let alpha = if hex.len() == 8 { channel(6)? } else { 255 };
        Some(Self::new(channel(0)?, channel(2)?, channel(4)?, alpha))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_corners_normalizes_any_drag_direction() {
        let rect = Rect::from_corners(Point::new(50.0, 40.0), Point::new(10.0, 100.0));
        assert_eq!(rect, Rect::new(10.0, 40.0, 40.0, 60.0));
    }

    #[test]
    fn contains_includes_edges() {
        let rect = Rect::new(0.0, 0.0, 10.0, 10.0);
        assert!(rect.contains(Point::new(0.0, 0.0)));
        assert!(rect.contains(Point::new(10.0, 10.0)));
        assert!(!rect.contains(Point::new(10.5, 3.0)));
    }

    #[test]
    fn parse_hex_accepts_rgb_and_rgba() {
        assert_eq!(Color::parse_hex("#ff0000"), Some(Color::rgb(255, 0, 0)));
        assert_eq!(
            Color::parse_hex("00ff0080"),
            Some(Color::new(0, 255, 0, 128))
        );
        assert_eq!(Color::parse_hex("#fff"), None);
        assert_eq!(Color::parse_hex("#gg0000"), None);
    }

    #[test]
    fn aspect_fit_letterboxes_wide_content() {
        assert_eq!(
            Rect::aspect_fit(Size::new(100.0, 40.0), Size::new(280.0, 150.0)),
            Rect::new(0.0, 19.0, 280.0, 112.0)
        );
        assert_eq!(
            Rect::aspect_fit(Size::new(400.0, 300.0), Size::new(800.0, 600.0)),
            Rect::new(0.0, 0.0, 800.0, 600.0)
        );
        assert_eq!(
            Rect::aspect_fit(Size::new(100.0, 100.0), Size::new(300.0, 100.0)),
            Rect::new(100.0, 0.0, 100.0, 100.0)
        );
        assert_eq!(
            Rect::aspect_fit(Size::new(100.0, 40.0), Size::new(0.0, 150.0)),
            Rect::default()
        );
    }
}
