use gtk4::cairo;
use image::RgbaImage;

/// Straight RGBA to cairo's native-endian premultiplied ARGB32 rows.
pub(super) fn rgba_to_cairo_argb(image: &RgbaImage, stride: usize) -> Vec<u8> {
    let width = image.width() as usize;
    let mut data = vec![0u8; stride * image.height() as usize];
    for (y, row) in image.rows().enumerate() {
        let line = &mut data[y * stride..y * stride + width * 4];
        for (pixel, out) in row.zip(line.chunks_exact_mut(4)) {
            let [r, g, b, a] = pixel.0;
            let premultiply = |channel: u8| ((u16::from(channel) * u16::from(a) + 127) / 255) as u8;
            let argb = u32::from(a) << 24
                | u32::from(premultiply(r)) << 16
                | u32::from(premultiply(g)) << 8
                | u32::from(premultiply(b));
            out.copy_from_slice(&argb.to_ne_bytes());
        }
    }
    data
}

pub(super) fn image_surface(image: &RgbaImage) -> Result<cairo::ImageSurface, cairo::Error> {
    let stride = cairo::Format::ARgb32.stride_for_width(image.width())?;
    let data = rgba_to_cairo_argb(image, stride as usize);
    cairo::ImageSurface::create_for_data(
        data,
        cairo::Format::ARgb32,
        image.width() as i32,
        image.height() as i32,
        stride,
    )
}
