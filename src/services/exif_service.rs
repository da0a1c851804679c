use image::DynamicImage;
use std::io::Cursor;

// EXIF lives in the first segments of the file; 128KB covers camera output.
const EXIF_HEADER_LIMIT: usize = 128 * 1024;

/// Orientation tag of an encoded image, defaulting to 1 when the image has
/// no EXIF block or the tag is missing.
pub fn read_orientation(bytes: &[u8]) -> u32 {
    let header = &bytes[..bytes.len().min(EXIF_HEADER_LIMIT)];

    let exif = match exif::Reader::new().read_from_container(&mut Cursor::new(header)) {
        Ok(e) => e,
        Err(_) => return 1,
    };

    if let Some(field) = exif.get_field(exif::Tag::Orientation, exif::In::PRIMARY) {
        match field.value {
            exif::Value::Short(ref v) => *v.first().unwrap_or(&1) as u32,
            exif::Value::Long(ref v) => *v.first().unwrap_or(&1),
            _ => 1,
        }
    } else {
        1
    }
}

/// Rotate/flip a decoded image so it is upright for the given EXIF orientation.
pub fn apply_orientation(img: DynamicImage, orientation: u32) -> DynamicImage {
    match orientation {
        2 => img.fliph(),
        3 => img.rotate180(),
        4 => img.flipv(),
        5 => img.fliph().rotate90(),
        6 => img.rotate90(),
        7 => img.fliph().rotate270(),
        8 => img.rotate270(),
        _ => img,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgb, RgbImage};

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = RgbImage::from_pixel(width, height, Rgb([10, 20, 30]));
        let mut buffer = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(img)
            .write_to(&mut buffer, ImageFormat::Png)
            .unwrap();
        buffer.into_inner()
    }

    #[test]
    fn missing_exif_defaults_to_upright() {
        assert_eq!(read_orientation(&png_bytes(4, 2)), 1);
        assert_eq!(read_orientation(b"garbage"), 1);
        assert_eq!(read_orientation(&[]), 1);
    }

    #[test]
    fn quarter_turns_swap_dimensions() {
        let img = DynamicImage::ImageRgb8(RgbImage::new(4, 2));
        for orientation in [5, 6, 7, 8] {
            let rotated = apply_orientation(img.clone(), orientation);
            assert_eq!((rotated.width(), rotated.height()), (2, 4), "orientation {}", orientation);
        }
        for orientation in [1, 2, 3, 4, 0, 42] {
            let kept = apply_orientation(img.clone(), orientation);
            assert_eq!((kept.width(), kept.height()), (4, 2), "orientation {}", orientation);
        }
    }

    #[test]
    fn rotate90_moves_top_left_pixel() {
        let mut raw = RgbImage::new(2, 1);
        raw.put_pixel(0, 0, Rgb([255, 0, 0]));
        let rotated = apply_orientation(DynamicImage::ImageRgb8(raw), 6).to_rgb8();
        // Clockwise turn puts the old top-left at the new top-right.
        assert_eq!(rotated.get_pixel(0, 0), &Rgb([255, 0, 0]));
        assert_eq!(rotated.dimensions(), (1, 2));
    }
}
