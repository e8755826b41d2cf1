//! Still-photo decoding for the substitute feed.

use crate::{Error, Frame, Result};
use image::imageops::FilterType;
use std::path::Path;
use time::OffsetDateTime;
use tracing::debug;

/// Decode a photo and downsample it so neither the long nor the short edge
/// exceeds the given ceiling, preserving aspect ratio.
pub fn load_photo(path: &str, max_long_edge: u32, max_short_edge: u32) -> Result<Frame> {
    if !Path::new(path).is_file() {
        return Err(Error::NotFound(path.to_string()));
    }

    let decoded = image::open(path).map_err(|e| Error::Decode(e.to_string()))?;
    let rgb = decoded.into_rgb8();
    let (width, height) = rgb.dimensions();
    let (out_w, out_h) = bounded_dimensions(width, height, max_long_edge, max_short_edge);

    let rgb = if (out_w, out_h) == (width, height) {
        rgb
    } else {
        debug!(width, height, out_w, out_h, "downsampling photo");
        image::imageops::resize(&rgb, out_w, out_h, FilterType::Triangle)
    };

    Ok(Frame {
        width: out_w,
        height: out_h,
        pixel_format: crate::PixelFormat::Rgb8,
        data: rgb.into_raw(),
        ts: Some(OffsetDateTime::now_utc()),
    })
}

/// Fit (width, height) under the (long, short) edge ceiling without
/// changing orientation or aspect ratio. Dimensions never drop below 1.
pub fn bounded_dimensions(
    width: u32,
    height: u32,
    max_long_edge: u32,
    max_short_edge: u32,
) -> (u32, u32) {
    let long = width.max(height);
    let short = width.min(height);
    if long <= max_long_edge && short <= max_short_edge {
        return (width, height);
    }

    let scale = f64::min(
        f64::from(max_long_edge) / f64::from(long),
        f64::from(max_short_edge) / f64::from(short),
    );
    let scaled = |edge: u32| ((f64::from(edge) * scale).round() as u32).max(1);
    (scaled(width), scaled(height))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbImage;

    fn write_photo(dir: &tempfile::TempDir, name: &str, w: u32, h: u32) -> String {
        let path = dir.path().join(name);
        let img = RgbImage::from_fn(w, h, |x, y| image::Rgb([(x % 256) as u8, (y % 256) as u8, 7]));
        img.save(&path).unwrap();
        path.to_string_lossy().into_owned()
    }

    #[test]
    fn small_photo_keeps_dimensions() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_photo(&dir, "small.png", 640, 480);
        let frame = load_photo(&path, 1920, 1080).unwrap();
        assert_eq!((frame.width, frame.height), (640, 480));
        assert_eq!(frame.data.len(), 640 * 480 * 3);
    }

    #[test]
    fn oversized_landscape_fits_ceiling_and_keeps_aspect() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_photo(&dir, "wide.png", 4000, 2250);
        let frame = load_photo(&path, 1920, 1080).unwrap();
        let long = frame.width.max(frame.height);
        let short = frame.width.min(frame.height);
        assert!(long <= 1920);
        assert!(short <= 1080);
        // 16:9 input stays 16:9 within a pixel of rounding.
        let expected_h = (f64::from(frame.width) * 2250.0 / 4000.0).round() as u32;
        assert!(frame.height.abs_diff(expected_h) <= 1);
    }

    #[test]
    fn portrait_input_keeps_orientation() {
        let (w, h) = bounded_dimensions(2250, 4000, 1920, 1080);
        assert!(h > w);
        assert!(h <= 1920);
        assert!(w <= 1080);
    }

    #[test]
    fn missing_file_is_not_found() {
        let err = load_photo("/nonexistent/p.png", 1920, 1080).unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[test]
    fn garbage_file_is_decode_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.png");
        std::fs::write(&path, b"not an image").unwrap();
        let err = load_photo(&path.to_string_lossy(), 1920, 1080).unwrap_err();
        assert!(matches!(err, Error::Decode(_)));
    }
}
