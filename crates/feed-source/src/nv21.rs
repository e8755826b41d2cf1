//! Packed RGB to NV21 (YUV 4:2:0, V/U interleaved) conversion.
//!
//! Integer-only broadcast-range coefficients so output is bit-reproducible
//! across hosts. Luma covers every pixel; one chroma pair is emitted per
//! 2x2 block, sampled at the even (row, column) position, V before U.

use crate::{Frame, PixelFormat};

/// Number of bytes an NV21 buffer for `width` x `height` occupies.
pub fn nv21_len(width: u32, height: u32) -> usize {
    let luma = width as usize * height as usize;
    let chroma_cols = width.div_ceil(2) as usize;
    let chroma_rows = height.div_ceil(2) as usize;
    luma + 2 * chroma_cols * chroma_rows
}

/// Encode packed RGB (3 bytes per pixel, row-major) into NV21.
///
/// Returns `None` when `rgb` does not match `width * height * 3`.
pub fn encode_nv21(width: u32, height: u32, rgb: &[u8]) -> Option<Vec<u8>> {
    let pixels = width as usize * height as usize;
    if rgb.len() != pixels * 3 {
        return None;
    }

    let mut out = vec![0u8; nv21_len(width, height)];
    let mut y_index = 0usize;
    let mut uv_index = pixels;

    for row in 0..height as usize {
        for col in 0..width as usize {
            let base = (row * width as usize + col) * 3;
            let r = i32::from(rgb[base]);
            let g = i32::from(rgb[base + 1]);
            let b = i32::from(rgb[base + 2]);

            let y = ((66 * r + 129 * g + 25 * b + 128) >> 8) + 16;
            out[y_index] = y.clamp(0, 255) as u8;
            y_index += 1;

            if row % 2 == 0 && col % 2 == 0 {
                let u = ((-38 * r - 74 * g + 112 * b + 128) >> 8) + 128;
                let v = ((112 * r - 94 * g - 18 * b + 128) >> 8) + 128;
                out[uv_index] = v.clamp(0, 255) as u8;
                out[uv_index + 1] = u.clamp(0, 255) as u8;
                uv_index += 2;
            }
        }
    }

    Some(out)
}

/// Convert an RGB frame into an NV21 frame, preserving dimensions and
/// timestamp. Returns `None` for non-RGB input or a malformed buffer.
pub fn encode_frame(frame: &Frame) -> Option<Frame> {
    if frame.pixel_format != PixelFormat::Rgb8 {
        return None;
    }
    let data = encode_nv21(frame.width, frame.height, &frame.data)?;
    Some(Frame {
        width: frame.width,
        height: frame.height,
        pixel_format: PixelFormat::Nv21,
        data,
        ts: frame.ts,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid(width: u32, height: u32, rgb: [u8; 3]) -> Vec<u8> {
        let mut data = Vec::with_capacity((width * height * 3) as usize);
        for _ in 0..width * height {
            data.extend_from_slice(&rgb);
        }
        data
    }

    #[test]
    fn white_maps_to_broadcast_range_peak() {
        let out = encode_nv21(4, 4, &solid(4, 4, [255, 255, 255])).unwrap();
        // Broadcast range: white luma is 235, chroma neutral at 128.
        assert!(out[..16].iter().all(|&y| y == 235));
        assert!(out[16..].iter().all(|&c| c == 128));
    }

    #[test]
    fn black_maps_to_luma_16() {
        let out = encode_nv21(4, 2, &solid(4, 2, [0, 0, 0])).unwrap();
        assert!(out[..8].iter().all(|&y| y == 16));
        assert!(out[8..].iter().all(|&c| c == 128));
    }

    #[test]
    fn chroma_is_sampled_at_even_positions_in_vu_order() {
        // 2x2 image where only the top-left pixel is saturated red; the
        // single chroma pair must come from that even (0, 0) position.
        let mut rgb = solid(2, 2, [0, 0, 0]);
        rgb[0] = 255;
        let out = encode_nv21(2, 2, &rgb).unwrap();
        assert_eq!(out.len(), 8);

        let r = 255;
        let expected_v = ((112 * r - 94 * 0 - 18 * 0 + 128) >> 8) + 128;
        let expected_u = ((-38 * r - 74 * 0 + 112 * 0 + 128) >> 8) + 128;
        assert_eq!(out[4], expected_v.clamp(0, 255) as u8);
        assert_eq!(out[5], expected_u.clamp(0, 255) as u8);
    }

    #[test]
    fn odd_dimensions_allocate_full_chroma_rows() {
        let out = encode_nv21(3, 3, &solid(3, 3, [10, 20, 30])).unwrap();
        // 9 luma bytes + 2 chroma rows x 2 chroma cols x 2 bytes.
        assert_eq!(out.len(), 9 + 8);
    }

    #[test]
    fn rejects_mismatched_buffer() {
        assert!(encode_nv21(2, 2, &[0u8; 5]).is_none());
    }

    #[test]
    fn encode_frame_requires_rgb_input() {
        let nv21 = Frame {
            width: 2,
            height: 2,
            pixel_format: PixelFormat::Nv21,
            data: vec![0; 8],
            ts: None,
        };
        assert!(encode_frame(&nv21).is_none());

        let rgb = Frame::rgb(2, 2, solid(2, 2, [1, 2, 3]));
        let encoded = encode_frame(&rgb).unwrap();
        assert_eq!(encoded.pixel_format, PixelFormat::Nv21);
        assert_eq!(encoded.width, 2);
        assert_eq!(encoded.data.len(), 8);
    }
}
