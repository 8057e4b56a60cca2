//! Low-level raster helpers: blending, shape coverage, blur, sampling.
//!
//! Output frames are opaque; overlays are blended onto them with straight
//! alpha and a separate coverage factor.

use crate::frame::RgbaFrame;

#[inline]
pub(crate) fn mul_div255(x: u16, y: u16) -> u16 {
    (((u32::from(x) * u32::from(y)) + 127) / 255) as u16
}

/// Blend `color` over the pixel at byte offset `i` with extra `coverage`.
#[inline]
pub fn blend_at(data: &mut [u8], i: usize, color: [u8; 4], coverage: f32) {
    let a = (color[3] as f32 * coverage.clamp(0.0, 1.0)).round() as u16;
    if a == 0 {
        return;
    }
    let inv = 255 - a;
    for c in 0..3 {
        data[i + c] = (mul_div255(color[c] as u16, a) + mul_div255(data[i + c] as u16, inv)).min(255) as u8;
    }
    data[i + 3] = (a + mul_div255(data[i + 3] as u16, inv)).min(255) as u8;
}

/// Blend `color` over pixel `(x, y)` if it lies inside the frame.
#[inline]
pub fn blend_pixel(frame: &mut RgbaFrame, x: i64, y: i64, color: [u8; 4], coverage: f32) {
    if x < 0 || y < 0 || x >= frame.width as i64 || y >= frame.height as i64 {
        return;
    }
    let i = frame.index(x as u32, y as u32);
    blend_at(&mut frame.data, i, color, coverage);
}

/// Fill a rounded rectangle with anti-aliased edges.
pub fn fill_rounded_rect(
    frame: &mut RgbaFrame,
    x: f64,
    y: f64,
    w: f64,
    h: f64,
    radius: f64,
    color: [u8; 4],
) {
    if w <= 0.0 || h <= 0.0 {
        return;
    }
    let x0 = x.floor().max(0.0) as i64;
    let y0 = y.floor().max(0.0) as i64;
    let x1 = ((x + w).ceil() as i64).min(frame.width as i64);
    let y1 = ((y + h).ceil() as i64).min(frame.height as i64);
    for py in y0..y1 {
        for px in x0..x1 {
            let cov = rounded_rect_coverage(px as f64 + 0.5 - x, py as f64 + 0.5 - y, w, h, radius);
            if cov > 0.0 {
                blend_pixel(frame, px, py, color, cov);
            }
        }
    }
}

/// Fill a circle with anti-aliased edges.
pub fn fill_circle(frame: &mut RgbaFrame, cx: f64, cy: f64, radius: f64, color: [u8; 4]) {
    if radius <= 0.0 {
        return;
    }
    let x0 = (cx - radius).floor() as i64;
    let y0 = (cy - radius).floor() as i64;
    let x1 = (cx + radius).ceil() as i64;
    let y1 = (cy + radius).ceil() as i64;
    for py in y0..=y1 {
        for px in x0..=x1 {
            let d = ((px as f64 + 0.5 - cx).powi(2) + (py as f64 + 0.5 - cy).powi(2)).sqrt();
            let cov = (radius - d + 0.5).clamp(0.0, 1.0) as f32;
            if cov > 0.0 {
                blend_pixel(frame, px, py, color, cov);
            }
        }
    }
}

/// Stroke a circle outline of the given thickness.
pub fn stroke_circle(
    frame: &mut RgbaFrame,
    cx: f64,
    cy: f64,
    radius: f64,
    thickness: f64,
    color: [u8; 4],
) {
    if radius <= 0.0 || thickness <= 0.0 {
        return;
    }
    let half = thickness / 2.0;
    let outer = radius + half;
    let x0 = (cx - outer).floor() as i64;
    let y0 = (cy - outer).floor() as i64;
    let x1 = (cx + outer).ceil() as i64;
    let y1 = (cy + outer).ceil() as i64;
    for py in y0..=y1 {
        for px in x0..=x1 {
            let d = ((px as f64 + 0.5 - cx).powi(2) + (py as f64 + 0.5 - cy).powi(2)).sqrt();
            let cov = (half - (d - radius).abs() + 0.5).clamp(0.0, 1.0) as f32;
            if cov > 0.0 {
                blend_pixel(frame, px, py, color, cov);
            }
        }
    }
}

/// Coverage of pixel centre `(px, py)` by a rounded rectangle anchored at the
/// origin with size `w x h`.
pub fn rounded_rect_coverage(px: f64, py: f64, w: f64, h: f64, radius: f64) -> f32 {
    let r = radius.clamp(0.0, w.min(h) / 2.0);
    // Signed distance to the rounded rectangle, negative inside.
    let qx = (px - w / 2.0).abs() - (w / 2.0 - r);
    let qy = (py - h / 2.0).abs() - (h / 2.0 - r);
    let outside = (qx.max(0.0).powi(2) + qy.max(0.0).powi(2)).sqrt();
    let inside = qx.max(qy).min(0.0);
    let dist = outside + inside - r;
    (0.5 - dist).clamp(0.0, 1.0) as f32
}

/// Alpha mask of a rounded rectangle, one byte per pixel.
pub fn rounded_rect_mask(width: u32, height: u32, radius: f64) -> Vec<u8> {
    let mut mask = vec![255u8; width as usize * height as usize];
    if radius <= 0.0 {
        return mask;
    }
    let (w, h) = (width as f64, height as f64);
    // Only the corner squares can be partially covered.
    let band = radius.ceil().min(w.min(h) / 2.0 + 1.0) as u32;
    for y in 0..height {
        let in_band_y = y < band || y >= height.saturating_sub(band);
        if !in_band_y {
            continue;
        }
        for x in (0..band.min(width)).chain(width.saturating_sub(band).max(band.min(width))..width) {
            let cov = rounded_rect_coverage(x as f64 + 0.5, y as f64 + 0.5, w, h, radius);
            mask[y as usize * width as usize + x as usize] = (cov * 255.0).round() as u8;
        }
    }
    mask
}

/// Separable gaussian blur of a single-channel mask.
///
/// Weights are fixed-point Q16 so the result is bit-exact across platforms.
pub fn blur_mask(src: &[u8], width: u32, height: u32, radius: u32) -> Vec<u8> {
    if radius == 0 || width == 0 || height == 0 {
        return src.to_vec();
    }
    let kernel = gaussian_kernel_q16(radius, radius as f64 / 2.0);
    let mut tmp = vec![0u8; src.len()];
    let mut out = vec![0u8; src.len()];
    let (w, h) = (width as i64, height as i64);
    let r = radius as i64;

    for y in 0..h {
        let row = (y * w) as usize;
        for x in 0..w {
            let mut acc = 0u64;
            for (ki, &kw) in kernel.iter().enumerate() {
                let sx = x + ki as i64 - r;
                if (0..w).contains(&sx) {
                    acc += kw as u64 * src[row + sx as usize] as u64;
                }
            }
            tmp[row + x as usize] = q16_to_u8(acc);
        }
    }
    for y in 0..h {
        for x in 0..w {
            let mut acc = 0u64;
            for (ki, &kw) in kernel.iter().enumerate() {
                let sy = y + ki as i64 - r;
                if (0..h).contains(&sy) {
                    acc += kw as u64 * tmp[(sy * w + x) as usize] as u64;
                }
            }
            out[(y * w + x) as usize] = q16_to_u8(acc);
        }
    }
    out
}

fn gaussian_kernel_q16(radius: u32, sigma: f64) -> Vec<u32> {
    let r = radius as i64;
    let sigma = sigma.max(0.5);
    let denom = 2.0 * sigma * sigma;
    let weights_f: Vec<f64> = (-r..=r).map(|i| (-(i * i) as f64 / denom).exp()).collect();
    let sum: f64 = weights_f.iter().sum();

    let mut weights: Vec<u32> = weights_f
        .iter()
        .map(|wf| ((wf / sum) * 65536.0).round().clamp(0.0, 65536.0) as u32)
        .collect();
    let acc: i64 = weights.iter().map(|&w| w as i64).sum();
    let mid = weights.len() / 2;
    weights[mid] = (weights[mid] as i64 + 65536 - acc).clamp(0, 65536) as u32;
    weights
}

fn q16_to_u8(acc: u64) -> u8 {
    ((acc + 32768) >> 16).min(255) as u8
}

/// Bilinear sample of `src` at continuous coordinates (pixel centres at +0.5).
/// Coordinates are clamped to the edge.
pub fn sample_bilinear(src: &RgbaFrame, x: f64, y: f64) -> [u8; 4] {
    let fx = (x - 0.5).clamp(0.0, (src.width - 1) as f64);
    let fy = (y - 0.5).clamp(0.0, (src.height - 1) as f64);
    let x0 = fx.floor() as u32;
    let y0 = fy.floor() as u32;
    let x1 = (x0 + 1).min(src.width - 1);
    let y1 = (y0 + 1).min(src.height - 1);
    let tx = fx - x0 as f64;
    let ty = fy - y0 as f64;

    let p00 = src.pixel(x0, y0);
    let p10 = src.pixel(x1, y0);
    let p01 = src.pixel(x0, y1);
    let p11 = src.pixel(x1, y1);

    let mut out = [0u8; 4];
    for c in 0..4 {
        let top = p00[c] as f64 * (1.0 - tx) + p10[c] as f64 * tx;
        let bottom = p01[c] as f64 * (1.0 - tx) + p11[c] as f64 * tx;
        out[c] = (top * (1.0 - ty) + bottom * ty).round().clamp(0.0, 255.0) as u8;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blend_opaque_replaces() {
        let mut data = vec![10u8, 20, 30, 255];
        blend_at(&mut data, 0, [200, 100, 50, 255], 1.0);
        assert_eq!(data, vec![200, 100, 50, 255]);
    }

    #[test]
    fn test_blend_half_over_black() {
        let mut data = vec![0u8, 0, 0, 255];
        blend_at(&mut data, 0, [255, 0, 0, 255], 0.5);
        assert_eq!(data[0], 128);
        assert_eq!(data[3], 255);
    }

    #[test]
    fn test_zero_radius_mask_is_opaque() {
        let mask = rounded_rect_mask(16, 8, 0.0);
        assert!(mask.iter().all(|&a| a == 255));
    }

    #[test]
    fn test_rounded_mask_corners_and_centre() {
        let mask = rounded_rect_mask(64, 40, 12.0);
        assert_eq!(mask[0], 0);
        assert_eq!(mask[63], 0);
        assert_eq!(mask[39 * 64], 0);
        assert_eq!(mask[39 * 64 + 63], 0);
        assert_eq!(mask[20 * 64 + 32], 255);
        // Edge midpoints are inside the straight part of the border.
        assert_eq!(mask[32], 255);
    }

    #[test]
    fn test_blur_constant_mask_is_identity() {
        let src = vec![200u8; 12 * 9];
        let out = blur_mask(&src, 12, 9, 3);
        // Interior pixels keep their value; edges lose energy to the outside.
        assert_eq!(out[4 * 12 + 6], 200);
    }

    #[test]
    fn test_blur_spreads_single_pixel() {
        let mut src = vec![0u8; 9 * 9];
        src[4 * 9 + 4] = 255;
        let out = blur_mask(&src, 9, 9, 2);
        assert!(out[4 * 9 + 4] < 255);
        assert!(out[4 * 9 + 5] > 0);
    }

    #[test]
    fn test_bilinear_identity_at_centres() {
        let mut f = RgbaFrame::new(2, 1);
        f.put_pixel(0, 0, [0, 0, 0, 255]);
        f.put_pixel(1, 0, [200, 200, 200, 255]);
        assert_eq!(sample_bilinear(&f, 0.5, 0.5), [0, 0, 0, 255]);
        assert_eq!(sample_bilinear(&f, 1.5, 0.5), [200, 200, 200, 255]);
        assert_eq!(sample_bilinear(&f, 1.0, 0.5), [100, 100, 100, 255]);
    }
}
