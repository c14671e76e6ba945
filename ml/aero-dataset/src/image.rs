//! Per-image pixel operations on flat HWC RGB `f32` buffers.
//!
//! Buffers are wrapped as [`Rgb32FImage`] so resampling, mirroring and
//! sampling come from the `image` crate.

use aero_types::Frame;
use image::imageops::{self, FilterType};
use image::{Rgb, Rgb32FImage};

use crate::error::{DatasetError, Result};

/// Number of color channels produced from an RGBA frame.
pub const RGB_CHANNELS: usize = 3;

fn dimension(value: usize, what: &str) -> Result<u32> {
    u32::try_from(value).map_err(|_| DatasetError::input_shape(format!("{what} {value} is too large")))
}

/// Wraps a flat RGB buffer as an image.
fn as_image(data: &[f32], height: usize, width: usize) -> Result<Rgb32FImage> {
    Rgb32FImage::from_raw(dimension(width, "width")?, dimension(height, "height")?, data.to_vec())
        .ok_or_else(|| {
            DatasetError::input_shape(format!(
                "{} values do not form a {width}x{height} RGB image",
                data.len()
            ))
        })
}

/// Converts an RGBA8 frame to an RGB image of `height x width`, values in `[0, 1]`.
///
/// Resampling uses the triangle (bilinear) filter. The alpha channel is
/// dropped.
///
/// # Errors
///
/// Returns [`DatasetError::InputShape`] if the frame is zero-sized, its buffer
/// does not hold `width * height * 4` bytes, or the target size is zero.
pub fn frame_to_rgb(frame: &Frame, height: usize, width: usize) -> Result<Vec<f32>> {
    if height == 0 || width == 0 {
        return Err(DatasetError::input_shape(format!(
            "target size {width}x{height} is empty"
        )));
    }
    frame
        .validate()
        .map_err(|e| DatasetError::input_shape(format!("frame {}: {e}", frame.id)))?;

    let rgb: Vec<f32> = frame
        .rgba
        .chunks_exact(4)
        .flat_map(|px| px[..RGB_CHANNELS].iter().map(|&v| f32::from(v) / 255.0))
        .collect();
    let source = Rgb32FImage::from_raw(frame.width(), frame.height(), rgb)
        .ok_or_else(|| DatasetError::input_shape(format!("frame {} has a short buffer", frame.id)))?;

    let resized = imageops::resize(
        &source,
        dimension(width, "width")?,
        dimension(height, "height")?,
        FilterType::Triangle,
    );
    Ok(resized.into_raw())
}

/// Returns the image mirrored left to right.
///
/// # Errors
///
/// Returns [`DatasetError::InputShape`] if `image` is not `height x width` RGB.
pub fn flip_left_right(image: &[f32], height: usize, width: usize) -> Result<Vec<f32>> {
    let source = as_image(image, height, width)?;
    Ok(imageops::flip_horizontal(&source).into_raw())
}

/// Adds `delta` to every value and clips to `[0, 1]`.
pub fn adjust_brightness(image: &mut [f32], delta: f32) {
    for v in image {
        *v = (*v + delta).clamp(0.0, 1.0);
    }
}

/// Returns the image rotated by `angle` radians about its center.
///
/// The center is `(width * 0.5, height * 0.5)`. Each output pixel takes the
/// nearest source pixel; positions outside the source are filled with zero.
///
/// # Errors
///
/// Returns [`DatasetError::InputShape`] if `image` is not `height x width` RGB.
#[allow(clippy::cast_precision_loss)]
pub fn rotate(image: &[f32], height: usize, width: usize, angle: f32) -> Result<Vec<f32>> {
    let source = as_image(image, height, width)?;
    let (sin, cos) = angle.sin_cos();
    let cx = width as f32 * 0.5;
    let cy = height as f32 * 0.5;

    let rotated = Rgb32FImage::from_fn(source.width(), source.height(), |col, row| {
        let dx = col as f32 - cx;
        let dy = row as f32 - cy;
        let src_x = (dx * cos - dy * sin + cx).round();
        let src_y = (dx * sin + dy * cos + cy).round();
        imageops::interpolate_nearest(&source, src_x, src_y).unwrap_or(Rgb([0.0; 3]))
    });
    Ok(rotated.into_raw())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    #[allow(clippy::cast_precision_loss)]
    fn numbered(height: usize, width: usize) -> Vec<f32> {
        (0..height * width * 3).map(|v| v as f32).collect()
    }

    fn pixel(image: &[f32], width: usize, row: usize, col: usize) -> &[f32] {
        let start = (row * width + col) * 3;
        &image[start..start + 3]
    }

    #[test]
    fn frame_to_rgb_same_size_scales_values() {
        let frame = Frame::solid(0, 0.0, 2, 2, [255, 0, 51, 7]);
        let rgb = frame_to_rgb(&frame, 2, 2).unwrap();
        assert_eq!(rgb.len(), 2 * 2 * 3);
        for px in rgb.chunks_exact(3) {
            assert_relative_eq!(px[0], 1.0, epsilon = 1e-6);
            assert_relative_eq!(px[1], 0.0, epsilon = 1e-6);
            assert_relative_eq!(px[2], 0.2, epsilon = 1e-6);
        }
    }

    #[test]
    fn frame_to_rgb_interpolates() {
        // 2x1 frame: black then white; upsample to 4 columns.
        let mut rgba = vec![0, 0, 0, 255];
        rgba.extend_from_slice(&[255, 255, 255, 255]);
        let frame = Frame::new(0, 0.0, rgba, 2, 1);

        let rgb = frame_to_rgb(&frame, 1, 4).unwrap();
        let reds: Vec<f32> = rgb.chunks_exact(3).map(|p| p[0]).collect();
        assert_eq!(reds.len(), 4);
        assert!(reds.windows(2).all(|w| w[0] <= w[1]));
        assert!(reds[0] < 0.5 && reds[3] > 0.5);
        assert!(reds[1] > 0.0 && reds[2] < 1.0);
        assert!(reds.iter().all(|v| (0.0..=1.0).contains(v)));
    }

    #[test]
    fn frame_to_rgb_uniform_downsample() {
        let frame = Frame::solid(1, 0.0, 16, 12, [51, 102, 204, 255]);
        let rgb = frame_to_rgb(&frame, 3, 4).unwrap();
        assert_eq!(rgb.len(), 3 * 4 * 3);
        for px in rgb.chunks_exact(3) {
            assert_relative_eq!(px[0], 0.2, epsilon = 1e-5);
            assert_relative_eq!(px[1], 0.4, epsilon = 1e-5);
            assert_relative_eq!(px[2], 0.8, epsilon = 1e-5);
        }
    }

    #[test]
    fn frame_to_rgb_rejects_bad_buffers() {
        let short = Frame::new(3, 0.0, vec![0; 7], 2, 1);
        assert!(matches!(
            frame_to_rgb(&short, 4, 4),
            Err(DatasetError::InputShape(_))
        ));

        let empty = Frame::new(4, 0.0, Vec::new(), 0, 0);
        assert!(frame_to_rgb(&empty, 4, 4).is_err());

        let ok = Frame::solid(5, 0.0, 2, 2, [0; 4]);
        assert!(frame_to_rgb(&ok, 0, 4).is_err());
    }

    #[test]
    fn flip_mirrors_columns_and_keeps_channels() {
        let img = numbered(2, 3);
        let out = flip_left_right(&img, 2, 3).unwrap();
        assert_eq!(pixel(&out, 3, 0, 0), pixel(&img, 3, 0, 2));
        assert_eq!(pixel(&out, 3, 0, 1), pixel(&img, 3, 0, 1));
        assert_eq!(pixel(&out, 3, 1, 2), pixel(&img, 3, 1, 0));
        assert_eq!(flip_left_right(&out, 2, 3).unwrap(), img);
    }

    #[test]
    fn wrong_buffer_size_is_rejected() {
        assert!(flip_left_right(&[0.0; 5], 1, 2).is_err());
        assert!(rotate(&[0.0; 5], 1, 2, 0.3).is_err());
    }

    #[test]
    fn brightness_clips() {
        let mut img = vec![0.0, 0.5, 0.95];
        adjust_brightness(&mut img, 0.1);
        assert_relative_eq!(img[0], 0.1);
        assert_relative_eq!(img[1], 0.6);
        assert_relative_eq!(img[2], 1.0);

        adjust_brightness(&mut img, -0.5);
        assert_relative_eq!(img[0], 0.0);
    }

    #[test]
    fn rotate_zero_is_identity() {
        let img = numbered(3, 4);
        assert_eq!(rotate(&img, 3, 4, 0.0).unwrap(), img);
    }

    #[test]
    fn rotate_quarter_turn() {
        let img = numbered(4, 4);
        let out = rotate(&img, 4, 4, std::f32::consts::FRAC_PI_2).unwrap();
        // Output (r, c) samples input (row = c, col = 4 - r); row 0 falls outside.
        assert!(out[..4 * 3].iter().all(|&v| v == 0.0));
        assert_eq!(pixel(&out, 4, 1, 0), pixel(&img, 4, 0, 3));
        assert_eq!(pixel(&out, 4, 3, 2), pixel(&img, 4, 2, 1));
    }
}
