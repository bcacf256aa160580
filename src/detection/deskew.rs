//! Conservative automatic deskew
//!
//! Skew is measured from straight edges found by Canny + Hough voting. Only
//! near-horizontal lines take part, and small angles are left alone so
//! well-aligned labels are never resampled.

use image::{GrayImage, Luma};
use imageproc::edges::canny;
use imageproc::geometric_transformations::{Interpolation, warp_with};
use imageproc::hough::{LineDetectionOptions, detect_lines};
use tracing::debug;

use crate::config::PreprocessConfig;

const PAD: u32 = 3;

/// Outcome of one deskew decision
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SkewCorrection {
    /// Median skew of the detected lines in degrees, clockwise positive
    pub estimated_degrees: f32,
    /// Whether the image was rotated back by `estimated_degrees`
    pub applied: bool,
}

/// Estimate the skew of a grayscale image in degrees (clockwise positive).
/// Returns 0.0 when no usable line is found.
pub fn estimate_skew_angle(gray: &GrayImage, config: &PreprocessConfig) -> f32 {
    let edges = canny(gray, config.canny_low, config.canny_high);
    let lines = detect_lines(
        &edges,
        LineDetectionOptions {
            vote_threshold: config.hough_vote_threshold,
            suppression_radius: config.hough_suppression_radius,
        },
    );

    // a horizontal line has its normal at 90°
    let mut angles: Vec<f32> = lines
        .iter()
        .map(|line| line.angle_in_degrees as f32 - 90.0)
        .filter(|angle| angle.abs() < config.max_skew_degrees)
        .collect();

    debug!(lines = lines.len(), candidates = angles.len(), "skew line candidates");

    median(&mut angles).unwrap_or(0.0)
}

/// Rotate counter-clockwise by `degrees` about the image center with bicubic
/// sampling. Pixels mapped from outside the image repeat the nearest edge.
pub fn rotate_replicate(gray: &GrayImage, degrees: f32) -> GrayImage {
    let (width, height) = gray.dimensions();
    if width == 0 || height == 0 {
        return gray.clone();
    }

    // bicubic sampling reads a 4x4 neighbourhood; a replicated border keeps it in bounds
    let padded = GrayImage::from_fn(width + 2 * PAD, height + 2 * PAD, |x, y| {
        let sx = x.saturating_sub(PAD).min(width - 1);
        let sy = y.saturating_sub(PAD).min(height - 1);
        *gray.get_pixel(sx, sy)
    });

    let (sin, cos) = degrees.to_radians().sin_cos();
    let pad = PAD as f32;
    let cx = width as f32 / 2.0;
    let cy = height as f32 / 2.0;
    let max_x = (width - 1) as f32;
    let max_y = (height - 1) as f32;

    let rotated = warp_with(
        &padded,
        move |x, y| {
            let dx = x - pad - cx;
            let dy = y - pad - cy;
            let src_x = (cx + dx * cos - dy * sin).clamp(0.0, max_x);
            let src_y = (cy + dx * sin + dy * cos).clamp(0.0, max_y);
            (src_x + pad, src_y + pad)
        },
        Interpolation::Bicubic,
        Luma([255u8]),
    );

    image::imageops::crop_imm(&rotated, PAD, PAD, width, height).to_image()
}

/// Estimate skew and undo it when it exceeds the configured threshold
pub fn deskew(gray: &GrayImage, config: &PreprocessConfig) -> (GrayImage, SkewCorrection) {
    let angle = estimate_skew_angle(gray, config);

    if angle.abs() > config.skew_threshold_degrees {
        debug!(angle, "deskewing");
        let rotated = rotate_replicate(gray, angle);
        (
            rotated,
            SkewCorrection {
                estimated_degrees: angle,
                applied: true,
            },
        )
    } else {
        debug!(angle, "skew below threshold, leaving image unrotated");
        (
            gray.clone(),
            SkewCorrection {
                estimated_degrees: angle,
                applied: false,
            },
        )
    }
}

fn median(values: &mut [f32]) -> Option<f32> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(|a, b| a.total_cmp(b));
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        Some((values[mid - 1] + values[mid]) / 2.0)
    } else {
        Some(values[mid])
    }
}
