use image::{DynamicImage, GrayImage, Luma};
use imageproc::contrast::{ThresholdType, otsu_level, threshold};
use imageproc::filter::gaussian_blur_f32;
use imageproc::morphology::{Mask, grayscale_dilate};
use tracing::debug;

use crate::config::PreprocessConfig;
use crate::detection::deskew::{SkewCorrection, deskew};
use crate::error::{LabelError, Result};
use crate::models::PhotometricVariant;

/// Convert image to grayscale. Empty images are rejected.
pub fn to_grayscale(img: &DynamicImage) -> Result<GrayImage> {
    if img.width() == 0 || img.height() == 0 {
        return Err(LabelError::EmptyImage {
            width: img.width(),
            height: img.height(),
        });
    }
    Ok(img.to_luma8())
}

/// Apply Gaussian blur to reduce noise
pub fn apply_blur(img: &GrayImage, sigma: f32) -> GrayImage {
    gaussian_blur_f32(img, sigma)
}

/// Contrast-limited adaptive histogram equalization.
///
/// The image is split into `tiles` x `tiles` regions, each equalized with its
/// histogram clipped at `clip_limit` times the mean bin height. Pixels are
/// mapped by bilinear interpolation between the four nearest tile mappings.
pub fn apply_clahe(img: &GrayImage, clip_limit: f32, tiles: u32) -> GrayImage {
    let (width, height) = img.dimensions();
    if width == 0 || height == 0 {
        return img.clone();
    }

    let tile_w = width.div_ceil(tiles.clamp(1, width));
    let tile_h = height.div_ceil(tiles.clamp(1, height));
    let tiles_x = width.div_ceil(tile_w);
    let tiles_y = height.div_ceil(tile_h);

    let mut luts = Vec::with_capacity((tiles_x * tiles_y) as usize);
    for ty in 0..tiles_y {
        for tx in 0..tiles_x {
            let x0 = tx * tile_w;
            let y0 = ty * tile_h;
            let x1 = (x0 + tile_w).min(width);
            let y1 = (y0 + tile_h).min(height);

            let mut histogram = [0u32; 256];
            for y in y0..y1 {
                for x in x0..x1 {
                    histogram[img.get_pixel(x, y)[0] as usize] += 1;
                }
            }
            luts.push(tile_lut(&mut histogram, (x1 - x0) * (y1 - y0), clip_limit));
        }
    }

    let lut_at = |tx: u32, ty: u32| &luts[(ty * tiles_x + tx) as usize];

    GrayImage::from_fn(width, height, |x, y| {
        let fx = ((x as f32 + 0.5) / tile_w as f32 - 0.5).clamp(0.0, (tiles_x - 1) as f32);
        let fy = ((y as f32 + 0.5) / tile_h as f32 - 0.5).clamp(0.0, (tiles_y - 1) as f32);
        let tx0 = fx.floor() as u32;
        let ty0 = fy.floor() as u32;
        let tx1 = (tx0 + 1).min(tiles_x - 1);
        let ty1 = (ty0 + 1).min(tiles_y - 1);
        let ax = fx - tx0 as f32;
        let ay = fy - ty0 as f32;

        let v = img.get_pixel(x, y)[0] as usize;
        let top = lut_at(tx0, ty0)[v] as f32 * (1.0 - ax) + lut_at(tx1, ty0)[v] as f32 * ax;
        let bottom = lut_at(tx0, ty1)[v] as f32 * (1.0 - ax) + lut_at(tx1, ty1)[v] as f32 * ax;
        let value = top * (1.0 - ay) + bottom * ay;

        Luma([value.round().clamp(0.0, 255.0) as u8])
    })
}

/// Build the equalization mapping of one tile, redistributing clipped counts
fn tile_lut(histogram: &mut [u32; 256], area: u32, clip_limit: f32) -> [u8; 256] {
    if clip_limit > 0.0 {
        let clip = ((clip_limit * area as f32 / 256.0) as u32).max(1);
        let mut excess = 0u32;
        for bin in histogram.iter_mut() {
            if *bin > clip {
                excess += *bin - clip;
                *bin = clip;
            }
        }

        let bonus = excess / 256;
        let residual = excess % 256;
        for (i, bin) in histogram.iter_mut().enumerate() {
            *bin += bonus;
            if (i as u32) < residual {
                *bin += 1;
            }
        }
    }

    let scale = 255.0 / area.max(1) as f32;
    let mut lut = [0u8; 256];
    let mut cumulative = 0u32;
    for (i, &count) in histogram.iter().enumerate() {
        cumulative += count;
        lut[i] = (cumulative as f32 * scale).round().min(255.0) as u8;
    }
    lut
}

/// Global Otsu threshold to a 0/255 binary image
pub fn binarize_otsu(gray: &GrayImage) -> GrayImage {
    let level = otsu_level(gray);
    debug!(level, "Otsu threshold computed");
    threshold(gray, level, ThresholdType::Binary)
}

/// Grayscale dilation with a `kernel` x `kernel` square (max filter).
/// Non-zero pixels are foreground; the anchor sits at `kernel / 2` so a 2x2
/// kernel covers offsets -1..=0 on both axes.
pub fn dilate_square(img: &GrayImage, kernel: u32) -> GrayImage {
    let kernel = kernel.clamp(1, 255);
    let anchor = (kernel / 2) as u8;
    let mask = Mask::from_image(&GrayImage::from_pixel(kernel, kernel, Luma([255u8])), anchor, anchor);
    grayscale_dilate(img, &mask)
}

/// Grayscale and binary renditions of one image, before variant splitting
pub struct Preprocessed {
    /// Contrast-normalized, denoised, deskewed grayscale
    pub gray: GrayImage,
    /// Otsu-thresholded `gray`
    pub binary: GrayImage,
    pub skew: SkewCorrection,
}

/// Light-touch preprocessing tuned for photographed labels:
/// grayscale, CLAHE, gentle blur, conservative deskew, Otsu threshold
pub fn preprocess_image(img: &DynamicImage, config: &PreprocessConfig) -> Result<Preprocessed> {
    let gray = to_grayscale(img)?;
    let gray = apply_clahe(&gray, config.clahe_clip_limit, config.clahe_tiles);
    let gray = apply_blur(&gray, config.blur_sigma);

    let (gray, skew) = if config.deskew {
        deskew(&gray, config)
    } else {
        (
            gray,
            SkewCorrection {
                estimated_degrees: 0.0,
                applied: false,
            },
        )
    };

    let binary = binarize_otsu(&gray);
    Ok(Preprocessed { gray, binary, skew })
}

/// The three photometric variants of one image, in fixed order:
/// binary, dilated binary, grayscale
pub fn photometric_variants(
    img: &DynamicImage,
    config: &PreprocessConfig,
) -> Result<(SkewCorrection, Vec<(PhotometricVariant, DynamicImage)>)> {
    let Preprocessed { gray, binary, skew } = preprocess_image(img, config)?;
    let dilated = dilate_square(&binary, config.dilation_kernel);

    let variants = vec![
        (PhotometricVariant::Binary, DynamicImage::ImageLuma8(binary)),
        (PhotometricVariant::Dilate, DynamicImage::ImageLuma8(dilated)),
        (PhotometricVariant::Gray, DynamicImage::ImageLuma8(gray)),
    ];
    Ok((skew, variants))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clahe_keeps_uniform_image_uniform() {
        let gray = GrayImage::from_pixel(64, 48, Luma([128u8]));
        let out = apply_clahe(&gray, 2.0, 8);

        let first = out.get_pixel(0, 0)[0];
        assert!(out.pixels().all(|p| p[0] == first));
    }

    #[test]
    fn test_tile_lut_without_clipping_equalizes() {
        let mut histogram = [0u32; 256];
        histogram[10] = 50;
        histogram[200] = 14;
        let lut = tile_lut(&mut histogram, 64, 0.0);

        assert_eq!(lut[10], 199);
        assert_eq!(lut[200], 255);
    }

    #[test]
    fn test_tile_lut_is_monotonic() {
        let mut histogram = [0u32; 256];
        histogram[10] = 50;
        histogram[200] = 14;
        let lut = tile_lut(&mut histogram, 64, 2.0);

        assert!(lut.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(lut[255], 255);
    }

    #[test]
    fn test_dilate_2x2_grows_single_pixel() {
        let mut img = GrayImage::new(5, 5);
        img.put_pixel(2, 2, Luma([255]));
        let out = dilate_square(&img, 2);

        // anchor (1, 1): the pixel spreads right and down
        for (x, y) in [(2, 2), (3, 2), (2, 3), (3, 3)] {
            assert_eq!(out.get_pixel(x, y)[0], 255, "({}, {})", x, y);
        }
        assert_eq!(out.pixels().filter(|p| p[0] == 255).count(), 4);
    }

    #[test]
    fn test_dilate_odd_kernel_is_centred() {
        let mut img = GrayImage::new(7, 7);
        img.put_pixel(3, 3, Luma([200]));
        let out = dilate_square(&img, 3);

        for y in 2..=4 {
            for x in 2..=4 {
                assert_eq!(out.get_pixel(x, y)[0], 200, "({}, {})", x, y);
            }
        }
        assert_eq!(out.pixels().filter(|p| p[0] > 0).count(), 9);
    }

    #[test]
    fn test_binarize_is_two_level() {
        let gray = GrayImage::from_fn(20, 10, |x, _| Luma([if x < 10 { 40 } else { 210 }]));
        let binary = binarize_otsu(&gray);

        assert!(binary.pixels().all(|p| p[0] == 0 || p[0] == 255));
        assert_eq!(binary.get_pixel(0, 0)[0], 0);
        assert_eq!(binary.get_pixel(19, 0)[0], 255);
    }

    #[test]
    fn test_empty_image_is_input_error() {
        let empty = DynamicImage::new_luma8(0, 0);
        let result = to_grayscale(&empty);
        assert!(matches!(result, Err(LabelError::EmptyImage { .. })));
    }
}
