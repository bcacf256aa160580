use image::DynamicImage;

use crate::models::GeometricVariant;

/// Apply one whole-image rotation, producing a fresh buffer
pub fn rotate(img: &DynamicImage, variant: GeometricVariant) -> DynamicImage {
    match variant {
        GeometricVariant::Identity => img.clone(),
        GeometricVariant::Clockwise90 => img.rotate90(),
        GeometricVariant::CounterClockwise90 => img.rotate270(),
        GeometricVariant::Rotate180 => img.rotate180(),
    }
}

/// The four rotations searched for every image, in fixed order:
/// identity, clockwise 90°, counter-clockwise 90°, 180°
pub fn rotate_variants(img: &DynamicImage) -> Vec<(GeometricVariant, DynamicImage)> {
    GeometricVariant::ALL
        .iter()
        .map(|&variant| (variant, rotate(img, variant)))
        .collect()
}
