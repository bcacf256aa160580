use crate::config::PreprocessConfig;
use crate::detection::{geometry, preprocessing};
use crate::error::Result;
use crate::pipeline::{PipelineContext, PipelineData, PipelineStep};
use tracing::debug;

/// Split each image into its four whole-image rotations
pub struct GeometricVariantsStep;

impl PipelineStep for GeometricVariantsStep {
    fn process(&self, data: Vec<PipelineData>, _context: &PipelineContext) -> Result<Vec<PipelineData>> {
        let mut result = Vec::with_capacity(data.len() * 4);
        for item in data {
            for (variant, rotated) in geometry::rotate_variants(&item.image) {
                let mut new_item = item.derive(rotated);
                new_item.geometric = Some(variant);
                result.push(new_item);
            }
        }
        Ok(result)
    }

    fn name(&self) -> &str {
        "Geometric Variants"
    }
}

/// Split each image into binary, dilated and grayscale renditions
pub struct PhotometricVariantsStep {
    pub config: PreprocessConfig,
}

impl PipelineStep for PhotometricVariantsStep {
    fn process(&self, data: Vec<PipelineData>, _context: &PipelineContext) -> Result<Vec<PipelineData>> {
        let mut result = Vec::with_capacity(data.len() * 3);
        for item in data {
            let (skew, variants) = preprocessing::photometric_variants(&item.image, &self.config)?;
            debug!(
                geometric = ?item.geometric,
                skew = skew.estimated_degrees,
                applied = skew.applied,
                "photometric variants built"
            );

            for (variant, image) in variants {
                let mut new_item = item.derive(image);
                new_item.photometric = Some(variant);
                new_item.skew_degrees = Some(if skew.applied { skew.estimated_degrees } else { 0.0 });
                result.push(new_item);
            }
        }
        Ok(result)
    }

    fn name(&self) -> &str {
        "Photometric Variants"
    }
}
