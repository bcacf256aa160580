use image::DynamicImage;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

use crate::error::{LabelError, Result};
use crate::models::{GeometricVariant, PhotometricVariant, VariantTag};

/// Data that flows through the pipeline
/// Each PipelineData is one variant of the input image
#[derive(Clone)]
pub struct PipelineData {
    /// The variant image (grayscale, binary or color)
    pub image: DynamicImage,

    /// Rotation applied so far (None until the geometric step ran)
    pub geometric: Option<GeometricVariant>,

    /// Photometric treatment applied (None until the photometric step ran)
    pub photometric: Option<PhotometricVariant>,

    /// Skew correction applied during preprocessing, in degrees
    pub skew_degrees: Option<f32>,
}

impl PipelineData {
    /// Create PipelineData for a full input image
    pub fn from_image(image: DynamicImage) -> Self {
        Self {
            image,
            geometric: None,
            photometric: None,
            skew_degrees: None,
        }
    }

    /// Derive a new variant from this one, keeping its provenance
    pub fn derive(&self, image: DynamicImage) -> Self {
        Self {
            image,
            geometric: self.geometric,
            photometric: self.photometric,
            skew_degrees: self.skew_degrees,
        }
    }

    /// Full tag, once both the geometric and photometric steps ran
    pub fn tag(&self) -> Option<VariantTag> {
        match (self.geometric, self.photometric) {
            (Some(geometric), Some(photometric)) => Some(VariantTag {
                geometric,
                photometric,
            }),
            _ => None,
        }
    }

    /// Partial tag used for debug file names
    fn label(&self) -> String {
        match (self.geometric, self.photometric) {
            (Some(g), Some(p)) => format!("{}+{}", g.name(), p.name()),
            (Some(g), None) => g.name().to_string(),
            (None, Some(p)) => p.name().to_string(),
            (None, None) => "input".to_string(),
        }
    }
}

/// Debug configuration for pipeline execution
#[derive(Clone, Debug)]
pub struct DebugConfig {
    /// Root directory for debug outputs
    pub output_dir: PathBuf,
}

/// Context available to all pipeline steps
#[derive(Clone, Default)]
pub struct PipelineContext {
    pub debug: Option<DebugConfig>,
}

/// Trait that all pipeline steps must implement
pub trait PipelineStep: Send + Sync {
    /// Process data and return transformed data
    /// Steps can split data (1 → many) or transform (many → many)
    fn process(&self, data: Vec<PipelineData>, context: &PipelineContext) -> Result<Vec<PipelineData>>;

    /// Human-readable name for this step (used in logs and debug directories)
    fn name(&self) -> &str;
}

/// Composable pipeline builder
pub struct Pipeline {
    steps: Vec<Arc<dyn PipelineStep>>,
    context: PipelineContext,
}

impl Pipeline {
    /// Create a new empty pipeline
    pub fn new() -> Self {
        Self {
            steps: Vec::new(),
            context: PipelineContext::default(),
        }
    }

    /// Enable debug mode with output directory
    /// The directory must be empty or non-existent
    pub fn with_debug(mut self, output_dir: PathBuf) -> Result<Self> {
        if output_dir.exists() {
            let entries = std::fs::read_dir(&output_dir)?;
            if entries.count() > 0 {
                return Err(LabelError::DebugDirNotEmpty(output_dir));
            }
        } else {
            std::fs::create_dir_all(&output_dir)?;
        }

        self.context.debug = Some(DebugConfig { output_dir });
        Ok(self)
    }

    /// Add a processing step to the pipeline
    pub fn add_step(mut self, step: Arc<dyn PipelineStep>) -> Self {
        self.steps.push(step);
        self
    }

    /// Helper method to add a step from a Box (for convenience)
    pub fn add_step_boxed(mut self, step: Box<dyn PipelineStep>) -> Self {
        self.steps.push(Arc::from(step));
        self
    }

    pub fn step_names(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.name()).collect()
    }

    /// Run the pipeline sequentially on an input image.
    /// Fails fast on an empty input; outputs keep generation order.
    pub fn run(&self, input: &DynamicImage) -> Result<Vec<PipelineData>> {
        self.run_inner(input, None)
    }

    /// Like [`Pipeline::run`], but debug images go to a subdirectory named
    /// `name`, so several inputs can share one debug directory.
    pub fn run_named(&self, input: &DynamicImage, name: &str) -> Result<Vec<PipelineData>> {
        self.run_inner(input, Some(name))
    }

    fn run_inner(&self, input: &DynamicImage, name: Option<&str>) -> Result<Vec<PipelineData>> {
        if input.width() == 0 || input.height() == 0 {
            return Err(LabelError::EmptyImage {
                width: input.width(),
                height: input.height(),
            });
        }

        let debug_root = self.context.debug.as_ref().map(|debug| match name {
            Some(name) => debug.output_dir.join(name),
            None => debug.output_dir.clone(),
        });
        let debug_root = debug_root.as_deref();

        let mut data = vec![PipelineData::from_image(input.clone())];
        save_debug(debug_root, "00_input", &data)?;

        for (step_idx, step) in self.steps.iter().enumerate() {
            debug!(step = step.name(), items = data.len(), "running pipeline step");
            data = step.process(data, &self.context)?;

            let step_dir_name = format!(
                "{:02}_{}",
                step_idx + 1,
                step.name().to_lowercase().replace(' ', "_")
            );
            save_debug(debug_root, &step_dir_name, &data)?;

            debug!(step = step.name(), items = data.len(), "pipeline step finished");
        }

        Ok(data)
    }
}

/// Save debug outputs for one step if debug mode is enabled
fn save_debug(root: Option<&Path>, step_dir_name: &str, data: &[PipelineData]) -> Result<()> {
    let Some(root) = root else {
        return Ok(());
    };

    let step_dir = root.join(step_dir_name);
    std::fs::create_dir_all(&step_dir)?;

    for (idx, item) in data.iter().enumerate() {
        let filename = format!("{:02}_{}.png", idx + 1, item.label());
        item.image.save(step_dir.join(&filename))?;
    }

    debug!(count = data.len(), dir = %step_dir.display(), "saved debug images");
    Ok(())
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new()
    }
}
