pub mod backend;
pub mod deskew;
pub mod geometry;
pub mod matcher;
pub mod ocr;
pub mod overlay;
pub mod preprocessing;
pub mod steps;

use image::DynamicImage;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, instrument};

use crate::config::SearchConfig;
use crate::detection::backend::RecognitionBackend;
use crate::detection::matcher::LineMatcher;
use crate::detection::steps::{GeometricVariantsStep, PhotometricVariantsStep};
use crate::error::{LabelError, Result};
use crate::models::{BackendRole, Candidate};
use crate::pipeline::{Pipeline, PipelineData};

/// Main search orchestrator.
///
/// Builds the 12 variants of an image (4 rotations x 3 photometric
/// renditions), runs every variant through the primary backend, and only if
/// none of them yields a marker line, through the fallback backend. The
/// highest-ranked line across all attempts wins.
pub struct MarkerSearch {
    primary: Arc<dyn RecognitionBackend>,
    fallback: Option<Arc<dyn RecognitionBackend>>,
    matcher: LineMatcher,
    pipeline: Pipeline,
    config: SearchConfig,
}

impl MarkerSearch {
    pub fn new(primary: Arc<dyn RecognitionBackend>) -> Self {
        Self::with_config(primary, SearchConfig::default())
    }

    pub fn with_config(primary: Arc<dyn RecognitionBackend>, config: SearchConfig) -> Self {
        Self {
            primary,
            fallback: None,
            matcher: LineMatcher::new(&config.matcher),
            pipeline: build_variant_pipeline(&config),
            config,
        }
    }

    pub fn with_fallback(mut self, fallback: Arc<dyn RecognitionBackend>) -> Self {
        self.fallback = Some(fallback);
        self
    }

    /// Save every generated variant image under `output_dir`
    pub fn with_debug(mut self, output_dir: PathBuf) -> Result<Self> {
        self.pipeline = self.pipeline.with_debug(output_dir)?;
        Ok(self)
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    /// Search one image for the marker line.
    ///
    /// A missing marker is reported through [`Candidate::found`]; errors are
    /// reserved for empty input and backend failures, which propagate
    /// immediately.
    #[instrument(skip_all, fields(width = image.width(), height = image.height()))]
    pub fn search(&self, image: &DynamicImage) -> Result<Candidate> {
        let variants = self.pipeline.run(image)?;
        self.search_variants(image, variants)
    }

    /// Same as [`MarkerSearch::search`]; in debug mode the variants of this
    /// image are saved under a subdirectory called `name`
    #[instrument(skip(self, image), fields(width = image.width(), height = image.height()))]
    pub fn search_named(&self, image: &DynamicImage, name: &str) -> Result<Candidate> {
        let variants = self.pipeline.run_named(image, name)?;
        self.search_variants(image, variants)
    }

    fn search_variants(&self, image: &DynamicImage, variants: Vec<PipelineData>) -> Result<Candidate> {
        debug!(variants = variants.len(), "variants generated");

        let best = Candidate::new(image.clone());
        let best = self.try_backend(self.primary.as_ref(), BackendRole::Primary, &variants, best)?;

        let best = match &self.fallback {
            Some(fallback) if !best.found() && self.config.fallback_enabled => {
                info!(backend = fallback.name(), "primary found no marker line, trying fallback");
                self.try_backend(fallback.as_ref(), BackendRole::Fallback, &variants, best)?
            }
            _ => best,
        };

        match (&best.text, best.provenance()) {
            (Some(text), Some(variant)) => {
                info!(text = %text, variant = %variant, confidence = best.confidence, "marker line selected")
            }
            _ => info!(attempts = best.attempts, "no marker line found"),
        }
        Ok(best)
    }

    /// Run every variant through one backend, threading the best candidate
    fn try_backend(
        &self,
        backend: &dyn RecognitionBackend,
        role: BackendRole,
        variants: &[PipelineData],
        best: Candidate,
    ) -> Result<Candidate> {
        variants.iter().try_fold(best, |mut best, variant| {
            let raw = backend
                .recognize(&variant.image)
                .map_err(|source| LabelError::Backend {
                    backend: backend.name().to_string(),
                    source,
                })?;
            best.attempts += 1;

            let tag = variant.tag();
            let Some(found) = self.matcher.extract(&raw) else {
                debug!(backend = backend.name(), tag = ?tag, lines = raw.len(), "no match");
                return Ok(best);
            };

            debug!(
                backend = backend.name(),
                tag = ?tag,
                lines = raw.len(),
                tier = ?found.tier,
                confidence = found.line.confidence,
                "match"
            );

            if best.improves(found.tier, found.line.confidence, self.config.ranking) {
                best = Candidate {
                    text: Some(found.line.text.clone()),
                    confidence: found.line.confidence,
                    tier: Some(found.tier),
                    line: Some(found.line),
                    variant: tag,
                    backend: Some(role),
                    image: variant.image.clone(),
                    raw,
                    attempts: best.attempts,
                };
            }
            Ok(best)
        })
    }
}

/// Build the variant pipeline: rotations first, then photometric renditions
pub fn build_variant_pipeline(config: &SearchConfig) -> Pipeline {
    Pipeline::new()
        .add_step(Arc::new(GeometricVariantsStep))
        .add_step(Arc::new(PhotometricVariantsStep {
            config: config.preprocess.clone(),
        }))
}
