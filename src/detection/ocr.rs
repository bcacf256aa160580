use image::DynamicImage;
use ocrs::{DecodeMethod, ImageSource, OcrEngine, OcrEngineParams, TextItem};
use rten::Model;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::config::BackendConfig;
use crate::detection::backend::RecognitionBackend;
use crate::error::LabelError;
use crate::models::{Point, RawDetection};

const DETECTION_MODEL_FILE: &str = "text-detection.rten";
const RECOGNITION_MODEL_FILE: &str = "text-recognition.rten";

/// Standard ocrs model cache location (`~/.cache/ocrs`)
pub fn default_models_dir() -> anyhow::Result<PathBuf> {
    let home_dir = std::env::var("HOME").or_else(|_| std::env::var("USERPROFILE"))?;
    Ok(Path::new(&home_dir).join(".cache/ocrs"))
}

/// Initialize an OCR engine with the models found in `models_dir`
pub fn init_ocr_engine(models_dir: &Path, decode_method: DecodeMethod) -> anyhow::Result<OcrEngine> {
    let detection_model_path = models_dir.join(DETECTION_MODEL_FILE);
    let recognition_model_path = models_dir.join(RECOGNITION_MODEL_FILE);

    if !detection_model_path.exists() || !recognition_model_path.exists() {
        return Err(LabelError::ModelsNotFound {
            detection: detection_model_path,
            recognition: recognition_model_path,
        }
        .into());
    }

    let detection_model = Model::load_file(&detection_model_path)?;
    let recognition_model = Model::load_file(&recognition_model_path)?;

    let engine = OcrEngine::new(OcrEngineParams {
        detection_model: Some(detection_model),
        recognition_model: Some(recognition_model),
        decode_method,
        ..Default::default()
    })?;

    Ok(engine)
}

/// Recognition backend running the pure-Rust ocrs engine.
///
/// Emits one detection per recognised text line, bounded by the line's
/// oriented rectangle. ocrs reports no per-line score, so every line carries
/// the configured fixed confidence.
pub struct OcrsBackend {
    name: String,
    engine: OcrEngine,
    line_confidence: f32,
}

impl OcrsBackend {
    /// Primary flavour: greedy CTC decoding
    pub fn primary(config: &BackendConfig) -> anyhow::Result<Self> {
        Self::load("ocrs-greedy", config, DecodeMethod::Greedy)
    }

    /// Fallback flavour: beam search decoding, slower but more accurate
    pub fn fallback(config: &BackendConfig) -> anyhow::Result<Self> {
        Self::load(
            "ocrs-beam",
            config,
            DecodeMethod::BeamSearch {
                width: config.fallback_beam_width,
            },
        )
    }

    fn load(name: &str, config: &BackendConfig, decode_method: DecodeMethod) -> anyhow::Result<Self> {
        let models_dir = match &config.models_dir {
            Some(dir) => dir.clone(),
            None => default_models_dir()?,
        };
        info!(backend = name, models_dir = %models_dir.display(), "initializing OCR engine");
        let engine = init_ocr_engine(&models_dir, decode_method)?;

        Ok(Self {
            name: name.to_string(),
            engine,
            line_confidence: config.line_confidence,
        })
    }
}

impl RecognitionBackend for OcrsBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn recognize(&self, image: &DynamicImage) -> anyhow::Result<Vec<RawDetection>> {
        // ocrs expects RGB input
        let img = image.to_rgb8();
        let img_source = ImageSource::from_bytes(img.as_raw(), img.dimensions())?;
        let ocr_input = self.engine.prepare_input(img_source)?;

        let words = self.engine.detect_words(&ocr_input)?;
        let line_rects = self.engine.find_text_lines(&ocr_input, &words);
        let lines = self.engine.recognize_text(&ocr_input, &line_rects)?;

        let detections: Vec<RawDetection> = lines
            .iter()
            .flatten()
            .map(|line| {
                let polygon = line
                    .rotated_rect()
                    .corners()
                    .iter()
                    .map(|corner| Point::new(corner.x, corner.y))
                    .collect();
                RawDetection::new(polygon, line.to_string(), self.line_confidence)
            })
            .collect();

        debug!(backend = %self.name, words = words.len(), lines = detections.len(), "ocr pass");
        Ok(detections)
    }
}
