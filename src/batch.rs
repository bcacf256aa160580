//! Batch driver
//!
//! Runs the marker search over every image of a folder, writes one overlay
//! per image and a `predictions.json` keyed by file name. A failing image is
//! recorded and logged; it never aborts the batch.

use anyhow::Context;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::detection::MarkerSearch;
use crate::detection::overlay::OverlayRenderer;
use crate::models::Candidate;

const IMAGE_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];

/// One line of `predictions.json`
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PredictionRecord {
    pub extracted_text: Option<String>,
    pub found: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variant: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PredictionRecord {
    pub fn from_candidate(candidate: &Candidate) -> Self {
        Self {
            extracted_text: candidate.text.clone(),
            found: candidate.found(),
            variant: candidate.provenance(),
            confidence: Some(candidate.confidence),
            error: None,
        }
    }

    pub fn from_error(error: &anyhow::Error) -> Self {
        Self {
            extracted_text: None,
            found: false,
            variant: None,
            confidence: None,
            error: Some(format!("{:#}", error)),
        }
    }
}

/// Totals of one batch run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub total: usize,
    pub found: usize,
    pub failed: usize,
}

impl BatchSummary {
    pub fn hit_rate(&self) -> f32 {
        if self.total == 0 {
            0.0
        } else {
            self.found as f32 / self.total as f32
        }
    }
}

/// Image files of `dir` with a supported extension, sorted by name
pub fn list_images(dir: &Path) -> anyhow::Result<Vec<PathBuf>> {
    let mut paths = Vec::new();
    for entry in std::fs::read_dir(dir).with_context(|| format!("reading {}", dir.display()))? {
        let path = entry?.path();
        let supported = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
            .unwrap_or(false);
        if path.is_file() && supported {
            paths.push(path);
        }
    }
    paths.sort();
    Ok(paths)
}

/// Search one image and write its overlay
fn process_image(
    path: &Path,
    overlay_dir: &Path,
    search: &MarkerSearch,
    renderer: &OverlayRenderer,
) -> anyhow::Result<PredictionRecord> {
    let image = image::open(path).with_context(|| format!("could not read {}", path.display()))?;
    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("image");
    let best = search.search_named(&image, stem)?;

    let overlay = renderer.render(&best.image, best.line.as_ref());
    let out_path = overlay_dir.join(format!("{}_overlay.jpg", stem));
    overlay
        .to_rgb8()
        .save(&out_path)
        .with_context(|| format!("writing overlay {}", out_path.display()))?;

    Ok(PredictionRecord::from_candidate(&best))
}

/// Process every image in `input_dir`, writing results under `output_dir`
pub fn process_folder(
    input_dir: &Path,
    output_dir: &Path,
    search: &MarkerSearch,
    renderer: &OverlayRenderer,
) -> anyhow::Result<BatchSummary> {
    let overlay_dir = output_dir.join("overlays");
    std::fs::create_dir_all(&overlay_dir)?;

    let mut results = BTreeMap::new();
    let mut summary = BatchSummary::default();

    for path in list_images(input_dir)? {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        info!(image = %name, "processing");
        summary.total += 1;

        let record = match process_image(&path, &overlay_dir, search, renderer) {
            Ok(record) => record,
            Err(err) => {
                warn!(image = %name, error = %format!("{:#}", err), "image failed");
                summary.failed += 1;
                PredictionRecord::from_error(&err)
            }
        };
        if record.found {
            summary.found += 1;
        }
        results.insert(name, record);
    }

    let out_json = output_dir.join("predictions.json");
    let json = serde_json::to_string_pretty(&results)?;
    std::fs::write(&out_json, json)?;

    info!(
        total = summary.total,
        found = summary.found,
        failed = summary.failed,
        hit_rate = summary.hit_rate(),
        path = %out_json.display(),
        "saved predictions"
    );
    Ok(summary)
}
