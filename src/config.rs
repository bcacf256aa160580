//! Search configuration
//!
//! Every tuning knob of the variant search lives here, stored as TOML.
//! Missing sections and fields fall back to the defaults below.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::Result;

/// Confidence of an empty candidate; lower than any score a backend reports
pub const CONFIDENCE_SENTINEL: f32 = -1.0;

/// Skew angles at or below this magnitude are treated as measurement noise
pub const SKEW_THRESHOLD_DEGREES: f32 = 0.8;

/// Lines further than this from horizontal are ignored by skew estimation
pub const MAX_SKEW_DEGREES: f32 = 20.0;

/// Side length of the square dilation kernel
pub const DILATION_KERNEL_SIZE: u32 = 2;

/// Overlay captions are cut to this many characters
pub const OVERLAY_TEXT_CHARS: usize = 40;

/// How candidates from different attempts are ranked against each other
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RankingPolicy {
    /// Confidence is the only signal: a loose match can outrank a strict one
    #[default]
    ConfidenceOnly,
    /// Any strict match outranks any loose match; confidence breaks ties within a tier
    StrictFirst,
}

/// Full configuration of a marker search
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub ranking: RankingPolicy,
    /// Run the fallback backend when the primary finds nothing
    pub fallback_enabled: bool,
    pub matcher: MatcherConfig,
    pub preprocess: PreprocessConfig,
    pub backend: BackendConfig,
    pub overlay: OverlayConfig,
}

impl SearchConfig {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            ranking: RankingPolicy::default(),
            fallback_enabled: true,
            matcher: MatcherConfig::default(),
            preprocess: PreprocessConfig::default(),
            backend: BackendConfig::default(),
            overlay: OverlayConfig::default(),
        }
    }
}

/// Marker pattern settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MatcherConfig {
    /// Exact pattern looked for in the strict tier
    pub marker: String,
    /// Leading fragment of the marker accepted by the loose tier
    pub loose_fragment: String,
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            marker: "_1_".to_string(),
            loose_fragment: "_1".to_string(),
        }
    }
}

/// Photometric preprocessing and deskew settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PreprocessConfig {
    pub clahe_clip_limit: f32,
    /// Number of CLAHE tiles along each axis
    pub clahe_tiles: u32,
    pub blur_sigma: f32,
    pub canny_low: f32,
    pub canny_high: f32,
    pub hough_vote_threshold: u32,
    pub hough_suppression_radius: u32,
    pub max_skew_degrees: f32,
    pub skew_threshold_degrees: f32,
    pub dilation_kernel: u32,
    pub deskew: bool,
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            clahe_clip_limit: 2.0,
            clahe_tiles: 8,
            // sigma of a 3x3 Gaussian kernel
            blur_sigma: 0.8,
            canny_low: 50.0,
            canny_high: 150.0,
            hough_vote_threshold: 120,
            hough_suppression_radius: 8,
            max_skew_degrees: MAX_SKEW_DEGREES,
            skew_threshold_degrees: SKEW_THRESHOLD_DEGREES,
            dilation_kernel: DILATION_KERNEL_SIZE,
            deskew: true,
        }
    }
}

/// Settings of the ocrs recognition backends
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Directory holding `text-detection.rten` and `text-recognition.rten`.
    /// Defaults to `~/.cache/ocrs`.
    pub models_dir: Option<PathBuf>,
    /// Confidence attached to every recognised line
    pub line_confidence: f32,
    /// Beam width used by the fallback backend
    pub fallback_beam_width: u32,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            models_dir: None,
            line_confidence: 0.9,
            fallback_beam_width: 10,
        }
    }
}

/// Overlay rendering settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OverlayConfig {
    pub max_text_chars: usize,
    /// TTF/OTF font used for captions. Captions are skipped without one.
    pub font_path: Option<PathBuf>,
    /// Caption height in pixels
    pub text_scale: f32,
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            max_text_chars: OVERLAY_TEXT_CHARS,
            font_path: None,
            text_scale: 20.0,
        }
    }
}

/// Load configuration from file
pub fn load_config(path: &Path) -> Result<SearchConfig> {
    let content = std::fs::read_to_string(path)?;
    let config: SearchConfig = toml::from_str(&content)?;
    Ok(config)
}

/// Save configuration to file
pub fn save_config(config: &SearchConfig, path: &Path) -> Result<()> {
    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_search_config() {
        let config = SearchConfig::new();

        assert_eq!(config.matcher.marker, "_1_");
        assert_eq!(config.matcher.loose_fragment, "_1");
        assert_eq!(config.ranking, RankingPolicy::ConfidenceOnly);
        assert!(config.fallback_enabled);
        assert!((config.preprocess.skew_threshold_degrees - 0.8).abs() < f32::EPSILON);
        assert_eq!(config.preprocess.dilation_kernel, 2);
        assert_eq!(config.overlay.max_text_chars, 40);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let parsed: SearchConfig = toml::from_str(
            r#"
            ranking = "strict_first"

            [matcher]
            marker = "<M>"
            "#,
        )
        .unwrap();

        assert_eq!(parsed.ranking, RankingPolicy::StrictFirst);
        assert_eq!(parsed.matcher.marker, "<M>");
        assert_eq!(parsed.matcher.loose_fragment, "_1");
        assert_eq!(parsed.preprocess.clahe_tiles, 8);
    }

    #[test]
    fn test_save_and_load_config() {
        let mut config = SearchConfig::new();
        config.backend.line_confidence = 0.75;
        config.fallback_enabled = false;

        let temp_file = NamedTempFile::new().unwrap();
        save_config(&config, temp_file.path()).unwrap();
        let loaded = load_config(temp_file.path()).unwrap();

        assert!((loaded.backend.line_confidence - 0.75).abs() < f32::EPSILON);
        assert!(!loaded.fallback_enabled);
    }

    #[test]
    fn test_load_config_invalid_toml() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(temp_file, "this is not valid toml {{{{").unwrap();

        let result = load_config(temp_file.path());
        assert!(result.is_err());
    }
}
