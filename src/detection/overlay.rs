use ab_glyph::{FontArc, PxScale};
use image::{DynamicImage, Rgb};
use imageproc::drawing::{draw_hollow_polygon_mut, draw_text_mut};
use imageproc::point::Point as DrawPoint;
use std::path::Path;
use tracing::warn;

use crate::config::OverlayConfig;
use crate::detection::matcher::open_polygon;
use crate::error::{LabelError, Result};
use crate::models::RecognizedLine;

const HIGHLIGHT: Rgb<u8> = Rgb([0, 255, 0]);

/// Draws the selected line onto an image for human verification
pub struct OverlayRenderer {
    font: Option<FontArc>,
    max_text_chars: usize,
    text_scale: f32,
}

impl OverlayRenderer {
    /// Renderer without captions (outline only)
    pub fn new(config: &OverlayConfig) -> Self {
        Self {
            font: None,
            max_text_chars: config.max_text_chars,
            text_scale: config.text_scale,
        }
    }

    /// Renderer using the font named in the config, if any
    pub fn from_config(config: &OverlayConfig) -> Result<Self> {
        let renderer = Self::new(config);
        match &config.font_path {
            Some(path) => renderer.with_font_file(path),
            None => Ok(renderer),
        }
    }

    pub fn with_font(mut self, font: FontArc) -> Self {
        self.font = Some(font);
        self
    }

    pub fn with_font_file(self, path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        let font = FontArc::try_from_vec(bytes).map_err(|e| LabelError::Font(e.to_string()))?;
        Ok(self.with_font(font))
    }

    /// Outline the line's polygon and caption it near the first vertex.
    /// Without a line the input is returned unchanged.
    pub fn render(&self, image: &DynamicImage, line: Option<&RecognizedLine>) -> DynamicImage {
        let Some(line) = line else {
            return image.clone();
        };

        let mut canvas = image.to_rgb8();
        let outline = open_polygon(&line.polygon);

        if outline.len() >= 2 {
            // two pixel wide outline
            for (ox, oy) in [(0.0, 0.0), (1.0, 0.0), (0.0, 1.0)] {
                let points: Vec<DrawPoint<f32>> = outline
                    .iter()
                    .map(|p| DrawPoint::new(p.x + ox, p.y + oy))
                    .collect();
                draw_hollow_polygon_mut(&mut canvas, &points, HIGHLIGHT);
            }
        }

        match (&self.font, outline.first()) {
            (Some(font), Some(anchor)) => {
                let caption: String = line.text.chars().take(self.max_text_chars).collect();
                let x = anchor.x.max(0.0) as i32;
                let y = (anchor.y - 8.0 - self.text_scale).max(0.0) as i32;
                draw_text_mut(&mut canvas, HIGHLIGHT, x, y, PxScale::from(self.text_scale), font, &caption);
            }
            (None, Some(_)) => warn!(text = %line.text, "no overlay font configured, caption dropped"),
            _ => {}
        }

        DynamicImage::ImageRgb8(canvas)
    }
}

impl Default for OverlayRenderer {
    fn default() -> Self {
        Self::new(&OverlayConfig::default())
    }
}
