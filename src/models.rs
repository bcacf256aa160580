use image::DynamicImage;
use serde::Serialize;
use std::fmt;

use crate::config::{CONFIDENCE_SENTINEL, RankingPolicy};

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// One detection exactly as a backend reported it
#[derive(Debug, Clone, PartialEq)]
pub struct RawDetection {
    pub polygon: Vec<Point>,
    pub text: String,
    pub confidence: f32,
}

impl RawDetection {
    pub fn new(polygon: Vec<Point>, text: impl Into<String>, confidence: f32) -> Self {
        Self {
            polygon,
            text: text.into(),
            confidence,
        }
    }
}

/// A detection after parsing: closed polygon (>= 3 vertices), cleaned text
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecognizedLine {
    pub polygon: Vec<Point>,
    pub text: String,
    pub confidence: f32,
}

/// Which selection tier matched a line. `Strict` orders above `Loose`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchTier {
    Loose,
    Strict,
}

/// Whole-image rotation applied before preprocessing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GeometricVariant {
    Identity,
    Clockwise90,
    CounterClockwise90,
    Rotate180,
}

impl GeometricVariant {
    /// Generation order
    pub const ALL: [GeometricVariant; 4] = [
        GeometricVariant::Identity,
        GeometricVariant::Clockwise90,
        GeometricVariant::CounterClockwise90,
        GeometricVariant::Rotate180,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            GeometricVariant::Identity => "orig",
            GeometricVariant::Clockwise90 => "rot90",
            GeometricVariant::CounterClockwise90 => "rot270",
            GeometricVariant::Rotate180 => "rot180",
        }
    }
}

/// Photometric treatment applied to a rotated image
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PhotometricVariant {
    Binary,
    Dilate,
    Gray,
}

impl PhotometricVariant {
    /// Generation order
    pub const ALL: [PhotometricVariant; 3] = [
        PhotometricVariant::Binary,
        PhotometricVariant::Dilate,
        PhotometricVariant::Gray,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            PhotometricVariant::Binary => "bin",
            PhotometricVariant::Dilate => "dilate",
            PhotometricVariant::Gray => "gray",
        }
    }
}

/// Provenance of a variant image, e.g. `rot90+dilate`. Diagnostics only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VariantTag {
    pub geometric: GeometricVariant,
    pub photometric: PhotometricVariant,
}

impl fmt::Display for VariantTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}+{}", self.geometric.name(), self.photometric.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendRole {
    Primary,
    Fallback,
}

impl BackendRole {
    pub fn name(&self) -> &'static str {
        match self {
            BackendRole::Primary => "primary",
            BackendRole::Fallback => "fallback",
        }
    }
}

/// Best result seen during one search
#[derive(Debug, Clone)]
pub struct Candidate {
    pub text: Option<String>,
    pub line: Option<RecognizedLine>,
    pub confidence: f32,
    pub tier: Option<MatchTier>,
    pub variant: Option<VariantTag>,
    pub backend: Option<BackendRole>,
    /// Image the selected polygon refers to; the search input until something matches
    pub image: DynamicImage,
    /// Unfiltered backend output of the winning attempt
    pub raw: Vec<RawDetection>,
    /// Backend invocations performed so far
    pub attempts: usize,
}

impl Candidate {
    pub fn new(image: DynamicImage) -> Self {
        Self {
            text: None,
            line: None,
            confidence: CONFIDENCE_SENTINEL,
            tier: None,
            variant: None,
            backend: None,
            image,
            raw: Vec::new(),
            attempts: 0,
        }
    }

    pub fn found(&self) -> bool {
        self.line.is_some()
    }

    /// Whether a match of `tier` with `confidence` should replace this candidate
    pub fn improves(&self, tier: MatchTier, confidence: f32, policy: RankingPolicy) -> bool {
        match (policy, self.tier) {
            (RankingPolicy::StrictFirst, Some(current)) if current != tier => tier > current,
            _ => confidence > self.confidence,
        }
    }

    /// Backend output of the winning attempt as `confidence | text` lines
    pub fn raw_lines(&self) -> Vec<String> {
        self.raw
            .iter()
            .map(|d| format!("{:.2} | {}", d.confidence, d.text.replace('\n', " ")))
            .collect()
    }

    /// `<role>-<tag>` of the winning attempt, e.g. `primary-rot90+dilate`
    pub fn provenance(&self) -> Option<String> {
        match (self.backend, self.variant) {
            (Some(role), Some(tag)) => Some(format!("{}-{}", role.name(), tag)),
            _ => None,
        }
    }
}
