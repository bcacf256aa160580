//! Line parsing and marker selection
//!
//! Backend output is cleaned into [`RecognizedLine`]s, then the marker line is
//! picked in two tiers: lines containing the full marker first, and only when
//! none does, lines containing its leading fragment (OCR often drops or
//! breaks the trailing underscore).

use crate::config::MatcherConfig;
use crate::models::{MatchTier, Point, RawDetection, RecognizedLine};

/// Collapse line breaks to spaces and strip surrounding whitespace
pub fn clean_text(text: &str) -> String {
    text.replace("\r\n", " ")
        .replace(['\n', '\r'], " ")
        .trim()
        .to_string()
}

/// Drop a closing vertex that repeats the first one
pub fn open_polygon(polygon: &[Point]) -> Vec<Point> {
    match (polygon.first(), polygon.last()) {
        (Some(first), Some(last)) if polygon.len() > 1 && first == last => {
            polygon[..polygon.len() - 1].to_vec()
        }
        _ => polygon.to_vec(),
    }
}

/// Turn raw detections into recognized lines.
/// Closed loops are stored open; detections left with fewer than 3 vertices
/// are dropped. Confidence is passed through as reported.
pub fn parse_detections(raw: &[RawDetection]) -> Vec<RecognizedLine> {
    raw.iter()
        .filter_map(|d| {
            let polygon = open_polygon(&d.polygon);
            (polygon.len() >= 3).then(|| RecognizedLine {
                polygon,
                text: clean_text(&d.text),
                confidence: d.confidence,
            })
        })
        .collect()
}

/// Line selected by the matcher
#[derive(Debug, Clone, PartialEq)]
pub struct LineMatch {
    pub line: RecognizedLine,
    pub tier: MatchTier,
}

impl LineMatch {
    pub fn text(&self) -> &str {
        &self.line.text
    }
}

/// Case-insensitive two-tier marker matcher
#[derive(Debug, Clone)]
pub struct LineMatcher {
    marker: String,
    fragment: String,
}

impl LineMatcher {
    pub fn new(config: &MatcherConfig) -> Self {
        Self {
            marker: config.marker.to_lowercase(),
            fragment: config.loose_fragment.to_lowercase(),
        }
    }

    /// Pick the marker line: the highest-confidence strict match, else the
    /// highest-confidence loose match. Ties keep the first line.
    pub fn select<'a>(&self, lines: &'a [RecognizedLine]) -> Option<(MatchTier, &'a RecognizedLine)> {
        let lowered: Vec<String> = lines.iter().map(|l| l.text.to_lowercase()).collect();

        let best_containing = |pattern: &str| {
            lines
                .iter()
                .zip(&lowered)
                .filter(|(_, text)| text.contains(pattern))
                .map(|(line, _)| line)
                .fold(None::<&RecognizedLine>, |best, line| match best {
                    Some(b) if line.confidence > b.confidence => Some(line),
                    Some(b) => Some(b),
                    None => Some(line),
                })
        };

        if let Some(line) = best_containing(&self.marker) {
            return Some((MatchTier::Strict, line));
        }
        best_containing(&self.fragment).map(|line| (MatchTier::Loose, line))
    }

    /// Parse raw backend output and select the marker line
    pub fn extract(&self, raw: &[RawDetection]) -> Option<LineMatch> {
        let lines = parse_detections(raw);
        self.select(&lines).map(|(tier, line)| LineMatch {
            line: line.clone(),
            tier,
        })
    }
}

impl Default for LineMatcher {
    fn default() -> Self {
        Self::new(&MatcherConfig::default())
    }
}
