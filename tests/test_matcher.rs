mod common;

use common::*;
use waybill_marker::LineMatcher;
use waybill_marker::config::MatcherConfig;
use waybill_marker::detection::matcher::{clean_text, open_polygon, parse_detections};

#[test]
fn test_strict_match_beats_higher_confidence_non_match() -> anyhow::Result<()> {
    let matcher = LineMatcher::default();
    let lines = vec![recognized("ABC_1_XYZ", 0.6), recognized("HELLO", 0.99)];

    let (tier, line) = matcher.select(&lines).expect("marker line present");

    assert_eq!(tier, MatchTier::Strict);
    assert_eq!(line.text, "ABC_1_XYZ");
    Ok(())
}

#[test]
fn test_loose_match_used_only_without_strict() -> anyhow::Result<()> {
    let matcher = LineMatcher::default();

    let loose_only = vec![recognized("_1 abc", 0.7)];
    let (tier, line) = matcher.select(&loose_only).expect("loose line present");
    assert_eq!(tier, MatchTier::Loose);
    assert_eq!(line.text, "_1 abc");

    // a strict line wins even with lower confidence than a loose one
    let mixed = vec![recognized("x_1 abc", 0.95), recognized("AB_1_C", 0.4)];
    let (tier, line) = matcher.select(&mixed).expect("strict line present");
    assert_eq!(tier, MatchTier::Strict);
    assert_eq!(line.text, "AB_1_C");
    Ok(())
}

#[test]
fn test_no_match_returns_none() {
    let matcher = LineMatcher::default();
    let lines = vec![recognized("SHIP TO", 0.9), recognized("1 KG", 0.8)];

    assert!(matcher.select(&lines).is_none());
    assert!(matcher.select(&[]).is_none());
}

#[test]
fn test_highest_confidence_wins_and_ties_keep_first() -> anyhow::Result<()> {
    let matcher = LineMatcher::default();

    let lines = vec![
        recognized("A_1_first", 0.5),
        recognized("B_1_second", 0.8),
        recognized("C_1_third", 0.8),
    ];
    let (_, line) = matcher.select(&lines).expect("marker present");

    assert_eq!(line.text, "B_1_second");
    Ok(())
}

#[test]
fn test_matching_is_case_insensitive() -> anyhow::Result<()> {
    let matcher = LineMatcher::new(&MatcherConfig {
        marker: "_A1_".to_string(),
        loose_fragment: "_A1".to_string(),
    });
    let lines = vec![recognized("xx_a1_yy", 0.5)];

    let (tier, _) = matcher.select(&lines).expect("lowercase marker matches");

    assert_eq!(tier, MatchTier::Strict);
    Ok(())
}

#[test]
fn test_parse_drops_malformed_and_cleans_text() {
    let raw = vec![
        RawDetection::new(vec![Point::new(0.0, 0.0), Point::new(5.0, 0.0)], "_1_ broken", 0.9),
        detection("  AB_1_\nCD \r\n", 0.42),
    ];

    let lines = parse_detections(&raw);

    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0].text, "AB_1_ CD");
    assert_eq!(lines[0].confidence, 0.42);
    assert_eq!(lines[0].polygon.len(), 4);
}

#[test]
fn test_extract_from_raw_detections() -> anyhow::Result<()> {
    let matcher = LineMatcher::default();
    let raw = vec![
        detection("ORDER 42", 0.99),
        detection("RX_1_2024\n", 0.7),
    ];

    let found = matcher.extract(&raw).expect("marker line present");

    assert_eq!(found.text(), "RX_1_2024");
    assert_eq!(found.tier, MatchTier::Strict);
    assert_eq!(clean_text("\nplain\n"), "plain");
    Ok(())
}

#[test]
fn test_closed_loops_are_stored_open() {
    let mut closed = rect_polygon(0.0, 0.0, 30.0, 10.0);
    closed.push(closed[0]);
    let triangle_loop = vec![Point::new(0.0, 0.0), Point::new(9.0, 0.0), Point::new(0.0, 0.0)];
    let raw = vec![
        RawDetection::new(closed, "AB_1_CD", 0.8),
        RawDetection::new(triangle_loop, "x_1_", 0.9),
    ];

    let lines = parse_detections(&raw);

    // the two-point loop is too small once opened
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0].polygon, rect_polygon(0.0, 0.0, 30.0, 10.0));
    assert_eq!(open_polygon(&[Point::new(1.0, 1.0)]).len(), 1);
}
