mod fixtures;
pub use fixtures::*;

// Re-export commonly used types from waybill_marker for tests
pub use waybill_marker::{
    BackendRole, Candidate, GeometricVariant, LabelError, MarkerSearch, MatchTier,
    PhotometricVariant, Point, RankingPolicy, RawDetection, RecognitionBackend, RecognizedLine,
    SearchConfig, VariantTag,
};
