pub mod batch;
pub mod config;
pub mod detection;
pub mod error;
pub mod models;
pub mod pipeline;

pub use batch::{BatchSummary, PredictionRecord, process_folder};
pub use config::{RankingPolicy, SearchConfig, load_config, save_config};
pub use detection::MarkerSearch;
pub use detection::backend::RecognitionBackend;
pub use detection::matcher::LineMatcher;
pub use detection::ocr::OcrsBackend;
pub use detection::overlay::OverlayRenderer;
pub use error::{LabelError, Result};
pub use models::{
    BackendRole, Candidate, GeometricVariant, MatchTier, PhotometricVariant, Point, RawDetection,
    RecognizedLine, VariantTag,
};
pub use pipeline::{DebugConfig, Pipeline, PipelineContext, PipelineData, PipelineStep};
