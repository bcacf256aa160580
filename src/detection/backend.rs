use image::DynamicImage;

use crate::models::RawDetection;

/// A text-recognition capability.
///
/// Implementations are constructed once and reused for every variant of
/// every image. `recognize` must not mutate its input, may return an empty
/// list, and gives no ordering or uniqueness guarantee. Channel-order
/// adaptation is the implementation's job.
pub trait RecognitionBackend: Send + Sync {
    /// Human-readable name (used in logs and errors)
    fn name(&self) -> &str;

    fn recognize(&self, image: &DynamicImage) -> anyhow::Result<Vec<RawDetection>>;
}

