use image::{DynamicImage, GrayImage, ImageBuffer, Luma, Rgb};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use waybill_marker::{Point, RawDetection, RecognitionBackend, RecognizedLine};

type Script = Box<dyn Fn(usize) -> anyhow::Result<Vec<RawDetection>> + Send + Sync>;

/// Recognition backend answering from a script keyed by call index.
/// Counts its invocations and remembers the size of every image it saw.
pub struct ScriptedBackend {
    name: String,
    calls: AtomicUsize,
    seen: Mutex<Vec<(u32, u32)>>,
    script: Script,
}

impl ScriptedBackend {
    pub fn new<F>(name: &str, script: F) -> Arc<Self>
    where
        F: Fn(usize) -> anyhow::Result<Vec<RawDetection>> + Send + Sync + 'static,
    {
        Arc::new(Self {
            name: name.to_string(),
            calls: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
            script: Box::new(script),
        })
    }

    /// Backend that never recognizes anything
    pub fn silent(name: &str) -> Arc<Self> {
        Self::new(name, |_| Ok(Vec::new()))
    }

    /// Backend returning the same detections on every call
    pub fn constant(name: &str, detections: Vec<RawDetection>) -> Arc<Self> {
        Self::new(name, move |_| Ok(detections.clone()))
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn seen_sizes(&self) -> Vec<(u32, u32)> {
        self.seen.lock().expect("seen lock poisoned").clone()
    }
}

impl RecognitionBackend for ScriptedBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn recognize(&self, image: &DynamicImage) -> anyhow::Result<Vec<RawDetection>> {
        let index = self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen
            .lock()
            .expect("seen lock poisoned")
            .push((image.width(), image.height()));
        (self.script)(index)
    }
}

/// Axis-aligned rectangle as a 4-point polygon
pub fn rect_polygon(x: f32, y: f32, w: f32, h: f32) -> Vec<Point> {
    vec![
        Point::new(x, y),
        Point::new(x + w, y),
        Point::new(x + w, y + h),
        Point::new(x, y + h),
    ]
}

/// Detection with a rectangular polygon at a fixed spot
pub fn detection(text: &str, confidence: f32) -> RawDetection {
    RawDetection::new(rect_polygon(10.0, 10.0, 80.0, 12.0), text, confidence)
}

pub fn recognized(text: &str, confidence: f32) -> RecognizedLine {
    RecognizedLine {
        polygon: rect_polygon(10.0, 10.0, 80.0, 12.0),
        text: text.to_string(),
        confidence,
    }
}

/// Small RGB label-like image: dark text bars on white, non-square
pub fn label_image(width: u32, height: u32) -> DynamicImage {
    let img = ImageBuffer::from_fn(width, height, |x, y| {
        let in_bar = (y % 20) < 4 && x > width / 8 && x < width - width / 8;
        if in_bar {
            Rgb([20u8, 20u8, 20u8])
        } else {
            Rgb([240u8, 240u8, 240u8])
        }
    });
    DynamicImage::ImageRgb8(img)
}

/// White page with four horizontal black bars, 4 px thick
pub fn bars_image() -> GrayImage {
    let mut img = GrayImage::from_pixel(400, 300, Luma([255u8]));
    for top in [60u32, 110, 160, 210] {
        for y in top..top + 4 {
            for x in 50..350 {
                img.put_pixel(x, y, Luma([0u8]));
            }
        }
    }
    img
}

/// Number of pixels differing between two equally sized RGB images
pub fn differing_pixels(a: &DynamicImage, b: &DynamicImage) -> usize {
    let a = a.to_rgb8();
    let b = b.to_rgb8();
    a.pixels().zip(b.pixels()).filter(|(p, q)| p != q).count()
}

/// Saves an image as PNG into `dir` and returns its path
pub fn write_png(dir: &std::path::Path, name: &str, img: &DynamicImage) -> anyhow::Result<std::path::PathBuf> {
    let path = dir.join(name);
    img.save_with_format(&path, image::ImageFormat::Png)?;
    Ok(path)
}

/// Monospace TTF shipped with the tests for caption rendering
pub fn font_fixture() -> std::path::PathBuf {
    std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/DejaVuSansMono.ttf")
}

/// Strongly green pixels (caption or outline) inside a rectangle
pub fn green_pixels(img: &image::RgbImage, x0: u32, y0: u32, x1: u32, y1: u32) -> Vec<(u32, u32)> {
    img.enumerate_pixels()
        .filter(|(x, y, p)| *x >= x0 && *x < x1 && *y >= y0 && *y < y1 && p[1] > 200 && p[0] < 128)
        .map(|(x, y, _)| (x, y))
        .collect()
}
