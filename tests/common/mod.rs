#![allow(dead_code)]

pub mod fixtures;
pub mod pdf_assertions;

use cartel::capture::{CaptureAssets, CaptureError, CaptureStrategy, DirectCapture};
use cartel::pipeline::PipelineConfig;
use cartel::render::VisualTree;
use cartel::{PipelineBuilder, PipelineError, PosterPipeline};
use cartel_types::RasterImage;
use lopdf::{Document as LopdfDocument, ObjectId};
use std::sync::atomic::{AtomicUsize, Ordering};

pub type TestResult = Result<(), Box<dyn std::error::Error>>;

/// Wrapper around a generated PDF with helper methods
pub struct ParsedPdf {
    pub bytes: Vec<u8>,
    pub doc: LopdfDocument,
}

impl ParsedPdf {
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, Box<dyn std::error::Error>> {
        let doc = LopdfDocument::load_mem(&bytes)?;
        Ok(Self { bytes, doc })
    }

    pub fn page_count(&self) -> usize {
        self.doc.get_pages().len()
    }

    /// Page object ids in page order.
    pub fn page_ids(&self) -> Vec<ObjectId> {
        self.doc.get_pages().into_values().collect()
    }

    /// Save PDF to a file for manual debugging
    pub fn save_for_debug(&self, name: &str) -> std::io::Result<()> {
        std::fs::write(format!("test_output_{}.pdf", name), &self.bytes)
    }
}

/// Default configuration at 1x capture scale so rasters match canvas sizes.
pub fn test_config() -> PipelineConfig {
    let mut config = PipelineConfig::default();
    config.capture.min_scale = 1.0;
    config
}

pub fn test_pipeline() -> Result<PosterPipeline, PipelineError> {
    PipelineBuilder::new().with_config(test_config()).build()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Behavior {
    Works,
    Fails,
    /// Returns a raster whose buffer does not match its dimensions.
    Malformed,
}

/// Counts captures and fails, misbehaves or delegates to direct capture.
#[derive(Debug)]
pub struct CountingStrategy {
    pub name: &'static str,
    pub behavior: Behavior,
    pub calls: AtomicUsize,
    inner: DirectCapture,
}

impl CountingStrategy {
    pub fn failing(name: &'static str) -> Self {
        Self::new(name, Behavior::Fails)
    }

    pub fn working(name: &'static str) -> Self {
        Self::new(name, Behavior::Works)
    }

    pub fn malformed(name: &'static str) -> Self {
        Self::new(name, Behavior::Malformed)
    }

    fn new(name: &'static str, behavior: Behavior) -> Self {
        Self {
            name,
            behavior,
            calls: AtomicUsize::new(0),
            inner: DirectCapture {
                min_scale: 1.0,
                ..DirectCapture::default()
            },
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl CaptureStrategy for CountingStrategy {
    fn name(&self) -> &'static str {
        self.name
    }

    fn capture(&self, tree: &VisualTree, assets: &CaptureAssets) -> Result<RasterImage, CaptureError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.behavior {
            Behavior::Fails => Err(CaptureError::Surface(format!("{} is simulated to fail", self.name))),
            Behavior::Malformed => Ok(RasterImage {
                width: 4,
                height: 4,
                rgba: vec![0; 3],
            }),
            Behavior::Works => self.inner.capture(tree, assets),
        }
    }
}
