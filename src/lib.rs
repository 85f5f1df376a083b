//! Poster ("cartel") PDF assembly.
//!
//! A batch of `(template, product, edits)` triples is validated, rendered to
//! visual trees, captured to rasters and composed into one A4 landscape PDF
//! with a page per poster. The [`distribution`] module sends that PDF to
//! store branches through object storage, chunking large batches and merging
//! them remotely.

pub mod capture;
pub mod distribution;
pub mod download;
pub mod error;
pub mod pipeline;
pub mod render;
pub mod validation;

pub use capture::{CaptureChain, CaptureError, CaptureStrategy, DirectCapture, FontBook, VisibleCapture};
pub use distribution::{DistributionError, SendOrchestrator, SendOutcome, SendRequest};
pub use download::{DownloadError, DownloadManager};
pub use error::PipelineError;
pub use pipeline::{CartelConfig, GeneratedPdf, PipelineBuilder, PosterPipeline};
pub use validation::{Poster, RawPoster, ValidationError};

pub use cartel_pdf_composer::{PageGeometry, PagePlacement};
pub use cartel_types::{Branch, EditedProduct, Product, Template};
