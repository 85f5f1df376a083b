//! PDF composition for poster batches.
//!
//! - [`PdfComposer`]: one raster poster per fixed-size page, scaled and centered
//! - [`merge_documents`] / [`merge_pdf_bytes`]: structural merge of whole documents
//!   (deep object copy with cycle handling)

mod error;
mod merge;
mod page;

pub use error::ComposerError;
pub use merge::{merge_documents, merge_pdf_bytes};
pub use page::{ComposedPdf, PageGeometry, PagePlacement, PdfComposer, PT_PER_PX};
