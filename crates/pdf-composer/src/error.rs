use thiserror::Error;

#[derive(Error, Debug)]
pub enum ComposerError {
    #[error("PDF error: {0}")]
    Pdf(#[from] lopdf::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Template size {width}x{height} cannot be placed on a page")]
    InvalidTemplateSize { width: f32, height: f32 },

    #[error("Raster is {actual_len} bytes, expected {expected_len} for {width}x{height} RGBA")]
    MalformedRaster {
        width: u32,
        height: u32,
        expected_len: usize,
        actual_len: usize,
    },

    #[error("Document has no pages")]
    Empty,

    #[error("{0}")]
    Other(String),
}
