//! Font loading for text painting.
//!
//! Fonts are loaded once and shared; waiting on [`FontBook::system`] is the
//! "fonts ready" point of the capture protocol.

use super::CaptureError;
use std::path::Path;
use std::sync::{Arc, OnceLock};
use ttf_parser::Face;

#[derive(Debug, Clone)]
struct FontData {
    bytes: Arc<Vec<u8>>,
    index: u32,
}

impl FontData {
    fn face(&self) -> Option<Face<'_>> {
        Face::parse(&self.bytes, self.index).ok()
    }
}

/// Regular and bold faces used to paint poster text.
#[derive(Debug, Clone, Default)]
pub struct FontBook {
    regular: Option<FontData>,
    bold: Option<FontData>,
}

impl FontBook {
    /// A book without fonts. Text is painted as glyph boxes.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Loads a regular and optional bold face from font files.
    pub fn from_files(regular: &Path, bold: Option<&Path>) -> Result<Self, CaptureError> {
        let load = |path: &Path| -> Result<FontData, CaptureError> {
            let bytes = std::fs::read(path).map_err(|e| {
                CaptureError::Font(format!("failed to read '{}': {}", path.display(), e))
            })?;
            Face::parse(&bytes, 0)
                .map_err(|e| CaptureError::Font(format!("'{}' is not a usable font: {}", path.display(), e)))?;
            Ok(FontData { bytes: Arc::new(bytes), index: 0 })
        };
        Ok(Self {
            regular: Some(load(regular)?),
            bold: bold.map(load).transpose()?,
        })
    }

    /// Sans-serif faces discovered on the host, loaded once per process.
    #[cfg(feature = "system-fonts")]
    pub fn system() -> Arc<FontBook> {
        static SYSTEM: OnceLock<Arc<FontBook>> = OnceLock::new();
        SYSTEM
            .get_or_init(|| {
                let mut db = fontdb::Database::new();
                db.load_system_fonts();
                log::info!("Loaded {} system font faces", db.len());

                let pick = |weight: fontdb::Weight| -> Option<FontData> {
                    let id = db.query(&fontdb::Query {
                        families: &[fontdb::Family::SansSerif],
                        weight,
                        ..fontdb::Query::default()
                    })?;
                    db.with_face_data(id, |data, index| FontData {
                        bytes: Arc::new(data.to_vec()),
                        index,
                    })
                };
                let book = FontBook {
                    regular: pick(fontdb::Weight::NORMAL),
                    bold: pick(fontdb::Weight::BOLD),
                };
                if !book.has_fonts() {
                    log::warn!("No sans-serif system font found; text will be painted as glyph boxes");
                }
                Arc::new(book)
            })
            .clone()
    }

    #[cfg(not(feature = "system-fonts"))]
    pub fn system() -> Arc<FontBook> {
        static SYSTEM: OnceLock<Arc<FontBook>> = OnceLock::new();
        SYSTEM
            .get_or_init(|| {
                log::warn!("Built without system-fonts; text will be painted as glyph boxes");
                Arc::new(FontBook::empty())
            })
            .clone()
    }

    pub fn has_fonts(&self) -> bool {
        self.regular.is_some()
    }

    /// Bold falls back to regular; `None` only when the book is empty.
    pub fn face(&self, bold: bool) -> Option<Face<'_>> {
        let data = if bold { self.bold.as_ref().or(self.regular.as_ref()) } else { self.regular.as_ref() };
        data.and_then(FontData::face)
    }

    /// True when bold text has no real bold face and must be emboldened.
    pub fn synthesizes_bold(&self) -> bool {
        self.bold.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_book_has_no_faces() {
        let book = FontBook::empty();
        assert!(!book.has_fonts());
        assert!(book.face(false).is_none());
        assert!(book.face(true).is_none());
    }

    #[test]
    fn unreadable_font_file_is_reported() {
        let err = FontBook::from_files(Path::new("/definitely/not/here.ttf"), None).unwrap_err();
        assert!(matches!(err, CaptureError::Font(_)));
    }
}
