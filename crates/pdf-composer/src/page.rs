//! Fixed-size page composition.
//!
//! Each poster raster becomes exactly one page. The raster is scaled
//! uniformly to fit the page, nudged up by a small bleed factor so rounding
//! never leaves a hairline border, and centered.

use crate::error::ComposerError;
use cartel_types::RasterImage;
use flate2::Compression;
use flate2::write::ZlibEncoder;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, ObjectId, Stream};
use serde::{Deserialize, Serialize};
use std::io::Write;

/// Points per CSS pixel (72 / 96).
pub const PT_PER_PX: f32 = 0.75;

fn default_page_width() -> f32 {
    1123.0
}

fn default_page_height() -> f32 {
    794.0
}

fn default_bleed_factor() -> f32 {
    1.01
}

fn default_align_offset() -> f32 {
    1.0
}

/// Physical page in pixels at 96 DPI plus the placement tuning knobs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageGeometry {
    #[serde(default = "default_page_width")]
    pub width_px: f32,
    #[serde(default = "default_page_height")]
    pub height_px: f32,
    /// Upscale applied after fitting; keep within [1.0, 1.02].
    #[serde(default = "default_bleed_factor")]
    pub bleed_factor: f32,
    /// Pixel-grid correction subtracted from the centered offset.
    #[serde(default = "default_align_offset")]
    pub align_offset_px: f32,
}

impl Default for PageGeometry {
    fn default() -> Self {
        Self::a4_landscape()
    }
}

impl PageGeometry {
    pub fn a4_landscape() -> Self {
        Self {
            width_px: default_page_width(),
            height_px: default_page_height(),
            bleed_factor: default_bleed_factor(),
            align_offset_px: default_align_offset(),
        }
    }

    pub fn width_pt(&self) -> f32 {
        self.width_px * PT_PER_PX
    }

    pub fn height_pt(&self) -> f32 {
        self.height_px * PT_PER_PX
    }
}

/// Where a poster lands on its page, in page pixels (origin top-left).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PagePlacement {
    pub scale: f32,
    pub width: f32,
    pub height: f32,
    pub x: f32,
    pub y: f32,
}

impl PagePlacement {
    pub fn compute(
        geometry: &PageGeometry,
        template_width: f32,
        template_height: f32,
    ) -> Result<Self, ComposerError> {
        if !(template_width.is_finite() && template_height.is_finite())
            || template_width <= 0.0
            || template_height <= 0.0
        {
            return Err(ComposerError::InvalidTemplateSize {
                width: template_width,
                height: template_height,
            });
        }

        let fit = (geometry.width_px / template_width).min(geometry.height_px / template_height);
        let scale = fit * geometry.bleed_factor;
        let width = template_width * scale;
        let height = template_height * scale;

        Ok(Self {
            scale,
            width,
            height,
            x: (geometry.width_px - width) / 2.0 - geometry.align_offset_px,
            y: (geometry.height_px - height) / 2.0 - geometry.align_offset_px,
        })
    }
}

/// Serialized document plus the geometry of every page, in page order.
#[derive(Debug, Clone)]
pub struct ComposedPdf {
    pub bytes: Vec<u8>,
    pub placements: Vec<PagePlacement>,
}

impl ComposedPdf {
    pub fn page_count(&self) -> usize {
        self.placements.len()
    }
}

/// Builds a PDF one poster page at a time.
pub struct PdfComposer {
    doc: Document,
    pages_id: ObjectId,
    page_ids: Vec<ObjectId>,
    placements: Vec<PagePlacement>,
    geometry: PageGeometry,
    title: Option<String>,
}

impl PdfComposer {
    pub fn new(geometry: PageGeometry) -> Self {
        let mut doc = Document::with_version("1.7");
        let pages_id = doc.new_object_id();
        Self {
            doc,
            pages_id,
            page_ids: Vec::new(),
            placements: Vec::new(),
            geometry,
            title: None,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn page_count(&self) -> usize {
        self.page_ids.len()
    }

    /// Appends `image` as a new page. `template_width`/`template_height` are the
    /// poster's canvas size; the raster may be a supersampled version of it.
    pub fn add_page(
        &mut self,
        image: &RasterImage,
        template_width: f32,
        template_height: f32,
    ) -> Result<PagePlacement, ComposerError> {
        let expected_len = image.width as usize * image.height as usize * 4;
        if image.rgba.len() != expected_len || image.width == 0 || image.height == 0 {
            return Err(ComposerError::MalformedRaster {
                width: image.width,
                height: image.height,
                expected_len,
                actual_len: image.rgba.len(),
            });
        }
        let placement = PagePlacement::compute(&self.geometry, template_width, template_height)?;

        let image_id = self.embed_rgb(image)?;

        let page_height_pt = self.geometry.height_pt();
        let w_pt = placement.width * PT_PER_PX;
        let h_pt = placement.height * PT_PER_PX;
        let x_pt = placement.x * PT_PER_PX;
        // PDF space grows upwards.
        let y_pt = page_height_pt - (placement.y + placement.height) * PT_PER_PX;

        let content = Content {
            operations: vec![
                Operation::new("q", vec![]),
                Operation::new(
                    "cm",
                    vec![
                        w_pt.into(),
                        0.into(),
                        0.into(),
                        h_pt.into(),
                        x_pt.into(),
                        y_pt.into(),
                    ],
                ),
                Operation::new("Do", vec![Object::Name(b"Poster".to_vec())]),
                Operation::new("Q", vec![]),
            ],
        };
        let content_id = self
            .doc
            .add_object(Stream::new(dictionary! {}, content.encode()?));

        let page_id = self.doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => self.pages_id,
            "MediaBox" => vec![
                0.into(),
                0.into(),
                self.geometry.width_pt().into(),
                page_height_pt.into(),
            ],
            "Contents" => content_id,
            "Resources" => dictionary! {
                "XObject" => dictionary! { "Poster" => image_id },
            },
        });

        log::debug!(
            "Page {}: {}x{} raster at scale {:.4}, offset ({:.1}, {:.1})",
            self.page_ids.len() + 1,
            image.width,
            image.height,
            placement.scale,
            placement.x,
            placement.y
        );
        self.page_ids.push(page_id);
        self.placements.push(placement);
        Ok(placement)
    }

    fn embed_rgb(&mut self, image: &RasterImage) -> Result<ObjectId, ComposerError> {
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&image.to_rgb_on_white())?;
        let compressed = encoder.finish()?;

        let stream = Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => image.width as i64,
                "Height" => image.height as i64,
                "ColorSpace" => "DeviceRGB",
                "BitsPerComponent" => 8,
                "Filter" => "FlateDecode",
            },
            compressed,
        );
        Ok(self.doc.add_object(stream))
    }

    pub fn finish(mut self) -> Result<ComposedPdf, ComposerError> {
        if self.page_ids.is_empty() {
            return Err(ComposerError::Empty);
        }

        let kids: Vec<Object> = self.page_ids.iter().map(|id| Object::Reference(*id)).collect();
        self.doc.objects.insert(
            self.pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => self.page_ids.len() as i64,
            }),
        );
        let catalog_id = self.doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => self.pages_id,
        });
        self.doc.trailer.set("Root", catalog_id);

        let mut info = dictionary! {
            "Producer" => Object::string_literal("cartel"),
        };
        if let Some(title) = &self.title {
            info.set("Title", Object::string_literal(title.as_str()));
        }
        let info_id = self.doc.add_object(info);
        self.doc.trailer.set("Info", info_id);

        let mut bytes = Vec::new();
        self.doc.save_to(&mut bytes)?;
        Ok(ComposedPdf {
            bytes,
            placements: self.placements,
        })
    }
}
