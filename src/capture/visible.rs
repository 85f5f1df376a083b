use super::paint::{Painter, pixmap_to_raster};
use super::{CaptureAssets, CaptureError, CaptureStrategy, CaptureSurface, surface_size};
use crate::render::VisualTree;
use cartel_types::{Color, RasterImage};
use image::{Rgba, RgbaImage, imageops};
use tiny_skia::{Pixmap, Transform};

/// Composites each component as its own layer over an opaque background.
///
/// Layers are blended with `image`'s overlay instead of painting straight
/// onto one surface, and the background is flattened onto white first, so
/// the result never carries transparency.
#[derive(Debug, Clone)]
pub struct VisibleCapture {
    pub scale: f32,
}

impl Default for VisibleCapture {
    fn default() -> Self {
        Self { scale: 1.0 }
    }
}

fn opaque(color: Color) -> Rgba<u8> {
    let blend = |c: u8| (c as f32 * color.a + 255.0 * (1.0 - color.a)).round() as u8;
    Rgba([blend(color.r), blend(color.g), blend(color.b), 255])
}

impl CaptureStrategy for VisibleCapture {
    fn name(&self) -> &'static str {
        "visible"
    }

    fn capture(&self, tree: &VisualTree, assets: &CaptureAssets) -> Result<RasterImage, CaptureError> {
        let surface = CaptureSurface::mount(self.name(), tree, assets)?;
        let (width, height) = surface_size(tree.width, tree.height, self.scale, 0)?;

        let mut canvas = RgbaImage::from_pixel(width, height, opaque(tree.background));
        let painter = Painter {
            fonts: &assets.fonts,
            images: &surface.images,
        };
        let base = Transform::from_scale(self.scale, self.scale);

        for node in &surface.tree.nodes {
            let mut layer = Pixmap::new(width, height)
                .ok_or_else(|| CaptureError::Surface(format!("cannot allocate {}x{} layer", width, height)))?;
            painter.paint(&mut layer, node, base);
            let layer = pixmap_to_raster(&layer);
            let layer = RgbaImage::from_raw(layer.width, layer.height, layer.rgba).ok_or_else(|| {
                CaptureError::Image(format!("layer for '{}' has a malformed buffer", node.component_id))
            })?;
            imageops::overlay(&mut canvas, &layer, 0, 0);
        }

        RasterImage::new(width, height, canvas.into_raw())
            .ok_or_else(|| CaptureError::Image("composited canvas has a malformed buffer".into()))
    }
}
