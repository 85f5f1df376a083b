use super::paint::{Painter, pixmap_to_raster, sk_color};
use super::{CaptureAssets, CaptureError, CaptureStrategy, CaptureSurface, surface_size};
use crate::render::VisualTree;
use cartel_types::RasterImage;
use tiny_skia::{Pixmap, Transform};

/// Paints the tree onto an oversized surface at print scale and crops the margin.
///
/// The overscan keeps anti-aliased edges at the canvas border from being
/// clipped; it is removed again before the raster is returned.
#[derive(Debug, Clone)]
pub struct DirectCapture {
    /// Margin in canvas pixels painted around every side.
    pub overscan: f32,
    /// Device pixel ratio of the target output.
    pub device_pixel_ratio: f32,
    /// Lower bound for the raster scale.
    pub min_scale: f32,
}

impl Default for DirectCapture {
    fn default() -> Self {
        Self {
            overscan: 24.0,
            device_pixel_ratio: 1.0,
            min_scale: 2.0,
        }
    }
}

impl DirectCapture {
    pub fn scale(&self) -> f32 {
        self.device_pixel_ratio.max(self.min_scale)
    }
}

impl CaptureStrategy for DirectCapture {
    fn name(&self) -> &'static str {
        "direct"
    }

    fn capture(&self, tree: &VisualTree, assets: &CaptureAssets) -> Result<RasterImage, CaptureError> {
        let surface = CaptureSurface::mount(self.name(), tree, assets)?;
        let scale = self.scale();
        let overscan_px = (self.overscan * scale).round() as u32;
        let (width, height) = surface_size(tree.width, tree.height, scale, 0)?;
        let (full_width, full_height) = surface_size(tree.width, tree.height, scale, overscan_px)?;

        let mut pixmap = Pixmap::new(full_width, full_height).ok_or_else(|| {
            CaptureError::Surface(format!("cannot allocate {}x{} surface", full_width, full_height))
        })?;
        pixmap.fill(sk_color(tree.background));

        let base = Transform::from_scale(scale, scale).pre_translate(self.overscan, self.overscan);
        let painter = Painter {
            fonts: &assets.fonts,
            images: &surface.images,
        };
        for node in &surface.tree.nodes {
            painter.paint(&mut pixmap, node, base);
        }

        let raster = pixmap_to_raster(&pixmap)
            .crop(overscan_px, overscan_px, width, height)
            .ok_or_else(|| CaptureError::Surface("overscan crop out of bounds".into()))?;
        log::debug!(
            "direct capture: {}x{} canvas -> {}x{} raster at {}x",
            tree.width,
            tree.height,
            raster.width,
            raster.height,
            scale
        );
        Ok(raster)
    }
}
