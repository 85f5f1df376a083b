use super::config::PipelineConfig;
use crate::capture::{
    Attempt, CaptureAssets, CaptureChain, CaptureError, CaptureStrategy, PrintFallback, SurfaceRegistry,
};
use crate::error::PipelineError;
use crate::render::{ProductView, VisualTree, render_template};
use crate::validation::{Poster, RawPoster, ValidationError, validate_batch};
use cartel_pdf_composer::{ComposedPdf, ComposerError, PagePlacement, PdfComposer};
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Download name for a generated document: `cartel-{timestamp}.pdf`.
pub fn poster_filename(now: DateTime<Utc>) -> String {
    format!("cartel-{}.pdf", now.timestamp_millis())
}

/// One PDF built from a batch of posters, one page per poster in input order.
#[derive(Debug, Clone)]
pub struct GeneratedPdf {
    pub bytes: Vec<u8>,
    pub placements: Vec<PagePlacement>,
    /// Name of the capture strategy that produced the pages.
    pub strategy: &'static str,
    pub filename: String,
    /// Image references painted as placeholders because no resource was found.
    pub missing_images: Vec<String>,
}

impl GeneratedPdf {
    pub fn page_count(&self) -> usize {
        self.placements.len()
    }
}

/// Validates, renders, captures and composes poster batches.
#[derive(Debug)]
pub struct PosterPipeline {
    config: PipelineConfig,
    chain: CaptureChain,
    assets: CaptureAssets,
    fallback: Option<Arc<dyn PrintFallback>>,
}

impl PosterPipeline {
    pub(super) fn new(
        config: PipelineConfig,
        chain: CaptureChain,
        assets: CaptureAssets,
        fallback: Option<Arc<dyn PrintFallback>>,
    ) -> Self {
        Self {
            config,
            chain,
            assets,
            fallback,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn chain(&self) -> &CaptureChain {
        &self.chain
    }

    /// Mount bookkeeping for this pipeline's capture surfaces.
    pub fn surfaces(&self) -> &SurfaceRegistry {
        &self.assets.surfaces
    }

    /// Validates the whole batch first; nothing is rendered if any item is invalid.
    pub fn generate(&self, raw: &[RawPoster]) -> Result<GeneratedPdf, PipelineError> {
        let posters = validate_batch(raw)?;
        self.generate_validated(&posters)
    }

    pub fn generate_validated(&self, posters: &[Poster]) -> Result<GeneratedPdf, PipelineError> {
        if posters.is_empty() {
            return Err(ValidationError::EmptyBatch.into());
        }
        let options = self.config.render_options();
        let trees: Vec<VisualTree> = posters
            .iter()
            .map(|p| render_template(&p.template, &ProductView::new(&p.product, p.edits.as_ref()), &options))
            .collect();

        let missing_images = self.missing_images(&trees);
        if let Some(source) = missing_images.first() {
            if self.config.capture.require_images {
                return Err(CaptureError::Image(format!("'{}' not found in {}", source, self.assets.resources.name())).into());
            }
            log::warn!(
                "{} image reference(s) not found, painting placeholders: {}",
                missing_images.len(),
                missing_images.join(", ")
            );
        }

        match self.chain.run(|strategy| self.compose(strategy, &trees)) {
            Ok((composed, strategy)) => {
                log::info!(
                    "Generated {} page(s) with '{}' capture ({} bytes)",
                    composed.page_count(),
                    strategy,
                    composed.bytes.len()
                );
                Ok(GeneratedPdf {
                    bytes: composed.bytes,
                    placements: composed.placements,
                    strategy,
                    filename: poster_filename(Utc::now()),
                    missing_images,
                })
            }
            Err(Attempt::Fatal(err)) => Err(err),
            Err(Attempt::Capture(err)) => {
                log::error!("No capture strategy could rasterize the batch: {}", err);
                if let Some(fallback) = &self.fallback {
                    match fallback.present(&trees) {
                        Ok(path) => log::warn!("Print fallback available at {}", path.display()),
                        Err(e) => log::error!("Print fallback failed: {}", e),
                    }
                }
                Err(err.into())
            }
        }
    }

    fn missing_images(&self, trees: &[VisualTree]) -> Vec<String> {
        let mut missing: Vec<String> = Vec::new();
        for source in trees.iter().flat_map(VisualTree::image_sources) {
            if !self.assets.resources.exists(source) && !missing.iter().any(|m| m == source) {
                missing.push(source.to_string());
            }
        }
        missing
    }

    /// Captures every tree with one strategy, one surface at a time.
    fn compose(
        &self,
        strategy: &dyn CaptureStrategy,
        trees: &[VisualTree],
    ) -> Result<ComposedPdf, Attempt<PipelineError>> {
        let mut composer = PdfComposer::new(self.config.page);
        if let Some(title) = &self.config.document_title {
            composer = composer.with_title(title.clone());
        }
        for (index, tree) in trees.iter().enumerate() {
            let raster = strategy.capture(tree, &self.assets).map_err(|e| {
                log::warn!("Poster {} failed under '{}' capture: {}", index + 1, strategy.name(), e);
                Attempt::Capture(e)
            })?;
            let placement = composer.add_page(&raster, tree.width, tree.height).map_err(|e| match e {
                // A bad buffer is the strategy's fault; let the next one try.
                ComposerError::MalformedRaster { .. } => {
                    log::warn!("Poster {} raster from '{}' is malformed: {}", index + 1, strategy.name(), e);
                    Attempt::Capture(CaptureError::Image(e.to_string()))
                }
                other => Attempt::Fatal(other.into()),
            })?;
            log::debug!(
                "Poster {}: {}x{} raster placed at ({:.1}, {:.1}) scale {:.4}",
                index + 1,
                raster.width,
                raster.height,
                placement.x,
                placement.y,
                placement.scale
            );
        }
        composer.finish().map_err(|e| Attempt::Fatal(e.into()))
    }
}
