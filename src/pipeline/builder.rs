// src/pipeline/builder.rs
use super::config::{PipelineConfig, StrategyKind};
use super::generator::PosterPipeline;
use crate::capture::{
    CaptureAssets, CaptureChain, CaptureStrategy, FontBook, PrintFallback, SurfaceRegistry,
};
use crate::error::PipelineError;
use cartel_traits::{InMemoryResourceProvider, ResourceProvider};
use std::path::Path;
use std::sync::Arc;

/// A builder for creating a `PosterPipeline`.
#[derive(Debug, Default)]
pub struct PipelineBuilder {
    config: PipelineConfig,
    resources: Option<Arc<dyn ResourceProvider>>,
    fonts: Option<Arc<FontBook>>,
    strategies: Vec<Arc<dyn CaptureStrategy>>,
    fallback: Option<Arc<dyn PrintFallback>>,
}

impl PipelineBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    /// Where image references in templates and products are loaded from.
    pub fn with_resources(mut self, resources: Arc<dyn ResourceProvider>) -> Self {
        self.resources = Some(resources);
        self
    }

    /// Uses the host's sans-serif fonts for text.
    pub fn with_system_fonts(mut self) -> Self {
        self.fonts = Some(FontBook::system());
        self
    }

    pub fn with_font_files(mut self, regular: &Path, bold: Option<&Path>) -> Result<Self, PipelineError> {
        self.fonts = Some(Arc::new(FontBook::from_files(regular, bold)?));
        Ok(self)
    }

    pub fn with_fonts(mut self, fonts: Arc<FontBook>) -> Self {
        self.fonts = Some(fonts);
        self
    }

    /// Appends a custom capture strategy. Once any is given, the configured
    /// built-in strategies are ignored.
    pub fn with_strategy(mut self, strategy: Arc<dyn CaptureStrategy>) -> Self {
        self.strategies.push(strategy);
        self
    }

    /// Called with the rendered pages when every strategy fails.
    pub fn with_print_fallback(mut self, fallback: Arc<dyn PrintFallback>) -> Self {
        self.fallback = Some(fallback);
        self
    }

    pub fn build(self) -> Result<PosterPipeline, PipelineError> {
        self.config.validate()?;

        let strategies = if self.strategies.is_empty() {
            self.config
                .strategies
                .iter()
                .map(|kind| -> Arc<dyn CaptureStrategy> {
                    match kind {
                        StrategyKind::Direct => Arc::new(self.config.capture.direct()),
                        StrategyKind::Visible => Arc::new(self.config.capture.visible()),
                    }
                })
                .collect()
        } else {
            self.strategies
        };
        if strategies.is_empty() {
            return Err(PipelineError::Config("at least one capture strategy is required".into()));
        }
        let chain = CaptureChain::new(strategies);
        log::debug!(
            "Capture chain: {}",
            chain.strategies().map(|s| s.name()).collect::<Vec<_>>().join(" -> ")
        );

        let fonts = self.fonts.unwrap_or_else(|| Arc::new(FontBook::empty()));
        if !fonts.has_fonts() {
            log::info!("No fonts configured; text will be painted as glyph boxes");
        }
        let assets = CaptureAssets {
            fonts,
            resources: self
                .resources
                .unwrap_or_else(|| Arc::new(InMemoryResourceProvider::new())),
            surfaces: SurfaceRegistry::new(),
        };

        Ok(PosterPipeline::new(self.config, chain, assets, self.fallback))
    }
}
