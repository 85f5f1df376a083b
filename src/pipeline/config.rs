use crate::capture::{DirectCapture, VisibleCapture};
use crate::error::PipelineError;
use crate::render::{PriceFormat, RenderOptions};
use cartel_pdf_composer::PageGeometry;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// A built-in capture strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrategyKind {
    Direct,
    Visible,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CaptureConfig {
    pub overscan_px: f32,
    pub device_pixel_ratio: f32,
    pub min_scale: f32,
    /// Raster scale of the visible strategy.
    pub visible_scale: f32,
    /// Fail the batch when an image reference has no resource behind it,
    /// instead of painting a placeholder.
    pub require_images: bool,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        let direct = DirectCapture::default();
        Self {
            overscan_px: direct.overscan,
            device_pixel_ratio: direct.device_pixel_ratio,
            min_scale: direct.min_scale,
            visible_scale: VisibleCapture::default().scale,
            require_images: false,
        }
    }
}

impl CaptureConfig {
    pub fn direct(&self) -> DirectCapture {
        DirectCapture {
            overscan: self.overscan_px,
            device_pixel_ratio: self.device_pixel_ratio,
            min_scale: self.min_scale,
        }
    }

    pub fn visible(&self) -> VisibleCapture {
        VisibleCapture { scale: self.visible_scale }
    }
}

/// Settings for turning posters into one PDF.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PipelineConfig {
    pub capture: CaptureConfig,
    pub page: PageGeometry,
    pub price_format: PriceFormat,
    /// Capture strategies in the order they are tried.
    pub strategies: Vec<StrategyKind>,
    pub document_title: Option<String>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            capture: CaptureConfig::default(),
            page: PageGeometry::a4_landscape(),
            price_format: PriceFormat::default(),
            strategies: vec![StrategyKind::Direct, StrategyKind::Visible],
            document_title: None,
        }
    }
}

impl PipelineConfig {
    pub fn render_options(&self) -> RenderOptions {
        RenderOptions {
            price_format: self.price_format.clone(),
        }
    }

    pub fn validate(&self) -> Result<(), PipelineError> {
        let page = &self.page;
        if !(page.width_px > 0.0 && page.height_px > 0.0) {
            return Err(PipelineError::Config(format!(
                "page size must be positive, got {}x{}",
                page.width_px, page.height_px
            )));
        }
        if !(1.0..=1.02).contains(&page.bleed_factor) {
            return Err(PipelineError::Config(format!(
                "bleed factor {} is outside 1.0..=1.02",
                page.bleed_factor
            )));
        }
        if !(self.capture.min_scale > 0.0 && self.capture.visible_scale > 0.0) {
            return Err(PipelineError::Config("capture scales must be positive".into()));
        }
        if self.capture.overscan_px < 0.0 {
            return Err(PipelineError::Config("overscan must not be negative".into()));
        }
        Ok(())
    }
}

/// Settings for the send workflow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DistributionConfig {
    /// Batches larger than this are generated in chunks and merged remotely.
    pub chunk_size: usize,
    pub signed_url_ttl_secs: u64,
    /// Storage prefix for chunk and merge intermediates.
    pub temp_prefix: String,
    /// Remove intermediates after the send completes.
    pub cleanup_temp: bool,
}

impl Default for DistributionConfig {
    fn default() -> Self {
        Self {
            chunk_size: 10,
            signed_url_ttl_secs: 3600,
            temp_prefix: "temp".into(),
            cleanup_temp: true,
        }
    }
}

impl DistributionConfig {
    pub fn signed_url_ttl(&self) -> Duration {
        Duration::from_secs(self.signed_url_ttl_secs)
    }
}

/// Retry budget for downloading generated PDFs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub base_backoff_ms: u64,
    pub attempt_timeout_ms: u64,
    pub save_timeout_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            base_backoff_ms: 1000,
            attempt_timeout_ms: 30_000,
            save_timeout_ms: 10_000,
        }
    }
}

impl RetryPolicy {
    /// Delay after failed attempt `attempt` (1-based): base, 2x base, 4x base...
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u64 << attempt.saturating_sub(1).min(16);
        Duration::from_millis(self.base_backoff_ms.saturating_mul(factor))
    }

    pub fn attempt_timeout(&self) -> Duration {
        Duration::from_millis(self.attempt_timeout_ms)
    }

    pub fn save_timeout(&self) -> Duration {
        Duration::from_millis(self.save_timeout_ms)
    }
}

/// Top-level configuration file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CartelConfig {
    pub pipeline: PipelineConfig,
    pub distribution: DistributionConfig,
    pub download: RetryPolicy,
}

impl CartelConfig {
    pub fn from_json_str(source: &str) -> Result<Self, PipelineError> {
        let config: CartelConfig = serde_json::from_str(source)?;
        config.pipeline.validate()?;
        if config.distribution.chunk_size == 0 {
            return Err(PipelineError::Config("chunk size must be at least 1".into()));
        }
        if config.download.attempts == 0 {
            return Err(PipelineError::Config("download attempts must be at least 1".into()));
        }
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, PipelineError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|e| {
            PipelineError::Io(std::io::Error::new(
                e.kind(),
                format!("Failed to read config from '{}': {}", path.display(), e),
            ))
        })?;
        Self::from_json_str(&source)
    }
}
