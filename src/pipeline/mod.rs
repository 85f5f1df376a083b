//! Batch PDF generation: validate, render, capture, compose.

mod builder;
pub mod config;
mod generator;

pub use builder::PipelineBuilder;
pub use config::{CartelConfig, DistributionConfig, PipelineConfig, RetryPolicy, StrategyKind};
pub use generator::{GeneratedPdf, PosterPipeline, poster_filename};
