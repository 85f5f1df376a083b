//! Validation gate in front of the renderer.
//!
//! Core fields are strict; everything else is optional and unknown properties
//! pass through untouched. The first failure aborts the batch and names the
//! offending item, so no rendering work is spent on a batch that cannot
//! complete.

use cartel_types::{EditedProduct, Product, Template};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("template {} invalid: {reason}", .index + 1)]
    Template { index: usize, reason: String },

    #[error("product data for template {} invalid: {reason}", .index + 1)]
    Product { index: usize, reason: String },

    #[error("batch contains no posters")]
    EmptyBatch,
}

impl ValidationError {
    /// Zero-based position of the offending item.
    pub fn index(&self) -> Option<usize> {
        match self {
            ValidationError::Template { index, .. } | ValidationError::Product { index, .. } => Some(*index),
            ValidationError::EmptyBatch => None,
        }
    }
}

/// One unvalidated poster as it arrives from the catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawPoster {
    pub template: Value,
    pub product: Value,
    #[serde(default)]
    pub edits: Option<EditedProduct>,
}

/// A poster whose template and product passed validation.
#[derive(Debug, Clone, PartialEq)]
pub struct Poster {
    pub template: Template,
    pub product: Product,
    pub edits: Option<EditedProduct>,
}

pub fn validate_batch(raw: &[RawPoster]) -> Result<Vec<Poster>, ValidationError> {
    if raw.is_empty() {
        return Err(ValidationError::EmptyBatch);
    }
    raw.iter()
        .enumerate()
        .map(|(index, poster)| {
            let template =
                validate_template(&poster.template).map_err(|reason| ValidationError::Template { index, reason })?;
            let product = validate_product(&poster.product, poster.edits.as_ref())
                .map_err(|reason| ValidationError::Product { index, reason })?;
            Ok(Poster {
                template,
                product,
                edits: poster.edits.clone(),
            })
        })
        .collect()
}

/// Largest canvas side accepted, in template pixels.
pub const MAX_CANVAS_SIDE: f32 = 10_000.0;

fn positive(value: f32) -> bool {
    value.is_finite() && value > 0.0
}

pub fn validate_template(value: &Value) -> Result<Template, String> {
    let object = value.as_object().ok_or("expected an object")?;
    match object.get("canvas") {
        None | Some(Value::Null) => return Err("missing canvas".into()),
        Some(Value::Object(_)) => {}
        Some(_) => return Err("canvas must be an object".into()),
    }
    let template: Template = serde_json::from_value(value.clone()).map_err(|e| e.to_string())?;

    let canvas = &template.canvas;
    if !positive(canvas.width) || !positive(canvas.height) {
        return Err(format!(
            "canvas must have positive dimensions, got {}x{}",
            canvas.width, canvas.height
        ));
    }
    if canvas.width > MAX_CANVAS_SIDE || canvas.height > MAX_CANVAS_SIDE {
        return Err(format!(
            "canvas {}x{} exceeds the {}px limit per side",
            canvas.width, canvas.height, MAX_CANVAS_SIDE
        ));
    }
    for component in &template.components {
        let (size, pos) = (component.size, component.position);
        if !size.width.is_finite() || !size.height.is_finite() || size.width < 0.0 || size.height < 0.0 {
            return Err(format!("component '{}' has an invalid size", component.id));
        }
        if !pos.x.is_finite() || !pos.y.is_finite() || !pos.rotation.is_finite() {
            return Err(format!("component '{}' has an invalid position", component.id));
        }
    }
    Ok(template)
}

pub fn validate_product(value: &Value, edits: Option<&EditedProduct>) -> Result<Product, String> {
    if !value.is_object() {
        return Err("expected an object".into());
    }
    let product: Product = serde_json::from_value(value.clone()).map_err(|e| e.to_string())?;
    if product.sku.trim().is_empty() {
        return Err("sku must not be empty".into());
    }
    if !product.price.is_finite() || product.price < 0.0 {
        return Err(format!("price must be a non-negative number, got {}", product.price));
    }
    if let Some(before) = product.price_before
        && (!before.is_finite() || before < 0.0)
    {
        return Err(format!("price before must be a non-negative number, got {}", before));
    }
    if let Some(custom) = edits.and_then(|e| e.custom_price)
        && (!custom.is_finite() || custom < 0.0)
    {
        return Err(format!("custom price must be a non-negative number, got {}", custom));
    }
    Ok(product)
}
