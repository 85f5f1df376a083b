use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A catalog record. Canonical data, never edited by rendering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub sku: String,
    #[serde(default)]
    pub ean: Option<String>,
    pub description: String,
    pub price: f64,
    #[serde(default, alias = "price_before")]
    pub price_before: Option<f64>,
    #[serde(default)]
    pub stock: Option<f64>,
    #[serde(default, alias = "category")]
    pub section: Option<String>,
    #[serde(default)]
    pub brand: Option<String>,
    /// Image reference resolved through a `ResourceProvider`.
    #[serde(default, alias = "imageUrl")]
    pub image: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Product {
    /// Percentage off relative to `price_before`, if there is a real discount.
    pub fn discount_percent(price: f64, price_before: Option<f64>) -> Option<u32> {
        let before = price_before?;
        if before <= 0.0 || price >= before {
            return None;
        }
        Some(((1.0 - price / before) * 100.0).round() as u32)
    }
}

/// Per-render user overrides layered on top of a [`Product`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditedProduct {
    #[serde(default)]
    pub custom_title: Option<String>,
    #[serde(default)]
    pub custom_price: Option<f64>,
    #[serde(default)]
    pub custom_image: Option<String>,
}

impl EditedProduct {
    pub fn is_empty(&self) -> bool {
        self.custom_title.is_none() && self.custom_price.is_none() && self.custom_image.is_none()
    }
}
