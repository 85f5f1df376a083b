use super::format::PriceFormat;
use cartel_types::{EditedProduct, Product};
use serde_json::Value;

/// Read-only merge of a catalog record and the user's edits for one render.
#[derive(Debug, Clone, Copy)]
pub struct ProductView<'a> {
    pub product: &'a Product,
    pub title: &'a str,
    pub price: f64,
    pub image: Option<&'a str>,
}

impl<'a> ProductView<'a> {
    pub fn new(product: &'a Product, edits: Option<&'a EditedProduct>) -> Self {
        let title = edits
            .and_then(|e| e.custom_title.as_deref())
            .unwrap_or(&product.description);
        let price = edits.and_then(|e| e.custom_price).unwrap_or(product.price);
        let image = edits
            .and_then(|e| e.custom_image.as_deref())
            .or(product.image.as_deref());
        Self { product, title, price, image }
    }

    pub fn price_before(&self) -> Option<f64> {
        self.product.price_before.filter(|before| *before > self.price)
    }

    pub fn discount_percent(&self) -> Option<u32> {
        Product::discount_percent(self.price, self.product.price_before)
    }

    /// Text value of a named field, as used by `{{field}}` placeholders.
    pub fn field(&self, name: &str, format: &PriceFormat) -> Option<String> {
        match name {
            "title" | "name" | "description" => Some(self.title.to_string()),
            "price" => Some(format.format(self.price)),
            "priceAmount" => Some(format.format_amount(self.price)),
            "priceBefore" | "price_before" => self.price_before().map(|p| format.format(p)),
            "discount" => self.discount_percent().map(|d| format!("-{}%", d)),
            "sku" => Some(self.product.sku.clone()),
            "ean" => self.product.ean.clone(),
            "brand" => self.product.brand.clone(),
            "section" | "category" => self.product.section.clone(),
            "stock" => self.product.stock.map(|s| format!("{}", s)),
            other => match self.product.extra.get(other)? {
                Value::String(s) => Some(s.clone()),
                Value::Number(n) => Some(n.to_string()),
                Value::Bool(b) => Some(b.to_string()),
                _ => None,
            },
        }
    }

    /// Replaces `{{ field }}` placeholders. Unknown fields render as empty.
    pub fn fill_placeholders(&self, text: &str, format: &PriceFormat) -> String {
        let mut out = String::with_capacity(text.len());
        let mut rest = text;
        while let Some(start) = rest.find("{{") {
            out.push_str(&rest[..start]);
            let after = &rest[start + 2..];
            match after.find("}}") {
                Some(end) => {
                    let name = after[..end].trim();
                    out.push_str(&self.field(name, format).unwrap_or_default());
                    rest = &after[end + 2..];
                }
                None => {
                    out.push_str(&rest[start..]);
                    rest = "";
                }
            }
        }
        out.push_str(rest);
        out
    }
}
