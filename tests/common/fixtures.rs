use cartel::RawPoster;
use serde_json::{Value, json};

/// A poster template with a background, title, prices, a product image and a
/// component type the renderer does not support.
pub fn poster_template(width: f32, height: f32) -> Value {
    json!({
        "id": format!("tpl-{}x{}", width, height),
        "name": "Oferta semanal",
        "canvas": { "width": width, "height": height, "backgroundColor": "#ffffff" },
        "components": [
            {
                "id": "bg", "type": "shape",
                "position": { "x": 0, "y": 0, "z": 0 },
                "size": { "width": width, "height": height },
                "style": { "backgroundColor": "#ffde00" }
            },
            {
                "id": "title", "type": "product-name",
                "position": { "x": width * 0.05, "y": height * 0.05, "z": 2 },
                "size": { "width": width * 0.9, "height": height * 0.15 },
                "style": { "fontWeight": "bold", "textAlign": "center" }
            },
            {
                "id": "price", "type": "price",
                "position": { "x": width * 0.05, "y": height * 0.5, "z": 3 },
                "size": { "width": width * 0.9, "height": height * 0.25 },
                "style": { "color": "#d00000", "textAlign": "center" }
            },
            {
                "id": "before", "type": "price-before",
                "position": { "x": width * 0.05, "y": height * 0.8, "z": 3 },
                "size": { "width": width * 0.9, "height": height * 0.08 }
            },
            {
                "id": "photo", "type": "product-image",
                "position": { "x": width * 0.3, "y": height * 0.22, "z": 1 },
                "size": { "width": width * 0.4, "height": height * 0.25 }
            },
            {
                "id": "code", "type": "qr-code",
                "position": { "x": width * 0.85, "y": height * 0.9, "z": 4 },
                "size": { "width": width * 0.1, "height": height * 0.08 }
            }
        ]
    })
}

/// A template whose only component is hidden.
pub fn blank_template(width: f32, height: f32) -> Value {
    json!({
        "canvas": { "width": width, "height": height },
        "components": [
            {
                "id": "hidden", "type": "text",
                "position": { "x": 0, "y": 0 },
                "size": { "width": width, "height": height },
                "visible": false,
                "content": { "text": "never shown" }
            }
        ]
    })
}

pub fn product(sku: &str, price: f64) -> Value {
    json!({
        "sku": sku,
        "description": format!("Producto {}", sku),
        "price": price,
        "priceBefore": price * 1.25,
        "brand": "Marca",
        "image": format!("img/{}.png", sku)
    })
}

pub fn poster(template: Value, product: Value) -> RawPoster {
    RawPoster {
        template,
        product,
        edits: None,
    }
}

/// `count` small posters; canvas sizes stay small to keep capture cheap.
pub fn small_batch(count: usize) -> Vec<RawPoster> {
    (0..count)
        .map(|i| poster(poster_template(120.0, 160.0), product(&format!("SKU-{}", i), 1000.0 + i as f64)))
        .collect()
}
