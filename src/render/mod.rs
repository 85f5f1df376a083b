//! Template renderer: `(template, product, edits)` to a positioned visual tree.
//!
//! Rendering is a pure one-shot transform. Components flagged not visible are
//! left out of the tree entirely; component types this renderer does not know
//! become [`VisualKind::Unsupported`] nodes so the rest of the poster still
//! renders.

mod format;
mod product_view;

pub use format::PriceFormat;
pub use product_view::ProductView;

use cartel_types::{Color, Frame, Template, TemplateComponent};
use serde_json::Value;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RenderOptions {
    pub price_format: PriceFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextAlign {
    #[default]
    Left,
    Center,
    Right,
}

impl TextAlign {
    pub fn as_css(&self) -> &'static str {
        match self {
            TextAlign::Left => "left",
            TextAlign::Center => "center",
            TextAlign::Right => "right",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextBlock {
    pub text: String,
    pub font_size: f32,
    pub color: Color,
    pub align: TextAlign,
    pub bold: bool,
    pub strikethrough: bool,
    pub background: Option<Color>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ImageFit {
    #[default]
    Contain,
    Fill,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImageBlock {
    pub source: String,
    pub fit: ImageFit,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ShapeBlock {
    pub fill: Option<Color>,
    pub stroke: Option<(Color, f32)>,
    pub corner_radius: f32,
    pub ellipse: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum VisualKind {
    Text(TextBlock),
    Image(ImageBlock),
    Shape(ShapeBlock),
    Line { color: Color, thickness: f32 },
    Unsupported { type_tag: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct VisualNode {
    pub component_id: String,
    pub frame: Frame,
    pub z: i32,
    pub opacity: f32,
    pub kind: VisualKind,
}

/// A rendered poster, ready for capture. Nodes are in paint order.
#[derive(Debug, Clone, PartialEq)]
pub struct VisualTree {
    pub width: f32,
    pub height: f32,
    pub background: Color,
    pub nodes: Vec<VisualNode>,
}

impl VisualTree {
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Image references used by the tree, deduplicated, in paint order.
    pub fn image_sources(&self) -> Vec<&str> {
        let mut sources: Vec<&str> = Vec::new();
        for node in &self.nodes {
            if let VisualKind::Image(image) = &node.kind
                && !sources.contains(&image.source.as_str())
            {
                sources.push(&image.source);
            }
        }
        sources
    }
}

pub fn render_template(template: &Template, view: &ProductView<'_>, options: &RenderOptions) -> VisualTree {
    let mut nodes: Vec<VisualNode> = template
        .components
        .iter()
        .filter(|c| c.visible)
        .filter_map(|c| render_component(c, view, options))
        .collect();
    // Stable: equal z keeps template order.
    nodes.sort_by_key(|n| n.z);

    VisualTree {
        width: template.canvas.width,
        height: template.canvas.height,
        background: template.canvas.background_color,
        nodes,
    }
}

fn render_component(
    component: &TemplateComponent,
    view: &ProductView<'_>,
    options: &RenderOptions,
) -> Option<VisualNode> {
    let fmt = &options.price_format;
    let tag = component.kind.to_ascii_lowercase();
    let kind = match tag.as_str() {
        "text" | "custom-text" => {
            let raw = component.content_str("text").unwrap_or_default();
            text_kind(component, view.fill_placeholders(raw, fmt), false)
        }
        "product-name" | "product-title" | "title" => text_kind(component, view.title.to_string(), false),
        "price" => text_kind(component, fmt.format(view.price), false),
        "price-before" | "original-price" => {
            text_kind(component, fmt.format(view.price_before()?), true)
        }
        "discount" | "discount-badge" => {
            text_kind(component, format!("-{}%", view.discount_percent()?), false)
        }
        field @ ("sku" | "ean" | "brand" | "section" | "stock") => {
            text_kind(component, view.field(field, fmt)?, false)
        }
        "image" | "product-image" => {
            let from_product = tag == "product-image"
                || component.content_str("source") == Some("product");
            let source = if from_product {
                view.image.map(str::to_string)
            } else {
                component
                    .content_str("src")
                    .or_else(|| component.content_str("url"))
                    .map(str::to_string)
            };
            let Some(source) = source.filter(|s| !s.is_empty()) else {
                log::debug!("Image component '{}' has no source, skipping", component.id);
                return None;
            };
            let fit = match component.style_str("objectFit") {
                Some("fill") | Some("stretch") => ImageFit::Fill,
                _ => ImageFit::Contain,
            };
            VisualKind::Image(ImageBlock { source, fit })
        }
        "shape" | "rectangle" | "ellipse" | "circle" => {
            let ellipse = matches!(tag.as_str(), "ellipse" | "circle")
                || component.content_str("shape").is_some_and(|s| s == "ellipse" || s == "circle");
            let stroke = component
                .style_color("borderColor")
                .map(|c| (c, component.style_f32("borderWidth").unwrap_or(1.0)));
            VisualKind::Shape(ShapeBlock {
                fill: component.style_color("backgroundColor").or_else(|| component.style_color("fill")),
                stroke,
                corner_radius: component.style_f32("borderRadius").unwrap_or(0.0),
                ellipse,
            })
        }
        "line" | "divider" => VisualKind::Line {
            color: component.style_color("color").unwrap_or(Color::BLACK),
            thickness: component
                .style_f32("thickness")
                .unwrap_or(component.size.height.max(1.0)),
        },
        _ => VisualKind::Unsupported {
            type_tag: component.kind.clone(),
        },
    };

    Some(VisualNode {
        component_id: component.id.clone(),
        frame: Frame::new(component.position, component.size),
        z: component.position.z,
        opacity: component.style_f32("opacity").unwrap_or(1.0).clamp(0.0, 1.0),
        kind,
    })
}

fn text_kind(component: &TemplateComponent, text: String, strikethrough: bool) -> VisualKind {
    let align = match component.style_str("textAlign") {
        Some("center") => TextAlign::Center,
        Some("right") | Some("end") => TextAlign::Right,
        _ => TextAlign::Left,
    };
    let bold = match component.style.get("fontWeight") {
        Some(Value::String(w)) => w == "bold" || w.parse::<u32>().is_ok_and(|n| n >= 600),
        Some(Value::Number(n)) => n.as_u64().is_some_and(|n| n >= 600),
        _ => false,
    };
    VisualKind::Text(TextBlock {
        text,
        font_size: component
            .style_f32("fontSize")
            .unwrap_or(component.size.height * 0.6)
            .max(1.0),
        color: component.style_color("color").unwrap_or(Color::BLACK),
        align,
        bold,
        strikethrough: strikethrough
            || component.style_str("textDecoration") == Some("line-through"),
        background: component.style_color("backgroundColor"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use cartel_types::Product;
    use serde_json::json;

    fn template() -> Template {
        serde_json::from_value(json!({
            "id": "oferta",
            "canvas": { "width": 1240, "height": 1754 },
            "components": [
                { "id": "bg", "type": "shape", "position": { "x": 0, "y": 0, "z": 0 },
                  "size": { "width": 1240, "height": 1754 }, "style": { "backgroundColor": "#ffde00" } },
                { "id": "price", "type": "price", "position": { "x": 100, "y": 800, "z": 5 },
                  "size": { "width": 1000, "height": 300 }, "style": { "fontSize": 200, "fontWeight": "bold" } },
                { "id": "name", "type": "product-name", "position": { "x": 100, "y": 200, "z": 2 },
                  "size": { "width": 1000, "height": 150 } },
                { "id": "hidden", "type": "text", "position": { "x": 0, "y": 0, "z": 9 },
                  "size": { "width": 10, "height": 10 }, "visible": false, "content": { "text": "x" } },
                { "id": "qr", "type": "qr-code", "position": { "x": 10, "y": 10, "z": 2 },
                  "size": { "width": 100, "height": 100 } },
                { "id": "before", "type": "price-before", "position": { "x": 100, "y": 700 },
                  "size": { "width": 400, "height": 80 } },
                { "id": "photo", "type": "product-image", "position": { "x": 300, "y": 1200, "rotation": 15 },
                  "size": { "width": 600, "height": 400 } }
            ]
        }))
        .unwrap()
    }

    fn product() -> Product {
        serde_json::from_value(json!({
            "sku": "1", "description": "Aceite 900ml", "price": 1899.9, "priceBefore": 2500,
            "image": "img/aceite.png"
        }))
        .unwrap()
    }

    #[test]
    fn renders_in_z_order_and_drops_hidden() {
        let template = template();
        let product = product();
        let tree = render_template(&template, &ProductView::new(&product, None), &RenderOptions::default());

        let ids: Vec<&str> = tree.nodes.iter().map(|n| n.component_id.as_str()).collect();
        assert_eq!(ids, vec!["bg", "before", "photo", "name", "qr", "price"]);
        assert!(!ids.contains(&"hidden"));
        assert_eq!((tree.width, tree.height), (1240.0, 1754.0));
    }

    #[test]
    fn unknown_types_become_placeholders() {
        let template = template();
        let product = product();
        let tree = render_template(&template, &ProductView::new(&product, None), &RenderOptions::default());
        let qr = tree.nodes.iter().find(|n| n.component_id == "qr").unwrap();
        assert_eq!(qr.kind, VisualKind::Unsupported { type_tag: "qr-code".into() });
    }

    #[test]
    fn binds_product_fields() {
        let template = template();
        let product = product();
        let tree = render_template(&template, &ProductView::new(&product, None), &RenderOptions::default());

        let text_of = |id: &str| match &tree.nodes.iter().find(|n| n.component_id == id).unwrap().kind {
            VisualKind::Text(t) => t.clone(),
            other => panic!("expected text, got {:?}", other),
        };
        let price = text_of("price");
        assert_eq!(price.text, "$ 1.899,90");
        assert!(price.bold);
        assert_eq!(price.font_size, 200.0);
        let before = text_of("before");
        assert_eq!(before.text, "$ 2.500,00");
        assert!(before.strikethrough);

        let photo = tree.nodes.iter().find(|n| n.component_id == "photo").unwrap();
        assert_eq!(photo.frame.rotation, 15.0);
        assert_eq!(tree.image_sources(), vec!["img/aceite.png"]);
    }

    #[test]
    fn price_before_is_skipped_without_discount() {
        let template = template();
        let mut product = product();
        product.price_before = None;
        let tree = render_template(&template, &ProductView::new(&product, None), &RenderOptions::default());
        assert!(tree.nodes.iter().all(|n| n.component_id != "before"));
    }

    #[test]
    fn rendering_leaves_inputs_untouched() {
        let template = template();
        let product = product();
        let edits = cartel_types::EditedProduct {
            custom_title: Some("Otro".into()),
            custom_price: Some(1.0),
            custom_image: Some("img/otro.png".into()),
        };
        let (template_before, product_before, edits_before) = (template.clone(), product.clone(), edits.clone());

        let first = render_template(&template, &ProductView::new(&product, Some(&edits)), &RenderOptions::default());
        let second = render_template(&template, &ProductView::new(&product, Some(&edits)), &RenderOptions::default());

        assert_eq!(template, template_before);
        assert_eq!(product, product_before);
        assert_eq!(edits, edits_before);
        assert_eq!(first, second);
    }
}
