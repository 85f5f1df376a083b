//! Degraded print path used when no capture strategy can rasterize a batch.
//!
//! The fallback writes plain markup, one page per poster, that any browser
//! can print. Fidelity is lower than the PDF but the user still gets a copy.

use crate::render::{VisualKind, VisualTree};
use chrono::Utc;
use std::fmt::{Debug, Write as _};
use std::io;
use std::path::PathBuf;

pub trait PrintFallback: Send + Sync + Debug {
    /// Presents the pages for printing and returns where they were written.
    fn present(&self, pages: &[VisualTree]) -> io::Result<PathBuf>;
}

/// Writes `cartel-fallback-{timestamp}.html` into a directory.
#[derive(Debug, Clone)]
pub struct HtmlPrintFallback {
    pub output_dir: PathBuf,
}

impl HtmlPrintFallback {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self { output_dir: output_dir.into() }
    }
}

impl PrintFallback for HtmlPrintFallback {
    fn present(&self, pages: &[VisualTree]) -> io::Result<PathBuf> {
        std::fs::create_dir_all(&self.output_dir)?;
        let path = self
            .output_dir
            .join(format!("cartel-fallback-{}.html", Utc::now().timestamp_millis()));
        std::fs::write(&path, fallback_markup(pages))?;
        log::warn!("Wrote print fallback for {} page(s) to {}", pages.len(), path.display());
        Ok(path)
    }
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}

/// Plain markup with one printable page per tree.
pub fn fallback_markup(pages: &[VisualTree]) -> String {
    let mut html = String::from(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<title>Carteles</title>\n<style>\n\
         @page { size: A4 landscape; margin: 0; }\n\
         .page { position: relative; overflow: hidden; page-break-after: always; margin: 0 auto; }\n\
         .page:last-child { page-break-after: auto; }\n\
         .c { position: absolute; box-sizing: border-box; overflow: hidden; }\n\
         </style>\n</head>\n<body onload=\"window.print()\">\n",
    );
    for tree in pages {
        let _ = writeln!(
            html,
            "<div class=\"page\" style=\"width:{}px;height:{}px;background:{}\">",
            tree.width,
            tree.height,
            css_color(tree.background)
        );
        for node in &tree.nodes {
            let f = node.frame;
            let mut style = format!(
                "left:{}px;top:{}px;width:{}px;height:{}px;z-index:{};opacity:{}",
                f.x, f.y, f.width, f.height, node.z, node.opacity
            );
            if f.rotation != 0.0 {
                let _ = write!(style, ";transform:rotate({}deg)", f.rotation);
            }
            let body = match &node.kind {
                VisualKind::Text(text) => {
                    let _ = write!(
                        style,
                        ";font-size:{}px;color:{};font-weight:{};text-align:{}",
                        text.font_size,
                        css_color(text.color),
                        if text.bold { "bold" } else { "normal" },
                        text.align.as_css()
                    );
                    if text.strikethrough {
                        style.push_str(";text-decoration:line-through");
                    }
                    if let Some(bg) = text.background {
                        let _ = write!(style, ";background:{}", css_color(bg));
                    }
                    escape(&text.text)
                }
                VisualKind::Image(image) => format!(
                    "<img src=\"{}\" style=\"width:100%;height:100%;object-fit:{}\">",
                    escape(&image.source),
                    match image.fit {
                        crate::render::ImageFit::Contain => "contain",
                        crate::render::ImageFit::Fill => "fill",
                    }
                ),
                VisualKind::Shape(shape) => {
                    if let Some(fill) = shape.fill {
                        let _ = write!(style, ";background:{}", css_color(fill));
                    }
                    if let Some((color, width)) = shape.stroke {
                        let _ = write!(style, ";border:{}px solid {}", width, css_color(color));
                    }
                    if shape.ellipse {
                        style.push_str(";border-radius:50%");
                    } else if shape.corner_radius > 0.0 {
                        let _ = write!(style, ";border-radius:{}px", shape.corner_radius);
                    }
                    String::new()
                }
                VisualKind::Line { color, thickness } => format!(
                    "<hr style=\"margin:0;border:0;border-top:{}px solid {}\">",
                    thickness,
                    css_color(*color)
                ),
                VisualKind::Unsupported { type_tag } => {
                    style.push_str(";border:2px dashed #dc0000;color:#dc0000");
                    format!("unsupported: {}", escape(type_tag))
                }
            };
            let _ = writeln!(html, "<div class=\"c\" style=\"{}\">{}</div>", style, body);
        }
        html.push_str("</div>\n");
    }
    html.push_str("</body>\n</html>\n");
    html
}

fn css_color(color: cartel_types::Color) -> String {
    format!("rgba({},{},{},{})", color.r, color.g, color.b, color.a)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::{TextAlign, TextBlock, VisualNode};
    use cartel_types::{Color, Frame};

    fn page(text: &str) -> VisualTree {
        VisualTree {
            width: 1240.0,
            height: 1754.0,
            background: Color::WHITE,
            nodes: vec![VisualNode {
                component_id: "title".into(),
                frame: Frame { x: 10.0, y: 20.0, width: 300.0, height: 80.0, rotation: 0.0 },
                z: 1,
                opacity: 1.0,
                kind: VisualKind::Text(TextBlock {
                    text: text.into(),
                    font_size: 32.0,
                    color: Color::BLACK,
                    align: TextAlign::Left,
                    bold: true,
                    strikethrough: false,
                    background: None,
                }),
            }],
        }
    }

    #[test]
    fn one_page_per_tree_with_escaped_text() {
        let html = fallback_markup(&[page("Café <2x1>"), page("Arroz & Porotos")]);
        assert_eq!(html.matches("class=\"page\"").count(), 2);
        assert!(html.contains("Café &lt;2x1&gt;"));
        assert!(html.contains("Arroz &amp; Porotos"));
        assert!(html.contains("size: A4 landscape"));
    }

    #[test]
    fn writes_html_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = HtmlPrintFallback::new(dir.path()).present(&[page("Leche")]).unwrap();
        assert!(path.file_name().unwrap().to_string_lossy().starts_with("cartel-fallback-"));
        let written = std::fs::read_to_string(path).unwrap();
        assert!(written.contains("Leche"));
    }
}
