//! Shared painting of visual nodes onto tiny-skia surfaces.

use super::CaptureError;
use super::fonts::FontBook;
use crate::render::{ImageBlock, ImageFit, ShapeBlock, TextAlign, TextBlock, VisualKind, VisualNode, VisualTree};
use cartel_traits::{ResourceError, ResourceProvider};
use cartel_types::{Color, Frame, RasterImage};
use std::collections::HashMap;
use tiny_skia::{
    ColorU8, FillRule, FilterQuality, Paint, Path, PathBuilder, Pixmap, PixmapPaint, Rect, Stroke,
    StrokeDash, Transform,
};
use ttf_parser::{Face, OutlineBuilder};

const LINE_HEIGHT: f32 = 1.15;
const MIN_FONT_SIZE: f32 = 4.0;

/// Decoded images keyed by reference. `None` marks a reference with no resource behind it.
pub(crate) type ImageCache = HashMap<String, Option<Pixmap>>;

/// Loads and decodes every image the tree references.
///
/// A reference the provider does not know is painted as a placeholder. Bytes
/// that fail to load or decode fail the capture.
pub(crate) fn decode_images(tree: &VisualTree, resources: &dyn ResourceProvider) -> Result<ImageCache, CaptureError> {
    let mut cache = ImageCache::new();
    for source in tree.image_sources() {
        let decoded = match resources.load(source) {
            Ok(bytes) => Some(
                decode_image(&bytes).ok_or_else(|| CaptureError::Image(format!("'{}' could not be decoded", source)))?,
            ),
            Err(ResourceError::NotFound(_)) => {
                log::warn!("Image '{}' not found in {}; painting a placeholder", source, resources.name());
                None
            }
            Err(e) => {
                return Err(CaptureError::Image(format!(
                    "'{}' unavailable from {}: {}",
                    source,
                    resources.name(),
                    e
                )));
            }
        };
        cache.insert(source.to_string(), decoded);
    }
    Ok(cache)
}

fn decode_image(bytes: &[u8]) -> Option<Pixmap> {
    let rgba = image::load_from_memory(bytes).ok()?.to_rgba8();
    let mut pixmap = Pixmap::new(rgba.width(), rgba.height())?;
    for (dst, px) in pixmap.pixels_mut().iter_mut().zip(rgba.pixels()) {
        *dst = ColorU8::from_rgba(px[0], px[1], px[2], px[3]).premultiply();
    }
    Some(pixmap)
}

pub(crate) fn pixmap_to_raster(pixmap: &Pixmap) -> RasterImage {
    let mut rgba = Vec::with_capacity(pixmap.data().len());
    for px in pixmap.pixels() {
        let c = px.demultiply();
        rgba.extend_from_slice(&[c.red(), c.green(), c.blue(), c.alpha()]);
    }
    RasterImage {
        width: pixmap.width(),
        height: pixmap.height(),
        rgba,
    }
}

pub(crate) fn sk_color(color: Color) -> tiny_skia::Color {
    tiny_skia::Color::from_rgba8(color.r, color.g, color.b, color.alpha_u8())
}

fn paint_for(color: Color, opacity: f32) -> Option<Paint<'static>> {
    let alpha = (color.a * opacity).clamp(0.0, 1.0);
    if alpha <= 0.0 {
        return None;
    }
    let mut paint = Paint::default();
    paint.set_color_rgba8(color.r, color.g, color.b, (alpha * 255.0).round() as u8);
    paint.anti_alias = true;
    Some(paint)
}

pub(crate) struct Painter<'a> {
    pub fonts: &'a FontBook,
    pub images: &'a ImageCache,
}

impl Painter<'_> {
    /// Paints `node` in canvas coordinates mapped through `base`.
    pub fn paint(&self, pixmap: &mut Pixmap, node: &VisualNode, base: Transform) {
        let frame = node.frame;
        let transform = if frame.rotation == 0.0 {
            base
        } else {
            let (cx, cy) = frame.center();
            base.pre_concat(Transform::from_rotate_at(frame.rotation, cx, cy))
        };

        match &node.kind {
            VisualKind::Shape(shape) => self.paint_shape(pixmap, &frame, shape, node.opacity, transform),
            VisualKind::Line { color, thickness } => {
                paint_line(pixmap, &frame, *color, *thickness, node.opacity, transform)
            }
            VisualKind::Image(image) => self.paint_image(pixmap, &frame, image, node.opacity, transform),
            VisualKind::Text(text) => self.paint_text(pixmap, &frame, text, node.opacity, transform),
            VisualKind::Unsupported { type_tag } => {
                self.paint_unsupported(pixmap, &frame, type_tag, transform)
            }
        }
    }

    fn paint_shape(&self, pixmap: &mut Pixmap, frame: &Frame, shape: &ShapeBlock, opacity: f32, t: Transform) {
        let Some(path) = shape_path(frame, shape) else {
            return;
        };
        if let Some(paint) = shape.fill.and_then(|c| paint_for(c, opacity)) {
            pixmap.fill_path(&path, &paint, FillRule::Winding, t, None);
        }
        if let Some((color, width)) = shape.stroke
            && let Some(paint) = paint_for(color, opacity)
        {
            let stroke = Stroke { width, ..Stroke::default() };
            pixmap.stroke_path(&path, &paint, &stroke, t, None);
        }
    }

    fn paint_image(&self, pixmap: &mut Pixmap, frame: &Frame, image: &ImageBlock, opacity: f32, t: Transform) {
        let Some(Some(img)) = self.images.get(&image.source) else {
            paint_missing(pixmap, frame, t);
            return;
        };
        let (iw, ih) = (img.width() as f32, img.height() as f32);
        let (sx, sy, dx, dy) = match image.fit {
            ImageFit::Contain => {
                let s = (frame.width / iw).min(frame.height / ih);
                (s, s, frame.x + (frame.width - iw * s) / 2.0, frame.y + (frame.height - ih * s) / 2.0)
            }
            ImageFit::Fill => (frame.width / iw, frame.height / ih, frame.x, frame.y),
        };
        let paint = PixmapPaint {
            opacity,
            quality: FilterQuality::Bicubic,
            ..PixmapPaint::default()
        };
        pixmap.draw_pixmap(
            0,
            0,
            img.as_ref(),
            &paint,
            t.pre_concat(Transform::from_row(sx, 0.0, 0.0, sy, dx, dy)),
            None,
        );
    }

    fn paint_text(&self, pixmap: &mut Pixmap, frame: &Frame, block: &TextBlock, opacity: f32, t: Transform) {
        if let Some(bg) = block.background
            && let Some(paint) = paint_for(bg, opacity)
            && let Some(rect) = Rect::from_xywh(frame.x, frame.y, frame.width, frame.height)
        {
            pixmap.fill_rect(rect, &paint, t, None);
        }
        if block.text.trim().is_empty() {
            return;
        }
        let Some(paint) = paint_for(block.color, opacity) else {
            return;
        };

        let face = self.fonts.face(block.bold);
        let (size, lines) = fit_text(&block.text, block.font_size, frame, face.as_ref());
        let metrics = Metrics::new(face.as_ref(), size);
        let line_height = size * LINE_HEIGHT;
        let block_height = line_height * lines.len() as f32;
        let top = frame.y + ((frame.height - block_height) / 2.0).max(0.0);
        let embolden = block.bold && (face.is_none() || self.fonts.synthesizes_bold());

        for (i, line) in lines.iter().enumerate() {
            let line_width = metrics.measure(line);
            let x0 = match block.align {
                TextAlign::Left => frame.x,
                TextAlign::Center => frame.x + (frame.width - line_width) / 2.0,
                TextAlign::Right => frame.x + frame.width - line_width,
            };
            let baseline = top + i as f32 * line_height + metrics.ascent();

            let mut builder = PathBuilder::new();
            let mut pen = x0;
            for ch in line.chars() {
                let advance = metrics.advance(ch);
                match &face {
                    Some(face) => {
                        if let Some(gid) = face.glyph_index(ch) {
                            let mut glyph = GlyphPath {
                                builder: &mut builder,
                                x: pen,
                                y: baseline,
                                scale: metrics.scale,
                            };
                            let _ = face.outline_glyph(gid, &mut glyph);
                        }
                    }
                    None if !ch.is_whitespace() => {
                        if let Some(rect) = Rect::from_xywh(
                            pen + advance * 0.1,
                            baseline - size * 0.62,
                            advance * 0.8,
                            size * 0.62,
                        ) {
                            builder.push_rect(rect);
                        }
                    }
                    None => {}
                }
                pen += advance;
            }
            if let Some(path) = builder.finish() {
                pixmap.fill_path(&path, &paint, FillRule::Winding, t, None);
                if embolden {
                    let stroke = Stroke { width: size * 0.035, ..Stroke::default() };
                    pixmap.stroke_path(&path, &paint, &stroke, t, None);
                }
            }

            if block.strikethrough {
                let y = baseline - size * 0.3;
                stroke_segment(pixmap, (x0, y), (x0 + line_width, y), (size * 0.06).max(1.0), &paint, t);
            }
        }
    }

    fn paint_unsupported(&self, pixmap: &mut Pixmap, frame: &Frame, type_tag: &str, t: Transform) {
        let Some(rect) = Rect::from_xywh(frame.x, frame.y, frame.width, frame.height) else {
            return;
        };
        if let Some(fill) = paint_for(Color::rgb(255, 0, 0), 0.12) {
            pixmap.fill_rect(rect, &fill, t, None);
        }
        let Some(red) = paint_for(Color::rgb(220, 0, 0), 1.0) else {
            return;
        };
        let stroke = Stroke {
            width: 2.0,
            dash: StrokeDash::new(vec![8.0, 4.0], 0.0),
            ..Stroke::default()
        };
        let outline = PathBuilder::from_rect(rect);
        pixmap.stroke_path(&outline, &red, &stroke, t, None);

        let label = TextBlock {
            text: format!("unsupported: {}", type_tag),
            font_size: (frame.height * 0.2).clamp(MIN_FONT_SIZE, 16.0),
            color: Color::rgb(220, 0, 0),
            align: TextAlign::Center,
            bold: false,
            strikethrough: false,
            background: None,
        };
        self.paint_text(pixmap, frame, &label, 1.0, t);
    }
}

fn shape_path(frame: &Frame, shape: &ShapeBlock) -> Option<Path> {
    let rect = Rect::from_xywh(frame.x, frame.y, frame.width, frame.height)?;
    if shape.ellipse {
        return PathBuilder::from_oval(rect);
    }
    let r = shape.corner_radius.min(frame.width / 2.0).min(frame.height / 2.0);
    if r <= 0.0 {
        return Some(PathBuilder::from_rect(rect));
    }
    let (x, y, w, h) = (frame.x, frame.y, frame.width, frame.height);
    let mut pb = PathBuilder::new();
    pb.move_to(x + r, y);
    pb.line_to(x + w - r, y);
    pb.quad_to(x + w, y, x + w, y + r);
    pb.line_to(x + w, y + h - r);
    pb.quad_to(x + w, y + h, x + w - r, y + h);
    pb.line_to(x + r, y + h);
    pb.quad_to(x, y + h, x, y + h - r);
    pb.line_to(x, y + r);
    pb.quad_to(x, y, x + r, y);
    pb.close();
    pb.finish()
}

fn paint_line(pixmap: &mut Pixmap, frame: &Frame, color: Color, thickness: f32, opacity: f32, t: Transform) {
    if let Some(paint) = paint_for(color, opacity) {
        let cy = frame.y + frame.height / 2.0;
        stroke_segment(pixmap, (frame.x, cy), (frame.x + frame.width, cy), thickness, &paint, t);
    }
}

fn paint_missing(pixmap: &mut Pixmap, frame: &Frame, t: Transform) {
    let Some(rect) = Rect::from_xywh(frame.x, frame.y, frame.width, frame.height) else {
        return;
    };
    if let Some(fill) = paint_for(Color::gray(224), 1.0) {
        pixmap.fill_rect(rect, &fill, t, None);
    }
    if let Some(ink) = paint_for(Color::gray(160), 1.0) {
        stroke_segment(pixmap, (rect.left(), rect.top()), (rect.right(), rect.bottom()), 2.0, &ink, t);
        stroke_segment(pixmap, (rect.right(), rect.top()), (rect.left(), rect.bottom()), 2.0, &ink, t);
    }
}

fn stroke_segment(pixmap: &mut Pixmap, from: (f32, f32), to: (f32, f32), width: f32, paint: &Paint, t: Transform) {
    let mut pb = PathBuilder::new();
    pb.move_to(from.0, from.1);
    pb.line_to(to.0, to.1);
    if let Some(path) = pb.finish() {
        let stroke = Stroke { width, ..Stroke::default() };
        pixmap.stroke_path(&path, paint, &stroke, t, None);
    }
}

/// Horizontal metrics at one font size. Without a face, glyphs are fixed-width boxes.
struct Metrics<'a, 'f> {
    face: Option<&'a Face<'f>>,
    size: f32,
    scale: f32,
}

impl<'a, 'f> Metrics<'a, 'f> {
    fn new(face: Option<&'a Face<'f>>, size: f32) -> Self {
        let scale = face.map(|f| size / f.units_per_em() as f32).unwrap_or(1.0);
        Self { face, size, scale }
    }

    fn advance(&self, ch: char) -> f32 {
        match self.face {
            Some(face) => {
                let units = face
                    .glyph_index(ch)
                    .and_then(|g| face.glyph_hor_advance(g))
                    .unwrap_or(face.units_per_em() / 2);
                units as f32 * self.scale
            }
            None if ch.is_whitespace() => self.size * 0.3,
            None => self.size * 0.55,
        }
    }

    fn measure(&self, text: &str) -> f32 {
        text.chars().map(|c| self.advance(c)).sum()
    }

    fn ascent(&self) -> f32 {
        match self.face {
            Some(face) => face.ascender() as f32 * self.scale,
            None => self.size * 0.8,
        }
    }
}

/// Greedy word wrap, shrinking the font until the block fits the frame.
fn fit_text(text: &str, font_size: f32, frame: &Frame, face: Option<&Face<'_>>) -> (f32, Vec<String>) {
    // NaN or infinity never shrinks below the floor.
    let mut size = if font_size.is_finite() {
        font_size
    } else {
        frame.height.max(MIN_FONT_SIZE)
    };
    loop {
        let metrics = Metrics::new(face, size);
        let lines = wrap(text, frame.width, &metrics);
        let widest = lines.iter().map(|l| metrics.measure(l)).fold(0.0, f32::max);
        let height = lines.len() as f32 * size * LINE_HEIGHT;
        let fits = widest <= frame.width + 0.5 && height <= frame.height + 0.5;
        if fits || size * 0.9 < MIN_FONT_SIZE {
            return (size, lines);
        }
        size *= 0.9;
    }
}

fn wrap(text: &str, max_width: f32, metrics: &Metrics<'_, '_>) -> Vec<String> {
    let mut lines = Vec::new();
    for paragraph in text.split('\n') {
        let mut current = String::new();
        for word in paragraph.split_whitespace() {
            let candidate = if current.is_empty() {
                word.to_string()
            } else {
                format!("{} {}", current, word)
            };
            if !current.is_empty() && metrics.measure(&candidate) > max_width {
                lines.push(std::mem::take(&mut current));
                current = word.to_string();
            } else {
                current = candidate;
            }
        }
        lines.push(current);
    }
    lines
}

/// Maps font-unit outlines into canvas space at a pen position.
struct GlyphPath<'p> {
    builder: &'p mut PathBuilder,
    x: f32,
    y: f32,
    scale: f32,
}

impl GlyphPath<'_> {
    fn map(&self, x: f32, y: f32) -> (f32, f32) {
        (self.x + x * self.scale, self.y - y * self.scale)
    }
}

impl OutlineBuilder for GlyphPath<'_> {
    fn move_to(&mut self, x: f32, y: f32) {
        let (x, y) = self.map(x, y);
        self.builder.move_to(x, y);
    }

    fn line_to(&mut self, x: f32, y: f32) {
        let (x, y) = self.map(x, y);
        self.builder.line_to(x, y);
    }

    fn quad_to(&mut self, x1: f32, y1: f32, x: f32, y: f32) {
        let (x1, y1) = self.map(x1, y1);
        let (x, y) = self.map(x, y);
        self.builder.quad_to(x1, y1, x, y);
    }

    fn curve_to(&mut self, x1: f32, y1: f32, x2: f32, y2: f32, x: f32, y: f32) {
        let (x1, y1) = self.map(x1, y1);
        let (x2, y2) = self.map(x2, y2);
        let (x, y) = self.map(x, y);
        self.builder.cubic_to(x1, y1, x2, y2, x, y);
    }

    fn close(&mut self) {
        self.builder.close();
    }
}
