//! Flow-layout rasterizer for an export surface.
//!
//! Text is set in the 8x8 bitmap font from `font8x8`, scaled to the run's
//! font size. Layout is a simple inline flow: whitespace collapses, words
//! wrap at the content edge, images sit inline at no more than the content
//! width, and line breaks start a new line.

use font8x8::{UnicodeFonts, BASIC_FONTS, LATIN_FONTS};
use image::imageops::{self, FilterType};
use image::{Rgba, RgbaImage};

use super::{ExportOptions, Surface};
use crate::error::ExportError;
use crate::model::{parse_css_color, EmbeddedImage, Run, StyleDescriptor};

const BASE_FONT_PX: f32 = 16.0;
const LINE_HEIGHT: f32 = 1.25;
/// Glyph cell width and height as a fraction of the font size
const GLYPH_EM: f32 = 0.625;
/// Upper bound on bitmap area (in pixels) before export gives up
pub const MAX_RASTER_PIXELS: u64 = 1 << 28;

const PAPER: Rgba<u8> = Rgba([255, 255, 255, 255]);
const INK: Rgba<u8> = Rgba([0, 0, 0, 255]);

#[derive(Debug, Clone, Copy, PartialEq)]
struct TextStyle {
    font_px: f32,
    bold: bool,
    color: Rgba<u8>,
    highlight: Option<Rgba<u8>>,
}

impl TextStyle {
    fn resolve(style: &StyleDescriptor) -> Self {
        Self {
            font_px: style
                .font_size_px
                .filter(|px| *px > 0)
                .map_or(BASE_FONT_PX, |px| px as f32),
            bold: style.is_bold().unwrap_or(false),
            color: style
                .text_color
                .as_deref()
                .and_then(parse_css_color)
                .unwrap_or(INK),
            highlight: style.highlight_color.as_deref().and_then(parse_css_color),
        }
    }
}

#[derive(Debug)]
enum Item {
    Text {
        x: f32,
        text: String,
        width: f32,
        style: TextStyle,
    },
    Picture {
        x: f32,
        pixels: RgbaImage,
    },
}

impl Item {
    fn height(&self, scale: f32) -> f32 {
        match self {
            Item::Text { style, .. } => style.font_px * LINE_HEIGHT * scale,
            Item::Picture { pixels, .. } => pixels.height() as f32,
        }
    }
}

#[derive(Debug)]
struct Line {
    items: Vec<Item>,
    height: f32,
}

/// Inline flow for one section, in device pixels
struct Layout {
    scale: f32,
    max_width: f32,
    lines: Vec<Line>,
    current: Vec<Item>,
    x: f32,
    pending_space: bool,
}

impl Layout {
    fn new(scale: f32, max_width: f32) -> Self {
        Self {
            scale,
            max_width,
            lines: Vec::new(),
            current: Vec::new(),
            x: 0.0,
            pending_space: false,
        }
    }

    fn push_text(&mut self, text: &str, style: TextStyle) {
        let advance = style.font_px * GLYPH_EM * self.scale;
        for (is_space, word) in tokens(text) {
            if is_space {
                self.pending_space = self.x > 0.0;
                continue;
            }

            let chars: Vec<char> = word.chars().collect();
            let space = if self.pending_space { advance } else { 0.0 };
            let width = chars.len() as f32 * advance;
            if self.x > 0.0 && self.x + space + width > self.max_width {
                self.end_line();
            } else if self.pending_space {
                self.place(" ".to_string(), advance, style);
            }
            self.pending_space = false;

            // Words longer than a whole line are broken by character
            let mut rest = chars.as_slice();
            while !rest.is_empty() {
                let room = ((self.max_width - self.x) / advance).floor().max(0.0) as usize;
                if room == 0 && self.x > 0.0 {
                    self.end_line();
                    continue;
                }
                let take = room.clamp(1, rest.len());
                self.place(rest[..take].iter().collect(), take as f32 * advance, style);
                rest = &rest[take..];
                if !rest.is_empty() {
                    self.end_line();
                }
            }
        }
    }

    fn push_picture(&mut self, pixels: RgbaImage) {
        let width = pixels.width() as f32;
        if self.x > 0.0 && self.x + width > self.max_width {
            self.end_line();
        }
        self.pending_space = false;
        self.current.push(Item::Picture { x: self.x, pixels });
        self.x += width;
    }

    fn place(&mut self, text: String, width: f32, style: TextStyle) {
        self.current.push(Item::Text {
            x: self.x,
            text,
            width,
            style,
        });
        self.x += width;
    }

    fn end_line(&mut self) {
        let items = std::mem::take(&mut self.current);
        let height = items
            .iter()
            .map(|item| item.height(self.scale))
            .fold(0.0, f32::max);
        let height = if items.is_empty() {
            BASE_FONT_PX * LINE_HEIGHT * self.scale
        } else {
            height
        };
        self.lines.push(Line { items, height });
        self.x = 0.0;
        self.pending_space = false;
    }

    fn finish(mut self) -> Vec<Line> {
        if !self.current.is_empty() {
            self.end_line();
        }
        self.lines
    }
}

/// Split into alternating whitespace / non-whitespace slices
fn tokens(text: &str) -> Vec<(bool, &str)> {
    let mut out = Vec::new();
    let mut start = 0;
    let mut state = None;
    for (i, c) in text.char_indices() {
        let space = c.is_whitespace();
        match state {
            Some(s) if s == space => {}
            Some(s) => {
                out.push((s, &text[start..i]));
                start = i;
                state = Some(space);
            }
            None => state = Some(space),
        }
    }
    if let Some(s) = state {
        out.push((s, &text[start..]));
    }
    out
}

/// Decode and size an inline image: CSS `max-width: 100%`, then device scale
fn picture(image: &EmbeddedImage, content_width_css: f32, scale: f32) -> Option<RgbaImage> {
    let decoded = match image.decode() {
        Ok(decoded) => decoded,
        Err(e) => {
            tracing::warn!(error = %e, mime = %image.mime_type, "skipping undecodable image");
            return None;
        }
    };
    if decoded.width() == 0 || decoded.height() == 0 {
        return None;
    }

    let natural_w = decoded.width() as f32;
    let css_w = natural_w.min(content_width_css);
    let css_h = decoded.height() as f32 * css_w / natural_w;
    let width = (css_w * scale).round().max(1.0) as u32;
    let height = (css_h * scale).round().max(1.0) as u32;

    let pixels = decoded.to_rgba8();
    if pixels.dimensions() == (width, height) {
        Some(pixels)
    } else {
        Some(imageops::resize(&pixels, width, height, FilterType::Triangle))
    }
}

/// Render the surface at `options.render_scale()` device pixels per CSS pixel
pub fn rasterize(surface: &Surface, options: &ExportOptions) -> Result<RgbaImage, ExportError> {
    let scale = options.render_scale();
    let padding_css = options.padding_px as f32;
    let content_width_css = (options.container_width_px as f32 - 2.0 * padding_css).max(1.0);
    let width = (options.container_width_px as f32 * scale).round().max(1.0) as u32;
    let padding = padding_css * scale;
    let content_width = (width as f32 - 2.0 * padding).max(1.0);

    let mut blocks = Vec::with_capacity(surface.sections().len());
    for section in surface.sections() {
        let mut layout = Layout::new(scale, content_width);
        for run in section.tree.runs() {
            match run {
                Run::Text { text, style } => layout.push_text(text, TextStyle::resolve(&style)),
                Run::Image(image) => {
                    if let Some(pixels) = picture(image, content_width_css, scale) {
                        layout.push_picture(pixels);
                    }
                }
                Run::LineBreak => layout.end_line(),
            }
        }
        blocks.push((layout.finish(), section.margin_bottom_px as f32 * scale));
    }

    let content_height: f32 = blocks
        .iter()
        .map(|(lines, margin)| lines.iter().map(|l| l.height).sum::<f32>() + margin)
        .sum();
    let height = (content_height + 2.0 * padding).round().max(1.0) as u32;

    let area = u64::from(width) * u64::from(height);
    if area > MAX_RASTER_PIXELS {
        return Err(ExportError::SurfaceTooLarge {
            width: u64::from(width),
            height: u64::from(height),
        });
    }

    let mut bitmap = RgbaImage::from_pixel(width, height, PAPER);
    let mut y = padding;
    for (lines, margin) in &blocks {
        for line in lines {
            draw_line(&mut bitmap, line, padding, y, scale);
            y += line.height;
        }
        y += margin;
    }

    tracing::debug!(width, height, scale, "surface rasterized");
    Ok(bitmap)
}

fn draw_line(bitmap: &mut RgbaImage, line: &Line, left: f32, top: f32, scale: f32) {
    for item in &line.items {
        // Items share a baseline at the bottom of the line box
        let item_top = top + line.height - item.height(scale);
        match item {
            Item::Text {
                x,
                text,
                width,
                style,
            } => {
                let line_px = style.font_px * LINE_HEIGHT * scale;
                if let Some(highlight) = style.highlight {
                    fill_rect(bitmap, left + x, item_top, *width, line_px, highlight);
                }
                let cell = style.font_px * GLYPH_EM * scale;
                let glyph_top = item_top + (line_px - cell) / 2.0;
                for (i, ch) in text.chars().enumerate() {
                    draw_glyph(bitmap, left + x + i as f32 * cell, glyph_top, cell, ch, style);
                }
            }
            Item::Picture { x, pixels } => {
                imageops::overlay(
                    bitmap,
                    pixels,
                    (left + x).round() as i64,
                    item_top.round() as i64,
                );
            }
        }
    }
}

fn draw_glyph(bitmap: &mut RgbaImage, x: f32, y: f32, cell: f32, ch: char, style: &TextStyle) {
    let glyph = BASIC_FONTS
        .get(ch)
        .or_else(|| LATIN_FONTS.get(ch))
        .or_else(|| BASIC_FONTS.get('?'));
    let Some(glyph) = glyph else {
        return;
    };

    let size = cell.round().max(1.0) as i64;
    let (ox, oy) = (x.round() as i64, y.round() as i64);
    let embolden = if style.bold { (size / 16).max(1) } else { 0 };
    for dy in 0..size {
        let row = glyph[(dy * 8 / size) as usize];
        for dx in 0..size {
            if (row >> (dx * 8 / size)) & 1 == 0 {
                continue;
            }
            for extra in 0..=embolden {
                put_pixel(bitmap, ox + dx + extra, oy + dy, style.color);
            }
        }
    }
}

fn fill_rect(bitmap: &mut RgbaImage, x: f32, y: f32, w: f32, h: f32, color: Rgba<u8>) {
    let (x0, y0) = (x.round() as i64, y.round() as i64);
    let (x1, y1) = ((x + w).round() as i64, (y + h).round() as i64);
    for py in y0..y1 {
        for px in x0..x1 {
            put_pixel(bitmap, px, py, color);
        }
    }
}

fn put_pixel(bitmap: &mut RgbaImage, x: i64, y: i64, color: Rgba<u8>) {
    if x < 0 || y < 0 || x >= i64::from(bitmap.width()) || y >= i64::from(bitmap.height()) {
        return;
    }
    bitmap.put_pixel(x as u32, y as u32, color);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::markup;
    use crate::model::{ContentTree, Node, Note};
    use crate::test_support::png_bytes;

    fn options(scale: f32) -> ExportOptions {
        ExportOptions {
            device_scale: Some(scale),
            ..ExportOptions::default()
        }
    }

    fn has_color(bitmap: &RgbaImage, color: Rgba<u8>) -> bool {
        bitmap.pixels().any(|p| *p == color)
    }

    #[test]
    fn test_tokens() {
        assert_eq!(
            tokens("  ab c"),
            vec![(true, "  "), (false, "ab"), (true, " "), (false, "c")]
        );
        assert!(tokens("").is_empty());
    }

    #[test]
    fn test_width_follows_scale() {
        let note = Note::new("Algebra", "");
        let surface = Surface::assemble(&note);

        assert_eq!(rasterize(&surface, &options(1.0)).unwrap().width(), 800);
        assert_eq!(rasterize(&surface, &options(2.0)).unwrap().width(), 1600);
        // Scale is capped at 2
        assert_eq!(rasterize(&surface, &options(3.0)).unwrap().width(), 1600);
    }

    #[test]
    fn test_text_is_inked() {
        let mut note = Note::new("", "");
        note.body = markup::parse("<span style=\"color: red;\">hello</span>");
        let bitmap = rasterize(&Surface::assemble(&note), &options(1.0)).unwrap();

        assert!(has_color(&bitmap, INK));
        assert!(has_color(&bitmap, Rgba([255, 0, 0, 255])));
    }

    #[test]
    fn test_highlight_is_painted() {
        let mut note = Note::new("", "");
        note.body = markup::parse("<span style=\"background-color: yellow;\">mark</span>");
        let bitmap = rasterize(&Surface::assemble(&note), &options(1.0)).unwrap();
        assert!(has_color(&bitmap, Rgba([255, 255, 0, 255])));
    }

    #[test]
    fn test_long_text_wraps_to_more_lines() {
        let mut short = Note::new("t", "");
        short.body = markup::parse("word");
        let mut long = Note::new("t", "");
        long.body = markup::parse(&"word ".repeat(200));

        let short_h = rasterize(&Surface::assemble(&short), &options(1.0)).unwrap().height();
        let long_h = rasterize(&Surface::assemble(&long), &options(1.0)).unwrap().height();
        assert!(long_h > short_h + 100);
    }

    #[test]
    fn test_line_breaks_add_height() {
        let mut one = Note::new("t", "");
        one.body = markup::parse("a");
        let mut three = Note::new("t", "");
        three.body = markup::parse("a<br>b<br>c");

        let one_h = rasterize(&Surface::assemble(&one), &options(1.0)).unwrap().height();
        let three_h = rasterize(&Surface::assemble(&three), &options(1.0)).unwrap().height();
        assert_eq!(three_h - one_h, 40);
    }

    #[test]
    fn test_images_fit_content_width() {
        let mut note = Note::new("t", "");
        note.body = ContentTree::from_nodes(vec![Node::Image(EmbeddedImage::new(
            "image/png",
            png_bytes(1504, 200),
        ))]);
        let with_image = rasterize(&Surface::assemble(&note), &options(1.0)).unwrap();
        let without = rasterize(&Surface::assemble(&Note::new("t", "")), &options(1.0)).unwrap();

        assert_eq!(with_image.width(), 800);
        // 1504 wide shrinks to the 752px content box, so 100 tall
        assert_eq!(with_image.height(), without.height() + 100);
    }

    #[test]
    fn test_undecodable_image_is_skipped() {
        let mut note = Note::new("t", "");
        note.body = ContentTree::from_nodes(vec![Node::Image(EmbeddedImage::new(
            "image/png",
            b"junk".to_vec(),
        ))]);
        assert!(rasterize(&Surface::assemble(&note), &options(1.0)).is_ok());
    }
}
