//! Freehand annotation capture.
//!
//! Pointer events drive an explicit `Idle -> Stroking -> Idle` state
//! machine. Each extension rasterizes its segment straight into the
//! annotation bitmap, so closing mid-stroke keeps what was drawn.

use std::io::Cursor as IoCursor;

use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
use uuid::Uuid;

use crate::error::CaptureError;
use crate::model::{parse_css_color, EmbeddedImage};

const TRANSPARENT: Rgba<u8> = Rgba([0, 0, 0, 0]);
const FALLBACK_INK: Rgba<u8> = Rgba([0, 0, 0, 255]);

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Pen settings. A stroke keeps the pen it started with.
#[derive(Debug, Clone, PartialEq)]
pub struct Pen {
    pub color: String,
    pub width: f32,
}

impl Default for Pen {
    fn default() -> Self {
        Self {
            color: "#000000".to_string(),
            width: 3.0,
        }
    }
}

/// One pointer-down to pointer-up path, in canvas-local CSS pixels
#[derive(Debug, Clone)]
pub struct Stroke {
    pub id: Uuid,
    pub pen: Pen,
    pub points: Vec<Point>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureState {
    Idle,
    Stroking,
}

/// A drawing surface with its accumulated annotation bitmap
#[derive(Debug, Clone)]
pub struct AnnotationSurface {
    origin: Point,
    device_pixel_ratio: f32,
    bitmap: RgbaImage,
    state: CaptureState,
    pen: Pen,
    strokes: Vec<Stroke>,
    open: bool,
}

impl AnnotationSurface {
    /// Set up a surface of `css_width x css_height` whose top-left corner
    /// sits at `origin` on screen. The bitmap is allocated at device
    /// resolution once, here.
    pub fn new(css_width: u32, css_height: u32, origin: Point, device_pixel_ratio: f32) -> Self {
        let dpr = if device_pixel_ratio.is_finite() && device_pixel_ratio > 0.0 {
            device_pixel_ratio
        } else {
            1.0
        };
        let width = ((css_width as f32) * dpr).round().max(1.0) as u32;
        let height = ((css_height as f32) * dpr).round().max(1.0) as u32;

        Self {
            origin,
            device_pixel_ratio: dpr,
            bitmap: RgbaImage::from_pixel(width, height, TRANSPARENT),
            state: CaptureState::Idle,
            pen: Pen::default(),
            strokes: Vec::new(),
            open: true,
        }
    }

    pub fn state(&self) -> CaptureState {
        self.state
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn pen(&self) -> &Pen {
        &self.pen
    }

    pub fn set_pen_color(&mut self, color: &str) {
        self.pen.color = color.to_string();
    }

    pub fn set_pen_width(&mut self, width: f32) {
        self.pen.width = width;
    }

    pub fn strokes(&self) -> &[Stroke] {
        &self.strokes
    }

    pub fn bitmap(&self) -> &RgbaImage {
        &self.bitmap
    }

    pub fn device_pixel_ratio(&self) -> f32 {
        self.device_pixel_ratio
    }

    fn to_local(&self, pointer: Point) -> Point {
        Point::new(pointer.x - self.origin.x, pointer.y - self.origin.y)
    }

    /// Pointer down. Only valid while idle.
    pub fn begin_stroke(&mut self, pointer: Point) -> bool {
        if !self.open || self.state != CaptureState::Idle {
            return false;
        }
        let start = self.to_local(pointer);
        self.strokes.push(Stroke {
            id: Uuid::new_v4(),
            pen: self.pen.clone(),
            points: vec![start],
        });
        self.state = CaptureState::Stroking;
        true
    }

    /// Pointer move. Draws the new segment; ignored unless stroking.
    pub fn extend_stroke(&mut self, pointer: Point) -> bool {
        if self.state != CaptureState::Stroking {
            return false;
        }
        let point = self.to_local(pointer);
        let dpr = self.device_pixel_ratio;
        let Some(stroke) = self.strokes.last_mut() else {
            return false;
        };
        let Some(&from) = stroke.points.last() else {
            return false;
        };
        stroke.points.push(point);

        let color = parse_css_color(&stroke.pen.color).unwrap_or(FALLBACK_INK);
        draw_thick_line(
            &mut self.bitmap,
            (from.x * dpr, from.y * dpr),
            (point.x * dpr, point.y * dpr),
            color,
            stroke.pen.width * dpr,
        );
        true
    }

    /// Pointer up or leave. Tolerates a missing begin.
    pub fn end_stroke(&mut self) {
        if self.state == CaptureState::Stroking {
            if let Some(stroke) = self.strokes.last() {
                tracing::trace!(stroke = %stroke.id, points = stroke.points.len(), "stroke ended");
            }
        }
        self.state = CaptureState::Idle;
    }

    /// Wipe the bitmap. Only valid while idle.
    pub fn clear(&mut self) -> bool {
        if self.state != CaptureState::Idle {
            return false;
        }
        for pixel in self.bitmap.pixels_mut() {
            *pixel = TRANSPARENT;
        }
        self.strokes.clear();
        true
    }

    /// Encode the bitmap as PNG for insertion and close the surface
    pub fn commit(&mut self) -> Result<EmbeddedImage, CaptureError> {
        if self.state != CaptureState::Idle {
            return Err(CaptureError::Stroking);
        }
        let mut bytes = Vec::new();
        DynamicImage::ImageRgba8(self.bitmap.clone())
            .write_to(&mut IoCursor::new(&mut bytes), ImageFormat::Png)?;
        self.open = false;
        tracing::debug!(strokes = self.strokes.len(), bytes = bytes.len(), "annotation committed");
        Ok(EmbeddedImage::new("image/png", bytes))
    }

    /// Close without committing. An active stroke simply ends.
    pub fn close(&mut self) {
        self.end_stroke();
        self.open = false;
    }
}

fn blend_pixel(dst: Rgba<u8>, src: Rgba<u8>) -> Rgba<u8> {
    let a = f32::from(src[3]) / 255.0;
    if a <= 0.0 {
        return dst;
    }
    let inv = 1.0 - a;
    let mix = |d: u8, s: u8| (f32::from(d) * inv + f32::from(s) * a).round().clamp(0.0, 255.0) as u8;
    let out_a = (f32::from(dst[3]) * inv + f32::from(src[3])).round().clamp(0.0, 255.0) as u8;
    Rgba([mix(dst[0], src[0]), mix(dst[1], src[1]), mix(dst[2], src[2]), out_a])
}

fn draw_disc(img: &mut RgbaImage, cx: f32, cy: f32, radius: f32, color: Rgba<u8>) {
    let (w, h) = (img.width() as i32, img.height() as i32);
    let min_x = ((cx - radius).floor() as i32).clamp(0, w - 1);
    let max_x = ((cx + radius).ceil() as i32).clamp(0, w - 1);
    let min_y = ((cy - radius).floor() as i32).clamp(0, h - 1);
    let max_y = ((cy + radius).ceil() as i32).clamp(0, h - 1);
    let r2 = radius * radius;
    for y in min_y..=max_y {
        for x in min_x..=max_x {
            let dx = x as f32 + 0.5 - cx;
            let dy = y as f32 + 0.5 - cy;
            if dx * dx + dy * dy <= r2 {
                let dst = *img.get_pixel(x as u32, y as u32);
                img.put_pixel(x as u32, y as u32, blend_pixel(dst, color));
            }
        }
    }
}

/// Stamp discs along the segment, which also gives round caps. Only the
/// part of the segment that can touch the bitmap is stamped.
fn draw_thick_line(img: &mut RgbaImage, from: (f32, f32), to: (f32, f32), color: Rgba<u8>, width: f32) {
    let radius = (width / 2.0).max(0.5);
    let bounds = (
        -radius,
        -radius,
        img.width() as f32 + radius,
        img.height() as f32 + radius,
    );
    let Some((from, to)) = clip_segment(from, to, bounds) else {
        return;
    };

    let (dx, dy) = (to.0 - from.0, to.1 - from.1);
    let distance = (dx * dx + dy * dy).sqrt();
    let steps = distance.max(1.0).ceil() as i32;
    for step in 0..=steps {
        let t = step as f32 / steps as f32;
        draw_disc(img, from.0 + dx * t, from.1 + dy * t, radius, color);
    }
}

/// Liang-Barsky clip of a segment against `(min_x, min_y, max_x, max_y)`
fn clip_segment(
    from: (f32, f32),
    to: (f32, f32),
    (min_x, min_y, max_x, max_y): (f32, f32, f32, f32),
) -> Option<((f32, f32), (f32, f32))> {
    if ![from.0, from.1, to.0, to.1].iter().all(|v| v.is_finite()) {
        return None;
    }
    let (dx, dy) = (to.0 - from.0, to.1 - from.1);
    let (mut t0, mut t1) = (0.0f32, 1.0f32);
    for (p, q) in [
        (-dx, from.0 - min_x),
        (dx, max_x - from.0),
        (-dy, from.1 - min_y),
        (dy, max_y - from.1),
    ] {
        if p == 0.0 {
            if q < 0.0 {
                return None;
            }
            continue;
        }
        let r = q / p;
        if p < 0.0 {
            if r > t1 {
                return None;
            }
            t0 = t0.max(r);
        } else {
            if r < t0 {
                return None;
            }
            t1 = t1.min(r);
        }
    }
    Some((
        (from.0 + dx * t0, from.1 + dy * t0),
        (from.0 + dx * t1, from.1 + dy * t1),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inked(surface: &AnnotationSurface) -> usize {
        surface.bitmap().pixels().filter(|p| p[3] > 0).count()
    }

    #[test]
    fn test_setup_scales_by_device_pixel_ratio() {
        let surface = AnnotationSurface::new(200, 100, Point::new(0.0, 0.0), 2.0);
        assert_eq!(surface.bitmap().dimensions(), (400, 200));

        let fallback = AnnotationSurface::new(200, 100, Point::new(0.0, 0.0), 0.0);
        assert_eq!(fallback.device_pixel_ratio(), 1.0);
    }

    #[test]
    fn test_move_without_begin_draws_nothing() {
        let mut surface = AnnotationSurface::new(50, 50, Point::new(0.0, 0.0), 1.0);
        assert!(!surface.extend_stroke(Point::new(10.0, 10.0)));
        assert_eq!(inked(&surface), 0);

        // end without begin is tolerated
        surface.end_stroke();
        assert_eq!(surface.state(), CaptureState::Idle);
    }

    #[test]
    fn test_stroke_uses_local_coordinates_and_pen() {
        let mut surface = AnnotationSurface::new(100, 100, Point::new(100.0, 50.0), 2.0);
        surface.set_pen_color("#ff0000");
        surface.set_pen_width(4.0);

        assert!(surface.begin_stroke(Point::new(110.0, 60.0)));
        assert!(!surface.begin_stroke(Point::new(0.0, 0.0)));
        assert!(surface.extend_stroke(Point::new(150.0, 60.0)));
        surface.end_stroke();

        let stroke = &surface.strokes()[0];
        assert_eq!(stroke.points, vec![Point::new(10.0, 10.0), Point::new(50.0, 10.0)]);

        // local (30, 10) is device (60, 20)
        assert_eq!(*surface.bitmap().get_pixel(60, 20), Rgba([255, 0, 0, 255]));
        // well away from the line
        assert_eq!(surface.bitmap().get_pixel(60, 100)[3], 0);
    }

    #[test]
    fn test_pen_change_applies_to_next_stroke() {
        let mut surface = AnnotationSurface::new(100, 100, Point::new(0.0, 0.0), 1.0);
        surface.begin_stroke(Point::new(10.0, 10.0));
        surface.set_pen_color("#0000ff");
        surface.extend_stroke(Point::new(40.0, 10.0));
        surface.end_stroke();

        assert_eq!(surface.strokes()[0].pen.color, "#000000");
        assert_eq!(*surface.bitmap().get_pixel(25, 10), Rgba([0, 0, 0, 255]));
    }

    #[test]
    fn test_clear_only_when_idle() {
        let mut surface = AnnotationSurface::new(60, 60, Point::new(0.0, 0.0), 1.0);
        surface.begin_stroke(Point::new(5.0, 5.0));
        surface.extend_stroke(Point::new(50.0, 50.0));
        assert!(!surface.clear());
        assert!(inked(&surface) > 0);

        surface.end_stroke();
        assert!(surface.clear());
        assert_eq!(inked(&surface), 0);
        assert!(surface.strokes().is_empty());
    }

    #[test]
    fn test_close_mid_stroke_keeps_pixels() {
        let mut surface = AnnotationSurface::new(60, 60, Point::new(0.0, 0.0), 1.0);
        surface.begin_stroke(Point::new(5.0, 5.0));
        surface.extend_stroke(Point::new(30.0, 5.0));
        let drawn = inked(&surface);

        surface.close();
        assert_eq!(surface.state(), CaptureState::Idle);
        assert!(!surface.is_open());
        assert_eq!(inked(&surface), drawn);
        assert!(!surface.begin_stroke(Point::new(1.0, 1.0)));
    }

    #[test]
    fn test_commit_encodes_png_and_closes() {
        let mut surface = AnnotationSurface::new(40, 30, Point::new(0.0, 0.0), 2.0);
        surface.begin_stroke(Point::new(5.0, 5.0));
        surface.extend_stroke(Point::new(20.0, 20.0));
        assert!(matches!(surface.commit(), Err(CaptureError::Stroking)));

        surface.end_stroke();
        let image = surface.commit().unwrap();
        assert_eq!(image.mime_type, "image/png");
        let decoded = image.decode().unwrap();
        assert_eq!((decoded.width(), decoded.height()), (80, 60));
        assert!(!surface.is_open());
    }

    #[test]
    fn test_far_segment_is_clipped_to_bitmap() {
        let mut surface = AnnotationSurface::new(40, 20, Point::new(0.0, 0.0), 1.0);
        surface.set_pen_width(2.0);
        surface.begin_stroke(Point::new(1.0, 1.0));
        let started = std::time::Instant::now();
        assert!(surface.extend_stroke(Point::new(2.0e7, 1.0)));
        assert!(started.elapsed() < std::time::Duration::from_millis(100));
        surface.end_stroke();

        // the band along the top edge is inked, nothing below it
        let bitmap = surface.bitmap();
        assert!(bitmap.get_pixel(39, 1)[3] > 0);
        assert_eq!(bitmap.get_pixel(20, 10)[3], 0);

        let drawn = inked(&surface);
        surface.begin_stroke(Point::new(-5.0e6, -5.0e6));
        assert!(surface.extend_stroke(Point::new(-4.0e6, 9.0e6)));
        surface.end_stroke();
        assert_eq!(inked(&surface), drawn);
    }

    #[test]
    fn test_clip_segment() {
        let bounds = (0.0, 0.0, 10.0, 10.0);
        assert_eq!(clip_segment((-10.0, 5.0), (30.0, 5.0), bounds), Some(((0.0, 5.0), (10.0, 5.0))));
        assert_eq!(clip_segment((2.0, 2.0), (3.0, 4.0), bounds), Some(((2.0, 2.0), (3.0, 4.0))));
        assert_eq!(clip_segment((-5.0, -5.0), (-1.0, 20.0), bounds), None);
        assert_eq!(clip_segment((5.0, 20.0), (5.0, 30.0), bounds), None);
        assert_eq!(clip_segment((f32::NAN, 0.0), (1.0, 1.0), bounds), None);
    }
}
