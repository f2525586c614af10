//! Export pipeline: note -> working surface -> compressed images ->
//! bitmap -> page bands -> PDF.
//!
//! Every call builds and owns its own [`Surface`], so the note itself is
//! never mutated and two exports can run side by side.

mod compress;
mod paginate;
mod pdf;
mod raster;
mod surface;

pub use compress::{compress_image, compress_images, downscaled_size};
pub use paginate::{encode_pages, plan_bands, Page, PageBand, PageSize};
pub use pdf::assemble_pdf;
pub use raster::{rasterize, MAX_RASTER_PIXELS};
pub use surface::{Section, Surface};

use serde::{Deserialize, Serialize};

use crate::error::ExportError;
use crate::model::Note;

/// Tunables for one export run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExportOptions {
    /// Embedded images wider than this are downscaled before rendering
    pub max_image_width: u32,
    pub jpeg_quality: u8,
    /// Cap on device pixels per CSS pixel
    pub max_scale: f32,
    /// Native device pixel ratio, if known
    pub device_scale: Option<f32>,
    pub page_width_pt: f32,
    pub page_height_pt: f32,
    pub container_width_px: u32,
    pub padding_px: u32,
    /// File name stem used when the title has nothing usable in it
    pub default_file_stem: String,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            max_image_width: 1400,
            jpeg_quality: 85,
            max_scale: 2.0,
            device_scale: None,
            page_width_pt: PageSize::A4.width_pt,
            page_height_pt: PageSize::A4.height_pt,
            container_width_px: 800,
            padding_px: 24,
            default_file_stem: "note".to_string(),
        }
    }
}

impl ExportOptions {
    /// `min(max_scale, device_scale)`, treating an unknown or invalid device
    /// scale as `max_scale`
    pub fn render_scale(&self) -> f32 {
        let native = self
            .device_scale
            .filter(|s| s.is_finite() && *s > 0.0)
            .unwrap_or(self.max_scale);
        native.min(self.max_scale)
    }

    pub fn page_size(&self) -> PageSize {
        PageSize {
            width_pt: self.page_width_pt,
            height_pt: self.page_height_pt,
        }
    }
}

/// Finished export
#[derive(Debug, Clone)]
pub struct ExportArtifact {
    pub file_name: String,
    pub pdf: Vec<u8>,
    pub pages: Vec<Page>,
    /// Width and height of the rendered bitmap before slicing
    pub raster_size: (u32, u32),
    /// Images that kept their original encoding
    pub skipped_images: usize,
}

/// Replace every character outside `[A-Za-z0-9._-]` with `_`. A blank
/// title yields `default`.
pub fn sanitize_file_stem(title: &str, default: &str) -> String {
    if title.trim().is_empty() {
        return default.to_string();
    }
    title
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

pub fn file_name(title: &str, options: &ExportOptions) -> String {
    format!("{}.pdf", sanitize_file_stem(title, &options.default_file_stem))
}

/// Render a note to a paginated PDF
pub fn export_note(note: &Note, options: &ExportOptions) -> Result<ExportArtifact, ExportError> {
    let span = tracing::info_span!("export", title = %note.display_title());
    let _enter = span.enter();

    let mut surface = Surface::assemble(note);
    let skipped_images = compress_images(&mut surface, options.max_image_width, options.jpeg_quality);

    let bitmap = rasterize(&surface, options)?;
    drop(surface);

    let page_size = options.page_size();
    let bands = plan_bands(bitmap.width(), bitmap.height(), page_size);
    let pages = encode_pages(&bitmap, &bands, page_size, options.jpeg_quality)?;
    let pdf = assemble_pdf(&pages, page_size, note.display_title())?;

    let file_name = file_name(&note.title, options);
    tracing::info!(
        file = %file_name,
        pages = pages.len(),
        skipped_images,
        bytes = pdf.len(),
        "export finished"
    );

    Ok(ExportArtifact {
        file_name,
        pdf,
        pages,
        raster_size: bitmap.dimensions(),
        skipped_images,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::markup;
    use crate::model::{ContentTree, EmbeddedImage, Node};
    use crate::test_support::png_bytes;

    #[test]
    fn test_sanitize_file_stem() {
        assert_eq!(sanitize_file_stem("My/Notes: 2024", "note"), "My_Notes__2024");
        assert_eq!(sanitize_file_stem("ch.3 - intro", "note"), "ch.3_-_intro");
        assert_eq!(sanitize_file_stem("Épreuve", "note"), "_preuve");
        assert_eq!(sanitize_file_stem("   ", "note"), "note");
        assert_eq!(sanitize_file_stem("", "note"), "note");
        assert_eq!(file_name("", &ExportOptions::default()), "note.pdf");
    }

    #[test]
    fn test_render_scale() {
        let mut options = ExportOptions::default();
        assert_eq!(options.render_scale(), 2.0);
        options.device_scale = Some(1.0);
        assert_eq!(options.render_scale(), 1.0);
        options.device_scale = Some(3.0);
        assert_eq!(options.render_scale(), 2.0);
        options.device_scale = Some(0.0);
        assert_eq!(options.render_scale(), 2.0);
        options.device_scale = Some(f32::NAN);
        assert_eq!(options.render_scale(), 2.0);
    }

    #[test]
    fn test_options_deserialize_with_defaults() {
        let options: ExportOptions = serde_json::from_str(r#"{"jpegQuality": 70}"#).unwrap();
        assert_eq!(options.jpeg_quality, 70);
        assert_eq!(options.max_image_width, 1400);
    }

    #[test]
    fn test_export_short_note() {
        let mut note = Note::new("Algebra", "slope");
        note.body = markup::parse("<b>y=mx+b</b>");
        note.summary = markup::parse("linear eqns");

        let artifact = export_note(&note, &ExportOptions::default()).unwrap();
        assert_eq!(artifact.file_name, "Algebra.pdf");
        assert_eq!(artifact.pages.len(), 1);
        assert_eq!(artifact.raster_size.0, 1600);

        let doc = lopdf::Document::load_mem(&artifact.pdf).unwrap();
        assert_eq!(doc.get_pages().len(), 1);
    }

    #[test]
    fn test_export_long_note_paginates() {
        let mut note = Note::new("Long", "");
        note.body = markup::parse(&"line<br>".repeat(200));

        let artifact = export_note(&note, &ExportOptions::default()).unwrap();
        assert!(artifact.pages.len() > 1);
        let rows: u32 = artifact.pages.iter().map(|p| p.pixel_height).sum();
        assert_eq!(rows, artifact.raster_size.1);

        let doc = lopdf::Document::load_mem(&artifact.pdf).unwrap();
        assert_eq!(doc.get_pages().len(), artifact.pages.len());
    }

    #[test]
    fn test_bad_image_does_not_abort_export() {
        let mut note = Note::new("Images", "");
        note.body = ContentTree::from_nodes(vec![
            Node::Image(EmbeddedImage::new("image/png", b"not a png".to_vec())),
            Node::Image(EmbeddedImage::new("image/png", png_bytes(1800, 90))),
        ]);
        let before = note.clone();

        let artifact = export_note(&note, &ExportOptions::default()).unwrap();
        assert_eq!(artifact.skipped_images, 1);
        assert_eq!(artifact.pages.len(), 1);
        assert_eq!(note, before);
    }

    #[test]
    fn test_oversized_surface_is_refused() {
        let mut note = Note::new("Huge", "");
        note.body = markup::parse("<span style=\"font-size: 1000000px\">x</span>");
        let before = note.clone();

        match export_note(&note, &ExportOptions::default()) {
            Err(ExportError::SurfaceTooLarge { width, height }) => {
                assert_eq!(width, 1600);
                assert!(height > 1_000_000);
            }
            other => panic!("expected SurfaceTooLarge, got {:?}", other.map(|a| a.raster_size)),
        }
        assert_eq!(note, before);
    }
}
