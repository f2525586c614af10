//! Cornell Core - note model, rich-text editing and PDF export
//!
//! This crate holds everything about a Cornell note that does not depend on
//! how it is presented: the content tree and its selection/cursor engine,
//! styling, freehand annotation capture, image ingestion, persistence and
//! the export pipeline. The CLI and the REST server are thin shells around
//! it.

pub mod annotation;
pub mod app;
pub mod cursor;
pub mod draft;
pub mod error;
pub mod export;
pub mod ingest;
pub mod markup;
pub mod model;
pub mod store;
pub mod style;

pub use annotation::{AnnotationSurface, CaptureState, Pen, Point, Stroke};
pub use app::{App, Focus, Mode, StatusNotice};
pub use cursor::{insert_at_cursor, wrap_selection, CursorState, Region};
pub use draft::{DraftCache, DraftKey};
pub use error::{CaptureError, CompressionSkipped, DecodeError, ExportError, StoreError};
pub use export::{export_note, ExportArtifact, ExportOptions, PageSize};
pub use model::{ContentTree, Cursor, EmbeddedImage, Node, Note, Selection, StyleDescriptor};
pub use store::{sorted_for_display, JsonFileStore, MemoryStore, NoteFields, NoteRecord, NoteStore};

#[cfg(test)]
pub(crate) mod test_support {
    use std::io::Cursor;

    use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};

    /// Opaque PNG of the given size, colored so it survives JPEG round trips
    pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let pixels = RgbaImage::from_pixel(width, height, Rgba([40, 90, 200, 255]));
        let mut bytes = Vec::new();
        DynamicImage::ImageRgba8(pixels)
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .unwrap();
        bytes
    }
}
