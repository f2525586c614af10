//! Image ingestion. Images are embedded at full resolution; downscaling is
//! left to export so editing never loses fidelity.

use crate::cursor::{insert_at_cursor, Region};
use crate::error::DecodeError;
use crate::model::{ContentTree, Cursor, EmbeddedImage, Node};

/// Decode-check `bytes` and insert them at the cursor. On failure the tree
/// is left untouched and the error is returned for reporting.
pub fn insert_from_file(
    tree: &ContentTree,
    cursor: Cursor,
    bytes: &[u8],
) -> Result<(ContentTree, Cursor), DecodeError> {
    let image = EmbeddedImage::from_encoded(bytes.to_vec())?;
    tracing::debug!(mime = %image.mime_type, bytes = bytes.len(), "image ingested");
    Ok(insert_at_cursor(tree, cursor, Node::Image(image)))
}

/// Insert a committed annotation. Always succeeds.
pub fn insert_from_annotation(tree: &ContentTree, cursor: Cursor, image: EmbeddedImage) -> (ContentTree, Cursor) {
    insert_at_cursor(tree, cursor, Node::Image(image))
}

impl Region {
    pub fn insert_image_file(&mut self, bytes: &[u8]) -> Result<(), DecodeError> {
        let (tree, cursor) = insert_from_file(self.tree(), self.cursor_state().cursor(), bytes)?;
        self.replace_tree(tree, cursor);
        Ok(())
    }

    pub fn insert_annotation(&mut self, image: EmbeddedImage) {
        let (tree, cursor) = insert_from_annotation(self.tree(), self.cursor_state().cursor(), image);
        self.replace_tree(tree, cursor);
    }
}
