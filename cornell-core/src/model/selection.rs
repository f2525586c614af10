use serde::{Deserialize, Serialize};

/// A range of content positions. Every character, image and line break
/// occupies exactly one position.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Selection {
    pub start: usize,
    pub end: usize,
}

impl Selection {
    pub fn new(start: usize, end: usize) -> Self {
        Self {
            start: start.min(end),
            end: start.max(end),
        }
    }

    pub fn is_collapsed(&self) -> bool {
        self.start == self.end
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    /// Check if this selection contains the given position
    pub fn contains(&self, position: usize) -> bool {
        position >= self.start && position < self.end
    }

    /// Clamp both ends to a region of `len` positions
    pub fn clamp(&self, len: usize) -> Self {
        Self::new(self.start.min(len), self.end.min(len))
    }
}

/// An insertion point between two content positions.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Cursor {
    pub position: usize,
}

impl Cursor {
    pub fn at(position: usize) -> Self {
        Self { position }
    }
}
