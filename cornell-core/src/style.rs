//! Style engine: one operation per attribute family, each a selection wrap
//! carrying exactly one property. Values pass through untouched.

use crate::cursor::Region;
use crate::model::StyleDescriptor;

impl Region {
    /// Bold the selection (`font-weight: 700`)
    pub fn apply_weight(&mut self) -> bool {
        self.wrap_selection(&StyleDescriptor::bold())
    }

    pub fn apply_font_size(&mut self, px: u32) -> bool {
        self.wrap_selection(&StyleDescriptor::font_size(px))
    }

    pub fn apply_text_color(&mut self, color: &str) -> bool {
        self.wrap_selection(&StyleDescriptor::text_color(color))
    }

    pub fn apply_highlight(&mut self, color: &str) -> bool {
        self.wrap_selection(&StyleDescriptor::highlight(color))
    }
}
