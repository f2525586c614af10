pub mod content;
pub mod note;
pub mod selection;
pub mod style;

pub use content::{ContentTree, EmbeddedImage, Node, Run};
pub use note::Note;
pub use selection::{Cursor, Selection};
pub use style::{parse_css_color, StyleDescriptor};
