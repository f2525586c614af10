use crate::model::{ContentTree, EmbeddedImage, Node, Note, StyleDescriptor};

/// One vertically stacked block of the export layout
#[derive(Debug, Clone, PartialEq)]
pub struct Section {
    pub tree: ContentTree,
    pub margin_bottom_px: u32,
}

/// Detached working copy of a note, laid out for export.
///
/// Built fresh for every export call and owned by it, so concurrent exports
/// of the same note never share a surface. Dropping it is the cleanup.
#[derive(Debug, Clone, PartialEq)]
pub struct Surface {
    sections: Vec<Section>,
}

impl Surface {
    /// Title, cues, body and summary, in that order. Cues and summary are
    /// only included when they have content.
    pub fn assemble(note: &Note) -> Self {
        let mut sections = vec![Section {
            tree: ContentTree::from_nodes(vec![Node::span(
                StyleDescriptor {
                    weight: Some("700".into()),
                    font_size_px: Some(22),
                    ..StyleDescriptor::default()
                },
                vec![Node::text(note.display_title())],
            )]),
            margin_bottom_px: 12,
        }];

        if !note.cues.is_empty() {
            sections.push(Section {
                tree: labeled("Cues:", vec![Node::text(note.cues.clone())]),
                margin_bottom_px: 10,
            });
        }

        sections.push(Section {
            tree: note.body.clone(),
            margin_bottom_px: 12,
        });

        if !note.summary.is_empty() {
            sections.push(Section {
                tree: labeled("Summary:", note.summary.nodes().to_vec()),
                margin_bottom_px: 0,
            });
        }

        Self { sections }
    }

    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    pub fn for_each_image_mut(&mut self, mut visit: impl FnMut(&mut EmbeddedImage)) {
        for section in &mut self.sections {
            section.tree.for_each_image_mut(&mut visit);
        }
    }
}

fn labeled(label: &str, mut rest: Vec<Node>) -> ContentTree {
    let mut nodes = vec![
        Node::span(StyleDescriptor::bold(), vec![Node::text(label)]),
        Node::text(" "),
    ];
    nodes.append(&mut rest);
    ContentTree::from_nodes(nodes)
}
