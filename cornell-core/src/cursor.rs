//! Selection and cursor engine.
//!
//! Positions count characters, images and line breaks one unit each. All
//! structural edits go through [`wrap_selection`] and [`insert_at_cursor`],
//! which take explicit `Selection`/`Cursor` values and return new trees.

use crate::markup;
use crate::model::{ContentTree, Cursor, Node, Selection, StyleDescriptor};

/// Wrap the nodes spanned by `selection` in a new span carrying `style`.
///
/// A collapsed selection returns the tree unchanged. Partially covered text
/// runs and spans are split so nesting stays well-formed; the new span is
/// placed inside the deepest existing span that contains the whole
/// selection.
pub fn wrap_selection(tree: &ContentTree, selection: Selection, style: &StyleDescriptor) -> ContentTree {
    let selection = selection.clamp(tree.len());
    if selection.is_collapsed() {
        return tree.clone();
    }

    let mut nodes = tree.nodes().to_vec();
    wrap_in(&mut nodes, selection.start, selection.end, style);
    ContentTree::from_nodes(nodes)
}

/// Insert `node` immediately before `cursor` and return the cursor moved to
/// just after it.
pub fn insert_at_cursor(tree: &ContentTree, cursor: Cursor, node: Node) -> (ContentTree, Cursor) {
    let position = cursor.position.min(tree.len());
    let advance = node.len();

    let mut nodes = tree.nodes().to_vec();
    insert_in(&mut nodes, position, node);
    (ContentTree::from_nodes(nodes), Cursor::at(position + advance))
}

fn wrap_in(nodes: &mut Vec<Node>, start: usize, end: usize, style: &StyleDescriptor) {
    let mut pos = 0;
    for node in nodes.iter_mut() {
        let len = node.len();
        if let Node::Span { children, .. } = node {
            if len > 0 && start >= pos && end <= pos + len {
                wrap_in(children, start - pos, end - pos, style);
                return;
            }
        }
        pos += len;
        if pos >= end {
            break;
        }
    }

    let first = split_at(nodes, start);
    let last = split_at(nodes, end);
    let extracted: Vec<Node> = nodes.drain(first..last).collect();
    nodes.insert(first, Node::span(style.clone(), extracted));
}

fn insert_in(nodes: &mut Vec<Node>, offset: usize, node: Node) {
    let mut pos = 0;
    for child in nodes.iter_mut() {
        let len = child.len();
        if offset > pos && offset < pos + len {
            if let Node::Span { children, .. } = child {
                insert_in(children, offset - pos, node);
                return;
            }
            break;
        }
        pos += len;
        if pos > offset {
            break;
        }
    }

    let index = split_at(nodes, offset);
    nodes.insert(index, node);
}

/// Split children so that `offset` falls on a child boundary and return the
/// index of that boundary. A split span becomes two spans with the same
/// style.
fn split_at(nodes: &mut Vec<Node>, offset: usize) -> usize {
    let mut pos = 0;
    for i in 0..nodes.len() {
        if offset == pos {
            return i;
        }
        let len = nodes[i].len();
        if offset < pos + len {
            let local = offset - pos;
            let tail = match &mut nodes[i] {
                Node::Text(text) => {
                    let byte = text
                        .char_indices()
                        .nth(local)
                        .map(|(b, _)| b)
                        .unwrap_or(text.len());
                    Node::Text(text.split_off(byte))
                }
                Node::Span { style, children } => {
                    let index = split_at(children, local);
                    Node::span(style.clone(), children.split_off(index))
                }
                // single-position nodes never contain an interior offset
                Node::Image(_) | Node::LineBreak => return i,
            };
            nodes.insert(i + 1, tail);
            return i + 1;
        }
        pos += len;
    }
    nodes.len()
}

/// Cursor position plus optional selection anchor for one region
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CursorState {
    position: usize,
    anchor: Option<usize>,
}

impl CursorState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cursor(&self) -> Cursor {
        Cursor::at(self.position)
    }

    /// The active selection, or `None` when there is none or it is collapsed
    pub fn selection(&self) -> Option<Selection> {
        let anchor = self.anchor?;
        let selection = Selection::new(anchor, self.position);
        (!selection.is_collapsed()).then_some(selection)
    }

    pub fn select(&mut self, selection: Selection, len: usize) {
        let selection = selection.clamp(len);
        self.anchor = Some(selection.start);
        self.position = selection.end;
    }

    /// Drop the selection, keeping the cursor where it is
    pub fn collapse(&mut self) {
        self.anchor = None;
    }

    pub fn set_position(&mut self, position: usize, len: usize) {
        self.position = position.min(len);
        self.anchor = None;
    }

    pub fn move_left(&mut self) {
        self.anchor = None;
        self.position = self.position.saturating_sub(1);
    }

    pub fn move_right(&mut self, len: usize) {
        self.anchor = None;
        self.position = (self.position + 1).min(len);
    }

    pub fn move_to_start(&mut self) {
        self.set_position(0, 0);
    }

    pub fn move_to_end(&mut self, len: usize) {
        self.set_position(len, len);
    }

    /// Grow or shrink the selection by one position, anchoring at the
    /// current cursor if nothing is selected yet
    pub fn extend_left(&mut self) {
        self.anchor.get_or_insert(self.position);
        self.position = self.position.saturating_sub(1);
    }

    pub fn extend_right(&mut self, len: usize) {
        self.anchor.get_or_insert(self.position);
        self.position = (self.position + 1).min(len);
    }
}

/// One editable rich region: a content tree with its cursor state
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Region {
    tree: ContentTree,
    cursor: CursorState,
}

impl Region {
    pub fn new(tree: ContentTree) -> Self {
        Self {
            tree,
            cursor: CursorState::new(),
        }
    }

    pub fn from_markup(markup: &str) -> Self {
        Self::new(markup::parse(markup))
    }

    pub fn to_markup(&self) -> String {
        markup::serialize(&self.tree)
    }

    pub fn tree(&self) -> &ContentTree {
        &self.tree
    }

    pub fn cursor_state(&self) -> &CursorState {
        &self.cursor
    }

    pub fn len(&self) -> usize {
        self.tree.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }

    pub fn select(&mut self, start: usize, end: usize) {
        let len = self.tree.len();
        self.cursor.select(Selection::new(start, end), len);
    }

    pub fn set_cursor(&mut self, position: usize) {
        let len = self.tree.len();
        self.cursor.set_position(position, len);
    }

    pub fn move_left(&mut self) {
        self.cursor.move_left();
    }

    pub fn move_right(&mut self) {
        let len = self.tree.len();
        self.cursor.move_right(len);
    }

    pub fn move_to_end(&mut self) {
        let len = self.tree.len();
        self.cursor.move_to_end(len);
    }

    /// Wrap the active selection. Returns false (and changes nothing) when
    /// the selection is empty.
    pub fn wrap_selection(&mut self, style: &StyleDescriptor) -> bool {
        let Some(selection) = self.cursor.selection() else {
            return false;
        };
        self.tree = wrap_selection(&self.tree, selection, style);
        self.cursor.collapse();
        true
    }

    /// Insert a node at the cursor; any active selection is dropped
    pub fn insert_node(&mut self, node: Node) {
        let (tree, cursor) = insert_at_cursor(&self.tree, self.cursor.cursor(), node);
        self.tree = tree;
        let len = self.tree.len();
        self.cursor.set_position(cursor.position, len);
    }

    pub fn insert_text(&mut self, text: &str) {
        if !text.is_empty() {
            self.insert_node(Node::text(text));
        }
    }

    pub fn insert_line_break(&mut self) {
        self.insert_node(Node::LineBreak);
    }

    pub(crate) fn replace_tree(&mut self, tree: ContentTree, cursor: Cursor) {
        self.tree = tree;
        let len = self.tree.len();
        self.cursor.set_position(cursor.position, len);
    }
}
