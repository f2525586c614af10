use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;

use super::StyleDescriptor;
use crate::error::DecodeError;

/// A fully self-contained encoded image (PNG, JPEG, ...).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbeddedImage {
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl EmbeddedImage {
    pub fn new(mime_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            mime_type: mime_type.into(),
            bytes,
        }
    }

    /// Validate `bytes` as a decodable image and detect its MIME type.
    pub fn from_encoded(bytes: Vec<u8>) -> Result<Self, DecodeError> {
        let format = image::guess_format(&bytes)?;
        image::load_from_memory_with_format(&bytes, format)?;
        Ok(Self::new(format.to_mime_type(), bytes))
    }

    /// Decode into pixels
    pub fn decode(&self) -> Result<image::DynamicImage, DecodeError> {
        Ok(image::load_from_memory(&self.bytes)?)
    }

    pub fn to_data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, STANDARD.encode(&self.bytes))
    }

    /// Parse a base64 `data:` URL. Anything else (remote URLs, non-base64
    /// payloads) is not self-contained and yields `None`.
    pub fn from_data_url(url: &str) -> Option<Self> {
        let rest = url.trim().strip_prefix("data:")?;
        let (header, payload) = rest.split_once(',')?;
        let mime_type = header.strip_suffix(";base64")?;
        let bytes = STANDARD.decode(payload.trim()).ok()?;
        Some(Self::new(mime_type, bytes))
    }
}

/// One node of a rich-text region.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Text(String),
    Image(EmbeddedImage),
    LineBreak,
    /// A styled wrap around child nodes
    Span {
        style: StyleDescriptor,
        children: Vec<Node>,
    },
}

impl Node {
    pub fn text(text: impl Into<String>) -> Self {
        Node::Text(text.into())
    }

    pub fn span(style: StyleDescriptor, children: Vec<Node>) -> Self {
        Node::Span { style, children }
    }

    /// Number of content positions this node occupies
    pub fn len(&self) -> usize {
        match self {
            Node::Text(text) => text.chars().count(),
            Node::Image(_) | Node::LineBreak => 1,
            Node::Span { children, .. } => children.iter().map(Node::len).sum(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A flattened, reading-order view of one content element with the
/// composed style of every enclosing span.
#[derive(Debug, Clone, PartialEq)]
pub enum Run<'a> {
    Text {
        text: &'a str,
        style: StyleDescriptor,
    },
    Image(&'a EmbeddedImage),
    LineBreak,
}

/// Ordered node sequence for one rich region (body or summary).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContentTree {
    nodes: Vec<Node>,
}

impl ContentTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_nodes(nodes: Vec<Node>) -> Self {
        Self { nodes }
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn into_nodes(self) -> Vec<Node> {
        self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.iter().map(Node::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Flatten into runs, composing nested span styles
    pub fn runs(&self) -> Vec<Run<'_>> {
        let mut runs = Vec::new();
        collect_runs(&self.nodes, &StyleDescriptor::default(), &mut runs);
        runs
    }

    /// Concatenated text, with line breaks as `\n` and images omitted
    pub fn plain_text(&self) -> String {
        self.runs()
            .into_iter()
            .map(|run| match run {
                Run::Text { text, .. } => text,
                Run::LineBreak => "\n",
                Run::Image(_) => "",
            })
            .collect()
    }

    pub fn image_count(&self) -> usize {
        self.runs()
            .iter()
            .filter(|run| matches!(run, Run::Image(_)))
            .count()
    }

    /// Visit every embedded image in reading order
    pub fn for_each_image_mut(&mut self, mut visit: impl FnMut(&mut EmbeddedImage)) {
        visit_images(&mut self.nodes, &mut visit);
    }
}

fn collect_runs<'a>(nodes: &'a [Node], style: &StyleDescriptor, out: &mut Vec<Run<'a>>) {
    for node in nodes {
        match node {
            Node::Text(text) => out.push(Run::Text {
                text,
                style: style.clone(),
            }),
            Node::Image(image) => out.push(Run::Image(image)),
            Node::LineBreak => out.push(Run::LineBreak),
            Node::Span {
                style: inner,
                children,
            } => collect_runs(children, &style.compose(inner), out),
        }
    }
}

fn visit_images(nodes: &mut [Node], visit: &mut impl FnMut(&mut EmbeddedImage)) {
    for node in nodes {
        match node {
            Node::Image(image) => visit(image),
            Node::Span { children, .. } => visit_images(children, visit),
            Node::Text(_) | Node::LineBreak => {}
        }
    }
}
