//! Canonical serialized form of a content tree.
//!
//! Rich regions are persisted as a small HTML subset: text, `<br>`,
//! `<img src="data:...">` and `<span style="...">`. Parsing goes through an
//! HTML5 fragment parser, so it is tolerant of whatever an editable surface
//! may have produced (`<b>`, `<div>` blocks, links, unclosed tags, comments,
//! named entities) and never fails.

use scraper::{ElementRef, Html};

use crate::model::{ContentTree, EmbeddedImage, Node, StyleDescriptor};

/// Serialize a tree into canonical markup
pub fn serialize(tree: &ContentTree) -> String {
    let mut out = String::new();
    write_nodes(tree.nodes(), &mut out);
    out
}

fn write_nodes(nodes: &[Node], out: &mut String) {
    for node in nodes {
        match node {
            Node::Text(text) => out.push_str(&escape_text(text)),
            Node::LineBreak => out.push_str("<br>"),
            Node::Image(image) => {
                out.push_str("<img src=\"");
                out.push_str(&image.to_data_url());
                out.push_str("\">");
            }
            Node::Span { style, children } => {
                if style.is_empty() {
                    out.push_str("<span>");
                } else {
                    out.push_str("<span style=\"");
                    out.push_str(&escape_attribute(&style_to_css(style)));
                    out.push_str("\">");
                }
                write_nodes(children, out);
                out.push_str("</span>");
            }
        }
    }
}

/// Render a style as inline CSS declarations
pub fn style_to_css(style: &StyleDescriptor) -> String {
    let mut declarations = Vec::new();
    if let Some(weight) = &style.weight {
        declarations.push(format!("font-weight: {};", weight));
    }
    if let Some(px) = style.font_size_px {
        declarations.push(format!("font-size: {}px;", px));
    }
    if let Some(color) = &style.text_color {
        declarations.push(format!("color: {};", color));
    }
    if let Some(color) = &style.highlight_color {
        declarations.push(format!("background-color: {};", color));
    }
    declarations.join(" ")
}

/// Read the inline CSS properties the editor understands. Unknown
/// properties and unparsable sizes are dropped.
pub fn parse_css(css: &str) -> StyleDescriptor {
    let mut style = StyleDescriptor::default();
    for declaration in css.split(';') {
        let Some((property, value)) = declaration.split_once(':') else {
            continue;
        };
        let value = value.trim();
        if value.is_empty() {
            continue;
        }
        match property.trim().to_ascii_lowercase().as_str() {
            "font-weight" => style.weight = Some(value.to_string()),
            "font-size" => {
                if let Some(px) = parse_px(value) {
                    style.font_size_px = Some(px);
                }
            }
            "color" => style.text_color = Some(value.to_string()),
            "background-color" | "background" => style.highlight_color = Some(value.to_string()),
            _ => {}
        }
    }
    style
}

fn parse_px(value: &str) -> Option<u32> {
    value
        .trim()
        .trim_end_matches("px")
        .trim()
        .parse::<f32>()
        .ok()
        .filter(|n| n.is_finite() && *n >= 0.0)
        .map(|n| n.round() as u32)
}

/// Parse markup into a content tree
pub fn parse(markup: &str) -> ContentTree {
    let fragment = Html::parse_fragment(markup);
    let mut nodes = Vec::new();
    walk_children(fragment.root_element(), &mut nodes);
    ContentTree::from_nodes(nodes)
}

fn walk_children(parent: ElementRef<'_>, out: &mut Vec<Node>) {
    for child in parent.children() {
        if let Some(text) = child.value().as_text() {
            push_text(out, text);
        } else if let Some(element) = ElementRef::wrap(child) {
            walk_element(element, out);
        }
    }
}

fn walk_element(element: ElementRef<'_>, out: &mut Vec<Node>) {
    let attrs = element.value();
    let name = attrs.name();
    match name {
        "br" => out.push(Node::LineBreak),
        "img" => match EmbeddedImage::from_data_url(attrs.attr("src").unwrap_or_default()) {
            Some(image) => out.push(Node::Image(image)),
            None => tracing::debug!("skipping image without an embedded data url"),
        },
        "script" | "style" | "template" | "head" | "title" => {}
        _ => {
            // block boundaries from an editable surface become line breaks
            if matches!(name, "div" | "p") && out.last().is_some_and(|last| *last != Node::LineBreak) {
                out.push(Node::LineBreak);
            }

            let mut style = parse_css(attrs.attr("style").unwrap_or_default());
            match name {
                "b" | "strong" => style = StyleDescriptor::bold().compose(&style),
                "font" => {
                    if let Some(color) = attrs.attr("color") {
                        style = StyleDescriptor::text_color(color).compose(&style);
                    }
                }
                _ => {}
            }

            let mut children = Vec::new();
            walk_children(element, &mut children);
            if style.is_empty() {
                for child in children {
                    match child {
                        Node::Text(text) => push_text(out, &text),
                        other => out.push(other),
                    }
                }
            } else {
                out.push(Node::span(style, children));
            }
        }
    }
}

fn push_text(out: &mut Vec<Node>, text: &str) {
    if text.is_empty() {
        return;
    }
    match out.last_mut() {
        Some(Node::Text(last)) => last.push_str(text),
        _ => out.push(Node::text(text)),
    }
}

fn escape_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '\u{a0}' => out.push_str("&nbsp;"),
            _ => out.push(c),
        }
    }
    out
}

fn escape_attribute(value: &str) -> String {
    value.replace('&', "&amp;").replace('"', "&quot;")
}
