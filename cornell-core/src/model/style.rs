use image::Rgba;
use serde::{Deserialize, Serialize};

/// Sparse set of inline text attributes carried by a styled span.
///
/// Values are stored verbatim. Nothing here validates a color or a size;
/// the renderer decides what it can use.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct StyleDescriptor {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weight: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub font_size_px: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text_color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub highlight_color: Option<String>,
}

impl StyleDescriptor {
    pub fn weight(weight: impl Into<String>) -> Self {
        Self {
            weight: Some(weight.into()),
            ..Self::default()
        }
    }

    pub fn bold() -> Self {
        Self::weight("700")
    }

    pub fn font_size(px: u32) -> Self {
        Self {
            font_size_px: Some(px),
            ..Self::default()
        }
    }

    pub fn text_color(color: impl Into<String>) -> Self {
        Self {
            text_color: Some(color.into()),
            ..Self::default()
        }
    }

    pub fn highlight(color: impl Into<String>) -> Self {
        Self {
            highlight_color: Some(color.into()),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.weight.is_none()
            && self.font_size_px.is_none()
            && self.text_color.is_none()
            && self.highlight_color.is_none()
    }

    /// Layer `inner` over `self`. Properties set by the inner span win,
    /// the same way an inner element's inline style overrides its parent.
    pub fn compose(&self, inner: &StyleDescriptor) -> StyleDescriptor {
        StyleDescriptor {
            weight: inner.weight.clone().or_else(|| self.weight.clone()),
            font_size_px: inner.font_size_px.or(self.font_size_px),
            text_color: inner.text_color.clone().or_else(|| self.text_color.clone()),
            highlight_color: inner
                .highlight_color
                .clone()
                .or_else(|| self.highlight_color.clone()),
        }
    }

    /// True when the weight asks for a bold face (`bold`, `bolder` or >= 600).
    pub fn is_bold(&self) -> Option<bool> {
        self.weight.as_deref().map(|w| {
            let w = w.trim();
            w.eq_ignore_ascii_case("bold")
                || w.eq_ignore_ascii_case("bolder")
                || w.parse::<u32>().map(|n| n >= 600).unwrap_or(false)
        })
    }
}

/// Parse the CSS color forms the editor produces: `#rgb`, `#rrggbb`,
/// `rgb(r, g, b)` and a handful of keywords.
pub fn parse_css_color(value: &str) -> Option<Rgba<u8>> {
    let value = value.trim();
    if let Some(hex) = value.strip_prefix('#') {
        let digits: Vec<u8> = hex
            .chars()
            .map(|c| c.to_digit(16).map(|d| d as u8))
            .collect::<Option<_>>()?;
        return match digits.as_slice() {
            [r, g, b] => Some(Rgba([r * 17, g * 17, b * 17, 255])),
            [r1, r2, g1, g2, b1, b2] => Some(Rgba([r1 * 16 + r2, g1 * 16 + g2, b1 * 16 + b2, 255])),
            _ => None,
        };
    }

    let lower = value.to_ascii_lowercase();
    if let Some(args) = lower
        .strip_prefix("rgb(")
        .or_else(|| lower.strip_prefix("rgba("))
        .and_then(|rest| rest.strip_suffix(')'))
    {
        let channels: Vec<u8> = args
            .split(',')
            .take(3)
            .map(|c| c.trim().parse::<f32>().ok().map(|v| v.clamp(0.0, 255.0).round() as u8))
            .collect::<Option<_>>()?;
        return match channels.as_slice() {
            [r, g, b] => Some(Rgba([*r, *g, *b, 255])),
            _ => None,
        };
    }

    let rgb = match lower.as_str() {
        "black" => [0, 0, 0],
        "white" => [255, 255, 255],
        "red" => [255, 0, 0],
        "green" => [0, 128, 0],
        "blue" => [0, 0, 255],
        "yellow" => [255, 255, 0],
        "orange" => [255, 165, 0],
        "purple" => [128, 0, 128],
        "gray" | "grey" => [128, 128, 128],
        _ => return None,
    };
    Some(Rgba([rgb[0], rgb[1], rgb[2], 255]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compose_inner_wins() {
        let outer = StyleDescriptor {
            text_color: Some("#ff0000".into()),
            font_size_px: Some(20),
            ..Default::default()
        };
        let inner = StyleDescriptor::text_color("#0000ff");

        let composed = outer.compose(&inner);
        assert_eq!(composed.text_color.as_deref(), Some("#0000ff"));
        assert_eq!(composed.font_size_px, Some(20));
        assert!(composed.weight.is_none());
    }

    #[test]
    fn test_is_bold() {
        assert_eq!(StyleDescriptor::bold().is_bold(), Some(true));
        assert_eq!(StyleDescriptor::weight("400").is_bold(), Some(false));
        assert_eq!(StyleDescriptor::weight("Bold").is_bold(), Some(true));
        assert_eq!(StyleDescriptor::default().is_bold(), None);
    }

    #[test]
    fn test_parse_css_color() {
        assert_eq!(parse_css_color("#000000"), Some(Rgba([0, 0, 0, 255])));
        assert_eq!(parse_css_color("#f80"), Some(Rgba([255, 136, 0, 255])));
        assert_eq!(parse_css_color("rgb(1, 2, 3)"), Some(Rgba([1, 2, 3, 255])));
        assert_eq!(parse_css_color("Yellow"), Some(Rgba([255, 255, 0, 255])));
        assert_eq!(parse_css_color("#12345"), None);
        assert_eq!(parse_css_color("not-a-color"), None);
    }
}
