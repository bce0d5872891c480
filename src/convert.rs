//! Conversion of the parsed markup tree into layout nodes.
//!
//! Every element kind has its own policy; anything unsupported or malformed
//! is dropped at the smallest possible granularity instead of failing the
//! whole document.

use base64::Engine;
use kuchiki::{ElementData, NodeData, NodeRef};
use log::{debug, trace};
use percent_encoding::percent_decode_str;

use crate::font::CanonicalFont;
use crate::node::{Image, LayoutNode, List, ListItem};
use crate::style::{Property, Style, Stylesheet, Value};

const BULLET: &str = "• ";
const LIST_INDENT: f32 = 20.0;
const IMAGE_MAX_WIDTH: f32 = 200.0;
const IMAGE_MAX_HEIGHT: f32 = 80.0;

const CONTAINER_TAGS: &[&str] = &["div", "section", "header", "footer", "article", "main", "aside", "nav"];
const INLINE_TAGS: &[&str] = &["span", "strong", "b", "em", "i", "a", "u", "small", "label", "code"];
const IGNORED_TAGS: &[&str] = &["style", "script", "head", "title", "meta", "link", "template", "noscript"];

/// Layout override for `div`-like containers. Exactly one policy applies to a
/// node: the first whose predicate matches.
struct StructuralPolicy {
    name: &'static str,
    applies: fn(&Style, &str) -> bool,
    apply: fn(&mut Style, &str),
}

const STRUCTURAL_POLICIES: &[StructuralPolicy] = &[
    StructuralPolicy {
        name: "flex",
        applies: |style, class| style.is(Property::Display, "flex") || class.contains("header-row"),
        apply: |style, class| {
            let header_row = class.contains("header-row");
            style.set(Property::FlexDirection, Value::keyword("row"));
            if style.is(Property::JustifyContent, "space-between")
                || header_row
                || class.contains("justify-between")
                || class.contains("space-between")
            {
                style.set(Property::JustifyContent, Value::keyword("space-between"));
            }
            if style.is(Property::AlignItems, "center")
                || header_row
                || class.contains("align-center")
                || class.contains("items-center")
            {
                style.set(Property::AlignItems, Value::keyword("center"));
            }
        },
    },
    StructuralPolicy {
        name: "field",
        applies: |_, class| class.contains("field") && !class.contains("textarea-field"),
        apply: |style, _| {
            style.set(Property::FlexDirection, Value::keyword("row"));
            style.clamp_or(Property::MarginBottom, 6.0, 4.0);
            style.clamp_or(Property::MarginTop, 4.0, 0.0);
            style.set(Property::FlexWrap, Value::keyword("wrap"));
        },
    },
    StructuralPolicy {
        name: "section",
        applies: |_, class| class.contains("section"),
        apply: |style, _| {
            style.clamp_or(Property::MarginTop, 8.0, 5.0);
            style.clamp_or(Property::MarginBottom, 8.0, 5.0);
            zero_horizontal_margins(style);
        },
    },
    // Any class containing "section-title" also contains "section", so the
    // policy above claims it first; kept so the chain order stays explicit.
    StructuralPolicy {
        name: "section-title",
        applies: |_, class| class.contains("section-title"),
        apply: |style, _| {
            style.clamp_or(Property::MarginTop, 10.0, 8.0);
            style.clamp_or(Property::MarginBottom, 5.0, 3.0);
            zero_horizontal_margins(style);
        },
    },
];

fn zero_horizontal_margins(style: &mut Style) {
    style.set(Property::MarginLeft, Value::Number(0.0));
    style.set(Property::MarginRight, Value::Number(0.0));
}

/// Converts markup nodes into layout nodes against one stylesheet.
pub struct Converter<'a> {
    sheet: &'a Stylesheet,
}

impl<'a> Converter<'a> {
    pub fn new(sheet: &'a Stylesheet) -> Self {
        Self { sheet }
    }

    /// Convert every child of `node`, dropping those that render nothing.
    pub fn convert_children(&self, node: &NodeRef) -> Vec<LayoutNode> {
        node.children().filter_map(|child| self.convert(&child)).collect()
    }

    /// Convert a single node, or `None` if it contributes nothing.
    pub fn convert(&self, node: &NodeRef) -> Option<LayoutNode> {
        match node.data() {
            NodeData::Text(text) => {
                let text = collapse_whitespace(&text.borrow());
                if text.is_empty() {
                    None
                } else {
                    Some(LayoutNode::text(text))
                }
            }
            NodeData::Element(element) => self.convert_element(node, element),
            _ => None,
        }
    }

    fn convert_element(&self, node: &NodeRef, element: &ElementData) -> Option<LayoutNode> {
        let tag = element.name.local.as_ref();
        let (class, style) = {
            let attrs = element.attributes.borrow();
            let class = attrs.get("class").unwrap_or("").to_string();
            let style = self.sheet.resolve(tag, attrs.get("class"), attrs.get("style"));
            (class, style)
        };

        match tag {
            t if CONTAINER_TAGS.contains(&t) => self.container(node, style, &class),
            "p" => {
                let mut style = style;
                style.default_number(Property::MarginBottom, 8.0);
                Some(LayoutNode::Paragraph {
                    children: self.convert_children(node),
                    style,
                })
            }
            t if INLINE_TAGS.contains(&t) => self.inline(node, t, style),
            "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
                let level = tag[1..].parse::<u8>().unwrap_or(6);
                self.heading(node, level, style)
            }
            "img" => image(element, style),
            "br" => Some(LayoutNode::LineBreak),
            "ul" | "ol" => self.list(node, tag == "ol", style),
            "li" => {
                debug!("dropping <li> outside of a list");
                None
            }
            t if IGNORED_TAGS.contains(&t) => None,
            _ => {
                let children = self.convert_children(node);
                if children.is_empty() {
                    None
                } else {
                    Some(LayoutNode::Block { children, style })
                }
            }
        }
    }

    fn container(&self, node: &NodeRef, mut style: Style, class: &str) -> Option<LayoutNode> {
        let children = self.convert_children(node);

        if let Some(policy) = STRUCTURAL_POLICIES
            .iter()
            .find(|policy| (policy.applies)(&style, class))
        {
            trace!("{} policy applied to class {class:?}", policy.name);
            (policy.apply)(&mut style, class);
        }
        style.remove(Property::Display);

        if style.is(Property::FlexDirection, "row") {
            let children: Vec<LayoutNode> = children
                .into_iter()
                .filter(|child| !matches!(child, LayoutNode::Text(_)))
                .collect();
            (!children.is_empty()).then_some(LayoutNode::Row { children, style })
        } else {
            (!children.is_empty()).then_some(LayoutNode::Block { children, style })
        }
    }

    fn inline(&self, node: &NodeRef, tag: &str, mut style: Style) -> Option<LayoutNode> {
        match tag {
            "strong" | "b" => style.set(Property::FontWeight, Value::keyword("bold")),
            "em" | "i" => style.set(Property::FontStyle, Value::keyword("italic")),
            "u" => style.set(Property::TextDecoration, Value::keyword("underline")),
            "code" if style.get(Property::FontFamily).is_none() => {
                style.set(Property::FontFamily, Value::Font(CanonicalFont::Courier))
            }
            _ => {}
        }

        let children = self.convert_children(node);
        if children.is_empty() {
            return None;
        }
        Some(LayoutNode::Inline { children, style })
    }

    fn heading(&self, node: &NodeRef, level: u8, mut style: Style) -> Option<LayoutNode> {
        let children = self.convert_children(node);
        if children.is_empty() {
            return None;
        }
        style.set(Property::FontSize, Value::Number(heading_font_size(level)));
        style.set(Property::FontWeight, Value::keyword("bold"));
        style.clamp_or(Property::MarginBottom, 10.0, 8.0);
        style.clamp_or(Property::MarginTop, 20.0, 15.0);
        Some(LayoutNode::Heading {
            level,
            children,
            style,
        })
    }

    fn list(&self, node: &NodeRef, ordered: bool, mut style: Style) -> Option<LayoutNode> {
        let items: Vec<ListItem> = node
            .children()
            .filter(|child| {
                child
                    .as_element()
                    .is_some_and(|el| el.name.local.as_ref() == "li")
            })
            .enumerate()
            .map(|(index, li)| ListItem {
                marker: if ordered {
                    format!("{}. ", index + 1)
                } else {
                    BULLET.to_string()
                },
                children: self.convert_children(&li),
            })
            .collect();

        if items.is_empty() {
            return None;
        }
        style.set(Property::MarginLeft, Value::Number(LIST_INDENT));
        Some(LayoutNode::List(List {
            ordered,
            items,
            style,
        }))
    }
}

pub fn heading_font_size(level: u8) -> f32 {
    match level {
        1 => 24.0,
        2 => 20.0,
        3 => 18.0,
        _ => 16.0,
    }
}

fn image(element: &ElementData, mut style: Style) -> Option<LayoutNode> {
    let attrs = element.attributes.borrow();
    let src = attrs.get("src")?;
    let Some((mime, data)) = parse_data_uri(src.trim()) else {
        debug!("dropping image with unsupported source {:.40}", src);
        return None;
    };

    let attr_length = |name: &str| {
        attrs
            .get(name)
            .and_then(|v| v.trim().trim_end_matches("px").parse::<f32>().ok())
    };
    let max_width = style.number(Property::MaxWidth).unwrap_or(IMAGE_MAX_WIDTH);
    let max_height = style.number(Property::MaxHeight).unwrap_or(IMAGE_MAX_HEIGHT);
    let width = style.number(Property::Width).or_else(|| attr_length("width"));
    let height = style.number(Property::Height).or_else(|| attr_length("height"));

    style.set(Property::MaxWidth, Value::Number(max_width));
    style.set(Property::MaxHeight, Value::Number(max_height));
    style.default_number(Property::MarginRight, 10.0);
    style.default_number(Property::MarginBottom, 0.0);

    Some(LayoutNode::Image(Image {
        mime,
        data,
        max_width,
        max_height,
        width,
        height,
        style,
    }))
}

/// Decode a `data:` URI into its mime type and payload bytes.
fn parse_data_uri(uri: &str) -> Option<(String, Vec<u8>)> {
    let rest = uri.strip_prefix("data:")?;
    let (header, payload) = rest.split_once(',')?;
    let mime = header
        .split(';')
        .next()
        .filter(|v| !v.is_empty())
        .unwrap_or("application/octet-stream")
        .to_ascii_lowercase();
    let data = if header.contains(";base64") {
        let compact: String = payload.chars().filter(|c| !c.is_whitespace()).collect();
        base64::engine::general_purpose::STANDARD
            .decode(compact.as_bytes())
            .ok()?
    } else {
        if !well_formed_escapes(payload) {
            return None;
        }
        percent_decode_str(payload).collect()
    };
    Some((mime, data))
}

/// Every `%` starts a two-digit hex escape.
fn well_formed_escapes(payload: &str) -> bool {
    payload.split('%').skip(1).all(|escape| {
        escape
            .get(..2)
            .is_some_and(|hex| hex.chars().all(|c| c.is_ascii_hexdigit()))
    })
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
