use crate::style::{Property, Style};

/// A run of literal text with its own style.
#[derive(Debug, Clone, PartialEq)]
pub struct TextRun {
    pub text: String,
    pub style: Style,
}

/// A single list entry: its marker (`"• "` or `"3. "`) and converted content.
#[derive(Debug, Clone, PartialEq)]
pub struct ListItem {
    pub marker: String,
    pub children: Vec<LayoutNode>,
}

/// A list (ordered or unordered), indented as a whole.
#[derive(Debug, Clone, PartialEq)]
pub struct List {
    pub ordered: bool,
    pub items: Vec<ListItem>,
    pub style: Style,
}

/// An embedded image decoded from a `data:` URI.
#[derive(Debug, Clone, PartialEq)]
pub struct Image {
    pub mime: String,
    pub data: Vec<u8>,
    /// Bounding box the image is scaled to fit.
    pub max_width: f32,
    pub max_height: f32,
    /// Explicit size, when the style declares one.
    pub width: Option<f32>,
    pub height: Option<f32>,
    pub style: Style,
}

/// Renderable elements produced from the markup tree
#[derive(Debug, Clone, PartialEq)]
pub enum LayoutNode {
    Text(TextRun),
    /// Inline container (`span`, `strong`, ...) flowing with its siblings.
    Inline {
        children: Vec<LayoutNode>,
        style: Style,
    },
    Paragraph {
        children: Vec<LayoutNode>,
        style: Style,
    },
    Block {
        children: Vec<LayoutNode>,
        style: Style,
    },
    /// Horizontal flex row. Never holds bare `Text` children.
    Row {
        children: Vec<LayoutNode>,
        style: Style,
    },
    Heading {
        level: u8,
        children: Vec<LayoutNode>,
        style: Style,
    },
    List(List),
    Image(Image),
    LineBreak,
}

impl LayoutNode {
    pub fn text(text: impl Into<String>) -> Self {
        LayoutNode::Text(TextRun {
            text: text.into(),
            style: Style::new(),
        })
    }

    pub fn style(&self) -> Option<&Style> {
        match self {
            LayoutNode::Text(run) => Some(&run.style),
            LayoutNode::Inline { style, .. }
            | LayoutNode::Paragraph { style, .. }
            | LayoutNode::Block { style, .. }
            | LayoutNode::Row { style, .. }
            | LayoutNode::Heading { style, .. } => Some(style),
            LayoutNode::List(list) => Some(&list.style),
            LayoutNode::Image(image) => Some(&image.style),
            LayoutNode::LineBreak => None,
        }
    }

    pub fn children(&self) -> &[LayoutNode] {
        match self {
            LayoutNode::Inline { children, .. }
            | LayoutNode::Paragraph { children, .. }
            | LayoutNode::Block { children, .. }
            | LayoutNode::Row { children, .. }
            | LayoutNode::Heading { children, .. } => children,
            LayoutNode::Text(_) | LayoutNode::List(_) | LayoutNode::Image(_) | LayoutNode::LineBreak => &[],
        }
    }

    /// Concatenated text of the node and its descendants, space separated.
    pub fn plain_text(&self) -> String {
        let mut parts = Vec::new();
        collect_text(self, &mut parts);
        parts.join(" ")
    }

    /// Numeric style lookup, for callers inspecting a converted tree.
    pub fn number(&self, prop: Property) -> Option<f32> {
        self.style().and_then(|s| s.number(prop))
    }
}

fn collect_text(node: &LayoutNode, out: &mut Vec<String>) {
    match node {
        LayoutNode::Text(run) => out.push(run.text.clone()),
        LayoutNode::List(list) => {
            for item in &list.items {
                let mut item_parts = Vec::new();
                for child in &item.children {
                    collect_text(child, &mut item_parts);
                }
                out.push(format!("{}{}", item.marker, item_parts.join(" ")));
            }
        }
        LayoutNode::LineBreak => out.push("\n".to_string()),
        _ => {
            for child in node.children() {
                collect_text(child, out);
            }
        }
    }
}
