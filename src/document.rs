//! Document assembly: page setup, title and top-level content.

use std::fmt;
use std::str::FromStr;

use kuchiki::traits::TendrilSink;

use crate::convert::Converter;
use crate::error::Error;
use crate::font::CanonicalFont;
use crate::node::LayoutNode;
use crate::style::{BASE_FONT_SIZE, Property, Style, Stylesheet, Value};

pub const DEFAULT_TITLE: &str = "Document";
pub const DEFAULT_MARGIN: f32 = 20.0;
/// Upper bound for a page margin taken from the `body` rule.
pub const MAX_MARGIN: f32 = 20.0;
pub const BASE_LINE_HEIGHT: f32 = 1.6;

/// Physical page sizes, in points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PageFormat {
    #[default]
    Letter,
    Legal,
    Tabloid,
    Executive,
    A3,
    A4,
    A5,
}

impl PageFormat {
    pub fn size(self) -> (f32, f32) {
        match self {
            PageFormat::Letter => (612.0, 792.0),
            PageFormat::Legal => (612.0, 1008.0),
            PageFormat::Tabloid => (792.0, 1224.0),
            PageFormat::Executive => (521.86, 756.0),
            PageFormat::A3 => (841.89, 1190.55),
            PageFormat::A4 => (595.28, 841.89),
            PageFormat::A5 => (419.53, 595.28),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            PageFormat::Letter => "LETTER",
            PageFormat::Legal => "LEGAL",
            PageFormat::Tabloid => "TABLOID",
            PageFormat::Executive => "EXECUTIVE",
            PageFormat::A3 => "A3",
            PageFormat::A4 => "A4",
            PageFormat::A5 => "A5",
        }
    }
}

impl FromStr for PageFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "LETTER" => Ok(PageFormat::Letter),
            "LEGAL" => Ok(PageFormat::Legal),
            "TABLOID" => Ok(PageFormat::Tabloid),
            "EXECUTIVE" => Ok(PageFormat::Executive),
            "A3" => Ok(PageFormat::A3),
            "A4" => Ok(PageFormat::A4),
            "A5" => Ok(PageFormat::A5),
            _ => Err(Error::UnknownPageFormat(s.to_string())),
        }
    }
}

impl fmt::Display for PageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Options recognized by a conversion call.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConvertOptions {
    pub format: PageFormat,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageSetup {
    pub width: f32,
    pub height: f32,
    pub margin: f32,
}

/// A single-flow paginated document, ready for serialization.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub title: String,
    pub page: PageSetup,
    pub base_style: Style,
    pub content: Vec<LayoutNode>,
}

/// Parse `html` and assemble it into a [`Document`]. Never fails: a missing
/// body yields a document with no content.
pub fn assemble(html: &str, options: &ConvertOptions) -> Document {
    let document = kuchiki::parse_html().one(html);

    let mut css = String::new();
    if let Ok(styles) = document.select("style") {
        for style in styles {
            css.push_str(&style.as_node().text_contents());
            css.push('\n');
        }
    }
    let sheet = Stylesheet::parse(&css);

    let title = document
        .select_first("title")
        .ok()
        .map(|title| {
            title
                .as_node()
                .text_contents()
                .split_whitespace()
                .collect::<Vec<_>>()
                .join(" ")
        })
        .filter(|title| !title.is_empty())
        .unwrap_or_else(|| DEFAULT_TITLE.to_string());

    let content = document
        .select_first("body")
        .map(|body| Converter::new(&sheet).convert_children(body.as_node()))
        .unwrap_or_default();

    let (width, height) = options.format.size();
    Document {
        title,
        page: PageSetup {
            width,
            height,
            margin: page_margin(&sheet),
        },
        base_style: base_style(&sheet),
        content,
    }
}

/// Margin from the `body` rule's `margin` declaration, capped at
/// [`MAX_MARGIN`].
fn page_margin(sheet: &Stylesheet) -> f32 {
    let declared = sheet
        .tag_rule("body")
        .and_then(|rule| rule.get(Property::Margin))
        .and_then(|value| match value {
            Value::Number(n) => Some(*n),
            Value::Keyword(raw) => raw
                .split_whitespace()
                .next()
                .and_then(|first| first.trim_end_matches("px").parse::<f32>().ok()),
            _ => None,
        })
        .filter(|margin| margin.is_finite());

    declared.unwrap_or(DEFAULT_MARGIN).clamp(0.0, MAX_MARGIN)
}

fn base_style(sheet: &Stylesheet) -> Style {
    let mut style = Style::new()
        .with(Property::FontFamily, Value::Font(CanonicalFont::Roboto))
        .with(Property::FontSize, Value::Number(BASE_FONT_SIZE))
        .with(Property::LineHeight, Value::Number(BASE_LINE_HEIGHT));
    if let Some(rule) = sheet.tag_rule("page") {
        style.merge(rule);
    }
    style.normalize_font();
    style
}

#[cfg(test)]
mod tests {
    use super::*;

    fn letter(html: &str) -> Document {
        assemble(html, &ConvertOptions::default())
    }

    #[test]
    fn heading_and_paragraph() {
        let doc = letter("<body><h1>Report</h1><p>Hello</p></body>");
        assert_eq!(doc.page, PageSetup { width: 612.0, height: 792.0, margin: 20.0 });
        assert_eq!(doc.title, DEFAULT_TITLE);
        assert_eq!(doc.content.len(), 2);

        let LayoutNode::Heading { level, style, .. } = &doc.content[0] else {
            panic!("expected heading, got {:?}", doc.content[0]);
        };
        assert_eq!(*level, 1);
        assert_eq!(style.number(Property::FontSize), Some(24.0));
        assert_eq!(doc.content[0].plain_text(), "Report");

        assert!(matches!(doc.content[1], LayoutNode::Paragraph { .. }));
        assert_eq!(doc.content[1].plain_text(), "Hello");
        assert_eq!(doc.content[1].number(Property::MarginBottom), Some(8.0));
    }

    #[test]
    fn title_is_extracted() {
        let doc = letter("<html><head><title>  Resale\n Certificate </title></head><body></body></html>");
        assert_eq!(doc.title, "Resale Certificate");
        assert!(doc.content.is_empty());
    }

    #[test]
    fn empty_input_is_valid() {
        let doc = letter("");
        assert!(doc.content.is_empty());
        assert_eq!(doc.page.margin, DEFAULT_MARGIN);
    }

    #[test]
    fn body_margin_is_capped() {
        let wide = letter("<style>body { margin: 40px; }</style><body><p>x</p></body>");
        assert_eq!(wide.page.margin, 20.0);

        let narrow = letter("<style>body { margin: 10px }</style><body></body>");
        assert_eq!(narrow.page.margin, 10.0);

        let shorthand = letter("<style>body { margin: 0 auto }</style><body></body>");
        assert_eq!(shorthand.page.margin, 0.0);
    }

    #[test]
    fn import_before_body_rule_keeps_margin() {
        let doc = letter("<style>@import url(base.css);\nbody { margin: 5px }</style><p>x</p>");
        assert_eq!(doc.page.margin, 5.0);
    }

    #[test]
    fn page_rule_extends_base_style() {
        let doc = letter("<style>page { font-family: Times; color: #222 }</style><body></body>");
        assert_eq!(doc.base_style.get(Property::FontFamily), Some(&Value::Font(CanonicalFont::Times)));
        assert_eq!(doc.base_style.number(Property::FontSize), Some(12.0));
        assert_eq!(doc.base_style.number(Property::LineHeight), Some(1.6));
        assert_eq!(doc.base_style.get(Property::Color), Some(&Value::Color("#222".into())));
    }

    #[test]
    fn style_blocks_anywhere_apply() {
        let doc = letter(
            "<head><style>.a { color: #111 }</style></head><body><style>.b { color: #222 }</style><div class=\"b\">x</div></body>",
        );
        assert_eq!(doc.content.len(), 1);
        assert_eq!(doc.content[0].style().and_then(|s| s.get(Property::Color)), Some(&Value::Color("#222".into())));
    }

    #[test]
    fn page_formats() {
        assert_eq!("letter".parse::<PageFormat>().ok(), Some(PageFormat::Letter));
        assert_eq!(" A4 ".parse::<PageFormat>().ok(), Some(PageFormat::A4));
        assert!("B5".parse::<PageFormat>().is_err());

        let doc = assemble("<body></body>", &ConvertOptions { format: PageFormat::A4 });
        assert_eq!((doc.page.width, doc.page.height), (595.28, 841.89));
    }
}
