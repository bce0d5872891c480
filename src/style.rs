//! Stylesheet parsing and per-element style resolution.
//!
//! Only a small vocabulary of CSS is understood. Rules are keyed either by a
//! class name or by a bare tag name; there are no combinators, specificity
//! or inheritance. A node's style is the merge of its class rule, its tag
//! rule and its inline `style` attribute, in that order, later wins.
//!
//! Note the order: a tag rule overrides a class rule on the same property.
//! Documents authored against this engine rely on it, so it is kept even
//! though it is the reverse of browser specificity.

use std::collections::{BTreeMap, HashMap};

use cssparser::{
    AtRuleParser, BasicParseErrorKind, CowRcStr, DeclarationParser, ParseError, Parser,
    ParserInput, ParserState, QualifiedRuleParser, RuleBodyItemParser, RuleBodyParser,
    StyleSheetParser,
};
use log::trace;

use crate::font::{CanonicalFont, normalize_font_family};

/// Multiplier for `em`/`rem` values, in points.
pub const BASE_FONT_SIZE: f32 = 12.0;

/// Style properties the layout stage understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Property {
    FontFamily,
    FontSize,
    FontWeight,
    FontStyle,
    TextAlign,
    TextDecoration,
    LineHeight,
    Color,
    BackgroundColor,
    Margin,
    MarginTop,
    MarginRight,
    MarginBottom,
    MarginLeft,
    Padding,
    PaddingTop,
    PaddingRight,
    PaddingBottom,
    PaddingLeft,
    BorderTopWidth,
    BorderTopStyle,
    BorderTopColor,
    BorderBottomWidth,
    BorderBottomStyle,
    BorderBottomColor,
    Display,
    FlexDirection,
    FlexWrap,
    JustifyContent,
    AlignItems,
    Width,
    Height,
    MaxWidth,
    MaxHeight,
}

impl Property {
    /// Look up a CSS property name (already lowercased).
    pub fn from_css(name: &str) -> Option<Property> {
        let prop = match name {
            "font-family" => Property::FontFamily,
            "font-size" => Property::FontSize,
            "font-weight" => Property::FontWeight,
            "font-style" => Property::FontStyle,
            "text-align" => Property::TextAlign,
            "text-decoration" | "text-decoration-line" => Property::TextDecoration,
            "line-height" => Property::LineHeight,
            "color" => Property::Color,
            "background" | "background-color" => Property::BackgroundColor,
            "margin" => Property::Margin,
            "margin-top" => Property::MarginTop,
            "margin-right" => Property::MarginRight,
            "margin-bottom" => Property::MarginBottom,
            "margin-left" => Property::MarginLeft,
            "padding" => Property::Padding,
            "padding-top" => Property::PaddingTop,
            "padding-right" => Property::PaddingRight,
            "padding-bottom" => Property::PaddingBottom,
            "padding-left" => Property::PaddingLeft,
            "border-top-width" => Property::BorderTopWidth,
            "border-top-style" => Property::BorderTopStyle,
            "border-top-color" => Property::BorderTopColor,
            "border-bottom-width" => Property::BorderBottomWidth,
            "border-bottom-style" => Property::BorderBottomStyle,
            "border-bottom-color" => Property::BorderBottomColor,
            "display" => Property::Display,
            "flex-direction" => Property::FlexDirection,
            "flex-wrap" => Property::FlexWrap,
            "justify-content" => Property::JustifyContent,
            "align-items" => Property::AlignItems,
            "width" => Property::Width,
            "height" => Property::Height,
            "max-width" => Property::MaxWidth,
            "max-height" => Property::MaxHeight,
            _ => return None,
        };
        Some(prop)
    }

    /// camelCase name, as shown in layout-tree dumps.
    pub fn key(self) -> &'static str {
        match self {
            Property::FontFamily => "fontFamily",
            Property::FontSize => "fontSize",
            Property::FontWeight => "fontWeight",
            Property::FontStyle => "fontStyle",
            Property::TextAlign => "textAlign",
            Property::TextDecoration => "textDecoration",
            Property::LineHeight => "lineHeight",
            Property::Color => "color",
            Property::BackgroundColor => "backgroundColor",
            Property::Margin => "margin",
            Property::MarginTop => "marginTop",
            Property::MarginRight => "marginRight",
            Property::MarginBottom => "marginBottom",
            Property::MarginLeft => "marginLeft",
            Property::Padding => "padding",
            Property::PaddingTop => "paddingTop",
            Property::PaddingRight => "paddingRight",
            Property::PaddingBottom => "paddingBottom",
            Property::PaddingLeft => "paddingLeft",
            Property::BorderTopWidth => "borderTopWidth",
            Property::BorderTopStyle => "borderTopStyle",
            Property::BorderTopColor => "borderTopColor",
            Property::BorderBottomWidth => "borderBottomWidth",
            Property::BorderBottomStyle => "borderBottomStyle",
            Property::BorderBottomColor => "borderBottomColor",
            Property::Display => "display",
            Property::FlexDirection => "flexDirection",
            Property::FlexWrap => "flexWrap",
            Property::JustifyContent => "justifyContent",
            Property::AlignItems => "alignItems",
            Property::Width => "width",
            Property::Height => "height",
            Property::MaxWidth => "maxWidth",
            Property::MaxHeight => "maxHeight",
        }
    }

    fn is_color(self) -> bool {
        matches!(
            self,
            Property::Color
                | Property::BackgroundColor
                | Property::BorderTopColor
                | Property::BorderBottomColor
        )
    }
}

/// A normalized property value. Lengths are already in points.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Number(f32),
    /// Percentage, kept verbatim (e.g. `"50%"`).
    Percent(String),
    Color(String),
    Keyword(String),
    Font(CanonicalFont),
}

impl Value {
    pub fn keyword(value: &str) -> Value {
        Value::Keyword(value.to_string())
    }

    pub fn as_number(&self) -> Option<f32> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn is_keyword(&self, expected: &str) -> bool {
        matches!(self, Value::Keyword(k) if k.eq_ignore_ascii_case(expected))
    }
}

/// Flat property map for a single node.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Style {
    props: BTreeMap<Property, Value>,
}

impl Style {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, prop: Property, value: Value) -> Self {
        self.set(prop, value);
        self
    }

    pub fn get(&self, prop: Property) -> Option<&Value> {
        self.props.get(&prop)
    }

    pub fn number(&self, prop: Property) -> Option<f32> {
        self.get(prop).and_then(Value::as_number)
    }

    pub fn is(&self, prop: Property, keyword: &str) -> bool {
        self.get(prop).is_some_and(|v| v.is_keyword(keyword))
    }

    pub fn set(&mut self, prop: Property, value: Value) {
        self.props.insert(prop, value);
    }

    pub fn remove(&mut self, prop: Property) -> Option<Value> {
        self.props.remove(&prop)
    }

    pub fn is_empty(&self) -> bool {
        self.props.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Property, &Value)> {
        self.props.iter().map(|(p, v)| (*p, v))
    }

    /// Overlay `other` on top of `self`; `other` wins on collisions.
    pub fn merge(&mut self, other: &Style) {
        for (prop, value) in &other.props {
            self.props.insert(*prop, value.clone());
        }
    }

    /// Replace a raw `fontFamily` keyword with its canonical font.
    pub fn normalize_font(&mut self) {
        if let Some(Value::Keyword(raw)) = self.props.get(&Property::FontFamily) {
            let font = normalize_font_family(raw);
            self.props.insert(Property::FontFamily, Value::Font(font));
        }
    }

    /// Clamp a numeric property to `max`, or set `default` when it is absent
    /// or not a plain number.
    pub fn clamp_or(&mut self, prop: Property, max: f32, default: f32) {
        let value = match self.number(prop) {
            Some(n) => n.min(max),
            None => default,
        };
        self.set(prop, Value::Number(value));
    }

    /// Set a numeric property only if nothing is declared yet.
    pub fn default_number(&mut self, prop: Property, value: f32) {
        self.props.entry(prop).or_insert(Value::Number(value));
    }
}

/// Rules parsed from the document's `<style>` blocks.
#[derive(Debug, Clone, Default)]
pub struct Stylesheet {
    classes: HashMap<String, Style>,
    tags: HashMap<String, Style>,
}

impl Stylesheet {
    /// Parse raw CSS text. At-rules and anything unrecognizable are skipped;
    /// a completely malformed sheet yields an empty rule set.
    pub fn parse(css: &str) -> Self {
        let mut sheet = Stylesheet::default();
        let mut input = ParserInput::new(css);
        let mut parser = Parser::new(&mut input);
        let mut rules = TopLevelParser;

        for rule in StyleSheetParser::new(&mut parser, &mut rules) {
            match rule {
                Ok((prelude, declarations)) => {
                    for part in prelude.split(',') {
                        sheet.register(part, &declarations);
                    }
                }
                Err((err, source)) => trace!("skipping rule {source:?}: {:?}", err.kind),
            }
        }

        sheet
    }

    fn register(&mut self, selector: &str, declarations: &Style) {
        let selector = selector.trim();
        let (map, key) = match selector.strip_prefix('.') {
            Some(class) => (&mut self.classes, strip_whitespace(class)),
            None => (&mut self.tags, strip_whitespace(selector).to_ascii_lowercase()),
        };
        if key.is_empty() || declarations.is_empty() {
            return;
        }
        map.entry(key).or_default().merge(declarations);
    }

    pub fn class_rule(&self, class: &str) -> Option<&Style> {
        self.classes.get(class)
    }

    pub fn tag_rule(&self, tag: &str) -> Option<&Style> {
        self.tags.get(tag)
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty() && self.tags.is_empty()
    }

    /// Resolve the style for an element: class rule, then tag rule, then the
    /// inline `style` attribute.
    ///
    /// The class attribute is matched as a whole with its whitespace removed,
    /// so `class="a b"` only matches a rule keyed `ab`.
    pub fn resolve(&self, tag: &str, class: Option<&str>, inline: Option<&str>) -> Style {
        let mut style = Style::new();

        if let Some(rule) = class
            .map(strip_whitespace)
            .filter(|key| !key.is_empty())
            .and_then(|key| self.classes.get(&key))
        {
            style.merge(rule);
        }
        if let Some(rule) = self.tags.get(tag) {
            style.merge(rule);
        }
        if let Some(inline) = inline {
            style.merge(&parse_declarations(inline));
        }

        style.normalize_font();
        style
    }
}

/// Parse a `prop: value; prop: value` list, as found in a rule body or an
/// inline `style` attribute.
pub fn parse_declarations(text: &str) -> Style {
    let mut input = ParserInput::new(text);
    let mut parser = Parser::new(&mut input);
    declaration_block(&mut parser)
}

fn declaration_block(input: &mut Parser) -> Style {
    let mut collector = DeclarationCollector { style: Style::new() };
    for result in RuleBodyParser::new(input, &mut collector) {
        if let Err((err, source)) = result {
            trace!("skipping declaration {source:?}: {:?}", err.kind);
        }
    }
    collector.style
}

/// Top-level rules: qualified rules become `(selector list, declarations)`,
/// at-rules are rejected so the parser skips them whole.
struct TopLevelParser;

impl<'i> QualifiedRuleParser<'i> for TopLevelParser {
    type Prelude = String;
    type QualifiedRule = (String, Style);
    type Error = ();

    fn parse_prelude<'t>(
        &mut self,
        input: &mut Parser<'i, 't>,
    ) -> Result<Self::Prelude, ParseError<'i, Self::Error>> {
        let start = input.position();
        while input.next_including_whitespace_and_comments().is_ok() {}
        Ok(input.slice_from(start).trim().to_owned())
    }

    fn parse_block<'t>(
        &mut self,
        prelude: Self::Prelude,
        _start: &ParserState,
        input: &mut Parser<'i, 't>,
    ) -> Result<Self::QualifiedRule, ParseError<'i, Self::Error>> {
        Ok((prelude, declaration_block(input)))
    }
}

impl<'i> AtRuleParser<'i> for TopLevelParser {
    type Prelude = ();
    type AtRule = (String, Style);
    type Error = ();

    fn parse_prelude<'t>(
        &mut self,
        name: CowRcStr<'i>,
        input: &mut Parser<'i, 't>,
    ) -> Result<Self::Prelude, ParseError<'i, Self::Error>> {
        trace!("skipping @{name} rule");
        Err(input.new_error(BasicParseErrorKind::AtRuleInvalid(name)))
    }
}

/// Applies each declaration of a block to one [`Style`].
struct DeclarationCollector {
    style: Style,
}

impl<'i> DeclarationParser<'i> for DeclarationCollector {
    type Declaration = ();
    type Error = ();

    fn parse_value<'t>(
        &mut self,
        name: CowRcStr<'i>,
        input: &mut Parser<'i, 't>,
        _declaration_start: &ParserState,
    ) -> Result<Self::Declaration, ParseError<'i, Self::Error>> {
        let start = input.position();
        while input.next_including_whitespace_and_comments().is_ok() {}
        let value = input
            .slice_from(start)
            .trim()
            .trim_end_matches("!important")
            .trim();
        if !value.is_empty() {
            apply_declaration(&mut self.style, &name.to_ascii_lowercase(), value);
        }
        Ok(())
    }
}

impl<'i> AtRuleParser<'i> for DeclarationCollector {
    type Prelude = ();
    type AtRule = ();
    type Error = ();
}

impl<'i> QualifiedRuleParser<'i> for DeclarationCollector {
    type Prelude = ();
    type QualifiedRule = ();
    type Error = ();
}

impl<'i> RuleBodyItemParser<'i, (), ()> for DeclarationCollector {
    fn parse_declarations(&self) -> bool {
        true
    }

    fn parse_qualified(&self) -> bool {
        false
    }
}

fn apply_declaration(style: &mut Style, name: &str, value: &str) {
    if value.eq_ignore_ascii_case("bold") {
        style.set(Property::FontWeight, Value::keyword("bold"));
        return;
    }
    if value.eq_ignore_ascii_case("italic") {
        style.set(Property::FontStyle, Value::keyword("italic"));
        return;
    }

    match name {
        "border-bottom" => {
            apply_border(
                style,
                value,
                [Property::BorderBottomWidth, Property::BorderBottomStyle, Property::BorderBottomColor],
            );
            return;
        }
        "border-top" => {
            apply_border(
                style,
                value,
                [Property::BorderTopWidth, Property::BorderTopStyle, Property::BorderTopColor],
            );
            return;
        }
        _ => {}
    }

    let Some(prop) = Property::from_css(name) else {
        trace!("unsupported property {name}");
        return;
    };

    let parsed = match prop {
        Property::FontFamily => Value::keyword(value),
        Property::FontWeight => match value.parse::<f32>() {
            Ok(weight) if weight >= 600.0 => Value::keyword("bold"),
            _ => Value::keyword("normal"),
        },
        Property::TextDecoration if value.to_ascii_lowercase().contains("underline") => {
            Value::keyword("underline")
        }
        _ => parse_value(prop, value),
    };
    style.set(prop, parsed);
}

/// `<width>px <style> <color>`; anything else is dropped.
fn apply_border(style: &mut Style, value: &str, [width, kind, color]: [Property; 3]) {
    let parts: Vec<&str> = value.split_whitespace().collect();
    let [w, k, c] = parts.as_slice() else {
        trace!("dropping border shorthand {value:?}");
        return;
    };
    let Some(px) = w
        .strip_suffix("px")
        .and_then(|n| n.parse::<f32>().ok())
        .filter(|n| n.is_finite())
    else {
        trace!("dropping border shorthand {value:?}");
        return;
    };
    if !k.chars().all(|ch| ch.is_ascii_alphabetic()) {
        trace!("dropping border shorthand {value:?}");
        return;
    }
    style.set(width, Value::Number(px));
    style.set(kind, Value::keyword(&k.to_ascii_lowercase()));
    style.set(color, Value::Color((*c).to_string()));
}

fn parse_value(prop: Property, value: &str) -> Value {
    let number = |suffix: &str| {
        value
            .strip_suffix(suffix)
            .and_then(|n| n.trim().parse::<f32>().ok())
            .filter(|n| n.is_finite())
    };

    if let Some(n) = number("px").or_else(|| number("pt")) {
        Value::Number(n)
    } else if let Some(n) = number("rem").or_else(|| number("em")) {
        Value::Number(n * BASE_FONT_SIZE)
    } else if value.ends_with('%') {
        Value::Percent(value.to_string())
    } else if value.starts_with('#') {
        Value::Color(value.to_string())
    } else if let Some(n) = value.parse::<f32>().ok().filter(|n| n.is_finite()) {
        Value::Number(n)
    } else if prop.is_color() {
        Value::Color(value.to_string())
    } else {
        Value::keyword(&value.to_ascii_lowercase())
    }
}

fn strip_whitespace(text: &str) -> String {
    text.chars().filter(|c| !c.is_whitespace()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lengths_are_points() {
        let style = parse_declarations("margin-top: 10px; margin-bottom: 1.5em; font-size: 2rem; width: 50%");
        assert_eq!(style.number(Property::MarginTop), Some(10.0));
        assert_eq!(style.number(Property::MarginBottom), Some(18.0));
        assert_eq!(style.number(Property::FontSize), Some(24.0));
        assert_eq!(style.get(Property::Width), Some(&Value::Percent("50%".into())));
    }

    #[test]
    fn colors_and_keywords() {
        let style = parse_declarations("color: #333; background: white; text-align: CENTER");
        assert_eq!(style.get(Property::Color), Some(&Value::Color("#333".into())));
        assert_eq!(style.get(Property::BackgroundColor), Some(&Value::Color("white".into())));
        assert!(style.is(Property::TextAlign, "center"));
    }

    #[test]
    fn bold_and_italic_words() {
        let style = parse_declarations("font-weight: bold; font-style: italic");
        assert!(style.is(Property::FontWeight, "bold"));
        assert!(style.is(Property::FontStyle, "italic"));

        let numeric = parse_declarations("font-weight: 700");
        assert!(numeric.is(Property::FontWeight, "bold"));
    }

    #[test]
    fn malformed_declarations_are_skipped() {
        let style = parse_declarations("color; : red; margin-top:; bogus-prop: 4px; margin-left: 3px");
        assert_eq!(style.iter().count(), 1);
        assert_eq!(style.number(Property::MarginLeft), Some(3.0));
    }

    #[test]
    fn border_shorthand_decomposes() {
        let style = parse_declarations("border-bottom: 1px solid #ccc");
        assert_eq!(style.number(Property::BorderBottomWidth), Some(1.0));
        assert!(style.is(Property::BorderBottomStyle, "solid"));
        assert_eq!(style.get(Property::BorderBottomColor), Some(&Value::Color("#ccc".into())));

        let dropped = parse_declarations("border-top: thin solid; border-bottom: 2pt dashed red");
        assert!(dropped.is_empty());
    }

    #[test]
    fn stylesheet_keys() {
        let sheet = Stylesheet::parse(
            "/* header */ .field { margin-bottom: 12px }\n h1, .title { color: #111 }\n @media print { p { color: red } }\n body { margin: 40px }",
        );
        assert!(sheet.class_rule("field").is_some());
        assert!(sheet.class_rule("title").is_some());
        assert!(sheet.tag_rule("h1").is_some());
        assert!(sheet.tag_rule("body").is_some());
        assert!(sheet.tag_rule("p").is_none());
    }

    #[test]
    fn statement_at_rules_do_not_swallow_rules() {
        let sheet = Stylesheet::parse(
            "@charset \"utf-8\";\n.note { color: #f00 }\n@import url(base.css);\nbody { margin: 5px }",
        );
        assert_eq!(sheet.class_rule("note").and_then(|s| s.get(Property::Color)), Some(&Value::Color("#f00".into())));
        assert_eq!(sheet.tag_rule("body").and_then(|s| s.number(Property::Margin)), Some(5.0));
    }

    #[test]
    fn comments_inside_blocks_are_ignored() {
        let sheet = Stylesheet::parse(".a { /* spacing */ margin-top: 4px; /* x */ }");
        assert_eq!(sheet.class_rule("a").and_then(|s| s.number(Property::MarginTop)), Some(4.0));
    }

    #[test]
    fn malformed_sheet_is_empty() {
        assert!(Stylesheet::parse("this is { not css").is_empty());
        assert!(Stylesheet::parse("").is_empty());
    }

    #[test]
    fn tag_rule_beats_class_rule() {
        let sheet = Stylesheet::parse(".note { color: #f00 } p { color: #00f }");
        let style = sheet.resolve("p", Some("note"), None);
        assert_eq!(style.get(Property::Color), Some(&Value::Color("#00f".into())));
    }

    #[test]
    fn inline_style_wins() {
        let sheet = Stylesheet::parse(".note { color: #f00 } p { color: #00f }");
        let style = sheet.resolve("p", Some("note"), Some("color: #0f0"));
        assert_eq!(style.get(Property::Color), Some(&Value::Color("#0f0".into())));
    }

    #[test]
    fn class_attribute_matched_whole() {
        let sheet = Stylesheet::parse(".a { color: #111 } .ab { color: #222 }");
        let style = sheet.resolve("div", Some(" a b "), None);
        assert_eq!(style.get(Property::Color), Some(&Value::Color("#222".into())));
    }

    #[test]
    fn font_family_normalized_after_merge() {
        let sheet = Stylesheet::parse("div { font-family: 'Courier New', monospace }");
        let style = sheet.resolve("div", None, None);
        assert_eq!(style.get(Property::FontFamily), Some(&Value::Font(CanonicalFont::Courier)));

        let inline = sheet.resolve("div", None, Some("font-family: Georgia"));
        assert_eq!(inline.get(Property::FontFamily), Some(&Value::Font(CanonicalFont::Roboto)));
    }

    #[test]
    fn clamp_or_defaults() {
        let mut style = parse_declarations("margin-top: 999px; margin-bottom: 3%");
        style.clamp_or(Property::MarginTop, 8.0, 5.0);
        style.clamp_or(Property::MarginBottom, 8.0, 5.0);
        style.clamp_or(Property::MarginLeft, 0.0, 0.0);
        assert_eq!(style.number(Property::MarginTop), Some(8.0));
        assert_eq!(style.number(Property::MarginBottom), Some(5.0));
        assert_eq!(style.number(Property::MarginLeft), Some(0.0));
    }
}
