use std::fmt::Write as _;

use log::warn;

use crate::document::Document;
use crate::font::CanonicalFont;
use crate::node::{Image, LayoutNode, List};
use crate::style::{Property, Style, Value};

/// Gap between items of a horizontal row that is not justified.
const ROW_GAP: f32 = 6.0;

/// Convert a document to Typst markup
pub fn document_to_typst(doc: &Document) -> String {
    let mut out = String::new();

    out.push_str("#set document(title: ");
    string_literal(&doc.title, &mut out);
    out.push_str(")\n");
    let _ = writeln!(
        out,
        "#set page(width: {}, height: {}, margin: {})",
        pt(doc.page.width),
        pt(doc.page.height),
        pt(doc.page.margin)
    );

    // Vertical spacing comes only from explicit margins.
    out.push_str("#set block(spacing: 0pt)\n");
    let mut text_args = text_args(&doc.base_style);
    if doc.base_style.get(Property::FontFamily).is_none() {
        text_args.insert(0, format!("font: {}", font_list(CanonicalFont::default())));
    }
    let _ = writeln!(out, "#set text({})", text_args.join(", "));
    let leading = doc
        .base_style
        .number(Property::LineHeight)
        .map(leading_em)
        .unwrap_or(0.6);
    let _ = writeln!(out, "#set par(leading: {}em, spacing: 0pt)", num(leading));
    if let Some(align) = alignment(&doc.base_style) {
        let _ = writeln!(out, "#set align({align})");
    }
    out.push('\n');

    for node in &doc.content {
        emit_node(node, &mut out);
        out.push('\n');
    }

    out
}

fn emit_nodes(nodes: &[LayoutNode], out: &mut String) {
    for (i, node) in nodes.iter().enumerate() {
        if i > 0 {
            out.push_str(separator(&nodes[i - 1], node));
        }
        emit_node(node, out);
    }
}

/// Block-level siblings go on their own line. Inline siblings are one word
/// space apart unless punctuation hugs the boundary.
fn separator(prev: &LayoutNode, next: &LayoutNode) -> &'static str {
    if !flows_inline(prev) || !flows_inline(next) {
        return "\n";
    }
    if matches!(prev, LayoutNode::LineBreak) || matches!(next, LayoutNode::LineBreak) {
        return "";
    }
    let closes = next
        .plain_text()
        .starts_with(|c: char| ",.;:!?)]}%'\u{2019}".contains(c));
    let opens = prev.plain_text().ends_with(['(', '[', '{']);
    if closes || opens { "" } else { " " }
}

fn flows_inline(node: &LayoutNode) -> bool {
    matches!(
        node,
        LayoutNode::Text(_) | LayoutNode::Inline { .. } | LayoutNode::Image(_) | LayoutNode::LineBreak
    )
}

fn emit_node(node: &LayoutNode, out: &mut String) {
    match node {
        LayoutNode::Text(run) => {
            emit_styled_text(&run.style, out, |out| escape_text(&run.text, out));
        }
        LayoutNode::Inline { children, style } => {
            emit_styled_text(style, out, |out| emit_nodes(children, out));
        }
        LayoutNode::Paragraph { children, style }
        | LayoutNode::Block { children, style }
        | LayoutNode::Heading { children, style, .. } => {
            emit_block(style, out, |out| emit_nodes(children, out));
        }
        LayoutNode::Row { children, style } => {
            emit_block(style, out, |out| emit_row(children, style, out));
        }
        LayoutNode::List(list) => emit_list(list, out),
        LayoutNode::Image(image) => emit_image(image, out),
        LayoutNode::LineBreak => out.push_str("#linebreak()"),
    }
}

/// Wrap inline content in `#text(..)` (and `#underline`) when the style
/// carries text properties.
fn emit_styled_text(style: &Style, out: &mut String, body: impl FnOnce(&mut String)) {
    let args = text_args(style);
    let underline = style.is(Property::TextDecoration, "underline");
    if underline {
        out.push_str("#underline[");
    }
    if args.is_empty() {
        body(out);
    } else {
        let _ = write!(out, "#text({})[", args.join(", "));
        body(out);
        out.push(']');
    }
    if underline {
        out.push(']');
    }
}

/// Emit block-level chrome: vertical margins, horizontal margins via `pad`,
/// then width, fill, border and padding on the inner block.
fn emit_block(style: &Style, out: &mut String, body: impl FnOnce(&mut String)) {
    let mut content = String::new();
    if style.is(Property::TextAlign, "justify") {
        content.push_str("#set par(justify: true)\n");
    }
    if let Some(leading) = style.number(Property::LineHeight) {
        let _ = writeln!(content, "#set par(leading: {}em)", num(leading_em(leading)));
    }
    emit_styled_text(style, &mut content, body);
    if let Some(align) = alignment(style) {
        content = format!("#align({align})[{content}]");
    }

    let mut outer = Vec::new();
    if let Some(top) = margin(style, Property::MarginTop) {
        outer.push(format!("above: {}", pt(top)));
    }
    if let Some(bottom) = margin(style, Property::MarginBottom) {
        outer.push(format!("below: {}", pt(bottom)));
    }

    let mut inner = Vec::new();
    if let Some(width) = length(style.get(Property::Width)) {
        inner.push(format!("width: {width}"));
    }
    if let Some(height) = length(style.get(Property::Height)) {
        inner.push(format!("height: {height}"));
    }
    if let Some(fill) = style.get(Property::BackgroundColor).and_then(color) {
        inner.push(format!("fill: {fill}"));
    }
    if let Some(stroke) = stroke(style) {
        inner.push(format!("stroke: {stroke}"));
    }
    if let Some(inset) = padding(style) {
        inner.push(format!("inset: {inset}"));
    }

    let left = margin(style, Property::MarginLeft).unwrap_or(0.0);
    let right = margin(style, Property::MarginRight).unwrap_or(0.0);
    if left > 0.0 || right > 0.0 {
        let _ = write!(out, "#block({})[", outer.join(", "));
        let _ = write!(out, "#pad(left: {}, right: {})[", pt(left), pt(right));
        let _ = write!(out, "#block({})[{content}]", inner.join(", "));
        out.push_str("]]");
    } else {
        outer.extend(inner);
        let _ = write!(out, "#block({})[{content}]", outer.join(", "));
    }
}

fn emit_row(children: &[LayoutNode], style: &Style, out: &mut String) {
    if style.is(Property::FlexWrap, "wrap") {
        // Wrapping rows flow as inline boxes so long values continue on the
        // next line.
        for (i, child) in children.iter().enumerate() {
            if i > 0 {
                let _ = write!(out, " #h({}) ", pt(ROW_GAP));
            }
            out.push_str("#box[");
            emit_node(child, out);
            out.push(']');
        }
        return;
    }

    let between = style.is(Property::JustifyContent, "space-between");
    let centered = style.is(Property::AlignItems, "center");
    out.push_str("#stack(dir: ltr");
    if !between {
        let _ = write!(out, ", spacing: {}", pt(ROW_GAP));
    }
    for (i, child) in children.iter().enumerate() {
        if between && i > 0 {
            out.push_str(", 1fr");
        }
        out.push_str(", ");
        if centered {
            out.push_str("align(horizon)[");
        } else {
            out.push('[');
        }
        emit_node(child, out);
        out.push(']');
    }
    out.push(')');
}

fn emit_list(list: &List, out: &mut String) {
    emit_block(&list.style, out, |out| {
        for (i, item) in list.items.iter().enumerate() {
            if i > 0 {
                out.push('\n');
            }
            out.push_str("#block[");
            escape_text(&item.marker, out);
            if !item.children.is_empty() {
                out.push('\n');
                emit_nodes(&item.children, out);
            }
            out.push(']');
        }
    });
}

fn emit_image(image: &Image, out: &mut String) {
    let decoded = match image::load_from_memory(&image.data) {
        Ok(decoded) => decoded,
        Err(err) => {
            warn!("skipping undecodable {} image: {}", image.mime, err);
            return;
        }
    };
    let format = match image::guess_format(&image.data) {
        Ok(image::ImageFormat::Png) => "png",
        Ok(image::ImageFormat::Jpeg) => "jpg",
        _ => {
            warn!("skipping unsupported {} image", image.mime);
            return;
        }
    };

    let (width, height) = image_box(image, decoded.width() as f32, decoded.height() as f32);
    let right = image.style.number(Property::MarginRight).unwrap_or(0.0).max(0.0);
    let bottom = image.style.number(Property::MarginBottom).unwrap_or(0.0).max(0.0);

    let _ = write!(
        out,
        "#box(inset: (right: {}, bottom: {}), image(bytes((",
        pt(right),
        pt(bottom)
    );
    for byte in &image.data {
        let _ = write!(out, "{byte},");
    }
    let _ = write!(
        out,
        ")), format: \"{format}\", width: {}, height: {}))",
        pt(width),
        pt(height)
    );
}

/// Final image size in points: explicit dimensions win, otherwise the
/// intrinsic size is scaled to fit the max box.
fn image_box(image: &Image, intrinsic_width: f32, intrinsic_height: f32) -> (f32, f32) {
    let ratio = if intrinsic_width > 0.0 {
        intrinsic_height / intrinsic_width
    } else {
        1.0
    };
    match (image.width, image.height) {
        (Some(w), Some(h)) => (w, h),
        (Some(w), None) => (w, w * ratio),
        (None, Some(h)) => (if ratio > 0.0 { h / ratio } else { h }, h),
        (None, None) => {
            if intrinsic_width <= 0.0 || intrinsic_height <= 0.0 {
                return (image.max_width, image.max_height);
            }
            let scale = (image.max_width / intrinsic_width).min(image.max_height / intrinsic_height);
            (intrinsic_width * scale, intrinsic_height * scale)
        }
    }
}

fn text_args(style: &Style) -> Vec<String> {
    let mut args = Vec::new();
    if let Some(Value::Font(font)) = style.get(Property::FontFamily) {
        args.push(format!("font: {}", font_list(*font)));
    }
    if let Some(size) = style.number(Property::FontSize).filter(|s| *s > 0.0) {
        args.push(format!("size: {}", pt(size)));
    }
    if style.is(Property::FontWeight, "bold") {
        args.push("weight: \"bold\"".to_string());
    }
    if style.is(Property::FontStyle, "italic") {
        args.push("style: \"italic\"".to_string());
    }
    if let Some(fill) = style.get(Property::Color).and_then(color) {
        args.push(format!("fill: {fill}"));
    }
    args
}

fn font_list(font: CanonicalFont) -> String {
    let names: Vec<String> = font
        .typst_families()
        .iter()
        .map(|name| format!("\"{name}\""))
        .collect();
    format!("({})", names.join(", "))
}

fn alignment(style: &Style) -> Option<&'static str> {
    match style.get(Property::TextAlign) {
        Some(v) if v.is_keyword("center") => Some("center"),
        Some(v) if v.is_keyword("right") || v.is_keyword("end") => Some("right"),
        Some(v) if v.is_keyword("left") || v.is_keyword("start") => Some("left"),
        _ => None,
    }
}

fn margin(style: &Style, side: Property) -> Option<f32> {
    style
        .number(side)
        .or_else(|| style.number(Property::Margin))
        .map(|m| m.max(0.0))
}

fn padding(style: &Style) -> Option<String> {
    let all = style.number(Property::Padding);
    let sides = [
        ("top", Property::PaddingTop),
        ("right", Property::PaddingRight),
        ("bottom", Property::PaddingBottom),
        ("left", Property::PaddingLeft),
    ];
    let parts: Vec<String> = sides
        .iter()
        .filter_map(|(name, prop)| {
            style
                .number(*prop)
                .or(all)
                .filter(|v| *v > 0.0)
                .map(|v| format!("{name}: {}", pt(v)))
        })
        .collect();
    (!parts.is_empty()).then(|| format!("({})", parts.join(", ")))
}

fn stroke(style: &Style) -> Option<String> {
    let sides = [
        ("top", Property::BorderTopWidth, Property::BorderTopStyle, Property::BorderTopColor),
        (
            "bottom",
            Property::BorderBottomWidth,
            Property::BorderBottomStyle,
            Property::BorderBottomColor,
        ),
    ];
    let parts: Vec<String> = sides
        .iter()
        .filter_map(|(name, width, kind, paint)| {
            let width = style.number(*width).filter(|w| *w > 0.0)?;
            if style.is(*kind, "none") || style.is(*kind, "hidden") {
                return None;
            }
            let dash = match style.get(*kind) {
                Some(v) if v.is_keyword("dashed") => "dashed",
                Some(v) if v.is_keyword("dotted") => "dotted",
                _ => "solid",
            };
            let paint = style
                .get(*paint)
                .and_then(color)
                .unwrap_or_else(|| "black".to_string());
            Some(format!(
                "{name}: (paint: {paint}, thickness: {}, dash: \"{dash}\")",
                pt(width)
            ))
        })
        .collect();
    (!parts.is_empty()).then(|| format!("({})", parts.join(", ")))
}

fn length(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::Number(n) if *n > 0.0 => Some(pt(*n)),
        Value::Percent(raw) => raw
            .trim_end_matches('%')
            .trim()
            .parse::<f32>()
            .ok()
            .filter(|p| p.is_finite() && *p >= 0.0)
            .map(|p| format!("{}%", num(p))),
        _ => None,
    }
}

/// Typst color expression for a CSS color, or `None` if it is not understood.
fn color(value: &Value) -> Option<String> {
    let raw = match value {
        Value::Color(raw) | Value::Keyword(raw) => raw.trim().to_ascii_lowercase(),
        _ => return None,
    };

    if let Some(hex) = raw.strip_prefix('#') {
        let valid = matches!(hex.len(), 3 | 4 | 6 | 8) && hex.chars().all(|c| c.is_ascii_hexdigit());
        return valid.then(|| format!("rgb(\"#{hex}\")"));
    }

    if let Some(args) = raw
        .strip_prefix("rgba(")
        .or_else(|| raw.strip_prefix("rgb("))
        .and_then(|rest| rest.strip_suffix(')'))
    {
        let channels: Vec<f32> = args
            .split(',')
            .filter_map(|c| c.trim().parse::<f32>().ok())
            .collect();
        return match channels.as_slice() {
            [r, g, b] | [r, g, b, _] => Some(format!(
                "rgb({}, {}, {})",
                channel(*r),
                channel(*g),
                channel(*b)
            )),
            _ => None,
        };
    }

    let hex = match raw.as_str() {
        "black" => "000000",
        "white" => "ffffff",
        "red" => "ff0000",
        "green" => "008000",
        "blue" => "0000ff",
        "gray" | "grey" => "808080",
        "silver" => "c0c0c0",
        "navy" => "000080",
        "maroon" => "800000",
        "orange" => "ffa500",
        "yellow" => "ffff00",
        "purple" => "800080",
        "teal" => "008080",
        _ => return None,
    };
    Some(format!("rgb(\"#{hex}\")"))
}

fn channel(value: f32) -> u8 {
    if value.is_finite() {
        value.round().clamp(0.0, 255.0) as u8
    } else {
        0
    }
}

/// Typst `leading` for a CSS line height: unitless values are multipliers,
/// larger ones are treated as point heights against the base font size.
fn leading_em(line_height: f32) -> f32 {
    let multiplier = if line_height > 4.0 {
        line_height / crate::style::BASE_FONT_SIZE
    } else {
        line_height
    };
    (multiplier - 1.0).max(0.0)
}

fn pt(value: f32) -> String {
    format!("{}pt", num(value))
}

fn num(value: f32) -> String {
    if !value.is_finite() {
        return "0".to_string();
    }
    let formatted = format!("{value:.2}");
    let trimmed = formatted.trim_end_matches('0').trim_end_matches('.');
    match trimmed {
        "" | "-" | "-0" => "0".to_string(),
        other => other.to_string(),
    }
}

fn string_literal(text: &str, out: &mut String) {
    out.push('"');
    for ch in text.chars() {
        match ch {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' | '\r' | '\t' => out.push(' '),
            _ => out.push(ch),
        }
    }
    out.push('"');
}

fn escape_text(text: &str, out: &mut String) {
    // Escape all ASCII punctuation so nothing in user text can start markup
    // (headings, lists, comments, code, references, ...).
    for ch in text.chars() {
        match ch {
            '\n' | '\r' => out.push(' '),
            c if c.is_ascii_punctuation() => {
                out.push('\\');
                out.push(c);
            }
            c => out.push(c),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{ConvertOptions, assemble};

    fn markup(html: &str) -> String {
        document_to_typst(&assemble(html, &ConvertOptions::default()))
    }

    fn body(html: &str) -> String {
        let full = markup(html);
        let start = full.find("\n\n").expect("preamble") + 2;
        full[start..].to_string()
    }

    #[test]
    fn preamble() {
        let full = markup("<title>Cert \"A\"</title><body></body>");
        assert!(full.starts_with("#set document(title: \"Cert \\\"A\\\"\")\n"));
        assert!(full.contains("#set page(width: 612pt, height: 792pt, margin: 20pt)\n"));
        assert!(full.contains("#set text(font: (\"Roboto\", "));
        assert!(full.contains("size: 12pt"));
        assert!(full.contains("#set par(leading: 0.6em, spacing: 0pt)\n"));
    }

    #[test]
    fn heading_and_paragraph() {
        assert_eq!(
            body("<body><h1>Report</h1><p>Hello</p></body>"),
            "#block(above: 15pt, below: 8pt)[#text(size: 24pt, weight: \"bold\")[Report]]\n\
             #block(below: 8pt)[Hello]\n"
        );
    }

    #[test]
    fn escapes_markup_characters() {
        assert_eq!(
            body("<body><p>1. #tag *x* // $5 [a]</p></body>"),
            "#block(below: 8pt)[1\\. \\#tag \\*x\\* \\/\\/ \\$5 \\[a\\]]\n"
        );
    }

    #[test]
    fn inline_emphasis() {
        assert_eq!(
            body("<body><p>Due <b>now</b></p></body>"),
            "#block(below: 8pt)[Due #text(weight: \"bold\")[now]]\n"
        );
    }

    #[test]
    fn punctuation_hugs_inline_siblings() {
        assert_eq!(
            body("<body><p><b>Jane</b>, welcome (<i>again</i>)</p></body>"),
            "#block(below: 8pt)[#text(weight: \"bold\")[Jane]\\, welcome \\(#text(style: \"italic\")[again]\\)]\n"
        );
        assert_eq!(
            body("<body><p>a<br>b</p></body>"),
            "#block(below: 8pt)[a#linebreak()b]\n"
        );
    }

    #[test]
    fn field_row_wraps_as_boxes() {
        assert_eq!(
            body(r#"<body><div class="field"><span>Name:</span><span>Jane</span></div></body>"#),
            "#block(above: 0pt, below: 4pt)[#box[Name\\:] #h(6pt) #box[Jane]]\n"
        );
    }

    #[test]
    fn header_row_is_justified_stack() {
        assert_eq!(
            body(r#"<body><div class="header-row"><div>A</div><div>B</div></div></body>"#),
            "#block()[#stack(dir: ltr, align(horizon)[#block()[A]], 1fr, align(horizon)[#block()[B]])]\n"
        );
    }

    #[test]
    fn list_markers() {
        assert_eq!(
            body("<body><ol><li>a</li><li>b</li></ol></body>"),
            "#block()[#pad(left: 20pt, right: 0pt)[#block()[#block[1\\. \na]\n#block[2\\. \nb]]]]\n"
        );
    }

    #[test]
    fn section_chrome() {
        assert_eq!(
            body(
                r#"<style>.section { border-bottom: 1px dashed #ccc; background: #f5f5f5; padding: 4px }</style>
                <body><div class="section"><p>x</p></div></body>"#
            ),
            "#block(above: 5pt, below: 5pt, fill: rgb(\"#f5f5f5\"), \
             stroke: (bottom: (paint: rgb(\"#ccc\"), thickness: 1pt, dash: \"dashed\")), \
             inset: (top: 4pt, right: 4pt, bottom: 4pt, left: 4pt))[#block(below: 8pt)[x]]\n"
        );
    }

    #[test]
    fn invalid_image_is_skipped() {
        assert_eq!(body(r#"<body><img src="data:image/png;base64,AAAA"></body>"#), "\n");
    }

    #[test]
    fn colors() {
        assert_eq!(color(&Value::Color("#ABC".into())), Some("rgb(\"#abc\")".into()));
        assert_eq!(color(&Value::Color("#12".into())), None);
        assert_eq!(color(&Value::Color("rgba(10, 20, 300, 0.5)".into())), Some("rgb(10, 20, 255)".into()));
        assert_eq!(color(&Value::Color("grey".into())), Some("rgb(\"#808080\")".into()));
        assert_eq!(color(&Value::Color("transparent".into())), None);
    }

    #[test]
    fn numbers() {
        assert_eq!(num(612.0), "612");
        assert_eq!(num(10.5), "10.5");
        assert_eq!(num(100.0), "100");
        assert_eq!(num(-0.001), "0");
        assert_eq!(num(f32::NAN), "0");
        assert!((leading_em(1.6) - 0.6).abs() < 1e-6);
        assert!((leading_em(18.0) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn image_box_fits() {
        let image = Image {
            mime: "image/png".into(),
            data: Vec::new(),
            max_width: 200.0,
            max_height: 80.0,
            width: None,
            height: None,
            style: Style::new(),
        };
        assert_eq!(image_box(&image, 400.0, 100.0), (200.0, 50.0));
        assert_eq!(image_box(&image, 100.0, 100.0), (80.0, 80.0));
        let sized = Image { width: Some(50.0), ..image };
        assert_eq!(image_box(&sized, 100.0, 200.0), (50.0, 100.0));
    }
}
