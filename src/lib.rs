mod config;
mod convert;
mod document;
mod error;
mod font;
mod node;
pub mod store;
pub mod style;
mod typst;

pub use config::{Config, FontConfig, PageConfig};
pub use convert::Converter;
pub use document::{ConvertOptions, Document, PageFormat, PageSetup};
pub use error::{Error, Result};
pub use font::{CanonicalFont, normalize_font_family};
pub use node::{Image, LayoutNode, List, ListItem, TextRun};

use log::warn;
use typst_as_lib::TypstEngine;
use typst_as_lib::typst_kit_options::TypstKitFontOptions;
use typst_library::layout::PagedDocument;
use typst_pdf::PdfOptions;

/// Parse HTML into a laid-out document. Never fails.
pub fn html_to_document(html: &str, options: &ConvertOptions) -> Document {
    document::assemble(html, options)
}

/// Convert HTML to Typst markup.
pub fn html_to_typst(html: &str, options: &ConvertOptions) -> String {
    typst::document_to_typst(&html_to_document(html, options))
}

/// Convert HTML to PDF bytes using default config.
pub fn html_to_pdf(html: &str, options: &ConvertOptions) -> Result<Vec<u8>> {
    document_to_pdf(
        &html_to_document(html, options),
        &Config::compiled_default().fonts,
    )
}

/// Convert HTML to PDF bytes with custom config.
pub fn html_to_pdf_with_config(html: &str, config: &Config) -> Result<Vec<u8>> {
    let options = config.options()?;
    document_to_pdf(&html_to_document(html, &options), &config.fonts)
}

/// Convert an assembled document to Typst markup.
pub fn document_to_typst(doc: &Document) -> String {
    typst::document_to_typst(doc)
}

/// Serialize an assembled document to PDF bytes.
pub fn document_to_pdf(doc: &Document, fonts: &FontConfig) -> Result<Vec<u8>> {
    let compiled = compile_document(doc, fonts)?;

    typst_pdf::pdf(&compiled, &PdfOptions::default())
        .map_err(|e| Error::Serialize(format!("{:?}", e)))
}

/// Lay out a document with the Typst engine.
fn compile_document(doc: &Document, fonts: &FontConfig) -> Result<PagedDocument> {
    let typst_content = typst::document_to_typst(doc);

    let font_options = TypstKitFontOptions::new()
        .include_embedded_fonts(true)
        .include_system_fonts(fonts.system);

    let engine = TypstEngine::builder()
        .main_file(typst_content)
        .search_fonts_with(font_options)
        .build();

    let compiled = engine.compile();
    for warning in compiled.warnings.iter() {
        // Missing preferred font families are expected without system fonts.
        if !warning.message.contains("unknown font family") {
            warn!("typst: {}", warning.message);
        }
    }

    compiled
        .output
        .map_err(|e| Error::Layout(format!("{:?}", e)))
}
