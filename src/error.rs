//! Error types for document generation.
//!
//! Everything up to the layout tree degrades instead of failing, so the
//! variants here only cover the final compile/export step and the file and
//! configuration plumbing around it.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Typst compilation failed: {0}")]
    Layout(String),

    #[error("PDF generation failed: {0}")]
    Serialize(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid configuration: {0}")]
    Config(#[from] toml::de::Error),

    #[error("unknown page format: {0}")]
    UnknownPageFormat(String),
}

pub type Result<T> = std::result::Result<T, Error>;
