use log::warn;
use serde::Deserialize;
use std::fs;
use std::path::Path;

use crate::document::ConvertOptions;
use crate::error::Result;

static DEFAULT_CONFIG: &str = include_str!("default_config.toml");

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub page: PageConfig,
    pub fonts: FontConfig,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct PageConfig {
    /// Page size identifier, e.g. `LETTER` or `A4`.
    pub format: String,
}

impl Default for PageConfig {
    fn default() -> Self {
        Self {
            format: "LETTER".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct FontConfig {
    /// Also search fonts installed on the machine. Output then depends on the
    /// host, so it is off by default.
    pub system: bool,
}

impl Config {
    /// The configuration compiled into the binary (validated by `build.rs`).
    pub fn compiled_default() -> Self {
        toml::from_str(DEFAULT_CONFIG).unwrap_or_default()
    }

    /// Load config from a TOML file, or return defaults if it is missing or
    /// invalid.
    pub fn load(path: &Path) -> Self {
        match fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).unwrap_or_else(|e| {
                warn!("ignoring invalid config {}: {}", path.display(), e);
                Self::compiled_default()
            }),
            Err(_) => Self::compiled_default(),
        }
    }

    /// Load config from a TOML file, reporting missing files and syntax errors.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Conversion options described by this config.
    pub fn options(&self) -> Result<ConvertOptions> {
        Ok(ConvertOptions {
            format: self.page.format.parse()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::PageFormat;

    #[test]
    fn compiled_default_is_letter() {
        let config = Config::compiled_default();
        assert_eq!(config.page.format, "LETTER");
        assert!(!config.fonts.system);
        assert_eq!(config.options().ok().map(|o| o.format), Some(PageFormat::Letter));
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let config: Config = toml::from_str("[fonts]\nsystem = true\n").expect("valid toml");
        assert!(config.fonts.system);
        assert_eq!(config.page.format, "LETTER");
    }

    #[test]
    fn unknown_format_is_an_error() {
        let config: Config = toml::from_str("[page]\nformat = \"B7\"\n").expect("valid toml");
        assert!(config.options().is_err());
    }

    #[test]
    fn load_reads_file_and_tolerates_garbage() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("htmlpdf.toml");

        fs::write(&path, "[page]\nformat = \"A4\"\n").expect("write");
        assert_eq!(Config::load(&path).page.format, "A4");

        fs::write(&path, "[page\nformat = ").expect("write");
        assert_eq!(Config::load(&path).page.format, "LETTER");
    }

    #[test]
    fn load_missing_file_defaults() {
        let config = Config::load(Path::new("/nonexistent/htmlpdf.toml"));
        assert_eq!(config.page.format, "LETTER");
    }
}
