/// One of the fixed output fonts every CSS `font-family` collapses to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum CanonicalFont {
    Helvetica,
    Times,
    Courier,
    /// Default sans-serif face, used when nothing in the declaration matches.
    #[default]
    Roboto,
}

impl CanonicalFont {
    pub const ALL: [CanonicalFont; 4] = [
        CanonicalFont::Helvetica,
        CanonicalFont::Times,
        CanonicalFont::Courier,
        CanonicalFont::Roboto,
    ];

    pub fn name(self) -> &'static str {
        match self {
            CanonicalFont::Helvetica => "Helvetica",
            CanonicalFont::Times => "Times",
            CanonicalFont::Courier => "Courier",
            CanonicalFont::Roboto => "Roboto",
        }
    }

    /// Typst family fallback list, ending in a face bundled with the engine
    /// so text always renders without system fonts.
    pub fn typst_families(self) -> &'static [&'static str] {
        match self {
            CanonicalFont::Helvetica => &["Helvetica", "Arial", "Liberation Sans", "DejaVu Sans", "Libertinus Serif"],
            CanonicalFont::Times => &["Times New Roman", "Times", "Liberation Serif", "Libertinus Serif"],
            CanonicalFont::Courier => &["Courier New", "Courier", "Liberation Mono", "DejaVu Sans Mono"],
            CanonicalFont::Roboto => &["Roboto", "Helvetica", "Arial", "DejaVu Sans", "Libertinus Serif"],
        }
    }
}

/// Map a raw CSS `font-family` value to its canonical output font.
///
/// Only the first family in the list is considered. Substring checks run in
/// priority order, so `"Times New Roman, serif"` is `Times` while
/// `"sans-serif"` is `Helvetica` (it contains "serif" too, but the sans
/// check comes first).
pub fn normalize_font_family(raw: &str) -> CanonicalFont {
    let first = raw
        .split(',')
        .next()
        .unwrap_or("")
        .trim()
        .trim_matches(|c| c == '"' || c == '\'')
        .to_ascii_lowercase();

    if ["arial", "sans-serif", "helvetica"]
        .iter()
        .any(|needle| first.contains(needle))
    {
        CanonicalFont::Helvetica
    } else if first.contains("times") || first.contains("serif") {
        CanonicalFont::Times
    } else if first.contains("courier") || first.contains("monospace") {
        CanonicalFont::Courier
    } else {
        CanonicalFont::Roboto
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sans_serif_names() {
        assert_eq!(normalize_font_family("Arial, sans-serif"), CanonicalFont::Helvetica);
        assert_eq!(normalize_font_family("sans-serif"), CanonicalFont::Helvetica);
        assert_eq!(normalize_font_family("  HELVETICA Neue "), CanonicalFont::Helvetica);
    }

    #[test]
    fn serif_names() {
        assert_eq!(normalize_font_family("'Times New Roman', Times, serif"), CanonicalFont::Times);
        assert_eq!(normalize_font_family("Georgia serif"), CanonicalFont::Times);
    }

    #[test]
    fn monospace_names() {
        assert_eq!(normalize_font_family("\"Courier New\", monospace"), CanonicalFont::Courier);
        assert_eq!(normalize_font_family("monospace"), CanonicalFont::Courier);
    }

    #[test]
    fn only_first_family_counts() {
        assert_eq!(normalize_font_family("Georgia, Arial"), CanonicalFont::Roboto);
    }

    #[test]
    fn always_canonical() {
        for raw in ["", "   ", ",", "Comic Sans MS", "🦀", "inherit"] {
            let font = normalize_font_family(raw);
            assert!(CanonicalFont::ALL.contains(&font), "{raw:?} -> {font:?}");
        }
        assert_eq!(normalize_font_family(""), CanonicalFont::Roboto);
    }
}
