//! Report fonts and text metrics
//!
//! A configured TrueType font is embedded and keeps any script it has
//! glyphs for. Without one the built-in Helvetica pair is used, which only
//! covers WinAnsi; other characters are replaced with `?`.

use super::RenderError;
use std::borrow::Cow;
use std::path::Path;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Font {
    Regular,
    Bold,
}

/// Helvetica advance widths for ASCII 32..=126, in 1/1000 em
const HELVETICA_WIDTHS: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278, // ' '..'/'
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 278, 278, 584, 584, 584, 556, // '0'..'?'
    1015, 667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, 722, 778, // '@'..'O'
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 278, 278, 278, 469, 556, // 'P'..'_'
    333, 556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, 556, 556, // '`'..'o'
    556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, 334, 260, 334, 584, // 'p'..'~'
];

/// Parsed-once TrueType data
#[derive(Clone)]
pub struct EmbeddedFont {
    data: Arc<Vec<u8>>,
    units_per_em: f64,
}

impl std::fmt::Debug for EmbeddedFont {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmbeddedFont")
            .field("bytes", &self.data.len())
            .field("units_per_em", &self.units_per_em)
            .finish()
    }
}

impl EmbeddedFont {
    pub fn from_bytes(data: Vec<u8>) -> Result<Self, RenderError> {
        let face = ttf_parser::Face::parse(&data, 0)
            .map_err(|e| RenderError::Font(format!("unreadable TrueType data: {e}")))?;
        let units_per_em = f64::from(face.units_per_em());
        Ok(Self {
            data: Arc::new(data),
            units_per_em,
        })
    }

    pub fn load(path: &Path) -> Result<Self, RenderError> {
        let data = std::fs::read(path)
            .map_err(|e| RenderError::Font(format!("{}: {e}", path.display())))?;
        Self::from_bytes(data)
    }

    pub fn bytes(&self) -> &[u8] {
        &self.data
    }

    fn text_width(&self, text: &str, size: f64) -> f64 {
        // Validated in from_bytes
        let Ok(face) = ttf_parser::Face::parse(&self.data, 0) else {
            return 0.0;
        };
        let fallback = self.units_per_em / 2.0;
        let units: f64 = text
            .chars()
            .map(|c| {
                face.glyph_index(c)
                    .and_then(|id| face.glyph_hor_advance(id))
                    .map(f64::from)
                    .unwrap_or(fallback)
            })
            .sum();
        units * size / self.units_per_em
    }
}

#[derive(Debug, Clone)]
pub enum FontFace {
    Helvetica { bold: bool },
    Embedded(EmbeddedFont),
}

impl FontFace {
    pub fn is_embedded(&self) -> bool {
        matches!(self, FontFace::Embedded(_))
    }

    /// Rendered width of `text` in points
    pub fn text_width(&self, text: &str, size: f64) -> f64 {
        match self {
            FontFace::Helvetica { bold } => {
                let units: u32 = text
                    .chars()
                    .map(|c| match c {
                        ' '..='~' => u32::from(HELVETICA_WIDTHS[c as usize - 32]),
                        _ => 556,
                    })
                    .sum();
                // Bold glyphs run about 5% wider
                let scale = if *bold { 1.05 } else { 1.0 };
                f64::from(units) * size / 1000.0 * scale
            }
            FontFace::Embedded(font) => font.text_width(text, size),
        }
    }

    /// Text as it will be drawn with this face
    pub fn prepare<'a>(&self, text: &'a str) -> Cow<'a, str> {
        match self {
            FontFace::Embedded(_) => Cow::Borrowed(text),
            FontFace::Helvetica { .. } if text.chars().all(in_win_ansi) => Cow::Borrowed(text),
            FontFace::Helvetica { .. } => Cow::Owned(
                text.chars()
                    .map(|c| if in_win_ansi(c) { c } else { '?' })
                    .collect(),
            ),
        }
    }
}

/// Characters the standard fonts can show under WinAnsiEncoding
fn in_win_ansi(c: char) -> bool {
    matches!(
        c,
        ' '..='~'
            | '\u{A0}'..='\u{FF}'
            | '\u{2013}'
            | '\u{2014}'
            | '\u{2018}'
            | '\u{2019}'
            | '\u{201C}'
            | '\u{201D}'
            | '\u{2022}'
            | '\u{2026}'
            | '\u{20AC}'
    )
}

/// Regular and bold faces used by one report
#[derive(Debug, Clone)]
pub struct ReportFonts {
    regular: FontFace,
    bold: FontFace,
}

impl Default for ReportFonts {
    fn default() -> Self {
        Self::helvetica()
    }
}

impl ReportFonts {
    pub fn helvetica() -> Self {
        Self {
            regular: FontFace::Helvetica { bold: false },
            bold: FontFace::Helvetica { bold: true },
        }
    }

    /// Embed `regular`, and `bold` when given. Without a bold file the
    /// regular face is used for headings too.
    pub fn from_files(regular: &Path, bold: Option<&Path>) -> Result<Self, RenderError> {
        let regular = EmbeddedFont::load(regular)?;
        let bold = match bold {
            Some(path) => EmbeddedFont::load(path)?,
            None => regular.clone(),
        };
        Ok(Self {
            regular: FontFace::Embedded(regular),
            bold: FontFace::Embedded(bold),
        })
    }

    pub fn face(&self, font: Font) -> &FontFace {
        match font {
            Font::Regular => &self.regular,
            Font::Bold => &self.bold,
        }
    }

    pub fn is_embedded(&self) -> bool {
        self.regular.is_embedded()
    }

    pub fn text_width(&self, text: &str, font: Font, size: f64) -> f64 {
        self.face(font).text_width(text, size)
    }
}
