//! Paginated monospace documents.
//!
//! A [`Document`] is a title plus a list of paragraphs held as inline markup:
//! plain text where `&nbsp;` and the five XML entities stand for the
//! characters they name. Markup is decoded before layout, layout places every
//! line on A4 pages in points, and [`Document::to_pdf`] draws the result with
//! the builtin PDF fonts.
use std::io::BufWriter;

use printpdf::{lopdf, BuiltinFont, Mm, OffsetDateTime, PdfDocument};
use thiserror::Error;

pub const PAGE_WIDTH_PT: f32 = 595.28;
pub const PAGE_HEIGHT_PT: f32 = 841.89;
pub const MARGIN_PT: f32 = 72.0;

/// Advance width of every glyph of a monospace font, relative to its size.
const MONOSPACE_ADVANCE: f32 = 0.6;

#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("pdf error: {0}")]
    Pdf(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FontFace {
    Courier,
    HelveticaBold,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextStyle {
    pub font: FontFace,
    pub size: f32,
    pub leading: f32,
    pub space_before: f32,
    pub space_after: f32,
    pub wrap: bool,
}

impl TextStyle {
    /// Banner style used for document titles.
    pub const TITLE: TextStyle = TextStyle {
        font: FontFace::HelveticaBold,
        size: 18.0,
        leading: 22.0,
        space_before: 0.0,
        space_after: 6.0,
        wrap: true,
    };

    /// Fixed-size monospace body text; long lines run past the margin.
    pub const MONOSPACE: TextStyle = TextStyle {
        font: FontFace::Courier,
        size: 10.0,
        leading: 14.0,
        space_before: 6.0,
        space_after: 6.0,
        wrap: false,
    };

    pub const fn wrapped(self) -> TextStyle {
        TextStyle { wrap: true, ..self }
    }

    /// Number of glyphs that fit between the margins.
    pub fn columns(&self) -> usize {
        let usable = PAGE_WIDTH_PT - 2.0 * MARGIN_PT;
        (usable / (self.size * MONOSPACE_ADVANCE)).floor() as usize
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlacedLine {
    pub text: String,
    pub font: FontFace,
    pub size: f32,
    pub x: f32,
    pub baseline: f32,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageLayout {
    pub lines: Vec<PlacedLine>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub title: String,
    pub body_style: TextStyle,
    pub paragraphs: Vec<String>,
}

impl Document {
    pub fn new(title: impl Into<String>, body_style: TextStyle) -> Self {
        Self {
            title: title.into(),
            body_style,
            paragraphs: Vec::new(),
        }
    }

    pub fn push(&mut self, paragraph: impl Into<String>) {
        self.paragraphs.push(paragraph.into());
    }

    /// Display text of every paragraph, markup decoded.
    pub fn plain_paragraphs(&self) -> Vec<String> {
        self.paragraphs.iter().map(|p| decode_markup(p)).collect()
    }

    pub fn layout(&self) -> Vec<PageLayout> {
        let mut cursor = LayoutCursor::new();
        cursor.place(&decode_markup(&self.title), &TextStyle::TITLE);
        for paragraph in &self.paragraphs {
            cursor.place(&decode_markup(paragraph), &self.body_style);
        }
        cursor.finish()
    }

    pub fn to_pdf(&self) -> Result<Vec<u8>, DocumentError> {
        let pages = self.layout();
        let width = Mm(pt_to_mm(PAGE_WIDTH_PT));
        let height = Mm(pt_to_mm(PAGE_HEIGHT_PT));

        let (doc, first_page, first_layer) =
            PdfDocument::new(decode_markup(&self.title), width, height, "Layer 1");
        let doc = doc
            .with_document_id(String::new())
            .with_creation_date(OffsetDateTime::UNIX_EPOCH)
            .with_mod_date(OffsetDateTime::UNIX_EPOCH)
            .with_metadata_date(OffsetDateTime::UNIX_EPOCH);
        let courier = doc.add_builtin_font(BuiltinFont::Courier).map_err(pdf_error)?;
        let bold = doc
            .add_builtin_font(BuiltinFont::HelveticaBold)
            .map_err(pdf_error)?;

        let mut targets = vec![(first_page, first_layer)];
        for _ in 1..pages.len() {
            targets.push(doc.add_page(width, height, "Layer 1"));
        }

        for ((page_index, layer_index), page) in targets.into_iter().zip(&pages) {
            let layer = doc.get_page(page_index).get_layer(layer_index);
            for line in page.lines.iter().filter(|line| !line.text.is_empty()) {
                let font = match line.font {
                    FontFace::Courier => &courier,
                    FontFace::HelveticaBold => &bold,
                };
                layer.use_text(
                    line.text.as_str(),
                    line.size,
                    Mm(pt_to_mm(line.x)),
                    Mm(pt_to_mm(line.baseline)),
                    font,
                );
            }
        }

        let mut buf = BufWriter::new(Vec::new());
        doc.save(&mut buf).map_err(pdf_error)?;
        let bytes = buf
            .into_inner()
            .map_err(|err| DocumentError::Pdf(err.to_string()))?;
        without_trailer_id(&bytes)
    }
}

/// printpdf stamps every save with a fresh trailer `/ID`; dropping it makes
/// the output a function of the document alone.
fn without_trailer_id(bytes: &[u8]) -> Result<Vec<u8>, DocumentError> {
    let mut pdf = lopdf::Document::load_mem(bytes).map_err(pdf_error)?;
    pdf.trailer.remove(b"ID");
    let mut out = Vec::new();
    pdf.save_to(&mut out).map_err(pdf_error)?;
    Ok(out)
}

struct LayoutCursor {
    pages: Vec<PageLayout>,
    y: f32,
    at_page_top: bool,
    pending_space: f32,
}

impl LayoutCursor {
    fn new() -> Self {
        Self {
            pages: vec![PageLayout::default()],
            y: PAGE_HEIGHT_PT - MARGIN_PT,
            at_page_top: true,
            pending_space: 0.0,
        }
    }

    fn place(&mut self, text: &str, style: &TextStyle) {
        if !self.at_page_top {
            self.y -= self.pending_space + style.space_before;
        }

        let lines = if style.wrap {
            wrap_line(text, style.columns())
        } else {
            vec![text.to_string()]
        };
        for line in lines {
            if self.y - style.leading < MARGIN_PT && !self.at_page_top {
                self.new_page();
            }
            self.y -= style.leading;
            let baseline = self.y + style.leading - style.size;
            if let Some(page) = self.pages.last_mut() {
                page.lines.push(PlacedLine {
                    text: line,
                    font: style.font,
                    size: style.size,
                    x: MARGIN_PT,
                    baseline,
                });
            }
            self.at_page_top = false;
        }
        self.pending_space = style.space_after;
    }

    fn new_page(&mut self) {
        self.pages.push(PageLayout::default());
        self.y = PAGE_HEIGHT_PT - MARGIN_PT;
        self.at_page_top = true;
    }

    fn finish(self) -> Vec<PageLayout> {
        self.pages
    }
}

/// Escape the characters that carry meaning in paragraph markup.
pub fn escape_markup(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#x27;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Escape `line` and turn its leading spaces into `&nbsp;` so indentation
/// survives rendering.
pub fn indent_preserving(line: &str) -> String {
    let body = line.trim_start_matches(' ');
    let indent = line.len() - body.len();
    format!("{}{}", "&nbsp;".repeat(indent), escape_markup(body))
}

/// Decode paragraph markup into display text. Unknown entities and stray
/// ampersands are kept literally.
pub fn decode_markup(markup: &str) -> String {
    let mut out = String::with_capacity(markup.len());
    let mut rest = markup;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let tail = &rest[amp..];
        match tail.find(';').and_then(|end| entity(&tail[1..end]).map(|c| (c, end))) {
            Some((c, end)) => {
                out.push(c);
                rest = &tail[end + 1..];
            }
            None => {
                out.push('&');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

fn entity(name: &str) -> Option<char> {
    match name {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        "nbsp" => Some('\u{a0}'),
        _ => {
            let code = if let Some(hex) = name.strip_prefix("#x").or_else(|| name.strip_prefix("#X")) {
                u32::from_str_radix(hex, 16).ok()?
            } else {
                name.strip_prefix('#')?.parse::<u32>().ok()?
            };
            char::from_u32(code)
        }
    }
}

/// Break `text` into lines of at most `columns` characters, preferring the
/// last space that fits and hard-splitting runs without one.
pub fn wrap_line(text: &str, columns: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    if columns == 0 || chars.len() <= columns {
        return vec![text.to_string()];
    }

    let mut lines = Vec::new();
    let mut start = 0;
    while chars.len() - start > columns {
        let limit = start + columns;
        match (start + 1..=limit).rev().find(|&i| chars[i] == ' ') {
            Some(space) => {
                lines.push(chars[start..space].iter().collect());
                start = space + 1;
            }
            None => {
                lines.push(chars[start..limit].iter().collect());
                start = limit;
            }
        }
    }
    lines.push(chars[start..].iter().collect());
    lines
}

fn pt_to_mm(pt: f32) -> f32 {
    pt * 25.4 / 72.0
}

fn pdf_error(err: impl std::fmt::Display) -> DocumentError {
    DocumentError::Pdf(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn markup_round_trips_reserved_characters() {
        let raw = r#"<a href="x">Tom & 'Jerry'</a>"#;
        assert_eq!(decode_markup(&escape_markup(raw)), raw);
    }

    #[test]
    fn decode_keeps_stray_ampersands() {
        assert_eq!(decode_markup("a & b &unknown; &amp;"), "a & b &unknown; &");
        assert_eq!(decode_markup("&#65;&#x42;"), "AB");
    }

    #[test]
    fn leading_spaces_become_non_breaking() {
        let markup = indent_preserving("    \"key\": 1");
        assert_eq!(markup, "&nbsp;&nbsp;&nbsp;&nbsp;&quot;key&quot;: 1");
        assert_eq!(decode_markup(&markup), "\u{a0}\u{a0}\u{a0}\u{a0}\"key\": 1");
    }

    #[test]
    fn wrap_prefers_spaces_and_splits_long_words() {
        assert_eq!(wrap_line("aaa bbb ccc", 7), vec!["aaa bbb", "ccc"]);
        assert_eq!(wrap_line("abcdefghij", 4), vec!["abcd", "efgh", "ij"]);
        assert_eq!(wrap_line("short", 75), vec!["short"]);
    }

    #[test]
    fn monospace_body_has_75_columns() {
        assert_eq!(TextStyle::MONOSPACE.columns(), 75);
    }

    #[test]
    fn layout_starts_new_pages_within_margins() {
        let mut doc = Document::new("report.json", TextStyle::MONOSPACE);
        for i in 0..200 {
            doc.push(format!("line {i}"));
        }

        let pages = doc.layout();

        assert!(pages.len() > 1);
        let placed: usize = pages.iter().map(|p| p.lines.len()).sum();
        assert_eq!(placed, 201);
        for line in pages.iter().flat_map(|p| p.lines.iter()) {
            assert!(line.baseline >= MARGIN_PT - TextStyle::MONOSPACE.leading);
            assert!(line.baseline <= PAGE_HEIGHT_PT - MARGIN_PT);
        }
        assert_eq!(pages[0].lines[0].font, FontFace::HelveticaBold);
        assert_eq!(pages[0].lines[0].text, "report.json");
    }

    #[test]
    fn wrapped_style_splits_long_paragraphs() {
        let mut doc = Document::new("t.xml", TextStyle::MONOSPACE.wrapped());
        doc.push("x".repeat(160));

        let lines: Vec<_> = doc.layout().remove(0).lines;

        assert_eq!(lines.len(), 1 + 3);
        assert_eq!(lines[1].text.len(), 75);
        assert_eq!(lines[3].text.len(), 10);
    }

    #[test]
    fn pdf_output_has_pdf_header() {
        let mut doc = Document::new("t.json", TextStyle::MONOSPACE);
        doc.push("{");
        doc.push("}");
        let bytes = doc.to_pdf().unwrap();
        assert!(bytes.starts_with(b"%PDF"));
    }

    #[test]
    fn same_document_gives_same_bytes() {
        let mut doc = Document::new("t.json", TextStyle::MONOSPACE);
        for i in 0..80 {
            doc.push(format!("line {i}"));
        }

        let first = doc.to_pdf().unwrap();
        std::thread::sleep(std::time::Duration::from_millis(1100));
        let second = doc.to_pdf().unwrap();

        assert_eq!(first, second);
    }
}
