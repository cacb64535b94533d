use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use artifact_core::document_path;
use artifact_logging::{artifact_debug, artifact_error};
use quick_xml::events::{BytesStart, Event};
use quick_xml::{Reader, Writer};
use serde::Serialize;
use serde_json::ser::{Formatter, PrettyFormatter};
use thiserror::Error;

use crate::document::{escape_markup, indent_preserving, Document, DocumentError, TextStyle};
use crate::persist::{AtomicFileWriter, PersistError};

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("xml error: {0}")]
    Xml(String),
    #[error(transparent)]
    Document(#[from] DocumentError),
    #[error("persist error: {0}")]
    Persist(#[from] PersistError),
    #[error("source has no file name: {0}")]
    NoFileName(PathBuf),
}

/// Structured formats the renderer understands, by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Json,
    Xml,
}

impl SourceKind {
    pub fn detect(path: &Path) -> Option<Self> {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Some(SourceKind::Json),
            Some("xml") => Some(SourceKind::Xml),
            _ => None,
        }
    }
}

/// Render a JSON file into a PDF next to it. Errors propagate to the caller.
pub fn render_json(path: &Path) -> Result<PathBuf, RenderError> {
    let content = fs::read_to_string(path)?;
    let value: serde_json::Value = serde_json::from_str(&content)?;
    let document = json_document(&file_name(path)?, &value)?;
    write_document(path, &document)
}

/// Render an XML file into a PDF next to it.
///
/// Failures are logged and the file is skipped; no document is written.
pub fn render_xml(path: &Path) -> Option<PathBuf> {
    match try_render_xml(path) {
        Ok(target) => Some(target),
        Err(RenderError::Xml(message)) => {
            artifact_error!("XML parsing error in {:?}: {}", path, message);
            None
        }
        Err(err) => {
            artifact_error!("Failed to convert XML {:?} to PDF: {}", path, err);
            None
        }
    }
}

fn try_render_xml(path: &Path) -> Result<PathBuf, RenderError> {
    let content = fs::read_to_string(path)?;
    let canonical = canonicalize_xml(&content)?;
    let document = xml_document(&file_name(path)?, &canonical);
    write_document(path, &document)
}

/// One paragraph per line of the 2-space pretty-printed value; indentation is
/// carried as non-breaking spaces.
pub fn json_document(title: &str, value: &serde_json::Value) -> Result<Document, RenderError> {
    let pretty = to_ascii_pretty(value)?;
    let mut document = Document::new(escape_markup(title), TextStyle::MONOSPACE);
    for line in pretty.split('\n') {
        document.push(indent_preserving(line));
    }
    Ok(document)
}

/// Two-space pretty JSON with every non-ASCII character written as a
/// `\uXXXX` escape, so the text only needs the builtin font's ASCII range.
pub fn to_ascii_pretty(value: &serde_json::Value) -> Result<String, RenderError> {
    let mut out = Vec::new();
    let mut serializer =
        serde_json::Serializer::with_formatter(&mut out, AsciiFormatter(PrettyFormatter::new()));
    value.serialize(&mut serializer)?;
    String::from_utf8(out)
        .map_err(|err| RenderError::Io(io::Error::new(io::ErrorKind::InvalidData, err)))
}

struct AsciiFormatter<'a>(PrettyFormatter<'a>);

impl Formatter for AsciiFormatter<'_> {
    fn write_string_fragment<W: ?Sized + io::Write>(
        &mut self,
        writer: &mut W,
        fragment: &str,
    ) -> io::Result<()> {
        let mut start = 0;
        for (index, c) in fragment.char_indices() {
            if c.is_ascii() {
                continue;
            }
            writer.write_all(fragment[start..index].as_bytes())?;
            let mut units = [0u16; 2];
            for unit in c.encode_utf16(&mut units) {
                writer.write_all(format!("\\u{unit:04x}").as_bytes())?;
            }
            start = index + c.len_utf8();
        }
        writer.write_all(fragment[start..].as_bytes())
    }

    fn begin_array<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.0.begin_array(writer)
    }

    fn end_array<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.0.end_array(writer)
    }

    fn begin_array_value<W: ?Sized + io::Write>(
        &mut self,
        writer: &mut W,
        first: bool,
    ) -> io::Result<()> {
        self.0.begin_array_value(writer, first)
    }

    fn end_array_value<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.0.end_array_value(writer)
    }

    fn begin_object<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.0.begin_object(writer)
    }

    fn end_object<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.0.end_object(writer)
    }

    fn begin_object_key<W: ?Sized + io::Write>(
        &mut self,
        writer: &mut W,
        first: bool,
    ) -> io::Result<()> {
        self.0.begin_object_key(writer, first)
    }

    fn begin_object_value<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.0.begin_object_value(writer)
    }

    fn end_object_value<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.0.end_object_value(writer)
    }
}

/// One escaped paragraph per line of the canonical XML text, with wrapping.
pub fn xml_document(title: &str, canonical: &str) -> Document {
    let mut document = Document::new(escape_markup(title), TextStyle::MONOSPACE.wrapped());
    for line in canonical.split('\n') {
        document.push(escape_markup(line));
    }
    document
}

/// Parse `source` and serialize its root element back out.
///
/// The XML declaration, doctype, comments and processing instructions are
/// dropped; whitespace inside the root element is kept as written.
pub fn canonicalize_xml(source: &str) -> Result<String, RenderError> {
    let mut reader = Reader::from_str(source);
    let mut writer = Writer::new(Vec::new());
    let mut open: Vec<Vec<u8>> = Vec::new();
    let mut seen_root = false;

    loop {
        let event = reader
            .read_event()
            .map_err(|err| xml_error(&reader, err))?;
        match event {
            Event::Eof => break,
            Event::Decl(_) | Event::DocType(_) | Event::Comment(_) | Event::PI(_) => {}
            Event::Start(start) => {
                if open.is_empty() && seen_root {
                    return Err(RenderError::Xml("multiple root elements".into()));
                }
                seen_root = true;
                check_element(&start)?;
                open.push(start.name().as_ref().to_vec());
                write(&mut writer, Event::Start(start))?;
            }
            Event::End(end) => {
                let expected = open.pop();
                if expected.as_deref() != Some(end.name().as_ref()) {
                    return Err(RenderError::Xml(format!(
                        "unexpected closing tag </{}> at byte {}",
                        String::from_utf8_lossy(end.name().as_ref()),
                        reader.buffer_position()
                    )));
                }
                write(&mut writer, Event::End(end))?;
            }
            Event::Empty(empty) => {
                if open.is_empty() && seen_root {
                    return Err(RenderError::Xml("multiple root elements".into()));
                }
                seen_root = true;
                check_element(&empty)?;
                write(&mut writer, Event::Empty(empty))?;
            }
            Event::Text(text) => {
                if open.is_empty() {
                    if !text.iter().all(u8::is_ascii_whitespace) {
                        return Err(RenderError::Xml("text outside the root element".into()));
                    }
                } else {
                    text.unescape()
                        .map_err(|err| xml_error(&reader, err))?;
                    write(&mut writer, Event::Text(text))?;
                }
            }
            Event::CData(data) => {
                if open.is_empty() {
                    return Err(RenderError::Xml("CDATA outside the root element".into()));
                }
                write(&mut writer, Event::CData(data))?;
            }
        }
    }

    if let Some(unclosed) = open.last() {
        return Err(RenderError::Xml(format!(
            "unclosed element <{}>",
            String::from_utf8_lossy(unclosed)
        )));
    }
    if !seen_root {
        return Err(RenderError::Xml("no root element".into()));
    }

    String::from_utf8(writer.into_inner()).map_err(|err| RenderError::Xml(err.to_string()))
}

/// Element and attribute names must be XML names, attributes must be unique
/// and quoted, and their values must only use known entities.
fn check_element(start: &BytesStart<'_>) -> Result<(), RenderError> {
    check_name(start.name().as_ref())?;
    let mut attributes = start.attributes();
    attributes.with_checks(true);
    for attribute in attributes {
        let attribute = attribute.map_err(|err| RenderError::Xml(err.to_string()))?;
        check_name(attribute.key.as_ref())?;
        attribute
            .unescape_value()
            .map_err(|err| RenderError::Xml(err.to_string()))?;
    }
    Ok(())
}

fn check_name(name: &[u8]) -> Result<(), RenderError> {
    let valid = std::str::from_utf8(name)
        .ok()
        .and_then(|name| {
            let mut chars = name.chars();
            let first = chars.next()?;
            Some(is_name_start(first) && chars.all(is_name_char))
        })
        .unwrap_or(false);
    if valid {
        Ok(())
    } else {
        Err(RenderError::Xml(format!(
            "invalid name {:?}",
            String::from_utf8_lossy(name)
        )))
    }
}

fn is_name_start(c: char) -> bool {
    c.is_alphabetic() || c == '_' || c == ':'
}

fn is_name_char(c: char) -> bool {
    is_name_start(c) || c.is_numeric() || matches!(c, '-' | '.' | '\u{b7}')
}

fn write(writer: &mut Writer<Vec<u8>>, event: Event<'_>) -> Result<(), RenderError> {
    writer
        .write_event(event)
        .map_err(|err| RenderError::Xml(err.to_string()))
}

fn xml_error(reader: &Reader<&[u8]>, err: quick_xml::Error) -> RenderError {
    RenderError::Xml(format!("{err} at byte {}", reader.buffer_position()))
}

fn write_document(source: &Path, document: &Document) -> Result<PathBuf, RenderError> {
    let bytes = document.to_pdf()?;
    let target = document_path(source);
    let dir = target
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    let name = file_name(&target)?;
    let written = AtomicFileWriter::new(dir).write(&name, bytes)?;
    artifact_debug!("Rendered {:?} -> {:?}", source, written);
    Ok(written)
}

fn file_name(path: &Path) -> Result<String, RenderError> {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .ok_or_else(|| RenderError::NoFileName(path.to_path_buf()))
}
