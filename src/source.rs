//! Source loading and coordinate mapping.
//!
//! A [`SourceDocument`] holds the decoded content of one XML file together
//! with what is needed to translate positions of the parsed body back into
//! coordinates of the original file:
//!
//! - a leading byte-order mark is stripped and remembered
//! - content preceding the `<?xml` declaration (a "preamble") is cut off
//!   before parsing and recorded as a [`PreambleDelta`]

use crate::error::{Error, Result};
use crate::range::{Position, TextRange};
use encoding_rs::Encoding;
use regex::Regex;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::OnceLock;
use tracing::warn;

const BOM: char = '\u{FEFF}';
const DECLARATION_OPENER: &str = "<?xml";

// ============================================================================
// Charsets
// ============================================================================

/// The character encoding of an input file.
///
/// Any label known to `encoding_rs` is accepted, so `windows-1252`,
/// `ISO-8859-15` or `Shift_JIS` decode as well as the Unicode forms.
#[derive(Clone, Copy, PartialEq, Eq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(try_from = "String", into = "String")
)]
pub struct Charset {
    encoding: &'static Encoding,
}

impl Charset {
    /// UTF-8.
    pub fn utf8() -> Self {
        Self::from(encoding_rs::UTF_8)
    }

    /// UTF-16, little endian.
    pub fn utf16le() -> Self {
        Self::from(encoding_rs::UTF_16LE)
    }

    /// UTF-16, big endian.
    pub fn utf16be() -> Self {
        Self::from(encoding_rs::UTF_16BE)
    }

    /// Looks up a charset by any of its labels, ignoring case.
    pub fn for_label(label: &str) -> Result<Self> {
        Encoding::for_label(label.trim().as_bytes())
            .map(Self::from)
            .ok_or_else(|| Error::UnsupportedCharset(label.to_string()))
    }

    /// Canonical name of the charset.
    pub fn name(&self) -> &'static str {
        self.encoding.name()
    }

    /// The underlying `encoding_rs` encoding.
    pub fn encoding(&self) -> &'static Encoding {
        self.encoding
    }

    /// Decodes `bytes` into a string. A BOM is kept as U+FEFF.
    pub fn decode(&self, bytes: &[u8]) -> Result<String> {
        self.encoding
            .decode_without_bom_handling_and_without_replacement(bytes)
            .map(|text| text.into_owned())
            .ok_or_else(|| Error::Decode {
                charset: self.name().to_string(),
                message: "malformed byte sequence".to_string(),
            })
    }

    /// Picks a charset for undeclared content.
    ///
    /// A byte-order mark wins, then the layout of a UTF-16 `<?`, then the
    /// `encoding` pseudo-attribute of a leading XML declaration, then UTF-8.
    /// An encoding label nobody knows falls back to UTF-8.
    pub fn sniff(bytes: &[u8]) -> Charset {
        if let Some((encoding, _)) = Encoding::for_bom(bytes) {
            return Self::from(encoding);
        }
        if bytes.starts_with(&[0x00, b'<', 0x00, b'?']) {
            return Self::utf16be();
        }
        if bytes.starts_with(&[b'<', 0x00, b'?', 0x00]) {
            return Self::utf16le();
        }

        let head = &bytes[..bytes.len().min(1024)];
        let head = String::from_utf8_lossy(head);
        let Some(start) = head.find(DECLARATION_OPENER) else {
            return Self::utf8();
        };
        let Some(end) = head[start..].find("?>") else {
            return Self::utf8();
        };
        let Some(captures) = encoding_pattern().captures(&head[start..start + end]) else {
            return Self::utf8();
        };
        match Self::for_label(&captures[1]) {
            // the declaration was readable as ASCII, so the bytes are not UTF-16
            Ok(charset) if charset.is_utf16() => Self::utf8(),
            Ok(charset) => charset,
            Err(err) => {
                warn!(error = %err, "unknown declared encoding, decoding as UTF-8");
                Self::utf8()
            }
        }
    }

    fn is_utf16(&self) -> bool {
        self.encoding == encoding_rs::UTF_16LE || self.encoding == encoding_rs::UTF_16BE
    }
}

impl From<&'static Encoding> for Charset {
    fn from(encoding: &'static Encoding) -> Self {
        Self { encoding }
    }
}

impl fmt::Debug for Charset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Charset({})", self.name())
    }
}

impl fmt::Display for Charset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for Charset {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::for_label(s)
    }
}

impl TryFrom<String> for Charset {
    type Error = Error;

    fn try_from(label: String) -> Result<Self> {
        Self::for_label(&label)
    }
}

impl From<Charset> for String {
    fn from(charset: Charset) -> Self {
        charset.name().to_string()
    }
}

fn encoding_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r#"encoding\s*=\s*["']([A-Za-z][A-Za-z0-9._:-]*)["']"#)
            .expect("encoding pattern is valid")
    })
}

// ============================================================================
// Input files
// ============================================================================

/// A file handed to the analyzer by the host.
pub trait InputFile {
    /// Stable identity of the file, used in messages.
    fn uri(&self) -> &str;

    /// Raw bytes of the file.
    fn contents(&self) -> Result<Vec<u8>>;

    /// Charset declared by the host, if any.
    fn charset(&self) -> Option<Charset> {
        None
    }
}

/// An input file on the local file system.
#[derive(Debug, Clone)]
pub struct PathInputFile {
    path: PathBuf,
    uri: String,
    charset: Option<Charset>,
}

impl PathInputFile {
    /// Creates an input file for `path` with an undeclared charset.
    pub fn new(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        let uri = path.display().to_string();
        Self {
            path,
            uri,
            charset: None,
        }
    }

    /// Declares the charset of the file.
    pub fn with_charset(mut self, charset: Charset) -> Self {
        self.charset = Some(charset);
        self
    }

    /// Path of the file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl InputFile for PathInputFile {
    fn uri(&self) -> &str {
        &self.uri
    }

    fn contents(&self) -> Result<Vec<u8>> {
        Ok(std::fs::read(&self.path)?)
    }

    fn charset(&self) -> Option<Charset> {
        self.charset
    }
}

/// An in-memory input file.
#[derive(Debug, Clone)]
pub struct MemoryInputFile {
    uri: String,
    bytes: Vec<u8>,
    charset: Option<Charset>,
}

impl MemoryInputFile {
    /// Creates an in-memory UTF-8 file.
    pub fn new(uri: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            bytes: content.into().into_bytes(),
            charset: Some(Charset::utf8()),
        }
    }

    /// Creates an in-memory file from raw bytes.
    pub fn from_bytes(uri: impl Into<String>, bytes: Vec<u8>, charset: Option<Charset>) -> Self {
        Self {
            uri: uri.into(),
            bytes,
            charset,
        }
    }
}

impl InputFile for MemoryInputFile {
    fn uri(&self) -> &str {
        &self.uri
    }

    fn contents(&self) -> Result<Vec<u8>> {
        Ok(self.bytes.clone())
    }

    fn charset(&self) -> Option<Charset> {
        self.charset
    }
}

// ============================================================================
// Source document
// ============================================================================

/// Lines and characters preceding the XML declaration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PreambleDelta {
    /// Number of complete lines before the declaration's line
    pub lines: usize,
    /// Characters before the declaration on its own line
    pub characters: usize,
}

impl PreambleDelta {
    /// Returns true if no shift is needed.
    pub fn is_zero(&self) -> bool {
        self.lines == 0 && self.characters == 0
    }
}

/// The decoded content of one XML file. Immutable once built.
#[derive(Debug, Clone)]
pub struct SourceDocument {
    uri: String,
    content: String,
    charset: Charset,
    has_bom: bool,
    body_offset: usize,
    delta: PreambleDelta,
    has_preamble: bool,
}

impl SourceDocument {
    /// Reads and decodes an input file.
    pub fn read(file: &dyn InputFile) -> Result<Self> {
        let bytes = file.contents()?;
        Self::from_bytes(file.uri(), &bytes, file.charset())
    }

    /// Decodes `bytes` with the given charset, sniffing it when absent.
    pub fn from_bytes(uri: &str, bytes: &[u8], charset: Option<Charset>) -> Result<Self> {
        let charset = match charset {
            Some(charset) => charset,
            None => Charset::sniff(bytes),
        };
        let text = charset.decode(bytes)?;
        Ok(Self::build(uri, text, charset))
    }

    /// Builds a document from already decoded text.
    pub fn from_text(uri: &str, text: impl Into<String>) -> Self {
        Self::build(uri, text.into(), Charset::utf8())
    }

    fn build(uri: &str, mut content: String, charset: Charset) -> Self {
        let has_bom = content.starts_with(BOM);
        if has_bom {
            content.drain(..BOM.len_utf8());
        }

        let (body_offset, has_preamble) = match find_declaration(&content) {
            Some(offset) => (offset, offset > 0),
            None => (0, has_content_before_markup(&content)),
        };
        let delta = preamble_delta(&content[..body_offset]);

        Self {
            uri: uri.to_string(),
            content,
            charset,
            has_bom,
            body_offset,
            delta,
            has_preamble,
        }
    }

    /// Identity of the file.
    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// Full decoded content, without BOM.
    pub fn content(&self) -> &str {
        &self.content
    }

    /// The part of the content handed to the parser.
    pub fn body(&self) -> &str {
        &self.content[self.body_offset..]
    }

    /// Byte offset of the body in [`content`](Self::content).
    pub fn body_offset(&self) -> usize {
        self.body_offset
    }

    /// Charset the content was decoded with.
    pub fn charset(&self) -> Charset {
        self.charset
    }

    /// Whether the raw content started with a byte-order mark.
    pub fn has_bom(&self) -> bool {
        self.has_bom
    }

    /// Shift between body and original coordinates.
    pub fn delta(&self) -> PreambleDelta {
        self.delta
    }

    /// Whether anything other than whitespace precedes the XML content.
    pub fn has_preamble(&self) -> bool {
        self.has_preamble
    }

    /// Raw content split into lines, terminators excluded.
    pub fn lines(&self) -> Vec<&str> {
        split_lines(&self.content)
    }

    /// Translates a position in the parsed body into original coordinates.
    pub fn to_original(&self, position: Position) -> Position {
        if position.line == 1 {
            Position::new(
                1 + self.delta.lines,
                position.column + self.delta.characters + self.bom_shift(1 + self.delta.lines),
            )
        } else {
            Position::new(position.line + self.delta.lines, position.column)
        }
    }

    /// Range on a single line of [`lines`](Self::lines), in original coordinates.
    pub fn line_range(&self, line: usize, start_column: usize, end_column: usize) -> Result<TextRange> {
        let shift = self.bom_shift(line);
        TextRange::new(line, start_column + shift, line, end_column + shift)
    }

    /// Column of the first character of an original line.
    pub fn first_column(&self, line: usize) -> usize {
        self.bom_shift(line)
    }

    fn bom_shift(&self, original_line: usize) -> usize {
        usize::from(self.has_bom && original_line == 1)
    }
}

/// Offset of an XML declaration that only has non-markup content before it.
fn find_declaration(content: &str) -> Option<usize> {
    let mut from = 0;
    while let Some(found) = content[from..].find(DECLARATION_OPENER) {
        let offset = from + found;
        if content[..offset].contains('<') {
            return None;
        }
        let next = content[offset + DECLARATION_OPENER.len()..].chars().next();
        if matches!(next, Some(c) if c.is_ascii_whitespace() || c == '?') {
            return Some(offset);
        }
        // `<?xml-stylesheet` and friends are processing instructions
        from = offset + DECLARATION_OPENER.len();
    }
    None
}

fn has_content_before_markup(content: &str) -> bool {
    let prefix = match content.find('<') {
        Some(offset) => &content[..offset],
        None => content,
    };
    prefix.chars().any(|c| !c.is_whitespace())
}

fn preamble_delta(preamble: &str) -> PreambleDelta {
    let bytes = preamble.as_bytes();
    let mut lines = 0;
    let mut line_start = 0;
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'\n' => {
                lines += 1;
                line_start = i + 1;
            }
            b'\r' => {
                if bytes.get(i + 1) == Some(&b'\n') {
                    i += 1;
                }
                lines += 1;
                line_start = i + 1;
            }
            _ => {}
        }
        i += 1;
    }
    PreambleDelta {
        lines,
        characters: preamble[line_start..].chars().count(),
    }
}

pub(crate) fn split_lines(content: &str) -> Vec<&str> {
    let bytes = content.as_bytes();
    let mut lines = Vec::new();
    let mut start = 0;
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'\n' => {
                lines.push(&content[start..i]);
                start = i + 1;
            }
            b'\r' => {
                lines.push(&content[start..i]);
                if bytes.get(i + 1) == Some(&b'\n') {
                    i += 1;
                }
                start = i + 1;
            }
            _ => {}
        }
        i += 1;
    }
    lines.push(&content[start..]);
    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_charset_labels() {
        assert_eq!("UTF-8".parse::<Charset>().unwrap(), Charset::utf8());
        assert_eq!("utf-16le".parse::<Charset>().unwrap(), Charset::utf16le());
        assert_eq!("latin1".parse::<Charset>().unwrap().name(), "windows-1252");
        assert_eq!(" Shift_JIS ".parse::<Charset>().unwrap().name(), "Shift_JIS");
        assert_eq!("ISO-8859-15".parse::<Charset>().unwrap().name(), "ISO-8859-15");
        assert!(matches!(
            "EBCDIC".parse::<Charset>(),
            Err(Error::UnsupportedCharset(_))
        ));
    }

    #[test]
    fn test_sniff_from_declaration() {
        let bytes = b"<?xml version='1.0' encoding='ISO-8859-1'?><a>\xe9</a>";
        assert_eq!(Charset::sniff(bytes).name(), "windows-1252");
        let doc = SourceDocument::from_bytes("a.xml", bytes, None).unwrap();
        assert_eq!(doc.content(), "<?xml version='1.0' encoding='ISO-8859-1'?><a>\u{e9}</a>");
        assert_eq!(Charset::sniff(b"<a/>"), Charset::utf8());
    }

    #[test]
    fn test_sniff_windows_1252_and_shift_jis() {
        let bytes = b"<?xml version=\"1.0\" encoding=\"windows-1252\"?>\n<r>\x93caf\xe9\x94</r>";
        let doc = SourceDocument::from_bytes("w.xml", bytes, None).unwrap();
        assert_eq!(doc.charset().name(), "windows-1252");
        assert!(doc.content().ends_with("<r>\u{201c}caf\u{e9}\u{201d}</r>"));

        let bytes = b"<?xml version=\"1.0\" encoding=\"Shift_JIS\"?><r>\x82\xa0</r>";
        let doc = SourceDocument::from_bytes("s.xml", bytes, None).unwrap();
        assert!(doc.content().ends_with("<r>\u{3042}</r>"));
    }

    #[test]
    fn test_sniff_falls_back_to_utf8() {
        assert_eq!(Charset::sniff(b"<?xml version='1.0' encoding='x-made-up'?><a/>"), Charset::utf8());
        // a UTF-16 label on bytes that are plainly ASCII-compatible
        assert_eq!(Charset::sniff(b"<?xml version='1.0' encoding='UTF-16'?><a/>"), Charset::utf8());
    }

    #[test]
    fn test_utf16_with_bom() {
        let mut bytes = vec![0xFF, 0xFE];
        for unit in "<a/>".encode_utf16() {
            bytes.extend_from_slice(&unit.to_le_bytes());
        }
        let doc = SourceDocument::from_bytes("a.xml", &bytes, None).unwrap();
        assert_eq!(doc.charset(), Charset::utf16le());
        assert!(doc.has_bom());
        assert_eq!(doc.content(), "<a/>");
    }

    #[test]
    fn test_utf16_without_bom() {
        let mut bytes = Vec::new();
        for unit in "<?xml version='1.0' encoding='UTF-16'?><a/>".encode_utf16() {
            bytes.extend_from_slice(&unit.to_be_bytes());
        }
        let doc = SourceDocument::from_bytes("a.xml", &bytes, None).unwrap();
        assert_eq!(doc.charset(), Charset::utf16be());
        assert!(doc.content().ends_with("<a/>"));
    }

    #[test]
    fn test_undecodable_bytes() {
        let err = SourceDocument::from_bytes("a.xml", b"<a>\xff\xfe\xfd</a>", Some(Charset::utf8()))
            .unwrap_err();
        assert!(matches!(err, Error::Decode { .. }));
        let err = Charset::utf16le().decode(b"<\x00a").unwrap_err();
        assert!(matches!(err, Error::Decode { .. }));
    }

    #[test]
    fn test_bom_is_stripped() {
        let doc = SourceDocument::from_text("a.xml", "\u{FEFF}<?xml version=\"1.0\"?><a/>");
        assert!(doc.has_bom());
        assert!(!doc.has_preamble());
        assert_eq!(doc.body(), "<?xml version=\"1.0\"?><a/>");
        assert_eq!(doc.to_original(Position::new(1, 0)), Position::new(1, 1));
        assert_eq!(doc.to_original(Position::new(2, 3)), Position::new(2, 3));
    }

    #[test]
    fn test_multi_line_preamble() {
        let doc = SourceDocument::from_text("a.xml", "junk\nmore junk\n  x<?xml version=\"1.0\"?>\n<a/>");
        assert!(doc.has_preamble());
        assert_eq!(doc.delta(), PreambleDelta { lines: 2, characters: 3 });
        assert!(doc.body().starts_with("<?xml"));
        assert_eq!(doc.to_original(Position::new(1, 0)), Position::new(3, 3));
        assert_eq!(doc.to_original(Position::new(2, 1)), Position::new(4, 1));
    }

    #[test]
    fn test_lookalike_declaration_is_not_a_prolog() {
        let doc = SourceDocument::from_text("a.xml", "<?xml-stylesheet href='a.xsl'?><a/>");
        assert!(!doc.has_preamble());
        assert_eq!(doc.body_offset(), 0);

        let doc = SourceDocument::from_text("a.xml", "<a><!-- <?xml version='1.0'?> --></a>");
        assert!(!doc.has_preamble());
        assert_eq!(doc.body_offset(), 0);
    }

    #[test]
    fn test_preamble_without_declaration() {
        let doc = SourceDocument::from_text("a.xml", "garbage <a/>");
        assert!(doc.has_preamble());
        assert!(doc.delta().is_zero());

        let doc = SourceDocument::from_text("a.xml", "only text");
        assert!(doc.has_preamble());

        let doc = SourceDocument::from_text("a.xml", "\n  <a/>");
        assert!(!doc.has_preamble());
    }

    #[test]
    fn test_lines() {
        let doc = SourceDocument::from_text("a.xml", "a\nb\r\nc\rd");
        assert_eq!(doc.lines(), vec!["a", "b", "c", "d"]);
        let doc = SourceDocument::from_text("a.xml", "a\n");
        assert_eq!(doc.lines(), vec!["a", ""]);
    }

    #[test]
    fn test_line_range_applies_bom_shift() {
        let doc = SourceDocument::from_text("a.xml", "\u{FEFF}<a>\t</a>");
        let range = doc.line_range(1, 3, 4).unwrap();
        assert_eq!(range, TextRange::new(1, 4, 1, 5).unwrap());
    }
}
