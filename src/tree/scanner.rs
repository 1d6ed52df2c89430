//! Forward token scan of a document body.
//!
//! The scanner does not validate; it runs over text the conformant parse
//! already accepted and reports byte spans for every construct. Text is
//! split at entity references, the same way a SAX tokenizer reports them,
//! so consecutive text tokens may belong to one text node.

use crate::error::{Error, Result};
use memchr::{memchr, memchr2, memmem};

const CDATA_OPENER: &[u8] = b"<![CDATA[";
const CDATA_TERMINATOR: &[u8] = b"]]>";
const COMMENT_OPENER: &[u8] = b"<!--";
const COMMENT_TERMINATOR: &[u8] = b"-->";
const DOCTYPE_OPENER: &[u8] = b"<!DOCTYPE";
const DECLARATION_OPENER: &[u8] = b"<?xml";

/// Type of a scanned token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum TokenKind {
    /// `<?xml ... ?>`
    XmlDecl,
    /// `<?target ... ?>`
    ProcessingInstruction,
    /// `<!DOCTYPE ... >`
    DocType,
    /// `<!-- ... -->`
    Comment,
    /// `<![CDATA[ ... ]]>`
    CData,
    /// Character data or a single entity reference
    Text,
    /// `<name ...>`
    StartTag,
    /// `<name .../>`
    EmptyTag,
    /// `</name>`
    EndTag,
}

/// Byte span in the scanned text, end exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }
}

/// An attribute inside a tag or declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) struct AttributeSpan {
    pub name: Span,
    /// Value including its quotes
    pub value: Span,
}

/// A scanned token.
#[derive(Debug, Clone)]
pub(super) struct Token {
    pub kind: TokenKind,
    pub span: Span,
    /// Tag name for start, empty and end tags
    pub name: Option<Span>,
    /// Attributes of tags and pseudo-attributes of the XML declaration
    pub attributes: Vec<AttributeSpan>,
}

impl Token {
    fn new(kind: TokenKind, span: Span) -> Self {
        Self {
            kind,
            span,
            name: None,
            attributes: Vec::new(),
        }
    }

    /// Span of the opening delimiter of comments, CDATA sections and declarations.
    pub fn opener(&self) -> Span {
        let len = match self.kind {
            TokenKind::CData => CDATA_OPENER.len(),
            TokenKind::Comment => COMMENT_OPENER.len(),
            TokenKind::XmlDecl => DECLARATION_OPENER.len(),
            _ => 1,
        };
        Span::new(self.span.start, self.span.start + len)
    }

    /// Span of the closing delimiter (`]]>`, `-->`, `?>`, `/>` or `>`).
    pub fn terminator(&self) -> Span {
        let len = match self.kind {
            TokenKind::CData | TokenKind::Comment => 3,
            TokenKind::XmlDecl | TokenKind::ProcessingInstruction | TokenKind::EmptyTag => 2,
            _ => 1,
        };
        Span::new(self.span.end - len, self.span.end)
    }
}

/// Iterator over the tokens of a document body.
pub(super) struct Scanner<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Scanner<'a> {
    pub fn new(text: &'a str) -> Self {
        Self {
            bytes: text.as_bytes(),
            pos: 0,
        }
    }

    fn scan(&mut self) -> Result<Token> {
        let start = self.pos;
        let token = match self.bytes[start] {
            b'<' => self.scan_markup(start)?,
            b'&' => {
                let end = self.find_byte(start, b';')? + 1;
                Token::new(TokenKind::Text, Span::new(start, end))
            }
            _ => {
                let end = memchr2(b'<', b'&', &self.bytes[start..])
                    .map(|i| start + i)
                    .unwrap_or(self.bytes.len());
                Token::new(TokenKind::Text, Span::new(start, end))
            }
        };
        self.pos = token.span.end;
        Ok(token)
    }

    fn scan_markup(&self, start: usize) -> Result<Token> {
        let rest = &self.bytes[start..];
        if rest.starts_with(b"<?") {
            let end = self.find(start + 2, b"?>")? + 2;
            if is_declaration(rest) {
                let mut token = Token::new(TokenKind::XmlDecl, Span::new(start, end));
                token.attributes = self.scan_attributes(start + DECLARATION_OPENER.len(), end - 2)?;
                Ok(token)
            } else {
                Ok(Token::new(TokenKind::ProcessingInstruction, Span::new(start, end)))
            }
        } else if rest.starts_with(COMMENT_OPENER) {
            let end = self.find(start + COMMENT_OPENER.len(), COMMENT_TERMINATOR)?
                + COMMENT_TERMINATOR.len();
            Ok(Token::new(TokenKind::Comment, Span::new(start, end)))
        } else if rest.starts_with(CDATA_OPENER) {
            // Shorter bracket runs such as `]>` inside the payload are skipped
            // by the substring search, which never backtracks.
            let end = self.find(start + CDATA_OPENER.len(), CDATA_TERMINATOR)?
                + CDATA_TERMINATOR.len();
            Ok(Token::new(TokenKind::CData, Span::new(start, end)))
        } else if rest.starts_with(DOCTYPE_OPENER) {
            let end = self.scan_doctype(start)?;
            Ok(Token::new(TokenKind::DocType, Span::new(start, end)))
        } else if rest.starts_with(b"</") {
            let name = self.scan_name(start + 2)?;
            let close = self.skip_whitespace(name.end);
            if self.bytes.get(close) != Some(&b'>') {
                return Err(self.error(close, "expected '>' after closing tag name"));
            }
            let mut token = Token::new(TokenKind::EndTag, Span::new(start, close + 1));
            token.name = Some(name);
            Ok(token)
        } else {
            self.scan_tag(start)
        }
    }

    fn scan_tag(&self, start: usize) -> Result<Token> {
        let name = self.scan_name(start + 1)?;
        let mut pos = name.end;
        let mut attributes = Vec::new();
        loop {
            pos = self.skip_whitespace(pos);
            let kind_and_end = match self.bytes.get(pos) {
                Some(b'>') => Some((TokenKind::StartTag, pos + 1)),
                Some(b'/') if self.bytes.get(pos + 1) == Some(&b'>') => {
                    Some((TokenKind::EmptyTag, pos + 2))
                }
                Some(_) => None,
                None => return Err(self.error(start, "unterminated tag")),
            };
            match kind_and_end {
                Some((kind, end)) => {
                    let mut token = Token::new(kind, Span::new(start, end));
                    token.name = Some(name);
                    token.attributes = attributes;
                    return Ok(token);
                }
                None => {
                    let attribute = self.scan_attribute(pos)?;
                    pos = attribute.value.end;
                    attributes.push(attribute);
                }
            }
        }
    }

    /// Pseudo-attributes of a declaration, between `from` and `to`.
    fn scan_attributes(&self, from: usize, to: usize) -> Result<Vec<AttributeSpan>> {
        let mut attributes = Vec::new();
        let mut pos = self.skip_whitespace(from);
        while pos < to {
            let attribute = self.scan_attribute(pos)?;
            pos = self.skip_whitespace(attribute.value.end);
            attributes.push(attribute);
        }
        Ok(attributes)
    }

    fn scan_attribute(&self, start: usize) -> Result<AttributeSpan> {
        let name = self.scan_name(start)?;
        let equals = self.skip_whitespace(name.end);
        if self.bytes.get(equals) != Some(&b'=') {
            return Err(self.error(equals, "expected '=' after attribute name"));
        }
        // The delimiter is whichever quote follows the '='
        let open = self.skip_whitespace(equals + 1);
        let quote = match self.bytes.get(open) {
            Some(&q @ (b'"' | b'\'')) => q,
            _ => return Err(self.error(open, "expected quoted attribute value")),
        };
        let close = self.find_byte(open + 1, quote)?;
        Ok(AttributeSpan {
            name,
            value: Span::new(open, close + 1),
        })
    }

    fn scan_doctype(&self, start: usize) -> Result<usize> {
        let mut depth = 0usize;
        let mut quote: Option<u8> = None;
        let mut pos = start + DOCTYPE_OPENER.len();
        while pos < self.bytes.len() {
            let b = self.bytes[pos];
            if let Some(q) = quote {
                if b == q {
                    quote = None;
                }
                pos += 1;
                continue;
            }
            match b {
                b'"' | b'\'' => quote = Some(b),
                b'<' if self.bytes[pos..].starts_with(COMMENT_OPENER) => {
                    pos = self.find(pos + COMMENT_OPENER.len(), COMMENT_TERMINATOR)?
                        + COMMENT_TERMINATOR.len();
                    continue;
                }
                b'<' if self.bytes[pos..].starts_with(b"<?") => {
                    pos = self.find(pos + 2, b"?>")? + 2;
                    continue;
                }
                b'<' => depth += 1,
                b'>' if depth == 0 => return Ok(pos + 1),
                b'>' => depth -= 1,
                _ => {}
            }
            pos += 1;
        }
        Err(self.error(start, "unterminated document type declaration"))
    }

    fn scan_name(&self, start: usize) -> Result<Span> {
        let mut end = start;
        while end < self.bytes.len() && !is_name_terminator(self.bytes[end]) {
            end += 1;
        }
        if end == start {
            return Err(self.error(start, "expected a name"));
        }
        Ok(Span::new(start, end))
    }

    fn skip_whitespace(&self, mut pos: usize) -> usize {
        while pos < self.bytes.len() && self.bytes[pos].is_ascii_whitespace() {
            pos += 1;
        }
        pos
    }

    fn find(&self, from: usize, needle: &[u8]) -> Result<usize> {
        self.bytes
            .get(from..)
            .and_then(|haystack| memmem::find(haystack, needle))
            .map(|i| from + i)
            .ok_or_else(|| {
                self.error(from, format!("missing '{}'", String::from_utf8_lossy(needle)))
            })
    }

    fn find_byte(&self, from: usize, needle: u8) -> Result<usize> {
        self.bytes
            .get(from..)
            .and_then(|haystack| memchr(needle, haystack))
            .map(|i| from + i)
            .ok_or_else(|| self.error(from, format!("missing '{}'", needle as char)))
    }

    fn error(&self, offset: usize, message: impl Into<String>) -> Error {
        Error::internal(format!("token scan at offset {}: {}", offset, message.into()))
    }
}

impl Iterator for Scanner<'_> {
    type Item = Result<Token>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.pos >= self.bytes.len() {
            return None;
        }
        let token = self.scan();
        if token.is_err() {
            // Stop after the first error
            self.pos = self.bytes.len();
        }
        Some(token)
    }
}

fn is_declaration(markup: &[u8]) -> bool {
    markup.starts_with(DECLARATION_OPENER)
        && matches!(
            markup.get(DECLARATION_OPENER.len()),
            Some(b) if b.is_ascii_whitespace() || *b == b'?'
        )
}

fn is_name_terminator(b: u8) -> bool {
    b.is_ascii_whitespace() || matches!(b, b'>' | b'/' | b'=' | b'<' | b'?')
}
