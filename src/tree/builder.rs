//! Conformant parse of the document body into the node arena.
//!
//! Uses `quick-xml` for tokenizing and adds the well-formedness checks the
//! reader leaves to its callers: a single root element, no character data
//! outside of it, bound namespace prefixes, declared entities only and the
//! XML 1.0 character set. No partial tree is ever returned.

use super::{
    DocType, Document, Element, NamespaceMode, NodeId, NodeKind, QualifiedName, XMLNS_NAMESPACE,
    XML_NAMESPACE,
};
use crate::error::{Error, Result};
use crate::range::Locator;
use crate::source::SourceDocument;
use quick_xml::events::{BytesStart, Event as XmlEvent};
use quick_xml::name::{QName, ResolveResult};
use quick_xml::NsReader;
use regex::Regex;
use std::collections::HashMap;
use std::str;
use std::sync::OnceLock;

/// Builds the node structure of `source`. Ranges are left unbound.
pub(super) fn build(source: &SourceDocument, mode: NamespaceMode) -> Result<Document> {
    TreeBuilder::new(source, mode).run()
}

/// Outcome of resolving a prefix, detached from the reader's borrow.
enum Resolution {
    Bound(String),
    Unbound,
    Unknown(String),
}

impl Resolution {
    fn from_result(resolved: ResolveResult<'_>) -> Self {
        match resolved {
            ResolveResult::Bound(namespace) => {
                Resolution::Bound(String::from_utf8_lossy(namespace.as_ref()).into_owned())
            }
            ResolveResult::Unbound => Resolution::Unbound,
            ResolveResult::Unknown(prefix) => {
                Resolution::Unknown(String::from_utf8_lossy(&prefix).into_owned())
            }
        }
    }
}

/// Intermediate parsed event data (owned, to avoid borrow conflicts).
enum ParsedEvent {
    Decl,
    Start {
        name: QualifiedName,
        attrs: Vec<(QualifiedName, String)>,
    },
    Empty {
        name: QualifiedName,
        attrs: Vec<(QualifiedName, String)>,
    },
    End,
    Text {
        text: String,
    },
    CData {
        text: String,
    },
    Comment {
        text: String,
    },
    DocType {
        doctype: DocType,
    },
    Skip,
    Eof,
}

struct TreeBuilder<'s> {
    source: &'s SourceDocument,
    reader: NsReader<&'s [u8]>,
    locator: Locator<'s>,
    mode: NamespaceMode,
    document: Document,
    stack: Vec<NodeId>,
    entities: HashMap<String, String>,
    seen_root: bool,
    seen_doctype: bool,
}

impl<'s> TreeBuilder<'s> {
    fn new(source: &'s SourceDocument, mode: NamespaceMode) -> Self {
        let body = source.body();
        let mut reader = NsReader::from_str(body);
        let config = reader.config_mut();
        config.trim_text(false);
        config.check_end_names = true;
        config.check_comments = true;
        config.expand_empty_elements = false;

        Self {
            source,
            reader,
            locator: Locator::new(body),
            mode,
            document: Document::empty(mode),
            stack: Vec::new(),
            entities: HashMap::new(),
            seen_root: false,
            seen_doctype: false,
        }
    }

    fn run(mut self) -> Result<Document> {
        loop {
            let event_start = self.reader.buffer_position() as usize;
            match self.next_event()? {
                ParsedEvent::Decl => {
                    if event_start != 0 {
                        return Err(self.malformed_at(
                            event_start,
                            "The XML declaration is only allowed at the start of the document",
                        ));
                    }
                }
                ParsedEvent::Start { name, attrs } => {
                    let id = self.open_element(event_start, name, attrs)?;
                    self.stack.push(id);
                }
                ParsedEvent::Empty { name, attrs } => {
                    self.open_element(event_start, name, attrs)?;
                }
                ParsedEvent::End => {
                    if self.stack.pop().is_none() {
                        return Err(self.malformed_at(event_start, "Unexpected closing tag"));
                    }
                }
                ParsedEvent::Text { text } => {
                    if self.stack.is_empty() && !is_whitespace(&text) {
                        return Err(self.malformed_at(
                            event_start,
                            "Content is not allowed outside of the root element",
                        ));
                    }
                    self.check_chars(event_start, &text)?;
                    let parent = self.parent();
                    self.document.append_node(parent, NodeKind::Text(text));
                }
                ParsedEvent::CData { text } => {
                    if self.stack.is_empty() {
                        return Err(self.malformed_at(
                            event_start,
                            "CDATA sections are not allowed outside of the root element",
                        ));
                    }
                    self.check_chars(event_start, &text)?;
                    let parent = self.parent();
                    self.document.append_node(parent, NodeKind::CData(text));
                }
                ParsedEvent::Comment { text } => {
                    self.check_chars(event_start, &text)?;
                    let parent = self.parent();
                    self.document.append_node(parent, NodeKind::Comment(text));
                }
                ParsedEvent::DocType { doctype } => {
                    if self.seen_root || self.seen_doctype {
                        return Err(self.malformed_at(
                            event_start,
                            "The document type declaration must precede the root element",
                        ));
                    }
                    self.seen_doctype = true;
                    self.declare_entities(&doctype.raw);
                    let root = self.document.root();
                    self.document.append_node(root, NodeKind::DocType(doctype));
                }
                ParsedEvent::Skip => {}
                ParsedEvent::Eof => break,
            }
        }

        let end = self.source.body().len();
        if let Some(&open) = self.stack.last() {
            let name = self
                .document
                .name(open)
                .map(QualifiedName::qualified)
                .unwrap_or_default();
            return Err(self.malformed_at(end, format!("Element '{}' is never closed", name)));
        }
        if !self.seen_root {
            return Err(self.malformed_at(end, "Premature end of file, no root element"));
        }
        Ok(self.document)
    }

    /// Reads the next event and extracts what we need as owned data.
    fn next_event(&mut self) -> Result<ParsedEvent> {
        let (resolution, event) = match self.mode {
            NamespaceMode::Aware => match self.reader.read_resolved_event() {
                Ok((resolved, event)) => (Some(Resolution::from_result(resolved)), event),
                Err(e) => return Err(self.reader_error(e)),
            },
            NamespaceMode::Oblivious => match self.reader.read_event() {
                Ok(event) => (None, event),
                Err(e) => return Err(self.reader_error(e)),
            },
        };

        let parsed = match event {
            XmlEvent::Decl(_) => ParsedEvent::Decl,
            XmlEvent::Start(ref e) => ParsedEvent::Start {
                name: self.element_name(e.name(), resolution)?,
                attrs: self.extract_attrs(e)?,
            },
            XmlEvent::Empty(ref e) => ParsedEvent::Empty {
                name: self.element_name(e.name(), resolution)?,
                attrs: self.extract_attrs(e)?,
            },
            XmlEvent::End(_) => ParsedEvent::End,
            XmlEvent::Text(ref e) => {
                if e.is_empty() {
                    ParsedEvent::Skip
                } else {
                    let entities = &self.entities;
                    let text = e
                        .unescape_with(|entity: &str| resolve_entity(entities, entity))
                        .map_err(|err| self.malformed_here(err.to_string()))?
                        .into_owned();
                    ParsedEvent::Text { text }
                }
            }
            XmlEvent::CData(ref e) => ParsedEvent::CData {
                text: str::from_utf8(e.as_ref())?.to_string(),
            },
            XmlEvent::Comment(ref e) => ParsedEvent::Comment {
                text: str::from_utf8(&**e)?.to_string(),
            },
            XmlEvent::DocType(ref e) => {
                let raw = str::from_utf8(&**e)?.to_string();
                let name = raw
                    .split(|c: char| c.is_whitespace() || c == '[')
                    .find(|part| !part.is_empty())
                    .unwrap_or_default()
                    .to_string();
                ParsedEvent::DocType {
                    doctype: DocType { name, raw },
                }
            }
            XmlEvent::PI(_) => ParsedEvent::Skip,
            XmlEvent::Eof => ParsedEvent::Eof,
        };
        Ok(parsed)
    }

    fn open_element(
        &mut self,
        event_start: usize,
        name: QualifiedName,
        attrs: Vec<(QualifiedName, String)>,
    ) -> Result<NodeId> {
        if self.stack.is_empty() {
            if self.seen_root {
                return Err(self.malformed_at(
                    event_start,
                    "The markup following the root element must be well-formed",
                ));
            }
            self.seen_root = true;
        }
        let parent = self.parent();
        let id = self.document.append_node(
            parent,
            NodeKind::Element(Element {
                name,
                attributes: Vec::new(),
            }),
        );
        for (attr_name, value) in attrs {
            self.check_chars(event_start, &value)?;
            self.document.append_attribute(id, attr_name, value);
        }
        Ok(id)
    }

    fn element_name(&self, raw: QName<'_>, resolution: Option<Resolution>) -> Result<QualifiedName> {
        let mut name = QualifiedName::parse(str::from_utf8(raw.as_ref())?);
        match resolution {
            Some(Resolution::Bound(namespace)) => name.namespace = Some(namespace),
            Some(Resolution::Unknown(prefix)) => {
                return Err(self.malformed_here(format!(
                    "The prefix \"{}\" for element \"{}\" is not bound",
                    prefix, name
                )))
            }
            Some(Resolution::Unbound) | None => {}
        }
        Ok(name)
    }

    /// Extracts attributes from a start tag as owned data, in source order.
    fn extract_attrs(&self, e: &BytesStart<'_>) -> Result<Vec<(QualifiedName, String)>> {
        let mut attrs = Vec::new();
        for attr in e.attributes() {
            let attr = attr.map_err(|err| self.malformed_here(err.to_string()))?;
            let mut name = QualifiedName::parse(str::from_utf8(attr.key.as_ref())?);
            if self.mode == NamespaceMode::Aware {
                name.namespace = self.attribute_namespace(&name, attr.key)?;
            }
            let entities = &self.entities;
            let value = attr
                .unescape_value_with(|entity: &str| resolve_entity(entities, entity))
                .map_err(|err| self.malformed_here(err.to_string()))?
                .into_owned();
            attrs.push((name, value));
        }
        Ok(attrs)
    }

    fn attribute_namespace(&self, name: &QualifiedName, key: QName<'_>) -> Result<Option<String>> {
        if name.is_namespace_declaration() {
            return Ok(Some(XMLNS_NAMESPACE.to_string()));
        }
        match name.prefix.as_deref() {
            None => Ok(None),
            Some("xml") => Ok(Some(XML_NAMESPACE.to_string())),
            Some(_) => {
                let (resolved, _) = self.reader.resolve_attribute(key);
                match Resolution::from_result(resolved) {
                    Resolution::Bound(namespace) => Ok(Some(namespace)),
                    Resolution::Unbound => Ok(None),
                    Resolution::Unknown(prefix) => Err(self.malformed_here(format!(
                        "The prefix \"{}\" for attribute \"{}\" is not bound",
                        prefix, name
                    ))),
                }
            }
        }
    }

    fn declare_entities(&mut self, doctype: &str) {
        for captures in entity_pattern().captures_iter(doctype) {
            let value = captures
                .get(2)
                .or_else(|| captures.get(3))
                .map(|m| m.as_str().to_string())
                .unwrap_or_default();
            // The first declaration of an entity is binding
            self.entities.entry(captures[1].to_string()).or_insert(value);
        }
    }

    fn check_chars(&self, offset: usize, text: &str) -> Result<()> {
        match text.chars().find(|&c| !is_xml_char(c)) {
            Some(c) => Err(self.malformed_at(
                offset,
                format!("An invalid XML character (Unicode: 0x{:x}) was found", c as u32),
            )),
            None => Ok(()),
        }
    }

    fn parent(&self) -> NodeId {
        self.stack.last().copied().unwrap_or(self.document.root())
    }

    fn reader_error(&self, error: quick_xml::Error) -> Error {
        self.malformed_at(self.reader.error_position() as usize, error.to_string())
    }

    fn malformed_here(&self, message: impl Into<String>) -> Error {
        self.malformed_at(self.reader.buffer_position() as usize, message)
    }

    fn malformed_at(&self, offset: usize, message: impl Into<String>) -> Error {
        let position = self.source.to_original(self.locator.position(offset));
        Error::malformed(position.line, message)
    }
}

fn resolve_entity<'e>(entities: &'e HashMap<String, String>, name: &str) -> Option<&'e str> {
    match name {
        "lt" => Some("<"),
        "gt" => Some(">"),
        "amp" => Some("&"),
        "apos" => Some("'"),
        "quot" => Some("\""),
        _ => entities.get(name).map(String::as_str),
    }
}

fn entity_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r#"<!ENTITY\s+([A-Za-z_][\w.:-]*)\s+(?:"([^"]*)"|'([^']*)')\s*>"#)
            .expect("entity pattern is valid")
    })
}

fn is_whitespace(text: &str) -> bool {
    text.chars().all(|c| matches!(c, ' ' | '\t' | '\n' | '\r'))
}

fn is_xml_char(c: char) -> bool {
    matches!(c,
        '\t' | '\n' | '\r'
        | '\u{20}'..='\u{D7FF}'
        | '\u{E000}'..='\u{FFFD}'
        | '\u{10000}'..='\u{10FFFF}')
}
