//! A parsed XML file: decoded source plus its trees.

use std::cell::OnceCell;

use crate::error::Result;
use crate::source::{InputFile, SourceDocument};
use crate::tree::{Document, NamespaceMode, PrologDeclaration};

/// Everything checks can look at for one file.
///
/// The namespace-aware tree is built eagerly. The namespace-oblivious tree,
/// which keeps names exactly as written, is only built on first request.
#[derive(Debug)]
pub struct XmlFile {
    source: SourceDocument,
    document: Document,
    oblivious: OnceCell<Document>,
}

impl XmlFile {
    /// Parses a decoded source document.
    pub fn parse(source: SourceDocument) -> Result<Self> {
        let document = Document::parse(&source, NamespaceMode::Aware)?;
        Ok(Self::from_parts(source, document))
    }

    pub(crate) fn from_parts(source: SourceDocument, document: Document) -> Self {
        Self {
            source,
            document,
            oblivious: OnceCell::new(),
        }
    }

    /// Reads, decodes and parses an input file.
    pub fn read(input: &dyn InputFile) -> Result<Self> {
        Self::parse(SourceDocument::read(input)?)
    }

    /// Parses in-memory text.
    pub fn from_text(uri: &str, text: impl Into<String>) -> Result<Self> {
        Self::parse(SourceDocument::from_text(uri, text))
    }

    /// The decoded source.
    pub fn source(&self) -> &SourceDocument {
        &self.source
    }

    /// The namespace-aware tree.
    pub fn document(&self) -> &Document {
        &self.document
    }

    /// The namespace-oblivious tree, built on first call.
    pub fn oblivious_document(&self) -> Result<&Document> {
        if let Some(document) = self.oblivious.get() {
            return Ok(document);
        }
        let document = Document::parse(&self.source, NamespaceMode::Oblivious)?;
        Ok(self.oblivious.get_or_init(|| document))
    }

    /// Tree for the given mode.
    pub fn document_for(&self, mode: NamespaceMode) -> Result<&Document> {
        match mode {
            NamespaceMode::Aware => Ok(&self.document),
            NamespaceMode::Oblivious => self.oblivious_document(),
        }
    }

    /// The XML declaration, if any.
    pub fn prolog(&self) -> Option<&PrologDeclaration> {
        self.document.prolog()
    }

    /// Identity of the file.
    pub fn uri(&self) -> &str {
        self.source.uri()
    }

    /// Raw content split into lines.
    pub fn lines(&self) -> Vec<&str> {
        self.source.lines()
    }
}
