//! Structural XML tree with source ranges.
//!
//! A [`Document`] is an arena of nodes addressed by [`NodeId`]. Children are
//! stored as ordered id lists and the parent link is a plain optional id, so
//! the tree has no reference cycles. Every node and attribute carries a
//! [`NodeRanges`] record filled in once while positions are bound.
//!
//! Building a document runs two passes over the parsed body of a
//! [`SourceDocument`]:
//!
//! - [`builder`] performs a conformant parse with `quick-xml` and produces
//!   the node structure, failing on any well-formedness violation
//! - [`binder`] replays a token scan of the same text ([`scanner`]) and
//!   attaches the exact ranges of every node and attribute

mod binder;
mod builder;
mod scanner;

use crate::error::{Error, Result};
use crate::range::{NodeRanges, RangeKind, TextRange};
use crate::source::SourceDocument;
use std::fmt;

/// The XML namespace, bound to the `xml` prefix in every document.
pub const XML_NAMESPACE: &str = "http://www.w3.org/XML/1998/namespace";

/// The namespace of `xmlns` declaration attributes.
pub const XMLNS_NAMESPACE: &str = "http://www.w3.org/2000/xmlns/";

// ============================================================================
// Identifiers
// ============================================================================

macro_rules! define_id {
    ($name:ident) => {
        #[derive(Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd)]
        pub struct $name(u32);

        impl $name {
            /// Construct an identifier from a raw index.
            pub const fn from_raw(raw: u32) -> Self {
                Self(raw)
            }

            /// Retrieve the underlying index.
            pub const fn index(self) -> usize {
                self.0 as usize
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!(stringify!($name), "({})"), self.0)
            }
        }
    };
}

define_id!(NodeId);
define_id!(AttrId);

// ============================================================================
// Node model
// ============================================================================

/// An element or attribute name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QualifiedName {
    /// Prefix before the colon, if any
    pub prefix: Option<String>,
    /// Local part of the name
    pub local: String,
    /// Resolved namespace URI (namespace-aware trees only)
    pub namespace: Option<String>,
}

impl QualifiedName {
    /// Splits a raw `prefix:local` name. No namespace is attached.
    pub fn parse(raw: &str) -> Self {
        match raw.split_once(':') {
            Some((prefix, local)) => Self {
                prefix: Some(prefix.to_string()),
                local: local.to_string(),
                namespace: None,
            },
            None => Self {
                prefix: None,
                local: raw.to_string(),
                namespace: None,
            },
        }
    }

    /// The name as written in the source.
    pub fn qualified(&self) -> String {
        match &self.prefix {
            Some(prefix) => format!("{}:{}", prefix, self.local),
            None => self.local.clone(),
        }
    }

    /// Returns true if this is a namespace declaration attribute name.
    pub fn is_namespace_declaration(&self) -> bool {
        match &self.prefix {
            Some(prefix) => prefix == "xmlns",
            None => self.local == "xmlns",
        }
    }
}

impl fmt::Display for QualifiedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(prefix) = &self.prefix {
            write!(f, "{}:", prefix)?;
        }
        write!(f, "{}", self.local)
    }
}

/// Element data.
#[derive(Debug, Clone)]
pub struct Element {
    /// Tag name
    pub name: QualifiedName,
    attributes: Vec<AttrId>,
}

/// Document type declaration data.
#[derive(Debug, Clone)]
pub struct DocType {
    /// Declared root element name
    pub name: String,
    /// Everything between `<!DOCTYPE` and the final `>`
    pub raw: String,
}

/// The kind of a node, with its kind-specific data.
#[derive(Debug, Clone)]
pub enum NodeKind {
    /// The document root
    Document,
    /// An element
    Element(Element),
    /// Character data, entity references expanded
    Text(String),
    /// A CDATA section payload
    CData(String),
    /// A comment's content
    Comment(String),
    /// A document type declaration
    DocType(DocType),
}

/// One node of the tree.
#[derive(Debug, Clone)]
pub struct Node {
    kind: NodeKind,
    parent: Option<NodeId>,
    index_in_parent: usize,
    children: Vec<NodeId>,
}

impl Node {
    /// Kind and payload of the node.
    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    /// Parent node, `None` for the document.
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// Children in document order.
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }
}

/// An attribute of an element.
#[derive(Debug, Clone)]
pub struct Attribute {
    /// Attribute name
    pub name: QualifiedName,
    /// Attribute value, entity references expanded
    pub value: String,
    /// Element carrying the attribute
    pub owner: NodeId,
}

/// One `name="value"` pair of the XML declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrologAttribute {
    /// Pseudo-attribute name (`version`, `encoding`, `standalone`)
    pub name: String,
    /// Range of the name
    pub name_range: TextRange,
    /// Value without quotes
    pub value: String,
    /// Range of the value, including quotes
    pub value_range: TextRange,
}

/// The `<?xml ... ?>` declaration of a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrologDeclaration {
    /// Pseudo-attributes in source order
    pub attributes: Vec<PrologAttribute>,
    /// Range of the `<?xml` opener
    pub start: TextRange,
    /// Range of the `?>` terminator
    pub end: TextRange,
}

impl PrologDeclaration {
    /// Full range of the declaration.
    pub fn range(&self) -> TextRange {
        TextRange {
            start_line: self.start.start_line,
            start_column: self.start.start_column,
            end_line: self.end.end_line,
            end_column: self.end.end_column,
        }
    }

    /// Looks up a pseudo-attribute by name.
    pub fn attribute(&self, name: &str) -> Option<&PrologAttribute> {
        self.attributes.iter().find(|a| a.name == name)
    }
}

// ============================================================================
// Document
// ============================================================================

/// How element and attribute names are interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NamespaceMode {
    /// Prefixes are resolved to namespace URIs
    Aware,
    /// Names are taken literally
    Oblivious,
}

/// A parsed XML document with ranges for every node.
#[derive(Debug, Clone)]
pub struct Document {
    nodes: Vec<Node>,
    attributes: Vec<Attribute>,
    node_ranges: Vec<NodeRanges>,
    attribute_ranges: Vec<NodeRanges>,
    prolog: Option<PrologDeclaration>,
    mode: NamespaceMode,
}

impl Document {
    /// Parses the body of `source` and binds ranges to every node.
    pub fn parse(source: &SourceDocument, mode: NamespaceMode) -> Result<Self> {
        let mut document = builder::build(source, mode)?;
        binder::bind(&mut document, source)?;
        Ok(document)
    }

    fn empty(mode: NamespaceMode) -> Self {
        Self {
            nodes: vec![Node {
                kind: NodeKind::Document,
                parent: None,
                index_in_parent: 0,
                children: Vec::new(),
            }],
            attributes: Vec::new(),
            node_ranges: vec![NodeRanges::default()],
            attribute_ranges: Vec::new(),
            prolog: None,
            mode,
        }
    }

    /// Namespace handling of this tree.
    pub fn mode(&self) -> NamespaceMode {
        self.mode
    }

    /// The document node.
    pub fn root(&self) -> NodeId {
        NodeId::from_raw(0)
    }

    /// The single top-level element.
    pub fn root_element(&self) -> Option<NodeId> {
        self.children(self.root())
            .iter()
            .copied()
            .find(|&id| self.is_element(id))
    }

    /// Number of nodes, including the document node.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Always false; a document has at least its root node.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Returns the node with the given id.
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    /// Kind of a node.
    pub fn kind(&self, id: NodeId) -> &NodeKind {
        &self.node(id).kind
    }

    /// Parent of a node.
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).parent
    }

    /// Children of a node in document order.
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.node(id).children
    }

    /// Element data, if the node is an element.
    pub fn element(&self, id: NodeId) -> Option<&Element> {
        match &self.node(id).kind {
            NodeKind::Element(element) => Some(element),
            _ => None,
        }
    }

    /// Returns true if the node is an element.
    pub fn is_element(&self, id: NodeId) -> bool {
        matches!(self.node(id).kind, NodeKind::Element(_))
    }

    /// Tag name of an element.
    pub fn name(&self, id: NodeId) -> Option<&QualifiedName> {
        self.element(id).map(|e| &e.name)
    }

    /// Attributes of an element in source order.
    pub fn attributes(&self, id: NodeId) -> &[AttrId] {
        match &self.node(id).kind {
            NodeKind::Element(element) => &element.attributes,
            _ => &[],
        }
    }

    /// Returns the attribute with the given id.
    pub fn attribute(&self, id: AttrId) -> &Attribute {
        &self.attributes[id.index()]
    }

    /// Finds an attribute of an element by its name as written.
    pub fn attribute_named(&self, id: NodeId, qualified: &str) -> Option<AttrId> {
        self.attributes(id)
            .iter()
            .copied()
            .find(|&attr| self.attribute(attr).name.qualified() == qualified)
    }

    /// Next sibling of a node.
    pub fn next_sibling(&self, id: NodeId) -> Option<NodeId> {
        let node = self.node(id);
        let parent = node.parent?;
        self.children(parent).get(node.index_in_parent + 1).copied()
    }

    /// Previous sibling of a node.
    pub fn previous_sibling(&self, id: NodeId) -> Option<NodeId> {
        let node = self.node(id);
        let parent = node.parent?;
        let index = node.index_in_parent.checked_sub(1)?;
        self.children(parent).get(index).copied()
    }

    /// Ancestors of a node, nearest first.
    pub fn ancestors(&self, id: NodeId) -> Ancestors<'_> {
        Ancestors {
            document: self,
            next: self.parent(id),
        }
    }

    /// Number of element ancestors of a node.
    pub fn depth(&self, id: NodeId) -> usize {
        self.ancestors(id).filter(|&a| self.is_element(a)).count()
    }

    /// All descendants of a node in document order, the node excluded.
    pub fn descendants(&self, id: NodeId) -> Descendants<'_> {
        let mut stack: Vec<NodeId> = self.children(id).to_vec();
        stack.reverse();
        Descendants {
            document: self,
            stack,
        }
    }

    /// Concatenated text and CDATA content below a node.
    pub fn text_content(&self, id: NodeId) -> String {
        match &self.node(id).kind {
            NodeKind::Text(text) | NodeKind::CData(text) | NodeKind::Comment(text) => {
                text.clone()
            }
            NodeKind::DocType(_) => String::new(),
            NodeKind::Document | NodeKind::Element(_) => {
                let mut content = String::new();
                for descendant in self.descendants(id) {
                    if let NodeKind::Text(text) | NodeKind::CData(text) = &self.node(descendant).kind
                    {
                        content.push_str(text);
                    }
                }
                content
            }
        }
    }

    /// All recorded ranges of a node.
    pub fn ranges(&self, id: NodeId) -> &NodeRanges {
        &self.node_ranges[id.index()]
    }

    /// Range of the given kind for a node.
    pub fn range(&self, id: NodeId, kind: RangeKind) -> Option<TextRange> {
        self.ranges(id).get(kind)
    }

    /// Full range of a node.
    pub fn node_range(&self, id: NodeId) -> Option<TextRange> {
        self.range(id, RangeKind::Node)
    }

    /// Range of the given kind for an attribute.
    pub fn attribute_range(&self, id: AttrId, kind: RangeKind) -> Option<TextRange> {
        self.attribute_ranges[id.index()].get(kind)
    }

    /// The XML declaration, if present.
    pub fn prolog(&self) -> Option<&PrologDeclaration> {
        self.prolog.as_ref()
    }

    // ------------------------------------------------------------------
    // Construction, crate-internal
    // ------------------------------------------------------------------

    fn append_node(&mut self, parent: NodeId, kind: NodeKind) -> NodeId {
        let id = NodeId::from_raw(self.nodes.len() as u32);
        let index_in_parent = self.nodes[parent.index()].children.len();
        self.nodes.push(Node {
            kind,
            parent: Some(parent),
            index_in_parent,
            children: Vec::new(),
        });
        self.node_ranges.push(NodeRanges::default());
        self.nodes[parent.index()].children.push(id);
        id
    }

    fn append_attribute(&mut self, owner: NodeId, name: QualifiedName, value: String) -> AttrId {
        let id = AttrId::from_raw(self.attributes.len() as u32);
        self.attributes.push(Attribute { name, value, owner });
        self.attribute_ranges.push(NodeRanges::default());
        if let NodeKind::Element(element) = &mut self.nodes[owner.index()].kind {
            element.attributes.push(id);
        }
        id
    }

    fn set_range(&mut self, id: NodeId, kind: RangeKind, range: TextRange) -> Result<()> {
        let slot = self.node_ranges[id.index()].slot(kind);
        if slot.is_some() {
            return Err(Error::internal(format!("{:?} range of {:?} bound twice", kind, id)));
        }
        *slot = Some(range);
        Ok(())
    }

    fn set_attribute_range(&mut self, id: AttrId, kind: RangeKind, range: TextRange) -> Result<()> {
        let slot = self.attribute_ranges[id.index()].slot(kind);
        if slot.is_some() {
            return Err(Error::internal(format!("{:?} range of {:?} bound twice", kind, id)));
        }
        *slot = Some(range);
        Ok(())
    }
}

/// Iterator over the ancestors of a node.
pub struct Ancestors<'a> {
    document: &'a Document,
    next: Option<NodeId>,
}

impl Iterator for Ancestors<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let current = self.next?;
        self.next = self.document.parent(current);
        Some(current)
    }
}

/// Pre-order iterator over the descendants of a node.
pub struct Descendants<'a> {
    document: &'a Document,
    stack: Vec<NodeId>,
}

impl Iterator for Descendants<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let current = self.stack.pop()?;
        self.stack
            .extend(self.document.children(current).iter().rev().copied());
        Some(current)
    }
}
