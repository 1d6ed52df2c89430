//! Binds source ranges to the nodes of a built tree.
//!
//! The token scan of the body is replayed against the tree with a single
//! cursor: an explicit stack of frames, one per open element, each holding
//! the index of the next child to visit. Every token must land on a node of
//! the expected kind; any disagreement between the scan and the tree is an
//! internal error, never a silent misattribution.

use super::scanner::{Scanner, Span, Token, TokenKind};
use super::{Document, NodeId, NodeKind, PrologAttribute, PrologDeclaration, QualifiedName};
use crate::error::{Error, Result};
use crate::range::{Locator, RangeKind, TextRange};
use crate::source::SourceDocument;

/// Attaches ranges to every node and attribute of `document`.
pub(super) fn bind(document: &mut Document, source: &SourceDocument) -> Result<()> {
    PositionBinder::new(document, source).run()
}

/// Cursor position inside one parent node.
#[derive(Debug)]
struct Frame {
    node: NodeId,
    next_child: usize,
}

struct PositionBinder<'a> {
    document: &'a mut Document,
    source: &'a SourceDocument,
    text: &'a str,
    locator: Locator<'a>,
    stack: Vec<Frame>,
    /// Text node being accumulated from consecutive text tokens
    pending_text: Option<(NodeId, Span)>,
}

impl<'a> PositionBinder<'a> {
    fn new(document: &'a mut Document, source: &'a SourceDocument) -> Self {
        let text = source.body();
        Self {
            document,
            source,
            text,
            locator: Locator::new(text),
            stack: Vec::new(),
            pending_text: None,
        }
    }

    fn run(mut self) -> Result<()> {
        let root = self.document.root();
        self.stack.push(Frame {
            node: root,
            next_child: 0,
        });

        for token in Scanner::new(self.text) {
            let token = token?;
            if token.kind != TokenKind::Text {
                self.flush_text()?;
            }
            match token.kind {
                TokenKind::XmlDecl => self.bind_prolog(&token)?,
                TokenKind::ProcessingInstruction => {}
                TokenKind::DocType => {
                    let id = self.next_child("document type declaration", |kind| {
                        matches!(kind, NodeKind::DocType(_))
                    })?;
                    self.set(id, RangeKind::Node, token.span)?;
                }
                TokenKind::Comment => {
                    let id = self.next_child("comment", |kind| matches!(kind, NodeKind::Comment(_)))?;
                    self.bind_delimited(id, &token)?;
                }
                TokenKind::CData => {
                    let id = self.next_child("CDATA section", |kind| matches!(kind, NodeKind::CData(_)))?;
                    self.bind_delimited(id, &token)?;
                }
                TokenKind::Text => self.bind_text(&token)?,
                TokenKind::StartTag | TokenKind::EmptyTag => self.bind_start_tag(&token)?,
                TokenKind::EndTag => self.bind_end_tag(&token)?,
            }
        }
        self.flush_text()?;

        match self.stack.pop() {
            Some(frame) if frame.node == root && self.stack.is_empty() => {
                self.expect_all_children_visited(&frame)?;
            }
            Some(frame) => {
                return Err(Error::internal(format!(
                    "token scan ended inside {:?}",
                    frame.node
                )))
            }
            None => return Err(Error::internal("document frame missing at end of scan")),
        }
        self.bind_document()
    }

    /// Advances the cursor to the next unvisited child of the current node.
    fn next_child(&mut self, expected: &str, accepts: fn(&NodeKind) -> bool) -> Result<NodeId> {
        let frame = self
            .stack
            .last_mut()
            .ok_or_else(|| Error::internal(format!("{} found outside of any node", expected)))?;
        let id = self
            .document
            .children(frame.node)
            .get(frame.next_child)
            .copied()
            .ok_or_else(|| {
                Error::internal(format!(
                    "{} found but {:?} has only {} children",
                    expected, frame.node, frame.next_child
                ))
            })?;
        if !accepts(self.document.kind(id)) {
            return Err(Error::internal(format!(
                "expected {} at child {} of {:?}, tree has {:?}",
                expected,
                frame.next_child,
                frame.node,
                self.document.kind(id)
            )));
        }
        frame.next_child += 1;
        Ok(id)
    }

    fn bind_text(&mut self, token: &Token) -> Result<()> {
        // Consecutive text tokens make up a single text node
        if let Some((_, span)) = self.pending_text.as_mut() {
            span.end = token.span.end;
            return Ok(());
        }
        let id = self.next_child("text", |kind| matches!(kind, NodeKind::Text(_)))?;
        self.pending_text = Some((id, token.span));
        Ok(())
    }

    fn flush_text(&mut self) -> Result<()> {
        if let Some((id, span)) = self.pending_text.take() {
            self.set(id, RangeKind::Node, span)?;
        }
        Ok(())
    }

    fn bind_delimited(&mut self, id: NodeId, token: &Token) -> Result<()> {
        self.set(id, RangeKind::Start, token.opener())?;
        self.set(id, RangeKind::End, token.terminator())?;
        self.set(id, RangeKind::Node, token.span)
    }

    fn bind_start_tag(&mut self, token: &Token) -> Result<()> {
        let id = self.next_child("element", |kind| matches!(kind, NodeKind::Element(_)))?;
        let qualified = self
            .document
            .name(id)
            .map(QualifiedName::qualified)
            .unwrap_or_default();
        self.expect_name(token, &qualified)?;

        let name_start = token.span.start + 1;
        self.set(
            id,
            RangeKind::Name,
            Span {
                start: name_start,
                end: name_start + qualified.len(),
            },
        )?;
        self.set(id, RangeKind::Start, token.span)?;
        self.bind_attributes(id, token)?;

        if token.kind == TokenKind::EmptyTag {
            self.set(id, RangeKind::End, token.terminator())?;
            self.set(id, RangeKind::Node, token.span)?;
        } else {
            self.stack.push(Frame {
                node: id,
                next_child: 0,
            });
        }
        Ok(())
    }

    /// Matches attributes in source order against the element's attributes.
    fn bind_attributes(&mut self, id: NodeId, token: &Token) -> Result<()> {
        let attrs = self.document.attributes(id).to_vec();
        if attrs.len() != token.attributes.len() {
            return Err(Error::internal(format!(
                "{:?} has {} attributes but the tag has {}",
                id,
                attrs.len(),
                token.attributes.len()
            )));
        }
        let mut bound = vec![false; attrs.len()];
        for span in &token.attributes {
            let name = &self.text[span.name.start..span.name.end];
            let index = (0..attrs.len())
                .find(|&i| !bound[i] && self.document.attribute(attrs[i]).name.qualified() == name)
                .ok_or_else(|| {
                    Error::internal(format!("attribute '{}' of {:?} is not in the tree", name, id))
                })?;
            bound[index] = true;

            let attr = attrs[index];
            let name_range = self.range(span.name)?;
            let value_range = self.range(span.value)?;
            self.document
                .set_attribute_range(attr, RangeKind::Name, name_range)?;
            self.document
                .set_attribute_range(attr, RangeKind::Value, value_range)?;
            self.document
                .set_attribute_range(attr, RangeKind::Node, name_range.to(&value_range)?)?;
        }
        Ok(())
    }

    fn bind_end_tag(&mut self, token: &Token) -> Result<()> {
        if self.stack.len() < 2 {
            return Err(Error::internal("closing tag found at document level"));
        }
        let frame = self
            .stack
            .pop()
            .ok_or_else(|| Error::internal("cursor stack is empty"))?;
        self.expect_all_children_visited(&frame)?;
        let qualified = self
            .document
            .name(frame.node)
            .map(QualifiedName::qualified)
            .unwrap_or_default();
        self.expect_name(token, &qualified)?;

        let end = self.range(token.span)?;
        let start = self
            .document
            .range(frame.node, RangeKind::Start)
            .ok_or_else(|| Error::internal(format!("{:?} closed before it was opened", frame.node)))?;
        self.document.set_range(frame.node, RangeKind::End, end)?;
        self.document
            .set_range(frame.node, RangeKind::Node, start.to(&end)?)
    }

    fn bind_prolog(&mut self, token: &Token) -> Result<()> {
        if token.span.start != 0 || self.document.prolog.is_some() {
            return Err(Error::internal("XML declaration found after the start of the body"));
        }
        let mut attributes = Vec::with_capacity(token.attributes.len());
        for span in &token.attributes {
            let raw_value = &self.text[span.value.start..span.value.end];
            attributes.push(PrologAttribute {
                name: self.text[span.name.start..span.name.end].to_string(),
                name_range: self.range(span.name)?,
                value: raw_value[1..raw_value.len() - 1].to_string(),
                value_range: self.range(span.value)?,
            });
        }
        self.document.prolog = Some(PrologDeclaration {
            attributes,
            start: self.range(token.opener())?,
            end: self.range(token.terminator())?,
        });
        Ok(())
    }

    /// The document spans its content, starting at the declaration if present.
    fn bind_document(&mut self) -> Result<()> {
        let root = self.document.root();
        let children = self.document.children(root);
        let first = children.first().and_then(|&id| self.document.node_range(id));
        let last = children.last().and_then(|&id| self.document.node_range(id));
        let start = self.document.prolog().map(|p| p.start).or(first);
        let end = last.or_else(|| self.document.prolog().map(|p| p.end));
        match (start, end) {
            (Some(start), Some(end)) => {
                let range = start.to(&end)?;
                self.document.set_range(root, RangeKind::Node, range)
            }
            _ => Err(Error::internal("document has no content to span")),
        }
    }

    fn expect_all_children_visited(&self, frame: &Frame) -> Result<()> {
        let count = self.document.children(frame.node).len();
        if frame.next_child != count {
            return Err(Error::internal(format!(
                "{:?} closed after {} of {} children",
                frame.node, frame.next_child, count
            )));
        }
        Ok(())
    }

    fn expect_name(&self, token: &Token, qualified: &str) -> Result<()> {
        let span = token
            .name
            .ok_or_else(|| Error::internal("tag token without a name"))?;
        let scanned = &self.text[span.start..span.end];
        if scanned != qualified {
            return Err(Error::internal(format!(
                "tag '{}' found where the tree has '{}'",
                scanned, qualified
            )));
        }
        Ok(())
    }

    fn set(&mut self, id: NodeId, kind: RangeKind, span: Span) -> Result<()> {
        let range = self.range(span)?;
        self.document.set_range(id, kind, range)
    }

    fn range(&self, span: Span) -> Result<TextRange> {
        let start = self.source.to_original(self.locator.position(span.start));
        let end = self.source.to_original(self.locator.position(span.end));
        TextRange::between(start, end)
    }
}
