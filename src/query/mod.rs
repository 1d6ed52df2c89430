//! Path queries over a [`Document`].
//!
//! A [`Query`] is compiled once from its expression text and can then be
//! evaluated against any number of documents. The language is the XPath 1.0
//! core: location paths with the common axes, predicates, unions, boolean,
//! comparison and arithmetic operators, and the usual string and number
//! functions.
//!
//! # Example
//!
//! ```
//! use xmlcheck::query::{Query, QueryValue};
//! use xmlcheck::source::SourceDocument;
//! use xmlcheck::tree::{Document, NamespaceMode};
//!
//! let source = SourceDocument::from_text("doc.xml", "<a><b/><b/></a>");
//! let doc = Document::parse(&source, NamespaceMode::Aware).unwrap();
//!
//! let query = Query::compile("count(//b)").unwrap();
//! assert_eq!(query.evaluate(&doc, doc.root()).unwrap(), QueryValue::Number(2.0));
//! ```

mod ast;
mod eval;
mod lexer;
mod namespace;
mod parser;

pub use eval::{QueryNode, QueryValue};
pub use namespace::resolve_prefix;

use crate::error::{Error, Result};
use crate::tree::{Document, NodeId};
use ast::Expr;
use eval::Evaluator;

/// A compiled path query.
#[derive(Debug, Clone)]
pub struct Query {
    expression: String,
    expr: Expr,
}

impl Query {
    /// Compiles an expression.
    pub fn compile(expression: &str) -> Result<Self> {
        let expr = lexer::tokenize(expression)
            .and_then(parser::parse)
            .map_err(|message| Error::Query {
                expression: expression.to_string(),
                message,
            })?;
        Ok(Self {
            expression: expression.to_string(),
            expr,
        })
    }

    /// The source text of the query.
    pub fn expression(&self) -> &str {
        &self.expression
    }

    /// Whether the query needs resolved namespaces, i.e. it has prefixed
    /// name tests or asks for `namespace-uri()`.
    pub fn uses_namespaces(&self) -> bool {
        self.expr.uses_namespaces()
    }

    /// Evaluates the query with `context` as the context node.
    pub fn evaluate(&self, document: &Document, context: NodeId) -> Result<QueryValue> {
        Evaluator::new(document)
            .evaluate(&self.expr, context)
            .map_err(|message| self.error(message))
    }

    /// Evaluates the query and requires a node-set result.
    pub fn select(&self, document: &Document, context: NodeId) -> Result<Vec<QueryNode>> {
        match self.evaluate(document, context)? {
            QueryValue::Nodes(nodes) => Ok(nodes),
            _ => Err(self.error("expression does not select nodes".to_string())),
        }
    }

    fn error(&self, message: String) -> Error {
        Error::Query {
            expression: self.expression.clone(),
            message,
        }
    }
}

impl QueryValue {
    /// Boolean value of the result, following XPath conversion rules.
    pub fn to_boolean(&self) -> bool {
        match self {
            QueryValue::Nodes(nodes) => !nodes.is_empty(),
            QueryValue::Boolean(b) => *b,
            QueryValue::Number(n) => *n != 0.0 && !n.is_nan(),
            QueryValue::String(s) => !s.is_empty(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::SourceDocument;
    use crate::tree::{NamespaceMode, NodeKind};

    const BEANS: &str = r#"<beans xmlns="urn:beans" xmlns:p="urn:p">
  <bean id="a" class="x.A"><property name="n" value="1"/></bean>
  <bean id="b" class="x.B" p:lazy="true"><!-- note --></bean>
  <p:alias name="c">text</p:alias>
</beans>"#;

    fn parse(text: &str, mode: NamespaceMode) -> Document {
        let source = SourceDocument::from_text("query.xml", text);
        Document::parse(&source, mode).unwrap()
    }

    fn select(doc: &Document, expression: &str) -> Vec<QueryNode> {
        Query::compile(expression)
            .unwrap()
            .select(doc, doc.root())
            .unwrap()
    }

    fn element_names(doc: &Document, nodes: &[QueryNode]) -> Vec<String> {
        nodes
            .iter()
            .map(|node| match node {
                QueryNode::Node(id) => doc.name(*id).map(|n| n.qualified()).unwrap_or_default(),
                QueryNode::Attribute(attr) => format!("@{}", doc.attribute(*attr).name.qualified()),
            })
            .collect()
    }

    #[test]
    fn test_oblivious_names() {
        let doc = parse(BEANS, NamespaceMode::Oblivious);
        assert_eq!(select(&doc, "//bean").len(), 2);
        assert_eq!(element_names(&doc, &select(&doc, "/beans/*")), vec!["bean", "bean", "p:alias"]);
        assert_eq!(select(&doc, "//p:alias").len(), 1);
    }

    #[test]
    fn test_namespace_aware_names() {
        let doc = parse(BEANS, NamespaceMode::Aware);
        // default namespace: unprefixed tests match only no-namespace elements
        assert!(select(&doc, "//bean").is_empty());
        assert_eq!(select(&doc, "//p:alias").len(), 1);
        assert_eq!(select(&doc, "//*[local-name()='bean']").len(), 2);
        assert_eq!(select(&doc, "//@p:lazy").len(), 1);
    }

    #[test]
    fn test_unresolved_prefix_means_no_namespace() {
        let doc = parse(BEANS, NamespaceMode::Aware);
        assert!(select(&doc, "//q:alias").is_empty());
        // unprefixed attributes have no namespace
        assert_eq!(select(&doc, "//@q:name").len(), 2);
        assert!(select(&doc, "//@q:lazy").is_empty());
    }

    #[test]
    fn test_predicates_and_attributes() {
        let doc = parse(BEANS, NamespaceMode::Oblivious);
        let nodes = select(&doc, "//bean[@id='b']/@class");
        assert_eq!(nodes.len(), 1);
        let QueryNode::Attribute(attr) = nodes[0] else {
            panic!("expected attribute");
        };
        assert_eq!(doc.attribute(attr).value, "x.B");

        assert_eq!(element_names(&doc, &select(&doc, "//bean[2]")), vec!["bean"]);
        assert_eq!(element_names(&doc, &select(&doc, "//bean[last()]/@id")), vec!["@id"]);
        assert_eq!(select(&doc, "//bean[property]").len(), 1);
        // namespace declarations are not attributes
        assert_eq!(select(&doc, "/beans/@*").len(), 0);
    }

    #[test]
    fn test_axes() {
        let doc = parse(BEANS, NamespaceMode::Oblivious);
        assert_eq!(select(&doc, "//property/ancestor::*").len(), 2);
        assert_eq!(select(&doc, "//property/..").len(), 1);
        assert_eq!(select(&doc, "//bean[1]/following-sibling::*").len(), 2);
        assert_eq!(element_names(&doc, &select(&doc, "//p:alias/preceding-sibling::*[1]")), vec!["bean"]);
        let comments = select(&doc, "//comment()");
        assert_eq!(comments.len(), 1);
        let QueryNode::Node(comment) = comments[0] else {
            panic!("expected node");
        };
        assert!(matches!(doc.kind(comment), NodeKind::Comment(c) if c == " note "));
    }

    #[test]
    fn test_document_order_of_union() {
        let doc = parse(BEANS, NamespaceMode::Oblivious);
        let nodes = select(&doc, "//p:alias | //bean | //bean");
        assert_eq!(element_names(&doc, &nodes), vec!["bean", "bean", "p:alias"]);
    }

    #[test]
    fn test_scalar_results() {
        let doc = parse(BEANS, NamespaceMode::Oblivious);
        let eval = |expression: &str| {
            Query::compile(expression)
                .unwrap()
                .evaluate(&doc, doc.root())
                .unwrap()
        };
        assert_eq!(eval("count(//bean) > 1"), QueryValue::Boolean(true));
        assert_eq!(eval("count(//bean) * 2 + 1"), QueryValue::Number(5.0));
        assert_eq!(eval("string(//p:alias)"), QueryValue::String("text".to_string()));
        assert_eq!(eval("concat(//bean[1]/@id, '-', //bean[2]/@id)"), QueryValue::String("a-b".to_string()));
        assert_eq!(eval("sum(//property/@value)"), QueryValue::Number(1.0));
        assert_eq!(eval("normalize-space('  a   b ')"), QueryValue::String("a b".to_string()));
        assert_eq!(eval("//bean/@id = 'b'"), QueryValue::Boolean(true));
        assert_eq!(eval("not(//missing)"), QueryValue::Boolean(true));
        assert!(eval("starts-with(name(/*), 'bea')").to_boolean());
    }

    #[test]
    fn test_uses_namespaces() {
        assert!(Query::compile("//p:alias").unwrap().uses_namespaces());
        assert!(Query::compile("//*[namespace-uri()='urn:p']").unwrap().uses_namespaces());
        assert!(!Query::compile("//bean[@id]").unwrap().uses_namespaces());
    }

    #[test]
    fn test_errors() {
        let err = Query::compile("//bean[").unwrap_err();
        assert!(matches!(err, Error::Query { ref expression, .. } if expression == "//bean["));

        let doc = parse(BEANS, NamespaceMode::Oblivious);
        let query = Query::compile("unknown-function()").unwrap();
        assert!(query.evaluate(&doc, doc.root()).is_err());
        assert!(Query::compile("1 + 1").unwrap().select(&doc, doc.root()).is_err());
    }
}
