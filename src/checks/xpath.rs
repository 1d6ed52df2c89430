use tracing::debug;

use crate::config::RuleParams;
use crate::error::Result;
use crate::query::{Query, QueryNode, QueryValue};
use crate::range::{RangeKind, TextRange};
use crate::tree::{Document, NamespaceMode, NodeKind};

use super::{Check, CheckContext, XPATH_RULE};

/// Reports the nodes selected by a configured path query.
///
/// A query returning nodes raises one issue per node. A scalar result is
/// converted to a boolean and raises one file-level issue when true.
///
/// With `untilPlatformVersion` set, the rule only applies to projects that
/// may still run on an older platform (see
/// [`Settings::supports_platform_below`](crate::config::Settings::supports_platform_below)).
#[derive(Debug, Clone)]
pub struct XPathCheck {
    query: Query,
    message: String,
    until_platform_version: Option<u32>,
}

impl XPathCheck {
    /// Message used when the `message` parameter is absent.
    pub const DEFAULT_MESSAGE: &'static str = "Change this XML to not match the configured expression.";

    /// Compiles `expression`.
    pub fn new(expression: &str, message: impl Into<String>) -> Result<Self> {
        Ok(Self {
            query: Query::compile(expression)?,
            message: message.into(),
            until_platform_version: None,
        })
    }

    /// Restricts the rule to projects supporting platforms older than `version`.
    pub fn until_platform_version(mut self, version: u32) -> Self {
        self.until_platform_version = Some(version);
        self
    }

    /// Reads `expression` (required), `message` and `untilPlatformVersion`.
    pub fn from_params(params: &RuleParams) -> Result<Self> {
        let expression = params.require_str(XPATH_RULE, "expression")?;
        let mut check = Self::new(&expression, params.get_str("message", Self::DEFAULT_MESSAGE))?;
        check.until_platform_version = params.get_version(XPATH_RULE, "untilPlatformVersion")?;
        Ok(check)
    }

    /// The compiled query.
    pub fn query(&self) -> &Query {
        &self.query
    }
}

/// Range reported for a selected node, `None` for the document itself.
fn node_range(document: &Document, node: QueryNode) -> Option<TextRange> {
    match node {
        QueryNode::Attribute(attr) => document.attribute_range(attr, RangeKind::Node),
        QueryNode::Node(id) => match document.kind(id) {
            NodeKind::Document => None,
            NodeKind::Element(_) => document.range(id, RangeKind::Start),
            _ => document.node_range(id),
        },
    }
}

impl Check for XPathCheck {
    fn rule_key(&self) -> &'static str {
        XPATH_RULE
    }

    fn scan_file(&mut self, context: &mut CheckContext<'_>) -> Result<()> {
        if let Some(version) = self.until_platform_version {
            if !context.settings().supports_platform_below(version) {
                return Ok(());
            }
        }

        // literal names unless the query asks for namespaces
        let mode = if self.query.uses_namespaces() {
            NamespaceMode::Aware
        } else {
            NamespaceMode::Oblivious
        };
        let document = context.file().document_for(mode)?;

        match self.query.evaluate(document, document.root()) {
            Ok(QueryValue::Nodes(nodes)) => {
                for node in nodes {
                    match node_range(document, node) {
                        Some(range) => context.report(range, self.message.as_str()),
                        None => context.report_file(self.message.as_str()),
                    }
                }
            }
            Ok(value) => {
                if value.to_boolean() {
                    context.report_file(self.message.as_str());
                }
            }
            Err(err) => {
                debug!(
                    uri = context.file().uri(),
                    expression = self.query.expression(),
                    error = %err,
                    "query evaluation failed"
                );
            }
        }
        Ok(())
    }
}
