//! Tree-walking evaluator for compiled queries.

use std::cmp::Ordering;

use super::ast::{Axis, Expr, NodeTest, Step};
use super::lexer::Operator;
use super::namespace::resolve_prefix;
use crate::tree::{AttrId, Document, NamespaceMode, NodeId, NodeKind, QualifiedName};

/// A node selected by a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryNode {
    /// Any tree node
    Node(NodeId),
    /// An attribute
    Attribute(AttrId),
}

impl QueryNode {
    /// Sort key giving document order: attributes follow their owner and
    /// precede its children.
    fn order_key(self, document: &Document) -> (usize, usize) {
        match self {
            QueryNode::Node(id) => (id.index(), 0),
            QueryNode::Attribute(attr) => (document.attribute(attr).owner.index(), attr.index() + 1),
        }
    }
}

/// Result of evaluating a query.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryValue {
    /// Nodes in document order, without duplicates
    Nodes(Vec<QueryNode>),
    /// Boolean scalar
    Boolean(bool),
    /// Number scalar
    Number(f64),
    /// String scalar
    String(String),
}

pub(crate) type EvalResult<T> = std::result::Result<T, String>;

#[derive(Clone, Copy)]
struct Context {
    node: QueryNode,
    position: usize,
    size: usize,
}

pub(crate) struct Evaluator<'d> {
    document: &'d Document,
}

impl<'d> Evaluator<'d> {
    pub fn new(document: &'d Document) -> Self {
        Self { document }
    }

    pub fn evaluate(&self, expr: &Expr, context: NodeId) -> EvalResult<QueryValue> {
        self.eval(
            expr,
            Context {
                node: QueryNode::Node(context),
                position: 1,
                size: 1,
            },
        )
    }

    fn eval(&self, expr: &Expr, ctx: Context) -> EvalResult<QueryValue> {
        match expr {
            Expr::Literal(value) => Ok(QueryValue::String(value.clone())),
            Expr::Number(value) => Ok(QueryValue::Number(*value)),
            Expr::Negate(inner) => Ok(QueryValue::Number(-self.number(&self.eval(inner, ctx)?))),
            Expr::Binary(op, left, right) => self.binary(*op, left, right, ctx),
            Expr::Function(name, args) => self.function(name, args, ctx),
            Expr::Path { absolute, steps } => {
                let start = if *absolute {
                    QueryNode::Node(self.document.root())
                } else {
                    ctx.node
                };
                self.apply_steps(vec![start], steps).map(QueryValue::Nodes)
            }
            Expr::Filter {
                primary,
                predicates,
                steps,
            } => {
                let QueryValue::Nodes(mut nodes) = self.eval(primary, ctx)? else {
                    return Err("predicates and steps apply only to node-sets".to_string());
                };
                for predicate in predicates {
                    nodes = self.filter(nodes, predicate)?;
                }
                self.apply_steps(nodes, steps).map(QueryValue::Nodes)
            }
        }
    }

    fn binary(&self, op: Operator, left: &Expr, right: &Expr, ctx: Context) -> EvalResult<QueryValue> {
        match op {
            Operator::Or => {
                let value = self.boolean(&self.eval(left, ctx)?) || self.boolean(&self.eval(right, ctx)?);
                Ok(QueryValue::Boolean(value))
            }
            Operator::And => {
                let value = self.boolean(&self.eval(left, ctx)?) && self.boolean(&self.eval(right, ctx)?);
                Ok(QueryValue::Boolean(value))
            }
            Operator::Union => {
                let (QueryValue::Nodes(mut nodes), QueryValue::Nodes(other)) =
                    (self.eval(left, ctx)?, self.eval(right, ctx)?)
                else {
                    return Err("union operands must be node-sets".to_string());
                };
                nodes.extend(other);
                Ok(QueryValue::Nodes(self.document_order(nodes)))
            }
            Operator::Eq | Operator::NotEq | Operator::Lt | Operator::LtEq | Operator::Gt | Operator::GtEq => {
                let left = self.eval(left, ctx)?;
                let right = self.eval(right, ctx)?;
                Ok(QueryValue::Boolean(self.compare(op, &left, &right)))
            }
            Operator::Plus | Operator::Minus | Operator::Multiply | Operator::Div | Operator::Mod => {
                let a = self.number(&self.eval(left, ctx)?);
                let b = self.number(&self.eval(right, ctx)?);
                let value = match op {
                    Operator::Plus => a + b,
                    Operator::Minus => a - b,
                    Operator::Multiply => a * b,
                    Operator::Div => a / b,
                    _ => a % b,
                };
                Ok(QueryValue::Number(value))
            }
        }
    }

    // ------------------------------------------------------------------
    // Location steps
    // ------------------------------------------------------------------

    fn apply_steps(&self, mut nodes: Vec<QueryNode>, steps: &[Step]) -> EvalResult<Vec<QueryNode>> {
        for step in steps {
            let mut selected = Vec::new();
            for &node in &nodes {
                let mut candidates: Vec<QueryNode> = self
                    .axis(step.axis, node)
                    .into_iter()
                    .filter(|&candidate| self.matches(&step.test, step.axis, candidate))
                    .collect();
                for predicate in &step.predicates {
                    candidates = self.filter(candidates, predicate)?;
                }
                selected.extend(candidates);
            }
            nodes = self.document_order(selected);
        }
        Ok(nodes)
    }

    /// Keeps the nodes for which `predicate` holds, positions taken in the
    /// order of `nodes`.
    fn filter(&self, nodes: Vec<QueryNode>, predicate: &Expr) -> EvalResult<Vec<QueryNode>> {
        let size = nodes.len();
        let mut kept = Vec::new();
        for (index, node) in nodes.into_iter().enumerate() {
            let ctx = Context {
                node,
                position: index + 1,
                size,
            };
            let keep = match self.eval(predicate, ctx)? {
                QueryValue::Number(n) => n == (index + 1) as f64,
                other => self.boolean(&other),
            };
            if keep {
                kept.push(node);
            }
        }
        Ok(kept)
    }

    /// Nodes along an axis in proximity order.
    fn axis(&self, axis: Axis, node: QueryNode) -> Vec<QueryNode> {
        let doc = self.document;
        let id = match node {
            QueryNode::Node(id) => id,
            QueryNode::Attribute(attr) => {
                let owner = doc.attribute(attr).owner;
                return match axis {
                    Axis::SelfAxis => vec![node],
                    Axis::Parent => vec![QueryNode::Node(owner)],
                    Axis::Ancestor | Axis::AncestorOrSelf => {
                        let mut nodes = Vec::new();
                        if axis == Axis::AncestorOrSelf {
                            nodes.push(node);
                        }
                        nodes.push(QueryNode::Node(owner));
                        nodes.extend(doc.ancestors(owner).map(QueryNode::Node));
                        nodes
                    }
                    _ => Vec::new(),
                };
            }
        };

        match axis {
            Axis::Child => doc.children(id).iter().copied().map(QueryNode::Node).collect(),
            Axis::Descendant => doc.descendants(id).map(QueryNode::Node).collect(),
            Axis::DescendantOrSelf => std::iter::once(id)
                .chain(doc.descendants(id))
                .map(QueryNode::Node)
                .collect(),
            Axis::SelfAxis => vec![node],
            Axis::Parent => doc.parent(id).map(QueryNode::Node).into_iter().collect(),
            Axis::Ancestor => doc.ancestors(id).map(QueryNode::Node).collect(),
            Axis::AncestorOrSelf => std::iter::once(id)
                .chain(doc.ancestors(id))
                .map(QueryNode::Node)
                .collect(),
            Axis::Attribute => doc
                .attributes(id)
                .iter()
                .copied()
                .filter(|&attr| !doc.attribute(attr).name.is_namespace_declaration())
                .map(QueryNode::Attribute)
                .collect(),
            Axis::FollowingSibling => {
                let mut nodes = Vec::new();
                let mut current = doc.next_sibling(id);
                while let Some(sibling) = current {
                    nodes.push(QueryNode::Node(sibling));
                    current = doc.next_sibling(sibling);
                }
                nodes
            }
            Axis::PrecedingSibling => {
                let mut nodes = Vec::new();
                let mut current = doc.previous_sibling(id);
                while let Some(sibling) = current {
                    nodes.push(QueryNode::Node(sibling));
                    current = doc.previous_sibling(sibling);
                }
                nodes
            }
        }
    }

    fn matches(&self, test: &NodeTest, axis: Axis, candidate: QueryNode) -> bool {
        let doc = self.document;
        match (test, candidate) {
            (NodeTest::AnyNode, _) => true,
            (NodeTest::Text, QueryNode::Node(id)) => {
                matches!(doc.kind(id), NodeKind::Text(_) | NodeKind::CData(_))
            }
            (NodeTest::Comment, QueryNode::Node(id)) => matches!(doc.kind(id), NodeKind::Comment(_)),
            (NodeTest::Text | NodeTest::Comment, QueryNode::Attribute(_)) => false,
            (NodeTest::Name { .. } | NodeTest::Wildcard { .. }, QueryNode::Attribute(attr)) => {
                if axis != Axis::Attribute && axis != Axis::SelfAxis {
                    return false;
                }
                let attribute = doc.attribute(attr);
                self.name_matches(test, &attribute.name, attribute.owner, true)
            }
            (NodeTest::Name { .. } | NodeTest::Wildcard { .. }, QueryNode::Node(id)) => {
                match doc.name(id) {
                    Some(name) => self.name_matches(test, name, id, false),
                    None => false,
                }
            }
        }
    }

    fn name_matches(
        &self,
        test: &NodeTest,
        name: &QualifiedName,
        scope: NodeId,
        is_attribute: bool,
    ) -> bool {
        if self.document.mode() == NamespaceMode::Oblivious {
            return match test {
                NodeTest::Name { prefix, local } => {
                    name.prefix.as_deref() == prefix.as_deref() && &name.local == local
                }
                NodeTest::Wildcard { prefix: None } => true,
                NodeTest::Wildcard { prefix } => name.prefix.as_deref() == prefix.as_deref(),
                _ => false,
            };
        }

        // an unresolved prefix stands for no namespace
        let expected_namespace = |prefix: &Option<String>| match prefix {
            Some(prefix) => resolve_prefix(self.document, scope, prefix),
            None => None,
        };
        // unprefixed attributes never take the default namespace
        let actual = if is_attribute && name.prefix.is_none() {
            None
        } else {
            name.namespace.as_deref()
        };
        match test {
            NodeTest::Name { prefix, local } => {
                &name.local == local && expected_namespace(prefix).as_deref() == actual
            }
            NodeTest::Wildcard { prefix: None } => true,
            NodeTest::Wildcard { prefix } => expected_namespace(prefix).as_deref() == actual,
            _ => false,
        }
    }

    fn document_order(&self, mut nodes: Vec<QueryNode>) -> Vec<QueryNode> {
        nodes.sort_by_key(|node| node.order_key(self.document));
        nodes.dedup();
        nodes
    }

    // ------------------------------------------------------------------
    // Conversions
    // ------------------------------------------------------------------

    fn string_value(&self, node: QueryNode) -> String {
        match node {
            QueryNode::Node(id) => self.document.text_content(id),
            QueryNode::Attribute(attr) => self.document.attribute(attr).value.clone(),
        }
    }

    fn string(&self, value: &QueryValue) -> String {
        match value {
            QueryValue::Nodes(nodes) => nodes
                .first()
                .map(|&node| self.string_value(node))
                .unwrap_or_default(),
            QueryValue::Boolean(b) => b.to_string(),
            QueryValue::Number(n) => format_number(*n),
            QueryValue::String(s) => s.clone(),
        }
    }

    fn number(&self, value: &QueryValue) -> f64 {
        match value {
            QueryValue::Number(n) => *n,
            QueryValue::Boolean(b) => f64::from(u8::from(*b)),
            other => parse_number(&self.string(other)),
        }
    }

    pub fn boolean(&self, value: &QueryValue) -> bool {
        match value {
            QueryValue::Nodes(nodes) => !nodes.is_empty(),
            QueryValue::Boolean(b) => *b,
            QueryValue::Number(n) => *n != 0.0 && !n.is_nan(),
            QueryValue::String(s) => !s.is_empty(),
        }
    }

    fn compare(&self, op: Operator, left: &QueryValue, right: &QueryValue) -> bool {
        match (left, right) {
            (QueryValue::Nodes(a), QueryValue::Nodes(b)) => a.iter().any(|&x| {
                let x = self.string_value(x);
                b.iter()
                    .any(|&y| compare_strings(op, &x, &self.string_value(y)))
            }),
            (QueryValue::Nodes(nodes), other) => self.compare_nodes(op, nodes, other, false),
            (other, QueryValue::Nodes(nodes)) => self.compare_nodes(op, nodes, other, true),
            _ => self.compare_scalars(op, left, right),
        }
    }

    fn compare_nodes(&self, op: Operator, nodes: &[QueryNode], other: &QueryValue, swapped: bool) -> bool {
        if let QueryValue::Boolean(_) = other {
            let set = QueryValue::Boolean(!nodes.is_empty());
            return if swapped {
                self.compare_scalars(op, other, &set)
            } else {
                self.compare_scalars(op, &set, other)
            };
        }
        nodes.iter().any(|&node| {
            let value = QueryValue::String(self.string_value(node));
            if swapped {
                self.compare_scalars(op, other, &value)
            } else {
                self.compare_scalars(op, &value, other)
            }
        })
    }

    fn compare_scalars(&self, op: Operator, left: &QueryValue, right: &QueryValue) -> bool {
        match op {
            Operator::Eq | Operator::NotEq => {
                let equal = match (left, right) {
                    (QueryValue::Boolean(_), _) | (_, QueryValue::Boolean(_)) => {
                        self.boolean(left) == self.boolean(right)
                    }
                    (QueryValue::Number(_), _) | (_, QueryValue::Number(_)) => {
                        self.number(left) == self.number(right)
                    }
                    _ => self.string(left) == self.string(right),
                };
                equal == (op == Operator::Eq)
            }
            _ => compare_numbers(op, self.number(left), self.number(right)),
        }
    }

    // ------------------------------------------------------------------
    // Function library
    // ------------------------------------------------------------------

    fn function(&self, name: &str, args: &[Expr], ctx: Context) -> EvalResult<QueryValue> {
        let arity = |min: usize, max: usize| -> EvalResult<()> {
            if args.len() < min || args.len() > max {
                Err(format!("wrong number of arguments for {}()", name))
            } else {
                Ok(())
            }
        };
        let value = match name {
            "last" => {
                arity(0, 0)?;
                QueryValue::Number(ctx.size as f64)
            }
            "position" => {
                arity(0, 0)?;
                QueryValue::Number(ctx.position as f64)
            }
            "count" => {
                arity(1, 1)?;
                QueryValue::Number(self.node_set(&args[0], ctx)?.len() as f64)
            }
            "name" | "local-name" | "namespace-uri" => {
                arity(0, 1)?;
                let node = match args.first() {
                    Some(arg) => self.node_set(arg, ctx)?.first().copied(),
                    None => Some(ctx.node),
                };
                QueryValue::String(node.map(|node| self.name_part(name, node)).unwrap_or_default())
            }
            "string" => {
                arity(0, 1)?;
                QueryValue::String(self.string_arg(args.first(), ctx)?)
            }
            "concat" => {
                if args.len() < 2 {
                    return Err("concat() needs at least two arguments".to_string());
                }
                let mut result = String::new();
                for arg in args {
                    result.push_str(&self.string(&self.eval(arg, ctx)?));
                }
                QueryValue::String(result)
            }
            "starts-with" | "ends-with" | "contains" => {
                arity(2, 2)?;
                let haystack = self.string(&self.eval(&args[0], ctx)?);
                let needle = self.string(&self.eval(&args[1], ctx)?);
                QueryValue::Boolean(match name {
                    "starts-with" => haystack.starts_with(&needle),
                    "ends-with" => haystack.ends_with(&needle),
                    _ => haystack.contains(&needle),
                })
            }
            "substring" => {
                arity(2, 3)?;
                let text = self.string(&self.eval(&args[0], ctx)?);
                let start = self.number(&self.eval(&args[1], ctx)?);
                let length = match args.get(2) {
                    Some(arg) => Some(self.number(&self.eval(arg, ctx)?)),
                    None => None,
                };
                QueryValue::String(substring(&text, start, length))
            }
            "string-length" => {
                arity(0, 1)?;
                QueryValue::Number(self.string_arg(args.first(), ctx)?.chars().count() as f64)
            }
            "normalize-space" => {
                arity(0, 1)?;
                let text = self.string_arg(args.first(), ctx)?;
                QueryValue::String(text.split_whitespace().collect::<Vec<_>>().join(" "))
            }
            "not" => {
                arity(1, 1)?;
                QueryValue::Boolean(!self.boolean(&self.eval(&args[0], ctx)?))
            }
            "true" => {
                arity(0, 0)?;
                QueryValue::Boolean(true)
            }
            "false" => {
                arity(0, 0)?;
                QueryValue::Boolean(false)
            }
            "boolean" => {
                arity(1, 1)?;
                QueryValue::Boolean(self.boolean(&self.eval(&args[0], ctx)?))
            }
            "number" => {
                arity(0, 1)?;
                let value = match args.first() {
                    Some(arg) => self.eval(arg, ctx)?,
                    None => QueryValue::Nodes(vec![ctx.node]),
                };
                QueryValue::Number(self.number(&value))
            }
            "sum" => {
                arity(1, 1)?;
                let total = self
                    .node_set(&args[0], ctx)?
                    .into_iter()
                    .map(|node| parse_number(&self.string_value(node)))
                    .sum();
                QueryValue::Number(total)
            }
            other => return Err(format!("unknown function {}()", other)),
        };
        Ok(value)
    }

    fn node_set(&self, expr: &Expr, ctx: Context) -> EvalResult<Vec<QueryNode>> {
        match self.eval(expr, ctx)? {
            QueryValue::Nodes(nodes) => Ok(nodes),
            _ => Err("argument is not a node-set".to_string()),
        }
    }

    fn string_arg(&self, arg: Option<&Expr>, ctx: Context) -> EvalResult<String> {
        match arg {
            Some(arg) => Ok(self.string(&self.eval(arg, ctx)?)),
            None => Ok(self.string_value(ctx.node)),
        }
    }

    fn name_part(&self, function: &str, node: QueryNode) -> String {
        let name = match node {
            QueryNode::Node(id) => self.document.name(id),
            QueryNode::Attribute(attr) => Some(&self.document.attribute(attr).name),
        };
        let Some(name) = name else {
            return String::new();
        };
        match function {
            "name" => name.qualified(),
            "local-name" => name.local.clone(),
            _ => name.namespace.clone().unwrap_or_default(),
        }
    }
}

fn compare_strings(op: Operator, a: &str, b: &str) -> bool {
    match op {
        Operator::Eq => a == b,
        Operator::NotEq => a != b,
        _ => compare_numbers(op, parse_number(a), parse_number(b)),
    }
}

fn compare_numbers(op: Operator, a: f64, b: f64) -> bool {
    match a.partial_cmp(&b) {
        None => op == Operator::NotEq,
        Some(ordering) => match op {
            Operator::Eq => ordering == Ordering::Equal,
            Operator::NotEq => ordering != Ordering::Equal,
            Operator::Lt => ordering == Ordering::Less,
            Operator::LtEq => ordering != Ordering::Greater,
            Operator::Gt => ordering == Ordering::Greater,
            Operator::GtEq => ordering != Ordering::Less,
            _ => false,
        },
    }
}

fn parse_number(text: &str) -> f64 {
    let trimmed = text.trim();
    let valid = !trimmed.is_empty()
        && trimmed
            .chars()
            .enumerate()
            .all(|(i, c)| c.is_ascii_digit() || c == '.' || (i == 0 && c == '-'));
    if valid {
        trimmed.parse().unwrap_or(f64::NAN)
    } else {
        f64::NAN
    }
}

fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        let text = if n > 0.0 { "Infinity" } else { "-Infinity" };
        text.to_string()
    } else if n == n.trunc() && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

/// XPath substring with 1-based, rounded positions.
fn substring(text: &str, start: f64, length: Option<f64>) -> String {
    let first = start.round();
    let last = match length {
        Some(length) => first + length.round(),
        None => f64::INFINITY,
    };
    text.chars()
        .enumerate()
        .filter(|(i, _)| {
            let position = (*i + 1) as f64;
            position >= first && position < last
        })
        .map(|(_, c)| c)
        .collect()
}
