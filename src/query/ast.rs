//! Syntax tree of a compiled query.

use super::lexer::Operator;

/// Navigation axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    Child,
    Descendant,
    DescendantOrSelf,
    SelfAxis,
    Parent,
    Ancestor,
    AncestorOrSelf,
    Attribute,
    FollowingSibling,
    PrecedingSibling,
}

impl Axis {
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "child" => Axis::Child,
            "descendant" => Axis::Descendant,
            "descendant-or-self" => Axis::DescendantOrSelf,
            "self" => Axis::SelfAxis,
            "parent" => Axis::Parent,
            "ancestor" => Axis::Ancestor,
            "ancestor-or-self" => Axis::AncestorOrSelf,
            "attribute" => Axis::Attribute,
            "following-sibling" => Axis::FollowingSibling,
            "preceding-sibling" => Axis::PrecedingSibling,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeTest {
    /// `name` or `prefix:name`
    Name { prefix: Option<String>, local: String },
    /// `*` or `prefix:*`
    Wildcard { prefix: Option<String> },
    /// `node()`
    AnyNode,
    /// `text()`
    Text,
    /// `comment()`
    Comment,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    pub axis: Axis,
    pub test: NodeTest,
    pub predicates: Vec<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Binary(Operator, Box<Expr>, Box<Expr>),
    Negate(Box<Expr>),
    /// A location path, rooted at the document when `absolute`.
    Path { absolute: bool, steps: Vec<Step> },
    /// A primary expression filtered by predicates and followed by steps.
    Filter {
        primary: Box<Expr>,
        predicates: Vec<Expr>,
        steps: Vec<Step>,
    },
    Literal(String),
    Number(f64),
    Function(String, Vec<Expr>),
}

impl Expr {
    /// Whether any part of the expression depends on resolved namespaces.
    pub fn uses_namespaces(&self) -> bool {
        match self {
            Expr::Binary(_, left, right) => left.uses_namespaces() || right.uses_namespaces(),
            Expr::Negate(inner) => inner.uses_namespaces(),
            Expr::Path { steps, .. } => steps.iter().any(Step::uses_namespaces),
            Expr::Filter {
                primary,
                predicates,
                steps,
            } => {
                primary.uses_namespaces()
                    || predicates.iter().any(Expr::uses_namespaces)
                    || steps.iter().any(Step::uses_namespaces)
            }
            Expr::Function(name, args) => {
                name == "namespace-uri" || args.iter().any(Expr::uses_namespaces)
            }
            Expr::Literal(_) | Expr::Number(_) => false,
        }
    }
}

impl Step {
    fn uses_namespaces(&self) -> bool {
        let prefixed = matches!(
            &self.test,
            NodeTest::Name { prefix: Some(_), .. } | NodeTest::Wildcard { prefix: Some(_) }
        );
        prefixed || self.predicates.iter().any(Expr::uses_namespaces)
    }
}
