//! Recursive-descent parser from tokens to [`Expr`].

use super::ast::{Axis, Expr, NodeTest, Step};
use super::lexer::{Operator, Token};

/// Parses a complete token stream.
pub fn parse(tokens: Vec<Token>) -> Result<Expr, String> {
    let mut parser = Parser { tokens, pos: 0 };
    let expr = parser.or_expr()?;
    match parser.peek() {
        None => Ok(expr),
        Some(token) => Err(format!("unexpected token {:?}", token)),
    }
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn peek_at(&self, offset: usize) -> Option<&Token> {
        self.tokens.get(self.pos + offset)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn expect(&mut self, expected: Token) -> Result<(), String> {
        match self.advance() {
            Some(ref token) if *token == expected => Ok(()),
            Some(token) => Err(format!("expected {:?}, found {:?}", expected, token)),
            None => Err(format!("expected {:?}, found end of expression", expected)),
        }
    }

    fn eat_operator(&mut self, accepted: &[Operator]) -> Option<Operator> {
        match self.peek() {
            Some(Token::Operator(op)) if accepted.contains(op) => {
                let op = *op;
                self.pos += 1;
                Some(op)
            }
            _ => None,
        }
    }

    fn binary_level(
        &mut self,
        accepted: &[Operator],
        next: fn(&mut Self) -> Result<Expr, String>,
    ) -> Result<Expr, String> {
        let mut left = next(self)?;
        while let Some(op) = self.eat_operator(accepted) {
            let right = next(self)?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn or_expr(&mut self) -> Result<Expr, String> {
        self.binary_level(&[Operator::Or], Self::and_expr)
    }

    fn and_expr(&mut self) -> Result<Expr, String> {
        self.binary_level(&[Operator::And], Self::equality_expr)
    }

    fn equality_expr(&mut self) -> Result<Expr, String> {
        self.binary_level(&[Operator::Eq, Operator::NotEq], Self::relational_expr)
    }

    fn relational_expr(&mut self) -> Result<Expr, String> {
        self.binary_level(
            &[Operator::Lt, Operator::LtEq, Operator::Gt, Operator::GtEq],
            Self::additive_expr,
        )
    }

    fn additive_expr(&mut self) -> Result<Expr, String> {
        self.binary_level(&[Operator::Plus, Operator::Minus], Self::multiplicative_expr)
    }

    fn multiplicative_expr(&mut self) -> Result<Expr, String> {
        self.binary_level(
            &[Operator::Multiply, Operator::Div, Operator::Mod],
            Self::unary_expr,
        )
    }

    fn unary_expr(&mut self) -> Result<Expr, String> {
        if self.eat_operator(&[Operator::Minus]).is_some() {
            return Ok(Expr::Negate(Box::new(self.unary_expr()?)));
        }
        self.binary_level(&[Operator::Union], Self::path_expr)
    }

    fn path_expr(&mut self) -> Result<Expr, String> {
        if !self.starts_filter_expr() {
            return self.location_path();
        }

        let primary = self.primary_expr()?;
        let predicates = self.predicates()?;
        let mut steps = Vec::new();
        match self.peek() {
            Some(Token::Slash) => {
                self.pos += 1;
                self.relative_steps(&mut steps)?;
            }
            Some(Token::DoubleSlash) => {
                self.pos += 1;
                steps.push(descendant_or_self_step());
                self.relative_steps(&mut steps)?;
            }
            _ => {}
        }
        if predicates.is_empty() && steps.is_empty() {
            return Ok(primary);
        }
        Ok(Expr::Filter {
            primary: Box::new(primary),
            predicates,
            steps,
        })
    }

    fn starts_filter_expr(&self) -> bool {
        match self.peek() {
            Some(Token::Literal(_)) | Some(Token::Number(_)) | Some(Token::LParen) => true,
            Some(Token::Name(name)) => {
                matches!(self.peek_at(1), Some(Token::LParen)) && !is_node_type(name)
            }
            _ => false,
        }
    }

    fn primary_expr(&mut self) -> Result<Expr, String> {
        match self.advance() {
            Some(Token::Literal(value)) => Ok(Expr::Literal(value)),
            Some(Token::Number(value)) => Ok(Expr::Number(value)),
            Some(Token::LParen) => {
                let inner = self.or_expr()?;
                self.expect(Token::RParen)?;
                Ok(inner)
            }
            Some(Token::Name(name)) => {
                self.expect(Token::LParen)?;
                let mut args = Vec::new();
                if !matches!(self.peek(), Some(Token::RParen)) {
                    args.push(self.or_expr()?);
                    while matches!(self.peek(), Some(Token::Comma)) {
                        self.pos += 1;
                        args.push(self.or_expr()?);
                    }
                }
                self.expect(Token::RParen)?;
                Ok(Expr::Function(name, args))
            }
            Some(token) => Err(format!("unexpected token {:?}", token)),
            None => Err("unexpected end of expression".to_string()),
        }
    }

    fn location_path(&mut self) -> Result<Expr, String> {
        let mut steps = Vec::new();
        let absolute = match self.peek() {
            Some(Token::Slash) => {
                self.pos += 1;
                // a lone `/` selects the document node
                if self.starts_step() {
                    self.relative_steps(&mut steps)?;
                }
                true
            }
            Some(Token::DoubleSlash) => {
                self.pos += 1;
                steps.push(descendant_or_self_step());
                self.relative_steps(&mut steps)?;
                true
            }
            _ => {
                self.relative_steps(&mut steps)?;
                false
            }
        };
        Ok(Expr::Path { absolute, steps })
    }

    fn starts_step(&self) -> bool {
        matches!(
            self.peek(),
            Some(Token::Name(_))
                | Some(Token::Star)
                | Some(Token::At)
                | Some(Token::Dot)
                | Some(Token::DotDot)
        )
    }

    fn relative_steps(&mut self, steps: &mut Vec<Step>) -> Result<(), String> {
        steps.push(self.step()?);
        loop {
            match self.peek() {
                Some(Token::Slash) => {
                    self.pos += 1;
                    steps.push(self.step()?);
                }
                Some(Token::DoubleSlash) => {
                    self.pos += 1;
                    steps.push(descendant_or_self_step());
                    steps.push(self.step()?);
                }
                _ => return Ok(()),
            }
        }
    }

    fn step(&mut self) -> Result<Step, String> {
        match self.peek() {
            Some(Token::Dot) => {
                self.pos += 1;
                return Ok(Step {
                    axis: Axis::SelfAxis,
                    test: NodeTest::AnyNode,
                    predicates: Vec::new(),
                });
            }
            Some(Token::DotDot) => {
                self.pos += 1;
                return Ok(Step {
                    axis: Axis::Parent,
                    test: NodeTest::AnyNode,
                    predicates: Vec::new(),
                });
            }
            _ => {}
        }

        let axis = match (self.peek(), self.peek_at(1)) {
            (Some(Token::At), _) => {
                self.pos += 1;
                Axis::Attribute
            }
            (Some(Token::Name(name)), Some(Token::DoubleColon)) => {
                let axis = Axis::from_name(name).ok_or_else(|| format!("unknown axis '{}'", name))?;
                self.pos += 2;
                axis
            }
            _ => Axis::Child,
        };
        let test = self.node_test()?;
        let predicates = self.predicates()?;
        Ok(Step {
            axis,
            test,
            predicates,
        })
    }

    fn node_test(&mut self) -> Result<NodeTest, String> {
        match self.advance() {
            Some(Token::Star) => Ok(NodeTest::Wildcard { prefix: None }),
            Some(Token::Name(name)) => {
                if matches!(self.peek(), Some(Token::LParen)) && is_node_type(&name) {
                    self.pos += 1;
                    self.expect(Token::RParen)?;
                    return match name.as_str() {
                        "node" => Ok(NodeTest::AnyNode),
                        "text" => Ok(NodeTest::Text),
                        "comment" => Ok(NodeTest::Comment),
                        _ => Err(format!("unsupported node test '{}()'", name)),
                    };
                }
                match name.split_once(':') {
                    Some((prefix, "*")) => Ok(NodeTest::Wildcard {
                        prefix: Some(prefix.to_string()),
                    }),
                    Some((prefix, local)) => Ok(NodeTest::Name {
                        prefix: Some(prefix.to_string()),
                        local: local.to_string(),
                    }),
                    None => Ok(NodeTest::Name {
                        prefix: None,
                        local: name,
                    }),
                }
            }
            Some(token) => Err(format!("expected a node test, found {:?}", token)),
            None => Err("expected a node test, found end of expression".to_string()),
        }
    }

    fn predicates(&mut self) -> Result<Vec<Expr>, String> {
        let mut predicates = Vec::new();
        while matches!(self.peek(), Some(Token::LBracket)) {
            self.pos += 1;
            predicates.push(self.or_expr()?);
            self.expect(Token::RBracket)?;
        }
        Ok(predicates)
    }
}

fn is_node_type(name: &str) -> bool {
    matches!(name, "node" | "text" | "comment" | "processing-instruction")
}

fn descendant_or_self_step() -> Step {
    Step {
        axis: Axis::DescendantOrSelf,
        test: NodeTest::AnyNode,
        predicates: Vec::new(),
    }
}
