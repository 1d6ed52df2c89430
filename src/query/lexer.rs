//! Tokenizer for path-query expressions.

/// Binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Or,
    And,
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    Plus,
    Minus,
    Multiply,
    Div,
    Mod,
    Union,
}

/// A lexical token of an expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Slash,
    DoubleSlash,
    LBracket,
    RBracket,
    LParen,
    RParen,
    At,
    Comma,
    Dot,
    DotDot,
    DoubleColon,
    /// `*` in name-test position
    Star,
    Operator(Operator),
    Literal(String),
    Number(f64),
    /// NCName, `prefix:local` or `prefix:*`
    Name(String),
}

/// Splits an expression into tokens.
///
/// `*`, `and`, `or`, `div` and `mod` are operators only when the previous
/// token can end an operand; elsewhere they are name tests.
pub fn tokenize(expression: &str) -> Result<Vec<Token>, String> {
    let chars: Vec<char> = expression.chars().collect();
    let mut tokens: Vec<Token> = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if c.is_whitespace() {
            i += 1;
            continue;
        }
        let operator_position = follows_operand(tokens.last());
        let next = chars.get(i + 1).copied();
        let token = match c {
            '/' if next == Some('/') => {
                i += 2;
                Token::DoubleSlash
            }
            '/' => {
                i += 1;
                Token::Slash
            }
            '[' => {
                i += 1;
                Token::LBracket
            }
            ']' => {
                i += 1;
                Token::RBracket
            }
            '(' => {
                i += 1;
                Token::LParen
            }
            ')' => {
                i += 1;
                Token::RParen
            }
            '@' => {
                i += 1;
                Token::At
            }
            ',' => {
                i += 1;
                Token::Comma
            }
            '|' => {
                i += 1;
                Token::Operator(Operator::Union)
            }
            '+' => {
                i += 1;
                Token::Operator(Operator::Plus)
            }
            '-' => {
                i += 1;
                Token::Operator(Operator::Minus)
            }
            '=' => {
                i += 1;
                Token::Operator(Operator::Eq)
            }
            '!' if next == Some('=') => {
                i += 2;
                Token::Operator(Operator::NotEq)
            }
            '<' if next == Some('=') => {
                i += 2;
                Token::Operator(Operator::LtEq)
            }
            '<' => {
                i += 1;
                Token::Operator(Operator::Lt)
            }
            '>' if next == Some('=') => {
                i += 2;
                Token::Operator(Operator::GtEq)
            }
            '>' => {
                i += 1;
                Token::Operator(Operator::Gt)
            }
            ':' if next == Some(':') => {
                i += 2;
                Token::DoubleColon
            }
            '*' => {
                i += 1;
                if operator_position {
                    Token::Operator(Operator::Multiply)
                } else {
                    Token::Star
                }
            }
            '.' if next == Some('.') => {
                i += 2;
                Token::DotDot
            }
            '.' if !next.is_some_and(|n| n.is_ascii_digit()) => {
                i += 1;
                Token::Dot
            }
            '"' | '\'' => {
                let close = chars[i + 1..]
                    .iter()
                    .position(|&q| q == c)
                    .ok_or_else(|| "unterminated string literal".to_string())?;
                let literal: String = chars[i + 1..i + 1 + close].iter().collect();
                i += close + 2;
                Token::Literal(literal)
            }
            c if c.is_ascii_digit() || c == '.' => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                let text: String = chars[start..i].iter().collect();
                let number = text
                    .parse::<f64>()
                    .map_err(|_| format!("invalid number '{}'", text))?;
                Token::Number(number)
            }
            c if is_name_start(c) => {
                let start = i;
                i = scan_ncname(&chars, i);
                // prefix:local or prefix:*, but not the axis separator
                if chars.get(i) == Some(&':') && chars.get(i + 1) != Some(&':') {
                    match chars.get(i + 1) {
                        Some('*') => i += 2,
                        Some(&n) if is_name_start(n) => i = scan_ncname(&chars, i + 1),
                        _ => return Err(format!("invalid qualified name at offset {}", start)),
                    }
                }
                let name: String = chars[start..i].iter().collect();
                match (operator_position, name.as_str()) {
                    (true, "and") => Token::Operator(Operator::And),
                    (true, "or") => Token::Operator(Operator::Or),
                    (true, "div") => Token::Operator(Operator::Div),
                    (true, "mod") => Token::Operator(Operator::Mod),
                    _ => Token::Name(name),
                }
            }
            other => return Err(format!("unexpected character '{}'", other)),
        };
        tokens.push(token);
    }
    Ok(tokens)
}

fn follows_operand(previous: Option<&Token>) -> bool {
    match previous {
        None => false,
        Some(Token::At)
        | Some(Token::DoubleColon)
        | Some(Token::LParen)
        | Some(Token::LBracket)
        | Some(Token::Comma)
        | Some(Token::Slash)
        | Some(Token::DoubleSlash)
        | Some(Token::Operator(_)) => false,
        Some(_) => true,
    }
}

fn is_name_start(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

fn scan_ncname(chars: &[char], mut i: usize) -> usize {
    while i < chars.len() && (chars[i].is_alphanumeric() || matches!(chars[i], '_' | '-' | '.')) {
        i += 1;
    }
    i
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokenize_path() {
        let tokens = tokenize("//p:a[@x='1']/child::*").unwrap();
        assert_eq!(
            tokens,
            vec![
                Token::DoubleSlash,
                Token::Name("p:a".to_string()),
                Token::LBracket,
                Token::At,
                Token::Name("x".to_string()),
                Token::Operator(Operator::Eq),
                Token::Literal("1".to_string()),
                Token::RBracket,
                Token::Slash,
                Token::Name("child".to_string()),
                Token::DoubleColon,
                Token::Star,
            ]
        );
    }

    #[test]
    fn test_operator_disambiguation() {
        let tokens = tokenize("count(*) * 2 div 1 and or").unwrap();
        assert_eq!(tokens[2], Token::Star);
        assert_eq!(tokens[4], Token::Operator(Operator::Multiply));
        assert_eq!(tokens[6], Token::Operator(Operator::Div));
        assert_eq!(tokens[8], Token::Operator(Operator::And));
        // `or` after an operator is a name test
        assert_eq!(tokens[9], Token::Name("or".to_string()));
    }

    #[test]
    fn test_numbers_and_dots() {
        let tokens = tokenize(". .. 1.5 .5").unwrap();
        assert_eq!(
            tokens,
            vec![Token::Dot, Token::DotDot, Token::Number(1.5), Token::Number(0.5)]
        );
    }

    #[test]
    fn test_errors() {
        assert!(tokenize("'open").is_err());
        assert!(tokenize("a # b").is_err());
    }
}
