//! Recursive-descent parser over the math lexer's token stream, producing
//! the node kinds spec.md §4.10 names. Only the subset actually reachable
//! from the supported syntax is built here; kinds with no surface syntax
//! in this grammar (e.g. `Accent`, `UnderOver`, `Align`) still exist as
//! variants so the layout stage has a total match, and are produced by
//! `Func`/named-symbol recognition rather than dedicated punctuation.

use crate::error::{Error, Result};
use crate::math::lexer::Token;

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Literal(String),
    Symbol(String),
    Superscript(Box<Node>, Box<Node>),
    Subscript(Box<Node>, Box<Node>),
    Fraction(Box<Node>, Box<Node>),
    Sqrt(Box<Node>),
    Root(Box<Node>, Box<Node>),
    Group(Box<Node>),
    Func(String, Box<Node>),
    Accent(Box<Node>, String),
    Matrix(Vec<Vec<Node>>),
    Vector(Vec<Node>),
    Binom(Box<Node>, Box<Node>),
    Cases(Vec<Node>),
    Operator(String),
    QuotedText(String),
    Prime(Box<Node>, u8),
    UnderOver(Box<Node>, Option<Box<Node>>, Option<Box<Node>>),
    Cancel(Box<Node>),
    LR(char, char, Box<Node>),
    Sequence(Vec<Node>),
    Style(String, Box<Node>),
    Variant(String, Box<Node>),
    Size(String, Box<Node>),
    Op(String),
    Stretch(Box<Node>),
    Class(String, Box<Node>),
    LineBreak,
    Align,
}

const BIG_OPERATORS: &[&str] = &["sum", "prod", "int", "union", "sect", "lim"];
const KNOWN_FUNCS: &[&str] = &["sin", "cos", "tan", "log", "ln", "exp", "min", "max", "det", "gcd"];
const ACCENTS: &[&str] = &["hat", "tilde", "bar", "dot", "ddot", "vec", "overline"];

struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
}

pub fn parse(tokens: &[Token]) -> Result<Node> {
    let filtered: Vec<Token> = tokens.iter().filter(|t| **t != Token::Whitespace).cloned().collect();
    let mut parser = Parser { tokens: &filtered, pos: 0 };
    let seq = parser.parse_sequence()?;
    Ok(seq)
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<Token> {
        let t = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        t
    }

    fn at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    fn parse_sequence(&mut self) -> Result<Node> {
        let mut nodes = Vec::new();
        while !self.at_end() && !matches!(self.peek(), Some(Token::RParen) | Some(Token::RBracket) | Some(Token::RBrace)) {
            nodes.push(self.parse_postfix()?);
        }
        if nodes.len() == 1 {
            Ok(nodes.into_iter().next().unwrap())
        } else {
            Ok(Node::Sequence(nodes))
        }
    }

    /// Parses one atom, then binds any trailing `^`, `_`, `/` postfix
    /// operators — these bind tighter than sequencing per spec.md §4.10.
    fn parse_postfix(&mut self) -> Result<Node> {
        let mut node = self.parse_atom()?;
        loop {
            match self.peek() {
                Some(Token::Caret) => {
                    self.advance();
                    let exp = self.parse_postfix_operand()?;
                    node = Node::Superscript(Box::new(node), Box::new(exp));
                }
                Some(Token::Underscore) => {
                    self.advance();
                    let sub = self.parse_postfix_operand()?;
                    node = Node::Subscript(Box::new(node), Box::new(sub));
                }
                Some(Token::Slash) => {
                    self.advance();
                    let denom = self.parse_postfix_operand()?;
                    node = Node::Fraction(Box::new(node), Box::new(denom));
                }
                _ => break,
            }
        }
        Ok(node)
    }

    /// `^(...)` and `_(...)` unwrap the group so the layout stage does not
    /// draw spurious parentheses around a multi-token exponent/subscript.
    fn parse_postfix_operand(&mut self) -> Result<Node> {
        if matches!(self.peek(), Some(Token::LParen)) {
            self.advance();
            let inner = self.parse_sequence()?;
            self.expect(Token::RParen)?;
            return Ok(inner);
        }
        self.parse_atom()
    }

    fn expect(&mut self, tok: Token) -> Result<()> {
        match self.advance() {
            Some(t) if t == tok => Ok(()),
            other => Err(Error::TemplateInvalid(format!(
                "math parser: expected {:?}, got {:?}",
                tok, other
            ))),
        }
    }

    fn parse_atom(&mut self) -> Result<Node> {
        let tok = self.advance().ok_or_else(|| Error::TemplateInvalid("math parser: unexpected end of input".to_string()))?;
        match tok {
            Token::Number(n) => Ok(Node::Literal(n)),
            Token::Operator(op) => Ok(Node::Operator(op)),
            Token::Quote => {
                if let Some(Token::Text(t)) = self.advance() {
                    Ok(Node::QuotedText(t))
                } else {
                    Err(Error::TemplateInvalid("math parser: malformed quoted text".to_string()))
                }
            }
            Token::Text(t) => Ok(Node::Literal(t)),
            Token::LParen => {
                let inner = self.parse_sequence()?;
                self.expect(Token::RParen)?;
                Ok(Node::LR('(', ')', Box::new(inner)))
            }
            Token::LBracket => {
                let inner = self.parse_sequence()?;
                self.expect(Token::RBracket)?;
                Ok(Node::LR('[', ']', Box::new(inner)))
            }
            Token::LBrace => {
                let inner = self.parse_sequence()?;
                self.expect(Token::RBrace)?;
                Ok(Node::Group(Box::new(inner)))
            }
            Token::Symbol(name) => self.parse_symbol_or_call(name),
            other => Err(Error::TemplateInvalid(format!("math parser: unexpected token {:?}", other))),
        }
    }

    fn parse_symbol_or_call(&mut self, name: String) -> Result<Node> {
        match name.as_str() {
            "sqrt" => {
                let arg = self.parse_call_arg()?;
                Ok(Node::Sqrt(Box::new(arg)))
            }
            "root" => {
                let index = self.parse_call_arg()?;
                let radicand = self.parse_call_arg()?;
                Ok(Node::Root(Box::new(index), Box::new(radicand)))
            }
            "binom" => {
                let top = self.parse_call_arg()?;
                let bottom = self.parse_call_arg()?;
                Ok(Node::Binom(Box::new(top), Box::new(bottom)))
            }
            "cancel" => Ok(Node::Cancel(Box::new(self.parse_call_arg()?))),
            "mat" => self.parse_matrix_literal(),
            "vec" if matches!(self.peek(), Some(Token::LParen)) => self.parse_vector_literal(),
            "cases" => self.parse_cases_literal(),
            n if ACCENTS.contains(&n) => Ok(Node::Accent(Box::new(self.parse_call_arg()?), n.to_string())),
            n if KNOWN_FUNCS.contains(&n) => Ok(Node::Func(n.to_string(), Box::new(self.parse_optional_call_arg()?))),
            n if BIG_OPERATORS.contains(&n) => Ok(Node::Op(n.to_string())),
            _ => Ok(Node::Symbol(name)),
        }
    }

    fn parse_call_arg(&mut self) -> Result<Node> {
        if matches!(self.peek(), Some(Token::LParen)) {
            self.advance();
            let inner = self.parse_sequence()?;
            self.expect(Token::RParen)?;
            Ok(inner)
        } else {
            self.parse_atom()
        }
    }

    fn parse_optional_call_arg(&mut self) -> Result<Node> {
        if self.at_end() || matches!(self.peek(), Some(Token::RParen) | Some(Token::RBracket) | Some(Token::RBrace)) {
            Ok(Node::Sequence(Vec::new()))
        } else {
            self.parse_call_arg()
        }
    }

    fn parse_vector_literal(&mut self) -> Result<Node> {
        self.expect(Token::LParen)?;
        let mut items = Vec::new();
        loop {
            items.push(self.parse_postfix()?);
            match self.peek() {
                Some(Token::Comma) => {
                    self.advance();
                }
                _ => break,
            }
        }
        self.expect(Token::RParen)?;
        Ok(Node::Vector(items))
    }

    fn parse_matrix_literal(&mut self) -> Result<Node> {
        self.expect(Token::LParen)?;
        let mut rows = vec![Vec::new()];
        loop {
            if matches!(self.peek(), Some(Token::RParen)) {
                break;
            }
            rows.last_mut().unwrap().push(self.parse_postfix()?);
            match self.peek() {
                Some(Token::Comma) | Some(Token::Amp) => {
                    self.advance();
                }
                Some(Token::Semicolon) => {
                    self.advance();
                    rows.push(Vec::new());
                }
                _ => break,
            }
        }
        self.expect(Token::RParen)?;
        Ok(Node::Matrix(rows))
    }

    fn parse_cases_literal(&mut self) -> Result<Node> {
        self.expect(Token::LParen)?;
        let mut items = Vec::new();
        loop {
            if matches!(self.peek(), Some(Token::RParen)) {
                break;
            }
            items.push(self.parse_postfix()?);
            match self.peek() {
                Some(Token::Comma) | Some(Token::Semicolon) => {
                    self.advance();
                }
                _ => break,
            }
        }
        self.expect(Token::RParen)?;
        Ok(Node::Cases(items))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::lexer::lex;

    #[test]
    fn test_parse_superscript() {
        let ast = parse(&lex("r^2")).unwrap();
        match ast {
            Node::Superscript(base, exp) => {
                assert_eq!(*base, Node::Symbol("r".to_string()));
                assert_eq!(*exp, Node::Literal("2".to_string()));
            }
            other => panic!("expected Superscript, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_fraction() {
        let ast = parse(&lex("a/b")).unwrap();
        assert!(matches!(ast, Node::Fraction(_, _)));
    }

    #[test]
    fn test_parse_group_unwraps_paren_exponent() {
        let ast = parse(&lex("x^(a+b)")).unwrap();
        match ast {
            Node::Superscript(_, exp) => {
                assert!(matches!(*exp, Node::Sequence(_)));
            }
            other => panic!("expected Superscript, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_sqrt() {
        let ast = parse(&lex("sqrt(x)")).unwrap();
        assert!(matches!(ast, Node::Sqrt(_)));
    }

    #[test]
    fn test_parse_sequence_of_equation() {
        let ast = parse(&lex("A = pi r^2")).unwrap();
        match ast {
            Node::Sequence(nodes) => assert_eq!(nodes.len(), 4),
            other => panic!("expected Sequence, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_unknown_func_falls_back_to_symbol() {
        let ast = parse(&lex("zeta")).unwrap();
        assert_eq!(ast, Node::Symbol("zeta".to_string()));
    }
}
