//! Recursive-descent parser turning a token stream into a `Node` tree.

use crate::error::GError;
use crate::lexer::{Lexer, Span, Token, TokenKind};

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    String(String),
    Number(f64),
    Boolean(bool),
    Nil,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExecutionTarget {
    /// `@<ref>` — invoke the referenced object's `run` attribute.
    ObjectRun(Box<Node>),
    /// `@<ref>.<attr>` — invoke that attribute's source directly.
    ObjectAttr(Box<Node>, String),
    /// `@<symbol>` — parse and evaluate the G source held in a variable.
    Variable(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum SendPayload {
    Literal(String),
    Execution(ExecutionTarget),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    List(Vec<Node>, Span),
    Literal(Literal, Span),
    ObjectRef(String, Span),
    /// A bare symbol in value position: a variable reference or, in head
    /// position inside a `List`, the name of a callee.
    Symbol(String, Span),
    AttributeAccess {
        base: Box<Node>,
        attr: String,
        span: Span,
    },
    Execution {
        target: ExecutionTarget,
        span: Span,
    },
    Send {
        target: Box<Node>,
        payload: SendPayload,
        span: Span,
    },
}

impl Node {
    pub fn span(&self) -> Span {
        match self {
            Node::List(_, s)
            | Node::Literal(_, s)
            | Node::ObjectRef(_, s)
            | Node::Symbol(_, s)
            | Node::AttributeAccess { span: s, .. }
            | Node::Execution { span: s, .. }
            | Node::Send { span: s, .. } => *s,
        }
    }
}

pub fn parse(source: &str) -> Result<Node, GError> {
    let tokens = Lexer::new(source).tokenize()?;
    let mut parser = Parser { tokens, pos: 0 };
    let node = parser.parse_expr()?;
    parser.expect_eof()?;
    Ok(node)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> &Token {
        &self.tokens[self.pos]
    }

    fn advance(&mut self) -> Token {
        let tok = self.tokens[self.pos].clone();
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        tok
    }

    fn expect_eof(&self) -> Result<(), GError> {
        match &self.peek().kind {
            TokenKind::Eof => Ok(()),
            other => Err(GError::parse_failure(
                format!("unexpected trailing token {other}"),
                self.peek().span,
            )),
        }
    }

    fn parse_expr(&mut self) -> Result<Node, GError> {
        let mut node = self.parse_postfix()?;
        if matches!(self.peek().kind, TokenKind::Quote) {
            node = self.parse_send(node)?;
        }
        Ok(node)
    }

    /// Parses a primary expression, then any trailing `.symbol` chain,
    /// left-associatively.
    fn parse_postfix(&mut self) -> Result<Node, GError> {
        let mut node = self.parse_primary()?;
        while matches!(self.peek().kind, TokenKind::Dot) {
            let dot_span = self.advance().span;
            let attr = self.expect_symbol_name()?;
            let span = Span::new(node.span().start, dot_span.end.max(attr.1.end));
            node = Node::AttributeAccess {
                base: Box::new(node),
                attr: attr.0,
                span,
            };
        }
        Ok(node)
    }

    fn parse_primary(&mut self) -> Result<Node, GError> {
        let tok = self.advance();
        match tok.kind {
            TokenKind::LBracket => self.parse_list(tok.span),
            TokenKind::At => self.parse_execution(tok.span),
            TokenKind::ObjRef(name) => Ok(Node::ObjectRef(name, tok.span)),
            TokenKind::String(s) => Ok(Node::Literal(Literal::String(s), tok.span)),
            TokenKind::Number(n) => Ok(Node::Literal(Literal::Number(n), tok.span)),
            TokenKind::Symbol(s) => Ok(symbol_or_literal(s, tok.span)),
            other => Err(GError::parse_failure(
                format!("unexpected token {other}"),
                tok.span,
            )),
        }
    }

    fn parse_list(&mut self, open_span: Span) -> Result<Node, GError> {
        let mut items = Vec::new();
        loop {
            // Commas behave exactly like whitespace: skip any run of them.
            while matches!(self.peek().kind, TokenKind::Comma) {
                self.advance();
            }
            if matches!(self.peek().kind, TokenKind::RBracket) {
                break;
            }
            if matches!(self.peek().kind, TokenKind::Eof) {
                return Err(GError::parse_failure("unterminated list", open_span));
            }
            items.push(self.parse_expr()?);
        }
        let close = self.advance();
        Ok(Node::List(items, Span::new(open_span.start, close.span.end)))
    }

    fn parse_execution(&mut self, at_span: Span) -> Result<Node, GError> {
        match &self.peek().kind {
            TokenKind::ObjRef(_) => {
                let reference = self.parse_primary()?;
                if matches!(self.peek().kind, TokenKind::Dot) {
                    self.advance();
                    let (attr, attr_span) = self.expect_symbol_name()?;
                    let span = Span::new(at_span.start, attr_span.end);
                    Ok(Node::Execution {
                        target: ExecutionTarget::ObjectAttr(Box::new(reference), attr),
                        span,
                    })
                } else {
                    let span = Span::new(at_span.start, reference.span().end);
                    Ok(Node::Execution {
                        target: ExecutionTarget::ObjectRun(Box::new(reference)),
                        span,
                    })
                }
            }
            TokenKind::Symbol(_) => {
                let (name, name_span) = self.expect_symbol_name()?;
                let span = Span::new(at_span.start, name_span.end);
                Ok(Node::Execution {
                    target: ExecutionTarget::Variable(name),
                    span,
                })
            }
            other => Err(GError::parse_failure(
                format!("expected object reference or symbol after '@', found {other}"),
                self.peek().span,
            )),
        }
    }

    fn parse_send(&mut self, target: Node) -> Result<Node, GError> {
        let quote_span = self.advance().span; // Quote
        let (payload, payload_end) = match &self.peek().kind {
            TokenKind::String(_) => {
                let tok = self.advance();
                let TokenKind::String(s) = tok.kind else {
                    unreachable!()
                };
                (SendPayload::Literal(s), tok.span.end)
            }
            TokenKind::At => {
                let exec = self.parse_execution(self.peek().span)?;
                let Node::Execution { target, span } = exec else {
                    unreachable!()
                };
                (SendPayload::Execution(target), span.end)
            }
            other => {
                return Err(GError::parse_failure(
                    format!("expected send payload (string or @-expression), found {other}"),
                    quote_span,
                ));
            }
        };
        let span = Span::new(target.span().start, payload_end);
        Ok(Node::Send {
            target: Box::new(target),
            payload,
            span,
        })
    }

    fn expect_symbol_name(&mut self) -> Result<(String, Span), GError> {
        let tok = self.advance();
        match tok.kind {
            TokenKind::Symbol(s) => Ok((s, tok.span)),
            other => Err(GError::parse_failure(
                format!("expected attribute or variable name, found {other}"),
                tok.span,
            )),
        }
    }
}

fn symbol_or_literal(name: String, span: Span) -> Node {
    match name.as_str() {
        "true" => Node::Literal(Literal::Boolean(true), span),
        "false" => Node::Literal(Literal::Boolean(false), span),
        "null" | "nil" => Node::Literal(Literal::Nil, span),
        _ => Node::Symbol(name, span),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_list_parses_to_empty_node_list() {
        let node = parse("[]").unwrap();
        assert_eq!(node, Node::List(vec![], Span::new(0, 2)));
    }

    #[test]
    fn commas_and_spaces_are_equivalent_separators() {
        let a = parse("[a b c]").unwrap();
        let b = parse("[a, b, c]").unwrap();
        let c = parse("[a,,b,,,c]").unwrap();
        let d = parse("[ a , b , c ]").unwrap();
        let strip_spans = |n: &Node| format!("{n:?}");
        // Spans differ across inputs but structure (symbols in order) matches.
        let names = |n: &Node| match n {
            Node::List(items, _) => items
                .iter()
                .map(|i| match i {
                    Node::Symbol(s, _) => s.clone(),
                    _ => panic!("expected symbol"),
                })
                .collect::<Vec<_>>(),
            _ => panic!("expected list"),
        };
        assert_eq!(names(&a), vec!["a", "b", "c"]);
        assert_eq!(names(&b), names(&a));
        assert_eq!(names(&c), names(&a));
        assert_eq!(names(&d), names(&a));
        let _ = strip_spans(&a);
    }

    #[test]
    fn empty_string_element_is_preserved() {
        let node = parse("[a,b,\"\",c]").unwrap();
        let Node::List(items, _) = node else { panic!("expected list") };
        assert_eq!(items.len(), 4);
        assert_eq!(items[2], Node::Literal(Literal::String(String::new()), items[2].span()));
    }

    #[test]
    fn attribute_access_is_left_associative() {
        let node = parse("#a.b.c").unwrap();
        match node {
            Node::AttributeAccess { base, attr, .. } => {
                assert_eq!(attr, "c");
                match *base {
                    Node::AttributeAccess { attr, .. } => assert_eq!(attr, "b"),
                    _ => panic!("expected nested attribute access"),
                }
            }
            _ => panic!("expected attribute access"),
        }
    }

    #[test]
    fn execution_forms_parse() {
        assert!(matches!(
            parse("@#obj").unwrap(),
            Node::Execution {
                target: ExecutionTarget::ObjectRun(_),
                ..
            }
        ));
        assert!(matches!(
            parse("@#obj.attr").unwrap(),
            Node::Execution {
                target: ExecutionTarget::ObjectAttr(_, _),
                ..
            }
        ));
        assert!(matches!(
            parse("@myvar").unwrap(),
            Node::Execution {
                target: ExecutionTarget::Variable(_),
                ..
            }
        ));
    }

    #[test]
    fn send_with_literal_payload_parses() {
        let node = parse("#r\"hello\"").unwrap();
        match node {
            Node::Send { target, payload, .. } => {
                assert!(matches!(*target, Node::ObjectRef(ref s, _) if s == "#r"));
                assert_eq!(payload, SendPayload::Literal("hello".to_string()));
            }
            other => panic!("expected send, got {other:?}"),
        }
    }

    #[test]
    fn literals_true_false_nil_are_recognized() {
        assert_eq!(parse("true").unwrap(), Node::Literal(Literal::Boolean(true), Span::new(0, 4)));
        assert_eq!(parse("false").unwrap(), Node::Literal(Literal::Boolean(false), Span::new(0, 5)));
        assert_eq!(parse("nil").unwrap(), Node::Literal(Literal::Nil, Span::new(0, 3)));
    }

    #[test]
    fn head_position_symbol_makes_a_callee_list() {
        let node = parse("[+ 1 2]").unwrap();
        let Node::List(items, _) = node else { panic!("expected list") };
        assert!(matches!(items[0], Node::Symbol(ref s, _) if s == "+"));
    }
}
