use std::fmt;
use std::iter::Peekable;

use crate::PlatformExpr;
use crate::lexer::{Lexer, Token};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub struct ParseError {
    message: String,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

fn err(message: impl Into<String>) -> ParseError {
    ParseError {
        message: message.into(),
    }
}

/// Which binary connective the current chain has committed to. `None` means
/// no connective has been seen yet at this nesting level.
#[derive(Clone, Copy, PartialEq, Eq)]
enum Connective {
    And,
    Or,
}

struct Parser<'a> {
    input: &'a str,
    tokens: Peekable<Lexer<'a>>,
}

pub fn parse(input: &str) -> Result<PlatformExpr, ParseError> {
    let mut parser = Parser {
        input,
        tokens: Lexer::new(input).peekable(),
    };
    if input.trim().is_empty() {
        return Err(err("expected a platform expression but found nothing"));
    }
    let expr = parser.expr()?;
    if let Some((start, _, _)) = parser.tokens.next() {
        return Err(err(format!(
            "unexpected content `{}` found after platform expression",
            parser.input[start..].trim_end()
        )));
    }
    Ok(expr)
}

impl<'a> Parser<'a> {
    /// expr := chain (('&' chain)* | ('|' chain)*) -- a single connective per level
    fn expr(&mut self) -> Result<PlatformExpr, ParseError> {
        let first = self.unary()?;
        let mut connective: Option<Connective> = None;
        let mut parts = vec![first];
        loop {
            let which = match self.tokens.peek() {
                Some((_, Token::And, _)) => Connective::And,
                Some((_, Token::Or, _)) => Connective::Or,
                _ => break,
            };
            match connective {
                None => connective = Some(which),
                Some(c) if c == which => {}
                Some(_) => {
                    return Err(err(
                        "cannot mix `&` and `|` in a platform expression without parentheses",
                    ));
                }
            }
            self.tokens.next();
            parts.push(self.unary()?);
        }
        Ok(match connective {
            None => parts.into_iter().next().unwrap(),
            Some(Connective::And) => PlatformExpr::All(parts),
            Some(Connective::Or) => PlatformExpr::Any(parts),
        })
    }

    fn unary(&mut self) -> Result<PlatformExpr, ParseError> {
        match self.tokens.peek().copied() {
            Some((_, Token::Not, _)) => {
                self.tokens.next();
                Ok(PlatformExpr::Not(Box::new(self.unary()?)))
            }
            Some((_, Token::LeftParen, _)) => {
                self.tokens.next();
                let inner = self.expr()?;
                match self.tokens.next() {
                    Some((_, Token::RightParen, _)) => Ok(inner),
                    Some((start, tok, _)) => Err(err(format!(
                        "expected `)` but found `{}` at position {}",
                        tok, start
                    ))),
                    None => Err(err("unterminated parenthesized platform expression")),
                }
            }
            Some((_, Token::Ident(name), _)) => {
                self.tokens.next();
                Ok(PlatformExpr::Ident(name.to_string()))
            }
            Some((start, tok, _)) => Err(err(format!(
                "expected identifier, `!`, or `(` but found `{}` at position {}",
                tok, start
            ))),
            None => Err(err("expected a platform expression but cfg expression ended")),
        }
    }
}
