//! Reader for the textual type notation used by tests and the CLI.
//!
//! ```text
//! class Out<out T>        // declarations, one per line
//! params T, R             // free type parameters in scope
//! P<out T, Rec<*>>?       // types
//! T=in String             // bindings
//! ```

use crate::compiler::analysis::substitution::SubstitutionMap;
use crate::compiler::analysis::variance::Variance;
use crate::compiler::errors::{ModelError, ParseError};
use crate::compiler::types::{Projection, Type, TypeContext, TypeHead, TypeParameter};
use std::sync::Arc;
use tracing::{debug, instrument};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Ident(String),
    Lt,
    Gt,
    Comma,
    Question,
    Star,
    Eq,
    End,
}

impl Token {
    fn describe(&self) -> String {
        match self {
            Token::Ident(name) => format!("'{}'", name),
            Token::Lt => "'<'".to_string(),
            Token::Gt => "'>'".to_string(),
            Token::Comma => "','".to_string(),
            Token::Question => "'?'".to_string(),
            Token::Star => "'*'".to_string(),
            Token::Eq => "'='".to_string(),
            Token::End => "end of input".to_string(),
        }
    }
}

fn tokenize(line: usize, source: &str) -> Result<Vec<(Token, usize)>, ParseError> {
    let mut tokens = Vec::new();
    let mut chars = source.char_indices().peekable();

    while let Some(&(offset, c)) = chars.peek() {
        let column = offset + 1;
        let single = match c {
            '<' => Some(Token::Lt),
            '>' => Some(Token::Gt),
            ',' => Some(Token::Comma),
            '?' => Some(Token::Question),
            '*' => Some(Token::Star),
            '=' => Some(Token::Eq),
            _ => None,
        };

        if let Some(token) = single {
            chars.next();
            tokens.push((token, column));
        } else if c.is_whitespace() {
            chars.next();
        } else if c.is_alphabetic() || c == '_' {
            let mut name = String::new();
            while let Some(&(_, c)) = chars.peek() {
                if c.is_alphanumeric() || c == '_' {
                    name.push(c);
                    chars.next();
                } else {
                    break;
                }
            }
            tokens.push((Token::Ident(name), column));
        } else {
            return Err(ParseError::syntax(line, column, format!("unexpected character '{}'", c)));
        }
    }

    tokens.push((Token::End, source.len() + 1));
    Ok(tokens)
}

fn strip_comment(line: &str) -> &str {
    match line.find("//") {
        Some(index) => &line[..index],
        None => line,
    }
}

struct Parser<'c> {
    ctx: &'c TypeContext,
    tokens: Vec<(Token, usize)>,
    pos: usize,
    line: usize,
}

impl<'c> Parser<'c> {
    fn new(ctx: &'c TypeContext, line: usize, source: &str) -> Result<Self, ParseError> {
        Ok(Self {
            ctx,
            tokens: tokenize(line, source)?,
            pos: 0,
            line,
        })
    }

    fn peek(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)].0
    }

    fn peek_second(&self) -> &Token {
        &self.tokens[(self.pos + 1).min(self.tokens.len() - 1)].0
    }

    fn column(&self) -> usize {
        self.tokens[self.pos.min(self.tokens.len() - 1)].1
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        token
    }

    fn eat(&mut self, expected: &Token) -> bool {
        if self.peek() == expected {
            self.advance();
            true
        } else {
            false
        }
    }

    fn error(&self, message: impl Into<String>) -> ParseError {
        ParseError::syntax(self.line, self.column(), message)
    }

    fn model(&self, error: ModelError) -> ParseError {
        ParseError::Model { line: self.line, error }
    }

    fn expect(&mut self, expected: Token) -> Result<(), ParseError> {
        if self.eat(&expected) {
            Ok(())
        } else {
            Err(self.error(format!(
                "expected {}, found {}",
                expected.describe(),
                self.peek().describe()
            )))
        }
    }

    fn ident(&mut self, what: &str) -> Result<String, ParseError> {
        match self.peek().clone() {
            Token::Ident(name) => {
                self.advance();
                Ok(name)
            }
            other => Err(self.error(format!("expected {}, found {}", what, other.describe()))),
        }
    }

    fn finish(&mut self) -> Result<(), ParseError> {
        self.expect(Token::End)
    }

    /// `out`/`in` only count as keywords when another name follows.
    fn variance_keyword(&mut self) -> Variance {
        let variance = match self.peek() {
            Token::Ident(word) if word == "out" => Variance::Out,
            Token::Ident(word) if word == "in" => Variance::In,
            _ => return Variance::Invariant,
        };
        if matches!(self.peek_second(), Token::Ident(_)) {
            self.advance();
            variance
        } else {
            Variance::Invariant
        }
    }

    fn parse_type(&mut self) -> Result<Type, ParseError> {
        let name = self.ident("type name")?;
        let head = self.ctx.resolve(&name).map_err(|e| self.model(e))?;

        let mut arguments = Vec::new();
        if self.eat(&Token::Lt) {
            loop {
                arguments.push(self.parse_projection()?);
                if !self.eat(&Token::Comma) {
                    break;
                }
            }
            self.expect(Token::Gt)?;
        }

        let ty = match head {
            TypeHead::Class(decl) => Type::class(&decl, arguments).map_err(|e| self.model(e))?,
            TypeHead::Parameter(param) => {
                if !arguments.is_empty() {
                    return Err(self.error(format!("type parameter {} takes no arguments", name)));
                }
                Type::parameter(&param)
            }
        };

        Ok(ty.with_nullable(self.eat(&Token::Question)))
    }

    fn parse_projection(&mut self) -> Result<Projection, ParseError> {
        if self.eat(&Token::Star) {
            return Ok(Projection::Star);
        }
        let variance = self.variance_keyword();
        Ok(Projection::new(variance, self.parse_type()?))
    }

    fn parse_binding(&mut self) -> Result<(Arc<TypeParameter>, Projection), ParseError> {
        let name = self.ident("type parameter name")?;
        let param = self.ctx.require_parameter(&name).map_err(|e| self.model(e))?;
        self.expect(Token::Eq)?;
        let projection = self.parse_projection()?;
        Ok((param, projection))
    }

    fn parse_declaration(&mut self) -> Result<(), ParseError> {
        match self.ident("'class' or 'params'")?.as_str() {
            "class" => {
                let name = self.ident("class name")?;
                let mut parameters = Vec::new();
                if self.eat(&Token::Lt) {
                    loop {
                        let variance = self.variance_keyword();
                        parameters.push((self.ident("type parameter name")?, variance));
                        if !self.eat(&Token::Comma) {
                            break;
                        }
                    }
                    self.expect(Token::Gt)?;
                }
                self.ctx
                    .declare_class(&name, parameters.iter().map(|(n, v)| (n.as_str(), *v)))
                    .map_err(|e| self.model(e))?;
            }
            "params" => loop {
                let name = self.ident("type parameter name")?;
                self.ctx.declare_parameter(&name).map_err(|e| self.model(e))?;
                if !self.eat(&Token::Comma) {
                    break;
                }
            },
            other => {
                return Err(ParseError::syntax(
                    self.line,
                    1,
                    format!("expected 'class' or 'params', found '{}'", other),
                ))
            }
        }
        self.finish()
    }
}

/// Read declarations into `ctx`, one per line. Returns how many were read.
#[instrument(skip(ctx, source), fields(source_len = source.len()))]
pub fn parse_declarations(ctx: &TypeContext, source: &str) -> Result<usize, ParseError> {
    let mut count = 0;
    for (index, raw) in source.lines().enumerate() {
        let line = strip_comment(raw);
        if line.trim().is_empty() {
            continue;
        }
        Parser::new(ctx, index + 1, line)?.parse_declaration()?;
        count += 1;
    }
    debug!(count, "declarations read");
    Ok(count)
}

pub fn parse_type(ctx: &TypeContext, source: &str) -> Result<Type, ParseError> {
    let mut parser = Parser::new(ctx, 1, source)?;
    let ty = parser.parse_type()?;
    parser.finish()?;
    Ok(ty)
}

pub fn parse_projection(ctx: &TypeContext, source: &str) -> Result<Projection, ParseError> {
    let mut parser = Parser::new(ctx, 1, source)?;
    let projection = parser.parse_projection()?;
    parser.finish()?;
    Ok(projection)
}

/// Read `T=in String` into the parameter and its replacement.
pub fn parse_binding(ctx: &TypeContext, source: &str) -> Result<(Arc<TypeParameter>, Projection), ParseError> {
    let mut parser = Parser::new(ctx, 1, source)?;
    let binding = parser.parse_binding()?;
    parser.finish()?;
    Ok(binding)
}

/// Build a map from several bindings; `line` in errors is the binding's position.
pub fn parse_substitution<I, S>(ctx: &TypeContext, bindings: I) -> Result<SubstitutionMap, ParseError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut pairs = Vec::new();
    for (index, binding) in bindings.into_iter().enumerate() {
        let mut parser = Parser::new(ctx, index + 1, binding.as_ref())?;
        let (param, projection) = parser.parse_binding()?;
        parser.finish()?;
        pairs.push((param.id(), projection));
    }
    Ok(SubstitutionMap::new(pairs))
}
