//! Recursive-descent compiler from expression text to typed trees.
//!
//! One `Parser` compiles one expression. It owns the symbol table built from
//! the lambda parameters and argument values, and a stack of implicit `it`
//! parameters that aggregate calls push while their arguments are parsed.

use std::collections::HashMap;
use std::sync::Arc;

use crate::compile::{Argument, ParamDecl};
use crate::context::CompileContext;
use crate::error::{ErrorKind, ParseError};
use crate::expr::{Expr, Lambda, Param};
use crate::lexer::{Lexer, Token, TokenKind};
use crate::promote::promote;
use crate::types::Type;

mod expressions;
mod members;
mod primary;


/// What an identifier in the symbol table stands for.
#[derive(Debug, Clone)]
enum Symbol {
    /// A parameter or argument value, used as is.
    Expr(Expr),
    /// A compiled lambda, invoked as `name(args)`.
    Lambda(Arc<Lambda>),
}

/// Deepest nesting of sub-expressions and prefix operators one compile
/// accepts. Keeps hostile input from exhausting the thread stack.
const MAX_DEPTH: usize = 64;

pub(crate) struct Parser<'a> {
    lexer: Lexer,
    token: Token,
    ctx: &'a CompileContext,
    /// Keyed by lowercase name.
    symbols: HashMap<String, Symbol>,
    it: Vec<Expr>,
    next_slot: usize,
    depth: usize,
}

impl<'a> Parser<'a> {
    pub(crate) fn new(ctx: &'a CompileContext, text: &str) -> Self {
        Parser {
            lexer: Lexer::new(text),
            token: Token {
                kind: TokenKind::End,
                text: String::new(),
                pos: 0,
            },
            ctx,
            symbols: HashMap::new(),
            it: Vec::new(),
            next_slot: 0,
            depth: 0,
        }
    }

    /// Binds lambda parameters to slots. A single unnamed parameter
    /// becomes `it`.
    pub(crate) fn declare_parameters(
        &mut self,
        params: &[ParamDecl],
    ) -> Result<Vec<Param>, ParseError> {
        let mut bound = Vec::with_capacity(params.len());
        for decl in params {
            let slot = self.alloc_slot();
            let expr = Expr::parameter(slot, decl.ty.clone());
            if let Some(name) = &decl.name {
                self.add_symbol(name, Symbol::Expr(expr.clone()))?;
            }
            if params.len() == 1 && decl.name.is_none() {
                self.it.push(expr);
            }
            bound.push(Param {
                name: decl.name.clone(),
                ty: decl.ty.clone(),
                slot,
            });
        }
        Ok(bound)
    }

    /// Binds `@0`, `@1`, ... to argument values and a trailing named map
    /// to its own names.
    pub(crate) fn declare_arguments(&mut self, args: &[Argument]) -> Result<(), ParseError> {
        for (i, arg) in args.iter().enumerate() {
            let symbol = match arg {
                Argument::Named(values) if i + 1 == args.len() => {
                    for (name, value) in values {
                        let expr = Expr::constant(value.clone(), value.natural_type());
                        self.add_symbol(name, Symbol::Expr(expr))?;
                    }
                    continue;
                }
                Argument::Named(_) => {
                    return Err(ParseError::new(ErrorKind::NamedValuesNotLast, 0));
                }
                Argument::Value(value) => {
                    Symbol::Expr(Expr::constant(value.clone(), value.natural_type()))
                }
                Argument::Typed(value, ty) => {
                    Symbol::Expr(Expr::constant(value.clone(), ty.clone()))
                }
                Argument::Lambda(lambda) => Symbol::Lambda(lambda.clone()),
            };
            self.add_symbol(&format!("@{}", i), symbol)?;
        }
        Ok(())
    }

    fn add_symbol(&mut self, name: &str, symbol: Symbol) -> Result<(), ParseError> {
        let key = name.to_ascii_lowercase();
        if self.symbols.contains_key(&key) {
            return Err(ParseError::new(
                ErrorKind::DuplicateIdentifier(name.to_owned()),
                0,
            ));
        }
        self.symbols.insert(key, symbol);
        Ok(())
    }

    /// Reads the first token.
    pub(crate) fn start(&mut self) -> Result<(), ParseError> {
        self.next_token()
    }

    pub(crate) fn slot_count(&self) -> usize {
        self.next_slot
    }

    fn alloc_slot(&mut self) -> usize {
        let slot = self.next_slot;
        self.next_slot += 1;
        slot
    }

    // ── token helpers ────────────────────────────────────────

    fn next_token(&mut self) -> Result<(), ParseError> {
        self.token = self.lexer.next_token()?;
        Ok(())
    }

    fn err(&self, kind: ErrorKind) -> ParseError {
        ParseError::new(kind, self.token.pos)
    }

    fn validate(&self, kind: TokenKind, err: ErrorKind) -> Result<(), ParseError> {
        if self.token.is(kind) {
            Ok(())
        } else {
            Err(self.err(err))
        }
    }

    /// Validates the current token and moves past it.
    fn expect(&mut self, kind: TokenKind, err: ErrorKind) -> Result<(), ParseError> {
        self.validate(kind, err)?;
        self.next_token()
    }

    /// Runs `parse` one nesting level deeper.
    fn nested<T>(
        &mut self,
        parse: impl FnOnce(&mut Self) -> Result<T, ParseError>,
    ) -> Result<T, ParseError> {
        if self.depth >= MAX_DEPTH {
            return Err(self.err(ErrorKind::ExpressionTooDeep));
        }
        self.depth += 1;
        let result = parse(self);
        self.depth -= 1;
        result
    }

    /// Current identifier with a leading `@` escape removed.
    fn identifier(&self) -> Result<String, ParseError> {
        self.validate(TokenKind::Identifier, ErrorKind::IdentifierExpected)?;
        let text = &self.token.text;
        match text.strip_prefix('@') {
            Some(rest) if !rest.is_empty() => Ok(rest.to_owned()),
            _ => Ok(text.clone()),
        }
    }

    // ── entry points ─────────────────────────────────────────

    /// Parses a whole expression, converting it to `result` when given.
    pub(crate) fn parse(&mut self, result: Option<&Type>) -> Result<Expr, ParseError> {
        let pos = self.token.pos;
        let mut expr = self.parse_expression()?;
        if let Some(ty) = result {
            expr = promote(&expr, ty, true).ok_or_else(|| {
                ParseError::new(ErrorKind::ExpressionTypeMismatch(ty.to_string()), pos)
            })?;
        }
        self.validate(TokenKind::End, ErrorKind::SyntaxError)?;
        Ok(expr)
    }

    /// Parses `key [asc|ascending|desc|descending], ...`.
    pub(crate) fn parse_ordering(&mut self) -> Result<Vec<(Expr, bool)>, ParseError> {
        let mut keys = Vec::new();
        loop {
            let expr = self.parse_expression()?;
            let mut ascending = true;
            if self.token.is_word("asc") || self.token.is_word("ascending") {
                self.next_token()?;
            } else if self.token.is_word("desc") || self.token.is_word("descending") {
                self.next_token()?;
                ascending = false;
            }
            keys.push((expr, ascending));
            if !self.token.is(TokenKind::Comma) {
                break;
            }
            self.next_token()?;
        }
        self.validate(TokenKind::End, ErrorKind::SyntaxError)?;
        Ok(keys)
    }
}
