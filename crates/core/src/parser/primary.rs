use std::sync::Arc;

use super::expressions::generate_conditional;
use super::members::Receiver;
use super::{Parser, Symbol};
use crate::builtins::{self, predefined_type};
use crate::error::{ErrorKind, ParseError};
use crate::expr::{Expr, ExprKind, Lambda};
use crate::lexer::TokenKind;
use crate::resolve::{find_best, Resolution};
use crate::shape;
use crate::types::{FieldDescriptor, Type};
use crate::value::Value;

enum Keyword {
    True,
    False,
    Null,
    It,
    Iif,
    New,
}

fn keyword(text: &str) -> Option<Keyword> {
    let kw = match text.to_ascii_lowercase().as_str() {
        "true" => Keyword::True,
        "false" => Keyword::False,
        "null" => Keyword::Null,
        "it" => Keyword::It,
        "iif" => Keyword::Iif,
        "new" => Keyword::New,
        _ => return None,
    };
    Some(kw)
}

impl Parser<'_> {
    pub(super) fn parse_primary(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.parse_primary_start()?;
        loop {
            if self.token.is(TokenKind::Dot) {
                self.next_token()?;
                expr = self.parse_member_access(Receiver::Instance(expr))?;
            } else if self.token.is(TokenKind::OpenBracket) {
                expr = self.parse_element_access(expr)?;
            } else {
                return Ok(expr);
            }
        }
    }

    fn parse_primary_start(&mut self) -> Result<Expr, ParseError> {
        match self.token.kind {
            TokenKind::Identifier => self.parse_identifier(),
            TokenKind::StringLiteral => self.parse_string_literal(),
            TokenKind::IntegerLiteral => self.parse_integer_literal(),
            TokenKind::RealLiteral => self.parse_real_literal(),
            TokenKind::OpenParen => self.parse_paren(),
            _ => Err(self.err(ErrorKind::ExpressionExpected)),
        }
    }

    // ── literals ─────────────────────────────────────────────

    fn parse_string_literal(&mut self) -> Result<Expr, ParseError> {
        let text = &self.token.text;
        let quote = text.chars().next().unwrap_or('"');
        let inner = text
            .strip_prefix(quote)
            .and_then(|t| t.strip_suffix(quote))
            .unwrap_or_default();
        let value = inner.replace(&format!("{quote}{quote}"), &quote.to_string());
        let expr = if quote == '\'' {
            let mut chars = value.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => Expr::literal(Value::Char(c), value.clone(), Type::Char),
                _ => return Err(self.err(ErrorKind::InvalidCharacterLiteral)),
            }
        } else {
            Expr::literal(Value::String(value.clone()), value, Type::String)
        };
        self.next_token()?;
        Ok(expr)
    }

    fn parse_integer_literal(&mut self) -> Result<Expr, ParseError> {
        let text = self.token.text.clone();
        let invalid = || self.err(ErrorKind::InvalidIntegerLiteral(text.clone()));
        let (value, ty) = if text.starts_with('-') {
            let v: i64 = text.parse().map_err(|_| invalid())?;
            match i32::try_from(v) {
                Ok(v) => (Value::Int32(v), Type::Int32),
                Err(_) => (Value::Int64(v), Type::Int64),
            }
        } else {
            let v: u64 = text.parse().map_err(|_| invalid())?;
            if let Ok(v) = i32::try_from(v) {
                (Value::Int32(v), Type::Int32)
            } else if let Ok(v) = u32::try_from(v) {
                (Value::UInt32(v), Type::UInt32)
            } else if let Ok(v) = i64::try_from(v) {
                (Value::Int64(v), Type::Int64)
            } else {
                (Value::UInt64(v), Type::UInt64)
            }
        };
        self.next_token()?;
        Ok(Expr::literal(value, text, ty))
    }

    fn parse_real_literal(&mut self) -> Result<Expr, ParseError> {
        let text = self.token.text.clone();
        let invalid = || self.err(ErrorKind::InvalidRealLiteral(text.clone()));
        let (value, ty) = match text.strip_suffix(['f', 'F']) {
            Some(digits) => (
                Value::Single(digits.parse().map_err(|_| invalid())?),
                Type::Single,
            ),
            None => (
                Value::Double(text.parse().map_err(|_| invalid())?),
                Type::Double,
            ),
        };
        self.next_token()?;
        Ok(Expr::literal(value, text, ty))
    }

    fn parse_paren(&mut self) -> Result<Expr, ParseError> {
        self.expect(TokenKind::OpenParen, ErrorKind::OpenParenExpected)?;
        let expr = self.parse_expression()?;
        self.expect(
            TokenKind::CloseParen,
            ErrorKind::CloseParenOrOperatorExpected,
        )?;
        Ok(expr)
    }

    // ── identifiers ──────────────────────────────────────────

    fn parse_identifier(&mut self) -> Result<Expr, ParseError> {
        let text = self.token.text.clone();
        if let Some(kw) = keyword(&text) {
            return match kw {
                Keyword::True | Keyword::False => {
                    self.next_token()?;
                    Ok(Expr::constant(
                        Value::Boolean(matches!(kw, Keyword::True)),
                        Type::Boolean,
                    ))
                }
                Keyword::Null => {
                    self.next_token()?;
                    Ok(Expr::null_literal())
                }
                Keyword::It => self.parse_it(),
                Keyword::Iif => self.parse_iif(),
                Keyword::New => self.parse_new(),
            };
        }
        if let Some(ty) = predefined_type(&text).or_else(|| self.ctx.lookup(&text).cloned()) {
            return self.parse_type_access(ty);
        }
        if let Some(symbol) = self.symbols.get(&text.to_ascii_lowercase()).cloned() {
            return match symbol {
                Symbol::Expr(expr) => {
                    self.next_token()?;
                    Ok(expr)
                }
                Symbol::Lambda(lambda) => self.parse_lambda_invocation(lambda),
            };
        }
        if let Some(it) = self.it.last().cloned() {
            return self.parse_member_access(Receiver::Instance(it));
        }
        Err(self.err(ErrorKind::UnknownIdentifier(text)))
    }

    fn parse_it(&mut self) -> Result<Expr, ParseError> {
        let it = self
            .it
            .last()
            .cloned()
            .ok_or_else(|| self.err(ErrorKind::NoItInScope))?;
        self.next_token()?;
        Ok(it)
    }

    fn parse_iif(&mut self) -> Result<Expr, ParseError> {
        let pos = self.token.pos;
        self.next_token()?;
        let args = self.parse_argument_list()?;
        let [test, if_true, if_false]: [Expr; 3] = args
            .try_into()
            .map_err(|_| ParseError::new(ErrorKind::IifRequiresThreeArgs, pos))?;
        generate_conditional(test, if_true, if_false, pos)
    }

    /// `new (expr [as Name], ...)` builds a shape instance.
    fn parse_new(&mut self) -> Result<Expr, ParseError> {
        self.next_token()?;
        self.expect(TokenKind::OpenParen, ErrorKind::OpenParenExpected)?;
        let mut fields: Vec<FieldDescriptor> = Vec::new();
        let mut values = Vec::new();
        loop {
            let pos = self.token.pos;
            let expr = self.parse_expression()?;
            let name = if self.token.is_word("as") {
                self.next_token()?;
                let name = self.identifier()?;
                self.next_token()?;
                name
            } else if let ExprKind::Property { property, .. } = &expr.kind {
                property.name.clone()
            } else {
                return Err(ParseError::new(ErrorKind::MissingAsClause, pos));
            };
            if fields.iter().any(|f| f.name == name) {
                return Err(ParseError::new(ErrorKind::DuplicateIdentifier(name), pos));
            }
            fields.push(FieldDescriptor::new(name, expr.ty.clone()));
            values.push(expr);
            if !self.token.is(TokenKind::Comma) {
                break;
            }
            self.next_token()?;
        }
        self.expect(TokenKind::CloseParen, ErrorKind::CloseParenOrCommaExpected)?;
        let class = shape::factory().get_or_create(&fields);
        Ok(Expr::new(
            ExprKind::MemberInit {
                class: class.clone(),
                values,
            },
            Type::Class(class),
        ))
    }

    fn parse_lambda_invocation(&mut self, lambda: Arc<Lambda>) -> Result<Expr, ParseError> {
        let pos = self.token.pos;
        self.next_token()?;
        let args = self.parse_argument_list()?;
        match find_best(&[lambda.param_types()], &args) {
            Resolution::Found { args, .. } => {
                let ty = lambda.return_type().clone();
                Ok(Expr::new(ExprKind::Invoke { lambda, args }, ty))
            }
            _ => Err(ParseError::new(ErrorKind::ArgsIncompatibleWithLambda, pos)),
        }
    }

    // ── type names ───────────────────────────────────────────

    /// `Type(args)`, `Type?(arg)` or `Type.Member`.
    fn parse_type_access(&mut self, ty: Type) -> Result<Expr, ParseError> {
        let pos = self.token.pos;
        self.next_token()?;
        let mut ty = ty;
        if self.token.is(TokenKind::Question) {
            if !ty.is_value_type() || ty.is_nullable() {
                return Err(ParseError::new(
                    ErrorKind::TypeHasNoNullableForm(ty.to_string()),
                    pos,
                ));
            }
            ty = Type::nullable(ty);
            self.next_token()?;
        }
        if self.token.is(TokenKind::OpenParen) {
            let mut args = self.parse_argument_list()?;
            let ctors = builtins::constructors(&ty);
            return match find_best(&ctors, &args) {
                Resolution::NoMatch if args.len() == 1 => {
                    generate_conversion(args.remove(0), ty, pos)
                }
                Resolution::NoMatch => Err(ParseError::new(
                    ErrorKind::NoMatchingConstructor(ty.to_string()),
                    pos,
                )),
                Resolution::Found { index, args } => Ok(Expr::new(
                    ExprKind::New {
                        constructor: ctors[index].clone(),
                        args,
                    },
                    ty,
                )),
                Resolution::Ambiguous(_) => Err(ParseError::new(
                    ErrorKind::AmbiguousConstructorInvocation(ty.to_string()),
                    pos,
                )),
            };
        }
        self.expect(TokenKind::Dot, ErrorKind::DotOrOpenParenExpected)?;
        self.parse_member_access(Receiver::Type(ty))
    }
}

/// Explicit conversion `Type(expr)` when no constructor applies.
fn generate_conversion(expr: Expr, ty: Type, pos: usize) -> Result<Expr, ParseError> {
    let from = expr.ty.clone();
    if from == ty {
        return Ok(expr);
    }
    if from.is_value_type() && ty.is_value_type() {
        if (from.is_nullable() || ty.is_nullable()) && from.non_nullable() == ty.non_nullable() {
            return Ok(Expr::convert(expr, ty, false));
        }
        let numeric_or_enum = |t: &Type| t.is_numeric() || t.is_enum();
        if numeric_or_enum(&from) && numeric_or_enum(&ty) {
            return Ok(Expr::convert(expr, ty, true));
        }
    }
    if ty.is_assignable_from(&from) || from.is_assignable_from(&ty) {
        return Ok(Expr::convert(expr, ty, false));
    }
    Err(ParseError::new(
        ErrorKind::CannotConvertValue(from.to_string(), ty.to_string()),
        pos,
    ))
}
