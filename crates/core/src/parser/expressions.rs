use std::sync::Arc;

use super::Parser;
use crate::builtins;
use crate::error::{ErrorKind, ParseError};
use crate::expr::{BinaryOp, Expr, ExprKind, UnaryOp};
use crate::lexer::{Token, TokenKind};
use crate::promote::{promote, reinterpret_literal};
use crate::resolve::{self, find_best, Resolution};
use crate::types::{Method, Type};
use crate::value::Value;

fn incompatible(op: &Token, left: &Expr, right: &Expr) -> ParseError {
    ParseError::new(
        ErrorKind::IncompatibleOperands(
            op.text.clone(),
            left.ty.to_string(),
            right.ty.to_string(),
        ),
        op.pos,
    )
}

fn is_integer_literal(expr: &Expr) -> bool {
    expr.literal_text().is_some() && expr.ty.is_integral()
}

impl Parser<'_> {
    // ── ?: ─────────────────────────────────────────────────────

    pub(super) fn parse_expression(&mut self) -> Result<Expr, ParseError> {
        self.nested(Self::parse_conditional)
    }

    fn parse_conditional(&mut self) -> Result<Expr, ParseError> {
        let pos = self.token.pos;
        let expr = self.parse_logical_or()?;
        if self.token.is(TokenKind::Question) {
            self.next_token()?;
            let if_true = self.parse_expression()?;
            self.expect(TokenKind::Colon, ErrorKind::ColonExpected)?;
            let if_false = self.parse_expression()?;
            return generate_conditional(expr, if_true, if_false, pos);
        }
        Ok(expr)
    }

    // ── ||, or ─────────────────────────────────────────────────

    fn parse_logical_or(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_logical_and()?;
        while self.token.is(TokenKind::DoubleBar) || self.token.is_word("or") {
            let op = self.token.clone();
            self.next_token()?;
            let right = self.parse_logical_and()?;
            let (l, r) = check_operands(&resolve::LOGICAL, &op, left, right)?;
            let ty = l.ty.clone();
            left = Expr::binary(BinaryOp::OrElse, l, r, ty);
        }
        Ok(left)
    }

    // ── &&, and ────────────────────────────────────────────────

    fn parse_logical_and(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_comparison()?;
        while self.token.is(TokenKind::DoubleAmpersand) || self.token.is_word("and") {
            let op = self.token.clone();
            self.next_token()?;
            let right = self.parse_comparison()?;
            let (l, r) = check_operands(&resolve::LOGICAL, &op, left, right)?;
            let ty = l.ty.clone();
            left = Expr::binary(BinaryOp::AndAlso, l, r, ty);
        }
        Ok(left)
    }

    // ── = == != <> > >= < <= ───────────────────────────────────

    fn parse_comparison(&mut self) -> Result<Expr, ParseError> {
        use TokenKind::*;
        let mut left = self.parse_additive()?;
        loop {
            let op = match self.token.kind {
                Equal | DoubleEqual => BinaryOp::Equal,
                ExclamationEqual | LessGreater => BinaryOp::NotEqual,
                GreaterThan => BinaryOp::GreaterThan,
                GreaterThanEqual => BinaryOp::GreaterThanOrEqual,
                LessThan => BinaryOp::LessThan,
                LessThanEqual => BinaryOp::LessThanOrEqual,
                _ => break,
            };
            let token = self.token.clone();
            self.next_token()?;
            let mut right = self.parse_additive()?;
            let is_equality = matches!(op, BinaryOp::Equal | BinaryOp::NotEqual);

            if is_equality && !left.ty.is_value_type() && !right.ty.is_value_type() {
                if left.ty != right.ty {
                    if left.ty.is_assignable_from(&right.ty) {
                        let ty = left.ty.clone();
                        right = Expr::convert(right, ty, false);
                    } else if right.ty.is_assignable_from(&left.ty) {
                        let ty = right.ty.clone();
                        left = Expr::convert(left, ty, false);
                    } else {
                        return Err(incompatible(&token, &left, &right));
                    }
                }
            } else if left.ty.is_enum() || right.ty.is_enum() {
                if left.ty != right.ty {
                    if let Some(e) = promote(&right, &left.ty, true) {
                        right = e;
                    } else if let Some(e) = promote(&left, &right.ty, true) {
                        left = e;
                    } else {
                        return Err(incompatible(&token, &left, &right));
                    }
                }
            } else {
                (left, right) = narrow_literal_operand(&token, is_equality, left, right)?;
                let sigs = if is_equality {
                    &resolve::EQUALITY
                } else {
                    &resolve::RELATIONAL
                };
                (left, right) = check_operands(sigs, &token, left, right)?;
            }

            left = if !is_equality && *left.ty.non_nullable() == Type::String {
                string_comparison(op, left, right, &token)?
            } else {
                Expr::binary(op, left, right, Type::Boolean)
            };
        }
        Ok(left)
    }

    // ── + - & ──────────────────────────────────────────────────

    fn parse_additive(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_multiplicative()?;
        while matches!(
            self.token.kind,
            TokenKind::Plus | TokenKind::Minus | TokenKind::Ampersand
        ) {
            let op = self.token.clone();
            self.next_token()?;
            let right = self.parse_multiplicative()?;
            left = match op.kind {
                TokenKind::Plus if left.ty == Type::String || right.ty == Type::String => {
                    string_concat(left, right, &op)?
                }
                TokenKind::Plus => {
                    let (l, r) = check_operands(&resolve::ADD, &op, left, right)?;
                    arithmetic(BinaryOp::Add, l, r)
                }
                TokenKind::Minus => {
                    let (l, r) = check_operands(&resolve::SUBTRACT, &op, left, right)?;
                    arithmetic(BinaryOp::Subtract, l, r)
                }
                _ => string_concat(left, right, &op)?,
            };
        }
        Ok(left)
    }

    // ── * / % mod ──────────────────────────────────────────────

    fn parse_multiplicative(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_unary()?;
        loop {
            let op = match self.token.kind {
                TokenKind::Asterisk => BinaryOp::Multiply,
                TokenKind::Slash => BinaryOp::Divide,
                TokenKind::Percent => BinaryOp::Modulo,
                _ if self.token.is_word("mod") => BinaryOp::Modulo,
                _ => break,
            };
            let token = self.token.clone();
            self.next_token()?;
            let right = self.parse_unary()?;
            let (l, r) = check_operands(&resolve::ARITHMETIC, &token, left, right)?;
            left = arithmetic(op, l, r);
        }
        Ok(left)
    }

    // ── - ! not ────────────────────────────────────────────────

    fn parse_unary(&mut self) -> Result<Expr, ParseError> {
        let is_minus = self.token.is(TokenKind::Minus);
        if !(is_minus || self.token.is(TokenKind::Exclamation) || self.token.is_word("not")) {
            return self.parse_primary();
        }
        let op = self.token.clone();
        self.next_token()?;
        if is_minus
            && matches!(
                self.token.kind,
                TokenKind::IntegerLiteral | TokenKind::RealLiteral
            )
        {
            // Fold the sign into the literal so `-2147483648` is an Int32.
            self.token.text.insert(0, '-');
            self.token.pos = op.pos;
            return self.parse_primary();
        }
        let operand = self.nested(Self::parse_unary)?;
        let (sigs, unary) = if is_minus {
            (&resolve::NEGATION, UnaryOp::Negate)
        } else {
            (&resolve::NOT, UnaryOp::Not)
        };
        let operand = match find_best(sigs.as_slice(), std::slice::from_ref(&operand)) {
            Resolution::Found { mut args, .. } if args.len() == 1 => args.remove(0),
            _ => {
                return Err(ParseError::new(
                    ErrorKind::IncompatibleOperand(op.text.clone(), operand.ty.to_string()),
                    op.pos,
                ))
            }
        };
        let ty = operand.ty.clone();
        Ok(Expr::new(
            ExprKind::Unary {
                op: unary,
                operand: Box::new(operand),
            },
            ty,
        ))
    }
}

/// Promotes both operands to the best matching operator signature.
fn check_operands(
    sigs: &[Vec<Type>],
    op: &Token,
    left: Expr,
    right: Expr,
) -> Result<(Expr, Expr), ParseError> {
    match find_best(sigs, &[left.clone(), right.clone()]) {
        Resolution::Found { args, .. } => {
            let mut args = args.into_iter();
            match (args.next(), args.next()) {
                (Some(l), Some(r)) => Ok((l, r)),
                _ => Err(incompatible(op, &left, &right)),
            }
        }
        _ => Err(incompatible(op, &left, &right)),
    }
}

/// An integer literal compared with an integral operand of another type is
/// read as that type when it fits. Testing a sub-`Int32` operand for
/// equality with a literal it can never hold is rejected; every other
/// out-of-range literal keeps its own type and the operands widen.
fn narrow_literal_operand(
    op: &Token,
    is_equality: bool,
    left: Expr,
    right: Expr,
) -> Result<(Expr, Expr), ParseError> {
    let literal_left = is_integer_literal(&left);
    if literal_left == is_integer_literal(&right) {
        return Ok((left, right));
    }
    let (literal, other) = if literal_left {
        (&left, &right)
    } else {
        (&right, &left)
    };
    let target = other.ty.non_nullable().clone();
    if !target.is_integral() || target == literal.ty {
        return Ok((left, right));
    }
    let Some(value) = reinterpret_literal(literal, &target) else {
        if !(is_equality && is_narrower_than_int32(&target)) {
            return Ok((left, right));
        }
        let text = literal.literal_text().unwrap_or_default().to_owned();
        return Err(ParseError::new(
            ErrorKind::LiteralOutOfRange(text, target.to_string()),
            op.pos,
        ));
    };
    let narrowed = Expr::constant(value, target);
    Ok(if literal_left {
        (narrowed, right)
    } else {
        (left, narrowed)
    })
}

fn is_narrower_than_int32(ty: &Type) -> bool {
    matches!(ty, Type::SByte | Type::Byte | Type::Int16 | Type::UInt16)
}

fn arithmetic(op: BinaryOp, left: Expr, right: Expr) -> Expr {
    let date_difference = op == BinaryOp::Subtract
        && *left.ty.non_nullable() == Type::DateTime
        && *right.ty.non_nullable() == Type::DateTime;
    let ty = if date_difference {
        if left.ty.is_nullable() {
            Type::nullable(Type::TimeSpan)
        } else {
            Type::TimeSpan
        }
    } else {
        left.ty.clone()
    };
    Expr::binary(op, left, right, ty)
}

fn string_method(name: &str, op: &Token) -> Result<Arc<Method>, ParseError> {
    builtins::find_static_method(&Type::String, name).ok_or_else(|| {
        ParseError::new(
            ErrorKind::NoApplicableMethod(name.to_owned(), Type::String.to_string()),
            op.pos,
        )
    })
}

/// `a & b` and `+` with a string operand: `String.Concat(a, b)`.
fn string_concat(left: Expr, right: Expr, op: &Token) -> Result<Expr, ParseError> {
    let method = string_method("Concat", op)?;
    Ok(Expr::new(
        ExprKind::Call {
            instance: None,
            method,
            args: vec![left, right],
        },
        Type::String,
    ))
}

/// Relational operators on strings compare `String.Compare(a, b)` with zero.
fn string_comparison(
    op: BinaryOp,
    left: Expr,
    right: Expr,
    token: &Token,
) -> Result<Expr, ParseError> {
    let method = string_method("Compare", token)?;
    let compare = Expr::new(
        ExprKind::Call {
            instance: None,
            method,
            args: vec![left, right],
        },
        Type::Int32,
    );
    Ok(Expr::binary(
        op,
        compare,
        Expr::constant(Value::Int32(0), Type::Int32),
        Type::Boolean,
    ))
}

/// Builds `test ? a : b`, converting one branch to the other's type when
/// exactly one direction works.
pub(super) fn generate_conditional(
    test: Expr,
    if_true: Expr,
    if_false: Expr,
    pos: usize,
) -> Result<Expr, ParseError> {
    if test.ty != Type::Boolean {
        return Err(ParseError::new(ErrorKind::FirstExprMustBeBool, pos));
    }
    let (mut if_true, mut if_false) = (if_true, if_false);
    if if_true.ty != if_false.ty {
        let true_as_false = if if_false.is_null_literal() {
            None
        } else {
            promote(&if_true, &if_false.ty, true)
        };
        let false_as_true = if if_true.is_null_literal() {
            None
        } else {
            promote(&if_false, &if_true.ty, true)
        };
        match (true_as_false, false_as_true) {
            (Some(t), None) => if_true = t,
            (None, Some(f)) => if_false = f,
            (t, _) => {
                let name = |e: &Expr| {
                    if e.is_null_literal() {
                        "null".to_owned()
                    } else {
                        e.ty.to_string()
                    }
                };
                let (a, b) = (name(&if_true), name(&if_false));
                let kind = if t.is_some() {
                    ErrorKind::BothTypesConvertToOther(a, b)
                } else {
                    ErrorKind::NeitherTypeConvertsToOther(a, b)
                };
                return Err(ParseError::new(kind, pos));
            }
        }
    }
    let ty = if_true.ty.clone();
    Ok(Expr::new(
        ExprKind::Conditional {
            test: Box::new(test),
            if_true: Box::new(if_true),
            if_false: Box::new(if_false),
        },
        ty,
    ))
}
