use std::sync::Arc;

use super::Parser;
use crate::builtins::{declares_method, find_property, member_chain};
use crate::error::{ErrorKind, ParseError};
use crate::expr::{AggregateOp, Expr, ExprKind};
use crate::lexer::TokenKind;
use crate::promote::promote;
use crate::resolve::{aggregate_result, aggregates_named, find_best, Resolution};
use crate::types::{Method, Type};

/// The left side of a member access.
pub(super) enum Receiver {
    /// `Type.Member`: only static members apply.
    Type(Type),
    Instance(Expr),
}

impl Receiver {
    fn ty(&self) -> &Type {
        match self {
            Receiver::Type(ty) => ty,
            Receiver::Instance(expr) => &expr.ty,
        }
    }
}

enum Lookup {
    Found(Arc<Method>, Vec<Expr>),
    Ambiguous,
    NotFound,
}

/// Resolves `name(args)` against each level of the hierarchy in turn. The
/// first level with an applicable or ambiguous overload set wins.
fn find_method(ty: &Type, name: &str, is_static: bool, args: &[Expr]) -> Lookup {
    for members in member_chain(ty) {
        let candidates: Vec<Arc<Method>> =
            members.methods_named(name, is_static).cloned().collect();
        if candidates.is_empty() {
            continue;
        }
        match find_best(&candidates, args) {
            Resolution::Found { index, args } => {
                return Lookup::Found(candidates[index].clone(), args)
            }
            Resolution::Ambiguous(_) => return Lookup::Ambiguous,
            Resolution::NoMatch => {}
        }
    }
    Lookup::NotFound
}

fn find_indexer(ty: &Type, args: &[Expr]) -> Lookup {
    for members in member_chain(ty) {
        if members.indexers.is_empty() {
            continue;
        }
        match find_best(&members.indexers, args) {
            Resolution::Found { index, args } => {
                return Lookup::Found(members.indexers[index].clone(), args)
            }
            Resolution::Ambiguous(_) => return Lookup::Ambiguous,
            Resolution::NoMatch => {}
        }
    }
    Lookup::NotFound
}

/// Sequences whose methods fall back to the aggregate operators.
fn aggregate_element(ty: &Type, name: &str) -> Option<Type> {
    if matches!(ty, Type::String) || declares_method(ty, name) {
        return None;
    }
    ty.element_type()
}

impl Parser<'_> {
    /// Parses the member name at the current token and what follows it.
    pub(super) fn parse_member_access(&mut self, receiver: Receiver) -> Result<Expr, ParseError> {
        let pos = self.token.pos;
        let id = self.identifier()?;
        self.next_token()?;
        let ty = receiver.ty().clone();

        if self.token.is(TokenKind::OpenParen) {
            if let Receiver::Instance(source) = &receiver {
                if let Some(element) = aggregate_element(&ty, &id) {
                    return self.parse_aggregate(source.clone(), element, &id, pos);
                }
            }
            let args = self.parse_argument_list()?;
            let (instance, is_static) = match receiver {
                Receiver::Type(_) => (None, true),
                Receiver::Instance(expr) => (Some(Box::new(expr)), false),
            };
            return match find_method(&ty, &id, is_static, &args) {
                Lookup::Found(method, args) => {
                    let ret = method.ret.clone();
                    Ok(Expr::new(
                        ExprKind::Call {
                            instance,
                            method,
                            args,
                        },
                        ret,
                    ))
                }
                Lookup::Ambiguous => Err(ParseError::new(
                    ErrorKind::AmbiguousMethodInvocation(id, ty.to_string()),
                    pos,
                )),
                Lookup::NotFound => Err(ParseError::new(
                    ErrorKind::NoApplicableMethod(id, ty.to_string()),
                    pos,
                )),
            };
        }

        let (instance, is_static) = match receiver {
            Receiver::Type(_) => (None, true),
            Receiver::Instance(expr) => (Some(Box::new(expr)), false),
        };
        let property = find_property(&ty, &id, is_static).ok_or_else(|| {
            ParseError::new(ErrorKind::UnknownPropertyOrField(id, ty.to_string()), pos)
        })?;
        let prop_ty = property.ty.clone();
        Ok(Expr::new(ExprKind::Property { instance, property }, prop_ty))
    }

    /// `source.Op(args)` where the arguments see each item as `it`.
    fn parse_aggregate(
        &mut self,
        source: Expr,
        element: Type,
        name: &str,
        pos: usize,
    ) -> Result<Expr, ParseError> {
        let slot = self.alloc_slot();
        self.it.push(Expr::parameter(slot, element));
        let parsed = self.parse_argument_list();
        self.it.pop();
        let args = parsed?;

        let sigs = aggregates_named(name);
        let (op, promoted) = match find_best(&sigs, &args) {
            Resolution::Found { index, args } => (sigs[index].op, args),
            _ => {
                return Err(ParseError::new(
                    ErrorKind::NoApplicableAggregate(name.to_owned()),
                    pos,
                ))
            }
        };
        // Min and Max keep the selector's own type.
        let body = match op {
            AggregateOp::Min | AggregateOp::Max => args.into_iter().last(),
            _ => promoted.into_iter().last(),
        };
        let ty = aggregate_result(op, &source.ty, body.as_ref().map(|b| &b.ty));
        Ok(Expr::new(
            ExprKind::Aggregate {
                source: Box::new(source),
                op,
                slot,
                body: body.map(Box::new),
            },
            ty,
        ))
    }

    pub(super) fn parse_argument_list(&mut self) -> Result<Vec<Expr>, ParseError> {
        self.expect(TokenKind::OpenParen, ErrorKind::OpenParenExpected)?;
        let args = if self.token.is(TokenKind::CloseParen) {
            Vec::new()
        } else {
            self.parse_arguments()?
        };
        self.expect(TokenKind::CloseParen, ErrorKind::CloseParenOrCommaExpected)?;
        Ok(args)
    }

    fn parse_arguments(&mut self) -> Result<Vec<Expr>, ParseError> {
        let mut args = vec![self.parse_expression()?];
        while self.token.is(TokenKind::Comma) {
            self.next_token()?;
            args.push(self.parse_expression()?);
        }
        Ok(args)
    }

    /// `expr[index, ...]` on a list or a type with indexers.
    pub(super) fn parse_element_access(&mut self, expr: Expr) -> Result<Expr, ParseError> {
        let pos = self.token.pos;
        self.next_token()?;
        let args = self.parse_arguments()?;
        self.expect(
            TokenKind::CloseBracket,
            ErrorKind::CloseBracketOrCommaExpected,
        )?;

        if let Type::List(element) = &expr.ty {
            let element = (**element).clone();
            let [index]: [Expr; 1] = args
                .try_into()
                .map_err(|_| ParseError::new(ErrorKind::CannotIndexMultiDimArray, pos))?;
            let index = promote(&index, &Type::Int32, false)
                .ok_or_else(|| ParseError::new(ErrorKind::InvalidIndex, pos))?;
            return Ok(Expr::new(
                ExprKind::ArrayIndex {
                    array: Box::new(expr),
                    index: Box::new(index),
                },
                element,
            ));
        }

        let ty = expr.ty.clone();
        match find_indexer(&ty, &args) {
            Lookup::Found(method, args) => {
                let ret = method.ret.clone();
                Ok(Expr::new(
                    ExprKind::Call {
                        instance: Some(Box::new(expr)),
                        method,
                        args,
                    },
                    ret,
                ))
            }
            Lookup::Ambiguous => Err(ParseError::new(
                ErrorKind::AmbiguousIndexerInvocation(ty.to_string()),
                pos,
            )),
            Lookup::NotFound => Err(ParseError::new(
                ErrorKind::NoApplicableIndexer(ty.to_string()),
                pos,
            )),
        }
    }
}
