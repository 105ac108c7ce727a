use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};

/// A compile failure: what went wrong and the character offset in the
/// expression text where it was detected.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{kind} (at index {position})")]
pub struct ParseError {
    pub kind: ErrorKind,
    pub position: usize,
}

impl ParseError {
    pub fn new(kind: ErrorKind, position: usize) -> Self {
        ParseError { kind, position }
    }

    /// The message without the position suffix.
    pub fn message(&self) -> String {
        self.kind.to_string()
    }
}

impl Serialize for ParseError {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut s = serializer.serialize_struct("ParseError", 3)?;
        s.serialize_field("message", &self.kind.to_string())?;
        s.serialize_field("position", &self.position)?;
        s.serialize_field("kind", &self.kind)?;
        s.end()
    }
}

/// Every distinct compile failure, each with its own message template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
pub enum ErrorKind {
    // ── lexical ──────────────────────────────────────────────
    #[error("Unterminated string literal")]
    UnterminatedStringLiteral,
    #[error("Syntax error '{0}'")]
    InvalidCharacter(char),
    #[error("Digit expected")]
    DigitExpected,
    #[error("Character literal must contain exactly one character")]
    InvalidCharacterLiteral,
    #[error("Invalid integer literal '{0}'")]
    InvalidIntegerLiteral(String),
    #[error("Invalid real literal '{0}'")]
    InvalidRealLiteral(String),

    // ── structure ────────────────────────────────────────────
    #[error("Syntax error")]
    SyntaxError,
    #[error("Expression expected")]
    ExpressionExpected,
    #[error("Identifier expected")]
    IdentifierExpected,
    #[error("':' expected")]
    ColonExpected,
    #[error("'(' expected")]
    OpenParenExpected,
    #[error("')' or operator expected")]
    CloseParenOrOperatorExpected,
    #[error("')' or ',' expected")]
    CloseParenOrCommaExpected,
    #[error("'.' or '(' expected")]
    DotOrOpenParenExpected,
    #[error("']' or ',' expected")]
    CloseBracketOrCommaExpected,
    #[error("Expression is nested too deeply")]
    ExpressionTooDeep,

    // ── symbols ──────────────────────────────────────────────
    #[error("The identifier '{0}' was defined more than once")]
    DuplicateIdentifier(String),
    #[error("Unknown identifier '{0}'")]
    UnknownIdentifier(String),
    #[error("No 'it' is in scope")]
    NoItInScope,
    #[error("Named values must be the last argument")]
    NamedValuesNotLast,
    #[error("Expression is missing an 'as' clause")]
    MissingAsClause,

    // ── typing ───────────────────────────────────────────────
    #[error("Expression of type '{0}' expected")]
    ExpressionTypeMismatch(String),
    #[error("The 'iif' function requires three arguments")]
    IifRequiresThreeArgs,
    #[error("The first expression must be of type 'Boolean'")]
    FirstExprMustBeBool,
    #[error("Both of the types '{0}' and '{1}' convert to the other")]
    BothTypesConvertToOther(String, String),
    #[error("Neither of the types '{0}' and '{1}' converts to the other")]
    NeitherTypeConvertsToOther(String, String),
    #[error("Operator '{0}' incompatible with operand type '{1}'")]
    IncompatibleOperand(String, String),
    #[error("Operator '{0}' incompatible with operand types '{1}' and '{2}'")]
    IncompatibleOperands(String, String, String),
    #[error("Literal '{0}' is out of range for type '{1}'")]
    LiteralOutOfRange(String, String),
    #[error("A value of type '{0}' cannot be converted to type '{1}'")]
    CannotConvertValue(String, String),
    #[error("Type '{0}' has no nullable form")]
    TypeHasNoNullableForm(String),

    // ── members and overloads ────────────────────────────────
    #[error("No property or field '{0}' exists in type '{1}'")]
    UnknownPropertyOrField(String, String),
    #[error("No applicable method '{0}' exists in type '{1}'")]
    NoApplicableMethod(String, String),
    #[error("Ambiguous invocation of method '{0}' in type '{1}'")]
    AmbiguousMethodInvocation(String, String),
    #[error("No applicable aggregate method '{0}' exists")]
    NoApplicableAggregate(String),
    #[error("No matching constructor in type '{0}'")]
    NoMatchingConstructor(String),
    #[error("Ambiguous invocation of '{0}' constructor")]
    AmbiguousConstructorInvocation(String),
    #[error("No applicable indexer exists in type '{0}'")]
    NoApplicableIndexer(String),
    #[error("Ambiguous invocation of indexer in type '{0}'")]
    AmbiguousIndexerInvocation(String),
    #[error("Indexing of multi-dimensional arrays is not supported")]
    CannotIndexMultiDimArray,
    #[error("Array index must be an integer expression")]
    InvalidIndex,
    #[error("Argument list incompatible with lambda expression")]
    ArgsIncompatibleWithLambda,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_appends_position() {
        let err = ParseError::new(ErrorKind::UnknownIdentifier("Foo".into()), 7);
        assert_eq!(err.to_string(), "Unknown identifier 'Foo' (at index 7)");
        assert_eq!(err.message(), "Unknown identifier 'Foo'");
    }

    #[test]
    fn serializes_message_and_position() {
        let err = ParseError::new(ErrorKind::DigitExpected, 3);
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["message"], "Digit expected");
        assert_eq!(json["position"], 3);
        assert_eq!(json["kind"], "DigitExpected");
    }
}
