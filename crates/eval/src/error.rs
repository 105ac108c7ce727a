/// Runtime failures while evaluating a compiled lambda.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EvalError {
    /// Member access or call on a null receiver.
    #[error("null reference: cannot access '{member}' on a null value")]
    NullReference { member: String },
    /// `.Value` of an empty nullable, or a null converted to a value type.
    #[error("nullable object must have a value")]
    NullableNoValue,
    #[error("attempted to divide by zero")]
    DivideByZero,
    #[error("numeric overflow: {message}")]
    Overflow { message: String },
    /// `Min`, `Max` or `Average` over no items with a non-nullable result.
    #[error("sequence contains no elements")]
    EmptySequence,
    #[error("index {index} is out of range for length {len}")]
    IndexOutOfRange { index: i64, len: usize },
    #[error("invalid argument: {message}")]
    InvalidArgument { message: String },
    #[error("values of type {left} and {right} cannot be compared")]
    NotComparable { left: String, right: String },
    #[error("cannot convert {value} to {target}")]
    InvalidCast { value: String, target: String },
    /// A registered member's callback reported a failure.
    #[error("{message}")]
    Native { message: String },
    #[error("expected {expected} arguments, got {actual}")]
    Arity { expected: usize, actual: usize },
    /// A value of an unexpected kind reached an operation.
    #[error("type error: {message}")]
    TypeError { message: String },
}

impl EvalError {
    pub(crate) fn overflow(message: impl Into<String>) -> Self {
        EvalError::Overflow {
            message: message.into(),
        }
    }

    pub(crate) fn type_error(message: impl Into<String>) -> Self {
        EvalError::TypeError {
            message: message.into(),
        }
    }

    pub(crate) fn invalid_argument(message: impl Into<String>) -> Self {
        EvalError::InvalidArgument {
            message: message.into(),
        }
    }
}
