//! Error types for the type checker
//!
//! [`TypeError`] covers the four kinds of error a well-behaved checker
//! reports against user code. [`InternalError`] means the checker itself is
//! broken; it is kept apart so it is never rendered as an ordinary diagnostic.

use crate::ast::Span;
use crate::types::{StackType, Type};
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum TypeErrorKind {
    #[error("name '{name}' not previously defined")]
    UndefinedName { name: String },

    #[error("{message}")]
    Kind { message: String },

    #[error("{message}")]
    Subtype {
        subtype: Type,
        supertype: Type,
        /// Offending stack item, counted from the top (0 is the top)
        position: Option<usize>,
        /// Required member that is missing or incompatible
        member: Option<String>,
        message: String,
    },

    #[error("{message}")]
    Arity {
        expected: usize,
        found: usize,
        message: String,
    },
}

impl TypeErrorKind {
    /// Name of the error kind as shown to users
    pub fn label(&self) -> &'static str {
        match self {
            TypeErrorKind::UndefinedName { .. } => "UndefinedNameError",
            TypeErrorKind::Kind { .. } => "KindError",
            TypeErrorKind::Subtype { .. } => "SubtypeError",
            TypeErrorKind::Arity { .. } => "ArityError",
        }
    }
}

/// A user-facing type error, located once the driver knows where it happened
#[derive(Debug, Clone, Error)]
#[error("{kind}")]
pub struct TypeError {
    pub kind: TypeErrorKind,
    pub span: Option<Span>,
}

impl TypeError {
    fn new(kind: TypeErrorKind) -> Self {
        TypeError { kind, span: None }
    }

    pub fn undefined_name(name: &str) -> Self {
        TypeError::new(TypeErrorKind::UndefinedName {
            name: name.to_string(),
        })
    }

    pub fn kind_error(message: impl Into<String>) -> Self {
        TypeError::new(TypeErrorKind::Kind {
            message: message.into(),
        })
    }

    pub fn subtype(subtype: &Type, supertype: &Type, message: impl Into<String>) -> Self {
        TypeError::new(TypeErrorKind::Subtype {
            subtype: subtype.clone(),
            supertype: supertype.clone(),
            position: None,
            member: None,
            message: message.into(),
        })
    }

    /// `subtype` is not a subtype of `supertype`, with the default wording
    pub fn not_subtype(subtype: &Type, supertype: &Type) -> Self {
        TypeError::subtype(
            subtype,
            supertype,
            format!("{} is not a subtype of {}", subtype, supertype),
        )
    }

    pub fn missing_member(subtype: &Type, supertype: &Type, member: &str) -> Self {
        TypeError::new(TypeErrorKind::Subtype {
            subtype: subtype.clone(),
            supertype: supertype.clone(),
            position: None,
            member: Some(member.to_string()),
            message: format!(
                "object of type {} does not have member '{}' required by {}",
                subtype, member, supertype
            ),
        })
    }

    pub fn stack_mismatch(found: &StackType, expected: &StackType) -> Self {
        TypeError::subtype(
            &Type::Stack(found.clone()),
            &Type::Stack(expected.clone()),
            format!(
                "the stack here is {}, but sequence type {} was expected",
                found, expected
            ),
        )
    }

    pub fn arity(expected: usize, found: usize, message: impl Into<String>) -> Self {
        TypeError::new(TypeErrorKind::Arity {
            expected,
            found,
            message: message.into(),
        })
    }

    /// Record the offending stack position, if this is a subtype error
    /// without one yet
    pub fn at_position(mut self, index: usize) -> Self {
        if let TypeErrorKind::Subtype { position, .. } = &mut self.kind {
            position.get_or_insert(index);
        }
        self
    }

    /// Record the member under comparison, if not already known
    pub fn in_member(mut self, name: &str) -> Self {
        if let TypeErrorKind::Subtype { member, .. } = &mut self.kind {
            member.get_or_insert_with(|| name.to_string());
        }
        self
    }

    /// Prefix the message with context, keeping the error kind
    pub fn context(mut self, prefix: impl std::fmt::Display) -> Self {
        match &mut self.kind {
            TypeErrorKind::Kind { message }
            | TypeErrorKind::Subtype { message, .. }
            | TypeErrorKind::Arity { message, .. } => {
                *message = format!("{}: {}", prefix, message);
            }
            TypeErrorKind::UndefinedName { .. } => {}
        }
        self
    }

    pub fn with_span_if_missing(mut self, span: Span) -> Self {
        if self.span.is_none() {
            self.span = Some(span);
        }
        self
    }

    pub fn label(&self) -> &'static str {
        self.kind.label()
    }
}

/// A defect in the checker itself
#[derive(Debug, Clone, Error)]
#[error("internal type checker error: {message}")]
pub struct InternalError {
    pub message: String,
}

impl InternalError {
    pub fn new(message: impl Into<String>) -> Self {
        InternalError {
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Error)]
pub enum CheckError {
    #[error(transparent)]
    Type(#[from] TypeError),
    #[error(transparent)]
    Internal(#[from] InternalError),
}

impl CheckError {
    pub fn with_span_if_missing(self, span: Span) -> Self {
        self.map_type(|err| err.with_span_if_missing(span))
    }

    /// Transform the user-facing error, passing internal errors through
    pub fn map_type(self, f: impl FnOnce(TypeError) -> TypeError) -> Self {
        match self {
            CheckError::Type(err) => CheckError::Type(f(err)),
            internal => internal,
        }
    }

    pub fn as_type_error(&self) -> Option<&TypeError> {
        match self {
            CheckError::Type(err) => Some(err),
            CheckError::Internal(_) => None,
        }
    }

    pub fn is_internal(&self) -> bool {
        matches!(self, CheckError::Internal(_))
    }
}

pub type CheckResult<T> = Result<T, CheckError>;
