use std::fmt;

use serde::Serialize;

use crate::span::Span;

/// A fatal code generation error with location information.
///
/// The lowering core is fatal-on-first-error: the first `CodegenError`
/// produced aborts compilation, no partial module is ever emitted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CodegenError {
    pub kind: ErrorKind,
    pub message: String,
    pub span: Span,
}

impl CodegenError {
    pub fn new(kind: ErrorKind, message: impl Into<String>, span: Span) -> Self {
        Self {
            kind,
            message: message.into(),
            span,
        }
    }

    /// Structural incompatibility at an assignment, argument, return or
    /// binary operand.
    pub fn type_error(message: impl Into<String>, span: Span) -> Self {
        Self::new(ErrorKind::Type, message, span)
    }

    /// Unresolved type name, unallocated variable, undeclared function or
    /// unknown interface/property.
    pub fn undefined(message: impl Into<String>, span: Span) -> Self {
        Self::new(ErrorKind::UndefinedSymbol, message, span)
    }

    /// Duplicate type/interface/variable-in-scope/function-with-body.
    pub fn redefinition(message: impl Into<String>, span: Span) -> Self {
        Self::new(ErrorKind::Redefinition, message, span)
    }

    /// A construct used where its required shape does not hold
    /// (break outside a loop, non-variable assignment target, ...).
    pub fn structural(message: impl Into<String>, span: Span) -> Self {
        Self::new(ErrorKind::StructuralUse, message, span)
    }

    /// Operator/operand-category combination with no defined lowering,
    /// or an illegal cast.
    pub fn unsupported(message: impl Into<String>, span: Span) -> Self {
        Self::new(ErrorKind::UnsupportedOperation, message, span)
    }

    /// Internal failure (LLVM refused an instruction, malformed input
    /// that the parser contract should have excluded).
    pub fn compile(message: impl Into<String>, span: Span) -> Self {
        Self::new(ErrorKind::Compile, message, span)
    }
}

/// The specific category of codegen error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ErrorKind {
    Type,
    UndefinedSymbol,
    Redefinition,
    StructuralUse,
    UnsupportedOperation,
    Compile,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Type => write!(f, "TypeError"),
            Self::UndefinedSymbol => write!(f, "UndefinedSymbolError"),
            Self::Redefinition => write!(f, "RedefinitionError"),
            Self::StructuralUse => write!(f, "StructuralUseError"),
            Self::UnsupportedOperation => write!(f, "UnsupportedOperationError"),
            Self::Compile => write!(f, "CompileError"),
        }
    }
}

impl fmt::Display for CodegenError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at {}: {}", self.kind, self.span, self.message)
    }
}

impl std::error::Error for CodegenError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codegen_error_display() {
        let err = CodegenError::type_error(
            "Expected the right side of the operation to be <i32>, got <f32> instead.",
            Span::new(10, 17),
        );
        assert_eq!(
            err.to_string(),
            "TypeError at 10..17: Expected the right side of the operation to be <i32>, got <f32> instead."
        );
    }

    #[test]
    fn error_kind_display_all_variants() {
        assert_eq!(ErrorKind::Type.to_string(), "TypeError");
        assert_eq!(ErrorKind::UndefinedSymbol.to_string(), "UndefinedSymbolError");
        assert_eq!(ErrorKind::Redefinition.to_string(), "RedefinitionError");
        assert_eq!(ErrorKind::StructuralUse.to_string(), "StructuralUseError");
        assert_eq!(
            ErrorKind::UnsupportedOperation.to_string(),
            "UnsupportedOperationError"
        );
        assert_eq!(ErrorKind::Compile.to_string(), "CompileError");
    }

    #[test]
    fn constructors_pick_the_right_kind() {
        assert_eq!(
            CodegenError::undefined("x", Span::default()).kind,
            ErrorKind::UndefinedSymbol
        );
        assert_eq!(
            CodegenError::structural("x", Span::default()).kind,
            ErrorKind::StructuralUse
        );
    }
}
