//! Shared types for the Slate compiler.
//!
//! Home of the byte-offset [`Span`] attached to every AST node and the
//! [`CodegenError`] taxonomy the lowering core reports through.

pub mod error;
pub mod span;

pub use error::{CodegenError, ErrorKind};
pub use span::Span;
