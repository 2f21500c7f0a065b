//! AST-to-LLVM-IR lowering for the Slate compiler.
//!
//! The parser front end hands this crate a tree of typed [`ast`] nodes;
//! [`codegen::CodeGen`] walks that tree and produces a verified LLVM
//! module, which can then be written out as textual IR or a native
//! object file.

pub mod ast;
pub mod codegen;

pub use codegen::{CodeGen, EmitKind};
