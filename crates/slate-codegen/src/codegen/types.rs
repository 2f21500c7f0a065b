//! The lowering-side type model.
//!
//! [`Ty`] is the owned, language-level view of a type. LLVM 21 uses
//! opaque pointers, so pointee and struct-field information cannot be
//! recovered from LLVM values; every lowered value carries its [`Ty`]
//! instead, and this module maps it back onto LLVM types on demand.

use std::fmt;

use inkwell::types::{
    BasicMetadataTypeEnum, BasicType, BasicTypeEnum, FloatType, FunctionType,
};
use inkwell::AddressSpace;
use slate_common::{CodegenError, Span};

use crate::ast::TypeRef;

use super::CodeGen;

/// A resolved type.
///
/// `Int(1)` is the bool type and `Pointer(Int(8))` is the string type;
/// there are no separate variants for them.
#[derive(Debug, Clone, PartialEq)]
pub enum Ty {
    Void,
    /// A signed integer of the given bit width.
    Int(u32),
    /// An IEEE float of 16, 32 or 64 bits.
    Float(u32),
    Pointer(Box<Ty>),
    Array(Box<Ty>, u64),
    /// An interface instance; fields are the effective properties in
    /// layout order.
    Struct { name: String, fields: Vec<Ty> },
}

impl Ty {
    /// The string type, `i8*` at the language level.
    pub fn string() -> Self {
        Ty::Pointer(Box::new(Ty::Int(8)))
    }

    pub fn is_void(&self) -> bool {
        matches!(self, Ty::Void)
    }

    pub fn is_bool(&self) -> bool {
        matches!(self, Ty::Int(1))
    }

    /// Structural compatibility.
    ///
    /// Pointers only match pointers (recursing into the pointees), arrays
    /// compare element type and count, and structs compare field-by-field
    /// in order regardless of their names.
    pub fn compatible(&self, other: &Ty) -> bool {
        match (self, other) {
            (Ty::Void, Ty::Void) => true,
            (Ty::Int(a), Ty::Int(b)) => a == b,
            (Ty::Float(a), Ty::Float(b)) => a == b,
            (Ty::Pointer(a), Ty::Pointer(b)) => a.compatible(b),
            (Ty::Array(a, n), Ty::Array(b, m)) => n == m && a.compatible(b),
            (Ty::Struct { fields: a, .. }, Ty::Struct { fields: b, .. }) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.compatible(y))
            }
            _ => false,
        }
    }
}

impl fmt::Display for Ty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Ty::Void => write!(f, "void"),
            Ty::Int(1) => write!(f, "bool"),
            Ty::Int(bits) => write!(f, "i{bits}"),
            Ty::Float(bits @ (16 | 32 | 64)) => write!(f, "f{bits}"),
            Ty::Pointer(pointee) if **pointee == Ty::Int(8) => write!(f, "string"),
            Ty::Struct { name, .. } => write!(f, "{name}"),
            _ => write!(f, "unknown"),
        }
    }
}

impl<'ctx> CodeGen<'ctx> {
    pub(crate) fn install_builtin_types(&mut self) {
        let builtins = [
            ("void", Ty::Void),
            ("bool", Ty::Int(1)),
            ("string", Ty::string()),
            ("i8", Ty::Int(8)),
            ("i16", Ty::Int(16)),
            ("i32", Ty::Int(32)),
            ("i64", Ty::Int(64)),
            ("i128", Ty::Int(128)),
            ("f16", Ty::Float(16)),
            ("f32", Ty::Float(32)),
            ("f64", Ty::Float(64)),
        ];
        for (name, ty) in builtins {
            self.types.insert(name.to_string(), ty);
        }
    }

    /// Register a type under a fresh name. Registering a name twice is
    /// fatal, built-ins included.
    pub fn def_type(&mut self, name: &str, ty: Ty, span: Span) -> Result<(), CodegenError> {
        if self.types.contains_key(name) {
            return Err(CodegenError::redefinition(
                format!("Type <{name}> can not be defined again."),
                span,
            ));
        }
        self.types.insert(name.to_string(), ty);
        Ok(())
    }

    /// Resolve a source-level type name.
    pub fn resolve_type(&self, name: &str, span: Span) -> Result<Ty, CodegenError> {
        self.types
            .get(name)
            .cloned()
            .ok_or_else(|| CodegenError::undefined(format!("Type <{name}> not found."), span))
    }

    pub(crate) fn resolve_type_ref(&self, type_ref: &TypeRef) -> Result<Ty, CodegenError> {
        self.resolve_type(&type_ref.name, type_ref.span)
    }

    // ── LLVM type mapping ────────────────────────────────────────────

    /// Map a [`Ty`] onto the LLVM type used for its values. `Void` has no
    /// value representation and is rejected; return types go through
    /// [`CodeGen::llvm_fn_type`] instead.
    pub(crate) fn llvm_type(
        &self,
        ty: &Ty,
        span: Span,
    ) -> Result<BasicTypeEnum<'ctx>, CodegenError> {
        match ty {
            Ty::Void => Err(CodegenError::compile(
                "Type <void> has no value representation",
                span,
            )),
            Ty::Int(bits) => Ok(self.context.custom_width_int_type(*bits).into()),
            Ty::Float(bits) => Ok(self.llvm_float_type(*bits).into()),
            Ty::Pointer(_) => {
                Ok(self.context.i8_type().ptr_type(AddressSpace::default()).into())
            }
            Ty::Array(elem, count) => {
                Ok(self.llvm_type(elem, span)?.array_type(*count as u32).into())
            }
            Ty::Struct { name, .. } => self
                .struct_types
                .get(name)
                .map(|s| s.as_basic_type_enum())
                .ok_or_else(|| {
                    CodegenError::undefined(format!("Type <{name}> not found."), span)
                }),
        }
    }

    pub(crate) fn llvm_float_type(&self, bits: u32) -> FloatType<'ctx> {
        match bits {
            16 => self.context.f16_type(),
            32 => self.context.f32_type(),
            _ => self.context.f64_type(),
        }
    }

    pub(crate) fn llvm_fn_type(
        &self,
        ret: &Ty,
        params: &[BasicMetadataTypeEnum<'ctx>],
        is_variadic: bool,
        span: Span,
    ) -> Result<FunctionType<'ctx>, CodegenError> {
        match ret {
            Ty::Void => Ok(self.context.void_type().fn_type(params, is_variadic)),
            _ => Ok(self.llvm_type(ret, span)?.fn_type(params, is_variadic)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use inkwell::context::Context;
    use slate_common::ErrorKind;

    #[test]
    fn display_uses_source_names() {
        assert_eq!(Ty::Void.to_string(), "void");
        assert_eq!(Ty::Int(1).to_string(), "bool");
        assert_eq!(Ty::Int(32).to_string(), "i32");
        assert_eq!(Ty::Float(64).to_string(), "f64");
        assert_eq!(Ty::string().to_string(), "string");
        let point = Ty::Struct {
            name: "Point".to_string(),
            fields: vec![Ty::Int(32), Ty::Int(32)],
        };
        assert_eq!(point.to_string(), "Point");
    }

    #[test]
    fn compatible_is_reflexive_and_symmetric() {
        let cases = [
            Ty::Void,
            Ty::Int(1),
            Ty::Int(64),
            Ty::Float(32),
            Ty::string(),
            Ty::Array(Box::new(Ty::Int(8)), 4),
        ];
        for ty in &cases {
            assert!(ty.compatible(ty), "{ty} should match itself");
        }
        for a in &cases {
            for b in &cases {
                assert_eq!(a.compatible(b), b.compatible(a), "{a} vs {b}");
            }
        }
    }

    #[test]
    fn compatible_distinguishes_widths() {
        assert!(!Ty::Int(32).compatible(&Ty::Int(64)));
        assert!(!Ty::Float(32).compatible(&Ty::Float(64)));
        assert!(!Ty::Int(32).compatible(&Ty::Float(32)));
        assert!(!Ty::Array(Box::new(Ty::Int(8)), 4).compatible(&Ty::Array(Box::new(Ty::Int(8)), 5)));
    }

    #[test]
    fn pointers_only_match_pointers() {
        assert!(Ty::string().compatible(&Ty::string()));
        assert!(!Ty::string().compatible(&Ty::Int(8)));
        assert!(!Ty::Int(8).compatible(&Ty::string()));
        assert!(!Ty::Pointer(Box::new(Ty::string())).compatible(&Ty::Int(8)));
        assert!(!Ty::Pointer(Box::new(Ty::Int(8))).compatible(&Ty::Pointer(Box::new(Ty::Int(32)))));
    }

    #[test]
    fn structs_compare_positionally() {
        let a = Ty::Struct {
            name: "A".to_string(),
            fields: vec![Ty::Int(32), Ty::Float(64)],
        };
        let b = Ty::Struct {
            name: "B".to_string(),
            fields: vec![Ty::Int(32), Ty::Float(64)],
        };
        let c = Ty::Struct {
            name: "C".to_string(),
            fields: vec![Ty::Float(64), Ty::Int(32)],
        };
        assert!(a.compatible(&b), "same layout, different names");
        assert!(!a.compatible(&c), "field order matters");
    }

    #[test]
    fn registry_is_strict() {
        let context = Context::create();
        let mut codegen = CodeGen::new(&context, "test", 0, None).unwrap();
        let err = codegen
            .def_type("i32", Ty::Int(32), Span::default())
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Redefinition);
        assert_eq!(err.message, "Type <i32> can not be defined again.");
    }

    #[test]
    fn unknown_type_name_is_fatal() {
        let context = Context::create();
        let codegen = CodeGen::new(&context, "test", 0, None).unwrap();
        let err = codegen.resolve_type("vec3", Span::new(4, 8)).unwrap_err();
        assert_eq!(err.kind, ErrorKind::UndefinedSymbol);
        assert_eq!(err.message, "Type <vec3> not found.");
        assert_eq!(err.span, Span::new(4, 8));

        let err = codegen.resolve_type("", Span::default()).unwrap_err();
        assert_eq!(err.kind, ErrorKind::UndefinedSymbol);
    }

    #[test]
    fn builtins_resolve() {
        let context = Context::create();
        let codegen = CodeGen::new(&context, "test", 0, None).unwrap();
        assert_eq!(codegen.resolve_type("bool", Span::default()).unwrap(), Ty::Int(1));
        assert_eq!(
            codegen.resolve_type("string", Span::default()).unwrap(),
            Ty::string()
        );
        assert_eq!(
            codegen.resolve_type("i128", Span::default()).unwrap(),
            Ty::Int(128)
        );
    }

    #[test]
    fn llvm_mapping() {
        let context = Context::create();
        let codegen = CodeGen::new(&context, "test", 0, None).unwrap();
        let bool_ty = codegen.llvm_type(&Ty::Int(1), Span::default()).unwrap();
        assert!(bool_ty.is_int_type());
        assert_eq!(bool_ty.into_int_type().get_bit_width(), 1);

        let string_ty = codegen.llvm_type(&Ty::string(), Span::default()).unwrap();
        assert!(string_ty.is_pointer_type());

        let err = codegen.llvm_type(&Ty::Void, Span::default()).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Compile);
    }
}
