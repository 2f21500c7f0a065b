//! Interface schemas and their LLVM struct layouts.
//!
//! An interface declares named, ordered properties and may extend other
//! interfaces. The effective layout flattens every base first (in
//! declaration order), then appends the interface's own properties, and
//! that order is frozen into a named LLVM struct `interface.<name>`.

use slate_common::{CodegenError, Span};

use crate::ast::InterfaceDecl;

use super::types::Ty;
use super::CodeGen;

/// A declared interface: its own resolved properties plus the names of
/// the interfaces it extends. Immutable once declared.
#[derive(Debug, Clone)]
pub(crate) struct Interface {
    pub name: String,
    pub properties: Vec<(String, Ty)>,
    pub bases: Vec<String>,
    pub span: Span,
}

impl<'ctx> CodeGen<'ctx> {
    /// Declare an interface: resolve its property types, build the
    /// effective layout, create the backing LLVM struct and register the
    /// struct type under the interface name.
    pub(crate) fn declare_interface(&mut self, decl: &InterfaceDecl) -> Result<(), CodegenError> {
        if self.interfaces.contains_key(&decl.name) {
            return Err(CodegenError::type_error(
                format!("Interface <{}> can not be defined again.", decl.name),
                decl.span,
            ));
        }

        let mut properties = Vec::with_capacity(decl.properties.len());
        for (name, type_ref) in &decl.properties {
            properties.push((name.clone(), self.resolve_type_ref(type_ref)?));
        }
        self.interfaces.insert(
            decl.name.clone(),
            Interface {
                name: decl.name.clone(),
                properties,
                bases: decl.bases.clone(),
                span: decl.span,
            },
        );

        let effective = self.effective_properties(&decl.name, decl.span)?;
        let field_types = effective
            .iter()
            .map(|(_, ty)| self.llvm_type(ty, decl.span))
            .collect::<Result<Vec<_>, _>>()?;
        let struct_ty = self
            .context
            .opaque_struct_type(&format!("interface.{}", decl.name));
        struct_ty.set_body(&field_types, false);
        self.struct_types.insert(decl.name.clone(), struct_ty);

        let fields = effective.into_iter().map(|(_, ty)| ty).collect();
        self.def_type(
            &decl.name,
            Ty::Struct {
                name: decl.name.clone(),
                fields,
            },
            decl.span,
        )
    }

    /// The flattened property list of an interface: base properties first
    /// (recursively, in declaration order), own properties last. A
    /// property name may appear only once across the whole chain.
    pub(crate) fn effective_properties(
        &self,
        name: &str,
        span: Span,
    ) -> Result<Vec<(String, Ty)>, CodegenError> {
        let schema = self
            .interfaces
            .get(name)
            .ok_or_else(|| CodegenError::undefined(format!("Type <{name}> not found."), span))?;

        let mut properties: Vec<(String, Ty)> = Vec::new();
        for base in &schema.bases {
            if base == name {
                return Err(CodegenError::type_error(
                    format!("Interface <{name}> can't extend itself"),
                    span,
                ));
            }
            if !self.interfaces.contains_key(base) {
                return Err(CodegenError::type_error(
                    "Interfaces can only extend other interfaces",
                    span,
                ));
            }
            for (property, ty) in self.effective_properties(base, span)? {
                push_property(&mut properties, property, ty, span)?;
            }
        }
        for (property, ty) in &schema.properties {
            push_property(&mut properties, property.clone(), ty.clone(), span)?;
        }
        Ok(properties)
    }

    /// The layout index and type of a property, by linear scan over the
    /// effective property list.
    pub(crate) fn property_slot(
        &self,
        interface: &str,
        property: &str,
        span: Span,
    ) -> Result<(usize, Ty), CodegenError> {
        let effective = self.effective_properties(interface, span)?;
        effective
            .into_iter()
            .enumerate()
            .find(|(_, (name, _))| name == property)
            .map(|(index, (_, ty))| (index, ty))
            .ok_or_else(|| {
                CodegenError::undefined(
                    format!("Interface <{interface}> has no property named <{property}>"),
                    span,
                )
            })
    }
}

fn push_property(
    properties: &mut Vec<(String, Ty)>,
    property: String,
    ty: Ty,
    span: Span,
) -> Result<(), CodegenError> {
    if properties.iter().any(|(name, _)| *name == property) {
        return Err(CodegenError::redefinition(
            format!("Property <{property}> can not be redefined"),
            span,
        ));
    }
    properties.push((property, ty));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::TypeRef;
    use inkwell::context::Context;
    use slate_common::ErrorKind;

    fn decl(name: &str, properties: &[(&str, &str)], bases: &[&str]) -> InterfaceDecl {
        InterfaceDecl {
            name: name.to_string(),
            properties: properties
                .iter()
                .map(|(p, t)| (p.to_string(), TypeRef::new(*t, Span::default())))
                .collect(),
            bases: bases.iter().map(|b| b.to_string()).collect(),
            span: Span::default(),
        }
    }

    fn codegen(context: &Context) -> CodeGen<'_> {
        CodeGen::new(context, "test", 0, None).unwrap()
    }

    #[test]
    fn effective_layout_puts_bases_first() {
        let context = Context::create();
        let mut cg = codegen(&context);
        cg.declare_interface(&decl("Point", &[("x", "i32"), ("y", "i32")], &[]))
            .unwrap();
        cg.declare_interface(&decl("Point3", &[("z", "i32")], &["Point"]))
            .unwrap();

        let effective = cg.effective_properties("Point3", Span::default()).unwrap();
        let names: Vec<&str> = effective.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["x", "y", "z"]);
        assert_eq!(cg.property_slot("Point3", "z", Span::default()).unwrap().0, 2);
    }

    #[test]
    fn interface_registers_a_struct_type() {
        let context = Context::create();
        let mut cg = codegen(&context);
        cg.declare_interface(&decl("Point", &[("x", "i32"), ("y", "f64")], &[]))
            .unwrap();

        assert!(cg.struct_types.contains_key("Point"));
        let ty = cg.resolve_type("Point", Span::default()).unwrap();
        assert_eq!(
            ty,
            Ty::Struct {
                name: "Point".to_string(),
                fields: vec![Ty::Int(32), Ty::Float(64)],
            }
        );
    }

    #[test]
    fn duplicate_interface_is_fatal() {
        let context = Context::create();
        let mut cg = codegen(&context);
        cg.declare_interface(&decl("Point", &[("x", "i32")], &[]))
            .unwrap();
        let err = cg
            .declare_interface(&decl("Point", &[("x", "i32")], &[]))
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Type);
        assert_eq!(err.message, "Interface <Point> can not be defined again.");
    }

    #[test]
    fn self_extension_is_fatal() {
        let context = Context::create();
        let mut cg = codegen(&context);
        let err = cg
            .declare_interface(&decl("Loop", &[("x", "i32")], &["Loop"]))
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Type);
        assert_eq!(err.message, "Interface <Loop> can't extend itself");
    }

    #[test]
    fn extending_a_non_interface_is_fatal() {
        let context = Context::create();
        let mut cg = codegen(&context);
        let err = cg
            .declare_interface(&decl("Odd", &[("x", "i32")], &["i64"]))
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Type);
        assert_eq!(err.message, "Interfaces can only extend other interfaces");
    }

    #[test]
    fn duplicate_property_across_bases_is_fatal() {
        let context = Context::create();
        let mut cg = codegen(&context);
        cg.declare_interface(&decl("Named", &[("name", "string")], &[]))
            .unwrap();
        let err = cg
            .declare_interface(&decl("User", &[("name", "string")], &["Named"]))
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Redefinition);
        assert_eq!(err.message, "Property <name> can not be redefined");
    }

    #[test]
    fn missing_property_lookup() {
        let context = Context::create();
        let mut cg = codegen(&context);
        cg.declare_interface(&decl("Point", &[("x", "i32")], &[]))
            .unwrap();
        let err = cg.property_slot("Point", "w", Span::default()).unwrap_err();
        assert_eq!(err.kind, ErrorKind::UndefinedSymbol);
        assert_eq!(err.message, "Interface <Point> has no property named <w>");
    }
}
