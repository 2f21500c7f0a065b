//! The lexical scope chain for stack-allocated locals.

use inkwell::values::PointerValue;
use rustc_hash::FxHashMap;
use slate_common::{CodegenError, Span};

use super::types::Ty;

/// A named stack slot: the alloca holding the variable plus its type.
#[derive(Debug, Clone)]
pub(crate) struct Slot<'ctx> {
    pub ptr: PointerValue<'ctx>,
    pub ty: Ty,
}

#[derive(Debug, Default)]
struct Scope<'ctx> {
    parent: Option<usize>,
    vars: FxHashMap<String, Slot<'ctx>>,
}

/// The scope chain, stored as an arena indexed by position.
///
/// `enter`/`leave` move the current pointer. Allocation consults only
/// the current scope, so an inner scope may shadow an outer variable;
/// lookup walks the parent chain outward.
#[derive(Debug)]
pub(crate) struct ScopeArena<'ctx> {
    scopes: Vec<Scope<'ctx>>,
    current: usize,
}

impl<'ctx> ScopeArena<'ctx> {
    pub fn new() -> Self {
        Self {
            scopes: vec![Scope::default()],
            current: 0,
        }
    }

    pub fn enter(&mut self) {
        self.scopes.push(Scope {
            parent: Some(self.current),
            vars: FxHashMap::default(),
        });
        self.current = self.scopes.len() - 1;
    }

    pub fn leave(&mut self) {
        if let Some(parent) = self.scopes[self.current].parent {
            self.current = parent;
        }
    }

    /// Bind a variable in the current scope. Rebinding a name already
    /// bound in this scope is fatal; shadowing an outer binding is not.
    pub fn allocate(
        &mut self,
        name: &str,
        slot: Slot<'ctx>,
        span: Span,
    ) -> Result<(), CodegenError> {
        let scope = &mut self.scopes[self.current];
        if scope.vars.contains_key(name) {
            return Err(CodegenError::redefinition(
                format!("Variable <{name}> is already allocated"),
                span,
            ));
        }
        scope.vars.insert(name.to_string(), slot);
        Ok(())
    }

    /// Find a binding, innermost scope first.
    pub fn lookup(&self, name: &str) -> Option<&Slot<'ctx>> {
        let mut index = Some(self.current);
        while let Some(i) = index {
            if let Some(slot) = self.scopes[i].vars.get(name) {
                return Some(slot);
            }
            index = self.scopes[i].parent;
        }
        None
    }
}
