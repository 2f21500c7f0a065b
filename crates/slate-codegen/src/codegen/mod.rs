//! LLVM IR generation from the typed AST.
//!
//! The lowering core walks a [`crate::ast::Program`] in a single pass
//! (declaration before use) and builds a verified LLVM module.
//!
//! ## Architecture
//!
//! - [`CodeGen`]: main codegen struct holding LLVM context, module, builder
//! - [`types`]: the type registry, structural comparator and LLVM type mapping
//! - [`scope`]: the lexical scope chain for stack-allocated locals
//! - [`interface`]: interface schemas and their struct layouts
//! - [`expr`]: expression lowering with expected-type propagation
//! - [`flow`]: statement and control-flow lowering

pub mod expr;
pub mod flow;
pub mod interface;
pub mod scope;
pub mod types;

use std::path::Path;

use inkwell::basic_block::BasicBlock;
use inkwell::builder::Builder;
use inkwell::context::Context;
use inkwell::module::{Linkage, Module};
use inkwell::passes::PassBuilderOptions;
use inkwell::targets::{
    CodeModel, FileType, InitializationConfig, RelocMode, Target, TargetMachine, TargetTriple,
};
use inkwell::types::{BasicMetadataTypeEnum, StructType};
use inkwell::values::{BasicValueEnum, FunctionValue};
use inkwell::OptimizationLevel;
use rustc_hash::FxHashMap;
use slate_common::{CodegenError, Span};

use crate::ast::{FunctionDecl, Item, Program, Prototype};

use self::flow::Flow;
use self::interface::Interface;
use self::scope::{ScopeArena, Slot};
use self::types::Ty;

/// Maps an LLVM builder error into a located [`CodegenError`].
pub(crate) fn compile_err<E: std::fmt::Display>(span: Span) -> impl FnOnce(E) -> CodegenError {
    move |e| CodegenError::compile(e.to_string(), span)
}

// ── Lowered values ───────────────────────────────────────────────────

/// The result of lowering an expression: the LLVM value (absent for
/// void-producing expressions) paired with its language-level type.
///
/// Opaque pointers make LLVM values typeless on the pointee side, so the
/// [`Ty`] travels alongside the value everywhere.
#[derive(Debug, Clone)]
pub(crate) struct RValue<'ctx> {
    pub llvm: Option<BasicValueEnum<'ctx>>,
    pub ty: Ty,
}

impl<'ctx> RValue<'ctx> {
    pub fn value(llvm: BasicValueEnum<'ctx>, ty: Ty) -> Self {
        Self { llvm: Some(llvm), ty }
    }

    pub fn void() -> Self {
        Self { llvm: None, ty: Ty::Void }
    }

    /// The LLVM value, or an error when the expression produced none.
    pub fn basic(&self, span: Span) -> Result<BasicValueEnum<'ctx>, CodegenError> {
        self.llvm.ok_or_else(|| {
            CodegenError::compile(
                format!("Expression of type <{}> has no value", self.ty),
                span,
            )
        })
    }
}

/// A declared function: its LLVM value plus the signature needed for
/// call-site checking.
#[derive(Debug, Clone)]
pub(crate) struct FnDecl<'ctx> {
    pub value: FunctionValue<'ctx>,
    pub params: Vec<(String, Ty)>,
    pub ret: Ty,
    pub is_variadic: bool,
}

/// Branch targets of the innermost enclosing loop.
#[derive(Debug, Clone, Copy)]
pub(crate) struct LoopPoints<'ctx> {
    pub continue_to: BasicBlock<'ctx>,
    pub break_to: BasicBlock<'ctx>,
}

// ── CodeGen ──────────────────────────────────────────────────────────

/// The main LLVM code generation context.
///
/// Holds the LLVM context, module, builder, the type registry and all
/// per-function lowering state.
pub struct CodeGen<'ctx> {
    /// The LLVM context (lifetime anchor for all LLVM values).
    pub(crate) context: &'ctx Context,
    /// The LLVM module being built.
    pub(crate) module: Module<'ctx>,
    /// The LLVM IR builder.
    pub(crate) builder: Builder<'ctx>,
    /// The target machine (for optimization and object file emission).
    pub(crate) target_machine: TargetMachine,

    // ── Type registry and layouts ────────────────────────────────────

    /// Source-level type names to their resolved types. Strict: a name
    /// registers exactly once.
    pub(crate) types: FxHashMap<String, Ty>,
    /// Declared interface schemas by name.
    pub(crate) interfaces: FxHashMap<String, Interface>,
    /// Backing LLVM struct layout per interface (named `interface.<name>`).
    pub(crate) struct_types: FxHashMap<String, StructType<'ctx>>,

    // ── Function tracking ────────────────────────────────────────────

    /// Declared functions by name (prototype signature + LLVM value).
    pub(crate) functions: FxHashMap<String, FnDecl<'ctx>>,
    /// The function currently being lowered.
    pub(crate) current_fn: Option<FunctionValue<'ctx>>,

    // ── Lowering state ───────────────────────────────────────────────

    /// The lexical scope chain for local variables.
    pub(crate) scopes: ScopeArena<'ctx>,
    /// The type the surrounding context expects the current expression
    /// to produce. Mutated only through [`CodeGen::with_expected`].
    pub(crate) expected: Option<Ty>,
    /// Break/continue targets, innermost loop last.
    pub(crate) loop_stack: Vec<LoopPoints<'ctx>>,
}

impl<'ctx> CodeGen<'ctx> {
    /// Create a new CodeGen instance.
    ///
    /// # Arguments
    ///
    /// * `context` - The LLVM context (must outlive the CodeGen)
    /// * `module_name` - Name for the LLVM module
    /// * `opt_level` - Optimization level (0 = none, 2 = default)
    /// * `target_triple` - Optional target triple; None = host default
    ///
    /// # Errors
    ///
    /// Returns an error if target initialization fails or the triple is invalid.
    pub fn new(
        context: &'ctx Context,
        module_name: &str,
        opt_level: u8,
        target_triple: Option<&str>,
    ) -> Result<Self, CodegenError> {
        Target::initialize_native(&InitializationConfig::default()).map_err(|e| {
            CodegenError::compile(
                format!("Failed to initialize native target: {}", e),
                Span::default(),
            )
        })?;

        let triple = match target_triple {
            Some(triple_str) => TargetTriple::create(triple_str),
            None => TargetMachine::get_default_triple(),
        };

        let target = Target::from_triple(&triple).map_err(|e| {
            CodegenError::compile(
                format!("Invalid target triple '{}': {}", triple, e),
                Span::default(),
            )
        })?;

        let opt = match opt_level {
            0 => OptimizationLevel::None,
            1 => OptimizationLevel::Less,
            _ => OptimizationLevel::Default,
        };

        let target_machine = target
            .create_target_machine(
                &triple,
                "generic",
                "",
                opt,
                RelocMode::PIC,
                CodeModel::Default,
            )
            .ok_or_else(|| {
                CodegenError::compile(
                    format!("Failed to create target machine for '{}'", triple),
                    Span::default(),
                )
            })?;

        let module = context.create_module(module_name);
        module.set_triple(&triple);

        let builder = context.create_builder();

        let mut codegen = CodeGen {
            context,
            module,
            builder,
            target_machine,
            types: FxHashMap::default(),
            interfaces: FxHashMap::default(),
            struct_types: FxHashMap::default(),
            functions: FxHashMap::default(),
            current_fn: None,
            scopes: ScopeArena::new(),
            expected: None,
            loop_stack: Vec::new(),
        };
        codegen.install_builtin_types();
        Ok(codegen)
    }

    /// Compile a program to LLVM IR.
    ///
    /// This is the main compilation entry point. Top-level items are
    /// lowered in source order (declaration before use); the first error
    /// aborts. Afterwards the whole module is verified, and a failed
    /// verification is fatal.
    pub fn compile(&mut self, program: &Program) -> Result<(), CodegenError> {
        for item in &program.items {
            match item {
                Item::Interface(decl) => self.declare_interface(decl)?,
                Item::Prototype(proto) => {
                    self.declare_prototype(proto)?;
                }
                Item::Function(func) => self.lower_function(func)?,
            }
        }

        self.module.verify().map_err(|e| {
            CodegenError::compile(
                format!("LLVM module verification failed: {}", e),
                Span::default(),
            )
        })?;

        Ok(())
    }

    /// Run the module through the scalar cleanup pipeline.
    ///
    /// The legacy per-function pass manager is gone in LLVM 21; the same
    /// passes run through the new pass manager over every function at once.
    pub fn run_optimization_passes(&self) -> Result<(), CodegenError> {
        self.module
            .run_passes(
                "function(instcombine,reassociate,simplifycfg)",
                &self.target_machine,
                PassBuilderOptions::create(),
            )
            .map_err(|e| {
                CodegenError::compile(format!("Optimization passes failed: {}", e), Span::default())
            })
    }

    /// Optimize and write the module to `path` in the requested format.
    pub fn emit(&self, path: &Path, kind: EmitKind) -> Result<(), CodegenError> {
        self.run_optimization_passes()?;
        match kind {
            EmitKind::LlvmIr => self.emit_llvm_ir(path),
            EmitKind::Object => self.emit_object(path),
        }
    }

    /// Emit the LLVM module as an object file.
    pub fn emit_object(&self, path: &Path) -> Result<(), CodegenError> {
        self.target_machine
            .write_to_file(&self.module, FileType::Object, path)
            .map_err(|e| {
                CodegenError::compile(format!("Failed to emit object file: {}", e), Span::default())
            })
    }

    /// Emit the LLVM module as human-readable LLVM IR (.ll file).
    pub fn emit_llvm_ir(&self, path: &Path) -> Result<(), CodegenError> {
        self.module.print_to_file(path).map_err(|e| {
            CodegenError::compile(format!("Failed to emit LLVM IR: {}", e), Span::default())
        })
    }

    /// Get the LLVM IR as a string (for testing).
    pub fn get_llvm_ir(&self) -> String {
        self.module.print_to_string().to_string()
    }

    // ── Function declaration and lowering ────────────────────────────

    /// Declare a function from its prototype, or return the existing
    /// declaration when the name was already declared.
    ///
    /// `main`, extern and exported functions get external linkage;
    /// everything else is private to the module.
    pub(crate) fn declare_prototype(
        &mut self,
        proto: &Prototype,
    ) -> Result<FunctionValue<'ctx>, CodegenError> {
        if let Some(existing) = self.functions.get(&proto.name) {
            return Ok(existing.value);
        }

        let mut params = Vec::with_capacity(proto.params.len());
        let mut param_types: Vec<BasicMetadataTypeEnum<'ctx>> =
            Vec::with_capacity(proto.params.len());
        for (name, type_ref) in &proto.params {
            let ty = self.resolve_type_ref(type_ref)?;
            param_types.push(self.llvm_type(&ty, type_ref.span)?.into());
            params.push((name.clone(), ty));
        }

        let ret = match &proto.return_type {
            Some(type_ref) => self.resolve_type_ref(type_ref)?,
            None => Ty::Void,
        };

        let fn_type = self.llvm_fn_type(&ret, &param_types, proto.is_variadic, proto.span)?;
        let linkage = if proto.name == "main" || proto.is_extern || proto.is_exported {
            None
        } else {
            Some(Linkage::Private)
        };
        let value = self.module.add_function(&proto.name, fn_type, linkage);

        self.functions.insert(
            proto.name.clone(),
            FnDecl {
                value,
                params,
                ret,
                is_variadic: proto.is_variadic,
            },
        );
        Ok(value)
    }

    /// Lower a function definition: declare it, lower the body into an
    /// entry block, and synthesize a trailing return when the body falls
    /// through.
    pub(crate) fn lower_function(&mut self, func: &FunctionDecl) -> Result<(), CodegenError> {
        let value = self.declare_prototype(&func.prototype)?;
        if value.count_basic_blocks() > 0 {
            return Err(CodegenError::redefinition(
                "Function cannot be redefined.",
                func.span,
            ));
        }

        let (params, ret) = {
            let decl = self
                .functions
                .get(&func.prototype.name)
                .ok_or_else(|| {
                    CodegenError::compile(
                        format!("Function <{}> was not declared", func.prototype.name),
                        func.span,
                    )
                })?;
            (decl.params.clone(), decl.ret.clone())
        };

        self.current_fn = Some(value);
        let entry = self.context.append_basic_block(value, "entry");
        self.builder.position_at_end(entry);

        self.scopes.enter();
        let result = self.lower_function_body(func, value, &params, &ret);
        self.scopes.leave();
        self.current_fn = None;
        result?;

        // Per-function check is advisory; module verification is the gate.
        let _ = value.verify(false);
        Ok(())
    }

    fn lower_function_body(
        &mut self,
        func: &FunctionDecl,
        value: FunctionValue<'ctx>,
        params: &[(String, Ty)],
        ret: &Ty,
    ) -> Result<(), CodegenError> {
        for (i, (name, ty)) in params.iter().enumerate() {
            let llvm_ty = self.llvm_type(ty, func.span)?;
            let alloca = self
                .builder
                .build_alloca(llvm_ty, name)
                .map_err(compile_err(func.span))?;
            let param_val = value.get_nth_param(i as u32).ok_or_else(|| {
                CodegenError::compile(
                    format!(
                        "Missing parameter {} for function <{}>",
                        i, func.prototype.name
                    ),
                    func.span,
                )
            })?;
            self.builder
                .build_store(alloca, param_val)
                .map_err(compile_err(func.span))?;
            self.scopes.allocate(
                name,
                Slot {
                    ptr: alloca,
                    ty: ty.clone(),
                },
                func.span,
            )?;
        }

        let ret_ty = ret.clone();
        let flow = self.with_expected(Some(ret_ty), |cg| cg.lower_block(&func.body))?;
        if flow == Flow::Next {
            self.synthesize_return(ret, func.span)?;
        }
        Ok(())
    }

    /// Terminate a fall-through body: void returns void, bool returns
    /// false, numerics return zero. Anything else is left unterminated
    /// for module verification to report.
    fn synthesize_return(&mut self, ret: &Ty, span: Span) -> Result<(), CodegenError> {
        match ret {
            Ty::Void => {
                self.builder.build_return(None).map_err(compile_err(span))?;
            }
            Ty::Int(1) => {
                let value = self.context.bool_type().const_zero();
                self.builder
                    .build_return(Some(&value))
                    .map_err(compile_err(span))?;
            }
            Ty::Int(_) | Ty::Float(_) => {
                let zero = self.with_expected(Some(ret.clone()), |cg| cg.number_lit("0", span))?;
                let value = zero.basic(span)?;
                self.builder
                    .build_return(Some(&value))
                    .map_err(compile_err(span))?;
            }
            _ => {}
        }
        Ok(())
    }

    // ── Helpers ──────────────────────────────────────────────────────

    /// Run `f` with the expected type swapped in, restoring the previous
    /// value on the way out regardless of the result.
    pub(crate) fn with_expected<T>(
        &mut self,
        expected: Option<Ty>,
        f: impl FnOnce(&mut Self) -> Result<T, CodegenError>,
    ) -> Result<T, CodegenError> {
        let saved = std::mem::replace(&mut self.expected, expected);
        let result = f(self);
        self.expected = saved;
        result
    }

    /// The function currently being lowered.
    pub(crate) fn current_function(&self, span: Span) -> Result<FunctionValue<'ctx>, CodegenError> {
        self.current_fn
            .ok_or_else(|| CodegenError::compile("No function is being lowered", span))
    }
}

/// Output format for [`CodeGen::emit`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmitKind {
    /// Textual LLVM IR (`.ll`).
    LlvmIr,
    /// A native object file for the configured target.
    Object,
}
