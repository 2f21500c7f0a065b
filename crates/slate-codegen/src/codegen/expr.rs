//! Expression lowering.
//!
//! Lowering is driven by expected-type propagation: the surrounding
//! context (a typed definition, a call argument, a return, the static
//! side of a binary operation) decides what numeric literals become.
//! All integer arithmetic is signed.

use inkwell::values::{BasicMetadataValueEnum, BasicValueEnum, IntValue, PointerValue};
use inkwell::{FloatPredicate, IntPredicate};
use slate_common::{CodegenError, Span};

use crate::ast::{BinOp, Expr, TypeRef, UnOp, VarDef, VarRef};

use super::scope::Slot;
use super::types::Ty;
use super::{compile_err, CodeGen, RValue};

/// Number and null literals take their type from the other operand of a
/// binary operation instead of the ambient expected type.
fn is_dynamic(expr: &Expr) -> bool {
    matches!(expr, Expr::Number(..) | Expr::Null(..))
}

fn invalid_literal(text: &str, span: Span) -> CodegenError {
    CodegenError::compile(format!("Invalid numeric literal <{text}>"), span)
}

impl<'ctx> CodeGen<'ctx> {
    pub(crate) fn lower_expr(&mut self, expr: &Expr) -> Result<RValue<'ctx>, CodegenError> {
        match expr {
            Expr::Bool(value, _) => Ok(RValue::value(
                self.context.bool_type().const_int(*value as u64, false).into(),
                Ty::Int(1),
            )),
            Expr::Number(text, span) => self.number_lit(text, *span),
            Expr::Str(value, span) => self.string_lit(value, *span),
            Expr::Null(span) => Err(CodegenError::unsupported("Unsupported AST node!", *span)),
            Expr::Object { properties, span } => self.object_lit(properties, *span),
            Expr::Variable(var) => self.load_variable(var),
            Expr::Define(def) => {
                self.define_variable(def)?;
                Ok(RValue::void())
            }
            Expr::Unary {
                op,
                operand,
                suffix,
                span,
            } => self.lower_unary(*op, operand, *suffix, *span),
            Expr::Binary {
                op,
                left,
                right,
                span,
            } => match op {
                BinOp::Assign => self.lower_assign(left, right, *span),
                _ => self.lower_arith(*op, left, right, *span),
            },
            Expr::Cast { value, ty, span } => self.lower_cast(value, ty, *span),
            Expr::Call { callee, args, span } => self.lower_call(callee, args, *span),
            Expr::InlineIf {
                condition,
                then_value,
                else_value,
                span,
            } => self.lower_inline_if(condition, then_value, else_value, *span),
        }
    }

    // ── Literals ─────────────────────────────────────────────────────

    /// Lower a numeric literal under the ambient expected type. An
    /// integer expectation keeps the integer part of the text; a float
    /// expectation parses the whole text. Without a usable expectation
    /// the literal defaults to f64 when it carries a decimal point and
    /// i32 otherwise (a bool expectation is not usable).
    pub(crate) fn number_lit(&mut self, text: &str, span: Span) -> Result<RValue<'ctx>, CodegenError> {
        match self.expected.clone() {
            Some(Ty::Int(bits)) if bits != 1 => {
                let digits = text.split('.').next().unwrap_or(text);
                let value: i64 = digits.parse().map_err(|_| invalid_literal(text, span))?;
                let int = self
                    .context
                    .custom_width_int_type(bits)
                    .const_int(value as u64, true);
                Ok(RValue::value(int.into(), Ty::Int(bits)))
            }
            Some(Ty::Float(bits)) => {
                let value: f64 = text.parse().map_err(|_| invalid_literal(text, span))?;
                let float = self.llvm_float_type(bits).const_float(value);
                Ok(RValue::value(float.into(), Ty::Float(bits)))
            }
            _ => {
                if text.contains('.') {
                    let value: f64 = text.parse().map_err(|_| invalid_literal(text, span))?;
                    Ok(RValue::value(
                        self.context.f64_type().const_float(value).into(),
                        Ty::Float(64),
                    ))
                } else {
                    let value: i64 = text.parse().map_err(|_| invalid_literal(text, span))?;
                    Ok(RValue::value(
                        self.context.i32_type().const_int(value as u64, true).into(),
                        Ty::Int(32),
                    ))
                }
            }
        }
    }

    /// Intern a string literal as a module-level global named
    /// `string.<value>`, reused across identical literals.
    fn string_lit(&mut self, value: &str, span: Span) -> Result<RValue<'ctx>, CodegenError> {
        let name = format!("string.{value}");
        let global = match self.module.get_global(&name) {
            Some(global) => global,
            None => self
                .builder
                .build_global_string_ptr(value, &name)
                .map_err(compile_err(span))?,
        };
        Ok(RValue::value(global.as_pointer_value().into(), Ty::string()))
    }

    /// Lower an object literal into an interface instance. The expected
    /// type names the interface; every effective property must be given
    /// and no unknown keys are allowed.
    fn object_lit(
        &mut self,
        properties: &[(String, Expr)],
        span: Span,
    ) -> Result<RValue<'ctx>, CodegenError> {
        let Some(expected) = self.expected.clone() else {
            return Err(CodegenError::type_error("Can't detect suitable type", span));
        };
        let Ty::Struct { name, .. } = &expected else {
            return Err(CodegenError::type_error(
                format!("Can't cast object to type <{expected}>"),
                span,
            ));
        };
        let name = name.clone();

        let effective = self.effective_properties(&name, span)?;
        for (key, _) in properties {
            if !effective.iter().any(|(property, _)| property == key) {
                return Err(CodegenError::undefined(
                    format!("Interface <{name}> has no property named <{key}>"),
                    span,
                ));
            }
        }

        let struct_ty = self
            .struct_types
            .get(&name)
            .copied()
            .ok_or_else(|| CodegenError::undefined(format!("Type <{name}> not found."), span))?;
        let ptr = self
            .builder
            .build_alloca(struct_ty, "object")
            .map_err(compile_err(span))?;

        for (index, (property, field_ty)) in effective.iter().enumerate() {
            let Some((_, value_expr)) = properties.iter().find(|(key, _)| key == property) else {
                return Err(CodegenError::undefined(
                    format!("Property <{property}> is missing from interface <{name}>"),
                    span,
                ));
            };
            let rv =
                self.with_expected(Some(field_ty.clone()), |cg| cg.lower_expr(value_expr))?;
            let value = rv.basic(value_expr.span())?;
            let field_ptr = self
                .builder
                .build_struct_gep(ptr, index as u32, property)
                .map_err(compile_err(span))?;
            self.builder
                .build_store(field_ptr, value)
                .map_err(compile_err(span))?;
        }

        let loaded = self
            .builder
            .build_load(ptr, "object")
            .map_err(compile_err(span))?;
        Ok(RValue::value(loaded, expected))
    }

    // ── Variables ────────────────────────────────────────────────────

    /// The storage location and type behind a variable reference,
    /// following the property-access chain through struct GEPs.
    pub(crate) fn var_pointer(
        &self,
        var: &VarRef,
    ) -> Result<(PointerValue<'ctx>, Ty), CodegenError> {
        match &var.parent {
            Some(parent) => {
                let (parent_ptr, parent_ty) = self.var_pointer(parent)?;
                let Ty::Struct { name, .. } = &parent_ty else {
                    return Err(CodegenError::structural(
                        format!("Variable <{}> has no properties", parent.name),
                        parent.span,
                    ));
                };
                let (index, field_ty) = self.property_slot(name, &var.name, var.span)?;
                let struct_ty = self.struct_types.get(name).copied().ok_or_else(|| {
                    CodegenError::undefined(format!("Type <{name}> not found."), var.span)
                })?;
                let field_ptr = self
                    .builder
                    .build_struct_gep(parent_ptr, index as u32, &var.name)
                    .map_err(compile_err(var.span))?;
                Ok((field_ptr, field_ty))
            }
            None => {
                let slot = self.scopes.lookup(&var.name).ok_or_else(|| {
                    CodegenError::undefined(
                        format!("Variable <{}> is not allocated yet", var.name),
                        var.span,
                    )
                })?;
                Ok((slot.ptr, slot.ty.clone()))
            }
        }
    }

    fn load_variable(&mut self, var: &VarRef) -> Result<RValue<'ctx>, CodegenError> {
        let (ptr, ty) = self.var_pointer(var)?;
        let llvm_ty = self.llvm_type(&ty, var.span)?;
        let value = self
            .builder
            .build_load(ptr, &var.name)
            .map_err(compile_err(var.span))?;
        Ok(RValue::value(value, ty))
    }

    /// A standalone definition (`let x: T;`) allocates without a value;
    /// the type annotation is mandatory here since there is nothing to
    /// infer from.
    fn define_variable(&mut self, def: &VarDef) -> Result<Slot<'ctx>, CodegenError> {
        let ty = match &def.ty {
            Some(type_ref) => self.resolve_type_ref(type_ref)?,
            None => {
                return Err(CodegenError::type_error("Can't detect suitable type", def.span))
            }
        };
        self.alloc_variable(&def.name, ty, def.span)
    }

    pub(crate) fn alloc_variable(
        &mut self,
        name: &str,
        ty: Ty,
        span: Span,
    ) -> Result<Slot<'ctx>, CodegenError> {
        let llvm_ty = self.llvm_type(&ty, span)?;
        let ptr = self
            .builder
            .build_alloca(llvm_ty, name)
            .map_err(compile_err(span))?;
        let slot = Slot { ptr, ty };
        self.scopes.allocate(name, slot.clone(), span)?;
        Ok(slot)
    }

    // ── Assignment ───────────────────────────────────────────────────

    /// Lower an assignment. The left side is either a definition (typed
    /// or inferred) or an existing variable reference; the stored value
    /// is also the value of the whole expression.
    ///
    /// An inferred definition lowers its right side with the expected
    /// type cleared, so the variable takes the value's natural type
    /// rather than whatever the surrounding context wanted.
    fn lower_assign(
        &mut self,
        left: &Expr,
        right: &Expr,
        span: Span,
    ) -> Result<RValue<'ctx>, CodegenError> {
        match left {
            Expr::Define(def) => match &def.ty {
                None => {
                    let rv = self.with_expected(None, |cg| cg.lower_expr(right))?;
                    let value = rv.basic(span)?;
                    let slot = self.alloc_variable(&def.name, rv.ty.clone(), def.span)?;
                    self.builder
                        .build_store(slot.ptr, value)
                        .map_err(compile_err(span))?;
                    Ok(rv)
                }
                Some(type_ref) => {
                    let ty = self.resolve_type_ref(type_ref)?;
                    let rv = self.with_expected(Some(ty.clone()), |cg| cg.lower_expr(right))?;
                    if !rv.ty.compatible(&ty) {
                        return Err(CodegenError::type_error(
                            format!(
                                "Expected the right side of the operation to be <{ty}>, got <{}> instead.",
                                rv.ty
                            ),
                            span,
                        ));
                    }
                    let value = rv.basic(span)?;
                    let slot = self.alloc_variable(&def.name, ty, def.span)?;
                    self.builder
                        .build_store(slot.ptr, value)
                        .map_err(compile_err(span))?;
                    Ok(rv)
                }
            },
            Expr::Variable(var) => {
                let (ptr, ty) = self.var_pointer(var)?;
                let rv = self.with_expected(Some(ty.clone()), |cg| cg.lower_expr(right))?;
                if !rv.ty.compatible(&ty) {
                    return Err(CodegenError::type_error(
                        format!(
                            "Expected the right side of the operation to be <{ty}>, got <{}> instead.",
                            rv.ty
                        ),
                        span,
                    ));
                }
                let value = rv.basic(span)?;
                self.builder
                    .build_store(ptr, value)
                    .map_err(compile_err(span))?;
                Ok(rv)
            }
            _ => Err(CodegenError::structural(
                "Expected left side of the equation to be a variable",
                span,
            )),
        }
    }

    // ── Binary operations ────────────────────────────────────────────

    /// Lower both operands of a binary operation. When exactly one side
    /// is a bare literal, the static side is lowered first and its type
    /// becomes the expected type of the literal side; otherwise both
    /// sides are lowered under the ambient expectation.
    fn parse_pair(
        &mut self,
        left: &Expr,
        right: &Expr,
    ) -> Result<(RValue<'ctx>, RValue<'ctx>), CodegenError> {
        match (is_dynamic(left), is_dynamic(right)) {
            (false, true) => {
                let lhs = self.lower_expr(left)?;
                let rhs = self.with_expected(Some(lhs.ty.clone()), |cg| cg.lower_expr(right))?;
                Ok((lhs, rhs))
            }
            (true, false) => {
                let rhs = self.lower_expr(right)?;
                let lhs = self.with_expected(Some(rhs.ty.clone()), |cg| cg.lower_expr(left))?;
                Ok((lhs, rhs))
            }
            _ => Ok((self.lower_expr(left)?, self.lower_expr(right)?)),
        }
    }

    fn lower_arith(
        &mut self,
        op: BinOp,
        left: &Expr,
        right: &Expr,
        span: Span,
    ) -> Result<RValue<'ctx>, CodegenError> {
        if matches!(op, BinOp::StarStar | BinOp::AndAnd | BinOp::OrOr) {
            return Err(CodegenError::unsupported("Unsupported binary operation!", span));
        }
        let (lhs, rhs) = self.parse_pair(left, right)?;
        if !lhs.ty.compatible(&rhs.ty) {
            return Err(CodegenError::type_error(
                "Expected both sides of the operation to have the same type.",
                span,
            ));
        }
        match &lhs.ty {
            Ty::Int(_) => self.int_arith(op, &lhs, &rhs, span),
            Ty::Float(_) => self.float_arith(op, &lhs, &rhs, span),
            _ => Err(CodegenError::unsupported(
                format!("Unsupported operation: <{}> {op} <{}>", lhs.ty, rhs.ty),
                span,
            )),
        }
    }

    fn int_arith(
        &mut self,
        op: BinOp,
        lhs: &RValue<'ctx>,
        rhs: &RValue<'ctx>,
        span: Span,
    ) -> Result<RValue<'ctx>, CodegenError> {
        let l = lhs.basic(span)?.into_int_value();
        let r = rhs.basic(span)?.into_int_value();

        let predicate = match op {
            BinOp::Lt => Some(IntPredicate::SLT),
            BinOp::Lte => Some(IntPredicate::SLE),
            BinOp::Eq => Some(IntPredicate::EQ),
            BinOp::Ne => Some(IntPredicate::NE),
            BinOp::Gte => Some(IntPredicate::SGE),
            BinOp::Gt => Some(IntPredicate::SGT),
            _ => None,
        };
        if let Some(predicate) = predicate {
            let value = self
                .builder
                .build_int_compare(predicate, l, r, "cmp")
                .map_err(compile_err(span))?;
            return Ok(RValue::value(value.into(), Ty::Int(1)));
        }

        let value = match op {
            BinOp::Star => self.builder.build_int_nsw_mul(l, r, "mul"),
            BinOp::Slash => self.builder.build_int_signed_div(l, r, "div"),
            BinOp::Percent => self.builder.build_int_signed_rem(l, r, "rem"),
            BinOp::Plus => self.builder.build_int_nsw_add(l, r, "add"),
            BinOp::Minus => self.builder.build_int_nsw_sub(l, r, "sub"),
            BinOp::Caret => self.builder.build_xor(l, r, "xor"),
            BinOp::And => self.builder.build_and(l, r, "and"),
            BinOp::Or => self.builder.build_or(l, r, "or"),
            BinOp::Shl => self.builder.build_left_shift(l, r, "shl"),
            BinOp::Shr => self.builder.build_right_shift(l, r, true, "ashr"),
            BinOp::UShr => self.builder.build_right_shift(l, r, false, "lshr"),
            _ => {
                return Err(CodegenError::unsupported(
                    format!("Unsupported operation: <{}> {op} <{}>", lhs.ty, rhs.ty),
                    span,
                ))
            }
        }
        .map_err(compile_err(span))?;
        Ok(RValue::value(value.into(), lhs.ty.clone()))
    }

    fn float_arith(
        &mut self,
        op: BinOp,
        lhs: &RValue<'ctx>,
        rhs: &RValue<'ctx>,
        span: Span,
    ) -> Result<RValue<'ctx>, CodegenError> {
        let l = lhs.basic(span)?.into_float_value();
        let r = rhs.basic(span)?.into_float_value();

        let predicate = match op {
            BinOp::Lt => Some(FloatPredicate::OLT),
            BinOp::Lte => Some(FloatPredicate::OLE),
            BinOp::Eq => Some(FloatPredicate::OEQ),
            BinOp::Ne => Some(FloatPredicate::ONE),
            BinOp::Gte => Some(FloatPredicate::OGE),
            BinOp::Gt => Some(FloatPredicate::OGT),
            _ => None,
        };
        if let Some(predicate) = predicate {
            let value = self
                .builder
                .build_float_compare(predicate, l, r, "cmp")
                .map_err(compile_err(span))?;
            return Ok(RValue::value(value.into(), Ty::Int(1)));
        }

        let value = match op {
            BinOp::Star => self.builder.build_float_mul(l, r, "fmul"),
            BinOp::Slash => self.builder.build_float_div(l, r, "fdiv"),
            BinOp::Percent => self.builder.build_float_rem(l, r, "frem"),
            BinOp::Plus => self.builder.build_float_add(l, r, "fadd"),
            BinOp::Minus => self.builder.build_float_sub(l, r, "fsub"),
            _ => {
                // Bitwise and shift operators have no float lowering.
                return Err(CodegenError::unsupported(
                    format!("Unsupported operation: <{}> {op} <{}>", lhs.ty, rhs.ty),
                    span,
                ));
            }
        }
        .map_err(compile_err(span))?;
        Ok(RValue::value(value.into(), lhs.ty.clone()))
    }

    // ── Unary operations ─────────────────────────────────────────────

    fn lower_unary(
        &mut self,
        op: UnOp,
        operand: &Expr,
        suffix: bool,
        span: Span,
    ) -> Result<RValue<'ctx>, CodegenError> {
        match op {
            UnOp::Increment | UnOp::Decrement => self.lower_step(op, operand, suffix, span),
            UnOp::Minus => self.lower_negate(operand, span),
            UnOp::Not => self.lower_not(operand, span),
            UnOp::Plus | UnOp::Tilde | UnOp::Ampersand => {
                Err(CodegenError::unsupported("Unsupported unary operation!", span))
            }
        }
    }

    /// `++`/`--` on a variable reference (possibly through a property
    /// chain): load, add or subtract one, store back. A suffix operator
    /// yields the old value, a prefix operator the new one.
    fn lower_step(
        &mut self,
        op: UnOp,
        operand: &Expr,
        suffix: bool,
        span: Span,
    ) -> Result<RValue<'ctx>, CodegenError> {
        let Expr::Variable(var) = operand else {
            return Err(CodegenError::structural("Expected variable", span));
        };
        let (ptr, ty) = self.var_pointer(var)?;
        let llvm_ty = self.llvm_type(&ty, span)?;
        let old = self
            .builder
            .build_load(ptr, &var.name)
            .map_err(compile_err(span))?;
        let one = self.with_expected(Some(ty.clone()), |cg| cg.number_lit("1", span))?;
        let one = one.basic(span)?;

        let new: BasicValueEnum<'ctx> = match &ty {
            Ty::Int(_) => {
                let old = old.into_int_value();
                let one = one.into_int_value();
                match op {
                    UnOp::Increment => self.builder.build_int_nsw_add(old, one, "inc"),
                    _ => self.builder.build_int_nsw_sub(old, one, "dec"),
                }
                .map_err(compile_err(span))?
                .into()
            }
            Ty::Float(_) => {
                let old = old.into_float_value();
                let one = one.into_float_value();
                match op {
                    UnOp::Increment => self.builder.build_float_add(old, one, "inc"),
                    _ => self.builder.build_float_sub(old, one, "dec"),
                }
                .map_err(compile_err(span))?
                .into()
            }
            _ => {
                return Err(CodegenError::unsupported(
                    format!("Unsupported operation: {op} <{ty}>"),
                    span,
                ))
            }
        };
        self.builder
            .build_store(ptr, new)
            .map_err(compile_err(span))?;
        Ok(RValue::value(if suffix { old } else { new }, ty))
    }

    fn lower_negate(&mut self, operand: &Expr, span: Span) -> Result<RValue<'ctx>, CodegenError> {
        let rv = self.lower_expr(operand)?;
        match &rv.ty {
            Ty::Int(_) => {
                let value = rv.basic(span)?.into_int_value();
                let zero = value.get_type().const_zero();
                let neg = self
                    .builder
                    .build_int_nsw_sub(zero, value, "neg")
                    .map_err(compile_err(span))?;
                Ok(RValue::value(neg.into(), rv.ty.clone()))
            }
            Ty::Float(_) => {
                let value = rv.basic(span)?.into_float_value();
                let neg = self
                    .builder
                    .build_float_neg(value, "neg")
                    .map_err(compile_err(span))?;
                Ok(RValue::value(neg.into(), rv.ty.clone()))
            }
            other => Err(CodegenError::unsupported(
                format!("Unsupported operation: - <{other}>"),
                span,
            )),
        }
    }

    fn lower_not(&mut self, operand: &Expr, span: Span) -> Result<RValue<'ctx>, CodegenError> {
        let rv = self.lower_expr(operand)?;
        self.not_rvalue(rv, span)
    }

    /// Logical not as a truthiness test: void is vacuously true, arrays
    /// are always truthy, bool flips bitwise, and numbers compare
    /// against zero.
    fn not_rvalue(&mut self, rv: RValue<'ctx>, span: Span) -> Result<RValue<'ctx>, CodegenError> {
        let value: IntValue<'ctx> = match &rv.ty {
            Ty::Void => self.context.bool_type().const_int(1, false),
            Ty::Array(..) => self.context.bool_type().const_zero(),
            Ty::Int(1) => self
                .builder
                .build_not(rv.basic(span)?.into_int_value(), "not")
                .map_err(compile_err(span))?,
            Ty::Int(_) => {
                let value = rv.basic(span)?.into_int_value();
                let zero = value.get_type().const_zero();
                self.builder
                    .build_int_compare(IntPredicate::EQ, value, zero, "not")
                    .map_err(compile_err(span))?
            }
            Ty::Float(_) => {
                let value = rv.basic(span)?.into_float_value();
                let zero = value.get_type().const_zero();
                self.builder
                    .build_float_compare(FloatPredicate::OEQ, value, zero, "not")
                    .map_err(compile_err(span))?
            }
            other => {
                return Err(CodegenError::unsupported(
                    format!("Unsupported operation: ! <{other}>"),
                    span,
                ))
            }
        };
        Ok(RValue::value(value.into(), Ty::Int(1)))
    }

    // ── Casts ────────────────────────────────────────────────────────

    fn lower_cast(
        &mut self,
        value: &Expr,
        type_ref: &TypeRef,
        span: Span,
    ) -> Result<RValue<'ctx>, CodegenError> {
        let target = self.resolve_type_ref(type_ref)?;

        // A literal cast to a numeric type is just the literal at that
        // width, no conversion instruction needed.
        if let Expr::Number(text, literal_span) = value {
            if matches!(target, Ty::Int(_) | Ty::Float(_)) {
                return self.with_expected(Some(target), |cg| cg.number_lit(text, *literal_span));
            }
        }

        let rv = self.lower_expr(value)?;
        if rv.ty.compatible(&target) {
            return Ok(RValue::value(rv.basic(span)?, target));
        }
        self.cast_rvalue(rv, target, span)
    }

    pub(crate) fn cast_rvalue(
        &mut self,
        rv: RValue<'ctx>,
        target: Ty,
        span: Span,
    ) -> Result<RValue<'ctx>, CodegenError> {
        if target.is_bool() {
            match &rv.ty {
                Ty::Void => {
                    return Ok(RValue::value(
                        self.context.bool_type().const_zero().into(),
                        target,
                    ))
                }
                Ty::Array(..) => {
                    return Ok(RValue::value(
                        self.context.bool_type().const_int(1, false).into(),
                        target,
                    ))
                }
                _ => {}
            }
        }

        let value: BasicValueEnum<'ctx> = match (&rv.ty, &target) {
            (Ty::Int(_), Ty::Int(bits)) => self
                .builder
                .build_int_cast_sign_flag(
                    rv.basic(span)?.into_int_value(),
                    self.context.custom_width_int_type(*bits),
                    true,
                    "cast",
                )
                .map_err(compile_err(span))?
                .into(),
            (Ty::Int(_), Ty::Float(bits)) => self
                .builder
                .build_signed_int_to_float(
                    rv.basic(span)?.into_int_value(),
                    self.llvm_float_type(*bits),
                    "cast",
                )
                .map_err(compile_err(span))?
                .into(),
            (Ty::Float(_), Ty::Int(bits)) => self
                .builder
                .build_float_to_signed_int(
                    rv.basic(span)?.into_float_value(),
                    self.context.custom_width_int_type(*bits),
                    "cast",
                )
                .map_err(compile_err(span))?
                .into(),
            (Ty::Float(_), Ty::Float(bits)) => self
                .builder
                .build_float_cast(
                    rv.basic(span)?.into_float_value(),
                    self.llvm_float_type(*bits),
                    "cast",
                )
                .map_err(compile_err(span))?
                .into(),
            // Opaque pointers make pointer-to-pointer casts a no-op.
            (Ty::Pointer(_), Ty::Pointer(_)) => rv.basic(span)?,
            (Ty::Pointer(_), Ty::Int(bits)) => self
                .builder
                .build_ptr_to_int(
                    rv.basic(span)?.into_pointer_value(),
                    self.context.custom_width_int_type(*bits),
                    "cast",
                )
                .map_err(compile_err(span))?
                .into(),
            (Ty::Int(_), Ty::Pointer(_)) => self
                .builder
                .build_int_to_ptr(
                    rv.basic(span)?.into_int_value(),
                    self.llvm_type(&target, span)?.into_pointer_type(),
                    "cast",
                )
                .map_err(compile_err(span))?
                .into(),
            _ => {
                return Err(CodegenError::unsupported(
                    format!("Unsupported cast: <{}> as <{}>", rv.ty, target),
                    span,
                ))
            }
        };
        Ok(RValue::value(value, target))
    }

    // ── Calls ────────────────────────────────────────────────────────

    fn lower_call(
        &mut self,
        callee: &str,
        args: &[Expr],
        span: Span,
    ) -> Result<RValue<'ctx>, CodegenError> {
        let decl = self
            .functions
            .get(callee)
            .cloned()
            .ok_or_else(|| {
                CodegenError::undefined(format!("Undefined function <{callee}>"), span)
            })?;

        let arity_ok = if decl.is_variadic {
            args.len() >= decl.params.len()
        } else {
            args.len() == decl.params.len()
        };
        if !arity_ok {
            return Err(CodegenError::type_error(
                format!(
                    "Function \"{callee}\" expected {} parameter(s), got {} parameter(s) instead.",
                    decl.params.len(),
                    args.len()
                ),
                span,
            ));
        }

        let mut lowered: Vec<BasicMetadataValueEnum<'ctx>> = Vec::with_capacity(args.len());
        for (i, arg) in args.iter().enumerate() {
            let rv = match decl.params.get(i) {
                Some((name, ty)) => {
                    let rv = self.with_expected(Some(ty.clone()), |cg| cg.lower_expr(arg))?;
                    if !rv.ty.compatible(ty) {
                        return Err(CodegenError::type_error(
                            format!(
                                "Expected parameter \"{name}\" to be <{ty}>, got <{}> instead.",
                                rv.ty
                            ),
                            arg.span(),
                        ));
                    }
                    rv
                }
                // Variadic tail arguments have no declared type.
                None => self.with_expected(None, |cg| cg.lower_expr(arg))?,
            };
            lowered.push(rv.basic(arg.span())?.into());
        }

        let name = if decl.ret.is_void() { "" } else { callee };
        let call = self
            .builder
            .build_call(decl.value, &lowered, name)
            .map_err(compile_err(span))?;
        match call.try_as_basic_value().basic() {
            Some(value) => Ok(RValue::value(value, decl.ret.clone())),
            None => Ok(RValue::void()),
        }
    }
}
