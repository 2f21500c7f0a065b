//! Statement and control-flow lowering.
//!
//! Every construct that branches tracks the block the builder actually
//! ends up in, not the block it started from, so nested control flow
//! feeds the right predecessors into merges and phis.

use inkwell::values::IntValue;
use slate_common::{CodegenError, Span};

use crate::ast::{Expr, IfStmt, Stmt};

use super::types::Ty;
use super::{compile_err, CodeGen, LoopPoints, RValue};

/// How a lowered statement left the instruction stream: falling through
/// to the next statement, or already terminated (return/break/continue).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Flow {
    Next,
    Terminated,
}

impl<'ctx> CodeGen<'ctx> {
    /// Lower a statement list in a fresh scope. Statements after a
    /// terminating one are unreachable and are dropped.
    pub(crate) fn lower_block(&mut self, stmts: &[Stmt]) -> Result<Flow, CodegenError> {
        self.scopes.enter();
        let result = self.lower_stmts(stmts);
        self.scopes.leave();
        result
    }

    fn lower_stmts(&mut self, stmts: &[Stmt]) -> Result<Flow, CodegenError> {
        for stmt in stmts {
            if self.lower_stmt(stmt)? == Flow::Terminated {
                return Ok(Flow::Terminated);
            }
        }
        Ok(Flow::Next)
    }

    fn lower_stmt(&mut self, stmt: &Stmt) -> Result<Flow, CodegenError> {
        match stmt {
            Stmt::Expr(expr) => {
                self.lower_expr(expr)?;
                Ok(Flow::Next)
            }
            Stmt::Return(value, span) => self.lower_return(value.as_ref(), *span),
            Stmt::Break(span) => {
                let points = self.loop_stack.last().copied().ok_or_else(|| {
                    CodegenError::structural("Unexpected \"break\" outside loop", *span)
                })?;
                self.builder
                    .build_unconditional_branch(points.break_to)
                    .map_err(compile_err(*span))?;
                Ok(Flow::Terminated)
            }
            Stmt::Continue(span) => {
                let points = self.loop_stack.last().copied().ok_or_else(|| {
                    CodegenError::structural("Unexpected \"continue\" outside loop", *span)
                })?;
                self.builder
                    .build_unconditional_branch(points.continue_to)
                    .map_err(compile_err(*span))?;
                Ok(Flow::Terminated)
            }
            Stmt::If(if_stmt) => self.lower_if(if_stmt),
            Stmt::Loop { body, span } => self.lower_loop(body, *span),
            Stmt::While {
                condition,
                body,
                is_do_while,
                span,
            } => self.lower_while(condition, body, *is_do_while, *span),
            Stmt::For {
                definition,
                condition,
                stepper,
                body,
                span,
            } => self.lower_for(definition, condition, stepper, body, *span),
        }
    }

    /// `return` checks the value against the function's return type (the
    /// ambient expected type inside a body) and terminates the block.
    fn lower_return(&mut self, value: Option<&Expr>, span: Span) -> Result<Flow, CodegenError> {
        let expected = self.expected.clone().unwrap_or(Ty::Void);
        match value {
            Some(expr) => {
                let rv = self.lower_expr(expr)?;
                if !rv.ty.compatible(&expected) {
                    return Err(CodegenError::type_error(
                        format!(
                            "Expected function to return <{expected}>, got <{}> instead.",
                            rv.ty
                        ),
                        span,
                    ));
                }
                match rv.llvm {
                    Some(v) => {
                        self.builder
                            .build_return(Some(&v))
                            .map_err(compile_err(span))?;
                    }
                    None => {
                        self.builder.build_return(None).map_err(compile_err(span))?;
                    }
                }
            }
            None => {
                if !Ty::Void.compatible(&expected) {
                    return Err(CodegenError::type_error(
                        format!("Expected function to return <{expected}>, got <void> instead."),
                        span,
                    ));
                }
                self.builder.build_return(None).map_err(compile_err(span))?;
            }
        }
        Ok(Flow::Terminated)
    }

    /// Lower a condition expression and coerce it to i1.
    fn lower_condition(&mut self, condition: &Expr) -> Result<IntValue<'ctx>, CodegenError> {
        let span = condition.span();
        let rv = self.with_expected(Some(Ty::Int(1)), |cg| cg.lower_expr(condition))?;
        let rv = if rv.ty.compatible(&Ty::Int(1)) {
            rv
        } else {
            self.cast_rvalue(rv, Ty::Int(1), span)?
        };
        Ok(rv.basic(span)?.into_int_value())
    }

    // ── If ───────────────────────────────────────────────────────────

    /// The statement form of `if`. Either arm may be absent; an absent
    /// arm branches straight to the merge block. With both arms absent
    /// the whole statement is a no-op and the condition is never
    /// evaluated.
    fn lower_if(&mut self, if_stmt: &IfStmt) -> Result<Flow, CodegenError> {
        if if_stmt.then_body.is_none() && if_stmt.else_body.is_none() {
            return Ok(Flow::Next);
        }
        let function = self.current_function(if_stmt.span)?;
        let cond = self.lower_condition(&if_stmt.condition)?;

        let then_bb = if_stmt
            .then_body
            .as_ref()
            .map(|_| self.context.append_basic_block(function, "then"));
        let else_bb = if_stmt
            .else_body
            .as_ref()
            .map(|_| self.context.append_basic_block(function, "else"));
        let merge_bb = self.context.append_basic_block(function, "after_if");

        self.builder
            .build_conditional_branch(
                cond,
                then_bb.unwrap_or(merge_bb),
                else_bb.unwrap_or(merge_bb),
            )
            .map_err(compile_err(if_stmt.span))?;

        if let (Some(body), Some(bb)) = (&if_stmt.then_body, then_bb) {
            self.builder.position_at_end(bb);
            if self.lower_block(body)? == Flow::Next {
                self.builder
                    .build_unconditional_branch(merge_bb)
                    .map_err(compile_err(if_stmt.span))?;
            }
        }
        if let (Some(body), Some(bb)) = (&if_stmt.else_body, else_bb) {
            self.builder.position_at_end(bb);
            if self.lower_block(body)? == Flow::Next {
                self.builder
                    .build_unconditional_branch(merge_bb)
                    .map_err(compile_err(if_stmt.span))?;
            }
        }

        self.builder.position_at_end(merge_bb);
        Ok(Flow::Next)
    }

    /// The expression form of `if`. Both arms are mandatory and their
    /// values meet in a phi at the merge block.
    ///
    /// A constant arm (bool or number literal) gets no block of its own:
    /// the constant is materialized in the predecessor and its phi edge
    /// comes from there. The else arm is lowered with the then arm's
    /// type as its expectation; a genuine arm type mismatch is left for
    /// module verification to reject.
    pub(crate) fn lower_inline_if(
        &mut self,
        condition: &Expr,
        then_value: &Expr,
        else_value: &Expr,
        span: Span,
    ) -> Result<RValue<'ctx>, CodegenError> {
        let function = self.current_function(span)?;
        let cond = self.lower_condition(condition)?;
        let entry_bb = self
            .builder
            .get_insert_block()
            .ok_or_else(|| CodegenError::compile("Builder is not positioned", span))?;

        let is_const = |expr: &Expr| matches!(expr, Expr::Bool(..) | Expr::Number(..));
        let keep_then = !is_const(then_value);
        // At least one real block, or the phi would see the same
        // predecessor twice.
        let keep_else = !keep_then || !is_const(else_value);

        let then_bb = keep_then.then(|| self.context.append_basic_block(function, "then"));
        let else_bb = keep_else.then(|| self.context.append_basic_block(function, "else"));
        let merge_bb = self.context.append_basic_block(function, "after_if");

        self.builder
            .build_conditional_branch(
                cond,
                then_bb.unwrap_or(merge_bb),
                else_bb.unwrap_or(merge_bb),
            )
            .map_err(compile_err(span))?;

        let (then_rv, then_edge) = match then_bb {
            Some(bb) => {
                self.builder.position_at_end(bb);
                let rv = self.lower_expr(then_value)?;
                let exit = self
                    .builder
                    .get_insert_block()
                    .ok_or_else(|| CodegenError::compile("Builder is not positioned", span))?;
                self.builder
                    .build_unconditional_branch(merge_bb)
                    .map_err(compile_err(span))?;
                (rv, exit)
            }
            // Constants emit no instructions, so the value lives in the
            // predecessor block.
            None => (self.lower_expr(then_value)?, entry_bb),
        };

        let then_ty = then_rv.ty.clone();
        let (else_rv, else_edge) = match else_bb {
            Some(bb) => {
                self.builder.position_at_end(bb);
                let rv =
                    self.with_expected(Some(then_ty.clone()), |cg| cg.lower_expr(else_value))?;
                let exit = self
                    .builder
                    .get_insert_block()
                    .ok_or_else(|| CodegenError::compile("Builder is not positioned", span))?;
                self.builder
                    .build_unconditional_branch(merge_bb)
                    .map_err(compile_err(span))?;
                (rv, exit)
            }
            None => {
                let rv =
                    self.with_expected(Some(then_ty.clone()), |cg| cg.lower_expr(else_value))?;
                (rv, entry_bb)
            }
        };

        self.builder.position_at_end(merge_bb);
        let phi_ty = self.llvm_type(&then_ty, span)?;
        let phi = self
            .builder
            .build_phi(phi_ty, "if_result")
            .map_err(compile_err(span))?;
        let then_basic = then_rv.basic(span)?;
        let else_basic = else_rv.basic(span)?;
        phi.add_incoming(&[(&then_basic, then_edge), (&else_basic, else_edge)]);
        Ok(RValue::value(phi.as_basic_value(), then_ty))
    }

    // ── Loops ────────────────────────────────────────────────────────

    /// A bare `loop`: the body unconditionally branches back to itself;
    /// only `break` reaches the block after it.
    fn lower_loop(&mut self, body: &[Stmt], span: Span) -> Result<Flow, CodegenError> {
        let function = self.current_function(span)?;
        let loop_bb = self.context.append_basic_block(function, "loop");
        let after_bb = self.context.append_basic_block(function, "after_loop");

        self.builder
            .build_unconditional_branch(loop_bb)
            .map_err(compile_err(span))?;
        self.builder.position_at_end(loop_bb);

        self.loop_stack.push(LoopPoints {
            continue_to: loop_bb,
            break_to: after_bb,
        });
        let flow = self.lower_block(body);
        self.loop_stack.pop();
        if flow? == Flow::Next {
            self.builder
                .build_unconditional_branch(loop_bb)
                .map_err(compile_err(span))?;
        }

        self.builder.position_at_end(after_bb);
        Ok(Flow::Next)
    }

    /// `while` and `do-while` share one topology; a do-while just enters
    /// at the body instead of the condition. `continue` re-tests the
    /// condition in both forms.
    fn lower_while(
        &mut self,
        condition: &Expr,
        body: &[Stmt],
        is_do_while: bool,
        span: Span,
    ) -> Result<Flow, CodegenError> {
        let function = self.current_function(span)?;
        let cond_bb = self.context.append_basic_block(function, "loop_condition");
        let loop_bb = self.context.append_basic_block(function, "loop");
        let after_bb = self.context.append_basic_block(function, "after_loop");

        let first = if is_do_while { loop_bb } else { cond_bb };
        self.builder
            .build_unconditional_branch(first)
            .map_err(compile_err(span))?;

        self.builder.position_at_end(cond_bb);
        let cond = self.lower_condition(condition)?;
        self.builder
            .build_conditional_branch(cond, loop_bb, after_bb)
            .map_err(compile_err(span))?;

        self.builder.position_at_end(loop_bb);
        self.loop_stack.push(LoopPoints {
            continue_to: cond_bb,
            break_to: after_bb,
        });
        let flow = self.lower_block(body);
        self.loop_stack.pop();
        if flow? == Flow::Next {
            self.builder
                .build_unconditional_branch(cond_bb)
                .map_err(compile_err(span))?;
        }

        self.builder.position_at_end(after_bb);
        Ok(Flow::Next)
    }

    /// `for`: definition in its own scope surrounding the loop, stepper
    /// in a dedicated block so `continue` still steps.
    fn lower_for(
        &mut self,
        definition: &Expr,
        condition: &Expr,
        stepper: &Expr,
        body: &[Stmt],
        span: Span,
    ) -> Result<Flow, CodegenError> {
        self.scopes.enter();
        let result = self.lower_for_inner(definition, condition, stepper, body, span);
        self.scopes.leave();
        result
    }

    fn lower_for_inner(
        &mut self,
        definition: &Expr,
        condition: &Expr,
        stepper: &Expr,
        body: &[Stmt],
        span: Span,
    ) -> Result<Flow, CodegenError> {
        let function = self.current_function(span)?;
        let pre_bb = self.context.append_basic_block(function, "pre_loop");
        let cond_bb = self.context.append_basic_block(function, "loop_condition");
        let loop_bb = self.context.append_basic_block(function, "loop");
        let step_bb = self.context.append_basic_block(function, "loop_stepper");
        let after_bb = self.context.append_basic_block(function, "after_loop");

        self.builder
            .build_unconditional_branch(pre_bb)
            .map_err(compile_err(span))?;
        self.builder.position_at_end(pre_bb);
        self.with_expected(None, |cg| cg.lower_expr(definition))?;
        self.builder
            .build_unconditional_branch(cond_bb)
            .map_err(compile_err(span))?;

        self.builder.position_at_end(cond_bb);
        let cond = self.lower_condition(condition)?;
        self.builder
            .build_conditional_branch(cond, loop_bb, after_bb)
            .map_err(compile_err(span))?;

        self.builder.position_at_end(loop_bb);
        self.loop_stack.push(LoopPoints {
            continue_to: step_bb,
            break_to: after_bb,
        });
        let flow = self.lower_block(body);
        self.loop_stack.pop();
        if flow? == Flow::Next {
            self.builder
                .build_unconditional_branch(step_bb)
                .map_err(compile_err(span))?;
        }

        self.builder.position_at_end(step_bb);
        self.with_expected(None, |cg| cg.lower_expr(stepper))?;
        self.builder
            .build_unconditional_branch(cond_bb)
            .map_err(compile_err(span))?;

        self.builder.position_at_end(after_bb);
        Ok(Flow::Next)
    }
}
