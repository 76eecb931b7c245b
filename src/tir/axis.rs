//! Block iteration variables.
//!
//! Every call binds a fresh variable to a value computed from the enclosing
//! loops and appends both to the innermost block.

use crate::builder::frame::FrameData;
use crate::builder::{FrameKind, IRBuilder};
use crate::error::BuildError;
use crate::ir::expr::{IterVar, IterVarKind, PrimExpr, Range, Var};
use crate::ir::types::DataType;
use crate::tir::scopes::as_index;

fn declare(
    op: &'static str,
    kind: IterVarKind,
    dom: Range,
    binding: PrimExpr,
    dtype: Option<DataType>,
) -> Result<Var, BuildError> {
    let dtype = dtype.unwrap_or_else(|| binding.dtype());
    IRBuilder::current(op)?.apply(|state| {
        let block = state.top_mut(op, FrameKind::Block, FrameData::as_block_mut)?;
        let var = Var::new("v", dtype);
        block.iter_vars.push(IterVar::new(dom, var.clone(), kind));
        block.iter_values.push(binding);
        Ok(var)
    })
}

/// A data-parallel axis. `dtype` defaults to the dtype of `binding`.
pub fn spatial(dom: Range, binding: impl Into<PrimExpr>, dtype: Option<DataType>) -> Result<Var, BuildError> {
    declare("axis::spatial", IterVarKind::Spatial, dom, binding.into(), dtype)
}

pub fn reduce(dom: Range, binding: impl Into<PrimExpr>, dtype: Option<DataType>) -> Result<Var, BuildError> {
    declare("axis::reduce", IterVarKind::Reduce, dom, binding.into(), dtype)
}

pub fn scan(dom: Range, binding: impl Into<PrimExpr>, dtype: Option<DataType>) -> Result<Var, BuildError> {
    declare("axis::scan", IterVarKind::Scan, dom, binding.into(), dtype)
}

pub fn opaque(dom: Range, binding: impl Into<PrimExpr>, dtype: Option<DataType>) -> Result<Var, BuildError> {
    declare("axis::opaque", IterVarKind::Opaque, dom, binding.into(), dtype)
}

/// Declares one axis per character of `kinds` (`S` spatial, `R` reduce),
/// each bound to a loop variable of an enclosing loop and ranging over that
/// loop's domain. An explicit `dtype` retypes the domain and binding as
/// well. Nothing is appended unless every binding checks out.
pub fn remap<B: Into<PrimExpr>>(
    kinds: &str,
    bindings: impl IntoIterator<Item = B>,
    dtype: Option<DataType>,
) -> Result<Vec<Var>, BuildError> {
    const OP: &str = "axis::remap";
    let bindings: Vec<PrimExpr> = bindings.into_iter().map(Into::into).collect();
    let kinds: Vec<char> = kinds.chars().collect();
    IRBuilder::current(OP)?.apply(|state| {
        if kinds.len() != bindings.len() {
            return Err(BuildError::shape(
                OP,
                format!("{} kinds given for {} bindings", kinds.len(), bindings.len()),
            ));
        }
        // Fail on a non-block top before looking at the bindings.
        state.top_mut(OP, FrameKind::Block, FrameData::as_block_mut)?;

        let mut axes = Vec::with_capacity(kinds.len());
        for (kind, binding) in kinds.iter().zip(&bindings) {
            let kind = match *kind {
                'S' => IterVarKind::Spatial,
                'R' => IterVarKind::Reduce,
                other => {
                    return Err(BuildError::shape(
                        OP,
                        format!("unknown axis kind '{other}', expected 'S' or 'R'"),
                    ))
                }
            };
            let loop_var = binding
                .as_var()
                .ok_or_else(|| BuildError::shape(OP, "every binding must be a loop variable"))?;
            let dom = state.loop_domain(loop_var).ok_or_else(|| {
                BuildError::shape(OP, format!("'{loop_var}' is not bound by an enclosing loop"))
            })?;
            // The domain and binding follow the axis dtype.
            let dtype = dtype.unwrap_or(loop_var.dtype);
            let dom = Range::from_min_extent(as_index(dom.min, dtype), as_index(dom.extent, dtype));
            let var = Var::new(format!("v{loop_var}"), dtype);
            axes.push((IterVar::new(dom, var, kind), PrimExpr::cast(dtype, binding.clone())));
        }

        let block = state.top_mut(OP, FrameKind::Block, FrameData::as_block_mut)?;
        let mut vars = Vec::with_capacity(axes.len());
        for (iter_var, binding) in axes {
            vars.push(iter_var.var.clone());
            block.iter_vars.push(iter_var);
            block.iter_values.push(binding);
        }
        Ok(vars)
    })
}
