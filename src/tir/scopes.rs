//! Scope-opening calls. Each pushes one frame and returns its guard.

use crate::builder::frame::{
    loop_var_dtype, AllocateConstFrame, AllocateFrame, BlockFrame, ForFrame, FrameData, IfFrame, PrimFuncFrame,
};
use crate::builder::{FrameKind, IRBuilder, Scope};
use crate::error::BuildError;
use crate::ir::buffer::{Buffer, BufferRegion, ConstantData};
use crate::ir::expr::{Annotations, IterVar, PrimExpr, Range, Var};
use crate::ir::stmt::{AttrNode, ForKind};
use crate::ir::types::{DataType, TypeCode};
use crate::tir::leaf::{buffer_decl, BufferOptions};

/// Opens a function. It must be the outermost scope of the session.
pub fn prim_func() -> Result<Scope, BuildError> {
    IRBuilder::current("prim_func")?.open(|state| {
        if let Some(found) = state.top_kind() {
            return Err(BuildError::NestedFunction { found });
        }
        if state.has_result() {
            return Err(BuildError::shape("prim_func", "the session already produced a result"));
        }
        Ok((FrameData::PrimFunc(PrimFuncFrame::default()), ()))
    })
}

/// Opens a block. With `no_realize` the block is emitted bare, without a
/// realize wrapper, and may not bind iteration variables.
pub fn block(name: impl Into<String>, no_realize: bool) -> Result<Scope, BuildError> {
    let name = name.into();
    IRBuilder::current("block")?.open(|_| Ok((FrameData::Block(BlockFrame::new(name, no_realize)), ())))
}

/// Opens the init section of the enclosing block.
pub fn init() -> Result<Scope, BuildError> {
    IRBuilder::current("init")?.open(|state| {
        let block = state.top_mut("init", FrameKind::Block, FrameData::as_block_mut)?;
        if block.init.is_some() {
            return Err(BuildError::DuplicateSetting {
                kind: FrameKind::Block,
                field: "init",
            });
        }
        Ok((FrameData::BlockInit, ()))
    })
}

/// Integer literals adopt `dtype`; anything else is cast.
pub(crate) fn as_index(expr: PrimExpr, dtype: DataType) -> PrimExpr {
    match expr {
        PrimExpr::IntImm { value, .. } => PrimExpr::int_of(value, dtype),
        other => PrimExpr::cast(dtype, other),
    }
}

fn open_loop(
    op: &'static str,
    start: PrimExpr,
    stop: PrimExpr,
    kind: ForKind,
    thread_tag: Option<String>,
    annotations: Option<Annotations>,
) -> Result<Scope<Var>, BuildError> {
    IRBuilder::current(op)?.open(|state| {
        if let (Some(lo), Some(hi)) = (start.as_int(), stop.as_int()) {
            if hi < lo {
                return Err(BuildError::shape(op, format!("loop range [{lo}, {hi}) is empty")));
            }
        }
        let dtype = loop_var_dtype(&start, &stop, &state.config);
        let min = as_index(start, dtype);
        let extent = as_index(stop, dtype).sub_folded(&min);
        let var = Var::new("i", dtype);
        let frame = ForFrame {
            vars: vec![var.clone()],
            doms: vec![Range::from_min_extent(min, extent)],
            kind,
            thread_tag,
            annotations: annotations.unwrap_or_default(),
        };
        Ok((FrameData::For(frame), var))
    })
}

pub fn serial(
    start: impl Into<PrimExpr>,
    stop: impl Into<PrimExpr>,
    annotations: Option<Annotations>,
) -> Result<Scope<Var>, BuildError> {
    open_loop("serial", start.into(), stop.into(), ForKind::Serial, None, annotations)
}

pub fn parallel(
    start: impl Into<PrimExpr>,
    stop: impl Into<PrimExpr>,
    annotations: Option<Annotations>,
) -> Result<Scope<Var>, BuildError> {
    open_loop("parallel", start.into(), stop.into(), ForKind::Parallel, None, annotations)
}

pub fn vectorized(
    start: impl Into<PrimExpr>,
    stop: impl Into<PrimExpr>,
    annotations: Option<Annotations>,
) -> Result<Scope<Var>, BuildError> {
    open_loop("vectorized", start.into(), stop.into(), ForKind::Vectorized, None, annotations)
}

pub fn unroll(
    start: impl Into<PrimExpr>,
    stop: impl Into<PrimExpr>,
    annotations: Option<Annotations>,
) -> Result<Scope<Var>, BuildError> {
    open_loop("unroll", start.into(), stop.into(), ForKind::Unrolled, None, annotations)
}

/// A loop bound to the hardware thread axis `thread`, e.g. `threadIdx.x`.
pub fn thread_binding(
    start: impl Into<PrimExpr>,
    stop: impl Into<PrimExpr>,
    thread: impl Into<String>,
    annotations: Option<Annotations>,
) -> Result<Scope<Var>, BuildError> {
    open_loop(
        "thread_binding",
        start.into(),
        stop.into(),
        ForKind::ThreadBinding,
        Some(thread.into()),
        annotations,
    )
}

/// A nest of serial loops, one per extent, outermost first. With no extents
/// the body is spliced into the parent unchanged.
pub fn grid<E: Into<PrimExpr>>(extents: impl IntoIterator<Item = E>) -> Result<Scope<Vec<Var>>, BuildError> {
    let extents: Vec<PrimExpr> = extents.into_iter().map(Into::into).collect();
    IRBuilder::current("grid")?.open(|state| {
        let mut vars = Vec::with_capacity(extents.len());
        let mut doms = Vec::with_capacity(extents.len());
        for (k, extent) in extents.into_iter().enumerate() {
            let zero = PrimExpr::int(0);
            let dtype = loop_var_dtype(&zero, &extent, &state.config);
            vars.push(Var::new(format!("i{k}"), dtype));
            doms.push(Range::from_min_extent(PrimExpr::int_of(0, dtype), as_index(extent, dtype)));
        }
        let frame = ForFrame {
            vars: vars.clone(),
            doms,
            kind: ForKind::Serial,
            thread_tag: None,
            annotations: Annotations::new(),
        };
        Ok((FrameData::For(frame), vars))
    })
}

pub fn if_(condition: impl Into<PrimExpr>) -> Result<Scope, BuildError> {
    let condition = condition.into();
    IRBuilder::current("if_")?.open(|_| {
        let frame = IfFrame {
            condition,
            then_case: None,
            else_case: None,
        };
        Ok((FrameData::If(frame), ()))
    })
}

/// Opens the then branch. Must sit directly inside `if_`.
pub fn then_() -> Result<Scope, BuildError> {
    IRBuilder::current("then_")?.open(|state| {
        let if_frame = state
            .top_mut("then_", FrameKind::If, FrameData::as_if_mut)
            .map_err(|_| BuildError::Pairing {
                op: "then_",
                detail: "then_ must be opened directly inside if_",
            })?;
        if if_frame.then_case.is_some() {
            return Err(BuildError::Pairing {
                op: "then_",
                detail: "this if_ already has a then_ branch",
            });
        }
        Ok((FrameData::Then, ()))
    })
}

/// Opens the else branch. Must follow a closed `then_` in the same `if_`.
pub fn else_() -> Result<Scope, BuildError> {
    IRBuilder::current("else_")?.open(|state| {
        let if_frame = state
            .top_mut("else_", FrameKind::If, FrameData::as_if_mut)
            .map_err(|_| BuildError::Pairing {
                op: "else_",
                detail: "else_ must be opened directly inside if_",
            })?;
        if if_frame.then_case.is_none() {
            return Err(BuildError::Pairing {
                op: "else_",
                detail: "else_ must follow a closed then_ branch",
            });
        }
        if if_frame.else_case.is_some() {
            return Err(BuildError::Pairing {
                op: "else_",
                detail: "this if_ already has an else_ branch",
            });
        }
        Ok((FrameData::Else, ()))
    })
}

pub fn while_(condition: impl Into<PrimExpr>) -> Result<Scope, BuildError> {
    let condition = condition.into();
    IRBuilder::current("while_")?.open(|_| Ok((FrameData::While { condition }, ())))
}

/// Binds `var` to `value` for the body of the scope.
pub fn let_(var: Var, value: impl Into<PrimExpr>) -> Result<Scope<Var>, BuildError> {
    let value = value.into();
    IRBuilder::current("let_")?.open(|_| Ok((FrameData::Let { var: var.clone(), value }, var)))
}

/// Allocates `extents` of `dtype` for the body of the scope. An empty
/// `storage_scope` uses the innermost `storage_scope` attr, or the default.
pub fn allocate(
    extents: Vec<PrimExpr>,
    dtype: DataType,
    storage_scope: &str,
    condition: Option<PrimExpr>,
    annotations: Option<Annotations>,
) -> Result<Scope<Buffer>, BuildError> {
    IRBuilder::current("allocate")?.open(|state| {
        if extents.is_empty() {
            return Err(BuildError::shape("allocate", "at least one extent is required"));
        }
        let scope = if storage_scope.is_empty() {
            state.storage_scope()
        } else {
            storage_scope.to_owned()
        };
        let buffer = buffer_decl(
            extents.clone(),
            dtype,
            BufferOptions::new().name("buf").storage_scope(scope),
        )?;
        let frame = AllocateFrame {
            buffer: buffer.clone(),
            extents,
            condition: condition.unwrap_or_else(|| PrimExpr::bool(true)),
            annotations: annotations.unwrap_or_default(),
        };
        Ok((FrameData::Allocate(frame), buffer))
    })
}

/// Constant extents must hold exactly `data.len()` elements, and the data
/// kind must agree with `dtype`.
fn check_const_data(data: &ConstantData, dtype: DataType, extents: &[PrimExpr]) -> Result<(), BuildError> {
    const OP: &str = "allocate_const";
    let constant: Option<Vec<i64>> = extents.iter().map(PrimExpr::as_int).collect();
    if let Some(dims) = constant {
        let size = dims.iter().try_fold(1i64, |acc, &dim| {
            if dim < 0 {
                return Err(BuildError::shape(OP, format!("extent {dim} is negative")));
            }
            acc.checked_mul(dim)
                .ok_or_else(|| BuildError::shape(OP, "extent product overflows i64"))
        })?;
        if usize::try_from(size).map_or(true, |size| size != data.len()) {
            return Err(BuildError::shape(
                OP,
                format!("extents hold {size} elements but {} values were given", data.len()),
            ));
        }
    }
    let kind_matches = match data {
        ConstantData::Int(_) => matches!(dtype.code, TypeCode::Int | TypeCode::UInt),
        ConstantData::Float(_) => dtype.code == TypeCode::Float,
    };
    if !kind_matches {
        return Err(BuildError::shape(OP, format!("constant data does not match dtype {dtype}")));
    }
    Ok(())
}

/// Allocates a buffer initialised with `data`. When every extent is a
/// constant their product must equal the data length.
pub fn allocate_const(
    data: ConstantData,
    dtype: DataType,
    extents: Vec<PrimExpr>,
    annotations: Option<Annotations>,
) -> Result<Scope<Buffer>, BuildError> {
    IRBuilder::current("allocate_const")?.open(|state| {
        check_const_data(&data, dtype, &extents)?;
        let scope = state.config.default_storage_scope.clone();
        let buffer = buffer_decl(
            extents.clone(),
            dtype,
            BufferOptions::new().name("buf").storage_scope(scope),
        )?;
        let frame = AllocateConstFrame {
            buffer: buffer.clone(),
            extents,
            data,
            annotations: annotations.unwrap_or_default(),
        };
        Ok((FrameData::AllocateConst(frame), buffer))
    })
}

pub fn attr(node: impl Into<AttrNode>, key: impl Into<String>, value: impl Into<PrimExpr>) -> Result<Scope, BuildError> {
    let node = node.into();
    let key = key.into();
    let value = value.into();
    IRBuilder::current("attr")?.open(|_| Ok((FrameData::Attr { node, key, value }, ())))
}

pub fn assert_(condition: impl Into<PrimExpr>, message: impl Into<String>) -> Result<Scope, BuildError> {
    let condition = condition.into();
    let message = message.into();
    IRBuilder::current("assert_")?.open(|_| Ok((FrameData::Assert { condition, message }, ())))
}

/// Launches the environment thread `var` with `extent` threads. `var` must
/// come from `env_thread` in the enclosing function.
pub fn launch_thread(var: &Var, extent: impl Into<PrimExpr>) -> Result<Scope<Var>, BuildError> {
    let extent = extent.into();
    IRBuilder::current("launch_thread")?.open(|state| {
        let func = state.nearest_prim_func().ok_or(BuildError::NoEnclosingScope {
            op: "launch_thread",
            expected: FrameKind::PrimFunc,
        })?;
        let mut iter_var: IterVar = func
            .env_threads
            .get(var)
            .cloned()
            .ok_or_else(|| BuildError::UnknownEnvThread { var: var.to_string() })?;
        let dtype = iter_var.var.dtype;
        iter_var.dom = Some(Range::from_min_extent(PrimExpr::int_of(0, dtype), extent.clone()));
        let bound = iter_var.var.clone();
        Ok((FrameData::LaunchThread { iter_var, extent }, bound))
    })
}

/// Realizes `region` for the body of the scope. The buffer must be declared
/// by an enclosing scope.
pub fn realize(region: BufferRegion, storage_scope: &str, condition: Option<PrimExpr>) -> Result<Scope, BuildError> {
    IRBuilder::current("realize")?.open(|state| {
        if region.region.len() != region.buffer.ndim() {
            return Err(BuildError::shape(
                "realize",
                format!(
                    "region has {} ranges but buffer '{}' has rank {}",
                    region.region.len(),
                    region.buffer.name,
                    region.buffer.ndim()
                ),
            ));
        }
        if !state.is_buffer_declared(&region.buffer) {
            return Err(BuildError::UndeclaredBuffer {
                op: "realize",
                buffer: region.buffer.name.clone(),
            });
        }
        let storage_scope = if storage_scope.is_empty() {
            state.storage_scope()
        } else {
            storage_scope.to_owned()
        };
        let frame = FrameData::Realize {
            region,
            storage_scope,
            condition: condition.unwrap_or_else(|| PrimExpr::bool(true)),
        };
        Ok((frame, ()))
    })
}
