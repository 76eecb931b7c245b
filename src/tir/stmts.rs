//! Leaf statements. They mutate the innermost frame or append to its body.

use crate::builder::frame::FrameData;
use crate::builder::{FrameKind, IRBuilder};
use crate::error::BuildError;
use crate::ir::buffer::{Buffer, BufferRegion, MatchBufferRegion};
use crate::ir::expr::{Annotations, IterVar, PrimExpr, Range, Var};
use crate::ir::stmt::Stmt;
use crate::ir::types::{DataType, Type};
use crate::tir::leaf::{buffer_decl, BufferOptions};

// ---------------------------------------------------------------------------
// Block fields
// ---------------------------------------------------------------------------

/// Sets the predicate of the enclosing block.
pub fn where_(predicate: impl Into<PrimExpr>) -> Result<(), BuildError> {
    let predicate = predicate.into();
    IRBuilder::current("where_")?.apply(|state| {
        let block = state.top_mut("where_", FrameKind::Block, FrameData::as_block_mut)?;
        if block.predicate.is_some() {
            return Err(BuildError::DuplicateSetting {
                kind: FrameKind::Block,
                field: "where",
            });
        }
        block.predicate = Some(predicate);
        Ok(())
    })
}

pub fn reads<R: Into<BufferRegion>>(regions: impl IntoIterator<Item = R>) -> Result<(), BuildError> {
    let regions: Vec<BufferRegion> = regions.into_iter().map(Into::into).collect();
    IRBuilder::current("reads")?.apply(|state| {
        let block = state.top_mut("reads", FrameKind::Block, FrameData::as_block_mut)?;
        if block.reads.is_some() {
            return Err(BuildError::DuplicateSetting {
                kind: FrameKind::Block,
                field: "reads",
            });
        }
        block.reads = Some(regions);
        Ok(())
    })
}

pub fn writes<R: Into<BufferRegion>>(regions: impl IntoIterator<Item = R>) -> Result<(), BuildError> {
    let regions: Vec<BufferRegion> = regions.into_iter().map(Into::into).collect();
    IRBuilder::current("writes")?.apply(|state| {
        let block = state.top_mut("writes", FrameKind::Block, FrameData::as_block_mut)?;
        if block.writes.is_some() {
            return Err(BuildError::DuplicateSetting {
                kind: FrameKind::Block,
                field: "writes",
            });
        }
        block.writes = Some(regions);
        Ok(())
    })
}

pub fn block_attrs(attrs: Annotations) -> Result<(), BuildError> {
    IRBuilder::current("block_attrs")?.apply(|state| {
        let block = state.top_mut("block_attrs", FrameKind::Block, FrameData::as_block_mut)?;
        if block.annotations.is_some() {
            return Err(BuildError::DuplicateSetting {
                kind: FrameKind::Block,
                field: "block_attrs",
            });
        }
        block.annotations = Some(attrs);
        Ok(())
    })
}

/// Allocates a buffer owned by the enclosing block. Directly inside a
/// function it becomes a root allocation.
pub fn alloc_buffer<S: Into<PrimExpr>>(
    shape: impl IntoIterator<Item = S>,
    dtype: DataType,
    mut opts: BufferOptions,
) -> Result<Buffer, BuildError> {
    IRBuilder::current("alloc_buffer")?.apply(|state| {
        if opts.align <= 0 {
            opts.align = state.config.alloc_alignment;
        }
        let buffer = buffer_decl(shape, dtype, opts)?;
        if let Ok(block) = state.top_mut("alloc_buffer", FrameKind::Block, FrameData::as_block_mut) {
            block.alloc_buffers.push(buffer.clone());
            return Ok(buffer);
        }
        if let Ok(func) = state.top_mut("alloc_buffer", FrameKind::PrimFunc, FrameData::as_prim_func_mut) {
            func.root_alloc_buffers.push(buffer.clone());
            return Ok(buffer);
        }
        Err(state.mismatch("alloc_buffer", FrameKind::Block))
    })
}

/// What a `match_buffer` call binds to.
#[derive(Debug, Clone)]
pub enum MatchTarget {
    /// A handle parameter of the enclosing function.
    Param(Var),
    /// A region of a buffer visible in the enclosing block.
    Region(BufferRegion),
}

impl From<Var> for MatchTarget {
    fn from(var: Var) -> Self {
        MatchTarget::Param(var)
    }
}

impl From<&Var> for MatchTarget {
    fn from(var: &Var) -> Self {
        MatchTarget::Param(var.clone())
    }
}

impl From<BufferRegion> for MatchTarget {
    fn from(region: BufferRegion) -> Self {
        MatchTarget::Region(region)
    }
}

/// Declares a buffer and binds it to a function parameter or to a region of
/// another buffer.
pub fn match_buffer<S: Into<PrimExpr>>(
    target: impl Into<MatchTarget>,
    shape: impl IntoIterator<Item = S>,
    dtype: DataType,
    mut opts: BufferOptions,
) -> Result<Buffer, BuildError> {
    IRBuilder::current("match_buffer")?.apply(|state| {
        if opts.align <= 0 {
            opts.align = state.config.alloc_alignment;
        }
        let buffer = buffer_decl(shape, dtype, opts)?;
        match target.into() {
            MatchTarget::Param(param) => {
                let func = state.top_mut("match_buffer", FrameKind::PrimFunc, FrameData::as_prim_func_mut)?;
                if func.buffer_map.contains_key(&param) {
                    return Err(BuildError::shape(
                        "match_buffer",
                        format!("parameter '{param}' is already matched to a buffer"),
                    ));
                }
                func.buffer_map.insert(param, buffer.clone());
            }
            MatchTarget::Region(source) => {
                let block = state.top_mut("match_buffer", FrameKind::Block, FrameData::as_block_mut)?;
                block.match_buffers.push(MatchBufferRegion {
                    buffer: buffer.clone(),
                    source,
                });
            }
        }
        Ok(buffer)
    })
}

/// Records the pre-flattening view of a buffer already matched to a
/// parameter. The new buffer shares the backing pointer of `postflattened`.
pub fn preflattened_buffer<S: Into<PrimExpr>>(
    postflattened: &Buffer,
    shape: impl IntoIterator<Item = S>,
    dtype: DataType,
    mut opts: BufferOptions,
) -> Result<Buffer, BuildError> {
    if opts.data.is_none() {
        opts.data = Some(postflattened.data.clone());
    }
    IRBuilder::current("preflattened_buffer")?.apply(|state| {
        let buffer = buffer_decl(shape, dtype, opts)?;
        let func = state.top_mut("preflattened_buffer", FrameKind::PrimFunc, FrameData::as_prim_func_mut)?;
        let param = func
            .buffer_map
            .iter()
            .find(|(_, b)| b.same_as(postflattened))
            .map(|(param, _)| param.clone())
            .ok_or_else(|| {
                BuildError::shape(
                    "preflattened_buffer",
                    format!("buffer '{}' is not matched to any parameter", postflattened.name),
                )
            })?;
        if func.preflattened_buffer_map.contains_key(&param) {
            return Err(BuildError::DuplicateSetting {
                kind: FrameKind::PrimFunc,
                field: "preflattened_buffer",
            });
        }
        func.preflattened_buffer_map.insert(param, buffer.clone());
        Ok(buffer)
    })
}

// ---------------------------------------------------------------------------
// Function fields
// ---------------------------------------------------------------------------

/// Adds a scalar parameter. Returns `var` under its new name; it stays the
/// same variable.
pub fn arg_var(name: impl Into<String>, var: Var) -> Result<Var, BuildError> {
    let var = var.renamed(name);
    IRBuilder::current("arg")?.apply(|state| {
        let func = state.top_mut("arg", FrameKind::PrimFunc, FrameData::as_prim_func_mut)?;
        func.args.push(var.clone());
        Ok(var)
    })
}

/// Adds a handle parameter named `name` and matches `buffer` to it.
pub fn arg_buffer(name: impl Into<String>, buffer: Buffer) -> Result<Buffer, BuildError> {
    let name = name.into();
    let handle = Var::new(name.clone(), DataType::handle());
    let buffer = Buffer { name, ..buffer };
    IRBuilder::current("arg")?.apply(|state| {
        let func = state.top_mut("arg", FrameKind::PrimFunc, FrameData::as_prim_func_mut)?;
        func.args.push(handle.clone());
        func.buffer_map.insert(handle, buffer.clone());
        Ok(buffer)
    })
}

pub fn func_name(name: impl Into<String>) -> Result<(), BuildError> {
    let name = name.into();
    IRBuilder::current("func_name")?.apply(|state| {
        let func = state.top_mut("func_name", FrameKind::PrimFunc, FrameData::as_prim_func_mut)?;
        if func.name.is_some() {
            return Err(BuildError::DuplicateSetting {
                kind: FrameKind::PrimFunc,
                field: "func_name",
            });
        }
        func.name = Some(name);
        Ok(())
    })
}

pub fn func_attrs(attrs: Annotations) -> Result<(), BuildError> {
    IRBuilder::current("func_attrs")?.apply(|state| {
        let func = state.top_mut("func_attrs", FrameKind::PrimFunc, FrameData::as_prim_func_mut)?;
        if func.attrs.is_some() {
            return Err(BuildError::DuplicateSetting {
                kind: FrameKind::PrimFunc,
                field: "func_attrs",
            });
        }
        func.attrs = Some(attrs);
        Ok(())
    })
}

pub fn func_ret(ret_type: Type) -> Result<Type, BuildError> {
    IRBuilder::current("func_ret")?.apply(|state| {
        let func = state.top_mut("func_ret", FrameKind::PrimFunc, FrameData::as_prim_func_mut)?;
        if func.ret_type.is_some() {
            return Err(BuildError::DuplicateSetting {
                kind: FrameKind::PrimFunc,
                field: "func_ret",
            });
        }
        func.ret_type = Some(ret_type.clone());
        Ok(ret_type)
    })
}

/// Declares an environment thread such as `threadIdx.x` in the enclosing
/// function and returns its index variable.
pub fn env_thread(thread_tag: impl Into<String>) -> Result<Var, BuildError> {
    let tag = thread_tag.into();
    IRBuilder::current("env_thread")?.apply(|state| {
        let dtype = state.config.index_dtype;
        let func = state.nearest_prim_func_mut().ok_or(BuildError::NoEnclosingScope {
            op: "env_thread",
            expected: FrameKind::PrimFunc,
        })?;
        let var = Var::new(tag.clone(), dtype);
        func.env_threads
            .insert(var.clone(), IterVar::thread(None, var.clone(), tag));
        Ok(var)
    })
}

// ---------------------------------------------------------------------------
// Body statements
// ---------------------------------------------------------------------------

fn check_rank(op: &'static str, what: &str, given: usize, buffer: &Buffer) -> Result<(), BuildError> {
    if given != buffer.ndim() {
        return Err(BuildError::shape(
            op,
            format!("{given} {what} given for buffer '{}' of rank {}", buffer.name, buffer.ndim()),
        ));
    }
    Ok(())
}

/// `buffer[indices] = value`. The value is cast to the buffer dtype.
pub fn buffer_store(buffer: &Buffer, value: impl Into<PrimExpr>, indices: Vec<PrimExpr>) -> Result<(), BuildError> {
    let value = PrimExpr::cast(buffer.dtype, value.into());
    IRBuilder::current("buffer_store")?.apply(|state| {
        check_rank("buffer_store", "indices", indices.len(), buffer)?;
        state.append_stmt(Stmt::BufferStore {
            buffer: buffer.clone(),
            value,
            indices,
        })
    })
}

pub fn prefetch(buffer: &Buffer, bounds: Vec<Range>) -> Result<(), BuildError> {
    IRBuilder::current("prefetch")?.apply(|state| {
        check_rank("prefetch", "bounds", bounds.len(), buffer)?;
        state.append_stmt(Stmt::Prefetch {
            buffer: buffer.clone(),
            bounds,
        })
    })
}

pub fn evaluate(value: impl Into<PrimExpr>) -> Result<(), BuildError> {
    let value = value.into();
    IRBuilder::current("evaluate")?.apply(|state| state.append_stmt(Stmt::Evaluate(value)))
}
