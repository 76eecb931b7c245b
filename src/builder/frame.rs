//! The frame catalogue and the per-kind assembly rules.
//!
//! A frame is an open scope. It owns the statements already assembled
//! inside it (`stmts`) plus the fields accumulated by leaf calls. Closing
//! a frame consumes it and produces exactly one [`Assembled`] value that the
//! builder hands to the parent frame.

use std::collections::HashSet;
use std::fmt;

use indexmap::IndexMap;

use crate::config::BuilderConfig;
use crate::error::BuildError;
use crate::ir::buffer::{Buffer, BufferRegion, ConstantData, MatchBufferRegion};
use crate::ir::expr::{Annotations, IterVar, PrimExpr, Range, Var};
use crate::ir::function::PrimFunc;
use crate::ir::stmt::{AttrNode, Block, BlockRealize, For, ForKind, Stmt};
use crate::ir::types::{DataType, Type};

/// Kind tag of an open scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameKind {
    PrimFunc,
    Block,
    BlockInit,
    For,
    If,
    Then,
    Else,
    While,
    Let,
    Allocate,
    AllocateConst,
    Attr,
    Assert,
    LaunchThread,
    Realize,
}

impl fmt::Display for FrameKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FrameKind::PrimFunc => "prim_func",
            FrameKind::Block => "block",
            FrameKind::BlockInit => "init",
            FrameKind::For => "for",
            FrameKind::If => "if",
            FrameKind::Then => "then",
            FrameKind::Else => "else",
            FrameKind::While => "while",
            FrameKind::Let => "let",
            FrameKind::Allocate => "allocate",
            FrameKind::AllocateConst => "allocate_const",
            FrameKind::Attr => "attr",
            FrameKind::Assert => "assert",
            FrameKind::LaunchThread => "launch_thread",
            FrameKind::Realize => "realize",
        };
        f.write_str(s)
    }
}

/// Identity of one pushed frame within a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct FrameId(pub u64);

#[derive(Debug, Default)]
pub(crate) struct PrimFuncFrame {
    pub name: Option<String>,
    pub args: Vec<Var>,
    pub ret_type: Option<Type>,
    pub buffer_map: IndexMap<Var, Buffer>,
    pub preflattened_buffer_map: IndexMap<Var, Buffer>,
    pub attrs: Option<Annotations>,
    pub env_threads: IndexMap<Var, IterVar>,
    pub root_alloc_buffers: Vec<Buffer>,
}

#[derive(Debug)]
pub(crate) struct BlockFrame {
    pub name: String,
    pub no_realize: bool,
    pub iter_vars: Vec<IterVar>,
    pub iter_values: Vec<PrimExpr>,
    pub reads: Option<Vec<BufferRegion>>,
    pub writes: Option<Vec<BufferRegion>>,
    pub predicate: Option<PrimExpr>,
    pub annotations: Option<Annotations>,
    pub alloc_buffers: Vec<Buffer>,
    pub match_buffers: Vec<MatchBufferRegion>,
    pub init: Option<Stmt>,
}

impl BlockFrame {
    pub fn new(name: impl Into<String>, no_realize: bool) -> Self {
        Self {
            name: name.into(),
            no_realize,
            iter_vars: Vec::new(),
            iter_values: Vec::new(),
            reads: None,
            writes: None,
            predicate: None,
            annotations: None,
            alloc_buffers: Vec::new(),
            match_buffers: Vec::new(),
            init: None,
        }
    }
}

/// One loop or a nest of loops; `vars[k]` ranges over `doms[k]`, with
/// `vars[0]` outermost.
#[derive(Debug)]
pub(crate) struct ForFrame {
    pub vars: Vec<Var>,
    pub doms: Vec<Range>,
    pub kind: ForKind,
    pub thread_tag: Option<String>,
    pub annotations: Annotations,
}

#[derive(Debug)]
pub(crate) struct IfFrame {
    pub condition: PrimExpr,
    pub then_case: Option<Stmt>,
    pub else_case: Option<Stmt>,
}

#[derive(Debug)]
pub(crate) struct AllocateFrame {
    pub buffer: Buffer,
    pub extents: Vec<PrimExpr>,
    pub condition: PrimExpr,
    pub annotations: Annotations,
}

#[derive(Debug)]
pub(crate) struct AllocateConstFrame {
    pub buffer: Buffer,
    pub extents: Vec<PrimExpr>,
    pub data: ConstantData,
    pub annotations: Annotations,
}

/// Kind-specific accumulated state.
#[derive(Debug)]
pub(crate) enum FrameData {
    PrimFunc(PrimFuncFrame),
    Block(BlockFrame),
    BlockInit,
    For(ForFrame),
    If(IfFrame),
    Then,
    Else,
    While {
        condition: PrimExpr,
    },
    Let {
        var: Var,
        value: PrimExpr,
    },
    Allocate(AllocateFrame),
    AllocateConst(AllocateConstFrame),
    Attr {
        node: AttrNode,
        key: String,
        value: PrimExpr,
    },
    Assert {
        condition: PrimExpr,
        message: String,
    },
    LaunchThread {
        iter_var: IterVar,
        extent: PrimExpr,
    },
    Realize {
        region: BufferRegion,
        storage_scope: String,
        condition: PrimExpr,
    },
}

impl FrameData {
    pub fn kind(&self) -> FrameKind {
        match self {
            FrameData::PrimFunc(_) => FrameKind::PrimFunc,
            FrameData::Block(_) => FrameKind::Block,
            FrameData::BlockInit => FrameKind::BlockInit,
            FrameData::For(_) => FrameKind::For,
            FrameData::If(_) => FrameKind::If,
            FrameData::Then => FrameKind::Then,
            FrameData::Else => FrameKind::Else,
            FrameData::While { .. } => FrameKind::While,
            FrameData::Let { .. } => FrameKind::Let,
            FrameData::Allocate(_) => FrameKind::Allocate,
            FrameData::AllocateConst(_) => FrameKind::AllocateConst,
            FrameData::Attr { .. } => FrameKind::Attr,
            FrameData::Assert { .. } => FrameKind::Assert,
            FrameData::LaunchThread { .. } => FrameKind::LaunchThread,
            FrameData::Realize { .. } => FrameKind::Realize,
        }
    }

    pub fn as_prim_func(&self) -> Option<&PrimFuncFrame> {
        match self {
            FrameData::PrimFunc(f) => Some(f),
            _ => None,
        }
    }

    pub fn as_prim_func_mut(&mut self) -> Option<&mut PrimFuncFrame> {
        match self {
            FrameData::PrimFunc(f) => Some(f),
            _ => None,
        }
    }

    pub fn as_block_mut(&mut self) -> Option<&mut BlockFrame> {
        match self {
            FrameData::Block(f) => Some(f),
            _ => None,
        }
    }

    pub fn as_if_mut(&mut self) -> Option<&mut IfFrame> {
        match self {
            FrameData::If(f) => Some(f),
            _ => None,
        }
    }

    pub fn as_for(&self) -> Option<&ForFrame> {
        match self {
            FrameData::For(f) => Some(f),
            _ => None,
        }
    }
}

/// What a closed frame hands to its parent.
#[derive(Debug)]
pub(crate) enum Assembled {
    /// One node appended to the parent body.
    Stmt(Stmt),
    /// Statements spliced into the parent body one by one (empty grid).
    Inline(Vec<Stmt>),
    Func(PrimFunc),
    /// Sets the parent block's init statement.
    Init(Stmt),
    /// Sets the parent if-frame's then branch.
    Then(Stmt),
    /// Sets the parent if-frame's else branch.
    Else(Stmt),
}

#[derive(Debug)]
pub(crate) struct Frame {
    pub id: FrameId,
    pub stmts: Vec<Stmt>,
    pub data: FrameData,
}

impl Frame {
    pub fn new(id: FrameId, data: FrameData) -> Self {
        Self {
            id,
            stmts: Vec::new(),
            data,
        }
    }

    pub fn kind(&self) -> FrameKind {
        self.data.kind()
    }

    /// True if `buffer` is declared by this scope and therefore visible to
    /// everything nested in it.
    pub fn declares_buffer(&self, buffer: &Buffer) -> bool {
        match &self.data {
            FrameData::PrimFunc(f) => f
                .buffer_map
                .values()
                .chain(f.preflattened_buffer_map.values())
                .chain(f.root_alloc_buffers.iter())
                .any(|b| b.same_as(buffer)),
            FrameData::Block(b) => {
                b.alloc_buffers.iter().any(|a| a.same_as(buffer))
                    || b.match_buffers.iter().any(|m| m.buffer.same_as(buffer))
            }
            FrameData::Allocate(a) => a.buffer.same_as(buffer),
            FrameData::AllocateConst(a) => a.buffer.same_as(buffer),
            _ => false,
        }
    }

    /// Consumes the frame and builds its node.
    pub fn assemble(self, config: &BuilderConfig) -> Result<Assembled, BuildError> {
        let Frame { stmts, data, .. } = self;
        let assembled = match data {
            FrameData::PrimFunc(f) => Assembled::Func(assemble_prim_func(f, stmts, config)?),
            FrameData::Block(b) => Assembled::Stmt(assemble_block(b, stmts)?),
            FrameData::BlockInit => Assembled::Init(Stmt::seq(stmts)),
            FrameData::For(f) => assemble_for(f, stmts),
            FrameData::If(f) => Assembled::Stmt(assemble_if(f, stmts)?),
            FrameData::Then => Assembled::Then(Stmt::seq(stmts)),
            FrameData::Else => Assembled::Else(Stmt::seq(stmts)),
            FrameData::While { condition } => Assembled::Stmt(Stmt::While {
                condition,
                body: Box::new(Stmt::seq(stmts)),
            }),
            FrameData::Let { var, value } => Assembled::Stmt(Stmt::LetStmt {
                var,
                value,
                body: Box::new(Stmt::seq(stmts)),
            }),
            FrameData::Allocate(a) => Assembled::Stmt(Stmt::Allocate {
                dtype: a.buffer.dtype,
                buffer_var: a.buffer.data,
                extents: a.extents,
                condition: a.condition,
                body: Box::new(Stmt::seq(stmts)),
                annotations: a.annotations,
            }),
            FrameData::AllocateConst(a) => Assembled::Stmt(Stmt::AllocateConst {
                dtype: a.buffer.dtype,
                buffer_var: a.buffer.data,
                extents: a.extents,
                data: a.data,
                body: Box::new(Stmt::seq(stmts)),
                annotations: a.annotations,
            }),
            FrameData::Attr { node, key, value } => Assembled::Stmt(Stmt::AttrStmt {
                node,
                key,
                value,
                body: Box::new(Stmt::seq(stmts)),
            }),
            FrameData::Assert { condition, message } => Assembled::Stmt(Stmt::AssertStmt {
                condition,
                message: PrimExpr::StringImm(message),
                body: Box::new(Stmt::seq(stmts)),
            }),
            FrameData::LaunchThread { iter_var, extent } => Assembled::Stmt(Stmt::AttrStmt {
                node: AttrNode::IterVar(iter_var),
                key: "thread_extent".to_owned(),
                value: extent,
                body: Box::new(Stmt::seq(stmts)),
            }),
            FrameData::Realize {
                region,
                storage_scope,
                condition,
            } => Assembled::Stmt(Stmt::AttrStmt {
                node: AttrNode::Var(region.buffer.data.clone()),
                key: "realize_scope".to_owned(),
                value: PrimExpr::StringImm(storage_scope),
                body: Box::new(Stmt::BufferRealize {
                    region,
                    condition,
                    body: Box::new(Stmt::seq(stmts)),
                }),
            }),
        };
        Ok(assembled)
    }
}

fn assemble_prim_func(f: PrimFuncFrame, stmts: Vec<Stmt>, config: &BuilderConfig) -> Result<PrimFunc, BuildError> {
    let mut seen = HashSet::new();
    for arg in &f.args {
        if !seen.insert(arg.id) {
            return Err(BuildError::InvalidFunction {
                detail: format!("parameter '{}' is declared more than once", arg),
            });
        }
    }
    for param in f.buffer_map.keys().chain(f.preflattened_buffer_map.keys()) {
        if !seen.contains(&param.id) {
            return Err(BuildError::InvalidFunction {
                detail: format!("buffer is matched to '{}', which is not a parameter of this function", param),
            });
        }
    }

    let mut body = Stmt::seq(stmts);
    if !f.root_alloc_buffers.is_empty() {
        body = Stmt::BlockRealize(BlockRealize {
            iter_values: Vec::new(),
            predicate: PrimExpr::bool(true),
            block: Block {
                name: config.root_block_name.clone(),
                iter_vars: Vec::new(),
                reads: Vec::new(),
                writes: Vec::new(),
                alloc_buffers: f.root_alloc_buffers,
                match_buffers: Vec::new(),
                annotations: Annotations::new(),
                init: None,
                body: Box::new(body),
            },
        });
    }

    Ok(PrimFunc {
        name: f.name,
        params: f.args,
        body,
        ret_type: f.ret_type.unwrap_or_else(Type::void),
        buffer_map: f.buffer_map,
        preflattened_buffer_map: f.preflattened_buffer_map,
        attrs: f.attrs.unwrap_or_default(),
    })
}

fn assemble_block(b: BlockFrame, stmts: Vec<Stmt>) -> Result<Stmt, BuildError> {
    if b.no_realize && !b.iter_values.is_empty() {
        return Err(BuildError::InvalidBlock {
            name: b.name,
            detail: "a block built with no_realize cannot bind iteration variables".to_owned(),
        });
    }
    if b.no_realize && b.predicate.is_some() {
        return Err(BuildError::InvalidBlock {
            name: b.name,
            detail: "a block built with no_realize cannot carry a predicate".to_owned(),
        });
    }

    let block = Block {
        name: b.name,
        iter_vars: b.iter_vars,
        reads: b.reads.unwrap_or_default(),
        writes: b.writes.unwrap_or_default(),
        alloc_buffers: b.alloc_buffers,
        match_buffers: b.match_buffers,
        annotations: b.annotations.unwrap_or_default(),
        init: b.init.map(Box::new),
        body: Box::new(Stmt::seq(stmts)),
    };
    if b.no_realize {
        return Ok(Stmt::Block(block));
    }
    Ok(Stmt::BlockRealize(BlockRealize {
        iter_values: b.iter_values,
        predicate: b.predicate.unwrap_or_else(|| PrimExpr::bool(true)),
        block,
    }))
}

fn assemble_for(f: ForFrame, stmts: Vec<Stmt>) -> Assembled {
    if f.vars.is_empty() {
        return Assembled::Inline(stmts);
    }
    let mut body = Stmt::seq(stmts);
    for (var, dom) in f.vars.into_iter().zip(f.doms).rev() {
        let thread_binding = f
            .thread_tag
            .as_ref()
            .map(|tag| IterVar::thread(Some(dom.clone()), var.clone(), tag.clone()));
        body = Stmt::For(For {
            loop_var: var,
            min: dom.min,
            extent: dom.extent,
            kind: f.kind,
            body: Box::new(body),
            thread_binding,
            annotations: f.annotations.clone(),
        });
    }
    Assembled::Stmt(body)
}

fn assemble_if(f: IfFrame, stmts: Vec<Stmt>) -> Result<Stmt, BuildError> {
    if !stmts.is_empty() {
        return Err(BuildError::Pairing {
            op: "if_",
            detail: "statements inside if_ must be placed in a then_ or else_ branch",
        });
    }
    let then_case = f.then_case.ok_or(BuildError::Pairing {
        op: "if_",
        detail: "if_ scope closed without a then_ branch",
    })?;
    Ok(Stmt::IfThenElse {
        condition: f.condition,
        then_case: Box::new(then_case),
        else_case: f.else_case.map(Box::new),
    })
}

/// Dtype for a loop variable spanning `[start, stop)`: the first non-literal
/// bound decides, otherwise the configured index dtype.
pub(crate) fn loop_var_dtype(start: &PrimExpr, stop: &PrimExpr, config: &BuilderConfig) -> DataType {
    [start, stop]
        .into_iter()
        .find(|e| e.as_int().is_none())
        .map(PrimExpr::dtype)
        .unwrap_or(config.index_dtype)
}
