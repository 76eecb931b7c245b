use std::fmt;

use crate::ir::buffer::{Buffer, BufferRegion, ConstantData, MatchBufferRegion};
use crate::ir::expr::{Annotations, IterVar, PrimExpr, Range, Var};
use crate::ir::types::DataType;

/// Execution strategy of a `For` loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ForKind {
    Serial,
    Parallel,
    Vectorized,
    Unrolled,
    ThreadBinding,
}

impl fmt::Display for ForKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ForKind::Serial => "serial",
            ForKind::Parallel => "parallel",
            ForKind::Vectorized => "vectorized",
            ForKind::Unrolled => "unroll",
            ForKind::ThreadBinding => "thread_binding",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct For {
    pub loop_var: Var,
    pub min: PrimExpr,
    pub extent: PrimExpr,
    pub kind: ForKind,
    pub body: Box<Stmt>,
    /// Present iff `kind` is `ThreadBinding`.
    pub thread_binding: Option<IterVar>,
    pub annotations: Annotations,
}

/// A unit of computation with declared accesses and iteration domain.
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub name: String,
    pub iter_vars: Vec<IterVar>,
    pub reads: Vec<BufferRegion>,
    pub writes: Vec<BufferRegion>,
    pub alloc_buffers: Vec<Buffer>,
    pub match_buffers: Vec<MatchBufferRegion>,
    pub annotations: Annotations,
    pub init: Option<Box<Stmt>>,
    pub body: Box<Stmt>,
}

/// A block bound to concrete iteration values under a predicate.
#[derive(Debug, Clone, PartialEq)]
pub struct BlockRealize {
    pub iter_values: Vec<PrimExpr>,
    pub predicate: PrimExpr,
    pub block: Block,
}

/// Target of an attribute statement.
#[derive(Debug, Clone, PartialEq)]
pub enum AttrNode {
    Var(Var),
    IterVar(IterVar),
    Buffer(Buffer),
    Str(String),
}

impl From<Var> for AttrNode {
    fn from(var: Var) -> Self {
        AttrNode::Var(var)
    }
}

impl From<IterVar> for AttrNode {
    fn from(iter_var: IterVar) -> Self {
        AttrNode::IterVar(iter_var)
    }
}

impl From<Buffer> for AttrNode {
    fn from(buffer: Buffer) -> Self {
        AttrNode::Buffer(buffer)
    }
}

impl From<&str> for AttrNode {
    fn from(s: &str) -> Self {
        AttrNode::Str(s.to_owned())
    }
}

/// Statement node of the IR tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    /// Sequence of statements. Never nested directly inside another `Seq`.
    Seq(Vec<Stmt>),
    For(For),
    Block(Block),
    BlockRealize(BlockRealize),
    IfThenElse {
        condition: PrimExpr,
        then_case: Box<Stmt>,
        else_case: Option<Box<Stmt>>,
    },
    While {
        condition: PrimExpr,
        body: Box<Stmt>,
    },
    LetStmt {
        var: Var,
        value: PrimExpr,
        body: Box<Stmt>,
    },
    Allocate {
        buffer_var: Var,
        dtype: DataType,
        extents: Vec<PrimExpr>,
        condition: PrimExpr,
        body: Box<Stmt>,
        annotations: Annotations,
    },
    AllocateConst {
        buffer_var: Var,
        dtype: DataType,
        extents: Vec<PrimExpr>,
        data: ConstantData,
        body: Box<Stmt>,
        annotations: Annotations,
    },
    AttrStmt {
        node: AttrNode,
        key: String,
        value: PrimExpr,
        body: Box<Stmt>,
    },
    AssertStmt {
        condition: PrimExpr,
        message: PrimExpr,
        body: Box<Stmt>,
    },
    BufferStore {
        buffer: Buffer,
        value: PrimExpr,
        indices: Vec<PrimExpr>,
    },
    BufferRealize {
        region: BufferRegion,
        condition: PrimExpr,
        body: Box<Stmt>,
    },
    Prefetch {
        buffer: Buffer,
        bounds: Vec<Range>,
    },
    Evaluate(PrimExpr),
}

impl Stmt {
    /// Collapses a body list into one statement.
    ///
    /// Nested sequences are flattened; a single statement is returned as-is
    /// and an empty list becomes a no-op `Evaluate(0)`.
    pub fn seq(stmts: Vec<Stmt>) -> Stmt {
        let mut flat = Vec::with_capacity(stmts.len());
        for stmt in stmts {
            match stmt {
                Stmt::Seq(inner) => flat.extend(inner),
                other => flat.push(other),
            }
        }
        match flat.len() {
            0 => Stmt::no_op(),
            1 => flat.pop().unwrap_or_else(Stmt::no_op),
            _ => Stmt::Seq(flat),
        }
    }

    pub fn no_op() -> Stmt {
        Stmt::Evaluate(PrimExpr::int(0))
    }

    pub fn is_no_op(&self) -> bool {
        matches!(self, Stmt::Evaluate(PrimExpr::IntImm { value: 0, .. }))
    }

    /// Short tag used in diagnostics and tests.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Stmt::Seq(_) => "seq",
            Stmt::For(_) => "for",
            Stmt::Block(_) => "block",
            Stmt::BlockRealize(_) => "block_realize",
            Stmt::IfThenElse { .. } => "if_then_else",
            Stmt::While { .. } => "while",
            Stmt::LetStmt { .. } => "let",
            Stmt::Allocate { .. } => "allocate",
            Stmt::AllocateConst { .. } => "allocate_const",
            Stmt::AttrStmt { .. } => "attr",
            Stmt::AssertStmt { .. } => "assert",
            Stmt::BufferStore { .. } => "buffer_store",
            Stmt::BufferRealize { .. } => "buffer_realize",
            Stmt::Prefetch { .. } => "prefetch",
            Stmt::Evaluate(_) => "evaluate",
        }
    }

    /// Direct children in order.
    pub fn children(&self) -> Vec<&Stmt> {
        match self {
            Stmt::Seq(stmts) => stmts.iter().collect(),
            Stmt::For(f) => vec![&*f.body],
            Stmt::Block(block) => block_children(block),
            Stmt::BlockRealize(realize) => block_children(&realize.block),
            Stmt::IfThenElse {
                then_case,
                else_case,
                ..
            } => {
                let mut out: Vec<&Stmt> = vec![&**then_case];
                if let Some(else_case) = else_case {
                    out.push(else_case);
                }
                out
            }
            Stmt::While { body, .. }
            | Stmt::LetStmt { body, .. }
            | Stmt::Allocate { body, .. }
            | Stmt::AllocateConst { body, .. }
            | Stmt::AttrStmt { body, .. }
            | Stmt::AssertStmt { body, .. }
            | Stmt::BufferRealize { body, .. } => vec![&**body],
            Stmt::BufferStore { .. } | Stmt::Prefetch { .. } | Stmt::Evaluate(_) => Vec::new(),
        }
    }
}

fn block_children(block: &Block) -> Vec<&Stmt> {
    let mut out: Vec<&Stmt> = Vec::new();
    if let Some(init) = &block.init {
        out.push(init);
    }
    out.push(&block.body);
    out
}
