use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};

use indexmap::IndexMap;

use crate::ir::buffer::Buffer;
use crate::ir::types::{DataType, Type};

static NEXT_VAR_ID: AtomicU64 = AtomicU64::new(0);

/// Identity of a variable. Two `Var`s with equal names are still distinct
/// unless they share a `VarId`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VarId(pub u64);

impl VarId {
    fn fresh() -> Self {
        VarId(NEXT_VAR_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// A scalar or handle variable.
///
/// Equality and hashing go by identity only: cloning or renaming a `Var`
/// keeps it equal to the original, while [`Var::new`] always mints a new one.
#[derive(Debug, Clone)]
pub struct Var {
    pub id: VarId,
    pub name: String,
    pub dtype: DataType,
    /// Richer type for handles (pointer element type and storage scope).
    pub type_annotation: Option<Type>,
}

impl Var {
    pub fn new(name: impl Into<String>, dtype: DataType) -> Self {
        Self {
            id: VarId::fresh(),
            name: name.into(),
            dtype,
            type_annotation: None,
        }
    }

    /// A handle variable pointing at `elem` data in `storage_scope`.
    pub fn pointer(name: impl Into<String>, elem: DataType, storage_scope: impl Into<String>) -> Self {
        Self {
            id: VarId::fresh(),
            name: name.into(),
            dtype: DataType::handle(),
            type_annotation: Some(Type::pointer(elem, storage_scope)),
        }
    }

    /// Same identity, different name hint.
    pub fn renamed(&self, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..self.clone()
        }
    }

    pub fn storage_scope(&self) -> Option<&str> {
        self.type_annotation.as_ref().and_then(Type::storage_scope)
    }
}

impl PartialEq for Var {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Var {}

impl Hash for Var {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Display for Var {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.name.is_empty() {
            write!(f, "v{}", self.id.0)
        } else {
            f.write_str(&self.name)
        }
    }
}

/// Binary operators on primitive expressions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    FloorDiv,
    FloorMod,
    Min,
    Max,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

impl BinOp {
    /// Comparison and logical operators produce booleans.
    pub fn is_predicate(&self) -> bool {
        matches!(
            self,
            BinOp::Eq | BinOp::Ne | BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge | BinOp::And | BinOp::Or
        )
    }
}

impl fmt::Display for BinOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::FloorDiv => "//",
            BinOp::FloorMod => "%",
            BinOp::Min => "min",
            BinOp::Max => "max",
            BinOp::Eq => "==",
            BinOp::Ne => "!=",
            BinOp::Lt => "<",
            BinOp::Le => "<=",
            BinOp::Gt => ">",
            BinOp::Ge => ">=",
            BinOp::And => "&&",
            BinOp::Or => "||",
        };
        f.write_str(s)
    }
}

/// Primitive (scalar-valued) expression.
#[derive(Debug, Clone, PartialEq)]
pub enum PrimExpr {
    IntImm { value: i64, dtype: DataType },
    FloatImm { value: f64, dtype: DataType },
    StringImm(String),
    Var(Var),
    Binary {
        op: BinOp,
        lhs: Box<PrimExpr>,
        rhs: Box<PrimExpr>,
    },
    Not(Box<PrimExpr>),
    Cast { dtype: DataType, value: Box<PrimExpr> },
    BufferLoad { buffer: Box<Buffer>, indices: Vec<PrimExpr> },
    /// Intrinsic or extern call by name.
    Call {
        op: String,
        args: Vec<PrimExpr>,
        dtype: DataType,
    },
}

impl PrimExpr {
    pub fn int(value: i64) -> Self {
        PrimExpr::IntImm {
            value,
            dtype: DataType::int(32),
        }
    }

    pub fn int_of(value: i64, dtype: DataType) -> Self {
        PrimExpr::IntImm { value, dtype }
    }

    pub fn float(value: f64) -> Self {
        PrimExpr::FloatImm {
            value,
            dtype: DataType::float(32),
        }
    }

    pub fn bool(value: bool) -> Self {
        PrimExpr::IntImm {
            value: value as i64,
            dtype: DataType::bool(),
        }
    }

    pub fn string(value: impl Into<String>) -> Self {
        PrimExpr::StringImm(value.into())
    }

    pub fn binary(op: BinOp, lhs: PrimExpr, rhs: PrimExpr) -> Self {
        PrimExpr::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }

    pub fn cast(dtype: DataType, value: PrimExpr) -> Self {
        if value.dtype() == dtype {
            return value;
        }
        PrimExpr::Cast {
            dtype,
            value: Box::new(value),
        }
    }

    pub fn call(op: impl Into<String>, args: Vec<PrimExpr>, dtype: DataType) -> Self {
        PrimExpr::Call {
            op: op.into(),
            args,
            dtype,
        }
    }

    pub fn dtype(&self) -> DataType {
        match self {
            PrimExpr::IntImm { dtype, .. } | PrimExpr::FloatImm { dtype, .. } => *dtype,
            PrimExpr::StringImm(_) => DataType::handle(),
            PrimExpr::Var(var) => var.dtype,
            PrimExpr::Binary { op, lhs, .. } => {
                if op.is_predicate() {
                    DataType::bool().with_lanes(lhs.dtype().lanes)
                } else {
                    lhs.dtype()
                }
            }
            PrimExpr::Not(value) => value.dtype(),
            PrimExpr::Cast { dtype, .. } => *dtype,
            PrimExpr::BufferLoad { buffer, .. } => buffer.dtype,
            PrimExpr::Call { dtype, .. } => *dtype,
        }
    }

    /// Integer value if this is an integer literal.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            PrimExpr::IntImm { value, .. } => Some(*value),
            _ => None,
        }
    }

    pub fn as_var(&self) -> Option<&Var> {
        match self {
            PrimExpr::Var(var) => Some(var),
            _ => None,
        }
    }

    /// `self - other`, folded when both sides are integer literals.
    pub fn sub_folded(&self, other: &PrimExpr) -> PrimExpr {
        match (self, other) {
            (PrimExpr::IntImm { value: a, dtype }, PrimExpr::IntImm { value: b, .. }) => {
                PrimExpr::int_of(a - b, *dtype)
            }
            (_, PrimExpr::IntImm { value: 0, .. }) => self.clone(),
            _ => PrimExpr::binary(BinOp::Sub, self.clone(), other.clone()),
        }
    }

    /// `self + other`, folded when both sides are integer literals.
    pub fn add_folded(&self, other: &PrimExpr) -> PrimExpr {
        match (self, other) {
            (PrimExpr::IntImm { value: a, dtype }, PrimExpr::IntImm { value: b, .. }) => {
                PrimExpr::int_of(a + b, *dtype)
            }
            (PrimExpr::IntImm { value: 0, .. }, _) => other.clone(),
            (_, PrimExpr::IntImm { value: 0, .. }) => self.clone(),
            _ => PrimExpr::binary(BinOp::Add, self.clone(), other.clone()),
        }
    }

    pub fn less_than(self, rhs: impl Into<PrimExpr>) -> PrimExpr {
        PrimExpr::binary(BinOp::Lt, self, rhs.into())
    }

    pub fn equal(self, rhs: impl Into<PrimExpr>) -> PrimExpr {
        PrimExpr::binary(BinOp::Eq, self, rhs.into())
    }
}

impl From<i64> for PrimExpr {
    fn from(value: i64) -> Self {
        PrimExpr::int_of(value, DataType::int(64))
    }
}

impl From<i32> for PrimExpr {
    fn from(value: i32) -> Self {
        PrimExpr::int(value as i64)
    }
}

impl From<f32> for PrimExpr {
    fn from(value: f32) -> Self {
        PrimExpr::float(value as f64)
    }
}

impl From<bool> for PrimExpr {
    fn from(value: bool) -> Self {
        PrimExpr::bool(value)
    }
}

impl From<Var> for PrimExpr {
    fn from(var: Var) -> Self {
        PrimExpr::Var(var)
    }
}

impl From<&Var> for PrimExpr {
    fn from(var: &Var) -> Self {
        PrimExpr::Var(var.clone())
    }
}

macro_rules! impl_arith {
    ($($trait:ident :: $method:ident => $op:ident),* $(,)?) => {
        $(
            impl<R: Into<PrimExpr>> std::ops::$trait<R> for PrimExpr {
                type Output = PrimExpr;

                fn $method(self, rhs: R) -> PrimExpr {
                    PrimExpr::binary(BinOp::$op, self, rhs.into())
                }
            }
        )*
    };
}

impl_arith!(Add::add => Add, Sub::sub => Sub, Mul::mul => Mul, Rem::rem => FloorMod);

/// Half-open range `[min, min + extent)`.
#[derive(Debug, Clone, PartialEq)]
pub struct Range {
    pub min: PrimExpr,
    pub extent: PrimExpr,
}

impl Range {
    pub fn from_min_extent(min: impl Into<PrimExpr>, extent: impl Into<PrimExpr>) -> Self {
        Self {
            min: min.into(),
            extent: extent.into(),
        }
    }

    /// `[begin, end)`.
    pub fn new(begin: impl Into<PrimExpr>, end: impl Into<PrimExpr>) -> Self {
        let min = begin.into();
        let extent = end.into().sub_folded(&min);
        Self { min, extent }
    }

    /// The single-point range `[index, index + 1)`.
    pub fn point(index: impl Into<PrimExpr>) -> Self {
        let min = index.into();
        let one = PrimExpr::int_of(1, min.dtype());
        Self { min, extent: one }
    }
}

/// Role of an iteration variable inside a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IterVarKind {
    /// Data-parallel axis.
    Spatial,
    /// Commutative reduction axis.
    Reduce,
    /// Ordered (scan) axis.
    Scan,
    Opaque,
    /// Environment thread index bound by a launch or thread-binding loop.
    ThreadIndex,
}

impl fmt::Display for IterVarKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            IterVarKind::Spatial => "spatial",
            IterVarKind::Reduce => "reduce",
            IterVarKind::Scan => "scan",
            IterVarKind::Opaque => "opaque",
            IterVarKind::ThreadIndex => "thread_index",
        };
        f.write_str(s)
    }
}

/// A variable ranging over `dom` with a given role.
#[derive(Debug, Clone, PartialEq)]
pub struct IterVar {
    /// `None` only for environment threads whose extent is set at launch.
    pub dom: Option<Range>,
    pub var: Var,
    pub kind: IterVarKind,
    /// Thread tag such as `threadIdx.x`; empty unless `kind` is `ThreadIndex`.
    pub thread_tag: String,
}

impl IterVar {
    pub fn new(dom: Range, var: Var, kind: IterVarKind) -> Self {
        Self {
            dom: Some(dom),
            var,
            kind,
            thread_tag: String::new(),
        }
    }

    pub fn thread(dom: Option<Range>, var: Var, thread_tag: impl Into<String>) -> Self {
        Self {
            dom,
            var,
            kind: IterVarKind::ThreadIndex,
            thread_tag: thread_tag.into(),
        }
    }
}

/// Loosely typed annotation value attached to loops, blocks and functions.
#[derive(Debug, Clone, PartialEq)]
pub enum AttrValue {
    Int(i64),
    Float(f64),
    Bool(bool),
    Str(String),
    Expr(PrimExpr),
    Array(Vec<AttrValue>),
}

impl From<i64> for AttrValue {
    fn from(value: i64) -> Self {
        AttrValue::Int(value)
    }
}

impl From<bool> for AttrValue {
    fn from(value: bool) -> Self {
        AttrValue::Bool(value)
    }
}

impl From<&str> for AttrValue {
    fn from(value: &str) -> Self {
        AttrValue::Str(value.to_owned())
    }
}

impl From<String> for AttrValue {
    fn from(value: String) -> Self {
        AttrValue::Str(value)
    }
}

impl From<PrimExpr> for AttrValue {
    fn from(value: PrimExpr) -> Self {
        AttrValue::Expr(value)
    }
}

/// Insertion-ordered string-keyed annotations.
pub type Annotations = IndexMap<String, AttrValue>;
