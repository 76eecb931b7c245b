use std::fmt;

use crate::ir::expr::{PrimExpr, Range, Var};
use crate::ir::types::DataType;

/// How out-of-shape accesses are interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferType {
    Default,
    /// Dimensions of extent 1 broadcast to any index.
    AutoBroadcast,
}

impl BufferType {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "default" => Some(BufferType::Default),
            "auto_broadcast" => Some(BufferType::AutoBroadcast),
            _ => None,
        }
    }
}

impl fmt::Display for BufferType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BufferType::Default => f.write_str("default"),
            BufferType::AutoBroadcast => f.write_str("auto_broadcast"),
        }
    }
}

/// A multi-dimensional view over a pointer.
///
/// The storage scope is carried by the pointer type of `data`.
#[derive(Debug, Clone, PartialEq)]
pub struct Buffer {
    pub data: Var,
    pub dtype: DataType,
    pub shape: Vec<PrimExpr>,
    /// Empty means compact row-major layout.
    pub strides: Vec<PrimExpr>,
    pub elem_offset: PrimExpr,
    pub name: String,
    pub data_alignment: i64,
    pub offset_factor: i64,
    pub buffer_type: BufferType,
    /// Positions in `shape` where flattening starts a new physical axis.
    pub axis_separators: Vec<i64>,
}

impl Buffer {
    pub fn ndim(&self) -> usize {
        self.shape.len()
    }

    pub fn scope(&self) -> &str {
        self.data.storage_scope().unwrap_or("global")
    }

    /// Two buffers are the same declaration when they share a data pointer
    /// and a name.
    pub fn same_as(&self, other: &Buffer) -> bool {
        self.data.id == other.data.id && self.name == other.name
    }

    /// `buffer[indices]` as an expression.
    pub fn load(&self, indices: Vec<PrimExpr>) -> PrimExpr {
        PrimExpr::BufferLoad {
            buffer: Box::new(self.clone()),
            indices,
        }
    }

    /// Region covering the whole buffer.
    pub fn full_region(&self) -> BufferRegion {
        BufferRegion {
            buffer: self.clone(),
            region: self
                .shape
                .iter()
                .map(|extent| Range::from_min_extent(PrimExpr::int_of(0, extent.dtype()), extent.clone()))
                .collect(),
        }
    }

    /// Region covering the single element at `indices`.
    pub fn point_region(&self, indices: Vec<PrimExpr>) -> BufferRegion {
        BufferRegion {
            buffer: self.clone(),
            region: indices.into_iter().map(Range::point).collect(),
        }
    }

    pub fn slice(&self, region: Vec<Range>) -> BufferRegion {
        BufferRegion {
            buffer: self.clone(),
            region,
        }
    }
}

/// A rectangular sub-region of a buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct BufferRegion {
    pub buffer: Buffer,
    pub region: Vec<Range>,
}

impl From<Buffer> for BufferRegion {
    fn from(buffer: Buffer) -> Self {
        buffer.full_region()
    }
}

impl From<&Buffer> for BufferRegion {
    fn from(buffer: &Buffer) -> Self {
        buffer.full_region()
    }
}

/// A buffer declared inside a block whose contents alias `source`.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchBufferRegion {
    pub buffer: Buffer,
    pub source: BufferRegion,
}

/// Literal contents of a constant allocation.
#[derive(Debug, Clone, PartialEq)]
pub enum ConstantData {
    Int(Vec<i64>),
    Float(Vec<f64>),
}

impl ConstantData {
    pub fn len(&self) -> usize {
        match self {
            ConstantData::Int(values) => values.len(),
            ConstantData::Float(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
