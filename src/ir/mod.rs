pub mod buffer;
pub mod expr;
pub mod function;
pub mod module;
pub mod stmt;
pub mod structural;
pub mod types;

pub use buffer::{Buffer, BufferRegion, BufferType, ConstantData, MatchBufferRegion};
pub use expr::{Annotations, AttrValue, BinOp, IterVar, IterVarKind, PrimExpr, Range, Var, VarId};
pub use function::PrimFunc;
pub use module::{FunctionId, GraphCall, GraphFunc, IrModule};
pub use stmt::{AttrNode, Block, BlockRealize, For, ForKind, Stmt};
pub use structural::{structural_equal, structural_hash, StructuralKey};
pub use types::{DataType, Type, TypeCode};
