//! tir-builder: a scoped builder for tensor-level IR.
//!
//! Construction flow:
//!
//! ```text
//! IRBuilder::enter() → tir::prim_func() → tir::block()/serial()/… → leaf statements
//!   → Scope guards close innermost first → BuilderSession::finish() → PrimFunc
//! ```
//!
//! Finished functions are plain immutable values. They can be registered in
//! an [`IrModule`](ir::IrModule), compared structurally
//! ([`ir::structural_equal`]) and grouped into tuning tasks
//! ([`task::extract_tasks`]).

pub mod builder;
pub mod config;
pub mod error;
pub mod ir;
pub mod task;
pub mod tir;

pub use builder::{BuilderSession, FrameKind, IRBuilder, Output, Scope};
pub use config::BuilderConfig;
pub use error::{BuildError, Error, ErrorCategory, ModuleError, TaskError};
pub use task::{extract_tasks, ExtractedTask};
