use indexmap::IndexMap;

use crate::ir::buffer::Buffer;
use crate::ir::expr::{Annotations, Var};
use crate::ir::stmt::Stmt;
use crate::ir::types::Type;

/// A primitive tensor function.
///
/// Produced exactly once, when a function frame closes. Immutable
/// afterwards: every field is a plain value and there are no interior
/// mutation paths.
///
/// Invariants established by the function frame:
/// 1. `params` has no duplicate variable.
/// 2. Every key of `buffer_map` and `preflattened_buffer_map` is in `params`.
#[derive(Debug, Clone, PartialEq)]
pub struct PrimFunc {
    /// Name hint set by `func_name`. Module registration may override it.
    pub name: Option<String>,
    pub params: Vec<Var>,
    pub body: Stmt,
    pub ret_type: Type,
    /// Handle parameter → buffer it is matched against, in binding order.
    pub buffer_map: IndexMap<Var, Buffer>,
    pub preflattened_buffer_map: IndexMap<Var, Buffer>,
    pub attrs: Annotations,
}

impl PrimFunc {
    /// Buffers bound to parameters, in parameter order.
    pub fn param_buffers(&self) -> impl Iterator<Item = &Buffer> + '_ {
        self.params.iter().filter_map(|p| self.buffer_map.get(p))
    }

    pub fn param_by_name(&self, name: &str) -> Option<&Var> {
        self.params.iter().find(|p| p.name == name)
    }

    /// Returns a copy carrying `name` as its name hint.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}
