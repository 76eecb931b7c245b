use std::collections::HashMap;

use crate::error::ModuleError;
use crate::ir::function::PrimFunc;

/// Uniquely identifies a function within an `IrModule`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FunctionId(pub u32);

/// A single call inside a graph-level function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GraphCall {
    /// Call into a primitive function registered in the same module.
    CallTir { callee: String },
    /// Call into an external packed function; never backed by a `PrimFunc`.
    CallExtern { symbol: String },
    /// Any other operator, e.g. `add` or `reshape`.
    Op { name: String },
}

/// A graph-level function: a straight-line sequence of calls in
/// A-normal form, so calls never nest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphFunc {
    pub name: String,
    pub calls: Vec<GraphCall>,
}

impl GraphFunc {
    pub fn new(name: impl Into<String>, calls: Vec<GraphCall>) -> Self {
        Self {
            name: name.into(),
            calls,
        }
    }
}

/// A program unit collecting named primitive functions and the graph
/// functions that call them.
///
/// Invariants:
/// - Function names are unique within a module, across both kinds.
/// - `FunctionId(n)` always indexes `prim_funcs[n]`.
/// - Once added, a function is immutable.
#[derive(Debug, Default)]
pub struct IrModule {
    pub name: String,
    prim_funcs: Vec<PrimFunc>,
    prim_index: HashMap<String, FunctionId>,
    graph_funcs: Vec<GraphFunc>,
}

impl IrModule {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            prim_funcs: Vec::new(),
            prim_index: HashMap::new(),
            graph_funcs: Vec::new(),
        }
    }

    fn name_taken(&self, name: &str) -> bool {
        self.prim_index.contains_key(name) || self.graph_funcs.iter().any(|g| g.name == name)
    }

    /// Registers a finished primitive function under `name`.
    /// Returns `Err` if the name is already taken.
    pub fn add_prim_func(&mut self, name: impl Into<String>, func: PrimFunc) -> Result<FunctionId, ModuleError> {
        let name = name.into();
        if self.name_taken(&name) {
            return Err(ModuleError::DuplicateFunction { name });
        }
        let id = FunctionId(self.prim_funcs.len() as u32);
        self.prim_index.insert(name.clone(), id);
        self.prim_funcs.push(func.with_name(name));
        Ok(id)
    }

    /// Registers a function under its own name hint.
    pub fn add_named(&mut self, func: PrimFunc) -> Result<FunctionId, ModuleError> {
        let name = func.name.clone().ok_or(ModuleError::UnnamedFunction)?;
        self.add_prim_func(name, func)
    }

    pub fn add_graph_func(&mut self, func: GraphFunc) -> Result<(), ModuleError> {
        if self.name_taken(&func.name) {
            return Err(ModuleError::DuplicateFunction { name: func.name });
        }
        self.graph_funcs.push(func);
        Ok(())
    }

    pub fn prim_func(&self, id: FunctionId) -> Option<&PrimFunc> {
        self.prim_funcs.get(id.0 as usize)
    }

    pub fn prim_func_by_name(&self, name: &str) -> Option<&PrimFunc> {
        let id = self.prim_index.get(name)?;
        self.prim_funcs.get(id.0 as usize)
    }

    pub fn prim_funcs(&self) -> &[PrimFunc] {
        &self.prim_funcs
    }

    pub fn graph_funcs(&self) -> &[GraphFunc] {
        &self.graph_funcs
    }
}
