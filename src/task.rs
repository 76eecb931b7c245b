//! Tuning-task extraction.
//!
//! Walks the graph functions of a module and turns every distinct primitive
//! function reached through `call_tir` into one task. Structurally identical
//! functions collapse into a single task whose weight counts every call site.

use indexmap::map::Entry;
use indexmap::IndexMap;
use tracing::debug;

use crate::error::TaskError;
use crate::ir::function::PrimFunc;
use crate::ir::module::{GraphCall, IrModule};
use crate::ir::structural::StructuralKey;

/// One unit of tuning work.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedTask {
    /// Name of the first callee seen with this structure.
    pub task_name: String,
    pub func: PrimFunc,
    /// Opaque target descriptor, copied from the extraction request.
    pub target: String,
    /// Number of call sites across all graph functions.
    pub weight: u32,
}

/// Extracts tasks in order of first call.
pub fn extract_tasks(module: &IrModule, target: &str) -> Result<Vec<ExtractedTask>, TaskError> {
    let mut tasks: IndexMap<StructuralKey, ExtractedTask> = IndexMap::new();
    let mut calls = 0usize;

    for graph in module.graph_funcs() {
        for call in &graph.calls {
            let GraphCall::CallTir { callee } = call else {
                continue;
            };
            let func = module
                .prim_func_by_name(callee)
                .ok_or_else(|| TaskError::UnknownFunction {
                    caller: graph.name.clone(),
                    callee: callee.clone(),
                })?;
            calls += 1;
            match tasks.entry(StructuralKey::of(func)) {
                Entry::Occupied(entry) => entry.into_mut().weight += 1,
                Entry::Vacant(entry) => {
                    entry.insert(ExtractedTask {
                        task_name: callee.clone(),
                        func: func.clone(),
                        target: target.to_owned(),
                        weight: 1,
                    });
                }
            }
        }
    }

    debug!(module = %module.name, calls, tasks = tasks.len(), "extracted tasks");
    Ok(tasks.into_values().collect())
}
