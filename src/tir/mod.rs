//! Declarative construction API.
//!
//! Every function here acts on the builder installed on the current thread
//! by [`IRBuilder::enter`](crate::builder::IRBuilder::enter) and fails with
//! `NoActiveBuilder` outside a session. The leaf constructors in [`leaf`]
//! are the exception: they need no builder.

pub mod axis;
pub mod leaf;
mod scopes;
mod stmts;

pub use leaf::*;
pub use scopes::{
    allocate, allocate_const, assert_, attr, block, else_, grid, if_, init, launch_thread, let_, parallel,
    prim_func, realize, serial, then_, thread_binding, unroll, vectorized, while_,
};
pub use stmts::{
    alloc_buffer, arg_buffer, arg_var, block_attrs, buffer_store, env_thread, evaluate, func_attrs, func_name,
    func_ret, match_buffer, preflattened_buffer, prefetch, reads, where_, writes, MatchTarget,
};
