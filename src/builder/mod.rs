//! The scoped IR builder.
//!
//! An [`IRBuilder`] owns a stack of open frames. Scope-opening calls in
//! [`crate::tir`] push a frame and hand back a [`Scope`] guard; closing the
//! guard assembles the frame into one IR node and appends it to the parent
//! frame, or makes it the session result when the stack becomes empty.
//!
//! One builder is active per thread. [`IRBuilder::enter`] installs it and
//! returns a [`BuilderSession`]; the free functions in `tir` find it through a
//! thread-local handle.

pub(crate) mod frame;
mod scope;

use std::cell::RefCell;
use std::rc::Rc;

use tracing::{debug, trace};

use crate::config::BuilderConfig;
use crate::error::BuildError;
use crate::ir::buffer::Buffer;
use crate::ir::expr::{PrimExpr, Range, Var};
use crate::ir::function::PrimFunc;
use crate::ir::stmt::Stmt;

use frame::{Assembled, Frame, FrameData, FrameId, PrimFuncFrame};

pub use frame::FrameKind;
pub use scope::Scope;

thread_local! {
    static CURRENT: RefCell<Option<IRBuilder>> = RefCell::new(None);
}

/// What a finished session produced.
#[derive(Debug, Clone, PartialEq)]
pub enum Output {
    Func(PrimFunc),
    /// Statements built with no enclosing function.
    Stmt(Stmt),
}

impl Output {
    fn kind_name(&self) -> &'static str {
        match self {
            Output::Func(_) => "function",
            Output::Stmt(_) => "statement",
        }
    }

    pub fn into_func(self) -> Result<PrimFunc, BuildError> {
        match self {
            Output::Func(func) => Ok(func),
            other => Err(BuildError::UnexpectedResult {
                expected: "function",
                found: other.kind_name(),
            }),
        }
    }

    pub fn into_stmt(self) -> Result<Stmt, BuildError> {
        match self {
            Output::Stmt(stmt) => Ok(stmt),
            other => Err(BuildError::UnexpectedResult {
                expected: "statement",
                found: other.kind_name(),
            }),
        }
    }
}

/// Handle to a builder context. Cloning shares the same frame stack.
#[derive(Debug, Clone)]
pub struct IRBuilder {
    state: Rc<RefCell<BuilderState>>,
}

impl IRBuilder {
    /// Starts a session with the default configuration.
    pub fn enter() -> Result<BuilderSession, BuildError> {
        Self::enter_with(BuilderConfig::default())
    }

    pub fn enter_with(config: BuilderConfig) -> Result<BuilderSession, BuildError> {
        let builder = IRBuilder {
            state: Rc::new(RefCell::new(BuilderState::new(config))),
        };
        CURRENT.with(|current| {
            let mut current = current.borrow_mut();
            if current.is_some() {
                return Err(BuildError::BuilderAlreadyActive);
            }
            *current = Some(builder.clone());
            Ok(())
        })?;
        debug!("builder session entered");
        Ok(BuilderSession { builder })
    }

    /// The builder active on this thread. `op` names the caller for the
    /// error message.
    pub fn current(op: &'static str) -> Result<IRBuilder, BuildError> {
        CURRENT
            .with(|current| current.borrow().clone())
            .ok_or(BuildError::NoActiveBuilder { op })
    }

    pub fn is_active() -> bool {
        CURRENT.with(|current| current.borrow().is_some())
    }

    /// Number of open frames.
    pub fn depth(&self) -> usize {
        self.state.borrow().frames.len()
    }

    /// Kinds of the open frames, outermost first.
    pub fn open_kinds(&self) -> Vec<FrameKind> {
        self.state.borrow().open_kinds()
    }

    pub fn config(&self) -> BuilderConfig {
        self.state.borrow().config.clone()
    }

    pub(crate) fn with_state<R>(&self, f: impl FnOnce(&mut BuilderState) -> R) -> R {
        f(&mut self.state.borrow_mut())
    }

    /// Runs a fallible operation against the stack. A failure is also
    /// remembered, so `finish` reports it instead of a partial result.
    pub(crate) fn apply<R>(&self, f: impl FnOnce(&mut BuilderState) -> Result<R, BuildError>) -> Result<R, BuildError> {
        self.with_state(|state| {
            let result = f(state);
            if let Err(err) = &result {
                state.record(err);
            }
            result
        })
    }

    /// Validates and pushes a new frame. `f` runs against the current stack
    /// and returns the frame data plus the value exposed by the scope guard.
    pub(crate) fn open<T>(
        &self,
        f: impl FnOnce(&mut BuilderState) -> Result<(FrameData, T), BuildError>,
    ) -> Result<Scope<T>, BuildError> {
        let (id, kind, value) = self.apply(|state| {
            let (data, value) = f(state)?;
            let kind = data.kind();
            let id = state.push(data);
            Ok((id, kind, value))
        })?;
        Ok(Scope::new(self.clone(), id, kind, value))
    }

    pub(crate) fn try_close(&self, id: FrameId, kind: FrameKind) -> Option<Result<(), BuildError>> {
        let mut state = self.state.try_borrow_mut().ok()?;
        Some(state.close(id, kind))
    }

    fn same_as(&self, other: &IRBuilder) -> bool {
        Rc::ptr_eq(&self.state, &other.state)
    }
}

/// Frame stack and result of one session.
#[derive(Debug)]
pub(crate) struct BuilderState {
    pub config: BuilderConfig,
    frames: Vec<Frame>,
    next_frame_id: u64,
    result: Option<Output>,
    /// First failed operation, reported by `finish`.
    deferred: Option<BuildError>,
}

impl BuilderState {
    fn new(config: BuilderConfig) -> Self {
        Self {
            config,
            frames: Vec::new(),
            next_frame_id: 0,
            result: None,
            deferred: None,
        }
    }

    fn open_kinds(&self) -> Vec<FrameKind> {
        self.frames.iter().map(Frame::kind).collect()
    }

    pub fn top_kind(&self) -> Option<FrameKind> {
        self.frames.last().map(Frame::kind)
    }

    pub fn has_result(&self) -> bool {
        self.result.is_some()
    }

    fn push(&mut self, data: FrameData) -> FrameId {
        let id = FrameId(self.next_frame_id);
        self.next_frame_id += 1;
        trace!(kind = %data.kind(), depth = self.frames.len() + 1, "push frame");
        self.frames.push(Frame::new(id, data));
        id
    }

    fn record(&mut self, err: &BuildError) {
        if self.deferred.is_none() {
            debug!(error = %err, "builder operation failed");
            self.deferred = Some(err.clone());
        }
    }

    /// Pops frame `id`, assembles it and delivers the node to its parent.
    /// Any failure is also remembered for `finish`.
    fn close(&mut self, id: FrameId, kind: FrameKind) -> Result<(), BuildError> {
        let result = self.pop_and_deliver(id, kind);
        if let Err(err) = &result {
            self.record(err);
        }
        result
    }

    fn pop_and_deliver(&mut self, id: FrameId, kind: FrameKind) -> Result<(), BuildError> {
        match self.frames.last() {
            Some(top) if top.id == id => {}
            Some(top) if self.frames.iter().any(|f| f.id == id) => {
                return Err(BuildError::OutOfOrderClose {
                    closing: kind,
                    top: top.kind(),
                });
            }
            _ => return Err(BuildError::FrameNotOpen { kind }),
        }
        let frame = self.frames.pop().ok_or(BuildError::FrameNotOpen { kind })?;
        trace!(kind = %kind, depth = self.frames.len(), "pop frame");
        let assembled = frame.assemble(&self.config)?;
        self.deliver(assembled)
    }

    fn deliver(&mut self, assembled: Assembled) -> Result<(), BuildError> {
        match assembled {
            Assembled::Stmt(stmt) => self.append_stmt(stmt),
            Assembled::Inline(stmts) => stmts.into_iter().try_for_each(|stmt| self.append_stmt(stmt)),
            Assembled::Func(func) => {
                if let Some(top) = self.top_kind() {
                    return Err(BuildError::NestedFunction { found: top });
                }
                if self.result.is_some() {
                    return Err(BuildError::shape("prim_func", "the session already produced a result"));
                }
                debug!(name = ?func.name, params = func.params.len(), "sealed prim_func");
                self.result = Some(Output::Func(func));
                Ok(())
            }
            Assembled::Init(stmt) => {
                let block = self.top_mut("init", FrameKind::Block, FrameData::as_block_mut)?;
                block.init = Some(stmt);
                Ok(())
            }
            Assembled::Then(stmt) => {
                let if_frame = self.top_mut("then_", FrameKind::If, FrameData::as_if_mut)?;
                if_frame.then_case = Some(stmt);
                Ok(())
            }
            Assembled::Else(stmt) => {
                let if_frame = self.top_mut("else_", FrameKind::If, FrameData::as_if_mut)?;
                if_frame.else_case = Some(stmt);
                Ok(())
            }
        }
    }

    /// Appends to the innermost frame body, or to the session result when
    /// no frame is open.
    pub fn append_stmt(&mut self, stmt: Stmt) -> Result<(), BuildError> {
        if let Some(top) = self.frames.last_mut() {
            top.stmts.push(stmt);
            return Ok(());
        }
        match self.result.take() {
            None => {
                self.result = Some(Output::Stmt(stmt));
                Ok(())
            }
            Some(Output::Stmt(prev)) => {
                self.result = Some(Output::Stmt(Stmt::seq(vec![prev, stmt])));
                Ok(())
            }
            Some(func @ Output::Func(_)) => {
                self.result = Some(func);
                Err(BuildError::shape(
                    "append",
                    "cannot add statements after the session produced a function",
                ))
            }
        }
    }

    fn top_error(&self, op: &'static str, expected: FrameKind) -> BuildError {
        match self.frames.last() {
            Some(top) if self.frames.iter().any(|f| f.kind() == expected) => BuildError::ScopeMismatch {
                op,
                expected,
                found: top.kind(),
            },
            _ => BuildError::NoEnclosingScope { op, expected },
        }
    }

    /// Mutable access to the top frame, which must be of kind `expected`.
    pub fn top_mut<D>(
        &mut self,
        op: &'static str,
        expected: FrameKind,
        project: impl FnOnce(&mut FrameData) -> Option<&mut D>,
    ) -> Result<&mut D, BuildError> {
        let err = self.top_error(op, expected);
        self.frames.last_mut().and_then(|f| project(&mut f.data)).ok_or(err)
    }

    /// Error for an operation that needs one of several frame kinds on top.
    pub fn mismatch(&self, op: &'static str, expected: FrameKind) -> BuildError {
        self.top_error(op, expected)
    }

    pub fn nearest_prim_func_mut(&mut self) -> Option<&mut PrimFuncFrame> {
        self.frames.iter_mut().rev().find_map(|f| f.data.as_prim_func_mut())
    }

    pub fn nearest_prim_func(&self) -> Option<&PrimFuncFrame> {
        self.frames.iter().rev().find_map(|f| f.data.as_prim_func())
    }

    /// Scope set by the innermost `storage_scope` attr, or the configured
    /// default.
    pub fn storage_scope(&self) -> String {
        self.frames
            .iter()
            .rev()
            .find_map(|f| match &f.data {
                FrameData::Attr {
                    key,
                    value: PrimExpr::StringImm(scope),
                    ..
                } if key == "storage_scope" => Some(scope.clone()),
                _ => None,
            })
            .unwrap_or_else(|| self.config.default_storage_scope.clone())
    }

    pub fn is_buffer_declared(&self, buffer: &Buffer) -> bool {
        self.frames.iter().any(|f| f.declares_buffer(buffer))
    }

    /// Domain of `var` if it is bound by an enclosing loop frame.
    pub fn loop_domain(&self, var: &Var) -> Option<Range> {
        self.frames.iter().rev().filter_map(|f| f.data.as_for()).find_map(|f| {
            f.vars
                .iter()
                .position(|v| v == var)
                .and_then(|k| f.doms.get(k).cloned())
        })
    }

    fn finish(&mut self) -> Result<Output, BuildError> {
        if let Some(err) = self.deferred.take() {
            return Err(err);
        }
        if !self.frames.is_empty() {
            return Err(BuildError::UnclosedScope {
                open: self.open_kinds(),
            });
        }
        self.result.take().ok_or(BuildError::MissingResult)
    }
}

/// Keeps a builder installed as the thread's current builder.
///
/// Dropping the session uninstalls it on every path; [`finish`](Self::finish)
/// additionally checks that every scope was closed and returns the result.
#[must_use = "the builder is uninstalled as soon as the session is dropped"]
#[derive(Debug)]
pub struct BuilderSession {
    builder: IRBuilder,
}

impl BuilderSession {
    pub fn builder(&self) -> &IRBuilder {
        &self.builder
    }

    pub fn finish(self) -> Result<Output, BuildError> {
        let result = self.builder.with_state(BuilderState::finish);
        match &result {
            Ok(output) => debug!(result = output.kind_name(), "builder session finished"),
            Err(err) => debug!(error = %err, "builder session failed"),
        }
        result
    }
}

impl Drop for BuilderSession {
    fn drop(&mut self) {
        let _ = CURRENT.try_with(|current| {
            if let Ok(mut current) = current.try_borrow_mut() {
                if matches!(current.as_ref(), Some(b) if b.same_as(&self.builder)) {
                    *current = None;
                }
            }
        });
    }
}
