use tracing::warn;

use crate::builder::frame::FrameId;
use crate::builder::{FrameKind, IRBuilder};
use crate::error::BuildError;
use crate::ir::buffer::Buffer;
use crate::ir::expr::Var;

/// Guard for one open frame.
///
/// The frame closes when the guard is dropped or when [`close`](Self::close)
/// is called, whichever comes first. `value` carries what the opening call
/// produced: loop variables, the let variable, an allocated buffer.
///
/// Guards must be closed innermost first. Binding them in nested blocks or in
/// reverse order of creation gets this for free from drop order.
#[must_use = "the scope closes as soon as this guard is dropped"]
#[derive(Debug)]
pub struct Scope<T = ()> {
    builder: IRBuilder,
    id: FrameId,
    kind: FrameKind,
    value: T,
    open: bool,
}

impl<T> Scope<T> {
    pub(crate) fn new(builder: IRBuilder, id: FrameId, kind: FrameKind, value: T) -> Self {
        Self {
            builder,
            id,
            kind,
            value,
            open: true,
        }
    }

    pub fn kind(&self) -> FrameKind {
        self.kind
    }

    pub fn value(&self) -> &T {
        &self.value
    }

    /// Closes the frame and reports assembly errors directly.
    pub fn close(mut self) -> Result<(), BuildError> {
        self.open = false;
        match self.builder.try_close(self.id, self.kind) {
            Some(result) => result,
            None => Err(BuildError::FrameNotOpen { kind: self.kind }),
        }
    }
}

impl Scope<Var> {
    pub fn var(&self) -> &Var {
        &self.value
    }
}

impl Scope<Vec<Var>> {
    pub fn vars(&self) -> &[Var] {
        &self.value
    }
}

impl Scope<Buffer> {
    pub fn buffer(&self) -> &Buffer {
        &self.value
    }
}

impl<T> Drop for Scope<T> {
    fn drop(&mut self) {
        if !self.open {
            return;
        }
        self.open = false;
        // The builder keeps the error for `finish`.
        if let Some(Err(err)) = self.builder.try_close(self.id, self.kind) {
            warn!(kind = %self.kind, error = %err, "scope closed on drop with an error");
        }
    }
}
