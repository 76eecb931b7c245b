use thiserror::Error;

use crate::builder::FrameKind;

/// Top-level error type for the crate.
#[derive(Debug, Error)]
pub enum Error {
    #[error("[build error] {0}")]
    Build(#[from] BuildError),

    #[error("[module error] {0}")]
    Module(#[from] ModuleError),

    #[error("[task extraction error] {0}")]
    Task(#[from] TaskError),
}

fn join_kinds(kinds: &[FrameKind]) -> String {
    kinds
        .iter()
        .map(|k| k.to_string())
        .collect::<Vec<_>>()
        .join(" > ")
}

// ---------------------------------------------------------------------------
// Build errors
// ---------------------------------------------------------------------------

/// Which class of caller mistake a `BuildError` reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Call made against the wrong frame, or with no builder at all.
    ScopeMismatch,
    /// Single-use field set twice on one frame.
    DuplicateSetting,
    /// `then_`/`else_` out of the if → then → else order.
    PairingViolation,
    /// Bad lengths, ranges or bindings.
    ArgumentShape,
    /// Session finished with frames still open.
    UnclosedScope,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum BuildError {
    #[error("'{op}' called with no active builder; open one with IRBuilder::enter() first")]
    NoActiveBuilder { op: &'static str },

    #[error("a builder is already active on this thread; finish it before entering another")]
    BuilderAlreadyActive,

    #[error("'{op}' needs an enclosing {expected} scope, but none is open")]
    NoEnclosingScope {
        op: &'static str,
        expected: FrameKind,
    },

    #[error("'{op}' must be called directly inside a {expected} scope, but the innermost open scope is {found}")]
    ScopeMismatch {
        op: &'static str,
        expected: FrameKind,
        found: FrameKind,
    },

    #[error("cannot close {closing} scope while {top} scope is still open inside it; close scopes innermost first")]
    OutOfOrderClose { closing: FrameKind, top: FrameKind },

    #[error("{kind} scope is not open")]
    FrameNotOpen { kind: FrameKind },

    #[error("prim_func must be the outermost scope, but it was opened inside {found}")]
    NestedFunction { found: FrameKind },

    #[error("'{field}' is already set on this {kind} scope; it can only be set once")]
    DuplicateSetting {
        kind: FrameKind,
        field: &'static str,
    },

    #[error("'{op}': {detail}")]
    Pairing { op: &'static str, detail: &'static str },

    #[error("'{op}': {detail}")]
    ArgumentShape { op: &'static str, detail: String },

    #[error("invalid function: {detail}")]
    InvalidFunction { detail: String },

    #[error("invalid block '{name}': {detail}")]
    InvalidBlock { name: String, detail: String },

    #[error("'{op}': buffer '{buffer}' is not declared in any enclosing scope")]
    UndeclaredBuffer { op: &'static str, buffer: String },

    #[error("'{var}' is not an environment thread created with env_thread in the enclosing function")]
    UnknownEnvThread { var: String },

    #[error("builder finished with unclosed scopes: {}", join_kinds(.open))]
    UnclosedScope { open: Vec<FrameKind> },

    #[error("builder finished without producing any IR")]
    MissingResult,

    #[error("builder produced a {found}, expected a {expected}")]
    UnexpectedResult {
        expected: &'static str,
        found: &'static str,
    },
}

impl BuildError {
    pub(crate) fn shape(op: &'static str, detail: impl Into<String>) -> Self {
        BuildError::ArgumentShape {
            op,
            detail: detail.into(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            BuildError::NoActiveBuilder { .. }
            | BuildError::BuilderAlreadyActive
            | BuildError::NoEnclosingScope { .. }
            | BuildError::ScopeMismatch { .. }
            | BuildError::OutOfOrderClose { .. }
            | BuildError::FrameNotOpen { .. }
            | BuildError::NestedFunction { .. }
            | BuildError::UndeclaredBuffer { .. }
            | BuildError::UnknownEnvThread { .. } => ErrorCategory::ScopeMismatch,
            BuildError::DuplicateSetting { .. } => ErrorCategory::DuplicateSetting,
            BuildError::Pairing { .. } => ErrorCategory::PairingViolation,
            BuildError::ArgumentShape { .. }
            | BuildError::InvalidFunction { .. }
            | BuildError::InvalidBlock { .. }
            | BuildError::UnexpectedResult { .. } => ErrorCategory::ArgumentShape,
            BuildError::UnclosedScope { .. } | BuildError::MissingResult => ErrorCategory::UnclosedScope,
        }
    }
}

// ---------------------------------------------------------------------------
// Module errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ModuleError {
    #[error("'{name}' is already defined in this module")]
    DuplicateFunction { name: String },

    #[error("function has no name; set one with func_name or register it with an explicit name")]
    UnnamedFunction,
}

// ---------------------------------------------------------------------------
// Task extraction errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Error)]
pub enum TaskError {
    #[error("in '{caller}': call_tir target '{callee}' is not a primitive function of this module")]
    UnknownFunction { caller: String, callee: String },
}

impl Error {
    /// Stable diagnostic code for this error.
    pub fn diagnostic_code(&self) -> &'static str {
        match self {
            Error::Build(b) => match b.category() {
                ErrorCategory::ScopeMismatch => "E0100",
                ErrorCategory::DuplicateSetting => "E0101",
                ErrorCategory::PairingViolation => "E0102",
                ErrorCategory::ArgumentShape => "E0103",
                ErrorCategory::UnclosedScope => "E0104",
            },
            Error::Module(m) => match m {
                ModuleError::DuplicateFunction { .. } => "E0200",
                ModuleError::UnnamedFunction => "E0201",
            },
            Error::Task(_) => "E0300",
        }
    }
}
