//! Render graph error types and result codes.

use thiserror::Error;

use crate::backend::BackendError;
use crate::types::ResourceState;

/// Closed set of result codes reported at the graph boundary.
///
/// Every [`GraphError`] maps onto exactly one code via [`GraphError::code`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResultCode {
    Ok,
    InvalidArguments,
    KeyNotFound,
    KeyDuplicated,
    RangeOverlapping,
    ValidationFailed,
    NotImplemented,
    InvalidState,
    CyclicDependency,
    BackendFailure,
}

impl ResultCode {
    /// Code for a graph operation result.
    pub fn from_result<T>(result: &Result<T, GraphError>) -> Self {
        match result {
            Ok(_) => Self::Ok,
            Err(err) => err.code(),
        }
    }

    pub fn is_ok(self) -> bool {
        self == Self::Ok
    }
}

/// Errors produced while building, compiling, recording or submitting a graph.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    // Build time
    #[error("name '{0}' is already registered in this graph")]
    DuplicateName(String),
    #[error("no resource named '{0}'")]
    NotFound(String),
    #[error("pass '{pass}' references unknown resource '{resource}'")]
    UnknownResource { pass: String, resource: String },
    #[error("resource '{name}' is a {actual}, expected a {expected}")]
    ResourceKindMismatch {
        name: String,
        expected: &'static str,
        actual: &'static str,
    },
    #[error("handle belongs to a previous build or another graph")]
    StaleHandle,
    #[error("pass '{pass}' binds render target slot {slot} twice")]
    SlotOccupied { pass: String, slot: u32 },
    #[error("graph cannot be modified while it is recording")]
    ReentrantBuild,
    #[error("graph is already compiled; reset it before declaring more work")]
    AlreadyCompiled,
    #[error("invalid arguments: {0}")]
    InvalidArguments(String),

    // Compile time
    #[error("cyclic dependency between passes: {}", .passes.join(", "))]
    CyclicDependency { passes: Vec<String> },
    #[error("pass '{pass}' accesses '{resource}' as both {first:?} and {second:?}")]
    StateConflict {
        pass: String,
        resource: String,
        first: ResourceState,
        second: ResourceState,
    },
    #[error("pass '{pass}' reads '{resource}' but no pass writes it")]
    ReadBeforeWrite { pass: String, resource: String },
    #[error("declaration order cannot be kept: '{pass}' depends on a later pass")]
    ProgramOrderViolation { pass: String },

    // Orchestration
    #[error("invalid state: {0}")]
    InvalidState(String),
    #[error("resource '{0}' has no native backing yet")]
    NotMaterialized(String),
    #[error("frame executor {0} is not initialized")]
    ExecutorNotInitialized(usize),
    #[error("not implemented: {0}")]
    NotImplemented(&'static str),

    // Record and submit
    #[error("pass '{pass}' failed: {message}")]
    Callback { pass: String, message: String },
    #[error(transparent)]
    Backend(#[from] BackendError),
}

impl GraphError {
    /// Result code reported for this error.
    pub fn code(&self) -> ResultCode {
        match self {
            Self::DuplicateName(_) => ResultCode::KeyDuplicated,
            Self::NotFound(_) | Self::UnknownResource { .. } => ResultCode::KeyNotFound,
            Self::ResourceKindMismatch { .. }
            | Self::StaleHandle
            | Self::InvalidArguments(_) => ResultCode::InvalidArguments,
            Self::SlotOccupied { .. } | Self::StateConflict { .. } => ResultCode::RangeOverlapping,
            Self::ReentrantBuild
            | Self::AlreadyCompiled
            | Self::InvalidState(_)
            | Self::NotMaterialized(_)
            | Self::ExecutorNotInitialized(_) => ResultCode::InvalidState,
            Self::CyclicDependency { .. } => ResultCode::CyclicDependency,
            Self::ReadBeforeWrite { .. }
            | Self::ProgramOrderViolation { .. }
            | Self::Callback { .. } => ResultCode::ValidationFailed,
            Self::NotImplemented(_) => ResultCode::NotImplemented,
            Self::Backend(_) => ResultCode::BackendFailure,
        }
    }

    /// Helper for execute callbacks reporting their own failures.
    pub fn callback(pass: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Callback {
            pass: pass.into(),
            message: message.into(),
        }
    }
}
