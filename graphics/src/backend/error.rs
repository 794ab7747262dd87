//! Backend error types.

use thiserror::Error;

/// Errors reported by a GPU backend.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    #[error("resource creation failed: {0}")]
    ResourceCreationFailed(String),
    #[error("out of GPU memory")]
    OutOfMemory,
    #[error("GPU device lost")]
    DeviceLost,
    #[error("submission failed: {0}")]
    SubmissionFailed(String),
    #[error("presentation failed: {0}")]
    PresentFailed(String),
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
}

pub type BackendResult<T> = Result<T, BackendError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(BackendError::OutOfMemory.to_string(), "out of GPU memory");
        assert_eq!(
            BackendError::ResourceCreationFailed("bad format".into()).to_string(),
            "resource creation failed: bad format"
        );
    }
}
