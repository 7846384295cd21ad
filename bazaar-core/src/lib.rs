pub mod actor;
pub mod carrier;
pub mod gateway;

/// Error taxonomy shared by every crate in the workspace. Leaf crates keep
/// their own `thiserror` enums and convert at the seam.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    #[error("{service} upstream failure: {message}")]
    Upstream { service: String, message: String },
    #[error("internal error: {0}")]
    Internal(String),
}

impl CoreError {
    pub fn upstream(service: impl Into<String>, message: impl Into<String>) -> Self {
        CoreError::Upstream {
            service: service.into(),
            message: message.into(),
        }
    }
}

pub type CoreResult<T> = Result<T, CoreError>;
