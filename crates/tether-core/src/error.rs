//! # Error Types
//!
//! Errors raised by the target model, the command protocol and backend
//! adapters.
//!
//! We use `thiserror` to derive `Error` and the display messages. The display
//! strings matter: a background command reports a failed operation's message
//! verbatim as its status, so [`ModelError::BackendFailure`] renders as the
//! bare backend message.

use thiserror::Error;

use crate::types::TargetPath;

/// Main error type for model operations
///
/// ## Error Categories
///
/// 1. **Synchronous rejections**: `InvalidArgument`, `NotFound`, `Unsupported`.
///    These are returned before any backend call is made and never travel
///    through an [`Operation`](crate::operation::Operation).
/// 2. **Asynchronous outcomes**: `BackendFailure`, `Cancelled`, `ObjectGone`,
///    `Disconnected`. These arrive as the failure of an operation.
/// 3. **Waiting aborted**: `Interrupted`. Only the waiting unit stops; the
///    underlying operation keeps running unless it is cancelled explicitly.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ModelError
{
    /// Schema validation failed, or an argument could not be parsed
    ///
    /// Examples:
    /// - A required launch parameter is missing
    /// - A breakpoint location is not in the backend's address notation
    /// - A watchpoint length the backend cannot honour
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// No object at a path, or no object in scope with the needed capability
    #[error("Not found: {0}")]
    NotFound(String),

    /// The object was removed or detached while a wait was pending
    ///
    /// Pending [`AsyncState`](crate::async_state::AsyncState) waiters fail
    /// with this error so that waiting never outlives the object.
    #[error("Object is gone: {0}")]
    ObjectGone(TargetPath),

    /// The backend reported a failure that is not a cancellation
    #[error("{0}")]
    BackendFailure(String),

    /// The operation was cancelled before it completed
    #[error("Cancelled")]
    Cancelled,

    /// The waiting side was interrupted; the operation itself was not cancelled
    #[error("Interrupted")]
    Interrupted,

    /// The call is deliberately not supported by this component
    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    /// The backend driver went away
    #[error("Backend disconnected")]
    Disconnected,
}

impl ModelError
{
    /// Convenience constructor for backend failures.
    pub fn backend(message: impl Into<String>) -> Self
    {
        Self::BackendFailure(message.into())
    }

    /// Whether this error represents a requested cancellation.
    #[must_use]
    pub fn is_cancellation(&self) -> bool
    {
        matches!(self, Self::Cancelled)
    }

    /// Whether this error is raised synchronously, before dispatch.
    #[must_use]
    pub fn is_rejection(&self) -> bool
    {
        matches!(self, Self::InvalidArgument(_) | Self::NotFound(_) | Self::Unsupported(_))
    }
}

/// Convenience type alias for `Result<T, ModelError>`
///
/// ```rust
/// use tether_core::error::ModelResult;
/// fn foo() -> ModelResult<()>
/// {
///     Ok(())
/// }
/// ```
pub type ModelResult<T> = std::result::Result<T, ModelError>;
