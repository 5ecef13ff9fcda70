//! Authentication error types.

use thiserror::Error;

use crate::storage::StorageError;

/// Errors from session operations.
#[derive(Debug, Error)]
pub enum AuthError {
    /// The server rejected the email/password pair.
    #[error("Invalid email or password")]
    InvalidCredentials,

    /// Signed in, but the account is deactivated.
    #[error("Your account is inactive. Please contact an administrator.")]
    AccountInactive,

    /// The bearer token is no longer accepted; the session was torn down.
    #[error("Your session has expired. Please sign in again.")]
    SessionExpired,

    /// The operation needs a signed-in user.
    #[error("Not authenticated")]
    NotAuthenticated,

    /// The signed-in user lacks the required role.
    #[error("You do not have permission to perform this action")]
    Forbidden,

    /// Email address failed validation.
    #[error("Invalid email address: {0}")]
    InvalidEmail(#[from] eventdesk_core::EmailError),

    /// Password and confirmation differ.
    #[error("Passwords do not match")]
    PasswordMismatch,

    /// Any other failed request, with a message fit for display.
    #[error("{message}")]
    Request { message: String },

    /// Local storage could not be read or written.
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

impl AuthError {
    pub(crate) fn request(message: impl Into<String>) -> Self {
        Self::Request {
            message: message.into(),
        }
    }
}
