//! Unified error handling with Sentry integration.
//!
//! Every store has its own error type; `ClientError` gathers them for front
//! ends that drive several stores. [`ClientError::report`] sends unexpected
//! failures to Sentry and logs them.

use thiserror::Error;

use eventdesk_core::ValidationErrors;

use crate::admin::AdminError;
use crate::api::ApiError;
use crate::cart::CartError;
use crate::checkout::CheckoutError;
use crate::config::ConfigError;
use crate::models::Identity;
use crate::session::AuthError;
use crate::storage::StorageError;

/// Client-level error type.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Cart(#[from] CartError),

    #[error(transparent)]
    Checkout(#[from] CheckoutError),

    #[error(transparent)]
    Validation(#[from] ValidationErrors),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl From<AdminError> for ClientError {
    fn from(err: AdminError) -> Self {
        match err {
            AdminError::Invalid(errors) => Self::Validation(errors),
            AdminError::Auth(err) => Self::Auth(err),
        }
    }
}

impl ClientError {
    /// Whether this is a bug or outage rather than something the user can
    /// fix.
    #[must_use]
    pub const fn is_unexpected(&self) -> bool {
        match self {
            Self::Config(_) | Self::Storage(_) => true,
            Self::Api(err) => !matches!(err, ApiError::Unauthorized),
            Self::Cart(err) => matches!(err, CartError::Storage(_)),
            Self::Auth(err) => matches!(err, AuthError::Storage(_)),
            Self::Checkout(_) | Self::Validation(_) => false,
        }
    }

    /// Message fit for display.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Storage(_) | Self::Cart(CartError::Storage(_)) | Self::Auth(AuthError::Storage(_)) => {
                "Could not access local data".to_string()
            }
            Self::Api(err) => err.message_or("Request failed"),
            Self::Validation(errors) => errors
                .iter()
                .map(|e| e.message.as_str())
                .collect::<Vec<_>>()
                .join("\n"),
            _ => self.to_string(),
        }
    }

    /// Capture unexpected errors to Sentry and log every error.
    pub fn report(&self) {
        if self.is_unexpected() {
            let event_id = sentry::capture_error(self);
            tracing::error!(error = %self, sentry_event_id = %event_id, "Client error");
        } else {
            tracing::warn!(error = %self, "Operation failed");
        }
    }
}

/// Result type alias for `ClientError`.
pub type Result<T> = std::result::Result<T, ClientError>;

/// Associate subsequent Sentry events with the signed-in user.
pub fn set_sentry_user(identity: &Identity) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(identity.id.to_string()),
            email: Some(identity.email.clone()),
            ..Default::default()
        }));
    });
}

/// Clear the Sentry user context.
pub fn clear_sentry_user() {
    sentry::configure_scope(|scope| {
        scope.set_user(None);
    });
}

/// Add a breadcrumb for a user action.
///
/// Breadcrumbs show up in Sentry reports as the trail leading to an error.
pub fn add_breadcrumb(category: &str, message: &str, data: &[(&str, &str)]) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };
    for (key, value) in data {
        breadcrumb.data.insert(
            (*key).to_string(),
            serde_json::Value::String((*value).to_string()),
        );
    }
    sentry::add_breadcrumb(breadcrumb);
}
