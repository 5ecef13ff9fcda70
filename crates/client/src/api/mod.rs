//! Event API client.
//!
//! # Architecture
//!
//! - [`EventApi`] is the seam every store talks to; stores are generic over
//!   it so tests can inject [`mock::MockApi`]
//! - [`HttpApi`] is the production implementation over `reqwest`
//! - Category and event listings are cached in memory via `moka` (60 second
//!   TTL) and invalidated by any event or category write
//! - A `401` from any endpoint surfaces as [`ApiError::Unauthorized`]; the
//!   session store decides what that means
//!
//! # Example
//!
//! ```rust,ignore
//! use eventdesk_client::api::{EventApi, HttpApi};
//!
//! let api = HttpApi::new(&config)?;
//! let events = api.events(0, 20).await?;
//! let hits = api.search_events("jazz").await?;
//! ```

mod http;
#[cfg(any(test, feature = "test-util"))]
pub mod mock;
pub mod types;

pub use http::HttpApi;
pub use types::*;

use std::future::Future;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use thiserror::Error;

use eventdesk_core::{CategoryId, Email, EventId, TicketId, UserId};

use crate::models::{Category, Event, Ticket, UserProfile};

/// Errors that can occur when calling the event API.
#[derive(Debug, Error)]
pub enum ApiError {
    /// HTTP request failed before a response arrived.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The server rejected the bearer token (or the credentials).
    #[error("Unauthorized")]
    Unauthorized,

    /// API returned a non-success status.
    #[error("API error: {status}{}", detail_suffix(.detail.as_deref()))]
    Status { status: u16, detail: Option<String> },

    /// Response body did not match the expected shape.
    #[error("Decode error: {0}")]
    Decode(String),

    /// Endpoint URL could not be built.
    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),
}

fn detail_suffix(detail: Option<&str>) -> String {
    detail.map_or_else(String::new, |d| format!(" - {d}"))
}

impl ApiError {
    /// HTTP status of the failure, if the server answered.
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Unauthorized => Some(401),
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    #[must_use]
    pub const fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Unauthorized)
    }

    /// Message the server gave for the failure, if any.
    #[must_use]
    pub fn server_message(&self) -> Option<&str> {
        match self {
            Self::Status { detail, .. } => detail.as_deref(),
            _ => None,
        }
    }

    /// Server message, or `fallback` when the server gave none.
    #[must_use]
    pub fn message_or(&self, fallback: &str) -> String {
        self.server_message().unwrap_or(fallback).to_string()
    }
}

/// Extract a human-readable message from an error payload.
///
/// Looks at `message`, then `detail`. A `detail` list (validation errors)
/// is joined from the `msg` fields of its entries.
#[must_use]
pub fn error_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    if let Some(message) = value.get("message").and_then(|m| m.as_str()) {
        return Some(message.to_string());
    }
    match value.get("detail")? {
        serde_json::Value::String(detail) => Some(detail.clone()),
        serde_json::Value::Array(entries) => {
            let joined = entries
                .iter()
                .filter_map(|entry| entry.get("msg").and_then(|m| m.as_str()))
                .collect::<Vec<_>>()
                .join("; ");
            (!joined.is_empty()).then_some(joined)
        }
        _ => None,
    }
}

/// Bearer token issued at login.
///
/// Implements `Debug` manually to redact the token.
#[derive(Clone)]
pub struct AuthToken(SecretString);

impl std::fmt::Debug for AuthToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("AuthToken([REDACTED])")
    }
}

#[derive(Deserialize)]
struct JwtClaims {
    exp: Option<i64>,
}

impl AuthToken {
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self(SecretString::from(token.into()))
    }

    /// The raw token, for the `Authorization` header and storage.
    #[must_use]
    pub fn expose(&self) -> &str {
        self.0.expose_secret()
    }

    /// Expiry encoded in the token, if it is a JWT carrying `exp`.
    ///
    /// The signature is not checked; the server remains the authority.
    #[must_use]
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        let payload = self.expose().split('.').nth(1)?;
        let bytes = URL_SAFE_NO_PAD
            .decode(payload.trim_end_matches('='))
            .ok()?;
        let claims: JwtClaims = serde_json::from_slice(&bytes).ok()?;
        DateTime::from_timestamp(claims.exp?, 0)
    }

    /// Whether the token is known to have expired at `now`.
    ///
    /// Tokens without a readable expiry are never considered expired.
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at().is_some_and(|exp| exp <= now)
    }
}

/// Operations of the event API used by the client.
///
/// Authenticated calls take the bearer token explicitly; the API handle
/// itself holds no session state.
pub trait EventApi: Send + Sync {
    // -- auth --------------------------------------------------------------

    /// Exchange credentials for a token.
    fn login(
        &self,
        email: &str,
        password: &SecretString,
    ) -> impl Future<Output = Result<LoginResponse, ApiError>> + Send;

    fn register(
        &self,
        request: &RegisterRequest,
    ) -> impl Future<Output = Result<UserProfile, ApiError>> + Send;

    fn change_password(
        &self,
        token: &AuthToken,
        current: &SecretString,
        new: &SecretString,
    ) -> impl Future<Output = Result<(), ApiError>> + Send;

    fn reset_password(&self, email: &Email) -> impl Future<Output = Result<(), ApiError>> + Send;

    // -- users -------------------------------------------------------------

    fn me(&self, token: &AuthToken) -> impl Future<Output = Result<UserProfile, ApiError>> + Send;

    fn update_me(
        &self,
        token: &AuthToken,
        update: &ProfileUpdate,
    ) -> impl Future<Output = Result<UserProfile, ApiError>> + Send;

    fn users(
        &self,
        token: &AuthToken,
        skip: u32,
        limit: u32,
    ) -> impl Future<Output = Result<Vec<UserProfile>, ApiError>> + Send;

    fn set_user_active(
        &self,
        token: &AuthToken,
        id: UserId,
        active: bool,
    ) -> impl Future<Output = Result<UserProfile, ApiError>> + Send;

    fn delete_user(
        &self,
        token: &AuthToken,
        id: UserId,
    ) -> impl Future<Output = Result<(), ApiError>> + Send;

    // -- events ------------------------------------------------------------

    fn events(
        &self,
        skip: u32,
        limit: u32,
    ) -> impl Future<Output = Result<Vec<Event>, ApiError>> + Send;

    fn event(&self, id: EventId) -> impl Future<Output = Result<Event, ApiError>> + Send;

    fn search_events(&self, term: &str)
    -> impl Future<Output = Result<Vec<Event>, ApiError>> + Send;

    fn create_event(
        &self,
        token: &AuthToken,
        payload: &EventPayload,
    ) -> impl Future<Output = Result<Event, ApiError>> + Send;

    fn update_event(
        &self,
        token: &AuthToken,
        id: EventId,
        payload: &EventPayload,
    ) -> impl Future<Output = Result<Event, ApiError>> + Send;

    /// Record the number of tickets sold for an event.
    fn update_event_attendees(
        &self,
        token: &AuthToken,
        id: EventId,
        attendees: u32,
    ) -> impl Future<Output = Result<Event, ApiError>> + Send;

    fn delete_event(
        &self,
        token: &AuthToken,
        id: EventId,
    ) -> impl Future<Output = Result<(), ApiError>> + Send;

    // -- orders & tickets --------------------------------------------------

    fn create_order(
        &self,
        token: &AuthToken,
        order: &OrderRequest,
    ) -> impl Future<Output = Result<OrderResponse, ApiError>> + Send;

    fn my_tickets(
        &self,
        token: &AuthToken,
    ) -> impl Future<Output = Result<Vec<Ticket>, ApiError>> + Send;

    fn cancel_ticket(
        &self,
        token: &AuthToken,
        id: TicketId,
    ) -> impl Future<Output = Result<(), ApiError>> + Send;

    // -- categories & admin ------------------------------------------------

    fn categories(&self) -> impl Future<Output = Result<Vec<Category>, ApiError>> + Send;

    fn create_category(
        &self,
        token: &AuthToken,
        payload: &CategoryPayload,
    ) -> impl Future<Output = Result<Category, ApiError>> + Send;

    fn update_category(
        &self,
        token: &AuthToken,
        id: CategoryId,
        payload: &CategoryPayload,
    ) -> impl Future<Output = Result<Category, ApiError>> + Send;

    fn delete_category(
        &self,
        token: &AuthToken,
        id: CategoryId,
    ) -> impl Future<Output = Result<(), ApiError>> + Send;

    /// Dashboard counters, passed through untyped.
    fn admin_stats(
        &self,
        token: &AuthToken,
    ) -> impl Future<Output = Result<serde_json::Value, ApiError>> + Send;
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Duration;

    use super::*;

    fn jwt_with(claims: &serde_json::Value) -> AuthToken {
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
        let payload = URL_SAFE_NO_PAD.encode(serde_json::to_vec(claims).unwrap());
        AuthToken::new(format!("{header}.{payload}.signature"))
    }

    #[test]
    fn test_error_message_prefers_message_then_detail() {
        assert_eq!(
            error_message(r#"{"message": "Bad things", "detail": "ignored"}"#).as_deref(),
            Some("Bad things")
        );
        assert_eq!(
            error_message(r#"{"detail": "Email already registered"}"#).as_deref(),
            Some("Email already registered")
        );
        assert_eq!(
            error_message(r#"{"detail": [{"msg": "field required"}, {"msg": "too short"}]}"#)
                .as_deref(),
            Some("field required; too short")
        );
        assert!(error_message("<html>502</html>").is_none());
        assert!(error_message(r#"{"detail": []}"#).is_none());
    }

    #[test]
    fn test_api_error_messages() {
        let err = ApiError::Status {
            status: 400,
            detail: Some("Email already registered".to_string()),
        };
        assert_eq!(err.status(), Some(400));
        assert_eq!(err.to_string(), "API error: 400 - Email already registered");
        assert_eq!(err.message_or("Registration failed"), "Email already registered");

        let bare = ApiError::Status {
            status: 500,
            detail: None,
        };
        assert_eq!(bare.to_string(), "API error: 500");
        assert_eq!(bare.message_or("Registration failed"), "Registration failed");
        assert!(ApiError::Unauthorized.is_unauthorized());
    }

    #[test]
    fn test_token_debug_is_redacted() {
        let token = AuthToken::new("super-secret");
        assert_eq!(format!("{token:?}"), "AuthToken([REDACTED])");
        assert_eq!(token.expose(), "super-secret");
    }

    #[test]
    fn test_token_expiry() {
        let now = Utc::now();
        let expired = jwt_with(&serde_json::json!({"sub": "1", "exp": (now - Duration::minutes(5)).timestamp()}));
        assert!(expired.is_expired_at(now));

        let fresh = jwt_with(&serde_json::json!({"sub": "1", "exp": (now + Duration::hours(1)).timestamp()}));
        assert!(!fresh.is_expired_at(now));

        let no_exp = jwt_with(&serde_json::json!({"sub": "1"}));
        assert!(no_exp.expires_at().is_none());
        assert!(!no_exp.is_expired_at(now));

        assert!(!AuthToken::new("opaque-token").is_expired_at(now));
    }
}
