//! Request and response bodies of the event API.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use eventdesk_core::{CategoryId, EventDraft, EventId, Role, UserId};

/// Response of `POST /auth/login`.
///
/// Older deployments return the token as `token` instead of `access_token`.
#[derive(Debug, Clone, Deserialize)]
pub struct LoginResponse {
    #[serde(alias = "token")]
    pub access_token: String,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub user_id: Option<UserId>,
    #[serde(default)]
    pub role: Option<Role>,
    #[serde(default)]
    pub is_active: Option<bool>,
}

/// Body of `POST /auth/register`.
#[derive(Debug, Clone, Serialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    pub role: Role,
}

/// Partial update sent to `PUT /users/me`.
///
/// Only fields that are set are serialized.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProfileUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(
        rename = "requirePasswordChange",
        skip_serializing_if = "Option::is_none"
    )]
    pub require_password_change: Option<bool>,
}

impl ProfileUpdate {
    /// Update completing the first-login password change.
    #[must_use]
    pub fn first_password(password: impl Into<String>) -> Self {
        Self {
            password: Some(password.into()),
            require_password_change: Some(false),
            ..Self::default()
        }
    }
}

/// Body of `POST /events` and `PUT /events/{id}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EventPayload {
    pub title: String,
    pub description: String,
    #[serde(with = "eventdesk_core::timestamp")]
    pub start_date: DateTime<Utc>,
    #[serde(with = "eventdesk_core::timestamp")]
    pub end_date: DateTime<Utc>,
    pub location: String,
    pub address: String,
    pub capacity: Option<u32>,
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
    pub is_published: bool,
    pub category_id: Option<CategoryId>,
}

impl EventPayload {
    /// Payload for a validated draft. Returns `None` if the draft has no
    /// start date or time.
    #[must_use]
    pub fn from_draft(draft: &EventDraft) -> Option<Self> {
        let (start_date, end_date) = draft.schedule()?;
        Some(Self {
            title: draft.title.trim().to_string(),
            description: draft.description.trim().to_string(),
            start_date,
            end_date,
            location: draft.location.trim().to_string(),
            address: draft.address.trim().to_string(),
            capacity: draft.capacity,
            price: draft.effective_price(),
            is_published: true,
            category_id: draft.category_id,
        })
    }
}

/// Partial event update carrying only the attendee count.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct AttendeesUpdate {
    pub attendees: u32,
}

/// Body of `POST /categories` and `PUT /categories/{id}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryPayload {
    pub name: String,
    pub color: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
}

/// One line of an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderItem {
    #[serde(rename = "eventId")]
    pub event_id: EventId,
    pub quantity: u32,
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
}

/// Buyer details attached to an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CustomerInfo {
    pub name: String,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

/// Body of `POST /orders`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderRequest {
    pub items: Vec<OrderItem>,
    pub customer: CustomerInfo,
    #[serde(with = "rust_decimal::serde::float")]
    pub total: Decimal,
}

/// Order identifier as issued by the server: integer or string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OrderId {
    Number(i64),
    Text(String),
}

impl std::fmt::Display for OrderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::Text(s) => write!(f, "{s}"),
        }
    }
}

/// Response of `POST /orders`. Only the id is used by the client.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OrderResponse {
    #[serde(default)]
    pub id: Option<OrderId>,
    #[serde(default)]
    pub status: Option<String>,
}
