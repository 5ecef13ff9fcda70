//! Domain models read from the event API.
//!
//! Field names follow the API's JSON. The API mixes `snake_case` (users,
//! events, categories) and `camelCase` (tickets); datetimes may be naive
//! and are read as UTC.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use eventdesk_core::{CategoryId, EventId, Price, Role, TicketId, TicketStatus, UserId};

fn default_true() -> bool {
    true
}

/// A user account as returned by `/users/me` and `/users`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: UserId,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub role: Role,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default, with = "eventdesk_core::timestamp::option")]
    pub created_at: Option<DateTime<Utc>>,
    /// Explicit server statement about a pending password change.
    ///
    /// The current API never sends it; see [`crate::session::first_login`].
    #[serde(
        default,
        alias = "requirePasswordChange",
        skip_serializing_if = "Option::is_none"
    )]
    pub require_password_change: Option<bool>,
}

/// The authenticated identity held by the session.
///
/// Also persisted under the `user` key as a display snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub id: UserId,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub is_active: bool,
    #[serde(default)]
    pub requires_password_change: bool,
}

impl Identity {
    /// Build an identity from a profile and the resolved flags.
    #[must_use]
    pub fn from_profile(profile: UserProfile, is_active: bool, requires_password_change: bool) -> Self {
        Self {
            id: profile.id,
            name: profile.name,
            email: profile.email,
            role: profile.role,
            is_active,
            requires_password_change,
        }
    }

    #[must_use]
    pub const fn is_admin(&self) -> bool {
        self.role.is_admin()
    }
}

/// An event in the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub id: EventId,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(with = "eventdesk_core::timestamp")]
    pub start_date: DateTime<Utc>,
    #[serde(default, with = "eventdesk_core::timestamp::option")]
    pub end_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub capacity: Option<u32>,
    #[serde(default)]
    pub price: Price,
    #[serde(default = "default_true")]
    pub is_published: bool,
    #[serde(default)]
    pub category_id: Option<CategoryId>,
    #[serde(default)]
    pub organizer_id: Option<UserId>,
    /// Tickets sold so far; absent until the first capacity update.
    #[serde(default)]
    pub attendees: Option<u32>,
}

impl Event {
    /// Seats still available, if the event has a capacity.
    #[must_use]
    pub fn remaining_capacity(&self) -> Option<u32> {
        self.capacity
            .map(|capacity| capacity.saturating_sub(self.attendees.unwrap_or(0)))
    }
}

/// An event category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
    #[serde(default)]
    pub color: String,
    #[serde(default)]
    pub icon: Option<String>,
}

/// Event summary embedded in a ticket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketEvent {
    pub id: EventId,
    pub title: String,
    #[serde(with = "eventdesk_core::timestamp")]
    pub date: DateTime<Utc>,
    #[serde(default)]
    pub location: String,
}

/// Who a ticket was issued to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attendee {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
}

/// A purchased ticket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ticket {
    pub id: TicketId,
    pub event: TicketEvent,
    pub quantity: u32,
    #[serde(default)]
    pub ticket_type: String,
    pub total_price: Price,
    pub status: TicketStatus,
    #[serde(with = "eventdesk_core::timestamp")]
    pub purchase_date: DateTime<Utc>,
    pub attendee: Attendee,
}
