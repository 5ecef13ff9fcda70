//! Status enums for various entities.

use serde::{Deserialize, Serialize};

/// Role of an authenticated identity.
///
/// Unknown role strings from the API deserialize as [`Role::User`], so a
/// role added server-side never grants admin access on the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Administrator: manages events, users, and categories.
    Admin,
    /// Regular attendee account.
    #[default]
    #[serde(other)]
    User,
}

impl Role {
    /// Whether this role grants admin access.
    #[must_use]
    pub const fn is_admin(self) -> bool {
        matches!(self, Self::Admin)
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::User => write!(f, "user"),
            Self::Admin => write!(f, "admin"),
        }
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Self::User),
            "admin" => Ok(Self::Admin),
            _ => Err(format!("invalid role: {s}")),
        }
    }
}

/// Lifecycle of the client session.
///
/// `Loading` while a stored token is being resolved into an identity at
/// startup, `Ready` once that resolution finished (successfully or not).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SessionStatus {
    #[default]
    Loading,
    Ready,
}

/// Status of a purchased ticket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TicketStatus {
    #[default]
    Active,
    Used,
    #[serde(alias = "canceled")]
    Cancelled,
}

impl TicketStatus {
    /// Whether the ticket can still be cancelled by its holder.
    #[must_use]
    pub const fn is_cancellable(self) -> bool {
        matches!(self, Self::Active)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_role_serde() {
        assert_eq!(serde_json::to_string(&Role::Admin).unwrap(), "\"admin\"");
        let role: Role = serde_json::from_str("\"admin\"").unwrap();
        assert!(role.is_admin());
        let unknown: Role = serde_json::from_str("\"organizer\"").unwrap();
        assert_eq!(unknown, Role::User);
    }

    #[test]
    fn test_role_from_str() {
        assert_eq!("user".parse::<Role>().unwrap(), Role::User);
        assert!("root".parse::<Role>().is_err());
    }

    #[test]
    fn test_ticket_status_aliases() {
        let status: TicketStatus = serde_json::from_str("\"canceled\"").unwrap();
        assert_eq!(status, TicketStatus::Cancelled);
        assert!(!status.is_cancellable());
        assert!(TicketStatus::Active.is_cancellable());
    }
}
