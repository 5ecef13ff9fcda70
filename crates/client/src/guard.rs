//! Route guard: pure navigation decisions over session state.
//!
//! Rules are checked in order and the first match wins:
//!
//! 1. session still loading: show a loading indicator
//! 2. route needs a session and there is none: go to `/login`
//! 3. password change pending: go to `/change-password` (unless the route
//!    allows it)
//! 4. route needs an admin: go to `/unauthorized`
//! 5. route needs an active account and it is inactive: go to `/dashboard`
//! 6. allow

use eventdesk_core::SessionStatus;

pub const LOGIN_PATH: &str = "/login";
pub const CHANGE_PASSWORD_PATH: &str = "/change-password";
pub const UNAUTHORIZED_PATH: &str = "/unauthorized";
pub const DASHBOARD_PATH: &str = "/dashboard";

/// The parts of a session the guard looks at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[allow(clippy::struct_excessive_bools)]
pub struct SessionSnapshot {
    pub status: SessionStatus,
    pub authenticated: bool,
    pub is_admin: bool,
    pub is_active: bool,
    pub requires_password_change: bool,
}

/// Access requirements of a route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[allow(clippy::struct_excessive_bools)]
pub struct RouteRequirements {
    pub require_auth: bool,
    pub require_admin: bool,
    pub require_active: bool,
    pub allow_during_password_change: bool,
}

impl RouteRequirements {
    /// Open to everyone.
    pub const PUBLIC: Self = Self {
        require_auth: false,
        require_admin: false,
        require_active: false,
        allow_during_password_change: false,
    };

    /// Signed-in users. Protected routes need an active account unless
    /// relaxed with [`Self::allow_inactive`].
    pub const PROTECTED: Self = Self {
        require_auth: true,
        require_admin: false,
        require_active: true,
        allow_during_password_change: false,
    };

    /// Signed-in admins.
    pub const ADMIN: Self = Self {
        require_auth: true,
        require_admin: true,
        require_active: true,
        allow_during_password_change: false,
    };

    #[must_use]
    pub const fn allow_inactive(self) -> Self {
        Self {
            require_active: false,
            ..self
        }
    }

    #[must_use]
    pub const fn allow_during_password_change(self) -> Self {
        Self {
            allow_during_password_change: true,
            ..self
        }
    }
}

/// Outcome of a guard check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardDecision {
    /// Render the requested route.
    Allow,
    /// Session not resolved yet.
    ShowLoading,
    /// Navigate to `to`; `return_to` is where to come back afterwards.
    Redirect {
        to: String,
        return_to: Option<String>,
    },
}

impl GuardDecision {
    fn redirect(to: &str, return_to: Option<&str>) -> Self {
        Self::Redirect {
            to: to.to_string(),
            return_to: return_to.map(str::to_string),
        }
    }
}

/// Decide what happens when `requested_path` is requested.
#[must_use]
pub fn decide(
    session: &SessionSnapshot,
    requirements: &RouteRequirements,
    requested_path: &str,
) -> GuardDecision {
    let path = normalize(requested_path);

    if session.status == SessionStatus::Loading {
        return GuardDecision::ShowLoading;
    }

    if requirements.require_auth && !session.authenticated {
        return GuardDecision::redirect(LOGIN_PATH, Some(requested_path));
    }

    if session.requires_password_change
        && !requirements.allow_during_password_change
        && path != CHANGE_PASSWORD_PATH
    {
        return GuardDecision::redirect(CHANGE_PASSWORD_PATH, Some(requested_path));
    }

    if requirements.require_admin && !session.is_admin {
        return GuardDecision::redirect(UNAUTHORIZED_PATH, None);
    }

    if requirements.require_active
        && !session.is_active
        && !requirements.allow_during_password_change
        && path != DASHBOARD_PATH
    {
        return GuardDecision::redirect(DASHBOARD_PATH, None);
    }

    GuardDecision::Allow
}

/// Strip query, fragment and trailing slashes.
fn normalize(path: &str) -> &str {
    let path = path.split(['?', '#']).next().unwrap_or_default();
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() { "/" } else { trimmed }
}

/// A route pattern such as `/events/:id/edit`.
#[derive(Debug, Clone, PartialEq, Eq)]
struct RoutePattern {
    segments: Vec<String>,
}

impl RoutePattern {
    fn parse(pattern: &str) -> Self {
        Self {
            segments: split_segments(pattern).map(str::to_string).collect(),
        }
    }

    fn matches(&self, path: &str) -> bool {
        let mut parts = split_segments(path);
        for segment in &self.segments {
            match parts.next() {
                Some(part) if segment.starts_with(':') || segment == part => {}
                _ => return false,
            }
        }
        parts.next().is_none()
    }
}

fn split_segments(path: &str) -> impl Iterator<Item = &str> {
    normalize(path).split('/').filter(|s| !s.is_empty())
}

/// Requirements per route pattern. First matching pattern wins; paths no
/// pattern matches are public (the not-found view).
#[derive(Debug, Clone)]
pub struct RouteTable {
    routes: Vec<(RoutePattern, RouteRequirements)>,
}

impl Default for RouteTable {
    /// Routes of the event client.
    fn default() -> Self {
        Self::new()
            .route("/", RouteRequirements::PUBLIC)
            .route("/login", RouteRequirements::PUBLIC)
            .route("/register", RouteRequirements::PUBLIC)
            .route("/unauthorized", RouteRequirements::PUBLIC)
            .route("/search", RouteRequirements::PUBLIC)
            .route("/cart", RouteRequirements::PUBLIC)
            .route("/events", RouteRequirements::PUBLIC)
            .route("/events/create", RouteRequirements::ADMIN)
            .route("/events/:id/edit", RouteRequirements::ADMIN)
            .route("/events/:id", RouteRequirements::PUBLIC)
            .route(
                CHANGE_PASSWORD_PATH,
                RouteRequirements::PROTECTED.allow_during_password_change(),
            )
            .route(DASHBOARD_PATH, RouteRequirements::PROTECTED)
            .route("/my-tickets", RouteRequirements::PROTECTED)
            .route("/checkout", RouteRequirements::PROTECTED)
    }
}

impl RouteTable {
    /// An empty table: everything is public.
    #[must_use]
    pub const fn new() -> Self {
        Self { routes: Vec::new() }
    }

    /// Add a route. Earlier routes take precedence.
    #[must_use]
    pub fn route(mut self, pattern: &str, requirements: RouteRequirements) -> Self {
        self.routes.push((RoutePattern::parse(pattern), requirements));
        self
    }

    /// Requirements of the first route matching `path`.
    #[must_use]
    pub fn requirements(&self, path: &str) -> RouteRequirements {
        self.routes
            .iter()
            .find(|(pattern, _)| pattern.matches(path))
            .map_or(RouteRequirements::PUBLIC, |(_, requirements)| *requirements)
    }

    /// Run the guard for `path` against this table.
    #[must_use]
    pub fn decide(&self, session: &SessionSnapshot, path: &str) -> GuardDecision {
        decide(session, &self.requirements(path), path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ready() -> SessionSnapshot {
        SessionSnapshot {
            status: SessionStatus::Ready,
            authenticated: true,
            is_admin: false,
            is_active: true,
            requires_password_change: false,
        }
    }

    fn redirect(to: &str, return_to: Option<&str>) -> GuardDecision {
        GuardDecision::redirect(to, return_to)
    }

    #[test]
    fn test_loading_shows_loading_first() {
        let session = SessionSnapshot::default();
        assert_eq!(
            decide(&session, &RouteRequirements::ADMIN, "/events/create"),
            GuardDecision::ShowLoading
        );
    }

    #[test]
    fn test_unauthenticated_goes_to_login_with_return_path() {
        let session = SessionSnapshot {
            authenticated: false,
            ..ready()
        };
        assert_eq!(
            decide(&session, &RouteRequirements::PROTECTED, "/my-tickets?page=2"),
            redirect("/login", Some("/my-tickets?page=2"))
        );
        assert_eq!(
            decide(&session, &RouteRequirements::PUBLIC, "/events"),
            GuardDecision::Allow
        );
    }

    #[test]
    fn test_password_change_beats_admin_check() {
        let session = SessionSnapshot {
            is_admin: true,
            requires_password_change: true,
            ..ready()
        };
        let table = RouteTable::default();
        assert_eq!(
            table.decide(&session, "/events/create"),
            redirect("/change-password", Some("/events/create"))
        );
        assert_eq!(table.decide(&session, "/change-password"), GuardDecision::Allow);
    }

    #[test]
    fn test_password_change_applies_to_public_routes() {
        let session = SessionSnapshot {
            requires_password_change: true,
            ..ready()
        };
        assert_eq!(
            RouteTable::default().decide(&session, "/events"),
            redirect("/change-password", Some("/events"))
        );
    }

    #[test]
    fn test_non_admin_goes_to_unauthorized() {
        assert_eq!(
            RouteTable::default().decide(&ready(), "/events/7/edit"),
            redirect("/unauthorized", None)
        );
        let admin = SessionSnapshot {
            is_admin: true,
            ..ready()
        };
        assert_eq!(
            RouteTable::default().decide(&admin, "/events/7/edit"),
            GuardDecision::Allow
        );
    }

    #[test]
    fn test_inactive_user_goes_to_dashboard() {
        let session = SessionSnapshot {
            is_active: false,
            ..ready()
        };
        let table = RouteTable::default();
        assert_eq!(table.decide(&session, "/my-tickets"), redirect("/dashboard", None));
        assert_eq!(table.decide(&session, "/dashboard"), GuardDecision::Allow);
        assert_eq!(table.decide(&session, "/dashboard/"), GuardDecision::Allow);
    }

    #[test]
    fn test_allow_during_password_change_skips_active_check() {
        let session = SessionSnapshot {
            is_active: false,
            ..ready()
        };
        let requirements = RouteRequirements::PROTECTED.allow_during_password_change();
        assert_eq!(
            decide(&session, &requirements, "/change-password"),
            GuardDecision::Allow
        );
        assert_eq!(
            decide(&session, &RouteRequirements::PROTECTED.allow_inactive(), "/profile"),
            GuardDecision::Allow
        );
    }

    #[test]
    fn test_route_table_matching() {
        let table = RouteTable::default();
        assert_eq!(table.requirements("/events/create"), RouteRequirements::ADMIN);
        assert_eq!(table.requirements("/events/42"), RouteRequirements::PUBLIC);
        assert_eq!(table.requirements("/events/42/edit"), RouteRequirements::ADMIN);
        assert_eq!(table.requirements("/checkout?step=2"), RouteRequirements::PROTECTED);
        assert_eq!(table.requirements("/"), RouteRequirements::PUBLIC);
        assert_eq!(table.requirements("/no/such/page"), RouteRequirements::PUBLIC);
    }
}
