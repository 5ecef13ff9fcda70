//! Admin console: event, user and category management.
//!
//! Every operation requires a signed-in admin and fails with
//! `AuthError::Forbidden` before any request otherwise. Event drafts are
//! validated locally and never sent while a rule fails.

use chrono::{NaiveDate, Utc};
use thiserror::Error;
use tracing::{info, instrument};

use eventdesk_core::{CategoryId, EventDraft, EventId, UserId, ValidationErrors};

use crate::api::{CategoryPayload, EventApi, EventPayload};
use crate::models::{Category, Event, UserProfile};
use crate::session::{AuthError, SessionStore};
use crate::storage::LocalStorage;

/// Errors from admin operations.
#[derive(Debug, Error)]
pub enum AdminError {
    /// The form has field errors; nothing was sent.
    #[error(transparent)]
    Invalid(#[from] ValidationErrors),

    #[error(transparent)]
    Auth(#[from] AuthError),
}

/// Admin operations over an [`EventApi`].
#[derive(Debug, Clone)]
pub struct AdminConsole<A> {
    api: A,
}

impl<A: EventApi> AdminConsole<A> {
    #[must_use]
    pub const fn new(api: A) -> Self {
        Self { api }
    }

    // =========================================================================
    // Events
    // =========================================================================

    /// Validate `draft` and create the event.
    ///
    /// # Errors
    ///
    /// `Auth(Forbidden)` for non-admins, `Invalid` when a rule fails,
    /// `Auth(SessionExpired)` on `401`, and `Auth(Request)` otherwise.
    #[instrument(skip_all, fields(title = %draft.title))]
    pub async fn create_event<S: LocalStorage>(
        &self,
        session: &mut SessionStore<A, S>,
        draft: &EventDraft,
    ) -> Result<Event, AdminError> {
        let token = session.admin_token()?;
        let payload = payload_from(draft, today())?;

        let event = self
            .api
            .create_event(&token, &payload)
            .await
            .map_err(|e| session.api_failure(e, "Failed to create event"))?;
        info!(event_id = %event.id, "Event created");
        Ok(event)
    }

    /// Validate `draft` and replace event `id` with it.
    ///
    /// # Errors
    ///
    /// As [`Self::create_event`].
    #[instrument(skip(self, session, draft))]
    pub async fn update_event<S: LocalStorage>(
        &self,
        session: &mut SessionStore<A, S>,
        id: EventId,
        draft: &EventDraft,
    ) -> Result<Event, AdminError> {
        let token = session.admin_token()?;
        let payload = payload_from(draft, today())?;

        let event = self
            .api
            .update_event(&token, id, &payload)
            .await
            .map_err(|e| session.api_failure(e, "Failed to update event"))?;
        info!(event_id = %id, "Event updated");
        Ok(event)
    }

    /// # Errors
    ///
    /// `Auth(Forbidden)` for non-admins and `Auth` for failed requests.
    #[instrument(skip(self, session))]
    pub async fn delete_event<S: LocalStorage>(
        &self,
        session: &mut SessionStore<A, S>,
        id: EventId,
    ) -> Result<(), AdminError> {
        let token = session.admin_token()?;
        self.api
            .delete_event(&token, id)
            .await
            .map_err(|e| session.api_failure(e, "Failed to delete event"))?;
        info!(event_id = %id, "Event deleted");
        Ok(())
    }

    // =========================================================================
    // Users
    // =========================================================================

    /// # Errors
    ///
    /// `Auth(Forbidden)` for non-admins and `Auth` for failed requests.
    #[instrument(skip(self, session))]
    pub async fn users<S: LocalStorage>(
        &self,
        session: &mut SessionStore<A, S>,
        skip: u32,
        limit: u32,
    ) -> Result<Vec<UserProfile>, AdminError> {
        let token = session.admin_token()?;
        Ok(self
            .api
            .users(&token, skip, limit)
            .await
            .map_err(|e| session.api_failure(e, "Failed to load users"))?)
    }

    /// Activate or deactivate an account.
    ///
    /// # Errors
    ///
    /// `Auth(Forbidden)` for non-admins and `Auth` for failed requests.
    #[instrument(skip(self, session))]
    pub async fn set_user_active<S: LocalStorage>(
        &self,
        session: &mut SessionStore<A, S>,
        id: UserId,
        active: bool,
    ) -> Result<UserProfile, AdminError> {
        let token = session.admin_token()?;
        let profile = self
            .api
            .set_user_active(&token, id, active)
            .await
            .map_err(|e| session.api_failure(e, "Failed to update user"))?;
        info!(user_id = %id, active, "User activation changed");
        Ok(profile)
    }

    /// # Errors
    ///
    /// `Auth(Forbidden)` for non-admins and `Auth` for failed requests.
    #[instrument(skip(self, session))]
    pub async fn delete_user<S: LocalStorage>(
        &self,
        session: &mut SessionStore<A, S>,
        id: UserId,
    ) -> Result<(), AdminError> {
        let token = session.admin_token()?;
        self.api
            .delete_user(&token, id)
            .await
            .map_err(|e| session.api_failure(e, "Failed to delete user"))?;
        info!(user_id = %id, "User deleted");
        Ok(())
    }

    // =========================================================================
    // Categories
    // =========================================================================

    /// # Errors
    ///
    /// `Auth(Forbidden)` for non-admins and `Auth` for failed requests.
    pub async fn categories<S: LocalStorage>(
        &self,
        session: &mut SessionStore<A, S>,
    ) -> Result<Vec<Category>, AdminError> {
        session.admin_token()?;
        Ok(self
            .api
            .categories()
            .await
            .map_err(|e| session.api_failure(e, "Failed to load categories"))?)
    }

    /// # Errors
    ///
    /// `Auth(Forbidden)` for non-admins and `Auth` for failed requests.
    #[instrument(skip(self, session))]
    pub async fn create_category<S: LocalStorage>(
        &self,
        session: &mut SessionStore<A, S>,
        payload: &CategoryPayload,
    ) -> Result<Category, AdminError> {
        let token = session.admin_token()?;
        Ok(self
            .api
            .create_category(&token, payload)
            .await
            .map_err(|e| session.api_failure(e, "Failed to create category"))?)
    }

    /// # Errors
    ///
    /// `Auth(Forbidden)` for non-admins and `Auth` for failed requests.
    #[instrument(skip(self, session))]
    pub async fn update_category<S: LocalStorage>(
        &self,
        session: &mut SessionStore<A, S>,
        id: CategoryId,
        payload: &CategoryPayload,
    ) -> Result<Category, AdminError> {
        let token = session.admin_token()?;
        Ok(self
            .api
            .update_category(&token, id, payload)
            .await
            .map_err(|e| session.api_failure(e, "Failed to update category"))?)
    }

    /// # Errors
    ///
    /// `Auth(Forbidden)` for non-admins and `Auth` for failed requests.
    #[instrument(skip(self, session))]
    pub async fn delete_category<S: LocalStorage>(
        &self,
        session: &mut SessionStore<A, S>,
        id: CategoryId,
    ) -> Result<(), AdminError> {
        let token = session.admin_token()?;
        Ok(self
            .api
            .delete_category(&token, id)
            .await
            .map_err(|e| session.api_failure(e, "Failed to delete category"))?)
    }

    /// Dashboard counters.
    ///
    /// # Errors
    ///
    /// `Auth(Forbidden)` for non-admins and `Auth` for failed requests.
    pub async fn stats<S: LocalStorage>(
        &self,
        session: &mut SessionStore<A, S>,
    ) -> Result<serde_json::Value, AdminError> {
        let token = session.admin_token()?;
        Ok(self
            .api
            .admin_stats(&token)
            .await
            .map_err(|e| session.api_failure(e, "Failed to load statistics"))?)
    }
}

fn today() -> NaiveDate {
    Utc::now().date_naive()
}

/// Validate `draft` against `today` and build the request body.
fn payload_from(draft: &EventDraft, today: NaiveDate) -> Result<EventPayload, ValidationErrors> {
    draft.validate(today)?;
    EventPayload::from_draft(draft).ok_or_else(|| {
        let mut errors = ValidationErrors::default();
        errors.push("start_date", "Start date is required");
        errors
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use chrono::{Duration, NaiveTime};
    use eventdesk_core::Role;
    use rust_decimal::Decimal;
    use secrecy::SecretString;

    use super::*;
    use crate::api::mock::MockApi;
    use crate::storage::MemoryStorage;

    type Session = SessionStore<MockApi, MemoryStorage>;

    async fn session_for(api: &MockApi, role: Role) -> Session {
        let email = format!("{role:?}@example.com").to_lowercase();
        api.add_user("Grace", &email, "secret1", role, true);
        let mut session = SessionStore::new(api.clone(), Arc::new(MemoryStorage::new()));
        session.initialize().await;
        session
            .login(&email, SecretString::from("secret1"), false)
            .await
            .unwrap();
        session
    }

    fn draft() -> EventDraft {
        EventDraft {
            title: "Rust Meetup".to_string(),
            description: "An evening of talks about async Rust.".to_string(),
            start_date: Some(today() + Duration::days(30)),
            start_time: NaiveTime::from_hms_opt(18, 30, 0),
            location: "Main Hall".to_string(),
            address: "1 Market St".to_string(),
            category_id: Some(CategoryId::new(2)),
            capacity: Some(120),
            is_free: false,
            price: Some(Decimal::new(1500, 2)),
        }
    }

    #[tokio::test]
    async fn test_non_admin_is_forbidden_without_request() {
        let api = MockApi::new();
        let mut session = session_for(&api, Role::User).await;
        let console = AdminConsole::new(api.clone());
        let before = api.calls().len();

        let err = console.create_event(&mut session, &draft()).await.unwrap_err();
        assert!(matches!(err, AdminError::Auth(AuthError::Forbidden)));
        let err = console.stats(&mut session).await.unwrap_err();
        assert!(matches!(err, AdminError::Auth(AuthError::Forbidden)));

        assert_eq!(api.calls().len(), before);
    }

    #[tokio::test]
    async fn test_signed_out_is_not_authenticated() {
        let api = MockApi::new();
        let mut session = SessionStore::new(api.clone(), Arc::new(MemoryStorage::new()));
        session.initialize().await;

        let err = AdminConsole::new(api)
            .users(&mut session, 0, 10)
            .await
            .unwrap_err();
        assert!(matches!(err, AdminError::Auth(AuthError::NotAuthenticated)));
    }

    #[tokio::test]
    async fn test_invalid_draft_blocks_submission() {
        let api = MockApi::new();
        let mut session = session_for(&api, Role::Admin).await;
        let console = AdminConsole::new(api.clone());

        let bad = EventDraft {
            title: "Hey".to_string(),
            capacity: Some(0),
            ..draft()
        };
        let AdminError::Invalid(errors) = console.create_event(&mut session, &bad).await.unwrap_err()
        else {
            panic!("expected validation errors");
        };
        assert_eq!(
            errors.get("title"),
            Some("Title should be at least 5 characters long")
        );
        assert_eq!(errors.get("capacity"), Some("Capacity must be at least 1"));
        assert_eq!(api.call_count("create_event"), 0);
    }

    #[tokio::test]
    async fn test_event_lifecycle() {
        let api = MockApi::new();
        let mut session = session_for(&api, Role::Admin).await;
        let console = AdminConsole::new(api.clone());

        let created = console.create_event(&mut session, &draft()).await.unwrap();
        assert_eq!(created.title, "Rust Meetup");
        assert_eq!(created.capacity, Some(120));
        assert_eq!(created.price.amount(), Decimal::new(1500, 2));
        assert_eq!(
            created.end_date.unwrap() - created.start_date,
            Duration::hours(1)
        );

        let free = EventDraft {
            is_free: true,
            price: None,
            ..draft()
        };
        let updated = console
            .update_event(&mut session, created.id, &free)
            .await
            .unwrap();
        assert!(updated.price.is_free());

        console.delete_event(&mut session, created.id).await.unwrap();
        assert!(api.stored_event(created.id).is_none());
    }

    #[tokio::test]
    async fn test_users_and_categories() {
        let api = MockApi::new();
        let mut session = session_for(&api, Role::Admin).await;
        let member = api.add_user("Ada", "ada@example.com", "pw1234", Role::User, true);
        let console = AdminConsole::new(api.clone());

        assert_eq!(console.users(&mut session, 0, 10).await.unwrap().len(), 2);
        let profile = console
            .set_user_active(&mut session, member.id, false)
            .await
            .unwrap();
        assert!(!profile.is_active);
        console.delete_user(&mut session, member.id).await.unwrap();
        assert_eq!(console.users(&mut session, 0, 10).await.unwrap().len(), 1);

        let payload = CategoryPayload {
            name: "Music".to_string(),
            color: "#FF5722".to_string(),
            icon: Some("music".to_string()),
        };
        let category = console.create_category(&mut session, &payload).await.unwrap();
        let renamed = CategoryPayload {
            name: "Live Music".to_string(),
            ..payload
        };
        let category = console
            .update_category(&mut session, category.id, &renamed)
            .await
            .unwrap();
        assert_eq!(category.name, "Live Music");
        assert_eq!(console.categories(&mut session).await.unwrap().len(), 1);
        console.delete_category(&mut session, category.id).await.unwrap();
        assert!(console.categories(&mut session).await.unwrap().is_empty());

        let stats = console.stats(&mut session).await.unwrap();
        assert_eq!(stats["users"], 1);
    }

    #[tokio::test]
    async fn test_rejected_token_expires_session() {
        let api = MockApi::new();
        let mut session = session_for(&api, Role::Admin).await;
        api.revoke_tokens();

        let err = AdminConsole::new(api)
            .delete_event(&mut session, EventId::new(1))
            .await
            .unwrap_err();
        assert!(matches!(err, AdminError::Auth(AuthError::SessionExpired)));
        assert!(!session.is_authenticated());
    }
}
