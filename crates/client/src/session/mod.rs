//! Session store: who is signed in, and what they may do.
//!
//! # Lifecycle
//!
//! A fresh store is `Loading`. [`SessionStore::initialize`] resolves a
//! stored token into an identity (or discards it) and always ends `Ready`.
//! From then on the identity is present iff a token was validated by the
//! API, and any `401` tears both down through [`SessionStore::expire`].
//!
//! # Persisted keys
//!
//! - `token` - bearer token, the only thing that survives a reload
//! - `user` - display snapshot written when the user asked to be remembered;
//!   never used for authorization
//! - `firstLoginCompleted_<id>` - see [`first_login`]

mod error;
pub mod first_login;

pub use error::AuthError;

use std::sync::Arc;

use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, info, instrument, warn};

use eventdesk_core::{Email, PasswordChangeForm, Role, SessionStatus, UserId};

use crate::api::{ApiError, AuthToken, EventApi, ProfileUpdate, RegisterRequest};
use crate::error::{clear_sentry_user, set_sentry_user};
use crate::guard::SessionSnapshot;
use crate::models::{Identity, UserProfile};
use crate::storage::{LocalStorage, TOKEN_KEY, USER_KEY};

const LOGIN_FAILED: &str = "Invalid email or password";
const REGISTRATION_FAILED: &str = "Registration failed";
const PROFILE_UPDATE_FAILED: &str = "Failed to update profile";
const PASSWORD_CHANGE_FAILED: &str = "Failed to change password";
const PASSWORD_RESET_FAILED: &str = "Failed to request password reset";

/// Authenticated identity and token of the running client.
#[derive(Debug)]
pub struct SessionStore<A, S> {
    api: A,
    storage: Arc<S>,
    status: SessionStatus,
    identity: Option<Identity>,
    token: Option<AuthToken>,
}

impl<A: EventApi, S: LocalStorage> SessionStore<A, S> {
    /// Create an unresolved (`Loading`) session.
    #[must_use]
    pub const fn new(api: A, storage: Arc<S>) -> Self {
        Self {
            api,
            storage,
            status: SessionStatus::Loading,
            identity: None,
            token: None,
        }
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    #[must_use]
    pub const fn status(&self) -> SessionStatus {
        self.status
    }

    #[must_use]
    pub const fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    /// Bearer token of the signed-in user.
    #[must_use]
    pub const fn token(&self) -> Option<&AuthToken> {
        self.token.as_ref()
    }

    /// Id of the signed-in user.
    #[must_use]
    pub fn user_id(&self) -> Option<UserId> {
        self.identity.as_ref().map(|i| i.id)
    }

    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        self.identity.is_some()
    }

    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.identity.as_ref().is_some_and(Identity::is_admin)
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.identity.as_ref().is_some_and(|i| i.is_active)
    }

    /// Whether the signed-in user must set a new password before anything
    /// else.
    #[must_use]
    pub fn requires_password_change_now(&self) -> bool {
        self.identity
            .as_ref()
            .is_some_and(|i| i.requires_password_change)
    }

    /// State consumed by the route guard.
    #[must_use]
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            status: self.status,
            authenticated: self.is_authenticated(),
            is_admin: self.is_admin(),
            is_active: self.is_active(),
            requires_password_change: self.requires_password_change_now(),
        }
    }

    /// Token and identity, or `NotAuthenticated`.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::NotAuthenticated` when signed out.
    pub fn credentials(&self) -> Result<(&AuthToken, &Identity), AuthError> {
        match (&self.token, &self.identity) {
            (Some(token), Some(identity)) => Ok((token, identity)),
            _ => Err(AuthError::NotAuthenticated),
        }
    }

    /// Token of a signed-in admin.
    ///
    /// # Errors
    ///
    /// Returns `NotAuthenticated` when signed out and `Forbidden` for
    /// non-admins.
    pub fn admin_token(&self) -> Result<AuthToken, AuthError> {
        let (token, identity) = self.credentials()?;
        if !identity.is_admin() {
            return Err(AuthError::Forbidden);
        }
        Ok(token.clone())
    }

    /// Display snapshot saved by a remembered login.
    #[must_use]
    pub fn cached_identity(&self) -> Option<Identity> {
        self.storage.get_json(USER_KEY).unwrap_or_else(|e| {
            debug!(error = %e, "Ignoring unreadable cached user");
            None
        })
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Resolve a stored token into an identity.
    ///
    /// Never fails: an unusable token is erased and the session stays
    /// signed out. The status is `Ready` afterwards in every case.
    #[instrument(skip(self))]
    pub async fn initialize(&mut self) {
        let stored = match self.storage.get(TOKEN_KEY) {
            Ok(token) => token.filter(|t| !t.trim().is_empty()),
            Err(e) => {
                warn!(error = %e, "Failed to read stored token");
                None
            }
        };

        if let Some(raw) = stored {
            let token = AuthToken::new(raw);
            match self.api.me(&token).await {
                Ok(profile) => {
                    let is_active = profile.is_active;
                    let identity = self.establish(token, profile, is_active);
                    set_sentry_user(&identity);
                    info!(user_id = %identity.id, "Restored session from stored token");
                }
                Err(e) => {
                    warn!(error = %e, "Stored token rejected, signing out");
                    self.clear_local();
                }
            }
        }

        self.status = SessionStatus::Ready;
    }

    /// Sign in.
    ///
    /// On success the token is stored and the identity resolved. With
    /// `remember`, a display snapshot is saved under `user`.
    ///
    /// # Errors
    ///
    /// - `InvalidCredentials` if the server rejects the credentials
    /// - `AccountInactive` if the account is deactivated; the session is
    ///   still established so the user can reach the dashboard
    /// - `Request` for other failures, with the server's message
    #[instrument(skip(self, password))]
    pub async fn login(
        &mut self,
        email: &str,
        password: SecretString,
        remember: bool,
    ) -> Result<Identity, AuthError> {
        let email = email.trim();
        let response = self.api.login(email, &password).await.map_err(|e| match e {
            ApiError::Unauthorized => AuthError::InvalidCredentials,
            ApiError::Status {
                status: 400 | 403, ..
            } => AuthError::InvalidCredentials,
            other => {
                warn!(error = %other, "Login request failed");
                AuthError::request(other.message_or(LOGIN_FAILED))
            }
        })?;

        let token = AuthToken::new(response.access_token);
        self.storage.set(TOKEN_KEY, token.expose())?;

        let profile = match self.api.me(&token).await {
            Ok(profile) => profile,
            Err(e) => {
                warn!(error = %e, "Failed to load profile after login");
                self.clear_local();
                return Err(AuthError::request(e.message_or(LOGIN_FAILED)));
            }
        };

        let is_active = response.is_active.unwrap_or(true) && profile.is_active;
        let identity = self.establish(token, profile, is_active);

        if remember {
            self.storage.set_json(USER_KEY, &identity)?;
        }

        set_sentry_user(&identity);
        info!(user_id = %identity.id, "Signed in");

        if !identity.is_active {
            return Err(AuthError::AccountInactive);
        }
        Ok(identity)
    }

    /// Create an account, then sign in with it (remembered).
    ///
    /// # Errors
    ///
    /// Returns `InvalidEmail` before any request if the email is malformed,
    /// `Request` if registration fails, and any error of [`Self::login`].
    #[instrument(skip(self, password))]
    pub async fn register(
        &mut self,
        name: &str,
        email: &str,
        password: SecretString,
        role: Role,
    ) -> Result<Identity, AuthError> {
        let email = Email::parse(email)?;
        let request = RegisterRequest {
            name: name.trim().to_string(),
            email: email.as_str().to_string(),
            password: password.expose_secret().to_string(),
            role,
        };

        self.api.register(&request).await.map_err(|e| {
            warn!(error = %e, "Registration failed");
            AuthError::request(e.message_or(REGISTRATION_FAILED))
        })?;

        self.login(email.as_str(), password, true).await
    }

    /// Sign out and forget everything tied to the session.
    ///
    /// The in-memory session is cleared even if storage fails.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Storage` if persisted keys cannot be removed.
    #[instrument(skip(self))]
    pub fn logout(&mut self) -> Result<(), AuthError> {
        self.identity = None;
        self.token = None;
        clear_sentry_user();

        self.storage.remove(TOKEN_KEY)?;
        self.storage.remove(USER_KEY)?;
        first_login::clear_all(self.storage.as_ref())?;
        info!("Signed out");
        Ok(())
    }

    /// Tear the session down after the API rejected the token.
    #[instrument(skip(self))]
    pub fn expire(&mut self) {
        if self.identity.is_some() || self.token.is_some() {
            info!("Session expired");
        }
        self.clear_local();
    }

    // =========================================================================
    // Profile
    // =========================================================================

    /// Apply a partial profile update.
    ///
    /// An update that explicitly sets `require_password_change = false`
    /// records the first-login marker so the requirement stays cleared
    /// across reloads.
    ///
    /// # Errors
    ///
    /// `NotAuthenticated` when signed out, `SessionExpired` on `401`, and
    /// `Request` for other failures.
    #[instrument(skip(self, update))]
    pub async fn update_profile(&mut self, update: &ProfileUpdate) -> Result<Identity, AuthError> {
        let token = self.credentials()?.0.clone();

        let profile = match self.api.update_me(&token, update).await {
            Ok(profile) => profile,
            Err(e) => return Err(self.api_failure(e, PROFILE_UPDATE_FAILED)),
        };

        if update.require_password_change == Some(false) {
            first_login::mark_completed(self.storage.as_ref(), profile.id)?;
        }

        let is_active = profile.is_active;
        let identity = self.establish(token, profile, is_active);

        if self.storage.get(USER_KEY)?.is_some() {
            self.storage.set_json(USER_KEY, &identity)?;
        }

        Ok(identity)
    }

    /// Complete the first-login password change.
    ///
    /// # Errors
    ///
    /// `PasswordMismatch` if the confirmation differs, otherwise as
    /// [`Self::update_profile`].
    pub async fn complete_first_login(
        &mut self,
        form: &PasswordChangeForm,
    ) -> Result<Identity, AuthError> {
        if form.validate().is_err() {
            return Err(AuthError::PasswordMismatch);
        }
        self.update_profile(&ProfileUpdate::first_password(form.password.clone()))
            .await
    }

    /// Change the password of the signed-in user.
    ///
    /// # Errors
    ///
    /// `NotAuthenticated` when signed out, `SessionExpired` on `401`, and
    /// `Request` for other failures.
    #[instrument(skip_all)]
    pub async fn change_password(
        &mut self,
        current: &SecretString,
        new: &SecretString,
    ) -> Result<(), AuthError> {
        let token = self.credentials()?.0.clone();
        match self.api.change_password(&token, current, new).await {
            Ok(()) => Ok(()),
            Err(e) => Err(self.api_failure(e, PASSWORD_CHANGE_FAILED)),
        }
    }

    /// Ask the server to send a password reset email.
    ///
    /// # Errors
    ///
    /// `InvalidEmail` for a malformed address, `Request` on failure.
    #[instrument(skip(self))]
    pub async fn reset_password(&self, email: &str) -> Result<(), AuthError> {
        let email = Email::parse(email)?;
        self.api
            .reset_password(&email)
            .await
            .map_err(|e| AuthError::request(e.message_or(PASSWORD_RESET_FAILED)))
    }

    /// Map an API failure of an authenticated call.
    ///
    /// A `401` expires the session; anything else becomes a displayable
    /// `Request` error using `fallback` when the server gave no message.
    pub fn api_failure(&mut self, error: ApiError, fallback: &str) -> AuthError {
        if error.is_unauthorized() {
            self.expire();
            return AuthError::SessionExpired;
        }
        warn!(error = %error, "Authenticated request failed");
        AuthError::request(error.message_or(fallback))
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn establish(&mut self, token: AuthToken, profile: UserProfile, is_active: bool) -> Identity {
        let requires_change = first_login::requires_password_change(
            self.storage.as_ref(),
            profile.id,
            profile.require_password_change,
        );
        let identity = Identity::from_profile(profile, is_active, requires_change);
        self.token = Some(token);
        self.identity = Some(identity.clone());
        identity
    }

    fn clear_local(&mut self) {
        self.identity = None;
        self.token = None;
        clear_sentry_user();
        for key in [TOKEN_KEY, USER_KEY] {
            if let Err(e) = self.storage.remove(key) {
                warn!(error = %e, key, "Failed to remove stored session key");
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::api::mock::MockApi;
    use crate::storage::MemoryStorage;

    fn setup() -> (MockApi, Arc<MemoryStorage>, SessionStore<MockApi, MemoryStorage>) {
        let api = MockApi::new();
        let storage = Arc::new(MemoryStorage::new());
        let session = SessionStore::new(api.clone(), Arc::clone(&storage));
        (api, storage, session)
    }

    fn pw(s: &str) -> SecretString {
        SecretString::from(s.to_string())
    }

    #[tokio::test]
    async fn test_initialize_without_token_is_ready_and_signed_out() {
        let (api, _storage, mut session) = setup();
        assert_eq!(session.status(), SessionStatus::Loading);

        session.initialize().await;

        assert_eq!(session.status(), SessionStatus::Ready);
        assert!(!session.is_authenticated());
        assert_eq!(api.call_count("me"), 0);
    }

    #[tokio::test]
    async fn test_initialize_with_rejected_token_clears_storage() {
        let (_api, storage, mut session) = setup();
        storage.set(TOKEN_KEY, "stale").unwrap();
        storage.set(USER_KEY, r#"{"id":1}"#).unwrap();

        session.initialize().await;

        assert_eq!(session.status(), SessionStatus::Ready);
        assert!(!session.is_authenticated());
        assert!(storage.get(TOKEN_KEY).unwrap().is_none());
        assert!(storage.get(USER_KEY).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_login_stores_token_and_resolves_identity() {
        let (api, storage, mut session) = setup();
        api.add_user("Ada", "ada@example.com", "pw", Role::Admin, true);

        let identity = session.login(" ada@example.com ", pw("pw"), false).await.unwrap();

        assert_eq!(identity.name, "Ada");
        assert!(session.is_authenticated());
        assert!(session.is_admin());
        assert!(storage.get(TOKEN_KEY).unwrap().is_some());
        assert!(storage.get(USER_KEY).unwrap().is_none());
        assert!(session.cached_identity().is_none());
    }

    #[tokio::test]
    async fn test_login_with_remember_caches_user() {
        let (api, _storage, mut session) = setup();
        api.add_user("Ada", "ada@example.com", "pw", Role::User, true);

        let identity = session.login("ada@example.com", pw("pw"), true).await.unwrap();

        assert_eq!(session.cached_identity(), Some(identity));
    }

    #[tokio::test]
    async fn test_login_rejected_credentials() {
        let (api, storage, mut session) = setup();
        api.add_user("Ada", "ada@example.com", "pw", Role::User, true);

        let err = session
            .login("ada@example.com", pw("wrong"), false)
            .await
            .unwrap_err();

        assert!(matches!(err, AuthError::InvalidCredentials));
        assert_eq!(err.to_string(), "Invalid email or password");
        assert!(!session.is_authenticated());
        assert!(storage.get(TOKEN_KEY).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_login_server_failure_uses_fallback_message() {
        let (api, _storage, mut session) = setup();
        api.fail("login");

        let err = session
            .login("ada@example.com", pw("pw"), false)
            .await
            .unwrap_err();

        assert!(matches!(err, AuthError::Request { ref message } if message == "Simulated failure"));
    }

    #[tokio::test]
    async fn test_inactive_account_still_establishes_session() {
        let (api, _storage, mut session) = setup();
        api.add_user("Cy", "cy@example.com", "pw", Role::User, false);

        let err = session
            .login("cy@example.com", pw("pw"), false)
            .await
            .unwrap_err();

        assert!(matches!(err, AuthError::AccountInactive));
        assert!(session.is_authenticated());
        assert!(!session.is_active());
    }

    #[tokio::test]
    async fn test_login_response_inactive_flag_wins() {
        let (api, _storage, mut session) = setup();
        api.add_user("Cy", "cy@example.com", "pw", Role::User, true);
        api.set_login_is_active(Some(false));

        let err = session
            .login("cy@example.com", pw("pw"), false)
            .await
            .unwrap_err();

        assert!(matches!(err, AuthError::AccountInactive));
    }

    #[tokio::test]
    async fn test_first_login_heuristic_and_clearing() {
        let (api, storage, mut session) = setup();
        api.add_user("Ada", "ada@example.com", "pw", Role::User, true);

        let identity = session.login("ada@example.com", pw("pw"), false).await.unwrap();
        assert!(identity.requires_password_change);
        assert!(session.requires_password_change_now());

        let form = PasswordChangeForm {
            password: "n3w-password".to_string(),
            confirm_password: "n3w-password".to_string(),
        };
        let updated = session.complete_first_login(&form).await.unwrap();
        assert!(!updated.requires_password_change);

        // Reload: a fresh store over the same storage must not re-flag.
        let mut reloaded = SessionStore::new(api.clone(), Arc::clone(&storage));
        reloaded.initialize().await;
        assert!(reloaded.is_authenticated());
        assert!(!reloaded.requires_password_change_now());
    }

    #[tokio::test]
    async fn test_server_flag_overrides_heuristic() {
        let (api, _storage, mut session) = setup();
        let profile = api.add_user("Ada", "ada@example.com", "pw", Role::User, true);
        api.set_server_password_flag(profile.id, Some(false));

        let identity = session.login("ada@example.com", pw("pw"), false).await.unwrap();

        assert!(!identity.requires_password_change);
    }

    #[tokio::test]
    async fn test_complete_first_login_rejects_mismatch() {
        let (api, _storage, mut session) = setup();
        api.add_user("Ada", "ada@example.com", "pw", Role::User, true);
        session.login("ada@example.com", pw("pw"), false).await.unwrap();

        let form = PasswordChangeForm {
            password: "one".to_string(),
            confirm_password: "two".to_string(),
        };
        let err = session.complete_first_login(&form).await.unwrap_err();

        assert!(matches!(err, AuthError::PasswordMismatch));
        assert_eq!(api.call_count("update_me"), 0);
    }

    #[tokio::test]
    async fn test_logout_clears_everything() {
        let (api, storage, mut session) = setup();
        api.add_user("Ada", "ada@example.com", "pw", Role::User, true);
        let identity = session.login("ada@example.com", pw("pw"), true).await.unwrap();
        first_login::mark_completed(storage.as_ref(), identity.id).unwrap();
        storage.set("cart", "[]").unwrap();

        session.logout().unwrap();

        assert!(!session.is_authenticated());
        assert!(session.token().is_none());
        assert_eq!(storage.keys().unwrap(), vec!["cart".to_string()]);
    }

    #[tokio::test]
    async fn test_register_validates_email_then_logs_in() {
        let (api, storage, mut session) = setup();

        let err = session
            .register("Ada", "not-an-email", pw("pw"), Role::User)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::InvalidEmail(_)));
        assert_eq!(api.call_count("register"), 0);

        let identity = session
            .register("Ada", "ada@example.com", pw("pw"), Role::User)
            .await
            .unwrap();
        assert_eq!(identity.email, "ada@example.com");
        assert!(storage.get(USER_KEY).unwrap().is_some());

        let err = session
            .register("Ada", "ada@example.com", pw("pw"), Role::User)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Email already registered");
    }

    #[tokio::test]
    async fn test_update_profile_with_revoked_token_expires_session() {
        let (api, storage, mut session) = setup();
        api.add_user("Ada", "ada@example.com", "pw", Role::User, true);
        session.login("ada@example.com", pw("pw"), false).await.unwrap();
        api.revoke_tokens();

        let update = ProfileUpdate {
            name: Some("Ada L.".to_string()),
            ..ProfileUpdate::default()
        };
        let err = session.update_profile(&update).await.unwrap_err();

        assert!(matches!(err, AuthError::SessionExpired));
        assert!(!session.is_authenticated());
        assert!(storage.get(TOKEN_KEY).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_profile_requires_session() {
        let (_api, _storage, mut session) = setup();
        let err = session
            .update_profile(&ProfileUpdate::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::NotAuthenticated));
    }

    #[tokio::test]
    async fn test_change_password() {
        let (api, _storage, mut session) = setup();
        api.add_user("Ada", "ada@example.com", "pw", Role::User, true);
        session.login("ada@example.com", pw("pw"), false).await.unwrap();

        let err = session
            .change_password(&pw("wrong"), &pw("next"))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Incorrect password");

        session.change_password(&pw("pw"), &pw("next")).await.unwrap();
        session.logout().unwrap();
        assert!(session.login("ada@example.com", pw("next"), false).await.is_ok());
    }

    #[tokio::test]
    async fn test_reset_password_validates_email() {
        let (api, _storage, session) = setup();
        assert!(matches!(
            session.reset_password("nope").await,
            Err(AuthError::InvalidEmail(_))
        ));
        session.reset_password("ada@example.com").await.unwrap();
        assert_eq!(api.calls(), vec!["reset_password:ada@example.com"]);
    }

    #[tokio::test]
    async fn test_admin_token() {
        let (api, _storage, mut session) = setup();
        assert!(matches!(session.admin_token(), Err(AuthError::NotAuthenticated)));

        api.add_user("Bo", "bo@example.com", "pw", Role::User, true);
        session.login("bo@example.com", pw("pw"), false).await.unwrap();
        assert!(matches!(session.admin_token(), Err(AuthError::Forbidden)));
    }
}
