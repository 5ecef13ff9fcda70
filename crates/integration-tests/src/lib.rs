//! End-to-end tests for the EventDesk client.
//!
//! Every test drives an [`AppContext`] over [`MockApi`] and
//! [`MemoryStorage`], so no server is needed:
//!
//! ```bash
//! cargo test -p eventdesk-integration-tests
//! ```
//!
//! A "reload" is modelled by building a second context over the same
//! storage, the way a browser tab reopens over the same local storage.

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use secrecy::SecretString;
use url::Url;

use eventdesk_client::api::mock::MockApi;
use eventdesk_client::models::{Event, UserProfile};
use eventdesk_client::{AppContext, ClientConfig, MemoryStorage};
use eventdesk_core::{Price, Role};

/// Context under test.
pub type TestContext = AppContext<MockApi, MemoryStorage>;

pub const PASSWORD: &str = "secret123";

/// Configuration with a 100ms search debounce and no simulated
/// interest-save latency.
///
/// # Panics
///
/// Never; the base URL is a constant.
#[must_use]
#[allow(clippy::unwrap_used)]
pub fn config() -> ClientConfig {
    let mut config = ClientConfig::new(Url::parse("http://localhost:8000/api").unwrap());
    config.search_debounce = Duration::from_millis(100);
    config.interest_save_delay = Duration::ZERO;
    config
}

/// Build and initialize a context over `storage`.
pub async fn open(api: &MockApi, storage: &Arc<MemoryStorage>) -> TestContext {
    let mut ctx = AppContext::new(api.clone(), Arc::clone(storage), config());
    ctx.init().await;
    ctx
}

/// A fresh API with a small catalog:
///
/// | id | title            | category | price  | capacity |
/// |----|------------------|----------|--------|----------|
/// | 1  | Rock Festival    | 1        | $20.00 | 100      |
/// | 2  | Jazz Night       | 1        | $12.50 | 100      |
/// | 3  | Art Expo         | 5        | free   | 100      |
#[must_use]
pub fn api_with_catalog() -> MockApi {
    let api = MockApi::new();
    let start = Utc::now() + chrono::Duration::days(7);
    for (id, title, category, cents) in [
        (1, "Rock Festival", 1, 2000),
        (2, "Jazz Night", 1, 1250),
        (3, "Art Expo", 5, 0),
    ] {
        let price = Price::from_cents(cents).unwrap_or_default();
        api.add_event(MockApi::sample_event(id, title, Some(category), price, start));
    }
    api
}

/// Register a regular, active user with [`PASSWORD`].
pub fn add_user(api: &MockApi, name: &str, email: &str) -> UserProfile {
    api.add_user(name, email, PASSWORD, Role::User, true)
}

/// Register an active admin with [`PASSWORD`].
pub fn add_admin(api: &MockApi, name: &str, email: &str) -> UserProfile {
    api.add_user(name, email, PASSWORD, Role::Admin, true)
}

/// Sign in with [`PASSWORD`], remembering the profile.
///
/// # Panics
///
/// If the sign-in is rejected for any reason other than an inactive
/// account.
pub async fn sign_in(ctx: &mut TestContext, email: &str) {
    match ctx.login(email, SecretString::from(PASSWORD), true).await {
        Ok(_) | Err(eventdesk_client::session::AuthError::AccountInactive) => {}
        Err(e) => panic!("sign-in as {email} failed: {e}"),
    }
}

/// Look up a catalog event on the server.
///
/// # Panics
///
/// If the event does not exist.
#[must_use]
pub fn event(api: &MockApi, id: i64) -> Event {
    api.stored_event(eventdesk_core::EventId::new(id))
        .unwrap_or_else(|| panic!("no event {id}"))
}
