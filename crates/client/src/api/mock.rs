//! In-memory event API for tests.
//!
//! Behaves like a small backend: accounts, tokens, events, categories,
//! orders and tickets live in shared state, and every call is recorded so
//! tests can assert on what was sent. Individual operations can be made to
//! fail with [`MockApi::fail`].

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};

use eventdesk_core::{
    CategoryId, Email, EventId, Price, Role, TicketId, TicketStatus, UserId,
};

use super::types::{
    CategoryPayload, EventPayload, LoginResponse, OrderId, OrderRequest, OrderResponse,
    ProfileUpdate, RegisterRequest,
};
use super::{ApiError, AuthToken, EventApi};
use crate::models::{Attendee, Category, Event, Ticket, TicketEvent, UserProfile};

#[derive(Debug, Clone)]
struct Account {
    profile: UserProfile,
    password: String,
}

#[derive(Debug, Default)]
struct MockState {
    accounts: Vec<Account>,
    sessions: HashMap<String, UserId>,
    events: BTreeMap<EventId, Event>,
    categories: BTreeMap<CategoryId, Category>,
    tickets: Vec<(UserId, Ticket)>,
    orders: Vec<OrderRequest>,
    calls: Vec<String>,
    failures: HashSet<String>,
    search_delays: HashMap<String, Duration>,
    ticket_delays: VecDeque<Duration>,
    order_id: Option<OrderId>,
    token_ttl: Option<chrono::Duration>,
    login_is_active: Option<bool>,
    next_id: i64,
}

impl MockState {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        1000 + self.next_id
    }

    fn record(&mut self, call: String) -> Result<(), ApiError> {
        let op = call.split(':').next().unwrap_or_default().to_string();
        let failing = self.failures.contains(&call) || self.failures.contains(&op);
        self.calls.push(call);
        if failing {
            return Err(ApiError::Status {
                status: 500,
                detail: Some("Simulated failure".to_string()),
            });
        }
        Ok(())
    }

    fn user_for(&self, token: &AuthToken) -> Result<UserId, ApiError> {
        self.sessions
            .get(token.expose())
            .copied()
            .ok_or(ApiError::Unauthorized)
    }

    fn account_mut(&mut self, id: UserId) -> Result<&mut Account, ApiError> {
        self.accounts
            .iter_mut()
            .find(|a| a.profile.id == id)
            .ok_or_else(|| not_found("User not found"))
    }

    fn require_admin(&self, token: &AuthToken) -> Result<UserId, ApiError> {
        let id = self.user_for(token)?;
        let is_admin = self
            .accounts
            .iter()
            .any(|a| a.profile.id == id && a.profile.role.is_admin());
        if is_admin {
            Ok(id)
        } else {
            Err(ApiError::Status {
                status: 403,
                detail: Some("Not enough permissions".to_string()),
            })
        }
    }

    fn issue_token(&mut self, id: UserId) -> String {
        let n = self.next_id();
        let mut claims = serde_json::json!({ "sub": id.to_string(), "jti": n });
        if let Some(ttl) = self.token_ttl {
            claims["exp"] = serde_json::json!((Utc::now() + ttl).timestamp());
        }
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"none","typ":"JWT"}"#);
        let payload = URL_SAFE_NO_PAD.encode(claims.to_string());
        let token = format!("{header}.{payload}.mock");
        self.sessions.insert(token.clone(), id);
        token
    }
}

fn not_found(detail: &str) -> ApiError {
    ApiError::Status {
        status: 404,
        detail: Some(detail.to_string()),
    }
}

/// Recording in-memory implementation of [`EventApi`].
#[derive(Debug, Clone, Default)]
pub struct MockApi {
    state: Arc<Mutex<MockState>>,
}

impl MockApi {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register an account and return its profile.
    pub fn add_user(
        &self,
        name: &str,
        email: &str,
        password: &str,
        role: Role,
        is_active: bool,
    ) -> UserProfile {
        let mut state = self.state();
        let id = UserId::new(state.next_id());
        let profile = UserProfile {
            id,
            name: name.to_string(),
            email: email.to_string(),
            role,
            is_active,
            created_at: Some(Utc::now()),
            require_password_change: None,
        };
        state.accounts.push(Account {
            profile: profile.clone(),
            password: password.to_string(),
        });
        profile
    }

    /// Override the `require_password_change` field the server reports.
    pub fn set_server_password_flag(&self, id: UserId, flag: Option<bool>) {
        let mut state = self.state();
        if let Ok(account) = state.account_mut(id) {
            account.profile.require_password_change = flag;
        }
    }

    pub fn add_event(&self, event: Event) {
        self.state().events.insert(event.id, event);
    }

    pub fn add_category(&self, category: Category) {
        self.state().categories.insert(category.id, category);
    }

    /// Make an operation fail with a 500.
    ///
    /// `op` is an operation name (`"create_order"`) or an operation with
    /// its argument (`"update_event_attendees:2"`).
    pub fn fail(&self, op: &str) {
        self.state().failures.insert(op.to_string());
    }

    /// Delay responses to searches for `term`.
    pub fn delay_search(&self, term: &str, delay: Duration) {
        self.state().search_delays.insert(term.to_string(), delay);
    }

    /// Delay successive ticket listings, one entry per call.
    pub fn delay_tickets(&self, delays: impl IntoIterator<Item = Duration>) {
        self.state().ticket_delays.extend(delays);
    }

    /// Id returned by the next orders. Defaults to a sequential number.
    pub fn set_order_id(&self, id: Option<OrderId>) {
        self.state().order_id = id;
    }

    /// Embed `exp = now + ttl` in issued tokens. Negative values issue
    /// already expired tokens.
    pub fn set_token_ttl(&self, ttl: Option<chrono::Duration>) {
        self.state().token_ttl = ttl;
    }

    /// Override `is_active` in login responses.
    pub fn set_login_is_active(&self, is_active: Option<bool>) {
        self.state().login_is_active = is_active;
    }

    /// Invalidate every issued token.
    pub fn revoke_tokens(&self) {
        self.state().sessions.clear();
    }

    /// Every call made so far, e.g. `"search_events:jazz"`.
    #[must_use]
    pub fn calls(&self) -> Vec<String> {
        self.state().calls.clone()
    }

    /// Number of calls to operation `op`, with any argument.
    #[must_use]
    pub fn call_count(&self, op: &str) -> usize {
        self.state()
            .calls
            .iter()
            .filter(|c| c.as_str() == op || c.split(':').next() == Some(op))
            .count()
    }

    /// Terms searched for, in order.
    #[must_use]
    pub fn search_terms(&self) -> Vec<String> {
        self.state()
            .calls
            .iter()
            .filter_map(|c| c.strip_prefix("search_events:"))
            .map(str::to_string)
            .collect()
    }

    /// Orders received, in order.
    #[must_use]
    pub fn orders(&self) -> Vec<OrderRequest> {
        self.state().orders.clone()
    }

    /// Current server-side copy of an event.
    #[must_use]
    pub fn stored_event(&self, id: EventId) -> Option<Event> {
        self.state().events.get(&id).cloned()
    }

    /// An event fixture starting on `start`.
    #[must_use]
    pub fn sample_event(
        id: i64,
        title: &str,
        category: Option<i64>,
        price: Price,
        start: DateTime<Utc>,
    ) -> Event {
        Event {
            id: EventId::new(id),
            title: title.to_string(),
            description: format!("{title} description"),
            start_date: start,
            end_date: Some(start + chrono::Duration::hours(1)),
            location: "Main Hall".to_string(),
            capacity: Some(100),
            price,
            is_published: true,
            category_id: category.map(CategoryId::new),
            organizer_id: None,
            attendees: None,
        }
    }
}

fn event_from_payload(id: EventId, organizer: Option<UserId>, payload: &EventPayload) -> Result<Event, ApiError> {
    let price = Price::new(payload.price).map_err(|e| ApiError::Status {
        status: 422,
        detail: Some(e.to_string()),
    })?;
    Ok(Event {
        id,
        title: payload.title.clone(),
        description: payload.description.clone(),
        start_date: payload.start_date,
        end_date: Some(payload.end_date),
        location: payload.location.clone(),
        capacity: payload.capacity,
        price,
        is_published: payload.is_published,
        category_id: payload.category_id,
        organizer_id: organizer,
        attendees: None,
    })
}

impl EventApi for MockApi {
    async fn login(&self, email: &str, password: &SecretString) -> Result<LoginResponse, ApiError> {
        let mut state = self.state();
        state.record("login".to_string())?;
        let account = state
            .accounts
            .iter()
            .find(|a| {
                a.profile.email.eq_ignore_ascii_case(email.trim())
                    && a.password == password.expose_secret()
            })
            .cloned()
            .ok_or(ApiError::Unauthorized)?;
        let token = state.issue_token(account.profile.id);
        Ok(LoginResponse {
            access_token: token,
            token_type: Some("bearer".to_string()),
            user_id: Some(account.profile.id),
            role: Some(account.profile.role),
            is_active: Some(state.login_is_active.unwrap_or(account.profile.is_active)),
        })
    }

    async fn register(&self, request: &RegisterRequest) -> Result<UserProfile, ApiError> {
        {
            let mut state = self.state();
            state.record("register".to_string())?;
            if state
                .accounts
                .iter()
                .any(|a| a.profile.email.eq_ignore_ascii_case(&request.email))
            {
                return Err(ApiError::Status {
                    status: 400,
                    detail: Some("Email already registered".to_string()),
                });
            }
        }
        Ok(self.add_user(
            &request.name,
            &request.email,
            &request.password,
            request.role,
            true,
        ))
    }

    async fn change_password(
        &self,
        token: &AuthToken,
        current: &SecretString,
        new: &SecretString,
    ) -> Result<(), ApiError> {
        let mut state = self.state();
        state.record("change_password".to_string())?;
        let id = state.user_for(token)?;
        let account = state.account_mut(id)?;
        if account.password != current.expose_secret() {
            return Err(ApiError::Status {
                status: 400,
                detail: Some("Incorrect password".to_string()),
            });
        }
        account.password = new.expose_secret().to_string();
        Ok(())
    }

    async fn reset_password(&self, email: &Email) -> Result<(), ApiError> {
        self.state().record(format!("reset_password:{email}"))
    }

    async fn me(&self, token: &AuthToken) -> Result<UserProfile, ApiError> {
        let mut state = self.state();
        state.record("me".to_string())?;
        let id = state.user_for(token)?;
        Ok(state.account_mut(id)?.profile.clone())
    }

    async fn update_me(
        &self,
        token: &AuthToken,
        update: &ProfileUpdate,
    ) -> Result<UserProfile, ApiError> {
        let mut state = self.state();
        state.record("update_me".to_string())?;
        let id = state.user_for(token)?;
        let account = state.account_mut(id)?;
        if let Some(name) = &update.name {
            account.profile.name.clone_from(name);
        }
        if let Some(email) = &update.email {
            account.profile.email.clone_from(email);
        }
        if let Some(password) = &update.password {
            account.password.clone_from(password);
        }
        Ok(account.profile.clone())
    }

    async fn users(
        &self,
        token: &AuthToken,
        skip: u32,
        limit: u32,
    ) -> Result<Vec<UserProfile>, ApiError> {
        let mut state = self.state();
        state.record("users".to_string())?;
        state.require_admin(token)?;
        Ok(state
            .accounts
            .iter()
            .skip(skip as usize)
            .take(limit as usize)
            .map(|a| a.profile.clone())
            .collect())
    }

    async fn set_user_active(
        &self,
        token: &AuthToken,
        id: UserId,
        active: bool,
    ) -> Result<UserProfile, ApiError> {
        let mut state = self.state();
        state.record(format!("set_user_active:{id}"))?;
        state.require_admin(token)?;
        let account = state.account_mut(id)?;
        account.profile.is_active = active;
        Ok(account.profile.clone())
    }

    async fn delete_user(&self, token: &AuthToken, id: UserId) -> Result<(), ApiError> {
        let mut state = self.state();
        state.record(format!("delete_user:{id}"))?;
        state.require_admin(token)?;
        let before = state.accounts.len();
        state.accounts.retain(|a| a.profile.id != id);
        if state.accounts.len() == before {
            return Err(not_found("User not found"));
        }
        state.sessions.retain(|_, user| *user != id);
        Ok(())
    }

    async fn events(&self, skip: u32, limit: u32) -> Result<Vec<Event>, ApiError> {
        let mut state = self.state();
        state.record("events".to_string())?;
        Ok(state
            .events
            .values()
            .skip(skip as usize)
            .take(limit as usize)
            .cloned()
            .collect())
    }

    async fn event(&self, id: EventId) -> Result<Event, ApiError> {
        let mut state = self.state();
        state.record(format!("event:{id}"))?;
        state
            .events
            .get(&id)
            .cloned()
            .ok_or_else(|| not_found("Event not found"))
    }

    async fn search_events(&self, term: &str) -> Result<Vec<Event>, ApiError> {
        let delay = {
            let mut state = self.state();
            state.record(format!("search_events:{term}"))?;
            state.search_delays.get(term).copied()
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let needle = term.to_lowercase();
        Ok(self
            .state()
            .events
            .values()
            .filter(|e| {
                e.title.to_lowercase().contains(&needle)
                    || e.description.to_lowercase().contains(&needle)
            })
            .cloned()
            .collect())
    }

    async fn create_event(&self, token: &AuthToken, payload: &EventPayload) -> Result<Event, ApiError> {
        let mut state = self.state();
        state.record("create_event".to_string())?;
        let organizer = state.require_admin(token)?;
        let id = EventId::new(state.next_id());
        let event = event_from_payload(id, Some(organizer), payload)?;
        state.events.insert(id, event.clone());
        Ok(event)
    }

    async fn update_event(
        &self,
        token: &AuthToken,
        id: EventId,
        payload: &EventPayload,
    ) -> Result<Event, ApiError> {
        let mut state = self.state();
        state.record(format!("update_event:{id}"))?;
        state.require_admin(token)?;
        let existing = state
            .events
            .get(&id)
            .cloned()
            .ok_or_else(|| not_found("Event not found"))?;
        let mut event = event_from_payload(id, existing.organizer_id, payload)?;
        event.attendees = existing.attendees;
        state.events.insert(id, event.clone());
        Ok(event)
    }

    async fn update_event_attendees(
        &self,
        token: &AuthToken,
        id: EventId,
        attendees: u32,
    ) -> Result<Event, ApiError> {
        let mut state = self.state();
        state.record(format!("update_event_attendees:{id}"))?;
        state.user_for(token)?;
        let event = state
            .events
            .get_mut(&id)
            .ok_or_else(|| not_found("Event not found"))?;
        event.attendees = Some(attendees);
        Ok(event.clone())
    }

    async fn delete_event(&self, token: &AuthToken, id: EventId) -> Result<(), ApiError> {
        let mut state = self.state();
        state.record(format!("delete_event:{id}"))?;
        state.require_admin(token)?;
        state
            .events
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| not_found("Event not found"))
    }

    async fn create_order(
        &self,
        token: &AuthToken,
        order: &OrderRequest,
    ) -> Result<OrderResponse, ApiError> {
        let mut state = self.state();
        state.record("create_order".to_string())?;
        let user = state.user_for(token)?;
        state.orders.push(order.clone());

        for item in &order.items {
            let Some(event) = state.events.get(&item.event_id).cloned() else {
                continue;
            };
            let ticket = Ticket {
                id: TicketId::new(state.next_id()),
                event: TicketEvent {
                    id: event.id,
                    title: event.title,
                    date: event.start_date,
                    location: event.location,
                },
                quantity: item.quantity,
                ticket_type: "Standard".to_string(),
                total_price: Price::new(item.price * rust_decimal::Decimal::from(item.quantity))
                    .unwrap_or_default(),
                status: TicketStatus::Active,
                purchase_date: Utc::now(),
                attendee: Attendee {
                    name: order.customer.name.clone(),
                    email: order.customer.email.clone(),
                    phone: order.customer.phone.clone(),
                },
            };
            state.tickets.push((user, ticket));
        }

        let id = state
            .order_id
            .clone()
            .unwrap_or(OrderId::Number(i64::try_from(state.orders.len()).unwrap_or(i64::MAX)));
        Ok(OrderResponse {
            id: Some(id),
            status: Some("pending".to_string()),
        })
    }

    async fn my_tickets(&self, token: &AuthToken) -> Result<Vec<Ticket>, ApiError> {
        let (user, delay) = {
            let mut state = self.state();
            state.record("my_tickets".to_string())?;
            (state.user_for(token)?, state.ticket_delays.pop_front())
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        Ok(self
            .state()
            .tickets
            .iter()
            .filter(|(owner, _)| *owner == user)
            .map(|(_, ticket)| ticket.clone())
            .collect())
    }

    async fn cancel_ticket(&self, token: &AuthToken, id: TicketId) -> Result<(), ApiError> {
        let mut state = self.state();
        state.record(format!("cancel_ticket:{id}"))?;
        let user = state.user_for(token)?;
        let before = state.tickets.len();
        state
            .tickets
            .retain(|(owner, ticket)| !(*owner == user && ticket.id == id));
        if state.tickets.len() == before {
            return Err(not_found("Ticket not found"));
        }
        Ok(())
    }

    async fn categories(&self) -> Result<Vec<Category>, ApiError> {
        let mut state = self.state();
        state.record("categories".to_string())?;
        Ok(state.categories.values().cloned().collect())
    }

    async fn create_category(
        &self,
        token: &AuthToken,
        payload: &CategoryPayload,
    ) -> Result<Category, ApiError> {
        let mut state = self.state();
        state.record("create_category".to_string())?;
        state.require_admin(token)?;
        let category = Category {
            id: CategoryId::new(state.next_id()),
            name: payload.name.clone(),
            color: payload.color.clone(),
            icon: payload.icon.clone(),
        };
        state.categories.insert(category.id, category.clone());
        Ok(category)
    }

    async fn update_category(
        &self,
        token: &AuthToken,
        id: CategoryId,
        payload: &CategoryPayload,
    ) -> Result<Category, ApiError> {
        let mut state = self.state();
        state.record(format!("update_category:{id}"))?;
        state.require_admin(token)?;
        let category = state
            .categories
            .get_mut(&id)
            .ok_or_else(|| not_found("Category not found"))?;
        category.name.clone_from(&payload.name);
        category.color.clone_from(&payload.color);
        category.icon.clone_from(&payload.icon);
        Ok(category.clone())
    }

    async fn delete_category(&self, token: &AuthToken, id: CategoryId) -> Result<(), ApiError> {
        let mut state = self.state();
        state.record(format!("delete_category:{id}"))?;
        state.require_admin(token)?;
        state
            .categories
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| not_found("Category not found"))
    }

    async fn admin_stats(&self, token: &AuthToken) -> Result<serde_json::Value, ApiError> {
        let mut state = self.state();
        state.record("admin_stats".to_string())?;
        state.require_admin(token)?;
        Ok(serde_json::json!({
            "users": state.accounts.len(),
            "events": state.events.len(),
            "orders": state.orders.len(),
            "tickets": state.tickets.len(),
        }))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_login_and_me() {
        let api = MockApi::new();
        let profile = api.add_user("Ada", "ada@example.com", "pw", Role::User, true);

        let bad = api
            .login("ada@example.com", &SecretString::from("nope"))
            .await
            .unwrap_err();
        assert!(bad.is_unauthorized());

        let response = api
            .login("ada@example.com", &SecretString::from("pw"))
            .await
            .unwrap();
        let token = AuthToken::new(response.access_token);
        assert_eq!(api.me(&token).await.unwrap(), profile);
        assert!(token.expires_at().is_none());

        api.revoke_tokens();
        assert!(api.me(&token).await.unwrap_err().is_unauthorized());
    }

    #[tokio::test]
    async fn test_token_ttl_sets_exp() {
        let api = MockApi::new();
        api.add_user("Ada", "ada@example.com", "pw", Role::User, true);
        api.set_token_ttl(Some(chrono::Duration::minutes(-1)));
        let response = api
            .login("ada@example.com", &SecretString::from("pw"))
            .await
            .unwrap();
        assert!(AuthToken::new(response.access_token).is_expired_at(Utc::now()));
    }

    #[tokio::test]
    async fn test_failures_match_operation_and_argument() {
        let api = MockApi::new();
        let start = Utc::now();
        api.add_event(MockApi::sample_event(1, "Expo", None, Price::ZERO, start));
        api.add_event(MockApi::sample_event(2, "Gala", None, Price::ZERO, start));
        api.fail("event:2");

        assert!(api.event(EventId::new(1)).await.is_ok());
        let err = api.event(EventId::new(2)).await.unwrap_err();
        assert_eq!(err.status(), Some(500));
        assert_eq!(api.call_count("event"), 2);
    }

    #[tokio::test]
    async fn test_admin_operations_require_admin() {
        let api = MockApi::new();
        api.add_user("Bo", "bo@example.com", "pw", Role::User, true);
        let token = AuthToken::new(
            api.login("bo@example.com", &SecretString::from("pw"))
                .await
                .unwrap()
                .access_token,
        );
        let err = api.admin_stats(&token).await.unwrap_err();
        assert_eq!(err.status(), Some(403));
    }
}
