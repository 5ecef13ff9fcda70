//! `reqwest` implementation of [`EventApi`].

use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use reqwest::header::{ACCEPT, HeaderMap, HeaderValue};
use reqwest::{RequestBuilder, Response};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use tracing::{debug, instrument, warn};
use url::Url;
use uuid::Uuid;

use eventdesk_core::{CategoryId, Email, EventId, TicketId, UserId};

use super::types::{
    CategoryPayload, EventPayload, LoginResponse, OrderRequest, OrderResponse, ProfileUpdate,
    RegisterRequest,
};
use super::{ApiError, AttendeesUpdate, AuthToken, EventApi, error_message};
use crate::config::ClientConfig;
use crate::models::{Category, Event, Ticket, UserProfile};

const REQUEST_ID_HEADER: &str = "X-Request-Id";
const CACHE_TTL: Duration = Duration::from_secs(60);
const CACHE_CAPACITY: u64 = 256;

/// Cached listing responses.
#[derive(Debug, Clone)]
enum CacheValue {
    Events(Vec<Event>),
    Categories(Vec<Category>),
}

/// HTTP client for the event API.
///
/// Cheap to clone; clones share the connection pool and the cache.
#[derive(Clone)]
pub struct HttpApi {
    inner: Arc<HttpApiInner>,
}

struct HttpApiInner {
    client: reqwest::Client,
    base_url: Url,
    cache: Cache<String, CacheValue>,
}

impl std::fmt::Debug for HttpApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpApi")
            .field("base_url", &self.inner.base_url.as_str())
            .finish_non_exhaustive()
    }
}

impl HttpApi {
    /// Create a client for the configured API.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Http` if the HTTP client fails to build.
    pub fn new(config: &ClientConfig) -> Result<Self, ApiError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(config.request_timeout)
            .build()?;

        let cache = Cache::builder()
            .max_capacity(CACHE_CAPACITY)
            .time_to_live(CACHE_TTL)
            .build();

        Ok(Self {
            inner: Arc::new(HttpApiInner {
                client,
                base_url: config.api_url.clone(),
                cache,
            }),
        })
    }

    /// Base URL requests are sent to.
    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.inner.base_url
    }

    /// Build the URL of an API path, e.g. `events/3`.
    fn url(&self, path: &str) -> Result<Url, ApiError> {
        let base = self.inner.base_url.as_str().trim_end_matches('/');
        Ok(Url::parse(&format!("{base}/{}", path.trim_start_matches('/')))?)
    }

    fn url_with_query(&self, path: &str, query: &[(&str, String)]) -> Result<Url, ApiError> {
        let mut url = self.url(path)?;
        url.query_pairs_mut()
            .extend_pairs(query.iter().map(|(k, v)| (*k, v.as_str())));
        Ok(url)
    }

    /// Send a request, tagging it with a fresh request id.
    async fn send(&self, request: RequestBuilder) -> Result<Response, ApiError> {
        let request_id = Uuid::new_v4();
        let response = request
            .header(REQUEST_ID_HEADER, request_id.to_string())
            .send()
            .await?;
        let status = response.status();

        if status == reqwest::StatusCode::UNAUTHORIZED {
            debug!(%request_id, "API rejected credentials");
            return Err(ApiError::Unauthorized);
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(
                %request_id,
                status = %status,
                body = %body.chars().take(200).collect::<String>(),
                "API returned non-success status"
            );
            return Err(ApiError::Status {
                status: status.as_u16(),
                detail: error_message(&body),
            });
        }

        Ok(response)
    }

    async fn json<T: DeserializeOwned>(response: Response) -> Result<T, ApiError> {
        let text = response.text().await?;
        serde_json::from_str(&text).map_err(|e| {
            warn!(
                error = %e,
                body = %text.chars().take(200).collect::<String>(),
                "Failed to decode API response"
            );
            ApiError::Decode(e.to_string())
        })
    }

    async fn get<T: DeserializeOwned>(
        &self,
        url: Url,
        token: Option<&AuthToken>,
    ) -> Result<T, ApiError> {
        let mut request = self.inner.client.get(url);
        if let Some(token) = token {
            request = request.bearer_auth(token.expose());
        }
        Self::json(self.send(request).await?).await
    }

    async fn invalidate_listings(&self) {
        self.inner.cache.invalidate_all();
        self.inner.cache.run_pending_tasks().await;
        debug!("Invalidated cached listings");
    }
}

impl EventApi for HttpApi {
    #[instrument(skip(self, password))]
    async fn login(&self, email: &str, password: &SecretString) -> Result<LoginResponse, ApiError> {
        let request = self.inner.client.post(self.url("auth/login")?).form(&[
            ("username", email),
            ("password", password.expose_secret()),
        ]);
        Self::json(self.send(request).await?).await
    }

    #[instrument(skip(self, request), fields(email = %request.email))]
    async fn register(&self, request: &RegisterRequest) -> Result<UserProfile, ApiError> {
        let request = self
            .inner
            .client
            .post(self.url("auth/register")?)
            .json(request);
        Self::json(self.send(request).await?).await
    }

    #[instrument(skip_all)]
    async fn change_password(
        &self,
        token: &AuthToken,
        current: &SecretString,
        new: &SecretString,
    ) -> Result<(), ApiError> {
        let body = serde_json::json!({
            "current_password": current.expose_secret(),
            "new_password": new.expose_secret(),
        });
        let request = self
            .inner
            .client
            .post(self.url("auth/change-password")?)
            .bearer_auth(token.expose())
            .json(&body);
        self.send(request).await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn reset_password(&self, email: &Email) -> Result<(), ApiError> {
        let request = self
            .inner
            .client
            .post(self.url("auth/reset-password")?)
            .json(&serde_json::json!({ "email": email.as_str() }));
        self.send(request).await?;
        Ok(())
    }

    #[instrument(skip_all)]
    async fn me(&self, token: &AuthToken) -> Result<UserProfile, ApiError> {
        self.get(self.url("users/me")?, Some(token)).await
    }

    #[instrument(skip(self, token))]
    async fn update_me(
        &self,
        token: &AuthToken,
        update: &ProfileUpdate,
    ) -> Result<UserProfile, ApiError> {
        let request = self
            .inner
            .client
            .put(self.url("users/me")?)
            .bearer_auth(token.expose())
            .json(update);
        Self::json(self.send(request).await?).await
    }

    #[instrument(skip(self, token))]
    async fn users(
        &self,
        token: &AuthToken,
        skip: u32,
        limit: u32,
    ) -> Result<Vec<UserProfile>, ApiError> {
        let url = self.url_with_query(
            "users",
            &[("skip", skip.to_string()), ("limit", limit.to_string())],
        )?;
        self.get(url, Some(token)).await
    }

    #[instrument(skip(self, token))]
    async fn set_user_active(
        &self,
        token: &AuthToken,
        id: UserId,
        active: bool,
    ) -> Result<UserProfile, ApiError> {
        let url = self.url_with_query(
            &format!("users/{id}/activate"),
            &[("activate", active.to_string())],
        )?;
        let request = self.inner.client.patch(url).bearer_auth(token.expose());
        Self::json(self.send(request).await?).await
    }

    #[instrument(skip(self, token))]
    async fn delete_user(&self, token: &AuthToken, id: UserId) -> Result<(), ApiError> {
        let request = self
            .inner
            .client
            .delete(self.url(&format!("users/{id}"))?)
            .bearer_auth(token.expose());
        self.send(request).await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn events(&self, skip: u32, limit: u32) -> Result<Vec<Event>, ApiError> {
        let cache_key = format!("events:{skip}:{limit}");

        if let Some(CacheValue::Events(events)) = self.inner.cache.get(&cache_key).await {
            debug!("Cache hit for events");
            return Ok(events);
        }

        let url = self.url_with_query(
            "events",
            &[("skip", skip.to_string()), ("limit", limit.to_string())],
        )?;
        let events: Vec<Event> = self.get(url, None).await?;

        self.inner
            .cache
            .insert(cache_key, CacheValue::Events(events.clone()))
            .await;

        Ok(events)
    }

    #[instrument(skip(self))]
    async fn event(&self, id: EventId) -> Result<Event, ApiError> {
        self.get(self.url(&format!("events/{id}"))?, None).await
    }

    // Search results are never cached: the term changes on every keystroke.
    #[instrument(skip(self))]
    async fn search_events(&self, term: &str) -> Result<Vec<Event>, ApiError> {
        let url = self.url_with_query("events/search", &[("q", term.to_string())])?;
        self.get(url, None).await
    }

    #[instrument(skip(self, token, payload), fields(title = %payload.title))]
    async fn create_event(&self, token: &AuthToken, payload: &EventPayload) -> Result<Event, ApiError> {
        let request = self
            .inner
            .client
            .post(self.url("events")?)
            .bearer_auth(token.expose())
            .json(payload);
        let event = Self::json(self.send(request).await?).await?;
        self.invalidate_listings().await;
        Ok(event)
    }

    #[instrument(skip(self, token, payload))]
    async fn update_event(
        &self,
        token: &AuthToken,
        id: EventId,
        payload: &EventPayload,
    ) -> Result<Event, ApiError> {
        let request = self
            .inner
            .client
            .put(self.url(&format!("events/{id}"))?)
            .bearer_auth(token.expose())
            .json(payload);
        let event = Self::json(self.send(request).await?).await?;
        self.invalidate_listings().await;
        Ok(event)
    }

    #[instrument(skip(self, token))]
    async fn update_event_attendees(
        &self,
        token: &AuthToken,
        id: EventId,
        attendees: u32,
    ) -> Result<Event, ApiError> {
        let request = self
            .inner
            .client
            .put(self.url(&format!("events/{id}"))?)
            .bearer_auth(token.expose())
            .json(&AttendeesUpdate { attendees });
        let event = Self::json(self.send(request).await?).await?;
        self.invalidate_listings().await;
        Ok(event)
    }

    #[instrument(skip(self, token))]
    async fn delete_event(&self, token: &AuthToken, id: EventId) -> Result<(), ApiError> {
        let request = self
            .inner
            .client
            .delete(self.url(&format!("events/{id}"))?)
            .bearer_auth(token.expose());
        self.send(request).await?;
        self.invalidate_listings().await;
        Ok(())
    }

    #[instrument(skip(self, token, order), fields(items = order.items.len()))]
    async fn create_order(
        &self,
        token: &AuthToken,
        order: &OrderRequest,
    ) -> Result<OrderResponse, ApiError> {
        let request = self
            .inner
            .client
            .post(self.url("orders")?)
            .bearer_auth(token.expose())
            .json(order);
        Self::json(self.send(request).await?).await
    }

    #[instrument(skip_all)]
    async fn my_tickets(&self, token: &AuthToken) -> Result<Vec<Ticket>, ApiError> {
        self.get(self.url("tickets/my-tickets")?, Some(token)).await
    }

    #[instrument(skip(self, token))]
    async fn cancel_ticket(&self, token: &AuthToken, id: TicketId) -> Result<(), ApiError> {
        let request = self
            .inner
            .client
            .delete(self.url(&format!("tickets/{id}"))?)
            .bearer_auth(token.expose());
        self.send(request).await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn categories(&self) -> Result<Vec<Category>, ApiError> {
        let cache_key = "categories".to_string();

        if let Some(CacheValue::Categories(categories)) = self.inner.cache.get(&cache_key).await {
            debug!("Cache hit for categories");
            return Ok(categories);
        }

        let categories: Vec<Category> = self.get(self.url("categories")?, None).await?;

        self.inner
            .cache
            .insert(cache_key, CacheValue::Categories(categories.clone()))
            .await;

        Ok(categories)
    }

    #[instrument(skip(self, token, payload), fields(name = %payload.name))]
    async fn create_category(
        &self,
        token: &AuthToken,
        payload: &CategoryPayload,
    ) -> Result<Category, ApiError> {
        let request = self
            .inner
            .client
            .post(self.url("categories")?)
            .bearer_auth(token.expose())
            .json(payload);
        let category = Self::json(self.send(request).await?).await?;
        self.invalidate_listings().await;
        Ok(category)
    }

    #[instrument(skip(self, token, payload))]
    async fn update_category(
        &self,
        token: &AuthToken,
        id: CategoryId,
        payload: &CategoryPayload,
    ) -> Result<Category, ApiError> {
        let request = self
            .inner
            .client
            .put(self.url(&format!("categories/{id}"))?)
            .bearer_auth(token.expose())
            .json(payload);
        let category = Self::json(self.send(request).await?).await?;
        self.invalidate_listings().await;
        Ok(category)
    }

    #[instrument(skip(self, token))]
    async fn delete_category(&self, token: &AuthToken, id: CategoryId) -> Result<(), ApiError> {
        let request = self
            .inner
            .client
            .delete(self.url(&format!("categories/{id}"))?)
            .bearer_auth(token.expose());
        self.send(request).await?;
        self.invalidate_listings().await;
        Ok(())
    }

    #[instrument(skip_all)]
    async fn admin_stats(&self, token: &AuthToken) -> Result<serde_json::Value, ApiError> {
        self.get(self.url("admin/stats")?, Some(token)).await
    }
}
