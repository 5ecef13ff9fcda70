//! Checkout: turn the cart into an order.
//!
//! ```text
//! Editing ──submit──▶ Submitting ──ok──▶ Complete { order_id }
//!    ▲                    │
//!    └───────failure──────┘
//! ```
//!
//! After the order is accepted every purchased event's attendee count is
//! bumped by a separate request. Those updates are best effort: a failure
//! is logged and reported in the confirmation but never fails the
//! checkout.

use chrono::Utc;
use rand::Rng;
use thiserror::Error;
use tracing::{info, instrument, warn};

use eventdesk_core::{EventId, Price};

use crate::api::{ApiError, AuthToken, CustomerInfo, EventApi, OrderRequest};
use crate::cart::CartStore;
use crate::session::{AuthError, SessionStore};
use crate::storage::LocalStorage;

const ORDER_FAILED: &str = "Failed to place order";

/// Errors from [`CheckoutFlow::submit`].
#[derive(Debug, Error)]
pub enum CheckoutError {
    #[error("Your cart is empty")]
    EmptyCart,

    /// A submission is in progress or the last one completed; call
    /// [`CheckoutFlow::reset`] first.
    #[error("Checkout is not accepting a new submission")]
    NotEditing,

    /// The order request was rejected.
    #[error("{message}")]
    OrderFailed { message: String },

    #[error(transparent)]
    Auth(#[from] AuthError),
}

/// Where the flow is.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum CheckoutState {
    #[default]
    Editing,
    Submitting,
    Complete {
        order_id: String,
    },
}

/// A capacity update that did not go through.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapacityFailure {
    pub event_id: EventId,
    pub message: String,
}

/// Result of a completed checkout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderConfirmation {
    /// Server order id, or a display-only `SPN-` placeholder when the
    /// server returned none.
    pub order_id: String,
    pub total: Price,
    pub capacity_failures: Vec<CapacityFailure>,
}

/// Checkout state machine.
#[derive(Debug)]
pub struct CheckoutFlow<A> {
    api: A,
    state: CheckoutState,
    last_error: Option<String>,
}

impl<A: EventApi> CheckoutFlow<A> {
    #[must_use]
    pub const fn new(api: A) -> Self {
        Self {
            api,
            state: CheckoutState::Editing,
            last_error: None,
        }
    }

    #[must_use]
    pub const fn state(&self) -> &CheckoutState {
        &self.state
    }

    /// Message of the last failed submission.
    #[must_use]
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Place an order for everything in `cart`.
    ///
    /// On success the cart is emptied and the flow is `Complete`. On
    /// failure the flow returns to `Editing` with the cart untouched.
    ///
    /// # Errors
    ///
    /// - `EmptyCart` if there is nothing to buy
    /// - `NotEditing` unless the flow is in `Editing`
    /// - `Auth(NotAuthenticated)` when signed out
    /// - `Auth(SessionExpired)` when the token has expired or is rejected
    /// - `OrderFailed` when the server refuses the order
    #[instrument(skip_all)]
    pub async fn submit<S: LocalStorage>(
        &mut self,
        cart: &mut CartStore<S>,
        session: &mut SessionStore<A, S>,
    ) -> Result<OrderConfirmation, CheckoutError> {
        if cart.is_empty() {
            return Err(CheckoutError::EmptyCart);
        }
        if self.state != CheckoutState::Editing {
            return Err(CheckoutError::NotEditing);
        }

        let (token, identity) = session.credentials()?;
        if token.is_expired_at(Utc::now()) {
            warn!("Bearer token expired before checkout");
            session.expire();
            return Err(self.fail(AuthError::SessionExpired.into()));
        }
        let token = token.clone();

        let total = cart.subtotal();
        let order = OrderRequest {
            items: cart.order_items(),
            customer: CustomerInfo {
                name: identity.name.clone(),
                email: identity.email.clone(),
                phone: None,
            },
            total: total.amount(),
        };

        self.state = CheckoutState::Submitting;
        self.last_error = None;

        let response = match self.api.create_order(&token, &order).await {
            Ok(response) => response,
            Err(e) => {
                let error = match session.api_failure(e, ORDER_FAILED) {
                    AuthError::Request { message } => CheckoutError::OrderFailed { message },
                    other => other.into(),
                };
                return Err(self.fail(error));
            }
        };

        let mut capacity_failures = Vec::new();
        for item in &order.items {
            if let Err(e) = self.add_attendees(&token, item.event_id, item.quantity).await {
                warn!(event_id = %item.event_id, error = %e, "Failed to update event capacity");
                capacity_failures.push(CapacityFailure {
                    event_id: item.event_id,
                    message: e.message_or("Failed to update event capacity"),
                });
            }
        }

        if let Err(e) = cart.clear() {
            warn!(error = %e, "Order placed but cart could not be cleared");
        }

        let order_id = response
            .id
            .map(|id| id.to_string())
            .filter(|id| !id.is_empty())
            .unwrap_or_else(placeholder_order_id);

        info!(order_id = %order_id, total = %total, "Order placed");
        self.state = CheckoutState::Complete {
            order_id: order_id.clone(),
        };

        Ok(OrderConfirmation {
            order_id,
            total,
            capacity_failures,
        })
    }

    /// Return to `Editing` for another order.
    pub fn reset(&mut self) {
        self.state = CheckoutState::Editing;
        self.last_error = None;
    }

    /// Increment `attendees` of `event_id` by `quantity`.
    async fn add_attendees(
        &self,
        token: &AuthToken,
        event_id: EventId,
        quantity: u32,
    ) -> Result<(), ApiError> {
        let event = self.api.event(event_id).await?;
        let attendees = event.attendees.unwrap_or(0).saturating_add(quantity);
        self.api
            .update_event_attendees(token, event_id, attendees)
            .await?;
        Ok(())
    }

    fn fail(&mut self, error: CheckoutError) -> CheckoutError {
        self.state = CheckoutState::Editing;
        self.last_error = Some(error.to_string());
        error
    }
}

/// Display-only stand-in shown when the server accepts an order without
/// returning its id. It is not an order reference and cannot be looked up.
fn placeholder_order_id() -> String {
    format!("SPN-{}", rand::rng().random_range(0..10_000))
}
