//! The signed-in user's purchased tickets.

use tokio::sync::watch;
use tracing::{debug, instrument};

use eventdesk_core::TicketId;

use crate::api::{ApiError, AuthToken, EventApi};
use crate::models::Ticket;
use crate::sequence::RequestSequence;

/// Ticket list of the "my tickets" view.
///
/// Listings are sequenced: when two refreshes overlap only the one started
/// last updates the list.
#[derive(Debug)]
pub struct TicketsView<A> {
    api: A,
    sequence: RequestSequence,
    tickets: watch::Sender<Vec<Ticket>>,
}

impl<A: EventApi> TicketsView<A> {
    #[must_use]
    pub fn new(api: A) -> Self {
        let (tickets, _) = watch::channel(Vec::new());
        Self {
            api,
            sequence: RequestSequence::new(),
            tickets,
        }
    }

    /// Current list.
    #[must_use]
    pub fn tickets(&self) -> Vec<Ticket> {
        self.tickets.borrow().clone()
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Vec<Ticket>> {
        self.tickets.subscribe()
    }

    /// Reload the list.
    ///
    /// Returns `Ok(None)` when a newer refresh started while this one was
    /// in flight; its response is discarded.
    ///
    /// # Errors
    ///
    /// Returns the `ApiError` of the listing request.
    #[instrument(skip_all)]
    pub async fn refresh(&self, token: &AuthToken) -> Result<Option<Vec<Ticket>>, ApiError> {
        let generation = self.sequence.begin();
        let tickets = self.api.my_tickets(token).await?;

        if !self.sequence.is_current(generation) {
            debug!("Discarding stale ticket listing");
            return Ok(None);
        }
        debug!(count = tickets.len(), "Loaded tickets");
        self.tickets.send_replace(tickets.clone());
        Ok(Some(tickets))
    }

    /// Cancel a ticket and drop it from the list.
    ///
    /// # Errors
    ///
    /// Returns the `ApiError` of the cancel request; the list is unchanged.
    #[instrument(skip(self, token))]
    pub async fn cancel(&self, token: &AuthToken, id: TicketId) -> Result<(), ApiError> {
        self.api.cancel_ticket(token, id).await?;
        self.tickets.send_modify(|tickets| tickets.retain(|t| t.id != id));
        Ok(())
    }

    /// Forget the list and ignore responses still in flight.
    pub fn reset(&self) {
        self.sequence.invalidate();
        self.tickets.send_replace(Vec::new());
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use chrono::Utc;
    use eventdesk_core::{EventId, Price, Role};
    use secrecy::SecretString;

    use super::*;
    use crate::api::mock::MockApi;
    use crate::api::{CustomerInfo, OrderItem, OrderRequest};

    async fn buyer(api: &MockApi) -> AuthToken {
        api.add_user("Ada", "ada@example.com", "secret1", Role::User, true);
        api.add_event(MockApi::sample_event(1, "Expo", None, Price::ZERO, Utc::now()));
        api.add_event(MockApi::sample_event(2, "Gala", None, Price::ZERO, Utc::now()));
        let login = api
            .login("ada@example.com", &SecretString::from("secret1"))
            .await
            .unwrap();
        let token = AuthToken::new(login.access_token);

        let order = OrderRequest {
            items: [1, 2]
                .into_iter()
                .map(|id| OrderItem {
                    event_id: EventId::new(id),
                    quantity: 1,
                    price: rust_decimal::Decimal::ZERO,
                })
                .collect(),
            customer: CustomerInfo {
                name: "Ada".to_string(),
                email: "ada@example.com".to_string(),
                phone: None,
            },
            total: rust_decimal::Decimal::ZERO,
        };
        api.create_order(&token, &order).await.unwrap();
        token
    }

    #[tokio::test]
    async fn test_refresh_and_cancel() {
        let api = MockApi::new();
        let token = buyer(&api).await;
        let view = TicketsView::new(api.clone());

        let tickets = view.refresh(&token).await.unwrap().unwrap();
        assert_eq!(tickets.len(), 2);

        view.cancel(&token, tickets[0].id).await.unwrap();
        assert_eq!(view.tickets().len(), 1);
        assert_eq!(view.tickets()[0].id, tickets[1].id);
        assert_eq!(api.call_count("cancel_ticket"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_listing_is_discarded() {
        let api = MockApi::new();
        let token = buyer(&api).await;
        api.delay_tickets([Duration::from_millis(500), Duration::ZERO]);
        let view = TicketsView::new(api.clone());

        let slow = view.refresh(&token);
        let fast = async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            view.refresh(&token).await
        };
        let (slow, fast) = tokio::join!(slow, fast);

        assert!(slow.unwrap().is_none());
        assert_eq!(fast.unwrap().unwrap().len(), 2);
        assert_eq!(view.tickets().len(), 2);
    }

    #[tokio::test]
    async fn test_failures_leave_list_untouched() {
        let api = MockApi::new();
        let token = buyer(&api).await;
        let view = TicketsView::new(api.clone());
        view.refresh(&token).await.unwrap();

        api.fail("cancel_ticket");
        let id = view.tickets()[0].id;
        assert!(view.cancel(&token, id).await.is_err());
        assert_eq!(view.tickets().len(), 2);

        api.revoke_tokens();
        let err = view.refresh(&token).await.unwrap_err();
        assert!(err.is_unauthorized());
        assert_eq!(view.tickets().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_ignores_in_flight_listing() {
        let api = MockApi::new();
        let token = buyer(&api).await;
        api.delay_tickets([Duration::from_millis(500)]);
        let view = TicketsView::new(api.clone());

        let (listing, ()) = tokio::join!(view.refresh(&token), async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            view.reset();
        });

        assert!(listing.unwrap().is_none());
        assert!(view.tickets().is_empty());
    }
}
