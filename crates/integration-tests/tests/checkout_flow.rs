//! Buying tickets end to end: cart, order, capacity updates and tickets.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;

use eventdesk_client::MemoryStorage;
use eventdesk_client::api::OrderId;
use eventdesk_client::checkout::{CheckoutError, CheckoutState};
use eventdesk_client::session::AuthError;
use eventdesk_core::{CategoryId, EventId, TicketStatus};
use eventdesk_integration_tests::{add_user, api_with_catalog, event, open, sign_in};

#[tokio::test]
async fn test_checkout_completes_despite_failed_capacity_update() {
    let api = api_with_catalog();
    add_user(&api, "Ada", "ada@example.com");
    api.set_order_id(Some(OrderId::Text("ORD-1".to_string())));
    api.fail("update_event_attendees:1");

    let storage = Arc::new(MemoryStorage::new());
    let mut ctx = open(&api, &storage).await;
    sign_in(&mut ctx, "ada@example.com").await;
    ctx.add_to_cart(&event(&api, 1), 2).unwrap();
    ctx.add_to_cart(&event(&api, 2), 3).unwrap();

    let confirmation = ctx.checkout().await.unwrap();
    assert_eq!(confirmation.order_id, "ORD-1");
    assert_eq!(confirmation.total.to_string(), "$77.50");
    assert_eq!(confirmation.capacity_failures.len(), 1);
    assert_eq!(confirmation.capacity_failures[0].event_id, EventId::new(1));
    assert_eq!(
        ctx.checkout_state(),
        &CheckoutState::Complete {
            order_id: "ORD-1".to_string()
        }
    );

    // Cart is emptied, also for the next session on this device
    assert!(ctx.cart().is_empty());
    assert!(open(&api, &storage).await.cart().is_empty());

    // The other event's attendee count went through
    assert_eq!(api.stored_event(EventId::new(2)).unwrap().attendees, Some(3));
    assert_eq!(api.stored_event(EventId::new(1)).unwrap().attendees, None);

    let order = &api.orders()[0];
    assert_eq!(order.customer.name, "Ada");
    assert_eq!(order.customer.email, "ada@example.com");
    assert_eq!(order.items.len(), 2);
}

#[tokio::test]
async fn test_purchased_tickets_can_be_listed_and_cancelled() {
    let api = api_with_catalog();
    add_user(&api, "Ada", "ada@example.com");
    let storage = Arc::new(MemoryStorage::new());
    let mut ctx = open(&api, &storage).await;
    sign_in(&mut ctx, "ada@example.com").await;

    ctx.add_to_cart(&event(&api, 3), 2).unwrap();
    ctx.checkout().await.unwrap();

    let tickets = ctx.refresh_tickets().await.unwrap();
    assert_eq!(tickets.len(), 1);
    assert_eq!(tickets[0].event.title, "Art Expo");
    assert_eq!(tickets[0].quantity, 2);
    assert_eq!(tickets[0].status, TicketStatus::Active);
    assert_eq!(ctx.tickets().tickets(), tickets);

    ctx.cancel_ticket(tickets[0].id).await.unwrap();
    assert!(ctx.refresh_tickets().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_checkout_signed_out_keeps_cart() {
    let api = api_with_catalog();
    let storage = Arc::new(MemoryStorage::new());
    let mut ctx = open(&api, &storage).await;
    ctx.add_to_cart(&event(&api, 1), 1).unwrap();

    let err = ctx.checkout().await.unwrap_err();
    assert!(matches!(err, CheckoutError::Auth(AuthError::NotAuthenticated)));
    assert_eq!(ctx.cart().count(), 1);
    assert!(api.orders().is_empty());
}

#[tokio::test]
async fn test_rejected_order_keeps_cart_for_retry() {
    let api = api_with_catalog();
    add_user(&api, "Ada", "ada@example.com");
    api.fail("create_order");
    let storage = Arc::new(MemoryStorage::new());
    let mut ctx = open(&api, &storage).await;
    sign_in(&mut ctx, "ada@example.com").await;
    ctx.add_to_cart(&event(&api, 2), 1).unwrap();

    let err = ctx.checkout().await.unwrap_err();
    assert!(matches!(err, CheckoutError::OrderFailed { .. }));
    assert_eq!(ctx.checkout_state(), &CheckoutState::Editing);
    assert_eq!(ctx.cart().count(), 1);
    assert_eq!(api.call_count("update_event_attendees"), 0);
}

#[tokio::test]
async fn test_revoked_session_is_signed_out_on_checkout() {
    let api = api_with_catalog();
    add_user(&api, "Ada", "ada@example.com");
    let storage = Arc::new(MemoryStorage::new());
    let mut ctx = open(&api, &storage).await;
    sign_in(&mut ctx, "ada@example.com").await;
    ctx.add_to_cart(&event(&api, 2), 1).unwrap();

    ctx.load_events(0, 50).await.unwrap();
    ctx.save_interests(vec![CategoryId::new(1)]).await.unwrap();
    assert_eq!(ctx.interests().recommended_events().len(), 2);

    api.revoke_tokens();
    let err = ctx.checkout().await.unwrap_err();
    assert!(matches!(err, CheckoutError::Auth(AuthError::SessionExpired)));
    assert!(!ctx.session().is_authenticated());
    assert_eq!(ctx.cart().count(), 1);
    assert!(ctx.interests().selection().is_empty());
    assert!(ctx.interests().recommended_events().is_empty());
}

#[tokio::test]
async fn test_revoked_session_on_tickets_drops_user_state() {
    let api = api_with_catalog();
    add_user(&api, "Ada", "ada@example.com");
    let storage = Arc::new(MemoryStorage::new());
    let mut ctx = open(&api, &storage).await;
    sign_in(&mut ctx, "ada@example.com").await;

    ctx.add_to_cart(&event(&api, 3), 1).unwrap();
    ctx.checkout().await.unwrap();
    assert_eq!(ctx.refresh_tickets().await.unwrap().len(), 1);
    ctx.load_events(0, 50).await.unwrap();
    ctx.save_interests(vec![CategoryId::new(1)]).await.unwrap();
    assert_eq!(ctx.interests().recommended_events().len(), 2);

    api.revoke_tokens();
    let err = ctx.refresh_tickets().await.unwrap_err();
    assert!(matches!(err, AuthError::SessionExpired));
    assert!(!ctx.session().is_authenticated());
    assert!(ctx.interests().selection().is_empty());
    assert!(ctx.interests().recommended_events().is_empty());
    assert!(ctx.tickets().tickets().is_empty());
    assert_eq!(ctx.checkout_state(), &CheckoutState::Editing);

    // Signing back in restores the saved selection
    sign_in(&mut ctx, "ada@example.com").await;
    assert_eq!(ctx.interests().selection(), vec![CategoryId::new(1)]);
}
