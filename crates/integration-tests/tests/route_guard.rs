//! Navigation decisions for the signed-in user's state.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;

use secrecy::SecretString;

use eventdesk_client::MemoryStorage;
use eventdesk_client::guard::GuardDecision;
use eventdesk_client::session::{AuthError, first_login};
use eventdesk_core::{PasswordChangeForm, Role};
use eventdesk_integration_tests::{PASSWORD, add_admin, add_user, api_with_catalog, open, sign_in};

fn redirect_target(decision: &GuardDecision) -> Option<&str> {
    match decision {
        GuardDecision::Redirect { to, .. } => Some(to.as_str()),
        _ => None,
    }
}

async fn set_new_password(ctx: &mut eventdesk_integration_tests::TestContext) {
    let form = PasswordChangeForm {
        password: "brand-new-1".to_string(),
        confirm_password: "brand-new-1".to_string(),
    };
    ctx.complete_first_login(&form).await.unwrap();
}

#[tokio::test]
async fn test_signed_out_user_is_sent_to_login_with_return_path() {
    let api = api_with_catalog();
    let storage = Arc::new(MemoryStorage::new());
    let ctx = open(&api, &storage).await;

    assert_eq!(ctx.guard("/events"), GuardDecision::Allow);
    assert_eq!(
        ctx.guard("/my-tickets"),
        GuardDecision::Redirect {
            to: "/login".to_string(),
            return_to: Some("/my-tickets".to_string()),
        }
    );
}

#[tokio::test]
async fn test_admin_with_pending_password_change_goes_to_change_password() {
    let api = api_with_catalog();
    add_admin(&api, "Grace", "grace@example.com");
    let storage = Arc::new(MemoryStorage::new());
    let mut ctx = open(&api, &storage).await;

    sign_in(&mut ctx, "grace@example.com").await;
    assert!(ctx.session().requires_password_change_now());
    assert_eq!(redirect_target(&ctx.guard("/events/create")), Some("/change-password"));
    assert_eq!(ctx.guard("/change-password"), GuardDecision::Allow);

    set_new_password(&mut ctx).await;
    assert_eq!(ctx.guard("/events/create"), GuardDecision::Allow);
}

#[tokio::test]
async fn test_non_admin_is_unauthorized_for_admin_routes() {
    let api = api_with_catalog();
    add_user(&api, "Ada", "ada@example.com");
    let storage = Arc::new(MemoryStorage::new());
    let mut ctx = open(&api, &storage).await;

    sign_in(&mut ctx, "ada@example.com").await;
    set_new_password(&mut ctx).await;
    assert_eq!(redirect_target(&ctx.guard("/events/create")), Some("/unauthorized"));
    assert_eq!(ctx.guard("/my-tickets"), GuardDecision::Allow);
}

#[tokio::test]
async fn test_inactive_user_is_sent_to_dashboard() {
    let api = api_with_catalog();
    let ada = api.add_user("Ada", "ada@example.com", PASSWORD, Role::User, true);
    let storage = Arc::new(MemoryStorage::new());
    // First login already completed on this device
    first_login::mark_completed(storage.as_ref(), ada.id).unwrap();
    api.set_login_is_active(Some(false));

    let mut ctx = open(&api, &storage).await;
    let err = ctx
        .login("ada@example.com", SecretString::from(PASSWORD), false)
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::AccountInactive));
    assert!(ctx.session().is_authenticated());
    assert!(!ctx.session().requires_password_change_now());

    assert_eq!(
        ctx.guard("/my-tickets"),
        GuardDecision::Redirect {
            to: "/dashboard".to_string(),
            return_to: None,
        }
    );
    assert_eq!(ctx.guard("/dashboard"), GuardDecision::Allow);
    assert_eq!(ctx.guard("/events"), GuardDecision::Allow);
}
