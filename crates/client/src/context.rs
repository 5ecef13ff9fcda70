//! Application context: owns the API handle, local storage and every store.
//!
//! Front ends build one `AppContext` at startup and pass it down instead of
//! reaching for globals. Operations that touch several stores (signing in
//! updates interests, checkout empties the cart) go through the context so
//! the stores stay consistent. Any of them may end the session on a `401`;
//! the context then drops the interests, tickets and checkout of the user
//! that was signed in.

use std::sync::Arc;

use secrecy::SecretString;
use tracing::{info, instrument};

use eventdesk_core::{CategoryId, EventId, PasswordChangeForm, Role, TicketId};

use crate::admin::AdminConsole;
use crate::api::{EventApi, ProfileUpdate};
use crate::cart::{CartError, CartStore};
use crate::checkout::{CheckoutError, CheckoutFlow, CheckoutState, OrderConfirmation};
use crate::config::ClientConfig;
use crate::error::{ClientError, add_breadcrumb};
use crate::guard::{GuardDecision, RouteTable};
use crate::interests::InterestStore;
use crate::models::{Event, Identity, Ticket};
use crate::search::SearchController;
use crate::session::{AuthError, SessionStore};
use crate::storage::{LocalStorage, StorageError};
use crate::tickets::TicketsView;

const TICKETS_FAILED: &str = "Failed to load tickets";
const CANCEL_FAILED: &str = "Failed to cancel ticket";

/// Everything a running client needs.
#[derive(Debug)]
pub struct AppContext<A, S> {
    api: A,
    config: ClientConfig,
    routes: RouteTable,
    session: SessionStore<A, S>,
    cart: CartStore<S>,
    interests: InterestStore<S>,
    checkout: CheckoutFlow<A>,
    tickets: TicketsView<A>,
    admin: AdminConsole<A>,
    events: Vec<Event>,
}

impl<A, S> AppContext<A, S>
where
    A: EventApi + Clone + 'static,
    S: LocalStorage,
{
    /// Build the stores. The cart is read back from storage; the session
    /// stays `Loading` until [`Self::init`].
    #[must_use]
    pub fn new(api: A, storage: Arc<S>, config: ClientConfig) -> Self {
        Self {
            session: SessionStore::new(api.clone(), Arc::clone(&storage)),
            cart: CartStore::load(Arc::clone(&storage)),
            interests: InterestStore::new(storage, config.interest_save_delay),
            checkout: CheckoutFlow::new(api.clone()),
            tickets: TicketsView::new(api.clone()),
            admin: AdminConsole::new(api.clone()),
            routes: RouteTable::default(),
            events: Vec::new(),
            api,
            config,
        }
    }

    /// Resolve the stored session.
    #[instrument(skip(self))]
    pub async fn init(&mut self) {
        self.session.initialize().await;
        self.sync_interests();
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    #[must_use]
    pub const fn config(&self) -> &ClientConfig {
        &self.config
    }

    #[must_use]
    pub const fn session(&self) -> &SessionStore<A, S> {
        &self.session
    }

    #[must_use]
    pub const fn cart(&self) -> &CartStore<S> {
        &self.cart
    }

    pub const fn cart_mut(&mut self) -> &mut CartStore<S> {
        &mut self.cart
    }

    #[must_use]
    pub const fn interests(&self) -> &InterestStore<S> {
        &self.interests
    }

    pub const fn interests_mut(&mut self) -> &mut InterestStore<S> {
        &mut self.interests
    }

    #[must_use]
    pub const fn tickets(&self) -> &TicketsView<A> {
        &self.tickets
    }

    #[must_use]
    pub const fn checkout_state(&self) -> &CheckoutState {
        self.checkout.state()
    }

    /// Events from the last [`Self::load_events`].
    #[must_use]
    pub fn events(&self) -> &[Event] {
        &self.events
    }

    /// Admin console with the session it acts for. The other stores are
    /// brought back in line with the session when the scope is dropped.
    pub fn admin(&mut self) -> AdminScope<'_, A, S> {
        AdminScope { ctx: self }
    }

    // =========================================================================
    // Session
    // =========================================================================

    /// Sign in and load the user's interests.
    ///
    /// # Errors
    ///
    /// As [`SessionStore::login`]. On `AccountInactive` the session is still
    /// established.
    pub async fn login(
        &mut self,
        email: &str,
        password: SecretString,
        remember: bool,
    ) -> Result<Identity, AuthError> {
        let result = self.session.login(email, password, remember).await;
        self.sync_interests();
        result
    }

    /// Create an account and sign in with it.
    ///
    /// # Errors
    ///
    /// As [`SessionStore::register`].
    pub async fn register(
        &mut self,
        name: &str,
        email: &str,
        password: SecretString,
        role: Role,
    ) -> Result<Identity, AuthError> {
        let result = self.session.register(name, email, password, role).await;
        self.sync_interests();
        result
    }

    /// Sign out and drop everything tied to the user.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Storage` if persisted session keys cannot be
    /// removed; the in-memory state is cleared regardless.
    pub fn logout(&mut self) -> Result<(), AuthError> {
        let result = self.session.logout();
        self.sync_interests();
        self.tickets.reset();
        self.checkout.reset();
        result
    }

    /// Update the signed-in user's profile.
    ///
    /// # Errors
    ///
    /// As [`SessionStore::update_profile`].
    pub async fn update_profile(&mut self, update: &ProfileUpdate) -> Result<Identity, AuthError> {
        let result = self.session.update_profile(update).await;
        self.reconcile_session();
        result
    }

    /// Set the password required on first login.
    ///
    /// # Errors
    ///
    /// As [`SessionStore::complete_first_login`].
    pub async fn complete_first_login(
        &mut self,
        form: &PasswordChangeForm,
    ) -> Result<Identity, AuthError> {
        let result = self.session.complete_first_login(form).await;
        self.reconcile_session();
        result
    }

    /// Change the signed-in user's password.
    ///
    /// # Errors
    ///
    /// As [`SessionStore::change_password`].
    pub async fn change_password(
        &mut self,
        current: &SecretString,
        new: &SecretString,
    ) -> Result<(), AuthError> {
        let result = self.session.change_password(current, new).await;
        self.reconcile_session();
        result
    }

    /// Where navigating to `path` leads.
    #[must_use]
    pub fn guard(&self, path: &str) -> GuardDecision {
        let decision = self.routes.decide(&self.session.snapshot(), path);
        if let GuardDecision::Redirect { to, .. } = &decision {
            add_breadcrumb("navigation", "Redirected", &[("from", path), ("to", to.as_str())]);
        }
        decision
    }

    // =========================================================================
    // Catalog
    // =========================================================================

    /// Load a page of events; they also feed recommendations.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Api` if the listing fails.
    #[instrument(skip(self))]
    pub async fn load_events(&mut self, skip: u32, limit: u32) -> Result<&[Event], ClientError> {
        let events = self.api.events(skip, limit).await?;
        self.interests.set_known_events(events.clone());
        self.events = events;
        Ok(&self.events)
    }

    /// Look up a single event.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Api` if the request fails.
    pub async fn event(&self, id: EventId) -> Result<Event, ClientError> {
        Ok(self.api.event(id).await?)
    }

    /// A search controller using the configured debounce.
    #[must_use]
    pub fn search(&self) -> SearchController<A> {
        SearchController::new(self.api.clone(), self.config.search_debounce)
    }

    /// Save the interest selection of the signed-in user.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the selection cannot be written.
    pub async fn save_interests(
        &mut self,
        selection: Vec<CategoryId>,
    ) -> Result<(), StorageError> {
        self.interests.save(selection).await
    }

    // =========================================================================
    // Cart & checkout
    // =========================================================================

    /// Put `quantity` tickets for `event` in the cart.
    ///
    /// # Errors
    ///
    /// As [`CartStore::add_line`].
    pub fn add_to_cart(&mut self, event: &Event, quantity: u32) -> Result<(), CartError> {
        self.cart.add_line(
            event.id,
            &event.title,
            Some(event.start_date),
            event.price,
            quantity,
        )?;
        let event_id = event.id.to_string();
        add_breadcrumb("cart", "Added to cart", &[("event_id", event_id.as_str())]);
        Ok(())
    }

    /// Place an order for the cart.
    ///
    /// # Errors
    ///
    /// As [`CheckoutFlow::submit`].
    pub async fn checkout(&mut self) -> Result<OrderConfirmation, CheckoutError> {
        add_breadcrumb("checkout", "Submitting order", &[]);
        let result = self.checkout.submit(&mut self.cart, &mut self.session).await;
        self.reconcile_session();
        result
    }

    /// Start a new checkout after a completed one.
    pub fn reset_checkout(&mut self) {
        self.checkout.reset();
    }

    // =========================================================================
    // Tickets
    // =========================================================================

    /// Reload the signed-in user's tickets.
    ///
    /// # Errors
    ///
    /// `NotAuthenticated` when signed out, `SessionExpired` on `401`, and
    /// `Request` otherwise.
    pub async fn refresh_tickets(&mut self) -> Result<Vec<Ticket>, AuthError> {
        let token = self.session.credentials()?.0.clone();
        let result = match self.tickets.refresh(&token).await {
            Ok(Some(tickets)) => Ok(tickets),
            Ok(None) => Ok(self.tickets.tickets()),
            Err(e) => Err(self.session.api_failure(e, TICKETS_FAILED)),
        };
        self.reconcile_session();
        result
    }

    /// Cancel one of the signed-in user's tickets.
    ///
    /// # Errors
    ///
    /// As [`Self::refresh_tickets`].
    pub async fn cancel_ticket(&mut self, id: TicketId) -> Result<(), AuthError> {
        let token = self.session.credentials()?.0.clone();
        let result = self
            .tickets
            .cancel(&token, id)
            .await
            .map_err(|e| self.session.api_failure(e, CANCEL_FAILED));
        self.reconcile_session();
        result
    }

    /// Tear the context down. Nothing is persisted beyond what each store
    /// already wrote, and responses still in flight are ignored.
    pub fn dispose(self) {
        self.tickets.reset();
        info!("Client context disposed");
    }

    fn sync_interests(&mut self) {
        self.interests.sync_identity(self.session.identity());
    }

    /// Align the other stores with the session after a call that may have
    /// expired it.
    fn reconcile_session(&mut self) {
        self.sync_interests();
        if !self.session.is_authenticated() {
            self.tickets.reset();
            self.checkout.reset();
        }
    }
}

/// Borrow of the admin console returned by [`AppContext::admin`].
#[derive(Debug)]
pub struct AdminScope<'a, A, S>
where
    A: EventApi + Clone + 'static,
    S: LocalStorage,
{
    ctx: &'a mut AppContext<A, S>,
}

impl<A, S> AdminScope<'_, A, S>
where
    A: EventApi + Clone + 'static,
    S: LocalStorage,
{
    /// The console and the session its calls authenticate with.
    pub fn split(&mut self) -> (&AdminConsole<A>, &mut SessionStore<A, S>) {
        (&self.ctx.admin, &mut self.ctx.session)
    }
}

impl<A, S> Drop for AdminScope<'_, A, S>
where
    A: EventApi + Clone + 'static,
    S: LocalStorage,
{
    fn drop(&mut self) {
        self.ctx.reconcile_session();
    }
}
