//! Per-user event interests and recommendations.
//!
//! A user picks categories they care about; recommended events are the
//! known events in those categories. Selections are saved per user under
//! `interests_<id>` and restored when that user signs in again.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, instrument, warn};

use eventdesk_core::{CategoryId, UserId};

use crate::models::{Category, Event, Identity};
use crate::storage::{LocalStorage, StorageError};

pub const INTERESTS_PREFIX: &str = "interests_";

#[must_use]
pub fn interests_key(id: UserId) -> String {
    format!("{INTERESTS_PREFIX}{id}")
}

/// Categories a user can be interested in.
#[must_use]
pub fn default_catalog() -> Vec<Category> {
    [
        (1, "Music", "music", "#FF5722"),
        (2, "Technology", "laptop", "#2196F3"),
        (3, "Sports", "futbol", "#4CAF50"),
        (4, "Food & Drink", "utensils", "#FFC107"),
        (5, "Art", "palette", "#9C27B0"),
        (6, "Business", "briefcase", "#607D8B"),
        (7, "Health", "heartbeat", "#E91E63"),
        (8, "Education", "graduation-cap", "#795548"),
    ]
    .into_iter()
    .map(|(id, name, icon, color)| Category {
        id: CategoryId::new(id),
        name: name.to_string(),
        color: color.to_string(),
        icon: Some(icon.to_string()),
    })
    .collect()
}

/// Interest selection of the signed-in user.
#[derive(Debug)]
pub struct InterestStore<S> {
    storage: Arc<S>,
    save_delay: Duration,
    catalog: Vec<Category>,
    user: Option<UserId>,
    selection: BTreeSet<CategoryId>,
    known_events: Vec<Event>,
    recommended: Vec<Event>,
}

impl<S: LocalStorage> InterestStore<S> {
    /// Create a store over the default catalog. `save_delay` is applied to
    /// every [`Self::save`].
    #[must_use]
    pub fn new(storage: Arc<S>, save_delay: Duration) -> Self {
        Self {
            storage,
            save_delay,
            catalog: default_catalog(),
            user: None,
            selection: BTreeSet::new(),
            known_events: Vec::new(),
            recommended: Vec::new(),
        }
    }

    #[must_use]
    pub fn catalog(&self) -> &[Category] {
        &self.catalog
    }

    /// Selected category ids, ascending.
    #[must_use]
    pub fn selection(&self) -> Vec<CategoryId> {
        self.selection.iter().copied().collect()
    }

    #[must_use]
    pub fn is_selected(&self, id: CategoryId) -> bool {
        self.selection.contains(&id)
    }

    /// Known events in a selected category, in known order.
    #[must_use]
    pub fn recommended_events(&self) -> &[Event] {
        &self.recommended
    }

    /// Select or deselect a category. Ids outside the catalog are ignored.
    pub fn toggle(&mut self, id: CategoryId) {
        if !self.in_catalog(id) {
            debug!(category_id = %id, "Ignoring unknown category");
            return;
        }
        if !self.selection.remove(&id) {
            self.selection.insert(id);
        }
        self.recompute();
    }

    /// Replace the selection and persist it for the signed-in user.
    ///
    /// The in-memory selection is replaced even if persisting fails.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the selection cannot be written.
    #[instrument(skip(self, selection))]
    pub async fn save(
        &mut self,
        selection: impl IntoIterator<Item = CategoryId> + Send,
    ) -> Result<(), StorageError> {
        let selection: BTreeSet<CategoryId> = selection
            .into_iter()
            .filter(|id| self.in_catalog(*id))
            .collect();

        tokio::time::sleep(self.save_delay).await;

        self.selection = selection;
        self.recompute();

        match self.user {
            Some(user) => {
                let ids = self.selection();
                self.storage.set_json(&interests_key(user), &ids)?;
                debug!(user_id = %user, count = ids.len(), "Saved interests");
            }
            None => debug!("No signed-in user, interests kept in memory only"),
        }
        Ok(())
    }

    /// Follow the signed-in identity.
    ///
    /// A new identity gets its saved selection back; no identity clears the
    /// selection and recommendations.
    pub fn sync_identity(&mut self, identity: Option<&Identity>) {
        let user = identity.map(|i| i.id);
        if user == self.user {
            return;
        }
        self.user = user;
        self.selection = user.map(|id| self.load_saved(id)).unwrap_or_default();
        self.recompute();
    }

    /// Replace the events recommendations are drawn from.
    pub fn set_known_events(&mut self, events: Vec<Event>) {
        self.known_events = events;
        self.recompute();
    }

    fn in_catalog(&self, id: CategoryId) -> bool {
        self.catalog.iter().any(|c| c.id == id)
    }

    fn load_saved(&self, user: UserId) -> BTreeSet<CategoryId> {
        match self.storage.get_json::<Vec<CategoryId>>(&interests_key(user)) {
            Ok(ids) => ids.unwrap_or_default().into_iter().collect(),
            Err(e) => {
                warn!(error = %e, user_id = %user, "Discarding unreadable interests");
                BTreeSet::new()
            }
        }
    }

    fn recompute(&mut self) {
        self.recommended = if self.user.is_none() || self.selection.is_empty() {
            Vec::new()
        } else {
            self.known_events
                .iter()
                .filter(|e| e.category_id.is_some_and(|c| self.selection.contains(&c)))
                .cloned()
                .collect()
        };
    }
}
