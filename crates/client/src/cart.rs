//! Shopping cart of event tickets.
//!
//! The cart is an ordered list of lines, at most one per event. It is
//! written to local storage under `cart` after every mutation and read back
//! when the client starts; a stored cart that fails to parse or breaks the
//! line invariants is discarded.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, instrument, warn};

use eventdesk_core::{EventId, Price};

use crate::api::OrderItem;
use crate::storage::{CART_KEY, LocalStorage, StorageError};

/// Errors from cart mutations.
#[derive(Debug, Error)]
pub enum CartError {
    /// Lines hold at least one ticket.
    #[error("Quantity must be at least 1")]
    InvalidQuantity,

    /// The cart could not be saved.
    #[error("Failed to save cart: {0}")]
    Storage(#[from] StorageError),
}

/// One event's tickets in the cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    #[serde(rename = "id")]
    pub event_id: EventId,
    pub title: String,
    #[serde(default, with = "eventdesk_core::timestamp::option")]
    pub date: Option<DateTime<Utc>>,
    #[serde(rename = "price")]
    pub unit_price: Price,
    pub quantity: u32,
}

impl CartLine {
    /// `unit_price × quantity`.
    #[must_use]
    pub fn total(&self) -> Price {
        self.unit_price.times(self.quantity)
    }
}

/// The cart, persisted to local storage.
#[derive(Debug)]
pub struct CartStore<S> {
    storage: Arc<S>,
    lines: Vec<CartLine>,
}

impl<S: LocalStorage> CartStore<S> {
    /// Rehydrate the cart from storage.
    ///
    /// Never fails: missing, unreadable or invalid data yields an empty cart.
    #[must_use]
    pub fn load(storage: Arc<S>) -> Self {
        let lines = match storage.get(CART_KEY) {
            Ok(Some(raw)) => parse_lines(&raw).unwrap_or_else(|reason| {
                warn!(%reason, "Discarding stored cart");
                Vec::new()
            }),
            Ok(None) => Vec::new(),
            Err(e) => {
                warn!(error = %e, "Failed to read stored cart");
                Vec::new()
            }
        };
        debug!(lines = lines.len(), "Loaded cart");
        Self { storage, lines }
    }

    #[must_use]
    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    #[must_use]
    pub fn line(&self, event_id: EventId) -> Option<&CartLine> {
        self.lines.iter().find(|l| l.event_id == event_id)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Total number of tickets.
    #[must_use]
    pub fn count(&self) -> u64 {
        self.lines.iter().map(|l| u64::from(l.quantity)).sum()
    }

    /// Sum of all line totals.
    #[must_use]
    pub fn subtotal(&self) -> Price {
        self.lines.iter().map(CartLine::total).sum()
    }

    /// Add tickets, merging into the event's existing line.
    ///
    /// # Errors
    ///
    /// `InvalidQuantity` if `quantity` is zero; `Storage` if saving fails
    /// (the in-memory cart is updated either way).
    #[instrument(skip(self, title, date))]
    pub fn add_line(
        &mut self,
        event_id: EventId,
        title: &str,
        date: Option<DateTime<Utc>>,
        unit_price: Price,
        quantity: u32,
    ) -> Result<(), CartError> {
        if quantity == 0 {
            return Err(CartError::InvalidQuantity);
        }

        if let Some(line) = self.lines.iter_mut().find(|l| l.event_id == event_id) {
            line.quantity = line.quantity.saturating_add(quantity);
        } else {
            self.lines.push(CartLine {
                event_id,
                title: title.to_string(),
                date,
                unit_price,
                quantity,
            });
        }

        self.persist()
    }

    /// Remove the event's line. Removing a missing line is a no-op.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Storage` if saving fails.
    #[instrument(skip(self))]
    pub fn remove_line(&mut self, event_id: EventId) -> Result<(), CartError> {
        self.lines.retain(|l| l.event_id != event_id);
        self.persist()
    }

    /// Replace a line's quantity; zero or less removes the line.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Storage` if saving fails.
    #[instrument(skip(self))]
    pub fn set_quantity(&mut self, event_id: EventId, quantity: i64) -> Result<(), CartError> {
        if quantity <= 0 {
            return self.remove_line(event_id);
        }

        let quantity = u32::try_from(quantity).unwrap_or(u32::MAX);
        match self.lines.iter_mut().find(|l| l.event_id == event_id) {
            Some(line) => {
                line.quantity = quantity;
                self.persist()
            }
            None => Ok(()),
        }
    }

    /// Empty the cart.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Storage` if saving fails.
    #[instrument(skip(self))]
    pub fn clear(&mut self) -> Result<(), CartError> {
        self.lines.clear();
        self.persist()
    }

    /// Lines as order items.
    #[must_use]
    pub fn order_items(&self) -> Vec<OrderItem> {
        self.lines
            .iter()
            .map(|l| OrderItem {
                event_id: l.event_id,
                quantity: l.quantity,
                price: l.unit_price.amount(),
            })
            .collect()
    }

    fn persist(&self) -> Result<(), CartError> {
        self.storage.set_json(CART_KEY, &self.lines)?;
        Ok(())
    }
}

/// Parse stored lines and check the cart invariants.
fn parse_lines(raw: &str) -> Result<Vec<CartLine>, String> {
    let lines: Vec<CartLine> = serde_json::from_str(raw).map_err(|e| e.to_string())?;

    let mut seen = HashSet::new();
    for line in &lines {
        if line.quantity == 0 {
            return Err(format!("line for event {} has zero quantity", line.event_id));
        }
        if !seen.insert(line.event_id) {
            return Err(format!("duplicate line for event {}", line.event_id));
        }
    }
    Ok(lines)
}
