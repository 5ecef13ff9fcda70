//! First-login heuristic.
//!
//! The API has no notion of a pending password change. Until it does, a
//! user is assumed to need one on their first sign-in on this device: the
//! marker `firstLoginCompleted_<id>` is written once the user sets a new
//! password, and its absence means "first login".
//!
//! This is a compatibility shim, not an authorization rule. When the
//! server states the flag explicitly, the server wins.

use tracing::warn;

use eventdesk_core::UserId;

use crate::storage::{LocalStorage, StorageError};

pub const FLAG_PREFIX: &str = "firstLoginCompleted_";

#[must_use]
pub fn flag_key(id: UserId) -> String {
    format!("{FLAG_PREFIX}{id}")
}

/// Whether the first-login marker for `id` is present.
///
/// Unreadable storage counts as absent.
pub fn is_completed<S: LocalStorage>(storage: &S, id: UserId) -> bool {
    match storage.get(&flag_key(id)) {
        Ok(value) => value.is_some_and(|v| v == "true"),
        Err(e) => {
            warn!(error = %e, user_id = %id, "Failed to read first-login marker");
            false
        }
    }
}

/// Resolve whether `id` must change their password now.
///
/// `server` is the flag reported by the API, if any.
pub fn requires_password_change<S: LocalStorage>(
    storage: &S,
    id: UserId,
    server: Option<bool>,
) -> bool {
    server.unwrap_or_else(|| !is_completed(storage, id))
}

/// Record that `id` has completed the first-login password change.
///
/// # Errors
///
/// Returns `StorageError` if the marker cannot be written.
pub fn mark_completed<S: LocalStorage>(storage: &S, id: UserId) -> Result<(), StorageError> {
    storage.set(&flag_key(id), "true")
}

/// Remove every first-login marker on this device.
///
/// # Errors
///
/// Returns `StorageError` if a marker cannot be removed.
pub fn clear_all<S: LocalStorage>(storage: &S) -> Result<(), StorageError> {
    storage.remove_prefixed(FLAG_PREFIX)
}
