//! Durable key-value storage for client state.
//!
//! Every persisted entity lives under its own key, so a failed write can
//! only affect that entity. Values are strings; structured values are
//! stored as JSON through [`LocalStorage::get_json`] and
//! [`LocalStorage::set_json`].
//!
//! # Keys
//!
//! - `token` - bearer token of the signed-in user
//! - `user` - display snapshot of the signed-in user
//! - `cart` - cart lines
//! - `firstLoginCompleted_<id>` - first-login marker per user
//! - `interests_<id>` - saved category preferences per user

mod file;
mod memory;

pub use file::FileStorage;
pub use memory::MemoryStorage;

use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;

pub const TOKEN_KEY: &str = "token";
pub const USER_KEY: &str = "user";
pub const CART_KEY: &str = "cart";

/// Errors that can occur when reading or writing local storage.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Filesystem operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Value could not be encoded or decoded.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Key contains characters that cannot be stored.
    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    /// A previous writer panicked while holding the lock.
    #[error("Storage lock poisoned")]
    Poisoned,
}

/// Synchronous key-value store shared by the client's stores.
///
/// Implementations use interior mutability so a single instance can be
/// shared through an `Arc`.
pub trait LocalStorage: Send + Sync {
    /// Read the value stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backing store cannot be read.
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Store `value` under `key`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backing store cannot be written.
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Remove `key`. Removing a missing key is not an error.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backing store cannot be written.
    fn remove(&self, key: &str) -> Result<(), StorageError>;

    /// All keys currently stored.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backing store cannot be listed.
    fn keys(&self) -> Result<Vec<String>, StorageError>;

    /// Remove every key starting with `prefix`.
    ///
    /// # Errors
    ///
    /// Returns the first `StorageError` encountered.
    fn remove_prefixed(&self, prefix: &str) -> Result<(), StorageError> {
        for key in self.keys()? {
            if key.starts_with(prefix) {
                self.remove(&key)?;
            }
        }
        Ok(())
    }

    /// Read and decode a JSON value.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Serialization` if the stored value is not
    /// valid JSON for `T`.
    fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StorageError>
    where
        Self: Sized,
    {
        self.get(key)?
            .map(|raw| serde_json::from_str(&raw).map_err(StorageError::from))
            .transpose()
    }

    /// Encode and store a JSON value.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if encoding or writing fails.
    fn set_json<T: Serialize>(&self, key: &str, value: &T) -> Result<(), StorageError>
    where
        Self: Sized,
    {
        let raw = serde_json::to_string(value)?;
        self.set(key, &raw)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_remove_prefixed_leaves_other_keys() {
        let storage = MemoryStorage::new();
        storage.set("firstLoginCompleted_1", "true").unwrap();
        storage.set("firstLoginCompleted_2", "true").unwrap();
        storage.set(CART_KEY, "[]").unwrap();

        storage.remove_prefixed("firstLoginCompleted_").unwrap();

        assert_eq!(storage.keys().unwrap(), vec![CART_KEY.to_string()]);
    }

    #[test]
    fn test_json_helpers() {
        let storage = MemoryStorage::new();
        storage.set_json("interests_7", &vec![1, 3]).unwrap();
        let read: Option<Vec<i64>> = storage.get_json("interests_7").unwrap();
        assert_eq!(read, Some(vec![1, 3]));

        let missing: Option<Vec<i64>> = storage.get_json("interests_8").unwrap();
        assert!(missing.is_none());

        storage.set("interests_9", "{not json").unwrap();
        let err = storage.get_json::<Vec<i64>>("interests_9").unwrap_err();
        assert!(matches!(err, StorageError::Serialization(_)));
    }
}
