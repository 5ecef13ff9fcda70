//! EventDesk client library.
//!
//! Session, cart, checkout, search and navigation logic of the event
//! browser, independent of any UI. Front ends build an [`AppContext`] over
//! an [`EventApi`] implementation ([`HttpApi`] in production) and a
//! [`LocalStorage`] backend ([`FileStorage`] for durable state).

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod admin;
pub mod api;
pub mod cart;
pub mod checkout;
pub mod config;
pub mod context;
pub mod error;
pub mod guard;
pub mod interests;
pub mod models;
pub mod search;
pub mod sequence;
pub mod session;
pub mod storage;
pub mod tickets;

pub use api::{ApiError, AuthToken, EventApi, HttpApi};
pub use config::{ClientConfig, ConfigError};
pub use context::AppContext;
pub use error::ClientError;
pub use storage::{FileStorage, LocalStorage, MemoryStorage, StorageError};
