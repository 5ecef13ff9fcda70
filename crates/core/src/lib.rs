//! EventDesk Core - Shared types library.
//!
//! This crate provides common types used across all EventDesk components:
//! - `client` - Session, cart, checkout and navigation logic of the event client
//! - `cli` - Command-line front end driving the client
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no I/O, no HTTP
//! clients, no storage. This keeps it lightweight and allows it to be used
//! anywhere (including WASM front ends).
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for type-safe IDs, prices, emails, and statuses
//! - [`validation`] - Client-side form validation with per-field errors

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;
pub mod validation;

pub use types::*;
pub use validation::{EventDraft, FieldError, PasswordChangeForm, ValidationErrors};
