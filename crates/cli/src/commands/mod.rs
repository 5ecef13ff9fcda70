//! CLI command implementations.
//!
//! Commands write their results to the `out` writer they are given and
//! leave logging to `tracing` (stderr).

use std::io::Write;

use thiserror::Error;

use eventdesk_client::admin::AdminError;
use eventdesk_client::cart::CartError;
use eventdesk_client::checkout::CheckoutError;
use eventdesk_client::models::Event;
use eventdesk_client::session::AuthError;
use eventdesk_client::{ApiError, AppContext, ClientError, FileStorage, HttpApi, StorageError};

pub mod account;
pub mod admin;
pub mod cart;
pub mod catalog;
pub mod orders;

/// Context the CLI runs against.
pub type Context = AppContext<HttpApi, FileStorage>;

/// Errors that end a CLI command.
#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Client(#[from] ClientError),

    /// Writing to stdout failed.
    #[error("Failed to write output: {0}")]
    Output(#[from] std::io::Error),
}

macro_rules! from_client_error {
    ($($source:ty),* $(,)?) => {
        $(
            impl From<$source> for CliError {
                fn from(err: $source) -> Self {
                    Self::Client(err.into())
                }
            }
        )*
    };
}

from_client_error!(ApiError, AuthError, CartError, CheckoutError, AdminError, StorageError);

impl CliError {
    /// Send to Sentry (when unexpected) and log.
    pub fn report(&self) {
        match self {
            Self::Client(err) => err.report(),
            Self::Output(err) => tracing::error!(error = %err, "Failed to write output"),
        }
    }

    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Client(err) => err.user_message(),
            Self::Output(err) => err.to_string(),
        }
    }
}

/// One-line summary of an event.
pub fn write_event_line(out: &mut impl Write, event: &Event) -> std::io::Result<()> {
    let id = format!("#{}", event.id);
    writeln!(
        out,
        "{id:<7} {}  {}  {}  @ {}",
        event.start_date.format("%Y-%m-%d %H:%M"),
        event.price,
        event.title,
        event.location,
    )
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::{TimeZone, Utc};
    use eventdesk_core::{EventId, Price};

    use super::*;

    #[test]
    fn test_write_event_line() {
        let event = Event {
            id: EventId::new(7),
            title: "Jazz Night".to_string(),
            description: String::new(),
            start_date: Utc.with_ymd_and_hms(2025, 8, 5, 20, 0, 0).unwrap(),
            end_date: None,
            location: "Rooftop Garden".to_string(),
            capacity: None,
            price: Price::from_cents(1250).unwrap(),
            is_published: true,
            category_id: None,
            organizer_id: None,
            attendees: None,
        };

        let mut out = Vec::new();
        write_event_line(&mut out, &event).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "#7      2025-08-05 20:00  $12.50  Jazz Night  @ Rooftop Garden\n"
        );
    }

    #[test]
    fn test_errors_keep_client_messages() {
        let err = CliError::from(CartError::InvalidQuantity);
        assert_eq!(err.user_message(), "Quantity must be at least 1");
    }
}
