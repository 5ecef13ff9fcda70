//! Client-side form validation.
//!
//! Forms are validated before anything is submitted to the API. Every rule
//! that fails produces a [`FieldError`] keyed by the form field, so a front
//! end can show messages next to the offending inputs. Submission is
//! blocked until [`ValidationErrors`] is empty.

use core::fmt;

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use rust_decimal::Decimal;

use crate::CategoryId;

/// Shortest accepted event title, in characters.
pub const TITLE_MIN_CHARS: usize = 5;
/// Longest accepted event title, in characters.
pub const TITLE_MAX_CHARS: usize = 100;
/// Shortest accepted event description, in characters.
pub const DESCRIPTION_MIN_CHARS: usize = 20;
/// Largest accepted event capacity.
pub const CAPACITY_MAX: u32 = 10_000;
/// Largest accepted ticket price.
pub const PRICE_MAX: Decimal = Decimal::from_parts(10_000, 0, 0, false, 0);
/// Events created from a draft last this long by default.
pub const DEFAULT_EVENT_LENGTH_HOURS: i64 = 1;

/// A single failed rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    /// Form field the message belongs to.
    pub field: &'static str,
    /// Human-readable message.
    pub message: String,
}

/// All failed rules of one form submission, in field order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors {
    errors: Vec<FieldError>,
}

impl ValidationErrors {
    /// Record a failed rule.
    pub fn push(&mut self, field: &'static str, message: impl Into<String>) {
        self.errors.push(FieldError {
            field,
            message: message.into(),
        });
    }

    /// Whether no rule failed.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Number of failed rules.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.errors.len()
    }

    /// Message for a field, if it failed.
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&str> {
        self.errors
            .iter()
            .find(|e| e.field == field)
            .map(|e| e.message.as_str())
    }

    /// Iterate over the failed rules.
    pub fn iter(&self) -> impl Iterator<Item = &FieldError> {
        self.errors.iter()
    }

    /// `Ok(())` if empty, otherwise `Err(self)`.
    ///
    /// # Errors
    ///
    /// Returns `self` when at least one rule failed.
    pub fn into_result(self) -> Result<(), Self> {
        if self.is_empty() { Ok(()) } else { Err(self) }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let joined = self
            .errors
            .iter()
            .map(|e| format!("{}: {}", e.field, e.message))
            .collect::<Vec<_>>()
            .join("; ");
        write!(f, "validation failed: {joined}")
    }
}

impl std::error::Error for ValidationErrors {}

fn is_blank(value: &str) -> bool {
    value.trim().is_empty()
}

/// Event create/edit form as entered by an admin.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventDraft {
    pub title: String,
    pub description: String,
    pub start_date: Option<NaiveDate>,
    pub start_time: Option<NaiveTime>,
    pub location: String,
    pub address: String,
    pub category_id: Option<CategoryId>,
    pub capacity: Option<u32>,
    pub is_free: bool,
    pub price: Option<Decimal>,
}

impl EventDraft {
    /// Check every rule against the draft.
    ///
    /// `today` is the first day on which an event may start.
    ///
    /// # Errors
    ///
    /// Returns all failed rules.
    pub fn validate(&self, today: NaiveDate) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::default();

        let title_len = self.title.chars().count();
        if is_blank(&self.title) {
            errors.push("title", "Title is required");
        } else if title_len < TITLE_MIN_CHARS {
            errors.push(
                "title",
                format!("Title should be at least {TITLE_MIN_CHARS} characters long"),
            );
        } else if title_len > TITLE_MAX_CHARS {
            errors.push(
                "title",
                format!("Title should not exceed {TITLE_MAX_CHARS} characters"),
            );
        }

        if is_blank(&self.description) {
            errors.push("description", "Description is required");
        } else if self.description.chars().count() < DESCRIPTION_MIN_CHARS {
            errors.push(
                "description",
                format!("Description should be at least {DESCRIPTION_MIN_CHARS} characters long"),
            );
        }

        match self.start_date {
            None => errors.push("start_date", "Start date is required"),
            Some(date) if date < today => {
                errors.push("start_date", "Start date cannot be in the past");
            }
            Some(_) => {}
        }

        if self.start_time.is_none() {
            errors.push("start_time", "Start time is required");
        }

        if is_blank(&self.location) {
            errors.push("location", "Location is required");
        }

        if is_blank(&self.address) {
            errors.push("address", "Address is required");
        }

        if self.category_id.is_none() {
            errors.push("category_id", "Category is required");
        }

        match self.capacity {
            None => errors.push("capacity", "Capacity is required"),
            Some(0) => errors.push("capacity", "Capacity must be at least 1"),
            Some(c) if c > CAPACITY_MAX => {
                errors.push("capacity", "Capacity cannot exceed 10,000");
            }
            Some(_) => {}
        }

        if !self.is_free {
            match self.price {
                None => errors.push("price", "Price is required for paid events"),
                Some(p) if p.is_sign_negative() && !p.is_zero() => {
                    errors.push("price", "Price cannot be negative");
                }
                Some(p) if p > PRICE_MAX => errors.push("price", "Price cannot exceed 10,000"),
                Some(_) => {}
            }
        }

        errors.into_result()
    }

    /// Start and end instants of the event, if date and time are set.
    ///
    /// Drafts carry no end; events run for
    /// [`DEFAULT_EVENT_LENGTH_HOURS`] after the start.
    #[must_use]
    pub fn schedule(&self) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
        let start = self.start_date?.and_time(self.start_time?).and_utc();
        Some((start, start + Duration::hours(DEFAULT_EVENT_LENGTH_HOURS)))
    }

    /// Price to submit: zero for free events.
    #[must_use]
    pub fn effective_price(&self) -> Decimal {
        if self.is_free {
            Decimal::ZERO
        } else {
            self.price.unwrap_or_default()
        }
    }
}

/// First-time password change form.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PasswordChangeForm {
    pub password: String,
    pub confirm_password: String,
}

impl PasswordChangeForm {
    /// Check that a password was entered and confirmed.
    ///
    /// # Errors
    ///
    /// Returns the failed rules.
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::default();
        if self.password.is_empty() {
            errors.push("password", "Password is required");
        } else if self.password != self.confirm_password {
            errors.push("confirm_password", "Passwords do not match");
        }
        errors.into_result()
    }
}
