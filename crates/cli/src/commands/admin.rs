//! Admin commands.
//!
//! # Usage
//!
//! ```bash
//! eventdesk admin stats
//! eventdesk admin users --limit 50
//! eventdesk admin deactivate 42
//! eventdesk admin create-event --title "Jazz Night" --description "..." \
//!     --date 2026-08-05 --time 20:00 --location "Rooftop Garden" \
//!     --address "1 Main St" --category 1 --capacity 120 --price 12.50
//! ```
//!
//! All actions need an admin session; sign in with `eventdesk login` first.

use std::io::Write;

use chrono::{NaiveDate, NaiveTime};
use clap::Subcommand;
use rust_decimal::Decimal;

use eventdesk_client::api::CategoryPayload;
use eventdesk_client::models::UserProfile;
use eventdesk_core::{CategoryId, EventDraft, EventId, UserId};

use super::{CliError, Context, write_event_line};

#[derive(Subcommand)]
pub enum AdminAction {
    /// Dashboard statistics
    Stats,
    /// List user accounts
    Users {
        #[arg(long, default_value_t = 0)]
        skip: u32,

        #[arg(long, default_value_t = 100)]
        limit: u32,
    },
    /// Reactivate an account
    Activate { id: i64 },
    /// Deactivate an account
    Deactivate { id: i64 },
    /// Delete an account
    DeleteUser { id: i64 },
    /// Create an event
    CreateEvent {
        #[arg(long)]
        title: String,

        #[arg(long)]
        description: String,

        /// Start date (YYYY-MM-DD)
        #[arg(long)]
        date: NaiveDate,

        /// Start time (HH:MM)
        #[arg(long, value_parser = parse_time)]
        time: NaiveTime,

        #[arg(long)]
        location: String,

        #[arg(long)]
        address: String,

        #[arg(long)]
        category: i64,

        #[arg(long)]
        capacity: u32,

        /// Ticket price; omit for a free event
        #[arg(long)]
        price: Option<Decimal>,
    },
    /// Delete an event
    DeleteEvent { id: i64 },
    /// List categories
    Categories,
    /// Create a category
    CreateCategory {
        #[arg(long)]
        name: String,

        /// Hex color, e.g. #FF5722
        #[arg(long)]
        color: String,

        #[arg(long)]
        icon: Option<String>,
    },
    /// Delete a category
    DeleteCategory { id: i64 },
}

fn write_activation(out: &mut impl Write, user: &UserProfile) -> std::io::Result<()> {
    let state = if user.is_active { "active" } else { "inactive" };
    writeln!(out, "{} <{}> is now {state}", user.name, user.email)
}

fn parse_time(s: &str) -> Result<NaiveTime, chrono::ParseError> {
    NaiveTime::parse_from_str(s, "%H:%M").or_else(|_| NaiveTime::parse_from_str(s, "%H:%M:%S"))
}

pub async fn run(ctx: &mut Context, out: &mut impl Write, action: AdminAction) -> Result<(), CliError> {
    let mut admin = ctx.admin();
    let (console, session) = admin.split();

    match action {
        AdminAction::Stats => {
            let stats = console.stats(session).await?;
            let pretty = serde_json::to_string_pretty(&stats).unwrap_or_else(|_| stats.to_string());
            writeln!(out, "{pretty}")?;
        }
        AdminAction::Users { skip, limit } => {
            let users = console.users(session, skip, limit).await?;
            for user in &users {
                let id = format!("#{}", user.id);
                let state = if user.is_active { "active" } else { "inactive" };
                let role = user.role.to_string();
                writeln!(out, "{id:<7} {role:<6} {state:<8} {} <{}>", user.name, user.email)?;
            }
        }
        AdminAction::Activate { id } => {
            let user = console.set_user_active(session, UserId::new(id), true).await?;
            write_activation(out, &user)?;
        }
        AdminAction::Deactivate { id } => {
            let user = console.set_user_active(session, UserId::new(id), false).await?;
            write_activation(out, &user)?;
        }
        AdminAction::DeleteUser { id } => {
            console.delete_user(session, UserId::new(id)).await?;
            writeln!(out, "User #{id} deleted")?;
        }
        AdminAction::CreateEvent {
            title,
            description,
            date,
            time,
            location,
            address,
            category,
            capacity,
            price,
        } => {
            let draft = EventDraft {
                title,
                description,
                start_date: Some(date),
                start_time: Some(time),
                location,
                address,
                category_id: Some(CategoryId::new(category)),
                capacity: Some(capacity),
                is_free: price.is_none(),
                price,
            };
            let event = console.create_event(session, &draft).await?;
            write!(out, "Created ")?;
            write_event_line(out, &event)?;
        }
        AdminAction::DeleteEvent { id } => {
            console.delete_event(session, EventId::new(id)).await?;
            writeln!(out, "Event #{id} deleted")?;
        }
        AdminAction::Categories => {
            for category in console.categories(session).await? {
                writeln!(
                    out,
                    "{:>3} {:<16} {} {}",
                    category.id.as_i64(),
                    category.name,
                    category.color,
                    category.icon.unwrap_or_default(),
                )?;
            }
        }
        AdminAction::CreateCategory { name, color, icon } => {
            let payload = CategoryPayload { name, color, icon };
            let category = console.create_category(session, &payload).await?;
            writeln!(out, "Created category {} ({})", category.name, category.id)?;
        }
        AdminAction::DeleteCategory { id } => {
            console.delete_category(session, CategoryId::new(id)).await?;
            writeln!(out, "Category #{id} deleted")?;
        }
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_time_accepts_seconds() {
        assert_eq!(parse_time("20:00").unwrap(), NaiveTime::from_hms_opt(20, 0, 0).unwrap());
        assert_eq!(parse_time("09:30:15").unwrap(), NaiveTime::from_hms_opt(9, 30, 15).unwrap());
        assert!(parse_time("8pm").is_err());
    }
}
