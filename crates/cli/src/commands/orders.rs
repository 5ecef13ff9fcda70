//! Checkout and ticket commands.

use std::io::Write;

use eventdesk_client::models::Ticket;
use eventdesk_core::{TicketId, TicketStatus};

use super::{CliError, Context};

fn status_label(status: TicketStatus) -> &'static str {
    match status {
        TicketStatus::Active => "active",
        TicketStatus::Used => "used",
        TicketStatus::Cancelled => "cancelled",
    }
}

fn write_ticket(out: &mut impl Write, ticket: &Ticket) -> std::io::Result<()> {
    let id = format!("#{}", ticket.id);
    writeln!(
        out,
        "{id:<7} {:<9} {} x {}  {}  {}  {}",
        status_label(ticket.status),
        ticket.quantity,
        ticket.event.title,
        ticket.event.date.format("%Y-%m-%d %H:%M"),
        ticket.total_price,
        ticket.attendee.name,
    )
}

pub async fn checkout(ctx: &mut Context, out: &mut impl Write) -> Result<(), CliError> {
    let confirmation = ctx.checkout().await?;
    writeln!(out, "Order {} placed, total {}", confirmation.order_id, confirmation.total)?;
    for failure in &confirmation.capacity_failures {
        writeln!(
            out,
            "  warning: attendee count for event #{} not updated: {}",
            failure.event_id, failure.message
        )?;
    }
    ctx.reset_checkout();
    Ok(())
}

pub async fn tickets(ctx: &mut Context, out: &mut impl Write) -> Result<(), CliError> {
    let tickets = ctx.refresh_tickets().await?;
    if tickets.is_empty() {
        writeln!(out, "No tickets yet")?;
    }
    for ticket in &tickets {
        write_ticket(out, ticket)?;
    }
    Ok(())
}

pub async fn cancel(ctx: &mut Context, out: &mut impl Write, id: i64) -> Result<(), CliError> {
    ctx.cancel_ticket(TicketId::new(id)).await?;
    writeln!(out, "Ticket #{id} cancelled")?;
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::{TimeZone, Utc};
    use eventdesk_client::models::{Attendee, TicketEvent};
    use eventdesk_core::{EventId, Price};

    use super::*;

    #[test]
    fn test_write_ticket() {
        let ticket = Ticket {
            id: TicketId::new(11),
            event: TicketEvent {
                id: EventId::new(3),
                title: "Rock".to_string(),
                date: Utc.with_ymd_and_hms(2025, 8, 15, 18, 0, 0).unwrap(),
                location: "Park".to_string(),
            },
            quantity: 2,
            ticket_type: "Standard".to_string(),
            total_price: Price::from_cents(9998).unwrap(),
            status: TicketStatus::Cancelled,
            purchase_date: Utc.with_ymd_and_hms(2025, 6, 1, 10, 0, 0).unwrap(),
            attendee: Attendee {
                name: "Ada".to_string(),
                email: "ada@example.com".to_string(),
                phone: None,
            },
        };

        let mut out = Vec::new();
        write_ticket(&mut out, &ticket).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "#11     cancelled 2 x Rock  2025-08-15 18:00  $99.98  Ada\n"
        );
    }
}
