//! Cart commands.

use std::io::Write;

use tracing::warn;

use eventdesk_client::cart::CartLine;
use eventdesk_core::EventId;

use super::{CliError, Context};

fn write_line(out: &mut impl Write, line: &CartLine) -> std::io::Result<()> {
    let date = line
        .date
        .map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_default();
    let id = format!("#{}", line.event_id);
    writeln!(
        out,
        "{id:<7} {:<40} {date:<10}  {} x {} = {}",
        line.title,
        line.quantity,
        line.unit_price,
        line.total(),
    )
}

pub fn show(ctx: &Context, out: &mut impl Write) -> Result<(), CliError> {
    let cart = ctx.cart();
    if cart.is_empty() {
        writeln!(out, "Your cart is empty")?;
        return Ok(());
    }
    for line in cart.lines() {
        write_line(out, line)?;
    }
    writeln!(out, "{} ticket(s), subtotal {}", cart.count(), cart.subtotal())?;
    Ok(())
}

pub async fn add(
    ctx: &mut Context,
    out: &mut impl Write,
    event_id: i64,
    quantity: u32,
) -> Result<(), CliError> {
    let event = ctx.event(EventId::new(event_id)).await?;

    let in_cart = ctx.cart().line(event.id).map_or(0, |l| l.quantity);
    if let Some(remaining) = event.remaining_capacity()
        && in_cart.saturating_add(quantity) > remaining
    {
        warn!(event_id = %event.id, remaining, "Requested more tickets than remain");
        writeln!(out, "Only {remaining} ticket(s) left for {}", event.title)?;
    }

    ctx.add_to_cart(&event, quantity)?;
    writeln!(out, "Added {quantity} x {} to cart", event.title)?;
    show(ctx, out)
}

pub fn set(
    ctx: &mut Context,
    out: &mut impl Write,
    event_id: i64,
    quantity: i64,
) -> Result<(), CliError> {
    ctx.cart_mut().set_quantity(EventId::new(event_id), quantity)?;
    show(ctx, out)
}

pub fn remove(ctx: &mut Context, out: &mut impl Write, event_id: i64) -> Result<(), CliError> {
    ctx.cart_mut().remove_line(EventId::new(event_id))?;
    show(ctx, out)
}

pub fn clear(ctx: &mut Context, out: &mut impl Write) -> Result<(), CliError> {
    ctx.cart_mut().clear()?;
    writeln!(out, "Cart cleared")?;
    Ok(())
}
