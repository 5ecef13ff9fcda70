//! Event browsing, search and interests.

use std::io::Write;

use tokio::io::{AsyncBufReadExt, BufReader};

use eventdesk_client::search::{SearchSnapshot, SearchStatus};
use eventdesk_core::{CategoryId, EventId};

use super::{CliError, Context, write_event_line};

pub async fn events(
    ctx: &mut Context,
    out: &mut impl Write,
    skip: u32,
    limit: u32,
) -> Result<(), CliError> {
    let events = ctx.load_events(skip, limit).await?;
    if events.is_empty() {
        writeln!(out, "No events")?;
    }
    for event in events {
        write_event_line(out, event)?;
    }
    Ok(())
}

pub async fn event(ctx: &Context, out: &mut impl Write, id: i64) -> Result<(), CliError> {
    let event = ctx.event(EventId::new(id)).await?;
    write_event_line(out, &event)?;
    writeln!(out)?;
    writeln!(out, "{}", event.description)?;
    match (event.capacity, event.remaining_capacity()) {
        (Some(capacity), Some(remaining)) => {
            writeln!(out, "{remaining} of {capacity} tickets left")?;
        }
        _ => writeln!(out, "Unlimited capacity")?,
    }
    Ok(())
}

fn write_snapshot(out: &mut impl Write, snapshot: &SearchSnapshot) -> std::io::Result<()> {
    match &snapshot.status {
        SearchStatus::Idle => Ok(()),
        SearchStatus::Loading => writeln!(out, "Searching for \"{}\"...", snapshot.term),
        SearchStatus::Failed(message) => writeln!(out, "Search failed: {message}"),
        SearchStatus::Ready(events) if events.is_empty() => {
            writeln!(out, "No events match \"{}\"", snapshot.term)
        }
        SearchStatus::Ready(events) => {
            writeln!(out, "{} result(s) for \"{}\":", events.len(), snapshot.term)?;
            for event in events {
                write_event_line(out, event)?;
            }
            Ok(())
        }
    }
}

pub async fn search(ctx: &Context, out: &mut impl Write, term: &str) -> Result<(), CliError> {
    let mut search = ctx.search();
    let snapshot = search.submit(term).await;
    write_snapshot(out, &snapshot)?;
    Ok(())
}

/// Read search terms from stdin, one per line, printing results as they
/// arrive. Terms typed in quick succession only search for the last one.
pub async fn search_interactive(ctx: &Context, out: &mut impl Write) -> Result<(), CliError> {
    let mut search = ctx.search();
    let mut results = search.subscribe();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut pending = false;

    loop {
        tokio::select! {
            line = lines.next_line() => match line? {
                Some(term) => {
                    pending = !term.trim().is_empty();
                    search.input(&term);
                }
                None => break,
            },
            changed = results.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = results.borrow_and_update().clone();
                pending &= snapshot.status == SearchStatus::Loading;
                write_snapshot(out, &snapshot)?;
            }
        }
    }

    // Input closed; let the last scheduled search finish
    if pending {
        let limit = ctx.config().search_debounce + ctx.config().request_timeout;
        let last = tokio::time::timeout(limit, async {
            while results.changed().await.is_ok() {
                let snapshot = results.borrow_and_update().clone();
                if !matches!(snapshot.status, SearchStatus::Loading) {
                    return Some(snapshot);
                }
            }
            None
        })
        .await;
        if let Ok(Some(snapshot)) = last {
            write_snapshot(out, &snapshot)?;
        }
    }
    Ok(())
}

pub async fn interests(ctx: &mut Context, out: &mut impl Write) -> Result<(), CliError> {
    ctx.load_events(0, 100).await?;

    for category in ctx.interests().catalog() {
        let mark = if ctx.interests().is_selected(category.id) { "x" } else { " " };
        writeln!(out, "[{mark}] {:>2} {}", category.id.as_i64(), category.name)?;
    }

    if !ctx.session().is_authenticated() {
        writeln!(out, "\nSign in to get recommendations")?;
        return Ok(());
    }

    let recommended = ctx.interests().recommended_events();
    writeln!(out, "\nRecommended for you:")?;
    if recommended.is_empty() {
        writeln!(out, "  nothing yet, pick some categories")?;
    }
    for event in recommended {
        write_event_line(out, event)?;
    }
    Ok(())
}

pub async fn save_interests(
    ctx: &mut Context,
    out: &mut impl Write,
    category_ids: Vec<i64>,
) -> Result<(), CliError> {
    let selection = category_ids.into_iter().map(CategoryId::new).collect();
    ctx.save_interests(selection).await?;
    writeln!(out, "Saved {} interest(s)", ctx.interests().selection().len())?;
    Ok(())
}
