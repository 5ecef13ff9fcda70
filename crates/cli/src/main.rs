//! EventDesk CLI - browse events, manage a cart and buy tickets from the
//! terminal.
//!
//! # Usage
//!
//! ```bash
//! # Sign in (password from EVENTDESK_PASSWORD or --password)
//! eventdesk login -e ada@example.com --remember
//!
//! # Browse and search
//! eventdesk events
//! eventdesk search jazz
//! eventdesk search            # interactive, debounced as you type
//!
//! # Buy tickets
//! eventdesk cart add 12 -q 2
//! eventdesk checkout
//! eventdesk tickets list
//!
//! # Admin
//! eventdesk admin stats
//! eventdesk admin deactivate 42
//! ```
//!
//! Session, cart and interests are kept in `EVENTDESK_STORAGE_DIR`
//! (default `.eventdesk`) between runs.

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::io::Write;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use sentry::integrations::tracing as sentry_tracing;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use url::Url;

use eventdesk_client::{AppContext, ClientConfig, FileStorage, HttpApi};

mod commands;

use commands::{CliError, Context};

#[derive(Parser)]
#[command(name = "eventdesk")]
#[command(author, version, about = "EventDesk event client")]
struct Cli {
    /// Override `EVENTDESK_API_URL`
    #[arg(long, global = true)]
    api_url: Option<Url>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign in
    Login {
        #[arg(short, long)]
        email: String,

        #[arg(short, long, env = "EVENTDESK_PASSWORD", hide_env_values = true)]
        password: String,

        /// Keep a copy of the profile for the next run
        #[arg(long)]
        remember: bool,
    },
    /// Create an account and sign in
    Register {
        #[arg(short, long)]
        name: String,

        #[arg(short, long)]
        email: String,

        #[arg(short, long, env = "EVENTDESK_PASSWORD", hide_env_values = true)]
        password: String,

        /// Register as an organizer (admin)
        #[arg(long)]
        admin: bool,
    },
    /// Sign out and forget the session
    Logout,
    /// Show the signed-in user
    Whoami,
    /// Set a new password on first sign-in
    SetPassword {
        #[arg(long, env = "EVENTDESK_NEW_PASSWORD", hide_env_values = true)]
        password: String,

        #[arg(long, env = "EVENTDESK_CONFIRM_PASSWORD", hide_env_values = true)]
        confirm: String,
    },
    /// Change the password of the signed-in user
    ChangePassword {
        #[arg(long, env = "EVENTDESK_PASSWORD", hide_env_values = true)]
        current: String,

        #[arg(long, env = "EVENTDESK_NEW_PASSWORD", hide_env_values = true)]
        new: String,
    },
    /// Request a password reset email
    ResetPassword {
        #[arg(short, long)]
        email: String,
    },
    /// Show where navigating to a path would lead
    Route { path: String },
    /// List events
    Events {
        #[arg(long, default_value_t = 0)]
        skip: u32,

        #[arg(long, default_value_t = 20)]
        limit: u32,
    },
    /// Show one event
    Event { id: i64 },
    /// Search events; without a term, read terms from stdin as you type
    Search { term: Option<String> },
    /// Manage interests and see recommendations
    Interests {
        #[command(subcommand)]
        action: InterestsAction,
    },
    /// Manage the cart
    Cart {
        #[command(subcommand)]
        action: CartAction,
    },
    /// Buy everything in the cart
    Checkout,
    /// Purchased tickets
    Tickets {
        #[command(subcommand)]
        action: TicketsAction,
    },
    /// Admin operations
    Admin {
        #[command(subcommand)]
        action: commands::admin::AdminAction,
    },
}

#[derive(Subcommand)]
enum InterestsAction {
    /// Show categories, selection and recommended events
    Show,
    /// Replace the selection
    Save { category_ids: Vec<i64> },
}

#[derive(Subcommand)]
enum CartAction {
    /// Show cart lines and subtotal
    Show,
    /// Add tickets for an event
    Add {
        event_id: i64,

        #[arg(short, long, default_value_t = 1)]
        quantity: u32,
    },
    /// Set the quantity of a line; 0 removes it
    Set { event_id: i64, quantity: i64 },
    /// Remove a line
    Remove { event_id: i64 },
    /// Empty the cart
    Clear,
}

#[derive(Subcommand)]
enum TicketsAction {
    /// List purchased tickets
    List,
    /// Cancel a ticket
    Cancel { id: i64 },
}

/// Initialize Sentry error tracking and return the guard that must be kept
/// alive.
fn init_sentry(config: &ClientConfig) -> Option<sentry::ClientInitGuard> {
    let dsn = config.sentry_dsn.as_ref()?;

    let guard = sentry::init((
        dsn.as_str(),
        sentry::ClientOptions {
            release: sentry::release_name!(),
            attach_stacktrace: true,
            ..Default::default()
        },
    ));
    Some(guard)
}

/// Filter tracing events to Sentry event types.
fn sentry_event_filter(metadata: &tracing::Metadata<'_>) -> sentry_tracing::EventFilter {
    match *metadata.level() {
        tracing::Level::ERROR => sentry_tracing::EventFilter::Event,
        tracing::Level::WARN | tracing::Level::INFO => sentry_tracing::EventFilter::Breadcrumb,
        _ => sentry_tracing::EventFilter::Ignore,
    }
}

fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "eventdesk_client=info,eventdesk_cli=info".into());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let mut config = match ClientConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            let _ = writeln!(std::io::stderr(), "error: {e}");
            std::process::exit(2);
        }
    };
    if let Some(api_url) = cli.api_url.clone() {
        config = config.with_api_url(api_url);
    }

    // Sentry must be initialized before the tracing subscriber
    let _sentry_guard = init_sentry(&config);
    init_tracing();

    if let Err(e) = run(cli, config).await {
        e.report();
        let _ = writeln!(std::io::stderr(), "error: {}", e.user_message());
        std::process::exit(1);
    }
}

async fn run(cli: Cli, config: ClientConfig) -> Result<(), CliError> {
    let storage = Arc::new(FileStorage::open(&config.storage_dir)?);
    let api = HttpApi::new(&config)?;
    let mut ctx: Context = AppContext::new(api, storage, config);
    ctx.init().await;

    let mut out = std::io::stdout();
    let out = &mut out;

    match cli.command {
        Commands::Login {
            email,
            password,
            remember,
        } => commands::account::login(&mut ctx, out, &email, password.into(), remember).await?,
        Commands::Register {
            name,
            email,
            password,
            admin,
        } => commands::account::register(&mut ctx, out, &name, &email, password.into(), admin).await?,
        Commands::Logout => commands::account::logout(&mut ctx, out)?,
        Commands::Whoami => commands::account::whoami(&ctx, out)?,
        Commands::SetPassword { password, confirm } => {
            commands::account::set_password(&mut ctx, out, password, confirm).await?;
        }
        Commands::ChangePassword { current, new } => {
            commands::account::change_password(&mut ctx, out, current.into(), new.into()).await?;
        }
        Commands::ResetPassword { email } => {
            commands::account::reset_password(&ctx, out, &email).await?;
        }
        Commands::Route { path } => commands::account::route(&ctx, out, &path)?,
        Commands::Events { skip, limit } => commands::catalog::events(&mut ctx, out, skip, limit).await?,
        Commands::Event { id } => commands::catalog::event(&ctx, out, id).await?,
        Commands::Search { term: Some(term) } => commands::catalog::search(&ctx, out, &term).await?,
        Commands::Search { term: None } => commands::catalog::search_interactive(&ctx, out).await?,
        Commands::Interests { action } => match action {
            InterestsAction::Show => commands::catalog::interests(&mut ctx, out).await?,
            InterestsAction::Save { category_ids } => {
                commands::catalog::save_interests(&mut ctx, out, category_ids).await?;
            }
        },
        Commands::Cart { action } => match action {
            CartAction::Show => commands::cart::show(&ctx, out)?,
            CartAction::Add { event_id, quantity } => {
                commands::cart::add(&mut ctx, out, event_id, quantity).await?;
            }
            CartAction::Set { event_id, quantity } => {
                commands::cart::set(&mut ctx, out, event_id, quantity)?;
            }
            CartAction::Remove { event_id } => commands::cart::remove(&mut ctx, out, event_id)?,
            CartAction::Clear => commands::cart::clear(&mut ctx, out)?,
        },
        Commands::Checkout => commands::orders::checkout(&mut ctx, out).await?,
        Commands::Tickets { action } => match action {
            TicketsAction::List => commands::orders::tickets(&mut ctx, out).await?,
            TicketsAction::Cancel { id } => commands::orders::cancel(&mut ctx, out, id).await?,
        },
        Commands::Admin { action } => commands::admin::run(&mut ctx, out, action).await?,
    }

    ctx.dispose();
    Ok(())
}
