//! Sign-in, account and navigation commands.

use std::io::Write;

use secrecy::SecretString;

use eventdesk_client::guard::GuardDecision;
use eventdesk_client::models::Identity;
use eventdesk_client::session::AuthError;
use eventdesk_core::{PasswordChangeForm, Role};

use super::{CliError, Context};

fn write_identity(out: &mut impl Write, identity: &Identity) -> std::io::Result<()> {
    let role = if identity.is_admin() { "admin" } else { "user" };
    writeln!(out, "{} <{}> ({role}, id {})", identity.name, identity.email, identity.id)?;
    if !identity.is_active {
        writeln!(out, "Account is inactive. Please contact an administrator.")?;
    }
    if identity.requires_password_change {
        writeln!(out, "A new password is required: run `eventdesk set-password`.")?;
    }
    Ok(())
}

pub async fn login(
    ctx: &mut Context,
    out: &mut impl Write,
    email: &str,
    password: SecretString,
    remember: bool,
) -> Result<(), CliError> {
    match ctx.login(email, password, remember).await {
        Ok(_) | Err(AuthError::AccountInactive) => {}
        Err(e) => return Err(e.into()),
    }
    if let Some(identity) = ctx.session().identity() {
        write!(out, "Signed in as ")?;
        write_identity(out, identity)?;
    }
    Ok(())
}

pub async fn register(
    ctx: &mut Context,
    out: &mut impl Write,
    name: &str,
    email: &str,
    password: SecretString,
    admin: bool,
) -> Result<(), CliError> {
    let role = if admin { Role::Admin } else { Role::User };
    let identity = ctx.register(name, email, password, role).await?;
    write!(out, "Registered ")?;
    write_identity(out, &identity)?;
    Ok(())
}

pub fn logout(ctx: &mut Context, out: &mut impl Write) -> Result<(), CliError> {
    ctx.logout()?;
    writeln!(out, "Signed out")?;
    Ok(())
}

pub fn whoami(ctx: &Context, out: &mut impl Write) -> Result<(), CliError> {
    if let Some(identity) = ctx.session().identity() {
        write_identity(out, identity)?;
    } else if let Some(cached) = ctx.session().cached_identity() {
        writeln!(out, "Not signed in (last seen as {} <{}>)", cached.name, cached.email)?;
    } else {
        writeln!(out, "Not signed in")?;
    }
    Ok(())
}

pub async fn set_password(
    ctx: &mut Context,
    out: &mut impl Write,
    password: String,
    confirm_password: String,
) -> Result<(), CliError> {
    let form = PasswordChangeForm {
        password,
        confirm_password,
    };
    if let Err(errors) = form.validate() {
        return Err(eventdesk_client::ClientError::from(errors).into());
    }
    ctx.complete_first_login(&form).await?;
    writeln!(out, "Password updated")?;
    Ok(())
}

pub async fn change_password(
    ctx: &mut Context,
    out: &mut impl Write,
    current: SecretString,
    new: SecretString,
) -> Result<(), CliError> {
    ctx.change_password(&current, &new).await?;
    writeln!(out, "Password changed")?;
    Ok(())
}

pub async fn reset_password(
    ctx: &Context,
    out: &mut impl Write,
    email: &str,
) -> Result<(), CliError> {
    ctx.session().reset_password(email).await?;
    writeln!(out, "If {email} has an account, a reset link is on its way")?;
    Ok(())
}

pub fn route(ctx: &Context, out: &mut impl Write, path: &str) -> Result<(), CliError> {
    match ctx.guard(path) {
        GuardDecision::Allow => writeln!(out, "{path}: allowed")?,
        GuardDecision::ShowLoading => writeln!(out, "{path}: session loading")?,
        GuardDecision::Redirect {
            to,
            return_to: Some(back),
        } => writeln!(out, "{path}: redirect to {to} (then back to {back})")?,
        GuardDecision::Redirect { to, return_to: None } => {
            writeln!(out, "{path}: redirect to {to}")?;
        }
    }
    Ok(())
}
