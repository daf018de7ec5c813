//! Auth command handlers: login, status, logout.

use chrono::Utc;
use secrecy::SecretString;
use serde::Serialize;

use rivtel_api::LoginOutcome;

use crate::cli::{AuthArgs, AuthCommand, GlobalOpts};
use crate::error::CliError;
use crate::output;

use super::Ctx;

pub async fn handle(ctx: &Ctx, args: AuthArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        AuthCommand::Login => login(ctx, global).await,
        AuthCommand::Status => status(ctx, global),
        AuthCommand::Logout => logout(ctx, global),
    }
}

/// Interactive login: email + hidden password, then a one-time code when
/// the account has MFA enabled.
async fn login(ctx: &Ctx, global: &GlobalOpts) -> Result<(), CliError> {
    let email = match ctx.config.email.clone() {
        Some(email) => email,
        None => dialoguer::Input::new()
            .with_prompt("Email")
            .interact_text()
            .map_err(|e| CliError::Io(std::io::Error::other(e)))?,
    };

    let password = match ctx.config.password.clone() {
        Some(password) => SecretString::from(password),
        None => {
            let typed: String = dialoguer::Password::new()
                .with_prompt("Password")
                .interact()
                .map_err(|e| CliError::Io(std::io::Error::other(e)))?;
            SecretString::from(typed)
        }
    };

    let outcome = ctx.session.login(&email, &password).await?;

    if outcome == LoginOutcome::OneTimeCodeRequired {
        let code: String = dialoguer::Input::new()
            .with_prompt("One-time code")
            .interact_text()
            .map_err(|e| CliError::Io(std::io::Error::other(e)))?;

        ctx.session
            .complete_one_time_code(code.trim())
            .await
            .map_err(|e| match e {
                rivtel_core::CoreError::Api(rivtel_api::Error::Auth { .. })
                | rivtel_core::CoreError::Api(rivtel_api::Error::Protocol { .. }) => {
                    CliError::OneTimeCodeRejected
                }
                other => other.into(),
            })?;
    }

    if !global.quiet {
        eprintln!("Authenticated as {email}");
    }
    Ok(())
}

#[derive(Serialize)]
struct AuthStatus {
    logged_in: bool,
    email: Option<String>,
    expires_at: Option<chrono::DateTime<Utc>>,
    valid: bool,
    cache_path: String,
}

fn status(ctx: &Ctx, global: &GlobalOpts) -> Result<(), CliError> {
    let cache = ctx.session.cache();
    let cached = cache.load()?;

    let status = match cached {
        Some(creds) => AuthStatus {
            logged_in: true,
            valid: creds.is_valid(),
            email: Some(creds.email),
            expires_at: Some(creds.expires_at),
            cache_path: cache.path().display().to_string(),
        },
        None => AuthStatus {
            logged_in: false,
            valid: false,
            email: None,
            expires_at: None,
            cache_path: cache.path().display().to_string(),
        },
    };

    output::print_output(
        &output::render_value(global.format, global.pretty, &status),
        global.quiet,
    );
    Ok(())
}

fn logout(ctx: &Ctx, global: &GlobalOpts) -> Result<(), CliError> {
    ctx.session.logout()?;
    if !global.quiet {
        eprintln!("Logged out");
    }
    Ok(())
}
