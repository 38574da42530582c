use crate::cli::input;
use crate::cli::ui::{self, StyleType};
use crate::core::auth::{AuthError, CredentialValidator, Credentials};
use crate::core::session::SessionStore;
use anyhow::Result;
use console::{Key, Term};
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{debug, warn};

pub enum LoginOutcome {
    Authenticated,
    Aborted,
}

/// Flag-driven login for `cryptodash login --email .. --password ..`.
/// Fails when the credentials are malformed or rejected.
pub async fn login_with_flags(
    validator: &dyn CredentialValidator,
    session: &SessionStore,
    identifier: &str,
    secret: &str,
) -> Result<()> {
    let credentials = Credentials::new(identifier, secret)?;
    let token = validator.validate(&credentials).await?;
    session.login(token)?;
    println!("{}", ui::style_text("Signed in.", StyleType::TotalValue));
    Ok(())
}

/// Interactive credential form. Re-prompts on rejected or malformed input
/// until the credentials validate or the user presses Escape.
pub async fn login_screen(
    term: &Term,
    keys: &mut UnboundedReceiver<Key>,
    validator: &dyn CredentialValidator,
    session: &SessionStore,
) -> Result<LoginOutcome> {
    term.clear_screen()?;
    term.write_line(&ui::style_text("Sign in to cryptodash", StyleType::Title))?;
    term.write_line(&ui::style_text("Esc cancels", StyleType::Subtle))?;
    term.write_line("")?;

    loop {
        term.write_str("Email: ")?;
        let Some(identifier) = input::read_line(term, keys, false).await? else {
            return Ok(LoginOutcome::Aborted);
        };
        term.write_str("Password: ")?;
        let Some(secret) = input::read_line(term, keys, true).await? else {
            return Ok(LoginOutcome::Aborted);
        };

        let credentials = match Credentials::new(&identifier, &secret) {
            Ok(credentials) => credentials,
            Err(e) => {
                term.write_line(&ui::style_text(&e.to_string(), StyleType::Error))?;
                continue;
            }
        };

        let spinner = ui::new_spinner("Signing in...");
        let result = validator.validate(&credentials).await;
        spinner.finish_and_clear();

        match result {
            Ok(token) => {
                session.login(token)?;
                debug!("Interactive login succeeded");
                return Ok(LoginOutcome::Authenticated);
            }
            Err(AuthError::InvalidCredentials) => {
                term.write_line(&ui::style_text(
                    "Invalid email or password",
                    StyleType::Error,
                ))?;
            }
            Err(e) => {
                // Backend trouble is not the user's fault; let them retry
                // or bail out with Escape.
                warn!("Login attempt failed: {e}");
                term.write_line(&ui::style_text(&e.to_string(), StyleType::Error))?;
            }
        }
    }
}
