//! Account commands.

use anyhow::anyhow;
use console::style;

use crate::api::{Credentials, Registration};
use crate::config::Settings;

use super::super::helpers::{api_client, spinner};

/// Create an account.
pub async fn cmd_register(
    settings: &Settings,
    name: &str,
    email: &str,
    password: &str,
) -> anyhow::Result<()> {
    let client = api_client(settings)?;
    let registration = Registration {
        name: name.to_string(),
        email: email.to_string(),
        password: password.to_string(),
    };

    client
        .register(&registration)
        .await
        .map_err(|e| anyhow!(e.user_message("registration failed")))?;

    println!("{} Registered {}", style("✓").green(), email);
    println!("  Run 'scandesk login --email {}' to start a session", email);
    Ok(())
}

/// Log in and store the bearer token.
pub async fn cmd_login(settings: &Settings, email: &str, password: &str) -> anyhow::Result<()> {
    let client = api_client(settings)?;
    let credentials = Credentials {
        email: email.to_string(),
        password: password.to_string(),
    };

    let pb = spinner(format!("Logging in to {}...", client.base_url()));
    let result = client.login(&credentials).await;
    pb.finish_and_clear();

    let token = result.map_err(|e| anyhow!(e.user_message("login failed")))?;
    let path = settings.save_token(&token)?;
    tracing::debug!("Token stored at {}", path.display());

    println!("{} Logged in as {}", style("✓").green(), email);
    Ok(())
}

/// Remove the stored token.
pub fn cmd_logout(settings: &Settings) -> anyhow::Result<()> {
    if settings.clear_token()? {
        println!("{} Logged out", style("✓").green());
    } else {
        println!("{} Not logged in", style("!").yellow());
    }
    Ok(())
}
