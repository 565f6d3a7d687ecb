//! Login, logout and session status.

use display_toggle_console::{ConsoleConfig, Credentials};
use display_toggle_core::Environment;
use secrecy::SecretString;

use super::CommandError;

/// Exchange credentials for a token and persist both.
pub async fn login(
    config: &ConsoleConfig,
    contract_id: String,
    client_id: String,
    client_secret: String,
    environment: Environment,
) -> Result<(), CommandError> {
    let tokens = config.token_manager()?;
    let credentials = Credentials {
        contract_id,
        client_id,
        client_secret: SecretString::from(client_secret),
        environment,
    };

    let success = tokens.login(&credentials).await?;
    tracing::info!(
        "Logged in to contract {} ({}). Token valid for {} seconds.",
        credentials.contract_id,
        credentials.environment,
        success.expires_in
    );
    tracing::debug!(session_file = %config.session_file().display(), "Session saved");
    Ok(())
}

/// Forget the session.
pub async fn logout(config: &ConsoleConfig) -> Result<(), CommandError> {
    config.token_manager()?.logout().await;
    tracing::info!("Logged out.");
    Ok(())
}

/// Report the stored session.
pub async fn status(config: &ConsoleConfig) -> Result<(), CommandError> {
    let tokens = config.token_manager()?;

    let Some(credentials) = tokens.stored_credentials().await else {
        return Err(CommandError::NotLoggedIn);
    };

    tracing::info!("Gateway:     {}", tokens.gateway());
    tracing::info!("Contract:    {}", credentials.contract_id);
    tracing::info!("Client:      {}", credentials.client_id);
    tracing::info!("Environment: {}", credentials.environment);

    match tokens.token_expires_at().await {
        Some(expires_at) if tokens.is_token_valid().await => {
            tracing::info!("Token:       valid until {expires_at}");
        }
        Some(expires_at) => {
            tracing::info!("Token:       expired at {expires_at}, renewed on next use");
        }
        None => tracing::info!("Token:       none, renewed on next use"),
    }
    Ok(())
}
