//! CLI command implementations.

pub mod catalog;
pub mod session;

use std::sync::Arc;

use display_toggle_console::{
    ApiError, ApplyReport, ApplyStatus, CatalogApi, ConfigError, ConsoleConfig, ConsoleSession,
    FileStore, LoginFailure, TrackerError, messages,
};
use thiserror::Error;

/// Errors that end a command with a non-zero exit.
#[derive(Debug, Error)]
pub enum CommandError {
    /// Gateway URL or session file is unusable.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Gateway rejected the credentials.
    #[error("{0}")]
    Login(#[from] LoginFailure),

    /// No session to work with.
    #[error("Not logged in. Run `dtctl login` first.")]
    NotLoggedIn,

    /// A gateway call failed.
    #[error(transparent)]
    Api(#[from] ApiError),

    /// An ID is not in the loaded catalog.
    #[error(transparent)]
    Tracker(#[from] TrackerError),

    /// Some updates were rejected.
    #[error("{} {failed} of {total} changes were not applied.", messages::UPDATE_FAILED)]
    Incomplete {
        /// Rejected changes.
        failed: usize,
        /// Attempted changes.
        total: usize,
    },
}

/// Open the stored session, renewing the token if it has lapsed.
async fn open_session(config: &ConsoleConfig) -> Result<ConsoleSession<FileStore>, CommandError> {
    let tokens = config.token_manager()?;
    if !tokens.require_login().await && !tokens.refresh_token().await {
        return Err(CommandError::NotLoggedIn);
    }
    Ok(ConsoleSession::new(CatalogApi::new(Arc::new(tokens))))
}

/// Log an apply outcome and turn rejected changes into an error.
fn report_outcome(kind: &str, report: &ApplyReport) -> Result<(), CommandError> {
    for failure in &report.failed {
        tracing::warn!("{kind} {}: {}", failure.id, failure.error);
    }

    match report.status() {
        ApplyStatus::NoChanges => {
            tracing::info!("{}", messages::NO_CHANGES);
            Ok(())
        }
        ApplyStatus::Complete => {
            tracing::info!(
                "{} {} {kind}(s) updated.",
                messages::UPDATE_SUCCESS,
                report.succeeded.len()
            );
            Ok(())
        }
        ApplyStatus::Partial | ApplyStatus::Failed => Err(CommandError::Incomplete {
            failed: report.failed.len(),
            total: report.failed.len() + report.succeeded.len(),
        }),
    }
}
