//! Display Toggle CLI - show and hide products and categories at the register.
//!
//! # Usage
//!
//! ```bash
//! # Log in with the contract's app credentials
//! dtctl login --contract-id skaa0001 --client-id abc --client-secret xyz --environment dev
//!
//! # List categories, then the products of one of them
//! dtctl categories list
//! dtctl products list --category 3 --search soda
//!
//! # Hide two products and show a category
//! dtctl products set hide 8000001 8000002
//! dtctl categories set show 3
//!
//! # Session state and logout
//! dtctl status
//! dtctl logout
//! ```
//!
//! # Commands
//!
//! - `login` / `logout` / `status` - Session management
//! - `products list|set` - Product display flags
//! - `categories list|set` - Category display flags

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use display_toggle_console::ConsoleConfig;
use display_toggle_console::config::{DEFAULT_GATEWAY_URL, DEFAULT_SESSION_FILE};
use display_toggle_core::Environment;
use tracing_subscriber::EnvFilter;

mod commands;

use commands::CommandError;

#[derive(Parser)]
#[command(name = "dtctl")]
#[command(author, version, about = "Display Toggle console")]
struct Cli {
    /// Gateway base URL
    #[arg(long, global = true, env = "DISPLAY_TOGGLE_GATEWAY_URL", default_value = DEFAULT_GATEWAY_URL)]
    gateway_url: String,

    /// File holding credentials and the access token between runs
    #[arg(long, global = true, env = "DISPLAY_TOGGLE_SESSION_FILE", default_value = DEFAULT_SESSION_FILE)]
    session_file: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Exchange client credentials for an access token and remember them
    Login {
        /// Smaregi contract ID
        #[arg(long, env = "SMAREGI_CONTRACT_ID")]
        contract_id: String,

        /// App client ID
        #[arg(long, env = "SMAREGI_CLIENT_ID")]
        client_id: String,

        /// App client secret
        #[arg(long, env = "SMAREGI_CLIENT_SECRET", hide_env_values = true)]
        client_secret: String,

        /// Target deployment (`dev` or `prod`)
        #[arg(short, long, env = "SMAREGI_ENVIRONMENT", default_value = "prod")]
        environment: Environment,
    },
    /// Forget the stored credentials and token
    Logout,
    /// Show who is logged in and until when
    Status,
    /// Product display flags
    Products {
        #[command(subcommand)]
        action: ProductAction,
    },
    /// Category display flags
    Categories {
        #[command(subcommand)]
        action: CategoryAction,
    },
}

#[derive(Subcommand)]
enum ProductAction {
    /// List products of one category (the first one by default)
    List {
        /// Category to list
        #[arg(short, long, conflicts_with = "all")]
        category: Option<String>,

        /// List products of every category
        #[arg(short, long)]
        all: bool,

        /// Case-insensitive match on product code, name or ID
        #[arg(short, long)]
        search: Option<String>,
    },
    /// Show or hide products
    Set {
        /// New visibility
        visibility: Visibility,

        /// Product IDs
        #[arg(required = true)]
        ids: Vec<String>,
    },
}

#[derive(Subcommand)]
enum CategoryAction {
    /// List categories in register order
    List,
    /// Show or hide categories
    Set {
        /// New visibility
        visibility: Visibility,

        /// Category IDs
        #[arg(required = true)]
        ids: Vec<String>,
    },
}

/// Target display state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Visibility {
    /// Shown at the register
    Show,
    /// Hidden from the register
    Hide,
}

impl Visibility {
    const fn is_shown(self) -> bool {
        matches!(self, Self::Show)
    }
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("dtctl=info")),
        )
        .with_target(false)
        .without_time()
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        tracing::error!("{e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), CommandError> {
    let config = ConsoleConfig::new(&cli.gateway_url, cli.session_file)?;

    match cli.command {
        Commands::Login {
            contract_id,
            client_id,
            client_secret,
            environment,
        } => {
            commands::session::login(&config, contract_id, client_id, client_secret, environment)
                .await?;
        }
        Commands::Logout => commands::session::logout(&config).await?,
        Commands::Status => commands::session::status(&config).await?,
        Commands::Products { action } => match action {
            ProductAction::List {
                category,
                all,
                search,
            } => commands::catalog::list_products(&config, category, all, search).await?,
            ProductAction::Set { visibility, ids } => {
                commands::catalog::set_products(&config, visibility.is_shown(), &ids).await?;
            }
        },
        Commands::Categories { action } => match action {
            CategoryAction::List => commands::catalog::list_categories(&config).await?,
            CategoryAction::Set { visibility, ids } => {
                commands::catalog::set_categories(&config, visibility.is_shown(), &ids).await?;
            }
        },
    }
    Ok(())
}
