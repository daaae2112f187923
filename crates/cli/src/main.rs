//! Storehouse CLI - database migrations and operator tools.
//!
//! # Usage
//!
//! ```bash
//! # Apply pending migrations
//! storehouse migrate
//!
//! # Give an existing account access to the admin API
//! storehouse admin grant --email staff@example.com
//!
//! # Take it away again
//! storehouse admin revoke --email staff@example.com
//!
//! # Show every admin
//! storehouse admin list
//! ```
//!
//! # Commands
//!
//! - `migrate` - Run database migrations
//! - `admin grant|revoke|list` - Manage the admin role

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "storehouse")]
#[command(author, version, about = "Storehouse CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Manage the admin role
    Admin {
        #[command(subcommand)]
        action: AdminAction,
    },
}

#[derive(Subcommand)]
enum AdminAction {
    /// Grant the admin role to an existing account
    Grant {
        /// Account email address
        #[arg(short, long)]
        email: String,
    },
    /// Revoke the admin role
    Revoke {
        /// Account email address
        #[arg(short, long)]
        email: String,
    },
    /// List accounts holding the admin role
    List,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "storehouse_cli=info,sqlx=warn".into()),
        )
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Migrate => commands::migrate::run().await?,
        Commands::Admin { action } => match action {
            AdminAction::Grant { email } => commands::admin::grant(&email).await?,
            AdminAction::Revoke { email } => commands::admin::revoke(&email).await?,
            AdminAction::List => commands::admin::list().await?,
        },
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_grant() {
        let cli = Cli::try_parse_from(["storehouse", "admin", "grant", "-e", "a@b.co"])
            .unwrap_or_else(|e| panic!("{e}"));
        assert!(matches!(
            cli.command,
            Commands::Admin {
                action: AdminAction::Grant { ref email }
            } if email == "a@b.co"
        ));
    }
}
