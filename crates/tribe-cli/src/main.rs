//! tribe CLI - administrative commands
//!
//! Usage:
//!   tribe migrate
//!   tribe create-admin --name <name> --email <email> --password <password>

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tribe_api::auth::{InputRules, SignUpRequest};
use tribe_api::state::AppState;
use tribe_core::{AppConfig, PgStore, Role};

#[derive(Parser)]
#[command(name = "tribe")]
#[command(about = "tribe administration CLI")]
#[command(version)]
struct Cli {
    /// TOML configuration file; environment variables override it
    #[arg(short, long, global = true, env = "TRIBE_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the database schema if it does not exist
    Migrate,
    /// Provision an admin account
    CreateAdmin {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        /// Password, at least 8 characters
        #[arg(long, env = "TRIBE_ADMIN_PASSWORD")]
        password: String,
    },
}

fn load_config(path: Option<&PathBuf>) -> anyhow::Result<AppConfig> {
    let config = match path {
        Some(path) => AppConfig::from_file(path)?.with_env_override()?,
        None => AppConfig::from_env()?,
    };
    config.validate()?;
    Ok(config)
}

async fn connect(config: &AppConfig) -> anyhow::Result<PgStore> {
    let Some(url) = config.database.url.as_deref() else {
        bail!("DATABASE_URL must be set for administrative commands");
    };
    let store = PgStore::connect(url, config.database.pool_size)
        .await
        .context("Failed to connect to PostgreSQL")?;
    store.ensure_schema().await?;
    Ok(store)
}

/// Admin accounts follow the same input rules as sign-up
fn admin_input(name: String, email: String, password: String) -> anyhow::Result<SignUpRequest> {
    let input = SignUpRequest {
        name,
        email,
        password,
    }
    .checked()?;
    Ok(input)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_ref())?;

    match cli.command {
        Commands::Migrate => {
            connect(&config).await?;
            println!("Schema is up to date");
        }
        Commands::CreateAdmin {
            name,
            email,
            password,
        } => {
            let input = admin_input(name, email, password)?;

            let store = connect(&config).await?;
            let state = AppState::new(config, Arc::new(store))?;
            let account = state
                .identity
                .create_account(input.name, input.email, input.password, Role::Admin)
                .await?;

            tracing::info!(account_id = account.id, "Admin account created");
            println!("Created admin {} <{}>", account.name, account.email);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(email: &str) -> anyhow::Result<SignUpRequest> {
        admin_input("Root".to_string(), email.to_string(), "password1".to_string())
    }

    #[test]
    fn test_admin_input_rejects_invalid_email() {
        for email in ["root@", "@"] {
            let err = input(email).unwrap_err();
            assert_eq!(err.to_string(), "Invalid email address", "email: {email}");
        }
    }

    #[test]
    fn test_admin_input_normalized() {
        let request = input(" Root@Tribe.Example ").unwrap();
        assert_eq!(request.email, "root@tribe.example");
        assert_eq!(request.name, "Root");
    }

    #[test]
    fn test_admin_input_short_password() {
        let err = admin_input(
            "Root".to_string(),
            "root@tribe.example".to_string(),
            "short".to_string(),
        )
        .unwrap_err();
        assert_eq!(err.to_string(), "Password length must be at least 8");
    }
}
