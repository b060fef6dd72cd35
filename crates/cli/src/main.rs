//! AyurMart CLI - Database migrations and operations.
//!
//! # Usage
//!
//! ```bash
//! # Run storefront database migrations
//! am-cli migrate
//!
//! # Create an admin account
//! am-cli admin create -e owner@ayurmart.in
//!
//! # Promote an existing customer
//! am-cli admin promote -e staff@ayurmart.in
//!
//! # Encrypt a gateway secret for the settings table
//! am-cli secret encrypt rzp_live_secret
//!
//! # Release lapsed stock reservations
//! am-cli inventory release-expired
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "am-cli")]
#[command(author, version, about = "AyurMart CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Manage admin accounts
    Admin {
        #[command(subcommand)]
        action: AdminAction,
    },
    /// Work with encrypted settings values
    Secret {
        #[command(subcommand)]
        action: SecretAction,
    },
    /// Inventory maintenance
    Inventory {
        #[command(subcommand)]
        action: InventoryAction,
    },
}

#[derive(Subcommand)]
enum AdminAction {
    /// Create a new admin account
    Create {
        /// Admin email address
        #[arg(short, long)]
        email: String,

        /// Account password
        #[arg(short, long, env = "AM_ADMIN_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Give an existing account the admin role
    Promote {
        /// Account email address
        #[arg(short, long)]
        email: String,
    },
}

#[derive(Subcommand)]
enum SecretAction {
    /// Encrypt a value with `ENCRYPTION_KEY`
    Encrypt {
        /// Plaintext to encrypt
        value: String,
    },
}

#[derive(Subcommand)]
enum InventoryAction {
    /// Delete expired reservations and cancel unpaid orders that held them
    ReleaseExpired,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Migrate => commands::migrate::run().await?,
        Commands::Admin { action } => match action {
            AdminAction::Create { email, password } => {
                commands::admin::create(&email, &password).await?;
            }
            AdminAction::Promote { email } => commands::admin::promote(&email).await?,
        },
        Commands::Secret { action } => match action {
            SecretAction::Encrypt { value } => commands::secret::encrypt(&value)?,
        },
        Commands::Inventory { action } => match action {
            InventoryAction::ReleaseExpired => commands::inventory::release_expired().await?,
        },
    }
    Ok(())
}
