//! Streetmerch CLI - Database migrations and operator tools.
//!
//! # Usage
//!
//! ```bash
//! # Run storefront database migrations
//! sm-cli migrate
//!
//! # Check a catalog file without touching the database
//! sm-cli catalog import drops/fall.yaml --dry-run
//!
//! # Import it
//! sm-cli catalog import drops/fall.yaml
//!
//! # Mark an order shipped
//! sm-cli order set-status 0190c3c4-... shipped --tracking 1Z999AA10123456784
//! ```
//!
//! # Commands
//!
//! - `migrate` - Run database migrations
//! - `catalog import` - Create catalog items from a YAML file
//! - `order set-status` - Operator status edit with tracking number and note

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

use streetmerch_core::OrderStatus;

mod commands;

#[derive(Parser)]
#[command(name = "sm-cli")]
#[command(author, version, about = "Streetmerch CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Manage the catalog
    Catalog {
        #[command(subcommand)]
        action: CatalogAction,
    },
    /// Operate on orders
    Order {
        #[command(subcommand)]
        action: OrderAction,
    },
}

#[derive(Subcommand)]
enum CatalogAction {
    /// Create catalog items from a YAML file
    Import {
        /// Path to the YAML file
        file: String,

        /// Validate the file and stop
        #[arg(long)]
        dry_run: bool,
    },
}

#[derive(Subcommand)]
enum OrderAction {
    /// Move an order to a new status
    SetStatus {
        /// Order id (UUID)
        id: String,

        /// New status (`paid`, `processing`, `shipped`, `delivered`, `cancelled`, `refunded`)
        status: OrderStatus,

        /// Carrier tracking number
        #[arg(short, long)]
        tracking: Option<String>,

        /// Internal note
        #[arg(short, long)]
        note: Option<String>,
    },
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Migrate => commands::migrate::storefront().await?,
        Commands::Catalog { action } => match action {
            CatalogAction::Import { file, dry_run } => {
                commands::catalog::import(&file, dry_run).await?;
            }
        },
        Commands::Order { action } => match action {
            OrderAction::SetStatus {
                id,
                status,
                tracking,
                note,
            } => {
                commands::orders::set_status(&id, status, tracking, note).await?;
            }
        },
    }
    Ok(())
}
