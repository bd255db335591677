//! Bazaar CLI - Catalog seeding and admin bootstrap.
//!
//! # Usage
//!
//! ```bash
//! # Validate a catalog file without writing anything
//! bazaar seed products catalog.yaml --dry-run
//!
//! # Create every product in the file
//! bazaar seed products catalog.yaml
//!
//! # Print the catalog
//! bazaar products list
//!
//! # Create the admin account and print the uid for ADMIN_UID
//! bazaar admin create -e admin@example.com -p 'correct horse'
//! ```
//!
//! The backend is selected the same way as for the servers (`BAZAAR_BACKEND`
//! and the `FIREBASE_*` variables).

#![cfg_attr(not(test), forbid(unsafe_code))]

use bazaar_backend::{Backend, BackendConfig};
use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "bazaar")]
#[command(author, version, about = "Bazaar CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load data into the catalog
    Seed {
        #[command(subcommand)]
        target: SeedTarget,
    },
    /// Inspect the catalog
    Products {
        #[command(subcommand)]
        action: ProductsAction,
    },
    /// Manage the admin account
    Admin {
        #[command(subcommand)]
        action: AdminAction,
    },
}

#[derive(Subcommand)]
enum SeedTarget {
    /// Create products from a YAML file
    Products {
        /// Path to the YAML file
        file: String,

        /// Validate only; write nothing
        #[arg(long)]
        dry_run: bool,
    },
}

#[derive(Subcommand)]
enum ProductsAction {
    /// Print every product, by name
    List,
}

#[derive(Subcommand)]
enum AdminAction {
    /// Create the admin account with the auth provider
    Create {
        /// Admin email address
        #[arg(short, long)]
        email: String,

        /// Admin password (at least 6 characters)
        #[arg(short, long)]
        password: String,
    },
}

#[tokio::main]
async fn main() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "bazaar=info,bazaar_backend=warn".into());
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    let backend = Backend::from_config(&BackendConfig::from_env()?);

    match cli.command {
        Commands::Seed { target } => match target {
            SeedTarget::Products { file, dry_run } => {
                commands::seed::products(&backend, &file, dry_run).await?;
            }
        },
        Commands::Products { action } => match action {
            ProductsAction::List => commands::products::list(&backend).await?,
        },
        Commands::Admin { action } => match action {
            AdminAction::Create { email, password } => {
                commands::admin::create(&backend, &email, password).await?;
            }
        },
    }
    Ok(())
}
