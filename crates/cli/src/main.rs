//! Checkout CLI - Database migrations and webhook tooling.
//!
//! # Usage
//!
//! ```bash
//! # Run document store migrations
//! checkout-cli migrate
//!
//! # Sign a payload the way the payment provider would
//! checkout-cli sign payments --file event.json
//!
//! # Sign a payload the way the commerce backend would
//! checkout-cli sign commerce --file product.json
//!
//! # Ask a running server to invalidate a rendered path
//! checkout-cli revalidate /shop --url http://127.0.0.1:3002
//! ```
//!
//! # Commands
//!
//! - `migrate` - Run database migrations
//! - `sign` - Produce webhook signature headers for local testing
//! - `revalidate` - Trigger a revalidation through the server

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "checkout-cli")]
#[command(author, version, about = "Checkout server CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Print the signature header for a webhook payload
    Sign {
        #[command(subcommand)]
        scheme: SignScheme,
    },
    /// Invalidate a rendered path through a running server
    Revalidate {
        /// Path to invalidate, e.g. `/product/tee`
        path: String,

        /// Base URL of the checkout server
        #[arg(short, long, default_value = "http://127.0.0.1:3002")]
        url: String,

        /// Request timeout in seconds
        #[arg(long, default_value_t = 10)]
        timeout_secs: u64,
    },
}

#[derive(Subcommand)]
enum SignScheme {
    /// Payment provider scheme (`t=<ts>,v1=<hex>`)
    Payments {
        /// File holding the exact body to sign
        #[arg(short, long)]
        file: PathBuf,

        /// Environment variable holding the secret
        #[arg(long, default_value = "STRIPE_WEBHOOK_SECRET")]
        secret_env: String,
    },
    /// Commerce backend scheme (base64 HMAC)
    Commerce {
        /// File holding the exact body to sign
        #[arg(short, long)]
        file: PathBuf,

        /// Environment variable holding the secret
        #[arg(long, default_value = "COMMERCE_WEBHOOK_SECRET")]
        secret_env: String,
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
        Commands::Migrate => commands::migrate::run().await?,
        Commands::Sign { scheme } => match scheme {
            SignScheme::Payments { file, secret_env } => {
                commands::sign::payments(&file, &secret_env)?;
            }
            SignScheme::Commerce { file, secret_env } => {
                commands::sign::commerce(&file, &secret_env)?;
            }
        },
        Commands::Revalidate {
            path,
            url,
            timeout_secs,
        } => {
            commands::revalidate::run(&url, &path, Duration::from_secs(timeout_secs)).await?;
        }
    }
    Ok(())
}
