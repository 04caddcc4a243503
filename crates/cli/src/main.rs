//! Soko CLI - operator tools for the booking core.
//!
//! # Usage
//!
//! ```bash
//! # Run database migrations
//! soko migrate
//!
//! # Load sellers, products and drivers from a fixture
//! soko seed --file crates/cli/fixtures/seed.yaml
//!
//! # Quote a fare
//! soko fare --distance 9 --category XL
//!
//! # Release stock held by abandoned checkouts
//! soko reservations sweep
//!
//! # Settle an external payment
//! soko payments confirm --reference ORDER_<uuid> --outcome verified
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use tracing_subscriber::EnvFilter;

use soko_core::{CarCategory, PaymentStatus};

mod commands;

const DEFAULT_LOG_FILTER: &str = "soko_engine=info,soko_cli=info";

#[derive(Parser)]
#[command(name = "soko")]
#[command(author, version, about = "Soko booking core tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Seed the database from a YAML fixture
    Seed {
        /// Path to the fixture file
        #[arg(short, long)]
        file: String,
    },
    /// Quote a ride fare
    Fare {
        /// Distance in kilometres
        #[arg(short, long)]
        distance: Decimal,

        /// Car category (`Medium` or `XL`)
        #[arg(short, long, default_value = "Medium")]
        category: CarCategory,
    },
    /// Manage stock reservations
    Reservations {
        #[command(subcommand)]
        action: ReservationAction,
    },
    /// Manage payments
    Payments {
        #[command(subcommand)]
        action: PaymentAction,
    },
}

#[derive(Subcommand)]
enum ReservationAction {
    /// Release reservations held longer than `SOKO_RESERVATION_TTL_SECS`
    Sweep,
}

#[derive(Subcommand)]
enum PaymentAction {
    /// Settle a pending payment
    Confirm {
        /// Payment reference (`ORDER_<id>` or `RIDE_<id>`)
        #[arg(short, long)]
        reference: String,

        /// `verified` or `failed`
        #[arg(short, long, default_value = "verified")]
        outcome: PaymentStatus,
    },
}

#[tokio::main]
async fn main() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    tracing_subscriber::fmt().with_env_filter(filter).init();

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
        Commands::Seed { file } => commands::seed::from_file(&file).await?,
        Commands::Fare { distance, category } => commands::fare::quote(distance, category)?,
        Commands::Reservations { action } => match action {
            ReservationAction::Sweep => commands::reservations::sweep().await?,
        },
        Commands::Payments { action } => match action {
            PaymentAction::Confirm { reference, outcome } => {
                commands::payments::confirm(&reference, outcome).await?;
            }
        },
    }
    Ok(())
}
