//! AcidCheck CLI - drive a verification session from the terminal.
//!
//! The terminal host has no passkey or camera capability, so those methods
//! degrade exactly as the core prescribes (passkey suspends, face routes to
//! the trusted-party flow).

use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;
mod exit_codes;
mod terminal;
mod utils;

#[derive(Parser)]
#[command(name = "acid")]
#[command(author, version, about = "AcidCheck identity verification", long_about = None)]
struct Cli {
    /// Trust-service base URL (overrides ACID_BASE_URL)
    #[arg(long, global = true)]
    base_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Verify an identity (login flow)
    Login {
        /// Subject identifier (acid)
        #[arg(value_name = "SUBJECT")]
        subject: String,
    },

    /// Update verification methods (enrollment flow)
    Enroll {
        /// Subject identifier (acid)
        #[arg(value_name = "SUBJECT")]
        subject: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Login { subject } => commands::login::execute(subject, cli.base_url).await,
        Commands::Enroll { subject } => commands::enroll::execute(subject, cli.base_url).await,
    }
}
