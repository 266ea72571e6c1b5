//! Market Signal - composite market assessment for crypto assets
//!
//! Combines a live quote, a technical indicator over recent price history and
//! several news feeds, then asks a hosted language model for a trading signal.
//! Fetches are coalesced, cached, retried and refreshed by a single
//! [`orchestrator::FetchOrchestrator`]; nothing is persisted.

pub mod config;
pub mod credentials;
pub mod error;
pub mod indicators;
pub mod news;
pub mod orchestrator;
pub mod scheduler;
pub mod services;
pub mod signal;
pub mod sources;
pub mod state;

#[cfg(test)]
pub(crate) mod testing;

pub use config::AppConfig;
pub use credentials::{Credential, CredentialStore};
pub use error::{AppError, Result};
pub use state::{AppState, Dashboard, GroupState};

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// JSON configuration file; defaults apply when omitted
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Symbol to select instead of the configured default
    #[arg(long)]
    pub symbol: Option<String>,

    /// Stream the analysis instead of waiting for a buffered answer
    #[arg(long, default_value_t = false)]
    pub stream: bool,

    /// Keep refreshing and re-print the dashboard until Ctrl-C
    #[arg(long, default_value_t = false)]
    pub watch: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Manage API keys stored in the OS keychain
    Credentials {
        #[command(subcommand)]
        action: CredentialAction,
    },
}

#[derive(Subcommand, Debug, Clone)]
pub enum CredentialAction {
    /// Store a key read from stdin (`openai` or `newsapi`)
    Set { name: String },
    /// Remove a stored key
    Delete { name: String },
}

/// Initialize tracing/logging on stderr, keeping stdout for dashboard output
pub fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "market_signal=debug,market_signal_lib=debug,reqwest=info".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
