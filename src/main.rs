use anyhow::{bail, Context, Result};
use clap::Parser;
use market_signal_lib::services::DashboardService;
use market_signal_lib::sources::AnalysisMode;
use market_signal_lib::{
    init_tracing, AppConfig, AppState, Cli, Command, Credential, CredentialAction,
    CredentialStore, Dashboard,
};
use std::sync::Arc;
use std::time::Duration;

/// Re-print interval in watch mode when quotes have no refetch interval
const DEFAULT_WATCH_INTERVAL: Duration = Duration::from_secs(15 * 60);

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing();

    let credentials = Arc::new(CredentialStore::new());
    if let Some(Command::Credentials { action }) = cli.command {
        return manage_credentials(&credentials, action);
    }

    let mut config = AppConfig::load(cli.config.as_deref())?;
    if cli.stream {
        config.analysis.mode = AnalysisMode::Streamed;
    }

    tracing::info!("Starting market-signal...");
    let state = AppState::new(config, credentials)?;
    if let Some(symbol) = &cli.symbol {
        state.select_symbol(symbol)?;
    }

    let dashboard = DashboardService::refresh(&state).await;
    print_dashboard(&dashboard)?;

    if cli.watch {
        watch(&state).await?;
    }

    state.shutdown();
    Ok(())
}

async fn watch(state: &AppState) -> Result<()> {
    let every = state
        .policies
        .quote
        .refetch_interval
        .unwrap_or(DEFAULT_WATCH_INTERVAL);
    tracing::info!("Watching {} every {:?}, Ctrl-C to stop", state.selected_symbol(), every);

    let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + every, every);
    loop {
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                result.context("Failed to listen for Ctrl-C")?;
                tracing::info!("Shutting down");
                return Ok(());
            }
            _ = ticker.tick() => {
                let dashboard = DashboardService::refresh(state).await;
                print_dashboard(&dashboard)?;
            }
        }
    }
}

fn print_dashboard(dashboard: &Dashboard) -> Result<()> {
    let json = serde_json::to_string_pretty(dashboard).context("Failed to serialize dashboard")?;
    println!("{}", json);
    Ok(())
}

fn manage_credentials(store: &CredentialStore, action: CredentialAction) -> Result<()> {
    match action {
        CredentialAction::Set { name } => {
            let credential = parse_credential(&name)?;
            let mut secret = String::new();
            std::io::stdin()
                .read_line(&mut secret)
                .context("Failed to read key from stdin")?;
            let secret = secret.trim();
            if secret.is_empty() {
                bail!("No key given on stdin");
            }
            store.store(credential, secret)?;
            tracing::info!("Stored {} key in the keychain", name);
        }
        CredentialAction::Delete { name } => {
            let credential = parse_credential(&name)?;
            store.delete(credential)?;
            tracing::info!("Deleted {} key from the keychain", name);
        }
    }
    Ok(())
}

fn parse_credential(name: &str) -> Result<Credential> {
    match Credential::parse(name) {
        Some(credential) => Ok(credential),
        None => bail!("Unknown credential '{}', expected openai or newsapi", name),
    }
}
