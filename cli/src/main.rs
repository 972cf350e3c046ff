mod commands;
mod export;

use api_client::{live::LiveClient, mock::MockClient, PortalApi};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "mari", version, about = "Portal client for the Mari mobile-money platform")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Create an account
    Register {
        #[arg(long)]
        full_name: String,
        #[arg(long)]
        phone: String,
    },
    /// Sign in and store the session token
    Login {
        #[arg(long)]
        phone: String,
    },
    /// Sign out and clear the stored session
    Logout,
    /// Show wallet balances
    Balance,
    /// Buy airtime, data bundles or electricity
    #[command(subcommand)]
    Buy(BuyCommand),
    /// Send money to another wallet
    Transfer {
        #[arg(long)]
        to: String,
        #[arg(long)]
        amount: String,
        #[arg(long)]
        note: Option<String>,
    },
    /// Fund the wallet and watch the deposit settle
    #[command(subcommand)]
    Deposit(DepositCommand),
    /// Transaction history
    History {
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long, default_value_t = 20)]
        per_page: u32,
        /// Write the fetched page to a CSV file
        #[arg(long)]
        export: Option<PathBuf>,
    },
    /// Manage API tokens
    #[command(subcommand)]
    Tokens(TokenCommand),
}

#[derive(Subcommand)]
pub enum BuyCommand {
    /// Airtime top-up for any mobile number
    Airtime {
        #[arg(long)]
        phone: String,
        #[arg(long)]
        amount: String,
    },
    /// List the data bundle catalogue
    Bundles,
    /// Buy a data bundle by catalogue code
    Bundle {
        #[arg(long)]
        phone: String,
        #[arg(long)]
        code: String,
    },
    /// Prepaid electricity token for a meter
    Electricity {
        #[arg(long)]
        meter: String,
        #[arg(long)]
        amount: String,
    },
}

#[derive(Subcommand)]
pub enum DepositCommand {
    /// Push payment prompt on your mobile wallet
    MobileWallet {
        #[arg(long)]
        amount: String,
        /// Wallet number; falls back to the configured default
        #[arg(long)]
        wallet: Option<String>,
    },
    /// Redemption code payable at an agent counter
    Voucher {
        #[arg(long)]
        amount: String,
    },
    /// Past deposit attempts from the local ledger
    List,
}

#[derive(Subcommand)]
pub enum TokenCommand {
    /// List tokens and their fingerprints
    List,
    /// Create a token; the secret is shown once
    Create {
        #[arg(long)]
        name: String,
    },
    /// Revoke a token by id
    Revoke {
        #[arg(long)]
        id: String,
    },
}

fn init_tracing() {
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(env_filter))
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn create_portal_client(cfg: &config::AppConfig) -> anyhow::Result<Arc<dyn PortalApi>> {
    match cfg.client.kind.as_str() {
        "live" => {
            let base_url = std::env::var("MARI_API_URL")
                .ok()
                .or_else(|| cfg.client.base_url.clone())
                .ok_or_else(|| {
                    anyhow::anyhow!("live client needs a base_url (config or MARI_API_URL)")
                })?;

            // Resume the stored session when one exists.
            let token = config::get_secret(config::SESSION_TOKEN_KEY).ok();
            tracing::info!(%base_url, "Using live portal API");
            Ok(LiveClient::with_token(base_url, token))
        }
        _ => {
            tracing::info!("Using mock portal API");
            Ok(MockClient::new())
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let cfg = config::load().unwrap_or_default();
    let client = create_portal_client(&cfg)?;

    commands::run(client, &cfg, cli.command).await
}
