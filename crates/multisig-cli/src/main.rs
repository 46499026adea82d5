//! multisig: command-line dashboard for a timelocked multisig wallet.

mod render;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use multisig_core::client;
use multisig_core::config::{signer_key_from_env, ClientConfig};
use multisig_core::dashboard::{Dashboard, WriteOutcome};
use multisig_core::types::TxTab;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "multisig", version, about = "Timelocked multisig wallet dashboard")]
struct Cli {
    /// Path to a TOML configuration file. File settings are the base;
    /// CLI flags and env vars override them.
    #[arg(long, env = "MULTISIG_CONFIG")]
    config: Option<PathBuf>,

    /// JSON-RPC endpoint (defaults to the chain's built-in URL).
    #[arg(long, env = "MULTISIG_RPC_URL")]
    rpc_url: Option<String>,

    /// Chain ID the node must report.
    #[arg(long, env = "MULTISIG_CHAIN_ID")]
    chain_id: Option<u64>,

    /// Directory for the transaction cache.
    #[arg(long, env = "MULTISIG_CACHE_DIR")]
    cache_dir: Option<PathBuf>,

    /// Account to view as when no signer key is set.
    #[arg(long, env = "MULTISIG_ACCOUNT")]
    account: Option<String>,

    /// Log level: "trace", "debug", "info", "warn", "error".
    /// RUST_LOG takes precedence when set.
    #[arg(long, default_value = "info", env = "MULTISIG_LOG_LEVEL")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Show owner, signer figures, pending count and balance.
    Status,

    /// Sync and print the transaction list.
    List {
        #[arg(long, value_enum, default_value_t = Tab::Pending)]
        tab: Tab,
    },

    /// Keep the list in sync and reprint it whenever it changes.
    Watch {
        #[arg(long, value_enum, default_value_t = Tab::Pending)]
        tab: Tab,

        /// Seconds between refetches.
        #[arg(long, default_value_t = 15)]
        interval_secs: u64,
    },

    /// Propose a new transaction (contract owner only).
    Propose {
        /// Recipient address.
        #[arg(long)]
        to: String,

        /// Amount in native units, e.g. "0.5".
        #[arg(long)]
        amount: String,

        /// Optional 0x-prefixed calldata.
        #[arg(long, default_value = "")]
        data: String,
    },

    /// Confirm a pending transaction.
    Confirm(IdArgs),

    /// Revoke an earlier confirmation.
    Revoke(IdArgs),

    /// Execute a transaction whose quorum and timelock are met.
    Execute(IdArgs),
}

#[derive(clap::Args)]
struct IdArgs {
    /// Transaction id.
    id: u64,

    /// Wait for the receipt and refresh the list.
    #[arg(long)]
    wait: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum Tab {
    Pending,
    Executed,
    All,
}

impl From<Tab> for TxTab {
    fn from(tab: Tab) -> Self {
        match tab {
            Tab::Pending => TxTab::Pending,
            Tab::Executed => TxTab::Executed,
            Tab::All => TxTab::All,
        }
    }
}

fn init_tracing(default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(cli: &Cli) -> Result<ClientConfig> {
    let mut config = match &cli.config {
        Some(path) => {
            let config = ClientConfig::load(path)?;
            tracing::info!("Loaded config from {}", path.display());
            config
        }
        None => ClientConfig::default(),
    };

    if let Some(url) = &cli.rpc_url {
        config.rpc_url = url.clone();
    }
    if let Some(chain_id) = cli.chain_id {
        config.chain_id = chain_id;
    }
    if let Some(dir) = &cli.cache_dir {
        config.cache_dir = dir.clone();
    }
    if cli.account.is_some() {
        config.account = cli.account.clone();
    }
    config.validate()?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log_level);

    let config = load_config(&cli)?;
    let mut dash = client::connect(&config, signer_key_from_env())
        .await
        .context("failed to connect")?;

    let symbol = config.native_symbol();
    let required = config.required_confirmations;

    match cli.command {
        Command::Status => {
            dash.load_owner().await;
            let stats = dash.stats().await;
            print!("{}", render::stats(&stats, dash.owner(), dash.is_owner()));
        }
        Command::List { tab } => {
            if let Some(handle) = dash.sync().activate() {
                handle.await.context("sync task failed")?;
            }
            print!(
                "{}",
                render::transactions(&dash.sync().snapshot(), tab.into(), symbol, required)
            );
        }
        Command::Watch { tab, interval_secs } => {
            watch(&dash, tab.into(), Duration::from_secs(interval_secs.max(1)), symbol, required)
                .await?;
        }
        Command::Propose { to, amount, data } => {
            dash.load_owner().await;
            let receipt = dash.propose(&to, &amount, &data).await?;
            println!(
                "Proposal mined in block {} ({})",
                receipt.block_number, receipt.transaction_hash
            );
            print_link(&config, &receipt.transaction_hash);
        }
        Command::Confirm(args) => report(&config, dash.confirm(args.id, args.wait).await?),
        Command::Revoke(args) => report(&config, dash.revoke(args.id, args.wait).await?),
        Command::Execute(args) => report(&config, dash.execute(args.id, args.wait).await?),
    }

    Ok(())
}

fn report(config: &ClientConfig, outcome: WriteOutcome) {
    let hash = match outcome {
        WriteOutcome::Submitted { hash } => {
            println!("Transaction submitted: {hash}");
            hash
        }
        WriteOutcome::Mined(receipt) => {
            println!(
                "Transaction mined in block {} ({})",
                receipt.block_number, receipt.transaction_hash
            );
            receipt.transaction_hash
        }
    };
    print_link(config, &hash);
}

fn print_link(config: &ClientConfig, hash: &str) {
    if let Some(url) = config.explorer_tx_url(hash) {
        println!("  {url}");
    }
}

async fn watch(
    dash: &Dashboard,
    tab: TxTab,
    every: Duration,
    symbol: &str,
    required: u32,
) -> Result<()> {
    let sync = dash.sync();
    let mut updates = sync.subscribe();
    // Finish the first fetch before the ticker starts refetching.
    if let Some(handle) = sync.activate() {
        handle.await.context("sync task failed")?;
    }

    let mut ticker = tokio::time::interval(every);
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("stopping watch");
                return Ok(());
            }
            _ = ticker.tick() => {
                if let Err(e) = sync.refetch().await {
                    tracing::debug!(error = %e, "periodic refetch failed");
                }
            }
            changed = updates.changed() => {
                changed.context("transaction sync closed")?;
                let state = updates.borrow_and_update().clone();
                if !state.loading {
                    print!("{}", render::transactions(&state, tab, symbol, required));
                }
            }
        }
    }
}
