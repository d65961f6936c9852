//! Wallet background service CLI
//!
//! Command-line access to a file-backed background service.

use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use wallet_background::accounts::{
    group_of_address, AccountSigner, AccountType, BaseAccount, KeyType, SignerKind, WalletAccount,
};
use wallet_background::preauth::RequestOptions;
use wallet_background::wallet::SecureWallet;
use wallet_background::{BackgroundService, Config, Error, Result, PRIVATE_KEY_ENV};

#[derive(Parser)]
#[command(name = "wallet-bg")]
#[command(about = "Wallet background service: site authorizations, network health, transactions")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log as JSON lines
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Show current configuration
    Config,

    /// Show health of every configured network
    Status,

    /// Allow a site to use an account
    Authorize {
        host: String,

        #[arg(short, long)]
        address: String,

        #[arg(short, long)]
        network: String,
    },

    /// Revoke a site's authorizations (all of them unless an account is given)
    Revoke {
        host: String,

        #[arg(short, long, requires = "network")]
        address: Option<String>,

        #[arg(short, long, requires = "address")]
        network: Option<String>,
    },

    /// List every stored authorization
    Authorizations,

    /// Check whether a site may act with the given filters
    Check {
        host: String,

        #[arg(short, long)]
        address: Option<String>,

        #[arg(short, long)]
        network: Option<String>,

        /// Chain group filter
        #[arg(short, long)]
        group: Option<u32>,
    },

    /// Move legacy host-only authorizations into the registry
    Migrate,

    /// List accounts, optionally importing the key from the environment
    Accounts {
        #[arg(short, long)]
        network: Option<String>,

        /// Add the account of WALLET_PRIVATE_KEY on --network
        #[arg(long, requires = "network")]
        import: bool,
    },

    /// List recorded transactions
    Transactions {
        #[arg(short, long, requires = "network")]
        address: Option<String>,

        #[arg(short, long)]
        network: Option<String>,

        /// Only transactions that are not settled yet
        #[arg(long)]
        pending: bool,
    },

    /// Poll a recorded transaction until it settles
    Track {
        hash: String,

        #[arg(short, long)]
        network: String,
    },
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (ignore if not found)
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    let registry = tracing_subscriber::registry().with(filter);
    if cli.json {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(fmt::layer().with_writer(std::io::stderr))
            .init();
    }

    let config = Config::load(cli.config.as_deref())?;

    if let Commands::Config = cli.command {
        return print_json(&config);
    }

    let service = BackgroundService::open(config).await?;

    match cli.command {
        Commands::Config => print_json(service.config())?,
        Commands::Status => {
            let mut statuses: Vec<_> = service.network_statuses().await.into_values().collect();
            statuses.sort_by(|a, b| a.network_id.cmp(&b.network_id));
            print_json(&statuses)?;
        }
        Commands::Authorize {
            host,
            address,
            network,
        } => {
            service.config().network(&network)?;
            service
                .registry()
                .authorize(BaseAccount::new(address, network), &host)
                .await?;
        }
        Commands::Revoke {
            host,
            address,
            network,
        } => {
            let account = address.zip(network).map(|(a, n)| BaseAccount::new(a, n));
            service.registry().revoke(&host, account.as_ref()).await?;
        }
        Commands::Authorizations => {
            print_json(&service.registry().list_authorizations().await)?;
        }
        Commands::Check {
            host,
            address,
            network,
            group,
        } => {
            let options = RequestOptions {
                host,
                network_id: network,
                address,
                chain_group: group,
            };
            let authorized = service.registry().is_authorized(&options).await;
            print_json(&serde_json::json!({ "authorized": authorized }))?;
        }
        Commands::Migrate => {
            let migrated = service.registry().migrate_legacy().await?;
            print_json(&serde_json::json!({ "migrated": migrated }))?;
        }
        Commands::Accounts { network, import } => {
            if import {
                let network = network
                    .as_deref()
                    .ok_or_else(|| Error::InvalidArgument("--network is required".to_string()))?;
                import_account(&service, network).await?;
            }
            let accounts = match network {
                Some(network) => service.accounts().visible(&network).await,
                None => service.accounts().all().await,
            };
            print_json(&accounts)?;
        }
        Commands::Transactions {
            address,
            network,
            pending,
        } => {
            let mut transactions = match (address, &network) {
                (Some(address), Some(network)) => {
                    let account = BaseAccount::new(address, network.as_str());
                    if pending {
                        service.transactions().pending_for_account(&account).await
                    } else {
                        service.transactions().for_account(&account).await
                    }
                }
                _ => service.transactions().all().await,
            };
            if let Some(network) = network {
                transactions.retain(|t| t.network_id() == network);
            }
            if pending {
                transactions.retain(|t| !t.status.is_terminal());
            }
            print_json(&transactions)?;
        }
        Commands::Track { hash, network } => {
            let target = service.config().network(&network)?.clone();
            if let Some(handle) = service.tracker().track(&hash, &target).await? {
                handle.wait().await;
            }
            let transaction = service
                .transactions()
                .get(&hash, &network)
                .await
                .ok_or_else(|| Error::TransactionNotFound(hash.clone()))?;
            print_json(&serde_json::json!({
                "hash": transaction.hash,
                "status": transaction.status,
                "summary": transaction.status.summary(),
                "blockHash": transaction.block_hash,
                "failure": transaction.failure,
            }))?;
        }
    }

    Ok(())
}

async fn import_account(service: &BackgroundService, network: &str) -> Result<()> {
    service.config().network(network)?;
    let wallet = SecureWallet::from_env(PRIVATE_KEY_ENV)?;
    let address = wallet.address().to_string();

    let account = WalletAccount {
        base: BaseAccount::new(address.as_str(), network),
        signer: AccountSigner {
            kind: SignerKind::LocalSecret,
            key_type: KeyType::Default,
            public_key: wallet.public_key_hex(),
            derivation_index: 0,
            group: group_of_address(&address),
        },
        account_type: AccountType::default(),
        hidden: false,
    };

    if service.accounts().add(account).await? {
        tracing::info!(%address, %network, "Imported account");
    } else {
        tracing::info!(%address, %network, "Account already present");
    }
    Ok(())
}
