//! BRVS daemon: entry point for running the validator sidecar.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use brvs_node::{init_logging, Brvs, BrvsConfig, Collaborators};
use brvs_nullables::{NullAccountRegistry, NullLedger, NullVerdictStore};
use brvs_store::{AccountRegistry, RegisteredAccount};
use brvs_types::AccountId;
use clap::Parser;

#[derive(Parser)]
#[command(name = "brvs-daemon", about = "BRVS validator and co-signer daemon")]
struct Cli {
    /// Path to a TOML configuration file. File settings are the base; CLI
    /// flags and env vars override them.
    #[arg(long, env = "BRVS_CONFIG")]
    config: Option<PathBuf>,

    /// Account BRVS co-signs as.
    #[arg(long, env = "BRVS_ACCOUNT")]
    brvs_account: Option<String>,

    /// File holding the hex-encoded signing key.
    #[arg(long, env = "BRVS_KEY_FILE")]
    key_file: Option<PathBuf>,

    /// Interval between pending-batch polls, in milliseconds.
    #[arg(long, env = "BRVS_PENDING_POLL_INTERVAL_MS")]
    pending_poll_interval_ms: Option<u64>,

    /// Log level: "trace", "debug", "info", "warn", "error".
    #[arg(long, env = "BRVS_LOG_LEVEL")]
    log_level: Option<String>,

    /// Log format: "human" or "json".
    #[arg(long, env = "BRVS_LOG_FORMAT")]
    log_format: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Subcommand)]
enum Command {
    /// Run the validation pipeline until SIGINT/SIGTERM.
    Run {
        /// Accounts to watch, registered in the in-memory registry at start.
        #[arg(long = "register", value_delimiter = ',')]
        register: Vec<String>,
    },
    /// Print the effective configuration as TOML.
    Config,
    /// Generate a fresh signing key pair and print it as hex.
    Keygen,
}

impl Cli {
    fn load_config(&self) -> anyhow::Result<BrvsConfig> {
        let mut config = match &self.config {
            Some(path) => BrvsConfig::from_toml_file(path)
                .with_context(|| format!("loading {}", path.display()))?,
            None => BrvsConfig::default(),
        };
        if let Some(account) = &self.brvs_account {
            config.brvs_account = AccountId::parse(account.clone())?;
        }
        if let Some(key_file) = &self.key_file {
            config.key_file = key_file.clone();
        }
        if let Some(interval) = self.pending_poll_interval_ms {
            config.pending_poll_interval_ms = interval;
        }
        if let Some(level) = &self.log_level {
            config.log_level = level.clone();
        }
        if let Some(format) = &self.log_format {
            config.log_format = format.clone();
        }
        // Re-check the merged result.
        BrvsConfig::from_toml_str(&config.to_toml_string()?)
            .context("invalid configuration after applying overrides")
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = cli.load_config()?;

    match cli.command {
        Command::Config => {
            print!("{}", config.to_toml_string()?);
        }
        Command::Keygen => {
            let keypair = brvs_crypto::generate_keypair();
            println!("private: {}", brvs_crypto::private_key_to_hex(&keypair.private));
            println!("public:  {}", keypair.public);
        }
        Command::Run { register } => {
            init_logging(config.log_format()?, &config.log_level)?;
            let keypair = config.load_keypair()?;
            tracing::info!(
                account = %config.brvs_account,
                public_key = %keypair.public,
                poll_ms = config.pending_poll_interval_ms,
                "starting BRVS"
            );

            // The ledger wire client and the persistent stores are deployed
            // separately; the daemon runs against in-memory collaborators.
            tracing::warn!("using in-memory ledger, verdict store and registry");
            let registry = Arc::new(NullAccountRegistry::new());
            for account in register {
                registry.register(RegisteredAccount {
                    account_id: AccountId::parse(account)?,
                    user_key_count: None,
                })?;
            }
            let collaborators = Collaborators {
                ledger: Arc::new(NullLedger::new()),
                verdicts: Arc::new(NullVerdictStore::new()),
                registry,
            };

            let mut brvs = Brvs::new(config, keypair, collaborators);
            brvs.start().await?;
            brvs.run_until_shutdown().await?;
            tracing::info!("BRVS daemon exited cleanly");
        }
    }

    Ok(())
}
