use std::path::PathBuf;

use alloy_core::primitives::Address;
use clap::Parser;
use tracing::level_filters::LevelFilter;
use url::Url;
use warren_provision::{DEFAULT_ARTIFACT_PATH, FailurePolicy};

/// The default RPC endpoint (a local Hardhat or Anvil node).
const DEFAULT_RPC_URL: &str = "http://127.0.0.1:8545";

#[derive(Debug, Parser)]
#[command(name = "warren")]
#[command(
    author,
    version,
    about = "Deploy and configure a WarrenWalletMulti vault"
)]
pub struct Cli {
    /// The verbosity level.
    #[arg(short, long, env = "WARREN_VERBOSITY", default_value_t = LevelFilter::INFO)]
    pub verbosity: LevelFilter,

    /// The URL of the JSON-RPC endpoint transactions are sent to.
    #[arg(long, alias = "rpc", env = "WARREN_RPC_URL", default_value = DEFAULT_RPC_URL)]
    pub rpc_url: Url,

    /// The sending account. It must be unlocked on the node.
    ///
    /// If not provided, the node's first account is used.
    #[arg(long, env = "WARREN_FROM")]
    pub from: Option<Address>,

    /// Path to the compiled WarrenWalletMulti artifact (Hardhat JSON).
    #[arg(long, env = "WARREN_ARTIFACT", default_value = DEFAULT_ARTIFACT_PATH)]
    pub artifact: PathBuf,

    /// Configure an already-deployed vault instead of deploying a new one.
    ///
    /// ADMIN_ADDRESS and DAO_TREASURY are not required in this mode.
    #[arg(long, env = "VAULT_ADDRESS")]
    pub vault: Option<Address>,

    /// Path to a dotenv file to load before reading the configuration.
    ///
    /// If not provided, a `.env` file in the current directory is loaded when present.
    #[arg(long)]
    pub env_file: Option<PathBuf>,

    /// Keep applying configuration steps after one of them failed.
    #[arg(long, env = "WARREN_CONTINUE_ON_FAILURE", default_value_t = false)]
    pub continue_on_failure: bool,

    /// Seconds to wait for each transaction to be mined.
    #[arg(long, env = "WARREN_RECEIPT_TIMEOUT", default_value_t = 120)]
    pub receipt_timeout: u64,

    /// Write a TOML record of the run to this path.
    #[arg(long, env = "WARREN_RECORD")]
    pub record: Option<PathBuf>,

    /// Validate the configuration and print the planned steps without sending anything.
    #[arg(long)]
    pub dry_run: bool,
}

impl Cli {
    pub fn failure_policy(&self) -> FailurePolicy {
        if self.continue_on_failure {
            FailurePolicy::Continue
        } else {
            FailurePolicy::Abort
        }
    }
}
