//! warren-provision - Provisioning pipeline for the WarrenWalletMulti vault.
//!
//! This crate deploys a vault through an Ethereum JSON-RPC endpoint and applies
//! its initial configuration: the Aave provider and the listed assets.
//!
//! # Example
//!
//! ```no_run
//! use warren_provision::{
//!     ContractArtifact, ProcessEnv, ProvisioningConfig, ProvisioningPipeline, RpcChainClient,
//!     RpcChainClientConfig, TracingReporter,
//! };
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = ProvisioningConfig::load(&ProcessEnv)?;
//! let artifact = ContractArtifact::load_from_file(
//!     "artifacts/contracts/WarrenWalletMulti.sol/WarrenWalletMulti.json".as_ref(),
//! )?;
//! let chain = RpcChainClient::connect(
//!     RpcChainClientConfig::new("http://127.0.0.1:8545".parse()?),
//!     artifact,
//! )
//! .await?;
//!
//! let report = ProvisioningPipeline::new(&chain, &TracingReporter)
//!     .run(&config)
//!     .await?;
//! report.ensure_success()?;
//! # Ok(())
//! # }
//! ```

pub mod chain;
mod config;
mod error;
mod pipeline;
pub mod report;

pub use chain::{
    ChainClient, ContractArtifact, DEFAULT_ARTIFACT_PATH, PendingTx, RpcChainClient,
    RpcChainClientConfig, TxReceipt, VaultCall,
};
pub use config::{
    AAVE_PROVIDER_KEY, ADMIN_ADDRESS_KEY, AssetEntry, AssetSymbol, ConfigSource,
    ConfigurationPlan, DAO_TREASURY_KEY, ProcessEnv, ProvisioningConfig,
};
pub use error::ProvisionError;
pub use pipeline::{
    ConfigurationStep, DeployedVault, FailurePolicy, PipelineReport, ProvisioningPipeline,
    StepOutcome, StepResult,
};
pub use report::{ProvisionEvent, Reporter, RunRecord, TracingReporter};
