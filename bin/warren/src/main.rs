//! warren deploys a WarrenWalletMulti vault and applies its initial configuration.

mod cli;

use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use alloy_core::primitives::Address;
use anyhow::{Context, Result};
use clap::Parser;

use cli::Cli;
use warren_provision::{
    ConfigurationPlan, ContractArtifact, PipelineReport, ProcessEnv, ProvisioningConfig,
    ProvisioningPipeline, RpcChainClient, RpcChainClientConfig, RunRecord, TracingReporter,
    report::{plan_table, summary_table},
};

/// Dotenv file picked up when no `--env-file` is given.
const DEFAULT_ENV_FILE: &str = ".env";

/// What the run provisions.
enum Target {
    /// Deploy a new vault, then configure it.
    Deploy(ProvisioningConfig),
    /// Configure a vault that already exists.
    Existing(Address, ConfigurationPlan),
}

impl Target {
    fn plan(&self) -> &ConfigurationPlan {
        match self {
            Target::Deploy(config) => &config.plan,
            Target::Existing(_, plan) => plan,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let env_file = load_env_file(cli.env_file.as_deref())?;

    // Parse again so that flags backed by env vars see the dotenv values.
    let cli = if env_file.is_some() { Cli::parse() } else { cli };

    // Initialize the logger.
    tracing_subscriber::fmt()
        .with_max_level(cli.verbosity)
        .init();

    if let Some(path) = &env_file {
        tracing::debug!(path = %path.display(), "Env file loaded");
    }

    // Validate the whole configuration before touching the network.
    let target = match cli.vault {
        Some(vault) => Target::Existing(vault, ConfigurationPlan::load(&ProcessEnv)?),
        None => Target::Deploy(ProvisioningConfig::load(&ProcessEnv)?),
    };

    if target.plan().is_empty() {
        tracing::warn!("No Aave provider nor asset configured, the vault will not be configured");
    }

    if cli.dry_run {
        if let Target::Deploy(config) = &target {
            tracing::info!(admin = %config.admin, treasury = %config.treasury, "Vault governance");
        }
        tracing::info!("Dry run, nothing will be sent");
        println!("{}", plan_table(target.plan()));
        return Ok(());
    }

    let artifact = ContractArtifact::load_from_file(&cli.artifact)?;
    let chain_config = RpcChainClientConfig {
        from: cli.from,
        receipt_timeout: Duration::from_secs(cli.receipt_timeout),
        ..RpcChainClientConfig::new(cli.rpc_url.clone())
    };
    let chain = RpcChainClient::connect(chain_config, artifact).await?;

    let pipeline =
        ProvisioningPipeline::new(&chain, &TracingReporter).policy(cli.failure_policy());

    let run = async {
        match &target {
            Target::Deploy(config) => pipeline.run(config).await,
            Target::Existing(vault, plan) => {
                tracing::info!(vault = %vault, "Configuring existing vault...");
                Ok(pipeline.configure(*vault, plan).await)
            }
        }
    };

    // Transactions already mined stay on-chain when interrupted.
    let report = tokio::select! {
        report = run => report?,
        _ = tokio::signal::ctrl_c() => {
            anyhow::bail!("Interrupted, provisioning stopped before completion");
        }
    };

    finish(&cli, &report, &chain)
}

/// Load a dotenv file into the process environment. Variables that are
/// already set win. Without an explicit path, `.env` is loaded if present.
fn load_env_file(path: Option<&Path>) -> Result<Option<PathBuf>> {
    match path {
        Some(path) => {
            dotenvy::from_path(path)
                .with_context(|| format!("Failed to load env file {}", path.display()))?;
            Ok(Some(path.to_path_buf()))
        }
        None => find_env_file(Path::new(DEFAULT_ENV_FILE)),
    }
}

/// Load `filename` from the current directory or one of its parents.
///
/// A missing file is not an error, a malformed one is: variables before the
/// bad line would already be set.
fn find_env_file(filename: &Path) -> Result<Option<PathBuf>> {
    match dotenvy::from_filename(filename) {
        Ok(path) => Ok(Some(path)),
        Err(e) if e.not_found() => Ok(None),
        Err(e) => Err(e).with_context(|| format!("Failed to load env file {}", filename.display())),
    }
}

fn finish(cli: &Cli, report: &PipelineReport, chain: &RpcChainClient) -> Result<()> {
    println!("{}", summary_table(report));

    if let Some(path) = &cli.record {
        RunRecord::from_report(report, chain.chain_id(), chain.from_address())
            .save_to_file(path)?;
    }

    report.ensure_success()?;

    tracing::info!(vault = %report.vault, "✓ Provisioning complete!");

    Ok(())
}
