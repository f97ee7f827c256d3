//! The provisioning pipeline.
//!
//! A run is strictly sequential: deploy the vault, set the Aave provider if
//! one is configured, then list each asset in priority order. Every
//! transaction is confirmed before the next one is submitted, and nothing is
//! rolled back when a later step fails.

use alloy_core::primitives::{Address, B256};
use serde::{Deserialize, Serialize};

use crate::{
    AssetEntry, ConfigurationPlan, ProvisionError, ProvisioningConfig,
    chain::{ChainClient, TxReceipt, VaultCall},
    report::{ProvisionEvent, Reporter},
};

/// What to do with the remaining steps once a configuration step failed.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, strum::Display, strum::EnumString,
)]
#[strum(serialize_all = "kebab-case")]
pub enum FailurePolicy {
    /// Stop at the first failed step.
    #[default]
    Abort,
    /// Record the failure and keep going.
    Continue,
}

/// One configuration transaction of a plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfigurationStep {
    SetAaveProvider { provider: Address },
    ListAsset(AssetEntry),
}

impl ConfigurationStep {
    /// Stable name used in reports, e.g. `listAsset(USDC)`.
    pub fn name(&self) -> String {
        match self {
            ConfigurationStep::SetAaveProvider { .. } => "setAaveProvider".to_string(),
            ConfigurationStep::ListAsset(entry) => format!("listAsset({})", entry.symbol),
        }
    }

    /// The vault call submitted for this step.
    pub fn to_call(&self) -> VaultCall {
        match self {
            ConfigurationStep::SetAaveProvider { provider } => VaultCall::SetAaveProvider {
                provider: *provider,
            },
            ConfigurationStep::ListAsset(entry) => VaultCall::ListAsset {
                asset: entry.address,
                minimum: entry.minimum,
                enabled: entry.enabled,
            },
        }
    }
}

impl ConfigurationPlan {
    /// The plan's steps in submission order: provider first, then assets.
    pub fn steps(&self) -> Vec<ConfigurationStep> {
        let provider = self
            .aave_provider
            .map(|provider| ConfigurationStep::SetAaveProvider { provider });
        let assets = self.assets.iter().cloned().map(ConfigurationStep::ListAsset);

        provider.into_iter().chain(assets).collect()
    }
}

/// A vault created by the deploy step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeployedVault {
    pub address: Address,
    pub tx_hash: B256,
    pub block_number: u64,
}

/// Outcome of a single configuration attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StepOutcome {
    Success { tx_hash: B256, block_number: u64 },
    Failure { reason: String },
}

/// Result of one configuration attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepResult {
    pub step: String,
    pub outcome: StepOutcome,
}

impl StepResult {
    pub fn is_success(&self) -> bool {
        matches!(self.outcome, StepOutcome::Success { .. })
    }
}

/// Everything a run did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineReport {
    /// The configured vault.
    pub vault: Address,
    /// Set when this run deployed the vault.
    pub deployment: Option<DeployedVault>,
    /// One entry per attempted configuration step, in order.
    pub steps: Vec<StepResult>,
    /// Steps skipped because an earlier step failed.
    pub not_attempted: Vec<String>,
}

impl PipelineReport {
    /// Whether every attempted step succeeded and none was skipped.
    pub fn succeeded(&self) -> bool {
        self.not_attempted.is_empty() && self.steps.iter().all(StepResult::is_success)
    }

    /// Attempted steps that failed.
    pub fn failures(&self) -> impl Iterator<Item = &StepResult> {
        self.steps.iter().filter(|step| !step.is_success())
    }

    /// Turn the first failed step into an error.
    pub fn ensure_success(&self) -> Result<(), ProvisionError> {
        match self.failures().next() {
            Some(StepResult {
                step,
                outcome: StepOutcome::Failure { reason },
            }) => Err(ProvisionError::ConfigurationStepFailure {
                step: step.clone(),
                reason: reason.clone(),
            }),
            _ => Ok(()),
        }
    }
}

/// Drives a [`ChainClient`] through a provisioning run.
pub struct ProvisioningPipeline<'a, C, R> {
    chain: &'a C,
    reporter: &'a R,
    policy: FailurePolicy,
}

impl<'a, C, R> ProvisioningPipeline<'a, C, R>
where
    C: ChainClient,
    R: Reporter,
{
    pub fn new(chain: &'a C, reporter: &'a R) -> Self {
        Self {
            chain,
            reporter,
            policy: FailurePolicy::default(),
        }
    }

    /// Set the failure policy for configuration steps.
    pub fn policy(mut self, policy: FailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Deploy a vault and apply the configuration plan to it.
    ///
    /// Only a deployment failure is returned as an error; configuration step
    /// failures are part of the report, see [`PipelineReport::ensure_success`].
    pub async fn run(
        &self,
        config: &ProvisioningConfig,
    ) -> Result<PipelineReport, ProvisionError> {
        let deployment = self.deploy(config.admin, config.treasury).await?;

        let mut report = self.configure(deployment.address, &config.plan).await;
        report.deployment = Some(deployment);

        Ok(report)
    }

    /// Deploy the vault and wait for its receipt.
    pub async fn deploy(
        &self,
        admin: Address,
        treasury: Address,
    ) -> Result<DeployedVault, ProvisionError> {
        tracing::info!(admin = %admin, treasury = %treasury, "Deploying vault...");

        let deployment = async {
            let tx = self.chain.deploy(admin, treasury).await?;
            let receipt = self.chain.wait(&tx).await?;
            let address = receipt.contract_address.ok_or_else(|| {
                anyhow::anyhow!("Receipt of {} has no contract address", tx.tx_hash)
            })?;

            Ok::<_, anyhow::Error>(DeployedVault {
                address,
                tx_hash: receipt.tx_hash,
                block_number: receipt.block_number,
            })
        }
        .await;

        match deployment {
            Ok(deployment) => {
                self.reporter.report(&ProvisionEvent::Deployed(deployment));
                Ok(deployment)
            }
            Err(e) => {
                let reason = format!("{e:#}");
                self.reporter.report(&ProvisionEvent::DeployFailed {
                    reason: reason.clone(),
                });
                Err(ProvisionError::DeploymentFailure { reason })
            }
        }
    }

    /// Apply `plan` to an existing vault.
    pub async fn configure(&self, vault: Address, plan: &ConfigurationPlan) -> PipelineReport {
        let mut report = PipelineReport {
            vault,
            deployment: None,
            steps: Vec::new(),
            not_attempted: Vec::new(),
        };

        let mut steps = plan.steps().into_iter();
        for step in steps.by_ref() {
            let name = step.name();
            tracing::debug!(step = %name, vault = %vault, "Submitting configuration step");

            match self.submit(vault, &step.to_call()).await {
                Ok(receipt) => {
                    self.reporter.report(&ProvisionEvent::StepSucceeded {
                        step,
                        tx_hash: receipt.tx_hash,
                    });
                    report.steps.push(StepResult {
                        step: name,
                        outcome: StepOutcome::Success {
                            tx_hash: receipt.tx_hash,
                            block_number: receipt.block_number,
                        },
                    });
                }
                Err(e) => {
                    let reason = format!("{e:#}");
                    self.reporter.report(&ProvisionEvent::StepFailed {
                        step: name.clone(),
                        reason: reason.clone(),
                    });
                    report.steps.push(StepResult {
                        step: name,
                        outcome: StepOutcome::Failure { reason },
                    });

                    if self.policy == FailurePolicy::Abort {
                        break;
                    }
                }
            }
        }

        for step in steps {
            let name = step.name();
            self.reporter
                .report(&ProvisionEvent::StepNotAttempted { step: name.clone() });
            report.not_attempted.push(name);
        }

        report
    }

    async fn submit(&self, vault: Address, call: &VaultCall) -> anyhow::Result<TxReceipt> {
        let tx = self.chain.call(vault, call).await?;
        self.chain.wait(&tx).await
    }
}
