//! Progress reporting and run records.

use std::path::Path;

use alloy_core::primitives::{Address, B256};
use anyhow::{Context, Result};
use comfy_table::{ContentArrangement, Table, presets::UTF8_FULL};
use serde::{Deserialize, Serialize};

use crate::{
    ConfigurationPlan,
    pipeline::{ConfigurationStep, DeployedVault, PipelineReport, StepOutcome, StepResult},
};

/// Something that happened during a provisioning run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProvisionEvent {
    /// The vault deploy transaction was confirmed.
    Deployed(DeployedVault),
    /// The vault deploy transaction failed to submit or confirm.
    DeployFailed { reason: String },
    /// A configuration step was confirmed.
    StepSucceeded {
        step: ConfigurationStep,
        tx_hash: B256,
    },
    /// A configuration step failed to submit or confirm.
    StepFailed { step: String, reason: String },
    /// A configuration step was skipped after an earlier failure.
    StepNotAttempted { step: String },
}

/// Sink for [`ProvisionEvent`]s.
pub trait Reporter {
    fn report(&self, event: &ProvisionEvent);
}

/// Reports events as log lines.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingReporter;

impl Reporter for TracingReporter {
    fn report(&self, event: &ProvisionEvent) {
        match event {
            ProvisionEvent::Deployed(vault) => {
                tracing::info!(
                    address = %vault.address,
                    tx_hash = %vault.tx_hash,
                    block = vault.block_number,
                    "✓ WarrenWalletMulti deployed at {}",
                    vault.address
                );
            }
            ProvisionEvent::DeployFailed { reason } => {
                tracing::error!(reason = %reason, "✗ Vault deployment failed");
            }
            ProvisionEvent::StepSucceeded {
                step: ConfigurationStep::SetAaveProvider { provider },
                tx_hash,
            } => {
                tracing::info!(tx_hash = %tx_hash, "✓ Aave provider set: {}", provider);
            }
            ProvisionEvent::StepSucceeded {
                step: ConfigurationStep::ListAsset(entry),
                tx_hash,
            } => {
                tracing::info!(
                    tx_hash = %tx_hash,
                    "✓ Asset listed: {} @ {} (min={})",
                    entry.symbol,
                    entry.address,
                    entry.minimum
                );
            }
            ProvisionEvent::StepFailed { step, reason } => {
                tracing::error!(step = %step, reason = %reason, "✗ Configuration step failed");
            }
            ProvisionEvent::StepNotAttempted { step } => {
                tracing::warn!(step = %step, "Configuration step not attempted");
            }
        }
    }
}

/// Render the steps a plan would submit.
pub fn plan_table(plan: &ConfigurationPlan) -> Table {
    let mut table = new_table(vec!["#", "Step", "Arguments"]);

    for (index, step) in plan.steps().iter().enumerate() {
        table.add_row(vec![
            (index + 1).to_string(),
            step.name(),
            step.to_call().to_string(),
        ]);
    }

    table
}

/// Render the outcome of a run.
pub fn summary_table(report: &PipelineReport) -> Table {
    let mut table = new_table(vec!["Step", "Status", "Details"]);

    match &report.deployment {
        Some(deployment) => table.add_row(vec![
            "deploy".to_string(),
            "ok".to_string(),
            format!("{} (tx {})", deployment.address, deployment.tx_hash),
        ]),
        None => table.add_row(vec![
            "deploy".to_string(),
            "existing".to_string(),
            report.vault.to_string(),
        ]),
    };

    for result in &report.steps {
        let (status, details) = match &result.outcome {
            StepOutcome::Success { tx_hash, .. } => ("ok", tx_hash.to_string()),
            StepOutcome::Failure { reason } => ("FAILED", reason.clone()),
        };
        table.add_row(vec![result.step.clone(), status.to_string(), details]);
    }

    for step in &report.not_attempted {
        table.add_row(vec![step.clone(), "not attempted".to_string(), String::new()]);
    }

    table
}

fn new_table(header: Vec<&str>) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(header);
    table
}

/// Persistent record of a run, written as TOML.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunRecord {
    /// Chain the transactions were sent to.
    pub chain_id: u64,
    /// Account the transactions were sent from.
    pub from: Address,
    /// The configured vault.
    pub vault: Address,
    /// Deploy transaction, when the run deployed the vault.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deploy_tx: Option<B256>,
    /// Whether every step succeeded.
    pub succeeded: bool,
    /// Unix timestamp of the end of the run.
    pub finished_at: u64,
    /// Steps skipped after a failure.
    pub not_attempted: Vec<String>,
    /// Attempted steps, in order.
    pub steps: Vec<StepResult>,
}

impl RunRecord {
    pub fn from_report(report: &PipelineReport, chain_id: u64, from: Address) -> Self {
        Self {
            chain_id,
            from,
            vault: report.vault,
            deploy_tx: report.deployment.map(|deployment| deployment.tx_hash),
            succeeded: report.succeeded(),
            finished_at: std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .map(|d| d.as_secs())
                .unwrap_or_default(),
            not_attempted: report.not_attempted.clone(),
            steps: report.steps.clone(),
        }
    }

    /// Save the record to a TOML file.
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let content =
            toml::to_string_pretty(self).context("Failed to serialize run record to TOML")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write run record to {}", path.display()))?;
        tracing::info!(path = %path.display(), "Run record saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use alloy_core::primitives::U256;
    use tempdir::TempDir;

    use super::*;
    use crate::{AssetEntry, AssetSymbol};

    fn failed_report() -> PipelineReport {
        PipelineReport {
            vault: Address::repeat_byte(0x11),
            deployment: Some(DeployedVault {
                address: Address::repeat_byte(0x11),
                tx_hash: B256::repeat_byte(0x01),
                block_number: 1,
            }),
            steps: vec![
                StepResult {
                    step: "listAsset(USDC)".to_string(),
                    outcome: StepOutcome::Success {
                        tx_hash: B256::repeat_byte(0x02),
                        block_number: 2,
                    },
                },
                StepResult {
                    step: "listAsset(WETH)".to_string(),
                    outcome: StepOutcome::Failure {
                        reason: "execution reverted: asset already listed".to_string(),
                    },
                },
            ],
            not_attempted: vec!["listAsset(DAI)".to_string()],
        }
    }

    #[test]
    fn test_summary_table_lists_every_step() {
        let rendered = summary_table(&failed_report()).to_string();

        assert!(rendered.contains("deploy"));
        assert!(rendered.contains("listAsset(USDC)"));
        assert!(rendered.contains("listAsset(WETH)"));
        assert!(rendered.contains("FAILED"));
        assert!(rendered.contains("listAsset(DAI)"));
        assert!(rendered.contains("not attempted"));
    }

    #[test]
    fn test_plan_table() {
        let plan = ConfigurationPlan {
            aave_provider: Some(Address::repeat_byte(0xaa)),
            assets: vec![AssetEntry {
                symbol: AssetSymbol::Usdt,
                address: Address::repeat_byte(0x04),
                minimum: U256::from(1_000_000u64),
                enabled: true,
            }],
        };

        let rendered = plan_table(&plan).to_string();
        assert!(rendered.contains("setAaveProvider"));
        assert!(rendered.contains("listAsset(USDT)"));
        assert!(rendered.contains("1000000"));
    }

    #[test]
    fn test_run_record_save() {
        let temp_dir = TempDir::new("warren-test").expect("Failed to create temp dir");
        let path = temp_dir.path().join("provision-record.toml");

        let record = RunRecord::from_report(&failed_report(), 31337, Address::repeat_byte(0xf3));
        assert!(!record.succeeded);
        assert_eq!(record.deploy_tx, Some(B256::repeat_byte(0x01)));

        record.save_to_file(&path).expect("Failed to save record");
        let content = std::fs::read_to_string(&path).expect("Failed to read record");
        assert!(content.contains("chain_id = 31337"));

        let saved: RunRecord = toml::from_str(&content).expect("Failed to parse record");
        assert_eq!(record, saved);
    }

    #[test]
    fn test_run_record_for_existing_vault() {
        let mut report = failed_report();
        report.deployment = None;

        let record = RunRecord::from_report(&report, 1, Address::repeat_byte(0xf3));
        assert_eq!(record.deploy_tx, None);

        let content = toml::to_string_pretty(&record).unwrap();
        assert!(!content.contains("deploy_tx"));
    }

    #[test]
    fn test_run_record_save_to_missing_directory() {
        let temp_dir = TempDir::new("warren-test").expect("Failed to create temp dir");
        let record = RunRecord::from_report(&failed_report(), 1, Address::ZERO);

        let result = record.save_to_file(&temp_dir.path().join("missing").join("record.toml"));
        assert!(result.is_err());
    }
}
