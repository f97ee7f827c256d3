//! Compiled contract artifacts.

use std::path::Path;

use alloy_core::primitives::Bytes;
use anyhow::{Context, Result};
use serde::Deserialize;

/// Default location of the vault artifact in a Hardhat project.
pub const DEFAULT_ARTIFACT_PATH: &str =
    "artifacts/contracts/WarrenWalletMulti.sol/WarrenWalletMulti.json";

/// The parts of a Hardhat artifact needed to deploy a contract.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractArtifact {
    pub contract_name: String,
    /// Creation bytecode, without constructor arguments.
    pub bytecode: Bytes,
}

impl ContractArtifact {
    /// Parse an artifact from its JSON text.
    pub fn from_json(content: &str) -> Result<Self> {
        let artifact: Self =
            serde_json::from_str(content).context("Failed to parse contract artifact JSON")?;

        if artifact.bytecode.is_empty() {
            anyhow::bail!(
                "Artifact for {} has no creation bytecode (abstract contract or interface?)",
                artifact.contract_name
            );
        }

        Ok(artifact)
    }

    /// Load an artifact file.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            anyhow::bail!("Contract artifact not found: {}", path.display());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let artifact = Self::from_json(&content)
            .with_context(|| format!("Invalid artifact {}", path.display()))?;

        tracing::debug!(
            path = %path.display(),
            contract = %artifact.contract_name,
            bytecode_len = artifact.bytecode.len(),
            "Contract artifact loaded"
        );

        Ok(artifact)
    }
}
