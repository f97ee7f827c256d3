//! Chain access for the provisioning pipeline.
//!
//! The pipeline only depends on [`ChainClient`]. [`RpcChainClient`] is the
//! JSON-RPC implementation used by the binary; tests substitute their own.

pub mod abi;
mod artifact;
mod client;
pub mod rpc;

use std::{fmt, future::Future};

use alloy_core::primitives::{Address, B256, U256};
use serde::{Deserialize, Serialize};

pub use artifact::{ContractArtifact, DEFAULT_ARTIFACT_PATH};
pub use client::{RpcChainClient, RpcChainClientConfig};

/// A configuration call against a deployed vault.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VaultCall {
    /// `setAaveProvider(provider)`
    SetAaveProvider { provider: Address },
    /// `listAsset(asset, minimum, enabled)`
    ListAsset {
        asset: Address,
        minimum: U256,
        enabled: bool,
    },
}

impl VaultCall {
    /// Contract method name.
    pub fn method(&self) -> &'static str {
        match self {
            VaultCall::SetAaveProvider { .. } => "setAaveProvider",
            VaultCall::ListAsset { .. } => "listAsset",
        }
    }
}

impl fmt::Display for VaultCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VaultCall::SetAaveProvider { provider } => write!(f, "setAaveProvider({provider})"),
            VaultCall::ListAsset {
                asset,
                minimum,
                enabled,
            } => write!(f, "listAsset({asset}, {minimum}, {enabled})"),
        }
    }
}

/// A submitted transaction that has not been confirmed yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PendingTx {
    pub tx_hash: B256,
}

/// Receipt of a mined transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxReceipt {
    pub tx_hash: B256,
    pub block_number: u64,
    /// Address of the created contract, for deploy transactions.
    pub contract_address: Option<Address>,
}

/// The chain capability the pipeline drives.
///
/// Implementations only submit and confirm; every error is reported as-is and
/// never retried. A reverted transaction must make [`ChainClient::wait`] fail.
pub trait ChainClient: Send + Sync {
    /// Submit the vault deploy transaction with its constructor arguments.
    fn deploy(
        &self,
        admin: Address,
        treasury: Address,
    ) -> impl Future<Output = anyhow::Result<PendingTx>> + Send;

    /// Submit a configuration call to `vault`.
    fn call(
        &self,
        vault: Address,
        call: &VaultCall,
    ) -> impl Future<Output = anyhow::Result<PendingTx>> + Send;

    /// Block until `tx` is mined, failing if it reverted or never confirmed.
    fn wait(&self, tx: &PendingTx) -> impl Future<Output = anyhow::Result<TxReceipt>> + Send;
}
