//! Provisioning configuration.
//!
//! Configuration is read once at the process boundary through a [`ConfigSource`]
//! and turned into an immutable [`ProvisioningConfig`]. Nothing here talks to the
//! network.

use std::{collections::HashMap, str::FromStr};

use alloy_core::primitives::{Address, U256};
use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;

use crate::ProvisionError;

/// Environment key holding the vault admin address.
pub const ADMIN_ADDRESS_KEY: &str = "ADMIN_ADDRESS";
/// Environment key holding the DAO treasury address.
pub const DAO_TREASURY_KEY: &str = "DAO_TREASURY";
/// Environment key holding the optional Aave pool addresses provider.
pub const AAVE_PROVIDER_KEY: &str = "AAVE_PROVIDER";

/// A key/value lookup that configuration is read from.
pub trait ConfigSource {
    /// Return the raw value stored under `key`, if any.
    fn get(&self, key: &str) -> Option<String>;
}

/// The process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl ConfigSource for ProcessEnv {
    fn get(&self, key: &str) -> Option<String> {
        // Non-unicode values are treated as unset.
        std::env::var(key).ok()
    }
}

impl ConfigSource for HashMap<String, String> {
    fn get(&self, key: &str) -> Option<String> {
        HashMap::get(self, key).cloned()
    }
}

/// Assets that can be listed on the vault at provisioning time.
///
/// The declaration order is the listing order.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
)]
#[strum(serialize_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum AssetSymbol {
    Usdc,
    Weth,
    Dai,
    Usdt,
    Wbtc,
}

impl AssetSymbol {
    /// Key holding the token address.
    pub fn address_key(&self) -> &'static str {
        match self {
            AssetSymbol::Usdc => "USDC",
            AssetSymbol::Weth => "WETH",
            AssetSymbol::Dai => "DAI",
            AssetSymbol::Usdt => "USDT",
            AssetSymbol::Wbtc => "WBTC",
        }
    }

    /// Key holding the minimum deposit, in raw token units.
    pub fn minimum_key(&self) -> &'static str {
        match self {
            AssetSymbol::Usdc => "MIN_USDC",
            AssetSymbol::Weth => "MIN_WETH",
            AssetSymbol::Dai => "MIN_DAI",
            AssetSymbol::Usdt => "MIN_USDT",
            AssetSymbol::Wbtc => "MIN_WBTC",
        }
    }
}

/// A token to register on the vault.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetEntry {
    pub symbol: AssetSymbol,
    pub address: Address,
    /// Minimum deposit in raw token units.
    pub minimum: U256,
    pub enabled: bool,
}

/// The configuration transactions applied to a vault after it exists.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigurationPlan {
    /// Aave pool addresses provider. `None` skips the provider step.
    pub aave_provider: Option<Address>,
    /// Assets to list, in listing order.
    pub assets: Vec<AssetEntry>,
}

impl ConfigurationPlan {
    /// Load the plan from `source`.
    ///
    /// Governance addresses are not read, so this is enough to configure an
    /// already-deployed vault.
    pub fn load(source: &impl ConfigSource) -> Result<Self, ProvisionError> {
        let aave_provider = read_optional(source, AAVE_PROVIDER_KEY)
            .map(|value| parse_address(AAVE_PROVIDER_KEY, &value))
            .transpose()?
            .filter(|provider| !provider.is_zero());

        let mut assets = Vec::new();
        for symbol in AssetSymbol::iter() {
            let Some(raw_address) = read_optional(source, symbol.address_key()) else {
                tracing::debug!(asset = %symbol, "Asset address not set, skipping");
                continue;
            };

            let address = parse_address(symbol.address_key(), &raw_address)?;
            let minimum = match read_optional(source, symbol.minimum_key()) {
                Some(value) => parse_amount(symbol.minimum_key(), &value)?,
                None => U256::ZERO,
            };

            assets.push(AssetEntry {
                symbol,
                address,
                minimum,
                enabled: true,
            });
        }

        Ok(Self {
            aave_provider,
            assets,
        })
    }

    /// Whether the plan has no configuration transaction at all.
    pub fn is_empty(&self) -> bool {
        self.aave_provider.is_none() && self.assets.is_empty()
    }
}

/// Everything needed for a full provisioning run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvisioningConfig {
    /// Admin of the deployed vault.
    pub admin: Address,
    /// DAO treasury receiving protocol fees.
    pub treasury: Address,
    /// Configuration applied once the vault is deployed.
    #[serde(flatten)]
    pub plan: ConfigurationPlan,
}

impl ProvisioningConfig {
    /// Load and validate the full configuration from `source`.
    ///
    /// Fails with [`ProvisionError::MissingRequiredConfig`] when a governance
    /// address is absent or empty.
    pub fn load(source: &impl ConfigSource) -> Result<Self, ProvisionError> {
        let admin = read_required(source, ADMIN_ADDRESS_KEY)?;
        let treasury = read_required(source, DAO_TREASURY_KEY)?;

        Ok(Self {
            admin,
            treasury,
            plan: ConfigurationPlan::load(source)?,
        })
    }
}

/// Read a key, treating an empty or whitespace-only value as unset.
fn read_optional(source: &impl ConfigSource, key: &str) -> Option<String> {
    source
        .get(key)
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn read_required(
    source: &impl ConfigSource,
    key: &'static str,
) -> Result<Address, ProvisionError> {
    let value = read_optional(source, key).ok_or(ProvisionError::MissingRequiredConfig { key })?;
    parse_address(key, &value)
}

/// Parse a 0x-prefixed, 40 hex chars address.
fn parse_address(key: &'static str, value: &str) -> Result<Address, ProvisionError> {
    let invalid = |reason: &str| ProvisionError::InvalidConfig {
        key,
        value: value.to_string(),
        reason: reason.to_string(),
    };

    let Some(hex_part) = value.strip_prefix("0x") else {
        return Err(invalid("expected a 0x-prefixed address"));
    };
    if hex_part.len() != 40 {
        return Err(invalid("expected 40 hex characters"));
    }
    if !hex_part.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(invalid("contains non-hex characters"));
    }

    Address::from_str(value).map_err(|e| invalid(&e.to_string()))
}

/// Parse a raw token amount, decimal or 0x-prefixed hex.
fn parse_amount(key: &'static str, value: &str) -> Result<U256, ProvisionError> {
    U256::from_str(value).map_err(|e| ProvisionError::InvalidConfig {
        key,
        value: value.to_string(),
        reason: e.to_string(),
    })
}
