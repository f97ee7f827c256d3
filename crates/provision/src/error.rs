//! Error types for the provisioning pipeline.

use thiserror::Error;

/// Errors that end (or mark as failed) a provisioning run.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProvisionError {
    /// A required configuration value is absent or empty.
    #[error("Missing required configuration: {key} is not set")]
    MissingRequiredConfig { key: &'static str },

    /// A configuration value is present but cannot be parsed.
    #[error("Invalid configuration for {key} ('{value}'): {reason}")]
    InvalidConfig {
        key: &'static str,
        value: String,
        reason: String,
    },

    /// The vault deploy transaction or its confirmation failed.
    #[error("Vault deployment failed: {reason}")]
    DeploymentFailure { reason: String },

    /// A configuration transaction or its confirmation failed.
    #[error("Configuration step {step} failed: {reason}")]
    ConfigurationStepFailure { step: String, reason: String },
}
