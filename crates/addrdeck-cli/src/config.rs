//! CLI configuration — parsed from TOML file + environment variable overrides.
//!
//! Priority: environment variables > config file > defaults.

use std::path::Path;

use addrdeck_core::seed::{DEFAULT_ENTROPY_BYTES, VALID_ENTROPY_LENGTHS};
use addrdeck_core::ScriptType;
use anyhow::{Context, Result};
use bitcoin::Network;
use serde::{Deserialize, Serialize};

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Key generation settings
    #[serde(default)]
    pub wallet: WalletSection,

    /// Output settings
    #[serde(default)]
    pub display: DisplaySection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletSection {
    /// Bitcoin network: "bitcoin", "testnet", "signet", "regtest"
    #[serde(default = "default_network")]
    pub network: String,

    /// Entropy size in bytes (16 → 12 words, 32 → 24 words)
    #[serde(default = "default_entropy_bytes")]
    pub entropy_bytes: usize,

    /// Profile selected when browsing starts
    #[serde(default = "default_start_profile")]
    pub start_profile: ScriptType,
}

impl Default for WalletSection {
    fn default() -> Self {
        Self {
            network: default_network(),
            entropy_bytes: default_entropy_bytes(),
            start_profile: default_start_profile(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisplaySection {
    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Characters kept at each end of an abbreviated address
    #[serde(default = "default_short_address_chars")]
    pub short_address_chars: usize,
}

impl Default for DisplaySection {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            short_address_chars: default_short_address_chars(),
        }
    }
}

// ============================================================================
// Default value functions
// ============================================================================

fn default_network() -> String {
    "bitcoin".to_string()
}

fn default_entropy_bytes() -> usize {
    DEFAULT_ENTROPY_BYTES
}

fn default_start_profile() -> ScriptType {
    ScriptType::NativeSegwit
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_short_address_chars() -> usize {
    7
}

/// Upper bound for `display.short_address_chars`.
pub const MAX_SHORT_ADDRESS_CHARS: usize = 32;

// ============================================================================
// Loading & environment override
// ============================================================================

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: AppConfig =
            toml::from_str(&contents).with_context(|| "Failed to parse TOML config")?;
        Ok(config)
    }

    /// Apply environment variable overrides.
    ///
    /// Supported env vars:
    /// - `ADDRDECK_NETWORK`
    /// - `ADDRDECK_ENTROPY_BYTES`
    /// - `ADDRDECK_LOG_LEVEL`
    /// - `ADDRDECK_START_PROFILE`
    ///
    /// Returns one message per override that was ignored. The logger is not
    /// up yet at this point, so the caller reports them.
    pub fn apply_env_overrides(&mut self) -> Vec<String> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    fn apply_overrides<F>(&mut self, lookup: F) -> Vec<String>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut ignored = Vec::new();
        if let Some(v) = lookup("ADDRDECK_NETWORK") {
            self.wallet.network = v;
        }
        if let Some(v) = lookup("ADDRDECK_ENTROPY_BYTES") {
            match v.parse::<usize>() {
                Ok(bytes) => self.wallet.entropy_bytes = bytes,
                Err(e) => ignored.push(format!("Ignoring ADDRDECK_ENTROPY_BYTES={:?}: {}", v, e)),
            }
        }
        if let Some(v) = lookup("ADDRDECK_LOG_LEVEL") {
            self.display.log_level = v;
        }
        if let Some(v) = lookup("ADDRDECK_START_PROFILE") {
            match v.parse::<ScriptType>() {
                Ok(profile) => self.wallet.start_profile = profile,
                Err(e) => ignored.push(format!("Ignoring ADDRDECK_START_PROFILE: {}", e)),
            }
        }
        ignored
    }

    /// Parse the network string to a `bitcoin::Network`.
    pub fn network(&self) -> Result<Network> {
        match self.wallet.network.as_str() {
            "bitcoin" | "mainnet" => Ok(Network::Bitcoin),
            "testnet" | "testnet3" => Ok(Network::Testnet),
            "signet" => Ok(Network::Signet),
            "regtest" => Ok(Network::Regtest),
            other => anyhow::bail!("unknown network: {}", other),
        }
    }

    /// Validate that the configuration is usable.
    pub fn validate(&self) -> Result<()> {
        self.network().context("wallet.network is invalid")?;

        anyhow::ensure!(
            VALID_ENTROPY_LENGTHS.contains(&self.wallet.entropy_bytes),
            "wallet.entropy_bytes must be one of 16, 20, 24, 28, 32"
        );

        anyhow::ensure!(
            (1..=MAX_SHORT_ADDRESS_CHARS).contains(&self.display.short_address_chars),
            "display.short_address_chars must be between 1 and {}",
            MAX_SHORT_ADDRESS_CHARS
        );

        Ok(())
    }
}
