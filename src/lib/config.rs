use std::path::{Path, PathBuf};
use std::time::Duration;

use alloy::primitives::Address;
use serde::Deserialize;

use crate::domain::amount::ScalingPolicy;
use crate::domain::yield_rule::BPS_DENOMINATOR;
use crate::issuer::AllowedCountries;

/// Top-level vault client configuration loaded from TOML.
#[derive(Debug, Clone, Deserialize)]
pub struct VaultConfig {
    pub ledger: LedgerConfig,
    pub prover: ProverConfig,
    #[serde(default)]
    pub client: ClientConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LedgerBackend {
    Memory,
    Ethereum,
}

/// Where commitments and nullifiers are recorded.
#[derive(Debug, Clone, Deserialize)]
pub struct LedgerConfig {
    pub backend: LedgerBackend,
    pub rpc_url: Option<String>,
    pub private_key: Option<String>,
    pub vault_address: Option<Address>,
    /// Whole tokens. Only used by the in-memory backend.
    #[serde(default = "default_min_deposit")]
    pub min_deposit: u64,
    /// Whole tokens. Only used by the in-memory backend.
    #[serde(default = "default_max_deposit")]
    pub max_deposit: u64,
    #[serde(default = "default_yield_rate")]
    pub yield_rate_bps: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProverBackend {
    Mock,
    Snarkjs,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProverConfig {
    pub backend: ProverBackend,
    /// snarkjs executable
    #[serde(default = "default_snarkjs")]
    pub snarkjs: PathBuf,
    /// Directory with `<circuit>.wasm`, `<circuit>_final.zkey` and
    /// `<circuit>_vkey.json`.
    #[serde(default = "default_artifacts_dir")]
    pub artifacts_dir: PathBuf,
    /// Upper bound on a single proof (e.g. "90s", "2m"). Parsed via humantime.
    #[serde(with = "humantime_serde", default = "default_prove_timeout")]
    pub timeout: Duration,
}

/// Holder-side settings.
#[derive(Debug, Clone, Deserialize)]
pub struct ClientConfig {
    #[serde(default)]
    pub scaling: ScalingPolicy,
    /// Country the KYC circuit checks against (ISO 3166-1 numeric).
    #[serde(default = "default_allowed_country")]
    pub allowed_country: u16,
    #[serde(default = "default_records_path")]
    pub records_path: PathBuf,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            scaling: ScalingPolicy::default(),
            allowed_country: default_allowed_country(),
            records_path: default_records_path(),
        }
    }
}

fn default_min_deposit() -> u64 {
    10
}

fn default_max_deposit() -> u64 {
    10_000
}

fn default_yield_rate() -> u32 {
    500
}

fn default_snarkjs() -> PathBuf {
    PathBuf::from("snarkjs")
}

fn default_artifacts_dir() -> PathBuf {
    PathBuf::from("./zkp")
}

fn default_prove_timeout() -> Duration {
    Duration::from_secs(120)
}

fn default_allowed_country() -> u16 {
    AllowedCountries::USA
}

fn default_records_path() -> PathBuf {
    PathBuf::from("./veil-records.json")
}

/// Errors from config loading and validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("validation error: {0}")]
    Validation(String),
}

impl VaultConfig {
    /// Load and validate a config from a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse and validate a config from TOML text.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration invariants.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.ledger.backend == LedgerBackend::Ethereum {
            if self.ledger.rpc_url.is_none() {
                return Err(ConfigError::Validation(
                    "ledger.rpc_url required for the ethereum backend".into(),
                ));
            }
            if self.ledger.private_key.is_none() {
                return Err(ConfigError::Validation(
                    "ledger.private_key required for the ethereum backend".into(),
                ));
            }
            if self.ledger.vault_address.is_none() {
                return Err(ConfigError::Validation(
                    "ledger.vault_address required for the ethereum backend".into(),
                ));
            }
        }

        if self.ledger.min_deposit == 0 || self.ledger.min_deposit > self.ledger.max_deposit {
            return Err(ConfigError::Validation(format!(
                "ledger deposit bounds invalid: min {} max {}",
                self.ledger.min_deposit, self.ledger.max_deposit
            )));
        }

        if u64::from(self.ledger.yield_rate_bps) > BPS_DENOMINATOR {
            return Err(ConfigError::Validation(format!(
                "ledger.yield_rate_bps {} exceeds {}",
                self.ledger.yield_rate_bps, BPS_DENOMINATOR
            )));
        }

        if self.prover.timeout.is_zero() {
            return Err(ConfigError::Validation("prover.timeout must be non-zero".into()));
        }

        if !AllowedCountries::default().contains(self.client.allowed_country) {
            return Err(ConfigError::Validation(format!(
                "client.allowed_country {} is not a served jurisdiction",
                self.client.allowed_country
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
        [ledger]
        backend = "memory"

        [prover]
        backend = "mock"
    "#;

    #[test]
    fn test_defaults_applied() {
        let config = VaultConfig::parse(MINIMAL).unwrap();
        assert_eq!(config.ledger.min_deposit, 10);
        assert_eq!(config.ledger.max_deposit, 10_000);
        assert_eq!(config.ledger.yield_rate_bps, 500);
        assert_eq!(config.prover.timeout, Duration::from_secs(120));
        assert_eq!(config.client.scaling, ScalingPolicy::Reject);
        assert_eq!(config.client.allowed_country, 840);
    }

    #[test]
    fn test_full_config() {
        let config = VaultConfig::parse(
            r#"
            [ledger]
            backend = "ethereum"
            rpc_url = "http://localhost:8545"
            private_key = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80"
            vault_address = "0x5FbDB2315678afecb367f032d93F642f64180aa3"

            [prover]
            backend = "snarkjs"
            artifacts_dir = "/opt/zkp"
            timeout = "1m 30s"

            [client]
            scaling = "floor"
            allowed_country = 826
            records_path = "/tmp/records.json"
        "#,
        )
        .unwrap();
        assert_eq!(config.ledger.backend, LedgerBackend::Ethereum);
        assert_eq!(config.prover.backend, ProverBackend::Snarkjs);
        assert_eq!(config.prover.timeout, Duration::from_secs(90));
        assert_eq!(config.client.scaling, ScalingPolicy::Floor);
    }

    #[test]
    fn test_ethereum_requires_connection_details() {
        let err = VaultConfig::parse(
            r#"
            [ledger]
            backend = "ethereum"
            rpc_url = "http://localhost:8545"

            [prover]
            backend = "mock"
        "#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Validation(msg) if msg.contains("private_key")));
    }

    #[test]
    fn test_rejects_inverted_bounds_and_bad_rate() {
        let inverted = MINIMAL.replace(
            "backend = \"memory\"",
            "backend = \"memory\"\nmin_deposit = 100\nmax_deposit = 10",
        );
        assert!(matches!(
            VaultConfig::parse(&inverted).unwrap_err(),
            ConfigError::Validation(_)
        ));

        let rate = MINIMAL.replace(
            "backend = \"memory\"",
            "backend = \"memory\"\nyield_rate_bps = 20000",
        );
        assert!(matches!(
            VaultConfig::parse(&rate).unwrap_err(),
            ConfigError::Validation(_)
        ));
    }

    #[test]
    fn test_unknown_backend_is_parse_error() {
        let bad = MINIMAL.replace("\"mock\"", "\"halo2\"");
        assert!(matches!(VaultConfig::parse(&bad).unwrap_err(), ConfigError::Parse(_)));
    }
}
