//! Engine settings
//!
//! Loaded from an optional TOML file with `LSAMM__`-prefixed environment
//! overrides (`LSAMM__POOL__PRICE=0.6`, `LSAMM__REBALANCE__POLICY=amm`).
//! Missing keys fall back to the reference pool defaults.

use crate::error::{ensure_finite, ensure_unit_interval, AmmError, Result as AmmResult};
use crate::pool::RebalancePolicy;
use anyhow::{Context, Result};
use config_crate::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

/// Environment variable prefix for overrides
pub const ENV_PREFIX: &str = "LSAMM";

/// Top-level settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    pub pool: PoolSettings,
    pub rebalance: RebalanceSettings,
}

/// Initial pool state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolSettings {
    pub coin: f64,
    pub long: f64,
    pub short: f64,
    /// Normalized price `v` in `[0, 1]`
    pub price: f64,
    pub collateral_per_pair: f64,
    pub swap_fee: f64,
}

/// Defaults applied by the action sequencer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RebalanceSettings {
    /// Reweight at the oracle price after every swap
    pub auto_reweight: bool,
    pub policy: RebalancePolicy,
    /// Share of a liquidity change converted into long/short pairs
    pub token_fraction: f64,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            coin: 10000.0,
            long: 1000.0,
            short: 1000.0,
            price: 0.5,
            collateral_per_pair: 100.0,
            swap_fee: 0.0,
        }
    }
}

impl Default for RebalanceSettings {
    fn default() -> Self {
        Self {
            auto_reweight: true,
            policy: RebalancePolicy::Oracle,
            token_fraction: 0.5,
        }
    }
}

impl EngineSettings {
    /// Load settings from `path` (if given) plus environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            info!("Loading engine settings: {:?}", path);
            builder = builder.add_source(File::from(path).required(true));
        }
        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .try_parsing(true),
        );

        let settings: Self = builder
            .build()
            .context("Failed to build engine settings")?
            .try_deserialize()
            .context("Failed to deserialize engine settings")?;
        settings.validate().context("Invalid engine settings")?;
        Ok(settings)
    }

    /// Parse settings from TOML text, without environment overrides
    pub fn from_toml_str(toml: &str) -> Result<Self> {
        let settings: Self = Config::builder()
            .add_source(File::from_str(toml, FileFormat::Toml))
            .build()
            .context("Failed to parse engine settings")?
            .try_deserialize()
            .context("Failed to deserialize engine settings")?;
        settings.validate().context("Invalid engine settings")?;
        Ok(settings)
    }

    pub fn validate(&self) -> AmmResult<()> {
        self.pool.validate()?;
        self.rebalance.validate()
    }
}

impl PoolSettings {
    pub fn validate(&self) -> AmmResult<()> {
        for (name, balance) in [("coin", self.coin), ("long", self.long), ("short", self.short)] {
            ensure_finite(name, balance)?;
            if balance < 0.0 {
                return Err(AmmError::domain(format!(
                    "{} balance must be non-negative, got {}",
                    name, balance
                )));
            }
        }
        ensure_unit_interval("price", self.price)?;
        ensure_finite("collateral_per_pair", self.collateral_per_pair)?;
        if self.collateral_per_pair <= 0.0 {
            return Err(AmmError::domain(format!(
                "collateral_per_pair must be positive, got {}",
                self.collateral_per_pair
            )));
        }
        ensure_finite("swap_fee", self.swap_fee)?;
        if !(0.0..1.0).contains(&self.swap_fee) {
            return Err(AmmError::domain(format!(
                "swap_fee must lie in [0, 1), got {}",
                self.swap_fee
            )));
        }
        Ok(())
    }
}

impl RebalanceSettings {
    pub fn validate(&self) -> AmmResult<()> {
        ensure_unit_interval("token_fraction", self.token_fraction)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_describe_reference_pool() {
        let settings = EngineSettings::default();
        assert_eq!(settings.pool.coin, 10000.0);
        assert_eq!(settings.pool.collateral_per_pair, 100.0);
        assert!(settings.rebalance.auto_reweight);
        assert_eq!(settings.rebalance.policy, RebalancePolicy::Oracle);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let settings = EngineSettings::from_toml_str(
            r#"
            [pool]
            price = 0.25
            swap_fee = 0.003

            [rebalance]
            policy = "weighted"
            "#,
        )
        .unwrap();

        assert_eq!(settings.pool.price, 0.25);
        assert_eq!(settings.pool.swap_fee, 0.003);
        assert_eq!(settings.pool.long, 1000.0);
        assert_eq!(settings.rebalance.policy, RebalancePolicy::Weighted);
        assert_eq!(settings.rebalance.token_fraction, 0.5);
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(EngineSettings::from_toml_str("[pool]\nprice = 1.5\n").is_err());
        assert!(EngineSettings::from_toml_str("[pool]\ncollateral_per_pair = 0.0\n").is_err());
        assert!(EngineSettings::from_toml_str("[rebalance]\npolicy = \"median\"\n").is_err());

        let mut settings = EngineSettings::default();
        settings.rebalance.token_fraction = -0.1;
        assert!(matches!(settings.validate(), Err(AmmError::Domain(_))));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[pool]\ncoin = 5000.0\ncollateral_per_pair = 1.0").unwrap();
        writeln!(file, "[rebalance]\nauto_reweight = false").unwrap();

        let settings = EngineSettings::load(Some(file.path())).unwrap();
        assert_eq!(settings.pool.coin, 5000.0);
        assert_eq!(settings.pool.collateral_per_pair, 1.0);
        assert!(!settings.rebalance.auto_reweight);
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("absent.toml");
        assert!(EngineSettings::load(Some(&missing)).is_err());
    }
}
