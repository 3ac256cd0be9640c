// 7.0 config.rs: all settings in one place. fee rates, curve, fee destination.
// 7.1 presets per environment, validation, JSON loading for the sim binary.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::curve::{CurveError, PriceCurve};
use crate::ledger::Global;
use crate::types::{FeeRate, Identity, RATE_DENOMINATOR};

/** 7.2: exchange settings. fee rates in parts per 1e9 */
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExchangeConfig {
    // Protocol fee rate (30_000_000 = 3%)
    pub protocol_fee_rate: FeeRate,
    // Subject fee rate, paid to the subject on every trade of its line
    pub subject_fee_rate: FeeRate,
    // Bonding curve shape
    pub curve: PriceCurve,
    // Receives protocol fees
    pub protocol_fee_destination: Identity,
    // Funding units fetched per page during selection
    pub page_size: usize,
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        Self {
            protocol_fee_rate: FeeRate::from_ppb(30_000_000), // 3%
            subject_fee_rate: FeeRate::from_ppb(20_000_000),  // 2%
            curve: PriceCurve::default(),
            protocol_fee_destination: Identity::ZERO,
            page_size: 50,
        }
    }
}

impl ExchangeConfig {
    // Zero fees, small pages. handy for exercising pagination locally
    pub fn testnet() -> Self {
        Self {
            protocol_fee_rate: FeeRate::ZERO,
            subject_fee_rate: FeeRate::ZERO,
            page_size: 5,
            ..Self::default()
        }
    }

    // Mainnet settings: 5% protocol, 5% subject
    pub fn mainnet() -> Self {
        Self {
            protocol_fee_rate: FeeRate::from_ppb(50_000_000),
            subject_fee_rate: FeeRate::from_ppb(50_000_000),
            ..Self::default()
        }
    }

    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Self::from_json_str(&raw)
    }

    // Validate the configuration for internal consistency
    pub fn validate(&self) -> Result<(), ConfigError> {
        // combined rate at most 100%: sell fees are paid out of the released base
        let combined = self.protocol_fee_rate.ppb() as u128 + self.subject_fee_rate.ppb() as u128;
        if combined > RATE_DENOMINATOR as u128 {
            return Err(ConfigError::InvalidFees {
                reason: format!(
                    "protocol {} + subject {} exceeds 100%",
                    self.protocol_fee_rate, self.subject_fee_rate
                ),
            });
        }

        self.curve.validate()?;

        if self.page_size == 0 {
            return Err(ConfigError::InvalidPaging);
        }

        Ok(())
    }

    pub fn global(&self) -> Global {
        Global {
            protocol_fee_rate: self.protocol_fee_rate,
            subject_fee_rate: self.subject_fee_rate,
            curve: self.curve,
            protocol_fee_destination: self.protocol_fee_destination,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid fees: {reason}")]
    InvalidFees { reason: String },

    #[error("Invalid curve: {0}")]
    InvalidCurve(#[from] CurveError),

    #[error("Page size must be at least 1")]
    InvalidPaging,

    #[error("Config parse error: {0}")]
    Parse(String),

    #[error("Cannot read config {path}: {reason}")]
    Io { path: String, reason: String },
}

// Environment presets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum Environment {
    Development,
    Testnet,
    Mainnet,
}

impl Environment {
    pub fn config(&self) -> ExchangeConfig {
        match self {
            Environment::Development => ExchangeConfig::default(),
            Environment::Testnet => ExchangeConfig::testnet(),
            Environment::Mainnet => ExchangeConfig::mainnet(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::curve::CurveShape;

    #[test]
    fn test_default_config_valid() {
        let config = ExchangeConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.protocol_fee_rate.ppb(), 30_000_000);
    }

    #[test]
    fn test_environment_presets() {
        assert!(Environment::Development.config().validate().is_ok());
        assert!(Environment::Testnet.config().validate().is_ok());
        assert!(Environment::Mainnet.config().validate().is_ok());
        assert_eq!(Environment::Mainnet.config().subject_fee_rate.ppb(), 50_000_000);
    }

    #[test]
    fn test_fees_over_hundred_percent_rejected() {
        let config = ExchangeConfig {
            protocol_fee_rate: FeeRate::from_ppb(600_000_000),
            subject_fee_rate: FeeRate::from_ppb(500_000_000),
            ..ExchangeConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::InvalidFees { .. })));
    }

    #[test]
    fn test_flat_curve_rejected() {
        let config = ExchangeConfig {
            curve: PriceCurve::linear(0),
            ..ExchangeConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::InvalidCurve(_))));
    }

    #[test]
    fn test_zero_page_size_rejected() {
        let config = ExchangeConfig {
            page_size: 0,
            ..ExchangeConfig::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::InvalidPaging));
    }

    #[test]
    fn test_config_serialization() {
        let config = ExchangeConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let back = ExchangeConfig::from_json_str(&json).unwrap();
        assert_eq!(back, config);
    }

    #[test]
    fn test_config_from_json() {
        let json = format!(
            r#"{{
                "protocol_fee_rate": 10000000,
                "subject_fee_rate": 0,
                "curve": {{ "kind": "linear", "slope": 1000 }},
                "protocol_fee_destination": "{}",
                "page_size": 8
            }}"#,
            Identity::from_u64(255)
        );
        let config = ExchangeConfig::from_json_str(&json).unwrap();
        assert_eq!(config.curve.shape(), CurveShape::Linear { slope: 1000 });
        assert_eq!(config.protocol_fee_destination, Identity::from_u64(255));
        assert_eq!(config.page_size, 8);
    }

    #[test]
    fn test_missing_file() {
        let result = ExchangeConfig::from_json_file("/definitely/not/here.json");
        assert!(matches!(result, Err(ConfigError::Io { .. })));
    }
}
