use crate::error::{LedgerError, Result};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Business parameters and operational limits of the ledger.
///
/// Every field has a default, so a config file only lists what it overrides.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LedgerConfig {
    /// Percentage points added to the base rate for every credit.
    pub fixed_margin: Decimal,
    /// Fraction added to an instalment when it goes overdue.
    pub late_penalty_rate: Decimal,
    pub max_term_months: u32,
    /// Decimal places of the currency's minor unit.
    pub minor_unit_scale: u32,
    pub rate_timeout_ms: u64,
    pub store_timeout_ms: u64,
    /// Leading digits of generated account numbers.
    pub account_number_prefix: String,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            fixed_margin: dec!(5),
            late_penalty_rate: dec!(0.10),
            max_term_months: 360,
            minor_unit_scale: 2,
            rate_timeout_ms: 10_000,
            store_timeout_ms: 5_000,
            account_number_prefix: "40817".to_string(),
        }
    }
}

impl LedgerConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| LedgerError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    pub fn validate(&self) -> Result<()> {
        if self.fixed_margin < Decimal::ZERO {
            return Err(LedgerError::Config("fixed_margin must not be negative".to_string()));
        }
        if self.late_penalty_rate < Decimal::ZERO {
            return Err(LedgerError::Config(
                "late_penalty_rate must not be negative".to_string(),
            ));
        }
        if self.max_term_months == 0 {
            return Err(LedgerError::Config("max_term_months must be positive".to_string()));
        }
        if self.minor_unit_scale > 8 {
            return Err(LedgerError::Config("minor_unit_scale must be at most 8".to_string()));
        }
        let prefix = &self.account_number_prefix;
        if prefix.len() >= 20 || !prefix.chars().all(|c| c.is_ascii_digit()) {
            return Err(LedgerError::Config(
                "account_number_prefix must be fewer than 20 digits".to_string(),
            ));
        }
        Ok(())
    }

    pub fn rate_timeout(&self) -> Duration {
        Duration::from_millis(self.rate_timeout_ms)
    }

    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms)
    }
}
