//! Engine configuration: plate whitelist, correction table, and rates.
//!
//! The configuration is loaded once at startup and treated as immutable
//! for the engine's lifetime. Test suites substitute fixtures by building
//! their own `EngineConfig` instead of touching process state.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Main engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Plate whitelist and correction table.
    pub plates: PlateConfig,

    /// Fee rates.
    pub fees: FeeConfig,

    /// Reconciliation tolerances.
    pub reconciliation: ReconciliationConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            plates: PlateConfig::default(),
            fees: FeeConfig::default(),
            reconciliation: ReconciliationConfig::default(),
        }
    }
}

/// Vehicle identifier configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlateConfig {
    /// The set of license plates the business recognizes. Extracted
    /// plates that do not resolve into this set are rejected, never
    /// silently accepted.
    pub whitelist: BTreeSet<String>,

    /// Known recurring extraction errors: garbled token -> correct plate.
    pub corrections: BTreeMap<String, String>,
}

impl Default for PlateConfig {
    fn default() -> Self {
        let whitelist = ["VV9952", "VW1503", "VW9327", "VW9328"]
            .iter()
            .map(|s| s.to_string())
            .collect();

        // Recurring artifact: driver name merged into the plate token.
        let mut corrections = BTreeMap::new();
        corrections.insert("NAVPWPE9R327".to_string(), "VW9327".to_string());

        Self {
            whitelist,
            corrections,
        }
    }
}

impl PlateConfig {
    /// Whitelist membership check on a normalized (uppercase) plate.
    pub fn is_valid(&self, plate: &str) -> bool {
        self.whitelist.contains(plate)
    }

    /// Look up the correction table for a garbled token.
    pub fn correct(&self, token: &str) -> Option<&str> {
        self.corrections
            .get(&token.to_uppercase())
            .map(|s| s.as_str())
    }

    /// Whitelisted plates in stable order.
    pub fn plates(&self) -> impl Iterator<Item = &str> {
        self.whitelist.iter().map(|s| s.as_str())
    }
}

/// Fee rates fixed by the business.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FeeConfig {
    /// Payroll service fee rate withheld from driver pay (6.5%).
    pub payroll_fee_rate: Decimal,
}

impl Default for FeeConfig {
    fn default() -> Self {
        Self {
            payroll_fee_rate: Decimal::new(65, 3), // 0.065
        }
    }
}

/// Reconciliation tolerances.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconciliationConfig {
    /// Allowed difference before a computed/stated mismatch is adjusted
    /// or flagged ($0.01).
    pub amount_tolerance: Decimal,

    /// Window for deciding whether a stated net-pay figure already
    /// includes reimbursement ($1.00).
    pub reimbursement_window: Decimal,
}

impl Default for ReconciliationConfig {
    fn default() -> Self {
        Self {
            amount_tolerance: Decimal::new(1, 2), // 0.01
            reimbursement_window: Decimal::ONE,
        }
    }
}

impl EngineConfig {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self, std::io::Error> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string()))
    }

    /// Save configuration to a JSON file.
    pub fn save(&self, path: &Path) -> Result<(), std::io::Error> {
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string()))?;
        std::fs::write(path, content)
    }
}
