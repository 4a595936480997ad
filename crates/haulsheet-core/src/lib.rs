//! Core library for carrier pay-settlement extraction.
//!
//! This crate provides:
//! - Format classification for the known statement layouts
//! - Rule-cascade field extraction (dates, amounts, plates, counts)
//! - Expense categorization with driver-pay/payroll-fee derivation
//! - Multi-vehicle allocation with shared-cost splits
//! - Reconciliation against document-stated totals and a validator
//!   battery producing structured issues

pub mod error;
pub mod extract;
pub mod models;
pub mod validation;

pub use error::{ExtractionError, HaulsheetError, Result};
pub use extract::format::{DocumentFormat, SettlementType, StatementLayout};
pub use extract::SettlementEngine;
pub use models::config::{EngineConfig, FeeConfig, PlateConfig, ReconciliationConfig};
pub use models::document::RawDocument;
pub use models::settlement::{
    ExpenseCategory, ExtractionOutput, SettlementEnvelope, SettlementRecord,
};
pub use validation::{IssueCategory, IssueLevel, ValidationIssue, ValidationReport};
