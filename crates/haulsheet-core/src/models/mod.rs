//! Data models for settlement extraction.

pub mod config;
pub mod document;
pub mod settlement;

pub use config::{EngineConfig, FeeConfig, PlateConfig, ReconciliationConfig};
pub use document::RawDocument;
pub use settlement::{
    ExpenseCategory, ExtractionOutput, SettlementEnvelope, SettlementRecord,
};
