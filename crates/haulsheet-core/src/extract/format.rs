//! Format classification.
//!
//! Classification happens once per document and is final for the run:
//! the statement layout, the carrier settlement type, and the
//! multi-vehicle flag are derived from the raw text before any field
//! extraction begins.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::models::config::PlateConfig;
use crate::models::document::RawDocument;

use super::rules::plates;

/// Carrier settlement type, matched on header phrases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SettlementType {
    OwnerOperatorIncomeSheet,
    Logistics277,
    NbmTransport,
}

impl SettlementType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OwnerOperatorIncomeSheet => "Owner Operator Income Sheet",
            Self::Logistics277 => "277 Logistics",
            Self::NbmTransport => "NBM Transport LLC",
        }
    }

    /// Resolve a caller-supplied hint. Hints use the same display names
    /// the detector produces.
    pub fn from_hint(hint: &str) -> Option<Self> {
        let upper = hint.trim().to_uppercase();
        if upper.contains("NBM TRANSPORT") {
            Some(Self::NbmTransport)
        } else if upper.contains("277 LOGISTICS") {
            Some(Self::Logistics277)
        } else if upper.contains("INCOME SHEET") {
            Some(Self::OwnerOperatorIncomeSheet)
        } else {
            None
        }
    }

    fn detect(text: &str) -> Option<Self> {
        let upper = text.to_uppercase();
        if upper.contains("NBM TRANSPORT") {
            Some(Self::NbmTransport)
        } else if upper.contains("277 LOGISTICS") {
            Some(Self::Logistics277)
        } else if upper.contains("OWNER OPERATOR INCOME SHEET") || upper.contains("INCOME SHEET") {
            Some(Self::OwnerOperatorIncomeSheet)
        } else {
            None
        }
    }
}

/// Physical page layout, which picks the field rule set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StatementLayout {
    /// "Pay Period:" / "Gross Pay" / block-marker paystub pages.
    Paystub,
    /// "OWNER OPERATOR INCOME SHEET" table pages with parenthesized
    /// deduction amounts.
    IncomeSheet,
}

/// The classifier's verdict. Derived once, never mutated afterward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentFormat {
    pub layout: StatementLayout,
    pub settlement_type: Option<SettlementType>,
    pub multi_vehicle: bool,
}

/// Classify a document. A caller-supplied `settlement_type` hint wins
/// over detection; when absent, detection is authoritative.
pub fn classify(doc: &RawDocument, plates: &PlateConfig, hint: Option<&str>) -> DocumentFormat {
    let text = doc.full_text();

    let settlement_type = hint
        .and_then(SettlementType::from_hint)
        .or_else(|| SettlementType::detect(&text));

    let layout = match settlement_type {
        Some(SettlementType::OwnerOperatorIncomeSheet) => StatementLayout::IncomeSheet,
        _ => StatementLayout::Paystub,
    };

    let multi_vehicle = is_multi_vehicle(&text, plates, settlement_type);

    debug!(
        source_file = doc.source_file(),
        ?layout,
        settlement_type = settlement_type.map(|t| t.as_str()),
        multi_vehicle,
        "classified document"
    );

    DocumentFormat {
        layout,
        settlement_type,
        multi_vehicle,
    }
}

/// Multi-vehicle detection is deliberately permissive: three independent
/// strategies, and any one of them finding two or more distinct
/// whitelisted plates decides it. A false negative silently misattributes
/// revenue; a false positive only costs extra reconciliation work.
fn is_multi_vehicle(
    text: &str,
    plates: &PlateConfig,
    settlement_type: Option<SettlementType>,
) -> bool {
    // NBM statements always go through the multi-vehicle path, even when
    // only one plate is visible.
    if settlement_type == Some(SettlementType::NbmTransport) {
        return true;
    }

    plates::plates_in_header(text, plates).len() >= 2
        || plates::plates_in_blocks(text, plates).len() >= 2
        || plates::concatenated_plates(text, plates).len() >= 2
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(text: &str) -> RawDocument {
        RawDocument::from_text("stub.txt", text)
    }

    #[test]
    fn test_settlement_type_detection() {
        assert_eq!(
            SettlementType::detect("... NBM TRANSPORT LLC weekly ..."),
            Some(SettlementType::NbmTransport)
        );
        assert_eq!(
            SettlementType::detect("... 277 Logistics ..."),
            Some(SettlementType::Logistics277)
        );
        assert_eq!(
            SettlementType::detect("OWNER OPERATOR INCOME SHEET"),
            Some(SettlementType::OwnerOperatorIncomeSheet)
        );
        assert_eq!(SettlementType::detect("plain paystub"), None);
    }

    #[test]
    fn test_hint_wins_over_detection() {
        let plates = PlateConfig::default();
        let format = classify(
            &doc("277 Logistics\nPay Period: 12/28/2024"),
            &plates,
            Some("NBM Transport LLC"),
        );
        assert_eq!(format.settlement_type, Some(SettlementType::NbmTransport));
        // NBM always runs the multi-vehicle path.
        assert!(format.multi_vehicle);
    }

    #[test]
    fn test_income_sheet_layout() {
        let plates = PlateConfig::default();
        let format = classify(&doc("OWNER OPERATOR INCOME SHEET\n..."), &plates, None);
        assert_eq!(format.layout, StatementLayout::IncomeSheet);
        assert!(!format.multi_vehicle);
    }

    #[test]
    fn test_multi_vehicle_from_header() {
        let plates = PlateConfig::default();
        let format = classify(
            &doc("277 Logistics\nPlate#: VW9327 VW9328\nPay Period: 12/28/2024"),
            &plates,
            None,
        );
        assert!(format.multi_vehicle);
    }

    #[test]
    fn test_single_plate_stays_single() {
        let plates = PlateConfig::default();
        let format = classify(
            &doc("277 Logistics\nPlate#: VW9327\nB-1 Smith VW9327 600.00"),
            &plates,
            None,
        );
        assert!(!format.multi_vehicle);
    }

    #[test]
    fn test_multi_vehicle_from_corrupted_block_plates() {
        let plates = PlateConfig::default();
        let text = "277 Logistics\n\
                    B-1 Smith VW9327 600.00\n\
                    B-2 NaVpWpe9r328 412.50";
        let format = classify(&doc(text), &plates, None);
        assert!(format.multi_vehicle);
    }
}
