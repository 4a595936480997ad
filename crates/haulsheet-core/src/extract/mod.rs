//! Settlement extraction pipeline.
//!
//! One document in, one or more settlement records out. The pipeline is
//! pure and synchronous: classify, extract fields, categorize expenses,
//! allocate across vehicles when needed, reconcile against stated
//! totals, validate, and assemble the output envelope. The only
//! nondeterministic input is the extraction timestamp, which
//! `process_at` makes explicit.

pub mod allocate;
pub mod expenses;
pub mod fields;
pub mod format;
pub mod reconcile;
pub mod rules;

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tracing::{debug, info, warn};

use crate::error::{ExtractionError, Result};
use crate::models::config::EngineConfig;
use crate::models::document::RawDocument;
use crate::models::settlement::{
    ExpenseCategory, ExtractionOutput, SettlementEnvelope, SettlementRecord,
};
use crate::validation::{
    validate_extraction, IssueCategory, ValidationIssue, ValidationReport,
};

use format::DocumentFormat;
use reconcile::StatedTotals;
use rules::patterns::{TOTAL_DRIVER_PAY, TOTAL_FUEL};

/// The extraction engine. Construction fixes the configuration for the
/// engine's lifetime; a single engine is safe to share across threads
/// for concurrent document runs.
#[derive(Debug, Clone, Default)]
pub struct SettlementEngine {
    config: EngineConfig,
}

impl SettlementEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Process a document, stamping the output with the current time.
    pub fn process(
        &self,
        doc: &RawDocument,
        settlement_type_hint: Option<&str>,
    ) -> Result<ExtractionOutput> {
        self.process_at(doc, settlement_type_hint, Utc::now())
    }

    /// Process a document with an explicit extraction timestamp. Given
    /// the same document, configuration, and timestamp, the output is
    /// identical run to run.
    pub fn process_at(
        &self,
        doc: &RawDocument,
        settlement_type_hint: Option<&str>,
        extraction_date: DateTime<Utc>,
    ) -> Result<ExtractionOutput> {
        if doc.is_empty() {
            return Err(ExtractionError::NoSettlements {
                source_file: doc.source_file().to_string(),
            }
            .into());
        }

        let format = format::classify(doc, &self.config.plates, settlement_type_hint);
        let text = doc.full_text();

        let (records, validation) = if format.multi_vehicle {
            self.process_multi(&text, &format)
        } else {
            self.process_single(&text, &format)
        };

        if records.is_empty() {
            return Err(ExtractionError::NoSettlements {
                source_file: doc.source_file().to_string(),
            }
            .into());
        }

        info!(
            source_file = doc.source_file(),
            settlements = records.len(),
            multi_vehicle = format.multi_vehicle,
            "extraction complete"
        );

        let settlement_type = format.settlement_type.map(|t| t.as_str().to_string());
        let settlements = records
            .iter()
            .map(|r| SettlementEnvelope::from_record(r, settlement_type.as_deref()))
            .collect();

        Ok(ExtractionOutput {
            source_file: doc.source_file().to_string(),
            extraction_date: extraction_date.to_rfc3339(),
            settlement_type,
            settlements,
            validation,
        })
    }

    /// Single-vehicle path: one record straight from the field and
    /// expense rule sets.
    fn process_single(
        &self,
        text: &str,
        format: &DocumentFormat,
    ) -> (Vec<SettlementRecord>, Option<ValidationReport>) {
        let fields = fields::extract_fields(text, format.layout);
        let categories = expenses::categorize(text, format.layout, &self.config.fees);

        let mut issues = Vec::new();
        let plate = self.resolve_single_plate(&fields, &mut issues);

        let has_signal = fields.gross_revenue.is_some()
            || fields.net_profit.is_some()
            || fields.blocks_delivered.is_some()
            || plate.is_some();
        if !has_signal {
            return (Vec::new(), None);
        }

        let mut record = SettlementRecord {
            license_plate: plate,
            settlement_date: fields.period.settlement_date,
            week_start: fields.period.week_start,
            week_end: fields.period.week_end,
            miles_driven: fields.miles_driven.as_ref().map(|m| m.value),
            blocks_delivered: fields.blocks_delivered.as_ref().map(|b| b.value),
            gross_revenue: fields.gross_revenue.as_ref().map(|g| g.value),
            net_profit: fields.net_profit.as_ref().map(|n| n.value),
            expense_categories: categories,
            ..Default::default()
        };

        // Every dollar of declared expense lands in a category: when
        // nothing was itemized the gross/net gap is a custom expense.
        if record.expense_categories.is_empty() {
            if let (Some(gross), Some(net)) = (record.gross_revenue, record.net_profit) {
                let gap = gross - net;
                if !gap.is_zero() {
                    record.add_expense(ExpenseCategory::Custom, gap);
                }
            }
        }

        record.total_expenses = Some(record.categories_total());
        if record.net_profit.is_none() {
            if let (Some(gross), Some(total)) = (record.gross_revenue, record.total_expenses) {
                record.net_profit = Some(gross - total + record.reimbursement);
            }
        }

        let validation = if issues.is_empty() {
            None
        } else {
            Some(ValidationReport::from_issues(issues, 1))
        };

        (vec![record], validation)
    }

    /// Multi-vehicle path: allocate blocks, split shared costs,
    /// reconcile against stated totals, then run the validator battery.
    fn process_multi(
        &self,
        text: &str,
        format: &DocumentFormat,
    ) -> (Vec<SettlementRecord>, Option<ValidationReport>) {
        let allocation = allocate::allocate_blocks(text, &self.config);
        if allocation.order.is_empty() {
            // Nothing attributable; degrade to the conservative
            // single-vehicle reading rather than dropping the document.
            warn!("multi-vehicle document without attributable blocks, falling back to single");
            let (records, validation) = self.process_single(text, format);
            let fallback = ValidationIssue::warning(
                IssueCategory::Processing,
                "no vehicle blocks resolved; document processed as single-vehicle",
            );
            let mut issues = vec![fallback];
            if let Some(report) = validation {
                issues.extend(report.errors);
                issues.extend(report.warnings);
            }
            let count = records.len();
            return (records, Some(ValidationReport::from_issues(issues, count)));
        }

        let fields = fields::extract_fields(text, format.layout);
        let document_categories = expenses::categorize(text, format.layout, &self.config.fees);

        let mut split = allocate::split_expenses(&allocation, &document_categories, &self.config);
        let document_fuel = document_categories
            .get(&ExpenseCategory::Fuel)
            .copied()
            .unwrap_or(Decimal::ZERO);
        allocate::distribute_missing_fuel(&allocation, &mut split, document_fuel);

        let mut records: Vec<SettlementRecord> = allocation
            .order
            .iter()
            .map(|plate| {
                let acc = &allocation.vehicles[plate];
                let mut record = SettlementRecord {
                    license_plate: Some(plate.clone()),
                    settlement_date: fields.period.settlement_date,
                    week_start: fields.period.week_start,
                    week_end: fields.period.week_end,
                    driver_name: acc.driver_name.clone(),
                    blocks_delivered: Some(acc.blocks),
                    gross_revenue: Some(acc.gross_revenue),
                    expense_categories: split.remove(plate).unwrap_or_default(),
                    reimbursement: acc.reimbursement,
                    ..Default::default()
                };
                record.recompute_totals();
                record
            })
            .collect();

        let stated = StatedTotals {
            fuel: stated_fuel(text),
            net_pay: fields.net_profit.as_ref().map(|n| n.value),
        };
        let mut issues =
            reconcile::reconcile(&mut records, &stated, &self.config.reconciliation);

        let expected = crate::validation::ExpectedTotals {
            gross_revenue: fields.gross_revenue.as_ref().map(|g| g.value),
            expenses: None,
            blocks_delivered: fields.blocks_delivered.as_ref().map(|b| b.value),
            fuel: stated.fuel,
            driver_pay: stated_driver_pay(text),
        };
        let shared: BTreeMap<ExpenseCategory, Decimal> = document_categories
            .iter()
            .filter(|(c, _)| c.is_shared_fixed())
            .map(|(c, v)| (*c, *v))
            .collect();

        let report = validate_extraction(
            &records,
            &expected,
            &shared,
            self.config.reconciliation.amount_tolerance,
        );
        issues.extend(report.errors);
        issues.extend(report.warnings);
        let report = ValidationReport::from_issues(issues, records.len());

        debug!(
            is_valid = report.is_valid,
            errors = report.summary.error_count,
            warnings = report.summary.warning_count,
            "validation complete"
        );

        (records, Some(report))
    }

    /// Single-path identifier handling: apply the correction table, then
    /// enforce the whitelist. An identifier that still fails the check
    /// is dropped with a warning, never accepted.
    fn resolve_single_plate(
        &self,
        fields: &fields::ExtractedFields,
        issues: &mut Vec<ValidationIssue>,
    ) -> Option<String> {
        let extracted = fields.license_plate.as_ref()?;
        let corrected = self
            .config
            .plates
            .correct(&extracted.value)
            .map(|c| c.to_string())
            .unwrap_or_else(|| extracted.value.clone());

        if self.config.plates.whitelist.is_empty() || self.config.plates.is_valid(&corrected) {
            return Some(corrected);
        }

        warn!(plate = %corrected, rule = extracted.rule, "extracted plate not in whitelist");
        issues.push(
            ValidationIssue::warning(
                IssueCategory::Processing,
                format!("extracted plate {corrected} is not a recognized vehicle"),
            )
            .with_detail("plate", serde_json::Value::from(corrected))
            .with_detail("rule", serde_json::Value::from(extracted.rule)),
        );
        None
    }
}

/// The stated fuel target is an explicit "Total Fuel" figure only; a
/// fuel amount scraped off a block line is not a document total.
fn stated_fuel(text: &str) -> Option<Decimal> {
    TOTAL_FUEL
        .captures(text)
        .and_then(|caps| rules::parse_amount(&caps[1]))
}

fn stated_driver_pay(text: &str) -> Option<Decimal> {
    TOTAL_DRIVER_PAY
        .captures(text)
        .and_then(|caps| rules::parse_amount(&caps[1]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::str::FromStr;

    fn d(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn engine_with(extra_plates: &[&str]) -> SettlementEngine {
        let mut config = EngineConfig::default();
        for plate in extra_plates {
            config.plates.whitelist.insert(plate.to_string());
        }
        SettlementEngine::new(config)
    }

    #[test]
    fn test_empty_document_is_terminal() {
        let engine = SettlementEngine::default();
        let doc = RawDocument::from_text("empty.txt", "  \n \n");
        let err = engine.process(&doc, None).unwrap_err();
        assert!(matches!(
            err,
            crate::error::HaulsheetError::Extraction(ExtractionError::NoSettlements { .. })
        ));
    }

    #[test]
    fn test_unusable_document_is_terminal() {
        let engine = SettlementEngine::default();
        let doc = RawDocument::from_text("junk.txt", "lorem ipsum dolor\nsit amet");
        assert!(engine.process(&doc, None).is_err());
    }

    #[test]
    fn test_single_paystub() {
        let engine = engine_with(&["AB1234"]);
        let doc = RawDocument::from_text(
            "paystub.txt",
            "277 Logistics\n\
             Pay Period: 12/28/2024\n\
             Plate#: AB1234\n\
             B-1 Smith Start of Load 12/23/2024 $700.00\n\
             B-2 Smith Start of Load 12/24/2024 $650.00\n\
             B-3 Smith Start of Load 12/26/2024 $650.00\n\
             Gross Pay $2,000.00\n\
             Net Pay $1,500.00\n",
        );
        let output = engine.process(&doc, None).unwrap();

        assert_eq!(output.settlement_type.as_deref(), Some("277 Logistics"));
        assert_eq!(output.settlements.len(), 1);
        let s = &output.settlements[0];
        assert_eq!(s.metadata.license_plate.as_deref(), Some("AB1234"));
        assert_eq!(s.revenue.gross_revenue, d("2000.00"));
        assert_eq!(s.revenue.net_profit, d("1500.00"));
        assert_eq!(s.metrics.blocks_delivered, 3);
        // Nothing itemized: the whole gap is custom.
        assert_eq!(
            s.expenses.categories[&ExpenseCategory::Custom],
            d("500.00")
        );
        assert_eq!(s.expenses.total_expenses, d("500.00"));
    }

    #[test]
    fn test_unrecognized_plate_dropped_with_warning() {
        let engine = SettlementEngine::default();
        let doc = RawDocument::from_text(
            "paystub.txt",
            "277 Logistics\nPlate#: ZZ9999\nGross Pay $100.00\nNet Pay $100.00\n",
        );
        let output = engine.process(&doc, None).unwrap();
        assert_eq!(output.settlements[0].metadata.license_plate, None);
        let report = output.validation.unwrap();
        assert!(report.is_valid);
        assert_eq!(report.summary.warning_count, 1);
    }

    #[test]
    fn test_multi_vehicle_shared_split() {
        let engine = SettlementEngine::default();
        let doc = RawDocument::from_text(
            "multi.txt",
            "NBM Transport LLC\n\
             Pay Period: 12/28/2024\n\
             Plate#: VW9327 VW9328\n\
             B-1 John Smith VW9327 $700.00 $200.00 Fuel $80.00\n\
             B-2 Maria Lopez VW9328 $300.00 $90.00 Fuel $40.00\n\
             Insurance $700.00\n",
        );
        let output = engine.process(&doc, None).unwrap();

        assert_eq!(output.settlements.len(), 2);
        let a = &output.settlements[0];
        let b = &output.settlements[1];
        assert_eq!(a.metadata.license_plate.as_deref(), Some("VW9327"));
        assert_eq!(b.metadata.license_plate.as_deref(), Some("VW9328"));
        assert_eq!(
            a.expenses.categories[&ExpenseCategory::Insurance],
            d("350.00")
        );
        assert_eq!(
            b.expenses.categories[&ExpenseCategory::Insurance],
            d("350.00")
        );
        assert!(output.validation.is_some());
    }

    #[test]
    fn test_trailing_fuel_total_split_by_revenue_share() {
        let engine = SettlementEngine::default();
        let doc = RawDocument::from_text(
            "multi.txt",
            "NBM Transport LLC\n\
             Plate#: VW9327 VW9328\n\
             B-1 John Smith VW9327 $700.00 $200.00\n\
             B-2 Maria Lopez VW9328 $300.00 $90.00\n\
             Total Fuel $300.00\n",
        );
        let output = engine.process(&doc, None).unwrap();

        // The document fuel total is split by revenue share, never
        // charged wholesale to the block that precedes it.
        let a = &output.settlements[0];
        let b = &output.settlements[1];
        assert_eq!(a.expenses.categories[&ExpenseCategory::Fuel], d("210.00"));
        assert_eq!(b.expenses.categories[&ExpenseCategory::Fuel], d("90.00"));
    }

    #[test]
    fn test_idempotent_given_timestamp() {
        let engine = SettlementEngine::default();
        let doc = RawDocument::from_text(
            "multi.txt",
            "NBM Transport LLC\n\
             Plate#: VW9327 VW9328\n\
             B-1 John Smith VW9327 $700.00 $200.00\n\
             B-2 Maria Lopez VW9328 $300.00 $90.00\n",
        );
        let at = Utc.with_ymd_and_hms(2025, 1, 6, 12, 0, 0).unwrap();

        let first = engine.process_at(&doc, None, at).unwrap();
        let second = engine.process_at(&doc, None, at).unwrap();
        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
    }
}
