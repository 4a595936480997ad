//! Settlement data models and the JSON output schema.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::validation::ValidationReport;

/// Canonical expense categories a settlement line item can map onto.
///
/// Unrecognized line items land in `Custom` so every dollar of declared
/// expense is accounted for somewhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpenseCategory {
    Fuel,
    DispatchFee,
    Insurance,
    Safety,
    Prepass,
    Ifta,
    DriverPay,
    PayrollFee,
    TruckParking,
    ServiceOnTruck,
    Reimbursement,
    Custom,
}

impl ExpenseCategory {
    /// All categories, in output order.
    pub const ALL: [ExpenseCategory; 12] = [
        ExpenseCategory::Fuel,
        ExpenseCategory::DispatchFee,
        ExpenseCategory::Insurance,
        ExpenseCategory::Safety,
        ExpenseCategory::Prepass,
        ExpenseCategory::Ifta,
        ExpenseCategory::DriverPay,
        ExpenseCategory::PayrollFee,
        ExpenseCategory::TruckParking,
        ExpenseCategory::ServiceOnTruck,
        ExpenseCategory::Reimbursement,
        ExpenseCategory::Custom,
    ];

    /// Shared fixed costs are charged once per document and split evenly
    /// across the vehicles it covers.
    pub fn is_shared_fixed(&self) -> bool {
        matches!(
            self,
            ExpenseCategory::Insurance
                | ExpenseCategory::Safety
                | ExpenseCategory::Prepass
                | ExpenseCategory::Ifta
        )
    }

    /// Snake-case name used in the output schema.
    pub fn as_str(&self) -> &'static str {
        match self {
            ExpenseCategory::Fuel => "fuel",
            ExpenseCategory::DispatchFee => "dispatch_fee",
            ExpenseCategory::Insurance => "insurance",
            ExpenseCategory::Safety => "safety",
            ExpenseCategory::Prepass => "prepass",
            ExpenseCategory::Ifta => "ifta",
            ExpenseCategory::DriverPay => "driver_pay",
            ExpenseCategory::PayrollFee => "payroll_fee",
            ExpenseCategory::TruckParking => "truck_parking",
            ExpenseCategory::ServiceOnTruck => "service_on_truck",
            ExpenseCategory::Reimbursement => "reimbursement",
            ExpenseCategory::Custom => "custom",
        }
    }
}

/// One normalized settlement: one vehicle, one pay period.
///
/// Optional fields mean "not reported"; a zero is a claim that the value
/// was reported as zero. Reimbursement is tracked outside the expense map
/// because it adds back into net profit instead of reducing it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SettlementRecord {
    /// Vehicle license plate; always whitelist-validated when present.
    pub license_plate: Option<String>,

    /// Settlement (pay period end) date.
    pub settlement_date: Option<NaiveDate>,

    /// Pay period start, when the document states or implies one.
    pub week_start: Option<NaiveDate>,

    /// Pay period end.
    pub week_end: Option<NaiveDate>,

    /// Free-text driver name, when one can be associated with the vehicle.
    pub driver_name: Option<String>,

    /// Miles driven during the period.
    pub miles_driven: Option<Decimal>,

    /// Number of delivered blocks/loads/stops.
    pub blocks_delivered: Option<u32>,

    /// Gross revenue for the period.
    pub gross_revenue: Option<Decimal>,

    /// Net profit (= gross - expenses + reimbursement).
    pub net_profit: Option<Decimal>,

    /// Total expenses; must equal the category sum within a cent.
    pub total_expenses: Option<Decimal>,

    /// Categorized expenses. BTreeMap keeps serialization deterministic.
    pub expense_categories: BTreeMap<ExpenseCategory, Decimal>,

    /// Reimbursement credited back to the vehicle for the period.
    pub reimbursement: Decimal,
}

impl SettlementRecord {
    /// Sum of all categorized expenses.
    pub fn categories_total(&self) -> Decimal {
        self.expense_categories.values().copied().sum()
    }

    /// Category amount, zero when absent.
    pub fn category(&self, category: ExpenseCategory) -> Decimal {
        self.expense_categories
            .get(&category)
            .copied()
            .unwrap_or(Decimal::ZERO)
    }

    /// Add to a category, creating it if needed.
    pub fn add_expense(&mut self, category: ExpenseCategory, amount: Decimal) {
        *self
            .expense_categories
            .entry(category)
            .or_insert(Decimal::ZERO) += amount;
    }

    /// Recompute `total_expenses` from the category map and `net_profit`
    /// from gross, expenses, and reimbursement.
    pub fn recompute_totals(&mut self) {
        let total = self.categories_total();
        self.total_expenses = Some(total);
        if let Some(gross) = self.gross_revenue {
            self.net_profit = Some(gross - total + self.reimbursement);
        }
    }
}

/// Output envelope for a whole document run, matching the schema the
/// persistence collaborator consumes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionOutput {
    /// Original filename of the document.
    pub source_file: String,

    /// When the extraction ran (RFC 3339).
    pub extraction_date: String,

    /// Detected or caller-supplied settlement type label.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub settlement_type: Option<String>,

    /// One entry per vehicle per pay period.
    pub settlements: Vec<SettlementEnvelope>,

    /// Validation outcome; present for multi-vehicle documents.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validation: Option<ValidationReport>,
}

/// One settlement in the output schema, grouped into sections.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettlementEnvelope {
    pub metadata: SettlementMetadata,
    pub revenue: RevenueSection,
    pub expenses: ExpenseSection,
    pub metrics: MetricsSection,
    pub driver_pay: DriverPaySection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettlementMetadata {
    pub settlement_date: Option<NaiveDate>,
    pub week_start: Option<NaiveDate>,
    pub week_end: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub settlement_type: Option<String>,
    pub license_plate: Option<String>,
    pub driver_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RevenueSection {
    pub gross_revenue: Decimal,
    pub net_profit: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExpenseSection {
    pub total_expenses: Decimal,
    pub categories: BTreeMap<ExpenseCategory, Decimal>,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub reimbursement: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSection {
    pub miles_driven: Decimal,
    pub blocks_delivered: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriverPaySection {
    pub driver_pay: Decimal,
    pub payroll_fee: Decimal,
}

fn is_zero(d: &Decimal) -> bool {
    d.is_zero()
}

impl SettlementEnvelope {
    /// Flatten a record into the sectioned output shape. Unreported
    /// numeric fields are emitted as zero, matching the consumer schema;
    /// the record itself keeps the unset/zero distinction.
    pub fn from_record(record: &SettlementRecord, settlement_type: Option<&str>) -> Self {
        Self {
            metadata: SettlementMetadata {
                settlement_date: record.settlement_date,
                week_start: record.week_start,
                week_end: record.week_end,
                settlement_type: settlement_type.map(|s| s.to_string()),
                license_plate: record.license_plate.clone(),
                driver_name: record.driver_name.clone(),
            },
            revenue: RevenueSection {
                gross_revenue: record.gross_revenue.unwrap_or(Decimal::ZERO),
                net_profit: record.net_profit.unwrap_or(Decimal::ZERO),
            },
            expenses: ExpenseSection {
                total_expenses: record.total_expenses.unwrap_or(Decimal::ZERO),
                categories: record.expense_categories.clone(),
                reimbursement: record.reimbursement,
            },
            metrics: MetricsSection {
                miles_driven: record.miles_driven.unwrap_or(Decimal::ZERO),
                blocks_delivered: record.blocks_delivered.unwrap_or(0),
            },
            driver_pay: DriverPaySection {
                driver_pay: record.category(ExpenseCategory::DriverPay),
                payroll_fee: record.category(ExpenseCategory::PayrollFee),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_category_serde_names() {
        let json = serde_json::to_string(&ExpenseCategory::DispatchFee).unwrap();
        assert_eq!(json, "\"dispatch_fee\"");
        assert_eq!(ExpenseCategory::ServiceOnTruck.as_str(), "service_on_truck");
    }

    #[test]
    fn test_shared_fixed_categories() {
        assert!(ExpenseCategory::Insurance.is_shared_fixed());
        assert!(ExpenseCategory::Ifta.is_shared_fixed());
        assert!(!ExpenseCategory::DispatchFee.is_shared_fixed());
        assert!(!ExpenseCategory::DriverPay.is_shared_fixed());
    }

    #[test]
    fn test_recompute_totals_with_reimbursement() {
        let mut record = SettlementRecord {
            gross_revenue: Some(Decimal::from_str("1000.00").unwrap()),
            reimbursement: Decimal::from_str("50.00").unwrap(),
            ..Default::default()
        };
        record.add_expense(ExpenseCategory::Fuel, Decimal::from_str("200.00").unwrap());
        record.add_expense(ExpenseCategory::Custom, Decimal::from_str("100.00").unwrap());
        record.recompute_totals();

        assert_eq!(record.total_expenses, Some(Decimal::from_str("300.00").unwrap()));
        // net = 1000 - 300 + 50
        assert_eq!(record.net_profit, Some(Decimal::from_str("750.00").unwrap()));
    }

    #[test]
    fn test_envelope_defaults_unset_to_zero() {
        let record = SettlementRecord::default();
        let env = SettlementEnvelope::from_record(&record, None);
        assert_eq!(env.revenue.gross_revenue, Decimal::ZERO);
        assert_eq!(env.metrics.blocks_delivered, 0);
        assert!(env.metadata.license_plate.is_none());
    }
}
