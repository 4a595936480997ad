//! Validation of extracted settlements.
//!
//! Every check reports rather than throws: a failed check contributes a
//! `ValidationIssue` and the run stays alive. A run is valid when no
//! error-level issue was raised; warnings never block output.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::settlement::{ExpenseCategory, SettlementRecord};

/// Severity of a validation issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueLevel {
    Error,
    Warning,
}

/// What part of the extraction the issue concerns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueCategory {
    Revenue,
    Expenses,
    Blocks,
    Fuel,
    DriverPay,
    NetProfit,
    Processing,
}

/// A single validation error or warning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub level: IssueLevel,
    pub category: IssueCategory,
    pub message: String,
    /// Numeric inputs that produced the issue.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub details: BTreeMap<String, Value>,
}

impl ValidationIssue {
    pub fn error(category: IssueCategory, message: impl Into<String>) -> Self {
        Self {
            level: IssueLevel::Error,
            category,
            message: message.into(),
            details: BTreeMap::new(),
        }
    }

    pub fn warning(category: IssueCategory, message: impl Into<String>) -> Self {
        Self {
            level: IssueLevel::Warning,
            category,
            message: message.into(),
            details: BTreeMap::new(),
        }
    }

    pub fn with_detail(mut self, key: &str, value: Value) -> Self {
        self.details.insert(key.to_string(), value);
        self
    }
}

/// Aggregated validation outcome for a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationReport {
    pub is_valid: bool,
    pub errors: Vec<ValidationIssue>,
    pub warnings: Vec<ValidationIssue>,
    pub summary: ValidationSummary,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationSummary {
    pub total_settlements: usize,
    pub error_count: usize,
    pub warning_count: usize,
    pub is_valid: bool,
}

impl ValidationReport {
    /// Partition issues by level and derive the summary.
    pub fn from_issues(issues: Vec<ValidationIssue>, total_settlements: usize) -> Self {
        let (errors, warnings): (Vec<_>, Vec<_>) = issues
            .into_iter()
            .partition(|i| i.level == IssueLevel::Error);
        let is_valid = errors.is_empty();

        Self {
            is_valid,
            summary: ValidationSummary {
                total_settlements,
                error_count: errors.len(),
                warning_count: warnings.len(),
                is_valid,
            },
            errors,
            warnings,
        }
    }
}

/// Document-stated totals the computed settlements are checked against.
#[derive(Debug, Clone, Default)]
pub struct ExpectedTotals {
    pub gross_revenue: Option<Decimal>,
    pub expenses: Option<Decimal>,
    pub blocks_delivered: Option<u32>,
    pub fuel: Option<Decimal>,
    pub driver_pay: Option<Decimal>,
}

pub(crate) fn dec(d: Decimal) -> Value {
    Value::String(d.to_string())
}

fn sum_category(records: &[SettlementRecord], category: ExpenseCategory) -> Decimal {
    records.iter().map(|r| r.category(category)).sum()
}

fn plate_label(record: &SettlementRecord) -> &str {
    record.license_plate.as_deref().unwrap_or("unknown")
}

/// Sum of per-vehicle gross revenue must match the document total.
pub fn validate_revenue(
    records: &[SettlementRecord],
    expected_total: Option<Decimal>,
    tolerance: Decimal,
) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();

    let total_gross: Decimal = records
        .iter()
        .map(|r| r.gross_revenue.unwrap_or(Decimal::ZERO))
        .sum();

    if let Some(expected) = expected_total {
        let difference = (total_gross - expected).abs();
        if difference > tolerance {
            issues.push(
                ValidationIssue::error(
                    IssueCategory::Revenue,
                    format!(
                        "Gross revenue mismatch: sum of vehicles ({total_gross:.2}) != expected ({expected:.2})"
                    ),
                )
                .with_detail("calculated_total", dec(total_gross))
                .with_detail("expected_total", dec(expected))
                .with_detail("difference", dec(difference)),
            );
        }
    }

    issues
}

/// Sum of per-vehicle expenses must match the document total; shared
/// fixed costs must carry an even per-vehicle share.
pub fn validate_expenses(
    records: &[SettlementRecord],
    expected_total: Option<Decimal>,
    shared_expenses: &BTreeMap<ExpenseCategory, Decimal>,
    tolerance: Decimal,
) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();

    let total_expenses: Decimal = records
        .iter()
        .map(|r| r.total_expenses.unwrap_or(Decimal::ZERO))
        .sum();

    if !shared_expenses.is_empty() && !records.is_empty() {
        let vehicle_count = Decimal::from(records.len() as u64);
        for (idx, record) in records.iter().enumerate() {
            for (category, shared_total) in shared_expenses {
                let expected_share = shared_total / vehicle_count;
                let actual = record.category(*category);
                if (actual - expected_share).abs() > tolerance {
                    issues.push(
                        ValidationIssue::warning(
                            IssueCategory::Expenses,
                            format!(
                                "Vehicle {} ({}): {} allocation mismatch (expected {expected_share:.2}, got {actual:.2})",
                                idx + 1,
                                plate_label(record),
                                category.as_str(),
                            ),
                        )
                        .with_detail("vehicle_index", Value::from(idx))
                        .with_detail("expense_category", Value::from(category.as_str()))
                        .with_detail("expected", dec(expected_share))
                        .with_detail("actual", dec(actual))
                        .with_detail("difference", dec((actual - expected_share).abs())),
                    );
                }
            }
        }
    }

    if let Some(expected) = expected_total {
        let difference = (total_expenses - expected).abs();
        if difference > tolerance {
            issues.push(
                ValidationIssue::error(
                    IssueCategory::Expenses,
                    format!(
                        "Total expenses mismatch: sum of vehicles ({total_expenses:.2}) != expected ({expected:.2})"
                    ),
                )
                .with_detail("calculated_total", dec(total_expenses))
                .with_detail("expected_total", dec(expected))
                .with_detail("difference", dec(difference)),
            );
        }
    }

    issues
}

/// Every block must land on some vehicle.
pub fn validate_blocks(
    records: &[SettlementRecord],
    expected_total: Option<u32>,
) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();

    let total_blocks: u32 = records
        .iter()
        .map(|r| r.blocks_delivered.unwrap_or(0))
        .sum();

    if let Some(expected) = expected_total {
        if total_blocks != expected {
            issues.push(
                ValidationIssue::error(
                    IssueCategory::Blocks,
                    format!(
                        "Block count mismatch: sum of vehicles ({total_blocks}) != expected ({expected})"
                    ),
                )
                .with_detail("calculated_total", Value::from(total_blocks))
                .with_detail("expected_total", Value::from(expected))
                .with_detail("difference", Value::from(total_blocks as i64 - expected as i64)),
            );
        }
    }

    for (idx, record) in records.iter().enumerate() {
        if record.blocks_delivered.unwrap_or(0) == 0 {
            issues.push(
                ValidationIssue::warning(
                    IssueCategory::Blocks,
                    format!(
                        "Vehicle {} ({}) has zero blocks assigned",
                        idx + 1,
                        plate_label(record)
                    ),
                )
                .with_detail("vehicle_index", Value::from(idx))
                .with_detail(
                    "license_plate",
                    Value::from(record.license_plate.clone()),
                ),
            );
        }
    }

    issues
}

/// Fuel totals per vehicle against the stated document fuel total.
pub fn validate_fuel(
    records: &[SettlementRecord],
    expected_total: Option<Decimal>,
    tolerance: Decimal,
) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();

    let total_fuel = sum_category(records, ExpenseCategory::Fuel);

    if let Some(expected) = expected_total {
        let difference = (total_fuel - expected).abs();
        if difference > tolerance {
            issues.push(
                ValidationIssue::error(
                    IssueCategory::Fuel,
                    format!(
                        "Fuel total mismatch: sum of vehicles ({total_fuel:.2}) != expected ({expected:.2})"
                    ),
                )
                .with_detail("calculated_total", dec(total_fuel))
                .with_detail("expected_total", dec(expected))
                .with_detail("difference", dec(difference)),
            );
        }
    }

    for (idx, record) in records.iter().enumerate() {
        let blocks = record.blocks_delivered.unwrap_or(0);
        let fuel = record.category(ExpenseCategory::Fuel);
        if blocks > 0 && fuel.is_zero() {
            issues.push(
                ValidationIssue::warning(
                    IssueCategory::Fuel,
                    format!(
                        "Vehicle {} ({}) has blocks but zero fuel",
                        idx + 1,
                        plate_label(record)
                    ),
                )
                .with_detail("vehicle_index", Value::from(idx))
                .with_detail("blocks", Value::from(blocks)),
            );
        }
    }

    issues
}

/// Driver pay totals per vehicle against the stated document total.
pub fn validate_driver_pay(
    records: &[SettlementRecord],
    expected_total: Option<Decimal>,
    tolerance: Decimal,
) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();

    let total_driver_pay = sum_category(records, ExpenseCategory::DriverPay);

    if let Some(expected) = expected_total {
        let difference = (total_driver_pay - expected).abs();
        if difference > tolerance {
            issues.push(
                ValidationIssue::error(
                    IssueCategory::DriverPay,
                    format!(
                        "Driver pay total mismatch: sum of vehicles ({total_driver_pay:.2}) != expected ({expected:.2})"
                    ),
                )
                .with_detail("calculated_total", dec(total_driver_pay))
                .with_detail("expected_total", dec(expected))
                .with_detail("difference", dec(difference)),
            );
        }
    }

    for (idx, record) in records.iter().enumerate() {
        let blocks = record.blocks_delivered.unwrap_or(0);
        let driver_pay = record.category(ExpenseCategory::DriverPay);
        if blocks > 0 && driver_pay.is_zero() {
            issues.push(
                ValidationIssue::warning(
                    IssueCategory::DriverPay,
                    format!(
                        "Vehicle {} ({}) has blocks but zero driver pay",
                        idx + 1,
                        plate_label(record)
                    ),
                )
                .with_detail("vehicle_index", Value::from(idx))
                .with_detail("blocks", Value::from(blocks)),
            );
        }
    }

    issues
}

/// Per-vehicle identity: net profit = gross - expenses (+ reimbursement).
pub fn validate_net_profit(
    records: &[SettlementRecord],
    tolerance: Decimal,
) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();

    for (idx, record) in records.iter().enumerate() {
        let gross = record.gross_revenue.unwrap_or(Decimal::ZERO);
        let expenses = record.total_expenses.unwrap_or(Decimal::ZERO);
        let net = record.net_profit.unwrap_or(Decimal::ZERO);

        let expected_net = gross - expenses + record.reimbursement;
        let difference = (net - expected_net).abs();

        if difference > tolerance {
            issues.push(
                ValidationIssue::error(
                    IssueCategory::NetProfit,
                    format!(
                        "Vehicle {} ({}): net profit calculation mismatch",
                        idx + 1,
                        plate_label(record)
                    ),
                )
                .with_detail("vehicle_index", Value::from(idx))
                .with_detail("gross_revenue", dec(gross))
                .with_detail("expenses", dec(expenses))
                .with_detail("reimbursement", dec(record.reimbursement))
                .with_detail("calculated_net", dec(expected_net))
                .with_detail("reported_net", dec(net))
                .with_detail("difference", dec(difference)),
            );
        }
    }

    issues
}

/// Run the whole validator battery and fold the results into a report.
pub fn validate_extraction(
    records: &[SettlementRecord],
    expected: &ExpectedTotals,
    shared_expenses: &BTreeMap<ExpenseCategory, Decimal>,
    tolerance: Decimal,
) -> ValidationReport {
    let mut issues = Vec::new();

    issues.extend(validate_revenue(records, expected.gross_revenue, tolerance));
    issues.extend(validate_expenses(
        records,
        expected.expenses,
        shared_expenses,
        tolerance,
    ));
    issues.extend(validate_blocks(records, expected.blocks_delivered));
    issues.extend(validate_fuel(records, expected.fuel, tolerance));
    issues.extend(validate_driver_pay(records, expected.driver_pay, tolerance));
    issues.extend(validate_net_profit(records, tolerance));

    ValidationReport::from_issues(issues, records.len())
}
