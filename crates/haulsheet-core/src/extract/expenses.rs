//! Expense categorization.
//!
//! Maps raw, layout-specific line-item labels onto the canonical expense
//! categories. Once a category holds a nonzero amount, later weaker
//! matches for it are ignored so a figure is never double-counted.

use std::collections::BTreeMap;

use lazy_static::lazy_static;
use regex::Regex;
use rust_decimal::Decimal;
use tracing::trace;

use crate::models::config::FeeConfig;
use crate::models::settlement::ExpenseCategory;

use super::format::StatementLayout;
use super::rules::parse_amount;

struct ExpenseRule {
    pattern: Regex,
    category: ExpenseCategory,
    group: usize,
}

impl ExpenseRule {
    fn new(pattern: &str, category: ExpenseCategory) -> Self {
        Self {
            pattern: Regex::new(pattern).expect("invalid expense rule pattern"),
            category,
            group: 1,
        }
    }

    fn with_group(mut self, group: usize) -> Self {
        self.group = group;
        self
    }
}

lazy_static! {
    // Income sheet lines carry deductions as parenthesized magnitudes.
    // The "DISPATCH FEE x%" line on this layout is actually the payroll
    // fee; when it prints two amounts the second is the fee.
    static ref SHEET_RULES: Vec<ExpenseRule> = vec![
        ExpenseRule::new(
            r"(?i)^DISPATCH[^\n]*FEE[^\n]*%\s*\(\$\s*([\d,]+\.?\d*)\)[^\n]*\(\$\s*([\d,]+\.?\d*)\)",
            ExpenseCategory::PayrollFee,
        )
        .with_group(2),
        ExpenseRule::new(
            r"(?i)^DISPATCH[^\n]*FEE[^\n]*\(\$\s*([\d,]+\.?\d*)\)",
            ExpenseCategory::PayrollFee,
        ),
        ExpenseRule::new(r"(?i)^FUEL[^\n]*\(\$\s*([\d,]+\.?\d*)\)", ExpenseCategory::Fuel),
        ExpenseRule::new(r"(?i)IFTA[^\n]*\(\$\s*([\d,]+\.?\d*)\)", ExpenseCategory::Ifta),
        ExpenseRule::new(r"(?i)SAFETY[^\n]*\(\$\s*([\d,]+\.?\d*)\)", ExpenseCategory::Safety),
        ExpenseRule::new(r"(?i)PREPASS[^\n]*\(\$\s*([\d,]+\.?\d*)\)", ExpenseCategory::Prepass),
        ExpenseRule::new(
            r"(?i)INSURANCE[^\n]*\(\$\s*([\d,]+\.?\d*)\)",
            ExpenseCategory::Insurance,
        ),
        ExpenseRule::new(
            r"(?i)DRIVER'S PAY[^\n]*\(\$\s*([\d,]+\.?\d*)\)",
            ExpenseCategory::DriverPay,
        ),
        ExpenseRule::new(
            r"(?i)PAYROLL[^\n]*FEE[^\n]*\(\$\s*([\d,]+\.?\d*)\)",
            ExpenseCategory::PayrollFee,
        ),
        ExpenseRule::new(
            r"(?i)SERVICE ON THE TRUCK[^\n]*\(\$\s*([\d,]+\.?\d*)\)",
            ExpenseCategory::ServiceOnTruck,
        ),
        ExpenseRule::new(
            r"(?i)TRUCK PARKING[^\n]*\(\$\s*([\d,]+\.?\d*)\)",
            ExpenseCategory::TruckParking,
        ),
    ];

    // Paystub lines print "Label $amount".
    static ref PAYSTUB_RULES: Vec<ExpenseRule> = vec![
        ExpenseRule::new(r"(?i)Fuel\s+\$?([\d,]+\.?\d*)", ExpenseCategory::Fuel),
        ExpenseRule::new(r"(?i)IFTA\s+\$?([\d,]+\.?\d*)", ExpenseCategory::Ifta),
        ExpenseRule::new(
            r"(?i)Dispatch Fee\s+\$?([\d,]+\.?\d*)",
            ExpenseCategory::DispatchFee,
        ),
        ExpenseRule::new(r"(?i)Safety\s+\$?([\d,]+\.?\d*)", ExpenseCategory::Safety),
        ExpenseRule::new(r"(?i)Prepass\s+\$?([\d,]+\.?\d*)", ExpenseCategory::Prepass),
        ExpenseRule::new(r"(?i)Insurance\s+\$?([\d,]+\.?\d*)", ExpenseCategory::Insurance),
        // The explicit fee must land before driver pay so the gross/base
        // split uses the printed figure instead of the derived one.
        ExpenseRule::new(
            r"(?i)Payroll Fee\s+\$?([\d,]+\.?\d*)",
            ExpenseCategory::PayrollFee,
        ),
        ExpenseRule::new(r"(?i)Payroll\s+\$?([\d,]+\.?\d*)", ExpenseCategory::PayrollFee),
        ExpenseRule::new(
            r"(?i)Driver's Pay\s+\$?([\d,]+\.?\d*)",
            ExpenseCategory::DriverPay,
        ),
        ExpenseRule::new(
            r"(?i)Service on Truck\s+\$?([\d,]+\.?\d*)",
            ExpenseCategory::ServiceOnTruck,
        ),
        ExpenseRule::new(
            r"(?i)Truck Parking\s+\$?([\d,]+\.?\d*)",
            ExpenseCategory::TruckParking,
        ),
        ExpenseRule::new(r"(?i)Deductions\s+\$?([\d,]+\.?\d*)", ExpenseCategory::Custom),
    ];

    // Dispatch fee printed as "DISPATCH FEE 10% ($ fee) ..."; the first
    // amount is the dispatch fee itself.
    static ref DISPATCH_PERCENT_LINE: Regex =
        Regex::new(r"(?i)DISPATCH[^\n]*FEE[^\n]*%\s*\(\$\s*([\d,]+\.?\d*)\)").unwrap();
}

/// Categorize every expense line item in the text.
///
/// The driver-pay figure some layouts print is the gross figure before
/// the payroll service fee is withheld. When the fee was already matched
/// the base is `gross - fee`; otherwise both are derived from the fixed
/// rate: `base = gross / (1 + rate)`, `fee = base * rate`.
pub fn categorize(
    text: &str,
    layout: StatementLayout,
    fees: &FeeConfig,
) -> BTreeMap<ExpenseCategory, Decimal> {
    let mut categories = BTreeMap::new();

    match layout {
        StatementLayout::IncomeSheet => {
            // Line by line; several labels would cross-match on the full
            // blob.
            for line in text.lines() {
                for rule in SHEET_RULES.iter() {
                    if categories.contains_key(&rule.category) {
                        continue;
                    }
                    let amount = rule
                        .pattern
                        .captures(line)
                        .and_then(|caps| caps.get(rule.group))
                        .and_then(|m| parse_amount(m.as_str()));
                    if let Some(amount) = amount {
                        apply(&mut categories, rule.category, amount, fees);
                        break;
                    }
                }
            }
        }
        StatementLayout::Paystub => {
            for rule in PAYSTUB_RULES.iter() {
                if categories.contains_key(&rule.category) {
                    continue;
                }
                let amount = rule
                    .pattern
                    .captures(text)
                    .and_then(|caps| caps.get(rule.group))
                    .and_then(|m| parse_amount(m.as_str()));
                if let Some(amount) = amount {
                    apply(&mut categories, rule.category, amount, fees);
                }
            }
        }
    }

    // The "DISPATCH FEE x%" line doubles as the dispatch fee source when
    // nothing else claimed that category: its first amount is the
    // percentage-of-gross fee.
    if !categories.contains_key(&ExpenseCategory::DispatchFee) {
        if let Some(caps) = DISPATCH_PERCENT_LINE.captures(text) {
            if let Some(amount) = parse_amount(&caps[1]) {
                if amount > Decimal::ZERO {
                    categories.insert(ExpenseCategory::DispatchFee, amount);
                }
            }
        }
    }

    trace!(count = categories.len(), "categorized expenses");
    categories
}

fn apply(
    categories: &mut BTreeMap<ExpenseCategory, Decimal>,
    category: ExpenseCategory,
    amount: Decimal,
    fees: &FeeConfig,
) {
    if amount <= Decimal::ZERO {
        return;
    }

    if category == ExpenseCategory::DriverPay {
        let (base, fee) = split_driver_pay(
            amount,
            categories.get(&ExpenseCategory::PayrollFee).copied(),
            fees,
        );
        categories.insert(ExpenseCategory::DriverPay, base);
        categories.entry(ExpenseCategory::PayrollFee).or_insert(fee);
    } else {
        categories.insert(category, amount);
    }
}

/// Split a printed driver-pay figure into the base pay and the payroll
/// service fee.
pub fn split_driver_pay(
    gross: Decimal,
    known_fee: Option<Decimal>,
    fees: &FeeConfig,
) -> (Decimal, Decimal) {
    match known_fee {
        Some(fee) if fee > Decimal::ZERO => (gross - fee, fee),
        _ => {
            let base = (gross / (Decimal::ONE + fees.payroll_fee_rate)).round_dp(2);
            let fee = (base * fees.payroll_fee_rate).round_dp(2);
            (base, fee)
        }
    }
}
