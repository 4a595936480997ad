//! Reconciliation against document-declared totals.
//!
//! Fuel is reconciled before net pay so the profit figures already
//! reflect corrected fuel when the net residual is measured. Every
//! adjustment is reported as a warning; reconciliation never fails a
//! run on its own.

use rust_decimal::Decimal;
use tracing::debug;

use crate::models::config::ReconciliationConfig;
use crate::models::settlement::{ExpenseCategory, SettlementRecord};
use crate::validation::{dec, IssueCategory, ValidationIssue};

/// Totals the document itself declares, used as reconciliation targets.
#[derive(Debug, Clone, Copy, Default)]
pub struct StatedTotals {
    pub fuel: Option<Decimal>,
    pub net_pay: Option<Decimal>,
}

/// Reconcile per-vehicle records against the stated totals, adjusting
/// in place and returning the issues describing what was corrected.
pub fn reconcile(
    records: &mut [SettlementRecord],
    stated: &StatedTotals,
    config: &ReconciliationConfig,
) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();

    if let Some(stated_fuel) = stated.fuel {
        issues.extend(reconcile_fuel(records, stated_fuel, config));
    }

    for record in records.iter_mut() {
        record.recompute_totals();
    }

    if let Some(stated_net) = stated.net_pay {
        issues.extend(reconcile_net_pay(records, stated_net, config));
    }

    issues
}

/// Apply a signed adjustment to an expense category without ever pushing
/// it below zero. Returns the amount actually applied.
fn adjust_category(
    record: &mut SettlementRecord,
    category: ExpenseCategory,
    amount: Decimal,
) -> Decimal {
    let applied = if amount < Decimal::ZERO {
        amount.max(-record.category(category))
    } else {
        amount
    };
    if !applied.is_zero() {
        record.add_expense(category, applied);
    }
    applied
}

/// Distribute a fuel residual across vehicles proportional to gross
/// revenue. The rounding remainder lands on the first vehicle so the
/// corrected sum matches the stated figure exactly; a downward
/// correction stops at zero per vehicle and the unapplied part is
/// reported instead of stored as a negative expense.
fn reconcile_fuel(
    records: &mut [SettlementRecord],
    stated_fuel: Decimal,
    config: &ReconciliationConfig,
) -> Vec<ValidationIssue> {
    let computed: Decimal = records
        .iter()
        .map(|r| r.category(ExpenseCategory::Fuel))
        .sum();
    let residual = stated_fuel - computed;
    if residual.abs() <= config.amount_tolerance {
        return Vec::new();
    }

    debug!(%stated_fuel, %computed, %residual, "reconciling fuel residual");

    let total_gross: Decimal = records
        .iter()
        .map(|r| r.gross_revenue.unwrap_or(Decimal::ZERO))
        .sum();
    let count = Decimal::from(records.len().max(1));

    let mut remaining = residual;
    for record in records.iter_mut() {
        let share = if total_gross > Decimal::ZERO {
            (residual * record.gross_revenue.unwrap_or(Decimal::ZERO) / total_gross).round_dp(2)
        } else {
            (residual / count).round_dp(2)
        };
        remaining -= adjust_category(record, ExpenseCategory::Fuel, share);
    }
    if !remaining.is_zero() {
        if let Some(first) = records.first_mut() {
            remaining -= adjust_category(first, ExpenseCategory::Fuel, remaining);
        }
    }

    let mut issue = ValidationIssue::warning(
        IssueCategory::Fuel,
        "fuel total adjusted to match the statement",
    )
    .with_detail("stated", dec(stated_fuel))
    .with_detail("computed", dec(computed))
    .with_detail("residual", dec(residual));
    if !remaining.is_zero() {
        issue = issue.with_detail("unapplied", dec(remaining));
    }
    vec![issue]
}

/// Reconcile the stated net-pay figure.
///
/// The statement is ambiguous about whether its net figure already
/// includes reimbursement; whichever of the two readings is closer,
/// within a one-dollar window, decides (tied readings count as
/// including it). Any residual beyond tolerance becomes a custom
/// expense on the first vehicle.
fn reconcile_net_pay(
    records: &mut [SettlementRecord],
    stated_net: Decimal,
    config: &ReconciliationConfig,
) -> Vec<ValidationIssue> {
    let total_reimbursement: Decimal = records.iter().map(|r| r.reimbursement).sum();
    let net_with: Decimal = records
        .iter()
        .map(|r| r.net_profit.unwrap_or(Decimal::ZERO))
        .sum();
    let net_without = net_with - total_reimbursement;

    let diff_with = (stated_net - net_with).abs();
    let diff_without = (stated_net - net_without).abs();

    let includes_reimbursement = if total_reimbursement.is_zero() {
        true
    } else if diff_with <= config.reimbursement_window || diff_without <= config.reimbursement_window
    {
        diff_with <= diff_without
    } else {
        // Neither reading lands near the stated figure; keep the
        // reimbursement-inclusive reading and let the residual show it.
        true
    };

    let target = if includes_reimbursement {
        stated_net
    } else {
        stated_net + total_reimbursement
    };

    let residual = net_with - target;
    if residual.abs() <= config.amount_tolerance {
        return Vec::new();
    }

    debug!(
        %stated_net,
        %net_with,
        %net_without,
        includes_reimbursement,
        %residual,
        "reconciling net pay residual"
    );

    // Unexplained money is an expense nobody itemized; it goes to the
    // first vehicle's custom bucket so the net figures line up. A
    // negative residual only draws that bucket down to zero; what it
    // cannot absorb stays a reported discrepancy.
    let mut unapplied = Decimal::ZERO;
    if let Some(first) = records.first_mut() {
        let applied = adjust_category(first, ExpenseCategory::Custom, residual);
        unapplied = residual - applied;
        first.recompute_totals();
    }

    let mut issue = ValidationIssue::warning(
        IssueCategory::NetProfit,
        "net pay residual assigned to the first vehicle's custom expenses",
    )
    .with_detail("stated", dec(stated_net))
    .with_detail("computed", dec(net_with))
    .with_detail("residual", dec(residual))
    .with_detail(
        "includes_reimbursement",
        serde_json::Value::Bool(includes_reimbursement),
    );
    if !unapplied.is_zero() {
        issue = issue.with_detail("unapplied", dec(unapplied));
    }
    vec![issue]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn d(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn record(plate: &str, gross: &str, fuel: &str) -> SettlementRecord {
        let mut r = SettlementRecord {
            license_plate: Some(plate.to_string()),
            gross_revenue: Some(d(gross)),
            ..Default::default()
        };
        if !fuel.is_empty() {
            r.add_expense(ExpenseCategory::Fuel, d(fuel));
        }
        r.recompute_totals();
        r
    }

    #[test]
    fn test_fuel_residual_distributed_by_revenue() {
        let mut records = vec![record("VW9327", "700.00", "50.00"), record("VW9328", "300.00", "30.00")];
        let stated = StatedTotals {
            fuel: Some(d("100.00")),
            net_pay: None,
        };
        let issues = reconcile(&mut records, &stated, &ReconciliationConfig::default());

        assert_eq!(issues.len(), 1);
        // Residual of 20 split 70/30 by revenue share.
        assert_eq!(records[0].category(ExpenseCategory::Fuel), d("64.00"));
        assert_eq!(records[1].category(ExpenseCategory::Fuel), d("36.00"));
    }

    #[test]
    fn test_fuel_within_tolerance_untouched() {
        let mut records = vec![record("VW9327", "700.00", "100.00")];
        let stated = StatedTotals {
            fuel: Some(d("100.00")),
            net_pay: None,
        };
        let issues = reconcile(&mut records, &stated, &ReconciliationConfig::default());
        assert!(issues.is_empty());
        assert_eq!(records[0].category(ExpenseCategory::Fuel), d("100.00"));
    }

    #[test]
    fn test_net_residual_goes_to_first_vehicle_custom() {
        let mut records = vec![record("VW9327", "1000.00", ""), record("VW9328", "500.00", "")];
        // Computed net = 1500; statement says 1480.
        let stated = StatedTotals {
            fuel: None,
            net_pay: Some(d("1480.00")),
        };
        let issues = reconcile(&mut records, &stated, &ReconciliationConfig::default());

        assert_eq!(issues.len(), 1);
        assert_eq!(records[0].category(ExpenseCategory::Custom), d("20.00"));
        assert_eq!(records[0].net_profit, Some(d("980.00")));
        // Second vehicle untouched.
        assert_eq!(records[1].net_profit, Some(d("500.00")));
    }

    #[test]
    fn test_negative_net_residual_never_negative_custom() {
        // Statement claims more net than computed; there is no itemized
        // expense to give back, so nothing goes below zero.
        let mut records = vec![record("VW9327", "1000.00", ""), record("VW9328", "500.00", "")];
        let stated = StatedTotals {
            fuel: None,
            net_pay: Some(d("1520.00")),
        };
        let issues = reconcile(&mut records, &stated, &ReconciliationConfig::default());

        assert_eq!(issues.len(), 1);
        assert_eq!(records[0].category(ExpenseCategory::Custom), Decimal::ZERO);
        assert_eq!(records[0].net_profit, Some(d("1000.00")));
        assert_eq!(issues[0].details["unapplied"], dec(d("-20.00")));
    }

    #[test]
    fn test_negative_fuel_residual_clamped_at_zero() {
        // The proportional share of the downward correction exceeds the
        // first vehicle's own fuel; it bottoms out at zero.
        let mut records = vec![record("VW9327", "700.00", "10.00"), record("VW9328", "300.00", "100.00")];
        let stated = StatedTotals {
            fuel: Some(d("60.00")),
            net_pay: None,
        };
        let issues = reconcile(&mut records, &stated, &ReconciliationConfig::default());

        assert_eq!(issues.len(), 1);
        assert_eq!(records[0].category(ExpenseCategory::Fuel), Decimal::ZERO);
        assert_eq!(records[1].category(ExpenseCategory::Fuel), d("85.00"));
        assert_eq!(issues[0].details["unapplied"], dec(d("-25.00")));
    }

    #[test]
    fn test_net_pay_reimbursement_hypotheses() {
        // Net with reimbursement = 1050, without = 1000.
        let mut records = vec![record("VW9327", "1000.00", "")];
        records[0].reimbursement = d("50.00");
        records[0].recompute_totals();

        // Statement quotes the reimbursement-free figure.
        let stated = StatedTotals {
            fuel: None,
            net_pay: Some(d("1000.00")),
        };
        let issues = reconcile(&mut records, &stated, &ReconciliationConfig::default());
        // 1000 + 50 == computed 1050; nothing to adjust.
        assert!(issues.is_empty());
        assert_eq!(records[0].net_profit, Some(d("1050.00")));
    }

    #[test]
    fn test_fuel_reconciled_before_net() {
        let mut records = vec![record("VW9327", "1000.00", "80.00")];
        // Fuel is corrected up to 100 first, making net 900; the stated
        // net of 900 then needs no custom adjustment.
        let stated = StatedTotals {
            fuel: Some(d("100.00")),
            net_pay: Some(d("900.00")),
        };
        let issues = reconcile(&mut records, &stated, &ReconciliationConfig::default());

        assert_eq!(issues.len(), 1);
        assert_eq!(records[0].category(ExpenseCategory::Fuel), d("100.00"));
        assert_eq!(records[0].category(ExpenseCategory::Custom), Decimal::ZERO);
        assert_eq!(records[0].net_profit, Some(d("900.00")));
    }
}
