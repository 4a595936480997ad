//! Multi-vehicle allocation.
//!
//! Walks the document's line-item blocks, attributes each one to a
//! vehicle, and splits document-level shared costs across the vehicles.
//! A block whose identifier cannot be resolved to the whitelist by any
//! strategy contributes nothing; it is excluded rather than force-
//! assigned to a wrong vehicle.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use tracing::{debug, warn};

use crate::models::config::EngineConfig;
use crate::models::settlement::ExpenseCategory;

use super::rules::amounts::amounts_on_line;
use super::rules::patterns::{BLOCK_ID, FUEL_LABELED, NAME_WORD, REIMBURSEMENT_LINE, SUMMARY_LABEL};
use super::rules::plates::{self, PlateMatch};

/// Per-vehicle running totals accumulated from attributed blocks.
#[derive(Debug, Clone, Default)]
pub struct VehicleAccumulator {
    pub gross_revenue: Decimal,
    pub driver_pay: Decimal,
    pub fuel: Decimal,
    pub blocks: u32,
    pub reimbursement: Decimal,
    pub driver_name: Option<String>,
}

/// The allocator's result: per-vehicle accumulators plus the order in
/// which vehicles first appeared on the document. "First vehicle"
/// conventions (one-off charges, residuals) follow this order.
#[derive(Debug, Clone, Default)]
pub struct Allocation {
    pub order: Vec<String>,
    pub vehicles: BTreeMap<String, VehicleAccumulator>,
}

impl Allocation {
    pub fn first_plate(&self) -> Option<&str> {
        self.order.first().map(|s| s.as_str())
    }

    fn vehicle(&mut self, plate: &str) -> &mut VehicleAccumulator {
        if !self.vehicles.contains_key(plate) {
            self.order.push(plate.to_string());
        }
        self.vehicles.entry(plate.to_string()).or_default()
    }
}

/// One block line plus its continuation lines. Ends at the next marker
/// or at the first document-summary label, so totals printed after the
/// block list never count as block-level figures.
struct BlockSegment<'a> {
    lines: Vec<&'a str>,
}

impl BlockSegment<'_> {
    fn head(&self) -> &str {
        self.lines[0]
    }

    fn text(&self) -> String {
        self.lines.join("\n")
    }

    /// The block line and the line immediately after it. Per-block
    /// sub-figures (fuel, reimbursement) only ever print this close.
    fn near_lines(&self) -> &[&str] {
        &self.lines[..self.lines.len().min(2)]
    }
}

fn split_blocks(text: &str) -> Vec<BlockSegment<'_>> {
    let mut segments: Vec<BlockSegment> = Vec::new();
    let mut open = false;
    for line in text.lines() {
        if BLOCK_ID.is_match(line) {
            segments.push(BlockSegment { lines: vec![line] });
            open = true;
        } else if SUMMARY_LABEL.is_match(line) {
            open = false;
        } else if open {
            if let Some(current) = segments.last_mut() {
                current.lines.push(line);
            }
        }
    }
    segments
}

/// Words that appear capitalized on block lines but are never names.
const NAME_STOPWORDS: [&str; 7] = ["Start", "Load", "Of", "Fuel", "Pay", "Total", "Reimbursement"];

fn driver_name_on_line(line: &str) -> Option<String> {
    let words: Vec<&str> = NAME_WORD
        .captures_iter(line)
        .map(|c| c.get(1).map_or("", |m| m.as_str()))
        .filter(|w| !NAME_STOPWORDS.contains(w))
        .take(2)
        .collect();
    if words.is_empty() {
        None
    } else {
        Some(words.join(" "))
    }
}

/// Attribute every block to a vehicle.
///
/// Identifier resolution is an ordered strategy chain: direct whitelist
/// match, corruption recovery, the fixed correction table, the vehicle
/// most recently associated with the block's driver name, and finally
/// the first known vehicle on the document.
pub fn allocate_blocks(text: &str, config: &EngineConfig) -> Allocation {
    let mut allocation = Allocation::default();
    let mut recent_plate_by_driver: BTreeMap<String, String> = BTreeMap::new();

    for segment in split_blocks(text) {
        let head = segment.head();
        let driver = driver_name_on_line(head);

        let resolved = plates::match_in_text(&segment.text(), &config.plates).or_else(|| {
            driver
                .as_deref()
                .and_then(|name| recent_plate_by_driver.get(name))
                .map(|plate| PlateMatch {
                    plate: plate.clone(),
                    strategy: "driver_recency",
                })
                .or_else(|| {
                    allocation.first_plate().map(|plate| PlateMatch {
                        plate: plate.to_string(),
                        strategy: "first_plate",
                    })
                })
        });

        let Some(resolved) = resolved else {
            warn!(block = head, "block excluded: no vehicle resolved");
            continue;
        };

        debug!(
            block = head,
            plate = %resolved.plate,
            strategy = resolved.strategy,
            "attributed block"
        );

        if let Some(name) = &driver {
            recent_plate_by_driver.insert(name.clone(), resolved.plate.clone());
        }

        let amounts = amounts_on_line(head);
        let labeled_fuel = segment
            .near_lines()
            .iter()
            .find_map(|line| FUEL_LABELED.captures(line))
            .and_then(|caps| super::rules::parse_amount(&caps[1]));
        let reimbursement = segment
            .near_lines()
            .iter()
            .find_map(|line| REIMBURSEMENT_LINE.captures(line))
            .and_then(|caps| super::rules::parse_amount(&caps[1]));

        let vehicle = allocation.vehicle(&resolved.plate);
        vehicle.blocks += 1;
        if let Some(revenue) = amounts.first() {
            vehicle.gross_revenue += *revenue;
        }
        if let Some(pay) = amounts.get(1) {
            vehicle.driver_pay += *pay;
        }
        // Fuel comes from a labeled sub-figure on the block or the line
        // right after it; a third bare amount is the degraded form.
        if let Some(fuel) = labeled_fuel.or_else(|| amounts.get(2).copied()) {
            vehicle.fuel += fuel;
        }
        if let Some(reimbursed) = reimbursement {
            vehicle.reimbursement += reimbursed;
        }
        if vehicle.driver_name.is_none() {
            vehicle.driver_name = driver;
        }
    }

    allocation
}

/// Split document-level expense categories across the allocated
/// vehicles, returned per plate in allocation order.
///
/// Shared fixed costs (insurance, safety, prepass, IFTA) divide evenly.
/// The dispatch fee divides proportional to each vehicle's share of
/// gross revenue. The payroll fee is recomputed per vehicle from its own
/// driver pay. Everything else is a one-off charge against the
/// settlement as a whole and lands on the first vehicle.
pub fn split_expenses(
    allocation: &Allocation,
    document_categories: &BTreeMap<ExpenseCategory, Decimal>,
    config: &EngineConfig,
) -> BTreeMap<String, BTreeMap<ExpenseCategory, Decimal>> {
    let mut split: BTreeMap<String, BTreeMap<ExpenseCategory, Decimal>> = allocation
        .order
        .iter()
        .map(|plate| (plate.clone(), BTreeMap::new()))
        .collect();

    let count = Decimal::from(allocation.order.len().max(1));
    let total_gross: Decimal = allocation
        .vehicles
        .values()
        .map(|v| v.gross_revenue)
        .sum();

    for plate in &allocation.order {
        let acc = &allocation.vehicles[plate];
        let Some(categories) = split.get_mut(plate) else {
            continue;
        };

        if acc.fuel > Decimal::ZERO {
            categories.insert(ExpenseCategory::Fuel, acc.fuel);
        }
        if acc.driver_pay > Decimal::ZERO {
            categories.insert(ExpenseCategory::DriverPay, acc.driver_pay);
            let fee = (acc.driver_pay * config.fees.payroll_fee_rate).round_dp(2);
            if fee > Decimal::ZERO {
                categories.insert(ExpenseCategory::PayrollFee, fee);
            }
        }
    }

    for (category, total) in document_categories {
        match category {
            // Covered by per-vehicle accumulators above.
            ExpenseCategory::Fuel | ExpenseCategory::DriverPay | ExpenseCategory::PayrollFee => {}

            c if c.is_shared_fixed() => {
                let share = *total / count;
                for plate in &allocation.order {
                    if let Some(categories) = split.get_mut(plate) {
                        categories.insert(*category, share);
                    }
                }
            }

            ExpenseCategory::DispatchFee => {
                for plate in &allocation.order {
                    let share = if total_gross > Decimal::ZERO {
                        (*total * allocation.vehicles[plate].gross_revenue / total_gross)
                            .round_dp(2)
                    } else {
                        (*total / count).round_dp(2)
                    };
                    if let Some(categories) = split.get_mut(plate) {
                        categories.insert(*category, share);
                    }
                }
            }

            // One-off charges belong to the first vehicle.
            _ => {
                if let Some(first) = allocation.first_plate() {
                    if let Some(categories) = split.get_mut(first) {
                        let entry = categories.entry(*category).or_insert(Decimal::ZERO);
                        *entry += *total;
                    }
                }
            }
        }
    }

    split
}

/// Fall back to document-level fuel when no block carried a fuel
/// sub-figure: distribute by revenue share so per-vehicle profit still
/// reflects the cost of earning it.
pub fn distribute_missing_fuel(
    allocation: &Allocation,
    split: &mut BTreeMap<String, BTreeMap<ExpenseCategory, Decimal>>,
    document_fuel: Decimal,
) {
    let any_fuel = split
        .values()
        .any(|categories| categories.contains_key(&ExpenseCategory::Fuel));
    if any_fuel || document_fuel <= Decimal::ZERO {
        return;
    }

    let total_gross: Decimal = allocation
        .vehicles
        .values()
        .map(|v| v.gross_revenue)
        .sum();
    let count = Decimal::from(allocation.order.len().max(1));

    for plate in &allocation.order {
        let share = if total_gross > Decimal::ZERO {
            (document_fuel * allocation.vehicles[plate].gross_revenue / total_gross).round_dp(2)
        } else {
            (document_fuel / count).round_dp(2)
        };
        if let Some(categories) = split.get_mut(plate) {
            categories.insert(ExpenseCategory::Fuel, share);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn d(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    const TWO_TRUCKS: &str = "\
NBM Transport LLC
Plate#: VW9327 VW9328
B-1A2B John Smith VW9327 $700.00 $200.00 Fuel $88.10
B-3C4D John Smith VW9327 $650.00 $180.00 Fuel $75.00
B-5E6F Maria Lopez VW9328 $650.00 $190.00
Fuel $90.00
Insurance $700.00
";

    #[test]
    fn test_blocks_attributed_per_vehicle() {
        let config = EngineConfig::default();
        let allocation = allocate_blocks(TWO_TRUCKS, &config);

        assert_eq!(allocation.order, vec!["VW9327", "VW9328"]);

        let a = &allocation.vehicles["VW9327"];
        assert_eq!(a.blocks, 2);
        assert_eq!(a.gross_revenue, d("1350.00"));
        assert_eq!(a.driver_pay, d("380.00"));
        assert_eq!(a.fuel, d("163.10"));
        assert_eq!(a.driver_name.as_deref(), Some("John Smith"));

        let b = &allocation.vehicles["VW9328"];
        assert_eq!(b.blocks, 1);
        assert_eq!(b.gross_revenue, d("650.00"));
        // Labeled fuel on the continuation line.
        assert_eq!(b.fuel, d("90.00"));
    }

    #[test]
    fn test_corrupted_block_recovered() {
        let config = EngineConfig::default();
        let text = "B-9X8Y NaVpWpe9r327 $500.00 $150.00";
        let allocation = allocate_blocks(text, &config);
        assert_eq!(allocation.order, vec!["VW9327"]);
        assert_eq!(allocation.vehicles["VW9327"].gross_revenue, d("500.00"));
    }

    #[test]
    fn test_driver_recency_fallback() {
        let config = EngineConfig::default();
        let text = "\
B-1 John Smith VW9327 $700.00 $200.00
B-2 John Smith $650.00 $180.00
";
        let allocation = allocate_blocks(text, &config);
        // Second block has no plate; the driver's last vehicle takes it.
        assert_eq!(allocation.vehicles["VW9327"].blocks, 2);
        assert_eq!(allocation.vehicles["VW9327"].gross_revenue, d("1350.00"));
    }

    #[test]
    fn test_unknown_plate_block_excluded() {
        let config = EngineConfig::default();
        let text = "B-1 Alex Brown ZZ9999 $700.00";
        let allocation = allocate_blocks(text, &config);
        assert!(allocation.vehicles.is_empty());
    }

    #[test]
    fn test_first_plate_fallback() {
        let config = EngineConfig::default();
        let text = "\
B-1 John Smith VW9327 $700.00 $200.00
B-2 Maria Lopez $650.00 $180.00
";
        let allocation = allocate_blocks(text, &config);
        // Unresolvable block lands on the first known vehicle.
        assert_eq!(allocation.vehicles["VW9327"].blocks, 2);
    }

    #[test]
    fn test_shared_costs_split_evenly() {
        let config = EngineConfig::default();
        let allocation = allocate_blocks(TWO_TRUCKS, &config);

        let mut document = BTreeMap::new();
        document.insert(ExpenseCategory::Insurance, d("700.00"));

        let split = split_expenses(&allocation, &document, &config);
        assert_eq!(split["VW9327"][&ExpenseCategory::Insurance], d("350.00"));
        assert_eq!(split["VW9328"][&ExpenseCategory::Insurance], d("350.00"));
    }

    #[test]
    fn test_dispatch_fee_split_by_revenue_share() {
        let config = EngineConfig::default();
        let allocation = allocate_blocks(TWO_TRUCKS, &config);

        let mut document = BTreeMap::new();
        document.insert(ExpenseCategory::DispatchFee, d("200.00"));

        let split = split_expenses(&allocation, &document, &config);
        // VW9327 earned 1350 of 2000 gross.
        assert_eq!(split["VW9327"][&ExpenseCategory::DispatchFee], d("135.00"));
        assert_eq!(split["VW9328"][&ExpenseCategory::DispatchFee], d("65.00"));
    }

    #[test]
    fn test_payroll_fee_recomputed_per_vehicle() {
        let config = EngineConfig::default();
        let allocation = allocate_blocks(TWO_TRUCKS, &config);
        let split = split_expenses(&allocation, &BTreeMap::new(), &config);

        // 6.5% of each vehicle's own driver pay.
        assert_eq!(split["VW9327"][&ExpenseCategory::PayrollFee], d("24.70"));
        assert_eq!(split["VW9328"][&ExpenseCategory::PayrollFee], d("12.35"));
    }

    #[test]
    fn test_one_off_charges_go_to_first_vehicle() {
        let config = EngineConfig::default();
        let allocation = allocate_blocks(TWO_TRUCKS, &config);

        let mut document = BTreeMap::new();
        document.insert(ExpenseCategory::TruckParking, d("50.00"));

        let split = split_expenses(&allocation, &document, &config);
        assert_eq!(split["VW9327"][&ExpenseCategory::TruckParking], d("50.00"));
        assert!(!split["VW9328"].contains_key(&ExpenseCategory::TruckParking));
    }

    #[test]
    fn test_summary_fuel_total_not_charged_to_last_block() {
        let config = EngineConfig::default();
        let text = "\
B-1 John Smith VW9327 $700.00 $200.00
B-2 Maria Lopez VW9328 $300.00 $90.00
Total Fuel $300.00
Total Driver's Pay $290.00
";
        let allocation = allocate_blocks(text, &config);
        // The document total belongs to the statement, not the block
        // that happens to precede it.
        assert_eq!(allocation.vehicles["VW9328"].fuel, Decimal::ZERO);
        assert_eq!(allocation.vehicles["VW9327"].fuel, Decimal::ZERO);
    }

    #[test]
    fn test_summary_reimbursement_not_credited_to_last_block() {
        let config = EngineConfig::default();
        let text = "\
B-1 John Smith VW9327 $700.00 $200.00
B-2 Maria Lopez VW9328 $300.00 $90.00
Total Fuel $300.00
Reimbursement $50.00
";
        let allocation = allocate_blocks(text, &config);
        assert_eq!(allocation.vehicles["VW9328"].reimbursement, Decimal::ZERO);
        assert_eq!(allocation.vehicles["VW9327"].reimbursement, Decimal::ZERO);
    }

    #[test]
    fn test_block_attached_sub_figures_still_count() {
        let config = EngineConfig::default();
        let text = "\
B-1 John Smith VW9327 $700.00 $200.00
Fuel $80.00
B-2 Maria Lopez VW9328 $300.00 $90.00
Reimbursement $25.00
";
        let allocation = allocate_blocks(text, &config);
        // Sub-figures on the line right after a block stay with it.
        assert_eq!(allocation.vehicles["VW9327"].fuel, d("80.00"));
        assert_eq!(allocation.vehicles["VW9328"].reimbursement, d("25.00"));
    }

    #[test]
    fn test_fuel_two_lines_below_block_ignored() {
        let config = EngineConfig::default();
        let text = "\
B-1 John Smith VW9327 $700.00 $200.00
some note line
Fuel $80.00
";
        let allocation = allocate_blocks(text, &config);
        assert_eq!(allocation.vehicles["VW9327"].fuel, Decimal::ZERO);
    }

    #[test]
    fn test_missing_fuel_distributed_by_revenue() {
        let config = EngineConfig::default();
        let text = "\
B-1 John Smith VW9327 $700.00
B-2 Maria Lopez VW9328 $300.00
";
        let allocation = allocate_blocks(text, &config);
        let mut split = split_expenses(&allocation, &BTreeMap::new(), &config);
        distribute_missing_fuel(&allocation, &mut split, d("100.00"));

        assert_eq!(split["VW9327"][&ExpenseCategory::Fuel], d("70.00"));
        assert_eq!(split["VW9328"][&ExpenseCategory::Fuel], d("30.00"));
    }
}
