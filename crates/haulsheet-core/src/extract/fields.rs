//! Per-layout field extraction rule sets.
//!
//! Each scalar field gets an ordered cascade of named rules; the first
//! rule that matches wins and its name travels with the value. Missing
//! optional fields resolve to `None`, never zero: zero is a claim the
//! document made, unset means "not reported".

use lazy_static::lazy_static;
use rust_decimal::Decimal;
use tracing::trace;

use super::format::StatementLayout;
use super::rules::dates::{self, PeriodDates};
use super::rules::patterns::{
    BLOCK_ID, PLATE_FALLBACK_TOKEN, PLATE_HEADER, PLATE_TOKEN, TABLE_ROW_MILES, TABLE_ROW_STOPS,
};
use super::rules::{first_amount, parse_amount, FieldRule, RuleMatch};

lazy_static! {
    static ref PAYSTUB_GROSS: Vec<FieldRule> = vec![FieldRule::new(
        "gross_pay_labeled",
        r"(?i)Gross Pay\s+\$?([\d,]+\.?\d*)"
    )];

    static ref PAYSTUB_NET: Vec<FieldRule> = vec![FieldRule::new(
        "net_pay_labeled",
        r"(?i)Net Pay\s+\$?([\d,]+\.?\d*)"
    )];

    // Income sheet summary: "SUMMARY GROSS 795.0 ($ 2,119.07) ..." where
    // the first parenthesized amount is the gross revenue.
    static ref SHEET_GROSS: Vec<FieldRule> = vec![
        FieldRule::new(
            "summary_gross_paren",
            r"(?i)SUMMARY GROSS[^\n]*?\(\$\s*([\d,]+\.?\d*)\)"
        ),
        FieldRule::new(
            "summary_gross_plain",
            r"(?i)SUMMARY GROSS[^\n]*\$\s*([\d,]+\.?\d*)"
        ),
    ];

    static ref SHEET_NET: Vec<FieldRule> = vec![
        FieldRule::new(
            "paid_to_driver_paren",
            r"(?i)PAID TO DRIVER[^\n]*\(\$\s*([\d,]+\.?\d*)\)"
        ),
        FieldRule::new(
            "paid_to_driver_plain",
            r"(?i)PAID TO DRIVER[^\n]*\$\s*([\d,]+\.?\d*)"
        ),
    ];

    static ref SHEET_STOPS_FALLBACK: Vec<FieldRule> =
        vec![FieldRule::new("stops_labeled", r"(?i)STOPS\s+(\d+)")];

    static ref SHEET_MILES_FALLBACK: Vec<FieldRule> =
        vec![FieldRule::new("load_miles_labeled", r"(?i)LOAD MILES\s+([\d,]+\.?\d*)")];

    static ref SHEET_TRUCK_NUMBER: Vec<FieldRule> =
        vec![FieldRule::new("truck_number", r"(?i)TRUCK#\s*:\s*(\d+)")];

    static ref SHEET_PLATE_COMBO: Vec<FieldRule> =
        vec![FieldRule::new("plate_combo", r"\b([A-Z]{1,3}\d{3,6})\s*#(\d+)")];
}

/// Raw scalar values pulled from a document, each tagged with the rule
/// that produced it.
#[derive(Debug, Clone, Default)]
pub struct ExtractedFields {
    pub period: PeriodDates,
    pub license_plate: Option<RuleMatch<String>>,
    pub gross_revenue: Option<RuleMatch<Decimal>>,
    pub net_profit: Option<RuleMatch<Decimal>>,
    pub miles_driven: Option<RuleMatch<Decimal>>,
    pub blocks_delivered: Option<RuleMatch<u32>>,
}

/// Run the layout's rule set over the full text.
pub fn extract_fields(text: &str, layout: StatementLayout) -> ExtractedFields {
    let fields = match layout {
        StatementLayout::Paystub => extract_paystub(text),
        StatementLayout::IncomeSheet => extract_income_sheet(text),
    };

    trace!(
        gross = ?fields.gross_revenue,
        net = ?fields.net_profit,
        plate = ?fields.license_plate,
        "field extraction complete"
    );

    fields
}

fn extract_paystub(text: &str) -> ExtractedFields {
    ExtractedFields {
        period: dates::extract_paystub_period(text),
        license_plate: paystub_plate(text),
        gross_revenue: first_amount(&PAYSTUB_GROSS, text),
        net_profit: first_amount(&PAYSTUB_NET, text),
        // Paystubs do not report distance.
        miles_driven: None,
        blocks_delivered: paystub_blocks(text),
    }
}

fn extract_income_sheet(text: &str) -> ExtractedFields {
    ExtractedFields {
        period: dates::extract_income_sheet_period(text),
        license_plate: income_sheet_plate(text),
        gross_revenue: first_amount(&SHEET_GROSS, text),
        net_profit: first_amount(&SHEET_NET, text),
        miles_driven: income_sheet_miles(text),
        blocks_delivered: income_sheet_stops(text),
    }
}

/// Paystub plate: the "Plate#:" header line, taking the last plate token
/// (the line may carry a truck number ahead of the plate). Degrades to
/// the last loose alphanumeric token on the same line.
fn paystub_plate(text: &str) -> Option<RuleMatch<String>> {
    let caps = PLATE_HEADER.captures(text)?;
    let header = caps[1].trim();

    let plate_tokens: Vec<String> = PLATE_TOKEN
        .captures_iter(header)
        .map(|c| c[1].to_uppercase())
        .collect();
    if let Some(plate) = plate_tokens.last() {
        return Some(RuleMatch {
            value: plate.clone(),
            rule: "plate_header_token",
        });
    }

    let fallback_tokens: Vec<String> = PLATE_FALLBACK_TOKEN
        .captures_iter(header)
        .map(|c| c[1].to_uppercase())
        .collect();
    fallback_tokens.last().map(|token| RuleMatch {
        value: token.clone(),
        rule: "plate_header_fallback",
    })
}

/// Income sheet plate: "TRUCK#: 418" paired with a plate token elsewhere,
/// then "VW1503 #418" combos, then any plate token in the text.
fn income_sheet_plate(text: &str) -> Option<RuleMatch<String>> {
    if let Some(truck) = SHEET_TRUCK_NUMBER[0].find(text) {
        if let Some(caps) = PLATE_TOKEN.captures(text) {
            return Some(RuleMatch {
                value: caps[1].to_uppercase(),
                rule: "truck_number_with_plate",
            });
        }
        // No plate anywhere; the truck number is the only identity.
        return Some(RuleMatch {
            value: format!("#{truck}"),
            rule: "truck_number_only",
        });
    }

    if let Some(plate) = SHEET_PLATE_COMBO[0].find(text) {
        return Some(RuleMatch {
            value: plate.to_uppercase(),
            rule: "plate_truck_combo",
        });
    }

    PLATE_TOKEN.captures(text).map(|caps| RuleMatch {
        value: caps[1].to_uppercase(),
        rule: "any_plate_token",
    })
}

/// Paystub block count: the number of block markers on the page.
fn paystub_blocks(text: &str) -> Option<RuleMatch<u32>> {
    let count = BLOCK_ID.find_iter(text).count() as u32;
    if count == 0 {
        return None;
    }
    Some(RuleMatch {
        value: count,
        rule: "block_marker_count",
    })
}

/// Income sheet stop count: the stops column of the table row, then a
/// labeled "STOPS n" in the summary.
fn income_sheet_stops(text: &str) -> Option<RuleMatch<u32>> {
    if let Some(caps) = TABLE_ROW_STOPS.captures(text) {
        if let Ok(stops) = caps[3].parse() {
            return Some(RuleMatch {
                value: stops,
                rule: "table_row_stops",
            });
        }
    }

    let m = super::rules::first_match(&SHEET_STOPS_FALLBACK, text)?;
    m.value.parse().ok().map(|value| RuleMatch {
        value,
        rule: m.rule,
    })
}

/// Income sheet miles: the miles column right before the first dollar
/// amount on the table row, then a labeled "LOAD MILES" summary figure.
fn income_sheet_miles(text: &str) -> Option<RuleMatch<Decimal>> {
    if let Some(caps) = TABLE_ROW_MILES.captures(text) {
        if let Some(miles) = parse_amount(&caps[1]) {
            return Some(RuleMatch {
                value: miles,
                rule: "table_row_miles",
            });
        }
    }

    first_amount(&SHEET_MILES_FALLBACK, text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn d(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    const PAYSTUB: &str = "277 Logistics\n\
        Pay Period: 12/28/2024\n\
        Plate#: 418 AB1234\n\
        B-1A2B Smith Start of Load 12/23/2024 $700.00\n\
        B-3C4D Smith Start of Load 12/24/2024 $650.00\n\
        B-5E6F Smith Start of Load 12/26/2024 $650.00\n\
        Gross Pay $2,000.00\n\
        Net Pay $1,500.00\n";

    const INCOME_SHEET: &str = "OWNER OPERATOR INCOME SHEET\n\
        TRUCK# : 418 VW1503\n\
        Date Period : 12/22-12/28/2024\n\
        12/27-12/29/2024 TFC9-CLT2 CLT5 7 795.0 ($ 2,119.07)\n\
        SUMMARY GROSS 795.0 ($ 2,119.07) ($ 600.00) ($ 517.94)\n\
        PAID TO DRIVER ($ 295.22)\n";

    #[test]
    fn test_paystub_fields() {
        let fields = extract_fields(PAYSTUB, StatementLayout::Paystub);

        let gross = fields.gross_revenue.unwrap();
        assert_eq!(gross.value, d("2000.00"));
        assert_eq!(gross.rule, "gross_pay_labeled");

        assert_eq!(fields.net_profit.unwrap().value, d("1500.00"));

        let plate = fields.license_plate.unwrap();
        assert_eq!(plate.value, "AB1234");
        assert_eq!(plate.rule, "plate_header_token");

        let blocks = fields.blocks_delivered.unwrap();
        assert_eq!(blocks.value, 3);
        assert_eq!(blocks.rule, "block_marker_count");

        assert!(fields.miles_driven.is_none());
    }

    #[test]
    fn test_paystub_plate_last_token_wins() {
        // Header carries a truck number ahead of the plate.
        let plate = paystub_plate("Plate#: 418 VW9328\n").unwrap();
        assert_eq!(plate.value, "VW9328");
    }

    #[test]
    fn test_paystub_plate_fallback_token() {
        // Token does not follow the letters-then-digits plate shape.
        let plate = paystub_plate("Plate#: 4T8K1\n").unwrap();
        assert_eq!(plate.value, "4T8K1");
        assert_eq!(plate.rule, "plate_header_fallback");
    }

    #[test]
    fn test_income_sheet_fields() {
        let fields = extract_fields(INCOME_SHEET, StatementLayout::IncomeSheet);

        let gross = fields.gross_revenue.unwrap();
        assert_eq!(gross.value, d("2119.07"));
        assert_eq!(gross.rule, "summary_gross_paren");

        let net = fields.net_profit.unwrap();
        assert_eq!(net.value, d("295.22"));
        assert_eq!(net.rule, "paid_to_driver_paren");

        let plate = fields.license_plate.unwrap();
        assert_eq!(plate.value, "VW1503");
        assert_eq!(plate.rule, "truck_number_with_plate");

        assert_eq!(fields.blocks_delivered.unwrap().value, 7);
        assert_eq!(fields.miles_driven.unwrap().value, d("795.0"));
    }

    #[test]
    fn test_income_sheet_stops_fallback() {
        let m = income_sheet_stops("SUMMARY STOPS 7 LOAD MILES 795.0").unwrap();
        assert_eq!(m.value, 7);
        assert_eq!(m.rule, "stops_labeled");
    }

    #[test]
    fn test_missing_fields_stay_unset() {
        let fields = extract_fields("nothing useful", StatementLayout::Paystub);
        assert!(fields.gross_revenue.is_none());
        assert!(fields.blocks_delivered.is_none());
        assert!(fields.miles_driven.is_none());
        assert!(fields.license_plate.is_none());
    }
}
