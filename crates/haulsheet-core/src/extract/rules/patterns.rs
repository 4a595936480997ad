//! Common regex patterns for settlement statement extraction.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    // License plate token: 2-3 letters followed by 3-6 digits.
    pub static ref PLATE_TOKEN: Regex = Regex::new(
        r"(?i)\b([A-Z]{2,3}\d{3,6})\b"
    ).unwrap();

    // Plate header line: "Plate#: VW9327 VW9328"
    pub static ref PLATE_HEADER: Regex = Regex::new(
        r"(?i)Plate#:\s*([^\n]+)"
    ).unwrap();

    // Fallback alphanumeric token on a plate header line.
    pub static ref PLATE_FALLBACK_TOKEN: Regex = Regex::new(
        r"\b([A-Z0-9]{4,8})\b"
    ).unwrap();

    // Block/load marker anchoring one unit of revenue work: "B-XXXXX"
    pub static ref BLOCK_ID: Regex = Regex::new(
        r"(?i)\bB-([A-Z0-9]+)\b"
    ).unwrap();

    // Plate concatenated with adjacent free text: "VereenVW1503"
    pub static ref CONCATENATED_PLATE: Regex = Regex::new(
        r"([A-Z][a-z]+)([A-Z]{2,3}\d{3,6})"
    ).unwrap();

    // Capitalized word runs, used for driver names on block lines.
    pub static ref NAME_WORD: Regex = Regex::new(
        r"\b([A-Z][a-z]+)\b"
    ).unwrap();

    // Monetary amount, optionally $-prefixed: "$2,119.07" / "600.00"
    pub static ref MONEY: Regex = Regex::new(
        r"\$?\s*([\d,]+\.\d{1,2})\b"
    ).unwrap();

    // Accounting-style parenthesized amount: "($ 2,119.07)". The
    // parentheses mean "deduction", not a negative sign.
    pub static ref PAREN_MONEY: Regex = Regex::new(
        r"\(\$\s*([\d,]+\.?\d*)\)"
    ).unwrap();

    // Income sheet period: "Date Period : 12/22-12/28/2024"
    pub static ref DATE_PERIOD_RANGE: Regex = Regex::new(
        r"(?i)Date Period\s*:\s*(\d{1,2}/\d{1,2})-(\d{1,2}/\d{1,2})/(\d{4})"
    ).unwrap();

    // Paystub period: "Pay Period: 12/28/2024"
    pub static ref PAY_PERIOD: Regex = Regex::new(
        r"(?i)Pay Period:\s*(\d{1,2}/\d{1,2}/\d{4})"
    ).unwrap();

    // Any bare M/D/Y date.
    pub static ref DATE_MDY: Regex = Regex::new(
        r"\b(\d{1,2})/(\d{1,2})/(\d{4})\b"
    ).unwrap();

    // Income sheet table row: "12/27-12/29/2024 TFC9-CLT2 CLT5 7 795.0 ($ 2,119.07)"
    pub static ref TABLE_ROW_STOPS: Regex = Regex::new(
        r"(?i)\d{1,2}/\d{1,2}-\d{1,2}/\d{1,2}/\d{4}[^\n]*?([A-Z0-9-]+)\s+([A-Z0-9]+)\s+(\d+)"
    ).unwrap();

    pub static ref TABLE_ROW_MILES: Regex = Regex::new(
        r"(?i)\d{1,2}/\d{1,2}-\d{1,2}/\d{1,2}/\d{4}[^\n]*?\s+(\d+\.?\d*)\s+\(\$"
    ).unwrap();

    // Reimbursement line attached to block rows or the summary.
    pub static ref REIMBURSEMENT_LINE: Regex = Regex::new(
        r"(?i)Reimbursement[^\n]*?\$?\s*([\d,]+\.\d{1,2})\b"
    ).unwrap();

    // Fuel sub-figure on or after a block line.
    pub static ref FUEL_LABELED: Regex = Regex::new(
        r"(?i)\bFuel\s+\$?\s*([\d,]+\.\d{1,2})\b"
    ).unwrap();

    // Document summary label opening the totals section after the block
    // list. Ends block-segment accumulation.
    pub static ref SUMMARY_LABEL: Regex = Regex::new(
        r"(?i)^\s*(Total|Gross Pay|Net Pay|Summary|Insurance|Safety|Prepass|IFTA|Dispatch|Payroll|Deductions|Service|Truck Parking)\b"
    ).unwrap();

    // Document totals on multi-vehicle statements.
    pub static ref TOTAL_FUEL: Regex = Regex::new(
        r"(?i)\bTotal Fuel\s+\$?\s*([\d,]+\.\d{1,2})\b"
    ).unwrap();

    pub static ref TOTAL_DRIVER_PAY: Regex = Regex::new(
        r"(?i)\bTotal Driver'?s? Pay\s+\$?\s*([\d,]+\.\d{1,2})\b"
    ).unwrap();
}

/// Expense-label keywords that look like plates after uppercasing; never
/// treated as identifiers.
pub const PLATE_FALSE_POSITIVES: [&str; 6] = [
    "IFTA", "PREPASS", "SAFETY", "INSURANCE", "DISPATCH", "PAYROLL",
];
