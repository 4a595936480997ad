//! Pay-period date extraction.

use chrono::NaiveDate;

use super::patterns::{DATE_MDY, DATE_PERIOD_RANGE, PAY_PERIOD};

/// Extracted pay-period dates. Fields stay `None` when the document does
/// not state them; a missing period start is never guessed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PeriodDates {
    pub settlement_date: Option<NaiveDate>,
    pub week_start: Option<NaiveDate>,
    pub week_end: Option<NaiveDate>,
}

fn parse_mdy(month: &str, day: &str, year: &str) -> Option<NaiveDate> {
    let month: u32 = month.parse().ok()?;
    let day: u32 = day.parse().ok()?;
    let year: i32 = year.parse().ok()?;
    NaiveDate::from_ymd_opt(year, month, day)
}

fn parse_mdy_str(s: &str) -> Option<NaiveDate> {
    let caps = DATE_MDY.captures(s)?;
    parse_mdy(&caps[1], &caps[2], &caps[3])
}

/// Income sheet period: "Date Period : 12/22-12/28/2024". The range
/// shares one year; settlement date is the period end.
pub fn extract_income_sheet_period(text: &str) -> PeriodDates {
    let mut period = PeriodDates::default();

    if let Some(caps) = DATE_PERIOD_RANGE.captures(text) {
        let year = &caps[3];
        let start = format!("{}/{}", &caps[1], year);
        let end = format!("{}/{}", &caps[2], year);
        period.week_start = parse_mdy_str(&start);
        period.week_end = parse_mdy_str(&end);
        period.settlement_date = period.week_end;
    }

    period
}

/// Paystub period: "Pay Period: 12/28/2024" names only the period end.
/// The period start is inferred as the earliest load date in the table
/// that does not fall after the settlement date.
pub fn extract_paystub_period(text: &str) -> PeriodDates {
    let mut period = PeriodDates::default();

    if let Some(caps) = PAY_PERIOD.captures(text) {
        period.settlement_date = parse_mdy_str(&caps[1]);
        period.week_end = period.settlement_date;
    }

    let mut load_dates: Vec<NaiveDate> = DATE_MDY
        .captures_iter(text)
        .filter_map(|caps| parse_mdy(&caps[1], &caps[2], &caps[3]))
        .collect();
    load_dates.sort_unstable();

    if let Some(settlement) = period.settlement_date {
        period.week_start = load_dates.into_iter().find(|d| *d < settlement);
    }

    period
}
