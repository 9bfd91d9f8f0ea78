//! Input validation and wire-format helpers
//!
//! Dates travel as 8-digit day-month-year strings, times as 6-digit
//! hour-minute-second strings, and monetary amounts with exactly two
//! fractional digits.

use bigdecimal::{BigDecimal, RoundingMode};
use chrono::{NaiveDate, NaiveTime};

use crate::types::{LedgerError, LedgerResult};

const WIRE_DATE_FORMAT: &str = "%d%m%Y";
const WIRE_TIME_FORMAT: &str = "%H%M%S";

/// Validate that a raw PIN is 4 to 6 decimal digits
pub fn validate_pin(raw_pin: &str) -> LedgerResult<()> {
    let len = raw_pin.len();
    if !(4..=6).contains(&len) || !raw_pin.chars().all(|c| c.is_ascii_digit()) {
        return Err(LedgerError::Validation(
            "PIN must be 4-6 digits".to_string(),
        ));
    }
    Ok(())
}

/// Validate that a transfer amount is strictly positive
pub fn validate_positive_amount(amount: &BigDecimal) -> LedgerResult<()> {
    if *amount <= BigDecimal::from(0) {
        return Err(LedgerError::Validation(
            "Amount must be positive".to_string(),
        ));
    }
    Ok(())
}

/// Parse an 8-digit `ddmmyyyy` wire date
pub fn parse_wire_date(s: &str) -> LedgerResult<NaiveDate> {
    if s.len() != 8 || !s.chars().all(|c| c.is_ascii_digit()) {
        return Err(LedgerError::Validation(format!(
            "Date '{}' is not in ddmmyyyy format",
            s
        )));
    }
    NaiveDate::parse_from_str(s, WIRE_DATE_FORMAT)
        .map_err(|_| LedgerError::Validation(format!("Date '{}' is not a valid date", s)))
}

/// Format a date as `ddmmyyyy`
pub fn format_wire_date(date: NaiveDate) -> String {
    date.format(WIRE_DATE_FORMAT).to_string()
}

/// Format a time as `hhmmss`
pub fn format_wire_time(time: NaiveTime) -> String {
    time.format(WIRE_TIME_FORMAT).to_string()
}

/// Validate that a date range is not inverted
pub fn validate_date_range(from: NaiveDate, to: NaiveDate) -> LedgerResult<()> {
    if from > to {
        return Err(LedgerError::Validation(format!(
            "fromDate {} is after toDate {}",
            format_wire_date(from),
            format_wire_date(to)
        )));
    }
    Ok(())
}

/// Format a monetary amount with exactly two fractional digits
pub fn format_amount(amount: &BigDecimal) -> String {
    amount.with_scale_round(2, RoundingMode::HalfUp).to_string()
}

/// Last day of the given month
pub fn month_end(year: i32, month: u32) -> LedgerResult<NaiveDate> {
    let (next_year, next_month) = if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    };
    NaiveDate::from_ymd_opt(next_year, next_month, 1)
        .and_then(|d| d.pred_opt())
        .ok_or_else(|| LedgerError::Validation(format!("Invalid month {}-{}", year, month)))
}
