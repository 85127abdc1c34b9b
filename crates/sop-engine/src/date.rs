//! `DD MONTH YYYY` creation dates
//!
//! Month names come from a fixed English table so parsing never depends on
//! the host locale. Month names match case-insensitively; abbreviations do not
//! match.

use chrono::{Datelike, Local, NaiveDate};
use thiserror::Error;

/// Expected format, as shown to the user
pub const DATE_FORMAT_HINT: &str = "DD MONTH YYYY";

/// Example value, as shown to the user
pub const DATE_EXAMPLE: &str = "02 MARCH 2025";

const MONTHS: [&str; 12] = [
    "JANUARY",
    "FEBRUARY",
    "MARCH",
    "APRIL",
    "MAY",
    "JUNE",
    "JULY",
    "AUGUST",
    "SEPTEMBER",
    "OCTOBER",
    "NOVEMBER",
    "DECEMBER",
];

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DateFormatError {
    #[error("Expected DD MONTH YYYY, got {0} part(s)")]
    WrongShape(usize),

    #[error("Date has leading or trailing whitespace")]
    SurroundingWhitespace,

    #[error("Invalid day: {0}")]
    InvalidDay(String),

    #[error("Unknown month name: {0}")]
    UnknownMonth(String),

    #[error("Invalid year: {0}")]
    InvalidYear(String),

    #[error("No such calendar date: {0}")]
    NotACalendarDate(String),
}

/// Parse a creation date such as `02 MARCH 2025`
///
/// The text goes into the document as typed, so surrounding whitespace is
/// rejected rather than trimmed.
pub fn parse_sop_date(text: &str) -> Result<NaiveDate, DateFormatError> {
    if text.trim() != text {
        return Err(DateFormatError::SurroundingWhitespace);
    }
    let parts: Vec<&str> = text.split_whitespace().collect();
    let [day, month, year] = parts.as_slice() else {
        return Err(DateFormatError::WrongShape(parts.len()));
    };

    if day.is_empty() || day.len() > 2 || !day.bytes().all(|b| b.is_ascii_digit()) {
        return Err(DateFormatError::InvalidDay(day.to_string()));
    }
    let day: u32 = day
        .parse()
        .map_err(|_| DateFormatError::InvalidDay(day.to_string()))?;

    let month_number = MONTHS
        .iter()
        .position(|m| m.eq_ignore_ascii_case(month))
        .ok_or_else(|| DateFormatError::UnknownMonth(month.to_string()))?
        + 1;

    if year.len() != 4 || !year.bytes().all(|b| b.is_ascii_digit()) || *year == "0000" {
        return Err(DateFormatError::InvalidYear(year.to_string()));
    }
    let year: i32 = year
        .parse()
        .map_err(|_| DateFormatError::InvalidYear(year.to_string()))?;

    NaiveDate::from_ymd_opt(year, month_number as u32, day)
        .ok_or_else(|| DateFormatError::NotACalendarDate(text.to_string()))
}

/// Canonical form: zero-padded day, uppercase month, four-digit year
pub fn format_sop_date(date: NaiveDate) -> String {
    format!(
        "{:02} {} {:04}",
        date.day(),
        MONTHS[date.month0() as usize],
        date.year()
    )
}

/// Today's local date in canonical form
pub fn today() -> String {
    format_sop_date(Local::now().date_naive())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_accepts_canonical_date() {
        let date = parse_sop_date("02 MARCH 2025").unwrap();
        assert_eq!(date, NaiveDate::from_ymd_opt(2025, 3, 2).unwrap());
    }

    #[test]
    fn test_month_is_case_insensitive() {
        assert!(parse_sop_date("02 March 2025").is_ok());
        assert!(parse_sop_date("2 march 2025").is_ok());
    }

    #[test]
    fn test_rejects_iso_date() {
        assert_eq!(
            parse_sop_date("2025-03-02"),
            Err(DateFormatError::WrongShape(1))
        );
    }

    #[test]
    fn test_rejects_day_out_of_range() {
        assert!(matches!(
            parse_sop_date("32 MARCH 2025"),
            Err(DateFormatError::NotACalendarDate(_))
        ));
        assert!(matches!(
            parse_sop_date("30 FEBRUARY 2025"),
            Err(DateFormatError::NotACalendarDate(_))
        ));
    }

    #[test]
    fn test_rejects_missing_year() {
        assert_eq!(
            parse_sop_date("02 MARCH"),
            Err(DateFormatError::WrongShape(2))
        );
    }

    #[test]
    fn test_rejects_abbreviated_month() {
        assert!(matches!(
            parse_sop_date("02 MAR 2025"),
            Err(DateFormatError::UnknownMonth(_))
        ));
    }

    #[test]
    fn test_rejects_short_year_and_long_day() {
        assert!(matches!(
            parse_sop_date("02 MARCH 25"),
            Err(DateFormatError::InvalidYear(_))
        ));
        assert!(matches!(
            parse_sop_date("002 MARCH 2025"),
            Err(DateFormatError::InvalidDay(_))
        ));
    }

    #[test]
    fn test_rejects_year_zero() {
        assert_eq!(
            parse_sop_date("01 JANUARY 0000"),
            Err(DateFormatError::InvalidYear("0000".to_string()))
        );
        assert!(parse_sop_date("01 JANUARY 0001").is_ok());
    }

    #[test]
    fn test_rejects_surrounding_whitespace() {
        for text in ["02 MARCH 2025 ", " 02 MARCH 2025", "\t02 MARCH 2025\n"] {
            assert_eq!(
                parse_sop_date(text),
                Err(DateFormatError::SurroundingWhitespace),
                "{text:?}"
            );
        }
        assert!(parse_sop_date("02  MARCH 2025").is_ok());
    }

    #[test]
    fn test_format_round_trips() {
        let date = NaiveDate::from_ymd_opt(2025, 12, 9).unwrap();
        assert_eq!(format_sop_date(date), "09 DECEMBER 2025");
        assert_eq!(parse_sop_date(&format_sop_date(date)).unwrap(), date);
    }
}
