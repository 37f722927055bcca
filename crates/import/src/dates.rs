use calamine::Data;
use chrono::{Duration, NaiveDate};
use thiserror::Error;

/// A date cell whose value could not be interpreted. Carries the raw cell
/// text for the user-facing message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid date value: '{0}'")]
pub struct InvalidDate(pub String);

// Excel serial day 0. Serial 1 is 1900-01-01, and the epoch is shifted two
// days back to absorb the fictional 1900-02-29 that Excel inherited from
// Lotus 1-2-3.
fn excel_epoch() -> NaiveDate {
    NaiveDate::from_ymd_opt(1899, 12, 30).unwrap()
}

/// Strictly parses a spreadsheet date cell.
///
/// An empty cell is `Ok(None)` — absence is the row's problem, not the
/// sheet's. Anything present must be an Excel serial number, an ISO
/// `YYYY-MM-DD` string or a `DD/MM/YYYY` string; impossible calendar dates
/// like February 31st are rejected rather than rolled over.
pub fn parse_date_cell(cell: &Data) -> Result<Option<NaiveDate>, InvalidDate> {
    match cell {
        Data::Empty => Ok(None),
        Data::Float(serial) => from_serial(*serial).map(Some),
        Data::Int(serial) => from_serial(*serial as f64).map(Some),
        Data::DateTime(dt) => from_serial(dt.as_f64()).map(Some),
        Data::String(text) => {
            let trimmed = text.trim();
            if trimmed.is_empty() {
                return Ok(None);
            }
            parse_date_text(trimmed)
                .map(Some)
                .ok_or_else(|| InvalidDate(trimmed.to_string()))
        }
        other => Err(InvalidDate(other.to_string())),
    }
}

fn from_serial(serial: f64) -> Result<NaiveDate, InvalidDate> {
    // Whole days only; the time fraction is irrelevant to a statement line.
    let days = serial.trunc();
    if !(1.0..=2_958_465.0).contains(&days) || days == 60.0 {
        return Err(InvalidDate(serial.to_string()));
    }
    // Serials below 60 predate the phantom leap day, so the shifted epoch
    // undercounts them by one; serial 60 is the phantom day itself.
    let offset = if days < 60.0 { days as i64 + 1 } else { days as i64 };
    excel_epoch()
        .checked_add_signed(Duration::days(offset))
        .ok_or_else(|| InvalidDate(serial.to_string()))
}

fn parse_date_text(text: &str) -> Option<NaiveDate> {
    let bytes = text.as_bytes();
    if bytes.len() != 10 {
        return None;
    }

    // ISO YYYY-MM-DD, zero-padded.
    if bytes[4] == b'-' && bytes[7] == b'-' {
        let year = digits(&text[0..4])?;
        let month = digits(&text[5..7])?;
        let day = digits(&text[8..10])?;
        return NaiveDate::from_ymd_opt(year as i32, month, day);
    }

    // DD/MM/YYYY, zero-padded.
    if bytes[2] == b'/' && bytes[5] == b'/' {
        let day = digits(&text[0..2])?;
        let month = digits(&text[3..5])?;
        let year = digits(&text[6..10])?;
        return NaiveDate::from_ymd_opt(year as i32, month, day);
    }

    None
}

fn digits(s: &str) -> Option<u32> {
    if s.bytes().all(|b| b.is_ascii_digit()) {
        s.parse().ok()
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn empty_cell_is_none_not_error() {
        assert_eq!(parse_date_cell(&Data::Empty), Ok(None));
        assert_eq!(parse_date_cell(&Data::String("   ".into())), Ok(None));
    }

    #[test]
    fn excel_serial_dates() {
        // 44927 is 2023-01-01.
        assert_eq!(parse_date_cell(&Data::Int(44927)), Ok(Some(date(2023, 1, 1))));
        assert_eq!(
            parse_date_cell(&Data::Float(45000.73)),
            Ok(Some(date(2023, 3, 15)))
        );
        assert!(parse_date_cell(&Data::Float(-3.0)).is_err());
        assert!(parse_date_cell(&Data::Float(0.5)).is_err());
    }

    #[test]
    fn serials_around_the_phantom_leap_day() {
        assert_eq!(parse_date_cell(&Data::Int(1)), Ok(Some(date(1900, 1, 1))));
        assert_eq!(parse_date_cell(&Data::Int(59)), Ok(Some(date(1900, 2, 28))));
        // Serial 60 is 1900-02-29, a day that never happened.
        assert!(parse_date_cell(&Data::Int(60)).is_err());
        assert_eq!(parse_date_cell(&Data::Int(61)), Ok(Some(date(1900, 3, 1))));
    }

    #[test]
    fn iso_strings_must_be_zero_padded() {
        assert_eq!(
            parse_date_cell(&Data::String("2024-02-29".into())),
            Ok(Some(date(2024, 2, 29)))
        );
        assert!(parse_date_cell(&Data::String("2024-2-29".into())).is_err());
    }

    #[test]
    fn slash_strings_are_day_first() {
        assert_eq!(
            parse_date_cell(&Data::String("03/07/2025".into())),
            Ok(Some(date(2025, 7, 3)))
        );
    }

    #[test]
    fn impossible_calendar_dates_rejected() {
        assert_eq!(
            parse_date_cell(&Data::String("31/02/2024".into())),
            Err(InvalidDate("31/02/2024".into()))
        );
        assert!(parse_date_cell(&Data::String("2023-02-29".into())).is_err());
    }

    #[test]
    fn unsupported_cell_types_rejected() {
        assert!(parse_date_cell(&Data::Bool(true)).is_err());
        assert!(parse_date_cell(&Data::String("yesterday".into())).is_err());
    }
}
