use calamine::{open_workbook_auto_from_rs, Data, Reader};
use chrono::NaiveDate;
use serde::Serialize;
use std::io::Cursor;
use thiserror::Error;

use heshbon_core::Money;

use crate::dates::{parse_date_cell, InvalidDate};

// ── Column aliases ────────────────────────────────────────────────────────────
// Hebrew bank exports first, English fallbacks after. Header matching is
// exact on the normalized header text; the first alias hit per canonical
// column wins, as does the leftmost matching column.

const DATE_ALIASES: &[&str] = &[
    "תאריך", "תאריך עסקה", "תאריך רכישה", "תאריך חיוב",
    "date", "transaction date", "purchase date",
];

const BUSINESS_NAME_ALIASES: &[&str] = &[
    "שם בית עסק", "בית עסק", "תיאור", "שם העסק", "פירוט",
    "merchant", "business name", "description", "name",
];

const AMOUNT_ALIASES: &[&str] = &[
    "סכום", "סכום חיוב", "סכום עסקה", "סכום בש\"ח", "חיוב",
    "amount", "charge", "debit", "transaction amount",
];

const CARD_LAST4_ALIASES: &[&str] = &[
    "4 ספרות אחרונות", "כרטיס", "מספר כרטיס", "last 4",
    "card", "card number", "card last 4",
];

const RAW_DESCRIPTION_ALIASES: &[&str] = &[
    "פירוט נוסף", "הערות", "תיאור נוסף", "remarks",
    "notes", "memo", "extra description",
];

// ── Output ────────────────────────────────────────────────────────────────────

/// One statement line lifted out of a workbook, before categorization and
/// before it is attached to a batch.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedTransaction {
    pub date: NaiveDate,
    pub business_name: String,
    pub amount: Money,
    pub card_last4: Option<String>,
    pub raw_description: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NormalizeOutcome {
    pub transactions: Vec<NormalizedTransaction>,
    /// Data rows dropped for missing a date, business name or amount.
    pub skipped_rows: usize,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum NormalizeError {
    #[error("not a valid Excel workbook")]
    InvalidFile,
    #[error("workbook has no sheets")]
    NoSheets,
    #[error("no header row found")]
    NoHeaderRow,
    #[error("required columns missing: {}", .0.join(", "))]
    MissingColumns(Vec<String>),
    #[error(transparent)]
    InvalidDate(#[from] InvalidDate),
    #[error("no transactions found in the workbook")]
    NoTransactions,
}

// ── Header mapping ────────────────────────────────────────────────────────────

#[derive(Debug)]
struct ColumnMap {
    date: usize,
    business_name: usize,
    amount: usize,
    card_last4: Option<usize>,
    raw_description: Option<usize>,
}

fn normalize_header(text: &str) -> String {
    text.trim()
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn find_column(headers: &[Data], aliases: &[&str]) -> Option<usize> {
    headers.iter().position(|h| {
        let norm = normalize_header(&h.to_string());
        aliases.iter().any(|a| normalize_header(a) == norm)
    })
}

fn build_column_map(headers: &[Data]) -> Result<ColumnMap, NormalizeError> {
    let date = find_column(headers, DATE_ALIASES);
    let business_name = find_column(headers, BUSINESS_NAME_ALIASES);
    let amount = find_column(headers, AMOUNT_ALIASES);

    let mut missing = Vec::new();
    if date.is_none() {
        missing.push("date".to_string());
    }
    if business_name.is_none() {
        missing.push("businessName".to_string());
    }
    if amount.is_none() {
        missing.push("amount".to_string());
    }
    if !missing.is_empty() {
        return Err(NormalizeError::MissingColumns(missing));
    }

    Ok(ColumnMap {
        date: date.unwrap(),
        business_name: business_name.unwrap(),
        amount: amount.unwrap(),
        card_last4: find_column(headers, CARD_LAST4_ALIASES),
        raw_description: find_column(headers, RAW_DESCRIPTION_ALIASES),
    })
}

// ── Cell cleanup ──────────────────────────────────────────────────────────────

/// Control characters become spaces, runs of whitespace collapse to one.
/// A cell that cleans down to nothing is absent.
fn clean_text(cell: &Data) -> Option<String> {
    if matches!(cell, Data::Empty) {
        return None;
    }
    let cleaned: String = cell
        .to_string()
        .chars()
        .map(|c| if c.is_control() { ' ' } else { c })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");
    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned)
    }
}

fn clean_amount(cell: &Data) -> Option<Money> {
    match cell {
        Data::Float(f) => Money::from_f64(*f),
        Data::Int(i) => Money::from_f64(*i as f64),
        Data::String(s) => {
            let stripped: String = s.chars().filter(|c| *c != ',' && !c.is_whitespace()).collect();
            if stripped.is_empty() {
                return None;
            }
            stripped.parse::<f64>().ok().and_then(Money::from_f64)
        }
        _ => None,
    }
}

fn is_empty_cell(cell: &Data) -> bool {
    matches!(cell, Data::Empty) || cell.to_string().trim().is_empty()
}

// ── Sheet parsing ─────────────────────────────────────────────────────────────

/// Parses one sheet's grid into transactions.
///
/// The header row is the first of the top 20 rows with at least two
/// non-empty cells; bank exports habitually stack titles and report dates
/// above it. Rows missing a date, business name or amount are skipped and
/// counted. An unparseable date fails the whole sheet.
pub fn parse_sheet(rows: &[Vec<Data>]) -> Result<NormalizeOutcome, NormalizeError> {
    let header_idx = rows
        .iter()
        .take(20)
        .position(|row| row.iter().filter(|c| !is_empty_cell(c)).count() >= 2)
        .ok_or(NormalizeError::NoHeaderRow)?;

    let columns = build_column_map(&rows[header_idx])?;

    let mut transactions = Vec::new();
    let mut skipped_rows = 0;

    for row in &rows[header_idx + 1..] {
        if row.iter().all(is_empty_cell) {
            continue;
        }

        let cell = |idx: usize| row.get(idx).unwrap_or(&Data::Empty);

        let date = parse_date_cell(cell(columns.date))?;
        let business_name = clean_text(cell(columns.business_name));
        let amount = clean_amount(cell(columns.amount));

        let (Some(date), Some(business_name), Some(amount)) = (date, business_name, amount)
        else {
            skipped_rows += 1;
            continue;
        };

        transactions.push(NormalizedTransaction {
            date,
            business_name,
            amount,
            card_last4: columns.card_last4.map(cell).and_then(clean_text),
            raw_description: columns.raw_description.map(cell).and_then(clean_text),
        });
    }

    Ok(NormalizeOutcome { transactions, skipped_rows })
}

/// Reads an uploaded workbook and returns the first sheet that yields at
/// least one transaction. If every sheet fails or comes up empty, the last
/// sheet-level error wins, falling back to `NoTransactions`.
pub fn normalize(bytes: &[u8]) -> Result<NormalizeOutcome, NormalizeError> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes))
        .map_err(|_| NormalizeError::InvalidFile)?;

    let sheet_names = workbook.sheet_names().to_owned();
    if sheet_names.is_empty() {
        return Err(NormalizeError::NoSheets);
    }

    let mut last_error = None;
    for name in &sheet_names {
        let range = match workbook.worksheet_range(name) {
            Ok(range) => range,
            Err(_) => continue,
        };
        let rows: Vec<Vec<Data>> = range.rows().map(|r| r.to_vec()).collect();
        match parse_sheet(&rows) {
            Ok(outcome) if !outcome.transactions.is_empty() => return Ok(outcome),
            Ok(_) => {}
            Err(err) => {
                tracing::debug!(sheet = %name, error = %err, "sheet failed to normalize");
                last_error = Some(err);
            }
        }
    }

    Err(last_error.unwrap_or(NormalizeError::NoTransactions))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn s(text: &str) -> Data {
        Data::String(text.to_string())
    }

    fn hebrew_sheet() -> Vec<Vec<Data>> {
        vec![
            vec![s("תאריך"), s("בית עסק"), s("סכום"), s("הערות")],
            vec![s("2026-02-03"), s("סופר  שלי"), Data::Float(-120.5), s("קנייה שבועית")],
            vec![s("04/02/2026"), s("חברת חשמל"), s("-1,234.56"), Data::Empty],
        ]
    }

    #[test]
    fn parses_hebrew_headers() {
        let outcome = parse_sheet(&hebrew_sheet()).unwrap();
        assert_eq!(outcome.transactions.len(), 2);
        assert_eq!(outcome.skipped_rows, 0);

        let first = &outcome.transactions[0];
        assert_eq!(first.date, NaiveDate::from_ymd_opt(2026, 2, 3).unwrap());
        assert_eq!(first.business_name, "סופר שלי");
        assert_eq!(first.amount, Money::from_f64(-120.5).unwrap());
        assert_eq!(first.raw_description.as_deref(), Some("קנייה שבועית"));

        let second = &outcome.transactions[1];
        assert_eq!(second.date, NaiveDate::from_ymd_opt(2026, 2, 4).unwrap());
        assert_eq!(second.amount, Money::from_f64(-1234.56).unwrap());
        assert_eq!(second.raw_description, None);
    }

    #[test]
    fn header_row_found_below_preamble() {
        let mut rows = vec![
            vec![s("דוח עסקאות")],
            vec![Data::Empty, Data::Empty],
        ];
        rows.extend(hebrew_sheet());
        let outcome = parse_sheet(&rows).unwrap();
        assert_eq!(outcome.transactions.len(), 2);
    }

    #[test]
    fn missing_columns_reported_by_canonical_name() {
        let rows = vec![vec![s("תאריך"), s("something else")]];
        let err = parse_sheet(&rows).unwrap_err();
        assert_eq!(
            err,
            NormalizeError::MissingColumns(vec!["businessName".into(), "amount".into()])
        );
    }

    #[test]
    fn all_empty_grid_has_no_header() {
        let rows = vec![vec![Data::Empty, Data::Empty], vec![s(""), s(" ")]];
        assert_eq!(parse_sheet(&rows).unwrap_err(), NormalizeError::NoHeaderRow);
    }

    #[test]
    fn rows_missing_required_fields_are_skipped_and_counted() {
        let rows = vec![
            vec![s("date"), s("merchant"), s("amount")],
            vec![Data::Empty, s("no date"), Data::Float(10.0)],
            vec![s("2026-02-01"), Data::Empty, Data::Float(10.0)],
            vec![s("2026-02-01"), s("no amount"), s("abc")],
            vec![s("2026-02-01"), s("good"), Data::Float(10.0)],
        ];
        let outcome = parse_sheet(&rows).unwrap();
        assert_eq!(outcome.transactions.len(), 1);
        assert_eq!(outcome.transactions[0].business_name, "good");
        assert_eq!(outcome.skipped_rows, 3);
    }

    #[test]
    fn unparseable_date_fails_the_sheet() {
        let rows = vec![
            vec![s("date"), s("merchant"), s("amount")],
            vec![s("31/02/2026"), s("shop"), Data::Float(10.0)],
        ];
        assert!(matches!(
            parse_sheet(&rows).unwrap_err(),
            NormalizeError::InvalidDate(_)
        ));
    }

    #[test]
    fn serial_dates_and_english_headers() {
        let rows = vec![
            vec![s("Date"), s("Business Name"), s("Amount"), s("Card")],
            vec![Data::Int(44927), s("Coffee"), Data::Float(-18.0), Data::Int(1234)],
        ];
        let outcome = parse_sheet(&rows).unwrap();
        let tx = &outcome.transactions[0];
        assert_eq!(tx.date, NaiveDate::from_ymd_opt(2023, 1, 1).unwrap());
        assert_eq!(tx.card_last4.as_deref(), Some("1234"));
    }

    #[test]
    fn leftmost_matching_column_wins() {
        let rows = vec![
            vec![s("תאריך"), s("בית עסק"), s("תיאור"), s("סכום")],
            vec![s("2026-02-01"), s("the merchant"), s("the description"), Data::Float(5.0)],
        ];
        let outcome = parse_sheet(&rows).unwrap();
        assert_eq!(outcome.transactions[0].business_name, "the merchant");
    }

    #[test]
    fn garbage_bytes_are_not_a_workbook() {
        assert_eq!(
            normalize(b"definitely not an xlsx").unwrap_err(),
            NormalizeError::InvalidFile
        );
    }
}
