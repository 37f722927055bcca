//! Statement intake: XLSX normalization with Hebrew-first column aliasing,
//! strict date parsing and the tiered rule-dictionary categorization engine.

pub mod dates;
pub mod rules;
pub mod workbook;

pub use dates::{parse_date_cell, InvalidDate};
pub use rules::RuleEngine;
pub use workbook::{normalize, NormalizeError, NormalizeOutcome, NormalizedTransaction};
