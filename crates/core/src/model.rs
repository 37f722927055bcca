use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::money::Money;

/// Sentinel category for transactions no dictionary rule claimed. The rule
/// dictionary is Hebrew-first, so the sentinel is too.
pub const UNCATEGORIZED: &str = "לא מסווג";

/// The two bank export shapes the normalizer understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    Max,
    Visa,
}

impl SourceType {
    pub fn as_str(self) -> &'static str {
        match self {
            SourceType::Max => "max",
            SourceType::Visa => "visa",
        }
    }
}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "max" => Ok(SourceType::Max),
            "visa" => Ok(SourceType::Visa),
            other => Err(format!("unknown source type: '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BatchStatus {
    Processing,
    Done,
    Failed,
}

impl BatchStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            BatchStatus::Processing => "processing",
            BatchStatus::Done => "done",
            BatchStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for BatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BatchStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "processing" => Ok(BatchStatus::Processing),
            "done" => Ok(BatchStatus::Done),
            "failed" => Ok(BatchStatus::Failed),
            other => Err(format!("unknown batch status: '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchType {
    Exact,
    Contains,
    Regex,
}

impl MatchType {
    pub fn as_str(self) -> &'static str {
        match self {
            MatchType::Exact => "exact",
            MatchType::Contains => "contains",
            MatchType::Regex => "regex",
        }
    }
}

impl fmt::Display for MatchType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MatchType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "exact" => Ok(MatchType::Exact),
            "contains" => Ok(MatchType::Contains),
            "regex" => Ok(MatchType::Regex),
            other => Err(format!("unknown match type: '{other}'")),
        }
    }
}

/// One uploaded statement file. Status moves processing → done | failed
/// exactly once; a failed batch is kept as an audit record.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportBatch {
    pub id: i64,
    pub owner_id: i64,
    pub source_type: SourceType,
    pub original_file_name: String,
    pub status: BatchStatus,
    pub created_at: DateTime<Utc>,
}

/// A normalized statement line. After insertion only `category` and
/// `matched_rule_id` ever change.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: Option<i64>,
    pub owner_id: i64,
    pub import_batch_id: i64,
    pub date: NaiveDate,
    pub business_name: String,
    pub amount: Money,
    pub card_last4: Option<String>,
    pub raw_description: Option<String>,
    pub category: String,
    /// Loose reference — may dangle after the rule is deleted.
    pub matched_rule_id: Option<i64>,
}

impl Transaction {
    pub fn is_uncategorized(&self) -> bool {
        self.category == UNCATEGORIZED
    }
}

/// A user-authored categorization rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DictionaryRule {
    pub id: Option<i64>,
    pub owner_id: i64,
    pub match_type: MatchType,
    pub pattern: String,
    pub category: String,
    pub priority: i64,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_type_round_trip() {
        assert_eq!("max".parse::<SourceType>().unwrap(), SourceType::Max);
        assert_eq!(SourceType::Visa.to_string(), "visa");
        assert!("amex".parse::<SourceType>().is_err());
    }

    #[test]
    fn batch_status_round_trip() {
        for status in [BatchStatus::Processing, BatchStatus::Done, BatchStatus::Failed] {
            assert_eq!(status.as_str().parse::<BatchStatus>().unwrap(), status);
        }
    }

    #[test]
    fn match_type_round_trip() {
        for mt in [MatchType::Exact, MatchType::Contains, MatchType::Regex] {
            assert_eq!(mt.as_str().parse::<MatchType>().unwrap(), mt);
        }
        assert!("fuzzy".parse::<MatchType>().is_err());
    }
}
