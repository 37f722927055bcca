use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::money::Money;
use crate::month::MonthKey;

/// The fixed set of budget groups. Declaration order is the presentation
/// order of group breakdowns and charts; tests rely on it staying stable.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "camelCase")]
pub enum GroupKey {
    FixedBills,
    VariableExpenses,
    Income,
    Savings,
    LoansCash,
    Tithes,
}

impl GroupKey {
    pub const ALL: [GroupKey; 6] = [
        GroupKey::FixedBills,
        GroupKey::VariableExpenses,
        GroupKey::Income,
        GroupKey::Savings,
        GroupKey::LoansCash,
        GroupKey::Tithes,
    ];

    /// Wire key — part of the manual-cell path scheme, must never change.
    pub fn as_str(self) -> &'static str {
        match self {
            GroupKey::FixedBills => "fixedBills",
            GroupKey::VariableExpenses => "variableExpenses",
            GroupKey::Income => "income",
            GroupKey::Savings => "savings",
            GroupKey::LoansCash => "loansCash",
            GroupKey::Tithes => "tithes",
        }
    }

    /// Line items in these groups may carry a `dayInMonth` anchor.
    pub fn allows_day_anchor(self) -> bool {
        matches!(self, GroupKey::FixedBills | GroupKey::Tithes)
    }
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GroupKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        GroupKey::ALL
            .into_iter()
            .find(|g| g.as_str() == s)
            .ok_or_else(|| format!("unknown budget group: '{s}'"))
    }
}

/// One planned line inside a budget group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineItem {
    pub name: String,
    pub target_amount: Money,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub day_in_month: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manual_actual: Option<Money>,
}

/// A single user override addressed by its canonical cell path
/// (`overview.<group>.target|actual` or
/// `groups.<group>.items[<index>].target|actual`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManualCell {
    pub path: String,
    pub value: Option<Money>,
    pub updated_at: DateTime<Utc>,
}

/// Per-month budget plan. One per (owner, month); the owner scope lives in
/// storage, not here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BudgetPlan {
    pub month_key: MonthKey,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub targets: BTreeMap<GroupKey, Money>,
    #[serde(default)]
    pub group_items: BTreeMap<GroupKey, Vec<LineItem>>,
    #[serde(default)]
    pub manual_actuals: BTreeMap<GroupKey, Money>,
    #[serde(default)]
    pub manual_cells: Vec<ManualCell>,
}

impl BudgetPlan {
    /// The default plan a month without saved data renders from.
    pub fn empty(month_key: MonthKey) -> Self {
        BudgetPlan {
            month_key,
            notes: String::new(),
            targets: BTreeMap::new(),
            group_items: GroupKey::ALL.into_iter().map(|g| (g, Vec::new())).collect(),
            manual_actuals: BTreeMap::new(),
            manual_cells: Vec::new(),
        }
    }

    pub fn items(&self, group: GroupKey) -> &[LineItem] {
        self.group_items.get(&group).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Applies one cell edit, last write wins per path. A `None` value
    /// removes the override entirely.
    pub fn apply_cell(&mut self, path: &str, value: Option<Money>, at: DateTime<Utc>) {
        let existing = self.manual_cells.iter().position(|c| c.path == path);
        match (existing, value) {
            (Some(idx), Some(value)) => {
                self.manual_cells[idx].value = Some(value);
                self.manual_cells[idx].updated_at = at;
            }
            (Some(idx), None) => {
                self.manual_cells.remove(idx);
            }
            (None, Some(value)) => self.manual_cells.push(ManualCell {
                path: path.to_string(),
                value: Some(value),
                updated_at: at,
            }),
            (None, None) => {}
        }
    }
}

/// Input-validation failure with the full list of field violations, so the
/// caller can fix everything in one pass.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ValidationError {
    pub message: String,
    pub details: Vec<String>,
}

impl ValidationError {
    pub fn new(message: impl Into<String>, details: Vec<String>) -> Self {
        ValidationError { message: message.into(), details }
    }
}

// ── Untrusted budget payload ──────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BudgetPlanInput {
    pub notes: Option<String>,
    pub targets: BTreeMap<GroupKey, Option<f64>>,
    pub group_items: BTreeMap<GroupKey, Vec<LineItemInput>>,
    pub manual_actuals: BTreeMap<GroupKey, Option<f64>>,
    pub manual_cells: Vec<ManualCellInput>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineItemInput {
    pub name: String,
    #[serde(default)]
    pub target_amount: f64,
    #[serde(default)]
    pub day_in_month: Option<i64>,
    #[serde(default)]
    pub manual_actual: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManualCellInput {
    pub path: String,
    #[serde(default)]
    pub value: Option<f64>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

fn non_negative(value: f64, path: &str, details: &mut Vec<String>) -> Option<Money> {
    match Money::from_f64(value) {
        Some(amount) if !amount.is_negative() => Some(amount),
        _ => {
            details.push(format!("{path} must be a number >= 0"));
            None
        }
    }
}

/// Validates a full budget payload, collecting every violation before
/// failing. Lines with a blank name are silently dropped, matching the
/// original intake behavior.
pub fn validate_budget_payload(
    input: BudgetPlanInput,
    month_key: MonthKey,
) -> Result<BudgetPlan, ValidationError> {
    let mut details = Vec::new();
    let mut plan = BudgetPlan::empty(month_key);
    plan.notes = input.notes.unwrap_or_default();

    for (group, value) in input.targets {
        if let Some(value) = value {
            if let Some(amount) = non_negative(value, &format!("targets.{group}"), &mut details) {
                plan.targets.insert(group, amount);
            }
        }
    }

    for (group, value) in input.manual_actuals {
        if let Some(value) = value {
            if let Some(amount) =
                non_negative(value, &format!("manualActuals.{group}"), &mut details)
            {
                plan.manual_actuals.insert(group, amount);
            }
        }
    }

    for (group, lines) in input.group_items {
        let mut items = Vec::new();
        for (idx, line) in lines
            .into_iter()
            .filter(|l| !l.name.trim().is_empty())
            .enumerate()
        {
            let path = format!("groupItems.{group}[{idx}]");
            let target_amount =
                non_negative(line.target_amount, &format!("{path}.targetAmount"), &mut details)
                    .unwrap_or_else(Money::zero);

            let day_in_month = match line.day_in_month {
                None => None,
                Some(_) if !group.allows_day_anchor() => {
                    details.push(format!("{path}.dayInMonth is not supported in this group"));
                    None
                }
                Some(day) if (1..=31).contains(&day) => Some(day as u8),
                Some(_) => {
                    details.push(format!("{path}.dayInMonth must be between 1 and 31"));
                    None
                }
            };

            let manual_actual = line
                .manual_actual
                .and_then(|v| non_negative(v, &format!("{path}.manualActual"), &mut details));

            items.push(LineItem {
                name: line.name.trim().to_string(),
                target_amount,
                day_in_month,
                manual_actual,
            });
        }
        plan.group_items.insert(group, items);
    }

    for (idx, cell) in input.manual_cells.into_iter().enumerate() {
        if cell.path.trim().is_empty() {
            details.push(format!("manualCells[{idx}].path must be a non-empty string"));
            continue;
        }
        let value = match cell.value {
            Some(v) => match Money::from_f64(v) {
                Some(amount) => Some(amount),
                None => {
                    details.push(format!("manualCells[{idx}].value must be a number"));
                    continue;
                }
            },
            None => None,
        };
        plan.manual_cells.push(ManualCell {
            path: cell.path,
            value,
            updated_at: cell.updated_at.unwrap_or_else(Utc::now),
        });
    }

    if details.is_empty() {
        Ok(plan)
    } else {
        Err(ValidationError::new("Validation failed", details))
    }
}
