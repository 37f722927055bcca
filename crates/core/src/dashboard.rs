use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use crate::budget::{BudgetPlan, GroupKey, LineItem};
use crate::model::Transaction;
use crate::money::Money;
use crate::month::MonthKey;

// ── Configuration ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupAliases {
    pub group: GroupKey,
    pub aliases: Vec<String>,
}

/// Immutable per-deployment dashboard configuration. Injected into the
/// builder rather than read from global state so deployments can reshape the
/// group map and tests can pin it down.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardConfig {
    /// Classification list. Iteration order is the tie-break: the first
    /// group whose alias is contained in the category wins.
    pub classification: Vec<GroupAliases>,
    pub labels: BTreeMap<GroupKey, String>,
    /// Row order of the planned-vs-actual overview table.
    pub overview_order: Vec<GroupKey>,
    /// Groups whose resolved totals feed the expense KPIs. Income and the
    /// savings plan stay out of "spent this month".
    pub expense_groups: Vec<GroupKey>,
    /// Groups whose actuals are derived from transactions by line-item name
    /// matching. The rest are tracked purely by hand.
    pub auto_groups: Vec<GroupKey>,
    /// Where categories with no alias hit land.
    pub default_group: GroupKey,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        let aliases = |group, list: &[&str]| GroupAliases {
            group,
            aliases: list.iter().map(|s| s.to_string()).collect(),
        };
        DashboardConfig {
            classification: vec![
                aliases(
                    GroupKey::FixedBills,
                    &[
                        "שכירות", "rent", "חשמל", "מים", "ארנונה", "סלולר", "אינטרנט",
                        "מנויים", "ביטוח", "גן", "ועד בית",
                    ],
                ),
                aliases(
                    GroupKey::VariableExpenses,
                    &[
                        "סופר", "מכולת", "דלק", "אוכל בחוץ", "מסעדה", "בזבוזים", "קניות",
                        "ביגוד", "פארם", "בריאות", "תחבורה",
                    ],
                ),
                aliases(GroupKey::Tithes, &["מעשרות", "מעשר", "תרומות", "donation", "tithe"]),
                aliases(
                    GroupKey::Savings,
                    &["חסכון", "חיסכון", "saving", "savings", "השקעות", "investment"],
                ),
                aliases(
                    GroupKey::LoansCash,
                    &["הלוואות", "הלוואה", "אשראי", "מזומן", "loan", "cash", "credit"],
                ),
                aliases(GroupKey::Income, &["הכנסות", "משכורת", "salary", "income"]),
            ],
            labels: [
                (GroupKey::FixedBills, "חשבונות ומנויים"),
                (GroupKey::VariableExpenses, "הוצאות משתנות"),
                (GroupKey::Income, "הכנסות"),
                (GroupKey::Savings, "תוכנית חסכון"),
                (GroupKey::LoansCash, "הלוואות/מזומן"),
                (GroupKey::Tithes, "מעשרות"),
            ]
            .into_iter()
            .map(|(g, l)| (g, l.to_string()))
            .collect(),
            overview_order: vec![
                GroupKey::Income,
                GroupKey::Savings,
                GroupKey::FixedBills,
                GroupKey::VariableExpenses,
                GroupKey::LoansCash,
                GroupKey::Tithes,
            ],
            expense_groups: vec![
                GroupKey::FixedBills,
                GroupKey::VariableExpenses,
                GroupKey::LoansCash,
                GroupKey::Tithes,
            ],
            auto_groups: vec![
                GroupKey::FixedBills,
                GroupKey::VariableExpenses,
                GroupKey::LoansCash,
                GroupKey::Income,
            ],
            default_group: GroupKey::VariableExpenses,
        }
    }
}

impl DashboardConfig {
    pub fn from_toml(toml_content: &str) -> Result<Self, String> {
        toml::from_str(toml_content).map_err(|e| format!("Failed to parse TOML: {e}"))
    }

    fn classify(&self, category: &str) -> GroupKey {
        let category = normalize_text(category);
        self.classification
            .iter()
            .find(|entry| {
                entry
                    .aliases
                    .iter()
                    .any(|alias| category.contains(&normalize_text(alias)))
            })
            .map(|entry| entry.group)
            .unwrap_or(self.default_group)
    }

    fn is_auto(&self, group: GroupKey) -> bool {
        self.auto_groups.contains(&group)
    }

    fn label(&self, group: GroupKey) -> String {
        self.labels
            .get(&group)
            .cloned()
            .unwrap_or_else(|| group.as_str().to_string())
    }
}

fn normalize_text(value: &str) -> String {
    value.trim().to_lowercase()
}

// ── View model ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueSource {
    Manual,
    Auto,
    None,
}

/// A money cell plus where it came from, so the UI can mark user overrides.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResolvedValue {
    pub value: Money,
    pub source: ValueSource,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OverviewRow {
    pub key: GroupKey,
    pub label: String,
    pub target: ResolvedValue,
    pub actual: ResolvedValue,
    pub diff: Money,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemRow {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub day_in_month: Option<u8>,
    pub target: Money,
    pub auto_actual: Money,
    pub manual_actual: Option<Money>,
    pub final_actual: Money,
    pub source: ValueSource,
    pub diff: Money,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnassignedRemainder {
    pub auto_actual: Money,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupBreakdown {
    pub items: Vec<ItemRow>,
    /// Spend in this group not claimed by any named line item.
    pub unassigned: UnassignedRemainder,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Kpis {
    pub planned_expense_total: Money,
    pub actual_expense_total: Money,
    pub remaining_to_spend: Money,
    pub is_within_budget: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupSlice {
    pub key: GroupKey,
    pub label: String,
    pub value: Money,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DaySpend {
    pub date: NaiveDate,
    pub total: Money,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Charts {
    pub expense_split_by_group: Vec<GroupSlice>,
    pub spend_by_day: Vec<DaySpend>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardView {
    pub month_key: MonthKey,
    pub kpis: Kpis,
    pub overview_table: Vec<OverviewRow>,
    pub groups_breakdown: BTreeMap<GroupKey, GroupBreakdown>,
    pub charts: Charts,
}

// ── Builder ───────────────────────────────────────────────────────────────────

/// Merges a budget plan, its manual-cell overrides and a month's transactions
/// into a renderable dashboard. Pure; a month with no plan and no
/// transactions still yields a fully shaped view.
pub fn build_monthly_dashboard(
    plan: Option<&BudgetPlan>,
    transactions: &[Transaction],
    month_key: MonthKey,
    config: &DashboardConfig,
) -> DashboardView {
    let empty_plan;
    let plan = match plan {
        Some(plan) => plan,
        None => {
            empty_plan = BudgetPlan::empty(month_key);
            &empty_plan
        }
    };

    // Effective override per path, last write wins. A stored null value
    // cancels any earlier write to the same path.
    let mut overrides: HashMap<&str, Money> = HashMap::new();
    for cell in &plan.manual_cells {
        match cell.value {
            Some(value) => {
                overrides.insert(cell.path.as_str(), value);
            }
            None => {
                overrides.remove(cell.path.as_str());
            }
        }
    }

    let mut grouped: BTreeMap<GroupKey, Vec<&Transaction>> =
        GroupKey::ALL.into_iter().map(|g| (g, Vec::new())).collect();
    for tx in transactions {
        grouped
            .entry(config.classify(&tx.category))
            .or_default()
            .push(tx);
    }

    let mut groups_breakdown = BTreeMap::new();
    let mut overview_rows: BTreeMap<GroupKey, OverviewRow> = BTreeMap::new();

    for group in GroupKey::ALL {
        let items = plan.items(group);
        let group_txs = &grouped[&group];
        let is_auto = config.is_auto(group);

        let (line_autos, unassigned) = if is_auto {
            match_lines_to_transactions(items, group_txs)
        } else {
            (vec![Money::zero(); items.len()], Money::zero())
        };

        let rows: Vec<ItemRow> = items
            .iter()
            .enumerate()
            .map(|(idx, item)| {
                let target_path = format!("groups.{group}.items[{idx}].target");
                let actual_path = format!("groups.{group}.items[{idx}].actual");

                let target = overrides
                    .get(target_path.as_str())
                    .copied()
                    .unwrap_or(item.target_amount)
                    .round2();

                let auto_actual = line_autos[idx];
                let (final_actual, source) =
                    if let Some(value) = overrides.get(actual_path.as_str()).copied() {
                        (value, ValueSource::Manual)
                    } else if let Some(value) = item.manual_actual {
                        (value, ValueSource::Manual)
                    } else if !auto_actual.is_zero() {
                        (auto_actual, ValueSource::Auto)
                    } else {
                        (Money::zero(), ValueSource::None)
                    };
                let final_actual = final_actual.round2();

                ItemRow {
                    name: item.name.clone(),
                    day_in_month: item.day_in_month,
                    target,
                    auto_actual: auto_actual.round2(),
                    manual_actual: item.manual_actual,
                    final_actual,
                    source,
                    diff: (final_actual - target).round2(),
                }
            })
            .collect();

        groups_breakdown.insert(
            group,
            GroupBreakdown {
                items: rows,
                unassigned: UnassignedRemainder { auto_actual: unassigned.round2() },
            },
        );

        // Overview resolution: manual cell > plan-stored value > auto > zero.
        let auto_target: Money = items.iter().map(|i| i.target_amount).sum();
        let target = resolve(
            overrides.get(format!("overview.{group}.target").as_str()).copied(),
            plan.targets.get(&group).copied(),
            auto_target,
        );
        let auto_actual = if is_auto { sum_abs(group_txs) } else { Money::zero() };
        let actual = resolve(
            overrides.get(format!("overview.{group}.actual").as_str()).copied(),
            plan.manual_actuals.get(&group).copied(),
            auto_actual,
        );

        overview_rows.insert(
            group,
            OverviewRow {
                key: group,
                label: config.label(group),
                diff: (actual.value - target.value).round2(),
                target,
                actual,
            },
        );
    }

    let planned_expense_total: Money = config
        .expense_groups
        .iter()
        .map(|g| overview_rows[g].target.value)
        .sum::<Money>()
        .round2();
    let actual_expense_total: Money = config
        .expense_groups
        .iter()
        .map(|g| overview_rows[g].actual.value)
        .sum::<Money>()
        .round2();

    let overview_table = config
        .overview_order
        .iter()
        .filter_map(|g| overview_rows.get(g).cloned())
        .collect();

    let expense_split_by_group = GroupKey::ALL
        .into_iter()
        .map(|group| GroupSlice {
            key: group,
            label: config.label(group),
            value: sum_abs(&grouped[&group]).round2(),
        })
        .collect();

    let mut daily: BTreeMap<NaiveDate, Money> = BTreeMap::new();
    for tx in transactions {
        *daily.entry(tx.date).or_insert_with(Money::zero) += tx.amount.abs();
    }
    let spend_by_day = daily
        .into_iter()
        .map(|(date, total)| DaySpend { date, total: total.round2() })
        .collect();

    DashboardView {
        month_key,
        kpis: Kpis {
            planned_expense_total,
            actual_expense_total,
            remaining_to_spend: (planned_expense_total - actual_expense_total).round2(),
            is_within_budget: actual_expense_total <= planned_expense_total,
        },
        overview_table,
        groups_breakdown,
        charts: Charts { expense_split_by_group, spend_by_day },
    }
}

fn resolve(cell: Option<Money>, stored: Option<Money>, auto: Money) -> ResolvedValue {
    let (value, source) = if let Some(value) = cell {
        (value, ValueSource::Manual)
    } else if let Some(value) = stored {
        (value, ValueSource::Manual)
    } else if !auto.is_zero() {
        (auto, ValueSource::Auto)
    } else {
        (Money::zero(), ValueSource::None)
    };
    ResolvedValue { value: value.round2(), source }
}

fn sum_abs(transactions: &[&Transaction]) -> Money {
    transactions.iter().map(|tx| tx.amount.abs()).sum()
}

/// Assigns each transaction's absolute amount to the first line item whose
/// normalized name appears in the transaction's business name; the rest
/// accumulate as the group's unassigned remainder.
fn match_lines_to_transactions(
    items: &[LineItem],
    transactions: &[&Transaction],
) -> (Vec<Money>, Money) {
    let names: Vec<String> = items.iter().map(|item| normalize_text(&item.name)).collect();
    let mut sums = vec![Money::zero(); items.len()];
    let mut unassigned = Money::zero();

    for tx in transactions {
        let business = normalize_text(&tx.business_name);
        let amount = tx.amount.abs();
        match names
            .iter()
            .position(|name| !name.is_empty() && business.contains(name.as_str()))
        {
            Some(idx) => sums[idx] += amount,
            None => unassigned += amount,
        }
    }

    (sums, unassigned)
}
