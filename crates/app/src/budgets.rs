use chrono::Utc;
use heshbon_core::{budget::validate_budget_payload, BudgetPlan, BudgetPlanInput, Money, MonthKey};
use heshbon_storage::{db, DbPool};

use crate::error::{ServiceError, ServiceResult};

/// Reads the month's plan, or the empty default when nothing was saved —
/// the dashboard and editor always have something to render.
pub async fn get_budget_plan(
    pool: &DbPool,
    owner_id: i64,
    month_key: &str,
) -> ServiceResult<BudgetPlan> {
    let month_key: MonthKey = month_key.parse()?;
    let plan = db::find_budget_plan(pool, owner_id, month_key).await?;
    Ok(plan.unwrap_or_else(|| BudgetPlan::empty(month_key)))
}

/// Validates and stores a full plan, replacing whatever the month held.
pub async fn upsert_budget_plan(
    pool: &DbPool,
    owner_id: i64,
    month_key: &str,
    input: BudgetPlanInput,
) -> ServiceResult<BudgetPlan> {
    let month_key: MonthKey = month_key.parse()?;
    let plan = validate_budget_payload(input, month_key)?;
    db::upsert_budget_plan(pool, owner_id, &plan).await?;
    Ok(plan)
}

/// Applies a single manual-cell edit on top of the stored plan (or the
/// empty default). A `None` value removes the override.
pub async fn patch_budget_cell(
    pool: &DbPool,
    owner_id: i64,
    month_key: &str,
    path: &str,
    value: Option<f64>,
) -> ServiceResult<BudgetPlan> {
    let month_key: MonthKey = month_key.parse()?;
    if path.trim().is_empty() {
        return Err(ServiceError::validation("path must be a non-empty string"));
    }
    let value = match value {
        Some(v) => Some(
            Money::from_f64(v).ok_or_else(|| ServiceError::validation("value must be a number"))?,
        ),
        None => None,
    };

    let mut plan = db::find_budget_plan(pool, owner_id, month_key)
        .await?
        .unwrap_or_else(|| BudgetPlan::empty(month_key));
    plan.apply_cell(path, value, Utc::now());
    db::upsert_budget_plan(pool, owner_id, &plan).await?;
    Ok(plan)
}

pub async fn list_budget_months(
    pool: &DbPool,
    owner_id: i64,
) -> ServiceResult<Vec<MonthKey>> {
    Ok(db::list_budget_months(pool, owner_id).await?)
}
