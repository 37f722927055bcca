use heshbon_core::{build_monthly_dashboard, DashboardConfig, DashboardView, MonthKey};
use heshbon_storage::{db, DbPool};

use crate::error::ServiceResult;

/// Assembles the month's dashboard: stored plan (if any) plus every
/// transaction dated inside the month, merged by the pure builder in core.
pub async fn monthly_dashboard(
    pool: &DbPool,
    owner_id: i64,
    month_key: &str,
    config: &DashboardConfig,
) -> ServiceResult<DashboardView> {
    let month_key: MonthKey = month_key.parse()?;
    let plan = db::find_budget_plan(pool, owner_id, month_key).await?;
    let transactions = db::get_transactions_in_range(
        pool,
        owner_id,
        month_key.start_date(),
        month_key.next_month_start(),
    )
    .await?;

    Ok(build_monthly_dashboard(
        plan.as_ref(),
        &transactions,
        month_key,
        config,
    ))
}
