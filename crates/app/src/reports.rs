use chrono::NaiveDate;
use heshbon_core::MonthKey;
use heshbon_storage::{db, DbPool, GroupBy, MerchantRow, ReportFilter, SummaryRow};

use crate::error::ServiceResult;

/// Report window and filters as the caller supplies them. Month keys are
/// expanded into half-open date ranges before hitting storage.
#[derive(Debug, Clone, Default)]
pub struct ReportQuery {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub month: Option<String>,
    pub category: Option<String>,
    pub batch_id: Option<i64>,
    pub include_uncategorized: bool,
}

fn to_filter(query: &ReportQuery) -> ServiceResult<ReportFilter> {
    let (from, to) = match &query.month {
        Some(raw) => {
            let month: MonthKey = raw.parse()?;
            (Some(month.start_date()), Some(month.next_month_start()))
        }
        None => (query.from, query.to),
    };
    Ok(ReportFilter {
        from,
        to,
        category: query.category.clone(),
        batch_id: query.batch_id,
        include_uncategorized: query.include_uncategorized,
    })
}

pub async fn summarize(
    pool: &DbPool,
    owner_id: i64,
    query: &ReportQuery,
    group_by: GroupBy,
) -> ServiceResult<Vec<SummaryRow>> {
    let filter = to_filter(query)?;
    Ok(db::summarize_transactions(pool, owner_id, &filter, group_by).await?)
}

pub async fn top_merchants(
    pool: &DbPool,
    owner_id: i64,
    query: &ReportQuery,
    limit: Option<i64>,
) -> ServiceResult<Vec<MerchantRow>> {
    let filter = to_filter(query)?;
    let limit = limit.unwrap_or(10).clamp(1, 100);
    Ok(db::top_merchants(pool, owner_id, &filter, limit).await?)
}
