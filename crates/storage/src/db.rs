use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use heshbon_core::{
    BatchStatus, BudgetPlan, DictionaryRule, ImportBatch, MonthKey, Money, SourceType,
    Transaction, UNCATEGORIZED,
};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, QueryBuilder, Sqlite};
use std::path::Path;
use std::str::FromStr;

pub type DbPool = Pool<Sqlite>;

pub async fn create_db(path: &Path) -> Result<DbPool, sqlx::Error> {
    let options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await?;

    sqlx::query("PRAGMA journal_mode = WAL")
        .execute(&pool)
        .await?;
    sqlx::query("PRAGMA foreign_keys = ON")
        .execute(&pool)
        .await?;
    sqlx::query("PRAGMA synchronous = NORMAL")
        .execute(&pool)
        .await?;
    sqlx::query("PRAGMA busy_timeout = 5000")
        .execute(&pool)
        .await?;

    run_migrations(&pool).await?;

    Ok(pool)
}

async fn run_migrations(pool: &DbPool) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS import_batches (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            owner_id INTEGER NOT NULL,
            source_type TEXT NOT NULL,
            original_file_name TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'processing',
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS transactions (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            owner_id INTEGER NOT NULL,
            import_batch_id INTEGER NOT NULL,
            date TEXT NOT NULL,
            business_name TEXT NOT NULL,
            amount_cents INTEGER NOT NULL,
            card_last4 TEXT,
            raw_description TEXT,
            category TEXT NOT NULL,
            matched_rule_id INTEGER,
            FOREIGN KEY (import_batch_id) REFERENCES import_batches(id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_tx_owner_batch ON transactions(owner_id, import_batch_id)",
    )
    .execute(pool)
    .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_tx_owner_date ON transactions(owner_id, date)")
        .execute(pool)
        .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_tx_owner_category ON transactions(owner_id, category)",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS dictionary_rules (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            owner_id INTEGER NOT NULL,
            match_type TEXT NOT NULL,
            pattern TEXT NOT NULL,
            category TEXT NOT NULL,
            priority INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS budget_plans (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            owner_id INTEGER NOT NULL,
            month_key TEXT NOT NULL,
            notes TEXT NOT NULL DEFAULT '',
            targets TEXT NOT NULL DEFAULT '{}',
            group_items TEXT NOT NULL DEFAULT '{}',
            manual_actuals TEXT NOT NULL DEFAULT '{}',
            manual_cells TEXT NOT NULL DEFAULT '[]',
            updated_at TEXT NOT NULL DEFAULT (datetime('now')),
            UNIQUE(owner_id, month_key)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

// ── Row decoding helpers ──────────────────────────────────────────────────────

fn decode_err(msg: impl Into<String>) -> sqlx::Error {
    let msg: String = msg.into();
    sqlx::Error::Decode(msg.into())
}

/// SQLite's datetime('now') writes `YYYY-MM-DD HH:MM:SS`; rows written by
/// the application carry RFC 3339. Accept both.
fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, sqlx::Error> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
        .map(|naive| naive.and_utc())
        .map_err(|_| decode_err(format!("bad timestamp: '{raw}'")))
}

fn parse_date(raw: &str) -> Result<NaiveDate, sqlx::Error> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|_| decode_err(format!("bad date: '{raw}'")))
}

type BatchRow = (i64, i64, String, String, String, String);

fn batch_from_row(row: BatchRow) -> Result<ImportBatch, sqlx::Error> {
    let (id, owner_id, source_type, original_file_name, status, created_at) = row;
    Ok(ImportBatch {
        id,
        owner_id,
        source_type: SourceType::from_str(&source_type).map_err(decode_err)?,
        original_file_name,
        status: BatchStatus::from_str(&status).map_err(decode_err)?,
        created_at: parse_timestamp(&created_at)?,
    })
}

type TransactionRow = (
    i64,
    i64,
    i64,
    String,
    String,
    i64,
    Option<String>,
    Option<String>,
    String,
    Option<i64>,
);

const TRANSACTION_COLUMNS: &str = "id, owner_id, import_batch_id, date, business_name, \
     amount_cents, card_last4, raw_description, category, matched_rule_id";

fn transaction_from_row(row: TransactionRow) -> Result<Transaction, sqlx::Error> {
    let (
        id,
        owner_id,
        import_batch_id,
        date,
        business_name,
        amount_cents,
        card_last4,
        raw_description,
        category,
        matched_rule_id,
    ) = row;
    Ok(Transaction {
        id: Some(id),
        owner_id,
        import_batch_id,
        date: parse_date(&date)?,
        business_name,
        amount: Money::from_cents(amount_cents),
        card_last4,
        raw_description,
        category,
        matched_rule_id,
    })
}

type RuleRow = (i64, i64, String, String, String, i64, String);

fn rule_from_row(row: RuleRow) -> Result<DictionaryRule, sqlx::Error> {
    let (id, owner_id, match_type, pattern, category, priority, created_at) = row;
    Ok(DictionaryRule {
        id: Some(id),
        owner_id,
        match_type: match_type.parse().map_err(decode_err)?,
        pattern,
        category,
        priority,
        created_at: parse_timestamp(&created_at)?,
    })
}

// ── Import batches ────────────────────────────────────────────────────────────

pub async fn create_batch(
    pool: &DbPool,
    owner_id: i64,
    source_type: SourceType,
    original_file_name: &str,
) -> Result<ImportBatch, sqlx::Error> {
    let (id, created_at) = sqlx::query_as::<_, (i64, String)>(
        "INSERT INTO import_batches (owner_id, source_type, original_file_name, status) \
         VALUES (?, ?, ?, ?) RETURNING id, created_at",
    )
    .bind(owner_id)
    .bind(source_type.as_str())
    .bind(original_file_name)
    .bind(BatchStatus::Processing.as_str())
    .fetch_one(pool)
    .await?;

    Ok(ImportBatch {
        id,
        owner_id,
        source_type,
        original_file_name: original_file_name.to_string(),
        status: BatchStatus::Processing,
        created_at: parse_timestamp(&created_at)?,
    })
}

pub async fn get_batch(
    pool: &DbPool,
    owner_id: i64,
    batch_id: i64,
) -> Result<Option<ImportBatch>, sqlx::Error> {
    let row = sqlx::query_as::<_, BatchRow>(
        "SELECT id, owner_id, source_type, original_file_name, status, created_at \
         FROM import_batches WHERE id = ? AND owner_id = ?",
    )
    .bind(batch_id)
    .bind(owner_id)
    .fetch_optional(pool)
    .await?;
    row.map(batch_from_row).transpose()
}

pub async fn list_batches(
    pool: &DbPool,
    owner_id: i64,
    limit: i64,
    offset: i64,
) -> Result<Vec<ImportBatch>, sqlx::Error> {
    let rows = sqlx::query_as::<_, BatchRow>(
        "SELECT id, owner_id, source_type, original_file_name, status, created_at \
         FROM import_batches WHERE owner_id = ? \
         ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?",
    )
    .bind(owner_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;
    rows.into_iter().map(batch_from_row).collect()
}

pub async fn count_batches(pool: &DbPool, owner_id: i64) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar("SELECT COUNT(*) FROM import_batches WHERE owner_id = ?")
        .bind(owner_id)
        .fetch_one(pool)
        .await
}

pub async fn update_batch_status(
    pool: &DbPool,
    batch_id: i64,
    status: BatchStatus,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE import_batches SET status = ? WHERE id = ?")
        .bind(status.as_str())
        .bind(batch_id)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn delete_batch(
    pool: &DbPool,
    owner_id: i64,
    batch_id: i64,
) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM import_batches WHERE id = ? AND owner_id = ?")
        .bind(batch_id)
        .bind(owner_id)
        .execute(pool)
        .await?;
    Ok(())
}

// ── Transactions ──────────────────────────────────────────────────────────────

/// Inserts a batch's worth of rows in one database transaction, so a failed
/// import never leaves half a statement behind.
pub async fn insert_transactions(
    pool: &DbPool,
    transactions: &[Transaction],
) -> Result<(), sqlx::Error> {
    let mut db_tx = pool.begin().await?;
    for tx in transactions {
        sqlx::query(
            "INSERT INTO transactions (owner_id, import_batch_id, date, business_name, \
             amount_cents, card_last4, raw_description, category, matched_rule_id) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(tx.owner_id)
        .bind(tx.import_batch_id)
        .bind(tx.date.format("%Y-%m-%d").to_string())
        .bind(&tx.business_name)
        .bind(tx.amount.to_cents())
        .bind(&tx.card_last4)
        .bind(&tx.raw_description)
        .bind(&tx.category)
        .bind(tx.matched_rule_id)
        .execute(&mut *db_tx)
        .await?;
    }
    db_tx.commit().await
}

pub async fn get_batch_transactions(
    pool: &DbPool,
    owner_id: i64,
    batch_id: i64,
    category: Option<&str>,
    limit: i64,
    offset: i64,
) -> Result<Vec<Transaction>, sqlx::Error> {
    let mut qb = QueryBuilder::<Sqlite>::new(format!(
        "SELECT {TRANSACTION_COLUMNS} FROM transactions WHERE owner_id = "
    ));
    qb.push_bind(owner_id);
    qb.push(" AND import_batch_id = ").push_bind(batch_id);
    if let Some(category) = category {
        qb.push(" AND category = ").push_bind(category);
    }
    qb.push(" ORDER BY date, id LIMIT ").push_bind(limit);
    qb.push(" OFFSET ").push_bind(offset);

    let rows = qb.build_query_as::<TransactionRow>().fetch_all(pool).await?;
    rows.into_iter().map(transaction_from_row).collect()
}

pub async fn count_batch_transactions(
    pool: &DbPool,
    owner_id: i64,
    batch_id: i64,
    category: Option<&str>,
) -> Result<i64, sqlx::Error> {
    let mut qb = QueryBuilder::<Sqlite>::new(
        "SELECT COUNT(*) FROM transactions WHERE owner_id = ",
    );
    qb.push_bind(owner_id);
    qb.push(" AND import_batch_id = ").push_bind(batch_id);
    if let Some(category) = category {
        qb.push(" AND category = ").push_bind(category);
    }
    let count: (i64,) = qb.build_query_as().fetch_one(pool).await?;
    Ok(count.0)
}

/// Unpaged batch read, optionally narrowed to a single category — the
/// recategorization path wants every row it may touch.
pub async fn get_all_batch_transactions(
    pool: &DbPool,
    owner_id: i64,
    batch_id: i64,
    only_category: Option<&str>,
) -> Result<Vec<Transaction>, sqlx::Error> {
    let mut qb = QueryBuilder::<Sqlite>::new(format!(
        "SELECT {TRANSACTION_COLUMNS} FROM transactions WHERE owner_id = "
    ));
    qb.push_bind(owner_id);
    qb.push(" AND import_batch_id = ").push_bind(batch_id);
    if let Some(category) = only_category {
        qb.push(" AND category = ").push_bind(category);
    }
    qb.push(" ORDER BY date, id");

    let rows = qb.build_query_as::<TransactionRow>().fetch_all(pool).await?;
    rows.into_iter().map(transaction_from_row).collect()
}

pub async fn get_uncategorized(
    pool: &DbPool,
    owner_id: i64,
    batch_id: Option<i64>,
    limit: i64,
    offset: i64,
) -> Result<Vec<Transaction>, sqlx::Error> {
    let mut qb = QueryBuilder::<Sqlite>::new(format!(
        "SELECT {TRANSACTION_COLUMNS} FROM transactions WHERE owner_id = "
    ));
    qb.push_bind(owner_id);
    qb.push(" AND category = ").push_bind(UNCATEGORIZED);
    if let Some(batch_id) = batch_id {
        qb.push(" AND import_batch_id = ").push_bind(batch_id);
    }
    qb.push(" ORDER BY date, id LIMIT ").push_bind(limit);
    qb.push(" OFFSET ").push_bind(offset);

    let rows = qb.build_query_as::<TransactionRow>().fetch_all(pool).await?;
    rows.into_iter().map(transaction_from_row).collect()
}

pub async fn count_uncategorized(
    pool: &DbPool,
    owner_id: i64,
    batch_id: Option<i64>,
) -> Result<i64, sqlx::Error> {
    let mut qb = QueryBuilder::<Sqlite>::new(
        "SELECT COUNT(*) FROM transactions WHERE owner_id = ",
    );
    qb.push_bind(owner_id);
    qb.push(" AND category = ").push_bind(UNCATEGORIZED);
    if let Some(batch_id) = batch_id {
        qb.push(" AND import_batch_id = ").push_bind(batch_id);
    }
    let count: (i64,) = qb.build_query_as().fetch_one(pool).await?;
    Ok(count.0)
}

pub async fn get_transaction(
    pool: &DbPool,
    owner_id: i64,
    transaction_id: i64,
) -> Result<Option<Transaction>, sqlx::Error> {
    let row = sqlx::query_as::<_, TransactionRow>(&format!(
        "SELECT {TRANSACTION_COLUMNS} FROM transactions WHERE id = ? AND owner_id = ?"
    ))
    .bind(transaction_id)
    .bind(owner_id)
    .fetch_optional(pool)
    .await?;
    row.map(transaction_from_row).transpose()
}

pub async fn set_transaction_category(
    pool: &DbPool,
    owner_id: i64,
    transaction_id: i64,
    category: &str,
    matched_rule_id: Option<i64>,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE transactions SET category = ?, matched_rule_id = ? WHERE id = ? AND owner_id = ?",
    )
    .bind(category)
    .bind(matched_rule_id)
    .bind(transaction_id)
    .bind(owner_id)
    .execute(pool)
    .await?;
    Ok(result.rows_affected())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryUpdate {
    pub transaction_id: i64,
    pub category: String,
    pub matched_rule_id: Option<i64>,
}

/// Applies a recategorization changeset atomically.
pub async fn bulk_update_categories(
    pool: &DbPool,
    owner_id: i64,
    updates: &[CategoryUpdate],
) -> Result<(), sqlx::Error> {
    let mut db_tx = pool.begin().await?;
    for update in updates {
        sqlx::query(
            "UPDATE transactions SET category = ?, matched_rule_id = ? \
             WHERE id = ? AND owner_id = ?",
        )
        .bind(&update.category)
        .bind(update.matched_rule_id)
        .bind(update.transaction_id)
        .bind(owner_id)
        .execute(&mut *db_tx)
        .await?;
    }
    db_tx.commit().await
}

pub async fn delete_batch_transactions(
    pool: &DbPool,
    owner_id: i64,
    batch_id: i64,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        "DELETE FROM transactions WHERE import_batch_id = ? AND owner_id = ?",
    )
    .bind(batch_id)
    .bind(owner_id)
    .execute(pool)
    .await?;
    Ok(result.rows_affected())
}

/// Transactions with `start <= date < end`, the dashboard's month window.
pub async fn get_transactions_in_range(
    pool: &DbPool,
    owner_id: i64,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<Vec<Transaction>, sqlx::Error> {
    let rows = sqlx::query_as::<_, TransactionRow>(&format!(
        "SELECT {TRANSACTION_COLUMNS} FROM transactions \
         WHERE owner_id = ? AND date >= ? AND date < ? ORDER BY date, id"
    ))
    .bind(owner_id)
    .bind(start.format("%Y-%m-%d").to_string())
    .bind(end.format("%Y-%m-%d").to_string())
    .fetch_all(pool)
    .await?;
    rows.into_iter().map(transaction_from_row).collect()
}

// ── Dictionary rules ──────────────────────────────────────────────────────────

/// All of an owner's rules in id order — the stable tie-break the
/// categorization engine relies on.
pub async fn get_rules(pool: &DbPool, owner_id: i64) -> Result<Vec<DictionaryRule>, sqlx::Error> {
    let rows = sqlx::query_as::<_, RuleRow>(
        "SELECT id, owner_id, match_type, pattern, category, priority, created_at \
         FROM dictionary_rules WHERE owner_id = ? ORDER BY id",
    )
    .bind(owner_id)
    .fetch_all(pool)
    .await?;
    rows.into_iter().map(rule_from_row).collect()
}

pub async fn create_rule(pool: &DbPool, rule: &DictionaryRule) -> Result<i64, sqlx::Error> {
    let (id,): (i64,) = sqlx::query_as(
        "INSERT INTO dictionary_rules (owner_id, match_type, pattern, category, priority) \
         VALUES (?, ?, ?, ?, ?) RETURNING id",
    )
    .bind(rule.owner_id)
    .bind(rule.match_type.as_str())
    .bind(&rule.pattern)
    .bind(&rule.category)
    .bind(rule.priority)
    .fetch_one(pool)
    .await?;
    Ok(id)
}

pub async fn update_rule(
    pool: &DbPool,
    owner_id: i64,
    rule_id: i64,
    rule: &DictionaryRule,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE dictionary_rules SET match_type = ?, pattern = ?, category = ?, priority = ? \
         WHERE id = ? AND owner_id = ?",
    )
    .bind(rule.match_type.as_str())
    .bind(&rule.pattern)
    .bind(&rule.category)
    .bind(rule.priority)
    .bind(rule_id)
    .bind(owner_id)
    .execute(pool)
    .await?;
    Ok(result.rows_affected())
}

pub async fn delete_rule(
    pool: &DbPool,
    owner_id: i64,
    rule_id: i64,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM dictionary_rules WHERE id = ? AND owner_id = ?")
        .bind(rule_id)
        .bind(owner_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}

// ── Budget plans ──────────────────────────────────────────────────────────────

pub async fn find_budget_plan(
    pool: &DbPool,
    owner_id: i64,
    month_key: MonthKey,
) -> Result<Option<BudgetPlan>, sqlx::Error> {
    let row = sqlx::query_as::<_, (String, String, String, String, String)>(
        "SELECT notes, targets, group_items, manual_actuals, manual_cells \
         FROM budget_plans WHERE owner_id = ? AND month_key = ?",
    )
    .bind(owner_id)
    .bind(month_key.to_string())
    .fetch_optional(pool)
    .await?;

    let Some((notes, targets, group_items, manual_actuals, manual_cells)) = row else {
        return Ok(None);
    };

    Ok(Some(BudgetPlan {
        month_key,
        notes,
        targets: serde_json::from_str(&targets).map_err(|e| decode_err(e.to_string()))?,
        group_items: serde_json::from_str(&group_items).map_err(|e| decode_err(e.to_string()))?,
        manual_actuals: serde_json::from_str(&manual_actuals)
            .map_err(|e| decode_err(e.to_string()))?,
        manual_cells: serde_json::from_str(&manual_cells).map_err(|e| decode_err(e.to_string()))?,
    }))
}

/// One plan per (owner, month); writing again replaces the stored plan.
pub async fn upsert_budget_plan(
    pool: &DbPool,
    owner_id: i64,
    plan: &BudgetPlan,
) -> Result<(), sqlx::Error> {
    let targets = serde_json::to_string(&plan.targets).map_err(|e| decode_err(e.to_string()))?;
    let group_items =
        serde_json::to_string(&plan.group_items).map_err(|e| decode_err(e.to_string()))?;
    let manual_actuals =
        serde_json::to_string(&plan.manual_actuals).map_err(|e| decode_err(e.to_string()))?;
    let manual_cells =
        serde_json::to_string(&plan.manual_cells).map_err(|e| decode_err(e.to_string()))?;

    sqlx::query(
        "INSERT INTO budget_plans (owner_id, month_key, notes, targets, group_items, \
         manual_actuals, manual_cells, updated_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?, datetime('now')) \
         ON CONFLICT(owner_id, month_key) DO UPDATE SET \
         notes = excluded.notes, targets = excluded.targets, \
         group_items = excluded.group_items, manual_actuals = excluded.manual_actuals, \
         manual_cells = excluded.manual_cells, updated_at = excluded.updated_at",
    )
    .bind(owner_id)
    .bind(plan.month_key.to_string())
    .bind(&plan.notes)
    .bind(targets)
    .bind(group_items)
    .bind(manual_actuals)
    .bind(manual_cells)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn list_budget_months(
    pool: &DbPool,
    owner_id: i64,
) -> Result<Vec<MonthKey>, sqlx::Error> {
    let rows: Vec<(String,)> = sqlx::query_as(
        "SELECT month_key FROM budget_plans WHERE owner_id = ? ORDER BY month_key DESC",
    )
    .bind(owner_id)
    .fetch_all(pool)
    .await?;
    rows.into_iter()
        .map(|(raw,)| raw.parse().map_err(|_| decode_err(format!("bad month key: '{raw}'"))))
        .collect()
}

// ── Reports ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupBy {
    Category,
    Month,
    CategoryMonth,
}

#[derive(Debug, Clone, Default)]
pub struct ReportFilter {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub category: Option<String>,
    pub batch_id: Option<i64>,
    /// Summaries leave out the uncategorized sentinel unless asked.
    pub include_uncategorized: bool,
}

fn push_filter_conditions(qb: &mut QueryBuilder<'_, Sqlite>, filter: &ReportFilter) {
    if let Some(from) = filter.from {
        qb.push(" AND date >= ").push_bind(from.format("%Y-%m-%d").to_string());
    }
    if let Some(to) = filter.to {
        qb.push(" AND date < ").push_bind(to.format("%Y-%m-%d").to_string());
    }
    if let Some(category) = &filter.category {
        qb.push(" AND category = ").push_bind(category.clone());
    }
    if let Some(batch_id) = filter.batch_id {
        qb.push(" AND import_batch_id = ").push_bind(batch_id);
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SummaryRow {
    pub category: Option<String>,
    pub month: Option<String>,
    pub total: Money,
    pub count: i64,
}

pub async fn summarize_transactions(
    pool: &DbPool,
    owner_id: i64,
    filter: &ReportFilter,
    group_by: GroupBy,
) -> Result<Vec<SummaryRow>, sqlx::Error> {
    let (select, group) = match group_by {
        GroupBy::Category => ("category, NULL", "category"),
        GroupBy::Month => ("NULL, substr(date, 1, 7)", "substr(date, 1, 7)"),
        GroupBy::CategoryMonth => {
            ("category, substr(date, 1, 7)", "category, substr(date, 1, 7)")
        }
    };

    let mut qb = QueryBuilder::<Sqlite>::new(format!(
        "SELECT {select}, SUM(amount_cents), COUNT(*) FROM transactions WHERE owner_id = "
    ));
    qb.push_bind(owner_id);
    push_filter_conditions(&mut qb, filter);
    if !filter.include_uncategorized {
        qb.push(" AND category <> ").push_bind(UNCATEGORIZED);
    }
    qb.push(format!(" GROUP BY {group} ORDER BY SUM(ABS(amount_cents)) DESC"));

    let rows: Vec<(Option<String>, Option<String>, i64, i64)> =
        qb.build_query_as().fetch_all(pool).await?;
    Ok(rows
        .into_iter()
        .map(|(category, month, total_cents, count)| SummaryRow {
            category,
            month,
            total: Money::from_cents(total_cents),
            count,
        })
        .collect())
}

#[derive(Debug, Clone, PartialEq)]
pub struct MerchantRow {
    pub business_name: String,
    pub total: Money,
    pub count: i64,
}

/// Merchants ranked by absolute spend inside the filter window.
pub async fn top_merchants(
    pool: &DbPool,
    owner_id: i64,
    filter: &ReportFilter,
    limit: i64,
) -> Result<Vec<MerchantRow>, sqlx::Error> {
    let mut qb = QueryBuilder::<Sqlite>::new(
        "SELECT business_name, SUM(ABS(amount_cents)), COUNT(*) \
         FROM transactions WHERE owner_id = ",
    );
    qb.push_bind(owner_id);
    push_filter_conditions(&mut qb, filter);
    qb.push(" GROUP BY business_name ORDER BY SUM(ABS(amount_cents)) DESC LIMIT ");
    qb.push_bind(limit);

    let rows: Vec<(String, i64, i64)> = qb.build_query_as().fetch_all(pool).await?;
    Ok(rows
        .into_iter()
        .map(|(business_name, total_cents, count)| MerchantRow {
            business_name,
            total: Money::from_cents(total_cents),
            count,
        })
        .collect())
}
