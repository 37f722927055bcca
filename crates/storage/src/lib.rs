//! SQLite persistence. Amounts are stored as integer cents, dates as ISO
//! text, and budget plans as JSON columns keyed by (owner, month).

pub mod db;

pub use db::{
    bulk_update_categories, count_batch_transactions, count_batches, count_uncategorized,
    create_batch, create_db, create_rule, delete_batch, delete_batch_transactions, delete_rule,
    find_budget_plan, get_all_batch_transactions, get_batch, get_batch_transactions,
    get_rules, get_transaction, get_transactions_in_range, get_uncategorized, insert_transactions,
    list_batches, list_budget_months, set_transaction_category, summarize_transactions,
    top_merchants, update_batch_status, update_rule, upsert_budget_plan, CategoryUpdate, DbPool,
    GroupBy, MerchantRow, ReportFilter, SummaryRow,
};
