use heshbon_core::{
    ImportBatch, BatchStatus, MatchType, SourceType, Transaction, UNCATEGORIZED,
};
use heshbon_import::RuleEngine;
use heshbon_storage::{db, CategoryUpdate, DbPool};
use serde::Serialize;

use crate::error::{ServiceError, ServiceResult};
use crate::pagination::{Page, Pagination};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportOutcome {
    pub import_batch_id: i64,
    pub inserted_count: usize,
    pub uncategorized_count: usize,
    pub skipped_rows: usize,
}

/// Runs the full intake pipeline for one uploaded file: create the batch,
/// normalize, categorize against the owner's dictionary, insert. The batch
/// record always survives — `done` on success, `failed` otherwise — so the
/// user can see what happened to every upload.
pub async fn process_import(
    pool: &DbPool,
    owner_id: i64,
    bytes: &[u8],
    source_type: SourceType,
    original_file_name: &str,
) -> ServiceResult<ImportOutcome> {
    let batch = db::create_batch(pool, owner_id, source_type, original_file_name).await?;

    match ingest(pool, owner_id, batch.id, bytes).await {
        Ok(outcome) => {
            db::update_batch_status(pool, batch.id, BatchStatus::Done).await?;
            tracing::info!(
                batch_id = batch.id,
                inserted = outcome.inserted_count,
                uncategorized = outcome.uncategorized_count,
                "import finished"
            );
            Ok(outcome)
        }
        Err(err) => {
            if let Err(status_err) =
                db::update_batch_status(pool, batch.id, BatchStatus::Failed).await
            {
                tracing::error!(batch_id = batch.id, error = %status_err, "could not mark batch failed");
            }
            Err(err)
        }
    }
}

async fn ingest(
    pool: &DbPool,
    owner_id: i64,
    batch_id: i64,
    bytes: &[u8],
) -> ServiceResult<ImportOutcome> {
    let normalized = heshbon_import::normalize(bytes)?;

    let rules = db::get_rules(pool, owner_id).await?;
    let engine = RuleEngine::new(rules);
    if engine.regex_error_count() > 0 {
        tracing::warn!(
            count = engine.regex_error_count(),
            "dictionary has rules with invalid regex patterns"
        );
    }

    let mut uncategorized_count = 0;
    let transactions: Vec<Transaction> = normalized
        .transactions
        .into_iter()
        .map(|tx| {
            let rule = engine.categorize(&tx.business_name);
            if rule.is_none() {
                uncategorized_count += 1;
            }
            Transaction {
                id: None,
                owner_id,
                import_batch_id: batch_id,
                date: tx.date,
                business_name: tx.business_name,
                amount: tx.amount,
                card_last4: tx.card_last4,
                raw_description: tx.raw_description,
                category: rule
                    .map(|r| r.category.clone())
                    .unwrap_or_else(|| UNCATEGORIZED.to_string()),
                matched_rule_id: rule.and_then(|r| r.id),
            }
        })
        .collect();

    db::insert_transactions(pool, &transactions).await?;

    Ok(ImportOutcome {
        import_batch_id: batch_id,
        inserted_count: transactions.len(),
        uncategorized_count,
        skipped_rows: normalized.skipped_rows,
    })
}

// ── Listing ───────────────────────────────────────────────────────────────────

pub async fn list_batches(
    pool: &DbPool,
    owner_id: i64,
    pagination: Pagination,
) -> ServiceResult<Page<ImportBatch>> {
    let batches = db::list_batches(pool, owner_id, pagination.limit, pagination.offset()).await?;
    let total = db::count_batches(pool, owner_id).await?;
    Ok(Page::new(batches, pagination, total))
}

pub async fn list_batch_transactions(
    pool: &DbPool,
    owner_id: i64,
    batch_id: i64,
    category: Option<&str>,
    pagination: Pagination,
) -> ServiceResult<Page<Transaction>> {
    require_batch(pool, owner_id, batch_id).await?;
    let transactions = db::get_batch_transactions(
        pool,
        owner_id,
        batch_id,
        category,
        pagination.limit,
        pagination.offset(),
    )
    .await?;
    let total = db::count_batch_transactions(pool, owner_id, batch_id, category).await?;
    Ok(Page::new(transactions, pagination, total))
}

pub async fn list_uncategorized(
    pool: &DbPool,
    owner_id: i64,
    batch_id: Option<i64>,
    pagination: Pagination,
) -> ServiceResult<Page<Transaction>> {
    let transactions =
        db::get_uncategorized(pool, owner_id, batch_id, pagination.limit, pagination.offset())
            .await?;
    let total = db::count_uncategorized(pool, owner_id, batch_id).await?;
    Ok(Page::new(transactions, pagination, total))
}

async fn require_batch(
    pool: &DbPool,
    owner_id: i64,
    batch_id: i64,
) -> ServiceResult<ImportBatch> {
    db::get_batch(pool, owner_id, batch_id)
        .await?
        .ok_or(ServiceError::NotFound("import batch"))
}

// ── Manual categorization ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
pub struct CategorizeRequest {
    pub category: String,
    pub save_to_dictionary: bool,
    pub match_type: Option<MatchType>,
    pub pattern: Option<String>,
    pub priority: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategorizeOutcome {
    pub transaction_id: i64,
    pub category: String,
    pub rule_created: bool,
}

/// Sets one transaction's category by hand. The rule link is cleared — a
/// human override is not a rule hit. Optionally saves the choice to the
/// dictionary so future imports pick it up (exact match on the business
/// name at priority 100 unless told otherwise).
pub async fn categorize_transaction(
    pool: &DbPool,
    owner_id: i64,
    transaction_id: i64,
    request: CategorizeRequest,
) -> ServiceResult<CategorizeOutcome> {
    let category = request.category.trim().to_string();
    if category.is_empty() {
        return Err(ServiceError::validation("category is required"));
    }

    let tx = db::get_transaction(pool, owner_id, transaction_id)
        .await?
        .ok_or(ServiceError::NotFound("transaction"))?;

    db::set_transaction_category(pool, owner_id, transaction_id, &category, None).await?;

    let mut rule_created = false;
    if request.save_to_dictionary {
        let rule = heshbon_core::DictionaryRule {
            id: None,
            owner_id,
            match_type: request.match_type.unwrap_or(MatchType::Exact),
            pattern: request.pattern.unwrap_or(tx.business_name),
            category: category.clone(),
            priority: request.priority.unwrap_or(100),
            created_at: chrono::Utc::now(),
        };
        db::create_rule(pool, &rule).await?;
        rule_created = true;
    }

    Ok(CategorizeOutcome { transaction_id, category, rule_created })
}

// ── Recategorization ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecategorizeOutcome {
    pub import_batch_id: i64,
    pub updated_count: usize,
    pub uncategorized_count: usize,
}

/// Re-runs the dictionary over a batch. Incremental mode touches only
/// still-uncategorized rows; `force` reconsiders everything. Rows whose
/// category and rule link would not change are left alone, so the write
/// set is the real diff.
pub async fn recategorize_batch(
    pool: &DbPool,
    owner_id: i64,
    batch_id: i64,
    force: bool,
) -> ServiceResult<RecategorizeOutcome> {
    require_batch(pool, owner_id, batch_id).await?;

    let rules = db::get_rules(pool, owner_id).await?;
    let engine = RuleEngine::new(rules);

    let only_category = if force { None } else { Some(UNCATEGORIZED) };
    let transactions =
        db::get_all_batch_transactions(pool, owner_id, batch_id, only_category).await?;

    let mut updates = Vec::new();
    let mut uncategorized_count = 0;

    for tx in &transactions {
        let rule = engine.categorize(&tx.business_name);
        let new_category = rule.map(|r| r.category.as_str()).unwrap_or(UNCATEGORIZED);
        let new_rule_id = rule.and_then(|r| r.id);
        if rule.is_none() {
            uncategorized_count += 1;
        }

        let Some(transaction_id) = tx.id else { continue };
        if tx.category != new_category || tx.matched_rule_id != new_rule_id {
            updates.push(CategoryUpdate {
                transaction_id,
                category: new_category.to_string(),
                matched_rule_id: new_rule_id,
            });
        }
    }

    if !updates.is_empty() {
        db::bulk_update_categories(pool, owner_id, &updates).await?;
    }

    Ok(RecategorizeOutcome {
        import_batch_id: batch_id,
        updated_count: updates.len(),
        uncategorized_count,
    })
}

// ── Deletion ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteOutcome {
    pub import_batch_id: i64,
    pub deleted_transactions: u64,
}

pub async fn delete_batch(
    pool: &DbPool,
    owner_id: i64,
    batch_id: i64,
) -> ServiceResult<DeleteOutcome> {
    require_batch(pool, owner_id, batch_id).await?;
    let deleted_transactions = db::delete_batch_transactions(pool, owner_id, batch_id).await?;
    db::delete_batch(pool, owner_id, batch_id).await?;
    Ok(DeleteOutcome { import_batch_id: batch_id, deleted_transactions })
}

// ── CSV export ────────────────────────────────────────────────────────────────

const CSV_HEADERS: [&str; 6] = [
    "date",
    "businessName",
    "amount",
    "category",
    "cardLast4",
    "rawDescription",
];

/// Renders a batch as UTF-8 CSV with a BOM so Excel opens the Hebrew text
/// correctly. CRLF record endings for the same reason.
pub async fn export_batch_csv(
    pool: &DbPool,
    owner_id: i64,
    batch_id: i64,
) -> ServiceResult<String> {
    require_batch(pool, owner_id, batch_id).await?;
    let transactions = db::get_all_batch_transactions(pool, owner_id, batch_id, None).await?;

    let mut writer = csv::WriterBuilder::new()
        .terminator(csv::Terminator::CRLF)
        .from_writer(Vec::new());
    writer.write_record(CSV_HEADERS)?;
    for tx in &transactions {
        writer.write_record([
            tx.date.format("%Y-%m-%d").to_string(),
            tx.business_name.clone(),
            tx.amount.to_string(),
            tx.category.clone(),
            tx.card_last4.clone().unwrap_or_default(),
            tx.raw_description.clone().unwrap_or_default(),
        ])?;
    }
    let bytes = writer.into_inner().map_err(|err| csv::Error::from(err.into_error()))?;

    Ok(format!("\u{feff}{}", String::from_utf8_lossy(&bytes)))
}
