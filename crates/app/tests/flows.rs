use heshbon::imports::CategorizeRequest;
use heshbon::{budgets, dashboard, imports, reports, Pagination, ServiceError};
use heshbon_core::{
    BatchStatus, BudgetPlanInput, DashboardConfig, GroupKey, MatchType, Money, SourceType,
    Transaction, ValueSource, UNCATEGORIZED,
};
use heshbon_storage::{db, DbPool, GroupBy};

const OWNER: i64 = 1;

async fn setup() -> (tempfile::TempDir, DbPool) {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    let dir = tempfile::tempdir().unwrap();
    let pool = db::create_db(&dir.path().join("heshbon.db")).await.unwrap();
    (dir, pool)
}

fn tx(batch_id: i64, date: &str, business: &str, cents: i64, category: &str) -> Transaction {
    Transaction {
        id: None,
        owner_id: OWNER,
        import_batch_id: batch_id,
        date: date.parse().unwrap(),
        business_name: business.to_string(),
        amount: Money::from_cents(cents),
        card_last4: None,
        raw_description: None,
        category: category.to_string(),
        matched_rule_id: None,
    }
}

async fn seed_batch(pool: &DbPool, transactions: &[Transaction]) -> i64 {
    let batch = db::create_batch(pool, OWNER, SourceType::Max, "seed.xlsx")
        .await
        .unwrap();
    let rows: Vec<Transaction> = transactions
        .iter()
        .map(|t| Transaction { import_batch_id: batch.id, ..t.clone() })
        .collect();
    db::insert_transactions(pool, &rows).await.unwrap();
    db::update_batch_status(pool, batch.id, BatchStatus::Done)
        .await
        .unwrap();
    batch.id
}

#[tokio::test]
async fn failed_import_keeps_the_batch_record() {
    let (_dir, pool) = setup().await;

    let err = imports::process_import(&pool, OWNER, b"not an xlsx", SourceType::Max, "bad.xlsx")
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Normalize(_)));

    let page = imports::list_batches(&pool, OWNER, Pagination::default())
        .await
        .unwrap();
    assert_eq!(page.total, 1);
    assert_eq!(page.data[0].status, BatchStatus::Failed);
    assert_eq!(page.data[0].original_file_name, "bad.xlsx");
}

#[tokio::test]
async fn recategorize_is_incremental_unless_forced() {
    let (_dir, pool) = setup().await;
    let batch_id = seed_batch(
        &pool,
        &[
            tx(0, "2026-02-01", "סופר יוחננוף", -10000, UNCATEGORIZED),
            tx(0, "2026-02-02", "פז דלק", -20000, "רכב"),
        ],
    )
    .await;

    // A new contains-rule for fuel arrives after the import.
    db::create_rule(
        &pool,
        &heshbon_core::DictionaryRule {
            id: None,
            owner_id: OWNER,
            match_type: MatchType::Contains,
            pattern: "סופר".to_string(),
            category: "מזון".to_string(),
            priority: 10,
            created_at: chrono::Utc::now(),
        },
    )
    .await
    .unwrap();
    db::create_rule(
        &pool,
        &heshbon_core::DictionaryRule {
            id: None,
            owner_id: OWNER,
            match_type: MatchType::Contains,
            pattern: "דלק".to_string(),
            category: "תחבורה".to_string(),
            priority: 10,
            created_at: chrono::Utc::now(),
        },
    )
    .await
    .unwrap();

    // Incremental pass only touches the uncategorized row.
    let outcome = imports::recategorize_batch(&pool, OWNER, batch_id, false)
        .await
        .unwrap();
    assert_eq!(outcome.updated_count, 1);
    assert_eq!(outcome.uncategorized_count, 0);
    let rows = db::get_all_batch_transactions(&pool, OWNER, batch_id, None)
        .await
        .unwrap();
    assert_eq!(rows[0].category, "מזון");
    assert!(rows[0].matched_rule_id.is_some());
    assert_eq!(rows[1].category, "רכב");

    // Forced pass reconsiders everything.
    let outcome = imports::recategorize_batch(&pool, OWNER, batch_id, true)
        .await
        .unwrap();
    assert_eq!(outcome.updated_count, 1);
    let rows = db::get_all_batch_transactions(&pool, OWNER, batch_id, None)
        .await
        .unwrap();
    assert_eq!(rows[1].category, "תחבורה");

    // A second forced pass changes nothing.
    let outcome = imports::recategorize_batch(&pool, OWNER, batch_id, true)
        .await
        .unwrap();
    assert_eq!(outcome.updated_count, 0);
}

#[tokio::test]
async fn manual_categorization_can_save_a_rule() {
    let (_dir, pool) = setup().await;
    let batch_id = seed_batch(
        &pool,
        &[tx(0, "2026-02-01", "מאפיית לחמים", -3000, UNCATEGORIZED)],
    )
    .await;
    let row = &db::get_all_batch_transactions(&pool, OWNER, batch_id, None)
        .await
        .unwrap()[0];

    let outcome = imports::categorize_transaction(
        &pool,
        OWNER,
        row.id.unwrap(),
        CategorizeRequest {
            category: " מאפים ".to_string(),
            save_to_dictionary: true,
            ..Default::default()
        },
    )
    .await
    .unwrap();
    assert_eq!(outcome.category, "מאפים");
    assert!(outcome.rule_created);

    // The override itself carries no rule link.
    let updated = db::get_transaction(&pool, OWNER, row.id.unwrap())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(updated.category, "מאפים");
    assert_eq!(updated.matched_rule_id, None);

    // The saved rule is an exact match on the business name.
    let rules = db::get_rules(&pool, OWNER).await.unwrap();
    assert_eq!(rules.len(), 1);
    assert_eq!(rules[0].match_type, MatchType::Exact);
    assert_eq!(rules[0].pattern, "מאפיית לחמים");
    assert_eq!(rules[0].priority, 100);

    // Blank category is rejected before any write.
    let err = imports::categorize_transaction(
        &pool,
        OWNER,
        row.id.unwrap(),
        CategorizeRequest { category: "  ".to_string(), ..Default::default() },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, ServiceError::Validation { .. }));
}

#[tokio::test]
async fn unknown_batch_is_not_found() {
    let (_dir, pool) = setup().await;
    let err = imports::recategorize_batch(&pool, OWNER, 42, false)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::NotFound("import batch")));
    let err = imports::delete_batch(&pool, OWNER, 42).await.unwrap_err();
    assert!(matches!(err, ServiceError::NotFound("import batch")));
}

#[tokio::test]
async fn delete_batch_removes_rows() {
    let (_dir, pool) = setup().await;
    let batch_id = seed_batch(&pool, &[tx(0, "2026-02-01", "א", -100, UNCATEGORIZED)]).await;

    let outcome = imports::delete_batch(&pool, OWNER, batch_id).await.unwrap();
    assert_eq!(outcome.deleted_transactions, 1);
    assert_eq!(
        imports::list_batches(&pool, OWNER, Pagination::default())
            .await
            .unwrap()
            .total,
        0
    );
}

#[tokio::test]
async fn csv_export_includes_bom_and_headers() {
    let (_dir, pool) = setup().await;
    let batch_id = seed_batch(
        &pool,
        &[tx(0, "2026-02-01", "קפה, בע\"מ", -1850, "בתי קפה")],
    )
    .await;

    let csv = imports::export_batch_csv(&pool, OWNER, batch_id).await.unwrap();
    assert!(csv.starts_with('\u{feff}'));
    let mut lines = csv.trim_start_matches('\u{feff}').split("\r\n");
    assert_eq!(
        lines.next().unwrap(),
        "date,businessName,amount,category,cardLast4,rawDescription"
    );
    let row = lines.next().unwrap();
    assert!(row.starts_with("2026-02-01,\"קפה, בע\"\"מ\",-18.50,"));
}

#[tokio::test]
async fn csv_export_quotes_embedded_line_breaks() {
    let (_dir, pool) = setup().await;
    // A bare CR inside a field must be quoted or a CRLF-framed reader
    // splits the record in two.
    let batch_id = seed_batch(
        &pool,
        &[tx(0, "2026-02-01", "חיוב\rמפוצל", -1000, "שונות")],
    )
    .await;

    let csv = imports::export_batch_csv(&pool, OWNER, batch_id).await.unwrap();
    let body = csv.trim_start_matches('\u{feff}');
    assert!(body.contains("\"חיוב\rמפוצל\""));

    let records: Vec<&str> = body.split("\r\n").filter(|l| !l.is_empty()).collect();
    assert_eq!(records.len(), 2, "header plus exactly one record");
}

#[tokio::test]
async fn outcome_and_page_envelopes_use_wire_names() {
    let (_dir, pool) = setup().await;
    seed_batch(&pool, &[tx(0, "2026-02-01", "א", -100, UNCATEGORIZED)]).await;

    let page = imports::list_batches(&pool, OWNER, Pagination::default())
        .await
        .unwrap();
    let json = serde_json::to_value(&page).unwrap();
    assert_eq!(json["total"], 1);
    assert_eq!(json["pages"], 1);
    assert_eq!(json["data"][0]["originalFileName"], "seed.xlsx");
    assert_eq!(json["data"][0]["sourceType"], "max");
    assert_eq!(json["data"][0]["status"], "done");

    let outcome = imports::ImportOutcome {
        import_batch_id: 7,
        inserted_count: 3,
        uncategorized_count: 1,
        skipped_rows: 2,
    };
    let json = serde_json::to_value(&outcome).unwrap();
    assert_eq!(json["importBatchId"], 7);
    assert_eq!(json["insertedCount"], 3);
    assert_eq!(json["uncategorizedCount"], 1);
    assert_eq!(json["skippedRows"], 2);
}

#[tokio::test]
async fn budget_round_trip_and_cell_patch() {
    let (_dir, pool) = setup().await;

    // Default plan for an untouched month.
    let plan = budgets::get_budget_plan(&pool, OWNER, "2026-02").await.unwrap();
    assert!(plan.targets.is_empty());

    let mut input = BudgetPlanInput::default();
    input.targets.insert(GroupKey::FixedBills, Some(500.0));
    let plan = budgets::upsert_budget_plan(&pool, OWNER, "2026-02", input)
        .await
        .unwrap();
    assert_eq!(plan.targets[&GroupKey::FixedBills], Money::from_cents(50000));

    let plan = budgets::patch_budget_cell(
        &pool,
        OWNER,
        "2026-02",
        "overview.fixedBills.actual",
        Some(450.0),
    )
    .await
    .unwrap();
    assert_eq!(plan.manual_cells.len(), 1);

    // Null value removes the override.
    let plan = budgets::patch_budget_cell(&pool, OWNER, "2026-02", "overview.fixedBills.actual", None)
        .await
        .unwrap();
    assert!(plan.manual_cells.is_empty());

    let err = budgets::patch_budget_cell(&pool, OWNER, "2026-2", "x", Some(1.0))
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Validation { .. }));

    assert_eq!(
        budgets::list_budget_months(&pool, OWNER).await.unwrap().len(),
        1
    );
}

#[tokio::test]
async fn dashboard_resolves_manual_cell_over_transactions() {
    let (_dir, pool) = setup().await;
    seed_batch(
        &pool,
        &[
            tx(0, "2026-02-03", "עיריית חיפה", -60000, "ארנונה"),
            tx(0, "2026-02-05", "חברת חשמל", -40000, "חשמל"),
            tx(0, "2026-03-01", "לא החודש", -99900, "ארנונה"),
        ],
    )
    .await;

    let mut input = BudgetPlanInput::default();
    input.targets.insert(GroupKey::FixedBills, Some(500.0));
    budgets::upsert_budget_plan(&pool, OWNER, "2026-02", input)
        .await
        .unwrap();

    let config = DashboardConfig::default();
    let view = dashboard::monthly_dashboard(&pool, OWNER, "2026-02", &config)
        .await
        .unwrap();
    let row = view
        .overview_table
        .iter()
        .find(|r| r.key == GroupKey::FixedBills)
        .unwrap();
    // Transactions in the month sum to 1000, March stays out.
    assert_eq!(row.actual.value, Money::from_cents(100000));
    assert_eq!(row.actual.source, ValueSource::Auto);

    budgets::patch_budget_cell(&pool, OWNER, "2026-02", "overview.fixedBills.actual", Some(450.0))
        .await
        .unwrap();
    let view = dashboard::monthly_dashboard(&pool, OWNER, "2026-02", &config)
        .await
        .unwrap();
    let row = view
        .overview_table
        .iter()
        .find(|r| r.key == GroupKey::FixedBills)
        .unwrap();
    assert_eq!(row.actual.value, Money::from_cents(45000));
    assert_eq!(row.actual.source, ValueSource::Manual);
    assert_eq!(row.target.value, Money::from_cents(50000));
}

#[tokio::test]
async fn reports_accept_month_keys() {
    let (_dir, pool) = setup().await;
    seed_batch(
        &pool,
        &[
            tx(0, "2026-02-01", "סופר שלי", -10000, "מזון"),
            tx(0, "2026-03-01", "סופר שלי", -5000, "מזון"),
        ],
    )
    .await;

    let query = reports::ReportQuery { month: Some("2026-02".to_string()), ..Default::default() };
    let rows = reports::summarize(&pool, OWNER, &query, GroupBy::Category)
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].total, Money::from_cents(-10000));

    let merchants = reports::top_merchants(&pool, OWNER, &query, None).await.unwrap();
    assert_eq!(merchants[0].count, 1);

    let err = reports::summarize(
        &pool,
        OWNER,
        &reports::ReportQuery { month: Some("junk".to_string()), ..Default::default() },
        GroupBy::Month,
    )
    .await
    .unwrap_err();
    assert!(matches!(err, ServiceError::Validation { .. }));
}
