use chrono::{TimeDelta, TimeZone, Utc};
use sea_orm::{ConnectionTrait, Database, DatabaseConnection, Statement};

use engine::{
    CategoryType, CreateCategoryCmd, CreateTransactionCmd, Engine, EngineError, ErrorKind,
    LineDetailsInput, PageRequest, PeriodRange, SummaryPeriod, TransactionListFilter,
    TransactionType,
};
use migration::MigratorTrait;
use uuid::Uuid;

async fn engine_with_db() -> (Engine, DatabaseConnection) {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    migration::Migrator::up(&db, None).await.unwrap();
    let engine = Engine::builder()
        .database(db.clone())
        .build()
        .await
        .unwrap();
    (engine, db)
}

async fn count(db: &DatabaseConnection, table: &str) -> i64 {
    let backend = db.get_database_backend();
    let row = db
        .query_one(Statement::from_string(
            backend,
            format!("SELECT COUNT(*) AS n FROM {table}"),
        ))
        .await
        .unwrap()
        .unwrap();
    row.try_get::<i64>("", "n").unwrap()
}

async fn category(engine: &Engine) -> Uuid {
    engine
        .create_category(
            CreateCategoryCmd::new("Linhas intermunicipais", vec![CategoryType::Line])
                .description("Custos por linha"),
        )
        .await
        .unwrap()
        .id()
}

#[tokio::test]
async fn creates_transaction_with_line_details_atomically() {
    let (engine, db) = engine_with_db().await;
    let category_id = category(&engine).await;

    let tx = engine
        .create_transaction(
            CreateTransactionCmd::new(category_id, "Linha 510 ida e volta", TransactionType::Expense)
                .user_id(9)
                .line_details(LineDetailsInput::new(35.5, 35.5, 4.25)),
        )
        .await
        .unwrap();

    assert_eq!(tx.amount().minor_units(), 7_525);
    assert_eq!(count(&db, "transactions").await, 1);
    assert_eq!(count(&db, "transaction_line_details").await, 1);

    let stored = engine.transaction(tx.id()).await.unwrap().unwrap();
    assert_eq!(stored.amount(), tx.amount());
    assert_eq!(stored.line_details_id(), tx.line_details_id());
    assert_eq!(stored.kind(), TransactionType::Expense);

    let details = engine.line_details(tx.id()).await.unwrap().unwrap();
    assert_eq!(details.total(), tx.amount());
    assert_eq!(details.amount_go().minor_units(), 3_550);
    assert_eq!(details.drive_change().minor_units(), 425);
}

#[tokio::test]
async fn unknown_category_rolls_back() {
    let (engine, db) = engine_with_db().await;
    category(&engine).await;

    let err = engine
        .create_transaction(
            CreateTransactionCmd::new(Uuid::new_v4(), "Linha 510", TransactionType::Expense)
                .line_details(LineDetailsInput::new(1.0, 1.0, 1.0)),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, EngineError::KeyNotFound(_)));
    assert_eq!(count(&db, "transactions").await, 0);
    assert_eq!(count(&db, "transaction_line_details").await, 0);
}

#[tokio::test]
async fn failed_transaction_insert_discards_line_details() {
    let (engine, db) = engine_with_db().await;
    let category_id = category(&engine).await;
    db.execute_unprepared("DROP TABLE transactions")
        .await
        .unwrap();

    let err = engine
        .create_transaction(
            CreateTransactionCmd::new(category_id, "Linha 510", TransactionType::Expense)
                .line_details(LineDetailsInput::new(10.0, 10.0, 0.0)),
        )
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Persistence);
    assert_eq!(count(&db, "transaction_line_details").await, 0);
}

#[tokio::test]
async fn invalid_description_commits_nothing() {
    let (engine, db) = engine_with_db().await;
    let category_id = category(&engine).await;

    let err = engine
        .create_transaction(
            CreateTransactionCmd::new(category_id, "ab", TransactionType::Income)
                .line_details(LineDetailsInput::new(10.0, 10.0, 0.0)),
        )
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Validation);
    assert_eq!(count(&db, "transactions").await, 0);
    assert_eq!(count(&db, "transaction_line_details").await, 0);
}

#[tokio::test]
async fn duplicate_category_name_is_rejected() {
    let (engine, db) = engine_with_db().await;
    category(&engine).await;

    let err = engine
        .create_category(CreateCategoryCmd::new(
            "LINHAS   intermunicipais",
            vec![CategoryType::Agency],
        ))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Conflict);
    assert_eq!(count(&db, "transaction_categories").await, 1);
}

#[tokio::test]
async fn lists_transactions_with_category_and_filters() {
    let (engine, _db) = engine_with_db().await;
    let category_id = category(&engine).await;
    let other = engine
        .create_category(CreateCategoryCmd::new("Salários", vec![CategoryType::Common]))
        .await
        .unwrap()
        .id();

    for (day, cat, kind) in [
        (1, category_id, TransactionType::Expense),
        (2, other, TransactionType::Income),
        (3, category_id, TransactionType::Expense),
    ] {
        engine
            .create_transaction(
                CreateTransactionCmd::new(cat, format!("Movimento {day}"), kind)
                    .amount(10.0)
                    .created_at(Utc.with_ymd_and_hms(2025, 2, day, 8, 0, 0).unwrap()),
            )
            .await
            .unwrap();
    }

    let page = engine
        .list_transactions(
            &TransactionListFilter {
                category_id: Some(category_id),
                ..TransactionListFilter::default()
            },
            PageRequest::default(),
        )
        .await
        .unwrap();
    assert_eq!(page.item_count, 2);
    assert_eq!(page.items[0].transaction.description(), "Movimento 3");
    assert_eq!(
        page.items[0].category_name.as_deref(),
        Some("Linhas intermunicipais")
    );
    assert_eq!(
        page.items[0].category_description.as_deref(),
        Some("Custos por linha")
    );

    let incomes = engine
        .list_transactions(
            &TransactionListFilter {
                kind: Some(TransactionType::Income),
                ..TransactionListFilter::default()
            },
            PageRequest::default(),
        )
        .await
        .unwrap();
    assert_eq!(incomes.item_count, 1);
    assert_eq!(incomes.items[0].category_name.as_deref(), Some("Salários"));

    let err = engine
        .list_transactions(&TransactionListFilter::default(), PageRequest { page: 0, take: 10 })
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
}

#[tokio::test]
async fn summary_reads_stored_window() {
    let (engine, db) = engine_with_db().await;
    let category_id = category(&engine).await;
    let now = Utc.with_ymd_and_hms(2025, 6, 15, 12, 0, 0).unwrap();
    let range = PeriodRange::resolve(SummaryPeriod::Last30Days, now, chrono_tz::UTC).unwrap();
    let ms = TimeDelta::milliseconds(1);

    for (kind, amount, at) in [
        (TransactionType::Income, 100.0, Utc.with_ymd_and_hms(2025, 6, 10, 9, 0, 0).unwrap()),
        (TransactionType::Expense, -40.0, Utc.with_ymd_and_hms(2025, 6, 10, 17, 30, 0).unwrap()),
        (TransactionType::Expense, 15.0, range.start),
        (TransactionType::Income, 7.0, range.end),
        (TransactionType::Income, 999.0, range.start - ms),
        (TransactionType::Income, 500.0, range.end + ms),
        (TransactionType::Income, 250.0, Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()),
    ] {
        engine
            .create_transaction(
                CreateTransactionCmd::new(category_id, "Movimento", kind)
                    .amount(amount)
                    .created_at(at),
            )
            .await
            .unwrap();
    }

    // A type written by another client, inside the window.
    db.execute_unprepared("UPDATE transactions SET kind = 'TRANSFER' WHERE amount_minor = 25000")
        .await
        .unwrap();

    let summary = engine
        .summary_at(SummaryPeriod::Last30Days, now)
        .await
        .unwrap();

    assert_eq!(summary.total_income.minor_units(), 10_700);
    assert_eq!(summary.total_expense.minor_units(), 5_500);
    assert_eq!(summary.net_total.minor_units(), 5_200);
    assert_eq!(summary.breakdown.len(), 31);

    let entries = summary.breakdown.entries();
    assert_eq!(entries[0].0, "2025-05-16");
    assert_eq!(entries[0].2.minor_units(), 1_500);
    let june_1 = entries.iter().find(|(k, _, _)| *k == "2025-06-01").unwrap();
    assert!(june_1.1.is_zero());
    let june_10 = entries.iter().find(|(k, _, _)| *k == "2025-06-10").unwrap();
    assert_eq!(june_10.1.minor_units(), 10_000);
    assert_eq!(june_10.2.minor_units(), 4_000);
    assert_eq!(entries[30].0, "2025-06-15");
    assert_eq!(entries[30].1.minor_units(), 700);

    let yearly = engine
        .summary_at(SummaryPeriod::TwelveMonths, now)
        .await
        .unwrap();
    assert_eq!(yearly.breakdown.len(), 13);
    assert_eq!(yearly.total_income.minor_units(), 160_600);
    assert_eq!(yearly.total_expense.minor_units(), 5_500);
}

#[tokio::test]
async fn builder_requires_storage() {
    let err = Engine::builder().build().await.unwrap_err();
    assert!(matches!(err, EngineError::Configuration(_)));
}
