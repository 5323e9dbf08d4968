mod common;

use async_trait::async_trait;
use catalog_fix::classify::keyword::{KeywordClassifier, KeywordRule};
use catalog_fix::config::RunOptions;
use catalog_fix::core::processor::{self, engine_categories, universal_manufacturers, Operator, Task};
use catalog_fix::error::AppResult;
use common::{record, FakeStore};
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

struct ScriptedOperator {
    answer: bool,
    asked: AtomicUsize,
}

impl ScriptedOperator {
    fn answering(answer: bool) -> Self {
        ScriptedOperator {
            answer,
            asked: AtomicUsize::new(0),
        }
    }

    fn times_asked(&self) -> usize {
        self.asked.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Operator for ScriptedOperator {
    async fn confirm(&self, _question: &str) -> AppResult<bool> {
        self.asked.fetch_add(1, Ordering::SeqCst);
        Ok(self.answer)
    }
}

fn universal_store() -> Arc<FakeStore> {
    let store = Arc::new(FakeStore::new());
    store.insert(
        "products",
        vec![
            record(json!({"id": 1, "name": "Фильтр  Foton 244", "manufacturer": "UNIVERSAL"})),
            record(json!({"id": 2, "name": "Насос ДонгФенг", "manufacturer": "UNIVERSAL"})),
            record(json!({"id": 3, "name": "Насос масляный", "manufacturer": "UNIVERSAL"})),
            record(json!({"id": 4, "name": "Ремень ЗУБР", "manufacturer": "UNIVERSAL"})),
            record(json!({"id": 5, "name": "Foton крышка", "manufacturer": "Foton"})),
            record(json!({"id": 6, "name": "Фотон шайба", "manufacturer": "UNIVERSAL"})),
        ],
    );
    store
}

fn engine_store() -> Arc<FakeStore> {
    let store = Arc::new(FakeStore::new());
    store.insert(
        "products",
        vec![
            record(json!({"id": 1, "title": "Двигатель 24 л.с. ZUBR", "category": "Запчасти"})),
            record(json!({"id": 2, "title": "Двигатель 15 л.с.", "category": "ДВС в сборе"})),
            record(json!({"id": 3, "title": "Редуктор двигатель 10 л.с.", "category": "Запчасти"})),
            record(json!({"id": 4, "title": "Двигатель R190 10 л.с.", "category": null})),
            record(json!({"id": 5, "title": "Шестерня", "category": "Запчасти"})),
        ],
    );
    store
}

fn paged(page_size: usize) -> RunOptions {
    RunOptions {
        page_size,
        ..RunOptions::default()
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn universal_products_get_reassigned_in_groups() {
    let store = universal_store();
    let report = universal_manufacturers(
        store.clone(),
        paged(2),
        KeywordClassifier::default_manufacturers(),
    )
    .await
    .unwrap();

    let s = report.snapshot();
    assert_eq!(report.observed(), 5);
    assert_eq!(s.updated, 4);
    assert_eq!(s.skipped, 1);
    assert_eq!(s.failed, 0);
    assert_eq!(report.note("Found"), Some("5"));
    assert_eq!(report.note("Reassigned"), Some("4"));
    assert_eq!(report.note("Remaining"), Some("1"));

    // One grouped write per distinct manufacturer.
    let writes = store.writes();
    assert_eq!(writes.len(), 3);
    let foton = writes
        .iter()
        .find(|w| w.fields["manufacturer"] == json!("Foton"))
        .unwrap();
    assert_eq!(foton.ids, vec![1, 6]);

    assert_eq!(store.row("products", 2).unwrap().fields["manufacturer"], json!("DongFeng"));
    assert_eq!(store.row("products", 3).unwrap().fields["manufacturer"], json!("UNIVERSAL"));
    assert_eq!(store.row("products", 4).unwrap().fields["manufacturer"], json!("ZUBR"));
}

#[tokio::test]
async fn universal_reads_everything_before_writing() {
    let store = universal_store();
    universal_manufacturers(store.clone(), paged(2), KeywordClassifier::default_manufacturers())
        .await
        .unwrap();

    let offsets: Vec<usize> = store.fetches().iter().map(|(_, o, _)| *o).collect();
    assert_eq!(offsets, vec![0, 2, 4]);
}

#[tokio::test]
async fn custom_rules_replace_defaults() {
    let store = universal_store();
    let rules = KeywordClassifier::new(vec![KeywordRule {
        target: "Pumps Inc".to_string(),
        keywords: vec!["насос".to_string()],
    }])
    .unwrap();

    let report = processor::run(
        Task::UniversalManufacturers,
        store.clone(),
        paged(100),
        Some(rules),
        &ScriptedOperator::answering(false),
    )
    .await
    .unwrap();

    assert_eq!(report.snapshot().updated, 2);
    assert_eq!(report.snapshot().skipped, 3);
    assert_eq!(store.row("products", 2).unwrap().fields["manufacturer"], json!("Pumps Inc"));
    assert_eq!(store.row("products", 1).unwrap().fields["manufacturer"], json!("UNIVERSAL"));
}

#[tokio::test]
async fn universal_dry_run_only_reports() {
    let store = universal_store();
    let report = universal_manufacturers(
        store.clone(),
        RunOptions {
            dry_run: true,
            ..paged(2)
        },
        KeywordClassifier::default_manufacturers(),
    )
    .await
    .unwrap();

    assert!(store.writes().is_empty());
    assert_eq!(report.snapshot().skipped, 5);
    assert_eq!(report.note("Planned (dry run)"), Some("4"));
    assert_eq!(report.note("Remaining"), None);
}

#[tokio::test]
async fn declined_engine_plan_writes_nothing() {
    let store = engine_store();
    let operator = ScriptedOperator::answering(false);

    let report = engine_categories(store.clone(), paged(10), &operator)
        .await
        .unwrap();

    assert_eq!(operator.times_asked(), 1);
    assert!(store.writes().is_empty());
    let s = report.snapshot();
    assert_eq!(report.observed(), 4);
    assert_eq!(s.skipped, 4);
    assert_eq!(s.updated, 0);
    assert_eq!(report.note("Declined"), Some("2"));
}

#[tokio::test]
async fn approved_engine_plan_moves_records() {
    let store = engine_store();
    let operator = ScriptedOperator::answering(true);

    let report = processor::run(Task::EngineCategories, store.clone(), paged(10), None, &operator)
        .await
        .unwrap();

    let s = report.snapshot();
    assert_eq!(s.updated, 2);
    assert_eq!(s.skipped, 2);
    assert_eq!(report.exit_code(), 0);

    let mut written: Vec<i64> = store.writes().iter().flat_map(|w| w.ids.clone()).collect();
    written.sort_unstable();
    assert_eq!(written, vec![1, 4]);
    for id in [1, 4] {
        assert_eq!(
            store.row("products", id).unwrap().fields["category"],
            json!("ДВС в сборе")
        );
    }
    assert_eq!(
        store.row("products", 3).unwrap().fields["category"],
        json!("Запчасти")
    );
}

#[tokio::test]
async fn assume_yes_skips_the_question() {
    let store = engine_store();
    let operator = ScriptedOperator::answering(false);

    let report = engine_categories(
        store.clone(),
        RunOptions {
            assume_yes: true,
            ..paged(10)
        },
        &operator,
    )
    .await
    .unwrap();

    assert_eq!(operator.times_asked(), 0);
    assert_eq!(report.snapshot().updated, 2);
}

#[tokio::test]
async fn engine_dry_run_never_asks() {
    let store = engine_store();
    let operator = ScriptedOperator::answering(true);

    let report = engine_categories(
        store.clone(),
        RunOptions {
            dry_run: true,
            ..paged(10)
        },
        &operator,
    )
    .await
    .unwrap();

    assert_eq!(operator.times_asked(), 0);
    assert!(store.writes().is_empty());
    assert_eq!(report.snapshot().skipped, 4);
}

#[tokio::test]
async fn failed_engine_write_sets_exit_code() {
    let store = engine_store();
    store.fail_writes_for(&[4]);

    let report = engine_categories(store.clone(), paged(10), &ScriptedOperator::answering(true))
        .await
        .unwrap();

    let s = report.snapshot();
    assert_eq!(s.updated, 1);
    assert_eq!(s.failed, 1);
    assert_eq!(s.total(), report.observed());
    assert_eq!(report.exit_code(), 1);
}
