use crate::api::query::{Filter, ReadQuery};
use crate::api::store::RemoteStore;
use crate::classify::keyword::KeywordClassifier;
use crate::classify::lookup::LookupClassifier;
use crate::classify::predicate::PredicateClassifier;
use crate::config::{self, RunOptions};
use crate::core::applier::{ApplyMode, ConcurrentApplier, PlannedWrite};
use crate::core::chunked::{group_intents, ChunkedWriter};
use crate::core::fetcher::BatchFetcher;
use crate::core::stats::{RunCounters, RunReport};
use crate::error::AppResult;
use crate::logging::{log, LogLevel};
use crate::model::record::FieldRead;
use crate::utils;
use async_trait::async_trait;
use chrono::Utc;
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Task {
    /// Set products.category_id from specifications.category via the categories table.
    AssignCategories,
    /// Reassign UNIVERSAL products to a manufacturer found in their name.
    UniversalManufacturers,
    /// Move complete engines into the assembled-engines category (asks first).
    EngineCategories,
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Task::AssignCategories => "assign-categories",
            Task::UniversalManufacturers => "universal-manufacturers",
            Task::EngineCategories => "engine-categories",
        })
    }
}

/// Whoever approves a batch of writes before they are sent.
#[async_trait]
pub trait Operator: Send + Sync {
    async fn confirm(&self, question: &str) -> AppResult<bool>;
}

/// Approves everything; used for `--yes`.
pub struct AutoApprove;

#[async_trait]
impl Operator for AutoApprove {
    async fn confirm(&self, _question: &str) -> AppResult<bool> {
        Ok(true)
    }
}

pub fn is_affirmative(answer: &str) -> bool {
    matches!(answer.trim().to_lowercase().as_str(), "yes" | "y")
}

pub async fn run<S: RemoteStore + 'static>(
    task: Task,
    store: Arc<S>,
    options: RunOptions,
    keyword_rules: Option<KeywordClassifier>,
    operator: &dyn Operator,
) -> AppResult<RunReport> {
    options.validate()?;
    let start_ts_str = Utc::now().format("%Y-%m-%d %H:%M:%S %Z").to_string();
    log(
        LogLevel::Step,
        &format!(
            "Starting {} at {}{}",
            task,
            start_ts_str,
            if options.dry_run { " (dry run)" } else { "" }
        ),
    );

    match task {
        Task::AssignCategories => assign_categories(store, options).await,
        Task::UniversalManufacturers => {
            let classifier =
                keyword_rules.unwrap_or_else(KeywordClassifier::default_manufacturers);
            universal_manufacturers(store, options, classifier).await
        }
        Task::EngineCategories => engine_categories(store, options, operator).await,
    }
}

fn mode_for(options: &RunOptions) -> ApplyMode {
    if options.dry_run {
        ApplyMode::DryRun
    } else {
        ApplyMode::Write
    }
}

/// Dry-run plans are never sent; their records close out as skipped.
fn settle_unsent(report: &mut RunReport, planned: usize, why: &str) {
    report.counters().add_skipped(planned);
    report.add_note(why, planned);
}

pub async fn assign_categories<S: RemoteStore + 'static>(
    store: Arc<S>,
    options: RunOptions,
) -> AppResult<RunReport> {
    let counters = RunCounters::new();
    let mut report = RunReport::new(&Task::AssignCategories.to_string(), counters.clone());

    log(LogLevel::Step, "--- Phase 1: Category Lookup Load ---");
    let category_query = ReadQuery::table(config::TABLE_CATEGORIES)
        .select(&[config::FIELD_ID, config::FIELD_SLUG]);
    let category_rows = BatchFetcher::new(store.as_ref(), category_query, options.page_size)
        .collect_all()
        .await?;
    let classifier = LookupClassifier::from_category_rows(&category_rows)?;
    log(
        LogLevel::Success,
        &format!("Loaded {} category slug(s).", classifier.len()),
    );

    log(LogLevel::Step, "--- Phase 2: Product Classification ---");
    let applier = ConcurrentApplier::new(
        store.clone(),
        Arc::new(classifier),
        config::TABLE_PRODUCTS,
        options.concurrency,
        counters,
    );
    let query = ReadQuery::table(config::TABLE_PRODUCTS).select(&[
        config::FIELD_ID,
        config::FIELD_CATEGORY_ID,
        config::FIELD_SPECIFICATIONS,
    ]);
    let mut fetcher = BatchFetcher::new(store.as_ref(), query, options.page_size);
    let mut planned_total = 0usize;

    while let Some(page) = fetcher.next_page().await? {
        let len = page.len();
        let planned = applier.apply_page(page, mode_for(&options)).await;
        planned_total += planned.len();
        if !planned.is_empty() {
            report.counters().add_skipped(planned.len());
        }
        report.record_page(len);
    }

    if options.dry_run {
        report.add_note("Planned (dry run)", planned_total);
    }
    Ok(report)
}

pub async fn universal_manufacturers<S: RemoteStore + 'static>(
    store: Arc<S>,
    options: RunOptions,
    classifier: KeywordClassifier,
) -> AppResult<RunReport> {
    let counters = RunCounters::new();
    let mut report = RunReport::new(&Task::UniversalManufacturers.to_string(), counters.clone());

    let query = ReadQuery::table(config::TABLE_PRODUCTS)
        .select(&[config::FIELD_ID, config::FIELD_NAME, config::FIELD_MANUFACTURER])
        .filter(Filter::eq(
            config::FIELD_MANUFACTURER,
            config::UNIVERSAL_MANUFACTURER,
        ));

    log(
        LogLevel::Step,
        &format!(
            "--- Phase 1: Classify {} Products ({} rule(s)) ---",
            config::UNIVERSAL_MANUFACTURER,
            classifier.rules().len()
        ),
    );
    let applier = ConcurrentApplier::new(
        store.clone(),
        Arc::new(classifier),
        config::TABLE_PRODUCTS,
        options.concurrency,
        counters.clone(),
    );

    // Writes change the filtered column, so every page is read before anything is written.
    let mut planned: Vec<PlannedWrite> = Vec::new();
    let mut fetcher = BatchFetcher::new(store.as_ref(), query.clone(), options.page_size);
    while let Some(page) = fetcher.next_page().await? {
        let len = page.len();
        planned.extend(applier.apply_page(page, ApplyMode::DryRun).await);
        report.record_page(len);
    }
    report.add_note("Found", report.observed());
    log(
        LogLevel::Info,
        &format!(
            "{} of {} record(s) matched a manufacturer rule.",
            planned.len(),
            report.observed()
        ),
    );

    if options.dry_run {
        for group in group_intents(planned.iter().map(|p| p.intent.clone())) {
            log(
                LogLevel::Info,
                &format!("Would set {} on {} record(s).", group.label, group.ids.len()),
            );
        }
        settle_unsent(&mut report, planned.len(), "Planned (dry run)");
        return Ok(report);
    }

    log(LogLevel::Step, "--- Phase 2: Grouped Manufacturer Writes ---");
    let groups = group_intents(planned.into_iter().map(|p| p.intent));
    let writer = ChunkedWriter::new(
        store.clone(),
        config::TABLE_PRODUCTS,
        options.chunk_size,
        applier.semaphore().clone(),
        counters,
    );
    let outcomes = writer.write_groups(groups).await;
    let reassigned: usize = outcomes.iter().map(|o| o.written).sum();
    report.add_note("Reassigned", reassigned);

    match store.count(&query).await {
        Ok(remaining) => report.add_note("Remaining", remaining),
        Err(e) => {
            log(
                LogLevel::Warning,
                &format!("Could not count remaining records: {}", e),
            );
            report.add_note("Remaining", "unknown");
        }
    }
    Ok(report)
}

pub async fn engine_categories<S: RemoteStore + 'static>(
    store: Arc<S>,
    options: RunOptions,
    operator: &dyn Operator,
) -> AppResult<RunReport> {
    let counters = RunCounters::new();
    let mut report = RunReport::new(&Task::EngineCategories.to_string(), counters.clone());
    let classifier = PredicateClassifier::engine_assemblies();
    let target = classifier.target_value().to_string();

    let query = ReadQuery::table(config::TABLE_PRODUCTS)
        .select(&[config::FIELD_ID, config::FIELD_TITLE, config::FIELD_CATEGORY])
        .filter(Filter::ilike(
            config::FIELD_TITLE,
            config::ENGINE_TITLE_PATTERN,
        ));

    log(LogLevel::Step, "--- Phase 1: Find Misfiled Engines ---");
    let applier = ConcurrentApplier::new(
        store.clone(),
        Arc::new(classifier),
        config::TABLE_PRODUCTS,
        options.concurrency,
        counters,
    );
    let mut planned: Vec<PlannedWrite> = Vec::new();
    let mut fetcher = BatchFetcher::new(store.as_ref(), query, options.page_size);
    while let Some(page) = fetcher.next_page().await? {
        let len = page.len();
        planned.extend(applier.apply_page(page, ApplyMode::DryRun).await);
        report.record_page(len);
    }

    if planned.is_empty() {
        log(
            LogLevel::Success,
            &format!("Every matching engine is already in '{}'.", target),
        );
        return Ok(report);
    }

    log(
        LogLevel::Warning,
        &format!("{} record(s) are outside '{}':", planned.len(), target),
    );
    for (i, p) in planned.iter().enumerate() {
        let title = p.record.text(config::FIELD_TITLE).present().unwrap_or("");
        let current = match p.record.text(config::FIELD_CATEGORY) {
            FieldRead::Present(c) => c.to_string(),
            FieldRead::Missing => "NULL".to_string(),
            FieldRead::WrongShape => "<unreadable>".to_string(),
        };
        log(
            LogLevel::Info,
            &format!(
                "{:>3}. ID {:>6}: {} (current: {})",
                i + 1,
                p.record.id,
                utils::truncate_chars(title, 50),
                current
            ),
        );
    }

    if options.dry_run {
        settle_unsent(&mut report, planned.len(), "Planned (dry run)");
        return Ok(report);
    }

    let approved = options.assume_yes
        || operator
            .confirm(&format!("Move {} record(s) to '{}'? (yes/no): ", planned.len(), target))
            .await?;
    if !approved {
        log(LogLevel::Info, "Skipping correction at operator's request.");
        settle_unsent(&mut report, planned.len(), "Declined");
        return Ok(report);
    }

    log(LogLevel::Step, "--- Phase 2: Category Writes ---");
    applier.apply_intents(planned).await;
    Ok(report)
}
