use crate::api::store::RemoteStore;
use crate::classify::{Classifier, Decision};
use crate::core::stats::RunCounters;
use crate::logging::{log, LogLevel};
use crate::model::intent::WriteIntent;
use crate::model::record::Record;
use crate::utils;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyMode {
    Write,
    /// Classify only; produced intents are returned instead of sent.
    DryRun,
}

/// A write the classifier asked for, kept with the record it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedWrite {
    pub record: Record,
    pub intent: WriteIntent,
}

/// Classifies and writes one page of records with at most `concurrency` records in flight.
///
/// Every record ends in exactly one counter: `skipped` for no-ops, `updated` or `failed` for
/// writes. In dry-run mode planned writes are returned uncounted so that a later
/// [`ConcurrentApplier::apply_intents`] (or an explicit skip) accounts for them.
pub struct ConcurrentApplier<S: RemoteStore + 'static> {
    store: Arc<S>,
    classifier: Arc<dyn Classifier>,
    table: Arc<str>,
    semaphore: Arc<Semaphore>,
    counters: Arc<RunCounters>,
}

impl<S: RemoteStore + 'static> ConcurrentApplier<S> {
    pub fn new(
        store: Arc<S>,
        classifier: Arc<dyn Classifier>,
        table: &str,
        concurrency: usize,
        counters: Arc<RunCounters>,
    ) -> Self {
        ConcurrentApplier {
            store,
            classifier,
            table: Arc::from(table),
            semaphore: Arc::new(Semaphore::new(concurrency.max(1))),
            counters,
        }
    }

    pub fn counters(&self) -> &Arc<RunCounters> {
        &self.counters
    }

    pub fn semaphore(&self) -> &Arc<Semaphore> {
        &self.semaphore
    }

    /// Returns once every record of the page has finished.
    pub async fn apply_page(&self, page: Vec<Record>, mode: ApplyMode) -> Vec<PlannedWrite> {
        let mut tasks = JoinSet::new();

        for record in page {
            let store = self.store.clone();
            let classifier = self.classifier.clone();
            let table = self.table.clone();
            let sem = self.semaphore.clone();
            let counters = self.counters.clone();

            tasks.spawn(async move {
                let _permit = match utils::acquire_semaphore(&sem, "Apply Record").await {
                    Ok(permit) => permit,
                    Err(e) => {
                        log(LogLevel::Error, &format!("Record {}: {}", record.id, e));
                        counters.add_failed(1);
                        return None;
                    }
                };

                match classifier.classify(&record) {
                    Decision::NoOp(_) => {
                        counters.add_skipped(1);
                        None
                    }
                    Decision::Write(intent) => match mode {
                        ApplyMode::DryRun => Some(PlannedWrite { record, intent }),
                        ApplyMode::Write => {
                            write_one(store.as_ref(), &table, &intent, &counters).await;
                            None
                        }
                    },
                }
            });
        }

        let mut planned = Vec::new();
        while let Some(join_result) = tasks.join_next().await {
            match join_result {
                Ok(Some(p)) => planned.push(p),
                Ok(None) => {}
                Err(e) => {
                    log(
                        LogLevel::Error,
                        &format!(
                            "Apply task ({} on {}) panicked: {}",
                            self.classifier.name(),
                            self.table,
                            e
                        ),
                    );
                    self.counters.add_failed(1);
                }
            }
        }
        planned.sort_unstable_by_key(|p| p.record.id);
        planned
    }

    /// Sends previously planned writes under the same concurrency ceiling.
    pub async fn apply_intents(&self, plan: Vec<PlannedWrite>) {
        let mut tasks = JoinSet::new();

        for PlannedWrite { record, intent } in plan {
            let store = self.store.clone();
            let table = self.table.clone();
            let sem = self.semaphore.clone();
            let counters = self.counters.clone();

            tasks.spawn(async move {
                match utils::acquire_semaphore(&sem, "Apply Intent").await {
                    Ok(_permit) => write_one(store.as_ref(), &table, &intent, &counters).await,
                    Err(e) => {
                        log(LogLevel::Error, &format!("Record {}: {}", record.id, e));
                        counters.add_failed(1);
                    }
                }
            });
        }

        while let Some(join_result) = tasks.join_next().await {
            if let Err(e) = join_result {
                log(
                    LogLevel::Error,
                    &format!("Write task for {} panicked: {}", self.table, e),
                );
                self.counters.add_failed(1);
            }
        }
    }
}

async fn write_one<S: RemoteStore + ?Sized>(
    store: &S,
    table: &str,
    intent: &WriteIntent,
    counters: &RunCounters,
) {
    match store
        .write_fields(table, &intent.selector, &intent.fields)
        .await
    {
        Ok(()) => counters.add_updated(intent.selector.len()),
        Err(e) => {
            log(
                LogLevel::Warning,
                &format!("Write FAIL {} {:?}: {}", table, intent.selector.ids(), e),
            );
            counters.add_failed(intent.selector.len());
        }
    }
}
