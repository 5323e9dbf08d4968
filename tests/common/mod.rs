#![allow(dead_code)]

use async_trait::async_trait;
use catalog_fix::api::query::{Filter, ReadQuery};
use catalog_fix::api::store::RemoteStore;
use catalog_fix::error::{AppError, AppResult};
use catalog_fix::model::common::{FieldMap, RecordId};
use catalog_fix::model::intent::Selector;
use catalog_fix::model::record::Record;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub struct WriteCall {
    pub table: String,
    pub ids: Vec<RecordId>,
    pub fields: FieldMap,
}

/// In-memory store that applies writes, records every call and tracks peak concurrency.
#[derive(Default)]
pub struct FakeStore {
    tables: Mutex<HashMap<String, Vec<Record>>>,
    fetches: Mutex<Vec<(String, usize, usize)>>,
    writes: Mutex<Vec<WriteCall>>,
    fail_write_ids: Mutex<HashSet<RecordId>>,
    panic_write_ids: Mutex<HashSet<RecordId>>,
    fail_fetch_offset: Mutex<Option<usize>>,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
    delay: Option<Duration>,
}

pub fn record(value: Value) -> Record {
    serde_json::from_value(value).unwrap()
}

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

fn value_text(value: Option<&Value>) -> Option<String> {
    match value {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s.clone()),
        Some(other) => Some(other.to_string()),
    }
}

fn matches(record: &Record, filter: &Filter) -> bool {
    match filter {
        Filter::Eq { field, value } => {
            let current = if field == "id" {
                Some(record.id.to_string())
            } else {
                value_text(record.fields.get(field))
            };
            current.as_deref() == Some(value.as_str())
        }
        Filter::ILike { field, pattern } => {
            let needle = pattern.trim_matches('*').to_lowercase();
            value_text(record.fields.get(field))
                .map(|v| v.to_lowercase().contains(&needle))
                .unwrap_or(false)
        }
        Filter::IsNull { field } => value_text(record.fields.get(field)).is_none(),
    }
}

struct InFlight<'a>(&'a FakeStore);

impl<'a> InFlight<'a> {
    fn enter(store: &'a FakeStore) -> Self {
        let now = store.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        store.peak.fetch_max(now, Ordering::SeqCst);
        InFlight(store)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

impl FakeStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(delay: Duration) -> Self {
        FakeStore {
            delay: Some(delay),
            ..Self::default()
        }
    }

    pub fn insert(&self, table: &str, rows: Vec<Record>) {
        lock(&self.tables)
            .entry(table.to_string())
            .or_default()
            .extend(rows);
    }

    pub fn fail_writes_for(&self, ids: &[RecordId]) {
        lock(&self.fail_write_ids).extend(ids.iter().copied());
    }

    pub fn panic_on_write_for(&self, ids: &[RecordId]) {
        lock(&self.panic_write_ids).extend(ids.iter().copied());
    }

    pub fn fail_fetch_at(&self, offset: usize) {
        *lock(&self.fail_fetch_offset) = Some(offset);
    }

    pub fn fetches(&self) -> Vec<(String, usize, usize)> {
        lock(&self.fetches).clone()
    }

    pub fn writes(&self) -> Vec<WriteCall> {
        lock(&self.writes).clone()
    }

    pub fn peak_in_flight(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    pub fn row(&self, table: &str, id: RecordId) -> Option<Record> {
        lock(&self.tables)
            .get(table)
            .and_then(|rows| rows.iter().find(|r| r.id == id).cloned())
    }

    async fn pause(&self) {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
    }

    fn filtered(&self, query: &ReadQuery) -> Vec<Record> {
        let mut rows: Vec<Record> = lock(&self.tables)
            .get(&query.table)
            .map(|rows| {
                rows.iter()
                    .filter(|r| query.filters.iter().all(|f| matches(r, f)))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        rows.sort_by_key(|r| r.id);
        rows
    }
}

#[async_trait]
impl RemoteStore for FakeStore {
    async fn fetch_page(
        &self,
        query: &ReadQuery,
        offset: usize,
        limit: usize,
    ) -> AppResult<Vec<Record>> {
        let _guard = InFlight::enter(self);
        lock(&self.fetches).push((query.table.clone(), offset, limit));
        self.pause().await;

        if *lock(&self.fail_fetch_offset) == Some(offset) {
            return Err(AppError::Transport("connection reset".to_string()));
        }

        let rows = self.filtered(query);
        Ok(rows.into_iter().skip(offset).take(limit).collect())
    }

    async fn write_fields(
        &self,
        table: &str,
        selector: &Selector,
        fields: &FieldMap,
    ) -> AppResult<()> {
        let _guard = InFlight::enter(self);
        self.pause().await;

        let ids = selector.ids().to_vec();
        lock(&self.writes).push(WriteCall {
            table: table.to_string(),
            ids: ids.clone(),
            fields: fields.clone(),
        });

        if ids.iter().any(|id| lock(&self.panic_write_ids).contains(id)) {
            panic!("store crashed while writing {:?}", ids);
        }
        if ids.iter().any(|id| lock(&self.fail_write_ids).contains(id)) {
            return Err(AppError::store(409, "constraint violation", table));
        }

        let mut tables = lock(&self.tables);
        if let Some(rows) = tables.get_mut(table) {
            for row in rows.iter_mut().filter(|r| ids.contains(&r.id)) {
                for (k, v) in fields {
                    row.fields.insert(k.clone(), v.clone());
                }
            }
        }
        Ok(())
    }

    async fn count(&self, query: &ReadQuery) -> AppResult<u64> {
        let _guard = InFlight::enter(self);
        Ok(self.filtered(query).len() as u64)
    }
}
