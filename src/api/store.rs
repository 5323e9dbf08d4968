use crate::api::query::ReadQuery;
use crate::error::AppResult;
use crate::model::common::FieldMap;
use crate::model::intent::Selector;
use crate::model::record::Record;
use async_trait::async_trait;

/// One request per call; no caching and no retries. Callers bound concurrency.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    async fn fetch_page(&self, query: &ReadQuery, offset: usize, limit: usize)
        -> AppResult<Vec<Record>>;

    async fn write_fields(&self, table: &str, selector: &Selector, fields: &FieldMap)
        -> AppResult<()>;

    /// Exact number of rows matching the query's filters.
    async fn count(&self, query: &ReadQuery) -> AppResult<u64>;
}
